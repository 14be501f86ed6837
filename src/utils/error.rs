use std::path::PathBuf;

use thiserror::Error;

/// Everything that can stop an account from being provisioned or removed
///
/// Each variant tells the operator a different story: fix the input, install a
/// tool, or go look at the backend by hand
#[derive(Debug, Error)]
pub enum AccountError {
    /// Already exists, does not exist, protected name, bad input
    #[error("{0}")]
    PreconditionFailed(String),

    /// A required external program is not installed
    #[error("required tool `{0}` is not available")]
    CapabilityMissing(String),

    /// The backend's own create/delete/set call failed
    #[error("`{command}` failed: {reason}")]
    BackendRejected { command: String, reason: String },

    #[error("refusing to touch unsafe path {}: {reason}", path.display())]
    UnsafePath { path: PathBuf, reason: String },

    /// Post mutation verification did not observe what was just written
    #[error("configuration inconsistent: {0}")]
    ConfigurationInconsistent(String),

    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("{0} cancelled by operator")]
    Cancelled(String),

    #[error("could not {action} {}", path.display())]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AccountError {
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::PreconditionFailed(msg.into())
    }

    pub fn rejected(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BackendRejected {
            command: command.into(),
            reason: reason.into(),
        }
    }

    pub fn filesystem(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            action,
            path: path.into(),
            source,
        }
    }

    pub fn unsafe_path(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::UnsafePath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = AccountError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_fit_on_one_line() {
        let errors = [
            AccountError::precondition("user 'alice' already exists"),
            AccountError::CapabilityMissing("chage".into()),
            AccountError::rejected("useradd alice", "useradd: group 'dev_group' does not exist"),
            AccountError::unsafe_path("/home", "deny-listed filesystem root"),
            AccountError::ConfigurationInconsistent("marker missing".into()),
            AccountError::UnsupportedPlatform("FreeBSD".into()),
            AccountError::Cancelled("deletion of 'alice'".into()),
        ];

        for e in errors {
            let msg = e.to_string();
            assert!(!msg.is_empty());
            assert!(!msg.contains('\n'), "{msg:?}");
        }
    }

    #[test]
    fn filesystem_cause_is_kept_as_the_source() {
        let e = AccountError::filesystem(
            "remove",
            "/home/alice",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );

        assert_eq!(e.to_string(), "could not remove /home/alice");
        let source = std::error::Error::source(&e).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("permission denied"));

        let report = eyre::Report::from(e);
        assert_eq!(
            format!("{report:#}"),
            "could not remove /home/alice: permission denied"
        );
    }

    #[test]
    fn unsafe_path_names_the_path() {
        let e = AccountError::unsafe_path("/Users/Shared", "deny-listed filesystem root");
        assert_eq!(
            e.to_string(),
            "refusing to touch unsafe path /Users/Shared: deny-listed filesystem root"
        );
    }
}
