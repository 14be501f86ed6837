//! The account backends. Each one speaks to its operating system's account
//! database through that system's own tools; [`Backend`] picks the right one
//! for the detected [`Platform`] and forwards to it
use std::path::{Path, PathBuf};

use crate::utils::{error::AccountError, platform::Platform};

pub mod dscl;
#[cfg(test)]
pub mod fake;
pub mod linux;

pub use dscl::DirectoryServiceBackend;
pub use linux::LinuxBackend;

/// Password material. Write only: it is handed to the backend and never shown
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}

/// Everything needed to create the account record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewAccount {
    pub name: String,
    pub group: String,
    pub home: PathBuf,
    pub shell: String,
}

/// How a forced password rotation request went
#[derive(Debug)]
pub enum RotationOutcome {
    /// The backend confirmed the password is expired
    Enforced { via: &'static str },
    /// The request was accepted but the backend is known not to always honor it
    Attempted { via: &'static str },
    /// Every strategy failed; the account is still usable
    Failed(AccountError),
}

/// What account removal took care of by itself
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Removal {
    /// The home directory and mail spool were asked to go with the record
    Cascaded,
    /// Only the record was removed
    RecordOnly,
}

/// The capabilities every account backend provides
pub trait AccountBackend {
    fn platform(&self) -> Platform;

    fn home_base(&self) -> &Path {
        self.platform().home_base()
    }

    fn default_shell(&self) -> &str {
        self.platform().default_shell()
    }

    /// True iff the account store resolves `name` to a numeric ID
    fn user_exists(&self, name: &str) -> Result<bool, AccountError>;

    fn group_exists(&self, name: &str) -> Result<bool, AccountError>;

    /// Home directory from the account record. `None` when it can't be resolved
    fn home_dir_of(&self, name: &str) -> Option<PathBuf>;

    fn create_group(&self, name: &str) -> Result<(), AccountError>;

    fn create_user(&self, account: &NewAccount) -> Result<(), AccountError>;

    fn set_password(&self, name: &str, password: &Password) -> Result<(), AccountError>;

    /// Expire the password so it has to be changed at next login. Best effort
    fn force_rotation(&self, name: &str) -> RotationOutcome;

    fn delete_user(&self, name: &str) -> Result<Removal, AccountError>;

    /// Raw record dump and password expiry state, for the operator to eyeball.
    /// Never fails; problems are written into the report
    fn report(&self, name: &str) -> String;
}

/// One way of getting something done, tried as part of a fallback chain
pub type Strategy<'a, T> = (&'static str, &'a dyn Fn() -> Result<T, AccountError>);

/// Try each strategy in order, returning the first success along with the
/// strategy's name. If all of them fail the last error is returned
pub fn first_success<T>(strategies: &[Strategy<'_, T>]) -> Result<(&'static str, T), AccountError> {
    let mut last = None;

    for &(name, strategy) in strategies {
        match strategy() {
            Ok(v) => return Ok((name, v)),
            Err(e) => {
                tracing::debug!("{name} did not work out: {e}");
                last = Some(e);
            }
        }
    }

    Err(last.unwrap_or_else(|| AccountError::precondition("no strategy to try")))
}

/// The backend for the host, chosen once from the detected [`Platform`]
#[derive(Debug)]
pub enum Backend {
    Linux(LinuxBackend),
    DirectoryService(DirectoryServiceBackend),
}

impl From<Platform> for Backend {
    fn from(platform: Platform) -> Self {
        match platform {
            Platform::Linux => Backend::Linux(LinuxBackend),
            Platform::DirectoryService => Backend::DirectoryService(DirectoryServiceBackend),
        }
    }
}

macro_rules! dispatch {
    ($self:ident.$method:ident($($arg:expr),*)) => {
        match $self {
            Backend::Linux(b) => b.$method($($arg),*),
            Backend::DirectoryService(b) => b.$method($($arg),*),
        }
    };
}

impl AccountBackend for Backend {
    fn platform(&self) -> Platform {
        dispatch!(self.platform())
    }

    fn user_exists(&self, name: &str) -> Result<bool, AccountError> {
        dispatch!(self.user_exists(name))
    }

    fn group_exists(&self, name: &str) -> Result<bool, AccountError> {
        dispatch!(self.group_exists(name))
    }

    fn home_dir_of(&self, name: &str) -> Option<PathBuf> {
        dispatch!(self.home_dir_of(name))
    }

    fn create_group(&self, name: &str) -> Result<(), AccountError> {
        dispatch!(self.create_group(name))
    }

    fn create_user(&self, account: &NewAccount) -> Result<(), AccountError> {
        dispatch!(self.create_user(account))
    }

    fn set_password(&self, name: &str, password: &Password) -> Result<(), AccountError> {
        dispatch!(self.set_password(name, password))
    }

    fn force_rotation(&self, name: &str) -> RotationOutcome {
        dispatch!(self.force_rotation(name))
    }

    fn delete_user(&self, name: &str) -> Result<Removal, AccountError> {
        dispatch!(self.delete_user(name))
    }

    fn report(&self, name: &str) -> String {
        dispatch!(self.report(name))
    }
}

/// Shared by both backends: does the name service resolve `name` to a UID?
pub(crate) fn name_service_has_user(name: &str) -> Result<bool, AccountError> {
    nix::unistd::User::from_name(name)
        .map(|u| u.is_some())
        .map_err(|e| AccountError::rejected(format!("getpwnam({name})"), e.to_string()))
}
