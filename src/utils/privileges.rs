//! Getting administrative rights before anything else happens
//!
//! When not already root, the exact invocation is handed to sudo and this
//! process is replaced by it. Arguments are passed through untouched, so a
//! password given on the command line arrives in the elevated process as is
use std::{
    ffi::{OsStr, OsString},
    os::unix::process::CommandExt,
    path::Path,
    process::{Command, Stdio},
};

use eyre::{Context, bail};
use nix::unistd::geteuid;

use crate::utils::error::AccountError;

pub fn is_elevated() -> bool {
    geteuid().is_root()
}

/// `sudo -- <exe> <args...>`
pub fn elevation_command<I, S>(sudo: &Path, exe: &Path, args: I) -> Command
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(sudo);
    cmd.arg("--").arg(exe).args(args);
    cmd
}

/// Return if running as root, otherwise re-run the identical invocation through
/// sudo in place of this process. Only returns on failure
pub fn ensure_elevated() -> eyre::Result<()> {
    if is_elevated() {
        return Ok(());
    }

    let sudo =
        which::which("sudo").map_err(|_| AccountError::CapabilityMissing("sudo".to_string()))?;
    let exe = std::env::current_exe().context("Could not determine the path of this program")?;
    let args = std::env::args_os().skip(1).collect::<Vec<OsString>>();

    tracing::info!("Not running as root, re-running through {}", sudo.display());

    // Ask for credentials up front so a denial can be told apart from the
    // elevated run failing
    let validated = Command::new(&sudo)
        .arg("-v")
        .stdin(Stdio::inherit())
        .status()
        .context("Could not run sudo")?;

    if !validated.success() {
        bail!("could not obtain administrative rights: sudo refused the credentials");
    }

    let err = elevation_command(&sudo, &exe, &args).exec();

    Err(err).context("could not obtain administrative rights: failed to execute sudo")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elevated_invocation_keeps_every_argument() {
        let cmd = elevation_command(
            Path::new("/usr/bin/sudo"),
            Path::new("/usr/local/bin/acct-rs"),
            ["create", "alice", "P@ss 1234; $(whoami)"],
        );

        assert_eq!(cmd.get_program(), "/usr/bin/sudo");
        assert_eq!(
            cmd.get_args().collect::<Vec<_>>(),
            ["--", "/usr/local/bin/acct-rs", "create", "alice", "P@ss 1234; $(whoami)"]
        );
    }
}
