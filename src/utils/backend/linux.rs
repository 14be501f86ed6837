//! Linux backend, driving the shadow-utils binaries
//!
//! `useradd` and `groupadd` allocate IDs themselves and a password set with
//! `chpasswd` is immediately usable, so this backend is mostly sequencing
use std::{fmt::Write, path::PathBuf, process::Command};

use crate::utils::{
    backend::{AccountBackend, NewAccount, Password, Removal, RotationOutcome, Strategy},
    backend::{first_success, name_service_has_user},
    error::AccountError,
    passwd::{load_groups, load_users},
    platform::Platform,
    qx, require, run, run_with_input,
};

#[derive(Clone, Copy, Debug, Default)]
pub struct LinuxBackend;

impl AccountBackend for LinuxBackend {
    fn platform(&self) -> Platform {
        Platform::Linux
    }

    fn user_exists(&self, name: &str) -> Result<bool, AccountError> {
        name_service_has_user(name)
    }

    fn group_exists(&self, name: &str) -> Result<bool, AccountError> {
        load_groups(Some(name))
            .map(|groups| !groups.is_empty())
            .map_err(|e| AccountError::rejected(format!("getent group {name}"), e.to_string()))
    }

    fn home_dir_of(&self, name: &str) -> Option<PathBuf> {
        let users = load_users(Some(name))
            .inspect_err(|e| tracing::debug!("Could not read passwd entry for {name}: {e}"))
            .ok()?;

        users
            .into_iter()
            .next()
            .map(|u| u.home)
            .filter(|home| !home.as_os_str().is_empty())
    }

    fn create_group(&self, name: &str) -> Result<(), AccountError> {
        run(Command::new("groupadd").arg(name))?;
        Ok(())
    }

    fn create_user(&self, account: &NewAccount) -> Result<(), AccountError> {
        run(Command::new("useradd")
            .arg("-m")
            .args(["-g", account.group.as_str()])
            .arg("-d")
            .arg(&account.home)
            .args(["-s", account.shell.as_str()])
            .arg(&account.name))?;
        Ok(())
    }

    fn set_password(&self, name: &str, password: &Password) -> Result<(), AccountError> {
        // chpasswd reads user:password pairs, keeping the secret out of argv
        run_with_input(
            &mut Command::new("chpasswd"),
            &format!("{name}:{}\n", password.expose()),
        )?;
        Ok(())
    }

    fn force_rotation(&self, name: &str) -> RotationOutcome {
        let chage = || -> Result<(), AccountError> {
            require("chage")?;
            run(Command::new("chage").args(["-d", "0", name])).map(drop)
        };
        let passwd = || run(Command::new("passwd").args(["--expire", name])).map(drop);

        let strategies: [Strategy<'_, ()>; 2] =
            [("chage -d 0", &chage), ("passwd --expire", &passwd)];

        match first_success(&strategies) {
            Ok((via, ())) => RotationOutcome::Enforced { via },
            Err(e) => RotationOutcome::Failed(e),
        }
    }

    fn delete_user(&self, name: &str) -> Result<Removal, AccountError> {
        // -r takes the home directory and mail spool along with the record.
        // userdel exits non-zero if only the cleanup half went wrong, in which
        // case the record is gone and the leftovers are handled by the caller
        match run(Command::new("userdel").args(["-r", name])) {
            Ok(_) => Ok(Removal::Cascaded),
            Err(e @ AccountError::BackendRejected { .. })
                if matches!(self.user_exists(name), Ok(false)) =>
            {
                tracing::warn!("Record for {name} removed, but cleanup reported: {e}");
                Ok(Removal::RecordOnly)
            }
            Err(e) => Err(e),
        }
    }

    fn report(&self, name: &str) -> String {
        let mut report = String::new();

        match qx("getent", &["passwd", name]) {
            Ok((status, entry)) if status.success() => {
                let _ = writeln!(report, "passwd: {}", entry.trim());
            }
            _ => {
                let _ = writeln!(report, "passwd: no entry for {name}");
            }
        }

        match qx("id", &[name]) {
            Ok((status, id)) if status.success() => {
                let _ = writeln!(report, "id: {}", id.trim());
            }
            _ => {
                let _ = writeln!(report, "id: {name} does not resolve");
            }
        }

        match qx("chage", &["-l", name]) {
            Ok((status, aging)) if status.success() => {
                let _ = writeln!(report, "{}", aging.trim_end());
                if must_change_at_next_login(&aging) {
                    let _ = writeln!(report, "rotation: must change at next login");
                }
            }
            _ => {
                let _ = writeln!(report, "chage: no password aging information");
            }
        }

        report
    }
}

/// Whether `chage -l` output shows the password as already expired
pub fn must_change_at_next_login(aging: &str) -> bool {
    aging.lines().any(|line| {
        line.split_once(':').is_some_and(|(key, value)| {
            key.trim() == "Last password change" && value.trim() == "password must be changed"
        })
    })
}
