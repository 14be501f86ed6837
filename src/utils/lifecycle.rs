//! Account creation and deletion
//!
//! Both operations are written against [`AccountBackend`] and walk the same
//! steps on every platform. Preconditions are all checked before the first
//! mutation; after that any failure stops the run. Re-running from scratch is
//! always safe since every step starts with an existence check
use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::utils::{
    backend::{AccountBackend, NewAccount, Password, Removal, RotationOutcome},
    error::AccountError,
    safety::{validate_home_path, validate_managed_username},
};

/// Primary group every provisioned account is placed in
pub const DEV_GROUP: &str = "dev_group";

#[derive(Debug)]
pub struct CreateRequest<'a> {
    pub username: &'a str,
    /// Login shell, or the backend's default
    pub shell: Option<&'a str>,
}

/// The state an account was left in after creation
#[derive(Debug)]
pub struct Provisioned {
    pub account: NewAccount,
    pub group_created: bool,
    pub rotation: RotationOutcome,
}

/// What deletion ended up doing
#[derive(Debug, PartialEq, Eq)]
pub struct Removed {
    pub home: PathBuf,
    pub removal: Removal,
    /// Whether the home directory had to be removed here instead of by the
    /// backend
    pub removed_home_explicitly: bool,
}

/// Create `request.username` with its primary group, password and expired
/// password state
///
/// `password` is only asked for once every precondition has passed, so an
/// operator isn't made to type a password for an account that can't be made
pub fn provision<B, P>(
    backend: &B,
    request: &CreateRequest<'_>,
    password: P,
) -> eyre::Result<Provisioned>
where
    B: AccountBackend + ?Sized,
    P: FnOnce() -> eyre::Result<Password>,
{
    let username = request.username;
    validate_managed_username(username)?;

    if backend.user_exists(username)? {
        return Err(AccountError::precondition(format!("user '{username}' already exists")).into());
    }

    let home = backend.home_base().join(username);
    validate_home_path(&home, backend.home_base())?;

    let password = password()?;
    validate_password(&password)?;

    let account = NewAccount {
        name: username.to_string(),
        group: DEV_GROUP.to_string(),
        home,
        shell: request
            .shell
            .unwrap_or_else(|| backend.default_shell())
            .to_string(),
    };

    // absent -> group ready
    let group_created = if backend.group_exists(DEV_GROUP)? {
        tracing::info!("Group {DEV_GROUP} already exists");
        false
    } else {
        println!("{}", format!("--- Creating group {DEV_GROUP}").green());
        backend.create_group(DEV_GROUP)?;
        true
    };

    // group ready -> record created
    println!(
        "{}",
        format!("--- Creating user {username} ({})", account.home.display()).green()
    );
    backend.create_user(&account)?;

    // record created -> password set
    backend.set_password(username, &password)?;
    tracing::info!("Password set for {username}");

    // password set -> provisioned; rotation is best effort from here on
    let rotation = backend.force_rotation(username);
    match &rotation {
        RotationOutcome::Enforced { via } => {
            println!(
                "{}",
                format!("--- Password must be changed at next login (via {via})").green()
            );
        }
        RotationOutcome::Attempted { via } => {
            println!(
                "{}",
                format!(
                    "??? Requested a password change at next login via {via}; {} does not guarantee it is enforced",
                    backend.platform()
                )
                .yellow()
            );
        }
        RotationOutcome::Failed(e) => {
            tracing::warn!("Could not force password rotation for {username}: {e}");
            println!(
                "{}",
                format!("??? Could not force a password change at next login: {e}").yellow()
            );
        }
    }

    print_report(backend, username);

    Ok(Provisioned {
        account,
        group_created,
        rotation,
    })
}

/// Remove `username` and its home directory after asking `confirm`
///
/// The home directory is validated against the deny-list as soon as it is
/// looked up and once more right before it is removed
pub fn deprovision<B, C>(backend: &B, username: &str, confirm: C) -> eyre::Result<Removed>
where
    B: AccountBackend + ?Sized,
    C: FnOnce(&str) -> eyre::Result<bool>,
{
    validate_managed_username(username)?;

    if !backend.user_exists(username)? {
        return Err(AccountError::precondition(format!("user '{username}' does not exist")).into());
    }

    if !confirm(username)? {
        return Err(AccountError::Cancelled(format!("deletion of '{username}'")).into());
    }

    let home = backend.home_dir_of(username).ok_or_else(|| {
        AccountError::precondition(format!(
            "home directory of '{username}' could not be determined; refusing to delete"
        ))
    })?;
    validate_home_path(&home, backend.home_base())?;

    // present -> record removed
    println!("{}", format!("--- Deleting user {username}").green());
    let removal = backend.delete_user(username)?;

    if backend.user_exists(username)? {
        return Err(AccountError::rejected(
            format!("delete {username}"),
            "account still resolves after removal",
        )
        .into());
    }

    // record removed -> removed
    let removed_home_explicitly = if home.exists() {
        if removal == Removal::Cascaded {
            tracing::warn!(
                "{} survived cascade removal, removing it explicitly",
                home.display()
            );
        }
        remove_home(&home, backend.home_base())?;
        true
    } else {
        false
    };

    println!(
        "{}",
        format!("--- Removed user {username} and {}", home.display()).green()
    );
    print_report(backend, username);

    Ok(Removed {
        home,
        removal,
        removed_home_explicitly,
    })
}

fn remove_home(home: &Path, home_base: &Path) -> Result<(), AccountError> {
    validate_home_path(home, home_base)?;

    println!(
        "{}",
        format!("--- Removing home directory {}", home.display()).green()
    );
    std::fs::remove_dir_all(home).map_err(|e| AccountError::filesystem("remove", home, e))
}

fn validate_password(password: &Password) -> Result<(), AccountError> {
    let secret = password.expose();

    if secret.is_empty() {
        return Err(AccountError::precondition("password must not be empty"));
    }

    if secret.contains(['\n', '\r']) {
        return Err(AccountError::precondition(
            "password must not contain line breaks",
        ));
    }

    Ok(())
}

/// Verification output: informational only
pub fn print_report<B: AccountBackend + ?Sized>(backend: &B, username: &str) {
    println!("{}", format!("--- Account state for {username}:").green());
    println!("{}", backend.report(username).trim_end());
}
