//! Input gates that run before anything touches the account database or the
//! filesystem. Both checks are backend independent
use std::path::{Component, Path};

use crate::{
    pcre,
    utils::{error::AccountError, regex::USERNAME},
};

/// The superuser is never created, deleted, or otherwise managed by this tool
pub const PROTECTED_USER: &str = "root";

/// Directories that must never be removed, no matter what a lookup returns
pub const DENIED_ROOTS: &[&str] = &[
    "/",
    "/home",
    "/Users",
    "/Users/Shared",
    "/var/mail",
    "/var/spool/mail",
    "/root",
];

pub fn validate_username(name: &str) -> Result<(), AccountError> {
    if name.is_empty() {
        return Err(AccountError::precondition("username must not be empty"));
    }

    if !pcre!(name =~ qr/USERNAME/) {
        return Err(AccountError::precondition(format!(
            "invalid username '{name}': must start with a letter or underscore and contain only letters, digits, '_' or '-'"
        )));
    }

    Ok(())
}

/// [`validate_username`], additionally refusing the superuser
pub fn validate_managed_username(name: &str) -> Result<(), AccountError> {
    validate_username(name)?;

    if name == PROTECTED_USER {
        return Err(AccountError::precondition(format!(
            "refusing to manage the protected account '{PROTECTED_USER}'"
        )));
    }

    Ok(())
}

/// Make sure a home directory is something that is safe to create or delete
///
/// `home_base` is the backend's own parent directory for homes, which is
/// deny-listed alongside [`DENIED_ROOTS`]. Comparison is done per path
/// component so `/home/` and `/home` are the same thing
pub fn validate_home_path(path: &Path, home_base: &Path) -> Result<(), AccountError> {
    if !path.is_absolute() {
        return Err(AccountError::unsafe_path(path, "home directory is not absolute"));
    }

    if path.components().any(|c| c == Component::ParentDir) {
        return Err(AccountError::unsafe_path(
            path,
            "home directory contains '..' components",
        ));
    }

    let denied = DENIED_ROOTS
        .iter()
        .map(Path::new)
        .chain(std::iter::once(home_base))
        .any(|root| root.components().eq(path.components()));

    if denied {
        return Err(AccountError::unsafe_path(path, "deny-listed filesystem root"));
    }

    Ok(())
}
