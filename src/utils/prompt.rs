//! Talking to the operator: destructive action confirmation and password entry
use std::io::{self, BufRead, Write};

use colored::Colorize;
use eyre::Context;

use crate::utils::{backend::Password, error::AccountError};

/// Only an explicit yes counts. Everything else, including an empty line, is
/// a no
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Ask `question` on `output` and read the answer from `input`
pub fn confirm_with<R: BufRead, W: Write>(
    mut input: R,
    mut output: W,
    question: &str,
) -> eyre::Result<bool> {
    write!(output, "{question} [y/N]: ").context("Could not display confirmation prompt")?;
    output.flush().context("Could not display confirmation prompt")?;

    let mut answer = String::new();
    input
        .read_line(&mut answer)
        .context("Could not read confirmation from user")?;

    Ok(is_affirmative(&answer))
}

/// Confirmation for permanently removing an account and its files
pub fn confirm_deletion(username: &str) -> eyre::Result<bool> {
    let question = format!(
        "{} permanently delete user '{username}' and their home directory?",
        "!!!".red()
    );
    confirm_with(io::stdin().lock(), io::stderr(), &question)
}

/// Read a new password twice, masked. Mismatched or empty entries are fatal
/// rather than asked again
pub fn prompt_password(username: &str) -> eyre::Result<Password> {
    let first = dialoguer::Password::new()
        .with_prompt(format!("New password for {username}"))
        .allow_empty_password(true)
        .interact()
        .context("Could not read password from user")?;

    let second = dialoguer::Password::new()
        .with_prompt("Retype new password")
        .allow_empty_password(true)
        .interact()
        .context("Could not read password from user")?;

    Ok(check_password_entries(first, second)?)
}

pub fn check_password_entries(first: String, second: String) -> Result<Password, AccountError> {
    if first.is_empty() {
        return Err(AccountError::precondition("password must not be empty"));
    }

    if first != second {
        return Err(AccountError::precondition("passwords do not match"));
    }

    Ok(Password::new(first))
}
