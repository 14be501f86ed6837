use clap::Parser;

use crate::utils::{backend::Backend, lifecycle::deprovision, prompt::confirm_deletion};

/// Permanently delete a user along with their home directory and mail
///
/// Asks for confirmation first; anything but `y` or `yes` cancels
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Delete {
    /// Name of the account to delete
    username: String,
}

impl super::Command for Delete {
    fn execute(self, backend: &Backend) -> eyre::Result<()> {
        deprovision(backend, &self.username, confirm_deletion)?;

        Ok(())
    }
}
