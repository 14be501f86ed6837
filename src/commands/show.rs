use clap::Parser;
use colored::Colorize;

use crate::utils::{
    backend::{AccountBackend, Backend},
    lifecycle::print_report,
    safety::validate_username,
};

/// Show what the account database knows about a user. Changes nothing
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Show {
    /// Name of the account to look at
    username: String,
}

impl super::Command for Show {
    fn execute(self, backend: &Backend) -> eyre::Result<()> {
        validate_username(&self.username)?;

        if !backend.user_exists(&self.username)? {
            println!("{}", format!("!!! User {} does not exist", self.username).red());
        }

        match backend.home_dir_of(&self.username) {
            Some(home) => println!(
                "{}",
                format!(
                    "--- Home directory: {} ({})",
                    home.display(),
                    if home.is_dir() { "present" } else { "missing" }
                )
                .green()
            ),
            None => println!("{}", "??? Home directory unknown".yellow()),
        }

        print_report(backend, &self.username);

        Ok(())
    }
}
