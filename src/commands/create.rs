use clap::Parser;

use crate::utils::{
    backend::{Backend, Password},
    lifecycle::{CreateRequest, provision},
    prompt::prompt_password,
};

/// Create a user in the development group, with a password that has to be
/// changed at first login
///
/// ```sh
/// acct-rs create alice 'P@ss1234'
/// ```
///
/// Leave out the password to be prompted for it instead
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Create {
    /// Name of the account to create
    username: String,

    /// Initial password. Prompted for (twice, masked) when not given
    #[arg(allow_hyphen_values = true)]
    password: Option<String>,

    /// Login shell. Defaults to /bin/bash on Linux and /bin/zsh on macOS
    #[arg(short, long)]
    shell: Option<String>,
}

impl super::Command for Create {
    fn execute(self, backend: &Backend) -> eyre::Result<()> {
        let request = CreateRequest {
            username: &self.username,
            shell: self.shell.as_deref(),
        };

        let given = self.password;
        provision(backend, &request, || match given {
            Some(password) => Ok(Password::new(password)),
            None => prompt_password(&self.username),
        })?;

        Ok(())
    }
}
