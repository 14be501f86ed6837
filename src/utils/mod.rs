use std::{
    ffi::OsStr,
    io::Write,
    process::{Command, ExitStatus, Output, Stdio},
};

pub mod backend;
pub mod error;
pub mod ids;
pub mod lifecycle;
pub mod passwd;
pub mod platform;
pub mod privileges;
pub mod prompt;
pub mod regex;
pub mod safety;

use error::AccountError;

/// Executes a command and returns its exit status along with standard output
///
/// Alias of Perl's qx. Meant for lookups, where a non-zero exit is an answer
/// instead of an error. Mutations go through [`run`]
pub fn qx<S: AsRef<OsStr>>(program: &str, args: &[S]) -> eyre::Result<(ExitStatus, String)> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::piped())
        .output()?;

    Ok((
        output.status,
        String::from_utf8_lossy(&output.stdout).to_string(),
    ))
}

/// Whether an external program can be found in $PATH
pub fn have(program: &str) -> bool {
    which::which(program).is_ok()
}

/// [`have`], as a precondition for a strategy in a fallback chain
pub fn require(program: &str) -> Result<(), AccountError> {
    if have(program) {
        Ok(())
    } else {
        Err(AccountError::CapabilityMissing(program.to_string()))
    }
}

/// Render a command the way an operator would type it
pub fn command_line(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|a| a.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run a command that changes the account database
///
/// A missing binary becomes [`AccountError::CapabilityMissing`], a non-zero
/// exit becomes [`AccountError::BackendRejected`] carrying the tool's stderr
pub fn run(cmd: &mut Command) -> Result<Output, AccountError> {
    let label = command_line(cmd);
    execute(cmd, &label, None)
}

/// Same as [`run`], feeding `input` to the command's standard input
pub fn run_with_input(cmd: &mut Command, input: &str) -> Result<Output, AccountError> {
    let label = command_line(cmd);
    execute(cmd, &label, Some(input))
}

/// Same as [`run`] for argument vectors that carry a secret. `label` is used in
/// place of the real command line in logs and errors
pub fn run_labelled(cmd: &mut Command, label: &str) -> Result<Output, AccountError> {
    execute(cmd, label, None)
}

fn execute(cmd: &mut Command, label: &str, input: Option<&str>) -> Result<Output, AccountError> {
    tracing::debug!("Running {label}");

    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    cmd.stdin(if input.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });

    let mut child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AccountError::CapabilityMissing(cmd.get_program().to_string_lossy().to_string())
        } else {
            AccountError::rejected(label, e.to_string())
        }
    })?;

    if let (Some(input), Some(mut stdin)) = (input, child.stdin.take()) {
        stdin
            .write_all(input.as_bytes())
            .map_err(|e| AccountError::rejected(label, format!("could not write input: {e}")))?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| AccountError::rejected(label, e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let reason = if stderr.is_empty() {
            format!("exited with {}", output.status)
        } else {
            stderr.lines().collect::<Vec<_>>().join("; ")
        };
        return Err(AccountError::rejected(label, reason));
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_is_a_missing_capability() {
        let err = run(&mut Command::new("acct-rs-definitely-not-installed"))
            .expect_err("binary should not exist");
        assert!(matches!(err, AccountError::CapabilityMissing(p) if p == "acct-rs-definitely-not-installed"));
    }

    #[test]
    fn non_zero_exit_carries_stderr() {
        let err = run(Command::new("sh").args(["-c", "echo 'policy says no' >&2; exit 3"]))
            .expect_err("command should fail");

        match err {
            AccountError::BackendRejected { command, reason } => {
                assert!(command.starts_with("sh -c"));
                assert_eq!(reason, "policy says no");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn labelled_runs_hide_the_real_arguments() {
        let err = run_labelled(
            Command::new("sh").args(["-c", "exit 1", "hunter2"]),
            "dscl . -passwd /Users/alice <redacted>",
        )
        .expect_err("command should fail");

        let msg = err.to_string();
        assert!(!msg.contains("hunter2"));
        assert!(msg.contains("<redacted>"));
    }

    #[test]
    fn input_is_fed_through_stdin() {
        let output = run_with_input(&mut Command::new("cat"), "alice:P@ss1234\n")
            .expect("cat should succeed");
        assert_eq!(String::from_utf8_lossy(&output.stdout), "alice:P@ss1234\n");
    }

    #[test]
    fn qx_reports_failure_without_erroring() {
        let (status, out) = qx("sh", &["-c", "echo partial; exit 2"]).expect("sh should run");
        assert!(!status.success());
        assert_eq!(out.trim(), "partial");
    }
}
