use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use acct_rs::{
    define_commands,
    utils::{backend::Backend, platform::Platform, privileges::ensure_elevated},
};

// Add commands here
//
// Format:
// name, alias => reference::to::Command,
// name => reference::to::Command,
//
// Name should be in camel case
define_commands! {
    Create, add => acct_rs::commands::create::Create,
    Delete, del => acct_rs::commands::delete::Delete,
    Show => acct_rs::commands::show::Show,
}

/// Provision and remove local developer accounts on Linux and macOS
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Log more about what is happening (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::filter::Targets::new().with_target("acct_rs", level))
        .init();
}

fn run(cli: Cli) -> eyre::Result<()> {
    ensure_elevated()?;

    let platform = Platform::detect()?;
    tracing::info!("Managing accounts through the {platform} backend");

    cli.command.execute(&Backend::from(platform))
}

/// Exit status for a command line clap would not accept. Help and version
/// output also come through here and are not failures
fn usage_status(e: &clap::Error) -> u8 {
    if e.use_stderr() { 1 } else { 0 }
}

/// The single line a failed run leaves on standard error
fn error_line(e: &eyre::Report) -> String {
    format!("Error: {e:#}")
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(usage_status(&e));
        }
    };

    init_logging(cli.verbose);

    if let Err(e) = color_eyre::install() {
        tracing::debug!("Could not install color-eyre hooks: {e}");
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", error_line(&e));
            ExitCode::FAILURE
        }
    }
}
