use cartoview_lib::{Error, Repository};
use clap::{Parser, Subcommand};
use colored::Colorize;
use sysexits::ExitCode;
use tracing::{Level, error};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod app;
mod config;
mod instance;
mod tag;

const LOG_ENV: &str = "CARTOVIEW_LOG";

#[derive(Parser, Debug)]
#[command(name = "cartoview")]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Operate on installed apps
    #[command(subcommand)]
    App(app::Command),
    /// Operate on app tags
    #[command(subcommand)]
    Tag(tag::Command),
    /// Operate on app instances
    #[command(subcommand)]
    Instance(instance::Command),
    /// Inspect or change the configuration
    #[command(subcommand)]
    Config(config::Command),
}

fn main() -> ExitCode {
    // Human friendly panicking in release mode
    human_panic::setup_panic!();

    // Logging
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::TRACE)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let cli = Cli::parse();

    let repo = match Repository::new() {
        Ok(repo) => repo,
        Err(err) => return report(&err),
    };

    let result = match &cli.command {
        Command::App(cmd) => app::handle(&repo, cmd),
        Command::Tag(cmd) => tag::handle(&repo, cmd),
        Command::Instance(cmd) => instance::handle(&repo, cmd),
        Command::Config(cmd) => config::handle(&repo, cmd),
    };

    result.unwrap_or_else(|err| report(&err))
}

/// Print `err` and pick the exit code matching its kind.
fn report(err: &Error) -> ExitCode {
    error!("{err:?}");
    eprintln!("{} {err}", "error:".red().bold());

    match err {
        Error::DuplicateName { .. } | Error::EmptyName => ExitCode::DataErr,
        Error::RemovedEntity | Error::MissingApp => ExitCode::NoInput,
        Error::Io(_) | Error::UninstallCleanup { .. } => ExitCode::IoErr,
        Error::ConfigRead(_) | Error::ConfigWrite(_) | Error::UnsupportedModelVersion { .. } => {
            ExitCode::Config
        }
        _ => ExitCode::Software,
    }
}

/// Print a lookup failure. Returned by handlers when a named entity doesn't exist.
fn not_found(kind: &str, name: &str) -> ExitCode {
    eprintln!("{} no {kind} named `{name}`", "error:".red().bold());
    ExitCode::NoInput
}
