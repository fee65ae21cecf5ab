use std::path::PathBuf;

use cartoview_lib::{Repository, Result};
use clap::Subcommand;
use sysexits::ExitCode;

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show the configured apps directory, or change it
    AppsDir { path: Option<PathBuf> },
}

pub fn handle(repo: &Repository, cmd: &Command) -> Result<ExitCode> {
    match cmd {
        Command::AppsDir { path: None } => {
            println!("{}", repo.config().read().apps_dir().display());
        }
        Command::AppsDir { path: Some(path) } => {
            let cfg = repo.config();
            let mut cfg = cfg.write();
            cfg.set_apps_dir(path);
            cfg.save()?;
        }
    }

    Ok(ExitCode::Ok)
}
