use std::{fs, path::PathBuf};

use cartoview_lib::{App, NewApp, Repository, Result};
use clap::Subcommand;
use colored::Colorize;
use sysexits::ExitCode;

use crate::not_found;

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List installed apps
    List,
    /// Show the metadata of an app
    Show { name: String },
    /// Install an app from its TOML manifest
    Install { manifest: PathBuf },
    /// Uninstall an app and remove its installed files
    Uninstall { name: String },
    /// Hide an app without uninstalling it
    Suspend { name: String },
    /// Make a suspended app available again
    Resume { name: String },
}

pub fn handle(repo: &Repository, cmd: &Command) -> Result<ExitCode> {
    match cmd {
        Command::List => {
            for app in repo.apps()? {
                print_line(&app)?;
            }
        }
        Command::Show { name } => {
            let Some(app) = repo.app(name)? else {
                return Ok(not_found("app", name));
            };
            print_details(&app)?;
        }
        Command::Install { manifest } => {
            let contents = match fs::read_to_string(manifest) {
                Ok(contents) => contents,
                Err(err) => {
                    eprintln!(
                        "{} failed to read {}: {err}",
                        "error:".red().bold(),
                        manifest.display()
                    );
                    return Ok(ExitCode::NoInput);
                }
            };
            let new_app: NewApp = match toml::from_str(&contents) {
                Ok(new_app) => new_app,
                Err(err) => {
                    eprintln!(
                        "{} invalid manifest {}: {err}",
                        "error:".red().bold(),
                        manifest.display()
                    );
                    return Ok(ExitCode::DataErr);
                }
            };

            let app = repo.install_app(new_app)?;
            println!("Installed {}", app.name()?.bold());
        }
        Command::Uninstall { name } => {
            let Some(app) = repo.app(name)? else {
                return Ok(not_found("app", name));
            };
            repo.uninstall_app(app)?;
            println!("Uninstalled {}", name.bold());
        }
        Command::Suspend { name } | Command::Resume { name } => {
            let Some(app) = repo.app(name)? else {
                return Ok(not_found("app", name));
            };
            app.set_suspended(matches!(cmd, Command::Suspend { .. }))?;
        }
    }

    Ok(ExitCode::Ok)
}

fn print_line(app: &App) -> Result<()> {
    let mut line = format!("{}", app.name()?.bold());
    if let Some(title) = app.title()? {
        line.push_str(&format!(" {title}"));
    }
    if app.is_suspended()? {
        line.push_str(&format!(" {}", "(suspended)".yellow()));
    }
    println!("{line}");

    Ok(())
}

fn print_details(app: &App) -> Result<()> {
    let field = |label: &str, value: Option<String>| {
        if let Some(value) = value {
            println!("{:>14} {value}", label.dimmed());
        }
    };

    println!("{}", app.name()?.bold());
    field("title", app.title()?);
    field("description", app.short_description()?.or(app.description()?));
    field("author", app.author()?);
    field("license", app.license()?);
    field("installed", Some(app.date_installed()?.to_rfc3339()));
    field("installed by", app.installed_by()?);
    field(
        "tags",
        Some(
            app.tags()?
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        ),
    );
    field("instances", Some(app.instances()?.len().to_string()));
    if app.is_suspended()? {
        println!("{:>14} {}", "status".dimmed(), "suspended".yellow());
    }

    Ok(())
}
