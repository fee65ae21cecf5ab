use cartoview_lib::{Repository, Result};
use clap::Subcommand;
use sysexits::ExitCode;

use crate::not_found;

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List app tags
    List,
    /// Add a new app tag
    Add { name: String },
    /// Rename an app tag
    Rename { name: String, new_name: String },
    /// Remove an app tag. Apps carrying it are kept.
    Remove { name: String },
}

pub fn handle(repo: &Repository, cmd: &Command) -> Result<ExitCode> {
    match cmd {
        Command::List => {
            for tag in repo.tags()? {
                println!("{tag}");
            }
        }
        Command::Add { name } => {
            repo.add_tag(Some(name))?;
        }
        Command::Rename { name, new_name } => {
            let Some(tag) = repo.tag(name)? else {
                return Ok(not_found("tag", name));
            };
            tag.set_name(Some(new_name))?;
        }
        Command::Remove { name } => {
            let Some(tag) = repo.tag(name)? else {
                return Ok(not_found("tag", name));
            };
            repo.remove_tag(tag)?;
        }
    }

    Ok(ExitCode::Ok)
}
