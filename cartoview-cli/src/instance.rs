use cartoview_lib::{Repository, Result};
use clap::Subcommand;
use colored::Colorize;
use sysexits::ExitCode;

use crate::not_found;

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List app instances, optionally only those of one app
    List { app: Option<String> },
    /// Create a new instance of an app
    Create {
        app: String,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long = "abstract")]
        abstract_: Option<String>,
        /// User name of the instance owner
        #[arg(short, long)]
        owner: Option<String>,
    },
    /// Change the metadata of an instance
    Edit {
        id: u64,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long = "abstract")]
        abstract_: Option<String>,
        #[arg(short, long)]
        owner: Option<String>,
    },
    /// Delete an instance together with its permissions and links
    Delete { id: u64 },
}

pub fn handle(repo: &Repository, cmd: &Command) -> Result<ExitCode> {
    match cmd {
        Command::List { app } => {
            let instances = match app {
                Some(name) => match repo.app(name)? {
                    Some(app) => app.instances()?,
                    None => return Ok(not_found("app", name)),
                },
                None => repo.instances()?,
            };

            for instance in instances {
                let app = instance
                    .app()?
                    .map(|app| app.name())
                    .transpose()?
                    .unwrap_or_else(|| "-".into());
                println!("{} {}", instance.name_long()?.bold(), app.dimmed());
            }
        }
        Command::Create {
            app,
            title,
            abstract_,
            owner,
        } => {
            let Some(app) = repo.app(app)? else {
                return Ok(not_found("app", app));
            };

            let mut draft = app.new_instance();
            draft.title = title.clone();
            draft.abstract_ = abstract_.clone();
            draft.owner = owner.clone();
            let instance = repo.save_instance(draft)?;

            println!("Created {}", instance.absolute_url().bold());
        }
        Command::Edit {
            id,
            title,
            abstract_,
            owner,
        } => {
            let Some(instance) = repo.instance(*id)? else {
                return Ok(not_found("instance", &id.to_string()));
            };
            if let Some(title) = title {
                instance.set_title(title)?;
            }
            if let Some(abstract_) = abstract_ {
                instance.set_abstract(abstract_)?;
            }
            if let Some(owner) = owner {
                instance.set_owner(Some(owner.as_str()).filter(|o| !o.is_empty()))?;
            }
            println!("{}", instance.name_long()?);
        }
        Command::Delete { id } => {
            let Some(instance) = repo.instance(*id)? else {
                return Ok(not_found("instance", &id.to_string()));
            };
            repo.remove_instance(instance)?;
        }
    }

    Ok(ExitCode::Ok)
}
