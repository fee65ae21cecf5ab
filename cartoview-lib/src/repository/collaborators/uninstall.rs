use std::{
    fs,
    path::{Component, Path},
};

use tracing::{debug, info, warn};

use crate::repository::{
    collaborators::Uninstaller,
    config::Cfg,
    entities::{App, Result},
};

/// Removes the install directory `<apps_dir>/<name>` of an app.
#[derive(Debug, Clone)]
pub struct FsUninstaller {
    cfg: Cfg,
}

impl FsUninstaller {
    pub(crate) fn new(cfg: Cfg) -> Self {
        Self { cfg }
    }
}

impl Uninstaller for FsUninstaller {
    fn delete_installed_app(&self, app: &App) -> Result<()> {
        let name = app.name()?;

        // The name must stay inside the apps directory
        let mut components = Path::new(&name).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            warn!("App name `{name}` is not a directory name, leaving the apps directory alone");
            return Ok(());
        }

        let dir = self.cfg.read().apps_dir().join(&name);

        if !dir.exists() {
            debug!("App {name} has no install directory at {}", dir.display());
            return Ok(());
        }

        fs::remove_dir_all(&dir)?;

        info!("Removed installed files of app {name} from {}", dir.display());

        Ok(())
    }
}
