use std::sync::Arc;

use crate::repository::{
    collaborators::Uninstaller,
    entities::{App, Error, Result},
    lifecycle::Hook,
};

/// Removes what installing an app left behind before the app record goes.
pub struct UninstallCleanup {
    uninstaller: Arc<dyn Uninstaller>,
}

impl UninstallCleanup {
    pub fn new(uninstaller: Arc<dyn Uninstaller>) -> Self {
        Self { uninstaller }
    }
}

impl Hook<App> for UninstallCleanup {
    fn name(&self) -> &'static str {
        "uninstall_cleanup"
    }

    fn pre_delete(&self, app: &App) -> Result<()> {
        self.uninstaller
            .delete_installed_app(app)
            .map_err(|source| Error::UninstallCleanup {
                app: app.name().unwrap_or_default(),
                source: Box::new(source),
            })
    }
}
