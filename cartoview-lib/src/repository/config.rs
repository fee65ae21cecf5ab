use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    Result,
    fs::{config_dir, data_dir},
};

const FILE_NAME: &str = "core.toml";

/// Handle to the core configuration
pub type Cfg = Arc<RwLock<CoreConfig>>;

/// The core configuration, serialized to TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Directory holding one sub-directory per installed app
    apps_dir: PathBuf,
}

impl CoreConfig {
    /// Load the configuration file, writing the defaults first if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = config_dir()?.join(FILE_NAME);

        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            debug!("Loaded configuration from {}", path.display());
            Ok(toml::from_str(&contents)?)
        } else {
            let cfg = Self::with_apps_dir(data_dir()?.join("apps"));
            cfg.save()?;
            Ok(cfg)
        }
    }

    pub fn save(&self) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;

        fs::write(config_dir()?.join(FILE_NAME), contents)?;

        Ok(())
    }

    pub fn with_apps_dir(apps_dir: impl Into<PathBuf>) -> Self {
        Self {
            apps_dir: apps_dir.into(),
        }
    }

    pub fn apps_dir(&self) -> &Path {
        &self.apps_dir
    }

    pub fn set_apps_dir(&mut self, apps_dir: impl Into<PathBuf>) {
        self.apps_dir = apps_dir.into();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_toml_round_trip() {
        let cfg = CoreConfig::with_apps_dir("/srv/cartoview/apps");

        let contents = toml::to_string_pretty(&cfg).unwrap();

        assert!(contents.contains("apps_dir = \"/srv/cartoview/apps\""));
        assert_eq!(toml::from_str::<CoreConfig>(&contents).unwrap(), cfg);
    }

    #[test]
    fn test_set_apps_dir() {
        let mut cfg = CoreConfig::with_apps_dir("/srv/cartoview/apps");

        cfg.set_apps_dir("/opt/cartoview/apps");

        assert_eq!(cfg.apps_dir(), Path::new("/opt/cartoview/apps"));
    }
}
