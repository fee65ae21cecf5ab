use agdb::{DbElement, DbId};

mod app_instances;
mod app_tags;
mod apps;
mod links;
mod permissions;

pub(crate) use app_instances::AppInstanceModel;
pub(crate) use app_tags::AppTagModel;
pub(crate) use apps::AppModel;
pub(crate) use links::LinkModel;
pub(crate) use permissions::PermissionModel;

pub(crate) const CURRENT_MODEL_VERSION: u64 = 1;

#[derive(Debug, Clone, DbElement, PartialEq, PartialOrd)]
pub(crate) struct ModelVersion {
    db_id: Option<DbId>,
    version: u64,
}

impl ModelVersion {
    pub fn version(&self) -> u64 {
        self.version
    }
}

impl Default for ModelVersion {
    fn default() -> Self {
        Self {
            db_id: None,
            version: CURRENT_MODEL_VERSION,
        }
    }
}
