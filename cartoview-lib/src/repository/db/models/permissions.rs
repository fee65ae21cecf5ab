use agdb::{DbElement, DbId};

use crate::repository::entities::Uid;

#[derive(Debug, Clone, DbElement, PartialEq, PartialOrd)]
pub(crate) struct PermissionModel {
    db_id: Option<DbId>,
    uid: u64,
    /// The user or group name the grant applies to
    pub(crate) principal: String,
    /// A permission codename such as `view_resourcebase`
    pub(crate) permission: String,
}

impl PermissionModel {
    pub fn new(uid: Uid, principal: &str, permission: &str) -> Self {
        Self {
            db_id: None,
            uid: uid.0,
            principal: principal.to_string(),
            permission: permission.to_string(),
        }
    }
}
