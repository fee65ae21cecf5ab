use agdb::{DbElement, DbId};

use crate::repository::entities::Uid;

#[derive(Debug, Clone, DbElement, PartialEq, PartialOrd)]
pub(crate) struct AppTagModel {
    db_id: Option<DbId>,
    uid: u64,
    /// Empty when the tag has no name
    pub(crate) name: String,
}

impl AppTagModel {
    pub fn new(uid: Uid, name: Option<&str>) -> Self {
        Self {
            db_id: None,
            uid: uid.0,
            name: name.unwrap_or_default().to_string(),
        }
    }
}
