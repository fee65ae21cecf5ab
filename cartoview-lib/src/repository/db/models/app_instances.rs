use agdb::{DbElement, DbId};

use crate::repository::entities::{AppInstanceDraft, Uid};

/// Optional text fields are stored as empty strings when unset.
#[derive(Debug, Clone, DbElement, PartialEq, PartialOrd)]
pub(crate) struct AppInstanceModel {
    db_id: Option<DbId>,
    uid: u64,
    pub(crate) title: String,
    pub(crate) abstract_: String,
    pub(crate) thumbnail_url: String,
    /// Name of the user owning the resource
    pub(crate) owner: String,
}

impl AppInstanceModel {
    pub fn new(uid: Uid, draft: &AppInstanceDraft) -> Self {
        Self {
            db_id: None,
            uid: uid.0,
            title: draft.title.clone().unwrap_or_default(),
            abstract_: draft.abstract_.clone().unwrap_or_default(),
            thumbnail_url: draft.thumbnail_url.clone().unwrap_or_default(),
            owner: draft.owner.clone().unwrap_or_default(),
        }
    }
}
