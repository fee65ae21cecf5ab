use agdb::{DbElement, DbId};

use crate::repository::{collaborators::NewLink, entities::Uid};

#[derive(Debug, Clone, DbElement, PartialEq, PartialOrd)]
pub(crate) struct LinkModel {
    db_id: Option<DbId>,
    pub(crate) uid: u64,
    pub(crate) name: String,
    pub(crate) url: String,
    pub(crate) extension: String,
    pub(crate) mime: String,
    pub(crate) link_type: String,
}

impl LinkModel {
    pub fn new(uid: Uid, link: &NewLink) -> Self {
        Self {
            db_id: None,
            uid: uid.0,
            name: link.name.clone(),
            url: link.url.clone(),
            extension: link.extension.clone(),
            mime: link.mime.clone(),
            link_type: link.link_type.clone(),
        }
    }
}
