use agdb::{DbElement, DbId};

use crate::repository::entities::{NewApp, Uid};

/// Optional text fields are stored as empty strings when unset.
#[derive(Debug, Clone, DbElement, PartialEq, PartialOrd)]
pub(crate) struct AppModel {
    db_id: Option<DbId>,
    pub(crate) uid: u64,
    /// Unique package name, also the name of the install directory
    pub(crate) name: String,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) short_description: String,
    pub(crate) app_url: String,
    pub(crate) author: String,
    pub(crate) author_website: String,
    pub(crate) license: String,
    /// Milliseconds since the Unix epoch
    pub(crate) date_installed: i64,
    pub(crate) installed_by: String,
    pub(crate) single_instance: bool,
    pub(crate) order: i64,
    pub(crate) owner_url: String,
    pub(crate) help_url: String,
    pub(crate) is_suspended: bool,
    pub(crate) app_img_url: String,
    pub(crate) in_menu: bool,
    pub(crate) admin_only: bool,
    pub(crate) rating: i64,
    pub(crate) contact_name: String,
    pub(crate) contact_email: String,
}

impl AppModel {
    pub fn new(uid: Uid, app: &NewApp, date_installed: i64) -> Self {
        let text = |value: &Option<String>| value.clone().unwrap_or_default();

        Self {
            db_id: None,
            uid: uid.0,
            name: app.name.clone(),
            title: text(&app.title),
            description: text(&app.description),
            short_description: text(&app.short_description),
            app_url: text(&app.app_url),
            author: text(&app.author),
            author_website: text(&app.author_website),
            license: text(&app.license),
            date_installed,
            installed_by: text(&app.installed_by),
            single_instance: app.single_instance,
            order: app.order,
            owner_url: text(&app.owner_url),
            help_url: text(&app.help_url),
            is_suspended: app.is_suspended,
            app_img_url: app.app_img_url.clone(),
            in_menu: app.in_menu,
            admin_only: app.admin_only,
            rating: app.rating,
            contact_name: text(&app.contact_name),
            contact_email: text(&app.contact_email),
        }
    }
}
