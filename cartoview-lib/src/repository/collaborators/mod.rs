//! Services the app manager relies on but does not own.
//!
//! Each concern sits behind a trait so a host platform can plug in its own
//! storage. The default implementations keep everything in the repository's
//! database and on the local filesystem.

use crate::repository::entities::{App, EntityId, Result};
use crate::repository::lifecycle::SaveArgs;

mod catalog;
mod links;
mod permissions;
mod uninstall;

pub use catalog::DbCatalog;
pub use links::DbLinkStore;
pub use permissions::DbPermissionStore;
pub use uninstall::FsUninstaller;

/// Identity of a catalog resource. Permissions and links are keyed by it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceIdentity {
    pub(crate) id: EntityId,
}

impl ResourceIdentity {
    pub fn id(&self) -> u64 {
        self.id.uid().0
    }
}

/// The capabilities every catalog resource offers. Writes go through the owning entity's save
/// operation so its lifecycle hooks run.
pub trait CatalogResource {
    fn title(&self) -> Result<Option<String>>;

    fn abstract_(&self) -> Result<Option<String>>;

    fn thumbnail_url(&self) -> Result<Option<String>>;

    fn has_thumbnail(&self) -> Result<bool> {
        Ok(self.thumbnail_url()?.is_some())
    }

    fn self_resource(&self) -> Result<ResourceIdentity>;
}

/// A link to be attached to a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLink {
    pub name: String,
    pub url: String,
    pub extension: String,
    pub mime: String,
    pub link_type: String,
}

impl NewLink {
    /// The thumbnail link of a resource whose image lives at `url`.
    pub fn thumbnail(url: &str) -> Self {
        Self {
            name: "Thumbnail".into(),
            url: url.into(),
            extension: "png".into(),
            mime: "image/png".into(),
            link_type: "image".into(),
        }
    }
}

/// A link attached to a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub id: u64,
    pub name: String,
    pub url: String,
    pub extension: String,
    pub mime: String,
    pub link_type: String,
}

/// A permission granted on a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub principal: String,
    pub permission: String,
}

pub trait LinkStore: Send + Sync {
    /// Return the link of `resource` pointing at `link.url`, creating it from `link` if there is
    /// none. The flag tells whether a new link was created.
    fn get_or_create_link(
        &self,
        resource: &ResourceIdentity,
        link: NewLink,
    ) -> Result<(Link, bool)>;

    fn links(&self, resource: &ResourceIdentity) -> Result<Vec<Link>>;

    /// Drop every link of `resource`. Called when the resource itself is removed.
    fn remove_links(&self, resource: &ResourceIdentity) -> Result<()>;
}

pub trait PermissionStore: Send + Sync {
    fn grant(&self, resource: &ResourceIdentity, principal: &str, permission: &str) -> Result<()>;

    fn permissions(&self, resource: &ResourceIdentity) -> Result<Vec<Grant>>;

    /// Strip every grant on `resource`.
    fn remove_object_permissions(&self, resource: &ResourceIdentity) -> Result<()>;
}

pub trait Uninstaller: Send + Sync {
    /// Remove everything installing `app` left behind. The app record is removed afterwards, and
    /// only if this succeeds.
    fn delete_installed_app(&self, app: &App) -> Result<()>;
}

pub trait Catalog: Send + Sync {
    /// Generic post-save registration of a catalog resource.
    fn resource_post_save(&self, resource: &ResourceIdentity, args: &SaveArgs) -> Result<()>;
}
