use std::{fmt, path::PathBuf, sync::Arc};

use parking_lot::RwLock;
use tracing::debug;

use crate::{
    fs::state_dir,
    repository::{
        collaborators::{
            Catalog, DbCatalog, DbLinkStore, DbPermissionStore, FsUninstaller, LinkStore,
            PermissionStore, Uninstaller,
        },
        config::{Cfg, CoreConfig},
        db::Db,
        entities::Result,
        lifecycle::{
            CatalogRegistration, DefaultMetadata, Hook, PermissionCleanup, Registry,
            ThumbnailProvisioning, UninstallCleanup,
        },
        locks::SaveLocks,
    },
};

mod db;
mod locks;

pub mod collaborators;
pub mod config;
pub mod entities;
pub mod lifecycle;

pub use entities::{App, AppInstance, AppInstanceDraft, AppTag, NewApp};

const DB_FILE_NAME: &str = "data.db";

/// Everything an entity handle needs to reach its data and run its hooks.
#[derive(Clone)]
pub(crate) struct Ctx {
    pub db: Db,
    pub cfg: Cfg,
    pub hooks: Arc<Registry>,
    pub locks: Arc<SaveLocks>,
    pub links: Arc<dyn LinkStore>,
    pub permissions: Arc<dyn PermissionStore>,
}

impl fmt::Debug for Ctx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ctx")
            .field("db", &self.db)
            .field("cfg", &self.cfg)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

/// Central access point for all persistent data.
///
/// The [`Repository`] owns the database, the configuration file, the
/// collaborator services and the lifecycle hooks. It provides a single,
/// consistent interface for installing apps and managing their tags and
/// instances.
#[derive(Clone, Debug)]
pub struct Repository {
    pub(crate) ctx: Ctx,
}

impl Repository {
    /// Open the repository at its default location with the default collaborators.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> RepositoryBuilder {
        RepositoryBuilder::default()
    }

    // Apps

    pub fn install_app(&self, new_app: NewApp) -> Result<App> {
        App::add(&self.ctx, new_app)
    }

    /// Run the uninstall cleanup, then remove `app`. The record is kept if the cleanup fails.
    pub fn uninstall_app(&self, app: App) -> Result<()> {
        app.remove()
    }

    pub fn apps(&self) -> Result<Vec<App>> {
        App::list(&self.ctx)
    }

    pub fn app(&self, name: &str) -> Result<Option<App>> {
        App::find(&self.ctx, name)
    }

    // Tags

    pub fn add_tag(&self, name: Option<&str>) -> Result<AppTag> {
        AppTag::add(&self.ctx, name)
    }

    pub fn tags(&self) -> Result<Vec<AppTag>> {
        AppTag::list(&self.ctx)
    }

    pub fn tag(&self, name: &str) -> Result<Option<AppTag>> {
        AppTag::find(&self.ctx, name)
    }

    pub fn remove_tag(&self, tag: AppTag) -> Result<()> {
        tag.remove()
    }

    // Instances

    /// Save `draft`, inserting a new instance if it doesn't have one yet.
    pub fn save_instance(&self, draft: AppInstanceDraft) -> Result<AppInstance> {
        AppInstance::save(&self.ctx, draft, None)
    }

    /// Save only `update_fields` of an existing instance. A new instance is always written whole.
    pub fn save_instance_fields(
        &self,
        draft: AppInstanceDraft,
        update_fields: &[&str],
    ) -> Result<AppInstance> {
        let update_fields = update_fields.iter().map(|f| f.to_string()).collect();
        AppInstance::save(&self.ctx, draft, Some(update_fields))
    }

    pub fn instances(&self) -> Result<Vec<AppInstance>> {
        AppInstance::list(&self.ctx)
    }

    pub fn instance(&self, id: u64) -> Result<Option<AppInstance>> {
        AppInstance::find(&self.ctx, id)
    }

    /// Run the pre-delete hooks, then remove `instance` with its links.
    pub fn remove_instance(&self, instance: AppInstance) -> Result<()> {
        instance.remove()
    }

    // Services

    pub fn links(&self) -> &Arc<dyn LinkStore> {
        &self.ctx.links
    }

    pub fn permissions(&self) -> &Arc<dyn PermissionStore> {
        &self.ctx.permissions
    }

    pub fn config(&self) -> Cfg {
        self.ctx.cfg.clone()
    }

    #[cfg(test)]
    /// Return a mock version of a [`Repository`] with an in-memory database and a temporary
    /// apps directory.
    pub(crate) fn mock() -> Self {
        Self::builder().build_mock()
    }

    #[cfg(test)]
    /// Install an app called `name` with a logo.
    pub(crate) fn mock_app(&self, name: &str) -> App {
        self.install_app(NewApp {
            app_img_url: "http://x/logo.png".into(),
            ..NewApp::named(name)
        })
        .unwrap()
    }
}

#[derive(Debug, Default)]
enum Storage {
    #[default]
    Default,
    File(PathBuf),
    Memory,
}

/// Configures a [`Repository`]: where its data lives, which collaborators it talks to and any
/// extra lifecycle hooks.
#[derive(Default)]
pub struct RepositoryBuilder {
    storage: Storage,
    config: Option<CoreConfig>,
    links: Option<Arc<dyn LinkStore>>,
    permissions: Option<Arc<dyn PermissionStore>>,
    uninstaller: Option<Arc<dyn Uninstaller>>,
    catalog: Option<Arc<dyn Catalog>>,
    instance_hooks: Vec<Arc<dyn Hook<AppInstance>>>,
    app_hooks: Vec<Arc<dyn Hook<App>>>,
}

impl RepositoryBuilder {
    /// Keep the database in memory only.
    pub fn in_memory(mut self) -> Self {
        self.storage = Storage::Memory;
        self
    }

    /// Store the database at `path` instead of the default state directory.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage = Storage::File(path.into());
        self
    }

    /// Use `config` instead of loading the configuration file.
    pub fn config(mut self, config: CoreConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn links(mut self, links: Arc<dyn LinkStore>) -> Self {
        self.links = Some(links);
        self
    }

    pub fn permissions(mut self, permissions: Arc<dyn PermissionStore>) -> Self {
        self.permissions = Some(permissions);
        self
    }

    pub fn uninstaller(mut self, uninstaller: Arc<dyn Uninstaller>) -> Self {
        self.uninstaller = Some(uninstaller);
        self
    }

    pub fn catalog(mut self, catalog: Arc<dyn Catalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Append an app instance hook. It runs after the built-in ones.
    pub fn instance_hook(mut self, hook: Arc<dyn Hook<AppInstance>>) -> Self {
        self.instance_hooks.push(hook);
        self
    }

    /// Append an app hook. It runs after the built-in ones.
    pub fn app_hook(mut self, hook: Arc<dyn Hook<App>>) -> Self {
        self.app_hooks.push(hook);
        self
    }

    pub fn build(self) -> Result<Repository> {
        let db = match &self.storage {
            Storage::Default => Db::open(&state_dir()?.join(DB_FILE_NAME))?,
            Storage::File(path) => Db::open(path)?,
            Storage::Memory => Db::in_memory()?,
        };
        let config = match self.config {
            Some(config) => config,
            None => CoreConfig::load()?,
        };
        let cfg: Cfg = Arc::new(RwLock::new(config));

        let links: Arc<dyn LinkStore> = match self.links {
            Some(links) => links,
            None => Arc::new(DbLinkStore::new(db.clone())),
        };
        let permissions: Arc<dyn PermissionStore> = match self.permissions {
            Some(permissions) => permissions,
            None => Arc::new(DbPermissionStore::new(db.clone())),
        };
        let uninstaller: Arc<dyn Uninstaller> = match self.uninstaller {
            Some(uninstaller) => uninstaller,
            None => Arc::new(FsUninstaller::new(cfg.clone())),
        };
        let catalog: Arc<dyn Catalog> = match self.catalog {
            Some(catalog) => catalog,
            None => Arc::new(DbCatalog::new(db.clone())),
        };

        let mut registry = Registry::default();
        registry.instances.register(Arc::new(DefaultMetadata));
        registry
            .instances
            .register(Arc::new(ThumbnailProvisioning::new(links.clone())));
        registry
            .instances
            .register(Arc::new(CatalogRegistration::new(catalog)));
        registry
            .instances
            .register(Arc::new(PermissionCleanup::new(permissions.clone())));
        for hook in self.instance_hooks {
            registry.instances.register(hook);
        }

        registry
            .apps
            .register(Arc::new(UninstallCleanup::new(uninstaller)));
        for hook in self.app_hooks {
            registry.apps.register(hook);
        }

        debug!(
            instance_hooks = ?registry.instances,
            app_hooks = ?registry.apps,
            "Built repository"
        );

        Ok(Repository {
            ctx: Ctx {
                db,
                cfg,
                hooks: Arc::new(registry),
                locks: Arc::new(SaveLocks::default()),
                links,
                permissions,
            },
        })
    }

    #[cfg(test)]
    /// Build with an in-memory database and an apps directory under a fresh temporary directory.
    pub(crate) fn build_mock(mut self) -> Repository {
        self.storage = Storage::Memory;
        if self.config.is_none() {
            let dir = tempfile::tempdir().unwrap().keep();
            self.config = Some(CoreConfig::with_apps_dir(dir.join("apps")));
        }

        self.build().unwrap()
    }
}

impl fmt::Debug for RepositoryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryBuilder")
            .field("storage", &self.storage)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use crate::repository::collaborators::CatalogResource;

    use super::*;

    #[test]
    fn test_file_storage_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        let config = CoreConfig::with_apps_dir(dir.path().join("apps"));

        {
            let repo = Repository::builder()
                .path(&path)
                .config(config.clone())
                .build()
                .unwrap();
            let app = repo.mock_app("mapviewer");
            repo.save_instance(app.new_instance()).unwrap();
        }

        let repo = Repository::builder()
            .path(&path)
            .config(config)
            .build()
            .unwrap();

        assert_eq!(repo.apps().unwrap().len(), 1);
        assert_eq!(repo.instances().unwrap().len(), 1);
    }

    #[test]
    fn test_instance_lookup() {
        let repo = Repository::mock();
        let app = repo.mock_app("mapviewer");
        let instance = repo.save_instance(app.new_instance()).unwrap();

        assert_eq!(repo.instance(instance.id()).unwrap(), Some(instance.clone()));
        assert_eq!(repo.instance(instance.id() + 100).unwrap(), None);
    }

    #[test]
    fn test_save_instance_fields() {
        let repo = Repository::mock();
        let app = repo.mock_app("mapviewer");
        let instance = repo.save_instance(app.new_instance()).unwrap();

        let mut draft = instance.edit().unwrap();
        draft.title = Some("Flood Map".into());
        draft.owner = Some("admin".into());
        repo.save_instance_fields(draft, &["title"]).unwrap();

        assert_eq!(instance.title().unwrap().as_deref(), Some("Flood Map"));
        assert_eq!(instance.owner().unwrap(), None);
    }
}
