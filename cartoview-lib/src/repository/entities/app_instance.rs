use std::fmt::{self, Display, Formatter};

use agdb::{DbId, DbKeyValue, DbValue, QueryBuilder};
use tracing::debug;

use crate::repository::{
    Ctx,
    collaborators::{CatalogResource, ResourceIdentity},
    db::{
        inserted_id,
        models::{AppInstanceModel, AppModel},
    },
    entities::{EntityId, Result, Uid, app::App, get_field, non_empty},
    lifecycle::SaveArgs,
};

/// Unsaved state of an [`AppInstance`].
///
/// A draft either describes a new instance ([`App::new_instance`]) or the
/// pending changes to an existing one ([`AppInstance::edit`]). Saving it runs
/// the instance lifecycle hooks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppInstanceDraft {
    pub(crate) id: Option<EntityId>,
    pub(crate) app: Option<App>,
    pub title: Option<String>,
    pub abstract_: Option<String>,
    pub thumbnail_url: Option<String>,
    pub owner: Option<String>,
}

impl AppInstanceDraft {
    /// A new instance of `app`. Instances without an app only exist in legacy data.
    pub fn new(app: Option<&App>) -> Self {
        Self {
            app: app.cloned(),
            ..Default::default()
        }
    }

    pub fn app(&self) -> Option<&App> {
        self.app.as_ref()
    }
}

/// Represents an app instance entity in the Cartoview system.
///
/// An app instance is a catalog resource created from one of the installed
/// apps. Always reflects the current database state.
#[derive(Debug, Clone)]
pub struct AppInstance {
    pub(crate) id: EntityId,
    pub(crate) ctx: Ctx,
}

impl AppInstance {
    pub(crate) fn load(db_id: DbId, ctx: Ctx) -> Result<Self> {
        let id = EntityId::load(&ctx.db, db_id)?;
        Ok(Self { id, ctx })
    }

    pub fn id(&self) -> u64 {
        self.id.uid().0
    }

    pub fn owner(&self) -> Result<Option<String>> {
        Ok(non_empty(self.get_field("owner")?))
    }

    /// Returns the [`App`] this instance was created from.
    pub fn app(&self) -> Result<Option<App>> {
        let db_id = self.id.db_id(&self.ctx.db)?;
        let parent = self
            .ctx
            .db
            .read()
            .exec(
                QueryBuilder::select()
                    .elements::<AppModel>()
                    .search()
                    .from("apps")
                    .to(db_id)
                    .where_()
                    .element::<AppModel>()
                    .query(),
            )?
            .elements
            .pop();

        parent
            .map(|e| App::load(e.id, self.ctx.clone()))
            .transpose()
    }

    pub fn absolute_url(&self) -> String {
        format!("appinstance_detail/{}", self.id())
    }

    /// The title followed by the id, or just the id for an untitled instance.
    pub fn name_long(&self) -> Result<String> {
        Ok(match self.title()? {
            Some(title) => format!("{title} ({})", self.id()),
            None => self.id().to_string(),
        })
    }

    /// A draft holding the current state of this instance.
    pub fn edit(&self) -> Result<AppInstanceDraft> {
        Ok(AppInstanceDraft {
            id: Some(self.id),
            app: self.app()?,
            title: self.title()?,
            abstract_: self.abstract_()?,
            thumbnail_url: self.thumbnail_url()?,
            owner: self.owner()?,
        })
    }

    pub fn set_title(&self, title: &str) -> Result<()> {
        self.update("title", |d| d.title = Some(title.into()))
    }

    pub fn set_abstract(&self, abstract_: &str) -> Result<()> {
        self.update("abstract_", |d| d.abstract_ = Some(abstract_.into()))
    }

    pub fn set_thumbnail_url(&self, url: Option<&str>) -> Result<()> {
        self.update("thumbnail_url", |d| d.thumbnail_url = url.map(str::to_string))
    }

    pub fn set_owner(&self, owner: Option<&str>) -> Result<()> {
        self.update("owner", |d| d.owner = owner.map(str::to_string))
    }

    /// Save a change of one field.
    fn update(&self, field: &str, change: impl FnOnce(&mut AppInstanceDraft)) -> Result<()> {
        let mut draft = self.edit()?;
        change(&mut draft);
        Self::save(&self.ctx, draft, Some(vec![field.to_string()]))?;

        Ok(())
    }

    /// Run the pre-save hooks on `draft`, write it, then run the post-save hooks.
    ///
    /// Writing an existing instance happens under its save lock, which is held until the
    /// post-save hooks are done. The lock is reentrant so hooks may save the instance again.
    pub(crate) fn save(
        ctx: &Ctx,
        mut draft: AppInstanceDraft,
        update_fields: Option<Vec<String>>,
    ) -> Result<Self> {
        let Some(id) = draft.id else {
            return Self::create(ctx, draft);
        };

        let lock = ctx.locks.get(id.uid());
        let _guard = lock.lock();

        ctx.hooks.instances.pre_save(&mut draft)?;

        let instance = Self {
            id,
            ctx: ctx.clone(),
        };
        instance.write(&draft, update_fields.as_deref())?;
        debug!("Saved app instance {}", instance.id());

        ctx.hooks.instances.post_save(
            &instance,
            &SaveArgs {
                created: false,
                update_fields,
            },
        )?;

        Ok(instance)
    }

    fn create(ctx: &Ctx, mut draft: AppInstanceDraft) -> Result<Self> {
        ctx.hooks.instances.pre_save(&mut draft)?;

        let instance = Self::insert(ctx, &draft)?;
        debug!("Created new app instance {}", instance.id());

        let lock = ctx.locks.get(instance.id.uid());
        let _guard = lock.lock();

        ctx.hooks.instances.post_save(
            &instance,
            &SaveArgs {
                created: true,
                update_fields: None,
            },
        )?;

        Ok(instance)
    }

    fn insert(ctx: &Ctx, draft: &AppInstanceDraft) -> Result<Self> {
        let model = AppInstanceModel::new(Uid::new(&ctx.db)?, draft);
        let app_id = draft
            .app
            .as_ref()
            .map(|app| app.id.db_id(&ctx.db))
            .transpose()?;

        let db_id = ctx.db.write().transaction_mut(|t| -> Result<DbId> {
            let instance_id =
                inserted_id(t.exec_mut(QueryBuilder::insert().element(model).query())?)?;

            t.exec_mut(
                QueryBuilder::insert()
                    .edges()
                    .from("app_instances")
                    .to(instance_id)
                    .query(),
            )?;

            // Link the instance to the app it was created from
            if let Some(app_id) = app_id {
                t.exec_mut(
                    QueryBuilder::insert()
                        .edges()
                        .from(app_id)
                        .to(instance_id)
                        .query(),
                )?;
            }

            Ok(instance_id)
        })?;

        Self::load(db_id, ctx.clone())
    }

    /// Write the fields of `draft`, restricted to `fields` if given.
    fn write(&self, draft: &AppInstanceDraft, fields: Option<&[String]>) -> Result<()> {
        let db_id = self.id.db_id(&self.ctx.db)?;
        let values: Vec<DbKeyValue> = [
            ("title", &draft.title),
            ("abstract_", &draft.abstract_),
            ("thumbnail_url", &draft.thumbnail_url),
            ("owner", &draft.owner),
        ]
        .into_iter()
        .filter(|(key, _)| fields.is_none_or(|f| f.iter().any(|field| field.as_str() == *key)))
        .map(|(key, value)| (key, value.clone().unwrap_or_default()).into())
        .collect();

        self.ctx.db.write().transaction_mut(|t| -> Result<()> {
            for value in values {
                t.exec_mut(QueryBuilder::insert().values([[value]]).ids(db_id).query())?;
            }

            Ok(())
        })
    }

    /// Run the pre-delete hooks, then remove this instance together with its links.
    pub(crate) fn remove(self) -> Result<()> {
        let uid = self.id.uid();
        let lock = self.ctx.locks.get(uid);

        {
            let _guard = lock.lock();

            // A stale handle fails before any hook sees it
            let db_id = self.id.db_id(&self.ctx.db)?;

            self.ctx.hooks.instances.pre_delete(&self)?;

            self.ctx.links.remove_links(&self.self_resource()?)?;

            self.ctx
                .db
                .write()
                .exec_mut(QueryBuilder::remove().ids(db_id).query())?;
        }

        self.ctx.locks.release(uid);
        debug!("Removed app instance {}", uid.0);

        Ok(())
    }

    pub(crate) fn list(ctx: &Ctx) -> Result<Vec<AppInstance>> {
        ctx.db
            .read()
            .exec(
                QueryBuilder::select()
                    .elements::<AppInstanceModel>()
                    .search()
                    .from("app_instances")
                    .where_()
                    .neighbor()
                    .query(),
            )?
            .elements
            .iter()
            .map(|e| AppInstance::load(e.id, ctx.clone()))
            .collect()
    }

    pub(crate) fn find(ctx: &Ctx, id: u64) -> Result<Option<AppInstance>> {
        Ok(Self::list(ctx)?.into_iter().find(|i| i.id() == id))
    }

    fn get_field<T>(&self, field: &str) -> Result<T>
    where
        T: TryFrom<DbValue>,
    {
        get_field(&self.ctx.db, self.id, field)
    }
}

impl CatalogResource for AppInstance {
    fn title(&self) -> Result<Option<String>> {
        Ok(non_empty(self.get_field("title")?))
    }

    fn abstract_(&self) -> Result<Option<String>> {
        Ok(non_empty(self.get_field("abstract_")?))
    }

    fn thumbnail_url(&self) -> Result<Option<String>> {
        Ok(non_empty(self.get_field("thumbnail_url")?))
    }

    fn self_resource(&self) -> Result<ResourceIdentity> {
        // Fails for a removed instance
        self.id.db_id(&self.ctx.db)?;

        Ok(ResourceIdentity { id: self.id })
    }
}

impl Display for AppInstance {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.name_long()
                .unwrap_or_else(|_| "<removed app instance>".into())
        )
    }
}

impl PartialEq for AppInstance {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

#[cfg(test)]
mod test {
    use std::{
        sync::{Arc, mpsc},
        thread,
        time::Duration,
    };

    use parking_lot::Mutex;

    use crate::{
        Error, Repository,
        repository::{
            collaborators::{Grant, PermissionStore},
            lifecycle::{NO_ABSTRACT, NO_TITLE},
        },
    };

    use super::*;

    #[derive(Default)]
    struct CountingPermissions {
        removals: Mutex<Vec<u64>>,
        fail: bool,
    }

    impl PermissionStore for CountingPermissions {
        fn grant(&self, _: &ResourceIdentity, _: &str, _: &str) -> Result<()> {
            Ok(())
        }

        fn permissions(&self, _: &ResourceIdentity) -> Result<Vec<Grant>> {
            Ok(Vec::new())
        }

        fn remove_object_permissions(&self, resource: &ResourceIdentity) -> Result<()> {
            if self.fail {
                return Err(Error::EmptyResult);
            }
            self.removals.lock().push(resource.id());
            Ok(())
        }
    }

    #[test]
    fn test_create_fills_defaults() {
        let repo = Repository::mock();
        let app = repo.mock_app("mapviewer");

        let mut draft = app.new_instance();
        draft.title = Some(String::new());
        draft.abstract_ = Some(String::new());
        let instance = repo.save_instance(draft).unwrap();

        assert_eq!(instance.title().unwrap().as_deref(), Some(NO_TITLE));
        assert_eq!(instance.abstract_().unwrap().as_deref(), Some(NO_ABSTRACT));
        assert_eq!(
            instance.thumbnail_url().unwrap().as_deref(),
            Some("http://x/logo.png")
        );
        assert_eq!(instance.app().unwrap(), Some(app));
    }

    #[test]
    fn test_update_keeps_defaults() {
        let repo = Repository::mock();
        let app = repo.mock_app("mapviewer");
        let instance = repo.save_instance(app.new_instance()).unwrap();

        repo.save_instance(instance.edit().unwrap()).unwrap();

        assert_eq!(instance.title().unwrap().as_deref(), Some(NO_TITLE));
        assert_eq!(instance.abstract_().unwrap().as_deref(), Some(NO_ABSTRACT));
    }

    #[test]
    fn test_blanking_a_field_restores_default() {
        let repo = Repository::mock();
        let app = repo.mock_app("mapviewer");
        let instance = repo.save_instance(app.new_instance()).unwrap();

        instance.set_title("Flood Map").unwrap();
        assert_eq!(instance.title().unwrap().as_deref(), Some("Flood Map"));

        instance.set_title("").unwrap();
        assert_eq!(instance.title().unwrap().as_deref(), Some(NO_TITLE));
    }

    #[test]
    fn test_name_long() {
        let repo = Repository::mock();
        let app = repo.mock_app("mapviewer");
        let instance = repo.save_instance(app.new_instance()).unwrap();
        let id = instance.id();

        instance.set_title("Flood Map").unwrap();
        assert_eq!(instance.name_long().unwrap(), format!("Flood Map ({id})"));

        // An untitled instance can only exist in the database if it bypassed the hooks
        crate::repository::entities::set_field(&repo.ctx.db, instance.id, "title", "").unwrap();
        assert_eq!(instance.name_long().unwrap(), id.to_string());
    }

    #[test]
    fn test_absolute_url() {
        let repo = Repository::mock();
        let app = repo.mock_app("mapviewer");
        let instance = repo.save_instance(app.new_instance()).unwrap();

        assert_eq!(
            instance.absolute_url(),
            format!("appinstance_detail/{}", instance.id())
        );
    }

    #[test]
    fn test_remove_strips_permissions_first() {
        let permissions = Arc::new(CountingPermissions::default());
        let repo = Repository::builder()
            .permissions(permissions.clone())
            .build_mock();
        let app = repo.mock_app("mapviewer");
        let instance = repo.save_instance(app.new_instance()).unwrap();
        let id = instance.id();
        let stale = instance.clone();

        repo.remove_instance(instance).unwrap();

        assert_eq!(*permissions.removals.lock(), vec![id]);
        assert!(repo.instances().unwrap().is_empty());
        assert!(matches!(stale.title(), Err(Error::RemovedEntity)));
    }

    #[test]
    fn test_remove_aborts_when_cleanup_fails() {
        let repo = Repository::builder()
            .permissions(Arc::new(CountingPermissions {
                fail: true,
                ..Default::default()
            }))
            .build_mock();
        let app = repo.mock_app("mapviewer");
        let instance = repo.save_instance(app.new_instance()).unwrap();

        let err = repo.remove_instance(instance).unwrap_err();

        assert!(matches!(
            err,
            Error::HookFailure {
                hook: "permission_cleanup",
                ..
            }
        ));
        assert_eq!(repo.instances().unwrap().len(), 1);
    }

    #[test]
    fn test_remove_drops_links() {
        let repo = Repository::mock();
        let app = repo.mock_app("mapviewer");
        let first = repo.save_instance(app.new_instance()).unwrap();
        let second = repo.save_instance(app.new_instance()).unwrap();
        let second_resource = second.self_resource().unwrap();

        repo.remove_instance(first).unwrap();

        assert_eq!(repo.links().links(&second_resource).unwrap().len(), 1);
        assert_eq!(app.instances().unwrap(), vec![second]);
    }

    #[test]
    fn test_remove_stale_handle() {
        let repo = Repository::mock();
        let app = repo.mock_app("mapviewer");
        let instance = repo.save_instance(app.new_instance()).unwrap();
        let stale = instance.clone();
        repo.remove_instance(instance).unwrap();

        let err = repo.remove_instance(stale).unwrap_err();

        assert!(matches!(err, Error::RemovedEntity));
    }

    #[test]
    fn test_setters() {
        let repo = Repository::mock();
        let app = repo.mock_app("mapviewer");
        let instance = repo.save_instance(app.new_instance()).unwrap();

        instance.set_abstract("Flooded areas after the storm").unwrap();
        instance.set_owner(Some("admin")).unwrap();

        assert_eq!(
            instance.abstract_().unwrap().as_deref(),
            Some("Flooded areas after the storm")
        );
        assert_eq!(instance.owner().unwrap().as_deref(), Some("admin"));

        instance.set_owner(None).unwrap();
        assert_eq!(instance.owner().unwrap(), None);
    }

    #[test]
    fn test_save_waits_for_instance_lock() {
        let repo = Repository::mock();
        let app = repo.mock_app("mapviewer");
        let instance = repo.save_instance(app.new_instance()).unwrap();
        let lock = repo.ctx.locks.get(instance.id.uid());
        let guard = lock.lock();

        let (tx, rx) = mpsc::channel();
        let handle = {
            let repo = repo.clone();
            let instance = instance.clone();
            thread::spawn(move || {
                let mut draft = instance.edit().unwrap();
                draft.title = Some("Flood Map".into());
                repo.save_instance(draft).unwrap();
                tx.send(()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(instance.title().unwrap().as_deref(), Some(NO_TITLE));

        drop(guard);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        handle.join().unwrap();
        assert_eq!(instance.title().unwrap().as_deref(), Some("Flood Map"));
    }

    #[test]
    fn test_remove_waits_for_instance_lock() {
        let repo = Repository::mock();
        let app = repo.mock_app("mapviewer");
        let instance = repo.save_instance(app.new_instance()).unwrap();
        let lock = repo.ctx.locks.get(instance.id.uid());
        let guard = lock.lock();

        let (tx, rx) = mpsc::channel();
        let handle = {
            let repo = repo.clone();
            let instance = instance.clone();
            thread::spawn(move || {
                repo.remove_instance(instance).unwrap();
                tx.send(()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(repo.instances().unwrap().len(), 1);

        drop(guard);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        handle.join().unwrap();
        assert!(repo.instances().unwrap().is_empty());
    }
}
