//! Lifecycle hooks run around entity saves and deletes.
//!
//! Every entity type has its own ordered [`Hooks`] registry, so a hook only
//! ever sees the entity type it was registered for. Within one save the
//! pre-save hooks run before the write and the post-save hooks after it;
//! within one delete the pre-delete hooks run before the removal. A failing
//! hook aborts the operation and nothing after it runs.

use std::{fmt, sync::Arc};

use tracing::debug;

use crate::repository::entities::{App, AppInstance, AppInstanceDraft, Error, NewApp, Result};

mod defaults;
mod permissions;
mod registration;
mod thumbnail;
mod uninstall;

pub use defaults::{DefaultMetadata, NO_ABSTRACT, NO_TITLE};
pub use permissions::PermissionCleanup;
pub use registration::CatalogRegistration;
pub use thumbnail::ThumbnailProvisioning;
pub use uninstall::UninstallCleanup;

/// An entity with a save/delete lifecycle.
pub trait Lifecycle {
    /// The unsaved state pre-save hooks operate on.
    type Draft;
}

impl Lifecycle for AppInstance {
    type Draft = AppInstanceDraft;
}

impl Lifecycle for App {
    type Draft = NewApp;
}

/// Arguments describing a completed write, handed to post-save hooks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveArgs {
    /// Whether the write inserted a new record
    pub created: bool,
    /// The fields the write was restricted to, if any
    pub update_fields: Option<Vec<String>>,
}

pub trait Hook<E: Lifecycle>: Send + Sync {
    fn name(&self) -> &'static str;

    fn pre_save(&self, _draft: &mut E::Draft) -> Result<()> {
        Ok(())
    }

    fn post_save(&self, _entity: &E, _args: &SaveArgs) -> Result<()> {
        Ok(())
    }

    fn pre_delete(&self, _entity: &E) -> Result<()> {
        Ok(())
    }
}

/// Ordered hooks of one entity type.
pub struct Hooks<E: Lifecycle> {
    hooks: Vec<Arc<dyn Hook<E>>>,
}

impl<E: Lifecycle> Hooks<E> {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Append `hook`. Hooks run in registration order.
    pub fn register(&mut self, hook: Arc<dyn Hook<E>>) {
        self.hooks.push(hook);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.hooks.iter().map(|h| h.name()).collect()
    }

    pub(crate) fn pre_save(&self, draft: &mut E::Draft) -> Result<()> {
        for hook in &self.hooks {
            debug!(hook = hook.name(), "Running pre-save hook");
            hook.pre_save(draft).map_err(|err| failure(hook.name(), err))?;
        }

        Ok(())
    }

    pub(crate) fn post_save(&self, entity: &E, args: &SaveArgs) -> Result<()> {
        for hook in &self.hooks {
            debug!(hook = hook.name(), created = args.created, "Running post-save hook");
            hook.post_save(entity, args).map_err(|err| failure(hook.name(), err))?;
        }

        Ok(())
    }

    pub(crate) fn pre_delete(&self, entity: &E) -> Result<()> {
        for hook in &self.hooks {
            debug!(hook = hook.name(), "Running pre-delete hook");
            hook.pre_delete(entity).map_err(|err| failure(hook.name(), err))?;
        }

        Ok(())
    }
}

impl<E: Lifecycle> Default for Hooks<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Lifecycle> fmt::Debug for Hooks<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Lifecycle errors raised further down (a nested save, an uninstall) keep their identity.
fn failure(hook: &'static str, err: Error) -> Error {
    match err {
        Error::HookFailure { .. } | Error::UninstallCleanup { .. } => err,
        other => Error::HookFailure {
            hook,
            source: Box::new(other),
        },
    }
}

/// The hook registries of every entity type.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    pub apps: Hooks<App>,
    pub instances: Hooks<AppInstance>,
}

#[cfg(test)]
mod test {
    use parking_lot::Mutex;

    use crate::{Repository, repository::entities::AppInstanceDraft};

    use super::*;

    /// Records every call it receives into a shared log.
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail_pre_save: bool,
    }

    impl Hook<AppInstance> for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn pre_save(&self, _draft: &mut AppInstanceDraft) -> Result<()> {
            self.log.lock().push(format!("{}: pre_save", self.name));
            if self.fail_pre_save {
                return Err(Error::EmptyResult);
            }
            Ok(())
        }

        fn post_save(&self, _entity: &AppInstance, args: &SaveArgs) -> Result<()> {
            self.log
                .lock()
                .push(format!("{}: post_save created={}", self.name, args.created));
            Ok(())
        }

        fn pre_delete(&self, _entity: &AppInstance) -> Result<()> {
            self.log.lock().push(format!("{}: pre_delete", self.name));
            Ok(())
        }
    }

    fn recorder(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Arc<Recorder> {
        Arc::new(Recorder {
            name,
            log: log.clone(),
            fail_pre_save: false,
        })
    }

    #[test]
    fn test_default_registration_order() {
        let repo = Repository::mock();

        assert_eq!(
            repo.ctx.hooks.instances.names(),
            vec![
                "default_metadata",
                "thumbnail_provisioning",
                "catalog_registration",
                "permission_cleanup"
            ]
        );
        assert_eq!(repo.ctx.hooks.apps.names(), vec!["uninstall_cleanup"]);
    }

    #[test]
    fn test_hooks_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let repo = Repository::builder()
            .in_memory()
            .instance_hook(recorder("first", &log))
            .instance_hook(recorder("second", &log))
            .build_mock();
        let app = repo.mock_app("mapviewer");

        let mut draft = app.new_instance();
        draft.thumbnail_url = Some("http://x/custom.png".into());
        let instance = repo.save_instance(draft).unwrap();
        repo.remove_instance(instance).unwrap();

        assert_eq!(
            *log.lock(),
            vec![
                "first: pre_save",
                "second: pre_save",
                "first: post_save created=true",
                "second: post_save created=true",
                "first: pre_delete",
                "second: pre_delete",
            ]
        );
    }

    #[test]
    fn test_pre_save_failure_writes_nothing() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let repo = Repository::builder()
            .in_memory()
            .instance_hook(Arc::new(Recorder {
                name: "broken",
                log: log.clone(),
                fail_pre_save: true,
            }))
            .instance_hook(recorder("after", &log))
            .build_mock();
        let app = repo.mock_app("mapviewer");

        let err = repo.save_instance(app.new_instance()).unwrap_err();

        assert!(matches!(err, Error::HookFailure { hook: "broken", .. }));
        assert!(repo.instances().unwrap().is_empty());
        assert_eq!(*log.lock(), vec!["broken: pre_save"]);
    }
}
