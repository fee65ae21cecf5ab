use std::sync::Arc;

use tracing::{debug, warn};

use crate::repository::{
    collaborators::{CatalogResource, LinkStore, NewLink},
    entities::{AppInstance, Error, Result},
    lifecycle::{Hook, SaveArgs},
};

/// Gives an instance without a thumbnail the logo of its app.
///
/// The thumbnail link is looked up or created, then the instance is saved again with its
/// thumbnail URL set. That nested save finds a thumbnail and leaves it alone, which is what
/// ends the recursion.
pub struct ThumbnailProvisioning {
    links: Arc<dyn LinkStore>,
}

impl ThumbnailProvisioning {
    pub fn new(links: Arc<dyn LinkStore>) -> Self {
        Self { links }
    }
}

impl Hook<AppInstance> for ThumbnailProvisioning {
    fn name(&self) -> &'static str {
        "thumbnail_provisioning"
    }

    fn post_save(&self, instance: &AppInstance, _args: &SaveArgs) -> Result<()> {
        if instance.has_thumbnail()? {
            return Ok(());
        }

        let app = instance.app()?.ok_or(Error::MissingApp)?;
        let url = app.app_img_url()?;

        // An empty URL leaves the instance without a thumbnail, so the nested save would recurse
        if url.is_empty() {
            warn!(
                "App {} has no image, instance {} keeps no thumbnail",
                app.name()?,
                instance.id()
            );
            return Ok(());
        }

        let (_, created) = self
            .links
            .get_or_create_link(&instance.self_resource()?, NewLink::thumbnail(&url))?;
        debug!(created, "Thumbnail link of instance {} points at {url}", instance.id());

        instance.set_thumbnail_url(Some(&url))
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crate::{
        NewApp, Repository,
        repository::{
            collaborators::{CatalogResource, Link, LinkStore, NewLink, ResourceIdentity},
            entities::{Error, Result},
        },
    };

    /// A link service that is always down.
    struct UnreachableLinks;

    impl LinkStore for UnreachableLinks {
        fn get_or_create_link(&self, _: &ResourceIdentity, _: NewLink) -> Result<(Link, bool)> {
            Err(Box::<dyn std::error::Error + Send + Sync>::from("link service down").into())
        }

        fn links(&self, _: &ResourceIdentity) -> Result<Vec<Link>> {
            Ok(Vec::new())
        }

        fn remove_links(&self, _: &ResourceIdentity) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_provisions_app_logo() {
        let repo = Repository::mock();
        let app = repo.mock_app("mapviewer");

        let instance = repo.save_instance(app.new_instance()).unwrap();

        assert!(instance.has_thumbnail().unwrap());
        assert_eq!(
            instance.thumbnail_url().unwrap().as_deref(),
            Some("http://x/logo.png")
        );

        let links = repo.links().links(&instance.self_resource().unwrap()).unwrap();
        assert_eq!(links.len(), 1);
        let link = links.first().unwrap();
        assert_eq!(link.name, "Thumbnail");
        assert_eq!(link.url, "http://x/logo.png");
        assert_eq!(link.mime, "image/png");
        assert_eq!(link.extension, "png");
        assert_eq!(link.link_type, "image");
    }

    #[test]
    fn test_existing_thumbnail_is_kept() {
        let repo = Repository::mock();
        let app = repo.mock_app("mapviewer");

        let mut draft = app.new_instance();
        draft.thumbnail_url = Some("http://x/custom.png".into());
        let instance = repo.save_instance(draft).unwrap();

        assert_eq!(
            instance.thumbnail_url().unwrap().as_deref(),
            Some("http://x/custom.png")
        );
        assert!(repo.links().links(&instance.self_resource().unwrap()).unwrap().is_empty());
    }

    #[test]
    fn test_saving_twice_keeps_one_link() {
        let repo = Repository::mock();
        let app = repo.mock_app("mapviewer");
        let instance = repo.save_instance(app.new_instance()).unwrap();

        // Clearing the thumbnail makes the next save provision it again
        let mut draft = instance.edit().unwrap();
        draft.thumbnail_url = None;
        let instance = repo.save_instance(draft).unwrap();
        repo.save_instance(instance.edit().unwrap()).unwrap();

        let links = repo.links().links(&instance.self_resource().unwrap()).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(
            instance.thumbnail_url().unwrap().as_deref(),
            Some("http://x/logo.png")
        );
    }

    #[test]
    fn test_app_without_image() {
        let repo = Repository::mock();
        let app = repo.install_app(NewApp::named("blank")).unwrap();

        let instance = repo.save_instance(app.new_instance()).unwrap();

        assert!(!instance.has_thumbnail().unwrap());
        assert!(repo.links().links(&instance.self_resource().unwrap()).unwrap().is_empty());
    }

    #[test]
    fn test_instance_without_app_fails_after_write() {
        let repo = Repository::mock();

        let err = repo
            .save_instance(crate::AppInstanceDraft::default())
            .unwrap_err();

        assert!(matches!(
            err,
            Error::HookFailure {
                hook: "thumbnail_provisioning",
                ..
            }
        ));
        // The primary write has already happened and kept its defaults
        let instances = repo.instances().unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(
            instances.first().unwrap().title().unwrap().as_deref(),
            Some("No title provided")
        );
    }

    #[test]
    fn test_link_service_failure() {
        let repo = Repository::builder()
            .links(Arc::new(UnreachableLinks))
            .build_mock();
        let app = repo.mock_app("mapviewer");

        let err = repo.save_instance(app.new_instance()).unwrap_err();

        match err {
            Error::HookFailure { hook, source } => {
                assert_eq!(hook, "thumbnail_provisioning");
                assert!(matches!(*source, Error::Collaborator(_)));
                assert_eq!(source.to_string(), "link service down");
            }
            other => panic!("unexpected error {other}"),
        }
        // Post-save failure, the instance stays without a thumbnail
        let instances = repo.instances().unwrap();
        assert!(!instances.first().unwrap().has_thumbnail().unwrap());
    }
}
