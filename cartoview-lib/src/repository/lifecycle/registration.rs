use std::sync::Arc;

use crate::repository::{
    collaborators::{Catalog, CatalogResource},
    entities::{AppInstance, Result},
    lifecycle::{Hook, SaveArgs},
};

/// Hands a saved instance to the catalog's generic resource registration.
pub struct CatalogRegistration {
    catalog: Arc<dyn Catalog>,
}

impl CatalogRegistration {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }
}

impl Hook<AppInstance> for CatalogRegistration {
    fn name(&self) -> &'static str {
        "catalog_registration"
    }

    fn post_save(&self, instance: &AppInstance, args: &SaveArgs) -> Result<()> {
        self.catalog
            .resource_post_save(&instance.self_resource()?, args)
    }
}
