use std::sync::Arc;

use crate::repository::{
    collaborators::{CatalogResource, PermissionStore},
    entities::{AppInstance, Result},
    lifecycle::Hook,
};

/// Strips the permission grants of an instance while its identity still resolves.
pub struct PermissionCleanup {
    permissions: Arc<dyn PermissionStore>,
}

impl PermissionCleanup {
    pub fn new(permissions: Arc<dyn PermissionStore>) -> Self {
        Self { permissions }
    }
}

impl Hook<AppInstance> for PermissionCleanup {
    fn name(&self) -> &'static str {
        "permission_cleanup"
    }

    fn pre_delete(&self, instance: &AppInstance) -> Result<()> {
        self.permissions
            .remove_object_permissions(&instance.self_resource()?)
    }
}
