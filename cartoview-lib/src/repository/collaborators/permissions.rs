use agdb::QueryBuilder;
use tracing::debug;

use crate::repository::{
    collaborators::{Grant, PermissionStore, ResourceIdentity},
    db::{Db, inserted_id, models::PermissionModel},
    entities::{Result, Uid},
};

/// Stores grants as elements hanging off their resource.
#[derive(Debug, Clone)]
pub struct DbPermissionStore {
    db: Db,
}

impl DbPermissionStore {
    pub(crate) fn new(db: Db) -> Self {
        Self { db }
    }
}

impl PermissionStore for DbPermissionStore {
    fn grant(&self, resource: &ResourceIdentity, principal: &str, permission: &str) -> Result<()> {
        if self
            .permissions(resource)?
            .iter()
            .any(|g| g.principal == principal && g.permission == permission)
        {
            return Ok(());
        }

        let resource_id = resource.id.db_id(&self.db)?;
        let model = PermissionModel::new(Uid::new(&self.db)?, principal, permission);
        self.db.write().transaction_mut(|t| -> Result<()> {
            let grant_id = inserted_id(t.exec_mut(QueryBuilder::insert().element(model).query())?)?;

            t.exec_mut(
                QueryBuilder::insert()
                    .edges()
                    .from("permissions")
                    .to(grant_id)
                    .query(),
            )?;
            t.exec_mut(
                QueryBuilder::insert()
                    .edges()
                    .from(resource_id)
                    .to(grant_id)
                    .query(),
            )?;

            Ok(())
        })?;

        debug!("Granted {permission} to {principal} on resource {}", resource.id());

        Ok(())
    }

    fn permissions(&self, resource: &ResourceIdentity) -> Result<Vec<Grant>> {
        let resource_id = resource.id.db_id(&self.db)?;
        let models: Vec<PermissionModel> = self
            .db
            .read()
            .exec(
                QueryBuilder::select()
                    .elements::<PermissionModel>()
                    .search()
                    .from(resource_id)
                    .where_()
                    .neighbor()
                    .and()
                    .element::<PermissionModel>()
                    .query(),
            )?
            .try_into()?;

        Ok(models
            .into_iter()
            .map(|m| Grant {
                principal: m.principal,
                permission: m.permission,
            })
            .collect())
    }

    fn remove_object_permissions(&self, resource: &ResourceIdentity) -> Result<()> {
        let resource_id = resource.id.db_id(&self.db)?;
        let removed = self
            .db
            .write()
            .exec_mut(
                QueryBuilder::remove()
                    .ids(
                        QueryBuilder::search()
                            .from(resource_id)
                            .where_()
                            .neighbor()
                            .and()
                            .element::<PermissionModel>()
                            .query(),
                    )
                    .query(),
            )?
            .result;

        debug!("Removed {removed} permission elements of resource {}", resource.id());

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::{Repository, repository::collaborators::CatalogResource};

    #[test]
    fn test_grant_is_idempotent() {
        let repo = Repository::mock();
        let app = repo.mock_app("mapviewer");
        let instance = repo.save_instance(app.new_instance()).unwrap();
        let resource = instance.self_resource().unwrap();

        repo.permissions().grant(&resource, "alice", "view_resourcebase").unwrap();
        repo.permissions().grant(&resource, "alice", "view_resourcebase").unwrap();
        repo.permissions().grant(&resource, "bob", "view_resourcebase").unwrap();

        assert_eq!(repo.permissions().permissions(&resource).unwrap().len(), 2);
    }

    #[test]
    fn test_remove_object_permissions() {
        let repo = Repository::mock();
        let app = repo.mock_app("mapviewer");
        let first = repo.save_instance(app.new_instance()).unwrap();
        let second = repo.save_instance(app.new_instance()).unwrap();
        let first = first.self_resource().unwrap();
        let second = second.self_resource().unwrap();

        repo.permissions().grant(&first, "alice", "view_resourcebase").unwrap();
        repo.permissions().grant(&first, "alice", "change_resourcebase").unwrap();
        repo.permissions().grant(&second, "alice", "view_resourcebase").unwrap();

        repo.permissions().remove_object_permissions(&first).unwrap();

        assert!(repo.permissions().permissions(&first).unwrap().is_empty());
        assert_eq!(repo.permissions().permissions(&second).unwrap().len(), 1);
    }
}
