use agdb::{DbValue, QueryBuilder};
use chrono::Utc;
use tracing::debug;

use crate::repository::{
    collaborators::{Catalog, ResourceIdentity},
    db::Db,
    entities::{EntityId, Result},
    lifecycle::SaveArgs,
};

/// Indexes resources under the `resources` root and stamps the time of their last
/// registration.
#[derive(Debug, Clone)]
pub struct DbCatalog {
    db: Db,
}

impl DbCatalog {
    pub(crate) fn new(db: Db) -> Self {
        Self { db }
    }

    /// Every resource registered so far.
    pub fn resources(&self) -> Result<Vec<ResourceIdentity>> {
        let ids: Vec<_> = self
            .db
            .read()
            .exec(
                QueryBuilder::search()
                    .from("resources")
                    .where_()
                    .neighbor()
                    .query(),
            )?
            .elements
            .iter()
            .map(|e| e.id)
            .collect();

        ids.into_iter()
            .map(|db_id| Ok(ResourceIdentity { id: EntityId::load(&self.db, db_id)? }))
            .collect()
    }

    /// Milliseconds since the Unix epoch of the last registration of `resource`.
    pub fn registered_at(&self, resource: &ResourceIdentity) -> Result<Option<i64>> {
        let db_id = resource.id.db_id(&self.db)?;
        let element = self
            .db
            .read()
            .exec(QueryBuilder::select().ids(db_id).query())?
            .elements
            .pop();

        Ok(element.and_then(|e| {
            e.values
                .into_iter()
                .find(|kv| kv.key == DbValue::from("registered_at"))
                .and_then(|kv| kv.value.to_i64().ok())
        }))
    }
}

impl Catalog for DbCatalog {
    fn resource_post_save(&self, resource: &ResourceIdentity, args: &SaveArgs) -> Result<()> {
        let db_id = resource.id.db_id(&self.db)?;
        let now = Utc::now().timestamp_millis();

        self.db.write().transaction_mut(|t| -> Result<()> {
            if args.created {
                t.exec_mut(
                    QueryBuilder::insert()
                        .edges()
                        .from("resources")
                        .to(db_id)
                        .query(),
                )?;
            }

            t.exec_mut(
                QueryBuilder::insert()
                    .values([[("registered_at", now).into()]])
                    .ids(db_id)
                    .query(),
            )?;

            Ok(())
        })?;

        debug!("Registered resource {} with the catalog", resource.id());

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::{Repository, repository::collaborators::CatalogResource};

    use super::*;

    #[test]
    fn test_register_once_per_resource() {
        let repo = Repository::mock();
        let catalog = DbCatalog::new(repo.ctx.db.clone());
        let app = repo.mock_app("mapviewer");

        let instance = repo.save_instance(app.new_instance()).unwrap();
        let resource = instance.self_resource().unwrap();

        // The instance is saved again by the thumbnail hook and again here; it is still only
        // indexed once.
        instance.set_title("Flood Map").unwrap();

        let resources = catalog.resources().unwrap();
        assert_eq!(resources, vec![resource]);
        assert!(catalog.registered_at(&resource).unwrap().is_some());
    }
}
