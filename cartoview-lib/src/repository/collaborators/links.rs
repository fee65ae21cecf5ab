use agdb::{Comparison, QueryBuilder};
use tracing::debug;

use crate::repository::{
    collaborators::{Link, LinkStore, NewLink, ResourceIdentity},
    db::{Db, inserted_id, models::LinkModel},
    entities::{Result, Uid},
};

/// Stores links as elements hanging off their resource.
#[derive(Debug, Clone)]
pub struct DbLinkStore {
    db: Db,
}

impl DbLinkStore {
    pub(crate) fn new(db: Db) -> Self {
        Self { db }
    }
}

impl LinkStore for DbLinkStore {
    fn get_or_create_link(
        &self,
        resource: &ResourceIdentity,
        link: NewLink,
    ) -> Result<(Link, bool)> {
        let resource_id = resource.id.db_id(&self.db)?;
        let uid = Uid::new(&self.db)?;

        let (model, created) = self.db.write().transaction_mut(|t| -> Result<(LinkModel, bool)> {
            let existing: Vec<LinkModel> = t
                .exec(
                    QueryBuilder::select()
                        .elements::<LinkModel>()
                        .search()
                        .from(resource_id)
                        .where_()
                        .neighbor()
                        .and()
                        .element::<LinkModel>()
                        .and()
                        .key("url")
                        .value(Comparison::Equal(link.url.as_str().into()))
                        .query(),
                )?
                .try_into()?;

            if let Some(found) = existing.into_iter().next() {
                return Ok((found, false));
            }

            let model = LinkModel::new(uid, &link);
            let link_id = inserted_id(
                t.exec_mut(QueryBuilder::insert().element(model.clone()).query())?,
            )?;

            t.exec_mut(
                QueryBuilder::insert()
                    .edges()
                    .from("links")
                    .to(link_id)
                    .query(),
            )?;
            t.exec_mut(
                QueryBuilder::insert()
                    .edges()
                    .from(resource_id)
                    .to(link_id)
                    .query(),
            )?;

            Ok((model, true))
        })?;

        if created {
            debug!("Created {} link for resource {}", model.name, resource.id());
        }

        Ok((model.into(), created))
    }

    fn links(&self, resource: &ResourceIdentity) -> Result<Vec<Link>> {
        let resource_id = resource.id.db_id(&self.db)?;
        let models: Vec<LinkModel> = self
            .db
            .read()
            .exec(
                QueryBuilder::select()
                    .elements::<LinkModel>()
                    .search()
                    .from(resource_id)
                    .where_()
                    .neighbor()
                    .and()
                    .element::<LinkModel>()
                    .query(),
            )?
            .try_into()?;

        Ok(models.into_iter().map(Link::from).collect())
    }

    fn remove_links(&self, resource: &ResourceIdentity) -> Result<()> {
        let resource_id = resource.id.db_id(&self.db)?;
        self.db.write().exec_mut(
            QueryBuilder::remove()
                .ids(
                    QueryBuilder::search()
                        .from(resource_id)
                        .where_()
                        .neighbor()
                        .and()
                        .element::<LinkModel>()
                        .query(),
                )
                .query(),
        )?;

        Ok(())
    }
}

impl From<LinkModel> for Link {
    fn from(model: LinkModel) -> Self {
        Self {
            id: model.uid,
            name: model.name,
            url: model.url,
            extension: model.extension,
            mime: model.mime,
            link_type: model.link_type,
        }
    }
}
