use std::fmt::{self, Display, Formatter};

use agdb::{DbId, Query, QueryBuilder};
use tracing::info;

use crate::repository::{
    Ctx,
    db::{
        inserted_id,
        models::{AppModel, AppTagModel},
    },
    entities::{App, EntityId, Error, Result, Uid, UniqueConstraint, get_field, non_empty},
};

/// A category apps are filed under.
///
/// An untitled tag has no name. Named tags are unique by name.
#[derive(Debug, Clone)]
pub struct AppTag {
    pub(crate) id: EntityId,
    pub(crate) ctx: Ctx,
}

impl AppTag {
    pub(crate) fn load(db_id: DbId, ctx: Ctx) -> Result<Self> {
        let id = EntityId::load(&ctx.db, db_id)?;
        Ok(Self { id, ctx })
    }

    pub fn id(&self) -> u64 {
        self.id.uid().0
    }

    pub fn name(&self) -> Result<Option<String>> {
        Ok(non_empty(get_field(&self.ctx.db, self.id, "name")?))
    }

    pub fn set_name(&self, new_name: Option<&str>) -> Result<()> {
        if new_name.map(str::to_string) == self.name()? {
            return Ok(());
        }

        let db_id = self.id.db_id(&self.ctx.db)?;
        let new_name = new_name.unwrap_or_default();
        self.ctx.db.write().transaction_mut(|t| -> Result<()> {
            if !new_name.is_empty() {
                let tags: Vec<AppTagModel> = t.exec(select_tags())?.try_into()?;
                if tags.iter().any(|tag| tag.name == new_name) {
                    return Err(Error::DuplicateName {
                        constraint: UniqueConstraint::AppTagName,
                        name: new_name.into(),
                    });
                }
            }

            t.exec_mut(
                QueryBuilder::insert()
                    .values([[("name", new_name).into()]])
                    .ids(db_id)
                    .query(),
            )?;

            Ok(())
        })
    }

    /// Every app filed under this tag.
    pub fn apps(&self) -> Result<Vec<App>> {
        let db_id = self.id.db_id(&self.ctx.db)?;
        self.ctx
            .db
            .read()
            .exec(
                QueryBuilder::select()
                    .elements::<AppModel>()
                    .search()
                    .to(db_id)
                    .where_()
                    .neighbor()
                    .and()
                    .element::<AppModel>()
                    .query(),
            )?
            .elements
            .iter()
            .map(|e| App::load(e.id, self.ctx.clone()))
            .collect()
    }

    /// Insert a new [`AppTag`]. A named tag must have a unique name.
    pub(crate) fn add(ctx: &Ctx, name: Option<&str>) -> Result<Self> {
        let model = AppTagModel::new(Uid::new(&ctx.db)?, name);
        let db_id = ctx.db.write().transaction_mut(|t| -> Result<DbId> {
            if let Some(name) = name.filter(|n| !n.is_empty()) {
                let tags: Vec<AppTagModel> = t.exec(select_tags())?.try_into()?;
                if tags.iter().any(|tag| tag.name == name) {
                    return Err(Error::DuplicateName {
                        constraint: UniqueConstraint::AppTagName,
                        name: name.into(),
                    });
                }
            }

            let tag_id = inserted_id(t.exec_mut(QueryBuilder::insert().element(model).query())?)?;

            t.exec_mut(
                QueryBuilder::insert()
                    .edges()
                    .from("app_tags")
                    .to(tag_id)
                    .query(),
            )?;

            Ok(tag_id)
        })?;

        info!("Added app tag {}", name.unwrap_or_default());

        AppTag::load(db_id, ctx.clone())
    }

    /// Remove the tag. The apps filed under it are kept.
    pub(crate) fn remove(self) -> Result<()> {
        let db_id = self.id.db_id(&self.ctx.db)?;
        self.ctx
            .db
            .write()
            .exec_mut(QueryBuilder::remove().ids(db_id).query())?;

        Ok(())
    }

    pub(crate) fn list(ctx: &Ctx) -> Result<Vec<AppTag>> {
        ctx.db
            .read()
            .exec(select_tags())?
            .elements
            .iter()
            .map(|e| AppTag::load(e.id, ctx.clone()))
            .collect()
    }

    pub(crate) fn find(ctx: &Ctx, name: &str) -> Result<Option<AppTag>> {
        for tag in Self::list(ctx)? {
            if tag.name()?.as_deref() == Some(name) {
                return Ok(Some(tag));
            }
        }

        Ok(None)
    }
}

fn select_tags() -> impl Query {
    QueryBuilder::select()
        .elements::<AppTagModel>()
        .search()
        .from("app_tags")
        .where_()
        .neighbor()
        .query()
}

impl Display for AppTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name().ok().flatten().unwrap_or_default())
    }
}

impl PartialEq for AppTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
