use std::fmt::{self, Display, Formatter};

use agdb::{DbId, DbValue, Query, QueryBuilder};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use crate::repository::{
    Ctx,
    db::{
        inserted_id,
        models::{AppInstanceModel, AppModel, AppTagModel},
    },
    entities::{
        AppInstance, AppInstanceDraft, AppTag, EntityId, Error, Result, Uid, UniqueConstraint,
        get_field, non_empty, set_field,
    },
    lifecycle::SaveArgs,
};

/// Metadata of an application package being installed.
///
/// Deserializes from the package's TOML manifest; everything but the name is optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NewApp {
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub app_url: Option<String>,
    pub author: Option<String>,
    pub author_website: Option<String>,
    pub license: Option<String>,
    /// Names of the tags to file the app under. Missing tags are created.
    pub tags: Vec<String>,
    pub installed_by: Option<String>,
    pub single_instance: bool,
    pub order: i64,
    pub owner_url: Option<String>,
    pub help_url: Option<String>,
    pub is_suspended: bool,
    pub app_img_url: String,
    pub in_menu: bool,
    pub admin_only: bool,
    pub rating: i64,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
}

impl NewApp {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

impl Default for NewApp {
    fn default() -> Self {
        Self {
            name: String::new(),
            title: None,
            description: None,
            short_description: None,
            app_url: None,
            author: None,
            author_website: None,
            license: None,
            tags: Vec::new(),
            installed_by: None,
            single_instance: false,
            order: 0,
            owner_url: None,
            help_url: None,
            is_suspended: false,
            app_img_url: String::new(),
            in_menu: true,
            admin_only: false,
            rating: 0,
            contact_name: None,
            contact_email: None,
        }
    }
}

/// Represents an installed app entity in the Cartoview system.
///
/// Provides methods to inspect and modify this app's data, including
/// managing its tags and instances. Always reflects the current database state.
#[derive(Debug, Clone)]
pub struct App {
    pub(crate) id: EntityId,
    pub(crate) ctx: Ctx,
}

impl App {
    /// Load some existing [`App`] from the database
    pub(crate) fn load(db_id: DbId, ctx: Ctx) -> Result<Self> {
        let id = EntityId::load(&ctx.db, db_id)?;
        Ok(Self { id, ctx })
    }

    pub fn id(&self) -> u64 {
        self.id.uid().0
    }

    // Fields

    pub fn name(&self) -> Result<String> {
        self.get_field("name")
    }

    pub fn set_name(&self, new_name: &str) -> Result<()> {
        if new_name.is_empty() {
            return Err(Error::EmptyName);
        }
        if new_name == self.name()? {
            return Ok(());
        }

        let db_id = self.id.db_id(&self.ctx.db)?;
        self.ctx.db.write().transaction_mut(|t| -> Result<()> {
            let apps: Vec<AppModel> = t.exec(select_apps())?.try_into()?;
            if apps.iter().any(|a| a.name == new_name) {
                return Err(Error::DuplicateName {
                    constraint: UniqueConstraint::AppName,
                    name: new_name.into(),
                });
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

    /// The display label. Empty for an untitled app.
    pub fn label(&self) -> Result<String> {
        self.get_field("title")
    }

    pub fn title(&self) -> Result<Option<String>> {
        self.get_text("title")
    }

    pub fn set_title(&self, title: Option<&str>) -> Result<()> {
        self.set_text("title", title)
    }

    pub fn description(&self) -> Result<Option<String>> {
        self.get_text("description")
    }

    pub fn set_description(&self, description: Option<&str>) -> Result<()> {
        self.set_text("description", description)
    }

    pub fn short_description(&self) -> Result<Option<String>> {
        self.get_text("short_description")
    }

    pub fn set_short_description(&self, short_description: Option<&str>) -> Result<()> {
        self.set_text("short_description", short_description)
    }

    pub fn app_url(&self) -> Result<Option<String>> {
        self.get_text("app_url")
    }

    pub fn author(&self) -> Result<Option<String>> {
        self.get_text("author")
    }

    pub fn author_website(&self) -> Result<Option<String>> {
        self.get_text("author_website")
    }

    pub fn license(&self) -> Result<Option<String>> {
        self.get_text("license")
    }

    /// When the app was installed. Never changes after creation.
    pub fn date_installed(&self) -> Result<DateTime<Utc>> {
        let millis: i64 = self.get_field("date_installed")?;
        DateTime::from_timestamp_millis(millis).ok_or_else(|| Error::Conversion {
            field: "date_installed".into(),
        })
    }

    pub fn installed_by(&self) -> Result<Option<String>> {
        self.get_text("installed_by")
    }

    pub fn single_instance(&self) -> Result<bool> {
        self.get_field("single_instance")
    }

    pub fn order(&self) -> Result<i64> {
        self.get_field("order")
    }

    pub fn set_order(&self, order: i64) -> Result<()> {
        self.set_field("order", order)
    }

    pub fn owner_url(&self) -> Result<Option<String>> {
        self.get_text("owner_url")
    }

    pub fn help_url(&self) -> Result<Option<String>> {
        self.get_text("help_url")
    }

    pub fn set_help_url(&self, help_url: Option<&str>) -> Result<()> {
        self.set_text("help_url", help_url)
    }

    pub fn is_suspended(&self) -> Result<bool> {
        self.get_field("is_suspended")
    }

    pub fn set_suspended(&self, suspended: bool) -> Result<()> {
        if suspended == self.is_suspended()? {
            return Ok(());
        }

        self.set_field("is_suspended", suspended)?;
        info!(
            "App {} is now {}",
            self.name()?,
            if suspended { "suspended" } else { "active" }
        );

        Ok(())
    }

    /// URL of the app logo, also used as the thumbnail of its instances. Empty when unset.
    pub fn app_img_url(&self) -> Result<String> {
        self.get_field("app_img_url")
    }

    pub fn set_app_img_url(&self, url: &str) -> Result<()> {
        self.set_field("app_img_url", url)
    }

    pub fn in_menu(&self) -> Result<bool> {
        self.get_field("in_menu")
    }

    pub fn set_in_menu(&self, in_menu: bool) -> Result<()> {
        self.set_field("in_menu", in_menu)
    }

    pub fn admin_only(&self) -> Result<bool> {
        self.get_field("admin_only")
    }

    pub fn set_admin_only(&self, admin_only: bool) -> Result<()> {
        self.set_field("admin_only", admin_only)
    }

    pub fn rating(&self) -> Result<i64> {
        self.get_field("rating")
    }

    pub fn set_rating(&self, rating: i64) -> Result<()> {
        self.set_field("rating", rating)
    }

    pub fn contact_name(&self) -> Result<Option<String>> {
        self.get_text("contact_name")
    }

    pub fn contact_email(&self) -> Result<Option<String>> {
        self.get_text("contact_email")
    }

    // Tags

    pub fn tags(&self) -> Result<Vec<AppTag>> {
        let db_id = self.id.db_id(&self.ctx.db)?;
        self.ctx
            .db
            .read()
            .exec(
                QueryBuilder::select()
                    .elements::<AppTagModel>()
                    .search()
                    .from(db_id)
                    .where_()
                    .neighbor()
                    .and()
                    .element::<AppTagModel>()
                    .query(),
            )?
            .elements
            .iter()
            .map(|e| AppTag::load(e.id, self.ctx.clone()))
            .collect()
    }

    /// File this app under `tag`. Adding a tag twice is a no-op.
    pub fn add_tag(&self, tag: &AppTag) -> Result<()> {
        if self.tags()?.contains(tag) {
            return Ok(());
        }

        let app_id = self.id.db_id(&self.ctx.db)?;
        let tag_id = tag.id.db_id(&self.ctx.db)?;
        self.ctx.db.write().exec_mut(
            QueryBuilder::insert()
                .edges()
                .from(app_id)
                .to(tag_id)
                .query(),
        )?;

        Ok(())
    }

    pub fn remove_tag(&self, tag: &AppTag) -> Result<()> {
        let app_id = self.id.db_id(&self.ctx.db)?;
        let tag_id = tag.id.db_id(&self.ctx.db)?;
        self.ctx.db.write().exec_mut(
            QueryBuilder::remove()
                .ids(
                    QueryBuilder::search()
                        .from(app_id)
                        .to(tag_id)
                        .where_()
                        .edge()
                        .query(),
                )
                .query(),
        )?;

        Ok(())
    }

    // Instances

    /// A draft of a new instance of this app. Nothing is written until it is saved.
    pub fn new_instance(&self) -> AppInstanceDraft {
        AppInstanceDraft::new(Some(self))
    }

    pub fn instances(&self) -> Result<Vec<AppInstance>> {
        let db_id = self.id.db_id(&self.ctx.db)?;
        self.ctx
            .db
            .read()
            .exec(
                QueryBuilder::select()
                    .elements::<AppInstanceModel>()
                    .search()
                    .from(db_id)
                    .where_()
                    .neighbor()
                    .and()
                    .element::<AppInstanceModel>()
                    .query(),
            )?
            .elements
            .iter()
            .map(|e| AppInstance::load(e.id, self.ctx.clone()))
            .collect()
    }

    // Operations

    /// Insert a new [`App`] into the database. The [`App`] must have a unique name.
    pub(crate) fn add(ctx: &Ctx, mut new_app: NewApp) -> Result<Self> {
        ctx.hooks.apps.pre_save(&mut new_app)?;

        if new_app.name.is_empty() {
            return Err(Error::EmptyName);
        }

        let name = new_app.name.clone();
        let model = AppModel::new(Uid::new(&ctx.db)?, &new_app, Utc::now().timestamp_millis());
        let db_id = ctx.db.write().transaction_mut(|t| -> Result<DbId> {
            let apps: Vec<AppModel> = t.exec(select_apps())?.try_into()?;
            if apps.iter().any(|a| a.name == name) {
                return Err(Error::DuplicateName {
                    constraint: UniqueConstraint::AppName,
                    name: name.clone(),
                });
            }

            let app_id = inserted_id(t.exec_mut(QueryBuilder::insert().element(model).query())?)?;

            t.exec_mut(
                QueryBuilder::insert()
                    .edges()
                    .from("apps")
                    .to(app_id)
                    .query(),
            )?;

            Ok(app_id)
        })?;

        let app = App::load(db_id, ctx.clone())?;

        // Unnamed tags can't be looked up, so a manifest can't refer to one
        for tag_name in new_app.tags.iter().filter(|t| !t.is_empty()) {
            let tag = match AppTag::find(ctx, tag_name)? {
                Some(tag) => tag,
                None => AppTag::add(ctx, Some(tag_name))?,
            };
            app.add_tag(&tag)?;
        }

        ctx.hooks.apps.post_save(
            &app,
            &SaveArgs {
                created: true,
                update_fields: None,
            },
        )?;

        info!("Installed app {name}");

        Ok(app)
    }

    /// Run the pre-delete hooks, then remove the record. The instances of the app are kept.
    pub(crate) fn remove(self) -> Result<()> {
        let name = self.name()?;

        self.ctx.hooks.apps.pre_delete(&self)?;

        let db_id = self.id.db_id(&self.ctx.db)?;
        self.ctx
            .db
            .write()
            .exec_mut(QueryBuilder::remove().ids(db_id).query())?;

        info!("Uninstalled app {name}");

        Ok(())
    }

    /// Every installed app, sorted by menu order, then name.
    pub(crate) fn list(ctx: &Ctx) -> Result<Vec<App>> {
        let mut apps = ctx
            .db
            .read()
            .exec(select_apps())?
            .elements
            .iter()
            .map(|e| App::load(e.id, ctx.clone()))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .map(|app| Ok((app.order()?, app.name()?, app)))
            .collect::<Result<Vec<_>>>()?;

        apps.sort_by(|(order_a, name_a, _), (order_b, name_b, _)| {
            order_a.cmp(order_b).then_with(|| name_a.cmp(name_b))
        });

        debug!("Listed {} apps", apps.len());

        Ok(apps.into_iter().map(|(_, _, app)| app).collect())
    }

    pub(crate) fn find(ctx: &Ctx, name: &str) -> Result<Option<App>> {
        for app in Self::list(ctx)? {
            if app.name()? == name {
                return Ok(Some(app));
            }
        }

        Ok(None)
    }

    fn get_text(&self, field: &str) -> Result<Option<String>> {
        Ok(non_empty(self.get_field(field)?))
    }

    fn set_text(&self, field: &str, value: Option<&str>) -> Result<()> {
        self.set_field(field, value.unwrap_or_default())
    }

    fn get_field<T>(&self, field: &str) -> Result<T>
    where
        T: TryFrom<DbValue>,
    {
        get_field(&self.ctx.db, self.id, field)
    }

    fn set_field<T>(&self, field: &str, value: T) -> Result<()>
    where
        T: Into<DbValue>,
    {
        set_field(&self.ctx.db, self.id, field, value)
    }
}

fn select_apps() -> impl Query {
    QueryBuilder::select()
        .elements::<AppModel>()
        .search()
        .from("apps")
        .where_()
        .neighbor()
        .query()
}

impl Display for App {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label().unwrap_or_default())
    }
}

impl PartialEq for App {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
