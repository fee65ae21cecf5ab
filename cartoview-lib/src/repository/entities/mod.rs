//! Core domain entities for Cartoview.
//!
//! These types represent installed apps, the tags they are filed under and
//! the app instances users create from them. They provide a unified interface
//! for inspecting and mutating these elements, handling all necessary
//! operations behind the scenes.

use agdb::{DbId, DbValue, QueryBuilder};
use strum::Display;
use thiserror::Error;

use crate::repository::db::{Db, single_value};

mod app;
mod app_instance;
mod app_tag;
mod entity_id;

pub use app::{App, NewApp};
pub use app_instance::{AppInstance, AppInstanceDraft};
pub use app_tag::AppTag;

pub(crate) use entity_id::EntityId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Internal database error {0}")]
    Internal(#[from] agdb::DbError),
    #[error("This entity has been removed from the database")]
    RemovedEntity,
    #[error("{constraint} `{name}` is already taken")]
    DuplicateName {
        constraint: UniqueConstraint,
        name: String,
    },
    #[error("Failed to clean up the installed files of app `{app}`")]
    UninstallCleanup {
        app: String,
        #[source]
        source: Box<Error>,
    },
    #[error("Lifecycle hook `{hook}` failed")]
    HookFailure {
        hook: &'static str,
        #[source]
        source: Box<Error>,
    },
    #[error("A name must not be empty")]
    EmptyName,
    #[error("This app instance does not belong to an app")]
    MissingApp,
    #[error("Field `{field}` does not hold a value of the expected type")]
    Conversion { field: String },
    #[error("A successful query returned no elements")]
    EmptyResult,
    #[error("Database model version {found} is newer than the supported version {supported}")]
    UnsupportedModelVersion { found: u64, supported: u64 },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse the configuration file: {0}")]
    ConfigRead(#[from] toml::de::Error),
    #[error("Failed to serialize the configuration file: {0}")]
    ConfigWrite(#[from] toml::ser::Error),
    /// Raised by collaborators implemented outside this crate
    #[error(transparent)]
    Collaborator(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Name uniqueness rules checked at write time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum UniqueConstraint {
    #[strum(to_string = "App name")]
    AppName,
    #[strum(to_string = "App tag name")]
    AppTagName,
}

/// A unique identifier that is never reused, unlike a [`DbId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Uid(pub(crate) u64);

impl Uid {
    /// Allocate the next UID.
    pub fn new(db: &Db) -> Result<Self> {
        db.write().transaction_mut(|t| -> Result<Self> {
            let uid = single_value(
                t.exec(
                    QueryBuilder::select()
                        .values("next_uid")
                        .ids("next_uid")
                        .query(),
                )?,
            )?
            .to_u64()?;

            t.exec_mut(
                QueryBuilder::insert()
                    .values([[("next_uid", uid + 1).into()]])
                    .ids("next_uid")
                    .query(),
            )?;

            Ok(Self(uid))
        })
    }

    /// Read the UID stored on an existing element.
    pub fn load(db: &Db, db_id: DbId) -> Result<Self> {
        let uid = single_value(
            db.read()
                .exec(QueryBuilder::select().values("uid").ids(db_id).query())?,
        )?
        .to_u64()?;

        Ok(Self(uid))
    }
}

pub(crate) fn get_field<T>(db: &Db, id: EntityId, field: &str) -> Result<T>
where
    T: TryFrom<DbValue>,
{
    let db_id = id.db_id(db)?;
    let value = single_value(
        db.read()
            .exec(QueryBuilder::select().values(field).ids(db_id).query())?,
    )?;

    T::try_from(value).map_err(|_| Error::Conversion {
        field: field.to_string(),
    })
}

pub(crate) fn set_field<T>(db: &Db, id: EntityId, field: &str, value: T) -> Result<()>
where
    T: Into<DbValue>,
{
    let db_id = id.db_id(db)?;
    db.write().exec_mut(
        QueryBuilder::insert()
            .values([[(field, value).into()]])
            .ids(db_id)
            .query(),
    )?;

    Ok(())
}

/// Optional text is stored as an empty string.
pub(crate) fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}
