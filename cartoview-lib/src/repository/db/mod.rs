use std::{
    io::{self, ErrorKind},
    path::Path,
    sync::Arc,
};

use agdb::{DbAny, DbId, DbValue, QueryBuilder, QueryResult};
use derive_more::Deref;
use parking_lot::RwLock;
use tracing::debug;

use crate::repository::{
    db::models::{CURRENT_MODEL_VERSION, ModelVersion},
    entities::{Error, Result},
};

pub(crate) mod models;

const ALIASES: [&str; 8] = [
    // Root element nodes. Every element of a kind hangs off its root with an edge.
    "apps",
    "app_tags",
    "app_instances",
    "links",
    "permissions",
    // Resources registered with the catalog
    "resources",
    // State nodes
    "model_version",
    "next_uid",
];

#[derive(Debug, Clone, Deref)]
pub(crate) struct Db {
    #[deref]
    db: Arc<RwLock<DbAny>>,
}

impl Db {
    /// Open (or create) a file backed database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let path_str = path.to_str().ok_or_else(|| {
            io::Error::new(ErrorKind::InvalidInput, "database path must be valid UTF-8")
        })?;

        let mut db = Self {
            db: Arc::new(RwLock::new(DbAny::new_file(path_str)?)),
        };

        db.init()?;
        debug!("Opened database at {}", path.display());

        Ok(db)
    }

    /// Create a memory backed database. Nothing survives the last handle being dropped.
    pub fn in_memory() -> Result<Self> {
        let mut db = Self {
            db: Arc::new(RwLock::new(DbAny::new_memory("cartoview")?)),
        };

        db.init()?;

        Ok(db)
    }

    fn init(&mut self) -> Result<()> {
        let alias_count = self
            .db
            .read()
            .exec(QueryBuilder::select().aliases().query())?
            .result;

        if alias_count == 0 {
            self.db.write().transaction_mut(|t| -> Result<()> {
                t.exec_mut(QueryBuilder::insert().nodes().aliases(ALIASES).query())?;

                // Signifies what the UID should be for a newly inserted element. It gets
                // incremented with every new element.
                t.exec_mut(
                    QueryBuilder::insert()
                        .values([[("next_uid", 0_u64).into()]])
                        .ids("next_uid")
                        .query(),
                )?;

                Ok(())
            })?;
        }

        let versions: Vec<ModelVersion> = self
            .db
            .read()
            .exec(
                QueryBuilder::select()
                    .elements::<ModelVersion>()
                    .search()
                    .from("model_version")
                    .where_()
                    .neighbor()
                    .query(),
            )?
            .try_into()?;

        match versions.first() {
            Some(mv) if mv.version() > CURRENT_MODEL_VERSION => {
                return Err(Error::UnsupportedModelVersion {
                    found: mv.version(),
                    supported: CURRENT_MODEL_VERSION,
                });
            }
            Some(_) => {}
            None => {
                self.db.write().transaction_mut(|t| -> Result<()> {
                    let model_version_id = inserted_id(
                        t.exec_mut(
                            QueryBuilder::insert()
                                .element(ModelVersion::default())
                                .query(),
                        )?,
                    )?;

                    t.exec_mut(
                        QueryBuilder::insert()
                            .edges()
                            .from("model_version")
                            .to(model_version_id)
                            .query(),
                    )?;

                    Ok(())
                })?;
            }
        }

        Ok(())
    }
}

/// The id of the first element an insert query produced.
pub(crate) fn inserted_id(result: QueryResult) -> Result<DbId> {
    result
        .elements
        .first()
        .map(|e| e.id)
        .ok_or(Error::EmptyResult)
}

/// The first value of the last element of a `select().values(..)` result.
pub(crate) fn single_value(mut result: QueryResult) -> Result<DbValue> {
    Ok(result
        .elements
        .pop()
        .ok_or(Error::EmptyResult)?
        .values
        .pop()
        .ok_or(Error::EmptyResult)?
        .value)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_init_inserts_model_version() {
        let db = Db::in_memory().unwrap();

        let versions: Vec<ModelVersion> = db
            .read()
            .exec(
                QueryBuilder::select()
                    .elements::<ModelVersion>()
                    .search()
                    .from("model_version")
                    .where_()
                    .neighbor()
                    .query(),
            )
            .unwrap()
            .try_into()
            .unwrap();

        assert_eq!(versions.len(), 1);
        assert_eq!(versions.first().unwrap().version(), CURRENT_MODEL_VERSION);
    }

    #[test]
    fn test_open_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");

        drop(Db::open(&path).unwrap());
        let db = Db::open(&path).unwrap();

        let alias_count = db
            .read()
            .exec(QueryBuilder::select().aliases().query())
            .unwrap()
            .result;

        assert_eq!(alias_count, 8);
    }
}
