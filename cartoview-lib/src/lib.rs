//! Core library for the Cartoview app manager.
//!
//! Installed application packages ([`App`]), the categories they are filed
//! under ([`AppTag`]) and the catalog resources users create from them
//! ([`AppInstance`]) all live behind a single [`Repository`]. Saving or
//! deleting an entity runs its lifecycle hooks, see [`repository::lifecycle`].

pub mod fs;
pub mod repository;

pub use repository::{
    App, AppInstance, AppInstanceDraft, AppTag, NewApp, Repository, RepositoryBuilder,
    entities::{Error, Result, UniqueConstraint},
};
