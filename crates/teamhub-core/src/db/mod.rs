//! Local persistent store (libSQL)

mod collection;
mod connection;
mod meta_repository;
mod migrations;
mod queue_repository;
mod records;

pub use collection::{CollectionRepository, LibSqlCollection};
pub use connection::Database;
pub use meta_repository::{LibSqlMetaRepository, MetaRepository};
pub use queue_repository::{LibSqlQueueRepository, QueueRepository};
pub use records::StoredRecord;
