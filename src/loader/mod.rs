//! Core implementations to turn a tabular file into a populated database table
//!
//! Reading, schema synthesis and the transactional load each live in their own module, and
//! readers can be swapped out through the registry.
//!
//! Overview
//! - [`Dataset`]: Named, typed columns and ordered rows read from a source file.
//! - [`DatasetReader`]: A trait for reading a [`Source`] into a [`Dataset`].
//! - [`Dialect`]: Quoting, placeholder and DDL rules for a storage backend.
//! - [`LoaderConfig`]: Table name, string bound and deadline of a load.
//! - [`LoadReport`]: Outcome of a successful load.
//! - [`ReaderRegistry`]: A type for managing dataset readers.
//! - [`SchemaLoader`]: A public type that reads, synthesizes and loads.
//! - [`Session`]: A scoped connection used by exactly one load.
//! - [`Source`]: A type describing the input file.
//! - [`StorageConfig`]: A type describing how to reach a storage backend.
//! - [`StorageHandle`]: The connection pool loads run against.
//!

pub mod catalog;
pub mod conversion;
pub mod datastore;
pub mod dialect;
pub mod inference;
pub mod pipeline;
pub mod report;
pub mod store;

pub use catalog::{StorageBackend, StorageConfig};
pub use datastore::{FileStoreType, Source};
pub use dialect::Dialect;
pub use inference::{Dataset, DatasetReader, ReaderRegistry};
pub use pipeline::{DEFAULT_TABLE_NAME, LoaderConfig, SchemaLoader};
pub use report::LoadReport;
pub use store::{Session, StorageHandle};
