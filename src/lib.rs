#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod error;
mod loader;

mod types;

pub use error::{Result, TabloadError};

pub use loader::{
    DEFAULT_TABLE_NAME, Dataset, DatasetReader, Dialect, FileStoreType, LoadReport, LoaderConfig,
    ReaderRegistry, SchemaLoader, Session, Source, StorageBackend, StorageConfig, StorageHandle,
    conversion::{CellValue, Record, StagedBatch},
    datastore::{FileSourceBuilder, SourceMetadata},
    inference::{CsvDatasetReader, ParquetDatasetReader},
    pipeline::LoaderConfigBuilder,
    store::StoragePool,
};

pub use types::{DEFAULT_STRING_LENGTH, FieldDef, IDENTITY_FIELD, ScalarKind, TableDef};
