use arrow::{
    array::RecordBatch,
    datatypes::{DataType, Schema, SchemaRef},
};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

mod file;

pub use file::{CsvDatasetReader, ParquetDatasetReader};

use crate::{
    error::TabloadError,
    loader::datastore::{FileStoreType, Source},
    types::TableDef,
};

// =================================================
// Tabular Dataset
// =================================================

/// In-memory table of named, typed columns and ordered rows
#[derive(Debug, Clone)]
pub struct Dataset {
    pub name: String,
    pub schema: SchemaRef,
    pub batches: Vec<RecordBatch>,
}

impl Dataset {
    /// The function `new` checks that column names are unique and that every batch
    /// carries the dataset schema.
    pub fn new(
        name: impl Into<String>,
        schema: SchemaRef,
        batches: Vec<RecordBatch>,
    ) -> Result<Self, TabloadError> {
        let name = name.into();

        let mut seen = HashSet::new();
        for field in schema.fields() {
            if !seen.insert(field.name().as_str()) {
                return Err(TabloadError::Invalid(format!(
                    "Duplicate column {} in dataset {}",
                    field.name(),
                    name
                )));
            }
        }

        if let Some(batch) = batches
            .iter()
            .find(|b| b.schema().fields() != schema.fields())
        {
            return Err(TabloadError::Invalid(format!(
                "Batch schema {:?} does not match dataset {}",
                batch.schema(),
                name
            )));
        }

        Ok(Self {
            name,
            schema,
            batches,
        })
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: Arc::new(Schema::empty()),
            batches: Vec::new(),
        }
    }

    pub fn from_batch(name: impl Into<String>, batch: RecordBatch) -> Result<Self, TabloadError> {
        Self::new(name, batch.schema(), vec![batch])
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(|b| b.num_rows()).sum()
    }

    pub fn num_columns(&self) -> usize {
        self.schema.fields().len()
    }

    /// Column name to Arrow type, in column order
    pub fn column_types(&self) -> Vec<(String, DataType)> {
        self.schema
            .fields()
            .iter()
            .map(|f| (f.name().clone(), f.data_type().clone()))
            .collect()
    }

    /// The function `synthesize_schema` derives a table definition from the dataset's
    /// column types.
    ///
    /// Arguments:
    ///
    /// * `table_name`: name of the table to create.
    /// * `max_length`: bound for string-like columns.
    pub fn synthesize_schema(&self, table_name: impl Into<String>, max_length: u32) -> TableDef {
        TableDef::from_arrow_schema(table_name, &self.schema, max_length)
    }
}

// =================================================
// Dataset Reader Registry
// =================================================

/// Registry of available dataset readers
#[derive(Debug)]
pub struct ReaderRegistry {
    readers: HashMap<String, Box<dyn DatasetReader>>,
}

impl Default for ReaderRegistry {
    fn default() -> Self {
        let csv_reader = CsvDatasetReader::new();
        let parquet_reader = ParquetDatasetReader::new();

        let mut readers: HashMap<String, Box<dyn DatasetReader>> = HashMap::new();

        readers.insert(
            csv_reader.engine_name().to_lowercase(),
            Box::new(csv_reader),
        );

        readers.insert(
            parquet_reader.engine_name().to_lowercase(),
            Box::new(parquet_reader),
        );

        Self { readers }
    }
}

impl ReaderRegistry {
    pub fn new() -> Self {
        ReaderRegistry::default()
    }

    pub fn size(&self) -> usize {
        self.readers.len()
    }

    /// Adds a reader keyed by its engine name. Can be used to replace an existing reader
    pub fn add_reader(&mut self, reader: Box<dyn DatasetReader>) {
        self.readers
            .insert(reader.engine_name().to_lowercase(), reader);
    }

    pub fn get_reader(&self, store_type: &FileStoreType) -> Option<&dyn DatasetReader> {
        self.readers
            .values()
            .find(|r| r.can_handle(store_type))
            .map(|r| r.as_ref())
    }

    pub fn read(&self, source: &Source) -> Result<Dataset, TabloadError> {
        let reader = self.get_reader(&source.store_type).ok_or_else(|| {
            TabloadError::Unsupported(format!(
                "No reader available for store type: {}",
                source.store_type
            ))
        })?;

        reader.read(source)
    }
}

/// Trait for turning a source file into a [`Dataset`]
pub trait DatasetReader: std::fmt::Debug + Send + Sync {
    fn read(&self, source: &Source) -> Result<Dataset, TabloadError>;

    fn can_handle(&self, store_type: &FileStoreType) -> bool;

    fn engine_name(&self) -> &str;
}
