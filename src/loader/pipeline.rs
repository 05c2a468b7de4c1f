use std::{sync::Arc, time::Duration};

use tracing::{info, warn};

use crate::{
    error::TabloadError,
    loader::{
        datastore::Source,
        inference::{Dataset, ReaderRegistry},
        report::LoadReport,
        store::StorageHandle,
    },
    types::{DEFAULT_STRING_LENGTH, TableDef},
};

pub const DEFAULT_TABLE_NAME: &str = "dynamic_table";

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub table_name: String,
    pub string_length: u32,
    /// Reject values longer than `string_length` on every backend, SQLite included
    pub strict_strings: bool,
    pub timeout: Option<Duration>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        LoaderConfig {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            string_length: DEFAULT_STRING_LENGTH,
            strict_strings: false,
            timeout: None,
        }
    }
}

impl LoaderConfig {
    pub fn builder() -> LoaderConfigBuilder {
        LoaderConfigBuilder::default()
    }
}

#[derive(Debug, Default)]
pub struct LoaderConfigBuilder {
    config: LoaderConfig,
}

impl LoaderConfigBuilder {
    pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
        self.config.table_name = table_name.into();
        self
    }

    pub fn string_length(mut self, string_length: u32) -> Self {
        self.config.string_length = string_length;
        self
    }

    pub fn strict_strings(mut self, strict_strings: bool) -> Self {
        self.config.strict_strings = strict_strings;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<LoaderConfig, TabloadError> {
        if self.config.table_name.trim().is_empty() {
            return Err(TabloadError::Invalid(
                "Table name cannot be empty".to_string(),
            ));
        }

        if self.config.string_length == 0 {
            return Err(TabloadError::Invalid(
                "String length must be greater than 0".to_string(),
            ));
        }

        Ok(self.config)
    }
}

/// Reads a source file, synthesizes its table and loads it into storage
pub struct SchemaLoader {
    pub(crate) config: Arc<LoaderConfig>,
    pub(crate) registry: ReaderRegistry,
}

impl std::fmt::Debug for SchemaLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaLoader")
            .field("config", &self.config)
            .field("readers", &self.registry.size())
            .finish()
    }
}

impl Default for SchemaLoader {
    fn default() -> Self {
        SchemaLoader::new(LoaderConfig::default())
    }
}

impl SchemaLoader {
    pub fn new(config: LoaderConfig) -> Self {
        SchemaLoader {
            config: Arc::new(config),
            registry: ReaderRegistry::new(),
        }
    }

    /// Replaces the default csv/parquet readers
    pub fn with_registry(mut self, registry: ReaderRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn read(&self, source: &Source) -> Result<Dataset, TabloadError> {
        self.registry.read(source)
    }

    pub fn synthesize(&self, dataset: &Dataset) -> TableDef {
        dataset.synthesize_schema(self.config.table_name.clone(), self.config.string_length)
    }

    /// The function `load` writes the dataset into storage under the configured
    /// deadline, if any.
    ///
    /// Arguments:
    ///
    /// * `handle`: storage the table lives in.
    /// * `dataset`: rows to insert.
    /// * `table`: table definition, usually from [`SchemaLoader::synthesize`].
    ///
    /// Returns:
    ///
    /// The [`LoadReport`] of the load, or the setup, save or timeout failure.
    pub async fn load(
        &self,
        handle: &StorageHandle,
        dataset: &Dataset,
        table: &TableDef,
    ) -> Result<LoadReport, TabloadError> {
        let strict = self.config.strict_strings;

        let Some(deadline) = self.config.timeout else {
            return handle.load_with(dataset, table, strict).await;
        };

        // Dropping the pending load rolls back its transaction and releases its session
        match tokio::time::timeout(deadline, handle.load_with(dataset, table, strict)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(table = %table.name, ?deadline, "Load timed out");

                Err(TabloadError::Timeout {
                    secs: deadline.as_secs(),
                })
            }
        }
    }

    /// Reads, synthesizes and loads in one call
    pub async fn run(
        &self,
        handle: &StorageHandle,
        source: &Source,
    ) -> Result<LoadReport, TabloadError> {
        let dataset = self.read(source)?;
        let table = self.synthesize(&dataset);

        info!(
            dataset = %dataset.name,
            rows = dataset.num_rows(),
            fields = table.field_count(),
            "Synthesized table {}",
            table.name
        );

        self.load(handle, &dataset, &table).await
    }
}
