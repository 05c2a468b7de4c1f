#[derive(Debug, thiserror::Error)]
pub enum TabloadError {
    #[error("Error connecting to {backend} database: {source}")]
    Connect {
        backend: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("Error creating table {table}: {source}")]
    Setup {
        table: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("Error saving to database: {source}")]
    Save {
        table: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Load did not finish within {secs}s")]
    Timeout { secs: u64 },
    #[error("{0}")]
    Invalid(String),
    #[error("Unable to access path provided: {0}")]
    InvalidPath(String),
    #[error("Missing: {0}")]
    Missing(String),
    #[error("Unsupported: {0}")]
    Unsupported(String),
    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),
    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl TabloadError {
    pub fn setup(table: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Setup {
            table: table.into(),
            source,
        }
    }

    pub fn save(
        table: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Save {
            table: table.into(),
            source: source.into(),
        }
    }

    pub fn is_setup_failure(&self) -> bool {
        matches!(self, Self::Setup { .. } | Self::Connect { .. })
    }

    pub fn is_save_failure(&self) -> bool {
        matches!(self, Self::Save { .. })
    }
}

pub type Result<T> = std::result::Result<T, TabloadError>;
