use std::path::{Path, PathBuf};

use crate::error::TabloadError;

/// File-based Data Stores
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FileStoreType {
    Csv,
    Parquet,
}

impl std::fmt::Display for FileStoreType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Csv => write!(f, "csv"),
            Self::Parquet => write!(f, "parquet"),
        }
    }
}

impl FileStoreType {
    /// Store type implied by a file's extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension().and_then(|s| s.to_str())?.to_lowercase();

        match ext.as_str() {
            "csv" | "tsv" | "txt" => Some(Self::Csv),
            "parquet" | "pq" => Some(Self::Parquet),
            _ => None,
        }
    }
}

/// A single file to read a dataset from, plus the options its reader needs
#[derive(Clone, Debug)]
pub struct Source {
    pub path: PathBuf,
    pub store_type: FileStoreType,
    pub metadata: SourceMetadata,
}

#[derive(Clone, Debug)]
pub struct SourceMetadata {
    pub has_header: bool,
    pub delimiter: u8,
    /// Records sampled for schema inference; `None` reads them all
    pub num_rows: Option<usize>,
    pub batch_size: usize,
}

impl Default for SourceMetadata {
    fn default() -> Self {
        Self {
            has_header: true,
            delimiter: b',',
            num_rows: None,
            batch_size: 1024,
        }
    }
}

impl Source {
    pub fn files(store_type: FileStoreType) -> FileSourceBuilder {
        FileSourceBuilder::new(store_type)
    }

    /// Source whose store type is picked from the file extension
    pub fn from_path(path: impl Into<PathBuf>) -> Result<FileSourceBuilder, TabloadError> {
        let path = path.into();

        let store_type = FileStoreType::from_path(&path).ok_or_else(|| {
            TabloadError::Unsupported(format!(
                "Cannot tell file type of {}",
                path.to_string_lossy()
            ))
        })?;

        Ok(FileSourceBuilder::new(store_type).path(path))
    }

    /// Dataset name derived from the file stem
    pub fn dataset_name(&self) -> Result<String, TabloadError> {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.to_string())
            .ok_or_else(|| TabloadError::Invalid(self.path.to_string_lossy().into()))
    }
}

pub struct FileSourceBuilder {
    store_type: FileStoreType,
    path: Option<PathBuf>,
    metadata: SourceMetadata,
}

impl FileSourceBuilder {
    fn new(store_type: FileStoreType) -> Self {
        Self {
            store_type,
            path: None,
            metadata: SourceMetadata::default(),
        }
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn has_header(mut self, has_header: bool) -> Self {
        self.metadata.has_header = has_header;
        self
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.metadata.delimiter = delimiter;
        self
    }

    pub fn num_rows(mut self, num_rows: usize) -> Self {
        self.metadata.num_rows = Some(num_rows);
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.metadata.batch_size = batch_size.max(1);
        self
    }

    pub fn build(self) -> Result<Source, TabloadError> {
        let path = self
            .path
            .ok_or_else(|| TabloadError::Missing(format!("No {} path provided", self.store_type)))?;

        validate_path(&path)?;

        Ok(Source {
            path,
            store_type: self.store_type,
            metadata: self.metadata,
        })
    }
}

fn validate_path(path: &Path) -> Result<(), TabloadError> {
    if path.as_os_str().is_empty() {
        return Err(TabloadError::InvalidPath("Path cannot be empty".into()));
    }

    if !path.is_file() {
        return Err(TabloadError::InvalidPath(
            path.to_string_lossy().into_owned(),
        ));
    }

    Ok(())
}
