use arrow::{
    array::RecordBatch,
    csv::{ReaderBuilder, reader::Format},
};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::{
    fs::File,
    io::{Seek, SeekFrom},
    sync::Arc,
};
use tracing::{debug, info_span};

use crate::{
    error::TabloadError,
    loader::{
        datastore::{FileStoreType, Source},
        inference::{Dataset, DatasetReader},
    },
};

// =================================================
// CSV Dataset Reader
// =================================================
#[derive(Debug, Default)]
pub struct CsvDatasetReader;

impl CsvDatasetReader {
    pub fn new() -> Self {
        Self
    }

    fn read_csv(&self, source: &Source) -> Result<Dataset, TabloadError> {
        let name = source.dataset_name()?;
        let mut file = File::open(&source.path)?;

        // 1. Infer schema from file
        let format = Format::default()
            .with_header(source.metadata.has_header)
            .with_delimiter(source.metadata.delimiter);

        let (schema, records) = format.infer_schema(&mut file, source.metadata.num_rows)?;

        debug!(
            columns = schema.fields().len(),
            records, "Inferred csv schema"
        );

        if schema.fields().is_empty() {
            return Ok(Dataset::empty(name));
        }

        file.seek(SeekFrom::Start(0))?;

        // 2. Read every batch under the inferred schema
        let schema = Arc::new(schema);
        let csv_reader = ReaderBuilder::new(schema.clone())
            .with_header(source.metadata.has_header)
            .with_delimiter(source.metadata.delimiter)
            .with_batch_size(source.metadata.batch_size)
            .build(file)?;

        let batches = csv_reader.collect::<Result<Vec<RecordBatch>, _>>()?;

        Dataset::new(name, schema, batches)
    }
}

impl DatasetReader for CsvDatasetReader {
    fn read(&self, source: &Source) -> Result<Dataset, TabloadError> {
        let _span = info_span!("read_csv", path = %source.path.display()).entered();

        self.read_csv(source)
    }

    fn can_handle(&self, store_type: &FileStoreType) -> bool {
        matches!(store_type, FileStoreType::Csv)
    }

    fn engine_name(&self) -> &str {
        "csv"
    }
}

// =================================================
// Parquet Dataset Reader
// =================================================
#[derive(Debug, Default)]
pub struct ParquetDatasetReader;

impl ParquetDatasetReader {
    pub fn new() -> Self {
        Self
    }

    fn read_parquet(&self, source: &Source) -> Result<Dataset, TabloadError> {
        let name = source.dataset_name()?;
        let file = File::open(&source.path)?;

        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?
            .with_batch_size(source.metadata.batch_size);
        let schema = builder.schema().clone();

        let batches = builder
            .build()?
            .collect::<Result<Vec<RecordBatch>, _>>()?;

        debug!(
            columns = schema.fields().len(),
            batches = batches.len(),
            "Read parquet file"
        );

        Dataset::new(name, schema, batches)
    }
}

impl DatasetReader for ParquetDatasetReader {
    fn read(&self, source: &Source) -> Result<Dataset, TabloadError> {
        let _span = info_span!("read_parquet", path = %source.path.display()).entered();

        self.read_parquet(source)
    }

    fn can_handle(&self, store_type: &FileStoreType) -> bool {
        matches!(store_type, FileStoreType::Parquet)
    }

    fn engine_name(&self) -> &str {
        "parquet"
    }
}

#[cfg(test)]
mod tests {
    use arrow::{
        array::{Float64Array, Int64Array, StringArray},
        datatypes::{DataType, Field, Schema},
    };
    use parquet::arrow::ArrowWriter;
    use std::{io::Write, path::Path};

    use super::*;
    use crate::types::ScalarKind;

    fn write_file(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_csv_inference() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "people.csv",
            "id,age,score,active,joined,seen,name\n\
             1,31,1.5,true,2023-01-01,2023-01-01T10:00:00,ann\n\
             2,45,2.25,false,2023-01-02,2023-01-02T11:30:00,bob\n\
             3,27,3.0,true,2023-01-03,2023-01-03T12:45:00,cy\n",
        );

        let source = Source::files(FileStoreType::Csv)
            .path(&path)
            .build()
            .unwrap();

        let dataset = CsvDatasetReader::new().read(&source).unwrap();

        assert_eq!(dataset.name, "people");
        assert_eq!(dataset.num_rows(), 3);
        assert_eq!(dataset.num_columns(), 7);

        let table = dataset.synthesize_schema("dynamic_table", 255);
        let kinds: Vec<(&str, ScalarKind)> = table
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.kind))
            .collect();

        assert_eq!(
            kinds,
            vec![
                ("age", ScalarKind::Integer),
                ("score", ScalarKind::Float),
                ("active", ScalarKind::Boolean),
                ("joined", ScalarKind::Date),
                ("seen", ScalarKind::DateTime),
                ("name", ScalarKind::string()),
            ]
        );
    }

    #[test]
    fn test_csv_without_header_and_custom_delimiter() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "plain.tsv", "1\tx\n2\ty\n");

        let source = Source::files(FileStoreType::Csv)
            .path(&path)
            .has_header(false)
            .delimiter(b'\t')
            .build()
            .unwrap();

        let dataset = CsvDatasetReader::new().read(&source).unwrap();

        assert_eq!(dataset.num_rows(), 2);
        assert_eq!(dataset.num_columns(), 2);
        assert_eq!(dataset.schema.field(0).data_type(), &DataType::Int64);
    }

    #[test]
    fn test_csv_duplicate_headers_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "dup.csv", "a,a\n1,2\n");

        let source = Source::files(FileStoreType::Csv)
            .path(&path)
            .build()
            .unwrap();

        let result = CsvDatasetReader::new().read(&source);

        assert!(matches!(result, Err(TabloadError::Invalid(_))));
    }

    #[test]
    fn test_empty_csv_is_empty_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "empty.csv", "");

        let source = Source::files(FileStoreType::Csv)
            .path(&path)
            .build()
            .unwrap();

        let dataset = CsvDatasetReader::new().read(&source).unwrap();

        assert_eq!(dataset.num_columns(), 0);
        assert_eq!(dataset.num_rows(), 0);
    }

    #[test]
    fn test_parquet_inference() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.parquet");

        let schema = Arc::new(Schema::new(vec![
            Field::new("count", DataType::Int64, false),
            Field::new("ratio", DataType::Float64, true),
            Field::new("label", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int64Array::from(vec![1, 2])),
                Arc::new(Float64Array::from(vec![Some(0.5), None])),
                Arc::new(StringArray::from(vec![Some("a"), Some("b")])),
            ],
        )
        .unwrap();

        let file = File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let source = Source::from_path(&path).unwrap().build().unwrap();
        let dataset = ParquetDatasetReader::new().read(&source).unwrap();

        assert_eq!(dataset.name, "metrics");
        assert_eq!(dataset.num_rows(), 2);
        assert_eq!(
            dataset.column_types(),
            vec![
                ("count".to_string(), DataType::Int64),
                ("ratio".to_string(), DataType::Float64),
                ("label".to_string(), DataType::Utf8),
            ]
        );
    }
}
