use std::{
    str::FromStr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Instant,
};

use sqlx::{
    Connection, MySql, MySqlPool, PgPool, Postgres, Sqlite, SqlitePool, pool::PoolConnection,
    sqlite::SqliteConnectOptions,
};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::{
    error::TabloadError,
    loader::{
        catalog::{StorageBackend, StorageConfig},
        conversion::{CellValue, StagedBatch},
        dialect::Dialect,
        inference::Dataset,
        report::LoadReport,
    },
    types::{ScalarKind, TableDef},
};

#[derive(Clone, Debug)]
pub enum StoragePool {
    MySQL(MySqlPool),
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

#[derive(Debug, Default)]
struct SessionCounters {
    opened: AtomicUsize,
    released: AtomicUsize,
}

/// Connection pool to one storage backend.
///
/// The handle is owned by the caller and passed by reference to every load. Each
/// load works on a [`Session`] acquired from it.
#[derive(Debug)]
pub struct StorageHandle {
    backend: StorageBackend,
    dialect: Dialect,
    pool: StoragePool,
    counters: Arc<SessionCounters>,
}

impl StorageHandle {
    pub async fn connect(config: &StorageConfig) -> Result<Self, TabloadError> {
        let conn_str = config.connection_string()?;

        let connect_error = |source| TabloadError::Connect {
            backend: config.backend.to_string(),
            source,
        };

        let pool = match config.backend {
            StorageBackend::MySQL => StoragePool::MySQL(
                MySqlPool::connect(&conn_str)
                    .await
                    .map_err(connect_error)?,
            ),
            StorageBackend::PostgreSQL => {
                StoragePool::Postgres(PgPool::connect(&conn_str).await.map_err(connect_error)?)
            }
            StorageBackend::SQLite => {
                let options = SqliteConnectOptions::from_str(&conn_str)
                    .map_err(connect_error)?
                    .create_if_missing(true);

                StoragePool::Sqlite(
                    SqlitePool::connect_with(options)
                        .await
                        .map_err(connect_error)?,
                )
            }
        };

        info!(backend = %config.backend, "Connected to storage backend");

        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: StoragePool) -> Self {
        let backend = match &pool {
            StoragePool::MySQL(_) => StorageBackend::MySQL,
            StoragePool::Postgres(_) => StorageBackend::PostgreSQL,
            StoragePool::Sqlite(_) => StorageBackend::SQLite,
        };

        Self {
            dialect: Dialect::from(&backend),
            backend,
            pool,
            counters: Arc::new(SessionCounters::default()),
        }
    }

    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn as_sqlite(&self) -> Option<&SqlitePool> {
        match &self.pool {
            StoragePool::Sqlite(pool) => Some(pool),
            _ => None,
        }
    }

    pub fn sessions_opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn sessions_released(&self) -> usize {
        self.counters.released.load(Ordering::SeqCst)
    }

    /// Acquires one pooled connection. It goes back to the pool when the session drops.
    pub async fn session(&self) -> Result<Session, sqlx::Error> {
        let conn = match &self.pool {
            StoragePool::MySQL(pool) => SessionConn::MySQL(pool.acquire().await?),
            StoragePool::Postgres(pool) => SessionConn::Postgres(pool.acquire().await?),
            StoragePool::Sqlite(pool) => SessionConn::Sqlite(pool.acquire().await?),
        };

        let id = self.counters.opened.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(session = id, "Session opened");

        Ok(Session {
            id,
            conn,
            dialect: self.dialect,
            counters: self.counters.clone(),
        })
    }

    /// The function `load` writes every row of `dataset` into the table described by
    /// `table`, creating the table first when it does not exist.
    ///
    /// Rows go in one transaction. A failure while creating the table is a setup
    /// failure; a failure on any row or on commit rolls everything back and is a save
    /// failure. The session is released on every path.
    ///
    /// Arguments:
    ///
    /// * `dataset`: rows to insert, in dataset order.
    /// * `table`: schema synthesized from the dataset.
    ///
    /// Returns:
    ///
    /// A [`LoadReport`] with the number of rows inserted.
    pub async fn load(
        &self,
        dataset: &Dataset,
        table: &TableDef,
    ) -> Result<LoadReport, TabloadError> {
        self.load_with(dataset, table, false).await
    }

    /// Same as [`StorageHandle::load`]; `strict_strings` rejects values longer than
    /// their `VARCHAR(n)` even on backends that would store them.
    pub async fn load_with(
        &self,
        dataset: &Dataset,
        table: &TableDef,
        strict_strings: bool,
    ) -> Result<LoadReport, TabloadError> {
        let load_id = Uuid::now_v7();
        let started = Instant::now();
        let span = info_span!("load", %load_id, table = %table.name, backend = %self.backend);

        async move {
            let mut session = self
                .session()
                .await
                .map_err(|e| TabloadError::setup(&table.name, e))?;

            session.ensure_table(table).await?;

            let rows_inserted = session.insert_all(dataset, table, strict_strings).await?;

            let report = LoadReport {
                load_id,
                table_name: table.name.clone(),
                rows_inserted,
                elapsed: started.elapsed(),
            };

            info!(rows = rows_inserted, "Data successfully saved to database");

            Ok(report)
        }
        .instrument(span)
        .await
    }

    pub async fn close(&self) {
        match &self.pool {
            StoragePool::MySQL(pool) => pool.close().await,
            StoragePool::Postgres(pool) => pool.close().await,
            StoragePool::Sqlite(pool) => pool.close().await,
        }
    }
}

enum SessionConn {
    MySQL(PoolConnection<MySql>),
    Postgres(PoolConnection<Postgres>),
    Sqlite(PoolConnection<Sqlite>),
}

/// A connection checked out of a [`StorageHandle`] for the length of one load
pub struct Session {
    id: usize,
    conn: SessionConn,
    dialect: Dialect,
    counters: Arc<SessionCounters>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("dialect", &self.dialect)
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
        debug!(session = self.id, "Session released");
    }
}

macro_rules! bind_cell {
    ($query:expr, $value:expr, $kind:expr) => {
        match ($value, $kind) {
            (CellValue::Integer(v), _) => $query.bind(*v),
            (CellValue::Float(v), _) => $query.bind(*v),
            (CellValue::Boolean(v), _) => $query.bind(*v),
            (CellValue::Date(v), _) => $query.bind(*v),
            (CellValue::DateTime(v), _) => $query.bind(*v),
            (CellValue::Text(v), _) => $query.bind(v.clone()),
            (CellValue::Null, ScalarKind::Integer) => $query.bind(None::<i64>),
            (CellValue::Null, ScalarKind::Float) => $query.bind(None::<f64>),
            (CellValue::Null, ScalarKind::Boolean) => $query.bind(None::<bool>),
            (CellValue::Null, ScalarKind::Date) => $query.bind(None::<chrono::NaiveDate>),
            (CellValue::Null, ScalarKind::DateTime) => {
                $query.bind(None::<chrono::NaiveDateTime>)
            }
            (CellValue::Null, ScalarKind::String { .. } | ScalarKind::Text) => {
                $query.bind(None::<String>)
            }
        }
    };
}

// Stages every row of the dataset inside one transaction on `$conn`, then commits.
// Any failure rolls the whole transaction back.
macro_rules! insert_in_transaction {
    ($conn:expr, $dataset:expr, $table:expr, $sql:expr, $strict:expr) => {{
        let mut tx = $conn
            .begin()
            .await
            .map_err(|e| TabloadError::save(&$table.name, e))?;

        let kinds = $table.insert_kinds();

        let staged = async {
            let mut inserted = 0u64;

            for batch in &$dataset.batches {
                let staged = StagedBatch::new($table, batch)?.with_string_bounds($strict);

                for record in staged.records() {
                    let record = record?;
                    let mut query = sqlx::query($sql);

                    for (value, kind) in record.values.iter().zip(&kinds) {
                        query = bind_cell!(query, value, kind);
                    }

                    query.execute(&mut *tx).await?;
                    inserted += 1;
                }
            }

            Ok::<u64, TabloadError>(inserted)
        }
        .await;

        match staged {
            Ok(inserted) => {
                tx.commit()
                    .await
                    .map_err(|e| TabloadError::save(&$table.name, e))?;

                Ok(inserted)
            }
            Err(e) => {
                warn!(error = %e, "Rolling back load");

                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "Rollback failed");
                }

                Err(TabloadError::save(&$table.name, e))
            }
        }
    }};
}

impl Session {
    /// Creates the table unless it already exists
    pub async fn ensure_table(&mut self, table: &TableDef) -> Result<(), TabloadError> {
        let sql = table.create_table_sql(self.dialect);
        debug!(%sql, "Ensuring table");

        let result = match &mut self.conn {
            SessionConn::MySQL(conn) => {
                sqlx::query(&sql).execute(&mut **conn).await.map(|_| ())
            }
            SessionConn::Postgres(conn) => {
                sqlx::query(&sql).execute(&mut **conn).await.map(|_| ())
            }
            SessionConn::Sqlite(conn) => {
                sqlx::query(&sql).execute(&mut **conn).await.map(|_| ())
            }
        };

        result.map_err(|e| TabloadError::setup(&table.name, e))?;

        Ok(())
    }

    /// Inserts all rows of `dataset` as one transaction and returns how many were written.
    /// With `strict_strings`, values longer than their `VARCHAR(n)` fail the load on
    /// every backend.
    pub async fn insert_all(
        &mut self,
        dataset: &Dataset,
        table: &TableDef,
        strict_strings: bool,
    ) -> Result<u64, TabloadError> {
        let sql = table.insert_sql(self.dialect);
        debug!(%sql, rows = dataset.num_rows(), "Inserting rows");

        match &mut self.conn {
            SessionConn::MySQL(conn) => {
                insert_in_transaction!(conn, dataset, table, &sql, strict_strings)
            }
            SessionConn::Postgres(conn) => {
                insert_in_transaction!(conn, dataset, table, &sql, strict_strings)
            }
            SessionConn::Sqlite(conn) => {
                insert_in_transaction!(conn, dataset, table, &sql, strict_strings)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{path::Path, sync::Arc};

    use arrow::{
        array::{ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray},
        datatypes::{DataType, Field, Schema},
    };

    use super::*;

    async fn sqlite_handle(dir: &Path) -> StorageHandle {
        let path = dir.join("example.db");
        let config =
            StorageConfig::new_file_backend(StorageBackend::SQLite, path.to_string_lossy())
                .unwrap();

        StorageHandle::connect(&config).await.unwrap()
    }

    fn dataset(columns: Vec<(&str, DataType, ArrayRef)>) -> Dataset {
        let fields: Vec<Field> = columns
            .iter()
            .map(|(name, data_type, _)| Field::new(*name, data_type.clone(), true))
            .collect();
        let arrays: Vec<ArrayRef> = columns.into_iter().map(|(_, _, a)| a).collect();

        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).unwrap();

        Dataset::from_batch("test", batch).unwrap()
    }

    fn simple_dataset() -> Dataset {
        dataset(vec![
            (
                "number",
                DataType::Int64,
                Arc::new(Int64Array::from(vec![1, 2, 3])),
            ),
            (
                "text",
                DataType::Utf8,
                Arc::new(StringArray::from(vec!["a", "b", "c"])),
            ),
        ])
    }

    async fn count_rows(handle: &StorageHandle, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM \"{table}\""))
            .fetch_one(handle.as_sqlite().unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_load_inserts_all_rows() {
        let dir = tempfile::tempdir().unwrap();
        let handle = sqlite_handle(dir.path()).await;

        let dataset = simple_dataset();
        let table = dataset.synthesize_schema("dynamic_table", 255);

        let report = handle.load(&dataset, &table).await.unwrap();

        assert_eq!(report.rows_inserted, 3);
        assert_eq!(report.table_name, "dynamic_table");
        assert_eq!(count_rows(&handle, "dynamic_table").await, 3);

        let rows: Vec<(i64, i64, String)> =
            sqlx::query_as("SELECT id, number, text FROM dynamic_table ORDER BY id")
                .fetch_all(handle.as_sqlite().unwrap())
                .await
                .unwrap();
        assert_eq!(
            rows,
            vec![
                (1, 1, "a".to_string()),
                (2, 2, "b".to_string()),
                (3, 3, "c".to_string())
            ]
        );

        assert_eq!(handle.sessions_opened(), 1);
        assert_eq!(handle.sessions_released(), 1);
    }

    #[tokio::test]
    async fn test_constraint_violation_rolls_back_everything() {
        let dir = tempfile::tempdir().unwrap();
        let handle = sqlite_handle(dir.path()).await;

        sqlx::query(
            "CREATE TABLE dynamic_table (id INTEGER PRIMARY KEY AUTOINCREMENT, number INTEGER UNIQUE, text VARCHAR(255))",
        )
        .execute(handle.as_sqlite().unwrap())
        .await
        .unwrap();

        // second row repeats the first row's unique value
        let dataset = dataset(vec![
            (
                "number",
                DataType::Int64,
                Arc::new(Int64Array::from(vec![1, 1, 2])),
            ),
            (
                "text",
                DataType::Utf8,
                Arc::new(StringArray::from(vec!["a", "b", "c"])),
            ),
        ]);
        let table = dataset.synthesize_schema("dynamic_table", 255);

        let result = handle.load(&dataset, &table).await;

        let err = result.unwrap_err();
        assert!(err.is_save_failure());
        assert!(err.to_string().starts_with("Error saving to database: "));
        assert_eq!(count_rows(&handle, "dynamic_table").await, 0);
        assert_eq!(handle.sessions_opened(), 1);
        assert_eq!(handle.sessions_released(), 1);
    }

    #[tokio::test]
    async fn test_staging_failure_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let handle = sqlite_handle(dir.path()).await;

        let dataset = dataset(vec![(
            "text",
            DataType::Utf8,
            Arc::new(StringArray::from(vec!["ok", "this one is too long", "ok"])),
        )]);
        let table = dataset.synthesize_schema("bounded", 5);

        let err = handle.load_with(&dataset, &table, true).await.unwrap_err();

        assert!(err.is_save_failure());
        assert_eq!(count_rows(&handle, "bounded").await, 0);
        assert_eq!(handle.sessions_released(), 1);

        // sqlite keeps over-long values unless strict
        let report = handle.load(&dataset, &table).await.unwrap();
        assert_eq!(report.rows_inserted, 3);
        assert_eq!(count_rows(&handle, "bounded").await, 3);
    }

    #[tokio::test]
    async fn test_source_ids_fill_the_key() {
        let dir = tempfile::tempdir().unwrap();
        let handle = sqlite_handle(dir.path()).await;

        let dataset = dataset(vec![
            (
                "ID",
                DataType::Int64,
                Arc::new(Int64Array::from(vec![7, 8, 9])),
            ),
            (
                "text",
                DataType::Utf8,
                Arc::new(StringArray::from(vec!["a", "b", "c"])),
            ),
        ]);
        let table = dataset.synthesize_schema("keyed", 255);

        handle.load(&dataset, &table).await.unwrap();

        let rows: Vec<(i64, String)> = sqlx::query_as("SELECT id, text FROM keyed ORDER BY id")
            .fetch_all(handle.as_sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(
            rows,
            vec![
                (7, "a".to_string()),
                (8, "b".to_string()),
                (9, "c".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_duplicate_source_ids_roll_back() {
        let dir = tempfile::tempdir().unwrap();
        let handle = sqlite_handle(dir.path()).await;

        let dataset = dataset(vec![
            (
                "id",
                DataType::Int64,
                Arc::new(Int64Array::from(vec![7, 7, 9])),
            ),
            (
                "text",
                DataType::Utf8,
                Arc::new(StringArray::from(vec!["a", "b", "c"])),
            ),
        ]);
        let table = dataset.synthesize_schema("dynamic_table", 255);

        let err = handle.load(&dataset, &table).await.unwrap_err();

        assert!(err.is_save_failure());
        assert_eq!(count_rows(&handle, "dynamic_table").await, 0);
        assert_eq!(handle.sessions_opened(), 1);
        assert_eq!(handle.sessions_released(), 1);
    }

    #[tokio::test]
    async fn test_url_connection_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.db");
        let config = StorageConfig::from_url(format!("sqlite://{}", path.display())).unwrap();

        let handle = StorageHandle::connect(&config).await.unwrap();

        assert!(path.is_file());
        assert_eq!(handle.backend(), &StorageBackend::SQLite);
        handle.close().await;
    }

    #[tokio::test]
    async fn test_repeated_load_reuses_existing_table() {
        let dir = tempfile::tempdir().unwrap();
        let handle = sqlite_handle(dir.path()).await;

        let first = simple_dataset();
        let second = simple_dataset();

        handle
            .load(&first, &first.synthesize_schema("dynamic_table", 255))
            .await
            .unwrap();
        handle
            .load(&second, &second.synthesize_schema("dynamic_table", 255))
            .await
            .unwrap();

        assert_eq!(count_rows(&handle, "dynamic_table").await, 6);
        assert_eq!(handle.sessions_opened(), 2);
        assert_eq!(handle.sessions_released(), 2);
    }

    #[tokio::test]
    async fn test_ddl_failure_is_setup_failure() {
        let dir = tempfile::tempdir().unwrap();
        let handle = sqlite_handle(dir.path()).await;
        let pool = handle.as_sqlite().unwrap();

        // an index already owns the table's name
        sqlx::query("CREATE TABLE other (x INTEGER)")
            .execute(pool)
            .await
            .unwrap();
        sqlx::query("CREATE INDEX dynamic_table ON other (x)")
            .execute(pool)
            .await
            .unwrap();

        let dataset = simple_dataset();
        let table = dataset.synthesize_schema("dynamic_table", 255);

        let err = handle.load(&dataset, &table).await.unwrap_err();

        assert!(err.is_setup_failure());
        assert!(
            err.to_string()
                .starts_with("Error creating table dynamic_table: ")
        );
        assert_eq!(handle.sessions_opened(), 1);
        assert_eq!(handle.sessions_released(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_database_is_setup_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("nested").join("x.db");
        let config =
            StorageConfig::new_file_backend(StorageBackend::SQLite, path.to_string_lossy())
                .unwrap();

        let err = StorageHandle::connect(&config).await.unwrap_err();

        assert!(err.is_setup_failure());
    }

    #[tokio::test]
    async fn test_empty_dataset_creates_identity_only_table() {
        let dir = tempfile::tempdir().unwrap();
        let handle = sqlite_handle(dir.path()).await;

        let dataset = Dataset::empty("nothing");
        let table = dataset.synthesize_schema("empty_table", 255);

        let report = handle.load(&dataset, &table).await.unwrap();

        assert_eq!(report.rows_inserted, 0);
        let columns: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info('empty_table')")
                .fetch_all(handle.as_sqlite().unwrap())
                .await
                .unwrap();
        assert_eq!(columns, vec!["id".to_string()]);
    }

    #[tokio::test]
    async fn test_typed_values_and_nulls_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let handle = sqlite_handle(dir.path()).await;

        let dataset = dataset(vec![
            (
                "score",
                DataType::Float64,
                Arc::new(Float64Array::from(vec![Some(1.5), None])),
            ),
            (
                "active",
                DataType::Boolean,
                Arc::new(BooleanArray::from(vec![Some(true), Some(false)])),
            ),
        ]);
        let table = dataset.synthesize_schema("typed", 255);

        handle.load(&dataset, &table).await.unwrap();

        let rows: Vec<(Option<f64>, bool)> =
            sqlx::query_as("SELECT score, active FROM typed ORDER BY id")
                .fetch_all(handle.as_sqlite().unwrap())
                .await
                .unwrap();

        assert_eq!(rows, vec![(Some(1.5), true), (None, false)]);
    }
}
