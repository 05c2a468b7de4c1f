use std::{fmt, time::Duration};

use uuid::Uuid;

/// Outcome of one successful load
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub load_id: Uuid,
    pub table_name: String,
    pub rows_inserted: u64,
    pub elapsed: Duration,
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Data successfully saved to database! {} rows inserted into {}",
            self.rows_inserted, self.table_name
        )
    }
}
