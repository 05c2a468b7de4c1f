use arrow::{
    array::{Array, ArrayRef, AsArray, RecordBatch},
    compute::{CastOptions, cast_with_options},
    datatypes::{
        DataType, Date32Type, Float64Type, Int64Type, TimeUnit, TimestampMicrosecondType,
    },
    error::ArrowError,
};
use chrono::{NaiveDate, NaiveDateTime};

use crate::{
    error::TabloadError,
    types::{ScalarKind, TableDef},
};

/// A single value converted to the storage kind of its field
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Text(String),
}

/// One row shaped after a [`TableDef`]: the identity value when the dataset supplies
/// one, then a value per data field, in [`TableDef::insert_sql`] order
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub values: Vec<CellValue>,
}

fn arrow_type_for(kind: &ScalarKind) -> DataType {
    match kind {
        ScalarKind::Integer => DataType::Int64,
        ScalarKind::Float => DataType::Float64,
        ScalarKind::Boolean => DataType::Boolean,
        ScalarKind::DateTime => DataType::Timestamp(TimeUnit::Microsecond, None),
        ScalarKind::Date => DataType::Date32,
        ScalarKind::String { .. } | ScalarKind::Text => DataType::Utf8,
    }
}

/// Columns of one batch cast to the storage kinds of a table's fields
pub struct StagedBatch<'a> {
    table: &'a TableDef,
    kinds: Vec<ScalarKind>,
    columns: Vec<ArrayRef>,
    num_rows: usize,
    string_bounds: bool,
}

impl<'a> StagedBatch<'a> {
    /// The function `new` lines the batch's columns up with the table's insert columns
    /// and casts each one to the Arrow type matching its kind.
    ///
    /// Casting is strict: a value that does not convert is an error, never a null.
    pub fn new(table: &'a TableDef, batch: &RecordBatch) -> Result<Self, TabloadError> {
        let options = CastOptions {
            safe: false,
            ..Default::default()
        };

        let names = table
            .identity_source
            .iter()
            .map(String::as_str)
            .chain(table.fields.iter().map(|f| f.name.as_str()));
        let kinds = table.insert_kinds();

        let columns = names
            .zip(&kinds)
            .map(|(name, kind)| {
                let column = batch.column_by_name(name).ok_or_else(|| {
                    TabloadError::Missing(format!(
                        "Column {} not found in dataset for table {}",
                        name, table.name
                    ))
                })?;

                let target = arrow_type_for(kind);
                if column.data_type() == &target {
                    return Ok(column.clone());
                }

                Ok(cast_with_options(column, &target, &options)?)
            })
            .collect::<Result<Vec<ArrayRef>, TabloadError>>()?;

        Ok(Self {
            table,
            kinds,
            columns,
            num_rows: batch.num_rows(),
            string_bounds: false,
        })
    }

    /// Rejects values longer than their field's `VARCHAR(n)` before they reach the
    /// database. Off by default; SQLite stores them as they are.
    pub fn with_string_bounds(mut self, enforce: bool) -> Self {
        self.string_bounds = enforce;
        self
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn record(&self, row: usize) -> Result<Record, TabloadError> {
        let values = self
            .kinds
            .iter()
            .zip(&self.columns)
            .map(|(kind, column)| {
                let value = cell_value(column, kind, row)?;

                if let (true, ScalarKind::String { max_length }, CellValue::Text(text)) =
                    (self.string_bounds, kind, &value)
                {
                    let length = text.chars().count();
                    if length > *max_length as usize {
                        return Err(TabloadError::Invalid(format!(
                            "Value of length {} in table {} row {} exceeds VARCHAR({})",
                            length, self.table.name, row, max_length
                        )));
                    }
                }

                Ok(value)
            })
            .collect::<Result<Vec<CellValue>, TabloadError>>()?;

        Ok(Record { values })
    }

    pub fn records(&self) -> impl Iterator<Item = Result<Record, TabloadError>> + '_ {
        (0..self.num_rows).map(|row| self.record(row))
    }
}

fn cast_error(expected: &str) -> ArrowError {
    ArrowError::CastError(format!("Failed to cast to {expected}"))
}

fn cell_value(column: &ArrayRef, kind: &ScalarKind, row: usize) -> Result<CellValue, TabloadError> {
    if column.is_null(row) {
        return Ok(CellValue::Null);
    }

    let value = match kind {
        ScalarKind::Integer => {
            let arr = column
                .as_primitive_opt::<Int64Type>()
                .ok_or_else(|| cast_error("Int64Array"))?;
            CellValue::Integer(arr.value(row))
        }
        ScalarKind::Float => {
            let arr = column
                .as_primitive_opt::<Float64Type>()
                .ok_or_else(|| cast_error("Float64Array"))?;
            CellValue::Float(arr.value(row))
        }
        ScalarKind::Boolean => {
            let arr = column
                .as_boolean_opt()
                .ok_or_else(|| cast_error("BooleanArray"))?;
            CellValue::Boolean(arr.value(row))
        }
        ScalarKind::Date => {
            let arr = column
                .as_primitive_opt::<Date32Type>()
                .ok_or_else(|| cast_error("Date32Array"))?;
            let date = arr
                .value_as_date(row)
                .ok_or_else(|| TabloadError::Invalid(format!("Date out of range at row {row}")))?;
            CellValue::Date(date)
        }
        ScalarKind::DateTime => {
            let arr = column
                .as_primitive_opt::<TimestampMicrosecondType>()
                .ok_or_else(|| cast_error("TimestampMicrosecondArray"))?;
            let datetime = arr.value_as_datetime(row).ok_or_else(|| {
                TabloadError::Invalid(format!("Timestamp out of range at row {row}"))
            })?;
            CellValue::DateTime(datetime)
        }
        ScalarKind::String { .. } | ScalarKind::Text => {
            let arr = column
                .as_string_opt::<i32>()
                .ok_or_else(|| cast_error("StringArray"))?;
            CellValue::Text(arr.value(row).to_string())
        }
    };

    Ok(value)
}
