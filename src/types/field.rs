use arrow::datatypes::{DataType, Field};

use crate::{loader::dialect::Dialect, types::ScalarKind};

/// One data column of a synthesized table
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub table_name: String,
    pub name: String,
    pub kind: ScalarKind,
    /// Type the column had in the dataset, if it came from a typed source
    pub source_type: Option<DataType>,
    pub is_nullable: bool,
}

impl std::fmt::Display for FieldDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "table name: {} field name: {} kind: {}",
            self.table_name, self.name, self.kind
        )
    }
}

impl FieldDef {
    pub fn from_arrow(table_name: &str, field: &Field, max_length: u32) -> Self {
        Self {
            table_name: table_name.to_string(),
            name: field.name().clone(),
            kind: ScalarKind::from_data_type(field.data_type(), max_length),
            source_type: Some(field.data_type().clone()),
            is_nullable: field.is_nullable(),
        }
    }

    pub fn from_type_tag(table_name: &str, name: &str, tag: &str, max_length: u32) -> Self {
        Self {
            table_name: table_name.to_string(),
            name: name.to_string(),
            kind: ScalarKind::from_type_tag_with_length(tag, max_length),
            source_type: None,
            is_nullable: true,
        }
    }

    /// Column definition as it appears inside CREATE TABLE
    pub fn column_sql(&self, dialect: Dialect) -> String {
        format!(
            "{} {}",
            dialect.quote_identifier(&self.name),
            dialect.column_type(&self.kind)
        )
    }
}
