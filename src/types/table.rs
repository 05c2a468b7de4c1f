use arrow::datatypes::Schema;

use crate::{
    loader::dialect::Dialect,
    types::{DEFAULT_STRING_LENGTH, FieldDef, ScalarKind},
};

/// Name of the auto-assigned primary key every synthesized table carries.
pub const IDENTITY_FIELD: &str = "id";

/// Storage schema synthesized from a dataset's shape.
///
/// The identity field is implicit: it is never stored in `fields` and is rendered by
/// the dialect when the table is created. When the dataset has its own `id` column,
/// `identity_source` names it and its values fill the key; otherwise the key is
/// auto-assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
    pub identity_source: Option<String>,
}

impl std::fmt::Display for TableDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({}", self.name, IDENTITY_FIELD)?;
        for field in &self.fields {
            write!(f, ", {}: {}", field.name, field.kind)?;
        }
        write!(f, ")")
    }
}

impl TableDef {
    /// The function `from_arrow_schema` builds a table definition with one field per
    /// dataset column, in column order.
    ///
    /// Columns named `id` in any case never become data fields. The first of them
    /// supplies the identity values.
    ///
    /// Arguments:
    ///
    /// * `name`: name of the table to create.
    /// * `schema`: Arrow schema of the dataset.
    /// * `max_length`: bound for string-like columns.
    pub fn from_arrow_schema(name: impl Into<String>, schema: &Schema, max_length: u32) -> Self {
        let name = name.into();

        let identity_source = schema
            .fields()
            .iter()
            .find(|f| is_identity_name(f.name()))
            .map(|f| f.name().clone());

        let fields = schema
            .fields()
            .iter()
            .filter(|f| !is_identity_name(f.name()))
            .map(|f| FieldDef::from_arrow(&name, f, max_length))
            .collect();

        Self {
            name,
            fields,
            identity_source,
        }
    }

    /// Same as [`TableDef::from_arrow_schema`] for untyped input described by
    /// `(column, type tag)` pairs.
    pub fn from_type_tags<S: AsRef<str>>(name: impl Into<String>, columns: &[(S, S)]) -> Self {
        let name = name.into();

        let identity_source = columns
            .iter()
            .map(|(column, _)| column.as_ref())
            .find(|column| is_identity_name(column))
            .map(str::to_string);

        let fields = columns
            .iter()
            .filter(|(column, _)| !is_identity_name(column.as_ref()))
            .map(|(column, tag)| {
                FieldDef::from_type_tag(&name, column.as_ref(), tag.as_ref(), DEFAULT_STRING_LENGTH)
            })
            .collect();

        Self {
            name,
            fields,
            identity_source,
        }
    }

    /// Number of fields including the identity field
    pub fn field_count(&self) -> usize {
        self.fields.len() + 1
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        std::iter::once(IDENTITY_FIELD)
            .chain(self.fields.iter().map(|f| f.name.as_str()))
            .collect()
    }

    pub fn create_table_sql(&self, dialect: Dialect) -> String {
        let mut columns = vec![format!(
            "{} {}",
            dialect.quote_identifier(IDENTITY_FIELD),
            dialect.identity_column()
        )];
        columns.extend(self.fields.iter().map(|f| f.column_sql(dialect)));

        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            dialect.quote_identifier(&self.name),
            columns.join(", ")
        )
    }

    /// Kinds of the values bound by [`TableDef::insert_sql`], in placeholder order
    pub fn insert_kinds(&self) -> Vec<ScalarKind> {
        self.identity_source
            .iter()
            .map(|_| ScalarKind::Integer)
            .chain(self.fields.iter().map(|f| f.kind))
            .collect()
    }

    pub fn insert_sql(&self, dialect: Dialect) -> String {
        let table = dialect.quote_identifier(&self.name);

        let columns: Vec<String> = self
            .identity_source
            .iter()
            .map(|_| IDENTITY_FIELD)
            .chain(self.fields.iter().map(|f| f.name.as_str()))
            .map(|name| dialect.quote_identifier(name))
            .collect();

        if columns.is_empty() {
            return format!("INSERT INTO {} {}", table, dialect.default_values());
        }

        let placeholders: Vec<String> = (1..=columns.len())
            .map(|position| dialect.placeholder(position))
            .collect();

        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders.join(", ")
        )
    }
}

fn is_identity_name(name: &str) -> bool {
    name.eq_ignore_ascii_case(IDENTITY_FIELD)
}
