use crate::{loader::catalog::StorageBackend, types::ScalarKind};

/// SQL flavour used to render DDL and DML for a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Sqlite,
    Postgres,
    MySql,
}

impl From<&StorageBackend> for Dialect {
    fn from(backend: &StorageBackend) -> Self {
        match backend {
            StorageBackend::SQLite => Self::Sqlite,
            StorageBackend::PostgreSQL => Self::Postgres,
            StorageBackend::MySQL => Self::MySql,
        }
    }
}

impl Dialect {
    pub fn quote_identifier(&self, ident: &str) -> String {
        let quote = match self {
            Self::Sqlite | Self::Postgres => '"',
            Self::MySql => '`',
        };

        let mut quoted = String::with_capacity(ident.len() + 2);
        quoted.push(quote);
        for ch in ident.chars() {
            if ch == quote {
                quoted.push(quote);
            }
            quoted.push(ch);
        }
        quoted.push(quote);

        quoted
    }

    /// Placeholder for the bind parameter at 1-based `position`
    pub fn placeholder(&self, position: usize) -> String {
        match self {
            Self::Postgres => format!("${position}"),
            Self::Sqlite | Self::MySql => "?".into(),
        }
    }

    pub fn identity_column(&self) -> &'static str {
        match self {
            Self::Sqlite => "INTEGER PRIMARY KEY AUTOINCREMENT",
            Self::Postgres => "BIGSERIAL PRIMARY KEY",
            Self::MySql => "BIGINT PRIMARY KEY AUTO_INCREMENT",
        }
    }

    pub fn column_type(&self, kind: &ScalarKind) -> String {
        match (self, kind) {
            (Self::Sqlite, ScalarKind::Integer) => "INTEGER".into(),
            (Self::Postgres | Self::MySql, ScalarKind::Integer) => "BIGINT".into(),
            (Self::Sqlite, ScalarKind::Float) => "REAL".into(),
            (Self::Postgres, ScalarKind::Float) => "DOUBLE PRECISION".into(),
            (Self::MySql, ScalarKind::Float) => "DOUBLE".into(),
            (_, ScalarKind::Boolean) => "BOOLEAN".into(),
            (Self::Sqlite, ScalarKind::DateTime) => "DATETIME".into(),
            (Self::Postgres, ScalarKind::DateTime) => "TIMESTAMP".into(),
            (Self::MySql, ScalarKind::DateTime) => "DATETIME(6)".into(),
            (_, ScalarKind::Date) => "DATE".into(),
            (_, ScalarKind::String { max_length }) => format!("VARCHAR({max_length})"),
            (_, ScalarKind::Text) => "TEXT".into(),
        }
    }

    /// Tail of an INSERT that supplies no explicit columns
    pub fn default_values(&self) -> &'static str {
        match self {
            Self::Sqlite | Self::Postgres => "DEFAULT VALUES",
            Self::MySql => "() VALUES ()",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoting_escapes_embedded_quotes() {
        assert_eq!(Dialect::Sqlite.quote_identifier("name"), "\"name\"");
        assert_eq!(
            Dialect::Postgres.quote_identifier("say \"hi\""),
            "\"say \"\"hi\"\"\""
        );
        assert_eq!(Dialect::MySql.quote_identifier("a`b"), "`a``b`");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(Dialect::Postgres.placeholder(3), "$3");
        assert_eq!(Dialect::Sqlite.placeholder(3), "?");
        assert_eq!(Dialect::MySql.placeholder(1), "?");
    }

    #[test]
    fn test_column_types() {
        assert_eq!(
            Dialect::Sqlite.column_type(&ScalarKind::string()),
            "VARCHAR(255)"
        );
        assert_eq!(
            Dialect::Postgres.column_type(&ScalarKind::Float),
            "DOUBLE PRECISION"
        );
        assert_eq!(
            Dialect::MySql.column_type(&ScalarKind::DateTime),
            "DATETIME(6)"
        );
        assert_eq!(Dialect::Sqlite.column_type(&ScalarKind::Text), "TEXT");
    }
}
