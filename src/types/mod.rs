use arrow::datatypes::DataType;

mod field;
mod table;

pub use field::FieldDef;
pub use table::{IDENTITY_FIELD, TableDef};

/// Default bound for columns holding generic or mixed text.
pub const DEFAULT_STRING_LENGTH: u32 = 255;

/// Storage-level value category a dataset column is mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Integer,
    Float,
    Boolean,
    DateTime,
    Date,
    String { max_length: u32 },
    Text,
}

impl std::fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer => write!(f, "Integer"),
            Self::Float => write!(f, "Float"),
            Self::Boolean => write!(f, "Boolean"),
            Self::DateTime => write!(f, "DateTime"),
            Self::Date => write!(f, "Date"),
            Self::String { max_length } => write!(f, "String({max_length})"),
            Self::Text => write!(f, "Text"),
        }
    }
}

impl ScalarKind {
    pub fn string() -> Self {
        Self::String {
            max_length: DEFAULT_STRING_LENGTH,
        }
    }

    /// The function `from_type_tag` classifies a textual type name such as `int64`,
    /// `datetime64[ns]` or `object`.
    ///
    /// Matching is a case-insensitive substring test and the first hit wins, so
    /// `datetime` must be checked before `date`. Unknown tags become [`ScalarKind::Text`].
    pub fn from_type_tag(tag: &str) -> Self {
        Self::from_type_tag_with_length(tag, DEFAULT_STRING_LENGTH)
    }

    pub fn from_type_tag_with_length(tag: &str, max_length: u32) -> Self {
        let normalized = tag.to_lowercase();

        if normalized.contains("int") {
            Self::Integer
        } else if normalized.contains("float") {
            Self::Float
        } else if normalized.contains("bool") {
            Self::Boolean
        } else if normalized.contains("datetime") {
            Self::DateTime
        } else if normalized.contains("date") {
            Self::Date
        } else if normalized.contains("object") {
            Self::String { max_length }
        } else {
            Self::Text
        }
    }

    /// The function `from_data_type` classifies an Arrow column type.
    ///
    /// Arguments:
    ///
    /// * `data_type`: Arrow type of the column as produced by the dataset reader.
    /// * `max_length`: bound applied to string-like columns.
    pub fn from_data_type(data_type: &DataType, max_length: u32) -> Self {
        match data_type {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => Self::Integer,
            DataType::Float16
            | DataType::Float32
            | DataType::Float64
            | DataType::Decimal32(_, _)
            | DataType::Decimal64(_, _)
            | DataType::Decimal128(_, _)
            | DataType::Decimal256(_, _) => Self::Float,
            DataType::Boolean => Self::Boolean,
            DataType::Timestamp(_, _) => Self::DateTime,
            DataType::Date32 | DataType::Date64 => Self::Date,
            // Arrow's counterpart of a generic "object" column
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View | DataType::Null => {
                Self::String { max_length }
            }
            _ => Self::Text,
        }
    }
}
