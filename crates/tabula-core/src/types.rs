//! Core types for Tabula

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A database value that can represent any SQL type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,
    /// Boolean
    Bool(bool),
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// 64-bit floating point
    Float64(f64),
    /// Decimal/Numeric (stored as string for precision)
    Decimal(String),
    /// UTF-8 string
    String(String),
    /// Binary data
    Bytes(Vec<u8>),
    /// UUID
    Uuid(Uuid),
    /// Date (year, month, day)
    Date(NaiveDate),
    /// Time of day
    Time(NaiveTime),
    /// DateTime without timezone
    DateTime(NaiveDateTime),
    /// DateTime with timezone (UTC)
    DateTimeUtc(DateTime<Utc>),
    /// JSON value
    Json(serde_json::Value),
}

impl Value {
    /// Check if the value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// NULL, or a string holding nothing but whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Try to get as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Try to get as a finite f64.
    ///
    /// Integers, decimals and numeric-looking strings all coerce.
    pub fn as_f64(&self) -> Option<f64> {
        let v = match self {
            Value::Int32(v) => Some(*v as f64),
            Value::Int64(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            Value::Decimal(s) | Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        v.filter(|f| f.is_finite())
    }

    /// Try to get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Text shown in a grid cell or written to the clipboard. NULL is empty.
    pub fn display_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Uuid(v) => write!(f, "{}", v),
            Value::Date(v) => write!(f, "{}", v),
            Value::Time(v) => write!(f, "{}", v),
            Value::DateTime(v) => write!(f, "{}", v),
            Value::DateTimeUtc(v) => write!(f, "{}", v.to_rfc3339()),
            Value::Json(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

/// Broad family of a declared column type, used for parsing edits and
/// choosing placeholder values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    Text,
    Integer,
    Numeric,
    Boolean,
    Json,
    Date,
    Time,
    Timestamp,
    Uuid,
    Binary,
    Other,
}

impl TypeFamily {
    /// Classify a database-specific type name such as `varchar(255)`,
    /// `int4`, `timestamp with time zone` or `tinyint(1)`.
    pub fn of(data_type: &str) -> Self {
        let lowered = data_type.trim().to_lowercase();
        if lowered == "tinyint(1)" {
            return TypeFamily::Boolean;
        }
        let base = lowered
            .split('(')
            .next()
            .unwrap_or_default()
            .trim()
            .trim_end_matches("[]")
            .to_string();

        match base.as_str() {
            "text" | "varchar" | "char" | "bpchar" | "name" | "citext" | "character varying"
            | "character" | "nvarchar" | "nchar" | "longtext" | "mediumtext" | "tinytext"
            | "string" | "clob" | "enum" | "set" => TypeFamily::Text,
            "int2" | "int4" | "int8" | "smallint" | "integer" | "bigint" | "int" | "mediumint"
            | "tinyint" | "serial" | "bigserial" | "smallserial" => TypeFamily::Integer,
            "float4" | "float8" | "real" | "double precision" | "double" | "float" | "numeric"
            | "decimal" | "money" => TypeFamily::Numeric,
            "bool" | "boolean" | "bit" => TypeFamily::Boolean,
            "json" | "jsonb" => TypeFamily::Json,
            "date" => TypeFamily::Date,
            "time" | "timetz" | "time with time zone" | "time without time zone" => TypeFamily::Time,
            "timestamp" | "timestamptz" | "datetime" | "datetime2" | "smalldatetime"
            | "timestamp with time zone" | "timestamp without time zone" => TypeFamily::Timestamp,
            "uuid" | "uniqueidentifier" => TypeFamily::Uuid,
            "blob" | "bytea" | "binary" | "varbinary" | "longblob" => TypeFamily::Binary,
            _ => TypeFamily::Other,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, TypeFamily::Integer | TypeFamily::Numeric)
    }

    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            TypeFamily::Date | TypeFamily::Time | TypeFamily::Timestamp
        )
    }
}

/// Rendering hint for columns holding media rather than plain scalars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaHint {
    Image,
    File,
    Attachments,
}

/// Column metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ColumnMeta {
    /// Column name
    #[serde(default)]
    pub name: String,
    /// Data type (database-specific string)
    #[serde(default)]
    pub data_type: String,
    /// Whether the column can be NULL
    #[serde(default)]
    pub nullable: bool,
    /// Default value expression
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub is_foreign_key: bool,
    /// Sequence/identity/autoincrement column
    #[serde(default)]
    pub is_auto_increment: bool,
    #[serde(default)]
    pub media_hint: Option<MediaHint>,
}

impl ColumnMeta {
    /// A nullable column with no default
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            ..Default::default()
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.nullable = false;
        self
    }

    pub fn foreign_key(mut self) -> Self {
        self.is_foreign_key = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.is_auto_increment = true;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default_value = Some(default.into());
        self
    }

    pub fn with_media_hint(mut self, hint: MediaHint) -> Self {
        self.media_hint = Some(hint);
        self
    }

    pub fn type_family(&self) -> TypeFamily {
        TypeFamily::of(&self.data_type)
    }

    /// Whether a non-empty default expression is declared
    pub fn has_default(&self) -> bool {
        self.default_value
            .as_ref()
            .map(|d| !d.trim().is_empty())
            .unwrap_or(false)
    }

    /// Whether the store generates this column's value on insert
    /// (sequences, identity columns, UUID generators).
    pub fn is_auto_generated(&self) -> bool {
        if self.is_auto_increment {
            return true;
        }
        self.default_value
            .as_ref()
            .map(|default| {
                let d = default.to_lowercase();
                d.contains("nextval(")
                    || d.contains("gen_random_uuid")
                    || d.contains("uuid_generate")
                    || d.contains("newid(")
                    || d.contains("autoincrement")
                    || d.contains("identity")
            })
            .unwrap_or(false)
    }
}

/// A table row: column name to value, in column order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Row {
    values: IndexMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from `(column, value)` pairs
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            values: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Builder-style setter
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(column.into(), value.into());
        self
    }

    /// Get a value by column name
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Set a value, returning the previous one
    pub fn set(&mut self, column: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(column.into(), value)
    }

    /// Column names in this row
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values() {
        assert!(Value::Null.is_blank());
        assert!(Value::String("   ".into()).is_blank());
        assert!(!Value::String("x".into()).is_blank());
        assert!(!Value::Int64(0).is_blank());
    }

    #[test]
    fn numeric_coercion_accepts_strings_and_rejects_non_finite() {
        assert_eq!(Value::String(" 2.5 ".into()).as_f64(), Some(2.5));
        assert_eq!(Value::Int32(7).as_f64(), Some(7.0));
        assert_eq!(Value::Float64(f64::NAN).as_f64(), None);
        assert_eq!(Value::String("abc".into()).as_f64(), None);
    }

    #[test]
    fn display_text_renders_null_as_empty() {
        assert_eq!(Value::Null.display_text(), "");
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Float64(6.0).display_text(), "6");
    }

    #[test]
    fn type_family_classification() {
        assert_eq!(TypeFamily::of("VARCHAR(255)"), TypeFamily::Text);
        assert_eq!(TypeFamily::of("int4"), TypeFamily::Integer);
        assert_eq!(TypeFamily::of("INTEGER"), TypeFamily::Integer);
        assert_eq!(TypeFamily::of("numeric(10,2)"), TypeFamily::Numeric);
        assert_eq!(TypeFamily::of("tinyint(1)"), TypeFamily::Boolean);
        assert_eq!(TypeFamily::of("jsonb"), TypeFamily::Json);
        assert_eq!(
            TypeFamily::of("timestamp with time zone"),
            TypeFamily::Timestamp
        );
        assert_eq!(TypeFamily::of("geometry"), TypeFamily::Other);
    }

    #[test]
    fn auto_generated_detection() {
        let serial = ColumnMeta::new("id", "integer").with_default("nextval('t_id_seq'::regclass)");
        assert!(serial.is_auto_generated());
        let uuid = ColumnMeta::new("id", "uuid").with_default("gen_random_uuid()");
        assert!(uuid.is_auto_generated());
        let plain = ColumnMeta::new("score", "int").with_default("0");
        assert!(!plain.is_auto_generated());
        assert!(plain.has_default());
    }

    #[test]
    fn row_preserves_column_order() {
        let row = Row::new().with("b", 1i64).with("a", "x");
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(row.get("a"), Some(&Value::String("x".into())));
    }
}
