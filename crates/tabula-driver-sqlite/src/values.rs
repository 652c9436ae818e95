//! Conversions between Tabula values and SQLite storage classes

use rusqlite::types::{Value as SqlValue, ValueRef};
use tabula_core::{TypeFamily, Value};

pub(crate) fn values_to_rusqlite(values: &[Value]) -> Vec<SqlValue> {
    values.iter().map(value_to_rusqlite).collect()
}

pub(crate) fn value_to_rusqlite(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int32(i) => SqlValue::Integer(i64::from(*i)),
        Value::Int64(i) => SqlValue::Integer(*i),
        Value::Float64(f) => SqlValue::Real(*f),
        Value::Decimal(d) => SqlValue::Text(d.clone()),
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Bytes(b) => SqlValue::Blob(b.clone()),
        Value::Date(d) => SqlValue::Text(d.to_string()),
        Value::Time(t) => SqlValue::Text(t.to_string()),
        Value::DateTime(dt) => SqlValue::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        Value::DateTimeUtc(dt) => SqlValue::Text(dt.to_rfc3339()),
        Value::Json(j) => SqlValue::Text(j.to_string()),
        Value::Uuid(u) => SqlValue::Text(u.to_string()),
    }
}

/// Read a column value, using the declared type where SQLite's storage class
/// loses information (booleans stored as integers).
pub(crate) fn rusqlite_to_value(value_ref: ValueRef<'_>, decl_type: Option<&str>) -> Value {
    let family = decl_type.map(TypeFamily::of);
    match value_ref {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) if family == Some(TypeFamily::Boolean) => Value::Bool(i != 0),
        ValueRef::Integer(i) => Value::Int64(i),
        ValueRef::Real(f) => Value::Float64(f),
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).to_string()),
        // Text stored in untyped columns can come back as a BLOB
        ValueRef::Blob(b) => match std::str::from_utf8(b) {
            Ok(s) if family != Some(TypeFamily::Binary) => Value::String(s.to_string()),
            _ => Value::Bytes(b.to_vec()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booleans_follow_the_declared_type() {
        assert_eq!(
            rusqlite_to_value(ValueRef::Integer(1), Some("BOOLEAN")),
            Value::Bool(true)
        );
        assert_eq!(
            rusqlite_to_value(ValueRef::Integer(1), Some("INTEGER")),
            Value::Int64(1)
        );
    }

    #[test]
    fn blobs_stay_binary_in_blob_columns() {
        assert_eq!(
            rusqlite_to_value(ValueRef::Blob(b"abc"), None),
            Value::String("abc".to_string())
        );
        assert_eq!(
            rusqlite_to_value(ValueRef::Blob(b"abc"), Some("BLOB")),
            Value::Bytes(b"abc".to_vec())
        );
    }

    #[test]
    fn writes_booleans_as_integers() {
        assert_eq!(value_to_rusqlite(&Value::Bool(true)), SqlValue::Integer(1));
        assert_eq!(value_to_rusqlite(&Value::Null), SqlValue::Null);
    }
}
