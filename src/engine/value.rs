use crate::engine::column::{ColumnInfo, ValueKind};
use crate::engine::error::{Result, UpsertError};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value as JsonValue;
use sqlx::types::BigDecimal;
use std::str::FromStr;

/// Neutral value representation bound into upsert statements.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(BigDecimal),
    String(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    /// Structured value, serialized to text right before binding.
    Json(JsonValue),
}

impl SqlValue {
    /// Convert one field of an input record according to the column's kind.
    ///
    /// Typed kinds only accept values that convert without loss; anything
    /// else is an `InvalidValue` naming the column. Text-like kinds take
    /// scalars as their textual form.
    pub fn from_json(column: &ColumnInfo, value: &JsonValue) -> Result<Self> {
        if value.is_null() {
            return Ok(SqlValue::Null);
        }
        let invalid = |reason: String| UpsertError::InvalidValue {
            column: column.name().to_string(),
            reason,
        };

        let converted = match (column.kind(), value) {
            (ValueKind::Json, v) => SqlValue::Json(v.clone()),
            (ValueKind::Bool, JsonValue::Bool(b)) => SqlValue::Bool(*b),
            (ValueKind::Int, JsonValue::Number(n)) => match n.as_i64() {
                Some(i) => SqlValue::Int(i),
                None => return Err(invalid(format!("{} is not a 64-bit integer", n))),
            },
            (ValueKind::Float, JsonValue::Number(n)) => match n.as_f64() {
                Some(f) => SqlValue::Float(f),
                None => return Err(invalid(format!("{} is not a float", n))),
            },
            (ValueKind::Decimal, JsonValue::Number(n)) => {
                SqlValue::Decimal(parse_decimal(&n.to_string()).map_err(invalid)?)
            }
            (ValueKind::Decimal, JsonValue::String(s)) => {
                SqlValue::Decimal(parse_decimal(s).map_err(invalid)?)
            }
            (ValueKind::Bytes, JsonValue::String(s)) => SqlValue::Bytes(
                hex::decode(s).map_err(|e| invalid(format!("expected hex bytes: {}", e)))?,
            ),
            (ValueKind::Date, JsonValue::String(s)) => SqlValue::Date(
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map_err(|e| invalid(format!("'{}' is not a date: {}", s, e)))?,
            ),
            (ValueKind::Time, JsonValue::String(s)) => SqlValue::Time(
                NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
                    .map_err(|e| invalid(format!("'{}' is not a time: {}", s, e)))?,
            ),
            (ValueKind::Timestamp, JsonValue::String(s)) => SqlValue::Timestamp(
                parse_timestamp(s).ok_or_else(|| invalid(format!("'{}' is not a timestamp", s)))?,
            ),
            (ValueKind::Text | ValueKind::Uuid | ValueKind::Other(_), JsonValue::String(s)) => {
                SqlValue::String(s.clone())
            }
            (ValueKind::Text | ValueKind::Uuid | ValueKind::Other(_), other) => {
                SqlValue::String(other.to_string())
            }
            (kind, other) => {
                return Err(invalid(format!("{} does not fit a {:?} column", other, kind)));
            }
        };
        Ok(converted)
    }
}

fn parse_decimal(s: &str) -> std::result::Result<BigDecimal, String> {
    BigDecimal::from_str(s).map_err(|e| format!("'{}' is not a decimal: {}", s, e))
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_by_column_kind() {
        let ts = ColumnInfo::new("created_at", ValueKind::Timestamp);
        assert_eq!(
            SqlValue::from_json(&ts, &json!("2024-03-01T10:15:00")).unwrap(),
            SqlValue::Timestamp(
                NaiveDate::from_ymd_opt(2024, 3, 1)
                    .unwrap()
                    .and_hms_opt(10, 15, 0)
                    .unwrap()
            )
        );

        let payload = ColumnInfo::new("payload", ValueKind::Json);
        assert_eq!(
            SqlValue::from_json(&payload, &json!({"a": [1, 2]})).unwrap(),
            SqlValue::Json(json!({"a": [1, 2]}))
        );

        let blob = ColumnInfo::new("blob", ValueKind::Bytes);
        assert_eq!(
            SqlValue::from_json(&blob, &json!("cafe")).unwrap(),
            SqlValue::Bytes(vec![0xca, 0xfe])
        );

        let price = ColumnInfo::new("price", ValueKind::Decimal);
        assert_eq!(
            SqlValue::from_json(&price, &json!("12.50")).unwrap(),
            SqlValue::Decimal(BigDecimal::from_str("12.50").unwrap())
        );

        let label = ColumnInfo::new("label", ValueKind::Text);
        assert_eq!(
            SqlValue::from_json(&label, &json!(42)).unwrap(),
            SqlValue::String("42".into())
        );
    }

    #[test]
    fn null_wins_over_kind() {
        let col = ColumnInfo::new("n", ValueKind::Int);
        assert_eq!(SqlValue::from_json(&col, &JsonValue::Null).unwrap(), SqlValue::Null);
    }

    #[test]
    fn lossy_numbers_are_rejected() {
        let qty = ColumnInfo::new("qty", ValueKind::Int);

        let err = SqlValue::from_json(&qty, &json!(2.5)).unwrap_err();
        assert!(matches!(&err, UpsertError::InvalidValue { column, .. } if column == "qty"));

        let err = SqlValue::from_json(&qty, &json!(u64::MAX)).unwrap_err();
        assert!(err.to_string().contains("18446744073709551615 is not a 64-bit integer"));

        let price = ColumnInfo::new("price", ValueKind::Decimal);
        let err = SqlValue::from_json(&price, &json!("twelve")).unwrap_err();
        assert!(err.to_string().starts_with("Invalid value for column 'price'"));
    }

    #[test]
    fn unparseable_values_are_rejected() {
        let col = ColumnInfo::new("d", ValueKind::Date);
        let err = SqlValue::from_json(&col, &json!("yesterday")).unwrap_err();
        assert!(err.to_string().contains("'yesterday' is not a date"));

        let flag = ColumnInfo::new("active", ValueKind::Bool);
        assert!(SqlValue::from_json(&flag, &json!("yes")).is_err());
    }
}
