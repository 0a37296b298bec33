use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use duckdb::types::{TimeUnit, Value};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// A single result cell, closed over the scalar kinds DuckDB returns.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    List(Vec<SqlValue>),
}

impl From<Value> for SqlValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => SqlValue::Null,
            Value::Boolean(b) => SqlValue::Bool(b),
            Value::TinyInt(i) => SqlValue::Integer(i64::from(i)),
            Value::SmallInt(i) => SqlValue::Integer(i64::from(i)),
            Value::Int(i) => SqlValue::Integer(i64::from(i)),
            Value::BigInt(i) => SqlValue::Integer(i),
            Value::HugeInt(i) => match i64::try_from(i) {
                Ok(i) => SqlValue::Integer(i),
                Err(_) => SqlValue::Text(i.to_string()),
            },
            Value::UTinyInt(u) => SqlValue::Unsigned(u64::from(u)),
            Value::USmallInt(u) => SqlValue::Unsigned(u64::from(u)),
            Value::UInt(u) => SqlValue::Unsigned(u64::from(u)),
            Value::UBigInt(u) => SqlValue::Unsigned(u),
            Value::Float(f) => SqlValue::Float(f64::from(f)),
            Value::Double(f) => SqlValue::Float(f),
            Value::Decimal(d) => {
                let text = d.to_string();
                match text.parse::<f64>() {
                    Ok(f) => SqlValue::Float(f),
                    Err(_) => SqlValue::Text(text),
                }
            }
            Value::Text(s) => SqlValue::Text(s),
            Value::Enum(s) => SqlValue::Text(s),
            Value::Blob(bytes) => SqlValue::Text(hex(&bytes)),
            Value::Date32(days) => DateTime::from_timestamp(i64::from(days) * 86_400, 0)
                .map(|dt| SqlValue::Date(dt.date_naive()))
                .unwrap_or_else(|| SqlValue::Text(format!("{} days since epoch", days))),
            Value::Time64(unit, raw) => {
                let micros = to_micros(unit, raw);
                let secs = micros.div_euclid(1_000_000);
                let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
                u32::try_from(secs)
                    .ok()
                    .and_then(|secs| NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos))
                    .map(SqlValue::Time)
                    .unwrap_or_else(|| SqlValue::Text(format!("{}us", micros)))
            }
            Value::Timestamp(unit, raw) => {
                let micros = to_micros(unit, raw);
                DateTime::from_timestamp_micros(micros)
                    .map(|dt| SqlValue::Timestamp(dt.naive_utc()))
                    .unwrap_or_else(|| SqlValue::Text(format!("{}us since epoch", micros)))
            }
            Value::Interval { months, days, nanos } => {
                SqlValue::Text(format!("{} months {} days {} ns", months, days, nanos))
            }
            Value::List(items) => {
                SqlValue::List(items.into_iter().map(SqlValue::from).collect())
            }
            other => SqlValue::Text(format!("{:?}", other)),
        }
    }
}

fn to_micros(unit: TimeUnit, raw: i64) -> i64 {
    match unit {
        TimeUnit::Second => raw.saturating_mul(1_000_000),
        TimeUnit::Millisecond => raw.saturating_mul(1_000),
        TimeUnit::Microsecond => raw,
        TimeUnit::Nanosecond => raw / 1_000,
    }
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// One result row: column name to value, in the cursor's column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record(Vec<(String, SqlValue)>);

impl Record {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, column: impl Into<String>, value: SqlValue) {
        self.0.push((column.into(), value));
    }

    /// Last value bound to `column`, matching how a JSON object resolves duplicates.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.0
            .iter()
            .rev()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (column, value) in &self.0 {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}
