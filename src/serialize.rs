//! Converts backend-native row values into JSON-safe representations.
//!
//! Every column kind maps to something `serde_json` can carry: temporal
//! values become ISO-8601 strings, numerics become doubles, byte
//! sequences become base64. The mapping is total; a value the driver
//! cannot decode degrades to `null` instead of failing the request.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tokio_postgres::types::{FromSql, Type};
use tokio_postgres::Row;

/// Applies the scalar mapping to every field of `row`, preserving
/// column names and order.
pub fn row_to_json(row: &Row) -> Value {
    let mut record = Map::with_capacity(row.columns().len());
    for (idx, column) in row.columns().iter().enumerate() {
        record.insert(column.name().to_string(), column_to_json(row, idx));
    }
    Value::Object(record)
}

fn column_to_json(row: &Row, idx: usize) -> Value {
    let ty = row.columns()[idx].type_();
    match *ty {
        Type::BOOL => scalar(row.try_get::<_, Option<bool>>(idx), Value::Bool),
        Type::INT2 => scalar(row.try_get::<_, Option<i16>>(idx), |v| {
            Value::from(i64::from(v))
        }),
        Type::INT4 => scalar(row.try_get::<_, Option<i32>>(idx), |v| {
            Value::from(i64::from(v))
        }),
        Type::INT8 => scalar(row.try_get::<_, Option<i64>>(idx), Value::from),
        Type::FLOAT4 => scalar(row.try_get::<_, Option<f32>>(idx), |v| {
            Value::from(f64::from(v))
        }),
        Type::FLOAT8 => scalar(row.try_get::<_, Option<f64>>(idx), Value::from),
        Type::NUMERIC => scalar(row.try_get::<_, Option<Decimal>>(idx), |v| {
            v.to_f64().map_or(Value::Null, Value::from)
        }),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
            scalar(row.try_get::<_, Option<String>>(idx), Value::String)
        }
        Type::BYTEA => scalar(row.try_get::<_, Option<Vec<u8>>>(idx), |v| {
            Value::String(STANDARD.encode(v))
        }),
        Type::TIMESTAMPTZ => scalar(row.try_get::<_, Option<DateTime<Utc>>>(idx), |v| {
            Value::String(v.to_rfc3339())
        }),
        Type::TIMESTAMP => scalar(row.try_get::<_, Option<NaiveDateTime>>(idx), |v| {
            Value::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        }),
        Type::DATE => scalar(row.try_get::<_, Option<NaiveDate>>(idx), |v| {
            Value::String(v.to_string())
        }),
        Type::TIME => scalar(row.try_get::<_, Option<NaiveTime>>(idx), |v| {
            Value::String(v.to_string())
        }),
        Type::INTERVAL => scalar(row.try_get::<_, Option<PgInterval>>(idx), |v| {
            Value::String(format_interval(&v))
        }),
        Type::JSON | Type::JSONB => scalar(row.try_get::<_, Option<Value>>(idx), |v| v),
        Type::UUID => scalar(row.try_get::<_, Option<uuid::Uuid>>(idx), |v| {
            Value::String(v.to_string())
        }),
        _ => scalar(row.try_get::<_, Option<String>>(idx), Value::String),
    }
}

fn scalar<T>(
    fetched: Result<Option<T>, tokio_postgres::Error>,
    to_json: impl FnOnce(T) -> Value,
) -> Value {
    match fetched {
        Ok(Some(value)) => to_json(value),
        _ => Value::Null,
    }
}

/// Wire representation of a PostgreSQL interval: months, days and
/// microseconds travel as independent components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PgInterval {
    pub months: i32,
    pub days: i32,
    pub microseconds: i64,
}

impl<'a> FromSql<'a> for PgInterval {
    fn from_sql(
        _: &Type,
        raw: &'a [u8],
    ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        if raw.len() != 16 {
            return Err("interval value must be 16 bytes".into());
        }
        let microseconds = i64::from_be_bytes(raw[0..8].try_into()?);
        let days = i32::from_be_bytes(raw[8..12].try_into()?);
        let months = i32::from_be_bytes(raw[12..16].try_into()?);
        Ok(Self {
            months,
            days,
            microseconds,
        })
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::INTERVAL
    }
}

/// ISO-8601 duration form, e.g. `P2M10DT3.500000S`. `parse_interval`
/// reverses it without losing magnitude.
pub fn format_interval(interval: &PgInterval) -> String {
    let mut out = String::from("P");
    if interval.months != 0 {
        out.push_str(&format!("{}M", interval.months));
    }
    if interval.days != 0 {
        out.push_str(&format!("{}D", interval.days));
    }
    if interval.microseconds != 0 || out.len() == 1 {
        let seconds = interval.microseconds / 1_000_000;
        let fraction = (interval.microseconds % 1_000_000).unsigned_abs();
        if fraction == 0 {
            out.push_str(&format!("T{seconds}S"));
        } else if interval.microseconds < 0 && seconds == 0 {
            out.push_str(&format!("T-0.{fraction:06}S"));
        } else {
            out.push_str(&format!("T{seconds}.{fraction:06}S"));
        }
    }
    out
}

pub fn parse_interval(text: &str) -> Option<PgInterval> {
    let rest = text.strip_prefix('P')?;
    let (date_part, time_part) = match rest.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (rest, None),
    };

    let mut months = 0i32;
    let mut days = 0i32;
    let mut number = String::new();
    for ch in date_part.chars() {
        match ch {
            'M' => {
                months = number.parse().ok()?;
                number.clear();
            }
            'D' => {
                days = number.parse().ok()?;
                number.clear();
            }
            _ => number.push(ch),
        }
    }
    if !number.is_empty() {
        return None;
    }

    let mut microseconds = 0i64;
    if let Some(time_part) = time_part {
        let seconds: f64 = time_part.strip_suffix('S')?.parse().ok()?;
        microseconds = (seconds * 1_000_000.0).round() as i64;
    }

    Some(PgInterval {
        months,
        days,
        microseconds,
    })
}
