//! Row decoding.
//!
//! Rows are returned to clients as JSON objects keyed by column name. Each column is
//! decoded by first classifying its declared type into a [`TypeCategory`], then trying
//! the Rust types that category can hold. SQL NULL becomes JSON null.
//!
//! PostgreSQL values arrive in text format for statements without parameters and in
//! binary format otherwise. A text value with no typed decoder is passed through as
//! the server rendered it. A value that cannot be decoded at all fails the whole
//! statement with [`DbError::Internal`].

use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, Row as JsonRow};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::types::{PgInterval, PgMoney, PgTimeTz};
use sqlx::postgres::{PgRow, PgValueFormat};
use sqlx::sqlite::SqliteRow;
use sqlx::types::{Decimal, Uuid};
use sqlx::{Column, Decode, Row, Type, TypeInfo, ValueRef};
use tracing::error;

/// Fractional digits of a PostgreSQL `money` value (the `C` and `en_US` locales).
const MONEY_FRAC_DIGITS: u32 = 2;

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Money,
    Boolean,
    Text,
    Binary,
    Json,
    Temporal,
    Interval,
    Uuid,
    Array,
    Unknown,
}

/// Classify a database type name into a logical category.
///
/// Length and modifier suffixes are ignored: `DECIMAL(10,2)` and `INT UNSIGNED`
/// classify like `DECIMAL` and `INT`. PostgreSQL array types (`INT4[]`) are one
/// category whatever their element type.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_ascii_lowercase();
    if lower.ends_with("[]") {
        return TypeCategory::Array;
    }
    let base = lower.split(['(', ' ']).next().unwrap_or_default();

    match base {
        // SQLite's NUMERIC affinity stores plain floats
        "numeric" if db == DatabaseType::SQLite => TypeCategory::Float,
        "decimal" | "numeric" => TypeCategory::Decimal,
        "money" => TypeCategory::Money,
        "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" | "int2" | "int4"
        | "int8" | "serial" | "bigserial" | "smallserial" | "year" => TypeCategory::Integer,
        "bool" | "boolean" => TypeCategory::Boolean,
        "float" | "float4" | "float8" | "double" | "real" => TypeCategory::Float,
        "json" | "jsonb" => TypeCategory::Json,
        "timestamp" | "timestamptz" | "datetime" | "date" | "time" | "timetz" => {
            TypeCategory::Temporal
        }
        "interval" => TypeCategory::Interval,
        "uuid" => TypeCategory::Uuid,
        "bytea" | "blob" | "tinyblob" | "mediumblob" | "longblob" | "binary" | "varbinary" => {
            TypeCategory::Binary
        }
        "text" | "varchar" | "char" | "bpchar" | "name" | "tinytext" | "mediumtext"
        | "longtext" | "enum" | "character" => TypeCategory::Text,
        _ => TypeCategory::Unknown,
    }
}

/// Wrapper type for raw MySQL DECIMAL values as strings.
/// MySQL sends DECIMAL as text in both protocols, so this keeps the exact digits.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_ascii_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

/// Render an interval the way PostgreSQL's default `postgres` style does,
/// e.g. `1 year 2 mons 3 days 04:05:06.5`.
fn interval_text(interval: &PgInterval) -> String {
    fn unit(n: i64, singular: &str, plural: &str) -> String {
        format!("{} {}", n, if n == 1 { singular } else { plural })
    }

    let years = i64::from(interval.months / 12);
    let months = i64::from(interval.months % 12);
    let days = i64::from(interval.days);

    let mut parts = Vec::new();
    if years != 0 {
        parts.push(unit(years, "year", "years"));
    }
    if months != 0 {
        parts.push(unit(months, "mon", "mons"));
    }
    if days != 0 {
        parts.push(unit(days, "day", "days"));
    }

    let micros = interval.microseconds;
    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 { "-" } else { "" };
        let total = micros.unsigned_abs();
        let secs = total / 1_000_000;
        let mut time = format!(
            "{}{:02}:{:02}:{:02}",
            sign,
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        );
        let frac = total % 1_000_000;
        if frac != 0 {
            let digits = format!("{:06}", frac);
            time.push('.');
            time.push_str(digits.trim_end_matches('0'));
        }
        parts.push(time);
    }
    parts.join(" ")
}

/// Render a `timetz` the way PostgreSQL does: `13:45:30+02`, `09:00:00-03:30`.
fn time_tz_text(value: &PgTimeTz<NaiveTime, FixedOffset>) -> String {
    let east = value.offset.local_minus_utc();
    let sign = if east < 0 { '-' } else { '+' };
    let abs = east.unsigned_abs();
    let (hours, minutes, seconds) = (abs / 3600, abs / 60 % 60, abs % 60);

    let mut out = format!("{}{}{:02}", value.time, sign, hours);
    if minutes != 0 || seconds != 0 {
        out.push_str(&format!(":{:02}", minutes));
    }
    if seconds != 0 {
        out.push_str(&format!(":{:02}", seconds));
    }
    out
}

fn money_value(v: PgMoney) -> JsonValue {
    display_value(v.to_decimal(MONEY_FRAC_DIGITS))
}

fn array_value<T>(items: Vec<Option<T>>, map: impl Fn(T) -> JsonValue) -> JsonValue {
    JsonValue::Array(
        items
            .into_iter()
            .map(|item| item.map_or(JsonValue::Null, &map))
            .collect(),
    )
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

fn binary_value(bytes: Vec<u8>) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    JsonValue::String(STANDARD.encode(bytes))
}

fn timestamp_value(v: DateTime<Utc>) -> JsonValue {
    JsonValue::String(v.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn display_value(v: impl std::fmt::Display) -> JsonValue {
    JsonValue::String(v.to_string())
}

/// Return from the enclosing decoder if the column decodes as `$ty`.
macro_rules! try_column {
    ($row:expr, $idx:expr, $ty:ty, $map:expr) => {
        if let Ok(v) = $row.try_get::<$ty, _>($idx) {
            return Ok($map(v));
        }
    };
}

/// `try_column!` for a one-dimensional array, mapping each element with `$map`.
macro_rules! try_array {
    ($row:expr, $idx:expr, $elem:ty, $map:expr) => {
        try_column!($row, $idx, Vec<Option<$elem>>, |v: Vec<Option<$elem>>| {
            array_value(v, $map)
        });
    };
}

/// Trait for converting database rows to JSON maps.
pub trait RowToJson {
    fn to_json_map(&self) -> DbResult<JsonRow>;
}

/// Decode every column of `row` in select-list order.
fn columns_to_json<R: Row>(
    row: &R,
    db: DatabaseType,
    decode: impl Fn(&R, usize, TypeCategory) -> DbResult<JsonValue>,
) -> DbResult<JsonRow> {
    row.columns()
        .iter()
        .map(|col| {
            let type_name = col.type_info().name();
            let category = categorize_type(type_name, db);
            let value = decode(row, col.ordinal(), category).map_err(|e| {
                error!(
                    column = col.name(),
                    column_type = type_name,
                    error = %e,
                    "Failed to decode column"
                );
                DbError::internal(format!(
                    "Failed to decode column '{}' of type {}: {}",
                    col.name(),
                    type_name,
                    e.message()
                ))
            })?;
            Ok((col.name().to_string(), value))
        })
        .collect()
}

impl RowToJson for PgRow {
    fn to_json_map(&self) -> DbResult<JsonRow> {
        columns_to_json(self, DatabaseType::PostgreSQL, decode_postgres)
    }
}

impl RowToJson for MySqlRow {
    fn to_json_map(&self) -> DbResult<JsonRow> {
        columns_to_json(self, DatabaseType::MySQL, decode_mysql)
    }
}

impl RowToJson for SqliteRow {
    fn to_json_map(&self) -> DbResult<JsonRow> {
        columns_to_json(self, DatabaseType::SQLite, decode_sqlite)
    }
}

fn no_decoder() -> DbError {
    DbError::internal("no decoder for this column type")
}

fn decode_postgres(row: &PgRow, idx: usize, category: TypeCategory) -> DbResult<JsonValue> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(JsonValue::Null);
    }
    let text_format = matches!(raw.format(), PgValueFormat::Text);

    match category {
        TypeCategory::Integer => {
            try_column!(row, idx, i16, JsonValue::from);
            try_column!(row, idx, i32, JsonValue::from);
            try_column!(row, idx, i64, JsonValue::from);
        }
        TypeCategory::Float => {
            try_column!(row, idx, f32, |v: f32| float_value(v as f64));
            try_column!(row, idx, f64, float_value);
        }
        // Server text keeps every digit and the locale's currency format
        TypeCategory::Decimal | TypeCategory::Money if text_format => {}
        TypeCategory::Decimal => {
            try_column!(row, idx, Decimal, display_value);
        }
        TypeCategory::Money => {
            try_column!(row, idx, PgMoney, money_value);
        }
        TypeCategory::Boolean => {
            try_column!(row, idx, bool, JsonValue::Bool);
        }
        TypeCategory::Binary => {
            try_column!(row, idx, Vec<u8>, binary_value);
        }
        TypeCategory::Json => {
            try_column!(row, idx, JsonValue, |v| v);
        }
        TypeCategory::Temporal => {
            try_column!(row, idx, DateTime<Utc>, timestamp_value);
            try_column!(row, idx, NaiveDateTime, display_value);
            try_column!(row, idx, NaiveDate, display_value);
            try_column!(row, idx, NaiveTime, display_value);
            try_column!(row, idx, PgTimeTz<NaiveTime, FixedOffset>, |v| {
                JsonValue::String(time_tz_text(&v))
            });
        }
        TypeCategory::Interval => {
            try_column!(row, idx, PgInterval, |v| JsonValue::String(interval_text(&v)));
        }
        TypeCategory::Uuid => {
            try_column!(row, idx, Uuid, display_value);
        }
        TypeCategory::Array => {
            try_array!(row, idx, i16, JsonValue::from);
            try_array!(row, idx, i32, JsonValue::from);
            try_array!(row, idx, i64, JsonValue::from);
            try_array!(row, idx, f32, |f: f32| float_value(f as f64));
            try_array!(row, idx, f64, float_value);
            try_array!(row, idx, bool, JsonValue::Bool);
            try_array!(row, idx, String, JsonValue::String);
            try_array!(row, idx, Uuid, display_value);
        }
        TypeCategory::Text | TypeCategory::Unknown => {
            try_column!(row, idx, String, JsonValue::String);
        }
    }

    if text_format {
        let text = raw.as_str().map_err(|e| DbError::internal(e.to_string()))?;
        return Ok(JsonValue::String(text.to_string()));
    }
    Err(no_decoder())
}

fn decode_mysql(row: &MySqlRow, idx: usize, category: TypeCategory) -> DbResult<JsonValue> {
    if row.try_get_raw(idx)?.is_null() {
        return Ok(JsonValue::Null);
    }

    match category {
        TypeCategory::Integer => {
            try_column!(row, idx, i64, JsonValue::from);
            try_column!(row, idx, u64, JsonValue::from);
            try_column!(row, idx, i32, JsonValue::from);
            try_column!(row, idx, u32, JsonValue::from);
            try_column!(row, idx, i16, JsonValue::from);
            try_column!(row, idx, u16, JsonValue::from);
            try_column!(row, idx, i8, JsonValue::from);
            try_column!(row, idx, u8, JsonValue::from);
        }
        TypeCategory::Float => {
            try_column!(row, idx, f64, float_value);
            try_column!(row, idx, f32, |v: f32| float_value(v as f64));
        }
        TypeCategory::Decimal => {
            try_column!(row, idx, RawDecimal, |v: RawDecimal| JsonValue::String(v.0));
        }
        TypeCategory::Boolean => {
            try_column!(row, idx, bool, JsonValue::Bool);
        }
        TypeCategory::Binary => {
            try_column!(row, idx, Vec<u8>, binary_value);
        }
        TypeCategory::Json => {
            try_column!(row, idx, JsonValue, |v| v);
        }
        TypeCategory::Temporal => {
            try_column!(row, idx, DateTime<Utc>, timestamp_value);
            try_column!(row, idx, NaiveDateTime, display_value);
            try_column!(row, idx, NaiveDate, display_value);
            try_column!(row, idx, NaiveTime, display_value);
        }
        _ => {}
    }

    try_column!(row, idx, String, JsonValue::String);
    // MySQL reports some text results (e.g. CAST ... AS CHAR) with a binary collation
    try_column!(row, idx, Vec<u8>, |v: Vec<u8>| match String::from_utf8(v) {
        Ok(s) => JsonValue::String(s),
        Err(e) => binary_value(e.into_bytes()),
    });
    Err(no_decoder())
}

fn decode_sqlite(row: &SqliteRow, idx: usize, category: TypeCategory) -> DbResult<JsonValue> {
    if row.try_get_raw(idx)?.is_null() {
        return Ok(JsonValue::Null);
    }

    match category {
        TypeCategory::Boolean => {
            try_column!(row, idx, bool, JsonValue::Bool);
        }
        TypeCategory::Json => {
            if let Ok(text) = row.try_get::<String, _>(idx) {
                return Ok(serde_json::from_str(&text).unwrap_or(JsonValue::String(text)));
            }
        }
        _ => {}
    }

    // SQLite values carry their own storage class regardless of the declared type,
    // so fall back to trying each class in turn.
    try_column!(row, idx, i64, JsonValue::from);
    try_column!(row, idx, f64, float_value);
    try_column!(row, idx, String, JsonValue::String);
    try_column!(row, idx, Vec<u8>, binary_value);
    Err(no_decoder())
}
