//! # Decoder
//!
//! Converts raw [`Value`]s to a requested [`Cast`].
//!
//! The converter table is open: [`Decoder::register`] adds or replaces the
//! converter for any cast, including [`Cast::Custom`] ones. Each data node
//! owns an `Arc<Decoder>`; share one instance across nodes with
//! `with_decoder` when custom converters are registered.
//!
//! # String forms
//! - bool: `1`, `t`, `true`, `y` / `0`, `f`, `false`, `n`, any case
//! - list: items separated by `,`, trimmed
//! - map: pairs separated by `;`, each `key=value`, trimmed
//! - date / datetime: ISO-8601 prefix (10 / 19 characters), offsets ignored
//! - time: `HH:MM:SS` with optional fractional seconds

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use errors::{BoxError, DecodeError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use strata_core::value::{LIST_DELIMITER, MAP_DELIMITER};
use strata_core::{ConfigMap, Value};

const TRUE_VALUES: [&str; 4] = ["1", "t", "true", "y"];
const FALSE_VALUES: [&str; 4] = ["0", "f", "false", "n"];

/// Target type of a decode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Cast {
    Bool,
    Int,
    Float,
    Str,
    List,
    Map,
    Date,
    DateTime,
    Time,
    /// A caller-registered target.
    Custom(String),
}

impl Cast {
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(name.into())
    }
}

impl fmt::Display for Cast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
            Self::Str => f.write_str("str"),
            Self::List => f.write_str("list"),
            Self::Map => f.write_str("map"),
            Self::Date => f.write_str("date"),
            Self::DateTime => f.write_str("datetime"),
            Self::Time => f.write_str("time"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

/// A conversion function. Errors are wrapped into [`DecodeError::Conversion`].
pub type Converter = Arc<dyn Fn(&Value) -> Result<Value, BoxError> + Send + Sync>;

pub struct Decoder {
    converters: RwLock<HashMap<Cast, Converter>>,
}

impl Decoder {
    /// Decoder with the built-in converters.
    pub fn new() -> Self {
        let decoder = Self::empty();
        decoder.register(Cast::Bool, to_bool);
        decoder.register(Cast::Int, to_int);
        decoder.register(Cast::Float, to_float);
        decoder.register(Cast::Str, to_str);
        decoder.register(Cast::List, to_list);
        decoder.register(Cast::Map, to_map);
        decoder.register(Cast::Date, to_date);
        decoder.register(Cast::DateTime, to_datetime);
        decoder.register(Cast::Time, to_time);
        decoder
    }

    /// Decoder without any converter.
    pub fn empty() -> Self {
        Self {
            converters: RwLock::new(HashMap::new()),
        }
    }

    /// Add or replace the converter for `cast`.
    pub fn register(
        &self,
        cast: Cast,
        converter: impl Fn(&Value) -> Result<Value, BoxError> + Send + Sync + 'static,
    ) {
        self.converters.write().insert(cast, Arc::new(converter));
    }

    pub fn unregister(&self, cast: &Cast) -> Option<Converter> {
        self.converters.write().remove(cast)
    }

    pub fn supports(&self, cast: &Cast) -> bool {
        self.converters.read().contains_key(cast)
    }

    pub fn decode(&self, value: &Value, cast: &Cast) -> Result<Value, DecodeError> {
        if value.is_null() {
            return Err(DecodeError::NullValue {
                target: cast.to_string(),
            });
        }

        let converter = self
            .converters
            .read()
            .get(cast)
            .cloned()
            .ok_or_else(|| DecodeError::Unsupported {
                target: cast.to_string(),
            })?;

        converter(value).map_err(|e| DecodeError::conversion(value.to_string(), cast.to_string(), e))
    }

    /// Decode straight into a Rust type.
    pub fn decode_as<T: FromValue>(&self, value: &Value) -> Result<T, DecodeError> {
        extract(self.decode(value, &T::CAST)?)
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut casts: Vec<String> = self.converters.read().keys().map(Cast::to_string).collect();
        casts.sort();
        f.debug_struct("Decoder").field("casts", &casts).finish()
    }
}

fn expected_str(value: &Value) -> BoxError {
    format!("expected str, got {}", value.type_name()).into()
}

fn to_bool(value: &Value) -> Result<Value, BoxError> {
    if let Value::Bool(b) = value {
        return Ok(Value::Bool(*b));
    }

    let text = value.to_string().to_lowercase();
    if TRUE_VALUES.contains(&text.as_str()) {
        Ok(Value::Bool(true))
    } else if FALSE_VALUES.contains(&text.as_str()) {
        Ok(Value::Bool(false))
    } else {
        Err(format!("could not convert string to bool: {}", text).into())
    }
}

fn to_int(value: &Value) -> Result<Value, BoxError> {
    match value {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Float(f) if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::String(s) => Ok(Value::Int(s.trim().parse::<i64>()?)),
        other => Err(format!("cannot convert {} to int", other.type_name()).into()),
    }
}

fn to_float(value: &Value) -> Result<Value, BoxError> {
    match value {
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Int(i) => Ok(Value::Float(*i as f64)),
        Value::Bool(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
        Value::String(s) => Ok(Value::Float(s.trim().parse::<f64>()?)),
        other => Err(format!("cannot convert {} to float", other.type_name()).into()),
    }
}

fn to_str(value: &Value) -> Result<Value, BoxError> {
    Ok(Value::String(value.to_string()))
}

fn to_list(value: &Value) -> Result<Value, BoxError> {
    match value {
        Value::List(items) => Ok(Value::List(items.clone())),
        Value::String(s) if s.trim().is_empty() => Ok(Value::List(Vec::new())),
        Value::String(s) => Ok(Value::List(
            s.split(LIST_DELIMITER)
                .map(|item| Value::from(item.trim()))
                .collect(),
        )),
        other => Err(expected_str(other)),
    }
}

fn to_map(value: &Value) -> Result<Value, BoxError> {
    match value {
        Value::Map(map) => Ok(Value::Map(map.clone())),
        Value::String(s) => {
            let mut map = ConfigMap::new();
            for pair in s.split(MAP_DELIMITER).filter(|p| !p.trim().is_empty()) {
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| format!("expected key=value, got {:?}", pair.trim()))?;
                map.insert(key.trim(), value.trim());
            }
            Ok(Value::Map(map))
        }
        other => Err(expected_str(other)),
    }
}

fn prefix(s: &str, len: usize) -> &str {
    s.get(..len).unwrap_or(s)
}

fn to_date(value: &Value) -> Result<Value, BoxError> {
    match value {
        Value::Date(d) => Ok(Value::Date(*d)),
        Value::DateTime(dt) => Ok(Value::Date(dt.date())),
        Value::String(s) => Ok(Value::Date(NaiveDate::parse_from_str(
            prefix(s, 10),
            "%Y-%m-%d",
        )?)),
        other => Err(expected_str(other)),
    }
}

fn to_datetime(value: &Value) -> Result<Value, BoxError> {
    match value {
        Value::DateTime(dt) => Ok(Value::DateTime(*dt)),
        Value::Date(d) => Ok(Value::DateTime(d.and_time(NaiveTime::MIN))),
        Value::String(s) => Ok(Value::DateTime(NaiveDateTime::parse_from_str(
            prefix(s, 19),
            "%Y-%m-%dT%H:%M:%S",
        )?)),
        other => Err(expected_str(other)),
    }
}

fn to_time(value: &Value) -> Result<Value, BoxError> {
    match value {
        Value::Time(t) => Ok(Value::Time(*t)),
        Value::DateTime(dt) => {
            let time = dt.time();
            Ok(Value::Time(time.with_nanosecond(0).unwrap_or(time)))
        }
        Value::String(s) => {
            let format = if s.len() > 8 { "%H:%M:%S%.f" } else { "%H:%M:%S" };
            Ok(Value::Time(NaiveTime::parse_from_str(s, format)?))
        }
        other => Err(expected_str(other)),
    }
}

/// Rust types a [`Value`] can be decoded into.
/// Extract `T` from a value converted with `T::CAST`, reporting values the
/// type cannot hold (e.g. `70000` as `u16`) as conversion errors.
pub(crate) fn extract<T: FromValue>(value: Value) -> Result<T, DecodeError> {
    let rendered = value.to_string();
    T::from_value(value).ok_or_else(|| {
        let target = std::any::type_name::<T>();
        DecodeError::conversion(rendered, target, format!("value out of range for {target}"))
    })
}

pub trait FromValue: Sized {
    /// Cast used to convert the raw value before extraction.
    const CAST: Cast;

    /// Extract from a value already converted with [`Self::CAST`].
    fn from_value(value: Value) -> Option<Self>;
}

impl FromValue for bool {
    const CAST: Cast = Cast::Bool;

    fn from_value(value: Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for i64 {
    const CAST: Cast = Cast::Int;

    fn from_value(value: Value) -> Option<Self> {
        value.as_i64()
    }
}

macro_rules! from_value_int {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                const CAST: Cast = Cast::Int;

                fn from_value(value: Value) -> Option<Self> {
                    value.as_i64().and_then(|i| <$ty>::try_from(i).ok())
                }
            }
        )*
    };
}

from_value_int!(i32, u16, u32, u64, usize);

impl FromValue for f64 {
    const CAST: Cast = Cast::Float;

    fn from_value(value: Value) -> Option<Self> {
        value.as_f64()
    }
}

impl FromValue for String {
    const CAST: Cast = Cast::Str;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl FromValue for Vec<Value> {
    const CAST: Cast = Cast::List;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl FromValue for Vec<String> {
    const CAST: Cast = Cast::List;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::List(items) => Some(items.iter().map(Value::to_string).collect()),
            _ => None,
        }
    }
}

impl FromValue for ConfigMap {
    const CAST: Cast = Cast::Map;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl FromValue for NaiveDate {
    const CAST: Cast = Cast::Date;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Date(d) => Some(d),
            _ => None,
        }
    }
}

impl FromValue for NaiveDateTime {
    const CAST: Cast = Cast::DateTime;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::DateTime(dt) => Some(dt),
            _ => None,
        }
    }
}

impl FromValue for NaiveTime {
    const CAST: Cast = Cast::Time;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Time(t) => Some(t),
            _ => None,
        }
    }
}
