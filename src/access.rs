//! Typed lookups on the [`Store`].
//!
//! Every type has a `get_*` / `check_*` pair. `get_*` never fails: an unset
//! key, or a value that cannot be converted, yields the type's zero value.
//! `check_*` returns the same value plus whether the key was explicitly set
//! (any layer other than built-in defaults and unsupplied flag defaults), for
//! callers that must tell "explicitly false" from "absent".
//!
//! Conversions are lenient in the usual config-file way: `"42"` reads as an
//! integer, `1` reads as `true`, a comma-separated string reads as a list.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use toml::Value;

use crate::store::Store;
use crate::value::{parse_bool, split_list};

macro_rules! accessors {
    ($( $(#[$doc:meta])* $get:ident, $check:ident => $ty:ty, $cast:path; )*) => {
        impl Store {
            $(
                $(#[$doc])*
                pub fn $get(&self, key: &str) -> $ty {
                    self.get(key).and_then(|v| $cast(&v)).unwrap_or_default()
                }

                /// Like the matching `get_*`, plus whether the key was explicitly set.
                pub fn $check(&self, key: &str) -> ($ty, bool) {
                    match self.lookup(key) {
                        Some((v, src)) => ($cast(&v).unwrap_or_default(), src.is_explicit()),
                        None => (<$ty>::default(), false),
                    }
                }
            )*
        }
    };
}

accessors! {
    get_string, check_string => String, to_string;
    get_bool, check_bool => bool, to_bool;
    get_i8, check_i8 => i8, to_int::<i8>;
    get_i16, check_i16 => i16, to_int::<i16>;
    get_i32, check_i32 => i32, to_int::<i32>;
    get_i64, check_i64 => i64, to_int::<i64>;
    get_u8, check_u8 => u8, to_int::<u8>;
    get_u16, check_u16 => u16, to_int::<u16>;
    get_u32, check_u32 => u32, to_int::<u32>;
    get_u64, check_u64 => u64, to_u64;
    /// Narrowed from the stored `f64`.
    get_f32, check_f32 => f32, to_f32;
    get_f64, check_f64 => f64, to_f64;
    get_string_list, check_string_list => Vec<String>, to_string_list;
    /// Hex strings and arrays of small integers both decode.
    get_bytes, check_bytes => Vec<u8>, to_bytes;
    /// RFC 3339 timestamps, TOML datetimes, `YYYY-MM-DD` dates and unix
    /// seconds. The zero value is the unix epoch.
    get_time, check_time => DateTime<Utc>, to_time;
    /// Go-style durations (`"1h30m"`, `"250ms"`); bare numbers are nanoseconds.
    get_duration, check_duration => Duration, to_duration;
    get_string_map, check_string_map => BTreeMap<String, Value>, to_string_map;
    get_string_map_string, check_string_map_string => BTreeMap<String, String>, to_string_map_string;
    get_string_map_string_list, check_string_map_string_list => BTreeMap<String, Vec<String>>, to_string_map_string_list;
    /// `"512"`, `"10kb"`, `"1.5mb"`, `"2gb"`; multiples of 1024.
    get_size_in_bytes, check_size_in_bytes => u64, to_size_in_bytes;
}

fn to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Boolean(b) => Some(b.to_string()),
        Value::Datetime(d) => Some(d.to_string()),
        Value::Array(_) | Value::Table(_) => None,
    }
}

fn to_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Boolean(b) => Some(*b),
        Value::Integer(i) => Some(*i != 0),
        Value::String(s) => parse_bool(s).ok(),
        _ => None,
    }
}

fn to_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Integer(i) => Some(*i),
        Value::Float(f) if f.is_finite() => Some(f.trunc() as i64),
        Value::Boolean(b) => Some(i64::from(*b)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_int<T: TryFrom<i64>>(v: &Value) -> Option<T> {
    to_i64(v).and_then(|i| T::try_from(i).ok())
}

// u64 values above i64::MAX are stored as decimal strings.
fn to_u64(v: &Value) -> Option<u64> {
    match v {
        Value::String(s) => s.trim().parse().ok(),
        other => to_i64(other).and_then(|i| u64::try_from(i).ok()),
    }
}

fn to_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Float(f) => Some(*f),
        Value::Integer(i) => Some(*i as f64),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_f32(v: &Value) -> Option<f32> {
    to_f64(v).map(|f| f as f32)
}

fn to_string_list(v: &Value) -> Option<Vec<String>> {
    match v {
        Value::Array(items) => Some(items.iter().filter_map(to_string).collect()),
        Value::String(s) => Some(split_list(s)),
        _ => None,
    }
}

fn to_bytes(v: &Value) -> Option<Vec<u8>> {
    match v {
        Value::String(s) => hex::decode(s.trim()).ok(),
        Value::Array(items) => items.iter().map(to_int::<u8>).collect(),
        _ => None,
    }
}

fn to_time(v: &Value) -> Option<DateTime<Utc>> {
    let text = match v {
        Value::Datetime(d) => d.to_string(),
        Value::String(s) => s.trim().to_string(),
        Value::Integer(secs) => return DateTime::from_timestamp(*secs, 0),
        _ => return None,
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(&text) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(&text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn to_duration(v: &Value) -> Option<Duration> {
    match v {
        Value::Integer(ns) => u64::try_from(*ns).ok().map(Duration::from_nanos),
        Value::Float(ns) if *ns >= 0.0 => Some(Duration::from_nanos(*ns as u64)),
        Value::String(s) => parse_duration(s.trim()),
        _ => None,
    }
}

/// Parse a Go-style duration: a sequence of decimal numbers, each with a
/// unit suffix (`ns`, `us`, `µs`, `ms`, `s`, `m`, `h`). A bare number is
/// taken as nanoseconds.
pub(crate) fn parse_duration(s: &str) -> Option<Duration> {
    if s.is_empty() {
        return None;
    }
    if let Ok(ns) = s.parse::<u64>() {
        return Some(Duration::from_nanos(ns));
    }

    let mut total = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_len == 0 {
            return None;
        }
        let number: f64 = rest[..num_len].parse().ok()?;
        rest = &rest[num_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return None,
        };
        rest = &rest[unit_len..];
        total += number * nanos_per_unit;
    }
    Some(Duration::from_nanos(total.round() as u64))
}

fn to_string_map(v: &Value) -> Option<BTreeMap<String, Value>> {
    match v {
        Value::Table(t) => Some(t.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        _ => None,
    }
}

fn to_string_map_string(v: &Value) -> Option<BTreeMap<String, String>> {
    let map = to_string_map(v)?;
    Some(
        map.into_iter()
            .filter_map(|(k, v)| to_string(&v).map(|s| (k, s)))
            .collect(),
    )
}

fn to_string_map_string_list(v: &Value) -> Option<BTreeMap<String, Vec<String>>> {
    let map = to_string_map(v)?;
    Some(
        map.into_iter()
            .filter_map(|(k, v)| to_string_list(&v).map(|l| (k, l)))
            .collect(),
    )
}

fn to_size_in_bytes(v: &Value) -> Option<u64> {
    match v {
        Value::Integer(i) => u64::try_from(*i).ok(),
        Value::String(s) => parse_size(s),
        _ => None,
    }
}

fn parse_size(s: &str) -> Option<u64> {
    let lower = s.trim().to_ascii_lowercase();
    let (number, multiplier) = if let Some(n) = lower.strip_suffix("gb") {
        (n, 1u64 << 30)
    } else if let Some(n) = lower.strip_suffix("mb") {
        (n, 1 << 20)
    } else if let Some(n) = lower.strip_suffix("kb") {
        (n, 1 << 10)
    } else if let Some(n) = lower.strip_suffix('b') {
        (n, 1)
    } else {
        (lower.as_str(), 1)
    };
    let value: f64 = number.trim().parse().ok()?;
    if value < 0.0 {
        return None;
    }
    Some((value * multiplier as f64) as u64)
}
