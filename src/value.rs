//! Typed flag values.
//!
//! Every flag holds one of a closed set of primitive types. [`FlagValue`] is
//! the type-erased carrier used by option lists and flag sets; [`FlagType`]
//! ties each Rust primitive to its [`ValueKind`], its clap value parser and
//! its conversions, so the typed [`Flag<T>`](crate::Flag) can check a
//! dynamic default against `T` exactly once, at declaration time.

use std::fmt;

use clap::builder::ValueParser;
use toml::Value;

/// The primitive type of a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    String,
    StringList,
    Bytes,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Bool => "bool",
            ValueKind::I8 => "i8",
            ValueKind::I16 => "i16",
            ValueKind::I32 => "i32",
            ValueKind::I64 => "i64",
            ValueKind::U8 => "u8",
            ValueKind::U16 => "u16",
            ValueKind::U32 => "u32",
            ValueKind::U64 => "u64",
            ValueKind::F32 => "f32",
            ValueKind::F64 => "f64",
            ValueKind::String => "string",
            ValueKind::StringList => "string list",
            ValueKind::Bytes => "bytes",
        };
        f.write_str(name)
    }
}

/// A flag value of any supported primitive type.
#[derive(Debug, Clone, PartialEq)]
pub enum FlagValue {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    StringList(Vec<String>),
    Bytes(Vec<u8>),
}

impl FlagValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            FlagValue::Bool(_) => ValueKind::Bool,
            FlagValue::I8(_) => ValueKind::I8,
            FlagValue::I16(_) => ValueKind::I16,
            FlagValue::I32(_) => ValueKind::I32,
            FlagValue::I64(_) => ValueKind::I64,
            FlagValue::U8(_) => ValueKind::U8,
            FlagValue::U16(_) => ValueKind::U16,
            FlagValue::U32(_) => ValueKind::U32,
            FlagValue::U64(_) => ValueKind::U64,
            FlagValue::F32(_) => ValueKind::F32,
            FlagValue::F64(_) => ValueKind::F64,
            FlagValue::String(_) => ValueKind::String,
            FlagValue::StringList(_) => ValueKind::StringList,
            FlagValue::Bytes(_) => ValueKind::Bytes,
        }
    }

    /// Parse the command-line spelling of a value of the given kind.
    ///
    /// Lists are comma separated, byte sequences are hex encoded.
    pub fn parse(kind: ValueKind, s: &str) -> Result<FlagValue, String> {
        fn num<T: std::str::FromStr>(s: &str) -> Result<T, String>
        where
            T::Err: fmt::Display,
        {
            s.trim().parse::<T>().map_err(|e| e.to_string())
        }

        Ok(match kind {
            ValueKind::Bool => FlagValue::Bool(parse_bool(s)?),
            ValueKind::I8 => FlagValue::I8(num(s)?),
            ValueKind::I16 => FlagValue::I16(num(s)?),
            ValueKind::I32 => FlagValue::I32(num(s)?),
            ValueKind::I64 => FlagValue::I64(num(s)?),
            ValueKind::U8 => FlagValue::U8(num(s)?),
            ValueKind::U16 => FlagValue::U16(num(s)?),
            ValueKind::U32 => FlagValue::U32(num(s)?),
            ValueKind::U64 => FlagValue::U64(num(s)?),
            ValueKind::F32 => FlagValue::F32(num(s)?),
            ValueKind::F64 => FlagValue::F64(num(s)?),
            ValueKind::String => FlagValue::String(s.to_string()),
            ValueKind::StringList => FlagValue::StringList(split_list(s)),
            ValueKind::Bytes => FlagValue::Bytes(parse_hex(s)?),
        })
    }

    /// The command-line spelling of this value; inverse of [`parse`](Self::parse).
    pub fn to_arg_string(&self) -> String {
        match self {
            FlagValue::Bool(v) => v.to_string(),
            FlagValue::I8(v) => v.to_string(),
            FlagValue::I16(v) => v.to_string(),
            FlagValue::I32(v) => v.to_string(),
            FlagValue::I64(v) => v.to_string(),
            FlagValue::U8(v) => v.to_string(),
            FlagValue::U16(v) => v.to_string(),
            FlagValue::U32(v) => v.to_string(),
            FlagValue::U64(v) => v.to_string(),
            FlagValue::F32(v) => v.to_string(),
            FlagValue::F64(v) => v.to_string(),
            FlagValue::String(v) => v.clone(),
            FlagValue::StringList(v) => v.join(","),
            FlagValue::Bytes(v) => hex::encode(v),
        }
    }

    /// Convert into the store's dynamic value type.
    ///
    /// Unsigned values beyond `i64::MAX` are kept as decimal strings; byte
    /// sequences are stored hex encoded.
    pub fn to_toml(&self) -> Value {
        match self {
            FlagValue::Bool(v) => Value::Boolean(*v),
            FlagValue::I8(v) => Value::Integer(i64::from(*v)),
            FlagValue::I16(v) => Value::Integer(i64::from(*v)),
            FlagValue::I32(v) => Value::Integer(i64::from(*v)),
            FlagValue::I64(v) => Value::Integer(*v),
            FlagValue::U8(v) => Value::Integer(i64::from(*v)),
            FlagValue::U16(v) => Value::Integer(i64::from(*v)),
            FlagValue::U32(v) => Value::Integer(i64::from(*v)),
            FlagValue::U64(v) => match i64::try_from(*v) {
                Ok(i) => Value::Integer(i),
                Err(_) => Value::String(v.to_string()),
            },
            FlagValue::F32(v) => Value::Float(f64::from(*v)),
            FlagValue::F64(v) => Value::Float(*v),
            FlagValue::String(v) => Value::String(v.clone()),
            FlagValue::StringList(v) => {
                Value::Array(v.iter().cloned().map(Value::String).collect())
            }
            FlagValue::Bytes(v) => Value::String(hex::encode(v)),
        }
    }
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_arg_string())
    }
}

pub(crate) fn parse_bool(s: &str) -> Result<bool, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "on" => Ok(true),
        "0" | "f" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("invalid boolean '{other}'")),
    }
}

pub(crate) fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_hex(s: &str) -> Result<Vec<u8>, String> {
    hex::decode(s.trim()).map_err(|e| e.to_string())
}

/// A Rust primitive that can back a flag.
pub trait FlagType: Clone + Default + fmt::Debug + Send + Sync + 'static {
    const KIND: ValueKind;

    fn into_value(self) -> FlagValue;

    fn from_value(value: FlagValue) -> Option<Self>;

    /// The clap parser that produces this type from one command-line token.
    fn value_parser() -> ValueParser;
}

macro_rules! scalar_flag_type {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FlagType for $ty {
                const KIND: ValueKind = ValueKind::$variant;

                fn into_value(self) -> FlagValue {
                    FlagValue::$variant(self)
                }

                fn from_value(value: FlagValue) -> Option<Self> {
                    match value {
                        FlagValue::$variant(v) => Some(v),
                        _ => None,
                    }
                }

                fn value_parser() -> ValueParser {
                    clap::value_parser!($ty).into()
                }
            }

            impl From<$ty> for FlagValue {
                fn from(v: $ty) -> Self {
                    FlagValue::$variant(v)
                }
            }
        )*
    };
}

scalar_flag_type! {
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => String,
}

impl FlagType for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn into_value(self) -> FlagValue {
        FlagValue::Bool(self)
    }

    fn from_value(value: FlagValue) -> Option<Self> {
        match value {
            FlagValue::Bool(v) => Some(v),
            _ => None,
        }
    }

    fn value_parser() -> ValueParser {
        ValueParser::new(|s: &str| parse_bool(s))
    }
}

impl From<bool> for FlagValue {
    fn from(v: bool) -> Self {
        FlagValue::Bool(v)
    }
}

impl FlagType for Vec<String> {
    const KIND: ValueKind = ValueKind::StringList;

    fn into_value(self) -> FlagValue {
        FlagValue::StringList(self)
    }

    fn from_value(value: FlagValue) -> Option<Self> {
        match value {
            FlagValue::StringList(v) => Some(v),
            _ => None,
        }
    }

    // One token per occurrence; the arg splits on ',' before parsing.
    fn value_parser() -> ValueParser {
        ValueParser::string()
    }
}

impl From<Vec<String>> for FlagValue {
    fn from(v: Vec<String>) -> Self {
        FlagValue::StringList(v)
    }
}

impl From<&[&str]> for FlagValue {
    fn from(v: &[&str]) -> Self {
        FlagValue::StringList(v.iter().map(|s| s.to_string()).collect())
    }
}

/// Byte sequences are written in hex on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

impl FlagType for HexBytes {
    const KIND: ValueKind = ValueKind::Bytes;

    fn into_value(self) -> FlagValue {
        FlagValue::Bytes(self.0)
    }

    fn from_value(value: FlagValue) -> Option<Self> {
        match value {
            FlagValue::Bytes(v) => Some(HexBytes(v)),
            _ => None,
        }
    }

    fn value_parser() -> ValueParser {
        ValueParser::new(|s: &str| parse_hex(s).map(HexBytes))
    }
}

impl From<HexBytes> for FlagValue {
    fn from(v: HexBytes) -> Self {
        FlagValue::Bytes(v.0)
    }
}

impl From<Vec<u8>> for FlagValue {
    fn from(v: Vec<u8>) -> Self {
        FlagValue::Bytes(v)
    }
}

impl From<&str> for FlagValue {
    fn from(v: &str) -> Self {
        FlagValue::String(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(FlagValue::from(5i32).kind(), ValueKind::I32);
        assert_eq!(FlagValue::from(5u64).kind(), ValueKind::U64);
        assert_eq!(FlagValue::from("x").kind(), ValueKind::String);
        assert_eq!(FlagValue::from(vec![1u8, 2]).kind(), ValueKind::Bytes);
    }

    #[test]
    fn parse_bool_spellings() {
        assert_eq!(FlagValue::parse(ValueKind::Bool, "TRUE"), Ok(FlagValue::Bool(true)));
        assert_eq!(FlagValue::parse(ValueKind::Bool, "0"), Ok(FlagValue::Bool(false)));
        assert!(FlagValue::parse(ValueKind::Bool, "maybe").is_err());
    }

    #[test]
    fn parse_rejects_out_of_range() {
        assert!(FlagValue::parse(ValueKind::I8, "300").is_err());
        assert!(FlagValue::parse(ValueKind::U16, "-1").is_err());
    }

    #[test]
    fn parse_list_and_hex() {
        assert_eq!(
            FlagValue::parse(ValueKind::StringList, "a, b,,c"),
            Ok(FlagValue::StringList(vec!["a".into(), "b".into(), "c".into()]))
        );
        assert_eq!(
            FlagValue::parse(ValueKind::Bytes, "dead"),
            Ok(FlagValue::Bytes(vec![0xde, 0xad]))
        );
        assert!(FlagValue::parse(ValueKind::Bytes, "xyz").is_err());
    }

    #[test]
    fn large_unsigned_stored_as_string() {
        assert_eq!(FlagValue::U64(u64::MAX).to_toml(), Value::String(u64::MAX.to_string()));
        assert_eq!(FlagValue::U64(7).to_toml(), Value::Integer(7));
    }

    #[test]
    fn bytes_stored_hex_encoded() {
        assert_eq!(
            FlagValue::Bytes(vec![0xca, 0xfe]).to_toml(),
            Value::String("cafe".into())
        );
    }

    #[test]
    fn from_value_rejects_other_kinds() {
        assert_eq!(i32::from_value(FlagValue::I32(3)), Some(3));
        assert_eq!(i32::from_value(FlagValue::I64(3)), None);
        assert_eq!(String::from_value(FlagValue::Bool(true)), None);
    }
}
