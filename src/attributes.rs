//! Feature attribute values.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

/// Attributes of a single map feature.
///
/// The styling engine only ever reads from this dictionary.
#[derive(Clone, PartialEq, Default, Debug)]
pub struct AttrDictionary {
    values: HashMap<String, Value>,
}

impl AttrDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value of a feature property.
    pub fn get<Q>(&self, name: &Q) -> Option<&Value>
    where
        String: Borrow<Q>,
        Q: std::hash::Hash + Eq + ?Sized,
    {
        self.values.get(name)
    }

    /// Add or replace a feature property.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl AsRef<AttrDictionary> for AttrDictionary {
    fn as_ref(&self) -> &AttrDictionary {
        self
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for AttrDictionary {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let values = iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { values }
    }
}

/// Deserialize attributes from a flat map like a JSON object.
impl<'de> Deserialize<'de> for AttrDictionary {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct AttrVisitor;

        impl<'de> Visitor<'de> for AttrVisitor {
            type Value = AttrDictionary;

            fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str("map of feature attributes")
            }

            fn visit_map<A>(self, mut map: A) -> Result<AttrDictionary, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut attrs = AttrDictionary::new();
                while let Some((key, value)) = map.next_entry::<String, Value>()? {
                    attrs.values.insert(key, value);
                }
                Ok(attrs)
            }
        }

        deserializer.deserialize_map(AttrVisitor)
    }
}

/// Scalar attribute value.
#[derive(Clone, PartialEq, Debug)]
pub enum Value {
    String(String),
    Number(f64),
}

impl Value {
    /// Numeric representation of this value.
    ///
    /// Strings are numeric if they are valid floating point literals.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(number) => Some(*number),
            Self::String(string) => parse_number(string),
        }
    }

    /// String content, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(string) => Some(string),
            Self::Number(_) => None,
        }
    }

    /// Check whether this value takes part in numeric comparisons.
    pub fn is_numeric(&self) -> bool {
        self.as_number().is_some()
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(value as f64)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(string) => f.write_str(string),
            // Print integral numbers without a trailing fraction.
            Self::Number(number) if number.fract() == 0. && number.abs() < 1e15 => {
                write!(f, "{}", *number as i64)
            },
            Self::Number(number) => write!(f, "{number}"),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ValueVisitor;

        impl Visitor<'_> for ValueVisitor {
            type Value = Value;

            fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str("string, number or boolean")
            }

            fn visit_str<E>(self, value: &str) -> Result<Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Value::String(value.into()))
            }

            fn visit_string<E>(self, value: String) -> Result<Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Value::String(value))
            }

            fn visit_bool<E>(self, value: bool) -> Result<Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Value::String(value.to_string()))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Value::Number(value as f64))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Value::Number(value as f64))
            }

            fn visit_f64<E>(self, value: f64) -> Result<Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Value::Number(value))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

/// Parse a floating point literal.
///
/// Accepts decimal literals with optional fraction and exponent, `NaN`,
/// `Infinity` and hexadecimal literals with a binary exponent (`0x1.8p1`).
/// A single trailing `f`/`d` type suffix is ignored.
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();

    let (negative, unsigned) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };

    let magnitude = match unsigned {
        "NaN" => f64::NAN,
        "Infinity" => f64::INFINITY,
        _ => {
            let literal = unsigned.strip_suffix(['f', 'F', 'd', 'D']).unwrap_or(unsigned);
            match literal.strip_prefix("0x").or_else(|| literal.strip_prefix("0X")) {
                Some(hex) => parse_hex_float(hex)?,
                None => parse_decimal(literal)?,
            }
        },
    };

    Some(if negative { -magnitude } else { magnitude })
}

/// Parse an unsigned decimal literal.
fn parse_decimal(literal: &str) -> Option<f64> {
    // Reject everything Rust accepts beyond the literal grammar, like `inf`.
    let valid_chars = literal.bytes().all(|b| b.is_ascii_digit() || b".eE+-".contains(&b));
    let has_digit = literal.bytes().any(|b| b.is_ascii_digit());
    if !valid_chars || !has_digit || literal.starts_with(['+', '-']) {
        return None;
    }

    literal.parse().ok()
}

/// Parse the part of a hexadecimal float literal after its `0x` prefix.
fn parse_hex_float(hex: &str) -> Option<f64> {
    let (mantissa, exponent) = hex.split_once(['p', 'P'])?;

    let (int_digits, frac_digits) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if int_digits.is_empty() && frac_digits.is_empty() {
        return None;
    }

    let mut value = 0f64;
    for c in int_digits.chars() {
        value = value * 16. + c.to_digit(16)? as f64;
    }
    let mut scale = 1. / 16.;
    for c in frac_digits.chars() {
        value += c.to_digit(16)? as f64 * scale;
        scale /= 16.;
    }

    let exponent_digits = exponent.strip_prefix(['+', '-']).unwrap_or(exponent);
    if exponent_digits.is_empty() || !exponent_digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let exponent: i32 = exponent.parse().ok()?;

    Some(value * 2f64.powi(exponent))
}
