#![forbid(unsafe_code)]

use std::{borrow::Cow, collections::BTreeMap};

use serde::{Deserialize, Serialize};

/// A single cell value. Rows coming from sheets, CSV files or JSON payloads
/// only ever carry these primitive shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(f64),
    Utf8(String),
}

impl Scalar {
    #[must_use]
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Float64(v) => v.is_nan(),
            _ => false,
        }
    }

    /// Textual form used by every string comparison. Missing values render
    /// as the empty string.
    #[must_use]
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            Self::Null => Cow::Borrowed(""),
            Self::Bool(v) => Cow::Borrowed(if *v { "true" } else { "false" }),
            Self::Int64(v) => Cow::Owned(v.to_string()),
            Self::Float64(v) => Cow::Owned(format_float(*v)),
            Self::Utf8(v) => Cow::Borrowed(v.as_str()),
        }
    }

    /// Numeric view of the value. Strings go through [`parse_number`];
    /// missing values are NaN.
    #[must_use]
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Null => f64::NAN,
            Self::Bool(v) => {
                if *v {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Int64(v) => *v as f64,
            Self::Float64(v) => *v,
            Self::Utf8(v) => parse_number(v),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Utf8(value.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Utf8(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float64(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

fn format_float(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "Infinity".to_owned()
        } else {
            "-Infinity".to_owned()
        }
    } else if value == 0.0 {
        // -0.0 prints as "0"
        "0".to_owned()
    } else {
        value.to_string()
    }
}

/// Permissive string-to-number conversion.
///
/// Never fails: text that is not a number yields NaN, so any ordering
/// comparison against it is false. Blank text is zero. Besides plain
/// decimal literals (`12`, `-3.5`, `.5`, `1e3`) the radix prefixes `0x`,
/// `0o` and `0b` are accepted.
#[must_use]
pub fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    if let Some(value) = parse_radix_literal(trimmed) {
        return value;
    }

    if is_decimal_literal(trimmed) {
        trimmed.parse::<f64>().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

fn parse_radix_literal(text: &str) -> Option<f64> {
    let radix = match text.get(..2)? {
        "0x" | "0X" => 16,
        "0o" | "0O" => 8,
        "0b" | "0B" => 2,
        _ => return None,
    };
    let digits = &text[2..];
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return Some(f64::NAN);
    }
    Some(u64::from_str_radix(digits, radix).map_or(f64::NAN, |v| v as f64))
}

fn is_decimal_literal(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut pos = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        pos += 1;
    }

    let int_start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    let mut mantissa_digits = pos - int_start;

    if pos < bytes.len() && bytes[pos] == b'.' {
        pos += 1;
        let frac_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
        mantissa_digits += pos - frac_start;
    }

    if mantissa_digits == 0 {
        return false;
    }

    if pos < bytes.len() && matches!(bytes[pos], b'e' | b'E') {
        pos += 1;
        if matches!(bytes.get(pos), Some(b'+' | b'-')) {
            pos += 1;
        }
        let exp_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
        if pos == exp_start {
            return false;
        }
    }

    pos == bytes.len()
}

/// One record of tabular data.
///
/// Lookups of unknown columns return `None` rather than panicking; the
/// filter engine reads those as empty text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    fields: BTreeMap<String, Scalar>,
}

impl Row {
    #[must_use]
    pub fn new() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Scalar>) {
        self.fields.insert(column.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Scalar> {
        self.fields.get(column)
    }

    /// Textual form of a cell, empty for missing columns and null cells.
    #[must_use]
    pub fn text(&self, column: &str) -> Cow<'_, str> {
        self.get(column).map_or(Cow::Borrowed(""), Scalar::to_text)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Scalar> {
        self.fields.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<Scalar>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(column, value)| (column.into(), value.into()))
                .collect(),
        }
    }
}
