//! Value analyses: string conversion and equivalence per observable type.
//!
//! An [`Analysis`] turns stored and queried strings into [`Value`]s and decides
//! whether two values denote the same thing. Equivalence is three-valued:
//! `None` means the comparison carries no information (an empty value on
//! either side), which the matcher turns into unknown evidence.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use super::{Style, ValueType};

/// A parsed observable value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// String conversion and equivalence for one kind of observable.
pub trait Analysis: Send + Sync + fmt::Debug {
    /// Parse a raw string. Returns `None` for empty or unparseable input.
    fn parse(&self, raw: &str) -> Option<Value>;

    /// Render a value back to its canonical string form.
    fn format(&self, value: &Value) -> String {
        value.to_string()
    }

    /// Three-valued equivalence: `Some(true)` same, `Some(false)` different,
    /// `None` when either side carries no information.
    fn equivalent(&self, a: &Value, b: &Value) -> Option<bool>;
}

/// Choose the analysis for a declared type and comparison style.
pub fn analysis_for(value_type: ValueType, style: Style) -> Arc<dyn Analysis> {
    match (value_type, style) {
        (ValueType::Integer, _) => Arc::new(IntegerAnalysis),
        (ValueType::Boolean, _) => Arc::new(BooleanAnalysis),
        (ValueType::Text, Style::Identifier) => Arc::new(ExactAnalysis),
        (ValueType::Text, Style::Normalized) => Arc::new(NormalizedAnalysis),
    }
}

/// Fold a string for fuzzy comparison and indexing.
///
/// Applies NFKD decomposition, drops combining marks, lowercases and collapses
/// runs of whitespace and punctuation-free separators to a single space.
pub fn fold(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for c in raw.nfkd().filter(|c| !is_combining_mark(*c)) {
        if c.is_whitespace() || c == '_' {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// Exact string identity (identifiers, codes).
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactAnalysis;

impl Analysis for ExactAnalysis {
    fn parse(&self, raw: &str) -> Option<Value> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Value::Text(trimmed.to_string()))
    }

    fn equivalent(&self, a: &Value, b: &Value) -> Option<bool> {
        match (a, b) {
            (Value::Text(a), Value::Text(b)) if a.is_empty() || b.is_empty() => None,
            _ => Some(a == b),
        }
    }
}

/// Case-, diacritic- and whitespace-insensitive text.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedAnalysis;

impl Analysis for NormalizedAnalysis {
    fn parse(&self, raw: &str) -> Option<Value> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Value::Text(trimmed.to_string()))
    }

    fn equivalent(&self, a: &Value, b: &Value) -> Option<bool> {
        let (a, b) = (fold(&a.to_string()), fold(&b.to_string()));
        if a.is_empty() || b.is_empty() {
            return None;
        }
        Some(a == b)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerAnalysis;

impl Analysis for IntegerAnalysis {
    fn parse(&self, raw: &str) -> Option<Value> {
        raw.trim().parse().ok().map(Value::Integer)
    }

    fn equivalent(&self, a: &Value, b: &Value) -> Option<bool> {
        match (a, b) {
            (Value::Integer(a), Value::Integer(b)) => Some(a == b),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanAnalysis;

impl Analysis for BooleanAnalysis {
    fn parse(&self, raw: &str) -> Option<Value> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "1" => Some(Value::Boolean(true)),
            "false" | "f" | "no" | "n" | "0" => Some(Value::Boolean(false)),
            _ => None,
        }
    }

    fn equivalent(&self, a: &Value, b: &Value) -> Option<bool> {
        match (a, b) {
            (Value::Boolean(a), Value::Boolean(b)) => Some(a == b),
            _ => None,
        }
    }
}
