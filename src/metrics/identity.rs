//! Metric names and values as published by the broker

use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityParseError {
    #[error("missing ':' between group and properties in {0:?}")]
    MissingGroup(String),

    #[error("missing 'type' property in {0:?}")]
    MissingType(String),

    #[error("missing 'name' property in {0:?}")]
    MissingName(String),
}

/// Structured name of a published metric: `group:type=Type,name=Name`
///
/// Equality is structural and case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricIdentity {
    group: String,
    kind: String,
    name: String,
}

impl MetricIdentity {
    pub fn new(group: impl Into<String>, kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// The `type` property
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parse the `group:type=Type,name=Name` form
    ///
    /// Properties may appear in any order; properties other than `type`
    /// and `name` are ignored.
    pub fn parse(input: &str) -> Result<Self, IdentityParseError> {
        let (group, properties) = input
            .split_once(':')
            .ok_or_else(|| IdentityParseError::MissingGroup(input.to_string()))?;

        let mut kind = None;
        let mut name = None;
        for property in properties.split(',') {
            match property.split_once('=') {
                Some(("type", value)) => kind = Some(value),
                Some(("name", value)) => name = Some(value),
                _ => {}
            }
        }

        let kind = kind.ok_or_else(|| IdentityParseError::MissingType(input.to_string()))?;
        let name = name.ok_or_else(|| IdentityParseError::MissingName(input.to_string()))?;
        Ok(Self::new(group, kind, name))
    }
}

impl fmt::Display for MetricIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:type={},name={}", self.group, self.kind, self.name)
    }
}

/// Current value read from a metric provider
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl MetricValue {
    /// Interpret a raw snapshot token, preferring integers over floats over text
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(v) = raw.parse::<i64>() {
            MetricValue::Integer(v)
        } else if let Ok(v) = raw.parse::<f64>() {
            MetricValue::Float(v)
        } else {
            MetricValue::Text(raw.to_string())
        }
    }

    /// Numeric view of the value, if it has one
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetricValue::Integer(v) => Some(*v),
            MetricValue::Float(v) if v.is_finite() => Some(*v as i64),
            MetricValue::Float(_) => None,
            MetricValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Integer(v) => write!(f, "{}", v),
            MetricValue::Float(v) => write!(f, "{}", v),
            MetricValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::Integer(v)
    }
}

impl From<i32> for MetricValue {
    fn from(v: i32) -> Self {
        MetricValue::Integer(i64::from(v))
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::Text(v)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::Text(v.to_string())
    }
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
