//! Parameter descriptors
//!
//! A descriptor declares how one job parameter renders into command-line
//! syntax. Rendering itself lives in [`crate::command`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Command-line syntax of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CmdFormat {
    /// Excluded from the command line
    None,
    /// `--name=value`
    Valuated,
    /// `-name value`
    Simple,
    /// `-name` when the value is truthy
    Option,
    /// `--name` when the value is truthy
    NamedOption,
    /// Bare `value`
    Posix,
    /// `name=value`
    NamedParam,
}

/// Declared type of a job input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    #[default]
    Text,
    Int,
    Decimal,
    Boolean,
    /// Value is a file name relative to the job working directory
    File,
    List,
}

/// A resolved parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Decimal(f64),
    Text(String),
}

impl ParamValue {
    /// Truthiness used by flag-style formats: `false`, `0`, `0.0` and the
    /// empty string are falsy
    pub fn is_truthy(&self) -> bool {
        match self {
            ParamValue::Bool(b) => *b,
            ParamValue::Int(i) => *i != 0,
            ParamValue::Decimal(d) => *d != 0.0,
            ParamValue::Text(s) => !s.is_empty(),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Decimal(d) => write!(f, "{}", d),
            ParamValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(i64::from(value))
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Decimal(value)
    }
}

/// Declaration of one command-line parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDescriptor {
    pub name: String,
    pub cmd_format: CmdFormat,
    #[serde(default)]
    pub value: Option<ParamValue>,
    #[serde(default)]
    pub default: Option<ParamValue>,
}

impl ParamDescriptor {
    pub fn new(name: impl Into<String>, cmd_format: CmdFormat) -> Self {
        Self {
            name: name.into(),
            cmd_format,
            value: None,
            default: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<ParamValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_default(mut self, default: impl Into<ParamValue>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// The submitted value, or the declared default when nothing was submitted
    pub fn resolved_value(&self) -> Option<&ParamValue> {
        self.value.as_ref().or(self.default.as_ref())
    }
}
