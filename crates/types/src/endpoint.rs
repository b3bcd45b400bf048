use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A fully-qualified request URL produced by resolution.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Endpoint(String);

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Endpoint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Endpoint {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Endpoint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A named target as written by the operator: either a literal URL or a
/// service-discovery name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub name: String,
    pub locator: String,
}

impl TargetSpec {
    pub fn new(name: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locator: locator.into(),
        }
    }
}

/// Parses `name:locator`, splitting on the first colon so URLs keep theirs.
impl FromStr for TargetSpec {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (name, locator) = raw
            .split_once(':')
            .ok_or_else(|| ValidationError::InvalidTarget(raw.to_string()))?;
        let name = name.trim();
        let locator = locator.trim();
        if name.is_empty() || locator.is_empty() {
            return Err(ValidationError::InvalidTarget(raw.to_string()));
        }
        Ok(Self::new(name, locator))
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.locator)
    }
}
