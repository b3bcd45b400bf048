use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Header carrying the endpoint URL a request was generated for.
pub const HEADER_ENDPOINT: &str = "X-Barrage-Endpoint";
/// Header carrying the layer (target) name.
pub const HEADER_TARGET: &str = "X-Barrage-Target";
/// Header carrying the load test name.
pub const HEADER_TEST: &str = "X-Barrage-Test";

/// Names of the headers stamped on every generated request so that a
/// serviced backend or proxy can attribute synthetic traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderNames {
    pub endpoint: String,
    pub target: String,
    pub test: String,
}

impl Default for HeaderNames {
    fn default() -> Self {
        Self {
            endpoint: HEADER_ENDPOINT.to_string(),
            target: HEADER_TARGET.to_string(),
            test: HEADER_TEST.to_string(),
        }
    }
}

/// A per-series label derived from a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelKind {
    Target,
    Endpoint,
    Code,
}

impl LabelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelKind::Target => "target",
            LabelKind::Endpoint => "endpoint",
            LabelKind::Code => "code",
        }
    }
}

impl fmt::Display for LabelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LabelKind {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "target" => Ok(LabelKind::Target),
            "endpoint" => Ok(LabelKind::Endpoint),
            "code" => Ok(LabelKind::Code),
            other => Err(ValidationError::UnknownLabel(other.to_string())),
        }
    }
}

/// Ordered, duplicate-free subset of [`LabelKind`]s attached to every series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<LabelKind>", into = "Vec<LabelKind>")]
pub struct LabelSet(Vec<LabelKind>);

impl LabelSet {
    pub fn new(kinds: impl IntoIterator<Item = LabelKind>) -> Self {
        let mut unique = Vec::new();
        for kind in kinds {
            if !unique.contains(&kind) {
                unique.push(kind);
            }
        }
        Self(unique)
    }

    pub fn parse<S: AsRef<str>>(values: &[S]) -> Result<Self, ValidationError> {
        let kinds = values
            .iter()
            .map(|value| value.as_ref().parse::<LabelKind>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(kinds))
    }

    pub fn contains(&self, kind: LabelKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = LabelKind> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self(vec![LabelKind::Target, LabelKind::Endpoint, LabelKind::Code])
    }
}

impl From<Vec<LabelKind>> for LabelSet {
    fn from(kinds: Vec<LabelKind>) -> Self {
        Self::new(kinds)
    }
}

impl From<LabelSet> for Vec<LabelKind> {
    fn from(set: LabelSet) -> Self {
        set.0
    }
}

/// Explicit configuration shared by the resolver, the attack loops and the
/// registry. Built once at startup and passed to each constructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conventions {
    pub headers: HeaderNames,
    pub labels: LabelSet,
    /// Scheme used when synthesizing endpoints from discovery records.
    pub discovery_scheme: String,
}

impl Conventions {
    pub fn with_labels(labels: LabelSet) -> Self {
        Self {
            labels,
            ..Self::default()
        }
    }
}

impl Default for Conventions {
    fn default() -> Self {
        Self {
            headers: HeaderNames::default(),
            labels: LabelSet::default(),
            discovery_scheme: "http".to_string(),
        }
    }
}
