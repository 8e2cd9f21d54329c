//! Translation settings.

use serde::Deserialize;

use crate::error::DriverResult;

/// What to do when a bound value fails to encode into a primitive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindFailurePolicy {
    /// Treat the value as absent: omitted from arrays and dictionaries, stored as null
    /// everywhere else. Compatible with documents written by earlier releases.
    #[default]
    Absent,
    /// Fail the query with [`DriverError::Encoding`](crate::error::DriverError::Encoding).
    Propagate,
}

/// Settings shared by every query translated through a database handle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub bind_failure: BindFailurePolicy,
}

impl DriverConfig {
    /// Reads settings from a JSON object. Missing keys take their defaults.
    pub fn from_json(json: &str) -> DriverResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_bind_failure(mut self, policy: BindFailurePolicy) -> Self {
        self.bind_failure = policy;
        self
    }
}
