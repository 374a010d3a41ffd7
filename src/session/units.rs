//! Unit-system preference, sent to Fitbit as `Accept-Language`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum UnitSystem {
    /// No `Accept-Language` header
    #[default]
    Metric,
    /// `en_US`
    UnitedStates,
    /// `en_GB`
    UnitedKingdom,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown unit system '{0}' (expected \"\", \"en_US\" or \"en_GB\")")]
pub struct UnitSystemError(pub String);

impl UnitSystem {
    pub const ALL: [UnitSystem; 3] = [
        UnitSystem::Metric,
        UnitSystem::UnitedStates,
        UnitSystem::UnitedKingdom,
    ];

    /// Header value, or `None` for metric.
    pub fn accept_language(self) -> Option<&'static str> {
        match self {
            UnitSystem::Metric => None,
            UnitSystem::UnitedStates => Some("en_US"),
            UnitSystem::UnitedKingdom => Some("en_GB"),
        }
    }

    /// The setting value accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        self.accept_language().unwrap_or("")
    }

    pub fn label(self) -> &'static str {
        match self {
            UnitSystem::Metric => "Metric",
            UnitSystem::UnitedStates => "US",
            UnitSystem::UnitedKingdom => "UK",
        }
    }
}

impl FromStr for UnitSystem {
    type Err = UnitSystemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "metric" => Ok(UnitSystem::Metric),
            "en_US" => Ok(UnitSystem::UnitedStates),
            "en_GB" => Ok(UnitSystem::UnitedKingdom),
            other => Err(UnitSystemError(other.to_string())),
        }
    }
}

impl TryFrom<String> for UnitSystem {
    type Error = UnitSystemError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<UnitSystem> for String {
    fn from(value: UnitSystem) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
