use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

/// Policy turning a ratio of compliant children into a compliance verdict.
///
/// Applied uniformly at every aggregate level: a repository is judged by its
/// pipelines, a project by its repositories, an organization by its projects.
/// An entity without children is never compliant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplianceMode {
    /// At least one child is compliant.
    #[default]
    Any,
    /// At least half of the children are compliant (an exact half counts).
    Majority,
    /// Every child is compliant.
    All,
}

impl ComplianceMode {
    pub fn is_satisfied(self, compliant: usize, total: usize) -> bool {
        if total == 0 {
            return false;
        }

        match self {
            Self::Any => compliant > 0,
            Self::Majority => compliant.saturating_mul(2) >= total,
            Self::All => compliant == total,
        }
    }
}

impl FromStr for ComplianceMode {
    type Err = TrackerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "any" => Ok(Self::Any),
            "majority" => Ok(Self::Majority),
            "all" => Ok(Self::All),
            _ => Err(TrackerError::InvalidComplianceMode(value.to_string())),
        }
    }
}

impl fmt::Display for ComplianceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Any => "ANY",
            Self::Majority => "MAJORITY",
            Self::All => "ALL",
        };
        f.write_str(name)
    }
}
