use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Result of a finished build, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildOutcome {
    Success,
    Unstable,
    Failure,
    NotBuilt,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown build result: {0} (expected SUCCESS, UNSTABLE, FAILURE, NOT_BUILT or ABORTED)")]
pub struct OutcomeParseError(pub String);

impl BuildOutcome {
    pub fn is_worse_than(&self, other: BuildOutcome) -> bool {
        *self > other
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildOutcome::Success => "SUCCESS",
            BuildOutcome::Unstable => "UNSTABLE",
            BuildOutcome::Failure => "FAILURE",
            BuildOutcome::NotBuilt => "NOT_BUILT",
            BuildOutcome::Aborted => "ABORTED",
        }
    }

    pub fn all() -> Vec<BuildOutcome> {
        vec![
            BuildOutcome::Success,
            BuildOutcome::Unstable,
            BuildOutcome::Failure,
            BuildOutcome::NotBuilt,
            BuildOutcome::Aborted,
        ]
    }
}

impl fmt::Display for BuildOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BuildOutcome {
    type Err = OutcomeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "SUCCESS" => Ok(BuildOutcome::Success),
            "UNSTABLE" => Ok(BuildOutcome::Unstable),
            "FAILURE" => Ok(BuildOutcome::Failure),
            "NOT_BUILT" => Ok(BuildOutcome::NotBuilt),
            "ABORTED" => Ok(BuildOutcome::Aborted),
            _ => Err(OutcomeParseError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_ordering() {
        assert!(BuildOutcome::Success < BuildOutcome::Unstable);
        assert!(BuildOutcome::Unstable < BuildOutcome::Failure);
        assert!(BuildOutcome::Failure < BuildOutcome::NotBuilt);
        assert!(BuildOutcome::NotBuilt < BuildOutcome::Aborted);
    }

    #[test]
    fn test_is_worse_than_unstable() {
        assert!(!BuildOutcome::Success.is_worse_than(BuildOutcome::Unstable));
        assert!(!BuildOutcome::Unstable.is_worse_than(BuildOutcome::Unstable));
        assert!(BuildOutcome::Failure.is_worse_than(BuildOutcome::Unstable));
        assert!(BuildOutcome::NotBuilt.is_worse_than(BuildOutcome::Unstable));
        assert!(BuildOutcome::Aborted.is_worse_than(BuildOutcome::Unstable));
    }

    #[test]
    fn test_parse_outcome() {
        assert_eq!("SUCCESS".parse::<BuildOutcome>(), Ok(BuildOutcome::Success));
        assert_eq!("unstable".parse::<BuildOutcome>(), Ok(BuildOutcome::Unstable));
        assert_eq!("not-built".parse::<BuildOutcome>(), Ok(BuildOutcome::NotBuilt));
        assert!("PASSED".parse::<BuildOutcome>().is_err());
    }

    #[test]
    fn test_outcome_display() {
        for outcome in BuildOutcome::all() {
            assert_eq!(outcome.to_string().parse::<BuildOutcome>(), Ok(outcome));
        }
        assert_eq!(format!("{}", BuildOutcome::NotBuilt), "NOT_BUILT");
    }
}
