//! Canonical priority representation.
//!
//! Internally a task's declared priority is stored as an integer 1..=10
//! (dense, sortable, composes with `priority_score`). The named enum is a
//! boundary-only view used by HTTP/JSON and MCP. Conversion is fixed-bucket
//! in both directions so it round-trips predictably rather than per
//! call-site guessing.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Bucket boundary -> enum.
    pub fn from_int(value: i32) -> Self {
        match value {
            i32::MIN..=2 => Priority::Low,
            3..=5 => Priority::Medium,
            6..=8 => Priority::High,
            _ => Priority::Critical,
        }
    }

    /// Enum -> representative integer (bucket midpoint).
    pub fn to_int(self) -> i32 {
        match self {
            Priority::Low => 2,
            Priority::Medium => 4,
            Priority::High => 7,
            Priority::Critical => 10,
        }
    }

    /// Manual-priority factor weight per the glossary: critical=1.0 ... low=0.25.
    pub fn manual_factor(self) -> f64 {
        match self {
            Priority::Critical => 1.0,
            Priority::High => 0.75,
            Priority::Medium => 0.5,
            Priority::Low => 0.25,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_buckets() {
        for (int, expected) in [
            (1, Priority::Low),
            (2, Priority::Low),
            (3, Priority::Medium),
            (5, Priority::Medium),
            (6, Priority::High),
            (8, Priority::High),
            (9, Priority::Critical),
            (10, Priority::Critical),
        ] {
            assert_eq!(Priority::from_int(int), expected);
        }
    }

    #[test]
    fn manual_factor_matches_glossary_defaults() {
        assert_eq!(Priority::Critical.manual_factor(), 1.0);
        assert_eq!(Priority::High.manual_factor(), 0.75);
        assert_eq!(Priority::Medium.manual_factor(), 0.5);
        assert_eq!(Priority::Low.manual_factor(), 0.25);
    }
}
