//! Engine and reporting policies

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order among adjustment details of equal amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Oldest creation timestamp is reduced first
    #[default]
    EarliestFirst,
    /// Newest creation timestamp is reduced first
    LatestFirst,
}

/// Where the amount to remove comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExcessSource {
    /// One running excess from the claim-level cap formula
    #[default]
    ClaimFields,
    /// A per-rank excess derived from the lower rank's pending caps
    RemittancePendingCaps,
}

/// Which claims end up in the statistics export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsPolicy {
    #[default]
    ViolationsOnly,
    AllClaims,
}

impl StatsPolicy {
    pub fn records(&self, in_violation: bool) -> bool {
        match self {
            StatsPolicy::ViolationsOnly => in_violation,
            StatsPolicy::AllClaims => true,
        }
    }
}

/// Configuration of the reconciliation engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EnginePolicy {
    pub tie_break: TieBreak,
    pub excess_source: ExcessSource,
}

impl EnginePolicy {
    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn with_excess_source(mut self, excess_source: ExcessSource) -> Self {
        self.excess_source = excess_source;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPolicyValue(pub String);

impl fmt::Display for UnknownPolicyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown policy value '{}'", self.0)
    }
}

impl std::error::Error for UnknownPolicyValue {}

impl FromStr for TieBreak {
    type Err = UnknownPolicyValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "earliest" | "earliest_first" => Ok(TieBreak::EarliestFirst),
            "latest" | "latest_first" => Ok(TieBreak::LatestFirst),
            other => Err(UnknownPolicyValue(other.to_string())),
        }
    }
}

impl FromStr for ExcessSource {
    type Err = UnknownPolicyValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "claim" | "claim_fields" => Ok(ExcessSource::ClaimFields),
            "remittance" | "remittance_pending_caps" => Ok(ExcessSource::RemittancePendingCaps),
            other => Err(UnknownPolicyValue(other.to_string())),
        }
    }
}

impl FromStr for StatsPolicy {
    type Err = UnknownPolicyValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "violations" | "violations_only" => Ok(StatsPolicy::ViolationsOnly),
            "all" | "all_claims" => Ok(StatsPolicy::AllClaims),
            other => Err(UnknownPolicyValue(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = EnginePolicy::default();
        assert_eq!(policy.tie_break, TieBreak::EarliestFirst);
        assert_eq!(policy.excess_source, ExcessSource::ClaimFields);
        assert_eq!(StatsPolicy::default(), StatsPolicy::ViolationsOnly);
    }

    #[test]
    fn test_parse_cli_values() {
        assert_eq!("latest".parse::<TieBreak>().unwrap(), TieBreak::LatestFirst);
        assert_eq!("Remittance".parse::<ExcessSource>().unwrap(), ExcessSource::RemittancePendingCaps);
        assert_eq!("all".parse::<StatsPolicy>().unwrap(), StatsPolicy::AllClaims);
        assert!("sideways".parse::<TieBreak>().is_err());
    }

    #[test]
    fn test_stats_policy_records() {
        assert!(!StatsPolicy::ViolationsOnly.records(false));
        assert!(StatsPolicy::ViolationsOnly.records(true));
        assert!(StatsPolicy::AllClaims.records(false));
    }
}
