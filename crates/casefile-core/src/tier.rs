//! Analysis tier classification.

use serde::{Deserialize, Serialize};

/// Which analysis pass a document receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum AnalysisTier {
    /// Free rule-based pass (dictionary + regex).
    Rules,
    /// Paid LLM structured extraction.
    Ai,
}

impl AnalysisTier {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Rules => 0,
            Self::Ai => 1,
        }
    }

    pub fn is_paid(self) -> bool {
        matches!(self, Self::Ai)
    }
}

impl From<AnalysisTier> for u8 {
    fn from(tier: AnalysisTier) -> u8 {
        tier.as_u8()
    }
}

impl TryFrom<u8> for AnalysisTier {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Rules),
            1 => Ok(Self::Ai),
            other => Err(format!("unknown analysis tier: {}", other)),
        }
    }
}

impl std::str::FromStr for AnalysisTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "0" | "rules" => Ok(Self::Rules),
            "1" | "ai" => Ok(Self::Ai),
            other => Err(format!("unknown analysis tier: {} (expected 0 or 1)", other)),
        }
    }
}

impl std::fmt::Display for AnalysisTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tier{}", self.as_u8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tier() {
        assert_eq!("0".parse::<AnalysisTier>().unwrap(), AnalysisTier::Rules);
        assert_eq!("1".parse::<AnalysisTier>().unwrap(), AnalysisTier::Ai);
        assert!("2".parse::<AnalysisTier>().is_err());
    }

    #[test]
    fn test_tier_serializes_as_number() {
        let json = serde_json::to_string(&AnalysisTier::Ai).unwrap();
        assert_eq!(json, "1");
        let back: AnalysisTier = serde_json::from_str("0").unwrap();
        assert_eq!(back, AnalysisTier::Rules);
    }
}
