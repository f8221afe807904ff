use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeClass {
    Small,
    Medium,
    Large,
}

impl SizeClass {
    pub fn ordinal(self) -> u8 {
        match self {
            Self::Small => 0,
            Self::Medium => 1,
            Self::Large => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }

    pub const ALL: [SizeClass; 3] = [Self::Small, Self::Medium, Self::Large];
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unsupported size class `{0}` (expected small|medium|large)")]
pub struct ParseSizeClassError(pub String);

impl std::str::FromStr for SizeClass {
    type Err = ParseSizeClassError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "small" => Ok(Self::Small),
            "medium" => Ok(Self::Medium),
            "large" => Ok(Self::Large),
            other => Err(ParseSizeClassError(other.to_string())),
        }
    }
}

/// Presentation order is fixed: budget, standard, rush.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierKind {
    Budget,
    Standard,
    Rush,
}

impl TierKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Budget => "budget",
            Self::Standard => "standard",
            Self::Rush => "rush",
        }
    }

    pub const ALL: [TierKind; 3] = [Self::Budget, Self::Standard, Self::Rush];
}

/// Closed price interval in USD, inclusive at both ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBand {
    pub min: Decimal,
    pub max: Decimal,
}

/// Closed turnaround interval in whole days, inclusive at both ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationBand {
    pub min_days: u32,
    pub max_days: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierBand {
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub min_days: u32,
    pub max_days: u32,
}

impl TierBand {
    pub fn price(&self) -> PriceBand {
        PriceBand { min: self.min_price, max: self.max_price }
    }

    pub fn duration(&self) -> DurationBand {
        DurationBand { min_days: self.min_days, max_days: self.max_days }
    }
}

/// One parsed rule-table row: a (issue, material, size) key with its three
/// priced tiers, exactly as the source dataset states them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairRuleRecord {
    pub issue: String,
    pub material: String,
    pub size: SizeClass,
    pub budget: TierBand,
    pub standard: TierBand,
    pub rush: TierBand,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierQuote {
    pub kind: TierKind,
    pub price: PriceBand,
    pub duration: DurationBand,
}

/// Which fallback step produced the estimate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RuleResolution {
    Exact,
    NearestSize { requested: SizeClass, matched: SizeClass },
    AnyMaterial { matched: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairEstimate {
    pub issue: String,
    pub material: Option<String>,
    pub size: SizeClass,
    pub resolution: RuleResolution,
    /// Always budget, standard, rush in that order.
    pub tiers: [TierQuote; 3],
    /// Source-data violations surfaced verbatim, never corrected.
    pub anomalies: Vec<String>,
}
