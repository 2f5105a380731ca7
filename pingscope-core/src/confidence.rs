use serde::Serialize;

pub const HIGH_MIN_PCT: f64 = 80.0;
pub const MEDIUM_MIN_PCT: f64 = 60.0;
pub const LOW_MIN_PCT: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ConfidenceTier {
    VeryLow,
    Low,
    Medium,
    High,
}

/// Shared by the textual badge and the overlay stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorToken {
    Green,
    Yellow,
    Orange,
    Red,
}

impl ColorToken {
    pub fn as_str(self) -> &'static str {
        match self {
            ColorToken::Green => "green",
            ColorToken::Yellow => "yellow",
            ColorToken::Orange => "orange",
            ColorToken::Red => "red",
        }
    }
}

impl ConfidenceTier {
    /// Total over f64 and does not range-check; NaN lands in `VeryLow`.
    pub fn classify(pct: f64) -> Self {
        if pct >= HIGH_MIN_PCT {
            ConfidenceTier::High
        } else if pct >= MEDIUM_MIN_PCT {
            ConfidenceTier::Medium
        } else if pct >= LOW_MIN_PCT {
            ConfidenceTier::Low
        } else {
            ConfidenceTier::VeryLow
        }
    }

    pub fn color(self) -> ColorToken {
        match self {
            ConfidenceTier::High => ColorToken::Green,
            ConfidenceTier::Medium => ColorToken::Yellow,
            ConfidenceTier::Low => ColorToken::Orange,
            ConfidenceTier::VeryLow => ColorToken::Red,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceBadge {
    pub text: String,
    pub tier: ConfidenceTier,
    pub color: ColorToken,
}

impl ConfidenceBadge {
    pub fn new(pct: f64) -> Self {
        let tier = ConfidenceTier::classify(pct);
        Self {
            text: format!("{pct}%"),
            tier,
            color: tier.color(),
        }
    }
}
