//! Fee schedule and per-side fee selection.

use serde::{Deserialize, Serialize};

/// Which fee rate a side of the trade pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FeeType {
    /// Order removes liquidity (market order)
    #[default]
    Taker,
    /// Order provides liquidity (limit order)
    Maker,
    /// No fee leg
    None,
}

impl FeeType {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "taker" | "market" => Self::Taker,
            "maker" | "limit" => Self::Maker,
            _ => Self::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeeType::Taker => "taker",
            FeeType::Maker => "maker",
            FeeType::None => "none",
        }
    }

    /// Order type sent to the exchange for an entry paying this fee.
    pub fn order_type(&self) -> &'static str {
        match self {
            FeeType::Taker => "Market",
            FeeType::Maker | FeeType::None => "Limit",
        }
    }
}

/// Taker and maker fee rates as fractions (0.00055 = 0.055%).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub taker_rate: f64,
    pub maker_rate: f64,
}

impl FeeSchedule {
    /// Build from percentages as shown on an exchange fee page.
    pub fn from_percentages(taker_pct: f64, maker_pct: f64) -> Self {
        Self {
            taker_rate: taker_pct / 100.0,
            maker_rate: maker_pct / 100.0,
        }
    }

    /// Rate paid by a side with the given fee type.
    pub fn rate_for(&self, fee_type: FeeType) -> f64 {
        match fee_type {
            FeeType::Taker => self.taker_rate,
            FeeType::Maker => self.maker_rate,
            FeeType::None => 0.0,
        }
    }
}
