//! Trade model representing an open leveraged position and its journal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::sizing::{SizingRequest, SizingResult};

/// Direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Infer direction from where the stop sits relative to entry.
    ///
    /// Entry above stop is a long, entry below stop is a short. Equal prices
    /// have no direction.
    pub fn from_prices(entry_price: f64, stop_loss: f64) -> Option<Self> {
        if entry_price > stop_loss {
            Some(Direction::Long)
        } else if entry_price < stop_loss {
            Some(Direction::Short)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "long" | "buy" => Some(Direction::Long),
            "short" | "sell" => Some(Direction::Short),
            _ => None,
        }
    }

    /// Sign applied to magnitudes for display (shorts show negative).
    pub fn display_sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    /// Exchange order side.
    pub fn order_side(&self) -> &'static str {
        match self {
            Direction::Long => "Buy",
            Direction::Short => "Sell",
        }
    }
}

/// Open trade record, created from a sizing result plus caller identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    /// Identifier assigned by the execution layer
    pub trade_id: String,

    /// Instrument symbol (e.g. "BTCUSDT")
    pub symbol: String,

    pub direction: Direction,

    pub entry_price: f64,

    pub stop_loss: f64,

    #[serde(default)]
    pub take_profit_price: Option<f64>,

    /// Position size as an unsigned magnitude
    pub position_size: f64,

    /// Amount lost at the stop, fees included
    pub risk_amount: f64,

    /// Risk amount as a percentage of capital at open time
    pub risk_percentage: f64,

    /// Leverage as an unsigned magnitude
    pub leverage: f64,

    /// Entry fee applied, in percent as entered (e.g. 0.055)
    pub fee: f64,

    // === Journal ===
    #[serde(default)]
    pub system_name: String,

    #[serde(default)]
    pub entry_pic_url: String,

    #[serde(default)]
    pub entry_notes: String,

    #[serde(default)]
    pub mid_trade_notes: String,

    #[serde(default)]
    pub exit_notes: String,

    #[serde(default)]
    pub exit_pic_url: String,

    /// Exchange order id, when the trade went through the execution layer
    #[serde(default)]
    pub order_id: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl Trade {
    /// Build an open trade from the sizing that produced it.
    ///
    /// The recorded fee is the entry rate the request was sized with.
    pub fn open(
        trade_id: String,
        symbol: String,
        request: &SizingRequest,
        result: &SizingResult,
    ) -> Self {
        Self {
            trade_id,
            symbol,
            direction: result.direction,
            entry_price: request.entry_price,
            stop_loss: request.stop_loss,
            take_profit_price: None,
            position_size: result.size_after_fees,
            risk_amount: result.max_risk,
            risk_percentage: result.risk_percentage_of_capital,
            leverage: result.leverage,
            fee: request.entry_fee_rate * 100.0,
            system_name: String::new(),
            entry_pic_url: String::new(),
            entry_notes: String::new(),
            mid_trade_notes: String::new(),
            exit_notes: String::new(),
            exit_pic_url: String::new(),
            order_id: None,
            timestamp: Utc::now(),
        }
    }

    /// The entry-to-stop price interval as `(low, high)`.
    pub fn stop_range(&self) -> (f64, f64) {
        (
            self.entry_price.min(self.stop_loss),
            self.entry_price.max(self.stop_loss),
        )
    }

    /// Position size with the short-side sign applied.
    pub fn signed_position_size(&self) -> f64 {
        self.position_size.abs() * self.direction.display_sign()
    }

    /// P&L (before exit fees) if the position were closed at `exit_price`.
    pub fn pnl_at(&self, exit_price: f64) -> f64 {
        let price_diff = exit_price - self.entry_price;
        match self.direction {
            Direction::Long => self.position_size.abs() * price_diff,
            Direction::Short => self.position_size.abs() * -price_diff,
        }
    }
}
