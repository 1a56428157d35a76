//! Liquidation price estimates for leveraged positions.
//!
//! The estimate ignores maintenance margin: a long is liquidated when the
//! price has fallen by `1 / leverage` of entry, a short when it has risen by
//! the same fraction.

use serde::{Deserialize, Serialize};

use super::error::{CalcResult, InputError};
use super::guard::require_finite;
use crate::models::Direction;

/// Liquidation price for a position opened at `entry_price`.
///
/// `leverage` is taken as a magnitude, so signed display leverage can be
/// passed straight through. Long liquidation prices are floored at zero.
pub fn estimate_liquidation(entry_price: f64, leverage: f64, direction: Direction) -> CalcResult<f64> {
    let entry = require_finite("entry price", entry_price)?;
    let leverage = require_finite("leverage", leverage)?.abs();
    if leverage == 0.0 {
        return Err(InputError::degenerate("leverage is zero"));
    }

    let margin_fraction = 1.0 / leverage;
    let price = match direction {
        Direction::Long => (entry * (1.0 - margin_fraction)).max(0.0),
        Direction::Short => entry * (1.0 + margin_fraction),
    };

    Ok(price)
}

/// True when the liquidation price is reached before the stop.
pub fn is_liquidation_risky(liquidation_price: f64, stop_loss: f64, direction: Direction) -> bool {
    match direction {
        Direction::Long => liquidation_price > stop_loss,
        Direction::Short => liquidation_price < stop_loss,
    }
}

/// Liquidation price together with its ordering against a stop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiquidationEstimate {
    pub price: f64,
    pub is_risky: bool,
}

impl LiquidationEstimate {
    pub fn for_stop(
        entry_price: f64,
        leverage: f64,
        stop_loss: f64,
        direction: Direction,
    ) -> CalcResult<Self> {
        let price = estimate_liquidation(entry_price, leverage, direction)?;
        Ok(Self {
            price,
            is_risky: is_liquidation_risky(price, stop_loss, direction),
        })
    }
}
