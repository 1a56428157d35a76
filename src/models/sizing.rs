//! Position sizing inputs and outputs.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::trade::Direction;

/// Places used for money, leverage and percentage outputs.
pub const MONEY_DECIMAL_PLACES: u32 = 2;

/// Upper bound for the configurable size precision.
pub const MAX_DECIMAL_PLACES: u32 = 8;

/// Inputs to the fee-inclusive sizing equation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizingRequest {
    pub entry_price: f64,
    pub stop_loss: f64,
    /// Amount to lose at the stop, fees included
    pub risk_amount: f64,
    pub available_capital: f64,
    /// Entry fee as a fraction of notional
    pub entry_fee_rate: f64,
    /// Exit fee as a fraction of notional at the stop
    pub exit_fee_rate: f64,
}

impl SizingRequest {
    pub fn new(
        entry_price: f64,
        stop_loss: f64,
        risk_amount: f64,
        available_capital: f64,
        entry_fee_rate: f64,
        exit_fee_rate: f64,
    ) -> Self {
        Self {
            entry_price,
            stop_loss,
            risk_amount,
            available_capital,
            entry_fee_rate,
            exit_fee_rate,
        }
    }

    /// Same request against a different capital base.
    pub fn with_capital(mut self, available_capital: f64) -> Self {
        self.available_capital = available_capital;
        self
    }

    /// Same request with a different risk budget.
    pub fn with_risk(mut self, risk_amount: f64) -> Self {
        self.risk_amount = risk_amount;
        self
    }
}

/// Output of the position sizer. Sizes and leverage are unsigned magnitudes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizingResult {
    pub direction: Direction,
    /// Naive size ignoring fees (reference only)
    pub size_before_fees: f64,
    /// Size whose loss at the stop, fees included, equals the risk budget
    pub size_after_fees: f64,
    pub total_fees: f64,
    /// Always the requested risk amount
    pub max_risk: f64,
    pub leverage: f64,
    pub liquidation_price: f64,
    /// Liquidation would trigger before the stop
    pub is_liquidation_risky: bool,
    pub risk_percentage_of_capital: f64,
}

impl SizingResult {
    /// Size with the short-side sign applied.
    pub fn signed_size(&self) -> f64 {
        self.size_after_fees * self.direction.display_sign()
    }

    /// Leverage with the short-side sign applied.
    pub fn signed_leverage(&self) -> f64 {
        self.leverage * self.direction.display_sign()
    }

    /// Rounded values for presentation.
    ///
    /// Sizes use `size_decimal_places` (clamped to 0..=8); everything else is
    /// shown with two places.
    pub fn display(&self, size_decimal_places: u32) -> SizingDisplay {
        let dp = size_decimal_places.min(MAX_DECIMAL_PLACES);

        SizingDisplay {
            direction: self.direction,
            size_before_fees: round_for_display(self.size_before_fees, dp),
            size_after_fees: round_for_display(self.signed_size(), dp),
            total_fees: round_for_display(self.total_fees, MONEY_DECIMAL_PLACES),
            max_risk: round_for_display(self.max_risk, MONEY_DECIMAL_PLACES),
            leverage: round_for_display(self.signed_leverage(), MONEY_DECIMAL_PLACES),
            liquidation_price: round_for_display(self.liquidation_price, MONEY_DECIMAL_PLACES),
            risk_percentage: round_for_display(
                self.risk_percentage_of_capital,
                MONEY_DECIMAL_PLACES,
            ),
            is_liquidation_risky: self.is_liquidation_risky,
        }
    }
}

/// Round a computed value the way the calculator displays it.
///
/// Midpoints round away from zero and the result is padded to exactly
/// `decimal_places`. Values that do not fit a `Decimal` display as zero.
pub fn round_for_display(value: f64, decimal_places: u32) -> Decimal {
    let mut rounded = Decimal::try_from(value)
        .unwrap_or(Decimal::ZERO)
        .round_dp_with_strategy(decimal_places, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(decimal_places);
    rounded
}

/// Sizing result rounded for presentation, with short-side signs applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizingDisplay {
    pub direction: Direction,
    pub size_before_fees: Decimal,
    pub size_after_fees: Decimal,
    pub total_fees: Decimal,
    pub max_risk: Decimal,
    pub leverage: Decimal,
    pub liquidation_price: Decimal,
    pub risk_percentage: Decimal,
    pub is_liquidation_risky: bool,
}

impl fmt::Display for SizingDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Direction:        {}", self.direction.as_str().to_uppercase())?;
        writeln!(f, "Size Post-Fees:   {}", self.size_after_fees)?;
        writeln!(f, "Size Pre-Fees:    {}", self.size_before_fees)?;
        writeln!(f, "Leverage:         {}x", self.leverage)?;
        writeln!(f, "Total Fees:       {}", self.total_fees)?;
        writeln!(f, "Max Risk:         {}", self.max_risk)?;
        writeln!(f, "Liquidation:      {}", self.liquidation_price)?;
        write!(f, "Risk Percentage:  {}%", self.risk_percentage)?;
        if self.is_liquidation_risky {
            write!(f, "\nWarning: Liquidation price will be reached before stop loss!")?;
        }
        Ok(())
    }
}
