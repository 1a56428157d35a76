//! Calculator settings.

use anyhow::{bail, Context, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::guard::SizingForm;
use crate::models::{FeeSchedule, FeeType, MAX_DECIMAL_PLACES};

/// Persisted calculator defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculatorSettings {
    /// Taker fee in percent
    pub taker_fee: Decimal,

    /// Maker fee in percent
    pub maker_fee: Decimal,

    /// Default risk per trade, in account currency
    pub risk_amount: Decimal,

    /// Default available capital, in account currency
    pub available_capital: Decimal,

    /// Decimal places shown for position sizes
    pub decimal_places: u32,

    pub entry_fee: FeeType,

    pub exit_fee: FeeType,

    /// Send orders to the exchange testnet without an API key
    pub test_mode: bool,
}

impl Default for CalculatorSettings {
    fn default() -> Self {
        Self {
            taker_fee: dec!(0.055),          // 0.055% taker
            maker_fee: dec!(0.02),           // 0.02% maker
            risk_amount: dec!(20),
            available_capital: dec!(1000),
            decimal_places: 4,
            entry_fee: FeeType::Taker,
            exit_fee: FeeType::Taker,
            test_mode: false,
        }
    }
}

impl CalculatorSettings {
    /// Size precision clamped to what the display supports.
    pub fn size_decimal_places(&self) -> u32 {
        self.decimal_places.min(MAX_DECIMAL_PLACES)
    }

    pub fn fee_schedule(&self) -> FeeSchedule {
        FeeSchedule::from_percentages(
            self.taker_fee.to_f64().unwrap_or(0.0),
            self.maker_fee.to_f64().unwrap_or(0.0),
        )
    }

    pub fn capital(&self) -> f64 {
        self.available_capital.to_f64().unwrap_or(0.0)
    }

    /// Fee percent paid on entry. Compounding projections use it as the
    /// per-trade drag.
    pub fn entry_fee_percent(&self) -> f64 {
        self.fee_schedule().rate_for(self.entry_fee) * 100.0
    }

    /// A sizing form prefilled from these settings.
    pub fn sizing_form(&self, entry_price: &str, stop_loss: &str) -> SizingForm {
        SizingForm {
            entry_price: entry_price.to_string(),
            stop_loss: stop_loss.to_string(),
            risk_amount: self.risk_amount.to_string(),
            available_capital: self.available_capital.to_string(),
            taker_fee_pct: self.taker_fee.to_string(),
            maker_fee_pct: self.maker_fee.to_string(),
            entry_fee: self.entry_fee,
            exit_fee: self.exit_fee,
        }
    }

    /// Update one setting from its textual value.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "taker_fee" => self.taker_fee = parse_non_negative(key, value)?,
            "maker_fee" => self.maker_fee = parse_non_negative(key, value)?,
            "risk_amount" => self.risk_amount = parse_positive(key, value)?,
            "available_capital" => self.available_capital = parse_positive(key, value)?,
            "decimal_places" => {
                let places: u32 = value
                    .parse()
                    .with_context(|| format!("Invalid value for decimal_places: {}", value))?;
                if places > MAX_DECIMAL_PLACES {
                    bail!("decimal_places must be at most {}", MAX_DECIMAL_PLACES);
                }
                self.decimal_places = places;
            }
            "entry_fee" => self.entry_fee = parse_fee_type(value)?,
            "exit_fee" => self.exit_fee = parse_fee_type(value)?,
            "test_mode" => {
                self.test_mode = value
                    .parse()
                    .with_context(|| format!("Invalid value for test_mode: {}", value))?
            }
            _ => bail!("Unknown setting: {}", key),
        }
        Ok(())
    }
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal> {
    value
        .parse::<Decimal>()
        .with_context(|| format!("Invalid value for {}: {}", key, value))
}

fn parse_non_negative(key: &str, value: &str) -> Result<Decimal> {
    let parsed = parse_decimal(key, value)?;
    if parsed.is_sign_negative() {
        bail!("{} cannot be negative", key);
    }
    Ok(parsed)
}

fn parse_positive(key: &str, value: &str) -> Result<Decimal> {
    let parsed = parse_decimal(key, value)?;
    if parsed <= Decimal::ZERO {
        bail!("{} must be greater than zero", key);
    }
    Ok(parsed)
}

/// Parse a fee type, rejecting anything but taker, maker or none.
pub fn parse_fee_type(value: &str) -> Result<FeeType> {
    match value.trim().to_lowercase().as_str() {
        "taker" | "maker" | "none" => Ok(FeeType::from_str(value)),
        _ => bail!("Fee type must be taker, maker or none: {}", value),
    }
}

/// Starting values for the compounding projector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompoundingDefaults {
    pub initial_capital: f64,
    pub profit_percent_per_trade: f64,
    pub number_of_trades: u32,
    pub win_rate_percent: f64,
}

impl Default for CompoundingDefaults {
    fn default() -> Self {
        Self {
            initial_capital: 1000.0,
            profit_percent_per_trade: 5.0,
            number_of_trades: 10,
            win_rate_percent: 70.0,
        }
    }
}
