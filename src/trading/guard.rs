//! Parsing and validation of raw calculator inputs.
//!
//! Every calculator goes through these checks so blank, unparseable and
//! degenerate input is rejected the same way everywhere.

use serde::{Deserialize, Serialize};

use super::error::{CalcResult, InputError};
use crate::models::{FeeSchedule, FeeType, SizingRequest};

/// Parse a raw field into a finite number.
///
/// Surrounding whitespace is ignored. Anything else that is not a complete
/// number (including `inf` and `NaN`) is rejected.
pub fn parse_input(field: &'static str, raw: &str) -> CalcResult<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(InputError::IncompleteInput { field });
    }

    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(InputError::InvalidNumber {
            field,
            value: trimmed.to_string(),
        }),
    }
}

pub fn require_finite(field: &'static str, value: f64) -> CalcResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(InputError::InvalidNumber {
            field,
            value: value.to_string(),
        })
    }
}

pub fn require_positive(field: &'static str, value: f64) -> CalcResult<f64> {
    let value = require_finite(field, value)?;
    if value > 0.0 {
        Ok(value)
    } else {
        Err(InputError::degenerate(format!(
            "{} must be greater than zero",
            field
        )))
    }
}

pub fn require_non_negative(field: &'static str, value: f64) -> CalcResult<f64> {
    let value = require_finite(field, value)?;
    if value >= 0.0 {
        Ok(value)
    } else {
        Err(InputError::degenerate(format!("{} cannot be negative", field)))
    }
}

/// Check every precondition of the sizing equation.
pub fn validate_request(request: &SizingRequest) -> CalcResult<()> {
    let entry = require_positive("entry price", request.entry_price)?;
    let stop = require_positive("stop loss", request.stop_loss)?;
    require_positive("risk amount", request.risk_amount)?;
    require_positive("available capital", request.available_capital)?;
    require_non_negative("entry fee rate", request.entry_fee_rate)?;
    require_non_negative("exit fee rate", request.exit_fee_rate)?;

    if entry == stop {
        return Err(InputError::degenerate("entry price equals stop loss"));
    }

    Ok(())
}

/// Sizing inputs exactly as typed into the calculator form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SizingForm {
    pub entry_price: String,
    pub stop_loss: String,
    pub risk_amount: String,
    pub available_capital: String,
    /// Taker fee in percent (e.g. "0.055")
    pub taker_fee_pct: String,
    /// Maker fee in percent (e.g. "0.02")
    pub maker_fee_pct: String,
    pub entry_fee: FeeType,
    pub exit_fee: FeeType,
}

impl SizingForm {
    /// Convert the form into a validated sizing request.
    ///
    /// Blank required fields are reported before anything is parsed, so a
    /// half-filled form reads as incomplete rather than invalid.
    pub fn to_request(&self) -> CalcResult<SizingRequest> {
        let required = [
            ("entry price", &self.entry_price),
            ("stop loss", &self.stop_loss),
            ("risk amount", &self.risk_amount),
            ("available capital", &self.available_capital),
            ("taker fee", &self.taker_fee_pct),
            ("maker fee", &self.maker_fee_pct),
        ];
        if let Some((field, _)) = required.iter().find(|(_, raw)| raw.trim().is_empty()) {
            return Err(InputError::IncompleteInput { field: *field });
        }

        let entry = parse_input("entry price", &self.entry_price)?;
        let stop = parse_input("stop loss", &self.stop_loss)?;
        let risk = parse_input("risk amount", &self.risk_amount)?;
        let capital = parse_input("available capital", &self.available_capital)?;
        let taker_pct = parse_input("taker fee", &self.taker_fee_pct)?;
        let maker_pct = parse_input("maker fee", &self.maker_fee_pct)?;
        require_non_negative("taker fee", taker_pct)?;
        require_non_negative("maker fee", maker_pct)?;

        let fees = FeeSchedule::from_percentages(taker_pct, maker_pct);
        let request = SizingRequest::new(
            entry,
            stop,
            risk,
            capital,
            fees.rate_for(self.entry_fee),
            fees.rate_for(self.exit_fee),
        );

        validate_request(&request)?;
        Ok(request)
    }
}
