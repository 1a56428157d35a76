//! Position sizing that accounts for open trades and unrealized profit.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::{CalcResult, InputError};
use super::guard::require_finite;
use super::overlap::{combined_risk_profile, has_overlap, CombinedRiskProfile};
use super::position_sizer::size_position;
use crate::models::{SizingRequest, SizingResult, Trade};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundSizing {
    pub result: SizingResult,
    /// Capital the position was sized against
    pub effective_capital: f64,
    pub has_overlapping_stops: bool,
    /// Open trades measured against `effective_capital`; `None` with no open trades
    pub risk_profile: Option<CombinedRiskProfile>,
}

impl CompoundSizing {
    pub fn exceeds_risk_limit(&self) -> bool {
        self.risk_profile
            .as_ref()
            .is_some_and(|profile| profile.is_exceeding_risk_limit)
    }
}

/// Size a position with optional unrealized profit added to capital and an
/// optional risk multiplier in `(0, 1]`.
///
/// The multiplier is always chosen by the caller. Overlap and the combined
/// risk profile are reported, never acted on.
pub fn size_compound_position(
    request: &SizingRequest,
    unrealized_profit: Option<f64>,
    overlap_adjustment: Option<f64>,
    open_trades: &[Trade],
) -> CalcResult<CompoundSizing> {
    let mut adjusted = *request;

    if let Some(profit) = unrealized_profit {
        let profit = require_finite("unrealized profit", profit)?;
        let capital = request.available_capital + profit;
        if capital <= 0.0 {
            return Err(InputError::degenerate(
                "capital including unrealized profit must be greater than zero",
            ));
        }
        adjusted = adjusted.with_capital(capital);
    }

    if let Some(factor) = overlap_adjustment {
        let factor = require_finite("overlap adjustment", factor)?;
        if factor <= 0.0 || factor > 1.0 {
            return Err(InputError::degenerate(
                "overlap adjustment must be greater than 0 and at most 1",
            ));
        }
        adjusted = adjusted.with_risk(request.risk_amount * factor);
    }

    let result = size_position(&adjusted)?;

    let has_overlapping_stops = has_overlap(open_trades, request.entry_price, request.stop_loss);
    if has_overlapping_stops {
        warn!(
            entry = request.entry_price,
            stop = request.stop_loss,
            "Stop range overlaps an open trade"
        );
    }

    let risk_profile = if open_trades.is_empty() {
        None
    } else {
        Some(combined_risk_profile(open_trades, adjusted.available_capital)?)
    };

    debug!(
        effective_capital = adjusted.available_capital,
        risk = adjusted.risk_amount,
        open_trades = open_trades.len(),
        "Sized compound position"
    );

    Ok(CompoundSizing {
        result,
        effective_capital: adjusted.available_capital,
        has_overlapping_stops,
        risk_profile,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;
    use chrono::Utc;

    fn make_request() -> SizingRequest {
        SizingRequest::new(100.0, 95.0, 20.0, 1000.0, 0.00055, 0.00055)
    }

    fn make_trade(id: &str, entry: f64, stop: f64, risk: f64) -> Trade {
        let request = SizingRequest::new(entry, stop, risk, 1000.0, 0.0, 0.0);
        let result = size_position(&request).unwrap();
        Trade::open(id.to_string(), "SOLUSDT".to_string(), &request, &result)
    }

    #[test]
    fn test_plain_sizing_matches_position_sizer() {
        let request = make_request();
        let sizing = size_compound_position(&request, None, None, &[]).unwrap();

        assert_eq!(sizing.result, size_position(&request).unwrap());
        assert_eq!(sizing.effective_capital, 1000.0);
        assert!(!sizing.has_overlapping_stops);
        assert!(sizing.risk_profile.is_none());
        assert!(!sizing.exceeds_risk_limit());
    }

    #[test]
    fn test_unrealized_profit_raises_capital() {
        let request = make_request();
        let sizing = size_compound_position(&request, Some(250.0), None, &[]).unwrap();
        let plain = size_position(&request).unwrap();

        assert_eq!(sizing.effective_capital, 1250.0);
        // Size depends only on risk; leverage shrinks with the bigger base
        assert_eq!(sizing.result.size_after_fees, plain.size_after_fees);
        assert!(sizing.result.leverage < plain.leverage);
        assert!((sizing.result.risk_percentage_of_capital - 1.6).abs() < 1e-9);
    }

    #[test]
    fn test_unrealized_loss_cannot_exhaust_capital() {
        let request = make_request();
        let err = size_compound_position(&request, Some(-1000.0), None, &[]).unwrap_err();
        assert!(matches!(err, InputError::DegenerateInput(_)));
    }

    #[test]
    fn test_overlap_adjustment_scales_risk() {
        let request = make_request();
        let sizing = size_compound_position(&request, None, Some(0.5), &[]).unwrap();
        let half = size_position(&request.with_risk(10.0)).unwrap();

        assert_eq!(sizing.result.max_risk, 10.0);
        assert_eq!(sizing.result.size_after_fees, half.size_after_fees);

        for factor in [0.0, -0.5, 1.5, f64::NAN] {
            assert!(size_compound_position(&request, None, Some(factor), &[])
                .unwrap_err()
                .should_warn());
        }
    }

    #[test]
    fn test_reports_overlap_and_profile() {
        let open = vec![
            make_trade("t-1", 98.0, 93.0, 10.0),
            make_trade("t-2", 300.0, 310.0, 15.0),
        ];
        let request = make_request();
        let sizing = size_compound_position(&request, None, None, &open).unwrap();

        assert!(sizing.has_overlapping_stops);
        assert_eq!(sizing.result.direction, Direction::Long);

        let profile = sizing.risk_profile.as_ref().unwrap();
        assert!((profile.total_risk_percentage - 2.5).abs() < 1e-9);
        assert!(sizing.exceeds_risk_limit());

        // Same trades against a larger base stay under the limit
        let sizing = size_compound_position(&request, Some(500.0), None, &open).unwrap();
        let profile = sizing.risk_profile.unwrap();
        assert!((profile.total_risk_percentage - 25.0 / 1500.0 * 100.0).abs() < 1e-9);
        assert!(!profile.is_exceeding_risk_limit);
    }
}
