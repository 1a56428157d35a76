//! Fee-inclusive position sizing for a single trade.
//!
//! For a size `s`, the loss at the stop including both fee legs is
//!
//! ```text
//! s * |stop - entry| + s * entry * entry_fee_rate + s * stop * exit_fee_rate
//! ```
//!
//! Setting that equal to the risk budget and solving for `s` gives
//!
//! ```text
//! s = risk / (|stop - entry| + entry * entry_fee_rate + stop * exit_fee_rate)
//! ```

use tracing::{debug, warn};

use super::error::{CalcResult, InputError};
use super::guard::validate_request;
use super::liquidation::{estimate_liquidation, is_liquidation_risky};
use crate::models::{Direction, SizingRequest, SizingResult};

/// Size a position so that the loss at the stop, fees included, equals the
/// requested risk amount.
pub fn size_position(request: &SizingRequest) -> CalcResult<SizingResult> {
    validate_request(request)?;

    let entry = request.entry_price;
    let stop = request.stop_loss;
    let risk = request.risk_amount;
    let capital = request.available_capital;

    let direction = Direction::from_prices(entry, stop)
        .ok_or_else(|| InputError::degenerate("entry price equals stop loss"))?;

    let price_difference = (stop - entry).abs();
    let size_before_fees = risk / price_difference;

    let fee_factor = entry * request.entry_fee_rate + stop * request.exit_fee_rate;
    let size = risk / (price_difference + fee_factor);

    let entry_fee = size * entry * request.entry_fee_rate;
    let exit_fee = size * stop * request.exit_fee_rate;

    let leverage = (size * entry) / capital;
    if !leverage.is_finite() || leverage == 0.0 {
        return Err(InputError::degenerate("leverage resolves to zero"));
    }

    let liquidation_price = estimate_liquidation(entry, leverage, direction)?;
    let is_liquidation_risky = is_liquidation_risky(liquidation_price, stop, direction);

    let result = SizingResult {
        direction,
        size_before_fees,
        size_after_fees: size,
        total_fees: entry_fee + exit_fee,
        max_risk: risk,
        leverage,
        liquidation_price,
        is_liquidation_risky,
        risk_percentage_of_capital: (risk / capital) * 100.0,
    };

    debug!(
        direction = direction.as_str(),
        size = result.size_after_fees,
        leverage = result.leverage,
        fees = result.total_fees,
        liquidation = result.liquidation_price,
        "Sized position"
    );

    if is_liquidation_risky {
        warn!(
            liquidation = liquidation_price,
            stop = stop,
            "Liquidation price is reached before the stop loss"
        );
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAKER: f64 = 0.00055;

    /// Total loss if a position of `size` is stopped out, both fee legs included.
    fn loss_at_stop(request: &SizingRequest, size: f64) -> f64 {
        let size = size.abs();
        size * (request.stop_loss - request.entry_price).abs()
            + size * request.entry_price * request.entry_fee_rate
            + size * request.stop_loss * request.exit_fee_rate
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_long_sizing_example() {
        let request = SizingRequest::new(100.0, 95.0, 20.0, 1000.0, TAKER, TAKER);
        let result = size_position(&request).unwrap();

        let expected_size = 20.0 / (5.0 + 100.0 * TAKER + 95.0 * TAKER);
        assert_eq!(result.direction, Direction::Long);
        assert_close(result.size_before_fees, 4.0);
        assert_close(result.size_after_fees, expected_size);
        assert_close(result.leverage, expected_size * 100.0 / 1000.0);
        assert_close(result.risk_percentage_of_capital, 2.0);

        // Under 1x the long liquidation price floors at zero, below the stop
        assert_eq!(result.liquidation_price, 0.0);
        assert!(!result.is_liquidation_risky);
    }

    #[test]
    fn test_loss_at_stop_equals_risk() {
        let cases = [
            (100.0, 95.0, 20.0, TAKER, TAKER),
            (100.0, 105.0, 20.0, TAKER, 0.0002),
            (0.5123, 0.4987, 3.5, 0.001, 0.0),
            (64250.0, 65010.5, 150.0, 0.0, 0.0),
            (1.0, 2.0, 1.0, 0.01, 0.01),
        ];

        for (entry, stop, risk, entry_fee, exit_fee) in cases {
            let request = SizingRequest::new(entry, stop, risk, 10_000.0, entry_fee, exit_fee);
            let result = size_position(&request).unwrap();

            assert!((loss_at_stop(&request, result.size_after_fees) - risk).abs() < 1e-9);
            assert_eq!(result.max_risk, risk);
            assert_close(
                result.total_fees,
                loss_at_stop(&request, result.size_after_fees)
                    - result.size_after_fees * (stop - entry).abs(),
            );
        }
    }

    #[test]
    fn test_short_direction_and_signs() {
        let request = SizingRequest::new(100.0, 105.0, 20.0, 1000.0, TAKER, TAKER);
        let result = size_position(&request).unwrap();

        assert_eq!(result.direction, Direction::Short);
        assert!(result.size_after_fees > 0.0);
        assert!(result.leverage > 0.0);
        assert_eq!(result.signed_size(), -result.size_after_fees);
        assert_eq!(result.signed_leverage(), -result.leverage);

        // Short liquidation sits above entry
        assert!(result.liquidation_price > 100.0);
        assert!(!result.is_liquidation_risky);
    }

    #[test]
    fn test_high_leverage_is_risky() {
        // Tight stop, tiny capital: 0.5% stop distance at ~40x
        let request = SizingRequest::new(100.0, 99.5, 10.0, 50.0, 0.0, 0.0);
        let result = size_position(&request).unwrap();

        assert_close(result.leverage, 40.0);
        assert_close(result.liquidation_price, 97.5);
        assert!(!result.is_liquidation_risky);

        let request = SizingRequest::new(100.0, 97.0, 30.0, 10.0, 0.0, 0.0);
        let result = size_position(&request).unwrap();
        // 100x leverage liquidates at 99, before the 97 stop
        assert_close(result.leverage, 100.0);
        assert!(result.is_liquidation_risky);
    }

    #[test]
    fn test_zero_fees_match_naive_size() {
        let request = SizingRequest::new(100.0, 90.0, 50.0, 1000.0, 0.0, 0.0);
        let result = size_position(&request).unwrap();

        assert_close(result.size_after_fees, result.size_before_fees);
        assert_eq!(result.total_fees, 0.0);
    }

    #[test]
    fn test_degenerate_requests() {
        let equal = SizingRequest::new(100.0, 100.0, 20.0, 1000.0, TAKER, TAKER);
        assert!(matches!(
            size_position(&equal),
            Err(InputError::DegenerateInput(_))
        ));

        let no_capital = SizingRequest::new(100.0, 95.0, 20.0, 0.0, TAKER, TAKER);
        assert!(matches!(
            size_position(&no_capital),
            Err(InputError::DegenerateInput(_))
        ));

        let nan_entry = SizingRequest::new(f64::NAN, 95.0, 20.0, 1000.0, TAKER, TAKER);
        assert!(matches!(
            size_position(&nan_entry),
            Err(InputError::InvalidNumber { .. })
        ));

        let no_risk = SizingRequest::new(100.0, 95.0, 0.0, 1000.0, TAKER, TAKER);
        assert!(size_position(&no_risk).unwrap_err().should_warn());
    }

    #[test]
    fn test_non_positive_prices_are_rejected() {
        for (entry, stop) in [(-5.0, -10.0), (0.0, 95.0), (100.0, 0.0), (100.0, -1.0)] {
            let request = SizingRequest::new(entry, stop, 20.0, 1000.0, TAKER, TAKER);
            assert!(
                matches!(size_position(&request), Err(InputError::DegenerateInput(_))),
                "{entry}/{stop} should be rejected"
            );
        }
    }

    #[test]
    fn test_sizing_is_deterministic() {
        let request = SizingRequest::new(27.31, 26.9, 12.5, 740.0, TAKER, 0.0002);
        assert_eq!(size_position(&request), size_position(&request));
    }
}
