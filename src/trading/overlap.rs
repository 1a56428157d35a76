//! Risk aggregation across simultaneously open trades.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::CalcResult;
use super::guard::require_positive;
use crate::models::Trade;

/// Combined risk of all open trades above which the account is over-exposed,
/// in percent of capital.
pub const MAX_COMBINED_RISK_PERCENT: f64 = 2.0;

fn stop_range(entry_price: f64, stop_loss: f64) -> (f64, f64) {
    (entry_price.min(stop_loss), entry_price.max(stop_loss))
}

fn ranges_intersect(a: (f64, f64), b: (f64, f64)) -> bool {
    a.0 <= b.1 && b.0 <= a.1
}

/// True when the candidate's entry-to-stop range intersects that of any open
/// trade. Touching endpoints count as overlap.
pub fn has_overlap(open_trades: &[Trade], entry_price: f64, stop_loss: f64) -> bool {
    let candidate = stop_range(entry_price, stop_loss);
    open_trades
        .iter()
        .any(|trade| ranges_intersect(trade.stop_range(), candidate))
}

/// Ids of the open trades whose stop range the candidate intersects.
pub fn overlapping_trades<'a>(
    open_trades: &'a [Trade],
    entry_price: f64,
    stop_loss: f64,
) -> Vec<&'a str> {
    let candidate = stop_range(entry_price, stop_loss);
    open_trades
        .iter()
        .filter(|trade| ranges_intersect(trade.stop_range(), candidate))
        .map(|trade| trade.trade_id.as_str())
        .collect()
}

/// One trade's share of the combined risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRisk {
    pub trade_id: String,
    pub risk_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedRiskProfile {
    pub total_risk_percentage: f64,
    /// Per-trade terms in the order the trades were given
    pub risks_per_trade: Vec<TradeRisk>,
    pub is_exceeding_risk_limit: bool,
}

impl CombinedRiskProfile {
    /// Percent of capital still available before the limit is crossed.
    pub fn remaining_headroom(&self) -> f64 {
        (MAX_COMBINED_RISK_PERCENT - self.total_risk_percentage).max(0.0)
    }
}

/// Sum each open trade's risk as a percentage of `capital`.
pub fn combined_risk_profile(open_trades: &[Trade], capital: f64) -> CalcResult<CombinedRiskProfile> {
    let capital = require_positive("capital", capital)?;

    let risks_per_trade: Vec<TradeRisk> = open_trades
        .iter()
        .map(|trade| TradeRisk {
            trade_id: trade.trade_id.clone(),
            risk_percentage: trade.risk_amount.abs() / capital * 100.0,
        })
        .collect();

    let total_risk_percentage: f64 = risks_per_trade.iter().map(|r| r.risk_percentage).sum();
    let is_exceeding_risk_limit = total_risk_percentage > MAX_COMBINED_RISK_PERCENT;

    debug!(
        trades = risks_per_trade.len(),
        total_risk = total_risk_percentage,
        "Computed combined risk"
    );
    if is_exceeding_risk_limit {
        warn!(
            total_risk = total_risk_percentage,
            limit = MAX_COMBINED_RISK_PERCENT,
            "Combined risk exceeds limit"
        );
    }

    Ok(CombinedRiskProfile {
        total_risk_percentage,
        risks_per_trade,
        is_exceeding_risk_limit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;
    use chrono::Utc;

    fn make_trade(id: &str, entry: f64, stop: f64, risk: f64) -> Trade {
        Trade {
            trade_id: id.to_string(),
            symbol: "ETHUSDT".to_string(),
            direction: Direction::from_prices(entry, stop).unwrap(),
            entry_price: entry,
            stop_loss: stop,
            take_profit_price: None,
            position_size: 1.0,
            risk_amount: risk,
            risk_percentage: 1.0,
            leverage: 1.0,
            fee: 0.055,
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

    #[test]
    fn test_no_trades_no_overlap() {
        assert!(!has_overlap(&[], 100.0, 95.0));
        assert!(overlapping_trades(&[], 100.0, 95.0).is_empty());
    }

    #[test]
    fn test_overlap_detection() {
        let trades = vec![
            make_trade("a", 100.0, 95.0, 10.0),
            make_trade("b", 200.0, 210.0, 10.0),
        ];

        assert!(has_overlap(&trades, 97.0, 90.0));
        // Short candidate whose range covers the long's range
        assert!(has_overlap(&trades, 94.0, 101.0));
        // Touching endpoints
        assert!(has_overlap(&trades, 100.0, 105.0));
        assert!(!has_overlap(&trades, 150.0, 160.0));

        assert_eq!(overlapping_trades(&trades, 99.0, 205.0), vec!["a", "b"]);
        assert_eq!(overlapping_trades(&trades, 205.0, 220.0), vec!["b"]);
    }

    #[test]
    fn test_overlap_is_symmetric() {
        let ranges = [
            (100.0, 95.0),
            (96.0, 110.0),
            (120.0, 111.0),
            (95.0, 90.0),
            (50.0, 60.0),
        ];

        for (i, a) in ranges.iter().enumerate() {
            for (j, b) in ranges.iter().enumerate() {
                let trade_a = make_trade(&format!("a{i}"), a.0, a.1, 10.0);
                let trade_b = make_trade(&format!("b{j}"), b.0, b.1, 10.0);
                assert_eq!(
                    has_overlap(&[trade_a], b.0, b.1),
                    has_overlap(&[trade_b], a.0, a.1),
                    "ranges {a:?} and {b:?}"
                );
            }
        }
    }

    #[test]
    fn test_combined_risk_sums_terms() {
        let trades = vec![
            make_trade("a", 100.0, 95.0, 5.0),
            make_trade("b", 50.0, 52.0, 7.5),
            make_trade("c", 10.0, 9.0, -2.5),
        ];

        let profile = combined_risk_profile(&trades, 1000.0).unwrap();
        let sum: f64 = profile.risks_per_trade.iter().map(|r| r.risk_percentage).sum();

        assert!((profile.total_risk_percentage - sum).abs() < 1e-12);
        assert!((profile.total_risk_percentage - 1.5).abs() < 1e-12);
        assert_eq!(profile.risks_per_trade[2].trade_id, "c");
        assert!((profile.risks_per_trade[2].risk_percentage - 0.25).abs() < 1e-12);
        assert!(!profile.is_exceeding_risk_limit);
        assert!((profile.remaining_headroom() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_combined_risk_limit() {
        // Exactly at the limit is not exceeding
        let at_limit = vec![make_trade("a", 100.0, 95.0, 10.0), make_trade("b", 100.0, 95.0, 10.0)];
        let profile = combined_risk_profile(&at_limit, 1000.0).unwrap();
        assert_eq!(profile.total_risk_percentage, 2.0);
        assert!(!profile.is_exceeding_risk_limit);

        let over = vec![make_trade("a", 100.0, 95.0, 10.0), make_trade("b", 100.0, 95.0, 10.5)];
        let profile = combined_risk_profile(&over, 1000.0).unwrap();
        assert!(profile.is_exceeding_risk_limit);
        assert_eq!(profile.remaining_headroom(), 0.0);
    }

    #[test]
    fn test_combined_risk_empty_and_invalid_capital() {
        let profile = combined_risk_profile(&[], 1000.0).unwrap();
        assert_eq!(profile.total_risk_percentage, 0.0);
        assert!(profile.risks_per_trade.is_empty());

        assert!(combined_risk_profile(&[], 0.0).unwrap_err().should_warn());
        assert!(combined_risk_profile(&[], f64::NAN).unwrap_err().should_warn());
    }
}
