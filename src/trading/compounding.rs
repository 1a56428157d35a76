//! Expected-value compounding over a fixed number of trades.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{CalcResult, InputError};
use super::guard::require_finite;

/// What happens when projected capital would drop below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapitalFloor {
    /// Capital is clamped at zero
    #[default]
    Zero,
    /// The raw product is kept
    Unbounded,
}

impl CapitalFloor {
    fn apply(self, capital: f64) -> f64 {
        match self {
            CapitalFloor::Zero => capital.max(0.0),
            CapitalFloor::Unbounded => capital,
        }
    }
}

impl std::str::FromStr for CapitalFloor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "zero" => Ok(CapitalFloor::Zero),
            "unbounded" | "none" => Ok(CapitalFloor::Unbounded),
            _ => Err(format!("Unknown capital floor: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompoundingParameters {
    pub initial_capital: f64,
    pub profit_percent_per_trade: f64,
    pub number_of_trades: u32,
    /// 0 to 100
    pub win_rate_percent: f64,
    /// Fee drag per trade, in percent of capital
    pub fee_rate_percent: f64,
    #[serde(default)]
    pub floor: CapitalFloor,
}

impl CompoundingParameters {
    pub fn new(
        initial_capital: f64,
        profit_percent_per_trade: f64,
        number_of_trades: u32,
        win_rate_percent: f64,
        fee_rate_percent: f64,
    ) -> Self {
        Self {
            initial_capital,
            profit_percent_per_trade,
            number_of_trades,
            win_rate_percent,
            fee_rate_percent,
            floor: CapitalFloor::default(),
        }
    }

    pub fn with_floor(mut self, floor: CapitalFloor) -> Self {
        self.floor = floor;
        self
    }

    /// Expected growth of one trade, in percent.
    pub fn effective_growth_percent(&self) -> f64 {
        effective_growth_percent(
            self.profit_percent_per_trade,
            self.win_rate_percent,
            self.fee_rate_percent,
        )
    }

    fn validate(&self) -> CalcResult<()> {
        validate_common(self.initial_capital, self.win_rate_percent, self.fee_rate_percent)?;
        require_finite("profit per trade", self.profit_percent_per_trade)?;
        Ok(())
    }
}

/// Win-rate-weighted profit less the per-trade fee, in percent.
///
/// Losing trades are flat, so the fee is the only drag.
pub fn effective_growth_percent(profit_percent: f64, win_rate_percent: f64, fee_rate_percent: f64) -> f64 {
    profit_percent * win_rate_percent / 100.0 - fee_rate_percent
}

/// Capital after each trade. Index 0 is the starting capital.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthTrajectory {
    values: Vec<f64>,
}

impl GrowthTrajectory {
    pub fn initial_capital(&self) -> f64 {
        self.values.first().copied().unwrap_or(0.0)
    }

    pub fn final_capital(&self) -> f64 {
        self.values.last().copied().unwrap_or(0.0)
    }

    /// Growth of row `index` relative to the starting capital, in percent.
    ///
    /// Zero when the starting capital is zero or `index` is out of range.
    pub fn growth_percent(&self, index: usize) -> f64 {
        let initial = self.initial_capital();
        match self.values.get(index) {
            Some(value) if initial != 0.0 => (value - initial) / initial * 100.0,
            _ => 0.0,
        }
    }

    pub fn total_growth_percent(&self) -> f64 {
        self.growth_percent(self.values.len().saturating_sub(1))
    }

    /// `(trade_number, capital, growth_percent)` for every row.
    pub fn rows(&self) -> impl Iterator<Item = (usize, f64, f64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(move |(i, value)| (i, *value, self.growth_percent(i)))
    }
}

/// Project capital over `number_of_trades` trades.
pub fn project(params: &CompoundingParameters) -> CalcResult<GrowthTrajectory> {
    params.validate()?;
    let effective = params.effective_growth_percent();

    let trajectory = compound(
        params.initial_capital,
        effective,
        params.number_of_trades,
        params.floor,
    );

    debug!(
        trades = params.number_of_trades,
        effective_percent = effective,
        final_capital = trajectory.final_capital(),
        "Projected compounding growth"
    );

    Ok(trajectory)
}

/// Final value of [`project`] without keeping the trajectory.
pub fn compounded_final_capital(params: &CompoundingParameters) -> CalcResult<f64> {
    params.validate()?;
    let factor = 1.0 + params.effective_growth_percent() / 100.0;

    let mut capital = params.initial_capital;
    for _ in 0..params.number_of_trades {
        capital = params.floor.apply(capital * factor);
    }
    Ok(capital)
}

/// Compounding where each trade risks a fixed share of current capital.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RMultipleParameters {
    pub initial_capital: f64,
    /// Percent of current capital risked per trade
    pub risk_percent_per_trade: f64,
    /// Reward of a winning trade in units of risk
    pub reward_multiple: f64,
    pub number_of_trades: u32,
    pub win_rate_percent: f64,
    pub fee_rate_percent: f64,
    #[serde(default)]
    pub floor: CapitalFloor,
}

impl RMultipleParameters {
    /// Expected growth of one trade, in percent.
    ///
    /// A winner returns `reward_multiple` times the risk, a loser gives up
    /// the risk.
    pub fn effective_growth_percent(&self) -> f64 {
        let win = self.win_rate_percent / 100.0;
        let expectancy = win * self.reward_multiple - (1.0 - win);
        self.risk_percent_per_trade * expectancy - self.fee_rate_percent
    }
}

pub fn project_r_multiple(params: &RMultipleParameters) -> CalcResult<GrowthTrajectory> {
    validate_common(params.initial_capital, params.win_rate_percent, params.fee_rate_percent)?;
    let risk = require_finite("risk per trade", params.risk_percent_per_trade)?;
    if risk < 0.0 {
        return Err(InputError::degenerate("risk per trade cannot be negative"));
    }
    let reward = require_finite("reward multiple", params.reward_multiple)?;
    if reward < 0.0 {
        return Err(InputError::degenerate("reward multiple cannot be negative"));
    }

    let effective = params.effective_growth_percent();
    let trajectory = compound(
        params.initial_capital,
        effective,
        params.number_of_trades,
        params.floor,
    );

    debug!(
        trades = params.number_of_trades,
        reward_multiple = reward,
        effective_percent = effective,
        final_capital = trajectory.final_capital(),
        "Projected R-multiple growth"
    );

    Ok(trajectory)
}

fn validate_common(initial_capital: f64, win_rate_percent: f64, fee_rate_percent: f64) -> CalcResult<()> {
    let initial = require_finite("initial capital", initial_capital)?;
    if initial < 0.0 {
        return Err(InputError::degenerate("initial capital cannot be negative"));
    }

    let win_rate = require_finite("win rate", win_rate_percent)?;
    if !(0.0..=100.0).contains(&win_rate) {
        return Err(InputError::degenerate("win rate must be between 0 and 100"));
    }

    require_finite("fee rate", fee_rate_percent)?;
    Ok(())
}

fn compound(initial_capital: f64, effective_percent: f64, trades: u32, floor: CapitalFloor) -> GrowthTrajectory {
    let factor = 1.0 + effective_percent / 100.0;

    let mut values = Vec::with_capacity(trades as usize + 1);
    let mut capital = initial_capital;
    values.push(capital);
    for _ in 0..trades {
        capital = floor.apply(capital * factor);
        values.push(capital);
    }

    GrowthTrajectory { values }
}
