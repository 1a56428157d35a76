//! Risk engine: input guards, position sizing, liquidation, compounding and
//! cross-trade risk aggregation.
//!
//! Every calculator here is a pure synchronous function over borrowed inputs.

mod compound_sizer;
mod compounding;
mod config;
mod error;
mod guard;
mod liquidation;
mod overlap;
mod position_sizer;

pub use compound_sizer::size_compound_position;
pub use compounding::{
    compounded_final_capital, project, project_r_multiple, CapitalFloor, CompoundingParameters,
    GrowthTrajectory, RMultipleParameters,
};
pub use config::{parse_fee_type, CalculatorSettings, CompoundingDefaults};
pub use error::{CalcResult, InputError};
pub use guard::{parse_input, SizingForm};
pub use liquidation::{estimate_liquidation, LiquidationEstimate};
pub use overlap::{combined_risk_profile, has_overlap, overlapping_trades, MAX_COMBINED_RISK_PERCENT};
pub use position_sizer::size_position;
