//! Data models for trades, fee schedules, and sizing results.

mod fees;
mod sizing;
mod trade;

pub use fees::{FeeSchedule, FeeType};
pub use sizing::{
    round_for_display, SizingRequest, SizingResult, MAX_DECIMAL_PLACES,
    MONEY_DECIMAL_PLACES,
};
pub use trade::{Direction, Trade};
