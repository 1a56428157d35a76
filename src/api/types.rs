//! Request and response bodies for the trade execution functions.

use serde::{Deserialize, Serialize};

use crate::models::{FeeType, SizingRequest, SizingResult};

/// Body of `POST /executeManualTrade`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeTicket {
    pub user_id: String,
    /// Exchange API key; always null in test mode
    pub api_key_id: Option<String>,
    pub symbol: String,
    /// "Buy" or "Sell"
    pub side: String,
    pub entry_price: f64,
    /// Unsigned position size
    pub quantity: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub max_risk: f64,
    /// Unsigned leverage
    pub leverage: f64,
    pub system_id: Option<String>,
    pub notes: Option<String>,
    pub pic_entry: Option<String>,
    /// "Market" for taker entries, "Limit" otherwise
    pub order_type: String,
    pub test_mode: bool,
}

impl TradeTicket {
    /// Build a ticket for a finalized sizing.
    pub fn new(
        user_id: String,
        api_key_id: Option<String>,
        symbol: String,
        request: &SizingRequest,
        result: &SizingResult,
        entry_fee: FeeType,
        test_mode: bool,
    ) -> Self {
        Self {
            user_id,
            api_key_id: if test_mode { None } else { api_key_id },
            symbol,
            side: result.direction.order_side().to_string(),
            entry_price: request.entry_price,
            quantity: result.size_after_fees.abs(),
            stop_loss: Some(request.stop_loss),
            take_profit: None,
            max_risk: result.max_risk,
            leverage: result.leverage.abs(),
            system_id: None,
            notes: None,
            pic_entry: None,
            order_type: entry_fee.order_type().to_string(),
            test_mode,
        }
    }

    pub fn with_take_profit(mut self, take_profit: Option<f64>) -> Self {
        self.take_profit = take_profit;
        self
    }

    /// Attach journal fields. Empty strings are sent as null.
    pub fn with_journal(mut self, system_id: &str, notes: &str, pic_entry: &str) -> Self {
        self.system_id = non_empty(system_id);
        self.notes = non_empty(notes);
        self.pic_entry = non_empty(pic_entry);
        self
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Successful response from `executeManualTrade`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReceipt {
    pub trade_id: String,
    #[serde(default)]
    pub order_id: Option<String>,
}

/// Body of `POST /closeManualTrade/{trade_id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseRequest {
    /// Exit notes
    pub notes: String,
    pub exit_pic_url: String,
    pub entry_notes: String,
    pub mid_trade_notes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_price: Option<f64>,
}

/// Error body returned by the execution functions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}
