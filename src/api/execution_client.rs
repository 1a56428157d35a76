//! HTTP client for the remote execute/close trade functions.

use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use super::types::*;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Endpoint and caller identity for execution requests.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub base_url: String,
    pub user_id: String,
    pub api_key_id: Option<String>,
}

impl ExecutionConfig {
    /// Create from environment variables:
    /// - RISKCALC_EXECUTION_URL
    /// - RISKCALC_USER_ID
    /// - RISKCALC_API_KEY_ID (optional, unused in test mode)
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("RISKCALC_EXECUTION_URL")
            .context("RISKCALC_EXECUTION_URL not set")?;
        let user_id = std::env::var("RISKCALC_USER_ID")
            .context("RISKCALC_USER_ID not set")?;
        let api_key_id = std::env::var("RISKCALC_API_KEY_ID")
            .ok()
            .filter(|key| !key.trim().is_empty());

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id,
            api_key_id,
        })
    }
}

/// Client for the trade execution functions. Requests are sent once and
/// never retried.
pub struct ExecutionClient {
    client: Client,
    base_url: String,
}

impl ExecutionClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Place the order and record the trade remotely.
    ///
    /// A live ticket must name an API key. There is no key list to consult
    /// here, so a missing `RISKCALC_API_KEY_ID` outside test mode is always
    /// rejected before anything is sent.
    pub async fn execute_trade(&self, ticket: &TradeTicket) -> Result<ExecutionReceipt> {
        if !ticket.test_mode && ticket.api_key_id.is_none() {
            anyhow::bail!("Please select an API key or enable test mode");
        }

        let url = format!("{}/executeManualTrade", self.base_url);
        debug!(url = %url, symbol = %ticket.symbol, side = %ticket.side, "Executing trade");

        let response = self
            .client
            .post(&url)
            .json(ticket)
            .send()
            .await
            .context("Failed to send execute request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "{} ({})",
                error_message(&body, "Failed to execute and save trade"),
                status
            );
        }

        let receipt: ExecutionReceipt = response
            .json()
            .await
            .context("Failed to parse execute response")?;

        info!(
            trade_id = %receipt.trade_id,
            order_id = ?receipt.order_id,
            test_mode = ticket.test_mode,
            "Trade executed"
        );

        Ok(receipt)
    }

    /// Close a trade remotely, sending its final journal fields.
    pub async fn close_trade(&self, trade_id: &str, request: &CloseRequest) -> Result<()> {
        let url = format!("{}/closeManualTrade/{}", self.base_url, trade_id);
        debug!(url = %url, "Closing trade");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .context("Failed to send close request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("{} ({})", error_message(&body, "Failed to close trade"), status);
        }

        info!(trade_id = %trade_id, "Trade closed");
        Ok(())
    }
}

/// The `error` field of a failure body, or `fallback` when there is none.
fn error_message(body: &str, fallback: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.error)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, FeeType, SizingRequest, SizingResult};

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(r#"{"error": "Invalid API key"}"#, "fallback"),
            "Invalid API key"
        );
        assert_eq!(error_message(r#"{"error": ""}"#, "fallback"), "fallback");
        assert_eq!(error_message("<html>502</html>", "fallback"), "fallback");
        assert_eq!(error_message("", "fallback"), "fallback");
    }

    #[test]
    fn test_base_url_is_normalized() {
        let client = ExecutionClient::new("https://example.com/.netlify/functions/").unwrap();
        assert_eq!(client.base_url, "https://example.com/.netlify/functions");
    }

    #[tokio::test]
    async fn test_live_ticket_requires_api_key() {
        let request = SizingRequest::new(100.0, 95.0, 20.0, 1000.0, 0.00055, 0.00055);
        let result = SizingResult {
            direction: Direction::Long,
            size_before_fees: 4.0,
            size_after_fees: 3.9,
            total_fees: 0.42,
            max_risk: 20.0,
            leverage: 0.39,
            liquidation_price: 0.0,
            is_liquidation_risky: false,
            risk_percentage_of_capital: 2.0,
        };
        let ticket = TradeTicket::new(
            "user-1".to_string(),
            None,
            "BTCUSDT".to_string(),
            &request,
            &result,
            FeeType::Taker,
            false,
        );

        // Rejected before any request is sent
        let client = ExecutionClient::new("http://127.0.0.1:9").unwrap();
        let err = client.execute_trade(&ticket).await.unwrap_err();
        assert!(err.to_string().contains("API key"));
    }
}
