//! SQLite persistence for open trades and calculator settings.
//!
//! The store holds:
//! - Open trades with their journal fields
//! - A single row of calculator settings (JSON)

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::debug;

use crate::models::{Direction, Trade};
use crate::trading::{parse_input, CalculatorSettings};

/// Database connection pool.
pub struct Database {
    pool: SqlitePool,
}

/// Open trade row as stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredTrade {
    pub trade_id: String,
    pub symbol: String,
    pub direction: String,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit_price: Option<f64>,
    pub position_size: f64,
    pub risk_amount: f64,
    pub risk_percentage: f64,
    pub leverage: f64,
    pub fee: f64,
    pub system_name: String,
    pub entry_pic_url: String,
    pub entry_notes: String,
    pub mid_trade_notes: String,
    pub exit_notes: String,
    pub exit_pic_url: String,
    pub order_id: Option<String>,
    pub opened_at: String,
}

impl TryFrom<StoredTrade> for Trade {
    type Error = anyhow::Error;

    fn try_from(row: StoredTrade) -> Result<Self> {
        let direction = Direction::from_str(&row.direction)
            .with_context(|| format!("Unknown direction for trade {}: {}", row.trade_id, row.direction))?;
        let timestamp = DateTime::parse_from_rfc3339(&row.opened_at)
            .with_context(|| format!("Invalid timestamp for trade {}", row.trade_id))?
            .with_timezone(&Utc);

        Ok(Trade {
            trade_id: row.trade_id,
            symbol: row.symbol,
            direction,
            entry_price: row.entry_price,
            stop_loss: row.stop_loss,
            take_profit_price: row.take_profit_price,
            position_size: row.position_size,
            risk_amount: row.risk_amount,
            risk_percentage: row.risk_percentage,
            leverage: row.leverage,
            fee: row.fee,
            system_name: row.system_name,
            entry_pic_url: row.entry_pic_url,
            entry_notes: row.entry_notes,
            mid_trade_notes: row.mid_trade_notes,
            exit_notes: row.exit_notes,
            exit_pic_url: row.exit_pic_url,
            order_id: row.order_id,
            timestamp,
        })
    }
}

/// Journal edits for an open trade. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct JournalUpdate {
    pub system_name: Option<String>,
    pub entry_pic_url: Option<String>,
    pub entry_notes: Option<String>,
    pub mid_trade_notes: Option<String>,
    pub exit_notes: Option<String>,
    pub exit_pic_url: Option<String>,
    /// Raw take profit as typed; blank keeps the current value
    pub take_profit: Option<String>,
}

impl JournalUpdate {
    pub fn is_empty(&self) -> bool {
        self.system_name.is_none()
            && self.entry_pic_url.is_none()
            && self.entry_notes.is_none()
            && self.mid_trade_notes.is_none()
            && self.exit_notes.is_none()
            && self.exit_pic_url.is_none()
            && self.take_profit.is_none()
    }

    /// Apply the edits to `trade`.
    pub fn apply_to(&self, trade: &mut Trade) -> Result<()> {
        if let Some(raw) = self.take_profit.as_deref().filter(|raw| !raw.trim().is_empty()) {
            let price = parse_input("take profit", raw)?;
            trade.take_profit_price = Some(price);
        }

        let fields = [
            (&self.system_name, &mut trade.system_name),
            (&self.entry_pic_url, &mut trade.entry_pic_url),
            (&self.entry_notes, &mut trade.entry_notes),
            (&self.mid_trade_notes, &mut trade.mid_trade_notes),
            (&self.exit_notes, &mut trade.exit_notes),
            (&self.exit_pic_url, &mut trade.exit_pic_url),
        ];
        for (update, field) in fields {
            if let Some(value) = update {
                *field = value.clone();
            }
        }

        Ok(())
    }
}

impl Database {
    /// Create a new database connection.
    pub async fn new(database_url: &str) -> Result<Self> {
        // Each in-memory connection is its own database
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run all database migrations.
    async fn run_migrations(&self) -> Result<()> {
        // Open trades
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS open_trades (
                trade_id TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                direction TEXT NOT NULL,
                entry_price REAL NOT NULL,
                stop_loss REAL NOT NULL,
                take_profit_price REAL,
                position_size REAL NOT NULL,
                risk_amount REAL NOT NULL,
                risk_percentage REAL NOT NULL,
                leverage REAL NOT NULL,
                fee REAL NOT NULL DEFAULT 0,
                system_name TEXT NOT NULL DEFAULT '',
                entry_pic_url TEXT NOT NULL DEFAULT '',
                entry_notes TEXT NOT NULL DEFAULT '',
                mid_trade_notes TEXT NOT NULL DEFAULT '',
                exit_notes TEXT NOT NULL DEFAULT '',
                exit_pic_url TEXT NOT NULL DEFAULT '',
                order_id TEXT,
                opened_at TEXT NOT NULL,
                CHECK (entry_price <> stop_loss)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Calculator settings (single row)
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS calculator_settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                settings_json TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_open_trades_opened ON open_trades(opened_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ==================== Open Trades ====================

    /// Get all open trades, oldest first.
    pub async fn load_open_trades(&self) -> Result<Vec<Trade>> {
        let rows = sqlx::query_as::<_, StoredTrade>(
            "SELECT * FROM open_trades ORDER BY opened_at, trade_id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch open trades")?;

        rows.into_iter().map(Trade::try_from).collect()
    }

    /// Replace the stored open trades with `trades`.
    pub async fn save_open_trades(&self, trades: &[Trade]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM open_trades")
            .execute(&mut *tx)
            .await?;
        for trade in trades {
            insert_trade_query(trade).execute(&mut *tx).await?;
        }

        tx.commit().await.context("Failed to save open trades")?;
        debug!(count = trades.len(), "Saved open trades");
        Ok(())
    }

    /// Add a single open trade.
    pub async fn insert_trade(&self, trade: &Trade) -> Result<()> {
        insert_trade_query(trade)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to insert trade {}", trade.trade_id))?;

        Ok(())
    }

    /// Remove a trade after it has been closed. Returns whether it existed.
    pub async fn remove_trade(&self, trade_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM open_trades WHERE trade_id = ?")
            .bind(trade_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn find_trade(&self, trade_id: &str) -> Result<Option<Trade>> {
        let row = sqlx::query_as::<_, StoredTrade>("SELECT * FROM open_trades WHERE trade_id = ?")
            .bind(trade_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Trade::try_from).transpose()
    }

    /// Apply journal edits to an open trade and return the updated trade.
    pub async fn update_journal(&self, trade_id: &str, update: &JournalUpdate) -> Result<Trade> {
        let mut trade = self
            .find_trade(trade_id)
            .await?
            .with_context(|| format!("Trade not found: {}", trade_id))?;

        update.apply_to(&mut trade)?;

        sqlx::query(
            r#"
            UPDATE open_trades SET
                take_profit_price = ?,
                system_name = ?,
                entry_pic_url = ?,
                entry_notes = ?,
                mid_trade_notes = ?,
                exit_notes = ?,
                exit_pic_url = ?
            WHERE trade_id = ?
            "#,
        )
        .bind(trade.take_profit_price)
        .bind(&trade.system_name)
        .bind(&trade.entry_pic_url)
        .bind(&trade.entry_notes)
        .bind(&trade.mid_trade_notes)
        .bind(&trade.exit_notes)
        .bind(&trade.exit_pic_url)
        .bind(trade_id)
        .execute(&self.pool)
        .await?;

        Ok(trade)
    }

    // ==================== Settings ====================

    /// Get saved calculator settings, or the defaults if none were saved.
    pub async fn load_settings(&self) -> Result<CalculatorSettings> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT settings_json FROM calculator_settings WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((json,)) => serde_json::from_str(&json).context("Failed to parse stored settings"),
            None => Ok(CalculatorSettings::default()),
        }
    }

    pub async fn save_settings(&self, settings: &CalculatorSettings) -> Result<()> {
        let json = serde_json::to_string(settings)?;

        sqlx::query(
            r#"
            INSERT INTO calculator_settings (id, settings_json, updated_at)
            VALUES (1, ?, datetime('now'))
            ON CONFLICT(id) DO UPDATE SET
                settings_json = excluded.settings_json,
                updated_at = datetime('now')
            "#,
        )
        .bind(json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn insert_trade_query(trade: &Trade) -> sqlx::query::Query<'_, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'_>> {
    sqlx::query(
        r#"
        INSERT INTO open_trades (
            trade_id, symbol, direction, entry_price, stop_loss, take_profit_price,
            position_size, risk_amount, risk_percentage, leverage, fee,
            system_name, entry_pic_url, entry_notes, mid_trade_notes, exit_notes, exit_pic_url,
            order_id, opened_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&trade.trade_id)
    .bind(&trade.symbol)
    .bind(trade.direction.as_str())
    .bind(trade.entry_price)
    .bind(trade.stop_loss)
    .bind(trade.take_profit_price)
    .bind(trade.position_size.abs())
    .bind(trade.risk_amount)
    .bind(trade.risk_percentage)
    .bind(trade.leverage.abs())
    .bind(trade.fee)
    .bind(&trade.system_name)
    .bind(&trade.entry_pic_url)
    .bind(&trade.entry_notes)
    .bind(&trade.mid_trade_notes)
    .bind(&trade.exit_notes)
    .bind(&trade.exit_pic_url)
    .bind(&trade.order_id)
    .bind(trade.timestamp.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeeType, SizingRequest};
    use crate::trading::size_position;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    async fn memory_db() -> Database {
        Database::new("sqlite::memory:").await.unwrap()
    }

    fn make_trade(id: &str, entry: f64, stop: f64, minute: u32) -> Trade {
        let request = SizingRequest::new(entry, stop, 20.0, 1000.0, 0.00055, 0.00055);
        let result = size_position(&request).unwrap();
        let mut trade = Trade::open(id.to_string(), "BTCUSDT".to_string(), &request, &result);
        trade.timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap();
        trade
    }

    #[tokio::test]
    async fn test_trade_round_trip() {
        let db = memory_db().await;
        let mut trade = make_trade("t-1", 100.0, 105.0, 0);
        trade.take_profit_price = Some(90.0);
        trade.system_name = "breakout".to_string();
        trade.order_id = Some("ord-1".to_string());

        db.insert_trade(&trade).await.unwrap();
        let loaded = db.find_trade("t-1").await.unwrap().unwrap();

        assert_eq!(loaded.direction, Direction::Short);
        assert_eq!(loaded.entry_price, 100.0);
        assert_eq!(loaded.position_size, trade.position_size);
        assert_eq!(loaded.take_profit_price, Some(90.0));
        assert_eq!(loaded.system_name, "breakout");
        assert_eq!(loaded.order_id.as_deref(), Some("ord-1"));
        assert_eq!(loaded.timestamp, trade.timestamp);

        assert!(db.find_trade("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_open_trades_replaces_all() {
        let db = memory_db().await;
        db.insert_trade(&make_trade("old", 50.0, 45.0, 0)).await.unwrap();

        let trades = vec![make_trade("b", 200.0, 190.0, 2), make_trade("a", 100.0, 95.0, 1)];
        db.save_open_trades(&trades).await.unwrap();

        let loaded = db.load_open_trades().await.unwrap();
        let ids: Vec<_> = loaded.iter().map(|t| t.trade_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        db.save_open_trades(&[]).await.unwrap();
        assert!(db.load_open_trades().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_trade() {
        let db = memory_db().await;
        db.insert_trade(&make_trade("t-1", 100.0, 95.0, 0)).await.unwrap();

        assert!(db.remove_trade("t-1").await.unwrap());
        assert!(!db.remove_trade("t-1").await.unwrap());
        assert!(db.load_open_trades().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_journal() {
        let db = memory_db().await;
        let mut trade = make_trade("t-1", 100.0, 95.0, 0);
        trade.take_profit_price = Some(110.0);
        trade.entry_notes = "initial".to_string();
        db.insert_trade(&trade).await.unwrap();

        let update = JournalUpdate {
            mid_trade_notes: Some("moved stop".to_string()),
            exit_pic_url: Some("https://example.com/exit.png".to_string()),
            take_profit: Some(" ".to_string()),
            ..Default::default()
        };
        let updated = db.update_journal("t-1", &update).await.unwrap();

        assert_eq!(updated.mid_trade_notes, "moved stop");
        assert_eq!(updated.entry_notes, "initial");
        // Blank take profit keeps the current value
        assert_eq!(updated.take_profit_price, Some(110.0));

        let update = JournalUpdate {
            take_profit: Some("120.5".to_string()),
            ..Default::default()
        };
        db.update_journal("t-1", &update).await.unwrap();
        let stored = db.find_trade("t-1").await.unwrap().unwrap();
        assert_eq!(stored.take_profit_price, Some(120.5));
        assert_eq!(stored.exit_pic_url, "https://example.com/exit.png");

        let bad = JournalUpdate {
            take_profit: Some("abc".to_string()),
            ..Default::default()
        };
        assert!(db.update_journal("t-1", &bad).await.is_err());
        assert!(db.update_journal("missing", &JournalUpdate::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_settings_default_and_round_trip() {
        let db = memory_db().await;
        assert_eq!(db.load_settings().await.unwrap(), CalculatorSettings::default());

        let mut settings = CalculatorSettings::default();
        settings.risk_amount = dec!(35.5);
        settings.exit_fee = FeeType::Maker;
        settings.test_mode = true;
        db.save_settings(&settings).await.unwrap();

        settings.decimal_places = 2;
        db.save_settings(&settings).await.unwrap();

        assert_eq!(db.load_settings().await.unwrap(), settings);
    }

    #[test]
    fn test_journal_update_is_empty() {
        assert!(JournalUpdate::default().is_empty());
        let update = JournalUpdate {
            exit_notes: Some(String::new()),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
