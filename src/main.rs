//! Leveraged-trading risk calculator
//!
//! Sizes positions so the loss at the stop, fees included, matches a risk
//! budget, estimates liquidation, projects compounding growth and tracks
//! combined risk across open trades.

mod api;
mod db;
mod models;
mod trading;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::api::{CloseRequest, ExecutionClient, ExecutionConfig, TradeTicket};
use crate::db::{Database, JournalUpdate};
use crate::models::{round_for_display, Direction, Trade, MONEY_DECIMAL_PLACES};
use crate::trading::{
    combined_risk_profile, compounded_final_capital, estimate_liquidation, has_overlap,
    overlapping_trades, parse_fee_type, parse_input, project, project_r_multiple,
    size_compound_position, size_position, CalcResult, CalculatorSettings, CapitalFloor,
    CompoundingDefaults, CompoundingParameters, GrowthTrajectory, InputError,
    LiquidationEstimate, RMultipleParameters, SizingForm, MAX_COMBINED_RISK_PERCENT,
};

/// Position sizing and risk calculator CLI.
#[derive(Parser)]
#[command(name = "riskcalc")]
#[command(about = "Fee-aware position sizing and risk tracking for leveraged trades", long_about = None)]
struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "sqlite:./riskcalc.db?mode=rwc")]
    database: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the stored sizing defaults.
#[derive(clap::Args)]
struct SizingArgs {
    /// Risk amount (defaults to the saved setting)
    #[arg(short, long)]
    risk: Option<String>,

    /// Available capital (defaults to the saved setting)
    #[arg(short, long)]
    capital: Option<String>,

    /// Taker fee in percent
    #[arg(long)]
    taker_fee: Option<String>,

    /// Maker fee in percent
    #[arg(long)]
    maker_fee: Option<String>,

    /// Entry fee type (taker, maker, none)
    #[arg(long)]
    entry_fee: Option<String>,

    /// Exit fee type (taker, maker, none)
    #[arg(long)]
    exit_fee: Option<String>,
}

impl SizingArgs {
    fn form(&self, settings: &CalculatorSettings, entry: &str, stop: &str) -> Result<SizingForm> {
        let mut form = settings.sizing_form(entry, stop);
        if let Some(risk) = &self.risk {
            form.risk_amount = risk.clone();
        }
        if let Some(capital) = &self.capital {
            form.available_capital = capital.clone();
        }
        if let Some(fee) = &self.taker_fee {
            form.taker_fee_pct = fee.clone();
        }
        if let Some(fee) = &self.maker_fee {
            form.maker_fee_pct = fee.clone();
        }
        if let Some(fee) = &self.entry_fee {
            form.entry_fee = parse_fee_type(fee)?;
        }
        if let Some(fee) = &self.exit_fee {
            form.exit_fee = parse_fee_type(fee)?;
        }
        Ok(form)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Size a position from entry and stop
    Size {
        /// Entry price
        entry: String,

        /// Stop loss price
        stop: String,

        #[command(flatten)]
        sizing: SizingArgs,

        /// Decimal places for sizes (defaults to the saved setting)
        #[arg(long)]
        decimals: Option<u32>,
    },

    /// Estimate the liquidation price of a leveraged position
    Liquidation {
        /// Entry price
        entry: f64,

        /// Leverage
        leverage: f64,

        /// Position is short
        #[arg(long)]
        short: bool,

        /// Stop loss to compare against
        #[arg(long)]
        stop: Option<f64>,
    },

    /// Project compounding growth over a number of trades
    Compound {
        /// Initial capital
        #[arg(short, long)]
        capital: Option<f64>,

        /// Profit per winning trade in percent
        #[arg(short, long)]
        profit: Option<f64>,

        /// Number of trades
        #[arg(short = 'n', long)]
        trades: Option<u32>,

        /// Win rate in percent
        #[arg(short, long)]
        win_rate: Option<f64>,

        /// Fee drag per trade in percent (defaults to the saved entry fee)
        #[arg(long)]
        fee: Option<f64>,

        /// Capital floor (zero, unbounded)
        #[arg(long, default_value = "zero")]
        floor: String,

        /// Print only the final capital
        #[arg(long)]
        summary: bool,
    },

    /// Project growth when each trade risks a share of capital for an R multiple
    RMultiple {
        /// Initial capital
        #[arg(short, long, default_value = "1000")]
        capital: f64,

        /// Percent of capital risked per trade
        #[arg(short, long, default_value = "1")]
        risk: f64,

        /// Reward of a winner in units of risk
        #[arg(short = 'R', long, default_value = "2")]
        reward: f64,

        /// Number of trades
        #[arg(short = 'n', long, default_value = "10")]
        trades: u32,

        /// Win rate in percent
        #[arg(short, long, default_value = "50")]
        win_rate: f64,

        /// Fee drag per trade in percent (defaults to the saved entry fee)
        #[arg(long)]
        fee: Option<f64>,

        /// Capital floor (zero, unbounded)
        #[arg(long, default_value = "zero")]
        floor: String,
    },

    /// Check a stop range against the open trades
    Overlap {
        /// Entry price
        entry: f64,

        /// Stop loss price
        stop: f64,
    },

    /// Replace the open trades with those in a JSON file
    Import {
        /// JSON array of trades
        file: String,
    },

    /// Show combined risk of the open trades
    Risk {
        /// Capital to measure against (defaults to the saved setting)
        #[arg(short, long)]
        capital: Option<f64>,
    },

    /// Size, execute and record a new trade
    Open {
        /// Instrument symbol (e.g. BTCUSDT)
        symbol: String,

        /// Entry price
        entry: String,

        /// Stop loss price
        stop: String,

        #[command(flatten)]
        sizing: SizingArgs,

        /// Take profit price
        #[arg(long)]
        take_profit: Option<String>,

        /// Unrealized profit to add to capital
        #[arg(long)]
        unrealized_profit: Option<f64>,

        /// Risk multiplier in (0, 1] for overlapping stops
        #[arg(long)]
        overlap_adjustment: Option<f64>,

        /// Trading system name
        #[arg(long, default_value = "")]
        system: String,

        /// Entry notes
        #[arg(long, default_value = "")]
        notes: String,

        /// Entry screenshot URL
        #[arg(long, default_value = "")]
        pic: String,

        /// Execute against the exchange testnet (overrides the saved setting)
        #[arg(long)]
        test_mode: bool,

        /// Record locally without executing
        #[arg(long)]
        dry_run: bool,
    },

    /// Close an open trade
    Close {
        /// Trade id
        trade_id: String,

        /// Exit price
        #[arg(long)]
        exit_price: Option<f64>,

        #[command(flatten)]
        journal: JournalArgs,

        /// Remove locally without calling the execution service
        #[arg(long)]
        dry_run: bool,
    },

    /// Edit the journal of an open trade
    Journal {
        /// Trade id
        trade_id: String,

        #[command(flatten)]
        journal: JournalArgs,
    },

    /// List open trades
    Trades,

    /// Show calculator settings
    Config,

    /// Change a calculator setting
    Set {
        /// Setting name (taker_fee, maker_fee, risk_amount, available_capital,
        /// decimal_places, entry_fee, exit_fee, test_mode)
        key: String,

        /// New value
        value: String,
    },
}

#[derive(clap::Args)]
struct JournalArgs {
    #[arg(long)]
    system: Option<String>,

    #[arg(long)]
    entry_pic: Option<String>,

    #[arg(long)]
    entry_notes: Option<String>,

    #[arg(long)]
    mid_notes: Option<String>,

    #[arg(long)]
    exit_notes: Option<String>,

    #[arg(long)]
    exit_pic: Option<String>,

    #[arg(long)]
    take_profit: Option<String>,
}

impl From<JournalArgs> for JournalUpdate {
    fn from(args: JournalArgs) -> Self {
        Self {
            system_name: args.system,
            entry_pic_url: args.entry_pic,
            entry_notes: args.entry_notes,
            mid_trade_notes: args.mid_notes,
            exit_notes: args.exit_notes,
            exit_pic_url: args.exit_pic,
            take_profit: args.take_profit,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let db = Database::new(&cli.database).await?;
    let mut settings = db.load_settings().await?;

    match cli.command {
        Commands::Size {
            entry,
            stop,
            sizing,
            decimals,
        } => {
            let form = sizing.form(&settings, &entry, &stop)?;
            let decimals = decimals.unwrap_or_else(|| settings.size_decimal_places());

            match form.to_request().and_then(|request| size_position(&request)) {
                Ok(result) => println!("\n{}", result.display(decimals)),
                Err(e) => report_input_error(&e),
            }
        }

        Commands::Liquidation {
            entry,
            leverage,
            short,
            stop,
        } => {
            let direction = if short { Direction::Short } else { Direction::Long };

            let estimate = match stop {
                Some(stop) => LiquidationEstimate::for_stop(entry, leverage, stop, direction),
                None => estimate_liquidation(entry, leverage, direction).map(|price| {
                    LiquidationEstimate {
                        price,
                        is_risky: false,
                    }
                }),
            };

            match estimate {
                Ok(estimate) => {
                    println!(
                        "Liquidation ({}): {}",
                        direction.as_str(),
                        round_for_display(estimate.price, MONEY_DECIMAL_PLACES)
                    );
                    if estimate.is_risky {
                        println!("Warning: Liquidation price will be reached before stop loss!");
                    }
                }
                Err(e) => report_input_error(&e),
            }
        }

        Commands::Compound {
            capital,
            profit,
            trades,
            win_rate,
            fee,
            floor,
            summary,
        } => {
            let defaults = CompoundingDefaults::default();
            let floor: CapitalFloor = floor.parse().map_err(anyhow::Error::msg)?;
            let params = CompoundingParameters::new(
                capital.unwrap_or(defaults.initial_capital),
                profit.unwrap_or(defaults.profit_percent_per_trade),
                trades.unwrap_or(defaults.number_of_trades),
                win_rate.unwrap_or(defaults.win_rate_percent),
                fee.unwrap_or_else(|| settings.entry_fee_percent()),
            )
            .with_floor(floor);

            println!(
                "\nExpected growth per trade: {}%",
                round_for_display(params.effective_growth_percent(), 4)
            );
            if summary {
                match compounded_final_capital(&params) {
                    Ok(capital) => println!(
                        "Final Capital: {}",
                        round_for_display(capital, MONEY_DECIMAL_PLACES)
                    ),
                    Err(e) => report_input_error(&e),
                }
            } else {
                print_trajectory(project(&params));
            }
        }

        Commands::RMultiple {
            capital,
            risk,
            reward,
            trades,
            win_rate,
            fee,
            floor,
        } => {
            let params = RMultipleParameters {
                initial_capital: capital,
                risk_percent_per_trade: risk,
                reward_multiple: reward,
                number_of_trades: trades,
                win_rate_percent: win_rate,
                fee_rate_percent: fee.unwrap_or_else(|| settings.entry_fee_percent()),
                floor: floor.parse().map_err(anyhow::Error::msg)?,
            };

            println!(
                "\nExpected growth per trade: {}%",
                round_for_display(params.effective_growth_percent(), 4)
            );
            print_trajectory(project_r_multiple(&params));
        }

        Commands::Overlap { entry, stop } => {
            let open_trades = db.load_open_trades().await?;
            if !has_overlap(&open_trades, entry, stop) {
                println!("No overlap with {} open trade(s).", open_trades.len());
            } else {
                let overlapping = overlapping_trades(&open_trades, entry, stop);
                println!("Stop range overlaps {} open trade(s):", overlapping.len());
                for trade_id in overlapping {
                    println!("  {}", trade_id);
                }
            }
        }

        Commands::Import { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file))?;
            let trades: Vec<Trade> = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse trades from {}", file))?;
            db.save_open_trades(&trades).await?;
            println!("Imported {} open trade(s) from {}", trades.len(), file);
        }

        Commands::Risk { capital } => {
            let open_trades = db.load_open_trades().await?;
            let capital = capital.unwrap_or_else(|| settings.capital());

            match combined_risk_profile(&open_trades, capital) {
                Ok(profile) => {
                    println!("\n{:<38} {:>10}", "TRADE", "RISK %");
                    println!("{}", "-".repeat(49));
                    for risk in &profile.risks_per_trade {
                        println!(
                            "{:<38} {:>9}%",
                            truncate(&risk.trade_id, 36),
                            round_for_display(risk.risk_percentage, MONEY_DECIMAL_PLACES)
                        );
                    }
                    println!("{}", "-".repeat(49));
                    println!(
                        "{:<38} {:>9}%",
                        "TOTAL",
                        round_for_display(profile.total_risk_percentage, MONEY_DECIMAL_PLACES)
                    );
                    if profile.is_exceeding_risk_limit {
                        println!(
                            "\nWarning: Combined risk exceeds {}% of capital!",
                            MAX_COMBINED_RISK_PERCENT
                        );
                    } else {
                        println!(
                            "{:<38} {:>9}%",
                            "HEADROOM",
                            round_for_display(profile.remaining_headroom(), MONEY_DECIMAL_PLACES)
                        );
                    }
                }
                Err(e) => report_input_error(&e),
            }
        }

        Commands::Open {
            symbol,
            entry,
            stop,
            sizing,
            take_profit,
            unrealized_profit,
            overlap_adjustment,
            system,
            notes,
            pic,
            test_mode,
            dry_run,
        } => {
            let form = sizing.form(&settings, &entry, &stop)?;
            let request = form.to_request()?;
            let take_profit = match take_profit.as_deref().map(str::trim) {
                Some(raw) if !raw.is_empty() => Some(parse_input("take profit", raw)?),
                _ => None,
            };

            let open_trades = db.load_open_trades().await?;
            let sizing = size_compound_position(
                &request,
                unrealized_profit,
                overlap_adjustment,
                &open_trades,
            )?;
            let result = sizing.result;

            println!("\n{}", result.display(settings.size_decimal_places()));
            if sizing.has_overlapping_stops {
                println!(
                    "Warning: Stop range overlaps open trade(s): {}",
                    overlapping_trades(&open_trades, request.entry_price, request.stop_loss)
                        .join(", ")
                );
            }
            if sizing.exceeds_risk_limit() {
                println!(
                    "Warning: Open trades already exceed {}% combined risk!",
                    MAX_COMBINED_RISK_PERCENT
                );
            }

            let (trade_id, order_id) = if dry_run {
                (uuid::Uuid::new_v4().to_string(), None)
            } else {
                let config = ExecutionConfig::from_env()?;
                let client = ExecutionClient::new(&config.base_url)?;
                let ticket = TradeTicket::new(
                    config.user_id,
                    config.api_key_id,
                    symbol.clone(),
                    &request,
                    &result,
                    form.entry_fee,
                    test_mode || settings.test_mode,
                )
                .with_take_profit(take_profit)
                .with_journal(&system, &notes, &pic);

                let receipt = client.execute_trade(&ticket).await?;
                (receipt.trade_id, receipt.order_id)
            };

            let mut trade = Trade::open(trade_id, symbol, &request, &result);
            trade.take_profit_price = take_profit;
            trade.system_name = system;
            trade.entry_notes = notes;
            trade.entry_pic_url = pic;
            trade.order_id = order_id;
            db.insert_trade(&trade).await?;

            info!(trade_id = %trade.trade_id, dry_run = dry_run, "Trade opened");
            println!("\nOpened trade {}", trade.trade_id);
        }

        Commands::Close {
            trade_id,
            exit_price,
            journal,
            dry_run,
        } => {
            let mut trade = db
                .find_trade(&trade_id)
                .await?
                .with_context(|| format!("Trade not found: {}", trade_id))?;
            JournalUpdate::from(journal).apply_to(&mut trade)?;

            if !dry_run {
                let config = ExecutionConfig::from_env()?;
                let client = ExecutionClient::new(&config.base_url)?;
                let request = CloseRequest {
                    notes: trade.exit_notes.clone(),
                    exit_pic_url: trade.exit_pic_url.clone(),
                    entry_notes: trade.entry_notes.clone(),
                    mid_trade_notes: trade.mid_trade_notes.clone(),
                    take_profit: trade.take_profit_price,
                    exit_price,
                };
                client.close_trade(&trade_id, &request).await?;
            }

            db.remove_trade(&trade_id).await?;
            if let Some(exit) = exit_price {
                println!(
                    "Closed trade {} (P&L before exit fee: {})",
                    trade_id,
                    round_for_display(trade.pnl_at(exit), MONEY_DECIMAL_PLACES)
                );
            } else {
                println!("Closed trade {}", trade_id);
            }
        }

        Commands::Journal { trade_id, journal } => {
            let update = JournalUpdate::from(journal);
            if update.is_empty() {
                println!("Nothing to update.");
                return Ok(());
            }

            let trade = db.update_journal(&trade_id, &update).await?;
            println!("Updated journal for {}", trade.trade_id);
        }

        Commands::Trades => {
            let trades = db.load_open_trades().await?;

            if trades.is_empty() {
                println!("No open trades. Use 'riskcalc open' to add one.");
                return Ok(());
            }

            println!(
                "\n{:<14} {:<10} {:<6} {:>12} {:>12} {:>12} {:>8} {:>8}",
                "TRADE", "SYMBOL", "SIDE", "ENTRY", "STOP", "SIZE", "RISK", "LEV"
            );
            println!("{}", "-".repeat(90));

            for trade in &trades {
                println!(
                    "{:<14} {:<10} {:<6} {:>12} {:>12} {:>12} {:>7}% {:>7}x",
                    truncate(&trade.trade_id, 12),
                    truncate(&trade.symbol, 10),
                    trade.direction.as_str(),
                    trade.entry_price,
                    trade.stop_loss,
                    round_for_display(trade.signed_position_size(), settings.size_decimal_places()),
                    round_for_display(trade.risk_percentage, MONEY_DECIMAL_PLACES),
                    round_for_display(trade.leverage, MONEY_DECIMAL_PLACES)
                );
            }
        }

        Commands::Config => {
            println!("\n=== Calculator Settings ===\n");
            println!("Fees:");
            println!("  Taker Fee:            {}%", settings.taker_fee);
            println!("  Maker Fee:            {}%", settings.maker_fee);
            println!("  Entry Fee Type:       {}", settings.entry_fee.as_str());
            println!("  Exit Fee Type:        {}", settings.exit_fee.as_str());

            println!("\nSizing:");
            println!("  Risk Amount:          {}", settings.risk_amount);
            println!("  Available Capital:    {}", settings.available_capital);
            println!("  Decimal Places:       {}", settings.decimal_places);

            println!("\nExecution:");
            println!("  Test Mode:            {}", settings.test_mode);
            println!("  Max Combined Risk:    {}%", MAX_COMBINED_RISK_PERCENT);
        }

        Commands::Set { key, value } => {
            settings.set(&key, &value)?;
            db.save_settings(&settings).await?;
            println!("Set {} = {}", key, value);
        }
    }

    Ok(())
}

/// Clear the output for incomplete input, warn for anything else.
fn report_input_error(error: &InputError) {
    if error.should_warn() {
        warn!(error = %error, "Cannot calculate");
        println!("Warning: {}", error);
    } else {
        println!("Incomplete input: {}", error);
    }
}

fn print_trajectory(trajectory: CalcResult<GrowthTrajectory>) {
    let trajectory = match trajectory {
        Ok(trajectory) => trajectory,
        Err(e) => return report_input_error(&e),
    };

    println!("\n{:>6} {:>16} {:>12}", "TRADE", "CAPITAL", "GROWTH");
    println!("{}", "-".repeat(36));
    for (trade, capital, growth) in trajectory.rows() {
        println!(
            "{:>6} {:>16} {:>11}%",
            trade,
            round_for_display(capital, MONEY_DECIMAL_PLACES),
            round_for_display(growth, MONEY_DECIMAL_PLACES)
        );
    }
    println!(
        "\nFinal Capital: {}  (Total Growth: {}%)",
        round_for_display(trajectory.final_capital(), MONEY_DECIMAL_PLACES),
        round_for_display(trajectory.total_growth_percent(), MONEY_DECIMAL_PLACES)
    );
}

/// Truncate a string with ellipsis if too long.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
