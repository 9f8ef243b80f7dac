//! Racing Edge
//!
//! Command line front end for scoring, staking and verification.

use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use racing_edge::{
    backtest::{replay_events_from_log, Backtester, ReplayEvent},
    config::Config,
    engine::EventScorer,
    ml::{CalibrationHandle, CalibrationMethod, CalibrationModel},
    staking::BetSizer,
    storage::{EntryFilter, Store},
    types::{EventCard, FinishingPositions, OddsSnapshot, StopFlag},
    verification::{PredictionLogger, ReportFormat, Verifier},
};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "racing-edge")]
#[command(about = "Race outcome prediction, staking and accuracy verification")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Score an event card (JSON) and print the ranked predictions
    Predict {
        /// Event card file
        card: PathBuf,
        /// Also write the predictions to the prediction log
        #[arg(long)]
        log: bool,
    },
    /// Score an event card and read it against an odds history (JSON list of snapshots)
    Market {
        card: PathBuf,
        history: PathBuf,
    },
    /// Refit the calibration model on validated history
    Fit {
        /// power_law or logit_shift; defaults to the configured method
        #[arg(short, long)]
        method: Option<String>,
        /// Only use events from the last N days
        #[arg(short, long)]
        days: Option<i64>,
    },
    /// Size a single bet
    Stake {
        /// Win probability
        probability: f64,
        /// Decimal odds
        odds: f64,
        /// Bankroll; defaults to the configured bankroll
        #[arg(short, long)]
        bankroll: Option<Decimal>,
        /// Kelly fraction; defaults to the configured fraction
        #[arg(short, long)]
        fraction: Option<f64>,
    },
    /// Build a verification report
    Verify {
        /// Model version; defaults to the configured version
        #[arg(short, long)]
        version: Option<String>,
        #[arg(short, long, default_value = "30")]
        days: i64,
        /// text or json
        #[arg(short, long, default_value = "text")]
        format: String,
        /// Compare against this version instead
        #[arg(long)]
        compare: Option<String>,
    },
    /// Model health over the configured window
    Health {
        #[arg(short, long)]
        version: Option<String>,
    },
    /// Accuracy drift over recent event dates
    Drift {
        #[arg(short, long)]
        version: Option<String>,
    },
    /// Record finishing positions (JSON entrant → position) for an event
    Validate {
        event_id: String,
        positions: PathBuf,
    },
    /// Replay settled events through value selection and staking
    Backtest {
        /// Replay file (JSON list of events); defaults to the prediction log
        #[arg(long)]
        events: Option<PathBuf>,
        #[arg(short, long)]
        version: Option<String>,
        #[arg(long, default_value = "1")]
        max_bets: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Predict { card, log } => predict(config, &card, log).await,
        Commands::Market { card, history } => market(config, &card, &history).await,
        Commands::Fit { method, days } => fit(config, method, days).await,
        Commands::Stake {
            probability,
            odds,
            bankroll,
            fraction,
        } => stake(config, probability, odds, bankroll, fraction),
        Commands::Verify {
            version,
            days,
            format,
            compare,
        } => verify(config, version, days, &format, compare).await,
        Commands::Health { version } => health(config, version).await,
        Commands::Drift { version } => drift(config, version).await,
        Commands::Validate { event_id, positions } => validate(config, &event_id, &positions).await,
        Commands::Backtest {
            events,
            version,
            max_bets,
        } => backtest(config, events, version, max_bets).await,
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&raw)?)
}

async fn open_calibration(config: &Config) -> anyhow::Result<Arc<CalibrationHandle>> {
    let handle = CalibrationHandle::open(
        config.calibration.model_path.clone(),
        CalibrationModel::from_config(&config.calibration),
    )
    .await?;
    Ok(Arc::new(handle))
}

async fn predict(config: Config, card_path: &Path, log: bool) -> anyhow::Result<()> {
    let card: EventCard = read_json(card_path).await?;
    let scorer = EventScorer::new(&config, open_calibration(&config).await?)?;
    let prediction = scorer.score(&card);

    if log {
        let store = Store::connect(&config.database).await?;
        let logger = PredictionLogger::new(store, config.verification.model_version.clone());
        let ids = logger.log_event(&prediction).await?;
        tracing::info!(logged = ids.len(), "Predictions written to the log");
    }

    println!("{}", serde_json::to_string_pretty(&prediction)?);
    Ok(())
}

async fn market(config: Config, card_path: &Path, history_path: &Path) -> anyhow::Result<()> {
    let card: EventCard = read_json(card_path).await?;
    let history: Vec<OddsSnapshot> = read_json(history_path).await?;
    let scorer = EventScorer::new(&config, open_calibration(&config).await?)?;
    let prediction = scorer.score(&card);
    let report = scorer.market(&card, &prediction, &history);

    println!("\n📈 Market for {}\n", report.event_id);
    println!(
        "Consensus: {:?}  Favourites: {:.0}%  Strength: {:.2}",
        report.consensus.bias,
        report.consensus.favourite_concentration * 100.0,
        report.consensus.strength
    );
    for e in &report.entrants {
        let shift = e
            .value_shift
            .as_ref()
            .map(|v| format!("{:?} ({:+.1} pts)", v.trend, v.change))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<20} {:<10} {:>+6.1}%  smart money {:.2}  value {}",
            e.entrant_id,
            format!("{:?}", e.movement.direction),
            e.movement.magnitude * 100.0,
            e.movement.smart_money,
            shift
        );
    }
    if !report.contrarian.is_empty() {
        println!("\nContrarian plays:");
        for play in &report.contrarian {
            println!(
                "  {:<20} model {:>5.1}%  market {:>5.1}%  EV {:+.2}",
                play.entrant_id,
                play.model_probability * 100.0,
                play.implied_probability * 100.0,
                play.expected_value
            );
        }
    }
    Ok(())
}

async fn fit(config: Config, method: Option<String>, days: Option<i64>) -> anyhow::Result<()> {
    let method = match method {
        Some(m) => m.parse::<CalibrationMethod>()?,
        None => config.calibration.method,
    };

    let store = Store::connect(&config.database).await?;
    let mut filter =
        EntryFilter::validated().model_version(config.verification.model_version.clone());
    if let Some(days) = days {
        let today = Utc::now().date_naive();
        filter = filter.between(today - Duration::days(days), today);
    }
    let history = store.historical_events(&filter).await?;
    tracing::info!(events = history.len(), method = %method, "Fitting calibration");

    let handle = open_calibration(&config).await?;
    let model = handle.refit(method, Arc::new(history)).await?;

    println!("\n🎯 Calibration Model\n");
    println!("Method: {}", model.method);
    println!("Power exponent: {:.2}", model.power_exponent);
    println!("Logit shift: {:.2}", model.logit_shift);
    if let Some(brier) = model.brier_score {
        println!("Brier score: {:.4}", brier);
    }
    println!("Samples: {}", model.samples);
    println!("Saved to {}", config.calibration.model_path.display());
    Ok(())
}

fn stake(
    config: Config,
    probability: f64,
    odds: f64,
    bankroll: Option<Decimal>,
    fraction: Option<f64>,
) -> anyhow::Result<()> {
    let bankroll = bankroll.unwrap_or(config.staking.bankroll);
    let fraction = fraction.unwrap_or(config.staking.kelly_fraction);
    let sizing =
        BetSizer::new(config.staking).size_with_fraction(bankroll, probability, odds, fraction);

    println!("\n💰 Bet Sizing\n");
    println!("Probability: {:.1}%  Odds: {:.2}", probability * 100.0, odds);
    println!("Full Kelly: {:.2}%", sizing.full_kelly * 100.0);
    println!("Kelly x {:.2}: {:.2}%", sizing.fraction_used, sizing.kelly_fraction * 100.0);
    println!("Bet: ${:.2} (max ${:.2})", sizing.bet_amount, sizing.max_bet);
    println!("Expected value: ${:.2}", sizing.expected_value);
    println!("Recommendation: {}", sizing.recommendation);
    Ok(())
}

async fn verify(
    config: Config,
    version: Option<String>,
    days: i64,
    format: &str,
    compare: Option<String>,
) -> anyhow::Result<()> {
    let format: ReportFormat = format.parse()?;
    let version = version.unwrap_or_else(|| config.verification.model_version.clone());
    let store = Store::connect(&config.database).await?;
    let verifier = Verifier::new(store, config.verification);
    let today = Utc::now().date_naive();

    match compare {
        Some(other) => {
            let comparison = verifier.compare_versions(&version, &other, days, today).await;
            match format {
                ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&comparison)?),
                ReportFormat::Text => {
                    println!(
                        "\n⚖️  {} vs {}\n",
                        comparison.version_a.model_version, comparison.version_b.model_version
                    );
                    println!("Win rate: {:+.1}%", comparison.win_rate_improvement * 100.0);
                    println!("Place rate: {:+.1}%", comparison.place_rate_improvement * 100.0);
                    println!("ROI: {:+.1}%", comparison.roi_improvement * 100.0);
                    println!("Calibration: {:+.2}", comparison.calibration_improvement);
                    println!("Winner: {}", comparison.winner);
                }
            }
        }
        None => {
            let report = verifier.verify_model(&version, days, today).await;
            println!("{}", report.export(format)?);
        }
    }
    Ok(())
}

async fn health(config: Config, version: Option<String>) -> anyhow::Result<()> {
    let version = version.unwrap_or_else(|| config.verification.model_version.clone());
    let store = Store::connect(&config.database).await?;
    let verifier = Verifier::new(store, config.verification);

    let outcome = verifier.health_check(&version, Utc::now().date_naive()).await;
    println!("\n🩺 Model {} health: {}\n", version, outcome.status());
    for reason in outcome.reasons() {
        println!("  - {}", reason);
    }
    if let Some(metrics) = outcome.metrics() {
        println!(
            "Win rate {:.1}%, place rate {:.1}%, ROI {:.1}% over {} predictions",
            metrics.win_rate * 100.0,
            metrics.place_rate * 100.0,
            metrics.roi * 100.0,
            metrics.total_predictions
        );
    }
    Ok(())
}

async fn drift(config: Config, version: Option<String>) -> anyhow::Result<()> {
    let version = version.unwrap_or_else(|| config.verification.model_version.clone());
    let store = Store::connect(&config.database).await?;
    let verifier = Verifier::new(store, config.verification);

    let report = verifier.drift(&version, &StopFlag::new()).await;
    println!("\n📉 Drift for {}\n", version);
    for period in &report.periods {
        println!(
            "  {}  {:>5.1}%  ({} predictions)",
            period.date,
            period.accuracy * 100.0,
            period.predictions
        );
    }
    if let Some(error) = &report.error {
        println!("⚠️ {}", error);
        return Ok(());
    }
    println!("\nDrift: {:+.3}  Detected: {}", report.drift, report.detected);
    println!("Recommendation: {}", report.recommendation);
    Ok(())
}

async fn validate(config: Config, event_id: &str, positions_path: &Path) -> anyhow::Result<()> {
    let positions: FinishingPositions = read_json(positions_path).await?;
    let store = Store::connect(&config.database).await?;
    let logger = PredictionLogger::new(store, config.verification.model_version.clone());

    let results = logger.validate(event_id, &positions).await?;
    println!("\n✅ Validated {} predictions for {}\n", results.len(), event_id);
    for r in &results {
        println!(
            "  #{:<2} {:<20} finished {:<2} win {:>5.1}%",
            r.predicted_rank,
            r.entrant_id,
            r.actual_position,
            r.predicted_win_prob * 100.0
        );
    }
    Ok(())
}

async fn backtest(
    config: Config,
    events_path: Option<PathBuf>,
    version: Option<String>,
    max_bets: usize,
) -> anyhow::Result<()> {
    let events: Vec<ReplayEvent> = match events_path {
        Some(path) => read_json(&path).await?,
        None => {
            let version = version.unwrap_or_else(|| config.verification.model_version.clone());
            let store = Store::connect(&config.database).await?;
            let entries = store.entries(&EntryFilter::validated().model_version(version)).await?;
            replay_events_from_log(&entries)
        }
    };

    let stop = StopFlag::new();
    let on_signal = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping backtest");
            on_signal.stop();
        }
    });

    let backtester =
        Backtester::new(config.staking, config.value).with_max_bets_per_event(max_bets);
    let result = tokio::task::spawn_blocking(move || backtester.run(&events, &stop)).await?;

    let stats = &result.stats;
    println!("\n📊 Backtest\n");
    println!("Events: {}/{}", result.events_processed, result.events_total);
    if result.stopped_early {
        println!("(stopped early)");
    }
    println!(
        "Bets: {}  Won: {}  Lost: {}  Void: {}",
        stats.total_bets, stats.wins, stats.losses, stats.voids
    );
    println!(
        "Bankroll: ${:.2}  P&L: ${:.2}  ROI: {:.1}%",
        stats.current_bankroll, stats.profit_loss, stats.roi_percent
    );
    println!("Max drawdown: {:.1}%", result.max_drawdown_percent);
    Ok(())
}
