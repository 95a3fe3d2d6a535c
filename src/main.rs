use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sprint_health::config::{ScoringConfig, Settings};
use sprint_health::history::HistoryStore;
use sprint_health::models::{Metric, SetupPatch};
use sprint_health::setup::SetupStore;
use sprint_health::signals::SignalEngine;
use sprint_health::storage::SqliteStorage;
use sprint_health::notes::{self, NotesStore};
use sprint_health::xp::{self, XpStore};
use sprint_health::{advice, forecast, health, report};

#[derive(Parser)]
#[command(name = "sprint-health")]
#[command(about = "Sprint risk, confidence and capacity signals with a local history log", long_about = None)]
struct Cli {
    /// SQLite database URL (defaults to $SPRINT_HEALTH_DB or sqlite://sprint-health.db)
    #[arg(long, global = true)]
    db: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the local database schema
    InitDb,
    /// Show or update the stored sprint setup
    Setup {
        #[arg(long)]
        sprint_days: Option<f64>,
        #[arg(long)]
        team_members: Option<f64>,
        #[arg(long)]
        leave_days: Option<f64>,
        #[arg(long)]
        committed_sp: Option<f64>,
        #[arg(long)]
        v1: Option<f64>,
        #[arg(long)]
        v2: Option<f64>,
        #[arg(long)]
        v3: Option<f64>,
    },
    /// Compute signals from the stored setup
    Signals {
        #[arg(long)]
        json: bool,
    },
    /// Compute signals and append a snapshot to the history log
    Snapshot {
        /// Save even if the last snapshot is less than a minute old
        #[arg(long)]
        force: bool,
    },
    /// List saved snapshots, newest first
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Compare a metric between the two most recent snapshots
    Trend { metric: Metric },
    /// Start a new sprint id without discarding history
    NewSprint,
    /// Delete all saved snapshots
    ClearHistory,
    /// Recommend a ceremony and list suggested actions
    Advise {
        /// Show the brief for this ceremony instead of the recommended one
        #[arg(long)]
        ceremony: Option<advice::Ceremony>,
    },
    /// Stability, predictability and overcommit streak across history
    Health,
    /// Claim today's XP for the current signals and show level and streak
    Xp,
    /// Show, update or clear the decision notes for a ceremony
    Notes {
        ceremony: advice::Ceremony,
        /// Field to record as field=value; an empty value removes the field
        #[arg(long = "set", value_parser = notes::parse_assignment)]
        updates: Vec<(String, String)>,
        #[arg(long, conflicts_with = "updates")]
        clear: bool,
    },
    /// Forecast deliverable points
    Forecast {
        #[arg(long, default_value_t = 0.0)]
        interrupt_pct: f64,
        /// Role capacity model entries as name:members[:unavailable_days]
        #[arg(long = "role", value_parser = forecast::parse_role)]
        roles: Vec<forecast::RoleInput>,
        #[arg(long, default_value_t = 10.0)]
        total_days: f64,
        #[arg(long, default_value_t = 1.0)]
        sp_per_day: f64,
        #[arg(long, default_value_t = 1.0)]
        unavailable_weight: f64,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, default_value = "sprint-health.md")]
        out: PathBuf,
    },
    /// Export the history log as CSV
    Export {
        #[arg(long)]
        csv: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::resolve(cli.db);
    let storage = SqliteStorage::open(&settings.database_url)
        .await
        .with_context(|| format!("failed to open {}", settings.database_url))?;

    let scoring = ScoringConfig::default();
    let engine = SignalEngine::new(scoring);
    let setup_store = SetupStore::new(&storage);
    let history = HistoryStore::new(&storage);

    // Runs every command to completion so the pool is closed even on error.
    let outcome: anyhow::Result<()> = async {
        match cli.command {
            Commands::InitDb => {
                println!("Schema ready.");
            }
            Commands::Setup {
                sprint_days,
                team_members,
                leave_days,
                committed_sp,
                v1,
                v2,
                v3,
            } => {
                let patch = SetupPatch {
                    sprint_days,
                    team_members,
                    leave_days,
                    committed_sp,
                    v1,
                    v2,
                    v3,
                };
                let setup = if patch.is_empty() {
                    setup_store.load().await
                } else {
                    setup_store.update(&patch).await
                };
                println!("{}", serde_json::to_string_pretty(&setup)?);
            }
            Commands::Signals { json } => {
                let signals = engine.compute(&setup_store.load().await);
                if json {
                    println!("{}", serde_json::to_string_pretty(&signals)?);
                } else {
                    println!(
                        "Risk {} ({}), confidence {}%, capacity health {}",
                        signals.risk_score,
                        signals.risk_band.as_str(),
                        signals.confidence,
                        signals.capacity_health_label()
                    );
                    println!(
                        "Average velocity {:.1} SP, effective capacity {:.1} SP, overcommit {:.2}x",
                        signals.avg_velocity, signals.capacity_sp, signals.overcommit_ratio
                    );
                    for driver in advice::drivers(
                        &signals,
                        (scoring.over_cap, scoring.capacity_cap, scoring.volatility_cap),
                    ) {
                        println!(
                            "- {} {:.1}/{} ({:.0}% impact)",
                            driver.title, driver.score, driver.max, driver.impact
                        );
                    }
                }
            }
            Commands::Snapshot { force } => {
                let signals = engine.compute(&setup_store.load().await);
                let outcome = history.save_snapshot(&signals, force).await;
                let snapshot = outcome.snapshot();
                if outcome.is_saved() {
                    println!(
                        "Snapshot saved for {} at {} (risk {}, {}).",
                        snapshot.sprint_id,
                        report::format_timestamp(snapshot.timestamp),
                        snapshot.risk_score,
                        snapshot.mode.as_str()
                    );
                } else {
                    println!(
                        "Last snapshot was saved at {}; use --force to save another.",
                        report::format_timestamp(snapshot.timestamp)
                    );
                }
            }
            Commands::History { limit } => {
                let snapshots = history.history().await;
                if snapshots.is_empty() {
                    println!("No snapshots yet. Run `snapshot` to record one.");
                } else {
                    println!("Current sprint: {}", history.current_sprint_id().await);
                    for snapshot in snapshots.iter().rev().take(limit) {
                        println!(
                            "- {} {} {:>6} risk {:>3} confidence {:>3}% committed {:.0} capacity {:.0}",
                            report::format_timestamp(snapshot.timestamp),
                            snapshot.sprint_id,
                            snapshot.mode.as_str(),
                            snapshot.risk_score,
                            snapshot.confidence,
                            snapshot.committed_sp,
                            snapshot.capacity_sp
                        );
                    }
                }
            }
            Commands::Trend { metric } => {
                println!("{metric}: {}", history.trend(metric).await.as_str());
            }
            Commands::NewSprint => {
                let id = history.reset_current_sprint().await;
                println!("New sprint started ({id}). Run `snapshot` to log it.");
            }
            Commands::ClearHistory => {
                history.clear_history().await;
                println!("History cleared.");
            }
            Commands::Advise { ceremony } => {
                let signals = engine.compute(&setup_store.load().await);
                let recommended = advice::recommend_ceremony(&signals);
                let brief = advice::ceremony_brief(ceremony.unwrap_or(recommended), &signals);
                println!("Recommended ceremony: {}", recommended.as_str());
                println!();
                println!("{}", brief.title);
                println!("{}", brief.purpose);
                for item in brief.checklist.iter() {
                    println!("  - {item}");
                }
                println!();
                for card in advice::suggestions(&signals) {
                    println!("[{}] {}: {}", card.tone.as_str(), card.title, card.message);
                }
            }
            Commands::Health => {
                let snapshots = history.history().await;
                match health::stability_index(&snapshots) {
                    Some(index) => println!("Stability index: {} ({})", index.percent, index.label.as_str()),
                    None => println!("Stability index: — (no data yet)"),
                }
                match health::predictability(&snapshots) {
                    Some(p) => println!("Predictability: {} - {}", p.as_str(), p.hint()),
                    None => println!("Predictability: — (need 2+ velocity snapshots)"),
                }
                println!("Overcommit streak: {}", health::overcommit_streak(&snapshots));
                if let Some(last) = history.last().await {
                    println!(
                        "Latest mode: {} ({})",
                        last.mode.as_str(),
                        report::format_timestamp(last.timestamp)
                    );
                }
                println!();
                for line in health::narrative(&snapshots) {
                    println!("{line}");
                }
            }
            Commands::Xp => {
                let signals = engine.compute(&setup_store.load().await);
                let store = XpStore::new(&storage);
                let award = store.award(&signals).await;
                if award.is_empty() {
                    println!("XP already claimed today. Come back tomorrow.");
                } else {
                    println!("+{} XP", award.gained);
                    for reason in award.reasons.iter() {
                        println!("  {reason}");
                    }
                }
                let state = store.load().await;
                let level = xp::level_info(state.total_xp);
                println!(
                    "Level {} {} ({}/{} XP), total {} XP",
                    level.level, level.title, level.in_level, level.next, state.total_xp
                );
                println!("Stable streak: {} (best {})", state.streak, state.best_streak);
            }
            Commands::Notes {
                ceremony,
                updates,
                clear,
            } => {
                let store = NotesStore::new(&storage);
                let saved = if clear {
                    store.clear(ceremony).await;
                    println!("{} notes cleared.", ceremony.as_str());
                    None
                } else if updates.is_empty() {
                    Some(store.get(ceremony).await)
                } else {
                    Some(store.save(ceremony, &updates).await?)
                };
                if let Some(saved) = saved {
                    println!("{} notes", ceremony.as_str());
                    for field in notes::note_fields(ceremony) {
                        let value = saved.get(field.id).map(String::as_str).unwrap_or("—");
                        println!("  {} ({}): {}", field.label, field.id, value);
                    }
                }
            }
            Commands::Forecast {
                interrupt_pct,
                roles,
                total_days,
                sp_per_day,
                unavailable_weight,
            } => {
                if roles.is_empty() {
                    let forecast = forecast::forecast_existing(&setup_store.load().await, interrupt_pct);
                    println!("Raw capacity: {:.2} person-days", forecast.raw_person_days);
                    println!("Effective days: {:.2}", forecast.effective_days);
                    println!("Forecast SP: {:.2}", forecast.forecast_sp);
                } else {
                    let forecast =
                        forecast::forecast_roles(total_days, sp_per_day, unavailable_weight, &roles);
                    for role in forecast.roles.iter() {
                        println!(
                            "- {}: {} members, {:.2} capacity days, {:.2} SP",
                            role.name, role.members, role.capacity_days, role.capacity_sp
                        );
                    }
                    println!(
                        "Total: {} members, {:.2} capacity days, {:.2} SP",
                        forecast.total_members, forecast.total_capacity_days, forecast.total_sp
                    );
                }
            }
            Commands::Report { out } => {
                let setup = setup_store.load().await;
                let signals = engine.compute(&setup);
                let snapshots = history.history().await;
                let report = report::build_report(&setup, &signals, &snapshots, engine.config());
                std::fs::write(&out, report)
                    .with_context(|| format!("failed to write {}", out.display()))?;
                println!("Report written to {}.", out.display());
            }
            Commands::Export { csv } => {
                let snapshots = history.history().await;
                let written = report::write_history_csv(&csv, &snapshots)
                    .with_context(|| format!("failed to write {}", csv.display()))?;
                println!("Exported {written} snapshots to {}.", csv.display());
            }
        }
        Ok(())
    }
    .await;

    storage.close().await;
    outcome
}
