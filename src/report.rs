use std::fmt::Write;
use std::path::Path;

use chrono::{TimeZone, Utc};

use crate::advice;
use crate::config::ScoringConfig;
use crate::health;
use crate::models::{SetupRecord, SignalsRecord, Snapshot};

pub fn format_timestamp(timestamp_ms: i64) -> String {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "—".to_string())
}

/// Markdown summary of the current sprint and its recent history.
pub fn build_report(
    setup: &SetupRecord,
    signals: &SignalsRecord,
    history: &[Snapshot],
    config: &ScoringConfig,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Sprint Health Report");
    let _ = writeln!(
        output,
        "{} day sprint, {} team members, {} leave days, {} SP committed",
        setup.sprint_days, setup.team_members, setup.leave_days, setup.committed_sp
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Signals");
    let _ = writeln!(
        output,
        "- Risk score: {} ({})",
        signals.risk_score,
        signals.risk_band.as_str()
    );
    let _ = writeln!(output, "- Confidence: {}%", signals.confidence);
    let _ = writeln!(output, "- Capacity health: {}", signals.capacity_health_label());
    let _ = writeln!(
        output,
        "- Average velocity: {:.1} SP (volatility {:.2})",
        signals.avg_velocity, signals.vol
    );
    let _ = writeln!(
        output,
        "- Effective capacity: {:.1} SP ({:.0}% availability)",
        signals.capacity_sp,
        signals.availability_ratio * 100.0
    );
    let _ = writeln!(
        output,
        "- Overcommit ratio: {:.2}x, capacity shortfall ratio: {:.2}x",
        signals.overcommit_ratio, signals.capacity_shortfall_ratio
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Drivers");
    let drivers = advice::drivers(
        signals,
        (config.over_cap, config.capacity_cap, config.volatility_cap),
    );
    if drivers.is_empty() {
        let _ = writeln!(output, "No commitment entered yet.");
    } else {
        for driver in drivers.iter() {
            let _ = writeln!(
                output,
                "- {}: {:.1}/{} ({:.0}% impact)",
                driver.title, driver.score, driver.max, driver.impact
            );
        }
    }

    let ceremony = advice::recommend_ceremony(signals);
    let brief = advice::ceremony_brief(ceremony, signals);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recommended Ceremony: {}", brief.title);
    let _ = writeln!(output, "{}", brief.purpose);
    for item in brief.checklist.iter() {
        let _ = writeln!(output, "- {item}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Suggestions");
    for card in advice::suggestions(signals) {
        let _ = writeln!(output, "- [{}] {}: {}", card.tone.as_str(), card.title, card.message);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Snapshots");
    if history.is_empty() {
        let _ = writeln!(output, "No snapshots recorded yet.");
    } else {
        for snapshot in history.iter().rev().take(5) {
            let _ = writeln!(
                output,
                "- {} ({}, {}): risk {}, confidence {}%, {:.0}/{:.0} SP",
                format_timestamp(snapshot.timestamp),
                snapshot.sprint_id,
                snapshot.mode.as_str(),
                snapshot.risk_score,
                snapshot.confidence,
                snapshot.committed_sp,
                snapshot.capacity_sp
            );
        }
        let _ = writeln!(output);
        for line in health::narrative(history) {
            let _ = writeln!(output, "> {line}");
        }
    }

    output
}

pub fn write_history_csv(path: &Path, history: &[Snapshot]) -> anyhow::Result<usize> {
    let mut writer = csv::Writer::from_path(path)?;
    for snapshot in history {
        writer.serialize(snapshot)?;
    }
    writer.flush()?;
    Ok(history.len())
}
