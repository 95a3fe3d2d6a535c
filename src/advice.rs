use std::str::FromStr;

use crate::models::{RiskBand, SignalsRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ceremony {
    Planning,
    Daily,
    Refinement,
    Review,
    Retro,
}

impl Ceremony {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ceremony::Planning => "Planning",
            Ceremony::Daily => "Daily",
            Ceremony::Refinement => "Refinement",
            Ceremony::Review => "Review",
            Ceremony::Retro => "Retro",
        }
    }
}

impl FromStr for Ceremony {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "planning" => Ok(Ceremony::Planning),
            "daily" | "standup" => Ok(Ceremony::Daily),
            "refinement" | "refine" => Ok(Ceremony::Refinement),
            "review" => Ok(Ceremony::Review),
            "retro" | "retrospective" => Ok(Ceremony::Retro),
            _ => Err(format!("unknown ceremony `{s}`")),
        }
    }
}

/// Picks the ceremony most worth the team's attention given the signals.
pub fn recommend_ceremony(signals: &SignalsRecord) -> Ceremony {
    if signals.overcommit_ratio > 1.10 || signals.capacity_shortfall_ratio > 1.0 {
        Ceremony::Planning
    } else if signals.availability_ratio < 0.90 {
        Ceremony::Daily
    } else if signals.vol > 0.18 {
        Ceremony::Retro
    } else if signals.confidence < 70.0 {
        Ceremony::Review
    } else {
        Ceremony::Planning
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CeremonyBrief {
    pub title: &'static str,
    pub purpose: &'static str,
    pub checklist: Vec<String>,
}

pub fn ceremony_brief(ceremony: Ceremony, signals: &SignalsRecord) -> CeremonyBrief {
    let (title, purpose, items): (&'static str, &'static str, [&str; 3]) = match ceremony {
        Ceremony::Planning => (
            "Sprint Planning",
            "Align scope with reality. Check commitment pressure before the sprint starts.",
            [
                "Validate scope against average velocity.",
                "Confirm availability assumptions (leave/holidays).",
                "Identify optional backlog items for de-scoping.",
            ],
        ),
        Ceremony::Daily => (
            "Daily Standup",
            "Protect flow. Unblock tickets fast and swarm on critical items.",
            [
                "Remove blockers with owners.",
                "Limit parallel work (WIP).",
                "Escalate dependencies early.",
            ],
        ),
        Ceremony::Refinement => (
            "Refinement",
            "Reduce future surprises. Break down large stories now.",
            [
                "Confirm acceptance criteria.",
                "Split oversized items.",
                "Ensure top items are 'Ready'.",
            ],
        ),
        Ceremony::Review => (
            "Sprint Review",
            "Make progress visible. Reset priorities based on demo feedback.",
            [
                "Highlight shipped vs committed.",
                "Capture stakeholder feedback.",
                "Confirm priority for next sprint.",
            ],
        ),
        Ceremony::Retro => (
            "Retrospective",
            "Improve the system. Pick one experiment to reduce risk next time.",
            [
                "Identify biggest system constraint.",
                "Choose one measurable experiment.",
                "Assign owner + review date.",
            ],
        ),
    };

    let mut checklist: Vec<String> = items.iter().map(|s| s.to_string()).collect();
    if ceremony == Ceremony::Planning && signals.overcommit_ratio > 1.10 {
        checklist.insert(0, "High scope pressure: re-check commitment.".to_string());
    }
    if ceremony == Ceremony::Daily && signals.availability_ratio < 0.90 {
        checklist.insert(0, "Low focus: reduce WIP immediately.".to_string());
    }

    CeremonyBrief {
        title,
        purpose,
        checklist,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Ok,
    Warn,
    Danger,
    Neutral,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Ok => "Healthy",
            Tone::Warn => "Warning",
            Tone::Danger => "Critical",
            Tone::Neutral => "Suggestion",
        }
    }

    fn from_band(band: RiskBand) -> Self {
        match band {
            RiskBand::Low => Tone::Ok,
            RiskBand::Moderate => Tone::Warn,
            RiskBand::High => Tone::Danger,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub title: &'static str,
    pub message: String,
    pub tone: Tone,
}

impl Suggestion {
    fn new(title: &'static str, message: impl Into<String>, tone: Tone) -> Self {
        Self {
            title,
            message: message.into(),
            tone,
        }
    }
}

pub fn suggestions(signals: &SignalsRecord) -> Vec<Suggestion> {
    if signals.committed_sp <= 0.0 || signals.avg_velocity <= 0.0 {
        return vec![Suggestion::new(
            "Setup Required",
            "Actions need sprint metrics. Enter committed points and at least one past velocity first.",
            Tone::Warn,
        )];
    }

    let mut cards = vec![Suggestion::new(
        "Sprint Health Check",
        format!(
            "Risk score is {} ({}). Delivery confidence is {}%.",
            signals.risk_score,
            signals.risk_band.as_str(),
            signals.confidence
        ),
        Tone::from_band(signals.risk_band),
    )];

    if signals.overcommit_ratio > 1.10 {
        cards.push(Suggestion::new(
            "Excessive Scope Pressure",
            "Commitment is well above the historical average. Renegotiate scope now: de-scope 15% of the lowest priority work.",
            Tone::Danger,
        ));
    } else if signals.overcommit_ratio > 1.0 {
        cards.push(Suggestion::new(
            "Tight Delivery Window",
            "The plan is slightly optimistic. Keep ad-hoc requests out of the sprint to protect the goal.",
            Tone::Warn,
        ));
    }

    if signals.capacity_shortfall_ratio > 1.2 {
        cards.push(Suggestion::new(
            "Capacity Crisis",
            "Leave and holidays leave too few person-days to cover the points. Move 2-3 stories back to the backlog.",
            Tone::Danger,
        ));
    }

    if signals.vol > 0.35 {
        cards.push(Suggestion::new(
            "Unstable Velocity",
            "Velocity swings too much. Break large stories into 1-3 point slices to stabilise flow.",
            Tone::Danger,
        ));
    } else if signals.vol <= 0.20 {
        cards.push(Suggestion::new(
            "High Predictability",
            "Flow is steady. Use the stability for a small process experiment or some technical debt.",
            Tone::Ok,
        ));
    }

    cards.push(Suggestion::new(
        "Limit WIP",
        "Don't start new work until open tickets have moved to QA.",
        Tone::Neutral,
    ));
    cards
}

/// One risk component expressed against its cap.
#[derive(Debug, Clone, PartialEq)]
pub struct Driver {
    pub title: &'static str,
    pub description: &'static str,
    pub score: f64,
    pub max: f64,
    /// Share of the cap used, `0..=100`.
    pub impact: f64,
}

pub fn drivers(signals: &SignalsRecord, caps: (f64, f64, f64)) -> Vec<Driver> {
    if signals.committed_sp <= 0.0 {
        return Vec::new();
    }
    let c = signals.components;
    let mut drivers: Vec<Driver> = [
        ("Scope Pressure", "Commitment vs historical velocity.", c.over, caps.0),
        ("Capacity Shortfall", "Effective availability vs load.", c.cap, caps.1),
        ("Predictability", "Historical velocity volatility.", c.vola, caps.2),
    ]
    .into_iter()
    .map(|(title, description, score, max)| Driver {
        title,
        description,
        score,
        max,
        impact: if max > 0.0 {
            (score / max * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        },
    })
    .collect();

    drivers.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    drivers
}
