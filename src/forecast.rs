use crate::models::SetupRecord;
use crate::signals::{bounded, mean, non_negative};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TeamForecast {
    pub raw_person_days: f64,
    pub effective_days: f64,
    pub velocity_per_day: f64,
    pub forecast_sp: f64,
}

/// Forecasts deliverable points for the existing team, discounting leave and
/// an expected share of interrupt work (`interrupt_pct` in percent).
pub fn forecast_existing(setup: &SetupRecord, interrupt_pct: f64) -> TeamForecast {
    let interrupt = (non_negative(interrupt_pct) / 100.0).min(1.0);
    let raw_person_days = bounded(non_negative(setup.sprint_days) * non_negative(setup.team_members));
    let effective_days =
        ((raw_person_days - non_negative(setup.leave_days)) * (1.0 - interrupt)).max(0.0);

    let velocities: Vec<f64> = [setup.v1, setup.v2, setup.v3]
        .into_iter()
        .map(non_negative)
        .filter(|v| *v > 0.0)
        .collect();
    let velocity_per_day = if raw_person_days > 0.0 {
        mean(&velocities) / raw_person_days
    } else {
        0.0
    };

    TeamForecast {
        raw_person_days,
        effective_days,
        velocity_per_day,
        forecast_sp: bounded(effective_days * velocity_per_day),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoleInput {
    pub name: String,
    pub members: f64,
    pub unavailable_days: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoleForecast {
    pub name: String,
    pub members: f64,
    pub adjusted_days: f64,
    pub capacity_days: f64,
    pub capacity_sp: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoleModelForecast {
    pub roles: Vec<RoleForecast>,
    pub total_members: f64,
    pub total_capacity_days: f64,
    pub total_sp: f64,
}

/// Capacity by role when the team has no velocity history yet.
///
/// `unavailable_weight` scales how much each unavailable day counts and is
/// clamped to `0..=1`.
pub fn forecast_roles(
    total_days: f64,
    sp_per_day: f64,
    unavailable_weight: f64,
    roles: &[RoleInput],
) -> RoleModelForecast {
    let weight = if unavailable_weight.is_finite() {
        unavailable_weight.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let total_days = non_negative(total_days);
    let sp_per_day = non_negative(sp_per_day);

    let roles: Vec<RoleForecast> = roles
        .iter()
        .map(|role| {
            let members = non_negative(role.members);
            let adjusted_days = (total_days - non_negative(role.unavailable_days) * weight).max(0.0);
            let capacity_days = bounded(adjusted_days * members);
            RoleForecast {
                name: if role.name.trim().is_empty() {
                    "Role".to_string()
                } else {
                    role.name.clone()
                },
                members,
                adjusted_days,
                capacity_days,
                capacity_sp: bounded(capacity_days * sp_per_day),
            }
        })
        .collect();

    RoleModelForecast {
        total_members: bounded(roles.iter().map(|r| r.members).sum()),
        total_capacity_days: bounded(roles.iter().map(|r| r.capacity_days).sum()),
        total_sp: bounded(roles.iter().map(|r| r.capacity_sp).sum()),
        roles,
    }
}

/// Parses `name:members[:unavailable_days]`.
pub fn parse_role(input: &str) -> Result<RoleInput, String> {
    let mut parts = input.split(':');
    let name = parts.next().unwrap_or_default().trim().to_string();
    let members = parts
        .next()
        .ok_or_else(|| format!("role `{input}` needs a member count"))?
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("role `{input}`: {e}"))?;
    let unavailable_days = match parts.next() {
        Some(days) => days
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("role `{input}`: {e}"))?,
        None => 0.0,
    };
    Ok(RoleInput {
        name,
        members,
        unavailable_days,
    })
}
