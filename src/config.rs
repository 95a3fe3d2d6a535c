/// Fixed weights and thresholds for the signal engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringConfig {
    pub over_multiplier: f64,
    pub over_cap: f64,
    pub capacity_multiplier: f64,
    pub capacity_cap: f64,
    pub volatility_multiplier: f64,
    pub volatility_cap: f64,
    /// Scale applied to the coefficient of variation before it is subtracted
    /// from the confidence percentage.
    pub confidence_volatility_scale: f64,
    pub low_band_max: f64,
    pub moderate_band_max: f64,
    pub healthy_ratio: f64,
    pub at_risk_ratio: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            over_multiplier: 60.0,
            over_cap: 50.0,
            capacity_multiplier: 50.0,
            capacity_cap: 35.0,
            volatility_multiplier: 30.0,
            volatility_cap: 15.0,
            confidence_volatility_scale: 50.0,
            low_band_max: 30.0,
            moderate_band_max: 60.0,
            healthy_ratio: 1.0,
            at_risk_ratio: 0.85,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryConfig {
    pub max_entries: usize,
    pub dedup_window_ms: i64,
    pub watch_risk: f64,
    pub rescue_risk: f64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: 30,
            dedup_window_ms: 60_000,
            watch_risk: 40.0,
            rescue_risk: 70.0,
        }
    }
}

pub const DEFAULT_DATABASE_URL: &str = "sqlite://sprint-health.db";
pub const DATABASE_ENV: &str = "SPRINT_HEALTH_DB";

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
}

impl Settings {
    /// Resolves the storage location: explicit flag, then environment, then default.
    pub fn resolve(flag: Option<String>) -> Self {
        let database_url = flag
            .filter(|url| !url.trim().is_empty())
            .or_else(|| {
                std::env::var(DATABASE_ENV)
                    .ok()
                    .filter(|url| !url.trim().is_empty())
            })
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        Self { database_url }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sets an environment variable for the guard's lifetime, then restores it.
    struct EnvGuard {
        key: &'static str,
        previous: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: Option<&str>) -> Self {
            let previous = std::env::var(key).ok();
            match value {
                Some(value) => std::env::set_var(key, value),
                None => std::env::remove_var(key),
            }
            Self { key, previous }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.previous {
                Some(value) => std::env::set_var(self.key, value),
                None => std::env::remove_var(self.key),
            }
        }
    }

    // One test owns SPRINT_HEALTH_DB so parallel tests never race on it.
    #[test]
    fn database_url_resolution_order() {
        {
            let _env = EnvGuard::set(DATABASE_ENV, Some("sqlite://from-env.db"));
            let flagged = Settings::resolve(Some("sqlite://custom.db".to_string()));
            assert_eq!(flagged.database_url, "sqlite://custom.db");

            assert_eq!(Settings::resolve(None).database_url, "sqlite://from-env.db");
            assert_eq!(
                Settings::resolve(Some("   ".to_string())).database_url,
                "sqlite://from-env.db"
            );
        }
        {
            let _env = EnvGuard::set(DATABASE_ENV, Some(" "));
            assert_eq!(Settings::resolve(None).database_url, DEFAULT_DATABASE_URL);
        }
        {
            let _env = EnvGuard::set(DATABASE_ENV, None);
            assert_eq!(Settings::resolve(None).database_url, DEFAULT_DATABASE_URL);
            assert_eq!(
                Settings::resolve(Some(String::new())).database_url,
                DEFAULT_DATABASE_URL
            );
        }
    }

    #[test]
    fn default_weights_saturate_at_one_hundred() {
        let config = ScoringConfig::default();
        assert_eq!(
            config.over_cap + config.capacity_cap + config.volatility_cap,
            100.0
        );
    }
}
