//! Engine configuration from the environment

use crate::fiber::DEFAULT_MAX_DRIVE_STEPS;
use crate::scorable::ScoreTraits;

/// Database path that selects an in-memory SQLite database
pub const IN_MEMORY: &str = ":memory:";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// SQLite file, or `:memory:`
    pub db_path: String,
    pub port: u16,
    /// Cap on continuation steps per turn
    pub max_drive_steps: usize,
    pub score_traits: ScoreTraits,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; unparsable values fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let db_path = lookup("FIBER_DB_PATH").unwrap_or_else(|| {
            let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
            format!("{home}/.dialog-fiber/fiber.db")
        });

        let port = parsed(&lookup, "FIBER_PORT").unwrap_or(8000);

        let max_drive_steps = parsed(&lookup, "FIBER_MAX_DRIVE_STEPS")
            .filter(|steps: &usize| *steps > 0)
            .unwrap_or(DEFAULT_MAX_DRIVE_STEPS);

        let defaults = ScoreTraits::default();
        let minimum = parsed(&lookup, "FIBER_SCORE_MIN").unwrap_or(defaults.minimum);
        let maximum = parsed(&lookup, "FIBER_SCORE_MAX").unwrap_or(defaults.maximum);
        let score_traits = if minimum.is_finite() && maximum.is_finite() && minimum < maximum {
            ScoreTraits::new(minimum, maximum)
        } else {
            tracing::warn!(minimum, maximum, "Invalid score bounds, using defaults");
            defaults
        };

        Self {
            db_path,
            port,
            max_drive_steps,
            score_traits,
        }
    }

    pub fn in_memory(&self) -> bool {
        self.db_path == IN_MEMORY
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "Ignoring unparsable setting");
            None
        }
    }
}
