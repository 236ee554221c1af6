//! Service configuration, read from the environment

use std::time::Duration;

use crate::error::{FarmError, FarmResult};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_CLOSE_DELAY_MS: u64 = 2000;
pub const DEFAULT_EMERGENCY_PHRASE: &str = "PANIC";
pub const DEFAULT_EVENT_CAPACITY: usize = 1000;

#[derive(Debug, Clone)]
pub struct FarmConfig {
    /// Listen address of the HTTP server
    pub bind_addr: String,
    /// How long a position stays `Closing` before removal
    pub close_delay: Duration,
    /// Exact text required to run an emergency close
    pub emergency_phrase: String,
    /// Buffer size of the event broadcast channel
    pub event_capacity: usize,
}

impl Default for FarmConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            close_delay: Duration::from_millis(DEFAULT_CLOSE_DELAY_MS),
            emergency_phrase: DEFAULT_EMERGENCY_PHRASE.to_string(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl FarmConfig {
    pub fn from_env() -> FarmResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> FarmResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("FARM_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(raw) = lookup("FARM_CLOSE_DELAY_MS") {
            let ms: u64 = raw
                .trim()
                .parse()
                .map_err(|_| FarmError::Config(format!("FARM_CLOSE_DELAY_MS={raw}")))?;
            config.close_delay = Duration::from_millis(ms);
        }
        if let Some(phrase) = lookup("FARM_EMERGENCY_PHRASE") {
            if phrase.is_empty() {
                return Err(FarmError::Config("FARM_EMERGENCY_PHRASE is empty".into()));
            }
            config.emergency_phrase = phrase;
        }
        if let Some(raw) = lookup("FARM_EVENT_CAPACITY") {
            let capacity: usize = raw
                .trim()
                .parse()
                .ok()
                .filter(|c| *c > 0)
                .ok_or_else(|| FarmError::Config(format!("FARM_EVENT_CAPACITY={raw}")))?;
            config.event_capacity = capacity;
        }

        Ok(config)
    }
}
