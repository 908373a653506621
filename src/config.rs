//! Configuration types for the partition manager.

use crate::error::{Error, Result};
use std::time::Duration;

/// Environment variable holding the ephemeral message lifespan in milliseconds.
pub const LIFESPAN_ENV: &str = "ALERTS_PARTITION_LIFESPAN";

/// Default lifespan of notification messages and change markers.
pub const DEFAULT_LIFESPAN: Duration = Duration::from_millis(100);

/// Main configuration for the partition manager.
#[derive(Debug, Clone)]
pub struct PartitionConfig {
    /// Lifespan of every ephemeral value (trigger/data messages and the
    /// partition change marker).
    pub lifespan: Duration,

    /// Buffer size of each region's event broadcast.
    /// Slow subscribers that fall further behind lose events.
    pub channel_capacity: usize,

    /// Maximum number of live entries per region.
    pub max_entries: u64,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            lifespan: DEFAULT_LIFESPAN,
            channel_capacity: 1024,
            max_entries: 100_000,
        }
    }
}

impl PartitionConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from the process environment.
    ///
    /// Only the lifespan is tunable; it is read once here.
    pub fn from_env() -> Result<Self> {
        let config = Self::default();
        match std::env::var(LIFESPAN_ENV) {
            Ok(raw) => config.with_lifespan_str(&raw),
            Err(_) => Ok(config),
        }
    }

    fn with_lifespan_str(self, raw: &str) -> Result<Self> {
        let millis: u64 = raw.trim().parse().map_err(|_| {
            Error::Config(format!("{} must be milliseconds, got {:?}", LIFESPAN_ENV, raw))
        })?;
        if millis == 0 {
            return Err(Error::Config(format!("{} must be positive", LIFESPAN_ENV)));
        }
        Ok(self.with_lifespan(Duration::from_millis(millis)))
    }

    /// Set the lifespan of ephemeral messages.
    pub fn with_lifespan(mut self, lifespan: Duration) -> Self {
        self.lifespan = lifespan;
        self
    }

    /// Set the event buffer size of each region.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Set the maximum number of live entries per region.
    pub fn with_max_entries(mut self, max_entries: u64) -> Self {
        self.max_entries = max_entries;
        self
    }
}
