//! Configuration for a sequential task queue.

use ordo_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Configuration for one queue instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Name used in log fields and reports.
    #[serde(default = "default_name")]
    pub name: String,

    /// Capacity of the lifecycle event broadcast channel.
    ///
    /// Subscribers that fall further behind than this miss events.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl QueueConfig {
    /// Create a new queue config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the queue name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the event channel capacity.
    #[must_use]
    pub const fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Parse and validate a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns error if the text is not valid TOML or the config is invalid.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid_config("queue name must not be empty"));
        }

        if self.event_capacity == 0 {
            return Err(Error::invalid_config(
                "event_capacity must be greater than 0",
            ));
        }

        Ok(())
    }
}

fn default_name() -> String {
    "default".to_string()
}

const fn default_event_capacity() -> usize {
    1024
}
