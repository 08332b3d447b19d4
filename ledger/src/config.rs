//! Ledger engine configuration.

/// Tunables for one engine instance.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Capacity of the mutation event broadcast channel.
    pub event_capacity: usize,
    /// Maximum rows returned by one query call.
    pub max_query_results: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            event_capacity: 1024,
            max_query_results: 500,
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(capacity) = std::env::var("LEDGER_EVENT_CAPACITY") {
            if let Ok(capacity) = capacity.parse() {
                config.event_capacity = capacity;
            }
        }

        if let Ok(limit) = std::env::var("LEDGER_MAX_QUERY_RESULTS") {
            if let Ok(limit) = limit.parse() {
                config.max_query_results = limit;
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.event_capacity == 0 {
            return Err("Event capacity cannot be 0".to_string());
        }
        if self.max_query_results == 0 {
            return Err("Max query results cannot be 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LedgerConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = LedgerConfig::default();
        config.event_capacity = 0;
        assert!(config.validate().is_err());
    }
}
