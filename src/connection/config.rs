use std::time::Duration;

/// Connection pool configuration
///
/// Bounds the pool and the time a caller may wait for a free connection.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool
    pub max_connections: usize,

    /// Number of connections opened eagerly at pool creation
    pub min_connections: usize,

    /// How long an acquire may wait for a free connection before failing
    pub acquire_timeout: Duration,

    /// Idle connections older than this are discarded instead of reused
    pub idle_timeout: Option<Duration>,
}

impl PoolConfig {
    pub fn new() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
        }
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set minimum connections
    pub fn min_connections(mut self, min: usize) -> Self {
        self.min_connections = min;
        self
    }

    /// Set the acquire timeout
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set the idle timeout
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == 0 {
            return Err("max_connections must be > 0".to_string());
        }

        if self.min_connections > self.max_connections {
            return Err("min_connections cannot exceed max_connections".to_string());
        }

        if self.acquire_timeout.is_zero() {
            return Err("acquire_timeout must be > 0".to_string());
        }

        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = PoolConfig::new()
            .max_connections(20)
            .min_connections(5)
            .acquire_timeout(Duration::from_millis(100));

        assert_eq!(config.max_connections, 20);
        assert_eq!(config.min_connections, 5);
        assert_eq!(config.acquire_timeout, Duration::from_millis(100));
    }

    #[test]
    fn test_validate() {
        let valid = PoolConfig::new();
        assert!(valid.validate().is_ok());

        let zero_max = PoolConfig::new().max_connections(0);
        assert!(zero_max.validate().is_err());

        let min_over_max = PoolConfig::new().min_connections(10).max_connections(5);
        assert!(min_over_max.validate().is_err());

        let zero_timeout = PoolConfig::new().acquire_timeout(Duration::ZERO);
        assert!(zero_timeout.validate().is_err());
    }
}
