//! Database session configuration.

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the database folder if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to error if the folder already contains instance files.
    pub error_if_exists: bool,

    /// Whether to keep a fast-access volume cache per series.
    pub volume_cache: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
            volume_cache: false,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the folder if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to error if the database already exists.
    #[must_use]
    pub const fn error_if_exists(mut self, value: bool) -> Self {
        self.error_if_exists = value;
        self
    }

    /// Sets whether to keep the per-series volume cache.
    #[must_use]
    pub const fn volume_cache(mut self, value: bool) -> Self {
        self.volume_cache = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.create_if_missing);
        assert!(!config.error_if_exists);
        assert!(!config.volume_cache);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .create_if_missing(false)
            .error_if_exists(true)
            .volume_cache(true);

        assert!(!config.create_if_missing);
        assert!(config.error_if_exists);
        assert!(config.volume_cache);
    }
}
