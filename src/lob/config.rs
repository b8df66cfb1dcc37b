//! Configuration shared by both book variants and the multi-symbol session.

/// Configuration for book reconstruction behavior.
#[derive(Debug, Clone)]
pub struct BookConfig {
    /// Verify exchange checksums carried by aggregated updates
    pub validate_checksums: bool,

    /// Whether to log warnings for consistency issues
    pub log_warnings: bool,

    /// Only route records for these symbols (empty = all symbols)
    pub symbols: Vec<String>,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            validate_checksums: true,
            log_warnings: true,
            symbols: Vec::new(),
        }
    }
}

impl BookConfig {
    /// Create a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable/disable checksum validation.
    pub fn with_checksum_validation(mut self, validate: bool) -> Self {
        self.validate_checksums = validate;
        self
    }

    /// Enable/disable warning logs.
    pub fn with_logging(mut self, log: bool) -> Self {
        self.log_warnings = log;
        self
    }

    /// Restrict routing to the given symbols.
    pub fn with_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.symbols = symbols.into_iter().map(Into::into).collect();
        self
    }

    /// True if records for `symbol` should be processed.
    #[inline]
    pub fn accepts(&self, symbol: &str) -> bool {
        self.symbols.is_empty() || self.symbols.iter().any(|s| s == symbol)
    }
}
