//! Log output for applications embedding the client.
//!
//! The library crates only emit `tracing` events. `init_tracing` installs a
//! global subscriber filtered to `richpresence=<level>` unless `RUST_LOG`
//! or an explicit directive says otherwise.
//!
//! ```ignore
//! use richpresence_core::tracing::{init_tracing, TracingConfig, TracingOutputFormat};
//!
//! init_tracing(TracingConfig::default().with_format(TracingOutputFormat::Json))?;
//! ```

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

const LOG_TARGET: &str = "richpresence";

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("failed to parse env filter: {0}")]
    EnvFilter(#[from] tracing_subscriber::filter::ParseError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingOutputFormat {
    #[default]
    Pretty,
    /// One line per event, no timestamps.
    Compact,
    /// JSON lines with file and line numbers.
    Json,
}

#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub level: Level,
    pub format: TracingOutputFormat,
    /// Directive that replaces both `RUST_LOG` and `level`.
    pub filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: TracingOutputFormat::Pretty,
            filter: None,
        }
    }
}

impl TracingConfig {
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingOutputFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Explicit directive, then `RUST_LOG`, then `richpresence=<level>`.
    pub fn build_filter(&self) -> Result<EnvFilter, TracingError> {
        if let Some(ref filter) = self.filter {
            return Ok(EnvFilter::try_new(filter)?);
        }
        Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("{LOG_TARGET}={}", self.level))))
    }

    fn layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        match self.format {
            TracingOutputFormat::Pretty => fmt::layer().pretty().boxed(),
            TracingOutputFormat::Compact => fmt::layer().compact().without_time().boxed(),
            TracingOutputFormat::Json => fmt::layer()
                .json()
                .with_file(true)
                .with_line_number(true)
                .boxed(),
        }
    }
}

/// Installs the global subscriber. Fails if one is already set or the
/// filter directive does not parse.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let filter = config.build_filter()?;
    let subscriber = tracing_subscriber::registry()
        .with(config.layer())
        .with(filter);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = TracingConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert_eq!(config.format, TracingOutputFormat::Pretty);
        assert!(config.filter.is_none());
    }

    #[test]
    fn explicit_filter_is_used() {
        let config = TracingConfig::default()
            .with_level(Level::DEBUG)
            .with_filter("richpresence_client=trace");
        let filter = config.build_filter().unwrap();
        assert!(filter.to_string().contains("richpresence_client=trace"));
    }

    #[test]
    fn invalid_filter_is_rejected() {
        let config = TracingConfig::default().with_filter("richpresence=notalevel");
        assert!(matches!(
            config.build_filter(),
            Err(TracingError::EnvFilter(_))
        ));
    }
}
