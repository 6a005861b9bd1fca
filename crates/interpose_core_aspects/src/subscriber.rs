//! `tracing` subscriber setup.
//!
//! [`TracingSetup`] installs a `tracing-subscriber` registry with an
//! [`EnvFilter`] and a fmt layer. Diagnostic lines written through
//! [`TracingSink`](crate::TracingSink) and the pipeline's own events only
//! become visible once a subscriber is installed.
//!
//! # Example
//!
//! ```
//! use interpose_core_aspects::{TracingFormat, TracingSetup};
//! use tracing::Level;
//!
//! // Development: pretty output with debug level
//! TracingSetup::new()
//!     .with_level(Level::DEBUG)
//!     .with_format(TracingFormat::Pretty)
//!     .install();
//!
//! // A second install is a no-op.
//! assert!(!TracingSetup::new().with_format(TracingFormat::Json).install());
//! ```

use core::str::FromStr;

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable selecting the output format.
pub const FORMAT_ENV: &str = "INTERPOSE_LOG_FORMAT";

/// Environment variable holding the filter directives.
pub const FILTER_ENV: &str = "RUST_LOG";

// ─────────────────────────────────────────────────────────────────────────────
// TracingFormat
// ─────────────────────────────────────────────────────────────────────────────

/// Tracing output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable colored output (default).
    #[default]
    Pretty,
    /// Compact single-line output.
    Compact,
    /// JSON structured output for log aggregation.
    Json,
}

/// Error parsing a [`TracingFormat`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown log format '{0}', expected pretty, compact or json")]
pub struct ParseFormatError(String);

impl FromStr for TracingFormat {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(ParseFormatError(s.to_string())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TracingSetup
// ─────────────────────────────────────────────────────────────────────────────

/// Subscriber configuration.
///
/// Output goes to standard error so that standard output stays available to
/// the host application.
#[derive(Debug, Clone)]
pub struct TracingSetup {
    /// Maximum log level, used when no filter is set.
    level: Level,
    /// Output format.
    format: TracingFormat,
    /// Environment filter (e.g., "interpose=debug,weather=info").
    env_filter: Option<String>,
    /// Whether to include span events (enter/exit).
    span_events: bool,
    /// Unparsable [`FORMAT_ENV`] value, reported once a subscriber exists.
    format_error: Option<ParseFormatError>,
}

impl Default for TracingSetup {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: TracingFormat::Pretty,
            env_filter: None,
            span_events: false,
            format_error: None,
        }
    }
}

impl TracingSetup {
    /// Creates a `TracingSetup` with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads [`FILTER_ENV`] and [`FORMAT_ENV`] from the process environment.
    ///
    /// An unparsable format is reported once the subscriber is installed and
    /// falls back to the default.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut setup = Self::default();
        if let Some(filter) = lookup(FILTER_ENV).filter(|filter| !filter.trim().is_empty()) {
            setup.env_filter = Some(filter);
        }
        if let Some(format) = lookup(FORMAT_ENV) {
            match format.parse() {
                Ok(format) => setup.format = format,
                Err(error) => setup.format_error = Some(error),
            }
        }
        setup
    }

    /// Sets the maximum log level.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets a custom environment filter string.
    ///
    /// Format: `target=level,target=level,...`
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Enables span enter/exit events in output.
    #[must_use]
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    /// Returns the configured output format.
    #[must_use]
    pub fn format(&self) -> TracingFormat {
        self.format
    }

    /// Returns the configured level.
    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    /// Returns the configured filter directives, if any.
    #[must_use]
    pub fn env_filter(&self) -> Option<&str> {
        self.env_filter.as_deref()
    }

    /// Returns the error from an unparsable [`FORMAT_ENV`] value, if any.
    #[must_use]
    pub fn format_error(&self) -> Option<&ParseFormatError> {
        self.format_error.as_ref()
    }

    /// Builds the filter, falling back to the level when the directives do
    /// not parse.
    fn filter(&self) -> (EnvFilter, Option<ParseError>) {
        let fallback = || EnvFilter::new(self.level.as_str());
        match &self.env_filter {
            Some(filter) => match EnvFilter::try_new(filter) {
                Ok(filter) => (filter, None),
                Err(error) => (fallback(), Some(error)),
            },
            None => (fallback(), None),
        }
    }

    /// Logs the configuration problems found while building the subscriber.
    fn report_problems(&self, filter_error: Option<&ParseError>) {
        if let Some(error) = &self.format_error {
            tracing::warn!(%error, "ignoring {FORMAT_ENV}, using {:?}", self.format);
        }
        if let (Some(error), Some(filter)) = (filter_error, &self.env_filter) {
            tracing::warn!(
                %error,
                filter = %filter,
                "ignoring invalid filter directives, using level {}",
                self.level
            );
        }
    }

    /// Installs the global subscriber.
    ///
    /// Returns false if a global subscriber was already installed, in which
    /// case nothing changes. Invalid format or filter settings fall back to
    /// the defaults and are logged through the new subscriber.
    pub fn install(&self) -> bool {
        let (env_filter, filter_error) = self.filter();

        let span_events = if self.span_events {
            FmtSpan::ENTER | FmtSpan::EXIT
        } else {
            FmtSpan::NONE
        };

        let installed = match self.format {
            TracingFormat::Pretty => tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_writer(std::io::stderr)
                        .with_span_events(span_events),
                )
                .try_init()
                .is_ok(),
            TracingFormat::Compact => tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .compact()
                        .with_writer(std::io::stderr)
                        .with_span_events(span_events),
                )
                .try_init()
                .is_ok(),
            TracingFormat::Json => tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_span_events(span_events),
                )
                .try_init()
                .is_ok(),
        };

        if installed {
            self.report_problems(filter_error.as_ref());
            tracing::debug!(
                level = %self.level,
                format = ?self.format,
                "tracing subscriber installed"
            );
        }
        installed
    }
}
