//! Weather forecast service woven with [`LogAspect`].
//!
//! Every `&self` method of [`WeatherForecastService`] is marked with
//! `LogAspect`. Once woven, each call logs its entry and exit, and a fault
//! is reported with its message and backtrace before it reaches the caller:
//!
//! ```text
//! [DEBUG] Enter: WeatherForecastService.fail
//! [ERROR] Exception in method: WeatherForecastService.fail at 2026-10-17T09:30:00.000Z
//! [ERROR] Exception message: invalid operation: Test
//! [ERROR] StackTrace: ...
//! [DEBUG] Exit: WeatherForecastService.fail
//! ```
//!
//! [`WeatherForecastController`] owns the woven service and serves the
//! forecasts as JSON.

use core::fmt;
use core::str::FromStr;

use chrono::{Datelike, Days, NaiveDate, Utc};
use interpose_aspect::{AspectRegistry, RegistrationError, Weave, WeaveError, aspects};
use interpose_core_aspects::{LogAspect, TracingSink, WriterSink};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable selecting where `LogAspect` writes.
pub const DIAGNOSTICS_ENV: &str = "INTERPOSE_DIAGNOSTICS";

/// Longest range [`WeatherForecastService::get_for_days`] accepts.
pub const MAX_FORECAST_DAYS: u32 = 14;

const DEFAULT_FORECAST_DAYS: u32 = 5;

const SUMMARIES: [&str; 10] = [
    "Freezing",
    "Bracing",
    "Chilly",
    "Cool",
    "Mild",
    "Warm",
    "Balmy",
    "Hot",
    "Sweltering",
    "Scorching",
];

// ─────────────────────────────────────────────────────────────────────────────
// Forecasts
// ─────────────────────────────────────────────────────────────────────────────

/// One day's forecast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherForecast {
    /// Day the forecast is for.
    pub date: NaiveDate,
    /// Temperature in degrees Celsius.
    pub temperature_c: i32,
    /// Short description of the temperature.
    pub summary: String,
}

impl WeatherForecast {
    /// Temperature in degrees Fahrenheit.
    #[must_use]
    pub fn temperature_f(&self) -> i32 {
        32 + (f64::from(self.temperature_c) / 0.5556) as i32
    }
}

/// Errors raised by [`WeatherForecastService`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForecastError {
    /// The requested operation cannot be carried out.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

/// Produces forecasts for the days following its start date.
///
/// Forecasts are derived from the date alone, so the same service answers
/// the same way every time.
#[derive(Debug, Clone)]
pub struct WeatherForecastService {
    start: NaiveDate,
}

impl Default for WeatherForecastService {
    fn default() -> Self {
        Self::new()
    }
}

#[aspects(LogAspect)]
impl WeatherForecastService {
    /// Creates a service forecasting from tomorrow on.
    #[must_use]
    pub fn new() -> Self {
        let today = Utc::now().date_naive();
        Self::starting(today.succ_opt().unwrap_or(today))
    }

    /// Creates a service whose first forecast is for `start`.
    #[must_use]
    pub fn starting(start: NaiveDate) -> Self {
        Self { start }
    }

    /// Returns the forecasts for the next five days.
    pub fn get(&self) -> Vec<WeatherForecast> {
        self.forecast(DEFAULT_FORECAST_DAYS)
    }

    /// Returns the forecasts for the next `days` days.
    ///
    /// # Errors
    ///
    /// Returns [`ForecastError::InvalidOperation`] when `days` exceeds
    /// [`MAX_FORECAST_DAYS`].
    pub fn get_for_days(&self, days: u32) -> Result<Vec<WeatherForecast>, ForecastError> {
        if days > MAX_FORECAST_DAYS {
            return Err(ForecastError::InvalidOperation(format!(
                "cannot forecast {days} days ahead, the limit is {MAX_FORECAST_DAYS}"
            )));
        }
        Ok(self.forecast(days))
    }

    /// Always fails with `reason`.
    ///
    /// # Errors
    ///
    /// Always returns [`ForecastError::InvalidOperation`].
    pub fn fail(&self, reason: String) -> Result<(), ForecastError> {
        Err(ForecastError::InvalidOperation(reason))
    }
}

impl WeatherForecastService {
    fn forecast(&self, days: u32) -> Vec<WeatherForecast> {
        (0..days)
            .filter_map(|offset| self.start.checked_add_days(Days::new(u64::from(offset))))
            .map(forecast_for)
            .collect()
    }
}

/// Deterministic forecast for `date`, between -20 and 54 °C.
fn forecast_for(date: NaiveDate) -> WeatherForecast {
    let seed = date.num_days_from_ce().rem_euclid(75);
    let temperature_c = seed - 20;
    let bucket = usize::try_from(seed * 10 / 75).unwrap_or_default();
    WeatherForecast {
        date,
        temperature_c,
        summary: SUMMARIES[bucket.min(SUMMARIES.len() - 1)].to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Controller
// ─────────────────────────────────────────────────────────────────────────────

/// Serves the woven service's forecasts as JSON.
#[derive(Clone)]
pub struct WeatherForecastController {
    service: WeatherForecastServiceWoven,
}

impl WeatherForecastController {
    /// Wraps a woven service.
    #[must_use]
    pub fn new(service: WeatherForecastServiceWoven) -> Self {
        Self { service }
    }

    /// Returns the next five days of forecasts as a JSON array.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn get(&self) -> Result<String, serde_json::Error> {
        let forecasts = self.service.get();
        tracing::debug!(count = forecasts.len(), "serving forecasts");
        serde_json::to_string_pretty(&forecasts)
    }

    /// Returns the woven service.
    #[must_use]
    pub fn service(&self) -> &WeatherForecastServiceWoven {
        &self.service
    }
}

impl fmt::Debug for WeatherForecastController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeatherForecastController")
            .field("service", self.service.inner())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wiring
// ─────────────────────────────────────────────────────────────────────────────

/// Where `LogAspect` writes its lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Diagnostics {
    /// `[DEBUG]` / `[ERROR]` lines on standard output.
    #[default]
    Stdout,
    /// `tracing` events.
    Tracing,
}

/// Unknown [`DIAGNOSTICS_ENV`] value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown diagnostics target `{0}`, expected `stdout` or `tracing`")]
pub struct ParseDiagnosticsError(String);

impl FromStr for Diagnostics {
    type Err = ParseDiagnosticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdout" => Ok(Self::Stdout),
            "tracing" => Ok(Self::Tracing),
            _ => Err(ParseDiagnosticsError(s.to_string())),
        }
    }
}

impl Diagnostics {
    /// Reads [`DIAGNOSTICS_ENV`], defaulting to [`Diagnostics::Stdout`].
    ///
    /// An unrecognized value is logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let Ok(value) = std::env::var(DIAGNOSTICS_ENV) else {
            return Self::default();
        };
        value.parse().unwrap_or_else(|error: ParseDiagnosticsError| {
            tracing::warn!(%error, "falling back to stdout diagnostics");
            Self::default()
        })
    }

    /// Builds a `LogAspect` writing to this target.
    #[must_use]
    pub fn log_aspect(self) -> LogAspect {
        match self {
            Self::Stdout => LogAspect::new().with_sink(WriterSink::stdout()),
            Self::Tracing => LogAspect::new().with_sink(TracingSink),
        }
    }
}

/// Errors wiring up the demo.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The aspect could not be registered.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// The registry could not weave the service.
    #[error(transparent)]
    Weave(#[from] WeaveError),
}

/// Builds a registry holding `aspect`, with the service's markers attached.
///
/// # Errors
///
/// Returns an error if the aspect's advice fails to register or a marker
/// references an aspect missing from the registry.
pub fn registry(aspect: LogAspect) -> Result<AspectRegistry, SetupError> {
    let mut builder = AspectRegistry::builder();
    builder.add_aspect(aspect)?;
    builder.mark_type::<WeatherForecastService>();
    Ok(builder.finish()?)
}

/// Weaves `service` with `aspect` and wraps it in a controller.
///
/// # Errors
///
/// See [`registry`].
pub fn controller(
    service: WeatherForecastService,
    aspect: LogAspect,
) -> Result<WeatherForecastController, SetupError> {
    let registry = registry(aspect)?;
    Ok(WeatherForecastController::new(service.weave(&registry)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn fahrenheit_conversion() {
        let forecast = WeatherForecast {
            date: date(2026, 1, 1),
            temperature_c: 0,
            summary: "Cool".into(),
        };
        assert_eq!(forecast.temperature_f(), 32);

        let hot = WeatherForecast {
            temperature_c: 40,
            ..forecast
        };
        assert_eq!(hot.temperature_f(), 103);
    }

    #[test]
    fn forecasts_are_deterministic_and_in_range() {
        for offset in 0..400 {
            let day = date(2026, 1, 1) + Days::new(offset);
            let forecast = forecast_for(day);
            assert_eq!(forecast, forecast_for(day));
            assert!((-20..55).contains(&forecast.temperature_c));
            assert!(SUMMARIES.contains(&forecast.summary.as_str()));
        }
    }

    #[test]
    fn unwoven_service_counts_days_from_start() {
        let service = WeatherForecastService::starting(date(2026, 12, 30));
        let dates: Vec<NaiveDate> = service.get().into_iter().map(|f| f.date).collect();
        assert_eq!(
            dates,
            [
                date(2026, 12, 30),
                date(2026, 12, 31),
                date(2027, 1, 1),
                date(2027, 1, 2),
                date(2027, 1, 3),
            ]
        );
        assert!(service.get_for_days(0).unwrap().is_empty());
        assert_eq!(service.get_for_days(MAX_FORECAST_DAYS).unwrap().len(), 14);
        assert!(matches!(
            service.get_for_days(MAX_FORECAST_DAYS + 1),
            Err(ForecastError::InvalidOperation(_))
        ));
    }

    #[test]
    fn new_service_starts_tomorrow() {
        let today = Utc::now().date_naive();
        let first = WeatherForecastService::new().get()[0].date;
        // Tolerate the date rolling over between the two reads.
        assert!(first == today + Days::new(1) || first == today + Days::new(2));
    }

    #[test]
    fn diagnostics_parse() {
        assert_eq!("stdout".parse::<Diagnostics>(), Ok(Diagnostics::Stdout));
        assert_eq!(" Tracing ".parse::<Diagnostics>(), Ok(Diagnostics::Tracing));
        assert!("syslog".parse::<Diagnostics>().is_err());
    }
}
