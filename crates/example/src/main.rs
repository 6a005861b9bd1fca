//! Weather forecast demo.
//!
//! Weaves the forecast service with `LogAspect`, prints the next five days as
//! JSON, then calls a failing method to show the fault report.
//!
//! # Usage
//!
//! ```bash
//! weather
//! INTERPOSE_DIAGNOSTICS=tracing RUST_LOG=debug weather
//! ```

use std::io::{self, Write};
use std::process::ExitCode;

use example::{Diagnostics, SetupError, WeatherForecastService, controller};
use interpose_core_aspects::TracingSetup;
use thiserror::Error;

#[derive(Debug, Error)]
enum DemoError {
    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error("failed to serialize forecasts: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    TracingSetup::from_env().install();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "weather demo failed");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), DemoError> {
    let diagnostics = Diagnostics::from_env();
    tracing::info!(?diagnostics, "weaving WeatherForecastService");

    let controller = controller(WeatherForecastService::new(), diagnostics.log_aspect())?;

    let json = controller.get()?;
    writeln!(io::stdout().lock(), "{json}")?;

    // Fault path: reported by LogAspect, then returned unchanged.
    if let Err(error) = controller.service().get_for_days(30) {
        tracing::info!(%error, "get_for_days rejected the range");
    }
    if let Err(error) = controller.service().fail("Test".to_string()) {
        tracing::info!(%error, "fail raised as expected");
    }

    Ok(())
}
