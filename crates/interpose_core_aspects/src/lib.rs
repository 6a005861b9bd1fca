//! Core aspects for interpose.
//!
//! This crate provides the ready-made pieces most applications need on top of
//! `interpose_aspect`:
//!
//! - [`LogAspect`] - logs method entry, exit and faults
//! - [`DiagnosticSink`] - where log lines go ([`TracingSink`], [`WriterSink`], [`MemorySink`])
//! - [`Clock`] / [`ClockProvider`] - timestamps for fault reports, mockable in tests
//! - [`TracingSetup`] - `tracing` subscriber installation
//!
//! # Example
//!
//! ```ignore
//! use interpose_aspect::{AspectRegistry, Weave};
//! use interpose_core_aspects::{LogAspect, TracingSetup, WriterSink};
//!
//! TracingSetup::from_env().install();
//!
//! let mut builder = AspectRegistry::builder();
//! builder.add_aspect(LogAspect::new().with_sink(WriterSink::stdout()))?;
//! builder.mark_type::<WeatherForecastService>();
//! let registry = builder.finish()?;
//!
//! let service = WeatherForecastService::default().weave(&registry)?;
//! ```

mod log;
mod sink;
mod subscriber;
mod time;

pub use log::LogAspect;
pub use sink::{DiagnosticSink, MemorySink, Severity, SinkError, TracingSink, WriterSink};
pub use subscriber::{FILTER_ENV, FORMAT_ENV, ParseFormatError, TracingFormat, TracingSetup};
pub use time::{Clock, ClockProvider, MockClock};
