//! The logging aspect.
//!
//! [`LogAspect`] contributes three advice to every method marked with it:
//!
//! | Advice | Kind | Output |
//! |--------|------|--------|
//! | `log_enter` | Before | `Enter: <Type>.<method>` (Debug) |
//! | `log_exceptions` | Around | fault block (Error), only when the body raises |
//! | `log_exit` | After | `Exit: <Type>.<method>` (Debug), on every path |
//!
//! The fault block is three lines:
//!
//! ```text
//! Exception in method: <Type>.<method> at <timestamp>
//! Exception message: <message>
//! StackTrace: <trace>
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use interpose_aspect::AspectRegistry;
//! use interpose_core_aspects::{LogAspect, MemorySink};
//!
//! let sink = Arc::new(MemorySink::new());
//! let mut builder = AspectRegistry::builder();
//! builder
//!     .add_aspect(LogAspect::new().with_sink(Arc::clone(&sink)))
//!     .unwrap();
//! let registry = builder.finish().unwrap();
//! assert!(registry.contains_aspect::<LogAspect>());
//! ```

use core::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use interpose_aspect::{Advice, AdviceError, AdviceSet, Aspect, Fault, JoinPoint, RegistrationError};

use crate::sink::{DiagnosticSink, Severity, TracingSink};
use crate::time::{Clock, ClockProvider};

/// Logs method entry, exit and faults to a [`DiagnosticSink`].
///
/// Sink failures never change a call's outcome.
#[derive(Clone)]
pub struct LogAspect {
    sink: Arc<dyn DiagnosticSink>,
    clock: Clock,
}

impl Default for LogAspect {
    fn default() -> Self {
        Self {
            sink: Arc::new(TracingSink),
            clock: Clock::system(),
        }
    }
}

impl core::fmt::Debug for LogAspect {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LogAspect").finish_non_exhaustive()
    }
}

impl LogAspect {
    /// Creates a `LogAspect` writing through [`TracingSink`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sink diagnostic lines are written to.
    #[must_use]
    pub fn with_sink(mut self, sink: impl DiagnosticSink) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Sets the time source for fault timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: impl ClockProvider) -> Self {
        self.clock = Clock::with_provider(clock);
        self
    }
}

impl Aspect for LogAspect {
    fn advise(&self, advice: &mut AdviceSet<'_>) -> Result<(), RegistrationError> {
        let enter_sink = Arc::clone(&self.sink);
        let guard_sink = Arc::clone(&self.sink);
        let exit_sink = Arc::clone(&self.sink);
        let clock = self.clock.clone();

        advice
            .add(Advice::before("log_enter", move |join_point| {
                log_edge(enter_sink.as_ref(), "Enter", join_point)
            }))?
            .add(Advice::around(
                "log_exceptions",
                move |join_point, proceed, arguments| {
                    let outcome = proceed.invoke(arguments);
                    if let Err(fault) = &outcome {
                        let reported = catch_unwind(AssertUnwindSafe(|| {
                            report_fault(guard_sink.as_ref(), &clock, join_point, fault);
                        }));
                        if let Err(payload) = reported {
                            tracing::warn!(
                                target: "interpose::advice",
                                join_point = %join_point,
                                panic = panic_message(payload.as_ref()),
                                "fault report panicked"
                            );
                        }
                    }
                    outcome
                },
            ))?
            .add(Advice::after("log_exit", move |join_point| {
                log_edge(exit_sink.as_ref(), "Exit", join_point)
            }))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "LogAspect"
    }
}

fn log_edge(
    sink: &dyn DiagnosticSink,
    edge: &str,
    join_point: &JoinPoint,
) -> Result<(), AdviceError> {
    sink.write(Severity::Debug, &format!("{edge}: {join_point}"))?;
    Ok(())
}

/// Writes the fault block. A failing sink stops the block and is reported
/// through `tracing`; the fault itself is untouched.
fn report_fault(sink: &dyn DiagnosticSink, clock: &Clock, join_point: &JoinPoint, fault: &Fault) {
    let lines = [
        format!("Exception in method: {join_point} at {}", clock.timestamp()),
        format!("Exception message: {}", fault.message()),
        format!("StackTrace: {}", fault.trace()),
    ];
    for line in &lines {
        if let Err(error) = sink.write(Severity::Error, line) {
            tracing::warn!(
                target: "interpose::advice",
                join_point = %join_point,
                %error,
                "failed to report fault"
            );
            return;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use interpose_aspect::{AdviceKind, AspectRegistry, Marker};

    use super::*;
    use crate::sink::{MemorySink, SinkError};
    use crate::time::MockClock;

    #[derive(Debug, PartialEq, Eq, thiserror::Error)]
    #[error("invalid operation: {0}")]
    struct InvalidOperation(String);

    struct Service;

    fn registry(sink: &Arc<MemorySink>) -> AspectRegistry {
        let mut builder = AspectRegistry::builder();
        builder
            .add_aspect(
                LogAspect::new()
                    .with_sink(Arc::clone(sink))
                    .with_clock(MockClock::new(DateTime::UNIX_EPOCH)),
            )
            .unwrap();
        builder.finish().unwrap()
    }

    #[test]
    fn registers_one_advice_of_each_kind() {
        let registry = registry(&Arc::new(MemorySink::new()));
        assert_eq!(registry.advice_count(AdviceKind::Before), 1);
        assert_eq!(registry.advice_count(AdviceKind::Around), 1);
        assert_eq!(registry.advice_count(AdviceKind::After), 1);
        assert_eq!(registry.aspect_names(), ["LogAspect"]);
    }

    #[test]
    fn success_writes_enter_and_exit() {
        let sink = Arc::new(MemorySink::new());
        let advised = registry(&sink)
            .weave(&Marker::method::<Service>("get").with::<LogAspect>(), |(): ()| {
                Ok::<_, InvalidOperation>(5)
            })
            .unwrap();

        assert_eq!(advised.call(()), Ok(5));
        assert_eq!(
            sink.entries(),
            [
                (Severity::Debug, "Enter: Service.get".to_string()),
                (Severity::Debug, "Exit: Service.get".to_string()),
            ]
        );
    }

    #[test]
    fn fault_writes_block_between_enter_and_exit() {
        let sink = Arc::new(MemorySink::new());
        let advised = registry(&sink)
            .weave(&Marker::method::<Service>("fail").with::<LogAspect>(), |(): ()| {
                Err::<(), _>(InvalidOperation("x".into()))
            })
            .unwrap();

        assert_eq!(advised.call(()), Err(InvalidOperation("x".into())));

        let lines = sink.lines();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "Enter: Service.fail");
        assert_eq!(
            lines[1],
            "Exception in method: Service.fail at 1970-01-01T00:00:00.000Z"
        );
        assert_eq!(lines[2], "Exception message: invalid operation: x");
        assert!(lines[3].starts_with("StackTrace: "));
        assert_ne!(lines[3], "StackTrace: disabled backtrace");
        assert_eq!(lines[4], "Exit: Service.fail");
        assert_eq!(sink.lines_with(Severity::Error).len(), 3);
    }

    #[test]
    fn closed_sink_does_not_change_outcome() {
        let sink = Arc::new(MemorySink::new());
        sink.close();
        let registry = registry(&sink);

        let ok = registry
            .weave(&Marker::method::<Service>("get").with::<LogAspect>(), |(): ()| {
                Ok::<_, InvalidOperation>("value")
            })
            .unwrap();
        assert_eq!(ok.call(()), Ok("value"));

        let failing = registry
            .weave(&Marker::method::<Service>("fail").with::<LogAspect>(), |(): ()| {
                Err::<(), _>(InvalidOperation("y".into()))
            })
            .unwrap();
        assert_eq!(failing.call(()), Err(InvalidOperation("y".into())));
        assert!(sink.lines().is_empty());
    }

    /// Panics on every fault line.
    struct PanickingSink;

    impl DiagnosticSink for PanickingSink {
        fn write(&self, severity: Severity, _line: &str) -> Result<(), SinkError> {
            if severity == Severity::Error {
                panic!("sink exploded");
            }
            Ok(())
        }
    }

    #[test]
    fn panicking_sink_does_not_replace_fault() {
        let mut builder = AspectRegistry::builder();
        builder
            .add_aspect(LogAspect::new().with_sink(PanickingSink))
            .unwrap();
        let registry = builder.finish().unwrap();
        let advised = registry
            .weave(&Marker::method::<Service>("fail").with::<LogAspect>(), |(): ()| {
                Err::<(), _>(InvalidOperation("x".into()))
            })
            .unwrap();

        let outcome = catch_unwind(AssertUnwindSafe(|| advised.call(())));
        assert_eq!(outcome.ok(), Some(Err(InvalidOperation("x".into()))));
    }
}
