//! Per-call state threaded through the interception pipeline.
//!
//! - [`Arguments`] - ordered, type-erased argument values handed to Around advice
//! - [`ReturnValue`] - type-erased successful result
//! - [`Fault`] - the original error (or panic payload) raised by the body
//! - [`InvocationContext`] - the single-use state machine of one call
//!
//! Erasure is what lets one Around advice wrap methods of any signature. The
//! pipeline converts back to the concrete types before returning to the
//! caller, moving (never cloning) the original values.

use core::any::Any;
use core::cell::Cell;
use core::fmt;
use std::backtrace::Backtrace;

use thiserror::Error;
use variadics_please::all_tuples;

use crate::marker::JoinPoint;

// ─────────────────────────────────────────────────────────────────────────────
// Arguments
// ─────────────────────────────────────────────────────────────────────────────

/// Errors converting [`Arguments`] back into a method's argument tuple.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    /// The number of arguments does not match the method's arity.
    #[error("expected {expected} argument(s), got {actual}")]
    Arity {
        /// Arity of the method.
        expected: usize,
        /// Number of arguments supplied.
        actual: usize,
    },

    /// An argument has a different type than the method expects.
    #[error("argument {position} has type `{actual}`, expected `{expected}`")]
    Type {
        /// Zero-based argument position.
        position: usize,
        /// Type the method expects.
        expected: &'static str,
        /// Type that was supplied.
        actual: &'static str,
    },
}

/// One type-erased argument value.
struct Argument {
    value: Box<dyn Any + Send>,
    type_name: &'static str,
}

/// Ordered argument values of an intercepted call.
///
/// Around advice receives the call's arguments as `Arguments` and passes them
/// (or a replacement of the same shape) to [`Proceed`](crate::pipeline::Proceed).
#[derive(Default)]
pub struct Arguments {
    values: Vec<Argument>,
}

impl Arguments {
    /// Creates an empty argument list.
    #[must_use]
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Appends an argument value.
    #[must_use]
    pub fn with<T: Any + Send>(mut self, value: T) -> Self {
        self.push(value);
        self
    }

    /// Appends an argument value.
    pub fn push<T: Any + Send>(&mut self, value: T) {
        self.values.push(Argument {
            value: Box::new(value),
            type_name: core::any::type_name::<T>(),
        });
    }

    /// Returns the number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if there are no arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the argument at `position` if it has type `T`.
    #[must_use]
    pub fn get<T: Any>(&self, position: usize) -> Option<&T> {
        self.values
            .get(position)
            .and_then(|argument| argument.value.downcast_ref::<T>())
    }

    /// Returns the type name of the argument at `position`.
    #[must_use]
    pub fn type_name(&self, position: usize) -> Option<&'static str> {
        self.values.get(position).map(|argument| argument.type_name)
    }

    /// Returns the type names of all arguments, in order.
    #[must_use]
    pub fn type_names(&self) -> Vec<&'static str> {
        self.values.iter().map(|argument| argument.type_name).collect()
    }

    /// Converts the arguments back into a typed tuple.
    ///
    /// # Errors
    ///
    /// Returns [`ArgumentError`] if the arity or any argument type differs.
    pub fn into_tuple<A: IntoArguments>(self) -> Result<A, ArgumentError> {
        A::from_arguments(self)
    }

    fn cursor(self, expected: usize) -> Result<ArgumentCursor, ArgumentError> {
        if self.values.len() != expected {
            return Err(ArgumentError::Arity {
                expected,
                actual: self.values.len(),
            });
        }
        Ok(ArgumentCursor {
            values: self.values.into_iter(),
            position: 0,
        })
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.type_names()).finish()
    }
}

/// Moves typed values out of [`Arguments`] in order.
struct ArgumentCursor {
    values: std::vec::IntoIter<Argument>,
    position: usize,
}

impl ArgumentCursor {
    fn take<T: Any>(&mut self) -> Result<T, ArgumentError> {
        let position = self.position;
        self.position += 1;
        let argument = self.values.next().ok_or(ArgumentError::Arity {
            expected: position + 1,
            actual: position,
        })?;
        let type_name = argument.type_name;
        argument
            .value
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| ArgumentError::Type {
                position,
                expected: core::any::type_name::<T>(),
                actual: type_name,
            })
    }
}

/// Argument tuples that can be erased into [`Arguments`] and recovered.
///
/// Implemented for `()` and tuples of up to 12 owned, `Send` values.
pub trait IntoArguments: Sized + Send + 'static {
    /// Erases the tuple into ordered arguments.
    fn into_arguments(self) -> Arguments;

    /// Recovers the tuple from ordered arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ArgumentError`] if the arity or any argument type differs.
    fn from_arguments(arguments: Arguments) -> Result<Self, ArgumentError>;
}

impl IntoArguments for () {
    fn into_arguments(self) -> Arguments {
        Arguments::new()
    }

    fn from_arguments(arguments: Arguments) -> Result<Self, ArgumentError> {
        arguments.cursor(0).map(|_| ())
    }
}

macro_rules! impl_into_arguments_for_tuple {
    ($(($T:ident, $value:ident)),*) => {
        impl<$($T: Any + Send),*> IntoArguments for ($($T,)*) {
            fn into_arguments(self) -> Arguments {
                let ($($value,)*) = self;
                Arguments::new()$(.with($value))*
            }

            fn from_arguments(arguments: Arguments) -> Result<Self, ArgumentError> {
                let mut cursor = arguments.cursor([$(stringify!($value)),*].len())?;
                $(let $value = cursor.take::<$T>()?;)*
                Ok(($($value,)*))
            }
        }
    };
}

// Generate implementations for tuples from 1 to 12 elements
all_tuples!(impl_into_arguments_for_tuple, 1, 12, T, value);

// ─────────────────────────────────────────────────────────────────────────────
// ReturnValue
// ─────────────────────────────────────────────────────────────────────────────

/// Type-erased successful result of an intercepted call.
pub struct ReturnValue {
    value: Box<dyn Any + Send>,
    type_name: &'static str,
}

impl ReturnValue {
    /// Wraps a concrete return value.
    #[must_use]
    pub fn new<R: Any + Send>(value: R) -> Self {
        Self {
            value: Box::new(value),
            type_name: core::any::type_name::<R>(),
        }
    }

    /// Returns the value if it has type `R`.
    #[must_use]
    pub fn downcast_ref<R: Any>(&self) -> Option<&R> {
        self.value.downcast_ref::<R>()
    }

    /// Returns the type name of the wrapped value.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Moves the wrapped value out if it has type `R`.
    ///
    /// # Errors
    ///
    /// Returns `self` unchanged if the value has another type.
    pub fn into_inner<R: Any>(self) -> Result<R, Self> {
        let type_name = self.type_name;
        self.value
            .downcast::<R>()
            .map(|value| *value)
            .map_err(|value| Self { value, type_name })
    }
}

impl fmt::Debug for ReturnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReturnValue")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fault
// ─────────────────────────────────────────────────────────────────────────────

/// What was raised.
enum FaultPayload {
    /// An error value, with its `Display` and `Debug` output taken at capture.
    Error {
        value: Box<dyn Any + Send + 'static>,
        message: String,
        detail: String,
    },
    Panic(Box<dyn Any + Send + 'static>),
}

/// A fault raised by an intercepted method.
///
/// Carries the original error value (or panic payload) unchanged, together
/// with a backtrace captured where the fault entered the pipeline. A fault is
/// only ever moved; [`into_error`](Self::into_error) hands back the very value
/// the method raised.
///
/// Any `Display + Debug` type can be raised, so `Box<dyn Error + Send + Sync>`,
/// `String` and `anyhow`-style errors work as well as `thiserror` enums.
pub struct Fault {
    payload: FaultPayload,
    type_name: &'static str,
    backtrace: Backtrace,
}

impl Fault {
    /// Wraps an error raised by a method body.
    #[must_use]
    pub fn from_error<E>(error: E) -> Self
    where
        E: fmt::Display + fmt::Debug + Send + 'static,
    {
        Self {
            payload: FaultPayload::Error {
                message: error.to_string(),
                detail: format!("{error:?}"),
                value: Box::new(error),
            },
            type_name: core::any::type_name::<E>(),
            backtrace: Backtrace::force_capture(),
        }
    }

    /// Wraps the payload of a panic raised by a method body.
    #[must_use]
    pub fn from_panic(payload: Box<dyn Any + Send + 'static>) -> Self {
        Self {
            payload: FaultPayload::Panic(payload),
            type_name: "panic",
            backtrace: Backtrace::force_capture(),
        }
    }

    /// Returns the type name of the raised error, or `"panic"`.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns true if the fault is a panic rather than an error value.
    #[must_use]
    pub fn is_panic(&self) -> bool {
        matches!(self.payload, FaultPayload::Panic(_))
    }

    /// Returns the fault's message.
    ///
    /// For errors this is their `Display` output; for panics, the panic
    /// message when it is a string.
    #[must_use]
    pub fn message(&self) -> String {
        match &self.payload {
            FaultPayload::Error { message, .. } => message.clone(),
            FaultPayload::Panic(payload) => panic_message(payload.as_ref()).to_string(),
        }
    }

    /// Returns the error's `Debug` output, or the panic message.
    #[must_use]
    pub fn detail(&self) -> String {
        match &self.payload {
            FaultPayload::Error { detail, .. } => detail.clone(),
            FaultPayload::Panic(payload) => panic_message(payload.as_ref()).to_string(),
        }
    }

    /// Returns the backtrace captured when the fault entered the pipeline.
    ///
    /// Captured unconditionally, whatever `RUST_BACKTRACE` says.
    #[must_use]
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// Renders the backtrace for diagnostic output.
    #[must_use]
    pub fn trace(&self) -> String {
        self.backtrace.to_string()
    }

    /// Returns true if the raised error has type `E`.
    #[must_use]
    pub fn is<E: Any>(&self) -> bool {
        self.downcast_ref::<E>().is_some()
    }

    /// Returns the raised error if it has type `E`.
    #[must_use]
    pub fn downcast_ref<E: Any>(&self) -> Option<&E> {
        match &self.payload {
            FaultPayload::Error { value, .. } => value.downcast_ref::<E>(),
            FaultPayload::Panic(_) => None,
        }
    }

    /// Moves the original error out if it has type `E`.
    ///
    /// # Errors
    ///
    /// Returns `self` unchanged for panics and errors of another type.
    pub fn into_error<E: Any>(self) -> Result<E, Self> {
        let Self {
            payload,
            type_name,
            backtrace,
        } = self;
        match payload {
            FaultPayload::Error {
                value,
                message,
                detail,
            } => match value.downcast::<E>() {
                Ok(error) => Ok(*error),
                Err(value) => Err(Self {
                    payload: FaultPayload::Error {
                        value,
                        message,
                        detail,
                    },
                    type_name,
                    backtrace,
                }),
            },
            payload @ FaultPayload::Panic(_) => Err(Self {
                payload,
                type_name,
                backtrace,
            }),
        }
    }

    /// Moves the panic payload out.
    ///
    /// # Errors
    ///
    /// Returns `self` unchanged if the fault is an error value.
    pub fn into_panic(self) -> Result<Box<dyn Any + Send + 'static>, Self> {
        let Self {
            payload,
            type_name,
            backtrace,
        } = self;
        match payload {
            FaultPayload::Panic(payload) => Ok(payload),
            payload @ FaultPayload::Error { .. } => Err(Self {
                payload,
                type_name,
                backtrace,
            }),
        }
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fault")
            .field("type_name", &self.type_name)
            .field("detail", &self.detail())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl From<ArgumentError> for Fault {
    fn from(error: ArgumentError) -> Self {
        Self::from_error(error)
    }
}

/// Extracts the message of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// InvocationContext
// ─────────────────────────────────────────────────────────────────────────────

/// Phase of one intercepted call.
///
/// Phases only move forward:
/// `Idle → BeforeRunning → UnderlyingRunning → (AroundCatch →)? AfterRunning → Returned | Raised`.
/// `UnderlyingRunning` and `AroundCatch` are skipped when an Around advice
/// never proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InvocationPhase {
    /// Context created, no advice run yet.
    Idle,
    /// Before advice is running.
    BeforeRunning,
    /// The method body is running.
    UnderlyingRunning,
    /// The body raised and the fault is flowing back through Around advice.
    AroundCatch,
    /// After advice is running.
    AfterRunning,
    /// The call returned a value.
    Returned,
    /// The call raised a fault.
    Raised,
}

impl InvocationPhase {
    /// Returns true for `Returned` and `Raised`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Returned | Self::Raised)
    }
}

/// Per-call state of an intercepted invocation.
///
/// Owned by exactly one in-flight call and consumed when the call
/// terminates. Not `Sync`: the phase is tracked through a [`Cell`] so the
/// body handle can advance it while Around advice holds a shared reference.
#[derive(Debug)]
pub struct InvocationContext {
    join_point: JoinPoint,
    phase: Cell<InvocationPhase>,
}

impl InvocationContext {
    /// Creates a context in the `Idle` phase.
    #[must_use]
    pub fn new(join_point: JoinPoint) -> Self {
        Self {
            join_point,
            phase: Cell::new(InvocationPhase::Idle),
        }
    }

    /// Returns the intercepted join point.
    #[must_use]
    pub fn join_point(&self) -> &JoinPoint {
        &self.join_point
    }

    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> InvocationPhase {
        self.phase.get()
    }

    /// Moves the call to `next`.
    ///
    /// Backward moves and moves out of a terminal phase are rejected and
    /// reported; the phase is left unchanged.
    pub fn advance(&self, next: InvocationPhase) -> bool {
        let current = self.phase.get();
        let legal = !current.is_terminal() && next > current;
        debug_assert!(
            legal,
            "illegal invocation phase transition {current:?} -> {next:?} on {}",
            self.join_point
        );
        if !legal {
            tracing::warn!(
                join_point = %self.join_point,
                from = ?current,
                to = ?next,
                "illegal invocation phase transition"
            );
            return false;
        }
        tracing::trace!(join_point = %self.join_point, phase = ?next, "invocation phase");
        self.phase.set(next);
        true
    }

    /// Terminates the call, consuming the context.
    pub fn finish(self, outcome: InvocationPhase) -> InvocationPhase {
        debug_assert!(outcome.is_terminal(), "{outcome:?} is not a terminal phase");
        self.advance(outcome);
        self.phase.get()
    }
}

#[cfg(test)]
mod tests {
    use std::backtrace::BacktraceStatus;

    use super::*;

    #[derive(Debug, PartialEq, Eq, Error)]
    #[error("invalid operation: {0}")]
    struct InvalidOperation(String);

    #[derive(Debug, Error)]
    #[error("wrapper")]
    struct Wrapper(#[source] InvalidOperation);

    struct Service;

    #[test]
    fn arguments_round_trip_through_tuple() {
        let arguments = (7_u32, "north".to_string()).into_arguments();
        assert_eq!(arguments.len(), 2);
        assert_eq!(arguments.get::<u32>(0), Some(&7));
        assert_eq!(arguments.get::<String>(1).map(String::as_str), Some("north"));
        assert_eq!(arguments.get::<u64>(0), None);

        let (days, region): (u32, String) = arguments.into_tuple().unwrap();
        assert_eq!(days, 7);
        assert_eq!(region, "north");
    }

    #[test]
    fn unit_arguments_are_empty() {
        let arguments = ().into_arguments();
        assert!(arguments.is_empty());
        <()>::from_arguments(arguments).unwrap();
    }

    #[test]
    fn arguments_reject_wrong_arity() {
        let arguments = Arguments::new().with(1_u8);
        let result = <(u8, u8)>::from_arguments(arguments);
        assert_eq!(
            result.unwrap_err(),
            ArgumentError::Arity {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn arguments_reject_wrong_type() {
        let arguments = Arguments::new().with(1_u8).with("text");
        let result = <(u8, String)>::from_arguments(arguments);
        match result.unwrap_err() {
            ArgumentError::Type {
                position, actual, ..
            } => {
                assert_eq!(position, 1);
                assert_eq!(actual, "&str");
            }
            other => panic!("expected type mismatch, got {other:?}"),
        }
    }

    #[test]
    fn return_value_downcasts() {
        let value = ReturnValue::new(vec![1, 2, 3]);
        assert_eq!(value.downcast_ref::<Vec<i32>>(), Some(&vec![1, 2, 3]));
        let value = value.into_inner::<String>().unwrap_err();
        assert_eq!(value.into_inner::<Vec<i32>>().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn fault_preserves_original_error() {
        let fault = Fault::from_error(InvalidOperation("x".into()));
        assert!(fault.is::<InvalidOperation>());
        assert!(!fault.is_panic());
        assert_eq!(fault.message(), "invalid operation: x");
        assert!(fault.type_name().ends_with("InvalidOperation"));

        let fault = fault.into_error::<ArgumentError>().unwrap_err();
        assert_eq!(
            fault.into_error::<InvalidOperation>().unwrap(),
            InvalidOperation("x".into())
        );
    }

    #[test]
    fn fault_detail_keeps_wrapped_error() {
        let fault = Fault::from_error(Wrapper(InvalidOperation("inner".into())));
        assert_eq!(fault.message(), "wrapper");
        assert_eq!(fault.detail(), r#"Wrapper(InvalidOperation("inner"))"#);
    }

    #[test]
    fn fault_captures_backtrace_without_env() {
        let fault = Fault::from_error(InvalidOperation("x".into()));
        assert_eq!(fault.backtrace().status(), BacktraceStatus::Captured);
        assert!(!fault.trace().is_empty());
        assert_ne!(fault.trace(), "disabled backtrace");
    }

    #[test]
    fn fault_accepts_errors_without_error_impl() {
        let boxed: Box<dyn core::error::Error + Send + Sync> = "parse failed".into();
        let fault = Fault::from_error(boxed);
        assert_eq!(fault.message(), "parse failed");
        let boxed = fault
            .into_error::<Box<dyn core::error::Error + Send + Sync>>()
            .unwrap();
        assert_eq!(boxed.to_string(), "parse failed");

        let fault = Fault::from_error(String::from("plain"));
        assert_eq!(fault.message(), "plain");
        assert_eq!(fault.detail(), r#""plain""#);
        assert_eq!(fault.into_error::<String>().unwrap(), "plain");
    }

    #[test]
    fn fault_from_panic_payload() {
        let fault = Fault::from_panic(Box::new("boom"));
        assert!(fault.is_panic());
        assert_eq!(fault.message(), "boom");
        assert!(fault.downcast_ref::<InvalidOperation>().is_none());

        let payload = fault.into_panic().unwrap();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"boom"));

        let fault = Fault::from_panic(Box::new(String::from("owned")));
        assert_eq!(fault.message(), "owned");
        assert!(fault.into_error::<InvalidOperation>().is_err());
    }

    #[test]
    fn context_moves_forward_only() {
        let ctx = InvocationContext::new(JoinPoint::method::<Service>("get"));
        assert_eq!(ctx.phase(), InvocationPhase::Idle);
        assert!(ctx.advance(InvocationPhase::BeforeRunning));
        assert!(ctx.advance(InvocationPhase::UnderlyingRunning));
        assert!(ctx.advance(InvocationPhase::AfterRunning));
        assert_eq!(ctx.join_point().method_name(), "get");
        assert_eq!(
            ctx.finish(InvocationPhase::Returned),
            InvocationPhase::Returned
        );
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "illegal invocation phase"))]
    fn context_rejects_backward_moves() {
        let ctx = InvocationContext::new(JoinPoint::method::<Service>("get"));
        ctx.advance(InvocationPhase::AfterRunning);
        assert!(!ctx.advance(InvocationPhase::BeforeRunning));
    }
}
