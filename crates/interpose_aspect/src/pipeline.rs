//! The interception pipeline.
//!
//! An [`Advised`] wraps one method body with the advice resolved for its join
//! point. Every call runs through the same fixed sequence:
//!
//! 1. Before advice, in registration order. Failures are reported and ignored.
//! 2. The Around chain. The first registered Around advice is outermost; each
//!    one reaches the next (and finally the body) through [`Proceed`]. With no
//!    Around advice the body is called directly.
//! 3. After advice, in registration order, whether the body returned or raised.
//! 4. The outcome is handed back to the caller unchanged: the same value, or
//!    the very error the body raised. Panics are resumed after After advice ran.

use core::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::sync::Arc;

use crate::advice::{Advice, Handler};
use crate::context::{
    Arguments, Fault, IntoArguments, InvocationContext, InvocationPhase, ReturnValue,
    panic_message,
};
use crate::marker::JoinPoint;
use crate::registry::ResolvedAdvice;

type Body<A, R, E> = dyn Fn(A) -> Result<R, E> + Send + Sync;

type Next<'a> = dyn Fn(Arguments) -> Result<ReturnValue, Fault> + 'a;

// ─────────────────────────────────────────────────────────────────────────────
// Proceed
// ─────────────────────────────────────────────────────────────────────────────

/// Handle through which an Around advice continues the call.
///
/// Invoking it runs the next Around advice, or the method body when this is
/// the innermost one. Not invoking it skips the body; the advice must then
/// produce the result itself.
pub struct Proceed<'a> {
    join_point: &'a JoinPoint,
    next: &'a Next<'a>,
}

impl<'a> Proceed<'a> {
    /// Continues the call with `arguments`.
    ///
    /// # Errors
    ///
    /// Returns the [`Fault`] raised further down the chain, unchanged. Passing
    /// arguments of a different shape than the method's yields a fault
    /// wrapping [`ArgumentError`](crate::context::ArgumentError).
    pub fn invoke(&self, arguments: Arguments) -> Result<ReturnValue, Fault> {
        (self.next)(arguments)
    }

    /// Returns the intercepted join point.
    #[must_use]
    pub fn join_point(&self) -> &'a JoinPoint {
        self.join_point
    }
}

impl fmt::Debug for Proceed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proceed")
            .field("join_point", self.join_point)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Advised
// ─────────────────────────────────────────────────────────────────────────────

/// A method body woven with its advice.
///
/// `A` is the argument tuple, `R` the success type and `E` the error type of
/// the method. Cloning shares the body and the resolved advice.
pub struct Advised<A, R, E> {
    join_point: JoinPoint,
    advice: Arc<ResolvedAdvice>,
    body: Arc<Body<A, R, E>>,
}

impl<A, R, E> Clone for Advised<A, R, E> {
    fn clone(&self) -> Self {
        Self {
            join_point: self.join_point,
            advice: Arc::clone(&self.advice),
            body: Arc::clone(&self.body),
        }
    }
}

impl<A, R, E> fmt::Debug for Advised<A, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Advised")
            .field("join_point", &self.join_point)
            .field("advice", &self.advice)
            .finish_non_exhaustive()
    }
}

impl<A, R, E> Advised<A, R, E>
where
    A: IntoArguments,
    R: Send + 'static,
    E: fmt::Display + fmt::Debug + Send + 'static,
{
    pub(crate) fn new<F>(join_point: JoinPoint, advice: ResolvedAdvice, body: F) -> Self
    where
        F: Fn(A) -> Result<R, E> + Send + Sync + 'static,
    {
        Self {
            join_point,
            advice: Arc::new(advice),
            body: Arc::new(body),
        }
    }

    /// Returns the intercepted join point.
    #[must_use]
    pub fn join_point(&self) -> &JoinPoint {
        &self.join_point
    }

    /// Returns the advice this method was woven with.
    #[must_use]
    pub fn advice(&self) -> &ResolvedAdvice {
        &self.advice
    }

    /// Calls the method through its advice.
    ///
    /// # Errors
    ///
    /// Returns the error the method body raised, as the same value.
    ///
    /// # Panics
    ///
    /// Resumes a panic raised by the body or by Around advice once After advice
    /// has run. Also panics if an Around advice returns a value or raises an
    /// error whose type the method cannot return.
    pub fn call(&self, arguments: A) -> Result<R, E> {
        let span = tracing::trace_span!("intercept", join_point = %self.join_point);
        let _enter = span.enter();

        let ctx = InvocationContext::new(self.join_point);

        ctx.advance(InvocationPhase::BeforeRunning);
        observe(&self.join_point, &self.advice.before);

        let outcome = if self.advice.around.is_empty() {
            self.call_body(&ctx, arguments)
        } else {
            self.call_around(&ctx, arguments)
        };

        ctx.advance(InvocationPhase::AfterRunning);
        observe(&self.join_point, &self.advice.after);

        match outcome {
            Outcome::Returned(value) => {
                ctx.finish(InvocationPhase::Returned);
                Ok(value)
            }
            Outcome::Raised(error) => {
                ctx.finish(InvocationPhase::Raised);
                Err(error)
            }
            Outcome::Panicked(payload) => {
                ctx.finish(InvocationPhase::Raised);
                resume_unwind(payload)
            }
        }
    }

    /// Direct call, used when no Around advice applies.
    fn call_body(&self, ctx: &InvocationContext, arguments: A) -> Outcome<R, E> {
        ctx.advance(InvocationPhase::UnderlyingRunning);
        match catch_unwind(AssertUnwindSafe(|| (self.body)(arguments))) {
            Ok(Ok(value)) => Outcome::Returned(value),
            Ok(Err(error)) => Outcome::Raised(error),
            Err(payload) => Outcome::Panicked(payload),
        }
    }

    /// Type-erased call through the Around chain.
    fn call_around(&self, ctx: &InvocationContext, arguments: A) -> Outcome<R, E> {
        let innermost = |arguments: Arguments| -> Result<ReturnValue, Fault> {
            let arguments = A::from_arguments(arguments)?;
            if ctx.phase() < InvocationPhase::UnderlyingRunning {
                ctx.advance(InvocationPhase::UnderlyingRunning);
            }
            let fault = match catch_unwind(AssertUnwindSafe(|| (self.body)(arguments))) {
                Ok(Ok(value)) => return Ok(ReturnValue::new(value)),
                Ok(Err(error)) => Fault::from_error(error),
                Err(payload) => Fault::from_panic(payload),
            };
            if ctx.phase() < InvocationPhase::AroundCatch {
                ctx.advance(InvocationPhase::AroundCatch);
            }
            Err(fault)
        };

        let result = catch_unwind(AssertUnwindSafe(|| {
            run_around(
                &self.join_point,
                &self.advice.around,
                &innermost,
                arguments.into_arguments(),
            )
        }))
        .unwrap_or_else(|payload| Err(Fault::from_panic(payload)));

        match result {
            Ok(value) => match value.into_inner::<R>() {
                Ok(value) => Outcome::Returned(value),
                Err(value) => panic!(
                    "Around advice on {} returned `{}`, expected `{}`",
                    self.join_point,
                    value.type_name(),
                    core::any::type_name::<R>()
                ),
            },
            Err(fault) if fault.is_panic() => match fault.into_panic() {
                Ok(payload) => Outcome::Panicked(payload),
                Err(fault) => Outcome::Panicked(Box::new(fault.message())),
            },
            Err(fault) => match fault.into_error::<E>() {
                Ok(error) => Outcome::Raised(error),
                Err(fault) => panic!(
                    "Around advice on {} raised `{}` ({}), expected `{}`",
                    self.join_point,
                    fault.type_name(),
                    fault.message(),
                    core::any::type_name::<E>()
                ),
            },
        }
    }
}

/// Terminal result of the body, before it is handed to the caller.
enum Outcome<R, E> {
    Returned(R),
    Raised(E),
    Panicked(Box<dyn core::any::Any + Send + 'static>),
}

/// Runs `around[0]` with a [`Proceed`] leading to the rest of the chain.
fn run_around(
    join_point: &JoinPoint,
    around: &[Advice],
    innermost: &Next<'_>,
    arguments: Arguments,
) -> Result<ReturnValue, Fault> {
    let Some((advice, rest)) = around.split_first() else {
        return innermost(arguments);
    };
    let Handler::Around(handler) = advice.handler() else {
        return run_around(join_point, rest, innermost, arguments);
    };

    let next = |arguments: Arguments| run_around(join_point, rest, innermost, arguments);
    let proceed = Proceed {
        join_point,
        next: &next,
    };
    tracing::trace!(join_point = %join_point, advice = advice.name(), "around");
    handler(join_point, &proceed, arguments)
}

/// Runs Before or After advice, isolating their failures from the call.
fn observe(join_point: &JoinPoint, advice: &[Advice]) {
    for advice in advice {
        let (Handler::Before(handler) | Handler::After(handler)) = advice.handler() else {
            continue;
        };
        match catch_unwind(AssertUnwindSafe(|| handler(join_point))) {
            Ok(Ok(())) => {}
            Ok(Err(error)) => tracing::warn!(
                target: "interpose::advice",
                join_point = %join_point,
                advice = advice.name(),
                kind = %advice.kind(),
                %error,
                "advice failed"
            ),
            Err(payload) => tracing::warn!(
                target: "interpose::advice",
                join_point = %join_point,
                advice = advice.name(),
                kind = %advice.kind(),
                panic = panic_message(payload.as_ref()),
                "advice panicked"
            ),
        }
    }
}
