//! Advice definitions.
//!
//! An [`Advice`] is one unit of cross-cutting behavior: a kind, a name, a
//! [`TargetSelector`] and a handler. Aspects contribute advice through an
//! [`AdviceSet`] when they are registered.
//!
//! # Handler Shapes
//!
//! - **Before / After**: `Fn(&JoinPoint) -> Result<(), AdviceError>`. These are
//!   strictly observational; a failing handler never changes the call's outcome.
//! - **Around**: `Fn(&JoinPoint, &Proceed, Arguments) -> Result<ReturnValue, Fault>`.
//!   The handler decides whether and how to invoke the method body through
//!   [`Proceed`], and returns its result or propagates its fault.
//!
//! # Example
//!
//! ```
//! use interpose_aspect::advice::Advice;
//! use interpose_aspect::selector::MethodNamed;
//!
//! let enter = Advice::before("enter", |join_point| {
//!     tracing::debug!("Enter: {join_point}");
//!     Ok(())
//! });
//!
//! let guard = Advice::around("guard", |join_point, proceed, arguments| {
//!     let outcome = proceed.invoke(arguments);
//!     if let Err(fault) = &outcome {
//!         tracing::error!("{join_point} raised: {fault}");
//!     }
//!     outcome
//! })
//! .with_selector(MethodNamed::new(["get"]));
//! ```

use core::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::aspect::AspectId;
use crate::context::{Arguments, Fault, ReturnValue};
use crate::marker::JoinPoint;
use crate::pipeline::Proceed;
use crate::registry::RegistrationError;
use crate::selector::{AnyMarked, TargetSelector};

// ─────────────────────────────────────────────────────────────────────────────
// AdviceKind
// ─────────────────────────────────────────────────────────────────────────────

/// When an advice runs relative to the method body.
///
/// The declaration order is the execution order within one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AdviceKind {
    /// Runs before the body.
    Before,
    /// Wraps the body and controls whether it runs.
    Around,
    /// Runs after the body, on success and on fault.
    After,
}

impl fmt::Display for AdviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Before => "before",
            Self::Around => "around",
            Self::After => "after",
        };
        f.write_str(kind)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AdviceError
// ─────────────────────────────────────────────────────────────────────────────

/// Failure of an observational (Before/After) advice handler.
///
/// The pipeline reports these through `tracing` and otherwise ignores them.
#[derive(Debug, Error)]
pub enum AdviceError {
    /// The diagnostic sink could not be written.
    #[error("diagnostic sink failed: {0}")]
    Sink(String),

    /// Any other handler failure.
    #[error("{0}")]
    Other(String),
}

impl AdviceError {
    /// Creates a [`Sink`](Self::Sink) error.
    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }

    /// Creates an [`Other`](Self::Other) error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

type ObserverFn = dyn Fn(&JoinPoint) -> Result<(), AdviceError> + Send + Sync;

type AroundFn =
    dyn Fn(&JoinPoint, &Proceed<'_>, Arguments) -> Result<ReturnValue, Fault> + Send + Sync;

/// Type-erased advice handler.
#[derive(Clone)]
pub(crate) enum Handler {
    Before(Arc<ObserverFn>),
    Around(Arc<AroundFn>),
    After(Arc<ObserverFn>),
}

// ─────────────────────────────────────────────────────────────────────────────
// Advice
// ─────────────────────────────────────────────────────────────────────────────

/// A unit of cross-cutting behavior.
///
/// Immutable once registered. Cloning is cheap: the handler and selector are
/// shared.
#[derive(Clone)]
pub struct Advice {
    name: String,
    handler: Handler,
    selector: Arc<dyn TargetSelector>,
    /// Owning aspect and registration sequence, set by the registry.
    pub(crate) aspect: Option<AspectId>,
    pub(crate) sequence: u64,
}

impl Advice {
    fn with_handler(name: impl Into<String>, handler: Handler) -> Self {
        Self {
            name: name.into(),
            handler,
            selector: Arc::new(AnyMarked),
            aspect: None,
            sequence: 0,
        }
    }

    /// Creates a Before advice.
    pub fn before<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&JoinPoint) -> Result<(), AdviceError> + Send + Sync + 'static,
    {
        Self::with_handler(name, Handler::Before(Arc::new(handler)))
    }

    /// Creates an After advice.
    pub fn after<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&JoinPoint) -> Result<(), AdviceError> + Send + Sync + 'static,
    {
        Self::with_handler(name, Handler::After(Arc::new(handler)))
    }

    /// Creates an Around advice.
    pub fn around<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&JoinPoint, &Proceed<'_>, Arguments) -> Result<ReturnValue, Fault>
            + Send
            + Sync
            + 'static,
    {
        Self::with_handler(name, Handler::Around(Arc::new(handler)))
    }

    /// Restricts the advice to join points matched by `selector`.
    ///
    /// The default selector is [`AnyMarked`].
    #[must_use]
    pub fn with_selector(mut self, selector: impl TargetSelector) -> Self {
        self.selector = Arc::new(selector);
        self
    }

    /// Returns the advice name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the advice kind.
    #[must_use]
    pub fn kind(&self) -> AdviceKind {
        match self.handler {
            Handler::Before(_) => AdviceKind::Before,
            Handler::Around(_) => AdviceKind::Around,
            Handler::After(_) => AdviceKind::After,
        }
    }

    /// Returns the aspect that registered this advice, once registered.
    #[must_use]
    pub fn aspect(&self) -> Option<AspectId> {
        self.aspect
    }

    /// Returns the global registration sequence number.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns true if the advice applies to `join_point`.
    #[must_use]
    pub fn applies_to(&self, join_point: &JoinPoint) -> bool {
        self.selector.matches(join_point)
    }

    pub(crate) fn handler(&self) -> &Handler {
        &self.handler
    }
}

impl fmt::Debug for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Advice")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("selector", &self.selector.describe())
            .field("aspect", &self.aspect.map(|id| id.short_name()))
            .field("sequence", &self.sequence)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AdviceSet
// ─────────────────────────────────────────────────────────────────────────────

/// Collects the advice of one aspect during registration.
///
/// Handed to [`Aspect::advise`](crate::aspect::Aspect::advise). Each added
/// advice receives the next global sequence number, which fixes its order
/// among peers of the same kind.
pub struct AdviceSet<'a> {
    aspect: AspectId,
    entries: Vec<Advice>,
    next_sequence: &'a mut u64,
}

impl<'a> AdviceSet<'a> {
    pub(crate) fn new(aspect: AspectId, next_sequence: &'a mut u64) -> Self {
        Self {
            aspect,
            entries: Vec::new(),
            next_sequence,
        }
    }

    /// Adds an advice.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::DuplicateAdvice`] if this aspect already
    /// registered an advice with the same name.
    pub fn add(&mut self, mut advice: Advice) -> Result<&mut Self, RegistrationError> {
        if self.contains(advice.name()) {
            return Err(RegistrationError::DuplicateAdvice {
                aspect: self.aspect.type_name(),
                name: advice.name,
            });
        }

        advice.aspect = Some(self.aspect);
        advice.sequence = *self.next_sequence;
        *self.next_sequence += 1;
        self.entries.push(advice);
        Ok(self)
    }

    /// Returns true if an advice with `name` was added to this set.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|advice| advice.name() == name)
    }

    /// Returns the aspect this set collects advice for.
    #[must_use]
    pub fn aspect(&self) -> AspectId {
        self.aspect
    }

    /// Returns the number of advice added so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no advice was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<Advice> {
        self.entries
    }
}
