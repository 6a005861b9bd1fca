//! Advice registry.
//!
//! The registry uses a two-phase lifecycle: an [`AspectRegistryBuilder`] is
//! mutable while aspects and markers are declared at startup, and
//! [`finish()`](AspectRegistryBuilder::finish) validates every marker and
//! freezes it into a read-only [`AspectRegistry`].
//!
//! The frozen registry is an explicit dependency: it is passed to whoever
//! weaves methods, never reached through global state.
//!
//! # Usage
//!
//! ```ignore
//! let mut builder = AspectRegistry::builder();
//! builder.add_aspect(LogAspect::default())?;
//! builder.mark_type::<WeatherForecastService>();
//! let registry = builder.finish()?;
//!
//! let service = WeatherForecastService::default().weave(&registry)?;
//! let forecasts = service.get();
//! ```

use core::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;

use crate::advice::{Advice, AdviceKind, AdviceSet};
use crate::aspect::{Aspect, AspectId};
use crate::context::IntoArguments;
use crate::marker::{JoinPoint, Marked, Marker};
use crate::pipeline::Advised;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur while registering aspects and advice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// The aspect type was already added.
    #[error("aspect '{name}' is already registered")]
    DuplicateAspect {
        /// The aspect's type name.
        name: &'static str,
    },

    /// An advice with this name already exists in the aspect.
    #[error("advice '{name}' already registered for aspect '{aspect}'")]
    DuplicateAdvice {
        /// The aspect's type name.
        aspect: &'static str,
        /// The duplicate advice name.
        name: String,
    },
}

/// Configuration faults detected when markers are validated or woven.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeaveError {
    /// A marker references an aspect that was never registered.
    #[error("marker on {join_point} references unregistered aspect '{aspect}'")]
    UnregisteredAspect {
        /// `<Type>.<method>` of the marked join point.
        join_point: String,
        /// The missing aspect's type name.
        aspect: &'static str,
    },

    /// Startup validation found one or more invalid markers.
    #[error("{} marker(s) failed validation: {}", .0.len(), join_errors(.0))]
    Validation(Vec<WeaveError>),
}

impl WeaveError {
    /// Returns the individual faults, flattening [`Validation`](Self::Validation).
    #[must_use]
    pub fn faults(&self) -> Vec<&WeaveError> {
        match self {
            Self::Validation(errors) => errors.iter().flat_map(WeaveError::faults).collect(),
            other => vec![other],
        }
    }
}

fn join_errors(errors: &[WeaveError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ─────────────────────────────────────────────────────────────────────────────
// ResolvedAdvice
// ─────────────────────────────────────────────────────────────────────────────

/// Advice applicable to one join point, grouped by kind.
///
/// Within each kind, advice is sorted by registration sequence.
#[derive(Debug, Clone, Default)]
pub struct ResolvedAdvice {
    pub(crate) before: Vec<Advice>,
    pub(crate) around: Vec<Advice>,
    pub(crate) after: Vec<Advice>,
}

impl ResolvedAdvice {
    /// Returns the advice of one kind, in execution order.
    #[must_use]
    pub fn of_kind(&self, kind: AdviceKind) -> &[Advice] {
        match kind {
            AdviceKind::Before => &self.before,
            AdviceKind::Around => &self.around,
            AdviceKind::After => &self.after,
        }
    }

    /// Returns the names of the advice of one kind, in execution order.
    #[must_use]
    pub fn names(&self, kind: AdviceKind) -> Vec<&str> {
        self.of_kind(kind).iter().map(Advice::name).collect()
    }

    /// Returns all advice in execution order (Before, Around, After).
    pub fn iter(&self) -> impl Iterator<Item = &Advice> {
        self.before
            .iter()
            .chain(self.around.iter())
            .chain(self.after.iter())
    }

    /// Returns the total number of resolved advice.
    #[must_use]
    pub fn len(&self) -> usize {
        self.before.len() + self.around.len() + self.after.len()
    }

    /// Returns true if no advice applies; interception is then a pass-through.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AspectRegistryBuilder
// ─────────────────────────────────────────────────────────────────────────────

/// Registered aspect and its advice.
struct AspectEntry {
    /// Human-readable name for debugging and logging.
    name: String,
    advice: Vec<Advice>,
}

/// Mutable registry used during startup.
///
/// Aspects are added with [`add_aspect`](Self::add_aspect); markers to validate
/// are declared with [`mark`](Self::mark) or [`mark_type`](Self::mark_type).
#[derive(Default)]
pub struct AspectRegistryBuilder {
    aspects: IndexMap<AspectId, AspectEntry>,
    markers: Vec<Marker>,
    next_sequence: u64,
}

impl AspectRegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an aspect and all advice it contributes.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::DuplicateAspect`] if the aspect type was already added
    /// - [`RegistrationError::DuplicateAdvice`] if the aspect adds two advice
    ///   with the same name
    pub fn add_aspect<A: Aspect>(&mut self, aspect: A) -> Result<&mut Self, RegistrationError> {
        let id = AspectId::of::<A>();
        if self.aspects.contains_key(&id) {
            return Err(RegistrationError::DuplicateAspect {
                name: id.type_name(),
            });
        }

        // Sequence numbers are only committed when the whole aspect registers.
        let mut next_sequence = self.next_sequence;
        let mut set = AdviceSet::new(id, &mut next_sequence);
        aspect.advise(&mut set)?;
        let advice = set.into_entries();
        self.next_sequence = next_sequence;

        tracing::debug!(
            aspect = aspect.name(),
            advice = advice.len(),
            "aspect registered"
        );

        self.aspects.insert(
            id,
            AspectEntry {
                name: aspect.name().to_string(),
                advice,
            },
        );
        Ok(self)
    }

    /// Declares a marker to be validated by [`finish`](Self::finish).
    pub fn mark(&mut self, marker: Marker) -> &mut Self {
        self.markers.push(marker);
        self
    }

    /// Declares every marker of a [`Marked`] type.
    pub fn mark_type<T: Marked>(&mut self) -> &mut Self {
        self.markers.extend(T::markers());
        self
    }

    /// Returns true if the aspect type was added.
    #[must_use]
    pub fn contains_aspect<A: Aspect>(&self) -> bool {
        self.aspects.contains_key(&AspectId::of::<A>())
    }

    /// Validates all declared markers and freezes the registry.
    ///
    /// # Errors
    ///
    /// Returns [`WeaveError::Validation`] listing every marker reference to an
    /// unregistered aspect.
    pub fn finish(self) -> Result<AspectRegistry, WeaveError> {
        let errors: Vec<WeaveError> = self
            .markers
            .iter()
            .flat_map(|marker| unregistered(&self.aspects, marker))
            .collect();

        if !errors.is_empty() {
            tracing::error!(count = errors.len(), "marker validation failed");
            return Err(WeaveError::Validation(errors));
        }

        tracing::debug!(
            aspects = self.aspects.len(),
            markers = self.markers.len(),
            "aspect registry ready"
        );

        Ok(AspectRegistry {
            inner: Arc::new(RegistryInner {
                aspects: self.aspects,
                markers: self.markers,
            }),
        })
    }
}

/// Returns one error per aspect the marker references but `aspects` lacks.
fn unregistered(aspects: &IndexMap<AspectId, AspectEntry>, marker: &Marker) -> Vec<WeaveError> {
    marker
        .aspects()
        .iter()
        .filter(|id| !aspects.contains_key(*id))
        .map(|id| WeaveError::UnregisteredAspect {
            join_point: marker.join_point().to_string(),
            aspect: id.type_name(),
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// AspectRegistry
// ─────────────────────────────────────────────────────────────────────────────

struct RegistryInner {
    aspects: IndexMap<AspectId, AspectEntry>,
    markers: Vec<Marker>,
}

/// Read-only registry of aspects, built once at startup.
///
/// Cheap to clone and safe to share across threads.
#[derive(Clone)]
pub struct AspectRegistry {
    inner: Arc<RegistryInner>,
}

impl fmt::Debug for AspectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AspectRegistry")
            .field("aspects", &self.aspect_names())
            .field("markers", &self.inner.markers.len())
            .finish()
    }
}

impl AspectRegistry {
    /// Creates a builder for a new registry.
    #[must_use]
    pub fn builder() -> AspectRegistryBuilder {
        AspectRegistryBuilder::new()
    }

    /// Resolves the advice applicable to a marker's join point.
    ///
    /// Only advice of the aspects the marker references and whose selector
    /// matches the join point is returned. Unknown aspects are skipped; they
    /// are rejected by [`finish`](AspectRegistryBuilder::finish) and
    /// [`weave`](Self::weave).
    #[must_use]
    pub fn resolve(&self, marker: &Marker) -> ResolvedAdvice {
        let join_point = marker.join_point();
        let mut matching: Vec<&Advice> = marker
            .aspects()
            .iter()
            .filter_map(|id| self.inner.aspects.get(id))
            .flat_map(|entry| entry.advice.iter())
            .filter(|advice| advice.applies_to(join_point))
            .collect();
        matching.sort_by_key(|advice| advice.sequence());

        let mut resolved = ResolvedAdvice::default();
        for advice in matching {
            let bucket = match advice.kind() {
                AdviceKind::Before => &mut resolved.before,
                AdviceKind::Around => &mut resolved.around,
                AdviceKind::After => &mut resolved.after,
            };
            bucket.push(advice.clone());
        }
        resolved
    }

    /// Wraps `body` in the advice a marker resolves to.
    ///
    /// The returned [`Advised`] has the same argument, return and fault types
    /// as `body`.
    ///
    /// # Errors
    ///
    /// Returns [`WeaveError::UnregisteredAspect`] for the first aspect the
    /// marker references that is not registered.
    pub fn weave<A, R, E, F>(&self, marker: &Marker, body: F) -> Result<Advised<A, R, E>, WeaveError>
    where
        A: IntoArguments,
        R: Send + 'static,
        E: fmt::Display + fmt::Debug + Send + 'static,
        F: Fn(A) -> Result<R, E> + Send + Sync + 'static,
    {
        if let Some(error) = unregistered(&self.inner.aspects, marker).into_iter().next() {
            return Err(error);
        }

        let advice = self.resolve(marker);
        tracing::debug!(
            join_point = %marker.join_point(),
            before = advice.before.len(),
            around = advice.around.len(),
            after = advice.after.len(),
            "woven"
        );
        Ok(Advised::new(*marker.join_point(), advice, body))
    }

    /// Returns true if the aspect type is registered.
    #[must_use]
    pub fn contains_aspect<A: Aspect>(&self) -> bool {
        self.inner.aspects.contains_key(&AspectId::of::<A>())
    }

    /// Returns the names of registered aspects, in registration order.
    #[must_use]
    pub fn aspect_names(&self) -> Vec<&str> {
        self.inner
            .aspects
            .values()
            .map(|entry| entry.name.as_str())
            .collect()
    }

    /// Returns the number of registered advice of one kind.
    #[must_use]
    pub fn advice_count(&self, kind: AdviceKind) -> usize {
        self.inner
            .aspects
            .values()
            .flat_map(|entry| entry.advice.iter())
            .filter(|advice| advice.kind() == kind)
            .count()
    }

    /// Returns the markers validated at startup.
    #[must_use]
    pub fn markers(&self) -> &[Marker] {
        &self.inner.markers
    }

    /// Returns true if a validated marker covers `join_point`.
    #[must_use]
    pub fn is_marked(&self, join_point: &JoinPoint) -> bool {
        self.inner
            .markers
            .iter()
            .any(|marker| marker.join_point() == join_point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advice::AdviceError;
    use crate::selector::{DeclaredOn, MethodNamed};

    fn noop(_: &JoinPoint) -> Result<(), AdviceError> {
        Ok(())
    }

    struct Service;
    struct OtherService;

    struct LogLike;
    impl Aspect for LogLike {
        fn advise(&self, advice: &mut AdviceSet<'_>) -> Result<(), RegistrationError> {
            advice
                .add(Advice::before("enter", noop))?
                .add(Advice::around("guard", |_, proceed, arguments| {
                    proceed.invoke(arguments)
                }))?
                .add(Advice::after("exit", noop))?;
            Ok(())
        }
    }

    struct Audit;
    impl Aspect for Audit {
        fn advise(&self, advice: &mut AdviceSet<'_>) -> Result<(), RegistrationError> {
            advice
                .add(Advice::before("audit_get", noop).with_selector(MethodNamed::new(["get"])))?
                .add(Advice::after("audit_service", noop).with_selector(DeclaredOn::of::<Service>()))?;
            Ok(())
        }
    }

    struct Duplicating;
    impl Aspect for Duplicating {
        fn advise(&self, advice: &mut AdviceSet<'_>) -> Result<(), RegistrationError> {
            advice.add(Advice::before("same", noop))?;
            advice.add(Advice::after("same", noop))?;
            Ok(())
        }
    }

    struct Unregistered;
    impl Aspect for Unregistered {
        fn advise(&self, _advice: &mut AdviceSet<'_>) -> Result<(), RegistrationError> {
            Ok(())
        }
    }

    fn registry() -> AspectRegistry {
        let mut builder = AspectRegistry::builder();
        builder.add_aspect(LogLike).unwrap();
        builder.add_aspect(Audit).unwrap();
        builder.finish().unwrap()
    }

    fn names(advice: &[Advice]) -> Vec<&str> {
        advice.iter().map(Advice::name).collect()
    }

    #[test]
    fn add_aspect_registers_advice() {
        let registry = registry();
        assert!(registry.contains_aspect::<LogLike>());
        assert!(registry.contains_aspect::<Audit>());
        assert!(!registry.contains_aspect::<Unregistered>());
        assert_eq!(registry.advice_count(AdviceKind::Before), 2);
        assert_eq!(registry.advice_count(AdviceKind::Around), 1);
        assert_eq!(registry.advice_count(AdviceKind::After), 2);
        assert_eq!(registry.aspect_names().len(), 2);
    }

    #[test]
    fn duplicate_aspect_is_rejected() {
        let mut builder = AspectRegistry::builder();
        builder.add_aspect(LogLike).unwrap();
        let result = builder.add_aspect(LogLike);
        assert!(matches!(
            result,
            Err(RegistrationError::DuplicateAspect { .. })
        ));
    }

    #[test]
    fn duplicate_advice_does_not_register_aspect() {
        let mut builder = AspectRegistry::builder();
        let result = builder.add_aspect(Duplicating);
        assert!(matches!(
            result,
            Err(RegistrationError::DuplicateAdvice { .. })
        ));
        assert!(!builder.contains_aspect::<Duplicating>());
    }

    #[test]
    fn resolve_orders_by_kind_then_registration() {
        let registry = registry();
        let marker = Marker::method::<Service>("get").with::<(Audit, LogLike)>();
        let resolved = registry.resolve(&marker);

        // LogLike registered first, so its advice precede Audit's within a kind.
        assert_eq!(names(resolved.of_kind(AdviceKind::Before)), ["enter", "audit_get"]);
        assert_eq!(names(resolved.of_kind(AdviceKind::Around)), ["guard"]);
        assert_eq!(names(resolved.of_kind(AdviceKind::After)), ["exit", "audit_service"]);

        let all: Vec<&str> = resolved.iter().map(Advice::name).collect();
        assert_eq!(all, ["enter", "audit_get", "guard", "exit", "audit_service"]);
    }

    #[test]
    fn resolve_applies_selectors() {
        let registry = registry();
        let marker = Marker::method::<OtherService>("put").with::<Audit>();
        assert!(registry.resolve(&marker).is_empty());

        let marker = Marker::method::<OtherService>("get").with::<Audit>();
        assert_eq!(names(registry.resolve(&marker).of_kind(AdviceKind::Before)), ["audit_get"]);
    }

    #[test]
    fn resolve_without_aspects_is_empty() {
        let registry = registry();
        let resolved = registry.resolve(&Marker::method::<Service>("get"));
        assert!(resolved.is_empty());
        assert_eq!(resolved.len(), 0);
    }

    #[test]
    fn resolve_is_repeatable() {
        let registry = registry();
        let marker = Marker::method::<Service>("get").with::<LogLike>();
        let first: Vec<u64> = registry.resolve(&marker).iter().map(Advice::sequence).collect();
        let second: Vec<u64> = registry.resolve(&marker).iter().map(Advice::sequence).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn finish_rejects_unregistered_aspects() {
        let mut builder = AspectRegistry::builder();
        builder.add_aspect(LogLike).unwrap();
        builder
            .mark(Marker::method::<Service>("get").with::<LogLike>())
            .mark(Marker::method::<Service>("put").with::<(LogLike, Unregistered)>());

        let error = builder.finish().unwrap_err();
        let faults = error.faults();
        assert_eq!(faults.len(), 1);
        assert_eq!(
            faults[0],
            &WeaveError::UnregisteredAspect {
                join_point: "Service.put".to_string(),
                aspect: AspectId::of::<Unregistered>().type_name(),
            }
        );
        assert!(error.to_string().contains("Service.put"));
    }

    #[test]
    fn finish_keeps_validated_markers() {
        let mut builder = AspectRegistry::builder();
        builder.add_aspect(LogLike).unwrap();
        builder.mark(Marker::method::<Service>("get").with::<LogLike>());
        let registry = builder.finish().unwrap();

        assert_eq!(registry.markers().len(), 1);
        assert!(registry.is_marked(&JoinPoint::method::<Service>("get")));
        assert!(!registry.is_marked(&JoinPoint::method::<Service>("put")));
    }

    #[test]
    fn weave_rejects_unregistered_aspect() {
        let registry = registry();
        let marker = Marker::method::<Service>("get").with::<Unregistered>();
        let result = registry.weave(&marker, |(): ()| Ok::<_, std::io::Error>(1));
        assert!(matches!(
            result,
            Err(WeaveError::UnregisteredAspect { .. })
        ));
    }

    #[test]
    fn registry_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AspectRegistry>();
    }
}
