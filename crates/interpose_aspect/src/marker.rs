//! Markers: declarative opt-in of methods into aspects.
//!
//! A [`Marker`] attaches a [`JoinPoint`] (declaring type + method name) to one
//! or more aspects. Markers carry no executable logic; the registry consumes
//! them when a method is woven.
//!
//! Markers are usually generated by the [`aspects`](crate::aspects) attribute,
//! which implements [`Marked`] and [`Weave`] for the annotated type. They can
//! also be built by hand:
//!
//! ```ignore
//! let marker = Marker::method::<WeatherForecastService>("get").with::<LogAspect>();
//! ```

use core::any::TypeId;
use core::fmt;

use crate::aspect::{AspectId, IntoAspectIds, short_type_name};
use crate::registry::{AspectRegistry, WeaveError};

// ─────────────────────────────────────────────────────────────────────────────
// JoinPoint
// ─────────────────────────────────────────────────────────────────────────────

/// Identity of an intercepted method: its declaring type and its name.
///
/// This is the read-only view Before and After advice receive. It displays as
/// `<Type>.<method>`, using the type name without its module path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JoinPoint {
    type_id: TypeId,
    type_path: &'static str,
    method: &'static str,
}

impl JoinPoint {
    /// Creates a join point for `method` declared on `T`.
    #[must_use]
    pub fn method<T: ?Sized + 'static>(method: &'static str) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_path: core::any::type_name::<T>(),
            method,
        }
    }

    /// Returns the method name.
    #[must_use]
    pub fn method_name(&self) -> &'static str {
        self.method
    }

    /// Returns the declaring type's name without its module path.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        short_type_name(self.type_path)
    }

    /// Returns the declaring type's fully qualified name.
    #[must_use]
    pub fn type_path(&self) -> &'static str {
        self.type_path
    }

    /// Returns the declaring type's `TypeId`.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns true if the method is declared on `T`.
    #[must_use]
    pub fn is_declared_on<T: ?Sized + 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl fmt::Display for JoinPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.type_name(), self.method)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Marker
// ─────────────────────────────────────────────────────────────────────────────

/// Attachment of a join point to one or more aspects.
///
/// Referencing the same aspect twice has no additional effect; the marker
/// keeps the first occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    join_point: JoinPoint,
    aspects: Vec<AspectId>,
}

impl Marker {
    /// Creates a marker for `join_point` that references no aspects yet.
    #[must_use]
    pub fn new(join_point: JoinPoint) -> Self {
        Self {
            join_point,
            aspects: Vec::new(),
        }
    }

    /// Creates a marker for `method` declared on `T`.
    #[must_use]
    pub fn method<T: ?Sized + 'static>(method: &'static str) -> Self {
        Self::new(JoinPoint::method::<T>(method))
    }

    /// Adds one aspect, or a tuple of aspects, to the marker.
    #[must_use]
    pub fn with<A: IntoAspectIds>(self) -> Self {
        self.with_ids(A::aspect_ids())
    }

    /// Adds aspects by identifier, skipping ones already referenced.
    #[must_use]
    pub fn with_ids(mut self, ids: impl IntoIterator<Item = AspectId>) -> Self {
        for id in ids {
            if !self.aspects.contains(&id) {
                self.aspects.push(id);
            }
        }
        self
    }

    /// Returns the marked join point.
    #[must_use]
    pub fn join_point(&self) -> &JoinPoint {
        &self.join_point
    }

    /// Returns the referenced aspects, in declaration order.
    #[must_use]
    pub fn aspects(&self) -> &[AspectId] {
        &self.aspects
    }

    /// Returns true if the marker references the given aspect.
    #[must_use]
    pub fn references(&self, aspect: AspectId) -> bool {
        self.aspects.contains(&aspect)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Marked / Weave
// ─────────────────────────────────────────────────────────────────────────────

/// Types that declare markers on their methods.
///
/// Implemented by the [`aspects`](crate::aspects) attribute. The registry
/// validates these markers at startup through
/// [`mark_type`](crate::registry::AspectRegistryBuilder::mark_type).
pub trait Marked: 'static {
    /// Returns one marker per marked method, in declaration order.
    fn markers() -> Vec<Marker>;
}

/// Types that can be turned into a proxy routing marked methods through the
/// interception pipeline.
///
/// Implemented by the [`aspects`](crate::aspects) attribute.
pub trait Weave: Marked + Sized {
    /// The proxy type exposing the marked methods.
    type Woven;

    /// Consumes the value and weaves each marked method.
    ///
    /// # Errors
    ///
    /// Returns [`WeaveError::UnregisteredAspect`] if a marker references an
    /// aspect missing from `registry`.
    fn weave(self, registry: &AspectRegistry) -> Result<Self::Woven, WeaveError>;
}
