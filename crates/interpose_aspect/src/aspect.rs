//! Aspects: named groups of advice.
//!
//! An aspect is the unit a [`Marker`](crate::marker::Marker) refers to. Each
//! aspect type contributes its advice to the registry exactly once, at
//! startup, through [`Aspect::advise`].
//!
//! # Example
//!
//! ```
//! use interpose_aspect::advice::{Advice, AdviceSet};
//! use interpose_aspect::aspect::Aspect;
//! use interpose_aspect::registry::RegistrationError;
//!
//! struct AuditAspect;
//!
//! impl Aspect for AuditAspect {
//!     fn advise(&self, advice: &mut AdviceSet<'_>) -> Result<(), RegistrationError> {
//!         advice.add(Advice::before("audit", |join_point| {
//!             tracing::info!(%join_point, "audited call");
//!             Ok(())
//!         }))?;
//!         Ok(())
//!     }
//! }
//! ```

use core::any::TypeId;
use core::fmt;

use variadics_please::all_tuples;

use crate::advice::AdviceSet;
use crate::registry::RegistrationError;

// ─────────────────────────────────────────────────────────────────────────────
// AspectId
// ─────────────────────────────────────────────────────────────────────────────

/// Unique identifier for an aspect type.
///
/// Used by markers to reference advice groups and by the registry for
/// duplicate detection. Based on [`TypeId`], so each aspect type has exactly
/// one `AspectId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AspectId {
    type_id: TypeId,
    type_name: &'static str,
}

impl AspectId {
    /// Creates an `AspectId` for the given aspect type.
    #[must_use]
    pub fn of<A: Aspect>() -> Self {
        Self {
            type_id: TypeId::of::<A>(),
            type_name: core::any::type_name::<A>(),
        }
    }

    /// Returns the underlying `TypeId`.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the fully qualified type name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the type name without its module path.
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        short_type_name(self.type_name)
    }
}

impl fmt::Display for AspectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Strips the module path from a type name, keeping generic arguments intact.
pub(crate) fn short_type_name(type_name: &'static str) -> &'static str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    match base.rfind("::") {
        Some(index) => &type_name[index + 2..],
        None => type_name,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aspect Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A group of advice that markers can opt methods into.
///
/// Aspects follow a two-step lifecycle driven by
/// [`AspectRegistryBuilder`](crate::registry::AspectRegistryBuilder):
///
/// 1. **Registration** - [`advise()`](Self::advise) is called once when the
///    aspect is added, contributing its advice in registration order.
/// 2. **Validation** - [`finish()`](crate::registry::AspectRegistryBuilder::finish)
///    checks every declared marker against the registered aspects and freezes
///    the registry.
///
/// After `finish()` the registry is read-only; aspects are never consulted
/// again at call time.
pub trait Aspect: Send + Sync + 'static {
    /// Contributes this aspect's advice.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::DuplicateAdvice`] if two advice share a name.
    fn advise(&self, advice: &mut AdviceSet<'_>) -> Result<(), RegistrationError>;

    /// Returns the aspect's name for debugging and error messages.
    ///
    /// Default implementation returns the type name.
    fn name(&self) -> &str {
        core::any::type_name::<Self>()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// IntoAspectIds Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for types that can be converted into a list of aspect IDs.
///
/// Implemented for single aspects and tuples of aspects, so markers can
/// reference several groups at once: `marker.with::<(LogAspect, AuditAspect)>()`.
pub trait IntoAspectIds {
    /// Returns the aspect IDs for this type, in declaration order.
    fn aspect_ids() -> Vec<AspectId>;
}

/// Single aspect implements `IntoAspectIds`.
impl<A: Aspect> IntoAspectIds for A {
    fn aspect_ids() -> Vec<AspectId> {
        vec![AspectId::of::<A>()]
    }
}

/// Macro to implement `IntoAspectIds` for tuples of aspects.
macro_rules! impl_into_aspect_ids_for_tuple {
    ($($A:ident),*) => {
        impl<$($A: Aspect),*> IntoAspectIds for ($($A,)*) {
            fn aspect_ids() -> Vec<AspectId> {
                vec![$(AspectId::of::<$A>()),*]
            }
        }
    };
}

// Generate implementations for tuples from 2 to 8 elements
all_tuples!(impl_into_aspect_ids_for_tuple, 2, 8, A);
