//! Target selectors decide which marked join points an advice applies to.
//!
//! Selection happens once per marker, when a method is woven. The default
//! selector, [`AnyMarked`], gives an advice global scope: it applies to every
//! method that opted into its aspect.

use core::any::TypeId;
use core::fmt;

use crate::marker::JoinPoint;

/// Strategy deciding whether an advice applies to a join point.
///
/// Implemented for the selectors in this module and for any
/// `Fn(&JoinPoint) -> bool` closure.
pub trait TargetSelector: Send + Sync + 'static {
    /// Returns true if the advice should run for `join_point`.
    fn matches(&self, join_point: &JoinPoint) -> bool;

    /// Returns a short description used in debug output.
    fn describe(&self) -> String {
        "custom".to_string()
    }
}

impl<F> TargetSelector for F
where
    F: Fn(&JoinPoint) -> bool + Send + Sync + 'static,
{
    fn matches(&self, join_point: &JoinPoint) -> bool {
        self(join_point)
    }
}

/// Matches every marked member.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AnyMarked;

impl TargetSelector for AnyMarked {
    fn matches(&self, _join_point: &JoinPoint) -> bool {
        true
    }

    fn describe(&self) -> String {
        "any marked member".to_string()
    }
}

/// Matches methods whose name is in a fixed list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodNamed {
    names: Vec<&'static str>,
}

impl MethodNamed {
    /// Matches any of the given method names.
    #[must_use]
    pub fn new(names: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            names: names.into_iter().collect(),
        }
    }
}

impl TargetSelector for MethodNamed {
    fn matches(&self, join_point: &JoinPoint) -> bool {
        self.names.contains(&join_point.method_name())
    }

    fn describe(&self) -> String {
        format!("methods named {:?}", self.names)
    }
}

/// Matches methods declared on one type.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DeclaredOn {
    type_id: TypeId,
    type_name: &'static str,
}

impl DeclaredOn {
    /// Matches methods declared on `T`.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: core::any::type_name::<T>(),
        }
    }
}

impl fmt::Debug for DeclaredOn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DeclaredOn").field(&self.type_name).finish()
    }
}

impl TargetSelector for DeclaredOn {
    fn matches(&self, join_point: &JoinPoint) -> bool {
        join_point.type_id() == self.type_id
    }

    fn describe(&self) -> String {
        format!("methods declared on {}", self.type_name)
    }
}
