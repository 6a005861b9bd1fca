//! Method interception for Interpose.
//!
//! This crate provides the infrastructure for attaching cross-cutting
//! behavior (logging, fault reporting, auditing) to ordinary methods without
//! touching their bodies. Behavior is packaged as [`Aspect`]s, methods opt in
//! through markers, and an explicit [`AspectRegistry`] weaves marked methods
//! into proxies that run every call through the interception pipeline.
//!
//! # Quick Start
//!
//! ```ignore
//! use interpose_aspect::prelude::*;
//!
//! #[aspects(LogAspect)]
//! impl WeatherForecastService {
//!     pub fn get(&self) -> Vec<WeatherForecast> { /* ... */ }
//! }
//!
//! let mut builder = AspectRegistry::builder();
//! builder.add_aspect(LogAspect::default())?;
//! builder.mark_type::<WeatherForecastService>();
//! let registry = builder.finish()?;
//!
//! let service = WeatherForecastService::default().weave(&registry)?;
//! service.get(); // Before, Around and After advice run around the body
//! ```
//!
//! # Architecture
//!
//! - [`Aspect`] - trait for bundles of advice, registered once at startup
//! - [`Advice`] - one Before, Around or After handler with a [`TargetSelector`]
//! - [`Marker`] / [`JoinPoint`] - opt-in of a method into aspects
//! - [`AspectRegistry`] - validates markers and resolves advice per join point
//! - [`Advised`] / [`Proceed`] - the per-method pipeline and the Around handle
//! - [`Arguments`] / [`ReturnValue`] / [`Fault`] - type-erased call values
//! - [`InvocationContext`] - per-call phase tracking

// Self-reference so `#[aspects]`/`#[advise]` generated code can use `interpose_aspect::` paths within this crate.
extern crate self as interpose_aspect;

pub mod advice;
pub mod aspect;
pub mod context;
pub mod marker;
pub mod pipeline;
pub mod registry;
pub mod selector;

// Re-export core types at crate root.
pub use advice::{Advice, AdviceError, AdviceKind, AdviceSet};
pub use aspect::{Aspect, AspectId, IntoAspectIds};
pub use context::{
    ArgumentError, Arguments, Fault, IntoArguments, InvocationContext, InvocationPhase,
    ReturnValue,
};
pub use marker::{JoinPoint, Marked, Marker, Weave};
pub use pipeline::{Advised, Proceed};
pub use registry::{
    AspectRegistry, AspectRegistryBuilder, RegistrationError, ResolvedAdvice, WeaveError,
};
pub use selector::{AnyMarked, DeclaredOn, MethodNamed, TargetSelector};

// Re-export proc macros.
pub use aspect_macros::{advise, aspects};

/// Commonly used items.
pub mod prelude {
    pub use crate::{
        Advice, AdviceError, AdviceKind, AdviceSet, Advised, Arguments, Aspect, AspectRegistry,
        Fault, JoinPoint, Marked, Marker, Proceed, RegistrationError, ReturnValue, Weave,
        WeaveError, advise, aspects,
    };
}
