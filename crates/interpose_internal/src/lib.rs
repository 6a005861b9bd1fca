//! # Interpose Internal Library
//!
//! Re-exports the core interpose crates for convenience.

/// Advice registry, markers and the interception pipeline.
pub use interpose_aspect;

/// Ready-made aspects, diagnostic sinks and subscriber setup.
pub use interpose_core_aspects;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use interpose_aspect::prelude::*;
    pub use interpose_core_aspects::{
        DiagnosticSink, LogAspect, MemorySink, Severity, TracingSetup, TracingSink, WriterSink,
    };
}
