//! Method interception with composable before/after/around advice.
//!

pub use interpose_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use interpose_internal::prelude::*;
}
