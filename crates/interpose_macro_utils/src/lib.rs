//! Shared utilities for interpose procedural macro crates.
//!
//! Provides crate-path resolution so that generated code emits correct
//! fully-qualified paths regardless of whether the consumer depends on
//! an individual interpose crate or the `interpose` umbrella re-export.

use proc_macro_crate::{FoundCrate, crate_name};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};

/// An interpose crate that macro-generated code may reference.
pub enum InterposeCrate {
    /// `interpose_aspect`
    Aspect,
    /// `interpose_core_aspects`
    CoreAspects,
}

impl InterposeCrate {
    /// Returns the `Cargo.toml` package name for this crate.
    fn as_str(&self) -> &'static str {
        match self {
            Self::Aspect => "interpose_aspect",
            Self::CoreAspects => "interpose_core_aspects",
        }
    }
}

/// Returns a [`TokenStream`] path for the given interpose crate.
///
/// Resolution order:
/// 1. Direct dependency (possibly renamed in `Cargo.toml`).
/// 2. Indirect access via the `interpose` umbrella crate (`interpose::<name>`).
/// 3. Fallback to the literal crate name (compile error will point the user
///    to the missing dependency).
pub fn resolve_crate_path(krate: InterposeCrate) -> TokenStream {
    let name = krate.as_str();

    match crate_name(name) {
        Ok(FoundCrate::Itself) => {
            let ident = format_ident!("{}", name);
            quote!(#ident)
        }
        Ok(FoundCrate::Name(found)) => {
            let ident = format_ident!("{}", found);
            quote!(#ident)
        }
        Err(_) => match crate_name("interpose") {
            Ok(FoundCrate::Name(found)) => {
                let umbrella = format_ident!("{}", found);
                let ident = format_ident!("{}", name);
                quote!(#umbrella::#ident)
            }
            _ => {
                let ident = format_ident!("{}", name);
                quote!(#ident)
            }
        },
    }
}
