//! Procedural macros for declaring interpose markers.
//!
//! Provides `#[aspects]` for impl blocks and `#[advise]` for individual
//! methods inside them.

mod common;
mod weave;

use proc_macro::TokenStream;

/// Marks the methods of an inherent impl block for interception.
///
/// Every `&self` method is marked with the listed aspects. Methods can add
/// aspects of their own with `#[advise(...)]`; with an empty list, only
/// `#[advise]` methods are marked. Associated functions without a receiver
/// are left alone.
///
/// Generates:
/// - an `interpose_aspect::Marked` impl listing one marker per method
/// - a `{Type}Woven` proxy with the same marked methods, routed through the
///   interception pipeline
/// - an `interpose_aspect::Weave` impl building the proxy from a registry
///
/// # Restrictions
///
/// Marked methods must take `&self` and owned arguments, and must not be
/// async or generic. A `Result` return must spell out its error type, which
/// must be `Display + Debug + Send + 'static`. `Box<dyn Error + Send + Sync>`
/// and `String` both qualify.
///
/// # Example
///
/// ```ignore
/// use interpose_aspect::{aspects, Weave};
///
/// struct WeatherForecastService;
///
/// #[aspects(LogAspect)]
/// impl WeatherForecastService {
///     pub fn get(&self) -> Vec<WeatherForecast> {
///         forecasts()
///     }
///
///     #[advise(AuditAspect)]
///     pub fn fail(&self, reason: String) -> Result<(), ForecastError> {
///         Err(ForecastError::InvalidOperation(reason))
///     }
/// }
///
/// let service = WeatherForecastService.weave(&registry)?;
/// service.get();
/// ```
#[proc_macro_attribute]
pub fn aspects(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(item as syn::ItemImpl);
    weave::generate_aspects(attr.into(), &input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Marks one method with additional aspects.
///
/// Only valid inside an `#[aspects]` impl block, which consumes it.
#[proc_macro_attribute]
pub fn advise(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let item = proc_macro2::TokenStream::from(item);
    let message = "#[advise] can only be used on methods inside an #[aspects] impl block";
    let error = match syn::parse2::<syn::ImplItemFn>(item.clone()) {
        Ok(method) => syn::Error::new_spanned(&method.sig.ident, message),
        Err(_) => syn::Error::new(proc_macro2::Span::call_site(), message),
    };
    let error = error.into_compile_error();
    quote::quote!(#error #item).into()
}
