//! Code generation for `#[aspects]` on impl blocks.

use interpose_macro_utils::{InterposeCrate, resolve_crate_path};
use proc_macro2::TokenStream;
use quote::{format_ident, quote, quote_spanned};
use syn::spanned::Spanned;
use syn::{ImplItem, ItemImpl, Type};

use crate::common::{
    MarkedMethod, Output, collect_marked, is_advise_attr, parse_aspect_list, replace_self,
    type_ident,
};

/// Generates the marker, weave and proxy items for an `#[aspects]` impl block.
pub(crate) fn generate_aspects(attr: TokenStream, input: &ItemImpl) -> syn::Result<TokenStream> {
    let ia = resolve_crate_path(InterposeCrate::Aspect);

    if let Some((_, trait_path, _)) = &input.trait_ {
        return Err(syn::Error::new_spanned(
            trait_path,
            "#[aspects] must be applied to an inherent impl block",
        ));
    }
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "#[aspects] does not support generic impl blocks",
        ));
    }

    let type_aspects = parse_aspect_list(attr)?;
    let self_ty = input.self_ty.as_ref();
    let woven = format_ident!("{}Woven", type_ident(self_ty)?);

    let mut methods = Vec::new();
    for item in &input.items {
        if let ImplItem::Fn(method) = item
            && let Some(marked) = collect_marked(method, &type_aspects)?
        {
            methods.push(marked);
        }
    }

    // Remove #[advise] from the original impl
    let cleaned_items: Vec<ImplItem> = input
        .items
        .iter()
        .map(|item| match item {
            ImplItem::Fn(method) => {
                let mut cleaned = method.clone();
                cleaned.attrs.retain(|attr| !is_advise_attr(attr));
                ImplItem::Fn(cleaned)
            }
            other => other.clone(),
        })
        .collect();
    let impl_attrs = &input.attrs;

    let markers: Vec<TokenStream> = methods
        .iter()
        .map(|method| marker_expr(&ia, self_ty, method))
        .collect();
    let fields: Vec<_> = methods
        .iter()
        .map(|method| format_ident!("advised_{}", method.ident))
        .collect();
    let field_types: Vec<_> = methods
        .iter()
        .map(|method| advised_type(&ia, self_ty, method))
        .collect();
    let bodies: Vec<_> = methods.iter().map(woven_body).collect();
    let error_checks: Vec<_> = methods
        .iter()
        .filter_map(|method| error_bound_check(self_ty, method))
        .collect();
    let proxies: Vec<_> = methods
        .iter()
        .zip(&fields)
        .map(|(method, field)| proxy_method(self_ty, method, field))
        .collect();

    let unused_registry = methods.is_empty().then(|| quote!(let _ = registry;));
    let doc = format!(
        "Woven proxy for [`{}`] routing its marked methods through their advice.",
        quote!(#self_ty)
    );

    Ok(quote! {
        // Original impl block with #[advise] stripped
        #(#impl_attrs)*
        impl #self_ty {
            #(#cleaned_items)*
        }

        #(#error_checks)*

        impl #ia::Marked for #self_ty {
            fn markers() -> ::std::vec::Vec<#ia::Marker> {
                ::std::vec![#(#markers),*]
            }
        }

        #[doc = #doc]
        #[derive(Clone)]
        pub struct #woven {
            inner: ::std::sync::Arc<#self_ty>,
            #(#fields: #field_types,)*
        }

        impl #woven {
            #(#proxies)*

            /// Returns the wrapped value.
            ///
            /// Calls made through it bypass interception.
            pub fn inner(&self) -> &#self_ty {
                &self.inner
            }
        }

        impl #ia::Weave for #self_ty {
            type Woven = #woven;

            fn weave(
                self,
                registry: &#ia::AspectRegistry,
            ) -> ::core::result::Result<Self::Woven, #ia::WeaveError> {
                #unused_registry
                let __inner = ::std::sync::Arc::new(self);
                #(
                    let #fields: #field_types = {
                        let __inner = ::std::sync::Arc::clone(&__inner);
                        registry.weave(&#markers, #bodies)?
                    };
                )*
                ::core::result::Result::Ok(#woven {
                    inner: __inner,
                    #(#fields,)*
                })
            }
        }
    })
}

/// `Marker::method::<T>("name").with::<A>()...`
fn marker_expr(ia: &TokenStream, self_ty: &Type, method: &MarkedMethod) -> TokenStream {
    let name = method.ident.to_string();
    let aspects = &method.aspects;
    quote! {
        #ia::Marker::method::<#self_ty>(#name)#(.with::<#aspects>())*
    }
}

/// `Advised<(args...), R, E>` for one method.
fn advised_type(ia: &TokenStream, self_ty: &Type, method: &MarkedMethod) -> TokenStream {
    let arg_types = &method.arg_types;
    let (ok, err) = match &method.output {
        Output::Fallible { ok, err } => (quote!(#ok), quote!(#err)),
        Output::Infallible(ty) => (quote!(#ty), quote!(::core::convert::Infallible)),
    };
    replace_self(quote!(#ia::Advised<(#(#arg_types,)*), #ok, #err>), self_ty)
}

/// Asserts the error type of a fallible method can be carried as a fault,
/// reporting a missing bound on the error type itself.
fn error_bound_check(self_ty: &Type, method: &MarkedMethod) -> Option<TokenStream> {
    let Output::Fallible { err, .. } = &method.output else {
        return None;
    };
    let span = err.span();
    let err = replace_self(quote!(#err), self_ty);
    let check = quote_spanned! {span=>
        let _ = __intercepted_error_must_be_display_debug_send_static::<#err>;
    };
    Some(quote! {
        const _: () = {
            fn __intercepted_error_must_be_display_debug_send_static<
                E: ::core::fmt::Display + ::core::fmt::Debug + ::core::marker::Send + 'static,
            >() {
            }
            #check
        };
    })
}

/// Closure handed to `AspectRegistry::weave`, calling the original method.
fn woven_body(method: &MarkedMethod) -> TokenStream {
    let ident = &method.ident;
    let names = &method.arg_names;
    let types = &method.arg_types;
    let call = quote!(__inner.#ident(#(#names),*));
    let call = match &method.output {
        Output::Fallible { .. } => call,
        Output::Infallible(_) => quote!(::core::result::Result::Ok(#call)),
    };
    quote! {
        move |(#(#names,)*): (#(#types,)*)| #call
    }
}

/// Proxy method on the woven type with the original signature.
fn proxy_method(self_ty: &Type, method: &MarkedMethod, field: &syn::Ident) -> TokenStream {
    let MarkedMethod {
        ident,
        vis,
        docs,
        arg_names,
        arg_types,
        output,
        ..
    } = method;

    let call = quote!(self.#field.call((#(#arg_names,)*)));
    let (ret, body) = match output {
        Output::Fallible { ok, err } => (quote!(::core::result::Result<#ok, #err>), call),
        Output::Infallible(ty) => (
            quote!(#ty),
            quote! {
                match #call {
                    ::core::result::Result::Ok(value) => value,
                    ::core::result::Result::Err(never) => match never {},
                }
            },
        ),
    };
    let signature = replace_self(
        quote!(#vis fn #ident(&self, #(#arg_names: #arg_types),*) -> #ret),
        self_ty,
    );

    quote! {
        #(#docs)*
        #signature {
            #body
        }
    }
}
