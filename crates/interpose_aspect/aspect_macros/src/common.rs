//! Signature analysis shared by `#[aspects]` and `#[advise]`.

use proc_macro2::{Group, TokenStream, TokenTree};
use quote::{ToTokens, format_ident, quote};
use syn::parse::Parser;
use syn::punctuated::Punctuated;
use syn::{
    Attribute, FnArg, GenericArgument, Ident, ImplItemFn, Meta, Pat, Path, PathArguments,
    ReturnType, Signature, Token, Type, Visibility,
};

/// Most arguments an intercepted method can take.
const MAX_ARGUMENTS: usize = 12;

/// A method selected for interception.
pub(crate) struct MarkedMethod {
    pub ident: Ident,
    pub vis: Visibility,
    /// Doc attributes, carried over to the proxy method.
    pub docs: Vec<Attribute>,
    /// Aspects referenced by the type and by the method, in declaration order.
    pub aspects: Vec<Path>,
    /// Argument names as bound in the proxy and in the woven body.
    pub arg_names: Vec<Ident>,
    pub arg_types: Vec<Type>,
    pub output: Output,
}

/// How a method's return type maps onto `Advised<A, R, E>`.
pub(crate) enum Output {
    /// `-> Result<T, E>`: faults are the method's own errors.
    Fallible { ok: Type, err: Type },
    /// Any other return type, including none. The method cannot raise errors.
    Infallible(Type),
}

/// Parses a comma-separated list of aspect paths.
pub(crate) fn parse_aspect_list(tokens: TokenStream) -> syn::Result<Vec<Path>> {
    let paths = Punctuated::<Path, Token![,]>::parse_terminated.parse2(tokens)?;
    Ok(paths.into_iter().collect())
}

/// Returns true for `#[advise]` / `#[advise(...)]`.
pub(crate) fn is_advise_attr(attr: &Attribute) -> bool {
    attr.path().is_ident("advise")
}

/// Collects the aspects named by a method's `#[advise(...)]` attributes.
///
/// Returns `None` if the method carries no `#[advise]`.
fn method_aspects(method: &ImplItemFn) -> syn::Result<Option<Vec<Path>>> {
    let mut found = false;
    let mut aspects = Vec::new();
    for attr in method.attrs.iter().filter(|attr| is_advise_attr(attr)) {
        found = true;
        match &attr.meta {
            Meta::Path(_) => {}
            Meta::List(list) => aspects.extend(parse_aspect_list(list.tokens.clone())?),
            Meta::NameValue(meta) => {
                return Err(syn::Error::new_spanned(
                    meta,
                    "expected `#[advise(AspectType, ...)]`",
                ));
            }
        }
    }
    Ok(found.then_some(aspects))
}

/// Decides whether `method` is intercepted and validates it if so.
///
/// Methods with a `&self` receiver are marked by the type-level aspects.
/// Associated functions are skipped unless they carry `#[advise]`, which is
/// then an error.
pub(crate) fn collect_marked(
    method: &ImplItemFn,
    type_aspects: &[Path],
) -> syn::Result<Option<MarkedMethod>> {
    let own = method_aspects(method)?;
    let has_receiver = matches!(method.sig.inputs.first(), Some(FnArg::Receiver(_)));

    let Some(own) = own.or_else(|| (has_receiver && !type_aspects.is_empty()).then(Vec::new))
    else {
        return Ok(None);
    };

    validate_signature(&method.sig)?;

    let mut aspects = type_aspects.to_vec();
    aspects.extend(own);

    let mut arg_names = Vec::new();
    let mut arg_types = Vec::new();
    for (position, arg) in method.sig.inputs.iter().skip(1).enumerate() {
        let FnArg::Typed(pat_type) = arg else {
            continue;
        };
        validate_owned(&pat_type.ty, "arguments")?;
        let name = match pat_type.pat.as_ref() {
            Pat::Ident(pat) if pat.subpat.is_none() => pat.ident.clone(),
            _ => format_ident!("__arg{}", position),
        };
        arg_names.push(name);
        arg_types.push(pat_type.ty.as_ref().clone());
    }

    Ok(Some(MarkedMethod {
        ident: method.sig.ident.clone(),
        vis: method.vis.clone(),
        docs: method
            .attrs
            .iter()
            .filter(|attr| attr.path().is_ident("doc"))
            .cloned()
            .collect(),
        aspects,
        arg_names,
        arg_types,
        output: classify_output(&method.sig.output)?,
    }))
}

/// Rejects signatures the pipeline cannot wrap.
fn validate_signature(sig: &Signature) -> syn::Result<()> {
    if let Some(asyncness) = &sig.asyncness {
        return Err(syn::Error::new_spanned(
            asyncness,
            "intercepted methods cannot be async",
        ));
    }

    if let Some(unsafety) = &sig.unsafety {
        return Err(syn::Error::new_spanned(
            unsafety,
            "intercepted methods cannot be unsafe",
        ));
    }

    if let Some(abi) = &sig.abi {
        return Err(syn::Error::new_spanned(
            abi,
            "intercepted methods cannot be extern",
        ));
    }

    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "intercepted methods cannot have generic parameters",
        ));
    }

    if sig.ident == "inner" {
        return Err(syn::Error::new_spanned(
            &sig.ident,
            "a method named `inner` conflicts with the woven proxy's `inner()` accessor",
        ));
    }

    match sig.inputs.first() {
        Some(FnArg::Receiver(receiver)) => {
            if receiver.reference.is_none() || receiver.colon_token.is_some() {
                return Err(syn::Error::new_spanned(
                    receiver,
                    "intercepted methods must take `&self`; \
                     the woven proxy shares the value through an Arc",
                ));
            }
            if receiver.mutability.is_some() {
                return Err(syn::Error::new_spanned(
                    receiver,
                    "intercepted methods must take `&self`, not `&mut self`; \
                     the woven proxy shares the value through an Arc",
                ));
            }
        }
        _ => {
            return Err(syn::Error::new_spanned(
                &sig.ident,
                "#[advise] requires a method with a `&self` receiver",
            ));
        }
    }

    let arity = sig.inputs.len() - 1;
    if arity > MAX_ARGUMENTS {
        return Err(syn::Error::new_spanned(
            &sig.inputs,
            format!("intercepted methods take at most {MAX_ARGUMENTS} arguments"),
        ));
    }

    Ok(())
}

/// Rejects borrowed and `impl Trait` types.
fn validate_owned(ty: &Type, what: &str) -> syn::Result<()> {
    match ty {
        Type::Reference(_) => Err(syn::Error::new_spanned(
            ty,
            format!("intercepted methods require owned {what}; references are not supported"),
        )),
        Type::ImplTrait(_) => Err(syn::Error::new_spanned(
            ty,
            format!("intercepted methods do not support `impl Trait` {what}"),
        )),
        _ => Ok(()),
    }
}

/// Splits a return type into success and error types.
fn classify_output(output: &ReturnType) -> syn::Result<Output> {
    let ty = match output {
        ReturnType::Default => return Ok(Output::Infallible(syn::parse_quote!(()))),
        ReturnType::Type(_, ty) => ty.as_ref(),
    };
    validate_owned(ty, "return values")?;

    if let Type::Path(type_path) = ty
        && type_path.qself.is_none()
        && let Some(segment) = type_path.path.segments.last()
        && segment.ident == "Result"
    {
        if let PathArguments::AngleBracketed(args) = &segment.arguments {
            let types: Vec<&Type> = args
                .args
                .iter()
                .filter_map(|arg| match arg {
                    GenericArgument::Type(ty) => Some(ty),
                    _ => None,
                })
                .collect();
            if let [ok, err] = types.as_slice() {
                return Ok(Output::Fallible {
                    ok: (*ok).clone(),
                    err: (*err).clone(),
                });
            }
        }
        return Err(syn::Error::new_spanned(
            ty,
            "intercepted methods must name their error type, e.g. `Result<T, MyError>`",
        ));
    }

    Ok(Output::Infallible(ty.clone()))
}

/// Returns the last path segment of the impl's self type.
pub(crate) fn type_ident(ty: &Type) -> syn::Result<&Ident> {
    if let Type::Path(type_path) = ty
        && type_path.qself.is_none()
        && let Some(segment) = type_path.path.segments.last()
        && segment.arguments.is_empty()
    {
        return Ok(&segment.ident);
    }
    Err(syn::Error::new_spanned(
        ty,
        "#[aspects] impl target must be a non-generic path type",
    ))
}

/// Replaces `Self` in `tokens` with `self_ty`.
///
/// Proxy items live on the woven type, where `Self` would name the proxy.
pub(crate) fn replace_self(tokens: impl ToTokens, self_ty: &Type) -> TokenStream {
    tokens
        .into_token_stream()
        .into_iter()
        .map(|tree| match tree {
            TokenTree::Ident(ident) if ident == "Self" => quote!(#self_ty),
            TokenTree::Group(group) => {
                let mut replaced = Group::new(group.delimiter(), replace_self(group.stream(), self_ty));
                replaced.set_span(group.span());
                TokenTree::Group(replaced).into_token_stream()
            }
            other => other.into_token_stream(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(tokens: TokenStream) -> ImplItemFn {
        syn::parse2(tokens).unwrap()
    }

    fn aspects(tokens: TokenStream) -> Vec<Path> {
        parse_aspect_list(tokens).unwrap()
    }

    #[test]
    fn receiver_methods_take_type_aspects() {
        let marked = collect_marked(
            &method(quote! { pub fn get(&self, days: u32) -> Vec<u8> { vec![] } }),
            &aspects(quote!(LogAspect)),
        )
        .unwrap()
        .unwrap();

        assert_eq!(marked.ident, "get");
        assert_eq!(marked.aspects.len(), 1);
        assert_eq!(marked.arg_names, ["days"]);
        assert!(matches!(marked.output, Output::Infallible(_)));
    }

    #[test]
    fn associated_functions_are_skipped() {
        let marked = collect_marked(
            &method(quote! { pub fn new() -> Self { Self } }),
            &aspects(quote!(LogAspect)),
        )
        .unwrap();
        assert!(marked.is_none());
    }

    #[test]
    fn unmarked_methods_without_type_aspects_are_skipped() {
        let marked = collect_marked(&method(quote! { fn get(&self) {} }), &[]).unwrap();
        assert!(marked.is_none());
    }

    #[test]
    fn advise_adds_method_aspects() {
        let marked = collect_marked(
            &method(quote! {
                #[advise(AuditAspect, other::TimingAspect)]
                fn fail(&self, (a, b): (u8, u8)) -> Result<(), MyError> { Ok(()) }
            }),
            &aspects(quote!(LogAspect)),
        )
        .unwrap()
        .unwrap();

        assert_eq!(marked.aspects.len(), 3);
        assert_eq!(marked.arg_names, ["__arg0"]);
        assert!(matches!(marked.output, Output::Fallible { .. }));
    }

    #[test]
    fn rejects_mut_receiver() {
        let result = collect_marked(
            &method(quote! { fn set(&mut self, value: u8) {} }),
            &aspects(quote!(LogAspect)),
        );
        assert!(result.is_err());
    }

    #[test]
    fn rejects_advise_without_receiver() {
        let result = collect_marked(&method(quote! { #[advise] fn make() {} }), &[]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_borrowed_arguments() {
        let result = collect_marked(
            &method(quote! { fn find(&self, key: &str) -> u8 { 0 } }),
            &aspects(quote!(LogAspect)),
        );
        assert!(result.is_err());
    }

    #[test]
    fn rejects_result_without_error_type() {
        let result = collect_marked(
            &method(quote! { fn load(&self) -> io::Result<u8> { Ok(0) } }),
            &aspects(quote!(LogAspect)),
        );
        assert!(result.is_err());
    }

    #[test]
    fn replace_self_reaches_nested_groups() {
        let self_ty: Type = syn::parse_quote!(Service);
        let replaced = replace_self(quote!(Vec<(Self, u8)>), &self_ty);
        assert_eq!(replaced.to_string(), quote!(Vec<(Service, u8)>).to_string());
    }
}
