//! `#[derive(Error)]` expansion.
//!
//! # Usage
//!
//! ```ignore
//! use chunkvm_derive::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum LoadError {
//!     #[error("line {line}: {reason}")]
//!     InvalidLine { line: usize, reason: String },
//!
//!     #[error("prime oracle: {0}")]
//!     Oracle(#[from] OracleError),
//!
//!     #[error("empty program")]
//!     Empty,
//! }
//! ```
//!
//! Every field of a variant is handed to `write!` as a named argument, so each
//! field has to appear in the message. Positional placeholders (`{0}`, `{1:?}`)
//! are rewritten to the generated binding names.
//!
//! A field marked `#[from]` must be the only field of its variant. It becomes
//! the value returned by `Error::source()` and gets a `From` impl.

use proc_macro::TokenStream;
use quote::{ToTokens, format_ident, quote};
use syn::{Data, DeriveInput, Fields, Lit, Meta, parse_macro_input};

pub fn derive_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => err.to_compile_error().into(),
    }
}

/// A variant field annotated with `#[from]`.
struct FromField<'a> {
    variant: &'a syn::Ident,
    ty: &'a syn::Type,
    /// `None` for tuple variants.
    name: Option<&'a syn::Ident>,
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let (display_body, from_fields) = match &input.data {
        Data::Enum(data) => {
            let mut arms = Vec::with_capacity(data.variants.len());
            let mut from_fields = Vec::new();
            for variant in &data.variants {
                let message = message_from_attrs(
                    &variant.attrs,
                    &variant.ident,
                    &format!("variant `{}`", variant.ident),
                )?;
                if let Some(field) = from_field(variant)? {
                    from_fields.push(field);
                }
                arms.push(variant_display_arm(&variant.ident, &variant.fields, &message));
            }
            (quote! { match self { #(#arms)* } }, from_fields)
        }
        Data::Struct(data) => {
            let message = message_from_attrs(
                &input.attrs,
                &input.ident,
                &format!("type `{}`", input.ident),
            )?;
            (struct_display_body(&data.fields, &message), Vec::new())
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "Error derive does not support unions",
            ));
        }
    };

    let source_body = if from_fields.is_empty() {
        quote! { None }
    } else {
        let arms = from_fields.iter().map(|field| {
            let variant = field.variant;
            match field.name {
                Some(ident) => quote! {
                    Self::#variant { #ident } => Some(#ident as &(dyn ::std::error::Error + 'static)),
                },
                None => quote! {
                    Self::#variant(inner) => Some(inner as &(dyn ::std::error::Error + 'static)),
                },
            }
        });
        quote! {
            match self {
                #(#arms)*
                _ => None,
            }
        }
    };

    let from_impls = from_fields.iter().map(|field| {
        let variant = field.variant;
        let ty = field.ty;
        let construct = match field.name {
            Some(ident) => quote! { Self::#variant { #ident: value } },
            None => quote! { Self::#variant(value) },
        };
        quote! {
            impl #impl_generics ::core::convert::From<#ty> for #name #ty_generics #where_clause {
                fn from(value: #ty) -> Self {
                    #construct
                }
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::std::fmt::Display for #name #ty_generics #where_clause {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                #display_body
            }
        }

        impl #impl_generics ::std::error::Error for #name #ty_generics #where_clause {
            #[allow(unreachable_patterns)]
            fn source(&self) -> ::core::option::Option<&(dyn ::std::error::Error + 'static)> {
                #source_body
            }
        }

        #(#from_impls)*
    })
}

fn variant_display_arm(
    variant: &syn::Ident,
    fields: &Fields,
    message: &str,
) -> proc_macro2::TokenStream {
    match fields {
        Fields::Unit => quote! {
            Self::#variant => write!(f, #message),
        },
        Fields::Unnamed(fields) => {
            let bindings: Vec<_> = (0..fields.unnamed.len())
                .map(|i| format_ident!("f{}", i))
                .collect();
            let message = positional_to_named(message, bindings.len());
            quote! {
                Self::#variant(#(#bindings),*) => write!(f, #message, #(#bindings = #bindings),*),
            }
        }
        Fields::Named(fields) => {
            let names: Vec<_> = fields.named.iter().map(|field| &field.ident).collect();
            quote! {
                Self::#variant { #(#names),* } => write!(f, #message, #(#names = #names),*),
            }
        }
    }
}

fn struct_display_body(fields: &Fields, message: &str) -> proc_macro2::TokenStream {
    match fields {
        Fields::Unit => quote! { write!(f, #message) },
        Fields::Named(fields) => {
            let names: Vec<_> = fields.named.iter().map(|field| &field.ident).collect();
            quote! { write!(f, #message, #(#names = self.#names),*) }
        }
        Fields::Unnamed(fields) => {
            let bindings: Vec<_> = (0..fields.unnamed.len())
                .map(|i| format_ident!("f{}", i))
                .collect();
            let indices: Vec<_> = (0..fields.unnamed.len()).map(syn::Index::from).collect();
            let message = positional_to_named(message, bindings.len());
            quote! { write!(f, #message, #(#bindings = self.#indices),*) }
        }
    }
}

/// Finds the `#[from]` field of a variant, if any.
fn from_field(variant: &syn::Variant) -> syn::Result<Option<FromField<'_>>> {
    let fields: Vec<&syn::Field> = match &variant.fields {
        Fields::Unit => return Ok(None),
        Fields::Named(named) => named.named.iter().collect(),
        Fields::Unnamed(unnamed) => unnamed.unnamed.iter().collect(),
    };

    let marked: Vec<&syn::Field> = fields
        .iter()
        .copied()
        .filter(|field| field.attrs.iter().any(|a| a.path().is_ident("from")))
        .collect();

    match marked.as_slice() {
        [] => Ok(None),
        [field] if fields.len() == 1 => Ok(Some(FromField {
            variant: &variant.ident,
            ty: &field.ty,
            name: field.ident.as_ref(),
        })),
        _ => Err(syn::Error::new_spanned(
            variant,
            "#[from] must mark the only field of its variant",
        )),
    }
}

/// Reads the message out of an `#[error("...")]` attribute.
fn message_from_attrs<T: ToTokens>(
    attrs: &[syn::Attribute],
    target: &T,
    target_desc: &str,
) -> syn::Result<String> {
    let Some(attr) = attrs.iter().find(|a| a.path().is_ident("error")) else {
        return Err(syn::Error::new_spanned(
            target,
            format!("{target_desc} needs an #[error(\"...\")] attribute with its display message"),
        ));
    };

    let Meta::List(list) = &attr.meta else {
        return Err(syn::Error::new_spanned(
            &attr.meta,
            "expected #[error(\"message\")]",
        ));
    };

    match syn::parse2::<Lit>(list.tokens.clone()) {
        Ok(Lit::Str(message)) => Ok(message.value()),
        _ => Err(syn::Error::new_spanned(
            &attr.meta,
            "the #[error] message must be a single string literal",
        )),
    }
}

/// Rewrites `{0}` / `{0:?}` style placeholders to `{f0}` / `{f0:?}`.
fn positional_to_named(message: &str, field_count: usize) -> String {
    let mut out = message.to_string();
    for i in (0..field_count).rev() {
        out = out
            .replace(&format!("{{{i}}}"), &format!("{{f{i}}}"))
            .replace(&format!("{{{i}:"), &format!("{{f{i}:"));
    }
    out
}
