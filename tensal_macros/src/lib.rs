// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

//! Derive macros shared across the `tensal` workspace: `Constructor` generates
//! a positional `new` (struct) or one `new_<variant>` per enum variant, and
//! `Getters` generates a `&self -> &Field` accessor per named field.

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DeriveInput, Fields};

#[proc_macro_derive(Constructor)]
pub fn derive_constructor(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = match input.data {
        Data::Struct(data) => {
            let (params, inits) = fields_to_ctor(&data.fields);
            quote! {
                impl #impl_generics #name #ty_generics #where_clause {
                    /// Builds a new instance from its fields, in declaration order.
                    pub fn new(#(#params),*) -> Self {
                        Self #inits
                    }
                }
            }
        }
        Data::Enum(data) => {
            let mut methods = Vec::new();
            for variant in &data.variants {
                let vname = &variant.ident;
                let fn_name = format_ident!("new_{}", to_snake_case(&vname.to_string()));
                let (params, inits) = fields_to_ctor(&variant.fields);
                let ctor = match &variant.fields {
                    Fields::Named(_) => quote! { #name::#vname #inits },
                    Fields::Unnamed(_) => quote! { #name::#vname #inits },
                    Fields::Unit => quote! { #name::#vname },
                };
                methods.push(quote! {
                    pub fn #fn_name(#(#params),*) -> Self {
                        #ctor
                    }
                });
            }
            quote! {
                impl #impl_generics #name #ty_generics #where_clause {
                    #(#methods)*
                }
            }
        }
        Data::Union(_) => {
            return syn::Error::new_spanned(name, "Constructor cannot be derived for unions")
                .to_compile_error()
                .into();
        }
    };

    body.into()
}

fn fields_to_ctor(fields: &Fields) -> (Vec<proc_macro2::TokenStream>, proc_macro2::TokenStream) {
    match fields {
        Fields::Named(named) => {
            let params: Vec<_> = named
                .named
                .iter()
                .map(|f| {
                    let ident = f.ident.as_ref().unwrap();
                    let ty = &f.ty;
                    quote! { #ident: #ty }
                })
                .collect();
            let names: Vec<_> = named.named.iter().map(|f| f.ident.clone().unwrap()).collect();
            (params, quote! { { #(#names),* } })
        }
        Fields::Unnamed(unnamed) => {
            let params: Vec<_> = unnamed
                .unnamed
                .iter()
                .enumerate()
                .map(|(i, f)| {
                    let ident = format_ident!("arg{}", i);
                    let ty = &f.ty;
                    quote! { #ident: #ty }
                })
                .collect();
            let names: Vec<_> = (0..unnamed.unnamed.len())
                .map(|i| format_ident!("arg{}", i))
                .collect();
            (params, quote! { ( #(#names),* ) })
        }
        Fields::Unit => (Vec::new(), quote! {}),
    }
}

fn to_snake_case(s: &str) -> String {
    let mut out = String::new();
    for (i, ch) in s.char_indices() {
        if ch.is_uppercase() {
            if i != 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[proc_macro_derive(Getters, attributes(getter))]
pub fn derive_getters(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return syn::Error::new_spanned(
                    name,
                    "Getters requires a struct with named fields",
                )
                .to_compile_error()
                .into()
            }
        },
        _ => {
            return syn::Error::new_spanned(name, "Getters can only be derived for structs")
                .to_compile_error()
                .into()
        }
    };

    let mut methods = Vec::new();
    for field in fields {
        let fname = field.ident.as_ref().unwrap();
        let ty = &field.ty;
        let getter_name = getter_override(field).unwrap_or_else(|| fname.clone());
        methods.push(quote! {
            pub fn #getter_name(&self) -> &#ty {
                &self.#fname
            }
        });
    }

    let expanded = quote! {
        impl #impl_generics #name #ty_generics #where_clause {
            #(#methods)*
        }
    };
    expanded.into()
}

fn getter_override(field: &syn::Field) -> Option<syn::Ident> {
    for attr in &field.attrs {
        if !attr.path().is_ident("getter") {
            continue;
        }
        let mut found = None;
        let _ = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value = meta.value()?;
                let ident: syn::Ident = value.parse()?;
                found = Some(ident);
            }
            Ok(())
        });
        if found.is_some() {
            return found;
        }
    }
    None
}
