//! Component derive macro implementation.
//!
//! `#[derive(Component)]` with `#[component(setup, update, ...)]` generates the
//! `as_*` capability queries of `switchyard_lifecycle::Component`, each returning
//! `Some(self)` for the listed roles.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{DeriveInput, Ident};

/// Role keyword and the lifecycle trait it maps to.
const ROLES: &[(&str, &str)] = &[
    ("setup", "SetupComponent"),
    ("start", "StartComponent"),
    ("update", "UpdateComponent"),
    ("cleanup", "CleanupComponent"),
    ("cancel", "CancelComponent"),
    ("cancel_listener", "CancelListener"),
    ("error_dispatcher", "ErrorDispatcher"),
    ("error_handler", "ErrorHandler"),
];

pub fn derive_component(input: &DeriveInput) -> syn::Result<TokenStream> {
    let roles = parse_roles(input)?;
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let methods = roles.iter().map(|(role, trait_name)| {
        let method = format_ident!("as_{}", role);
        let role_trait = format_ident!("{}", trait_name);
        quote! {
            fn #method(&self) -> Option<&dyn ::switchyard_lifecycle::#role_trait> {
                Some(self)
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::switchyard_lifecycle::Component for #name #ty_generics #where_clause {
            #(#methods)*
        }
    })
}

fn parse_roles(input: &DeriveInput) -> syn::Result<Vec<(String, &'static str)>> {
    let mut roles = Vec::new();

    for attr in &input.attrs {
        if !attr.path().is_ident("component") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            let ident: &Ident = meta
                .path
                .get_ident()
                .ok_or_else(|| meta.error("expected a role name"))?;
            let key = ident.to_string();
            let Some((_, trait_name)) = ROLES.iter().find(|(role, _)| *role == key) else {
                return Err(meta.error(format!("unknown lifecycle role `{key}`")));
            };
            if roles.iter().any(|(existing, _)| *existing == key) {
                return Err(meta.error(format!("role `{key}` listed twice")));
            }
            roles.push((key, *trait_name));
            Ok(())
        })?;
    }

    if roles.is_empty() {
        return Err(syn::Error::new(
            input.ident.span(),
            "#[derive(Component)] requires #[component(...)] listing at least one role",
        ));
    }

    Ok(roles)
}
