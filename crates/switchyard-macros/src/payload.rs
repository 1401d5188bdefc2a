//! Payload derive macro implementation, **parent-in-child** design.
//!
//! `#[derive(Payload)]` generates:
//!
//! 1. `impl Payload` with name metadata and an `upcast` that walks the parent chain
//! 2. `impl Deref[Mut]` to the parent, when a parent field exists
//!
//! # Struct-level attributes `#[payload(...)]`
//!
//! | Key | Example | Required | Description |
//! |-----|---------|----------|-------------|
//! | `name` | `"attack.critical"` | No | Payload name (default: the Rust type path) |
//!
//! # Field-level attributes `#[payload(...)]`
//!
//! | Key | Description |
//! |-----|-------------|
//! | `parent` | Marks this field as the base payload (type is auto-detected) |

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, Member, Type, spanned::Spanned};

#[derive(Default)]
struct PayloadAttrs {
    name: Option<syn::LitStr>,
}

pub fn derive_payload(input: &DeriveInput) -> syn::Result<TokenStream> {
    let attrs = parse_struct_attrs(&input.attrs)?;
    let parent = match &input.data {
        Data::Struct(data) => find_parent(&data.fields)?,
        Data::Enum(_) => None,
        Data::Union(_) => {
            return Err(syn::Error::new(
                input.span(),
                "Payload cannot be derived for unions",
            ));
        }
    };

    Ok(generate(input, &attrs, parent))
}

fn parse_struct_attrs(attrs: &[Attribute]) -> syn::Result<PayloadAttrs> {
    let mut result = PayloadAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("payload") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                result.name = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("unknown payload attribute, expected `name`"))
            }
        })?;
    }

    Ok(result)
}

fn find_parent(fields: &Fields) -> syn::Result<Option<(Member, Type)>> {
    let mut parent: Option<(Member, Type)> = None;

    for (index, field) in fields.iter().enumerate() {
        let mut is_parent = false;
        for attr in &field.attrs {
            if !attr.path().is_ident("payload") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("parent") {
                    is_parent = true;
                    Ok(())
                } else {
                    Err(meta.error("unknown field attribute, expected `parent`"))
                }
            })?;
        }
        if !is_parent {
            continue;
        }
        if parent.is_some() {
            return Err(syn::Error::new(
                field.span(),
                "a payload can only have one #[payload(parent)] field",
            ));
        }
        let member = match &field.ident {
            Some(ident) => Member::Named(ident.clone()),
            None => Member::Unnamed(index.into()),
        };
        parent = Some((member, field.ty.clone()));
    }

    Ok(parent)
}

fn generate(
    input: &DeriveInput,
    attrs: &PayloadAttrs,
    parent: Option<(Member, Type)>,
) -> TokenStream {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let name_impl = match &attrs.name {
        Some(lit) => quote! { #lit },
        None => quote! { ::std::any::type_name::<Self>() },
    };

    let upcast_impl = match &parent {
        Some((member, parent_ty)) => quote! {
            fn upcast(&self, target: ::std::any::TypeId) -> Option<&dyn ::std::any::Any> {
                if target == ::std::any::TypeId::of::<Self>() {
                    return Some(self);
                }
                <#parent_ty as ::switchyard_core::Payload>::upcast(&self.#member, target)
            }
        },
        None => quote! {
            fn upcast(&self, target: ::std::any::TypeId) -> Option<&dyn ::std::any::Any> {
                (target == ::std::any::TypeId::of::<Self>()).then_some(self as &dyn ::std::any::Any)
            }
        },
    };

    let deref_impls = match &parent {
        Some((member, parent_ty)) => quote! {
            impl #impl_generics ::std::ops::Deref for #name #ty_generics #where_clause {
                type Target = #parent_ty;
                #[inline]
                fn deref(&self) -> &Self::Target {
                    &self.#member
                }
            }

            impl #impl_generics ::std::ops::DerefMut for #name #ty_generics #where_clause {
                #[inline]
                fn deref_mut(&mut self) -> &mut Self::Target {
                    &mut self.#member
                }
            }
        },
        None => quote! {},
    };

    quote! {
        impl #impl_generics ::switchyard_core::Payload for #name #ty_generics #where_clause {
            fn payload_name(&self) -> &'static str {
                #name_impl
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            #upcast_impl
        }

        #deref_impls
    }
}
