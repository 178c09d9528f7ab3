//! Derive macro implementing the `polyfs_types::xdr` `Pack` and `Unpack`
//! traits.
//!
//! Three shapes are supported:
//!
//! * structs (named, tuple or unit) — fields are encoded in declaration
//!   order;
//! * simple enums where every variant is a unit variant — encoded as the
//!   `u32` discriminant, which requires `#[repr(u32)]` and `Copy`;
//! * tagged unions — enums whose variants carry at most one unnamed field
//!   and declare their wire discriminant with `#[xdr(N)]`.

extern crate proc_macro;
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Data, DataEnum, DeriveInput, Expr, Fields, Ident, Index, Lit, Meta, Variant,
    parse_macro_input,
};

/// Reads the wire discriminant from a `#[xdr(N)]` variant attribute.
fn xdr_discriminant(variant: &Variant) -> Option<u32> {
    for attr in &variant.attrs {
        if !attr.path().is_ident("xdr") {
            continue;
        }
        if let Meta::List(list) = &attr.meta {
            if let Ok(Expr::Lit(syn::ExprLit {
                lit: Lit::Int(value),
                ..
            })) = list.parse_args::<Expr>()
            {
                if let Ok(value) = value.base10_parse::<u32>() {
                    return Some(value);
                }
            }
        }
    }
    None
}

fn struct_impl(name: &Ident, generics: &syn::Generics, fields: &Fields) -> TokenStream2 {
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    // Build one accessor expression per field; the rest of the codegen is
    // shared between named and tuple structs.
    let accessors: Vec<TokenStream2> = match fields {
        Fields::Named(named) => named
            .named
            .iter()
            .map(|f| {
                let ident = &f.ident;
                quote! { self.#ident }
            })
            .collect(),
        Fields::Unnamed(unnamed) => (0..unnamed.unnamed.len())
            .map(|i| {
                let index = Index::from(i);
                quote! { self.#index }
            })
            .collect(),
        Fields::Unit => Vec::new(),
    };

    let pack_fields = accessors.iter().map(|access| {
        quote! { written += polyfs_types::xdr::Pack::pack(&#access, out)?; }
    });
    let size_fields = accessors.iter().map(|access| {
        quote! { size += polyfs_types::xdr::Pack::packed_size(&#access); }
    });

    let bindings: Vec<Ident> = (0..accessors.len())
        .map(|i| Ident::new(&format!("field_{i}"), proc_macro2::Span::call_site()))
        .collect();
    let unpack_fields = bindings.iter().map(|binding| {
        quote! {
            let (#binding, n) = polyfs_types::xdr::Unpack::unpack(input)?;
            read += n;
        }
    });
    let construct = match fields {
        Fields::Named(named) => {
            let assigns = named.named.iter().zip(&bindings).map(|(f, binding)| {
                let ident = &f.ident;
                quote! { #ident: #binding, }
            });
            quote! { Self { #(#assigns)* } }
        }
        Fields::Unnamed(_) => quote! { Self(#(#bindings),*) },
        Fields::Unit => quote! { Self },
    };

    quote! {
        impl #impl_generics polyfs_types::xdr::Pack for #name #ty_generics #where_clause {
            fn packed_size(&self) -> usize {
                let mut size = 0;
                #(#size_fields)*
                size
            }

            fn pack(&self, out: &mut impl ::std::io::Write) -> polyfs_types::xdr::Result<usize> {
                let mut written = 0;
                #(#pack_fields)*
                Ok(written)
            }
        }

        impl #impl_generics polyfs_types::xdr::Unpack for #name #ty_generics #where_clause {
            fn unpack(input: &mut impl ::std::io::Read) -> polyfs_types::xdr::Result<(Self, usize)> {
                let mut read = 0;
                #(#unpack_fields)*
                Ok((#construct, read))
            }
        }
    }
}

fn simple_enum_impl(name: &Ident, generics: &syn::Generics, data: &DataEnum) -> TokenStream2 {
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let unpack_variants = data.variants.iter().map(|v| {
        let ident = &v.ident;
        quote! { x if x == Self::#ident as u32 => Ok(Self::#ident), }
    });

    quote! {
        impl #impl_generics polyfs_types::xdr::Pack for #name #ty_generics #where_clause {
            fn packed_size(&self) -> usize {
                4
            }

            fn pack(&self, out: &mut impl ::std::io::Write) -> polyfs_types::xdr::Result<usize> {
                polyfs_types::xdr::Pack::pack(&(*self as u32), out)
            }
        }

        impl #impl_generics polyfs_types::xdr::Unpack for #name #ty_generics #where_clause {
            fn unpack(input: &mut impl ::std::io::Read) -> polyfs_types::xdr::Result<(Self, usize)> {
                let (tag, read): (u32, usize) = polyfs_types::xdr::Unpack::unpack(input)?;
                let value = match tag {
                    #(#unpack_variants)*
                    _ => Err(polyfs_types::xdr::Error::InvalidEnumValue(tag)),
                };
                value.map(|value| (value, read))
            }
        }
    }
}

fn union_impl(name: &Ident, generics: &syn::Generics, data: &DataEnum) -> TokenStream2 {
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    for variant in &data.variants {
        match &variant.fields {
            Fields::Unit => {}
            Fields::Unnamed(fields) if fields.unnamed.len() == 1 => {}
            _ => panic!(
                "union variant '{}' must be a unit or carry exactly one unnamed field",
                variant.ident
            ),
        }
        assert!(
            xdr_discriminant(variant).is_some(),
            "union variant '{}' is missing its #[xdr(N)] discriminant",
            variant.ident
        );
    }

    let pack_variants = data.variants.iter().map(|v| {
        let ident = &v.ident;
        let tag = xdr_discriminant(v).expect("validated above");
        match &v.fields {
            Fields::Unit => quote! {
                Self::#ident => polyfs_types::xdr::Pack::pack(&#tag, out),
            },
            _ => quote! {
                Self::#ident(value) => {
                    let mut written = polyfs_types::xdr::Pack::pack(&#tag, out)?;
                    written += polyfs_types::xdr::Pack::pack(value, out)?;
                    Ok(written)
                }
            },
        }
    });

    let size_variants = data.variants.iter().map(|v| {
        let ident = &v.ident;
        match &v.fields {
            Fields::Unit => quote! { Self::#ident => 4, },
            _ => quote! {
                Self::#ident(value) => 4 + polyfs_types::xdr::Pack::packed_size(value),
            },
        }
    });

    let unpack_variants = data.variants.iter().map(|v| {
        let ident = &v.ident;
        let tag = xdr_discriminant(v).expect("validated above");
        match &v.fields {
            Fields::Unit => quote! { #tag => Ok(Self::#ident), },
            _ => quote! {
                #tag => {
                    let (value, n) = polyfs_types::xdr::Unpack::unpack(input)?;
                    read += n;
                    Ok(Self::#ident(value))
                }
            },
        }
    });

    quote! {
        impl #impl_generics polyfs_types::xdr::Pack for #name #ty_generics #where_clause {
            fn packed_size(&self) -> usize {
                match self {
                    #(#size_variants)*
                }
            }

            fn pack(&self, out: &mut impl ::std::io::Write) -> polyfs_types::xdr::Result<usize> {
                match self {
                    #(#pack_variants)*
                }
            }
        }

        impl #impl_generics polyfs_types::xdr::Unpack for #name #ty_generics #where_clause {
            fn unpack(input: &mut impl ::std::io::Read) -> polyfs_types::xdr::Result<(Self, usize)> {
                let (tag, mut read): (u32, usize) = polyfs_types::xdr::Unpack::unpack(input)?;
                let value = match tag {
                    #(#unpack_variants)*
                    _ => Err(polyfs_types::xdr::Error::InvalidEnumValue(tag)),
                };
                value.map(|value| (value, read))
            }
        }
    }
}

fn enum_impl(name: &Ident, generics: &syn::Generics, data: &DataEnum) -> TokenStream2 {
    let has_payload = data
        .variants
        .iter()
        .any(|v| !matches!(v.fields, Fields::Unit));
    if has_payload {
        union_impl(name, generics, data)
    } else {
        simple_enum_impl(name, generics, data)
    }
}

#[proc_macro_derive(XdrCodec, attributes(xdr))]
#[allow(clippy::missing_panics_doc)]
pub fn derive_xdr_codec(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let generics = &input.generics;

    let expanded = match &input.data {
        Data::Struct(data) => struct_impl(name, generics, &data.fields),
        Data::Enum(data) => enum_impl(name, generics, data),
        Data::Union(_) => panic!("XdrCodec cannot be derived for unions"),
    };

    expanded.into()
}
