//! Derive macros for `brrtdispatch` parameter binding.
//!
//! - `#[derive(Bindable)]` builds the field setter table of a struct with
//!   named fields, so it can be declared as a bound-object parameter.
//! - `#[derive(ParamEnum)]` maps a unit enum onto an enum target, so it can
//!   be declared as a named value.

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, LitStr, Result as SynResult};

#[derive(Default)]
struct FieldOptions {
    rename: Option<String>,
    skip: bool,
}

fn parse_options(attrs: &[Attribute], attr_name: &str) -> SynResult<FieldOptions> {
    let mut options = FieldOptions::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident(attr_name)) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let value: LitStr = meta.value()?.parse()?;
                options.rename = Some(value.value());
                Ok(())
            } else if meta.path.is_ident("skip") {
                options.skip = true;
                Ok(())
            } else {
                Err(meta.error(format!("unsupported {attr_name} option")))
            }
        })?;
    }
    Ok(options)
}

/// Implement `Bindable` and `ParamType` for a struct with named fields.
///
/// Every field type must implement `ParamType`; the struct must implement
/// `Default` (skipped fields keep their default). Field keys default to the
/// field name and can be changed with `#[bind(rename = "key")]`.
#[proc_macro_derive(Bindable, attributes(bind))]
pub fn derive_bindable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_bindable(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_bindable(input: &DeriveInput) -> SynResult<proc_macro2::TokenStream> {
    let name = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Bindable cannot be derived for generic types",
        ));
    }
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            name,
            "Bindable can only be derived for structs",
        ));
    };
    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new_spanned(
            name,
            "Bindable needs a struct with named fields",
        ));
    };

    let mut assigners = Vec::new();
    let mut setters = Vec::new();
    for field in &fields.named {
        let options = parse_options(&field.attrs, "bind")?;
        if options.skip {
            continue;
        }
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let ty = &field.ty;
        let key = options
            .rename
            .unwrap_or_else(|| ident.to_string().trim_start_matches("r#").to_string());
        let assign = format_ident!("__assign_{}", ident);

        assigners.push(quote! {
            fn #assign(
                target: &mut #name,
                arg: ::brrtdispatch::binding::Arg,
            ) -> ::std::result::Result<(), ::brrtdispatch::binding::ExtractError> {
                target.#ident = <#ty as ::brrtdispatch::binding::ParamType>::from_arg(arg)?;
                ::std::result::Result::Ok(())
            }
        });
        setters.push(quote! {
            ::brrtdispatch::binding::FieldSetter {
                key: #key,
                target: <#ty as ::brrtdispatch::binding::ParamType>::target_type,
                assign: #assign,
            }
        });
    }

    Ok(quote! {
        impl ::brrtdispatch::binding::Bindable for #name {
            fn field_setters() -> &'static [::brrtdispatch::binding::FieldSetter<Self>] {
                #(#assigners)*
                const SETTERS: &[::brrtdispatch::binding::FieldSetter<#name>] = &[#(#setters),*];
                SETTERS
            }
        }

        impl ::brrtdispatch::binding::ParamType for #name {
            fn target_type() -> ::brrtdispatch::binding::TargetType {
                ::brrtdispatch::binding::TargetType::object::<#name>()
            }

            fn from_arg(
                arg: ::brrtdispatch::binding::Arg,
            ) -> ::std::result::Result<Self, ::brrtdispatch::binding::ExtractError> {
                arg.into_object::<#name>()
            }
        }
    })
}

/// Implement `ParamType` for a fieldless enum.
///
/// Request values must equal a variant name exactly, or the name given with
/// `#[param(rename = "value")]`.
#[proc_macro_derive(ParamEnum, attributes(param))]
pub fn derive_param_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_param_enum(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_param_enum(input: &DeriveInput) -> SynResult<proc_macro2::TokenStream> {
    let name = &input.ident;
    let name_str = name.to_string();
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "ParamEnum cannot be derived for generic types",
        ));
    }
    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            name,
            "ParamEnum can only be derived for enums",
        ));
    };

    let mut keys = Vec::new();
    let mut idents = Vec::new();
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "ParamEnum variants cannot carry data",
            ));
        }
        let options = parse_options(&variant.attrs, "param")?;
        if options.skip {
            continue;
        }
        keys.push(options.rename.unwrap_or_else(|| variant.ident.to_string()));
        idents.push(&variant.ident);
    }

    Ok(quote! {
        impl ::brrtdispatch::binding::ParamType for #name {
            fn target_type() -> ::brrtdispatch::binding::TargetType {
                ::brrtdispatch::binding::TargetType::Enum {
                    name: #name_str,
                    variants: &[#(#keys),*],
                }
            }

            fn from_arg(
                arg: ::brrtdispatch::binding::Arg,
            ) -> ::std::result::Result<Self, ::brrtdispatch::binding::ExtractError> {
                match arg.into_variant()? {
                    #(#keys => ::std::result::Result::Ok(Self::#idents),)*
                    other => ::std::result::Result::Err(
                        ::brrtdispatch::binding::ExtractError::UnknownVariant {
                            value: other.to_string(),
                            target: #name_str,
                        },
                    ),
                }
            }
        }
    })
}
