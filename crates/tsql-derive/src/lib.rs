//! Derive macro for declaring models.
//!
//! This crate provides `#[derive(Model)]`, which implements
//! `tsql_core::Model` for a struct by building its `ModelDef` from the
//! struct's fields and attributes.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Expr, Fields, GenericArgument, Lit, PathArguments, Type,
    parse_macro_input,
};

/// Derives `tsql_core::Model` for a struct with named fields.
///
/// # Container Attributes
///
/// - `#[model(name = "User")]` - Logical model name (defaults to the struct name)
/// - `#[model(table = "Users")]` - Table name override
/// - `#[index(columns = "name, email DESC", unique, name = "idx")]` - A
///   multi-column index; may be repeated
///
/// # Field Attributes
///
/// - `#[field(primary_key)]` - Marks the primary key
/// - `#[field(column = "PostKey")]` - Storage name of the primary-key column
/// - `#[field(rename = "Name")]` - Logical field name (defaults to the field name)
/// - `#[field(limit = 100)]` - Length limit for String fields
/// - `#[field(index)]`, `#[field(unique)]`, `#[field(desc)]`,
///   `#[field(index_name = "...")]` - Inline single-column index
/// - `#[field(nullable)]`, `#[field(not_null)]` - Override nullability
/// - `#[field(kind = "Text")]`, `#[field(text)]` - Override the logical type
/// - `#[field(skip)]` - Not persisted
///
/// `Option<T>` fields are nullable, everything else is `NOT NULL` unless
/// overridden.
#[proc_macro_derive(Model, attributes(model, field, index))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_model_impl(&input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn derive_model_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let container = parse_container_attrs(&input.attrs)?;
    let model_name = container
        .name
        .clone()
        .unwrap_or_else(|| struct_name.to_string());

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Model derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Model derive only supports structs",
            ));
        }
    };

    let mut field_defs = Vec::new();
    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let attrs = parse_field_attrs(&field.attrs)?;
        if attrs.skip {
            continue;
        }
        let name = attrs.rename.clone().unwrap_or_else(|| ident.to_string());
        let (inner, optional) = unwrap_option(&field.ty);
        let logical = match &attrs.kind {
            Some(kind) => logical_from_name(kind, field)?,
            None => logical_from_type(inner).ok_or_else(|| {
                syn::Error::new_spanned(
                    &field.ty,
                    "cannot infer a logical type; add #[field(kind = \"...\")]",
                )
            })?,
        };
        let nullable = if attrs.not_null {
            false
        } else {
            attrs.nullable || optional
        };
        field_defs.push(field_tokens(&name, &logical, nullable, &attrs));
    }

    let table = container.table.as_ref().map(|t| quote! { .table(#t) });
    let indexes = container.indexes.iter().map(index_tokens);

    Ok(quote! {
        impl ::tsql_core::Model for #struct_name {
            const NAME: &'static str = #model_name;

            fn model_def() -> ::tsql_core::ModelDef {
                ::tsql_core::ModelDef::new(#model_name)
                    #table
                    #(.field(#field_defs))*
                    #(.index(#indexes))*
            }
        }
    })
}

fn field_tokens(name: &str, logical: &TokenStream2, nullable: bool, attrs: &FieldAttrs) -> TokenStream2 {
    let limit = attrs.limit.map(|n| quote! { .limit(#n) });
    let primary_key = attrs.primary_key.then(|| quote! { .primary_key() });
    let column = attrs.column.as_ref().map(|c| quote! { .column(#c) });
    let index = (attrs.index || attrs.unique || attrs.index_name.is_some()).then(|| {
        let unique = attrs.unique;
        let direction = if attrs.desc {
            quote! { ::tsql_core::Direction::Desc }
        } else {
            quote! { ::tsql_core::Direction::Asc }
        };
        let index_name = match &attrs.index_name {
            Some(n) => quote! { ::std::option::Option::Some(::std::string::String::from(#n)) },
            None => quote! { ::std::option::Option::None },
        };
        quote! {
            .with_index(::tsql_core::FieldIndex {
                unique: #unique,
                name: #index_name,
                kind: ::tsql_core::IndexKind::NonClustered,
                direction: #direction,
            })
        }
    });
    let mut def = quote! { ::tsql_core::FieldDef::new(#name, #logical) };
    if !nullable {
        def = quote! { #def.not_null() };
    }
    quote! { #def #limit #primary_key #column #index }
}

fn index_tokens(index: &IndexAttrs) -> TokenStream2 {
    let columns = index.columns.iter().map(|(field, desc)| {
        let direction = if *desc {
            quote! { ::tsql_core::Direction::Desc }
        } else {
            quote! { ::tsql_core::Direction::Asc }
        };
        quote! {
            ::tsql_core::IndexColumn {
                field: ::std::string::String::from(#field),
                direction: #direction,
            }
        }
    });
    let unique = index.unique.then(|| quote! { .unique() });
    let name = index.name.as_ref().map(|n| quote! { .named(#n) });
    quote! {
        ::tsql_core::IndexSpec::new(::std::vec![#(#columns),*]) #unique #name
    }
}

/// Returns the inner type of `Option<T>` and whether it was optional.
fn unwrap_option(ty: &Type) -> (&Type, bool) {
    generic_inner(ty, "Option").map_or((ty, false), |inner| (inner, true))
}

fn generic_inner<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    args.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    })
}

fn logical_from_type(ty: &Type) -> Option<TokenStream2> {
    if let Some(inner) = generic_inner(ty, "Vec") {
        let inner = logical_from_type(inner)?;
        return Some(quote! {
            ::tsql_core::LogicalType::Array(::std::boxed::Box::new(#inner))
        });
    }
    let Type::Path(path) = ty else {
        return None;
    };
    let ident = path.path.segments.last()?.ident.to_string();
    let variant = match ident.as_str() {
        "String" | "str" => quote! { String },
        "i8" | "i16" | "i32" | "i64" | "u8" | "u16" | "u32" | "u64" | "isize" | "usize" => {
            quote! { Number }
        }
        "f32" | "f64" => quote! { Point },
        "bool" => quote! { Boolean },
        "DateTime" | "NaiveDateTime" | "NaiveDate" => quote! { Date },
        "Value" => quote! { Json },
        _ => return None,
    };
    Some(quote! { ::tsql_core::LogicalType::#variant })
}

fn logical_from_name(kind: &str, field: &syn::Field) -> syn::Result<TokenStream2> {
    let variant = match kind {
        "String" => quote! { String },
        "Text" => quote! { Text },
        "Number" => quote! { Number },
        "Date" => quote! { Date },
        "Boolean" => quote! { Boolean },
        "Point" => quote! { Point },
        "JSON" | "Json" => quote! { Json },
        other => {
            return Err(syn::Error::new_spanned(
                field,
                format!("unknown logical type '{other}'"),
            ));
        }
    };
    Ok(quote! { ::tsql_core::LogicalType::#variant })
}

#[derive(Default)]
struct ContainerAttrs {
    name: Option<String>,
    table: Option<String>,
    indexes: Vec<IndexAttrs>,
}

#[derive(Default)]
struct IndexAttrs {
    columns: Vec<(String, bool)>,
    unique: bool,
    name: Option<String>,
}

#[derive(Default)]
struct FieldAttrs {
    rename: Option<String>,
    column: Option<String>,
    kind: Option<String>,
    limit: Option<u32>,
    primary_key: bool,
    nullable: bool,
    not_null: bool,
    index: bool,
    unique: bool,
    desc: bool,
    index_name: Option<String>,
    skip: bool,
}

fn string_value(meta: &syn::meta::ParseNestedMeta<'_>) -> syn::Result<String> {
    let value: Expr = meta.value()?.parse()?;
    if let Expr::Lit(lit) = &value {
        if let Lit::Str(s) = &lit.lit {
            return Ok(s.value());
        }
    }
    Err(syn::Error::new_spanned(value, "expected a string literal"))
}

fn parse_container_attrs(attrs: &[Attribute]) -> syn::Result<ContainerAttrs> {
    let mut result = ContainerAttrs::default();
    for attr in attrs {
        if attr.path().is_ident("model") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    result.name = Some(string_value(&meta)?);
                } else if meta.path.is_ident("table") {
                    result.table = Some(string_value(&meta)?);
                } else {
                    return Err(meta.error("unsupported model attribute"));
                }
                Ok(())
            })?;
        } else if attr.path().is_ident("index") {
            let mut index = IndexAttrs::default();
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("columns") {
                    let spec = string_value(&meta)?;
                    for term in spec.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                        let mut parts = term.split_whitespace();
                        let field = parts.next().unwrap_or_default().to_string();
                        let desc = match parts.next() {
                            None => false,
                            Some(d) if d.eq_ignore_ascii_case("asc") => false,
                            Some(d) if d.eq_ignore_ascii_case("desc") => true,
                            Some(_) => return Err(meta.error("expected ASC or DESC")),
                        };
                        index.columns.push((field, desc));
                    }
                } else if meta.path.is_ident("unique") {
                    index.unique = true;
                } else if meta.path.is_ident("name") {
                    index.name = Some(string_value(&meta)?);
                } else {
                    return Err(meta.error("unsupported index attribute"));
                }
                Ok(())
            })?;
            if index.columns.is_empty() {
                return Err(syn::Error::new_spanned(attr, "index needs at least one column"));
            }
            result.indexes.push(index);
        }
    }
    Ok(result)
}

fn parse_field_attrs(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut result = FieldAttrs::default();
    for attr in attrs {
        if !attr.path().is_ident("field") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("primary_key") {
                result.primary_key = true;
            } else if meta.path.is_ident("nullable") {
                result.nullable = true;
            } else if meta.path.is_ident("not_null") {
                result.not_null = true;
            } else if meta.path.is_ident("index") {
                result.index = true;
            } else if meta.path.is_ident("unique") {
                result.unique = true;
            } else if meta.path.is_ident("desc") {
                result.desc = true;
            } else if meta.path.is_ident("text") {
                result.kind = Some("Text".to_string());
            } else if meta.path.is_ident("skip") {
                result.skip = true;
            } else if meta.path.is_ident("rename") {
                result.rename = Some(string_value(&meta)?);
            } else if meta.path.is_ident("column") {
                result.column = Some(string_value(&meta)?);
            } else if meta.path.is_ident("kind") {
                result.kind = Some(string_value(&meta)?);
            } else if meta.path.is_ident("index_name") {
                result.index_name = Some(string_value(&meta)?);
            } else if meta.path.is_ident("limit") {
                let value: Expr = meta.value()?.parse()?;
                let Expr::Lit(syn::ExprLit {
                    lit: Lit::Int(n), ..
                }) = &value
                else {
                    return Err(syn::Error::new_spanned(value, "expected an integer"));
                };
                result.limit = Some(n.base10_parse()?);
            } else {
                return Err(meta.error("unsupported field attribute"));
            }
            Ok(())
        })?;
    }
    Ok(result)
}
