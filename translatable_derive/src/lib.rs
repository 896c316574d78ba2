//! `#[derive(Model)]` for translatable.
//!
//! Generates the `Model` impl (schema, row conversion, timestamps,
//! migration registration) and, with `#[translates(..)]`, the
//! `Translatable` impl plus named localized accessors per attribute.

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::{format_ident, quote};
use syn::punctuated::Punctuated;
use syn::{Data, DeriveInput, Fields, Ident, LitStr, Token, parse_macro_input};

#[proc_macro_derive(Model, attributes(model, translates))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

struct Column {
    ident: Ident,
    ty: syn::Type,
}

fn snake_case(name: &str) -> String {
    let mut out = String::new();
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn parse_table(input: &DeriveInput) -> syn::Result<Option<String>> {
    let mut table = None;
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("model")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let lit: LitStr = meta.value()?.parse()?;
                table = Some(lit.value());
                Ok(())
            } else {
                Err(meta.error("expected `table = \"...\"`"))
            }
        })?;
    }
    Ok(table)
}

fn parse_translates(input: &DeriveInput) -> syn::Result<Option<Vec<Ident>>> {
    let Some(attr) = input.attrs.iter().find(|a| a.path().is_ident("translates")) else {
        return Ok(None);
    };
    let names = attr.parse_args_with(Punctuated::<Ident, Token![,]>::parse_terminated)?;
    if names.is_empty() {
        return Err(syn::Error::new_spanned(
            attr,
            "`translates` needs at least one attribute name",
        ));
    }
    let mut seen: Vec<Ident> = Vec::new();
    for name in names {
        if seen.contains(&name) {
            return Err(syn::Error::new_spanned(
                &name,
                format!("`{}` is declared as translated more than once", name),
            ));
        }
        seen.push(name);
    }
    Ok(Some(seen))
}

fn expand(input: DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "models cannot be generic",
        ));
    }
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "models need named fields",
                ));
            }
        },
        _ => return Err(syn::Error::new_spanned(name, "models must be structs")),
    };

    let table = parse_table(&input)?.unwrap_or_else(|| format!("{}s", snake_case(&name.to_string())));
    let translated = parse_translates(&input)?;

    let mut has_id = false;
    let mut has_i18n = false;
    let mut columns = Vec::new();
    for field in fields {
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        if ident == "id" {
            has_id = true;
            continue;
        }
        if ident == "i18n" {
            has_i18n = true;
        }
        columns.push(Column {
            ident,
            ty: field.ty.clone(),
        });
    }
    if !has_id {
        return Err(syn::Error::new_spanned(
            name,
            "models need an `id: Option<i64>` field",
        ));
    }
    if translated.is_some() && !has_i18n {
        return Err(syn::Error::new_spanned(
            name,
            "`translates` needs an `i18n: TranslationStore` field",
        ));
    }

    let model_name = name.to_string();
    let column_names: Vec<String> = columns.iter().map(|c| c.ident.to_string()).collect();
    let column_idents: Vec<&Ident> = columns.iter().map(|c| &c.ident).collect();
    let column_types: Vec<&syn::Type> = columns.iter().map(|c| &c.ty).collect();

    let has_column = |wanted: &str| columns.iter().any(|c| c.ident == wanted);
    let stamp_created = has_column("created_at").then(|| {
        quote! {
            if self.created_at.is_none() {
                self.created_at = ::core::option::Option::Some(now);
            }
        }
    });
    let stamp_updated = has_column("updated_at").then(|| {
        quote! { self.updated_at = ::core::option::Option::Some(now); }
    });
    // Values as they would read after `touch(now)`, without stamping `self`.
    let stamped_values: Vec<TokenStream2> = columns
        .iter()
        .map(|c| {
            let ident = &c.ident;
            if c.ident == "created_at" {
                quote! {
                    ::translatable::orm::ColumnType::to_sql(
                        &self.created_at.or(::core::option::Option::Some(now)),
                    )?
                }
            } else if c.ident == "updated_at" {
                quote! {
                    ::translatable::orm::ColumnType::to_sql(&::core::option::Option::Some(now))?
                }
            } else {
                quote! { ::translatable::orm::ColumnType::to_sql(&self.#ident)? }
            }
        })
        .collect();
    let touch = (stamp_created.is_some() || stamp_updated.is_some()).then(|| {
        quote! {
            fn touch(&mut self, now: ::translatable::chrono::DateTime<::translatable::chrono::Utc>) {
                #stamp_created
                #stamp_updated
            }

            fn column_values_at(
                &self,
                now: ::translatable::chrono::DateTime<::translatable::chrono::Utc>,
            ) -> ::translatable::Result<::std::vec::Vec<::core::option::Option<::std::string::String>>> {
                ::core::result::Result::Ok(::std::vec![#(#stamped_values),*])
            }
        }
    });

    let translated_names = translated.as_ref().map(|idents| {
        let names: Vec<String> = idents.iter().map(|i| i.to_string()).collect();
        quote! {
            fn translated_attribute_names() -> &'static [&'static str] {
                &[#(#names),*]
            }
        }
    });

    let migrate_fn = format_ident!("__translatable_migrate_{}", snake_case(&model_name));

    let model_impl = quote! {
        impl ::translatable::orm::Model for #name {
            fn table_name() -> &'static str {
                #table
            }

            fn model_name() -> &'static str {
                #model_name
            }

            fn columns() -> ::std::vec::Vec<(::std::string::String, ::std::string::String)> {
                ::std::vec![
                    #((
                        ::std::string::String::from(#column_names),
                        ::std::string::String::from(
                            <#column_types as ::translatable::orm::ColumnType>::SQL_TYPE,
                        ),
                    )),*
                ]
            }

            #translated_names

            fn id(&self) -> ::core::option::Option<i64> {
                self.id
            }

            fn set_id(&mut self, id: i64) {
                self.id = ::core::option::Option::Some(id);
            }

            fn column_values(
                &self,
            ) -> ::translatable::Result<::std::vec::Vec<::core::option::Option<::std::string::String>>> {
                ::core::result::Result::Ok(::std::vec![
                    #(::translatable::orm::ColumnType::to_sql(&self.#column_idents)?),*
                ])
            }

            fn from_columns(
                id: i64,
                values: ::std::vec::Vec<::core::option::Option<::std::string::String>>,
            ) -> ::translatable::Result<Self> {
                let mut values = values.into_iter();
                ::core::result::Result::Ok(Self {
                    id: ::core::option::Option::Some(id),
                    #(#column_idents: ::translatable::orm::decode_column(&mut values, #column_names)?,)*
                })
            }

            #touch
        }

        #[allow(non_snake_case)]
        fn #migrate_fn(
            db: ::std::sync::Arc<::translatable::orm::Db>,
        ) -> ::translatable::orm::BoxFuture<'static, ::translatable::Result<()>> {
            <#name as ::translatable::orm::Model>::migrate(db)
        }

        ::translatable::inventory::submit! {
            ::translatable::orm::Migration(#migrate_fn)
        }
    };

    let Some(translated) = translated else {
        return Ok(model_impl);
    };

    let accessors = translated.iter().map(|attr| {
        let key = attr.to_string();
        let getter_in = format_ident!("{}_in", attr);
        let setter = format_ident!("set_{}", attr);
        let setter_in = format_ident!("set_{}_in", attr);
        let with = format_ident!("with_{}", attr);
        let doc_get = LitStr::new(
            &format!("Translated `{}` in the current locale.", key),
            Span::call_site(),
        );
        let doc_set = LitStr::new(
            &format!("Sets the translated `{}` in the current locale.", key),
            Span::call_site(),
        );
        quote! {
            #[doc = #doc_get]
            pub fn #attr(&self) -> ::core::option::Option<&str> {
                self.i18n.get(&::translatable::locale::current(), #key)
            }

            pub fn #getter_in(&self, locale: &::translatable::Locale) -> ::core::option::Option<&str> {
                self.i18n.get(locale, #key)
            }

            #[doc = #doc_set]
            pub fn #setter(&mut self, value: impl ::core::convert::Into<::std::string::String>) {
                self.#setter_in(&::translatable::locale::current(), value);
            }

            pub fn #setter_in(
                &mut self,
                locale: &::translatable::Locale,
                value: impl ::core::convert::Into<::std::string::String>,
            ) {
                self.i18n.set(locale, #key, ::core::option::Option::Some(value.into()));
            }

            pub fn #with(mut self, value: impl ::core::convert::Into<::std::string::String>) -> Self {
                self.#setter(value);
                self
            }
        }
    });

    Ok(quote! {
        #model_impl

        impl ::translatable::model::Translatable for #name {
            fn i18n(&self) -> &::translatable::store::TranslationStore {
                &self.i18n
            }

            fn i18n_mut(&mut self) -> &mut ::translatable::store::TranslationStore {
                &mut self.i18n
            }
        }

        impl #name {
            #(#accessors)*
        }
    })
}
