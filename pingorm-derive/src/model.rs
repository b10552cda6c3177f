//! `Model` derive implementation
//!
//! Generates, inside an anonymous `const` block so several entities can share a module:
//! the `FIELDS`, `RELATIONS` and `SCHEMA` statics, `impl Record` (column access by name,
//! relation access) and `impl Model` (schema access, row decoding).

use crate::attributes::{self, RelationAttributes, RelationKind};
use convert_case::{Case, Casing};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::ext::IdentExt;
use syn::{
    parse_macro_input, Data, DataStruct, DeriveInput, Fields, GenericArgument, Ident,
    PathArguments, Type,
};

/// How a relation field holds its records.
#[derive(Clone, Copy)]
enum Holder {
    Many,
    One,
    BoxedOne,
}

struct Column {
    ident: Ident,
    name: String,
    column: String,
    nullable: bool,
}

struct Association {
    ident: Ident,
    target: Type,
    holder: Holder,
    attrs: RelationAttributes,
}

impl Association {
    fn name(&self) -> String {
        self.attrs
            .name
            .clone()
            .unwrap_or_else(|| self.ident.unraw().to_string().to_case(Case::Pascal))
    }
}

pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// `T` when `ty` is `wrapper<T>`.
fn generic_argument<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first() {
        Some(GenericArgument::Type(inner)) => Some(inner),
        _ => None,
    }
}

fn holder(ty: &Type) -> Option<(Holder, Type)> {
    if let Some(inner) = generic_argument(ty, "Vec") {
        return Some((Holder::Many, inner.clone()));
    }
    let inner = generic_argument(ty, "Option")?;
    match generic_argument(inner, "Box") {
        Some(boxed) => Some((Holder::BoxedOne, boxed.clone())),
        None => Some((Holder::One, inner.clone())),
    }
}

/// Same folding as `pingorm::naming::normalize_name`, done at expansion time.
fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let ident = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Model cannot be derived for generic structs",
        ));
    }
    let fields = match &input.data {
        Data::Struct(DataStruct {
            fields: Fields::Named(fields),
            ..
        }) => &fields.named,
        _ => {
            return Err(syn::Error::new_spanned(
                ident,
                "Model can only be derived for structs with named fields",
            ))
        }
    };

    let entity_name = attributes::string_value(&input.attrs, "entity_name")?
        .unwrap_or_else(|| ident.to_string());
    let table_name = attributes::string_value(&input.attrs, "table_name")?
        .unwrap_or_else(|| ident.to_string().to_case(Case::Snake));

    let mut columns = Vec::new();
    let mut associations = Vec::new();
    let mut skipped = Vec::new();
    let mut primary_key = None;
    let mut auto_increment = false;
    let mut soft_delete = None;

    for field in fields {
        let Some(field_ident) = field.ident.clone() else {
            continue;
        };
        if attributes::has_attribute(&field.attrs, "skip") {
            skipped.push(field_ident);
            continue;
        }

        if let Some(relation) = attributes::parse_relation(&field.attrs)? {
            let (holder, target) = holder(&field.ty).ok_or_else(|| {
                syn::Error::new_spanned(
                    &field.ty,
                    "a relation field must be `Vec<T>`, `Option<T>` or `Option<Box<T>>`",
                )
            })?;
            let many = matches!(holder, Holder::Many);
            if (relation.kind == RelationKind::HasMany) != many {
                return Err(syn::Error::new_spanned(
                    &field.ty,
                    "`has_many` needs a `Vec<T>` field, `has_one` and `belongs_to` an `Option<T>`",
                ));
            }
            associations.push(Association {
                ident: field_ident,
                target,
                holder,
                attrs: relation,
            });
            continue;
        }

        let plain = field_ident.unraw().to_string();
        let column = attributes::string_value(&field.attrs, "column_name")?
            .unwrap_or_else(|| plain.clone());
        let name = attributes::string_value(&field.attrs, "field_name")?
            .unwrap_or_else(|| plain.to_case(Case::Pascal));
        if attributes::has_attribute(&field.attrs, "primary_key") {
            if primary_key.is_some() {
                return Err(syn::Error::new_spanned(
                    &field_ident,
                    "only one `#[primary_key]` field is supported",
                ));
            }
            primary_key = Some(column.clone());
            auto_increment = attributes::has_attribute(&field.attrs, "auto_increment");
        }
        if attributes::has_attribute(&field.attrs, "soft_delete") {
            soft_delete = Some(column.clone());
        }
        columns.push(Column {
            ident: field_ident,
            name,
            column,
            nullable: generic_argument(&field.ty, "Option").is_some(),
        });
    }

    let primary_key = primary_key
        .ok_or_else(|| syn::Error::new_spanned(ident, "Model needs a `#[primary_key]` field"))?;
    let soft_delete = match soft_delete {
        Some(column) => quote!(::core::option::Option::Some(#column)),
        None => quote!(::core::option::Option::None),
    };

    let field_count = columns.len();
    let field_defs = columns.iter().map(|c| {
        let name = &c.name;
        let column = &c.column;
        quote!(::pingorm::Field { name: #name, column: #column })
    });

    let relation_count = associations.len();
    let relation_defs = associations.iter().map(|a| {
        let name = a.name();
        let target = &a.target;
        let foreign_key = &a.attrs.foreign_key;
        let references = &a.attrs.references;
        let kind = match a.attrs.kind {
            RelationKind::HasMany => quote!(::pingorm::RelationKind::HasMany),
            RelationKind::HasOne => quote!(::pingorm::RelationKind::HasOne),
            RelationKind::BelongsTo => quote!(::pingorm::RelationKind::BelongsTo),
        };
        quote! {
            ::pingorm::Relation {
                name: #name,
                kind: #kind,
                target: <#target as ::pingorm::Model>::table_schema,
                foreign_key: #foreign_key,
                references: #references,
            }
        }
    });

    let column_lits: Vec<&String> = columns.iter().map(|c| &c.column).collect();
    let column_idents: Vec<&Ident> = columns.iter().map(|c| &c.ident).collect();
    let decoders = columns.iter().map(|c| {
        let field = &c.ident;
        let column = &c.column;
        if c.nullable {
            quote!(#field: row.column_opt(#column)?)
        } else {
            quote!(#field: row.column_or_default(#column)?)
        }
    });
    let defaulted = associations
        .iter()
        .map(|a| &a.ident)
        .chain(skipped.iter())
        .map(|field| quote!(#field: ::core::default::Default::default()));

    let (related, related_mut, set_related) = if associations.is_empty() {
        (
            quote! {
                let _ = relation;
                ::std::vec::Vec::new()
            },
            quote! {
                let _ = relation;
                ::std::vec::Vec::new()
            },
            quote! {
                drop(records);
                Err(::pingorm::model::unknown_relation(&SCHEMA, relation))
            },
        )
    } else {
        let keys: Vec<String> = associations.iter().map(|a| normalize(&a.name())).collect();
        let reads = associations.iter().map(|a| {
            let field = &a.ident;
            match a.holder {
                Holder::BoxedOne => quote! {
                    self.#field.iter().map(|r| &**r as &dyn ::pingorm::Record).collect()
                },
                Holder::Many | Holder::One => quote! {
                    self.#field.iter().map(|r| r as &dyn ::pingorm::Record).collect()
                },
            }
        });
        let writes = associations.iter().map(|a| {
            let field = &a.ident;
            match a.holder {
                Holder::BoxedOne => quote! {
                    self.#field.iter_mut().map(|r| &mut **r as &mut dyn ::pingorm::Record).collect()
                },
                Holder::Many | Holder::One => quote! {
                    self.#field.iter_mut().map(|r| r as &mut dyn ::pingorm::Record).collect()
                },
            }
        });
        let stores = associations.iter().map(|a| {
            let field = &a.ident;
            let target = &a.target;
            match a.holder {
                Holder::Many => quote! {
                    self.#field = ::pingorm::model::downcast_records::<#target>(records)?
                },
                Holder::One => quote! {
                    self.#field = ::pingorm::model::first_record::<#target>(records)?
                },
                Holder::BoxedOne => quote! {
                    self.#field = ::pingorm::model::first_record::<#target>(records)?
                        .map(::std::boxed::Box::new)
                },
            }
        });
        (
            quote! {
                match ::pingorm::naming::normalize_name(relation).as_str() {
                    #(#keys => #reads,)*
                    _ => ::std::vec::Vec::new(),
                }
            },
            quote! {
                match ::pingorm::naming::normalize_name(relation).as_str() {
                    #(#keys => #writes,)*
                    _ => ::std::vec::Vec::new(),
                }
            },
            quote! {
                match ::pingorm::naming::normalize_name(relation).as_str() {
                    #(#keys => #stores,)*
                    _ => return Err(::pingorm::model::unknown_relation(&SCHEMA, relation)),
                }
                Ok(())
            },
        )
    };

    Ok(quote! {
        const _: () = {
            use ::pingorm::__private::{Any, Row, Value};
            use ::pingorm::value::RowExt as _;

            static FIELDS: [::pingorm::Field; #field_count] = [#(#field_defs),*];

            static RELATIONS: [::pingorm::Relation; #relation_count] = [#(#relation_defs),*];

            static SCHEMA: ::pingorm::Schema = ::pingorm::Schema {
                name: #entity_name,
                table: #table_name,
                primary_key: #primary_key,
                auto_increment: #auto_increment,
                fields: &FIELDS,
                soft_delete: #soft_delete,
                relations: &RELATIONS,
                decode: ::pingorm::model::decode_boxed::<#ident>,
            };

            impl ::pingorm::Record for #ident {
                fn schema(&self) -> &'static ::pingorm::Schema {
                    &SCHEMA
                }

                fn get(&self, column: &str) -> ::core::option::Option<Value> {
                    match column {
                        #(#column_lits => Some(Value::from(self.#column_idents.clone())),)*
                        _ => None,
                    }
                }

                fn set(
                    &mut self,
                    column: &str,
                    value: Value,
                ) -> Result<(), ::pingorm::LifeError> {
                    match column {
                        #(#column_lits => {
                            ::pingorm::model::assign(&mut self.#column_idents, column, value)
                        })*
                        _ => Err(::pingorm::model::unknown_column(&SCHEMA, column)),
                    }
                }

                fn related(&self, relation: &str) -> ::std::vec::Vec<&dyn ::pingorm::Record> {
                    #related
                }

                fn related_mut(
                    &mut self,
                    relation: &str,
                ) -> ::std::vec::Vec<&mut dyn ::pingorm::Record> {
                    #related_mut
                }

                fn set_related(
                    &mut self,
                    relation: &str,
                    records: ::std::vec::Vec<::std::boxed::Box<dyn ::pingorm::Record>>,
                ) -> Result<(), ::pingorm::LifeError> {
                    #set_related
                }

                fn clone_record(&self) -> ::std::boxed::Box<dyn ::pingorm::Record> {
                    ::std::boxed::Box::new(::core::clone::Clone::clone(self))
                }

                fn into_any(self: ::std::boxed::Box<Self>) -> ::std::boxed::Box<dyn Any> {
                    self
                }
            }

            impl ::pingorm::Model for #ident {
                fn table_schema() -> &'static ::pingorm::Schema {
                    &SCHEMA
                }

                fn from_row(row: &Row) -> Result<Self, ::pingorm::LifeError> {
                    Ok(Self {
                        #(#decoders,)*
                        #(#defaulted,)*
                    })
                }
            }
        };
    })
}
