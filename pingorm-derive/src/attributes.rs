//! Attribute parsing utilities

use syn::{Attribute, Expr, ExprLit, Lit, LitStr};

/// Value of a `#[name = "..."]` attribute.
pub fn string_value(attrs: &[Attribute], name: &str) -> syn::Result<Option<String>> {
    for attr in attrs {
        if !attr.path().is_ident(name) {
            continue;
        }
        let meta = attr.meta.require_name_value()?;
        if let Expr::Lit(ExprLit {
            lit: Lit::Str(s), ..
        }) = &meta.value
        {
            return Ok(Some(s.value()));
        }
        return Err(syn::Error::new_spanned(
            &meta.value,
            format!("`{name}` expects a string literal"),
        ));
    }
    Ok(None)
}

pub fn has_attribute(attrs: &[Attribute], name: &str) -> bool {
    attrs.iter().any(|attr| attr.path().is_ident(name))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    HasMany,
    HasOne,
    BelongsTo,
}

/// Parsed `#[has_many(...)]`, `#[has_one(...)]` or `#[belongs_to(...)]`.
pub struct RelationAttributes {
    pub kind: RelationKind,
    pub name: Option<String>,
    pub foreign_key: String,
    pub references: String,
}

/// The relation declared on a field, if any. A field declares at most one.
pub fn parse_relation(attrs: &[Attribute]) -> syn::Result<Option<RelationAttributes>> {
    let mut found = None;
    for attr in attrs {
        let kind = if attr.path().is_ident("has_many") {
            RelationKind::HasMany
        } else if attr.path().is_ident("has_one") {
            RelationKind::HasOne
        } else if attr.path().is_ident("belongs_to") {
            RelationKind::BelongsTo
        } else {
            continue;
        };
        if found.is_some() {
            return Err(syn::Error::new_spanned(
                attr,
                "a field holds at most one relation",
            ));
        }

        let mut name = None;
        let mut foreign_key = None;
        let mut references = None;
        attr.parse_nested_meta(|meta| {
            let value: LitStr = meta.value()?.parse()?;
            if meta.path.is_ident("foreign_key") {
                foreign_key = Some(value.value());
            } else if meta.path.is_ident("references") {
                references = Some(value.value());
            } else if meta.path.is_ident("name") {
                name = Some(value.value());
            } else {
                return Err(meta.error("expected `foreign_key`, `references` or `name`"));
            }
            Ok(())
        })?;

        let foreign_key = foreign_key.ok_or_else(|| {
            syn::Error::new_spanned(attr, "relation needs `foreign_key = \"...\"`")
        })?;
        found = Some(RelationAttributes {
            kind,
            name,
            foreign_key,
            references: references.unwrap_or_else(|| "id".to_string()),
        });
    }
    Ok(found)
}
