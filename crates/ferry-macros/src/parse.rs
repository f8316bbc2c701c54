//! Parsing of `#[bind(...)]` attributes.
//!
//! Container level: `crate = "path"`, `validate_with = "path"`.
//! Field level: the source kinds, `pattern`, `default`, the validation rules,
//! `tag(key = "value", ...)` and `skip`.

use syn::{
    punctuated::Punctuated, spanned::Spanned, Attribute, Expr, ExprLit, ExprUnary, Field, Lit,
    Meta, MetaList, MetaNameValue, Path, Token, UnOp,
};

/// Attributes placed on the struct itself.
#[derive(Debug, Default)]
pub struct ContainerAttrs {
    /// Path the generated code uses to reach `ferry_extract`.
    pub krate: Option<Path>,
    /// Struct-level check, `fn(&Self, &mut FieldErrors)`.
    pub validate_with: Option<Path>,
}

impl ContainerAttrs {
    pub fn from_attrs(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut out = Self::default();

        for meta in bind_metas(attrs)? {
            match meta {
                Meta::NameValue(nv) if nv.path.is_ident("crate") => {
                    out.krate = Some(syn::parse_str::<Path>(&string_value(&nv)?)?);
                }
                Meta::NameValue(nv) if nv.path.is_ident("validate_with") => {
                    out.validate_with = Some(syn::parse_str::<Path>(&string_value(&nv)?)?);
                }
                other => {
                    return Err(syn::Error::new(
                        other.span(),
                        "unknown container attribute, expected `crate` or `validate_with`",
                    ))
                }
            }
        }

        Ok(out)
    }
}

/// Body decoding mode of a `post` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostSource {
    Json,
    Xml,
    Raw,
}

impl PostSource {
    /// True for modes that deserialize into the field instead of coercing.
    pub const fn decodes(self) -> bool {
        matches!(self, Self::Json | Self::Xml)
    }
}

/// A declarative validation rule.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleAttr {
    Required,
    Email,
    Url,
    Min(f64),
    Max(f64),
    MinLen(usize),
    MaxLen(usize),
}

/// Everything a `#[bind(...)]` field attribute can say.
#[derive(Debug, Default)]
pub struct FieldAttrs {
    pub skip: bool,
    pub path: Option<String>,
    pub query: Option<String>,
    pub form: Option<String>,
    pub post: Option<PostSource>,
    pub claims: Option<String>,
    pub cookie: Option<String>,
    pub header: Option<String>,
    pub pattern: Option<String>,
    pub default: Option<String>,
    pub rules: Vec<RuleAttr>,
    pub tags: Vec<(String, String)>,
}

impl FieldAttrs {
    /// Parses every `bind` attribute on `field`; a bare source key means
    /// "use the field name".
    pub fn from_field(field: &Field) -> syn::Result<Self> {
        let name = field
            .ident
            .as_ref()
            .map(ToString::to_string)
            .ok_or_else(|| syn::Error::new(field.span(), "Bind requires named fields"))?;
        let mut out = Self::default();

        for meta in bind_metas(&field.attrs)? {
            match &meta {
                Meta::Path(path) => {
                    let key = ident_of(path)?;
                    match key.as_str() {
                        "skip" => out.skip = true,
                        "required" => out.rules.push(RuleAttr::Required),
                        "email" => out.rules.push(RuleAttr::Email),
                        "url" => out.rules.push(RuleAttr::Url),
                        _ => *out.source_slot(&key, path)? = Some(name.clone()),
                    }
                }
                Meta::NameValue(nv) => {
                    let key = ident_of(&nv.path)?;
                    match key.as_str() {
                        "post" => out.post = Some(post_source(nv)?),
                        "pattern" => out.pattern = Some(string_value(nv)?),
                        "default" => out.default = Some(string_value(nv)?),
                        "min" => out.rules.push(RuleAttr::Min(number_value(&nv.value)?)),
                        "max" => out.rules.push(RuleAttr::Max(number_value(&nv.value)?)),
                        "min_len" => out.rules.push(RuleAttr::MinLen(length_value(&nv.value)?)),
                        "max_len" => out.rules.push(RuleAttr::MaxLen(length_value(&nv.value)?)),
                        _ => {
                            let value = string_value(nv)?;
                            let value = if value.is_empty() { name.clone() } else { value };
                            *out.source_slot(&key, &nv.path)? = Some(value);
                        }
                    }
                }
                Meta::List(list) if list.path.is_ident("tag") => out.tags.extend(parse_tags(list)?),
                Meta::List(list) => {
                    return Err(syn::Error::new(list.span(), "only `tag(...)` takes a list"))
                }
            }
        }

        out.check(field)?;
        Ok(out)
    }

    fn source_slot(&mut self, key: &str, path: &Path) -> syn::Result<&mut Option<String>> {
        Ok(match key {
            "path" => &mut self.path,
            "query" => &mut self.query,
            "form" => &mut self.form,
            "claims" => &mut self.claims,
            "cookie" => &mut self.cookie,
            "header" => &mut self.header,
            _ => {
                return Err(syn::Error::new(
                    path.span(),
                    format!("unknown bind attribute: {key}"),
                ))
            }
        })
    }

    fn has_text_source(&self) -> bool {
        self.path.is_some()
            || self.query.is_some()
            || self.form.is_some()
            || self.claims.is_some()
            || self.cookie.is_some()
            || self.header.is_some()
    }

    fn check(&self, field: &Field) -> syn::Result<()> {
        if !self.post.is_some_and(PostSource::decodes) {
            return Ok(());
        }
        if self.has_text_source() {
            return Err(syn::Error::new(
                field.span(),
                "a decoded body field cannot have other sources",
            ));
        }
        if !self.rules.is_empty() || self.pattern.is_some() || self.default.is_some() {
            return Err(syn::Error::new(
                field.span(),
                "rules, pattern and default are not supported on decoded body fields",
            ));
        }
        Ok(())
    }
}

fn bind_metas(attrs: &[Attribute]) -> syn::Result<Vec<Meta>> {
    let mut metas = Vec::new();
    for attr in attrs.iter().filter(|a| a.path().is_ident("bind")) {
        let list: Punctuated<Meta, Token![,]> =
            attr.parse_args_with(Punctuated::parse_terminated)?;
        metas.extend(list);
    }
    Ok(metas)
}

fn ident_of(path: &Path) -> syn::Result<String> {
    path.get_ident()
        .map(ToString::to_string)
        .ok_or_else(|| syn::Error::new(path.span(), "expected identifier"))
}

fn string_value(nv: &MetaNameValue) -> syn::Result<String> {
    match &nv.value {
        Expr::Lit(ExprLit {
            lit: Lit::Str(s), ..
        }) => Ok(s.value()),
        other => Err(syn::Error::new(other.span(), "expected string literal")),
    }
}

fn post_source(nv: &MetaNameValue) -> syn::Result<PostSource> {
    match string_value(nv)?.as_str() {
        "json" => Ok(PostSource::Json),
        "xml" => Ok(PostSource::Xml),
        "raw" => Ok(PostSource::Raw),
        other => Err(syn::Error::new(
            nv.value.span(),
            format!("post must be \"json\", \"xml\" or \"raw\", got {other:?}"),
        )),
    }
}

fn number_value(expr: &Expr) -> syn::Result<f64> {
    match expr {
        Expr::Lit(ExprLit {
            lit: Lit::Int(i), ..
        }) => i.base10_parse::<f64>(),
        Expr::Lit(ExprLit {
            lit: Lit::Float(f), ..
        }) => f.base10_parse::<f64>(),
        Expr::Unary(ExprUnary {
            op: UnOp::Neg(_),
            expr,
            ..
        }) => number_value(expr).map(|n| -n),
        other => Err(syn::Error::new(other.span(), "expected a number")),
    }
}

fn length_value(expr: &Expr) -> syn::Result<usize> {
    match expr {
        Expr::Lit(ExprLit {
            lit: Lit::Int(i), ..
        }) => i.base10_parse::<usize>(),
        other => Err(syn::Error::new(other.span(), "expected a non-negative integer")),
    }
}

fn parse_tags(list: &MetaList) -> syn::Result<Vec<(String, String)>> {
    let pairs: Punctuated<MetaNameValue, Token![,]> =
        list.parse_args_with(Punctuated::parse_terminated)?;
    pairs
        .iter()
        .map(|nv| Ok((ident_of(&nv.path)?, string_value(nv)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::{parse_quote, DeriveInput, FieldsNamed};

    fn first_field(fields: FieldsNamed) -> Field {
        fields.named.into_iter().next().unwrap()
    }

    #[test]
    fn test_bare_source_uses_field_name() {
        let field = first_field(parse_quote!({
            #[bind(path, query = "q")]
            pub user_id: String
        }));
        let attrs = FieldAttrs::from_field(&field).unwrap();

        assert_eq!(attrs.path.as_deref(), Some("user_id"));
        assert_eq!(attrs.query.as_deref(), Some("q"));
        assert_eq!(attrs.form, None);
    }

    #[test]
    fn test_empty_value_uses_field_name() {
        let field = first_field(parse_quote!({
            #[bind(header = "")]
            pub token: String
        }));
        let attrs = FieldAttrs::from_field(&field).unwrap();
        assert_eq!(attrs.header.as_deref(), Some("token"));
    }

    #[test]
    fn test_rules_and_tags() {
        let field = first_field(parse_quote!({
            #[bind(query, required, min = -1, max = 2.5, max_len = 8)]
            #[bind(tag(mask = "partial", audit = "skip"))]
            pub score: i32
        }));
        let attrs = FieldAttrs::from_field(&field).unwrap();

        assert_eq!(
            attrs.rules,
            vec![
                RuleAttr::Required,
                RuleAttr::Min(-1.0),
                RuleAttr::Max(2.5),
                RuleAttr::MaxLen(8)
            ]
        );
        assert_eq!(
            attrs.tags,
            vec![
                ("mask".to_string(), "partial".to_string()),
                ("audit".to_string(), "skip".to_string())
            ]
        );
    }

    #[test]
    fn test_post_modes() {
        let field = first_field(parse_quote!({
            #[bind(post = "raw")]
            pub body: Vec<u8>
        }));
        assert_eq!(FieldAttrs::from_field(&field).unwrap().post, Some(PostSource::Raw));

        let field = first_field(parse_quote!({
            #[bind(post = "yaml")]
            pub body: Vec<u8>
        }));
        assert!(FieldAttrs::from_field(&field).is_err());
    }

    #[test]
    fn test_decoded_body_rejects_other_sources() {
        let field = first_field(parse_quote!({
            #[bind(post = "json", query)]
            pub body: Payload
        }));
        assert!(FieldAttrs::from_field(&field).is_err());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let field = first_field(parse_quote!({
            #[bind(body)]
            pub body: String
        }));
        let err = FieldAttrs::from_field(&field).unwrap_err();
        assert!(err.to_string().contains("unknown bind attribute"));
    }

    #[test]
    fn test_container_attrs() {
        let input: DeriveInput = parse_quote! {
            #[bind(crate = "ferry::extract", validate_with = "check_dates")]
            struct Range {}
        };
        let attrs = ContainerAttrs::from_attrs(&input.attrs).unwrap();

        assert!(attrs.krate.is_some());
        assert!(attrs.validate_with.unwrap().is_ident("check_dates"));
    }
}
