//! Expansion of `#[derive(Bind)]`.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{
    parse_quote, spanned::Spanned, Data, DataStruct, DeriveInput, Field, Fields, Path, Visibility,
};

use crate::parse::{ContainerAttrs, FieldAttrs, PostSource, RuleAttr};

/// One visible field together with its parsed attributes.
struct BoundField<'a> {
    field: &'a Field,
    attrs: FieldAttrs,
}

impl BoundField<'_> {
    fn decodes(&self) -> bool {
        self.attrs.post.is_some_and(PostSource::decodes)
    }
}

pub fn expand_bind(input: &DeriveInput) -> syn::Result<TokenStream> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new(
            input.generics.span(),
            "Bind cannot be derived for generic types",
        ));
    }

    let container = ContainerAttrs::from_attrs(&input.attrs)?;
    let krate: Path = container
        .krate
        .clone()
        .unwrap_or_else(|| parse_quote!(::ferry_extract));

    let fields = match &input.data {
        Data::Struct(DataStruct {
            fields: Fields::Named(named),
            ..
        }) => named.named.iter().collect::<Vec<_>>(),
        Data::Struct(DataStruct {
            fields: Fields::Unit,
            ..
        }) => Vec::new(),
        _ => {
            return Err(syn::Error::new(
                input.ident.span(),
                "Bind can only be derived for structs with named fields",
            ))
        }
    };

    let mut bound = Vec::new();
    for field in fields {
        let attrs = FieldAttrs::from_field(field)?;
        if matches!(field.vis, Visibility::Public(_)) && !attrs.skip {
            bound.push(BoundField { field, attrs });
        }
    }

    let name = &input.ident;
    let specs = bound.iter().map(|b| field_spec(&krate, b));

    let mut_arms = bound.iter().enumerate().map(|(index, b)| {
        let ident = &b.field.ident;
        if b.decodes() {
            quote!(#index => ::core::option::Option::Some(#krate::FieldRef::Decode(&mut self.#ident)),)
        } else {
            quote!(#index => ::core::option::Option::Some(#krate::FieldRef::Value(&mut self.#ident)),)
        }
    });

    let ref_arms = bound
        .iter()
        .enumerate()
        .filter(|(_, b)| !b.decodes())
        .map(|(index, b)| {
            let ident = &b.field.ident;
            quote!(#index => ::core::option::Option::Some(&self.#ident),)
        });

    let check = container.validate_with.as_ref().map(|path| {
        quote! {
            fn check(&self, errors: &mut #krate::FieldErrors) {
                #path(self, errors);
            }
        }
    });

    Ok(quote! {
        impl #krate::Bind for #name {
            fn describe() -> ::std::vec::Vec<#krate::FieldSpec> {
                ::std::vec![#(#specs),*]
            }

            #[allow(clippy::match_single_binding)]
            fn field_mut(&mut self, index: usize) -> ::core::option::Option<#krate::FieldRef<'_>> {
                match index {
                    #(#mut_arms)*
                    _ => ::core::option::Option::None,
                }
            }

            #[allow(clippy::match_single_binding)]
            fn field(&self, index: usize) -> ::core::option::Option<&dyn #krate::FieldValue> {
                match index {
                    #(#ref_arms)*
                    _ => ::core::option::Option::None,
                }
            }

            #check
        }

        impl #krate::FieldType for #name {
            const KIND: #krate::ValueKind = #krate::ValueKind::Record;
            const CHILD: ::core::option::Option<#krate::ChildPlan> =
                ::core::option::Option::Some(#krate::child_plan::<Self>);
        }

        impl #krate::FieldValue for #name {
            fn coerce(&mut self, _raw: &str) -> bool {
                false
            }

            fn is_zero(&self) -> bool {
                false
            }

            fn as_record(&self) -> ::core::option::Option<&dyn #krate::Record> {
                ::core::option::Option::Some(self)
            }

            fn as_record_mut(&mut self) -> ::core::option::Option<&mut dyn #krate::Record> {
                ::core::option::Option::Some(self)
            }

            fn as_any(&self) -> &dyn ::core::any::Any {
                self
            }
        }
    })
}

fn opt_str(value: Option<&String>) -> TokenStream {
    match value {
        Some(v) => quote!(::core::option::Option::Some(#v)),
        None => quote!(::core::option::Option::None),
    }
}

// Negative float literals are emitted as a negation of a positive one.
fn number(n: f64) -> TokenStream {
    if n.is_sign_negative() {
        let n = -n;
        quote!(-#n)
    } else {
        quote!(#n)
    }
}

fn field_spec(krate: &Path, bound: &BoundField<'_>) -> TokenStream {
    let attrs = &bound.attrs;
    let ty = &bound.field.ty;
    let name = bound
        .field
        .ident
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();

    let path = opt_str(attrs.path.as_ref());
    let query = opt_str(attrs.query.as_ref());
    let form = opt_str(attrs.form.as_ref());
    let claims = opt_str(attrs.claims.as_ref());
    let cookie = opt_str(attrs.cookie.as_ref());
    let header = opt_str(attrs.header.as_ref());
    let pattern = opt_str(attrs.pattern.as_ref());
    let default = opt_str(attrs.default.as_ref());

    let post = match attrs.post {
        Some(PostSource::Json) => quote!(::core::option::Option::Some(#krate::PostMode::Json)),
        Some(PostSource::Xml) => quote!(::core::option::Option::Some(#krate::PostMode::Xml)),
        Some(PostSource::Raw) => quote!(::core::option::Option::Some(#krate::PostMode::Raw)),
        None => quote!(::core::option::Option::None),
    };

    let rules = attrs.rules.iter().map(|rule| match rule {
        RuleAttr::Required => quote!(#krate::Rule::Required),
        RuleAttr::Email => quote!(#krate::Rule::Email),
        RuleAttr::Url => quote!(#krate::Rule::Url),
        RuleAttr::Min(n) => {
            let n = number(*n);
            quote!(#krate::Rule::Min(#n))
        }
        RuleAttr::Max(n) => {
            let n = number(*n);
            quote!(#krate::Rule::Max(#n))
        }
        RuleAttr::MinLen(n) => quote!(#krate::Rule::MinLen(#n)),
        RuleAttr::MaxLen(n) => quote!(#krate::Rule::MaxLen(#n)),
    });
    let tags = attrs.tags.iter().map(|(k, v)| quote!((#k, #v)));

    // Decoded bodies are any `DeserializeOwned` type, so they carry no
    // coercion kind of their own.
    let shape = if bound.decodes() {
        quote! {
            kind: #krate::ValueKind::Opaque,
            pointer: false,
            child: ::core::option::Option::None,
        }
    } else {
        quote! {
            kind: <#ty as #krate::FieldType>::KIND,
            pointer: <#ty as #krate::FieldType>::POINTER,
            child: <#ty as #krate::FieldType>::CHILD,
        }
    };

    quote! {
        #krate::FieldSpec {
            path: #path,
            query: #query,
            form: #form,
            post: #post,
            claims: #claims,
            cookie: #cookie,
            header: #header,
            pattern: #pattern,
            default: #default,
            rules: &[#(#rules),*],
            tags: &[#(#tags),*],
            #shape
            ..#krate::FieldSpec::new(#name)
        }
    }
}
