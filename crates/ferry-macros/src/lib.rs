//! Procedural macros for Ferry.
//!
//! `#[derive(Bind)]` turns a struct with named fields into something the
//! extractor can fill from a request. The derive produces a static field
//! description (`Bind::describe`) from which `ferry_extract` compiles and
//! caches a plan, plus index-based accessors so the extractor can reach
//! each field without runtime reflection.
//!
//! # Example
//!
//! ```rust,ignore
//! use ferry_extract::Bind;
//!
//! #[derive(Debug, Clone, Default, Bind)]
//! pub struct ListOrders {
//!     #[bind(path = "shop")]
//!     pub shop: String,
//!     #[bind(query, default = "20", max = 100)]
//!     pub limit: u32,
//!     #[bind(header = "x-tenant", pattern = "^[a-z]+$")]
//!     pub tenant: Option<String>,
//! }
//! ```
//!
//! # Field attributes
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `path`, `query`, `form`, `claims`, `cookie`, `header` | Source, optionally `= "name"`; bare or empty means the field name |
//! | `post = "json" \| "xml" \| "raw"` | Request body, decoded or copied as bytes |
//! | `pattern = "regex"` | Raw value must match before coercion |
//! | `default = "value"` | Applied to zero-valued fields, `"-"` for none |
//! | `required`, `email`, `url`, `min`, `max`, `min_len`, `max_len` | Validation rules |
//! | `tag(key = "value", ...)` | Free-form metadata for extensions |
//! | `skip` | Leave the field out of the plan |
//!
//! Only `pub` fields are bound.
//!
//! # Container attributes
//!
//! - `crate = "path"`: where `ferry_extract` lives, e.g. `"ferry::extract"`
//!   when depending on the facade crate only.
//! - `validate_with = "path"`: a `fn(&Self, &mut FieldErrors)` run after the
//!   field rules.

mod bind;
mod parse;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

/// Derives `ferry_extract::Bind` and the traits that let the type be used
/// as a nested record.
#[proc_macro_derive(Bind, attributes(bind))]
pub fn derive_bind(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    bind::expand_bind(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
