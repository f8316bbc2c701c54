//! # Ferry Extract
//!
//! Populates annotated structs from HTTP requests.
//!
//! A struct deriving [`Bind`] describes, per field, where its value comes
//! from and how it is checked. The first time a type is seen its description
//! is compiled into a [`Plan`] and cached by type. Each request then walks
//! the plan:
//!
//! 1. the form body is decoded when the plan reads form values
//! 2. each field is read from its highest-precedence source
//!    (`path > query > form > post > claims > cookie > header`)
//! 3. the raw text is matched against the field's pattern and coerced
//!    into the field's type
//! 4. declarative rules and the struct-level check run
//!
//! A missing, empty, mismatching or unparseable value leaves the field at
//! whatever it held before, so defaults set up front survive. Only body
//! decoding, form parsing and validation produce errors.
//!
//! ## Example
//!
//! ```rust
//! use ferry_extract::{compile, defaulted, Bind};
//!
//! #[derive(Debug, Default, Bind)]
//! pub struct ListOrders {
//!     #[bind(path)]
//!     pub shop: String,
//!     #[bind(query, default = "20", min = 1, max = 100)]
//!     pub limit: u32,
//!     #[bind(header = "x-tenant", pattern = "^[a-z]+$")]
//!     pub tenant: Option<String>,
//! }
//!
//! let plan = compile::<ListOrders>();
//! assert_eq!(plan.len(), 3);
//!
//! let orders: ListOrders = defaulted();
//! assert_eq!(orders.limit, 20);
//! ```
//!
//! ## Coercion
//!
//! | Field type | Accepted text |
//! |------------|---------------|
//! | `bool` | `1 t T TRUE true True 0 f F FALSE false False` |
//! | integers, floats | decimal, rejected when out of range |
//! | `String` | anything |
//! | `Vec<u8>`, `Bytes` | anything, taken as bytes |
//! | `Duration`, `TimeDelta` | `1h30m`, `250ms`, `-1.5s` (signed only for `TimeDelta`) |
//! | `DateTime<Utc>` | epoch seconds/millis/micros/nanos, RFC 3339 and common layouts |
//! | `Option<T>` | as `T`, set to `Some` only on success |

#![doc(html_root_url = "https://docs.rs/ferry-extract/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod coerce;
pub mod duration;
pub mod form;
pub mod pattern;
pub mod timeparse;

mod defaults;
mod error;
mod extractor;
mod field;
mod plan;
mod validate;
mod walk;

pub use coerce::parse_bool;
pub use defaults::{apply_defaults, defaulted};
pub use duration::parse_duration;
pub use error::ExtractionError;
pub use extractor::{extract, Extractor, Settings};
pub use field::{
    child_plan, Bind, ChildPlan, DecodeTarget, FieldRef, FieldSpec, FieldType, FieldValue,
    PostMode, Record, Rule, ValueKind,
};
pub use form::load_form;
pub use plan::{compile, lookup, FieldDescriptor, LocalInit, Plan, PlanCache};
pub use timeparse::parse_timestamp;
pub use validate::validate;
pub use walk::{each_field, each_field_mut};

pub use ferry_core::FieldErrors;
pub use ferry_macros::Bind;
