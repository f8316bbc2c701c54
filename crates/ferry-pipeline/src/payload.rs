//! Handler outputs, type-erased for hooks and renderers.

use std::any::Any;
use std::fmt;

use bytes::Bytes;
use serde::Serialize;

/// Output the HTML renderer writes as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verbatim {
    /// `Vec<u8>` output.
    Bytes(Bytes),
    /// `String` or `&'static str` output.
    Text(String),
}

/// A successful handler output.
///
/// The JSON form is produced once, up front, so renderers, audit and hooks
/// all see the same bytes. The typed value stays reachable through
/// [`Payload::downcast_ref`].
pub struct Payload {
    value: Box<dyn Any + Send + Sync>,
    json: Bytes,
    verbatim: Option<Verbatim>,
}

impl Payload {
    /// Serializes `output`.
    ///
    /// # Errors
    ///
    /// Returns the serializer error when `output` cannot be represented as
    /// JSON.
    pub fn new<O>(output: O) -> Result<Self, serde_json::Error>
    where
        O: Serialize + Send + Sync + 'static,
    {
        let json = Bytes::from(serde_json::to_vec(&output)?);

        let any: &dyn Any = &output;
        let verbatim = if let Some(bytes) = any.downcast_ref::<Vec<u8>>() {
            Some(Verbatim::Bytes(Bytes::copy_from_slice(bytes)))
        } else if let Some(text) = any.downcast_ref::<String>() {
            Some(Verbatim::Text(text.clone()))
        } else {
            any.downcast_ref::<&'static str>()
                .map(|text| Verbatim::Text((*text).to_string()))
        };

        Ok(Self {
            value: Box::new(output),
            json,
            verbatim,
        })
    }

    /// Compact JSON encoding of the output.
    pub fn json(&self) -> &Bytes {
        &self.json
    }

    /// Set for byte and string outputs.
    pub fn verbatim(&self) -> Option<&Verbatim> {
        self.verbatim.as_ref()
    }

    /// The typed output.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("json_len", &self.json.len())
            .field("verbatim", &self.verbatim.is_some())
            .finish_non_exhaustive()
    }
}
