//! Extraction error types.
//!
//! Only body decoding, form parsing and validation fail an extraction.
//! Values that do not coerce or match their pattern are skipped instead.

use ferry_core::{CodeError, Failure, FieldErrors};
use thiserror::Error;

/// Hard failure while populating an input.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The body of a `post = "json"` field is not valid JSON for its type.
    #[error("failed to decode JSON body: {0}")]
    Json(#[source] serde_json::Error),

    /// The body of a `post = "xml"` field is not valid XML for its type.
    #[error("failed to decode XML body: {0}")]
    Xml(#[source] quick_xml::DeError),

    /// The urlencoded body could not be parsed.
    #[error("failed to parse form body: {0}")]
    Form(#[source] serde_urlencoded::de::Error),

    /// The multipart body could not be parsed.
    #[error("failed to parse multipart body: {0}")]
    Multipart(#[source] multer::Error),

    /// The body exceeds the configured limit.
    #[error("payload too large: limit is {limit} bytes")]
    PayloadTooLarge {
        /// Configured maximum in bytes.
        limit: usize,
    },

    /// A nested record failed while nested failures are strict.
    #[error("nested field {field}: {source}")]
    Nested {
        /// Name of the record field.
        field: &'static str,
        /// The nested failure.
        #[source]
        source: Box<ExtractionError>,
    },

    /// Declarative validation failed.
    #[error("validation failed: {0}")]
    Validation(FieldErrors),
}

impl ExtractionError {
    /// True for validation failures, which render as coded errors.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<FieldErrors> for ExtractionError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<ExtractionError> for Failure {
    fn from(err: ExtractionError) -> Self {
        match err {
            ExtractionError::Validation(errors) => Failure::Coded(CodeError::from(errors)),
            other => Failure::plain(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_message() {
        let source = serde_json::from_slice::<serde_json::Value>(b"{").unwrap_err();
        let err = ExtractionError::Json(source);
        assert!(err.to_string().starts_with("failed to decode JSON body: "));
    }

    #[test]
    fn test_validation_becomes_coded_failure() {
        let mut errors = FieldErrors::new();
        errors.add("email", "required", "is required");

        let failure = Failure::from(ExtractionError::from(errors));
        let coded = failure.as_coded().unwrap();
        assert_eq!(coded.code, "VALIDATION_ERROR");
        assert_eq!(coded.child.len(), 1);
        assert!(coded.status.is_none());
    }

    #[test]
    fn test_decode_failure_is_plain() {
        let failure = Failure::from(ExtractionError::PayloadTooLarge { limit: 10 });
        assert!(failure.as_coded().is_none());
        assert!(failure.to_string().contains("payload too large"));
    }
}
