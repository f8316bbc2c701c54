//! Form body loading.
//!
//! `application/x-www-form-urlencoded` and `multipart/form-data` bodies are
//! decoded once per request and memoised on the [`RequestContext`]. File
//! parts become [`UploadedFile`]s, every other part is a text value.

use std::io;

use bytes::Bytes;
use ferry_core::{FormData, RequestContext, UploadedFile};
use mime::Mime;

use crate::error::ExtractionError;

/// Body encodings that carry form values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    /// `application/x-www-form-urlencoded`
    Urlencoded,
    /// `multipart/form-data`
    Multipart,
}

/// Parses a `Content-Type` value.
pub fn media_type(content_type: Option<&str>) -> Option<Mime> {
    content_type.and_then(|ct| ct.trim().parse().ok())
}

/// Classifies a `Content-Type` value.
pub fn form_kind(content_type: Option<&str>) -> Option<FormKind> {
    let media = media_type(content_type)?;
    if media.type_() == mime::APPLICATION && media.subtype() == mime::WWW_FORM_URLENCODED {
        Some(FormKind::Urlencoded)
    } else if media.type_() == mime::MULTIPART && media.subtype() == mime::FORM_DATA {
        Some(FormKind::Multipart)
    } else {
        None
    }
}

/// Decodes the request's form body into the context, once.
///
/// Requests without a form content type get an empty form.
pub async fn load_form(ctx: &RequestContext) -> Result<&FormData, ExtractionError> {
    if let Some(form) = ctx.form() {
        return Ok(form);
    }

    let limit = ctx.config().server.max_body_bytes;
    let form = match form_kind(ctx.content_type()) {
        Some(FormKind::Urlencoded) => parse_urlencoded(ctx.body())?,
        Some(FormKind::Multipart) => {
            let content_type = ctx.content_type().unwrap_or_default();
            parse_multipart(content_type, ctx.body().clone(), limit).await?
        }
        None => FormData::new(),
    };

    Ok(ctx.set_form(form))
}

/// Decodes a urlencoded body.
pub fn parse_urlencoded(body: &[u8]) -> Result<FormData, ExtractionError> {
    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_bytes(body).map_err(ExtractionError::Form)?;

    let mut form = FormData::new();
    for (name, value) in pairs {
        form.push_value(name, value);
    }
    Ok(form)
}

fn multipart_error(err: multer::Error, limit: usize) -> ExtractionError {
    match err {
        multer::Error::StreamSizeExceeded { .. } | multer::Error::FieldSizeExceeded { .. } => {
            ExtractionError::PayloadTooLarge { limit }
        }
        other => ExtractionError::Multipart(other),
    }
}

/// Decodes a multipart body, rejecting streams larger than `limit` bytes.
pub async fn parse_multipart(
    content_type: &str,
    body: Bytes,
    limit: usize,
) -> Result<FormData, ExtractionError> {
    let boundary = multer::parse_boundary(content_type).map_err(ExtractionError::Multipart)?;
    let constraints = multer::Constraints::new()
        .size_limit(multer::SizeLimit::new().whole_stream(limit as u64));
    let stream = futures_util::stream::once(async move { Ok::<_, io::Error>(body) });
    let mut multipart = multer::Multipart::with_constraints(stream, boundary, constraints);

    let mut form = FormData::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(ToString::to_string);

        if file_name.is_some() {
            let content_type = field.content_type().map(ToString::to_string);
            let data = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
            form.push_file(UploadedFile {
                field: name,
                file_name,
                content_type,
                data,
            });
        } else {
            let text = field.text().await.map_err(|e| multipart_error(e, limit))?;
            form.push_value(name, text);
        }
    }

    Ok(form)
}
