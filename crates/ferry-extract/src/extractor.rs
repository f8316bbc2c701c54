//! Populating records from a request.
//!
//! Each field is read from the first source it is annotated for, in the
//! fixed order `path > query > form > post > claims > cookie > header`.
//! Lower sources are never consulted once a higher one is annotated, even
//! when the higher one is absent from the request. Empty values count as
//! absent. Claims are handed over as decoded JSON rather than text.

use ferry_config::SystemConfig;
use ferry_core::RequestContext;
use mime::Mime;
use serde_json::Value;

use crate::error::ExtractionError;
use crate::field::{DecodeTarget, FieldRef, FieldSpec, FieldValue, PostMode, Record};
use crate::form::{form_kind, load_form, media_type};
use crate::pattern::{self, PatternCheck};
use crate::plan::{FieldDescriptor, Plan};
use crate::validate::validate;

/// Extraction switches taken from the `system` configuration section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Settings {
    /// Skip declarative validation.
    pub disable_validator: bool,
    /// Fail the whole extraction when a nested record fails.
    pub strict_nested: bool,
}

impl Settings {
    /// Reads the switches from `system`.
    pub fn from_config(system: &SystemConfig) -> Self {
        Self {
            disable_validator: system.disable_validator,
            strict_nested: system.strict_nested,
        }
    }
}

/// Populates `target` from `ctx` following `plan`, then validates it.
///
/// The form body is decoded first when the plan reads form values and the
/// request carries a form content type.
pub async fn extract(
    ctx: &RequestContext,
    plan: &Plan,
    target: &mut dyn Record,
    settings: &Settings,
) -> Result<(), ExtractionError> {
    if plan.uses_form() && form_kind(ctx.content_type()).is_some() {
        load_form(ctx).await?;
    }

    Extractor::new(ctx, *settings).populate(plan, target)?;

    if !settings.disable_validator {
        validate(plan, &*target)?;
    }
    Ok(())
}

/// A raw value found for one field.
enum Raw<'a> {
    Text(&'a str),
    Body(&'a [u8]),
    Claim(&'a Value),
}

/// Synchronous walk over a plan. Forms must already be loaded.
#[derive(Debug, Clone, Copy)]
pub struct Extractor<'a> {
    ctx: &'a RequestContext,
    settings: Settings,
}

impl<'a> Extractor<'a> {
    /// Creates an extractor for one request.
    pub fn new(ctx: &'a RequestContext, settings: Settings) -> Self {
        Self { ctx, settings }
    }

    /// Fills every field of `target` that has a value in the request.
    pub fn populate(&self, plan: &Plan, target: &mut dyn Record) -> Result<(), ExtractionError> {
        for desc in plan.fields() {
            match target.record_field_mut(desc.index()) {
                Some(FieldRef::Decode(dst)) => self.decode(desc.spec(), dst)?,
                Some(FieldRef::Value(value)) => self.fill(desc, value)?,
                None => {}
            }
        }
        Ok(())
    }

    fn fill(&self, desc: &FieldDescriptor, value: &mut dyn FieldValue) -> Result<(), ExtractionError> {
        let spec = desc.spec();

        if spec.kind.is_upload() {
            let files = spec
                .form
                .zip(self.ctx.form())
                .map(|(name, form)| form.files(name))
                .unwrap_or_default();
            if !files.is_empty() {
                value.set_uploads(files);
            }
            return Ok(());
        }

        if let Some(child) = desc.child() {
            if let Some(record) = value.as_record_mut() {
                if let Err(err) = self.populate(child, record) {
                    if self.settings.strict_nested {
                        return Err(ExtractionError::Nested {
                            field: spec.name,
                            source: Box::new(err),
                        });
                    }
                    tracing::warn!(field = spec.name, error = %err, "nested record extraction failed");
                }
            }
            return Ok(());
        }

        let raw = match self.resolve(spec) {
            Some(Raw::Text(raw)) => raw,
            Some(Raw::Body(body)) => {
                if !value.set_bytes(body) {
                    tracing::trace!(field = spec.name, "raw body does not fit field");
                }
                return Ok(());
            }
            Some(Raw::Claim(claim)) => {
                if claim.as_str().is_some_and(|text| !pattern_allows(spec, text)) {
                    return Ok(());
                }
                if !value.set_claim(claim) {
                    tracing::trace!(field = spec.name, claim = %claim, "claim does not fit field, keeping default");
                }
                return Ok(());
            }
            None => return Ok(()),
        };

        if !pattern_allows(spec, raw) {
            return Ok(());
        }

        if !value.coerce(raw) {
            tracing::trace!(field = spec.name, value = raw, "value does not coerce, keeping default");
        }
        Ok(())
    }

    fn resolve(&self, spec: &FieldSpec) -> Option<Raw<'a>> {
        fn text(value: Option<&str>) -> Option<Raw<'_>> {
            value.filter(|v| !v.is_empty()).map(Raw::Text)
        }

        let ctx = self.ctx;
        if let Some(name) = spec.path {
            return text(ctx.params().get(name));
        }
        if let Some(name) = spec.query {
            return text(ctx.query(name));
        }
        if let Some(name) = spec.form {
            if form_kind(ctx.content_type()).is_none() {
                return None;
            }
            return text(ctx.form().and_then(|form| form.value(name)));
        }
        if let Some(mode) = spec.post {
            let body = ctx.body();
            return (mode == PostMode::Raw && !body.is_empty()).then_some(Raw::Body(body));
        }
        if let Some(key) = spec.claims {
            return ctx
                .claims()
                .get(key)
                .filter(|claim| claim.as_str() != Some(""))
                .map(Raw::Claim);
        }
        if let Some(name) = spec.cookie {
            return text(ctx.cookie(name));
        }
        if let Some(name) = spec.header {
            return text(ctx.header(name));
        }
        None
    }

    fn decode(&self, spec: &FieldSpec, target: &mut dyn DecodeTarget) -> Result<(), ExtractionError> {
        let body = self.ctx.body();
        if body.is_empty() {
            return Ok(());
        }

        let media = media_type(self.ctx.content_type());
        match spec.post {
            Some(PostMode::Json) if accepts(media.as_ref(), &mime::JSON) => {
                target.decode_json(body).map_err(ExtractionError::Json)
            }
            Some(PostMode::Xml) if accepts(media.as_ref(), &mime::XML) => {
                target.decode_xml(body).map_err(ExtractionError::Xml)
            }
            _ => Ok(()),
        }
    }
}

/// Applies the field's `pattern` to a raw text value. Mismatches and
/// patterns that fail to compile both skip the field.
fn pattern_allows(spec: &FieldSpec, raw: &str) -> bool {
    let Some(pattern) = spec.pattern else {
        return true;
    };
    match pattern::check(pattern, raw) {
        PatternCheck::Match => true,
        PatternCheck::Mismatch => {
            tracing::debug!(field = spec.name, pattern, value = raw, "pattern mismatch");
            false
        }
        PatternCheck::Invalid(error) => {
            tracing::warn!(
                field = spec.name,
                pattern,
                value = raw,
                error = %error,
                "pattern compile failed"
            );
            false
        }
    }
}

/// Body modes accept their own `application/<subtype>` and any `text/*`.
fn accepts(media: Option<&Mime>, subtype: &mime::Name<'_>) -> bool {
    media.is_some_and(|m| {
        m.type_() == mime::TEXT || (m.type_() == mime::APPLICATION && m.subtype() == *subtype)
    })
}
