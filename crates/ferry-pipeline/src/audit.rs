//! Audit records.
//!
//! Audit entries are ordinary `tracing` events under the [`AUDIT_TARGET`]
//! target, so they can be routed to a separate sink by filter.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ferry_config::{AuditConfig, AuditPolicy};
use ferry_core::{Failure, RequestContext};
use ferry_telemetry::AUDIT_TARGET;

use crate::option::HandlerOption;
use crate::payload::{Payload, Verbatim};

/// True when a call of `option` must be audited, either because the route
/// asks for it or because the global policy does.
pub fn should_audit(ctx: &RequestContext, option: &HandlerOption) -> bool {
    if option.is_audited() {
        return true;
    }
    match ctx.config().audit.policy {
        AuditPolicy::Never => false,
        AuditPolicy::Login => ctx.identity().is_some(),
        AuditPolicy::Always => true,
    }
}

/// Writes one audit entry carrying the caller and the recorded input.
/// Returns the request id so callers can reference the entry.
pub fn audit<'c>(ctx: &'c RequestContext, message: &str) -> &'c str {
    emit(ctx, message, None, None);
    ctx.request_id()
}

/// How a successful output appears in the audit entry. Byte and string
/// outputs are left out unless the matching switch is on.
pub(crate) fn output_field(config: &AuditConfig, payload: &Payload) -> Option<String> {
    match payload.verbatim() {
        Some(Verbatim::Bytes(bytes)) => config.bytes_output.then(|| STANDARD.encode(bytes)),
        Some(Verbatim::Text(text)) => config.string_output.then(|| text.clone()),
        None => Some(String::from_utf8_lossy(payload.json()).into_owned()),
    }
}

/// Audits one finished call.
pub(crate) fn record_outcome(
    ctx: &RequestContext,
    option: &HandlerOption,
    outcome: Result<&Payload, &Failure>,
) {
    let message = option.audit_message();
    match outcome {
        Ok(payload) => {
            let output = output_field(&ctx.config().audit, payload);
            emit(ctx, message, output.as_deref(), None);
        }
        Err(failure) => {
            let error = failure.to_string();
            emit(ctx, message, None, Some(&error));
        }
    }
}

fn emit(ctx: &RequestContext, message: &str, output: Option<&str>, error: Option<&str>) {
    let identity = ctx.identity();
    tracing::info!(
        target: AUDIT_TARGET,
        request_id = ctx.request_id(),
        user_id = identity.map(|i| i.id.as_str()),
        display_name = identity.and_then(|i| i.name.as_deref()),
        caller = ctx.caller(),
        input = ctx.input(),
        output,
        error,
        "{}",
        message
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ferry_config::FerryConfig;
    use ferry_core::Identity;

    fn ctx(policy: AuditPolicy) -> RequestContext {
        let config = FerryConfig::builder()
            .audit(AuditConfig {
                policy,
                ..AuditConfig::default()
            })
            .build();
        RequestContext::builder().config(Arc::new(config)).build()
    }

    #[test]
    fn test_policy() {
        let option = HandlerOption::new("/x");
        assert!(!should_audit(&ctx(AuditPolicy::Never), &option));
        assert!(should_audit(&ctx(AuditPolicy::Always), &option));

        let anonymous = ctx(AuditPolicy::Login);
        assert!(!should_audit(&anonymous, &option));
        let user = anonymous.assume_user(Identity::new("u1"));
        assert!(should_audit(&user, &option));
    }

    #[test]
    fn test_route_flag_overrides_policy() {
        let option = HandlerOption::new("/x").auto_audit(Some("deleted note"));
        assert!(should_audit(&ctx(AuditPolicy::Never), &option));
        assert_eq!(option.audit_message(), "deleted note");
    }

    #[test]
    fn test_output_redaction() {
        let quiet = AuditConfig::default();
        let loud = AuditConfig {
            bytes_output: true,
            string_output: true,
            ..AuditConfig::default()
        };

        let bytes = Payload::new(vec![0xff_u8, 0x00]).unwrap();
        assert_eq!(output_field(&quiet, &bytes), None);
        assert_eq!(output_field(&loud, &bytes).as_deref(), Some("/wA="));

        let text = Payload::new(String::from("secret")).unwrap();
        assert_eq!(output_field(&quiet, &text), None);
        assert_eq!(output_field(&loud, &text).as_deref(), Some("secret"));

        let structured = Payload::new(serde_json::json!({"id": 7})).unwrap();
        assert_eq!(output_field(&quiet, &structured).as_deref(), Some(r#"{"id":7}"#));
    }

    #[test]
    fn test_audit_returns_request_id() {
        let ctx = ctx(AuditPolicy::Never);
        let id = audit(&ctx, "manual entry").to_string();
        assert_eq!(id, ctx.request_id());
        assert!(!id.is_empty());
    }
}
