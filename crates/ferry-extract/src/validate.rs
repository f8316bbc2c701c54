//! Declarative validation of populated records.
//!
//! Rules run per field in declaration order, nested records are checked
//! under a dotted name (`address.zip`), and each record's `validate_with`
//! check runs after its own fields. Every rule except `required` passes on
//! zero values, so optional fields are only checked when present.

use ferry_core::FieldErrors;

use crate::field::{FieldValue, Record, Rule};
use crate::pattern;
use crate::plan::Plan;

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

/// Checks every rule in `plan` against `target`.
///
/// # Errors
///
/// Returns all failed rules when at least one fails.
pub fn validate(plan: &Plan, target: &dyn Record) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    check_record(plan, target, "", &mut errors);
    errors.into_result()
}

fn check_record(plan: &Plan, target: &dyn Record, prefix: &str, errors: &mut FieldErrors) {
    for desc in plan.fields() {
        let Some(value) = target.record_field(desc.index()) else {
            continue;
        };
        let name = if prefix.is_empty() {
            desc.name().to_string()
        } else {
            format!("{prefix}.{}", desc.name())
        };

        if let Some(child) = desc.child() {
            if let Some(record) = value.as_record() {
                check_record(child, record, &name, errors);
            }
            continue;
        }

        for rule in desc.spec().rules {
            if let Some(reason) = check_rule(rule, value) {
                errors.add(name.as_str(), rule.name(), reason);
            }
        }
    }

    target.record_check(errors);
}

fn check_rule(rule: &Rule, value: &dyn FieldValue) -> Option<String> {
    if let Rule::Required = rule {
        return value.is_zero().then(|| "is required".to_string());
    }
    if value.is_zero() {
        return None;
    }

    match *rule {
        Rule::Required => None,
        Rule::Email => value
            .as_text()
            .filter(|text| !is_email(text))
            .map(|_| "must be a valid email address".to_string()),
        Rule::Url => value
            .as_text()
            .filter(|text| !is_url(text))
            .map(|_| "must be an absolute http or https URL".to_string()),
        Rule::Min(min) => value
            .as_f64()
            .filter(|n| *n < min)
            .map(|_| format!("must be at least {min}")),
        Rule::Max(max) => value
            .as_f64()
            .filter(|n| *n > max)
            .map(|_| format!("must be at most {max}")),
        Rule::MinLen(min) => value
            .len_hint()
            .filter(|len| *len < min)
            .map(|_| format!("must have a length of at least {min}")),
        Rule::MaxLen(max) => value
            .len_hint()
            .filter(|len| *len > max)
            .map(|_| format!("must have a length of at most {max}")),
    }
}

fn is_email(text: &str) -> bool {
    pattern::compiled(EMAIL_PATTERN).is_ok_and(|re| re.is_match(text))
}

fn is_url(text: &str) -> bool {
    text.parse::<http::Uri>().is_ok_and(|uri| {
        matches!(uri.scheme_str(), Some("http" | "https")) && uri.host().is_some()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Bind, FieldRef, FieldSpec, ValueKind};
    use crate::plan::PlanCache;

    #[derive(Default)]
    struct Signup {
        email: String,
        site: Option<String>,
        age: u32,
        nick: String,
    }

    impl Bind for Signup {
        fn describe() -> Vec<FieldSpec> {
            vec![
                FieldSpec {
                    kind: ValueKind::Text,
                    rules: &[Rule::Required, Rule::Email],
                    ..FieldSpec::new("email")
                },
                FieldSpec {
                    kind: ValueKind::Text,
                    pointer: true,
                    rules: &[Rule::Url],
                    ..FieldSpec::new("site")
                },
                FieldSpec {
                    kind: ValueKind::Uint,
                    rules: &[Rule::Min(18.0), Rule::Max(130.0)],
                    ..FieldSpec::new("age")
                },
                FieldSpec {
                    kind: ValueKind::Text,
                    rules: &[Rule::MinLen(2), Rule::MaxLen(4)],
                    ..FieldSpec::new("nick")
                },
            ]
        }

        fn field_mut(&mut self, index: usize) -> Option<FieldRef<'_>> {
            match index {
                0 => Some(FieldRef::Value(&mut self.email)),
                1 => Some(FieldRef::Value(&mut self.site)),
                2 => Some(FieldRef::Value(&mut self.age)),
                3 => Some(FieldRef::Value(&mut self.nick)),
                _ => None,
            }
        }

        fn field(&self, index: usize) -> Option<&dyn FieldValue> {
            match index {
                0 => Some(&self.email),
                1 => Some(&self.site),
                2 => Some(&self.age),
                3 => Some(&self.nick),
                _ => None,
            }
        }

        fn check(&self, errors: &mut FieldErrors) {
            if self.nick == "root" {
                errors.add("nick", "reserved", "is reserved");
            }
        }
    }

    fn rules_failed(signup: &Signup) -> Vec<(String, String)> {
        let plan = PlanCache::new().get::<Signup>();
        match validate(&plan, signup) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .fields
                .into_iter()
                .map(|e| (e.field, e.rule))
                .collect(),
        }
    }

    fn pair(field: &str, rule: &str) -> (String, String) {
        (field.to_string(), rule.to_string())
    }

    #[test]
    fn test_valid_record() {
        let signup = Signup {
            email: "ada@example.com".into(),
            site: Some("https://example.com/ada".into()),
            age: 36,
            nick: "ada".into(),
        };
        assert!(rules_failed(&signup).is_empty());
    }

    #[test]
    fn test_required_and_zero_skipping() {
        let failed = rules_failed(&Signup::default());
        assert_eq!(failed, vec![pair("email", "required")]);
    }

    #[test]
    fn test_each_rule() {
        let signup = Signup {
            email: "not-an-email".into(),
            site: Some("ftp://example.com".into()),
            age: 12,
            nick: "abcdef".into(),
        };
        assert_eq!(
            rules_failed(&signup),
            vec![
                pair("email", "email"),
                pair("site", "url"),
                pair("age", "min"),
                pair("nick", "max_len")
            ]
        );
    }

    #[test]
    fn test_struct_level_check() {
        let signup = Signup {
            email: "root@example.com".into(),
            nick: "root".into(),
            ..Signup::default()
        };
        assert_eq!(rules_failed(&signup), vec![pair("nick", "reserved")]);
    }

    #[test]
    fn test_messages() {
        let value = 200_u32;
        assert_eq!(
            check_rule(&Rule::Max(130.0), &value).as_deref(),
            Some("must be at most 130")
        );
    }
}
