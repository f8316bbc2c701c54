//! `#[bind(default = "...")]` application.

use crate::field::{Bind, FieldRef, Record};
use crate::plan::{compile, Plan};

/// Sets every zero-valued field that has a default annotation, recursing
/// into nested records. `"-"` means no default. Defaults that do not parse
/// are logged and skipped.
pub fn apply_defaults(plan: &Plan, target: &mut dyn Record) {
    for desc in plan.fields() {
        let Some(FieldRef::Value(value)) = target.record_field_mut(desc.index()) else {
            continue;
        };

        if let Some(child) = desc.child() {
            if let Some(record) = value.as_record_mut() {
                apply_defaults(child, record);
            }
            continue;
        }

        if !value.is_zero() {
            continue;
        }
        let Some(default) = desc.spec().default_value() else {
            continue;
        };
        if !value.coerce(default) {
            tracing::warn!(
                plan = plan.type_name(),
                field = desc.name(),
                default,
                "default value does not parse"
            );
        }
    }
}

/// `T::default()` with its default annotations applied.
pub fn defaulted<T: Bind + Default>() -> T {
    let mut value = T::default();
    apply_defaults(&compile::<T>(), &mut value);
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldSpec, FieldValue, ValueKind};
    use crate::plan::PlanCache;
    use chrono::{DateTime, Utc};
    use std::time::Duration;

    #[derive(Default)]
    struct Paging {
        limit: u32,
        order: String,
        timeout: Duration,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        cursor: Option<String>,
    }

    impl Bind for Paging {
        fn describe() -> Vec<FieldSpec> {
            vec![
                FieldSpec {
                    kind: ValueKind::Uint,
                    default: Some("20"),
                    ..FieldSpec::new("limit")
                },
                FieldSpec {
                    kind: ValueKind::Text,
                    default: Some("-"),
                    ..FieldSpec::new("order")
                },
                FieldSpec {
                    kind: ValueKind::Duration,
                    default: Some("1m30s"),
                    ..FieldSpec::new("timeout")
                },
                FieldSpec {
                    kind: ValueKind::Timestamp,
                    default: Some("2024-01-01T00:00:00Z"),
                    ..FieldSpec::new("since")
                },
                FieldSpec {
                    kind: ValueKind::Timestamp,
                    ..FieldSpec::new("until")
                },
                FieldSpec {
                    kind: ValueKind::Text,
                    pointer: true,
                    default: Some("start"),
                    ..FieldSpec::new("cursor")
                },
            ]
        }

        fn field_mut(&mut self, index: usize) -> Option<FieldRef<'_>> {
            match index {
                0 => Some(FieldRef::Value(&mut self.limit)),
                1 => Some(FieldRef::Value(&mut self.order)),
                2 => Some(FieldRef::Value(&mut self.timeout)),
                3 => Some(FieldRef::Value(&mut self.since)),
                4 => Some(FieldRef::Value(&mut self.until)),
                5 => Some(FieldRef::Value(&mut self.cursor)),
                _ => None,
            }
        }

        fn field(&self, _index: usize) -> Option<&dyn FieldValue> {
            None
        }
    }

    #[test]
    fn test_defaults_fill_zero_fields() {
        let mut paging = Paging::default();
        apply_defaults(&PlanCache::new().get::<Paging>(), &mut paging);

        assert_eq!(paging.limit, 20);
        assert_eq!(paging.order, "");
        assert_eq!(paging.timeout, Duration::from_secs(90));
        assert_eq!(paging.since.to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert_eq!(paging.until, DateTime::<Utc>::default());
        assert_eq!(paging.cursor.as_deref(), Some("start"));
    }

    #[test]
    fn test_defaults_keep_set_values() {
        let mut paging = Paging {
            limit: 5,
            cursor: Some("abc".into()),
            ..Paging::default()
        };
        apply_defaults(&PlanCache::new().get::<Paging>(), &mut paging);

        assert_eq!(paging.limit, 5);
        assert_eq!(paging.cursor.as_deref(), Some("abc"));
    }

    #[test]
    fn test_defaulted() {
        let paging: Paging = defaulted();
        assert_eq!(paging.limit, 20);
    }
}
