//! Text to value coercion for the supported field types.
//!
//! Every `coerce` leaves the field untouched when the text does not parse;
//! callers treat `false` as "skip this field". Claims arrive as decoded JSON
//! and keep their JSON types: a numeric field takes a number claim but not
//! a string one.

use std::any::Any;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use ferry_core::UploadedFile;
use serde::Deserialize;
use serde_json::Value;

use crate::duration::parse_duration;
use crate::field::{FieldType, FieldValue, ValueKind};
use crate::timeparse::parse_timestamp;

/// Parses the boolean spellings `1 t T TRUE true True` and
/// `0 f F FALSE false False`.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

fn store<T>(slot: &mut T, parsed: Option<T>) -> bool {
    match parsed {
        Some(value) => {
            *slot = value;
            true
        }
        None => false,
    }
}

impl FieldType for bool {
    const KIND: ValueKind = ValueKind::Bool;
}

impl FieldValue for bool {
    fn coerce(&mut self, raw: &str) -> bool {
        store(self, parse_bool(raw))
    }

    fn set_claim(&mut self, value: &Value) -> bool {
        store(self, value.as_bool())
    }

    fn is_zero(&self) -> bool {
        !*self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

macro_rules! numeric_field {
    ($kind:ident: $($ty:ty),+) => {$(
        impl FieldType for $ty {
            const KIND: ValueKind = ValueKind::$kind;
        }

        impl FieldValue for $ty {
            fn coerce(&mut self, raw: &str) -> bool {
                store(self, raw.parse().ok())
            }

            fn set_claim(&mut self, value: &Value) -> bool {
                store(self, <$ty>::deserialize(value).ok())
            }

            #[allow(clippy::float_cmp)]
            fn is_zero(&self) -> bool {
                *self == <$ty>::default()
            }

            #[allow(
                clippy::cast_lossless,
                clippy::cast_possible_truncation,
                clippy::unnecessary_cast
            )]
            fn as_f64(&self) -> Option<f64> {
                Some(*self as f64)
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }
    )+};
}

numeric_field!(Int: i8, i16, i32, i64, isize);
numeric_field!(Uint: u8, u16, u32, u64, usize);
numeric_field!(Float: f32, f64);

impl FieldType for String {
    const KIND: ValueKind = ValueKind::Text;
}

impl FieldValue for String {
    fn coerce(&mut self, raw: &str) -> bool {
        raw.clone_into(self);
        true
    }

    fn set_claim(&mut self, value: &Value) -> bool {
        value.as_str().is_some_and(|s| self.coerce(s))
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }

    fn set_bytes(&mut self, bytes: &[u8]) -> bool {
        match std::str::from_utf8(bytes) {
            Ok(text) => {
                text.clone_into(self);
                true
            }
            Err(_) => false,
        }
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.chars().count())
    }

    fn as_text(&self) -> Option<&str> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl FieldType for Vec<u8> {
    const KIND: ValueKind = ValueKind::Bytes;
}

impl FieldValue for Vec<u8> {
    fn coerce(&mut self, raw: &str) -> bool {
        self.set_bytes(raw.as_bytes())
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }

    fn set_bytes(&mut self, bytes: &[u8]) -> bool {
        self.clear();
        self.extend_from_slice(bytes);
        true
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.len())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl FieldType for Bytes {
    const KIND: ValueKind = ValueKind::Bytes;
}

impl FieldValue for Bytes {
    fn coerce(&mut self, raw: &str) -> bool {
        self.set_bytes(raw.as_bytes())
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }

    fn set_bytes(&mut self, bytes: &[u8]) -> bool {
        *self = Bytes::copy_from_slice(bytes);
        true
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.len())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl FieldType for Duration {
    const KIND: ValueKind = ValueKind::Duration;
}

impl FieldValue for Duration {
    fn coerce(&mut self, raw: &str) -> bool {
        let parsed = parse_duration(raw)
            .ok()
            .and_then(|nanos| u64::try_from(nanos).ok())
            .map(Duration::from_nanos);
        store(self, parsed)
    }

    // Numeric claims count nanoseconds.
    fn set_claim(&mut self, value: &Value) -> bool {
        match value {
            Value::Number(n) => store(self, n.as_u64().map(Duration::from_nanos)),
            Value::String(s) => self.coerce(s),
            _ => false,
        }
    }

    fn is_zero(&self) -> bool {
        Duration::is_zero(self)
    }

    fn as_f64(&self) -> Option<f64> {
        Some(self.as_secs_f64())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl FieldType for TimeDelta {
    const KIND: ValueKind = ValueKind::Duration;
}

impl FieldValue for TimeDelta {
    fn coerce(&mut self, raw: &str) -> bool {
        store(self, parse_duration(raw).ok().map(TimeDelta::nanoseconds))
    }

    fn set_claim(&mut self, value: &Value) -> bool {
        match value {
            Value::Number(n) => store(self, n.as_i64().map(TimeDelta::nanoseconds)),
            Value::String(s) => self.coerce(s),
            _ => false,
        }
    }

    fn is_zero(&self) -> bool {
        *self == TimeDelta::zero()
    }

    fn as_f64(&self) -> Option<f64> {
        self.num_nanoseconds().map(|n| n as f64 / 1e9)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl FieldType for DateTime<Utc> {
    const KIND: ValueKind = ValueKind::Timestamp;
}

impl FieldValue for DateTime<Utc> {
    fn coerce(&mut self, raw: &str) -> bool {
        store(self, parse_timestamp(raw))
    }

    fn is_zero(&self) -> bool {
        *self == DateTime::<Utc>::default()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl FieldType for UploadedFile {
    const KIND: ValueKind = ValueKind::Upload;
}

impl FieldValue for UploadedFile {
    fn coerce(&mut self, _raw: &str) -> bool {
        false
    }

    fn is_zero(&self) -> bool {
        self.field.is_empty() && self.data.is_empty()
    }

    fn set_uploads(&mut self, files: &[UploadedFile]) -> bool {
        store(self, files.first().cloned())
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.len())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl FieldType for Vec<UploadedFile> {
    const KIND: ValueKind = ValueKind::Uploads;
}

impl FieldValue for Vec<UploadedFile> {
    fn coerce(&mut self, _raw: &str) -> bool {
        false
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }

    fn set_uploads(&mut self, files: &[UploadedFile]) -> bool {
        if files.is_empty() {
            return false;
        }
        files.clone_into(self);
        true
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.len())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

macro_rules! list_field {
    ($($elem:ty),+) => {$(
        impl FieldType for Vec<$elem> {
            const KIND: ValueKind = ValueKind::List;
        }

        /// Text sources carry one value, so coercing text yields a
        /// single-element list. Array claims fill the list only when
        /// every element fits.
        impl FieldValue for Vec<$elem> {
            fn coerce(&mut self, raw: &str) -> bool {
                let mut item = <$elem>::default();
                let parsed = item.coerce(raw).then(|| vec![item]);
                store(self, parsed)
            }

            fn set_claim(&mut self, value: &Value) -> bool {
                let Value::Array(items) = value else {
                    return false;
                };
                let parsed = items
                    .iter()
                    .map(|claim| {
                        let mut item = <$elem>::default();
                        item.set_claim(claim).then_some(item)
                    })
                    .collect::<Option<Vec<_>>>();
                store(self, parsed)
            }

            fn is_zero(&self) -> bool {
                self.is_empty()
            }

            fn len_hint(&self) -> Option<usize> {
                Some(self.len())
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }
    )+};
}

list_field!(String, bool, i32, i64, u32, u64, f64);

impl FieldType for Value {
    const KIND: ValueKind = ValueKind::Opaque;
}

/// Takes any claim as decoded. Text sources store a JSON string.
impl FieldValue for Value {
    fn coerce(&mut self, raw: &str) -> bool {
        *self = Value::String(raw.to_owned());
        true
    }

    fn set_claim(&mut self, value: &Value) -> bool {
        value.clone_into(self);
        true
    }

    fn is_zero(&self) -> bool {
        self.is_null()
    }

    fn as_text(&self) -> Option<&str> {
        self.as_str()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<T: FieldType> FieldType for Option<T> {
    const KIND: ValueKind = T::KIND;
    const POINTER: bool = true;
}

/// Optional fields become `Some` only when coercion succeeds.
impl<T> FieldValue for Option<T>
where
    T: FieldValue + Default + 'static,
{
    fn coerce(&mut self, raw: &str) -> bool {
        let mut value = T::default();
        let parsed = value.coerce(raw).then_some(value);
        store(self, parsed.map(Some))
    }

    fn set_claim(&mut self, value: &Value) -> bool {
        let mut inner = T::default();
        let parsed = inner.set_claim(value).then_some(inner);
        store(self, parsed.map(Some))
    }

    fn is_zero(&self) -> bool {
        self.is_none()
    }

    fn set_uploads(&mut self, files: &[UploadedFile]) -> bool {
        let mut value = T::default();
        let parsed = value.set_uploads(files).then_some(value);
        store(self, parsed.map(Some))
    }

    fn set_bytes(&mut self, bytes: &[u8]) -> bool {
        let mut value = T::default();
        let parsed = value.set_bytes(bytes).then_some(value);
        store(self, parsed.map(Some))
    }

    fn as_f64(&self) -> Option<f64> {
        self.as_ref().and_then(FieldValue::as_f64)
    }

    fn len_hint(&self) -> Option<usize> {
        self.as_ref().and_then(FieldValue::len_hint)
    }

    fn as_text(&self) -> Option<&str> {
        self.as_ref().and_then(FieldValue::as_text)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_parse_bool_spellings() {
        for s in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(parse_bool(s), Some(true), "{s}");
        }
        for s in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(parse_bool(s), Some(false), "{s}");
        }
        for s in ["yes", "tRUE", "", " true"] {
            assert_eq!(parse_bool(s), None, "{s}");
        }
    }

    #[test]
    fn test_failed_coercion_keeps_value() {
        let mut n: i32 = 7;
        assert!(!n.coerce("seven"));
        assert_eq!(n, 7);

        let mut small: u8 = 1;
        assert!(!small.coerce("300"));
        assert_eq!(small, 1);

        let mut flag = true;
        assert!(!flag.coerce("maybe"));
        assert!(flag);
    }

    #[test]
    fn test_integer_accepts_sign() {
        let mut n: i64 = 0;
        assert!(n.coerce("+42"));
        assert_eq!(n, 42);
        assert!(n.coerce("-42"));
        assert_eq!(n, -42);
    }

    #[test]
    fn test_duration_fields() {
        let mut d = Duration::ZERO;
        assert!(d.coerce("1h12m"));
        assert_eq!(d, Duration::from_secs(72 * 60));
        assert!(!d.coerce("-5s"));
        assert_eq!(d, Duration::from_secs(72 * 60));

        let mut delta = TimeDelta::zero();
        assert!(delta.coerce("-5s"));
        assert_eq!(delta, TimeDelta::seconds(-5));
    }

    #[test]
    fn test_timestamp_field() {
        let mut t = DateTime::<Utc>::default();
        assert!(t.is_zero());
        assert!(t.coerce("2024-01-02T03:04:05Z"));
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
        assert!(!t.is_zero());
    }

    #[test]
    fn test_bytes_fields() {
        let mut raw: Vec<u8> = Vec::new();
        assert!(raw.coerce("abc"));
        assert_eq!(raw, b"abc");

        let mut text = String::new();
        assert!(!text.set_bytes(&[0xff, 0xfe]));
        assert!(text.set_bytes(b"ok"));
        assert_eq!(text, "ok");
    }

    #[test]
    fn test_option_only_set_on_success() {
        let mut n: Option<u32> = None;
        assert!(!n.coerce("x"));
        assert_eq!(n, None);
        assert!(n.coerce("5"));
        assert_eq!(n, Some(5));
        assert_eq!(<Option<u32> as FieldType>::KIND, ValueKind::Uint);
        assert!(<Option<u32> as FieldType>::POINTER);
    }

    #[test]
    fn test_upload_fields() {
        let file = UploadedFile {
            field: "avatar".into(),
            file_name: Some("me.png".into()),
            content_type: None,
            data: Bytes::from_static(b"png"),
        };

        let mut single: Option<UploadedFile> = None;
        assert!(!single.set_uploads(&[]));
        assert!(single.set_uploads(&[file.clone(), file.clone()]));
        assert_eq!(single.as_ref().map(UploadedFile::len), Some(3));

        let mut many: Vec<UploadedFile> = Vec::new();
        assert!(many.set_uploads(&[file.clone(), file]));
        assert_eq!(many.len(), 2);
        assert!(!many.coerce("text"));
    }

    #[test]
    fn test_claims_keep_json_types() {
        let mut n: i64 = 0;
        assert!(n.set_claim(&json!(42)));
        assert_eq!(n, 42);
        assert!(!n.set_claim(&json!("43")));
        assert!(!n.set_claim(&json!(1.5)));
        assert_eq!(n, 42);

        let mut small: u8 = 1;
        assert!(!small.set_claim(&json!(300)));
        assert_eq!(small, 1);

        let mut text = String::from("keep");
        assert!(!text.set_claim(&json!(7)));
        assert!(!text.set_claim(&json!({"k": "v"})));
        assert_eq!(text, "keep");
        assert!(text.set_claim(&json!("acme")));
        assert_eq!(text, "acme");

        let mut flag = false;
        assert!(!flag.set_claim(&json!("true")));
        assert!(flag.set_claim(&json!(true)));
        assert!(flag);

        let mut ttl = Duration::ZERO;
        assert!(ttl.set_claim(&json!(1_500_000_000_u64)));
        assert_eq!(ttl, Duration::from_millis(1500));
        assert!(ttl.set_claim(&json!("2s")));
        assert_eq!(ttl, Duration::from_secs(2));
    }

    #[test]
    fn test_list_from_array_claim() {
        let mut roles: Vec<String> = Vec::new();
        assert!(roles.is_zero());
        assert!(roles.set_claim(&json!(["admin", "ops"])));
        assert_eq!(roles, ["admin", "ops"]);
        assert_eq!(roles.len_hint(), Some(2));

        // One bad element rejects the whole array.
        assert!(!roles.set_claim(&json!(["a", 1])));
        assert!(!roles.set_claim(&json!("admin")));
        assert_eq!(roles, ["admin", "ops"]);

        let mut ids: Option<Vec<u64>> = None;
        assert!(ids.set_claim(&json!([3, 5])));
        assert_eq!(ids, Some(vec![3, 5]));

        let mut tags: Vec<String> = Vec::new();
        assert!(tags.coerce("solo"));
        assert_eq!(tags, ["solo"]);
        assert_eq!(<Vec<String> as FieldType>::KIND, ValueKind::List);
    }

    #[test]
    fn test_value_field_takes_any_claim() {
        let mut meta = Value::Null;
        assert!(meta.is_zero());
        assert!(meta.set_claim(&json!({"plan": "gold", "seats": 4})));
        assert_eq!(meta["seats"], 4);
        assert!(!meta.is_zero());

        assert!(meta.coerce("plain"));
        assert_eq!(meta.as_text(), Some("plain"));
    }

    #[test]
    fn test_len_hint_counts_chars() {
        assert_eq!("héllo".to_string().len_hint(), Some(5));
    }

    proptest! {
        #[test]
        fn test_i64_round_trip(n: i64) {
            let mut v = 0_i64;
            prop_assert!(v.coerce(&n.to_string()));
            prop_assert_eq!(v, n);
        }

        #[test]
        fn test_u16_round_trip(n: u16) {
            let mut v = 0_u16;
            prop_assert!(v.coerce(&n.to_string()));
            prop_assert_eq!(v, n);
        }

        #[test]
        fn test_f64_round_trip(n in -1.0e12_f64..1.0e12) {
            let mut v = 0.0_f64;
            prop_assert!(v.coerce(&n.to_string()));
            prop_assert_eq!(v, n);
        }

        #[test]
        fn test_bool_round_trip(b: bool) {
            let mut v = !b;
            prop_assert!(v.coerce(&b.to_string()));
            prop_assert_eq!(v, b);
        }
    }
}
