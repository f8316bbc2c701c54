//! Tests for `#[derive(Bind)]` against the real extract crate.

use std::time::Duration;

use ferry_extract::{
    compile, defaulted, validate, Bind, FieldErrors, FieldRef, FieldSpec, PostMode, Rule,
    ValueKind,
};
use serde::Deserialize;

#[derive(Debug, Default, Bind)]
pub struct Address {
    #[bind(query = "city", required)]
    pub city: String,
    #[bind(query = "zip", pattern = "^[0-9]{5}$")]
    pub zip: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Profile {
    pub bio: String,
}

#[derive(Debug, Default, Bind)]
#[bind(validate_with = "check_account")]
pub struct Account {
    #[bind(path = "", query = "uid")]
    pub uid: u64,
    #[bind(header = "x-email", email, required)]
    pub email: String,
    #[bind(query, default = "30s", tag(audit = "keep", mask = "none"))]
    pub timeout: Duration,
    #[bind(query, min = -5, max = 5.5)]
    pub offset: Option<f64>,
    #[bind(query, min_len = 2, max_len = 8)]
    pub nick: String,
    #[bind(post = "json")]
    pub profile: Profile,
    pub address: Address,
    #[bind(skip)]
    pub cached: String,
    secret: String,
}

fn check_account(account: &Account, errors: &mut FieldErrors) {
    if account.nick == account.secret && !account.nick.is_empty() {
        errors.add("nick", "secret", "must not equal the secret");
    }
}

fn spec<'a>(specs: &'a [FieldSpec], name: &str) -> &'a FieldSpec {
    specs
        .iter()
        .find(|s| s.name == name)
        .unwrap_or_else(|| panic!("missing {name}"))
}

#[test]
fn test_describe_lists_public_unskipped_fields_in_order() {
    let names: Vec<_> = Account::describe().iter().map(|s| s.name).collect();
    assert_eq!(
        names,
        vec!["uid", "email", "timeout", "offset", "nick", "profile", "address"]
    );
}

#[test]
fn test_sources_and_names() {
    let specs = Account::describe();

    let uid = spec(&specs, "uid");
    assert_eq!(uid.path, Some("uid"));
    assert_eq!(uid.query, Some("uid"));
    assert_eq!(uid.kind, ValueKind::Uint);

    let timeout = spec(&specs, "timeout");
    assert_eq!(timeout.query, Some("timeout"));
    assert_eq!(timeout.default, Some("30s"));
    assert_eq!(timeout.kind, ValueKind::Duration);
    assert_eq!(timeout.tag("audit"), Some("keep"));
    assert_eq!(timeout.tag("mask"), Some("none"));

    let offset = spec(&specs, "offset");
    assert!(offset.pointer);
    assert_eq!(offset.kind, ValueKind::Float);
    assert_eq!(offset.rules, &[Rule::Min(-5.0), Rule::Max(5.5)]);

    let email = spec(&specs, "email");
    assert_eq!(email.header, Some("x-email"));
    assert_eq!(email.rules, &[Rule::Email, Rule::Required]);

    let profile = spec(&specs, "profile");
    assert_eq!(profile.post, Some(PostMode::Json));
    assert_eq!(profile.kind, ValueKind::Opaque);
}

#[test]
fn test_nested_record_gets_child_plan() {
    let plan = compile::<Account>();
    let address = plan
        .fields()
        .iter()
        .find(|d| d.name() == "address")
        .unwrap();

    assert_eq!(address.spec().kind, ValueKind::Record);
    let child = address.child().unwrap();
    assert_eq!(child.len(), 2);
    assert_eq!(child.fields()[1].spec().pattern, Some("^[0-9]{5}$"));

    let timeout = plan.fields().iter().find(|d| d.name() == "timeout").unwrap();
    assert!(timeout.child().is_none());
}

#[test]
fn test_accessors_follow_describe_order() {
    let mut account = Account::default();

    match account.field_mut(0) {
        Some(FieldRef::Value(value)) => assert!(value.coerce("41")),
        _ => panic!("uid should be a value field"),
    }
    assert!(matches!(account.field_mut(5), Some(FieldRef::Decode(_))));
    assert!(account.field_mut(7).is_none());

    assert_eq!(account.uid, 41);
    assert!(account.field(5).is_none());
    assert!(account.field(6).and_then(|v| v.as_record()).is_some());
}

#[test]
fn test_defaults_and_validation() {
    let mut account: Account = defaulted();
    assert_eq!(account.timeout, Duration::from_secs(30));

    account.email = "bad".into();
    account.nick = "x".into();
    account.secret = "x".into();
    let errors = validate(&compile::<Account>(), &account).unwrap_err();
    let failed: Vec<_> = errors
        .fields
        .iter()
        .map(|e| (e.field.as_str(), e.rule.as_str()))
        .collect();
    assert_eq!(
        failed,
        vec![
            ("email", "email"),
            ("nick", "min_len"),
            ("address.city", "required"),
            ("nick", "secret"),
        ]
    );
}

#[test]
fn test_unit_struct() {
    #[derive(Bind)]
    pub struct Nothing;

    assert!(Nothing::describe().is_empty());
    assert!(compile::<Nothing>().is_empty());
}
