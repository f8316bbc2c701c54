//! Walking populated records field by field.
//!
//! Extensions use this to act on annotated inputs without knowing their
//! shape, for example masking every field tagged `mask` before an input is
//! logged. Nested records are descended into; the visitor only sees leaf
//! fields. Decoded body fields have no value view and are not visited.

use crate::field::{FieldRef, FieldValue, Record};
use crate::plan::{FieldDescriptor, Plan};

/// Visits every leaf field of `record`.
pub fn each_field<'r>(
    plan: &Plan,
    record: &'r dyn Record,
    visit: &mut dyn FnMut(&FieldDescriptor, &'r dyn FieldValue),
) {
    for desc in plan.fields() {
        let Some(value) = record.record_field(desc.index()) else {
            continue;
        };
        match (desc.child(), value.as_record()) {
            (Some(child), Some(nested)) => each_field(child, nested, visit),
            _ => visit(desc, value),
        }
    }
}

/// Visits every leaf field of `record` mutably.
pub fn each_field_mut(
    plan: &Plan,
    record: &mut dyn Record,
    visit: &mut dyn FnMut(&FieldDescriptor, &mut dyn FieldValue),
) {
    for desc in plan.fields() {
        let Some(FieldRef::Value(value)) = record.record_field_mut(desc.index()) else {
            continue;
        };
        if let Some(child) = desc.child() {
            if let Some(nested) = value.as_record_mut() {
                each_field_mut(child, nested, visit);
            }
            continue;
        }
        visit(desc, value);
    }
}
