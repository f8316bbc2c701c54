//! Plan compilation and the process-wide plan cache.
//!
//! A [`Plan`] is the read-only, per-type list of field descriptors the
//! extractor walks. Plans are built from [`Bind::describe`] on first use and
//! cached by [`TypeId`] for the life of the [`PlanCache`]. Two requests racing
//! on an uncompiled type may both build it; the first insert wins and the
//! other result is dropped.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use crate::field::{Bind, FieldSpec};

/// Initialiser for the per-descriptor extension slot.
pub type LocalInit = Arc<dyn Fn(&FieldSpec) -> Option<Box<dyn Any + Send + Sync>> + Send + Sync>;

/// One compiled field.
pub struct FieldDescriptor {
    index: usize,
    spec: FieldSpec,
    child: Option<Arc<Plan>>,
    local: Option<Box<dyn Any + Send + Sync>>,
}

impl FieldDescriptor {
    /// Position passed to `field_mut` / `field`.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The field's static description.
    pub fn spec(&self) -> &FieldSpec {
        &self.spec
    }

    /// Rust field name.
    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    /// Plan of a nested record field.
    pub fn child(&self) -> Option<&Arc<Plan>> {
        self.child.as_ref()
    }

    /// Extension slot set when the plan was compiled by
    /// [`PlanCache::with_local`].
    pub fn local<T: Any>(&self) -> Option<&T> {
        self.local.as_ref().and_then(|slot| slot.downcast_ref())
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("index", &self.index)
            .field("spec", &self.spec)
            .field("child", &self.child)
            .field("local", &self.local.is_some())
            .finish()
    }
}

impl PartialEq for FieldDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.spec == other.spec && self.child == other.child
    }
}

/// Compiled, immutable description of how to populate one record type.
#[derive(Debug)]
pub struct Plan {
    type_id: TypeId,
    type_name: &'static str,
    fields: Vec<FieldDescriptor>,
    uses_form: bool,
}

impl Plan {
    /// The compiled type.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Name of the compiled type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Descriptors in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Number of visible fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the type has no visible fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// True if this plan or a nested one reads form values or uploads.
    pub fn uses_form(&self) -> bool {
        self.uses_form
    }
}

impl PartialEq for Plan {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.fields == other.fields
    }
}

/// Cache of compiled plans keyed by type.
///
/// The global cache serves the pipeline. Extensions that need their own
/// per-field state build a private cache with [`PlanCache::with_local`].
#[derive(Default)]
pub struct PlanCache {
    plans: DashMap<TypeId, Arc<Plan>>,
    local: Option<LocalInit>,
}

impl fmt::Debug for PlanCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanCache")
            .field("plans", &self.plans.len())
            .field("local", &self.local.is_some())
            .finish()
    }
}

impl PlanCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache whose descriptors carry a slot produced by `init`.
    pub fn with_local<F>(init: F) -> Self
    where
        F: Fn(&FieldSpec) -> Option<Box<dyn Any + Send + Sync>> + Send + Sync + 'static,
    {
        Self {
            plans: DashMap::new(),
            local: Some(Arc::new(init)),
        }
    }

    /// The process-wide cache.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<PlanCache> = OnceLock::new();
        GLOBAL.get_or_init(PlanCache::new)
    }

    /// Returns the plan for `T`, compiling it on first use.
    pub fn get<T: Bind>(&self) -> Arc<Plan> {
        let id = TypeId::of::<T>();
        if let Some(plan) = self.plans.get(&id) {
            return Arc::clone(plan.value());
        }

        let plan = Arc::new(self.build::<T>());
        Arc::clone(self.plans.entry(id).or_insert(plan).value())
    }

    /// Returns the plan for `id` if it has been compiled.
    pub fn lookup(&self, id: TypeId) -> Option<Arc<Plan>> {
        self.plans.get(&id).map(|plan| Arc::clone(plan.value()))
    }

    /// Number of cached plans.
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    /// True if nothing has been compiled yet.
    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    fn build<T: Bind>(&self) -> Plan {
        let fields: Vec<FieldDescriptor> = T::describe()
            .into_iter()
            .enumerate()
            .map(|(index, spec)| FieldDescriptor {
                index,
                child: spec.child.map(|child| child(self)),
                local: self.local.as_ref().and_then(|init| init(&spec)),
                spec,
            })
            .collect();

        let uses_form = fields.iter().any(|f| {
            f.spec.form.is_some() || f.child.as_ref().is_some_and(|child| child.uses_form())
        });

        tracing::trace!(plan = type_name::<T>(), fields = fields.len(), "compiled plan");

        Plan {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            fields,
            uses_form,
        }
    }
}

/// Returns the globally cached plan for `T`.
pub fn compile<T: Bind>() -> Arc<Plan> {
    PlanCache::global().get::<T>()
}

/// Returns the globally cached plan for `id`, or `None` when the type was
/// never compiled (including every type that is not a record).
pub fn lookup(id: TypeId) -> Option<Arc<Plan>> {
    PlanCache::global().lookup(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldRef, FieldValue, ValueKind};

    #[derive(Default)]
    struct Inner {
        code: String,
    }

    impl Bind for Inner {
        fn describe() -> Vec<FieldSpec> {
            vec![FieldSpec {
                form: Some("code"),
                kind: ValueKind::Text,
                ..FieldSpec::new("code")
            }]
        }

        fn field_mut(&mut self, index: usize) -> Option<FieldRef<'_>> {
            match index {
                0 => Some(FieldRef::Value(&mut self.code)),
                _ => None,
            }
        }

        fn field(&self, index: usize) -> Option<&dyn FieldValue> {
            match index {
                0 => Some(&self.code),
                _ => None,
            }
        }
    }

    #[derive(Default)]
    struct Outer {
        id: u64,
        inner: Inner,
    }

    impl Bind for Outer {
        fn describe() -> Vec<FieldSpec> {
            vec![
                FieldSpec {
                    path: Some("id"),
                    kind: ValueKind::Uint,
                    tags: &[("mask", "none")],
                    ..FieldSpec::new("id")
                },
                FieldSpec {
                    kind: ValueKind::Record,
                    child: Some(crate::field::child_plan::<Inner>),
                    ..FieldSpec::new("inner")
                },
            ]
        }

        fn field_mut(&mut self, index: usize) -> Option<FieldRef<'_>> {
            match index {
                0 => Some(FieldRef::Value(&mut self.id)),
                _ => None,
            }
        }

        fn field(&self, index: usize) -> Option<&dyn FieldValue> {
            match index {
                0 => Some(&self.id),
                _ => None,
            }
        }
    }

    #[test]
    fn test_compile_builds_child_plans() {
        let cache = PlanCache::new();
        let plan = cache.get::<Outer>();

        assert_eq!(plan.len(), 2);
        assert!(plan.fields()[0].child().is_none());
        let child = plan.fields()[1].child().unwrap();
        assert_eq!(child.fields()[0].name(), "code");
        assert!(plan.uses_form());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_compile_is_cached() {
        let cache = PlanCache::new();
        let first = cache.get::<Outer>();
        let second = cache.get::<Outer>();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_separate_caches_build_equal_plans() {
        let a = PlanCache::new().get::<Outer>();
        let b = PlanCache::new().get::<Outer>();
        assert_eq!(*a, *b);
    }

    #[test]
    fn test_concurrent_compilation_converges() {
        let cache = Arc::new(PlanCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.get::<Outer>())
            })
            .collect();

        let plans: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for plan in &plans {
            assert_eq!(**plan, *plans[0]);
        }
        assert!(Arc::ptr_eq(&cache.get::<Outer>(), &cache.get::<Outer>()));
    }

    #[test]
    fn test_lookup_unknown_type() {
        let cache = PlanCache::new();
        assert!(cache.lookup(TypeId::of::<String>()).is_none());
        cache.get::<Inner>();
        assert!(cache.lookup(TypeId::of::<Inner>()).is_some());
    }

    #[test]
    fn test_local_slot() {
        let cache = PlanCache::with_local(|spec| {
            spec.tag("mask")
                .map(|mode| Box::new(mode.to_uppercase()) as Box<dyn Any + Send + Sync>)
        });
        let plan = cache.get::<Outer>();

        assert_eq!(plan.fields()[0].local::<String>().map(String::as_str), Some("NONE"));
        assert!(plan.fields()[1].local::<String>().is_none());
    }
}
