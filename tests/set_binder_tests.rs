//! # Set Binder Tests
//!
//! - SetBinder: elements added through a reusable handle
//! - in_set: contributions merged across modules
//! - Qualified sets stay separate, order follows declaration
//! - Element bindings take targets and scopes like any binding

use binderkit::{
    AbstractModule, Binder, BinderExt, DuplexBinder, DuplexModule, ExtendedBinder,
    ExtendedPrivateBinder, Injectable, Injector, Key, Multibinder, PrivateBinderExt,
    ProvisionError, Resolver, ResolverExt, SetBinder, VBinder, VDuplexBinder,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// TEST HELPERS
// ============================================================================

trait Thing: Send + Sync {
    fn label(&self) -> &'static str;
}

struct ThingA;
struct ThingB;

impl Thing for ThingA {
    fn label(&self) -> &'static str {
        "a"
    }
}

impl Thing for ThingB {
    fn label(&self) -> &'static str {
        "b"
    }
}

impl Injectable for ThingA {
    fn construct(_resolver: &dyn Resolver) -> Result<Self, ProvisionError> {
        Ok(ThingA)
    }
}

/// Typed handle for the set of strings
struct StringBinder(SetBinder<String>);

impl StringBinder {
    fn new<B: Binder + ?Sized>(binder: &B) -> Self {
        StringBinder(SetBinder::new(binder))
    }

    fn add(&self, value: &str) {
        self.0.add_binding().to_instance(value.to_string());
    }
}

fn labels(things: &[Arc<dyn Thing>]) -> Vec<&'static str> {
    things.iter().map(|thing| thing.label()).collect()
}

fn build<F>(configure: F) -> Injector
where
    F: FnMut(&VBinder) + 'static,
{
    Injector::builder()
        .module(AbstractModule::from_fn(configure))
        .build()
        .unwrap()
}

// ============================================================================
// SET BINDER
// ============================================================================

#[test]
fn test_set_binder_collects_elements() {
    let injector = build(|binder| {
        let strings = StringBinder::new(binder);
        strings.add("foo");
        strings.add("bar");
    });

    let strings = injector.get_instance::<Vec<Arc<String>>>().unwrap();
    let strings: Vec<&str> = strings.iter().map(|s| s.as_str()).collect();
    assert_eq!(strings, ["foo", "bar"]);
}

#[test]
fn test_empty_set_is_bound() {
    let injector = build(|binder| {
        SetBinder::<dyn Thing>::new(binder);
    });

    assert!(injector.get_instance::<Vec<Arc<dyn Thing>>>().unwrap().is_empty());
}

#[test]
fn test_named_set_binder() {
    let injector = build(|binder| {
        let named = SetBinder::<String>::named(binder, "greetings");
        named.add_binding().to_instance("hi".to_string());
    });

    let greetings = injector.get(&Key::<Vec<Arc<String>>>::named("greetings")).unwrap();
    assert_eq!(greetings.len(), 1);
    assert!(injector.get_instance::<Vec<Arc<String>>>().is_err());
}

// ============================================================================
// IN SET
// ============================================================================

#[test]
fn test_in_set_merges_across_modules() {
    let injector = build(|binder| {
        binder.in_set::<dyn Thing>().add_binding().to_impl::<ThingA, _>(|a| a);
        binder.install_module(AbstractModule::from_fn(|binder: &VBinder| {
            binder
                .in_set::<dyn Thing>()
                .add_binding()
                .to_fn(|| Arc::new(ThingB));
        }));
    });

    let things = injector.get_instance::<Vec<Arc<dyn Thing>>>().unwrap();
    assert_eq!(labels(&things), ["a", "b"]);
}

#[test]
fn test_qualified_sets_are_separate() {
    let injector = build(|binder| {
        let left = binder.in_set_key(Key::<dyn Thing>::named("left"));
        let right = binder.in_set_key(Key::<dyn Thing>::named("right"));
        left.add_binding().to_fn(|| Arc::new(ThingA));
        right.add_binding().to_fn(|| Arc::new(ThingB));
        left.add_binding().to_fn(|| Arc::new(ThingB));
    });

    let left = injector.get(&Key::<Vec<Arc<dyn Thing>>>::named("left")).unwrap();
    let right = injector.get(&Key::<Vec<Arc<dyn Thing>>>::named("right")).unwrap();
    assert_eq!(labels(&left), ["a", "b"]);
    assert_eq!(labels(&right), ["b"]);
}

#[test]
fn test_element_scopes_apply() {
    let created = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&created);

    let injector = build(move |binder| {
        let set: Multibinder<usize> = binder.in_set();
        let counted = Arc::clone(&counted);
        set.add_binding()
            .to_fn(move || Arc::new(counted.fetch_add(1, Ordering::SeqCst)))
            .in_singleton();
        set.add_binding().to_fn(|| Arc::new(100));
    });

    let first = injector.get_instance::<Vec<Arc<usize>>>().unwrap();
    let second = injector.get_instance::<Vec<Arc<usize>>>().unwrap();
    assert!(Arc::ptr_eq(&first[0], &second[0]));
    assert!(!Arc::ptr_eq(&first[1], &second[1]));
    assert_eq!(created.load(Ordering::SeqCst), 1);
}

#[test]
fn test_set_consumed_by_injectable() {
    struct Registry {
        things: Arc<Vec<Arc<dyn Thing>>>,
    }

    impl Injectable for Registry {
        fn construct(resolver: &dyn Resolver) -> Result<Self, ProvisionError> {
            Ok(Registry {
                things: resolver.get_instance()?,
            })
        }
    }

    let injector = build(|binder| {
        binder.in_set::<dyn Thing>().add_binding().to_fn(|| Arc::new(ThingA));
        binder.bind::<Registry>().to_injectable();
    });

    assert_eq!(injector.get_instance::<Registry>().unwrap().things.len(), 1);
}

// ============================================================================
// PRIVATE SETS
// ============================================================================

#[test]
fn test_set_exposed_from_duplex_module() {
    let injector = build(|binder| {
        DuplexBinder::create(binder).install(&mut DuplexModule::from_fn(|binder: &VDuplexBinder| {
            let set = binder.in_set::<dyn Thing>();
            set.add_binding().to_fn(|| Arc::new(ThingA));
            set.add_binding().to_fn(|| Arc::new(ThingB));
            binder.expose_key(set.set_key());
            binder.bind_and_expose::<usize>().to_fn(|| Arc::new(2));
        }));
    });

    let things = injector.get_instance::<Vec<Arc<dyn Thing>>>().unwrap();
    assert_eq!(labels(&things), ["a", "b"]);
    assert_eq!(*injector.get_instance::<usize>().unwrap(), things.len());
}
