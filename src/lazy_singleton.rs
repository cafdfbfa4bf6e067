//! Lazy singleton scope
//!
//! Caches exactly like [`SingletonScope`], but is a separate scope object
//! that is never primed at injector creation, not even in
//! [`Stage::Production`].
//!
//! The marker is not built in: register it with [`LazySingletonModule`] or
//! `install_lazy_singleton_scope()` before using it on bindings or on
//! [`Injectable`](crate::provider::Injectable) types.

use crate::binder::Binder;
use crate::key::RawKey;
use crate::module::Module;
use crate::provider::RawProvider;
use crate::scope::{Scope, ScopeAnnotation, ScopeTag, SingletonScope, Stage};
use crate::source::SourceTag;
use once_cell::sync::Lazy;
use std::any::TypeId;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

pub(crate) const SOURCE: SourceTag = crate::source_tag!();

/// Marker for the lazy singleton scope
#[derive(Debug, Clone, Copy)]
pub struct LazySingleton;

impl ScopeAnnotation for LazySingleton {}

impl LazySingleton {
    /// The scope object registered for the marker
    pub fn scope() -> Arc<dyn Scope> {
        Arc::clone(&LAZY_SINGLETON)
    }

    pub fn tag() -> ScopeTag {
        ScopeTag::of::<LazySingleton>()
    }
}

/// One instance per binding per injector, built on first demand
pub struct LazySingletonScope;

impl Scope for LazySingletonScope {
    fn scope(&self, key: &RawKey, unscoped: RawProvider) -> RawProvider {
        SingletonScope::cache(key, unscoped)
    }

    fn eager_in(&self, _stage: Stage) -> bool {
        false
    }
}

impl fmt::Debug for LazySingletonScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LazySingleton.SCOPE")
    }
}

pub static LAZY_SINGLETON: Lazy<Arc<dyn Scope>> = Lazy::new(|| Arc::new(LazySingletonScope));

/// Registers [`LazySingleton`] in the environment it is installed into
#[derive(Debug, Default, Clone, Copy)]
pub struct LazySingletonModule;

impl Module for LazySingletonModule {
    fn configure(&mut self, binder: &dyn Binder) {
        binder
            .skip_sources(&[SOURCE])
            .bind_scope_raw(LazySingleton::tag(), LazySingleton::scope(), Location::caller());
    }

    fn dedup_identity(&self) -> Option<TypeId> {
        Some(TypeId::of::<Self>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::erase;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_caches_like_singleton() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counted = counter.clone();
        let unscoped = RawProvider::new(RawKey::of::<usize>(), move || {
            Ok(erase(Arc::new(counted.fetch_add(1, Ordering::SeqCst))))
        });
        let scoped = LazySingleton::scope().scope(&RawKey::of::<usize>(), unscoped);

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        let a = scoped.get().unwrap();
        let b = scoped.get().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_never_eager() {
        for stage in [Stage::Tool, Stage::Development, Stage::Production] {
            assert!(!LazySingleton::scope().eager_in(stage));
        }
    }

    #[test]
    fn test_display_name() {
        assert_eq!(format!("{:?}", LazySingleton::scope()), "LazySingleton.SCOPE");
    }
}
