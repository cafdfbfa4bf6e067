//! Providers and instance resolution
//!
//! Instances are always shared as `Arc<T>` so that identity (`Arc::ptr_eq`)
//! is meaningful for scoped bindings. Across the type-erased binder surface
//! they travel as an [`Instance`], an `Arc<dyn Any>` that holds the `Arc<T>`.

use crate::error::ProvisionError;
use crate::key::{Key, RawKey};
use crate::scope::ScopeTag;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A type-erased instance (an `Arc<T>` behind `dyn Any`)
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Erase a typed instance
pub fn erase<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Instance {
    Arc::new(value)
}

/// Recover a typed instance
pub fn downcast<T: ?Sized + Send + Sync + 'static>(instance: &Instance) -> Option<Arc<T>> {
    instance.downcast_ref::<Arc<T>>().cloned()
}

type ProvideFn = dyn Fn() -> Result<Instance, ProvisionError> + Send + Sync;

// ============================================================================
// RAW PROVIDER
// ============================================================================

/// Type-erased provider for one key
#[derive(Clone)]
pub struct RawProvider {
    key: RawKey,
    provide: Arc<ProvideFn>,
}

impl RawProvider {
    pub fn new<F>(key: RawKey, provide: F) -> Self
    where
        F: Fn() -> Result<Instance, ProvisionError> + Send + Sync + 'static,
    {
        Self {
            key,
            provide: Arc::new(provide),
        }
    }

    pub fn key(&self) -> &RawKey {
        &self.key
    }

    pub fn get(&self) -> Result<Instance, ProvisionError> {
        (self.provide)()
    }

    /// Typed view of this provider
    pub fn typed<T: ?Sized + Send + Sync + 'static>(self) -> Provider<T> {
        Provider {
            raw: self,
            _type: PhantomData,
        }
    }
}

impl fmt::Debug for RawProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawProvider").field("key", &self.key).finish()
    }
}

// ============================================================================
// TYPED PROVIDER
// ============================================================================

/// Provides instances of `T`
pub struct Provider<T: ?Sized + 'static> {
    raw: RawProvider,
    _type: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Provider<T> {
    /// Provider backed by a closure
    pub fn from_fn<F>(provide: F) -> Self
    where
        F: Fn() -> Result<Arc<T>, ProvisionError> + Send + Sync + 'static,
    {
        RawProvider::new(RawKey::of::<T>(), move || provide().map(erase)).typed()
    }

    /// Provider that always returns the same instance
    pub fn of_instance(value: Arc<T>) -> Self {
        Self::from_fn(move || Ok(Arc::clone(&value)))
    }

    pub fn get(&self) -> Result<Arc<T>, ProvisionError> {
        let instance = self.raw.get()?;
        downcast::<T>(&instance).ok_or_else(|| ProvisionError::TypeMismatch {
            key: self.raw.key().clone(),
        })
    }

    pub fn raw(&self) -> &RawProvider {
        &self.raw
    }

    pub fn into_raw(self) -> RawProvider {
        self.raw
    }
}

impl<T: ?Sized + 'static> Clone for Provider<T> {
    fn clone(&self) -> Self {
        Self {
            raw: self.raw.clone(),
            _type: PhantomData,
        }
    }
}

impl<T: ?Sized + 'static> fmt::Debug for Provider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Provider").field(&self.raw.key).finish()
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Read access to a built resolution graph, handed to factories
pub trait Resolver {
    /// Resolve an instance for `key`
    fn resolve(&self, key: &RawKey) -> Result<Instance, ProvisionError>;

    /// Provider for `key` without resolving it
    fn provider_for(&self, key: &RawKey) -> Result<RawProvider, ProvisionError>;
}

/// Typed helpers over any [`Resolver`]
pub trait ResolverExt: Resolver {
    fn get<T: ?Sized + Send + Sync + 'static>(&self, key: &Key<T>) -> Result<Arc<T>, ProvisionError> {
        let instance = self.resolve(key.raw())?;
        downcast::<T>(&instance).ok_or_else(|| ProvisionError::TypeMismatch {
            key: key.raw().clone(),
        })
    }

    /// Unqualified instance of `T`
    fn get_instance<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, ProvisionError> {
        self.get(&Key::<T>::get())
    }

    fn provider<T: ?Sized + Send + Sync + 'static>(
        &self,
        key: &Key<T>,
    ) -> Result<Provider<T>, ProvisionError> {
        Ok(self.provider_for(key.raw())?.typed())
    }
}

impl<R: Resolver + ?Sized> ResolverExt for R {}

// ============================================================================
// INJECTABLE
// ============================================================================

/// An implementation type that knows how to construct itself
///
/// The equivalent of an injectable constructor. `scope_tag` lets the type
/// carry its own scope marker (for example
/// [`LazySingleton`](crate::lazy_singleton::LazySingleton)), which applies
/// whenever a binding to it does not choose a scope itself.
pub trait Injectable: Sized + Send + Sync + 'static {
    fn construct(resolver: &dyn Resolver) -> Result<Self, ProvisionError>;

    fn scope_tag() -> Option<ScopeTag> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Shape: Send + Sync {
        fn sides(&self) -> u32;
    }

    struct Square;

    impl Shape for Square {
        fn sides(&self) -> u32 {
            4
        }
    }

    #[test]
    fn test_erase_round_trip_unsized() {
        let shape: Arc<dyn Shape> = Arc::new(Square);
        let instance = erase(Arc::clone(&shape));

        let back = downcast::<dyn Shape>(&instance).unwrap();
        assert!(Arc::ptr_eq(&shape, &back));
        assert!(downcast::<Square>(&instance).is_none());
    }

    #[test]
    fn test_typed_provider() {
        let provider = Provider::<dyn Shape>::from_fn(|| Ok(Arc::new(Square) as Arc<dyn Shape>));
        assert_eq!(provider.get().unwrap().sides(), 4);
        assert!(!Arc::ptr_eq(&provider.get().unwrap(), &provider.get().unwrap()));
    }

    #[test]
    fn test_type_mismatch() {
        let provider = RawProvider::new(RawKey::of::<u32>(), || Ok(erase(Arc::new("nope"))))
            .typed::<u32>();
        assert!(matches!(provider.get(), Err(ProvisionError::TypeMismatch { .. })));
    }
}
