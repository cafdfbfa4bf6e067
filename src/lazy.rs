//! Memoizing lazy values
//!
//! [`Lazy<T>`] defers a provider call until the first `get` and then keeps
//! returning the same instance. The binding side ([`LazyBinding`]) makes
//! `Lazy<T>` injectable next to `T`, under the same qualifier.
//!
//! ## Concurrency
//!
//! The upstream provider runs outside any lock. Two threads racing on the
//! first `get` may both call it; only the first published value is kept and
//! both callers receive it.

use crate::binder::{Binder, RawBindingBuilder, Target};
use crate::error::ProvisionError;
use crate::key::{Qualifier, RawKey};
use crate::provider::Provider;
use crate::scope::Scoping;
use crate::source::{CallSite, SourceTag};
use once_cell::sync::OnceCell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

pub(crate) const SOURCE: SourceTag = crate::source_tag!();

// ============================================================================
// LAZY
// ============================================================================

/// A value produced on first use and cached for the holder
pub struct Lazy<T: ?Sized + 'static> {
    provider: Provider<T>,
    value: OnceCell<Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Lazy<T> {
    pub fn new(provider: Provider<T>) -> Self {
        Self {
            provider,
            value: OnceCell::new(),
        }
    }

    pub fn from_fn<F>(provide: F) -> Self
    where
        F: Fn() -> Result<Arc<T>, ProvisionError> + Send + Sync + 'static,
    {
        Self::new(Provider::from_fn(provide))
    }

    /// The cached value, computing it on first call
    ///
    /// A failed computation is not cached.
    pub fn get(&self) -> Result<Arc<T>, ProvisionError> {
        if let Some(value) = self.value.get() {
            return Ok(Arc::clone(value));
        }
        let computed = self.provider.get()?;
        match self.value.set(Arc::clone(&computed)) {
            Ok(()) => Ok(computed),
            Err(_) => {
                tracing::trace!(key = %self.provider.raw().key(), "discarding raced lazy value");
                Ok(self.value.get().map(Arc::clone).unwrap_or(computed))
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.value.get().is_some()
    }

    /// The value if already computed
    pub fn get_if_loaded(&self) -> Option<Arc<T>> {
        self.value.get().map(Arc::clone)
    }

    pub fn provider(&self) -> &Provider<T> {
        &self.provider
    }

    /// Provider view of a shared lazy value
    pub fn into_provider(self: Arc<Self>) -> Provider<T> {
        Provider::from_fn(move || self.get())
    }
}

impl<T: ?Sized + 'static> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy")
            .field("provider", &self.provider)
            .field("loaded", &self.value.get().is_some())
            .finish()
    }
}

// ============================================================================
// BINDING
// ============================================================================

/// Raw builder behind `bind_lazy::<T>()`
///
/// Binds `Lazy<T>` once the qualifier is settled, then hands every further
/// call to the builder for `T` under that qualifier.
pub(crate) struct LazyBinding<T: ?Sized + Send + Sync + 'static> {
    binder: Arc<dyn Binder>,
    site: CallSite,
    key: RawKey,
    binding: Option<Box<dyn RawBindingBuilder>>,
    _type: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> LazyBinding<T> {
    pub(crate) fn new<B: Binder + ?Sized>(binder: &B, site: CallSite) -> Self {
        Self {
            binder: binder.skip_sources(&[SOURCE]),
            site,
            key: RawKey::of::<T>(),
            binding: None,
            _type: PhantomData,
        }
    }

    /// Record the `Lazy<T>` binding for the current key
    fn bind_wrapper(&self) {
        let provider = self
            .binder
            .get_provider_raw(self.key.clone(), self.site)
            .typed::<T>();
        let wrapper = RawKey::of::<Lazy<T>>().with_qualifier(self.key.qualifier().cloned());
        tracing::trace!(key = %wrapper, "binding lazy wrapper");
        self.binder.bind_raw(wrapper, self.site).to_target(Target::Provider(
            Provider::<Lazy<T>>::from_fn(move || Ok(Arc::new(Lazy::new(provider.clone())))).into_raw(),
        ));
    }

    /// Settle the key: bind the wrapper and open the builder for `T`
    fn binding(&mut self) -> &mut Box<dyn RawBindingBuilder> {
        if self.binding.is_none() {
            self.bind_wrapper();
        }
        let (binder, key, site) = (&self.binder, &self.key, self.site);
        self.binding.get_or_insert_with(|| binder.bind_raw(key.clone(), site))
    }
}

impl<T: ?Sized + Send + Sync + 'static> RawBindingBuilder for LazyBinding<T> {
    fn key(&self) -> RawKey {
        self.key.clone()
    }

    fn annotated_with(&mut self, qualifier: Qualifier) {
        // already settled; the host rejects the second qualifier
        if let Some(binding) = self.binding.as_mut() {
            binding.annotated_with(qualifier);
            return;
        }
        self.key = self.key.clone().with_qualifier(Some(qualifier));
        self.binding();
    }

    fn to_target(&mut self, target: Target) {
        self.binding().to_target(target)
    }

    fn in_scoping(&mut self, scoping: Scoping) {
        self.binding().in_scoping(scoping)
    }
}

impl<T: ?Sized + Send + Sync + 'static> Drop for LazyBinding<T> {
    fn drop(&mut self) {
        // an untouched builder still makes the wrapper injectable
        if self.binding.is_none() {
            self.bind_wrapper();
        }
    }
}
