//! Typed binding builders
//!
//! Thin typed shells over [`RawBindingBuilder`] / [`RawExposureBuilder`].
//! Each call mutates the recorded element immediately, so a builder can be
//! dropped at any point of the chain.
//!
//! ```rust,ignore
//! binder.bind::<dyn Store>()
//!     .named("cache")
//!     .to_impl::<MemoryStore>(|s| s)
//!     .in_scope_tag::<Singleton>();
//! ```

use super::{RawBindingBuilder, RawExposureBuilder, Target};
use crate::error::ProvisionError;
use crate::key::{Key, Qualifier};
use crate::provider::{downcast, erase, Injectable, Provider, Resolver};
use crate::scope::{Scope, ScopeAnnotation, ScopeTag, Scoping, Singleton};
use std::marker::PhantomData;
use std::sync::Arc;

// ============================================================================
// ANNOTATED BINDING BUILDER
// ============================================================================

/// Builder returned by `bind::<T>()`: may still be qualified
pub struct AnnotatedBindingBuilder<T: ?Sized + 'static> {
    raw: Box<dyn RawBindingBuilder>,
    _type: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> AnnotatedBindingBuilder<T> {
    pub fn new(raw: Box<dyn RawBindingBuilder>) -> Self {
        Self {
            raw,
            _type: PhantomData,
        }
    }

    /// Key the binding currently has
    pub fn key(&self) -> Key<T> {
        Key::<T>::get().with_qualifier(self.raw.key().qualifier().cloned())
    }

    pub fn annotated_with(mut self, qualifier: Qualifier) -> LinkedBindingBuilder<T> {
        self.raw.annotated_with(qualifier);
        LinkedBindingBuilder::new(self.raw)
    }

    pub fn named(self, name: &str) -> LinkedBindingBuilder<T> {
        self.annotated_with(Qualifier::named(name))
    }

    pub fn marked<M: ?Sized + 'static>(self) -> LinkedBindingBuilder<T> {
        self.annotated_with(Qualifier::marker::<M>())
    }

    /// Continue without a qualifier
    pub fn linked(self) -> LinkedBindingBuilder<T> {
        LinkedBindingBuilder::new(self.raw)
    }

    pub fn into_raw(self) -> Box<dyn RawBindingBuilder> {
        self.raw
    }

    pub fn to_arc(self, instance: Arc<T>) {
        self.linked().to_arc(instance)
    }

    pub fn to_provider(self, provider: Provider<T>) -> ScopedBindingBuilder {
        self.linked().to_provider(provider)
    }

    pub fn to_fn<F>(self, provide: F) -> ScopedBindingBuilder
    where
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        self.linked().to_fn(provide)
    }

    pub fn to_factory<F>(self, factory: F) -> ScopedBindingBuilder
    where
        F: Fn(&dyn Resolver) -> Result<Arc<T>, ProvisionError> + Send + Sync + 'static,
    {
        self.linked().to_factory(factory)
    }

    pub fn to_key(self, key: Key<T>) -> ScopedBindingBuilder {
        self.linked().to_key(key)
    }

    pub fn to_linked<U, F>(self, key: Key<U>, convert: F) -> ScopedBindingBuilder
    where
        U: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<U>) -> Arc<T> + Send + Sync + 'static,
    {
        self.linked().to_linked(key, convert)
    }

    pub fn to_impl<U, F>(self, convert: F) -> ScopedBindingBuilder
    where
        U: Injectable,
        F: Fn(Arc<U>) -> Arc<T> + Send + Sync + 'static,
    {
        self.linked().to_impl(convert)
    }

    pub fn in_scope(self, scope: Arc<dyn Scope>) {
        self.linked().in_scope(scope)
    }

    pub fn in_scope_tag<S: ScopeAnnotation>(self) {
        self.linked().in_scope_tag::<S>()
    }

    pub fn as_eager_singleton(self) {
        self.linked().as_eager_singleton()
    }
}

impl<T: Send + Sync + 'static> AnnotatedBindingBuilder<T> {
    pub fn to_instance(self, instance: T) {
        self.linked().to_instance(instance)
    }
}

impl<T: Injectable> AnnotatedBindingBuilder<T> {
    pub fn to_injectable(self) -> ScopedBindingBuilder {
        self.linked().to_injectable()
    }
}

// ============================================================================
// LINKED BINDING BUILDER
// ============================================================================

/// Builder that chooses what a binding resolves to
pub struct LinkedBindingBuilder<T: ?Sized + 'static> {
    raw: Box<dyn RawBindingBuilder>,
    _type: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> LinkedBindingBuilder<T> {
    pub fn new(raw: Box<dyn RawBindingBuilder>) -> Self {
        Self {
            raw,
            _type: PhantomData,
        }
    }

    pub fn key(&self) -> Key<T> {
        Key::<T>::get().with_qualifier(self.raw.key().qualifier().cloned())
    }

    pub fn into_raw(self) -> Box<dyn RawBindingBuilder> {
        self.raw
    }

    fn target(mut self, target: Target) -> ScopedBindingBuilder {
        self.raw.to_target(target);
        ScopedBindingBuilder { raw: self.raw }
    }

    /// Bind to an existing shared instance
    pub fn to_arc(self, instance: Arc<T>) {
        self.target(Target::Instance(erase(instance)));
    }

    pub fn to_provider(self, provider: Provider<T>) -> ScopedBindingBuilder {
        self.target(Target::Provider(provider.into_raw()))
    }

    /// Bind to a closure producing new instances
    pub fn to_fn<F>(self, provide: F) -> ScopedBindingBuilder
    where
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        self.to_provider(Provider::from_fn(move || Ok(provide())))
    }

    /// Bind to a factory that may resolve its own dependencies
    pub fn to_factory<F>(self, factory: F) -> ScopedBindingBuilder
    where
        F: Fn(&dyn Resolver) -> Result<Arc<T>, ProvisionError> + Send + Sync + 'static,
    {
        self.target(Target::Factory(Arc::new(move |resolver: &dyn Resolver| {
            factory(resolver).map(erase)
        })))
    }

    /// Link to another key of the same type
    pub fn to_key(self, key: Key<T>) -> ScopedBindingBuilder {
        self.target(Target::Linked {
            key: key.into_raw(),
            convert: None,
        })
    }

    /// Link to a key of another type, converting its instances
    pub fn to_linked<U, F>(self, key: Key<U>, convert: F) -> ScopedBindingBuilder
    where
        U: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<U>) -> Arc<T> + Send + Sync + 'static,
    {
        let source = key.raw().clone();
        self.target(Target::Linked {
            key: key.into_raw(),
            convert: Some(Arc::new(move |instance| {
                downcast::<U>(&instance)
                    .map(|value| erase(convert(value)))
                    .ok_or_else(|| ProvisionError::TypeMismatch { key: source.clone() })
            })),
        })
    }

    /// Bind to an injectable implementation type
    ///
    /// The implementation's own scope marker applies unless a scope is
    /// chosen on the returned builder.
    pub fn to_impl<U, F>(self, convert: F) -> ScopedBindingBuilder
    where
        U: Injectable,
        F: Fn(Arc<U>) -> Arc<T> + Send + Sync + 'static,
    {
        self.target(Target::Constructor {
            type_name: std::any::type_name::<U>(),
            factory: Arc::new(move |resolver: &dyn Resolver| {
                U::construct(resolver).map(|value| erase(convert(Arc::new(value))))
            }),
            scope: U::scope_tag(),
        })
    }

    pub fn in_scope(self, scope: Arc<dyn Scope>) {
        ScopedBindingBuilder { raw: self.raw }.in_scope(scope)
    }

    pub fn in_scope_tag<S: ScopeAnnotation>(self) {
        ScopedBindingBuilder { raw: self.raw }.in_scope_tag::<S>()
    }

    pub fn as_eager_singleton(self) {
        ScopedBindingBuilder { raw: self.raw }.as_eager_singleton()
    }
}

impl<T: Send + Sync + 'static> LinkedBindingBuilder<T> {
    pub fn to_instance(self, instance: T) {
        self.to_arc(Arc::new(instance))
    }
}

impl<T: Injectable> LinkedBindingBuilder<T> {
    pub fn to_injectable(self) -> ScopedBindingBuilder {
        self.to_impl::<T, _>(|value| value)
    }
}

// ============================================================================
// SCOPED BINDING BUILDER
// ============================================================================

/// Builder that chooses the scope of a targeted binding
pub struct ScopedBindingBuilder {
    raw: Box<dyn RawBindingBuilder>,
}

impl ScopedBindingBuilder {
    pub fn new(raw: Box<dyn RawBindingBuilder>) -> Self {
        Self { raw }
    }

    pub fn in_scope(mut self, scope: Arc<dyn Scope>) {
        self.raw.in_scoping(Scoping::Instance(scope));
    }

    pub fn in_scope_tag<S: ScopeAnnotation>(mut self) {
        self.raw.in_scoping(Scoping::Tag(ScopeTag::of::<S>()));
    }

    pub fn in_singleton(self) {
        self.in_scope_tag::<Singleton>()
    }

    pub fn as_eager_singleton(mut self) {
        self.raw.in_scoping(Scoping::EagerSingleton);
    }
}

// ============================================================================
// EXPOSURE BUILDER
// ============================================================================

/// Builder returned by `expose::<T>()`: may still be qualified
pub struct AnnotatedElementBuilder {
    raw: Box<dyn RawExposureBuilder>,
}

impl AnnotatedElementBuilder {
    pub fn new(raw: Box<dyn RawExposureBuilder>) -> Self {
        Self { raw }
    }

    pub fn annotated_with(mut self, qualifier: Qualifier) {
        self.raw.annotated_with(qualifier);
    }

    pub fn named(self, name: &str) {
        self.annotated_with(Qualifier::named(name))
    }

    pub fn marked<M: ?Sized + 'static>(self) {
        self.annotated_with(Qualifier::marker::<M>())
    }

    pub fn into_raw(self) -> Box<dyn RawExposureBuilder> {
        self.raw
    }
}
