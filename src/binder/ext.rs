//! Typed binder API
//!
//! Blanket extension traits over every [`Binder`] / [`PrivateBinder`]. All
//! element-recording methods are `#[track_caller]`, so the caller's location
//! becomes the element's source.

use super::builder::{AnnotatedBindingBuilder, AnnotatedElementBuilder, LinkedBindingBuilder};
use super::{Binder, PrivateBinder};
use crate::error::ConfigError;
use crate::key::{Key, RawKey};
use crate::module::Module;
use crate::provider::Provider;
use crate::scope::{Scope, ScopeAnnotation, ScopeTag};
use std::panic::Location;
use std::sync::Arc;

/// Typed helpers available on every binder
pub trait BinderExt: Binder {
    /// Declare an unqualified binding for `T`
    #[track_caller]
    fn bind<T: ?Sized + Send + Sync + 'static>(&self) -> AnnotatedBindingBuilder<T> {
        AnnotatedBindingBuilder::new(self.bind_raw(RawKey::of::<T>(), Location::caller()))
    }

    /// Declare a binding for an exact key
    #[track_caller]
    fn bind_key<T: ?Sized + Send + Sync + 'static>(&self, key: Key<T>) -> LinkedBindingBuilder<T> {
        LinkedBindingBuilder::new(self.bind_raw(key.into_raw(), Location::caller()))
    }

    /// Provider for `key`, usable once the injector is built
    #[track_caller]
    fn get_provider<T: ?Sized + Send + Sync + 'static>(&self, key: Key<T>) -> Provider<T> {
        self.get_provider_raw(key.into_raw(), Location::caller()).typed()
    }

    /// Register `scope` for the marker `S`
    #[track_caller]
    fn bind_scope<S: ScopeAnnotation>(&self, scope: Arc<dyn Scope>) {
        self.bind_scope_raw(ScopeTag::of::<S>(), scope, Location::caller())
    }

    /// Record a free-form configuration error
    #[track_caller]
    fn add_error(&self, message: impl Into<String>) {
        self.add_error_raw(ConfigError::custom(message), Location::caller())
    }

    /// Record a structured configuration error
    #[track_caller]
    fn add_config_error(&self, error: ConfigError) {
        self.add_error_raw(error, Location::caller())
    }

    /// Install a module by value
    fn install_module<M: Module>(&self, mut module: M) {
        self.install(&mut module)
    }
}

impl<B: Binder + ?Sized> BinderExt for B {}

/// Typed helpers available on every private binder
pub trait PrivateBinderExt: PrivateBinder {
    /// Expose the unqualified binding for `T`; qualify with the returned builder
    #[track_caller]
    fn expose<T: ?Sized + 'static>(&self) -> AnnotatedElementBuilder {
        AnnotatedElementBuilder::new(self.expose_raw(RawKey::of::<T>(), Location::caller()))
    }

    /// Expose an exact key
    #[track_caller]
    fn expose_key<T: ?Sized + 'static>(&self, key: Key<T>) {
        self.expose_raw(key.into_raw(), Location::caller());
    }
}

impl<B: PrivateBinder + ?Sized> PrivateBinderExt for B {}
