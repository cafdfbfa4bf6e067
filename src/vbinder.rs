//! # Extended binders
//!
//! [`VBinder`] and [`VPrivateBinder`] decorate any host binder with extra
//! operations while forwarding every primitive one-to-one.
//!
//! ```text
//! VBinder::of(host)            VPrivateBinder::of(private)
//!   ├─ every Binder primitive    ├─ every Binder + PrivateBinder primitive
//!   ├─ bind_lazy / in_set        ├─ bind_lazy / in_set
//!   └─ new_private_binder ──────▶└─ bind_and_expose
//! ```
//!
//! Wrapping is idempotent: `of` returns the binder itself when it already
//! answers the matching capability query. Every wrapper adds this file to
//! the skip list, so elements recorded from here are attributed to the
//! caller's module.

use crate::binder::{
    AnnotatedBindingBuilder, Binder, BinderId, LinkedBindingBuilder, PrivateBinder,
    RawBindingBuilder, RawExposureBuilder, Target,
};
use crate::error::ConfigError;
use crate::key::{Key, Qualifier, RawKey};
use crate::lazy::LazyBinding;
use crate::lazy_singleton::LazySingleton;
use crate::module::Module;
use crate::provider::RawProvider;
use crate::scope::{Scope, ScopeTag, Scoping, Stage};
use crate::set_binder::Multibinder;
use crate::source::{CallSite, Source, SourceTag};
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

pub(crate) const SOURCE: SourceTag = crate::source_tag!();

/// Files skipped by every extended binder
pub(crate) const SKIPPED_SOURCES: &[SourceTag] = &[SOURCE];

// ============================================================================
// EXTENSION OPERATIONS
// ============================================================================

/// Operations offered by the extended binders
pub trait ExtendedBinder: Binder {
    /// Bind `T` and make `Lazy<T>` injectable with the same qualifier
    ///
    /// The wrapper binding is recorded as soon as the qualifier is known
    /// (on `annotated_with`, the first target or scope, or when the builder
    /// is dropped untouched).
    #[track_caller]
    fn bind_lazy<T: ?Sized + Send + Sync + 'static>(&self) -> AnnotatedBindingBuilder<T> {
        AnnotatedBindingBuilder::new(Box::new(LazyBinding::<T>::new(self, Location::caller())))
    }

    /// [`bind_lazy`](ExtendedBinder::bind_lazy) for an exact key
    #[track_caller]
    fn bind_lazy_key<T: ?Sized + Send + Sync + 'static>(&self, key: Key<T>) -> LinkedBindingBuilder<T> {
        let mut raw = LazyBinding::<T>::new(self, Location::caller());
        if let Some(qualifier) = key.qualifier() {
            raw.annotated_with(qualifier.clone());
        }
        LinkedBindingBuilder::new(Box::new(raw))
    }

    /// Contribute to the unqualified set of `T`
    #[track_caller]
    fn in_set<T: ?Sized + Send + Sync + 'static>(&self) -> Multibinder<T> {
        Multibinder::new_set_binder(self, Key::get())
    }

    /// Contribute to the set of `T` sharing `key`'s qualifier
    #[track_caller]
    fn in_set_key<T: ?Sized + Send + Sync + 'static>(&self, key: Key<T>) -> Multibinder<T> {
        Multibinder::new_set_binder(self, key)
    }

    /// Register [`LazySingleton`] in this environment
    #[track_caller]
    fn install_lazy_singleton_scope(&self) {
        self.bind_scope_raw(
            ScopeTag::of::<LazySingleton>(),
            LazySingleton::scope(),
            Location::caller(),
        )
    }
}

/// Operations offered by the extended private binders
pub trait ExtendedPrivateBinder: PrivateBinder + ExtendedBinder {
    /// Bind `T` and expose it; a qualifier applies to both
    #[track_caller]
    fn bind_and_expose<T: ?Sized + Send + Sync + 'static>(&self) -> AnnotatedBindingBuilder<T> {
        let site = Location::caller();
        let key = RawKey::of::<T>();
        AnnotatedBindingBuilder::new(Box::new(BindAndExpose {
            binding: self.bind_raw(key.clone(), site),
            exposure: self.expose_raw(key, site),
        }))
    }

    /// Bind and expose an exact key
    #[track_caller]
    fn bind_and_expose_key<T: ?Sized + Send + Sync + 'static>(&self, key: Key<T>) -> LinkedBindingBuilder<T> {
        let site = Location::caller();
        let key = key.into_raw();
        self.expose_raw(key.clone(), site);
        LinkedBindingBuilder::new(self.bind_raw(key, site))
    }
}

/// Records a binding and its exposure as one declaration
struct BindAndExpose {
    binding: Box<dyn RawBindingBuilder>,
    exposure: Box<dyn RawExposureBuilder>,
}

impl RawBindingBuilder for BindAndExpose {
    fn key(&self) -> RawKey {
        self.binding.key()
    }

    fn annotated_with(&mut self, qualifier: Qualifier) {
        self.binding.annotated_with(qualifier.clone());
        self.exposure.annotated_with(qualifier);
    }

    fn to_target(&mut self, target: Target) {
        self.binding.to_target(target)
    }

    fn in_scoping(&mut self, scoping: Scoping) {
        self.binding.in_scoping(scoping)
    }
}

// ============================================================================
// VBINDER
// ============================================================================

/// Extended decorator over any binder
#[derive(Clone)]
pub struct VBinder {
    binder: Arc<dyn Binder>,
}

impl VBinder {
    /// Extended view of `binder`, reusing it when it already is one
    pub fn of<B: Binder + ?Sized>(binder: &B) -> VBinder {
        if let Some(extended) = binder.as_extended() {
            return extended;
        }
        tracing::trace!(binder = %binder.id(), "wrapping binder");
        VBinder {
            binder: binder.skip_sources(SKIPPED_SOURCES),
        }
    }

    /// Treat an already-extended binder as a `VBinder`
    pub(crate) fn wrap(binder: Arc<dyn Binder>) -> VBinder {
        VBinder { binder }
    }

    /// The decorated binder
    pub fn delegate(&self) -> &Arc<dyn Binder> {
        &self.binder
    }

    /// Whether both handles share one decorator
    pub fn ptr_eq(a: &VBinder, b: &VBinder) -> bool {
        Arc::ptr_eq(&a.binder, &b.binder)
    }

    pub fn with_source(&self, source: Source) -> VBinder {
        VBinder::of(&*self.binder.with_source(source))
    }

    pub fn skip_sources(&self, tags: &[SourceTag]) -> VBinder {
        VBinder::of(&*self.binder.skip_sources(tags))
    }

    /// Private environment, already extended
    pub fn new_private_binder(&self) -> VPrivateBinder {
        VPrivateBinder::of(&*self.binder.new_private_binder())
    }
}

impl Binder for VBinder {
    fn id(&self) -> BinderId {
        self.binder.id()
    }

    fn bind_raw(&self, key: RawKey, site: CallSite) -> Box<dyn RawBindingBuilder> {
        self.binder.bind_raw(key, site)
    }

    fn bind_scope_raw(&self, tag: ScopeTag, scope: Arc<dyn Scope>, site: CallSite) {
        self.binder.bind_scope_raw(tag, scope, site)
    }

    fn install(&self, module: &mut dyn Module) {
        self.binder.install(module)
    }

    fn current_stage(&self) -> Stage {
        self.binder.current_stage()
    }

    fn add_error_raw(&self, error: ConfigError, site: CallSite) {
        self.binder.add_error_raw(error, site)
    }

    fn get_provider_raw(&self, key: RawKey, site: CallSite) -> RawProvider {
        self.binder.get_provider_raw(key, site)
    }

    fn with_source(&self, source: Source) -> Arc<dyn Binder> {
        Arc::new(VBinder::with_source(self, source))
    }

    fn skip_sources(&self, tags: &[SourceTag]) -> Arc<dyn Binder> {
        Arc::new(VBinder::skip_sources(self, tags))
    }

    fn new_private_binder(&self) -> Arc<dyn PrivateBinder> {
        Arc::new(VBinder::new_private_binder(self))
    }

    fn as_extended(&self) -> Option<VBinder> {
        Some(self.clone())
    }
}

impl ExtendedBinder for VBinder {}

impl fmt::Debug for VBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VBinder").field(&self.binder).finish()
    }
}

// ============================================================================
// VPRIVATE BINDER
// ============================================================================

/// Extended decorator over any private binder
#[derive(Clone)]
pub struct VPrivateBinder {
    binder: Arc<dyn PrivateBinder>,
}

impl VPrivateBinder {
    /// Extended view of `binder`, reusing it when it already is one
    pub fn of<B: PrivateBinder + ?Sized>(binder: &B) -> VPrivateBinder {
        if let Some(extended) = binder.as_extended_private() {
            return extended;
        }
        tracing::trace!(binder = %binder.id(), "wrapping private binder");
        VPrivateBinder {
            binder: binder.private_skip_sources(SKIPPED_SOURCES),
        }
    }

    pub(crate) fn wrap(binder: Arc<dyn PrivateBinder>) -> VPrivateBinder {
        VPrivateBinder { binder }
    }

    pub fn delegate(&self) -> &Arc<dyn PrivateBinder> {
        &self.binder
    }

    pub fn ptr_eq(a: &VPrivateBinder, b: &VPrivateBinder) -> bool {
        Arc::ptr_eq(&a.binder, &b.binder)
    }

    pub fn with_source(&self, source: Source) -> VPrivateBinder {
        VPrivateBinder::of(&*self.binder.private_with_source(source))
    }

    pub fn skip_sources(&self, tags: &[SourceTag]) -> VPrivateBinder {
        VPrivateBinder::of(&*self.binder.private_skip_sources(tags))
    }

    pub fn new_private_binder(&self) -> VPrivateBinder {
        VPrivateBinder::of(&*self.binder.new_private_binder())
    }
}

impl Binder for VPrivateBinder {
    fn id(&self) -> BinderId {
        self.binder.id()
    }

    fn bind_raw(&self, key: RawKey, site: CallSite) -> Box<dyn RawBindingBuilder> {
        self.binder.bind_raw(key, site)
    }

    fn bind_scope_raw(&self, tag: ScopeTag, scope: Arc<dyn Scope>, site: CallSite) {
        self.binder.bind_scope_raw(tag, scope, site)
    }

    fn install(&self, module: &mut dyn Module) {
        self.binder.install(module)
    }

    fn current_stage(&self) -> Stage {
        self.binder.current_stage()
    }

    fn add_error_raw(&self, error: ConfigError, site: CallSite) {
        self.binder.add_error_raw(error, site)
    }

    fn get_provider_raw(&self, key: RawKey, site: CallSite) -> RawProvider {
        self.binder.get_provider_raw(key, site)
    }

    fn with_source(&self, source: Source) -> Arc<dyn Binder> {
        Arc::new(VPrivateBinder::with_source(self, source))
    }

    fn skip_sources(&self, tags: &[SourceTag]) -> Arc<dyn Binder> {
        Arc::new(VPrivateBinder::skip_sources(self, tags))
    }

    fn new_private_binder(&self) -> Arc<dyn PrivateBinder> {
        Arc::new(VPrivateBinder::new_private_binder(self))
    }

    fn as_extended(&self) -> Option<VBinder> {
        Some(VBinder::wrap(Arc::new(self.clone())))
    }
}

impl PrivateBinder for VPrivateBinder {
    fn expose_raw(&self, key: RawKey, site: CallSite) -> Box<dyn RawExposureBuilder> {
        self.binder.expose_raw(key, site)
    }

    fn private_with_source(&self, source: Source) -> Arc<dyn PrivateBinder> {
        Arc::new(VPrivateBinder::with_source(self, source))
    }

    fn private_skip_sources(&self, tags: &[SourceTag]) -> Arc<dyn PrivateBinder> {
        Arc::new(VPrivateBinder::skip_sources(self, tags))
    }

    fn as_extended_private(&self) -> Option<VPrivateBinder> {
        Some(self.clone())
    }
}

impl ExtendedBinder for VPrivateBinder {}

impl ExtendedPrivateBinder for VPrivateBinder {}

impl fmt::Debug for VPrivateBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VPrivateBinder").field(&self.binder).finish()
    }
}
