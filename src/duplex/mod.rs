//! # Duplex binders
//!
//! A [`DuplexBinder`] gives a module two binders at once: a private one for
//! an isolated environment, and the public one it was created from.
//!
//! ```text
//!   enclosing environment ◀── public_binder()
//!          │
//!          └── private environment ◀── every other operation
//!                     ▲
//!                     └── expose / bind_and_expose
//! ```
//!
//! ## Propagation
//!
//! Hosts configure a module with a single binder. To let a nested
//! [`DuplexModule`] recover the whole context, [`DuplexBinder::install`]
//! publishes itself in a thread-local slot for the duration of the call:
//!
//! ```text
//! duplex.install(m)
//!   ├─ slot: previous → duplex        (ActiveScope::enter)
//!   ├─ private.install(m)
//!   │    └─ m.configure(private')     → DuplexBinder::active_binder(private')
//!   │                                   matches slot by BinderId
//!   └─ slot: duplex → previous        (ActiveScope::drop, also on unwind)
//! ```

mod module;
mod vduplex;

pub use module::{ConfigureDuplex, DuplexModule};
pub use vduplex::VDuplexBinder;

use crate::binder::{Binder, BinderId, PrivateBinder, RawBindingBuilder, RawExposureBuilder};
use crate::error::ConfigError;
use crate::key::RawKey;
use crate::module::Module;
use crate::provider::RawProvider;
use crate::scope::{Scope, ScopeTag, Stage};
use crate::source::{CallSite, Source, SourceTag};
use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

pub(crate) const SOURCE: SourceTag = crate::source_tag!();

/// Files skipped on both sides of every duplex context
pub(crate) const SKIPPED_SOURCES: &[SourceTag] = &[
    SOURCE,
    module::SOURCE,
    vduplex::SOURCE,
    crate::vbinder::SOURCE,
    crate::module::SOURCE,
];

// ============================================================================
// AMBIENT SLOT
// ============================================================================

thread_local! {
    static ACTIVE_BINDER: RefCell<Option<DuplexBinder>> = const { RefCell::new(None) };
}

/// Publishes a duplex binder for one `install` call
struct ActiveScope {
    previous: Option<DuplexBinder>,
}

impl ActiveScope {
    fn enter(binder: DuplexBinder) -> Self {
        tracing::trace!(binder = %binder.id(), "entering duplex install");
        let previous = ACTIVE_BINDER.with(|slot| slot.replace(Some(binder)));
        Self { previous }
    }
}

impl Drop for ActiveScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        let _ = ACTIVE_BINDER.try_with(|slot| {
            if let Some(left) = slot.replace(previous) {
                tracing::trace!(binder = %left.id(), "leaving duplex install");
            }
        });
    }
}

// ============================================================================
// DUPLEX BINDER
// ============================================================================

struct Sides {
    public: Arc<dyn Binder>,
    private: Arc<dyn PrivateBinder>,
}

/// A private binder that also knows its enclosing public binder
///
/// Every [`Binder`] / [`PrivateBinder`] operation goes to the private side,
/// except `install`, which publishes the context for nested modules.
#[derive(Clone)]
pub struct DuplexBinder {
    sides: Arc<Sides>,
}

impl DuplexBinder {
    /// Duplex context over `binder`
    ///
    /// Returns `binder` itself when it already is a duplex context; otherwise
    /// opens a new private environment in it.
    pub fn create<B: Binder + ?Sized>(binder: &B) -> DuplexBinder {
        if let Some(duplex) = binder.as_duplex() {
            return duplex;
        }
        let private = binder.new_private_binder();
        let duplex = Self::from_parts(binder, &*private);
        tracing::debug!(public = %binder.id(), private = %private.id(), "created duplex binder");
        duplex
    }

    /// Pair two binders, applying the duplex skip list to both
    pub fn from_parts<B, P>(public: &B, private: &P) -> DuplexBinder
    where
        B: Binder + ?Sized,
        P: PrivateBinder + ?Sized,
    {
        // a duplex private side contributes its own private binder
        let private = match private.as_duplex() {
            Some(duplex) => duplex.private_binder().private_skip_sources(SKIPPED_SOURCES),
            None => private.private_skip_sources(SKIPPED_SOURCES),
        };
        DuplexBinder {
            sides: Arc::new(Sides {
                public: public.skip_sources(SKIPPED_SOURCES),
                private,
            }),
        }
    }

    /// The enclosing environment's binder
    pub fn public_binder(&self) -> &Arc<dyn Binder> {
        &self.sides.public
    }

    /// The private environment's binder
    pub fn private_binder(&self) -> &Arc<dyn PrivateBinder> {
        &self.sides.private
    }

    /// Install `module` into the private environment with this context active
    pub fn install(&self, module: &mut dyn Module) {
        let _active = ActiveScope::enter(self.clone());
        tracing::debug!(module = module.name(), binder = %self.id(), "installing duplex module");
        self.sides.private.install(module);
    }

    /// Duplex context of `binder`, if it has one
    ///
    /// `binder` answers for itself when it is a duplex context. Otherwise the
    /// context currently installing a module matches when its private side
    /// records into the same environment as `binder`.
    ///
    /// Matching is by environment identity ([`BinderId`]), not by reference:
    /// any copy or decorator of the private side counts.
    pub fn active_binder<B: Binder + ?Sized>(binder: &B) -> Option<DuplexBinder> {
        if let Some(duplex) = binder.as_duplex() {
            return Some(duplex);
        }
        let id = binder.id();
        ACTIVE_BINDER.with(|slot| {
            slot.borrow()
                .as_ref()
                .filter(|active| active.sides.private.id() == id)
                .cloned()
        })
    }

    /// The context currently installing a module on this thread
    pub fn current() -> Option<DuplexBinder> {
        ACTIVE_BINDER.with(|slot| slot.borrow().clone())
    }

    pub fn with_source(&self, source: Source) -> DuplexBinder {
        Self::from_parts(
            &*self.sides.public.with_source(source.clone()),
            &*self.sides.private.private_with_source(source),
        )
    }

    pub fn skip_sources(&self, tags: &[SourceTag]) -> DuplexBinder {
        Self::from_parts(
            &*self.sides.public.skip_sources(tags),
            &*self.sides.private.private_skip_sources(tags),
        )
    }

    pub fn ptr_eq(a: &DuplexBinder, b: &DuplexBinder) -> bool {
        Arc::ptr_eq(&a.sides, &b.sides)
    }
}

impl Binder for DuplexBinder {
    fn id(&self) -> BinderId {
        self.sides.private.id()
    }

    fn bind_raw(&self, key: RawKey, site: CallSite) -> Box<dyn RawBindingBuilder> {
        self.sides.private.bind_raw(key, site)
    }

    fn bind_scope_raw(&self, tag: ScopeTag, scope: Arc<dyn Scope>, site: CallSite) {
        self.sides.private.bind_scope_raw(tag, scope, site)
    }

    fn install(&self, module: &mut dyn Module) {
        DuplexBinder::install(self, module)
    }

    fn current_stage(&self) -> Stage {
        self.sides.private.current_stage()
    }

    fn add_error_raw(&self, error: ConfigError, site: CallSite) {
        self.sides.private.add_error_raw(error, site)
    }

    fn get_provider_raw(&self, key: RawKey, site: CallSite) -> RawProvider {
        self.sides.private.get_provider_raw(key, site)
    }

    fn with_source(&self, source: Source) -> Arc<dyn Binder> {
        Arc::new(DuplexBinder::with_source(self, source))
    }

    fn skip_sources(&self, tags: &[SourceTag]) -> Arc<dyn Binder> {
        Arc::new(DuplexBinder::skip_sources(self, tags))
    }

    fn new_private_binder(&self) -> Arc<dyn PrivateBinder> {
        self.sides.private.new_private_binder()
    }

    fn as_duplex(&self) -> Option<DuplexBinder> {
        Some(self.clone())
    }
}

impl PrivateBinder for DuplexBinder {
    fn expose_raw(&self, key: RawKey, site: CallSite) -> Box<dyn RawExposureBuilder> {
        self.sides.private.expose_raw(key, site)
    }

    fn private_with_source(&self, source: Source) -> Arc<dyn PrivateBinder> {
        Arc::new(DuplexBinder::with_source(self, source))
    }

    fn private_skip_sources(&self, tags: &[SourceTag]) -> Arc<dyn PrivateBinder> {
        Arc::new(DuplexBinder::skip_sources(self, tags))
    }
}

impl fmt::Debug for DuplexBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuplexBinder")
            .field("public", &self.sides.public)
            .field("private", &self.sides.private)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::RecordingBinder;
    use std::panic::{self, AssertUnwindSafe};

    fn duplex() -> DuplexBinder {
        DuplexBinder::create(&RecordingBinder::new(Stage::Development))
    }

    #[test]
    fn test_active_scope_restores_previous() {
        let (outer, inner) = (duplex(), duplex());
        {
            let _outer = ActiveScope::enter(outer.clone());
            {
                let _inner = ActiveScope::enter(inner.clone());
                assert!(DuplexBinder::ptr_eq(&DuplexBinder::current().unwrap(), &inner));
            }
            assert!(DuplexBinder::ptr_eq(&DuplexBinder::current().unwrap(), &outer));
        }
        assert!(DuplexBinder::current().is_none());
    }

    #[test]
    fn test_active_scope_restores_on_unwind() {
        let binder = duplex();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _active = ActiveScope::enter(binder.clone());
            panic!("configure failed");
        }));

        assert!(result.is_err());
        assert!(DuplexBinder::current().is_none());
    }

    #[test]
    fn test_both_sides_skip_library_sources() {
        use crate::host::Element;
        use std::panic::Location;

        let root = RecordingBinder::new(Stage::Development);
        let binder = DuplexBinder::create(&root);
        // call sites in this file are library code on both sides
        binder.bind_raw(RawKey::of::<u8>(), Location::caller());
        binder.public_binder().bind_raw(RawKey::of::<u16>(), Location::caller());

        let elements = root.elements();
        let private = match &elements[0] {
            Element::PrivateEnvironment(private) => private.elements(),
            other => panic!("unexpected element {:?}", other),
        };
        for element in [&private[0], &elements[1]] {
            assert_eq!(element.source(), Some(&Source::Unknown));
        }
        assert_ne!(binder.public_binder().id(), binder.private_binder().id());
        assert_eq!(binder.id(), binder.private_binder().id());
    }

    #[test]
    fn test_from_parts_unwraps_duplex_private_side() {
        let root = RecordingBinder::new(Stage::Development);
        let first = DuplexBinder::create(&root);
        let paired = DuplexBinder::from_parts(&root, &first);
        assert_eq!(paired.private_binder().type_name(), first.private_binder().type_name());
        assert_eq!(paired.id(), first.id());
    }
}
