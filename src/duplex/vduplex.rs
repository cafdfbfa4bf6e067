use super::DuplexBinder;
use crate::binder::{Binder, BinderId, PrivateBinder, RawBindingBuilder, RawExposureBuilder};
use crate::error::ConfigError;
use crate::key::RawKey;
use crate::module::Module;
use crate::provider::RawProvider;
use crate::scope::{Scope, ScopeTag, Stage};
use crate::source::{CallSite, Source, SourceTag};
use crate::vbinder::{ExtendedBinder, ExtendedPrivateBinder, VBinder, VPrivateBinder};
use std::fmt;
use std::sync::Arc;

pub(crate) const SOURCE: SourceTag = crate::source_tag!();

/// Extended duplex binder handed to [`DuplexModule`](super::DuplexModule) bodies
///
/// Forwards everything to its [`DuplexBinder`], so `install` keeps
/// propagating the context, and adds the extended private-binder operations.
#[derive(Clone)]
pub struct VDuplexBinder {
    binder: DuplexBinder,
}

impl VDuplexBinder {
    pub fn of(binder: &DuplexBinder) -> VDuplexBinder {
        VDuplexBinder {
            binder: binder.skip_sources(&[SOURCE]),
        }
    }

    /// The forwarded duplex context
    pub fn duplex(&self) -> &DuplexBinder {
        &self.binder
    }

    /// The enclosing environment's binder
    pub fn public_binder(&self) -> &Arc<dyn Binder> {
        self.binder.public_binder()
    }

    /// The enclosing environment's binder, extended
    pub fn public(&self) -> VBinder {
        VBinder::of(&**self.binder.public_binder())
    }

    pub fn private_binder(&self) -> &Arc<dyn PrivateBinder> {
        self.binder.private_binder()
    }

    pub fn with_source(&self, source: Source) -> VDuplexBinder {
        VDuplexBinder {
            binder: self.binder.with_source(source),
        }
    }

    pub fn skip_sources(&self, tags: &[SourceTag]) -> VDuplexBinder {
        VDuplexBinder {
            binder: self.binder.skip_sources(tags),
        }
    }

    pub fn install(&self, module: &mut dyn Module) {
        self.binder.install(module)
    }

    pub fn new_private_binder(&self) -> VPrivateBinder {
        VPrivateBinder::of(&*self.binder.new_private_binder())
    }
}

impl Binder for VDuplexBinder {
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
        Arc::new(VDuplexBinder::with_source(self, source))
    }

    fn skip_sources(&self, tags: &[SourceTag]) -> Arc<dyn Binder> {
        Arc::new(VDuplexBinder::skip_sources(self, tags))
    }

    fn new_private_binder(&self) -> Arc<dyn PrivateBinder> {
        Arc::new(VDuplexBinder::new_private_binder(self))
    }

    fn as_extended(&self) -> Option<VBinder> {
        Some(VBinder::wrap(Arc::new(self.clone())))
    }

    fn as_duplex(&self) -> Option<DuplexBinder> {
        Some(self.binder.clone())
    }
}

impl PrivateBinder for VDuplexBinder {
    fn expose_raw(&self, key: RawKey, site: CallSite) -> Box<dyn RawExposureBuilder> {
        self.binder.expose_raw(key, site)
    }

    fn private_with_source(&self, source: Source) -> Arc<dyn PrivateBinder> {
        Arc::new(VDuplexBinder::with_source(self, source))
    }

    fn private_skip_sources(&self, tags: &[SourceTag]) -> Arc<dyn PrivateBinder> {
        Arc::new(VDuplexBinder::skip_sources(self, tags))
    }

    fn as_extended_private(&self) -> Option<VPrivateBinder> {
        Some(VPrivateBinder::wrap(Arc::new(self.clone())))
    }
}

impl ExtendedBinder for VDuplexBinder {}

impl ExtendedPrivateBinder for VDuplexBinder {}

impl fmt::Debug for VDuplexBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VDuplexBinder").field(&self.binder).finish()
    }
}
