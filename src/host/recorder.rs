//! Element-recording binder
//!
//! Every [`RecordingBinder`] copy made by `with_source` / `skip_sources` /
//! `install` shares one [`Environment`]; only attribution state differs.
//!
//! ```text
//! RecordingBinder { source, skipped, modules } ──▶ Arc<Environment>
//!        │                                           ├─ elements (Mutex<Vec<Element>>)
//!        └─ new_private_binder() ──▶ child ───────▶  └─ installed singleton modules
//! ```

use super::element::{
    BindingElement, Element, ExposureElement, LookupSlot, PrivateElements, ProviderLookupElement,
    ScopeBindingElement,
};
use crate::binder::{
    Binder, BinderId, PrivateBinder, RawBindingBuilder, RawExposureBuilder, Target,
};
use crate::error::{ConfigError, ProvisionError};
use crate::key::{Qualifier, RawKey};
use crate::module::Module;
use crate::provider::RawProvider;
use crate::scope::{Scope, ScopeTag, Scoping, Stage};
use crate::source::{CallSite, SkipList, Source, SourceTag};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe, Location};
use std::sync::Arc;

// ============================================================================
// ENVIRONMENT
// ============================================================================

/// Elements recorded for one binding environment
pub(crate) struct Environment {
    id: BinderId,
    stage: Stage,
    private: bool,
    elements: Mutex<Vec<Element>>,
    installed: Mutex<HashSet<TypeId>>,
}

impl Environment {
    fn new(stage: Stage, private: bool) -> Self {
        Self {
            id: BinderId::next(),
            stage,
            private,
            elements: Mutex::new(Vec::new()),
            installed: Mutex::new(HashSet::new()),
        }
    }

    pub(crate) fn id(&self) -> BinderId {
        self.id
    }

    pub(crate) fn stage(&self) -> Stage {
        self.stage
    }

    pub(crate) fn snapshot(&self) -> Vec<Element> {
        self.elements.lock().clone()
    }

    fn record(&self, element: Element) -> usize {
        let mut elements = self.elements.lock();
        elements.push(element);
        elements.len() - 1
    }
}

// ============================================================================
// RECORDING BINDER
// ============================================================================

/// Host binder that records elements for an injector
#[derive(Clone)]
pub struct RecordingBinder {
    environment: Arc<Environment>,
    source: Option<Source>,
    skipped: SkipList,
    modules: Arc<Vec<&'static str>>,
}

impl RecordingBinder {
    /// Root binder of a new configuration pass
    pub fn new(stage: Stage) -> Self {
        Self {
            environment: Arc::new(Environment::new(stage, false)),
            source: None,
            skipped: SkipList::new(),
            modules: Arc::new(Vec::new()),
        }
    }

    /// Snapshot of everything recorded so far
    pub fn elements(&self) -> Vec<Element> {
        self.environment.snapshot()
    }

    pub fn skipped_sources(&self) -> &SkipList {
        &self.skipped
    }

    pub(crate) fn environment(&self) -> &Arc<Environment> {
        &self.environment
    }

    fn attribute(&self, site: CallSite) -> Source {
        Source::attribute(self.source.as_ref(), site, &self.skipped, &self.modules)
    }

    /// Copy attributing to `module` while it configures
    fn entering(&self, module: &'static str) -> Self {
        let mut modules = self.modules.as_ref().clone();
        modules.push(module);
        Self {
            modules: Arc::new(modules),
            ..self.clone()
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Binder for RecordingBinder {
    fn id(&self) -> BinderId {
        self.environment.id
    }

    fn bind_raw(&self, key: RawKey, site: CallSite) -> Box<dyn RawBindingBuilder> {
        let source = self.attribute(site);
        tracing::trace!(key = %key, source = %source, "recording binding");
        let index = self.environment.record(Element::Binding(BindingElement {
            key: key.clone(),
            target: Target::Untargetted,
            scoping: Scoping::Unscoped,
            source,
            annotated: false,
        }));
        Box::new(RecordedBinding {
            environment: Arc::clone(&self.environment),
            index,
            key,
        })
    }

    fn bind_scope_raw(&self, tag: ScopeTag, scope: Arc<dyn Scope>, site: CallSite) {
        let source = self.attribute(site);
        self.environment
            .record(Element::ScopeBinding(ScopeBindingElement { tag, scope, source }));
    }

    fn install(&self, module: &mut dyn Module) {
        let name = module.name();
        if let Some(identity) = module.dedup_identity() {
            if !self.environment.installed.lock().insert(identity) {
                tracing::debug!(module = name, binder = %self.id(), "module already installed");
                return;
            }
        }
        tracing::debug!(module = name, binder = %self.id(), "installing module");
        let binder = self.entering(name);
        let result = panic::catch_unwind(AssertUnwindSafe(|| module.configure(&binder)));
        if let Err(payload) = result {
            let message = format!("{} panicked while configuring: {}", name, panic_message(&*payload));
            self.add_error_raw(
                ConfigError::Custom {
                    message,
                    at: Source::Module(name),
                },
                Location::caller(),
            );
        }
    }

    fn current_stage(&self) -> Stage {
        self.environment.stage
    }

    fn add_error_raw(&self, error: ConfigError, site: CallSite) {
        let error = match error.at() {
            Source::Unknown => error.attributed(self.attribute(site)),
            _ => error,
        };
        tracing::warn!(source = %error.at(), "{}", error);
        self.environment.record(Element::Error(error));
    }

    fn get_provider_raw(&self, key: RawKey, site: CallSite) -> RawProvider {
        let slot: LookupSlot = Arc::new(OnceCell::new());
        self.environment
            .record(Element::ProviderLookup(ProviderLookupElement {
                key: key.clone(),
                source: self.attribute(site),
                slot: Arc::clone(&slot),
            }));
        let lookup = key.clone();
        RawProvider::new(key, move || {
            let resolver = slot
                .get()
                .ok_or_else(|| ProvisionError::NotInitialized { key: lookup.clone() })?
                .upgrade()
                .ok_or_else(|| ProvisionError::InjectorDropped { key: lookup.clone() })?;
            resolver.resolve(&lookup)
        })
    }

    fn with_source(&self, source: Source) -> Arc<dyn Binder> {
        Arc::new(Self {
            source: Some(source),
            ..self.clone()
        })
    }

    fn skip_sources(&self, tags: &[SourceTag]) -> Arc<dyn Binder> {
        Arc::new(Self {
            skipped: self.skipped.extended(tags),
            ..self.clone()
        })
    }

    fn new_private_binder(&self) -> Arc<dyn PrivateBinder> {
        let environment = Arc::new(Environment::new(self.environment.stage, true));
        tracing::debug!(parent = %self.id(), child = %environment.id, "opening private environment");
        self.environment
            .record(Element::PrivateEnvironment(PrivateElements {
                environment: Arc::clone(&environment),
            }));
        Arc::new(Self {
            environment,
            ..self.clone()
        })
    }
}

impl PrivateBinder for RecordingBinder {
    fn expose_raw(&self, key: RawKey, site: CallSite) -> Box<dyn RawExposureBuilder> {
        let source = self.attribute(site);
        if !self.environment.private {
            self.add_error_raw(
                ConfigError::Custom {
                    message: format!(
                        "Cannot expose {} on a standard binder. Exposed bindings are only applicable to private binders.",
                        key
                    ),
                    at: source.clone(),
                },
                site,
            );
        }
        let index = self.environment.record(Element::Exposure(ExposureElement {
            key: key.clone(),
            source,
            annotated: false,
        }));
        Box::new(RecordedExposure {
            environment: Arc::clone(&self.environment),
            index,
            key,
        })
    }

    fn private_with_source(&self, source: Source) -> Arc<dyn PrivateBinder> {
        Arc::new(Self {
            source: Some(source),
            ..self.clone()
        })
    }

    fn private_skip_sources(&self, tags: &[SourceTag]) -> Arc<dyn PrivateBinder> {
        Arc::new(Self {
            skipped: self.skipped.extended(tags),
            ..self.clone()
        })
    }
}

// ============================================================================
// RECORDED BUILDERS
// ============================================================================

/// Mutates one recorded binding in place
struct RecordedBinding {
    environment: Arc<Environment>,
    index: usize,
    key: RawKey,
}

impl RecordedBinding {
    /// Apply `change`; a returned message is recorded as an error at the binding's source
    fn update(&self, change: impl FnOnce(&mut BindingElement) -> Option<&'static str>) {
        let mut elements = self.environment.elements.lock();
        let error = match elements.get_mut(self.index) {
            Some(Element::Binding(binding)) => change(&mut *binding).map(|message| ConfigError::Custom {
                message: message.to_string(),
                at: binding.source.clone(),
            }),
            _ => None,
        };
        if let Some(error) = error {
            tracing::warn!(source = %error.at(), "{}", error);
            elements.push(Element::Error(error));
        }
    }
}

impl RawBindingBuilder for RecordedBinding {
    fn key(&self) -> RawKey {
        self.key.clone()
    }

    fn annotated_with(&mut self, qualifier: Qualifier) {
        let mut key = None;
        self.update(|binding| {
            if binding.annotated {
                return Some("More than one annotation is specified for this binding.");
            }
            binding.key = binding.key.clone().with_qualifier(Some(qualifier));
            binding.annotated = true;
            key = Some(binding.key.clone());
            None
        });
        if let Some(key) = key {
            self.key = key;
        }
    }

    fn to_target(&mut self, target: Target) {
        self.update(|binding| {
            if !binding.target.is_untargetted() {
                return Some("Implementation is set more than once.");
            }
            binding.target = target;
            None
        });
    }

    fn in_scoping(&mut self, scoping: Scoping) {
        self.update(|binding| {
            if !binding.scoping.is_unscoped() {
                return Some("Scope is set more than once.");
            }
            binding.scoping = scoping;
            None
        });
    }
}

/// Mutates one recorded exposure in place
struct RecordedExposure {
    environment: Arc<Environment>,
    index: usize,
    key: RawKey,
}

impl RawExposureBuilder for RecordedExposure {
    fn key(&self) -> RawKey {
        self.key.clone()
    }

    fn annotated_with(&mut self, qualifier: Qualifier) {
        let mut elements = self.environment.elements.lock();
        let error = match elements.get_mut(self.index) {
            Some(Element::Exposure(exposure)) if exposure.annotated => Some(ConfigError::Custom {
                message: "More than one annotation is specified for this exposure.".to_string(),
                at: exposure.source.clone(),
            }),
            Some(Element::Exposure(exposure)) => {
                exposure.key = exposure.key.clone().with_qualifier(Some(qualifier));
                exposure.annotated = true;
                self.key = exposure.key.clone();
                None
            }
            _ => None,
        };
        if let Some(error) = error {
            elements.push(Element::Error(error));
        }
    }
}
