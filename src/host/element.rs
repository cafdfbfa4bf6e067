//! Recorded configuration elements
//!
//! A configuration pass turns modules into a flat list of [`Element`]s, with
//! one nested list per private environment. [`Elements`] runs a pass without
//! creating an injector, for inspection and tooling.

use super::recorder::{Environment, RecordingBinder};
use crate::binder::{Binder, Target};
use crate::error::ConfigError;
use crate::key::RawKey;
use crate::module::Module;
use crate::provider::Resolver;
use crate::scope::{Scope, ScopeTag, Scoping, Stage};
use crate::source::Source;
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Weak};

/// Filled with the owning injector once it exists
pub(crate) type LookupSlot = Arc<OnceCell<Weak<dyn Resolver + Send + Sync>>>;

// ============================================================================
// ELEMENTS
// ============================================================================

/// A binding declaration
#[derive(Debug, Clone)]
pub struct BindingElement {
    pub key: RawKey,
    pub target: Target,
    pub scoping: Scoping,
    pub source: Source,
    pub(crate) annotated: bool,
}

/// A key re-published from a private environment
#[derive(Debug, Clone)]
pub struct ExposureElement {
    pub key: RawKey,
    pub source: Source,
    pub(crate) annotated: bool,
}

/// A scope registered for a marker
#[derive(Debug, Clone)]
pub struct ScopeBindingElement {
    pub tag: ScopeTag,
    pub scope: Arc<dyn Scope>,
    pub source: Source,
}

/// A provider handed out during configuration
#[derive(Clone)]
pub struct ProviderLookupElement {
    pub key: RawKey,
    pub source: Source,
    pub(crate) slot: LookupSlot,
}

impl fmt::Debug for ProviderLookupElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderLookupElement")
            .field("key", &self.key)
            .field("source", &self.source)
            .field("initialized", &self.slot.get().is_some())
            .finish()
    }
}

/// The elements of one private environment
#[derive(Clone)]
pub struct PrivateElements {
    pub(crate) environment: Arc<Environment>,
}

impl PrivateElements {
    pub fn elements(&self) -> Vec<Element> {
        self.environment.snapshot()
    }

    /// Keys this environment exposes to its parent
    pub fn exposed_keys(&self) -> Vec<RawKey> {
        self.elements()
            .into_iter()
            .filter_map(|element| match element {
                Element::Exposure(exposure) => Some(exposure.key),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Debug for PrivateElements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateElements")
            .field("id", &self.environment.id())
            .finish()
    }
}

/// One recorded configuration instruction
#[derive(Debug, Clone)]
pub enum Element {
    Binding(BindingElement),
    Exposure(ExposureElement),
    ScopeBinding(ScopeBindingElement),
    ProviderLookup(ProviderLookupElement),
    Error(ConfigError),
    PrivateEnvironment(PrivateElements),
}

impl Element {
    pub fn source(&self) -> Option<&Source> {
        match self {
            Element::Binding(binding) => Some(&binding.source),
            Element::Exposure(exposure) => Some(&exposure.source),
            Element::ScopeBinding(scope) => Some(&scope.source),
            Element::ProviderLookup(lookup) => Some(&lookup.source),
            Element::Error(error) => Some(error.at()),
            Element::PrivateEnvironment(_) => None,
        }
    }

    pub fn summary(&self) -> ElementSummary {
        let source = self.source().map(ToString::to_string).unwrap_or_default();
        match self {
            Element::Binding(binding) => ElementSummary::Binding {
                key: binding.key.to_string(),
                target: format!("{:?}", binding.target),
                scoping: binding.scoping.to_string(),
                source,
            },
            Element::Exposure(exposure) => ElementSummary::Exposure {
                key: exposure.key.to_string(),
                source,
            },
            Element::ScopeBinding(scope) => ElementSummary::ScopeBinding {
                scope: scope.tag.to_string(),
                implementation: format!("{:?}", scope.scope),
                source,
            },
            Element::ProviderLookup(lookup) => ElementSummary::ProviderLookup {
                key: lookup.key.to_string(),
                source,
            },
            Element::Error(error) => ElementSummary::Error {
                message: error.to_string(),
                source,
            },
            Element::PrivateEnvironment(private) => ElementSummary::PrivateEnvironment {
                elements: private.elements().iter().map(Element::summary).collect(),
            },
        }
    }
}

// ============================================================================
// SUMMARIES
// ============================================================================

/// Serializable view of an [`Element`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementSummary {
    Binding {
        key: String,
        target: String,
        scoping: String,
        source: String,
    },
    Exposure {
        key: String,
        source: String,
    },
    ScopeBinding {
        scope: String,
        implementation: String,
        source: String,
    },
    ProviderLookup {
        key: String,
        source: String,
    },
    Error {
        message: String,
        source: String,
    },
    PrivateEnvironment {
        elements: Vec<ElementSummary>,
    },
}

// ============================================================================
// INSPECTION
// ============================================================================

/// Configuration passes without an injector
pub struct Elements;

impl Elements {
    /// Elements recorded by `modules` in the default stage
    pub fn get_elements<I>(modules: I) -> Vec<Element>
    where
        I: IntoIterator<Item = Box<dyn Module>>,
    {
        Self::get_elements_in(Stage::default(), modules)
    }

    /// Elements recorded by `modules` in `stage`
    pub fn get_elements_in<I>(stage: Stage, modules: I) -> Vec<Element>
    where
        I: IntoIterator<Item = Box<dyn Module>>,
    {
        let binder = RecordingBinder::new(stage);
        for mut module in modules {
            binder.install(module.as_mut());
        }
        binder.elements()
    }

    pub fn summarize(elements: &[Element]) -> Vec<ElementSummary> {
        elements.iter().map(Element::summary).collect()
    }

    /// Pretty JSON rendering of the summaries
    pub fn to_json(elements: &[Element]) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&Self::summarize(elements))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::BinderExt;
    use crate::module::AbstractModule;

    #[test]
    fn test_summary_json_shape() {
        let module = AbstractModule::from_fn(|binder| {
            binder.bind::<u32>().named("port").to_instance(8080);
            let private = binder.new_private_binder();
            private.bind::<String>().to_instance("hidden".to_string());
        });
        let elements = Elements::get_elements([Box::new(module) as Box<dyn Module>]);
        let json = Elements::to_json(&elements).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value[0]["kind"], "binding");
        assert_eq!(value[0]["key"], "u32 @Named(\"port\")");
        assert_eq!(value[1]["kind"], "private_environment");
        assert_eq!(value[1]["elements"][0]["kind"], "binding");
    }

    #[test]
    fn test_errors_are_elements() {
        let module = AbstractModule::from_fn(|binder| {
            binder.add_error("bad configuration");
        });
        let elements = Elements::get_elements([Box::new(module) as Box<dyn Module>]);
        assert!(matches!(&elements[0], Element::Error(ConfigError::Custom { message, .. }) if message == "bad configuration"));
    }
}
