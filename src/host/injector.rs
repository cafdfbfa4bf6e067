//! # Injector
//!
//! Turns recorded elements into a resolution graph.
//!
//! ## Creation
//!
//! ```text
//! root Environment ──▶ InjectorState (bindings, scopes)
//!                        ├─ child InjectorState per private environment
//!                        │     parent: Weak<InjectorState>
//!                        └─ exposed keys: parent binding ──▶ child binding
//! ```
//!
//! 1. **Build**: every environment gets a state; scope tags are resolved,
//!    set declarations merged, duplicates and untargetted bindings reported.
//! 2. **Verify**: linked keys and provider lookups must resolve somewhere
//!    up the parent chain.
//! 3. **Prime**: eager bindings are resolved once (see [`Stage`]).
//!
//! Every problem found is collected into one [`CreationError`].
//!
//! ## Resolution
//!
//! Lookups fall back to the parent. A thread-local stack of keys being
//! resolved turns dependency cycles into [`ProvisionError::Cycle`].

use super::builder::InjectorBuilder;
use super::element::{
    BindingElement, Element, ExposureElement, PrivateElements, ScopeBindingElement,
};
use super::recorder::{Environment, RecordingBinder};
use crate::binder::Target;
use crate::error::{ConfigError, CreationError, ProvisionError};
use crate::key::{Key, Qualifier, RawKey};
use crate::provider::{downcast, Instance, Provider, RawProvider, Resolver};
use crate::scope::{singleton, Scope, ScopeTag, Scoping, SingletonScope, Singleton, Stage};
use crate::source::Source;
use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

// ============================================================================
// RESOLUTION STACK
// ============================================================================

thread_local! {
    static RESOLVING: RefCell<Vec<RawKey>> = const { RefCell::new(Vec::new()) };
}

/// Pops its key when the resolution ends
struct Resolving;

impl Resolving {
    fn enter(key: &RawKey) -> Result<Self, ProvisionError> {
        RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(key) {
                let path = stack
                    .iter()
                    .skip_while(|entry| *entry != key)
                    .chain(std::iter::once(key))
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" -> ");
                return Err(ProvisionError::Cycle { path });
            }
            stack.push(key.clone());
            Ok(Resolving)
        })
    }
}

impl Drop for Resolving {
    fn drop(&mut self) {
        let _ = RESOLVING.try_with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

// ============================================================================
// SCOPES
// ============================================================================

/// Scopes visible in one environment
#[derive(Clone)]
struct ScopeRegistry {
    scopes: HashMap<ScopeTag, (Arc<dyn Scope>, Source)>,
}

impl ScopeRegistry {
    fn with_builtins() -> Self {
        let mut scopes = HashMap::new();
        scopes.insert(ScopeTag::of::<Singleton>(), (singleton(), Source::Unknown));
        Self { scopes }
    }

    fn register(&mut self, binding: ScopeBindingElement, errors: &mut Vec<ConfigError>) {
        if let Some((existing, first)) = self.scopes.get(&binding.tag) {
            if !Arc::ptr_eq(existing, &binding.scope) {
                errors.push(ConfigError::Custom {
                    message: format!(
                        "Scope {:?} is already bound to {} at {}. Cannot bind {:?}.",
                        existing, binding.tag, first, binding.scope
                    ),
                    at: binding.source,
                });
            }
            return;
        }
        self.scopes.insert(binding.tag, (binding.scope, binding.source));
    }

    fn get(&self, tag: &ScopeTag) -> Option<&Arc<dyn Scope>> {
        self.scopes.get(tag).map(|(scope, _)| scope)
    }
}

// ============================================================================
// STATE
// ============================================================================

struct Binding {
    source: Source,
    provider: RawProvider,
    eager: bool,
    set: bool,
}

enum Check {
    Linked { key: RawKey, at: Source },
    Lookup { key: RawKey, at: Source },
}

/// Set element keys per (element type, set qualifier), in declaration order
type SetIndex = HashMap<(TypeId, Option<Qualifier>), Vec<(u64, RawKey)>>;

pub(crate) struct InjectorState {
    stage: Stage,
    parent: Option<Weak<InjectorState>>,
    bindings: HashMap<RawKey, Binding>,
    children: Vec<Arc<InjectorState>>,
    checks: Vec<Check>,
}

fn upgrade(state: &Weak<InjectorState>, key: &RawKey) -> Result<Arc<InjectorState>, ProvisionError> {
    state
        .upgrade()
        .ok_or_else(|| ProvisionError::InjectorDropped { key: key.clone() })
}

impl InjectorState {
    fn build(
        environment: &Environment,
        parent: Option<Weak<InjectorState>>,
        inherited: &ScopeRegistry,
        visible: &HashMap<RawKey, Source>,
        errors: &mut Vec<ConfigError>,
    ) -> Arc<InjectorState> {
        let stage = environment.stage();
        let elements = environment.snapshot();

        Arc::new_cyclic(|this: &Weak<InjectorState>| {
            let mut scopes = inherited.clone();
            let mut declared: Vec<BindingElement> = Vec::new();
            let mut privates: Vec<PrivateElements> = Vec::new();
            let mut checks = Vec::new();

            for element in elements {
                match element {
                    Element::ScopeBinding(binding) => scopes.register(binding, errors),
                    Element::Binding(binding) => declared.push(binding),
                    Element::Error(error) => errors.push(error),
                    Element::PrivateEnvironment(private) => privates.push(private),
                    Element::ProviderLookup(lookup) => {
                        let resolver: Weak<dyn Resolver + Send + Sync> = this.clone();
                        let _ = lookup.slot.set(resolver);
                        checks.push(Check::Lookup {
                            key: lookup.key,
                            at: lookup.source,
                        });
                    }
                    // handled by the parent when it builds this environment
                    Element::Exposure(_) => {}
                }
            }

            let mut sets: SetIndex = HashMap::new();
            for binding in &declared {
                if let Some(Qualifier::Element { set, ordinal }) = binding.key.qualifier() {
                    sets.entry((binding.key.type_id(), set.as_deref().cloned()))
                        .or_default()
                        .push((*ordinal, binding.key.clone()));
                }
            }
            for elements in sets.values_mut() {
                elements.sort_by_key(|(ordinal, _)| *ordinal);
            }

            let mut bindings: HashMap<RawKey, Binding> = HashMap::new();
            for binding in declared {
                if let Some(first) = visible.get(&binding.key) {
                    errors.push(ConfigError::DuplicateBinding {
                        key: binding.key,
                        first: first.clone(),
                        at: binding.source,
                    });
                    continue;
                }
                if let Some(existing) = bindings.get(&binding.key) {
                    if existing.set && matches!(binding.target, Target::Set(_)) {
                        continue;
                    }
                    errors.push(ConfigError::DuplicateBinding {
                        key: binding.key,
                        first: existing.source.clone(),
                        at: binding.source,
                    });
                    continue;
                }
                let key = binding.key.clone();
                match Self::build_binding(this, binding, &scopes, &sets, stage, &mut checks) {
                    Ok(built) => {
                        bindings.insert(key, built);
                    }
                    Err(error) => errors.push(error),
                }
            }

            let mut children = Vec::with_capacity(privates.len());
            for private in privates {
                let mut visible_here = visible.clone();
                visible_here.extend(bindings.iter().map(|(key, b)| (key.clone(), b.source.clone())));
                let child = Self::build(
                    &private.environment,
                    Some(this.clone()),
                    &scopes,
                    &visible_here,
                    errors,
                );
                for exposure in exposures(&private) {
                    Self::expose(&child, exposure, &mut bindings, errors);
                }
                children.push(child);
            }

            InjectorState {
                stage,
                parent,
                bindings,
                children,
                checks,
            }
        })
    }

    fn build_binding(
        this: &Weak<InjectorState>,
        binding: BindingElement,
        scopes: &ScopeRegistry,
        sets: &SetIndex,
        stage: Stage,
        checks: &mut Vec<Check>,
    ) -> Result<Binding, ConfigError> {
        let BindingElement {
            key,
            target,
            mut scoping,
            source,
            ..
        } = binding;
        let is_set = matches!(target, Target::Set(_));

        let unscoped = match target {
            Target::Untargetted => {
                return Err(ConfigError::MissingImplementation { key, at: source });
            }
            Target::Instance(instance) => {
                RawProvider::new(key.clone(), move || Ok(Arc::clone(&instance)))
            }
            Target::Provider(provider) => RawProvider::new(key.clone(), move || provider.get()),
            Target::Factory(factory) => {
                let (this, key) = (this.clone(), key.clone());
                RawProvider::new(key.clone(), move || factory(&*upgrade(&this, &key)?))
            }
            Target::Constructor { factory, scope, .. } => {
                // the implementation's own marker applies to unscoped bindings
                if let (true, Some(tag)) = (scoping.is_unscoped(), scope) {
                    scoping = Scoping::Tag(tag);
                }
                let (this, key) = (this.clone(), key.clone());
                RawProvider::new(key.clone(), move || factory(&*upgrade(&this, &key)?))
            }
            Target::Linked { key: linked, convert } => {
                checks.push(Check::Linked {
                    key: linked.clone(),
                    at: source.clone(),
                });
                let this = this.clone();
                RawProvider::new(key.clone(), move || {
                    let instance = upgrade(&this, &linked)?.resolve(&linked)?;
                    match &convert {
                        Some(convert) => convert(instance),
                        None => Ok(instance),
                    }
                })
            }
            Target::Set(assembler) => {
                let elements: Vec<RawKey> = sets
                    .get(&(assembler.element_type, assembler.qualifier.clone()))
                    .map(|elements| elements.iter().map(|(_, key)| key.clone()).collect())
                    .unwrap_or_default();
                let (this, set_key) = (this.clone(), key.clone());
                RawProvider::new(key.clone(), move || {
                    let state = upgrade(&this, &set_key)?;
                    let instances = elements
                        .iter()
                        .map(|element| state.resolve(element))
                        .collect::<Result<Vec<Instance>, _>>()?;
                    (assembler.assemble)(instances)
                })
            }
        };

        let (provider, eager) = match &scoping {
            Scoping::Unscoped => (unscoped, false),
            Scoping::Tag(tag) => match scopes.get(tag) {
                Some(scope) => (scope.scope(&key, unscoped), scope.eager_in(stage)),
                None => {
                    return Err(ConfigError::UnknownScope {
                        scope: tag.name(),
                        key,
                        at: source,
                    });
                }
            },
            Scoping::Instance(scope) => (scope.scope(&key, unscoped), scope.eager_in(stage)),
            Scoping::EagerSingleton => (SingletonScope::cache(&key, unscoped), stage != Stage::Tool),
        };

        Ok(Binding {
            source,
            provider,
            eager,
            set: is_set,
        })
    }

    /// Publish `exposure` from `child` in the parent's `bindings`
    fn expose(
        child: &Arc<InjectorState>,
        exposure: ExposureElement,
        bindings: &mut HashMap<RawKey, Binding>,
        errors: &mut Vec<ConfigError>,
    ) {
        if !child.bindings.contains_key(&exposure.key) {
            errors.push(ConfigError::UnboundExposure {
                key: exposure.key,
                at: exposure.source,
            });
            return;
        }
        if let Some(existing) = bindings.get(&exposure.key) {
            errors.push(ConfigError::DuplicateBinding {
                key: exposure.key,
                first: existing.source.clone(),
                at: exposure.source,
            });
            return;
        }
        let (owner, key) = (Arc::clone(child), exposure.key.clone());
        let provider = RawProvider::new(exposure.key.clone(), move || owner.provide_local(&key));
        bindings.insert(
            exposure.key,
            Binding {
                source: exposure.source,
                provider,
                eager: false,
                set: false,
            },
        );
    }

    /// Report linked keys and provider lookups that resolve nowhere
    fn verify(&self, errors: &mut Vec<ConfigError>) {
        for check in &self.checks {
            match check {
                Check::Linked { key, at } if self.find_provider(key).is_err() => {
                    errors.push(ConfigError::MissingImplementation {
                        key: key.clone(),
                        at: at.clone(),
                    });
                }
                Check::Lookup { key, at } if self.find_provider(key).is_err() => {
                    errors.push(ConfigError::UnresolvedLookup {
                        key: key.clone(),
                        at: at.clone(),
                    });
                }
                _ => {}
            }
        }
        for child in &self.children {
            child.verify(errors);
        }
    }

    /// Resolve every eager binding once
    fn prime(&self, errors: &mut Vec<ConfigError>) {
        for (key, binding) in self.bindings.iter().filter(|(_, binding)| binding.eager) {
            tracing::debug!(key = %key, stage = %self.stage, "priming eager binding");
            if let Err(error) = self.resolve(key) {
                errors.push(ConfigError::Custom {
                    message: format!("Error priming {}: {}", key, error),
                    at: binding.source.clone(),
                });
            }
        }
        for child in &self.children {
            child.prime(errors);
        }
    }

    fn find_provider(&self, key: &RawKey) -> Result<RawProvider, ProvisionError> {
        if let Some(binding) = self.bindings.get(key) {
            return Ok(binding.provider.clone());
        }
        match &self.parent {
            Some(parent) => upgrade(parent, key)?.find_provider(key),
            None => Err(ProvisionError::NotBound { key: key.clone() }),
        }
    }

    /// Run this environment's own binding for `key`, bypassing the cycle guard
    fn provide_local(&self, key: &RawKey) -> Result<Instance, ProvisionError> {
        match self.bindings.get(key) {
            Some(binding) => binding.provider.get(),
            None => Err(ProvisionError::NotBound { key: key.clone() }),
        }
    }
}

fn exposures(private: &PrivateElements) -> Vec<ExposureElement> {
    private
        .elements()
        .into_iter()
        .filter_map(|element| match element {
            Element::Exposure(exposure) => Some(exposure),
            _ => None,
        })
        .collect()
}

impl Resolver for InjectorState {
    fn resolve(&self, key: &RawKey) -> Result<Instance, ProvisionError> {
        let provider = self.find_provider(key)?;
        let _resolving = Resolving::enter(key)?;
        provider.get()
    }

    fn provider_for(&self, key: &RawKey) -> Result<RawProvider, ProvisionError> {
        let provider = self.find_provider(key)?;
        let guarded = key.clone();
        Ok(RawProvider::new(key.clone(), move || {
            let _resolving = Resolving::enter(&guarded)?;
            provider.get()
        }))
    }
}

// ============================================================================
// INJECTOR
// ============================================================================

/// A created resolution graph
#[derive(Clone)]
pub struct Injector {
    state: Arc<InjectorState>,
}

impl Injector {
    pub fn builder() -> InjectorBuilder {
        InjectorBuilder::new()
    }

    /// Injector for everything `binder` recorded
    pub fn from_binder(binder: &RecordingBinder) -> Result<Injector, CreationError> {
        let environment = binder.environment();
        let mut errors = Vec::new();
        let state = InjectorState::build(
            environment,
            None,
            &ScopeRegistry::with_builtins(),
            &HashMap::new(),
            &mut errors,
        );
        state.verify(&mut errors);
        if errors.is_empty() {
            state.prime(&mut errors);
        }
        if !errors.is_empty() {
            tracing::debug!(errors = errors.len(), "injector creation failed");
            return Err(CreationError::new(errors));
        }
        tracing::debug!(
            stage = %environment.stage(),
            bindings = state.bindings.len(),
            children = state.children.len(),
            "created injector"
        );
        Ok(Injector { state })
    }

    pub fn stage(&self) -> Stage {
        self.state.stage
    }

    /// Whether `key` is bound here (private environments excluded)
    pub fn has_binding(&self, key: &RawKey) -> bool {
        self.state.bindings.contains_key(key)
    }

    /// Where the binding for `key` was declared
    pub fn binding_source(&self, key: &RawKey) -> Option<Source> {
        self.state.bindings.get(key).map(|binding| binding.source.clone())
    }

    /// Every key bound here, sorted by display form
    pub fn keys(&self) -> Vec<RawKey> {
        let mut keys: Vec<RawKey> = self.state.bindings.keys().cloned().collect();
        keys.sort_by_key(ToString::to_string);
        keys
    }

    pub fn get<T: ?Sized + Send + Sync + 'static>(&self, key: &Key<T>) -> Result<Arc<T>, ProvisionError> {
        let instance = self.resolve(key.raw())?;
        downcast::<T>(&instance).ok_or_else(|| ProvisionError::TypeMismatch {
            key: key.raw().clone(),
        })
    }

    /// Unqualified instance of `T`
    pub fn get_instance<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, ProvisionError> {
        self.get(&Key::<T>::get())
    }

    pub fn get_provider<T: ?Sized + Send + Sync + 'static>(
        &self,
        key: &Key<T>,
    ) -> Result<Provider<T>, ProvisionError> {
        Ok(self.provider_for(key.raw())?.typed())
    }
}

impl Resolver for Injector {
    fn resolve(&self, key: &RawKey) -> Result<Instance, ProvisionError> {
        self.state.resolve(key)
    }

    fn provider_for(&self, key: &RawKey) -> Result<RawProvider, ProvisionError> {
        self.state.provider_for(key)
    }
}

impl std::fmt::Debug for Injector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injector")
            .field("stage", &self.state.stage)
            .field("bindings", &self.state.bindings.len())
            .field("children", &self.state.children.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::{Binder, BinderExt};
    use crate::provider::ResolverExt;
    use std::panic::Location;

    fn injector(configure: impl FnOnce(&RecordingBinder)) -> Result<Injector, CreationError> {
        let binder = RecordingBinder::new(Stage::Development);
        configure(&binder);
        Injector::from_binder(&binder)
    }

    #[test]
    fn test_instance_binding() {
        let injector = injector(|binder| binder.bind::<u32>().to_instance(7)).unwrap();
        assert_eq!(*injector.get_instance::<u32>().unwrap(), 7);
    }

    #[test]
    fn test_untargetted_binding_is_missing() {
        let error = injector(|binder| {
            binder.bind::<u32>();
        })
        .unwrap_err();
        assert!(matches!(error.errors[0], ConfigError::MissingImplementation { .. }));
    }

    #[test]
    fn test_cycle_is_reported() {
        struct A;
        struct B;
        let injector = injector(|binder| {
            binder.bind::<A>().to_factory(|r| {
                r.get_instance::<B>()?;
                Ok(Arc::new(A))
            });
            binder.bind::<B>().to_factory(|r| {
                r.get_instance::<A>()?;
                Ok(Arc::new(B))
            });
        })
        .unwrap();

        match injector.get_instance::<A>() {
            Err(ProvisionError::Cycle { path }) => assert!(path.contains(" -> ")),
            other => panic!("expected a cycle, got {:?}", other.map(|_| ())),
        }
        // the stack unwound: a fresh resolution reports the same cycle again
        assert!(matches!(injector.get_instance::<B>(), Err(ProvisionError::Cycle { .. })));
    }

    #[test]
    fn test_lookup_before_creation_is_not_initialized() {
        let binder = RecordingBinder::new(Stage::Development);
        binder.bind::<u32>().to_instance(1);
        let provider = binder.get_provider_raw(RawKey::of::<u32>(), Location::caller());
        assert!(matches!(provider.get(), Err(ProvisionError::NotInitialized { .. })));

        let injector = Injector::from_binder(&binder).unwrap();
        assert!(provider.get().is_ok());
        drop(injector);
        assert!(matches!(provider.get(), Err(ProvisionError::InjectorDropped { .. })));
    }

    #[test]
    fn test_lookup_in_private_environment_resolves_through_child() {
        let binder = RecordingBinder::new(Stage::Development);
        binder.bind::<u32>().to_instance(3);
        let private = binder.new_private_binder();
        private.bind::<u64>().to_factory(|r| Ok(Arc::new(*r.get_instance::<u32>()? as u64)));
        let provider = private.get_provider(Key::<u64>::get());

        let injector = Injector::from_binder(&binder).unwrap();
        assert_eq!(*provider.get().unwrap(), 3);
        assert!(!injector.has_binding(Key::<u64>::get().raw()));
    }

    #[test]
    fn test_unresolved_lookup() {
        let error = injector(|binder| {
            binder.get_provider(Key::<u32>::get());
        })
        .unwrap_err();
        assert!(matches!(error.errors[0], ConfigError::UnresolvedLookup { .. }));
    }

    #[test]
    fn test_unknown_scope() {
        struct Request;
        impl crate::scope::ScopeAnnotation for Request {}

        let error = injector(|binder| {
            binder.bind::<u32>().to_fn(|| Arc::new(1)).in_scope_tag::<Request>();
        })
        .unwrap_err();
        assert!(matches!(error.errors[0], ConfigError::UnknownScope { .. }));
    }
}
