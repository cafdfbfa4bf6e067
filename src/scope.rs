//! Scopes, scope markers and stages
//!
//! A [`Scope`] decorates the unscoped provider of a binding. Bindings name
//! their scope either directly (an `Arc<dyn Scope>`) or through a marker
//! type ([`ScopeTag`]) that the injector maps to a scope registered with
//! `bind_scope`. The built-in [`Singleton`] marker is always registered.

use crate::key::RawKey;
use crate::provider::{Instance, RawProvider};
use once_cell::sync::{Lazy, OnceCell};
use serde::{Deserialize, Serialize};
use std::any::TypeId;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Environment variable read by [`Stage::from_env`]
pub const STAGE_ENV_VAR: &str = "BINDERKIT_STAGE";

// ============================================================================
// STAGE
// ============================================================================

/// Which stage the injector is created in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Tooling only; nothing is ever primed
    Tool,
    /// Fast start-up; only explicit eager singletons are primed
    #[default]
    Development,
    /// Every singleton-scoped binding is primed at creation
    Production,
}

impl Stage {
    /// Stage from `BINDERKIT_STAGE`, falling back to the default
    pub fn from_env() -> Self {
        match std::env::var(STAGE_ENV_VAR) {
            Ok(value) => value.parse().unwrap_or_else(|_| {
                tracing::warn!("Ignoring invalid {}={:?}", STAGE_ENV_VAR, value);
                Stage::default()
            }),
            Err(_) => Stage::default(),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Tool => write!(f, "tool"),
            Stage::Development => write!(f, "development"),
            Stage::Production => write!(f, "production"),
        }
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tool" => Ok(Stage::Tool),
            "development" | "dev" => Ok(Stage::Development),
            "production" | "prod" => Ok(Stage::Production),
            other => Err(format!("unknown stage '{}'", other)),
        }
    }
}

// ============================================================================
// SCOPE
// ============================================================================

/// Decorates unscoped providers with caching behaviour
pub trait Scope: Send + Sync + fmt::Debug {
    /// Scoped provider for one binding of one injector
    fn scope(&self, key: &RawKey, unscoped: RawProvider) -> RawProvider;

    /// Whether bindings in this scope are primed at creation in `stage`
    fn eager_in(&self, _stage: Stage) -> bool {
        false
    }
}

/// One instance per binding per injector
#[derive(Debug, Default)]
pub struct SingletonScope;

impl SingletonScope {
    /// Caching provider shared by every singleton-like scope
    pub(crate) fn cache(key: &RawKey, unscoped: RawProvider) -> RawProvider {
        let cell: Arc<OnceCell<Instance>> = Arc::new(OnceCell::new());
        RawProvider::new(key.clone(), move || {
            if let Some(instance) = cell.get() {
                tracing::trace!(key = %unscoped.key(), "singleton cache hit");
                return Ok(Arc::clone(instance));
            }
            // failures are not cached; the next call retries
            cell.get_or_try_init(|| unscoped.get()).map(Arc::clone)
        })
    }
}

impl Scope for SingletonScope {
    fn scope(&self, key: &RawKey, unscoped: RawProvider) -> RawProvider {
        SingletonScope::cache(key, unscoped)
    }

    fn eager_in(&self, stage: Stage) -> bool {
        stage == Stage::Production
    }
}

/// Returns the unscoped provider unchanged
#[derive(Debug, Default)]
pub struct NoScope;

impl Scope for NoScope {
    fn scope(&self, _key: &RawKey, unscoped: RawProvider) -> RawProvider {
        unscoped
    }
}

static SINGLETON: Lazy<Arc<dyn Scope>> = Lazy::new(|| Arc::new(SingletonScope));
static NO_SCOPE: Lazy<Arc<dyn Scope>> = Lazy::new(|| Arc::new(NoScope));

/// The built-in singleton scope
pub fn singleton() -> Arc<dyn Scope> {
    Arc::clone(&SINGLETON)
}

/// The identity scope
pub fn no_scope() -> Arc<dyn Scope> {
    Arc::clone(&NO_SCOPE)
}

// ============================================================================
// SCOPE MARKERS
// ============================================================================

/// A marker type that names a scope
pub trait ScopeAnnotation: 'static {}

/// Marker for the built-in singleton scope
#[derive(Debug, Clone, Copy)]
pub struct Singleton;

impl ScopeAnnotation for Singleton {}

/// Runtime identity of a scope marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeTag {
    type_id: TypeId,
    name: &'static str,
}

impl ScopeTag {
    pub fn of<S: ScopeAnnotation>() -> Self {
        Self {
            type_id: TypeId::of::<S>(),
            name: std::any::type_name::<S>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for ScopeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)
    }
}

// ============================================================================
// SCOPING
// ============================================================================

/// How a binding declaration is scoped
#[derive(Debug, Clone, Default)]
pub enum Scoping {
    #[default]
    Unscoped,
    /// Scope looked up by marker when the injector is created
    Tag(ScopeTag),
    /// Scope given directly
    Instance(Arc<dyn Scope>),
    /// Singleton primed in every stage except [`Stage::Tool`]
    EagerSingleton,
}

impl Scoping {
    pub fn is_unscoped(&self) -> bool {
        matches!(self, Scoping::Unscoped)
    }
}

impl fmt::Display for Scoping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scoping::Unscoped => write!(f, "unscoped"),
            Scoping::Tag(tag) => write!(f, "{}", tag),
            Scoping::Instance(scope) => write!(f, "{:?}", scope),
            Scoping::EagerSingleton => write!(f, "eager singleton"),
        }
    }
}
