//! # Binder capability surface
//!
//! The object-safe traits through which modules talk to a host framework.
//!
//! ## Layers
//!
//! ```text
//! +-----------------------------------------------------------+
//! |  typed API  (BinderExt / PrivateBinderExt, builders)       |
//! |  - generic, #[track_caller], captures the caller CallSite  |
//! +-----------------------------------------------------------+
//!     |  RawKey + CallSite
//!     v
//! +-----------------------------------------------------------+
//! |  Binder / PrivateBinder  (object safe, `_raw` primitives)  |
//! |  - implemented by the host (RecordingBinder)               |
//! |  - implemented by every decorator, one-to-one delegation   |
//! +-----------------------------------------------------------+
//! ```
//!
//! ## Capability queries
//!
//! Decorators must not re-wrap a binder that already has their shape. Rather
//! than inspecting runtime types, every binder answers [`Binder::as_extended`],
//! [`Binder::as_duplex`] and [`PrivateBinder::as_extended_private`]; the
//! defaults answer `None`.

pub mod builder;
pub mod ext;

use crate::duplex::DuplexBinder;
use crate::error::{ConfigError, ProvisionError};
use crate::key::{Qualifier, RawKey};
use crate::module::Module;
use crate::provider::{Instance, RawProvider, Resolver};
use crate::scope::{Scope, ScopeTag, Scoping, Stage};
use crate::source::{CallSite, Source, SourceTag};
use crate::vbinder::{VBinder, VPrivateBinder};
use std::any::TypeId;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub use builder::{
    AnnotatedBindingBuilder, AnnotatedElementBuilder, LinkedBindingBuilder, ScopedBindingBuilder,
};
pub use ext::{BinderExt, PrivateBinderExt};

// ============================================================================
// BINDER IDENTITY
// ============================================================================

/// Identity of a binding environment
///
/// Copies of a binder made by `with_source` / `skip_sources`, and decorators
/// around it, share the id: they all record into the same environment.
/// `new_private_binder` always yields a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BinderId(u64);

static NEXT_BINDER_ID: AtomicU64 = AtomicU64::new(1);

impl BinderId {
    pub fn next() -> Self {
        BinderId(NEXT_BINDER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for BinderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "binder#{}", self.0)
    }
}

// ============================================================================
// BINDING TARGETS
// ============================================================================

/// Factory receiving the resolution graph
pub type FactoryFn = dyn Fn(&dyn Resolver) -> Result<Instance, ProvisionError> + Send + Sync;

/// Converts an instance of a linked key to the bound type
pub type ConvertFn = dyn Fn(Instance) -> Result<Instance, ProvisionError> + Send + Sync;

/// Collects multibinder elements into the set instance
pub type AssembleFn = dyn Fn(Vec<Instance>) -> Result<Instance, ProvisionError> + Send + Sync;

/// Merges every element bound for one multibinder set
#[derive(Clone)]
pub struct SetAssembler {
    /// Type of the elements
    pub element_type: TypeId,
    /// Qualifier shared by the set key and its element keys
    pub qualifier: Option<Qualifier>,
    pub assemble: Arc<AssembleFn>,
}

/// What a binding resolves to
#[derive(Clone)]
pub enum Target {
    /// Declared without a target yet
    Untargetted,
    Instance(Instance),
    Provider(RawProvider),
    Factory(Arc<FactoryFn>),
    /// Another key, optionally converted (e.g. `Arc<Impl>` → `Arc<dyn Trait>`)
    Linked {
        key: RawKey,
        convert: Option<Arc<ConvertFn>>,
    },
    /// An [`Injectable`](crate::provider::Injectable) implementation type
    Constructor {
        type_name: &'static str,
        factory: Arc<FactoryFn>,
        scope: Option<ScopeTag>,
    },
    /// A multibinder set
    Set(SetAssembler),
}

impl Target {
    pub fn is_untargetted(&self) -> bool {
        matches!(self, Target::Untargetted)
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Untargetted => write!(f, "Untargetted"),
            Target::Instance(_) => write!(f, "Instance"),
            Target::Provider(provider) => write!(f, "Provider({})", provider.key()),
            Target::Factory(_) => write!(f, "Factory"),
            Target::Linked { key, .. } => write!(f, "Linked({})", key),
            Target::Constructor { type_name, .. } => write!(f, "Constructor({})", type_name),
            Target::Set(set) => match &set.qualifier {
                Some(qualifier) => write!(f, "Set({})", qualifier),
                None => write!(f, "Set"),
            },
        }
    }
}

// ============================================================================
// RAW BUILDERS
// ============================================================================

/// Mutates one recorded binding in place
///
/// Typed builders wrap a boxed `RawBindingBuilder`; decorating builders
/// (bind-and-expose, lazy) implement it by forwarding.
pub trait RawBindingBuilder {
    /// Current key of the binding
    fn key(&self) -> RawKey;

    fn annotated_with(&mut self, qualifier: Qualifier);

    fn to_target(&mut self, target: Target);

    fn in_scoping(&mut self, scoping: Scoping);
}

/// Mutates one recorded exposure in place
pub trait RawExposureBuilder {
    fn key(&self) -> RawKey;

    fn annotated_with(&mut self, qualifier: Qualifier);
}

// ============================================================================
// BINDER
// ============================================================================

/// A mutable, single-pass configuration context
///
/// Every primitive that records something takes the caller's [`CallSite`];
/// decorators forward it verbatim. Use [`BinderExt`] for the typed API.
pub trait Binder: Send + Sync {
    /// Identity of the environment this binder records into
    fn id(&self) -> BinderId;

    /// Declare a binding for `key`
    fn bind_raw(&self, key: RawKey, site: CallSite) -> Box<dyn RawBindingBuilder>;

    /// Register the scope a marker stands for
    fn bind_scope_raw(&self, tag: ScopeTag, scope: Arc<dyn Scope>, site: CallSite);

    /// Run `module.configure` against this binder
    fn install(&self, module: &mut dyn Module);

    fn current_stage(&self) -> Stage;

    /// Record a configuration error
    fn add_error_raw(&self, error: ConfigError, site: CallSite);

    /// Provider usable once the injector exists
    fn get_provider_raw(&self, key: RawKey, site: CallSite) -> RawProvider;

    /// Binder whose elements are attributed to `source`
    fn with_source(&self, source: Source) -> Arc<dyn Binder>;

    /// Binder that never attributes elements to call sites in `tags`
    fn skip_sources(&self, tags: &[SourceTag]) -> Arc<dyn Binder>;

    /// Create an isolated environment enclosed by this one
    fn new_private_binder(&self) -> Arc<dyn PrivateBinder>;

    /// Extended-binder capability
    fn as_extended(&self) -> Option<VBinder> {
        None
    }

    /// Duplex-context capability
    fn as_duplex(&self) -> Option<DuplexBinder> {
        None
    }

    /// Concrete type name, used in diagnostics
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// A binder for an isolated environment that can re-publish bindings
pub trait PrivateBinder: Binder {
    /// Make the binding for `key` visible in the enclosing environment
    fn expose_raw(&self, key: RawKey, site: CallSite) -> Box<dyn RawExposureBuilder>;

    fn private_with_source(&self, source: Source) -> Arc<dyn PrivateBinder>;

    fn private_skip_sources(&self, tags: &[SourceTag]) -> Arc<dyn PrivateBinder>;

    /// Extended-private-binder capability
    fn as_extended_private(&self) -> Option<VPrivateBinder> {
        None
    }
}

impl fmt::Debug for dyn Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.type_name(), self.id())
    }
}

impl fmt::Debug for dyn PrivateBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.type_name(), self.id())
    }
}
