//! # Modules
//!
//! A [`Module`] is one configuration callback. The host calls
//! [`Module::configure`] with the binder it is configuring.
//!
//! ## Re-entrancy
//!
//! The module adapters in this crate ([`AbstractModule`], [`SingletonModule`],
//! [`DuplexModule`](crate::duplex::DuplexModule)) refuse every invocation after
//! the first one on the same instance:
//!
//! ```text
//! Idle ──configure()──▶ Configuring ──(return / unwind)──▶ Configured
//!                                                         │
//!                            configure() again ◀──────────┘  → ConfigError::Reentry
//! ```
//!
//! The binder itself is never stored: bodies receive it as a borrowed
//! argument, so it cannot outlive the callback.

use crate::binder::Binder;
use crate::error::ConfigError;
use crate::source::{Source, SourceTag};
use crate::vbinder::VBinder;
use std::any::TypeId;
use std::panic::Location;

pub(crate) const SOURCE: SourceTag = crate::source_tag!();

// ============================================================================
// MODULE
// ============================================================================

/// A unit of configuration logic
pub trait Module {
    /// Contribute bindings to `binder`
    fn configure(&mut self, binder: &dyn Binder);

    /// Name used for diagnostics and source attribution
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Modules reporting the same identity are installed once per environment
    fn dedup_identity(&self) -> Option<TypeId> {
        None
    }
}

// ============================================================================
// RE-ENTRANCY GUARD
// ============================================================================

/// Lifecycle of a module instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModuleState {
    #[default]
    Idle,
    Configuring,
    Configured,
}

/// Marks a module `Configured` on every exit path
pub(crate) struct ConfigureGuard<'a> {
    state: &'a mut ModuleState,
}

impl<'a> ConfigureGuard<'a> {
    /// `None` when the module is already configuring or configured
    pub(crate) fn enter(state: &'a mut ModuleState) -> Option<Self> {
        if *state != ModuleState::Idle {
            return None;
        }
        *state = ModuleState::Configuring;
        Some(Self { state })
    }
}

impl Drop for ConfigureGuard<'_> {
    fn drop(&mut self) {
        *self.state = ModuleState::Configured;
    }
}

/// Report a refused second invocation through the binder
pub(crate) fn report_reentry(binder: &dyn Binder, module: &'static str, site: &'static Location<'static>) {
    tracing::warn!(module, "refusing to configure a module twice");
    binder.skip_sources(&[SOURCE]).add_error_raw(
        ConfigError::Reentry {
            module,
            at: Source::Unknown,
        },
        site,
    );
}

// ============================================================================
// ABSTRACT MODULE
// ============================================================================

/// Body of an [`AbstractModule`]
pub trait Configure {
    fn configure(&mut self, binder: &VBinder);
}

impl<F: FnMut(&VBinder)> Configure for F {
    fn configure(&mut self, binder: &VBinder) {
        self(binder)
    }
}

/// Module that hands its body an extended binder
///
/// ```rust,ignore
/// let module = AbstractModule::from_fn(|binder| {
///     binder.bind::<dyn Store>().to_fn(|| Arc::new(MemoryStore::default()));
///     binder.bind_lazy::<Index>().to_injectable();
/// });
/// ```
pub struct AbstractModule<C> {
    body: C,
    state: ModuleState,
}

impl<C: Configure> AbstractModule<C> {
    pub fn new(body: C) -> Self {
        Self {
            body,
            state: ModuleState::Idle,
        }
    }

    pub fn state(&self) -> ModuleState {
        self.state
    }

    pub fn body(&self) -> &C {
        &self.body
    }

    pub fn into_body(self) -> C {
        self.body
    }
}

impl<F: FnMut(&VBinder)> AbstractModule<F> {
    pub fn from_fn(body: F) -> Self {
        Self::new(body)
    }
}

impl<C: Configure> Module for AbstractModule<C> {
    fn configure(&mut self, binder: &dyn Binder) {
        let module = self.name();
        let Some(_guard) = ConfigureGuard::enter(&mut self.state) else {
            report_reentry(binder, module, Location::caller());
            return;
        };
        let binder = VBinder::of(binder);
        self.body.configure(&binder);
    }

    fn name(&self) -> &'static str {
        std::any::type_name::<C>()
    }
}

// ============================================================================
// SINGLETON MODULE
// ============================================================================

/// Module installed at most once per environment
///
/// Installing several instances with the same body type, from anywhere in the
/// same environment, configures only the first one.
pub struct SingletonModule<C> {
    inner: AbstractModule<C>,
}

impl<C: Configure + 'static> SingletonModule<C> {
    pub fn new(body: C) -> Self {
        Self {
            inner: AbstractModule::new(body),
        }
    }

    pub fn state(&self) -> ModuleState {
        self.inner.state()
    }
}

impl<C: Configure + 'static> Module for SingletonModule<C> {
    fn configure(&mut self, binder: &dyn Binder) {
        self.inner.configure(binder)
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn dedup_identity(&self) -> Option<TypeId> {
        Some(TypeId::of::<C>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_marks_configured() {
        let mut state = ModuleState::Idle;
        {
            let guard = ConfigureGuard::enter(&mut state);
            assert!(guard.is_some());
        }
        assert_eq!(state, ModuleState::Configured);
        assert!(ConfigureGuard::enter(&mut state).is_none());
    }

    #[test]
    fn test_guard_resets_on_unwind() {
        let mut state = ModuleState::Idle;
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = ConfigureGuard::enter(&mut state);
            panic!("configure failed");
        }));
        assert!(result.is_err());
        assert_eq!(state, ModuleState::Configured);
    }

    #[test]
    fn test_abstract_module_name_is_body() {
        struct Body;
        impl Configure for Body {
            fn configure(&mut self, _binder: &VBinder) {}
        }
        let module = AbstractModule::new(Body);
        assert!(module.name().ends_with("Body"));
    }
}
