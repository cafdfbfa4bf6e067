use super::{DuplexBinder, VDuplexBinder};
use crate::binder::Binder;
use crate::error::ConfigError;
use crate::module::{report_reentry, ConfigureGuard, Module, ModuleState};
use crate::source::{Source, SourceTag};
use std::panic::Location;

pub(crate) const SOURCE: SourceTag = crate::source_tag!();

/// Body of a [`DuplexModule`]
pub trait ConfigureDuplex {
    fn configure(&mut self, binder: &VDuplexBinder);
}

impl<F: FnMut(&VDuplexBinder)> ConfigureDuplex for F {
    fn configure(&mut self, binder: &VDuplexBinder) {
        self(binder)
    }
}

/// A module that must be installed through a [`DuplexBinder`]
///
/// Installed anywhere else, it records a [`ConfigError::NotDuplex`] and its
/// body does not run.
pub struct DuplexModule<C> {
    body: C,
    state: ModuleState,
}

impl<C: ConfigureDuplex> DuplexModule<C> {
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
}

impl<F: FnMut(&VDuplexBinder)> DuplexModule<F> {
    pub fn from_fn(body: F) -> Self {
        Self::new(body)
    }
}

impl<C: ConfigureDuplex> Module for DuplexModule<C> {
    fn configure(&mut self, binder: &dyn Binder) {
        let module = self.name();
        let Some(_guard) = ConfigureGuard::enter(&mut self.state) else {
            report_reentry(binder, module, Location::caller());
            return;
        };
        let Some(duplex) = DuplexBinder::active_binder(binder) else {
            tracing::warn!(module, binder = binder.type_name(), "duplex module installed outside a duplex binder");
            binder.skip_sources(&[SOURCE]).add_error_raw(
                ConfigError::NotDuplex {
                    module,
                    binder: binder.type_name(),
                    expected: std::any::type_name::<DuplexBinder>(),
                    at: Source::Unknown,
                },
                Location::caller(),
            );
            return;
        };
        let binder = VDuplexBinder::of(&duplex);
        self.body.configure(&binder);
    }

    fn name(&self) -> &'static str {
        std::any::type_name::<C>()
    }
}
