//! Fluent injector construction

use super::injector::Injector;
use super::recorder::RecordingBinder;
use crate::binder::Binder;
use crate::error::CreationError;
use crate::module::Module;
use crate::scope::Stage;

// ============================================================================
// INJECTOR BUILDER
// ============================================================================

/// Fluent builder for an [`Injector`]
///
/// ```rust,ignore
/// let injector = Injector::builder()
///     .stage(Stage::Production)
///     .module(AppModule::default())
///     .module(LazySingletonModule)
///     .build()?;
/// ```
pub struct InjectorBuilder {
    stage: Stage,
    modules: Vec<Box<dyn Module>>,
}

impl InjectorBuilder {
    /// Create a new builder in the default stage
    pub fn new() -> Self {
        Self {
            stage: Stage::default(),
            modules: Vec::new(),
        }
    }

    /// Set the stage
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    /// Take the stage from `BINDERKIT_STAGE`
    pub fn stage_from_env(self) -> Self {
        self.stage(Stage::from_env())
    }

    /// Add a module
    pub fn module<M: Module + 'static>(mut self, module: M) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    /// Add several boxed modules
    pub fn modules<I>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = Box<dyn Module>>,
    {
        self.modules.extend(modules);
        self
    }

    /// Run every module, then create the injector
    pub fn build(self) -> Result<Injector, CreationError> {
        tracing::debug!(stage = %self.stage, modules = self.modules.len(), "building injector");
        let binder = RecordingBinder::new(self.stage);
        for mut module in self.modules {
            binder.install(module.as_mut());
        }
        Injector::from_binder(&binder)
    }
}

impl Default for InjectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::BinderExt;
    use crate::module::AbstractModule;

    #[test]
    fn test_builder_defaults() {
        let injector = InjectorBuilder::new().build().unwrap();
        assert_eq!(injector.stage(), Stage::Development);
        assert!(injector.keys().is_empty());
    }

    #[test]
    fn test_modules_run_in_order() {
        let injector = InjectorBuilder::new()
            .stage(Stage::Tool)
            .module(AbstractModule::from_fn(|binder| {
                binder.bind::<u32>().to_instance(1);
            }))
            .modules([Box::new(AbstractModule::from_fn(|binder| {
                binder.bind::<u64>().to_instance(2);
            })) as Box<dyn Module>])
            .build()
            .unwrap();

        assert_eq!(injector.stage(), Stage::Tool);
        assert_eq!(*injector.get_instance::<u64>().unwrap(), 2);
        assert_eq!(injector.keys().len(), 2);
    }

    #[test]
    fn test_errors_from_all_modules_are_collected() {
        let error = InjectorBuilder::new()
            .module(AbstractModule::from_fn(|binder| binder.add_error("first")))
            .module(AbstractModule::from_fn(|binder| binder.add_error("second")))
            .build()
            .unwrap_err();

        assert_eq!(error.len(), 2);
        assert!(error.mentions("first"));
        assert!(error.mentions("second"));
    }
}
