//! Error types with fix suggestions
//!
//! Configuration problems never abort a configuration pass: they are
//! recorded through [`BinderExt::add_error`](crate::binder::BinderExt::add_error)
//! as [`ConfigError`]s and surface together, as one [`CreationError`], when
//! the injector is built. Failures while resolving instances afterwards are
//! [`ProvisionError`]s.

use crate::key::RawKey;
use crate::source::Source;
use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

// ============================================================================
// CONFIGURATION ERRORS
// ============================================================================

/// A configuration-time error, attributed to the caller's source
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Re-entry is not allowed: {module} has already been configured")]
    Reentry { module: &'static str, at: Source },

    #[error("{module} was installed into {binder} but must be installed into {expected}")]
    NotDuplex {
        module: &'static str,
        binder: &'static str,
        expected: &'static str,
        at: Source,
    },

    #[error("A binding to {key} was already configured at {first}")]
    DuplicateBinding {
        key: RawKey,
        first: Source,
        at: Source,
    },

    #[error("No implementation for {key} was bound")]
    MissingImplementation { key: RawKey, at: Source },

    #[error("Could not expose() {key}, it must be explicitly bound")]
    UnboundExposure { key: RawKey, at: Source },

    #[error("No scope is bound to {scope} (used by {key})")]
    UnknownScope {
        scope: &'static str,
        key: RawKey,
        at: Source,
    },

    #[error("Unable to create a provider for {key}: it is not bound")]
    UnresolvedLookup { key: RawKey, at: Source },

    #[error("{message}")]
    Custom { message: String, at: Source },
}

impl ConfigError {
    /// Where the error was declared
    pub fn at(&self) -> &Source {
        match self {
            ConfigError::Reentry { at, .. }
            | ConfigError::NotDuplex { at, .. }
            | ConfigError::DuplicateBinding { at, .. }
            | ConfigError::MissingImplementation { at, .. }
            | ConfigError::UnboundExposure { at, .. }
            | ConfigError::UnknownScope { at, .. }
            | ConfigError::UnresolvedLookup { at, .. }
            | ConfigError::Custom { at, .. } => at,
        }
    }

    /// Re-attribute the error (used by binders when recording it)
    pub fn attributed(mut self, source: Source) -> Self {
        match &mut self {
            ConfigError::Reentry { at, .. }
            | ConfigError::NotDuplex { at, .. }
            | ConfigError::DuplicateBinding { at, .. }
            | ConfigError::MissingImplementation { at, .. }
            | ConfigError::UnboundExposure { at, .. }
            | ConfigError::UnknownScope { at, .. }
            | ConfigError::UnresolvedLookup { at, .. }
            | ConfigError::Custom { at, .. } => *at = source,
        }
        self
    }

    /// Free-form error, attributed when recorded
    pub fn custom(message: impl Into<String>) -> Self {
        ConfigError::Custom {
            message: message.into(),
            at: Source::Unknown,
        }
    }
}

impl FixSuggestion for ConfigError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            ConfigError::Reentry { .. } => Some("Create a new module instance for every install"),
            ConfigError::NotDuplex { .. } => {
                Some("Install the module through DuplexBinder::create(binder).install(..)")
            }
            ConfigError::DuplicateBinding { .. } => {
                Some("Remove one of the bindings or give them different qualifiers")
            }
            ConfigError::MissingImplementation { .. } => {
                Some("Add a target with to_instance/to_provider/to_key/to_injectable")
            }
            ConfigError::UnboundExposure { .. } => {
                Some("Bind the key inside the private environment before exposing it")
            }
            ConfigError::UnknownScope { .. } => {
                Some("Register the scope with bind_scope, e.g. install LazySingletonModule")
            }
            ConfigError::UnresolvedLookup { .. } => Some("Bind the key the provider was requested for"),
            ConfigError::Custom { .. } => None,
        }
    }
}

// ============================================================================
// CREATION ERROR
// ============================================================================

/// All configuration errors found while creating an injector
#[derive(Error, Debug, Clone)]
#[error("{}", render_errors(.errors))]
pub struct CreationError {
    pub errors: Vec<ConfigError>,
}

impl CreationError {
    pub fn new(errors: Vec<ConfigError>) -> Self {
        Self { errors }
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Whether any error message contains `needle`
    pub fn mentions(&self, needle: &str) -> bool {
        self.errors.iter().any(|e| e.to_string().contains(needle))
    }
}

fn render_errors(errors: &[ConfigError]) -> String {
    let mut out = String::from("Unable to create injector, see the following errors:\n");
    for (index, error) in errors.iter().enumerate() {
        out.push_str(&format!("\n{}) {}\n  at {}\n", index + 1, error, error.at()));
    }
    out.push_str(&format!(
        "\n{} error{}",
        errors.len(),
        if errors.len() == 1 { "" } else { "s" }
    ));
    out
}

// ============================================================================
// PROVISION ERRORS
// ============================================================================

/// Failure while resolving an instance from an injector
#[derive(Error, Debug, Clone)]
pub enum ProvisionError {
    #[error("No binding for {key}")]
    NotBound { key: RawKey },

    #[error("Cyclic dependency detected: {path}")]
    Cycle { path: String },

    #[error("Binding for {key} produced a value of another type")]
    TypeMismatch { key: RawKey },

    #[error("Provider for {key} was used after its injector was dropped")]
    InjectorDropped { key: RawKey },

    #[error("Provider for {key} was used before the injector was created")]
    NotInitialized { key: RawKey },

    #[error("Error while providing {key}: {message}")]
    Failed { key: RawKey, message: String },
}

impl ProvisionError {
    /// Failure raised by user factory code
    pub fn failed(key: RawKey, message: impl Into<String>) -> Self {
        ProvisionError::Failed {
            key,
            message: message.into(),
        }
    }
}

impl FixSuggestion for ProvisionError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            ProvisionError::NotBound { .. } => Some("Bind the key or expose it from its private module"),
            ProvisionError::Cycle { .. } => Some("Break the cycle with a Provider or Lazy dependency"),
            ProvisionError::TypeMismatch { .. } => None,
            ProvisionError::InjectorDropped { .. } => Some("Keep the Injector alive while using providers"),
            ProvisionError::NotInitialized { .. } => {
                Some("Only call providers obtained from a binder after the injector is built")
            }
            ProvisionError::Failed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creation_error_rendering() {
        let error = CreationError::new(vec![
            ConfigError::custom("first").attributed(Source::declared("a.rs:1")),
            ConfigError::MissingImplementation {
                key: RawKey::of::<String>(),
                at: Source::Module("app::Module"),
            },
        ]);

        let text = error.to_string();
        assert!(text.contains("1) first\n  at a.rs:1"));
        assert!(text.contains("2) No implementation for alloc::string::String was bound"));
        assert!(text.contains("at app::Module.configure()"));
        assert!(text.ends_with("2 errors"));
    }

    #[test]
    fn test_attributed_replaces_source() {
        let error = ConfigError::custom("boom").attributed(Source::declared("here"));
        assert_eq!(error.at(), &Source::declared("here"));
    }

    #[test]
    fn test_suggestions() {
        let error = ConfigError::UnknownScope {
            scope: "LazySingleton",
            key: RawKey::of::<u8>(),
            at: Source::Unknown,
        };
        assert!(error.fix_suggestion().unwrap().contains("LazySingletonModule"));
        assert!(ConfigError::custom("x").fix_suggestion().is_none());
    }
}
