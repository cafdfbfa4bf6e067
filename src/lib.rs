//! binderkit - composable binder decorators, duplex modules and lazy scopes
//!
//! Modules contribute bindings to a [`Binder`]. This crate extends that
//! surface without reimplementing it:
//!
//! - [`VBinder`] / [`VPrivateBinder`]: decorators adding lazy bindings, sets
//!   and bind-and-expose
//! - [`DuplexBinder`] / [`DuplexModule`]: nested modules with a private and a
//!   public environment at once
//! - [`Lazy`] and the [`LazySingleton`] scope
//!
//! The [`host`] module is a small reference framework behind the binder
//! traits; it records elements and resolves them with an [`Injector`].

pub mod binder;
pub mod duplex;
pub mod error;
pub mod host;
pub mod key;
pub mod lazy;
pub mod lazy_singleton;
pub mod module;
pub mod provider;
pub mod scope;
pub mod set_binder;
pub mod source;
pub mod vbinder;

pub use binder::{Binder, BinderExt, BinderId, PrivateBinder, PrivateBinderExt};
pub use duplex::{ConfigureDuplex, DuplexBinder, DuplexModule, VDuplexBinder};
pub use error::{ConfigError, CreationError, FixSuggestion, ProvisionError};
pub use host::{Element, Elements, Injector, InjectorBuilder, RecordingBinder};
pub use key::{Key, Qualifier, RawKey};
pub use lazy::Lazy;
pub use lazy_singleton::{LazySingleton, LazySingletonModule};
pub use module::{AbstractModule, Configure, Module, ModuleState, SingletonModule};
pub use provider::{Injectable, Provider, Resolver, ResolverExt};
pub use scope::{Scope, ScopeAnnotation, Singleton, Stage};
pub use set_binder::{Multibinder, SetBinder};
pub use source::{Source, SourceTag};
pub use vbinder::{ExtendedBinder, ExtendedPrivateBinder, VBinder, VPrivateBinder};
