//! Reference host
//!
//! A small resolution framework behind the [`Binder`](crate::binder::Binder)
//! surface: [`RecordingBinder`] records what modules declare, [`Injector`]
//! resolves it. Everything else in the crate talks to it only through the
//! binder and module traits.

mod builder;
mod element;
mod injector;
mod recorder;

pub use builder::InjectorBuilder;
pub use element::{
    BindingElement, Element, ElementSummary, Elements, ExposureElement, PrivateElements,
    ProviderLookupElement, ScopeBindingElement,
};
pub use injector::Injector;
pub use recorder::RecordingBinder;
