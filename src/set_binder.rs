//! Set contributions
//!
//! A [`Multibinder<T>`] binds `Vec<Arc<T>>` under the set's qualifier and lets
//! any number of modules add elements to it. Every element is an ordinary
//! binding under a unique element key, so it can be targeted and scoped like
//! any other binding; the injector merges every set declaration for the same
//! key and collects elements in declaration order.
//!
//! [`SetBinder<T>`] wraps a multibinder for types that only want to expose
//! `add_binding`:
//!
//! ```rust,ignore
//! struct Handlers(SetBinder<dyn Handler>);
//!
//! let handlers = SetBinder::<dyn Handler>::new(binder);
//! handlers.add_binding().to_fn(|| Arc::new(Logging) as Arc<dyn Handler>);
//! ```

use crate::binder::{Binder, LinkedBindingBuilder, SetAssembler, Target};
use crate::error::ProvisionError;
use crate::key::{Key, Qualifier, RawKey};
use crate::provider::{downcast, erase, Instance};
use crate::source::{CallSite, SourceTag};
use std::any::TypeId;
use std::marker::PhantomData;
use std::panic::Location;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub(crate) const SOURCE: SourceTag = crate::source_tag!();

static NEXT_ELEMENT: AtomicU64 = AtomicU64::new(0);

// ============================================================================
// MULTIBINDER
// ============================================================================

/// Contributes elements to the set bound at `Vec<Arc<T>>`
pub struct Multibinder<T: ?Sized + 'static> {
    binder: Arc<dyn Binder>,
    qualifier: Option<Qualifier>,
    _type: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Multibinder<T> {
    /// Declare the set for `key`'s type and qualifier in `binder`
    #[track_caller]
    pub fn new_set_binder<B: Binder + ?Sized>(binder: &B, key: Key<T>) -> Self {
        let binder = binder.skip_sources(&[SOURCE]);
        let qualifier = key.qualifier().cloned();
        let multibinder = Self {
            binder,
            qualifier,
            _type: PhantomData,
        };
        multibinder.declare(Location::caller());
        multibinder
    }

    fn declare(&self, site: CallSite) {
        let element = RawKey::of::<T>();
        let assemble = move |instances: Vec<Instance>| -> Result<Instance, ProvisionError> {
            let mut elements: Vec<Arc<T>> = Vec::with_capacity(instances.len());
            for instance in &instances {
                let value = downcast::<T>(instance).ok_or_else(|| ProvisionError::TypeMismatch {
                    key: element.clone(),
                })?;
                elements.push(value);
            }
            Ok(erase(Arc::new(elements)))
        };
        self.binder
            .bind_raw(self.set_key().into_raw(), site)
            .to_target(Target::Set(SetAssembler {
                element_type: TypeId::of::<T>(),
                qualifier: self.qualifier.clone(),
                assemble: Arc::new(assemble),
            }));
    }

    /// Key the assembled set is bound under
    pub fn set_key(&self) -> Key<Vec<Arc<T>>> {
        Key::get().with_qualifier(self.qualifier.clone())
    }

    /// Add one element to the set
    #[track_caller]
    pub fn add_binding(&self) -> LinkedBindingBuilder<T> {
        let ordinal = NEXT_ELEMENT.fetch_add(1, Ordering::Relaxed);
        let key = RawKey::of::<T>().with_qualifier(Some(Qualifier::Element {
            set: self.qualifier.clone().map(Arc::new),
            ordinal,
        }));
        LinkedBindingBuilder::new(self.binder.bind_raw(key, Location::caller()))
    }
}

// ============================================================================
// SET BINDER
// ============================================================================

/// Reusable handle over a [`Multibinder`]
pub struct SetBinder<T: ?Sized + 'static> {
    binder: Multibinder<T>,
}

impl<T: ?Sized + Send + Sync + 'static> SetBinder<T> {
    /// The unqualified set of `T`
    #[track_caller]
    pub fn new<B: Binder + ?Sized>(binder: &B) -> Self {
        Self::from_multibinder(Multibinder::new_set_binder(binder, Key::get()))
    }

    /// The set of `T` sharing `key`'s qualifier
    #[track_caller]
    pub fn with_key<B: Binder + ?Sized>(binder: &B, key: Key<T>) -> Self {
        Self::from_multibinder(Multibinder::new_set_binder(binder, key))
    }

    #[track_caller]
    pub fn named<B: Binder + ?Sized>(binder: &B, name: &str) -> Self {
        Self::with_key(binder, Key::named(name))
    }

    pub fn from_multibinder(binder: Multibinder<T>) -> Self {
        Self { binder }
    }

    pub fn multibinder(&self) -> &Multibinder<T> {
        &self.binder
    }

    /// Add one element to the set
    #[track_caller]
    pub fn add_binding(&self) -> LinkedBindingBuilder<T> {
        self.binder.add_binding()
    }
}
