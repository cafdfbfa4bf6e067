//! Binding keys
//!
//! A [`Key<T>`] identifies one binding: the bound Rust type plus an optional
//! [`Qualifier`]. [`RawKey`] is the type-erased form that travels through the
//! object-safe [`Binder`](crate::binder::Binder) surface.
//!
//! ```text
//! Key<dyn Store>                    → RawKey { type: dyn Store, qualifier: None }
//! Key<dyn Store>::named("cache")    → RawKey { type: dyn Store, qualifier: @Named("cache") }
//! ```

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

// ============================================================================
// QUALIFIER
// ============================================================================

/// Distinguishes several bindings of the same type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Qualifier {
    /// A string name, the equivalent of `@Named("...")`
    Named(Arc<str>),

    /// A marker type used as an annotation
    Marker {
        type_id: TypeId,
        name: &'static str,
    },

    /// One contribution to a multibinder set
    Element {
        /// Qualifier of the set the element belongs to
        set: Option<Arc<Qualifier>>,
        /// Unique ordinal within the configuration pass
        ordinal: u64,
    },
}

impl Qualifier {
    /// Qualifier carrying a string name
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Qualifier::Named(name.into())
    }

    /// Qualifier carrying a marker type
    pub fn marker<M: ?Sized + 'static>() -> Self {
        Qualifier::Marker {
            type_id: TypeId::of::<M>(),
            name: std::any::type_name::<M>(),
        }
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Qualifier::Named(name) => write!(f, "@Named(\"{}\")", name),
            Qualifier::Marker { name, .. } => write!(f, "@{}", name),
            Qualifier::Element { set: Some(set), ordinal } => {
                write!(f, "@Element({}, #{})", set, ordinal)
            }
            Qualifier::Element { set: None, ordinal } => write!(f, "@Element(#{})", ordinal),
        }
    }
}

// ============================================================================
// RAW KEY
// ============================================================================

/// Type-erased binding key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawKey {
    type_id: TypeId,
    type_name: &'static str,
    qualifier: Option<Qualifier>,
}

impl RawKey {
    /// Unqualified key for `T`
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            qualifier: None,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn qualifier(&self) -> Option<&Qualifier> {
        self.qualifier.as_ref()
    }

    /// Same type, different qualifier
    pub fn with_qualifier(mut self, qualifier: Option<Qualifier>) -> Self {
        self.qualifier = qualifier;
        self
    }

    /// Whether this key names a multibinder element
    pub fn is_set_element(&self) -> bool {
        matches!(self.qualifier, Some(Qualifier::Element { .. }))
    }
}

impl fmt::Display for RawKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{} {}", self.type_name, qualifier),
            None => f.write_str(self.type_name),
        }
    }
}

// ============================================================================
// TYPED KEY
// ============================================================================

/// Typed binding key
///
/// `T` may be unsized (`dyn Trait`); instances are always handled as `Arc<T>`.
pub struct Key<T: ?Sized + 'static> {
    raw: RawKey,
    _type: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized + 'static> Key<T> {
    /// Unqualified key
    pub fn get() -> Self {
        Self::from_raw_unchecked(RawKey::of::<T>())
    }

    /// Key qualified by a string name
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self::qualified(Qualifier::named(name))
    }

    /// Key qualified by a marker type
    pub fn marked<M: ?Sized + 'static>() -> Self {
        Self::qualified(Qualifier::marker::<M>())
    }

    /// Key with an explicit qualifier
    pub fn qualified(qualifier: Qualifier) -> Self {
        Self::from_raw_unchecked(RawKey::of::<T>().with_qualifier(Some(qualifier)))
    }

    /// Re-type a raw key; `None` when the raw key names another type
    pub fn from_raw(raw: RawKey) -> Option<Self> {
        (raw.type_id == TypeId::of::<T>()).then(|| Self::from_raw_unchecked(raw))
    }

    fn from_raw_unchecked(raw: RawKey) -> Self {
        Self {
            raw,
            _type: PhantomData,
        }
    }

    /// Same type, different qualifier
    pub fn with_qualifier(self, qualifier: Option<Qualifier>) -> Self {
        Self::from_raw_unchecked(self.raw.with_qualifier(qualifier))
    }

    pub fn qualifier(&self) -> Option<&Qualifier> {
        self.raw.qualifier()
    }

    pub fn raw(&self) -> &RawKey {
        &self.raw
    }

    pub fn into_raw(self) -> RawKey {
        self.raw
    }
}

impl<T: ?Sized + 'static> Clone for Key<T> {
    fn clone(&self) -> Self {
        Self::from_raw_unchecked(self.raw.clone())
    }
}

impl<T: ?Sized + 'static> PartialEq for Key<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T: ?Sized + 'static> Eq for Key<T> {}

impl<T: ?Sized + 'static> Hash for Key<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T: ?Sized + 'static> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Key").field(&self.raw).finish()
    }
}

impl<T: ?Sized + 'static> fmt::Display for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.raw, f)
    }
}

impl<T: ?Sized + 'static> From<Key<T>> for RawKey {
    fn from(key: Key<T>) -> Self {
        key.raw
    }
}
