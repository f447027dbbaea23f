//! Stable handles for organ elements, and the factory that mints them.
//!
//! Elements refer to each other through these handles instead of positions,
//! so reordering a collection never invalidates a reference. The ODF position
//! of an element is looked up from the owning collection when a file is
//! written.

use std::fmt;

/// Common behaviour of every handle type.
pub trait IsId: Copy + Eq + std::hash::Hash + fmt::Debug + From<usize> {
    /// Returns the raw handle value.
    fn as_usize(&self) -> usize;
}

macro_rules! define_id {
    ($($(#[$meta:meta])* $name:ident),+ $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub usize);

            impl From<usize> for $name {
                fn from(value: usize) -> Self {
                    Self(value)
                }
            }

            impl IsId for $name {
                fn as_usize(&self) -> usize {
                    self.0
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}#{}", stringify!($name), self.0)
                }
            }
        )+
    };
}

define_id!(
    /// A manual (or the pedal).
    ManualId,
    StopId,
    CouplerId,
    DivisionalId,
    /// An organ-wide switch.
    SwitchId,
    TremulantId,
    RankId,
    WindchestId,
    EnclosureId,
    DivisionalCouplerId,
    GeneralId,
    PistonId,
);

/// Generates handles that are unique within one organ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdFactory {
    next_value: usize,
}

impl Default for IdFactory {
    fn default() -> Self {
        Self::new(1)
    }
}

impl IdFactory {
    pub fn new(first_value: usize) -> Self {
        Self { next_value: first_value }
    }

    /// Generates the next unique handle.
    pub fn mint<I: IsId>(&mut self) -> I {
        let value = self.next_value;
        self.next_value += 1;
        I::from(value)
    }
}

/// Elements that carry their own handle.
pub trait HasId {
    type Id: IsId;

    fn id(&self) -> Self::Id;
}

/// Zero-based position of the element with `id`, if it is present.
pub fn position_of<T: HasId>(items: &[T], id: T::Id) -> Option<usize> {
    items.iter().position(|item| item.id() == id)
}

/// Zero-based position of `id` in a plain list of handles.
pub fn position_of_id<I: IsId>(ids: &[I], id: I) -> Option<usize> {
    ids.iter().position(|candidate| *candidate == id)
}
