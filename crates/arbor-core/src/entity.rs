use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable identifier for an entity.
///
/// Ordering is part of the contract: anything keyed by entity iterates deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct EntityId(pub u64);

impl EntityId {
    pub fn stable_id(self) -> u64 {
        self.0
    }
}

impl From<u64> for EntityId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// Component kinds an entity may carry. Each kind owns one bit of an [`Aspect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ComponentKind {
    Behavior,
    Transform,
    Sprite,
    Animation,
    Audio,
    Tile,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 6] = [
        ComponentKind::Behavior,
        ComponentKind::Transform,
        ComponentKind::Sprite,
        ComponentKind::Animation,
        ComponentKind::Audio,
        ComponentKind::Tile,
    ];

    fn bit(self) -> u64 {
        1 << (self as u64)
    }
}

/// Set of component kinds an entity currently has.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct Aspect {
    bits: u64,
}

impl Aspect {
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    pub fn of(kinds: &[ComponentKind]) -> Self {
        kinds.iter().copied().collect()
    }

    pub fn with(mut self, kind: ComponentKind) -> Self {
        self.insert(kind);
        self
    }

    pub fn insert(&mut self, kind: ComponentKind) {
        self.bits |= kind.bit();
    }

    pub fn remove(&mut self, kind: ComponentKind) {
        self.bits &= !kind.bit();
    }

    pub fn includes(self, kind: ComponentKind) -> bool {
        self.bits & kind.bit() != 0
    }

    pub fn includes_all(self, other: Aspect) -> bool {
        self.bits & other.bits == other.bits
    }

    pub fn is_empty(self) -> bool {
        self.bits == 0
    }

    pub fn kinds(self) -> impl Iterator<Item = ComponentKind> {
        ComponentKind::ALL
            .into_iter()
            .filter(move |kind| self.includes(*kind))
    }
}

impl FromIterator<ComponentKind> for Aspect {
    fn from_iter<I: IntoIterator<Item = ComponentKind>>(iter: I) -> Self {
        let mut aspect = Aspect::empty();
        for kind in iter {
            aspect.insert(kind);
        }
        aspect
    }
}

impl fmt::Debug for Aspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.kinds()).finish()
    }
}
