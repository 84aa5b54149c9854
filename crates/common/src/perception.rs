use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use crate::EntityId;

/// Bitmask distinguishing classes of entities an AI may want to detect.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PerceptionMask(pub u32);

impl PerceptionMask {
    pub const NONE: Self = Self(0);
    pub const PLAYER: Self = Self(1 << 0);
    pub const ENEMY: Self = Self(1 << 1);
    pub const INTERACTABLE: Self = Self(1 << 2);

    /// The three categories scanned when nothing else is configured.
    pub const DEFAULT_CATEGORIES: [Self; 3] = [Self::PLAYER, Self::ENEMY, Self::INTERACTABLE];

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for PerceptionMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for PerceptionMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for PerceptionMask {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl std::fmt::Display for PerceptionMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::PLAYER) {
            names.push("player");
        }
        if self.contains(Self::ENEMY) {
            names.push("enemy");
        }
        if self.contains(Self::INTERACTABLE) {
            names.push("interactable");
        }
        let known = (Self::PLAYER | Self::ENEMY | Self::INTERACTABLE).0;
        if names.is_empty() || self.0 & !known != 0 {
            write!(f, "{:#x}", self.0)
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

/// Standing values keyed by relationship id, attached to vision broadcasts.
pub type WeightingContext = BTreeMap<String, f32>;

/// Results of one batch scan: perception category → entities found.
///
/// Replaced wholesale every scan; never merged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisionCache {
    entries: BTreeMap<PerceptionMask, Vec<EntityId>>,
}

impl VisionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Store the result list for a category, replacing any previous one.
    pub fn insert(&mut self, category: PerceptionMask, entities: Vec<EntityId>) {
        self.entries.insert(category, entities);
    }

    /// Entities found for `category`; empty when the category was not scanned.
    pub fn get(&self, category: PerceptionMask) -> &[EntityId] {
        self.entries.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn categories(&self) -> impl Iterator<Item = PerceptionMask> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PerceptionMask, &[EntityId])> {
        self.entries.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    /// Number of categories present.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total entity hits across all categories.
    pub fn total_hits(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}
