use glam::Vec3;
use serde::{Deserialize, Serialize};
use worldcell_common::EntityId;

/// Stable marker identifier, unique within a registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerId(pub String);

impl From<&str> for MarkerId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for MarkerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for MarkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A map marker: a named point of interest affiliated with a cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: MarkerId,
    /// Cell label in `Cell_N` form.
    pub cell_id: String,
    pub display_name: String,
    /// Icon asset reference.
    pub icon: String,
    pub is_visible: bool,
    pub last_known_position: Vec3,
    /// Entity whose deactivation removes this marker.
    #[serde(default)]
    pub owner: Option<EntityId>,
}

impl Marker {
    /// A visible, unowned marker.
    pub fn new(
        id: impl Into<MarkerId>,
        cell_id: impl Into<String>,
        display_name: impl Into<String>,
        position: Vec3,
    ) -> Self {
        Self {
            id: id.into(),
            cell_id: cell_id.into(),
            display_name: display_name.into(),
            icon: String::new(),
            is_visible: true,
            last_known_position: position,
            owner: None,
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn owned_by(mut self, owner: EntityId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn toggle(&mut self) {
        self.is_visible = !self.is_visible;
    }
}

/// Axis-aligned box, inclusive on every face.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    /// Box spanning two corners in any order.
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn from_center_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self::new(center - half_extents.abs(), center + half_extents.abs())
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}
