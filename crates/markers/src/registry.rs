use glam::Vec3;
use std::collections::BTreeMap;
use worldcell_common::EntityId;
use worldcell_stream::Grid;

use crate::encoding::encode;
use crate::marker::{Bounds, Marker, MarkerId};

/// Flat set of markers keyed by id.
#[derive(Debug, Clone, Default)]
pub struct MarkerRegistry {
    markers: BTreeMap<MarkerId, Marker>,
}

impl MarkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Insert or replace. Returns the marker previously stored under the id.
    pub fn register(&mut self, marker: Marker) -> Option<Marker> {
        tracing::debug!(id = %marker.id, cell = %marker.cell_id, "marker registered");
        self.markers.insert(marker.id.clone(), marker)
    }

    pub fn unregister(&mut self, id: &MarkerId) -> Option<Marker> {
        self.markers.remove(id)
    }

    /// Remove every marker owned by `owner`. Returns the removed markers.
    pub fn unregister_owner(&mut self, owner: EntityId) -> Vec<Marker> {
        let ids: Vec<MarkerId> = self
            .markers
            .values()
            .filter(|m| m.owner == Some(owner))
            .map(|m| m.id.clone())
            .collect();
        ids.iter().filter_map(|id| self.markers.remove(id)).collect()
    }

    pub fn marker(&self, id: &MarkerId) -> Option<&Marker> {
        self.markers.get(id)
    }

    pub fn all(&self) -> impl Iterator<Item = &Marker> {
        self.markers.values()
    }

    pub fn markers_in_cell<'a>(&'a self, cell_id: &'a str) -> impl Iterator<Item = &'a Marker> {
        self.markers.values().filter(move |m| m.cell_id == cell_id)
    }

    /// Flip visibility of every marker in `cell_id`. Returns how many flipped.
    pub fn toggle_cell_visibility(&mut self, cell_id: &str) -> usize {
        let mut toggled = 0;
        for marker in self.markers.values_mut().filter(|m| m.cell_id == cell_id) {
            marker.toggle();
            toggled += 1;
        }
        toggled
    }

    /// Flip visibility of every marker whose last known position is inside
    /// `bounds`. Returns how many flipped.
    pub fn toggle_markers_in_bounds(&mut self, bounds: &Bounds) -> usize {
        let mut toggled = 0;
        for marker in self
            .markers
            .values_mut()
            .filter(|m| bounds.contains(m.last_known_position))
        {
            marker.toggle();
            toggled += 1;
        }
        toggled
    }

    /// Markers within `radius` of `center`, measured between the encoded
    /// forms of both points under `key`.
    ///
    /// The comparison happens in encoded space, so the result only matches a
    /// plain distance check for a zero key.
    pub fn markers_in_radius(&self, center: Vec3, radius: f32, key: Vec3) -> Vec<&Marker> {
        if radius.is_nan() || radius < 0.0 {
            return Vec::new();
        }
        let center = encode(center, key).as_dvec3();
        let radius_sq = f64::from(radius) * f64::from(radius);
        self.markers
            .values()
            .filter(|m| {
                encode(m.last_known_position, key)
                    .as_dvec3()
                    .distance_squared(center)
                    <= radius_sq
            })
            .collect()
    }

    /// Move a marker and re-derive its cell label. Returns false for an
    /// unknown id.
    pub fn relocate(&mut self, id: &MarkerId, position: Vec3, grid: &Grid) -> bool {
        let Some(marker) = self.markers.get_mut(id) else {
            return false;
        };
        marker.last_known_position = position;
        marker.cell_id = grid.cell_id(position).to_string();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> MarkerRegistry {
        let mut r = MarkerRegistry::new();
        r.register(Marker::new("forge", "Cell_26", "Forge", Vec3::new(25.0, 0.0, 35.0)));
        r.register(Marker::new("inn", "Cell_26", "Inn", Vec3::new(28.0, 0.0, 31.0)));
        r.register(Marker::new("gate", "Cell_27", "Gate", Vec3::new(35.0, 0.0, 35.0)));
        r
    }

    fn ids<'a>(markers: impl IntoIterator<Item = &'a Marker>) -> Vec<&'a str> {
        markers.into_iter().map(|m| m.id.0.as_str()).collect()
    }

    #[test]
    fn register_replaces_same_id() {
        let mut r = registry();
        let old = r.register(Marker::new("inn", "Cell_3", "New Inn", Vec3::ZERO));
        assert_eq!(old.map(|m| m.display_name), Some("Inn".to_string()));
        assert_eq!(r.len(), 3);
        assert_eq!(r.marker(&"inn".into()).map(|m| m.cell_id.as_str()), Some("Cell_3"));
    }

    #[test]
    fn unregister_and_lookup() {
        let mut r = registry();
        assert!(r.unregister(&"forge".into()).is_some());
        assert!(r.unregister(&"forge".into()).is_none());
        assert!(r.marker(&"forge".into()).is_none());
        assert_eq!(ids(r.all()), vec!["gate", "inn"]);
    }

    #[test]
    fn markers_in_cell_filters_by_label() {
        let r = registry();
        assert_eq!(ids(r.markers_in_cell("Cell_26")), vec!["forge", "inn"]);
        assert_eq!(r.markers_in_cell("Cell_0").count(), 0);
    }

    #[test]
    fn cell_toggle_flips_each_marker() {
        let mut r = registry();
        assert_eq!(r.toggle_cell_visibility("Cell_26"), 2);
        assert!(!r.marker(&"forge".into()).unwrap().is_visible);
        assert!(r.marker(&"gate".into()).unwrap().is_visible);
        assert_eq!(r.toggle_cell_visibility("Cell_26"), 2);
        assert!(r.marker(&"forge".into()).unwrap().is_visible);
    }

    #[test]
    fn bounds_toggle_uses_position_not_cell() {
        let mut r = registry();
        let bounds = Bounds::new(Vec3::new(24.0, -1.0, 34.0), Vec3::new(36.0, 1.0, 36.0));
        assert_eq!(r.toggle_markers_in_bounds(&bounds), 2);
        assert!(!r.marker(&"forge".into()).unwrap().is_visible);
        assert!(!r.marker(&"gate".into()).unwrap().is_visible);
        assert!(r.marker(&"inn".into()).unwrap().is_visible);
    }

    #[test]
    fn owner_removal_drops_only_owned_markers() {
        let mut r = registry();
        let npc = EntityId::new();
        r.register(Marker::new("quest", "Cell_27", "Quest", Vec3::ZERO).owned_by(npc));
        r.register(Marker::new("quest2", "Cell_27", "Quest 2", Vec3::ZERO).owned_by(npc));

        let removed = r.unregister_owner(npc);
        assert_eq!(ids(&removed), vec!["quest", "quest2"]);
        assert_eq!(r.len(), 3);
        assert!(r.unregister_owner(npc).is_empty());
    }

    #[test]
    fn radius_with_zero_key_is_plain_distance() {
        let r = registry();
        let hits = r.markers_in_radius(Vec3::new(25.0, 0.0, 35.0), 5.0, Vec3::ZERO);
        assert_eq!(ids(hits), vec!["forge", "inn"]);
        assert!(r.markers_in_radius(Vec3::ZERO, -1.0, Vec3::ZERO).is_empty());
        assert!(r.markers_in_radius(Vec3::ZERO, f32::NAN, Vec3::ZERO).is_empty());
    }

    #[test]
    fn radius_is_measured_in_encoded_space() {
        let r = registry();
        let key = Vec3::new(16.0, 0.0, 0.0);
        // gate 35 -> 51 drifts away once encoded; forge and inn stay close.
        let center = Vec3::new(30.0, 0.0, 35.0);
        let plain = r.markers_in_radius(center, 5.0, Vec3::ZERO);
        assert_eq!(ids(plain), vec!["forge", "gate", "inn"]);
        let encoded = r.markers_in_radius(center, 5.0, key);
        assert_eq!(ids(encoded), vec!["forge", "inn"]);
    }

    #[test]
    fn radius_holds_for_coordinates_beyond_f32_precision() {
        let mut r = MarkerRegistry::new();
        r.register(Marker::new(
            "outpost",
            "Cell_7",
            "Outpost",
            Vec3::new(16_777_218.0, 0.0, 0.0),
        ));
        let key = Vec3::new(1.0, 0.0, 0.0);
        // Encoded x: 16_777_219 for the marker, 16_777_221 for the center.
        // Both collapse to 16_777_220 as f32.
        let center = Vec3::new(16_777_220.0, 0.0, 0.0);
        assert!(r.markers_in_radius(center, 1.5, key).is_empty());
        assert_eq!(ids(r.markers_in_radius(center, 2.0, key)), vec!["outpost"]);
    }

    #[test]
    fn relocate_updates_cell_label() {
        let mut r = registry();
        let grid = Grid::new(8, 8, 10.0).unwrap();
        assert!(r.relocate(&"gate".into(), Vec3::new(5.0, 0.0, 5.0), &grid));
        let gate = r.marker(&"gate".into()).unwrap();
        assert_eq!(gate.cell_id, "Cell_0");
        assert_eq!(gate.last_known_position, Vec3::new(5.0, 0.0, 5.0));
        assert!(!r.relocate(&"nowhere".into(), Vec3::ZERO, &grid));
    }
}
