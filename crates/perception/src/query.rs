use glam::Vec3;
use std::collections::HashMap;
use worldcell_common::{EntityId, PerceptionMask};
use worldcell_ecs::ComponentStore;
use worldcell_kernel::World;
use worldcell_stream::Grid;

/// Radius query over perceivable entities.
pub trait SpatialQuery {
    /// Entities whose category intersects `mask` within `radius` of `center`.
    ///
    /// Never returns an entity farther than `radius`.
    fn query_radius(&self, center: Vec3, radius: f32, mask: PerceptionMask) -> Vec<EntityId>;

    /// Unrestricted query: every entity matching `mask`.
    fn query_all(&self, mask: PerceptionMask) -> Vec<EntityId> {
        self.query_radius(Vec3::ZERO, f32::INFINITY, mask)
    }
}

/// Bucket coordinate on the XZ plane. Unclamped, unlike grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Bucket {
    x: i64,
    z: i64,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    entity: EntityId,
    position: Vec3,
    mask: PerceptionMask,
}

/// Uniform bucket index of perceivable entities.
///
/// Entities are assigned to buckets based on their XZ position divided by
/// the bucket size. Rebuilt wholesale before a scan.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    bucket_size: f32,
    buckets: HashMap<Bucket, Vec<Entry>>,
    len: usize,
}

impl SpatialIndex {
    /// Index bucketed like `grid`'s cells.
    pub fn new(grid: &Grid) -> Self {
        Self {
            bucket_size: grid.cell_size(),
            buckets: HashMap::new(),
            len: 0,
        }
    }

    /// Number of indexed entities.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of non-empty buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.len = 0;
    }

    /// Add one entity. Entities without a category are not indexed.
    pub fn insert(&mut self, entity: EntityId, position: Vec3, mask: PerceptionMask) {
        if mask.is_empty() {
            return;
        }
        let bucket = self.bucket_of(position);
        self.buckets.entry(bucket).or_default().push(Entry {
            entity,
            position,
            mask,
        });
        self.len += 1;
    }

    /// Rebuild from every perceivable entity of `scene`.
    pub fn rebuild(&mut self, world: &World, components: &ComponentStore, scene: &str) {
        self.clear();
        for (id, data) in world.entities_in_scene(scene) {
            self.insert(id, data.transform.position, components.perception_mask(id));
        }
        tracing::trace!(
            scene,
            entities = self.len,
            buckets = self.buckets.len(),
            "spatial index rebuilt"
        );
    }

    fn bucket_of(&self, pos: Vec3) -> Bucket {
        Bucket {
            x: (pos.x / self.bucket_size).floor() as i64,
            z: (pos.z / self.bucket_size).floor() as i64,
        }
    }

    fn collect<'a>(
        entries: impl Iterator<Item = &'a Entry>,
        center: Vec3,
        radius: f32,
        mask: PerceptionMask,
    ) -> Vec<EntityId> {
        let radius_sq = radius * radius;
        let mut hits: Vec<(f32, EntityId)> = entries
            .filter(|e| e.mask.intersects(mask))
            .map(|e| (e.position.distance_squared(center), e.entity))
            .filter(|(d, _)| *d <= radius_sq)
            .collect();
        hits.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        hits.into_iter().map(|(_, id)| id).collect()
    }
}

impl SpatialQuery for SpatialIndex {
    fn query_radius(&self, center: Vec3, radius: f32, mask: PerceptionMask) -> Vec<EntityId> {
        if radius.is_nan() || radius < 0.0 || mask.is_empty() {
            return Vec::new();
        }
        if !radius.is_finite() {
            return self.query_all(mask);
        }

        let min = self.bucket_of(center - Vec3::splat(radius));
        let max = self.bucket_of(center + Vec3::splat(radius));
        let width = max.x.saturating_sub(min.x).saturating_add(1);
        let depth = max.z.saturating_sub(min.z).saturating_add(1);
        let span = width.saturating_mul(depth);
        if span as usize > self.buckets.len() {
            // Fewer occupied buckets than buckets in range: scan them all.
            return Self::collect(self.buckets.values().flatten(), center, radius, mask);
        }

        let mut in_range = Vec::new();
        for x in min.x..=max.x {
            for z in min.z..=max.z {
                if let Some(entries) = self.buckets.get(&Bucket { x, z }) {
                    in_range.extend(entries.iter());
                }
            }
        }
        Self::collect(in_range.into_iter(), center, radius, mask)
    }

    fn query_all(&self, mask: PerceptionMask) -> Vec<EntityId> {
        let mut hits: Vec<EntityId> = self
            .buckets
            .values()
            .flatten()
            .filter(|e| e.mask.intersects(mask))
            .map(|e| e.entity)
            .collect();
        hits.sort();
        hits
    }
}
