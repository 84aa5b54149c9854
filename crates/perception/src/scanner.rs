use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use worldcell_common::{CellId, EntityId, PerceptionMask, VisionCache, WeightingContext};
use worldcell_events::{EventBus, VisionBatchUpdated};
use worldcell_stream::Grid;

use crate::query::SpatialQuery;
use crate::reputation::{ReputationSource, weighting_context};

/// Scan scheduling and query shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    /// Time between scans.
    pub interval: Duration,
    /// Upper bound on the cell-based query radius.
    pub max_distance: f32,
    /// Restrict queries to the tracked cell and its neighbours when known.
    pub use_cell_based_scanning: bool,
    /// One query per entry, every scan.
    pub categories: Vec<PerceptionMask>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(250),
            max_distance: 100.0,
            use_cell_based_scanning: true,
            categories: PerceptionMask::DEFAULT_CATEGORIES.to_vec(),
        }
    }
}

/// Collaborators lent to a scan. Either may be missing.
#[derive(Clone, Copy, Default)]
pub struct ScanContext<'a> {
    pub spatial: Option<&'a dyn SpatialQuery>,
    pub reputation: Option<&'a dyn ReputationSource>,
}

/// Per-scan statistics for instrumentation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanStats {
    pub scanned_at: Duration,
    /// Spatial queries issued; equals the category count when a query
    /// collaborator is installed, zero otherwise.
    pub queries: usize,
    pub hits: usize,
    pub cell_based: bool,
    pub subscribers_notified: usize,
    pub broadcast_delivered: usize,
    pub elapsed: Duration,
}

/// Receives the whole vision cache once per scan.
pub trait PerceptionSubscriber {
    fn on_vision_batch(&mut self, cache: &VisionCache);
}

impl<F> PerceptionSubscriber for F
where
    F: FnMut(&VisionCache),
{
    fn on_vision_batch(&mut self, cache: &VisionCache) {
        self(cache)
    }
}

/// Handle returned by [`VisionBatchScanner::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

/// Runs shared spatial queries on a fixed interval and fans the results
/// out to every perception subscriber.
///
/// The caller drives time: `tick` compares the supplied clock against the
/// next scheduled scan, so frame rate and scan rate are independent.
pub struct VisionBatchScanner {
    config: ScanConfig,
    grid: Grid,
    next_scan: Duration,
    cache: VisionCache,
    subscribers: BTreeMap<SubscriberId, Box<dyn PerceptionSubscriber>>,
    next_subscriber: u64,
    bus: Option<EventBus>,
    last_stats: Option<ScanStats>,
    scans: u64,
}

impl VisionBatchScanner {
    pub fn new(grid: Grid, config: ScanConfig) -> Self {
        Self {
            config,
            grid,
            next_scan: Duration::ZERO,
            cache: VisionCache::new(),
            subscribers: BTreeMap::new(),
            next_subscriber: 0,
            bus: None,
            last_stats: None,
            scans: 0,
        }
    }

    /// Broadcast a [`VisionBatchUpdated`] on `bus` after every scan.
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn subscribe(&mut self, subscriber: impl PerceptionSubscriber + 'static) -> SubscriberId {
        let id = SubscriberId(self.next_subscriber);
        self.next_subscriber += 1;
        self.subscribers.insert(id, Box::new(subscriber));
        id
    }

    /// Remove a subscriber. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn next_scan(&self) -> Duration {
        self.next_scan
    }

    pub fn is_due(&self, now: Duration) -> bool {
        now >= self.next_scan
    }

    /// Scan if one is due at `now`.
    pub fn tick(
        &mut self,
        now: Duration,
        current_cell: Option<CellId>,
        ctx: ScanContext<'_>,
    ) -> Option<ScanStats> {
        if !self.is_due(now) {
            return None;
        }
        Some(self.scan_now(now, current_cell, ctx))
    }

    /// Scan immediately and schedule the next one an interval later.
    pub fn scan_now(
        &mut self,
        now: Duration,
        current_cell: Option<CellId>,
        ctx: ScanContext<'_>,
    ) -> ScanStats {
        let _span = tracing::info_span!("vision_scan", now = ?now).entered();
        let start = Instant::now();
        self.next_scan = now + self.config.interval;
        self.scans += 1;
        self.cache.clear();

        let mut stats = ScanStats {
            scanned_at: now,
            ..ScanStats::default()
        };

        let Some(spatial) = ctx.spatial else {
            tracing::warn!("no spatial query installed, vision cache left empty");
            stats.elapsed = start.elapsed();
            self.last_stats = Some(stats.clone());
            return stats;
        };

        let center = if self.config.use_cell_based_scanning {
            current_cell.map(|cell| self.grid.cell_center(cell))
        } else {
            None
        };
        let radius = (2.0 * self.grid.cell_size()).min(self.config.max_distance);
        stats.cell_based = center.is_some();

        for &category in &self.config.categories {
            let hits = match center {
                Some(center) => spatial.query_radius(center, radius, category),
                None => spatial.query_all(category),
            };
            stats.queries += 1;
            stats.hits += hits.len();
            self.cache.insert(category, hits);
        }

        for subscriber in self.subscribers.values_mut() {
            subscriber.on_vision_batch(&self.cache);
            stats.subscribers_notified += 1;
        }

        if let Some(bus) = &self.bus {
            let weights = match ctx.reputation {
                Some(source) => weighting_context(source),
                None => {
                    tracing::warn!("no reputation source installed, broadcasting empty weights");
                    WeightingContext::new()
                }
            };
            stats.broadcast_delivered = bus.publish(VisionBatchUpdated {
                cache: self.cache.clone(),
                weights,
                scanned_at: now,
            });
        }

        stats.elapsed = start.elapsed();
        tracing::trace!(
            queries = stats.queries,
            hits = stats.hits,
            cell_based = stats.cell_based,
            subscribers = stats.subscribers_notified,
            "vision scan complete"
        );
        self.last_stats = Some(stats.clone());
        stats
    }

    /// Immutable view of the last results for `category`.
    pub fn results(&self, category: PerceptionMask) -> &[EntityId] {
        self.cache.get(category)
    }

    /// Owned copy of the last results for `category`.
    pub fn get_results(&self, category: PerceptionMask) -> Vec<EntityId> {
        self.cache.get(category).to_vec()
    }

    pub fn cache(&self) -> &VisionCache {
        &self.cache
    }

    pub fn last_stats(&self) -> Option<&ScanStats> {
        self.last_stats.as_ref()
    }

    pub fn scan_count(&self) -> u64 {
        self.scans
    }
}

impl std::fmt::Debug for VisionBatchScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionBatchScanner")
            .field("config", &self.config)
            .field("next_scan", &self.next_scan)
            .field("subscribers", &self.subscribers.len())
            .field("has_bus", &self.bus.is_some())
            .field("scans", &self.scans)
            .finish()
    }
}
