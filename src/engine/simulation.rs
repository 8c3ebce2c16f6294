use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use eframe::egui::{Pos2, pos2};
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::bubble::{Bubble, BubbleError, BubbleId, BubbleRecord};
use crate::config::EngineConfig;
use crate::store::{BubbleStore, ContentProvider};

use super::collision::{Bounds, Resolver, collides};
use super::graph::{Connection, GraphIndex};
use super::work::WorkQueue;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Toggle {
    Expanded(Vec<BubbleId>),
    Collapsed(Vec<BubbleId>),
}

/// Owns the visible set and every structural change to it.
///
/// Structural changes (load, expand, collapse, show) happen on the calling
/// thread under the graph write lock. Collision cascades, settling, and
/// persistence of removed bubbles are posted to one serialized work queue.
pub struct Simulation {
    graph: Arc<RwLock<GraphIndex>>,
    work: WorkQueue,
    provider: Arc<dyn ContentProvider>,
    store: Arc<dyn BubbleStore>,
    bounds: OnceLock<Bounds>,
    rng: Mutex<StdRng>,
    config: EngineConfig,
}

impl Simulation {
    pub fn new(
        config: EngineConfig,
        provider: Arc<dyn ContentProvider>,
        store: Arc<dyn BubbleStore>,
        seed: Option<u64>,
    ) -> Result<Self> {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            graph: Arc::new(RwLock::new(GraphIndex::new())),
            work: WorkQueue::spawn("bubble-work")?,
            provider,
            store,
            bounds: OnceLock::new(),
            rng: Mutex::new(rng),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn graph(&self) -> Arc<RwLock<GraphIndex>> {
        Arc::clone(&self.graph)
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds.get().copied()
    }

    /// Fixes the surface size for the session. Setting the same size again is
    /// accepted; a different size is not. Bubbles loaded before this call are
    /// placed now.
    pub fn set_bounds(&self, width: f32, height: f32) -> Result<(), BubbleError> {
        let bounds = Bounds::new(width, height)?;
        if let Some(existing) = self.bounds.get() {
            return if *existing == bounds {
                Ok(())
            } else {
                Err(BubbleError::BoundsAlreadySet)
            };
        }
        if self.bounds.set(bounds).is_err() {
            return Err(BubbleError::BoundsAlreadySet);
        }
        info!(width, height, "surface bounds fixed");

        let mut graph = self.graph.write();
        let unplaced = graph
            .bubbles()
            .iter()
            .filter(|bubble| !bubble.is_placed())
            .map(Bubble::id)
            .collect::<Vec<_>>();
        for id in unplaced {
            let Some(radius) = graph.get(id).map(Bubble::radius) else {
                continue;
            };
            let center = self.placement(&graph, radius, bounds);
            if let Some(bubble) = graph.get_mut(id) {
                bubble.place(center);
            }
        }
        Ok(())
    }

    pub fn load_top_level(&self, min_priority: i32) -> Result<Vec<BubbleId>> {
        self.work.flush();
        let records = self
            .provider
            .fetch_top_level(min_priority)
            .context("failed to fetch top-level bubbles")?;
        let added = self.insert_records(&records);
        info!(count = added.len(), min_priority, "loaded top-level bubbles");
        Ok(added)
    }

    /// Makes every linked child of `parent` visible. Returns the ids added.
    /// Waits for queued persistence first, so children come back where they
    /// were left.
    pub fn expand(&self, parent: BubbleId) -> Result<Vec<BubbleId>> {
        let missing = {
            let graph = self.graph.read();
            graph
                .children_of(parent)
                .into_iter()
                .filter(|&child| !graph.contains(child))
                .collect::<BTreeSet<_>>()
        };
        if missing.is_empty() {
            return Ok(Vec::new());
        }

        self.work.flush();
        let records = self
            .provider
            .fetch_bubbles(&missing)
            .with_context(|| format!("failed to fetch children of bubble {parent}"))?;
        for absent in missing
            .iter()
            .filter(|&&id| records.iter().all(|record| record.id != id))
        {
            warn!(parent, child = absent, "linked bubble not found by provider");
        }

        let added = self.insert_records(&records);
        debug!(parent, added = ?added, "expanded");
        Ok(added)
    }

    /// Removes every linked child of `parent` if all of them are visible, and
    /// queues the removed bubbles for persistence. Returns the ids removed.
    pub fn collapse(&self, parent: BubbleId) -> Vec<BubbleId> {
        let removed = {
            let mut graph = self.graph.write();
            if !graph.has_children_visible(parent) {
                return Vec::new();
            }
            graph
                .children_of(parent)
                .into_iter()
                .filter_map(|child| graph.remove(child))
                .collect::<Vec<_>>()
        };

        let ids = removed.iter().map(Bubble::id).collect::<Vec<_>>();
        let records = removed.iter().map(Bubble::to_record).collect::<Vec<_>>();
        if !records.is_empty() {
            let store = Arc::clone(&self.store);
            self.work.post(move || {
                if let Err(error) = store.upsert(&records) {
                    warn!(error = %format!("{error:#}"), "failed to persist collapsed bubbles");
                }
            });
        }
        debug!(parent, removed = ?ids, "collapsed");
        ids
    }

    pub fn toggle(&self, parent: BubbleId) -> Result<Toggle> {
        if self.has_children_visible(parent) {
            Ok(Toggle::Collapsed(self.collapse(parent)))
        } else {
            self.expand(parent).map(Toggle::Expanded)
        }
    }

    /// Puts a single record (e.g. a search hit) into the visible set.
    /// Returns `false` when it was already visible or could not be built.
    pub fn show(&self, record: &BubbleRecord) -> bool {
        !self.insert_records(std::slice::from_ref(record)).is_empty()
    }

    pub fn has_children_visible(&self, id: BubbleId) -> bool {
        self.graph.read().has_children_visible(id)
    }

    pub fn visible_ids(&self) -> Vec<BubbleId> {
        self.graph.read().ids()
    }

    pub fn connections(&self) -> Vec<Connection> {
        self.graph.read().connections()
    }

    /// Queues a push cascade starting from `source`.
    pub fn post_cascade(&self, source: BubbleId) -> bool {
        let Some(bounds) = self.bounds() else {
            debug!(source, "bounds not set; skipping cascade");
            return false;
        };
        let resolver = Resolver::new(bounds, self.config.settle_iterations);
        let graph = Arc::clone(&self.graph);
        self.work.post(move || {
            let displaced = resolver.cascade(&graph, source);
            if !displaced.is_empty() {
                debug!(source, displaced = displaced.len(), "cascade resolved");
            }
        })
    }

    /// Queues returning every bubble to the inert state.
    pub fn post_settle_all(&self) -> bool {
        let graph = Arc::clone(&self.graph);
        self.work.post(move || graph.write().settle_all())
    }

    /// Waits for every queued job to finish.
    pub fn flush(&self) {
        self.work.flush();
    }

    /// Upserts every visible bubble in one batch.
    pub fn persist_all(&self) -> Result<usize> {
        let records = self
            .graph
            .read()
            .bubbles()
            .iter()
            .map(Bubble::to_record)
            .collect::<Vec<_>>();
        if records.is_empty() {
            return Ok(0);
        }
        self.store
            .upsert(&records)
            .context("failed to persist visible bubbles")
    }

    pub fn shutdown(&self) {
        self.work.shutdown();
    }

    fn insert_records(&self, records: &[BubbleRecord]) -> Vec<BubbleId> {
        let bounds = self.bounds();
        let mut graph = self.graph.write();
        let mut added = Vec::new();

        for record in records {
            if graph.contains(record.id) {
                continue;
            }
            let mut bubble = match Bubble::from_record(record, self.config.default_diameter) {
                Ok(bubble) => bubble,
                Err(error) => {
                    warn!(id = record.id, %error, "skipping unusable bubble record");
                    continue;
                }
            };

            if let Some(bounds) = bounds {
                let center = if bubble.is_placed() {
                    bounds.clamp(bubble.center(), bubble.radius()).0
                } else {
                    self.placement(&graph, bubble.radius(), bounds)
                };
                bubble.place(center);
            }

            added.push(bubble.id());
            graph.insert(bubble);
        }
        added
    }

    /// Picks a random coarse grid cell (cell size = radius) that does not
    /// overlap any visible bubble, giving up after the configured number of
    /// attempts and keeping the last candidate.
    fn placement(&self, graph: &GraphIndex, radius: f32, bounds: Bounds) -> Pos2 {
        let columns = ((bounds.max_x / radius).floor() as u32).max(1);
        let rows = (((bounds.max_y / radius).floor() as u32).saturating_sub(1)).max(1);
        let mut rng = self.rng.lock();

        let mut candidate = Pos2::ZERO;
        for _ in 0..self.config.placement_attempts.max(1) {
            let x = radius * rng.gen_range(0..columns) as f32;
            let y = radius * rng.gen_range(0..rows) as f32;
            candidate = bounds.clamp(pos2(x, y), radius).0;

            let probe = Bubble::new(BubbleId::MIN, radius).map(|probe| probe.with_center(candidate));
            let Ok(probe) = probe else {
                break;
            };
            if !graph.bubbles().iter().any(|other| collides(&probe, other)) {
                break;
            }
        }
        candidate
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use crate::bubble::Movement;
    use crate::store::{JsonStore, QueryFilter};

    use super::*;

    fn store() -> Arc<JsonStore> {
        let store = JsonStore::in_memory();
        store
            .upsert(&[
                BubbleRecord::new(1, "root").with_priority(5).with_links([1, 2, 3]),
                BubbleRecord::new(2, "two").with_links([1, 4]),
                BubbleRecord::new(3, "three").with_position(700, 500),
                BubbleRecord::new(4, "four"),
            ])
            .unwrap();
        Arc::new(store)
    }

    fn simulation(store: &Arc<JsonStore>) -> Simulation {
        let provider: Arc<dyn ContentProvider> = store.clone();
        let persistence: Arc<dyn BubbleStore> = store.clone();
        let simulation =
            Simulation::new(EngineConfig::default(), provider, persistence, Some(7)).unwrap();
        simulation.set_bounds(800.0, 600.0).unwrap();
        simulation
    }

    #[test]
    fn bounds_are_fixed_once() {
        let store = store();
        let simulation = simulation(&store);
        assert!(simulation.set_bounds(800.0, 600.0).is_ok());
        assert_eq!(
            simulation.set_bounds(1024.0, 768.0),
            Err(BubbleError::BoundsAlreadySet)
        );
    }

    #[test]
    fn expand_then_collapse_restores_visible_set() {
        let store = store();
        let simulation = simulation(&store);
        assert_eq!(simulation.load_top_level(0).unwrap(), vec![1]);
        let before = simulation.visible_ids();

        let mut added = simulation.expand(1).unwrap();
        added.sort();
        assert_eq!(added, vec![2, 3]);
        assert!(simulation.has_children_visible(1));

        let graph = simulation.graph();
        {
            let graph = graph.read();
            let three = graph.get(3).unwrap();
            assert_eq!(three.center(), pos2(700.0, 500.0));
            for bubble in graph.bubbles() {
                let (clamped, changed) = simulation.bounds().unwrap().clamp(bubble.center(), bubble.radius());
                assert!(!changed, "bubble {} outside bounds at {clamped:?}", bubble.id());
            }
        }

        let mut removed = simulation.collapse(1);
        removed.sort();
        assert_eq!(removed, vec![2, 3]);
        assert_eq!(simulation.visible_ids(), before);
    }

    #[test]
    fn collapse_requires_every_child_visible() {
        let store = store();
        let simulation = simulation(&store);
        simulation.load_top_level(0).unwrap();
        simulation.expand(1).unwrap();
        assert!(!simulation.has_children_visible(2));
        assert!(simulation.collapse(2).is_empty());
        assert_eq!(simulation.visible_ids().len(), 3);
    }

    #[test]
    fn collapse_persists_removed_positions() {
        let store = store();
        let simulation = simulation(&store);
        simulation.load_top_level(0).unwrap();
        simulation.expand(1).unwrap();
        simulation.graph().write().get_mut(2).unwrap().place(pos2(123.0, 321.0));

        simulation.collapse(1);
        simulation.flush();

        let rows = store.query(&QueryFilter::Ids(BTreeSet::from([2]))).unwrap();
        assert_eq!(rows[0].position, Some((123, 321)));
    }

    struct SlowStore {
        inner: Arc<JsonStore>,
        delay: std::time::Duration,
    }

    impl BubbleStore for SlowStore {
        fn upsert(&self, records: &[BubbleRecord]) -> Result<usize> {
            std::thread::sleep(self.delay);
            self.inner.upsert(records)
        }

        fn query(&self, filter: &QueryFilter) -> Result<Vec<BubbleRecord>> {
            self.inner.query(filter)
        }
    }

    #[test]
    fn quick_reexpand_sees_position_left_by_collapse() {
        let store = store();
        let provider: Arc<dyn ContentProvider> = store.clone();
        let persistence: Arc<dyn BubbleStore> = Arc::new(SlowStore {
            inner: store.clone(),
            delay: std::time::Duration::from_millis(200),
        });
        let simulation =
            Simulation::new(EngineConfig::default(), provider, persistence, Some(7)).unwrap();
        simulation.set_bounds(800.0, 600.0).unwrap();
        simulation.load_top_level(0).unwrap();
        simulation.expand(1).unwrap();
        simulation.graph().write().get_mut(2).unwrap().place(pos2(300.0, 200.0));

        assert!(simulation.collapse(1).contains(&2));
        simulation.expand(1).unwrap();

        let center = simulation.graph().read().get(2).unwrap().center();
        assert_eq!(center, pos2(300.0, 200.0));
    }

    #[test]
    fn toggle_alternates() {
        let store = store();
        let simulation = simulation(&store);
        simulation.load_top_level(0).unwrap();
        assert!(matches!(simulation.toggle(1).unwrap(), Toggle::Expanded(ids) if ids.len() == 2));
        assert!(matches!(simulation.toggle(1).unwrap(), Toggle::Collapsed(ids) if ids.len() == 2));
        assert_eq!(simulation.visible_ids(), vec![1]);
    }

    #[test]
    fn show_adds_a_search_hit_once() {
        let store = store();
        let simulation = simulation(&store);
        let hit = store.search("four").unwrap().remove(0);
        assert!(simulation.show(&hit));
        assert!(!simulation.show(&hit));
        assert_eq!(simulation.visible_ids(), vec![4]);
    }

    #[test]
    fn bubbles_loaded_before_bounds_are_placed_later() {
        let store = store();
        let provider: Arc<dyn ContentProvider> = store.clone();
        let persistence: Arc<dyn BubbleStore> = store.clone();
        let simulation =
            Simulation::new(EngineConfig::default(), provider, persistence, Some(1)).unwrap();
        simulation.load_top_level(0).unwrap();
        assert!(!simulation.graph().read().get(1).unwrap().is_placed());

        simulation.set_bounds(400.0, 400.0).unwrap();
        assert!(simulation.graph().read().get(1).unwrap().is_placed());
    }

    #[test]
    fn cascade_and_settle_run_on_the_queue() {
        let store = store();
        let simulation = simulation(&store);
        simulation.load_top_level(0).unwrap();
        simulation.expand(1).unwrap();
        {
            let graph = simulation.graph();
            let mut graph = graph.write();
            let root = graph.get_mut(1).unwrap();
            root.place(pos2(300.0, 300.0));
            root.movement = Movement::Moving;
            graph.get_mut(2).unwrap().place(pos2(320.0, 300.0));
        }

        assert!(simulation.post_cascade(1));
        simulation.flush();
        {
            let graph = simulation.graph();
            let graph = graph.read();
            let two = graph.get(2).unwrap();
            assert_eq!(two.movement, Movement::Automatic);
            assert!(two.center().distance(pos2(300.0, 300.0)) >= 50.0 - 0.05);
        }

        simulation.post_settle_all();
        simulation.flush();
        let graph = simulation.graph();
        assert!(graph.read().bubbles().iter().all(|b| b.movement == Movement::Inert));
    }

    #[test]
    fn persist_all_writes_every_visible_bubble() {
        let store = store();
        let simulation = simulation(&store);
        simulation.load_top_level(0).unwrap();
        simulation.expand(1).unwrap();
        assert_eq!(simulation.persist_all().unwrap(), 3);

        let placed = store
            .query(&QueryFilter::Ids(BTreeSet::from([1, 2, 3])))
            .unwrap()
            .into_iter()
            .filter(|record| record.position.is_some())
            .count();
        assert_eq!(placed, 3);
    }
}
