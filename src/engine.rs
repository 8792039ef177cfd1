//! Engine context: pools, configuration, submission and drain

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use crate::bucket::BucketTable;
use crate::dispatch::{Pending, RayonPool, WorkerPool};
use crate::handoff::Gate;
use crate::pool::{unit_pool_size, units_for_span, Slot, UnitSlot};
use crate::unit::{Extent, TriExtent, UnitExtents, NO_UNIT};
use crate::{ScanlineFn, MAX_VERTEX_PARAMS};

/// Bound on a drain before it is considered wedged
const WAIT_TIMEOUT: Duration = Duration::from_secs(100);

/// Engine configuration
///
/// `max_polys` sizes all three pools; the engine asserts at construction
/// that it is nonzero and small enough for 16-bit slot indices. The edge
/// flags apply to every render call made through the engine.
#[derive(Debug,Copy,Clone)]
pub struct Config {
    /// Polygons in flight between drains
    pub max_polys: usize,
    /// Permit the quad and polygon entry points
    pub allow_quads: bool,
    /// Extend every extent one column so the right edge is drawn
    pub include_right_edge: bool,
    /// Include each polygon's bottom scanline
    pub include_bottom_edge: bool,
    /// Run every unit inline during `wait` instead of using workers
    pub no_worker_pool: bool,
    /// Worker thread count for the default pool; `None` picks the
    /// rayon default
    pub workers: Option<usize>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            max_polys: 1024,
            allow_quads: false,
            include_right_edge: false,
            include_bottom_edge: false,
            no_worker_pool: false,
            workers: None,
        }
    }
}

/// Snapshot of the diagnostic counters, taken with [`PolyScan::stats`]
#[derive(Debug,Default,Copy,Clone)]
pub struct Stats {
    /// Polygons queued since construction
    pub polygons: u64,
    /// Work units queued since construction
    pub units: u64,
    /// Drains forced by an exhausted polygon pool
    pub polygon_waits: u64,
    /// Drains forced by an exhausted unit pool
    pub unit_waits: u64,
    /// Drains forced by an exhausted extra-data pool
    pub extra_waits: u64,
    /// Units that found their predecessor still pending
    pub chain_conflicts: u64,
    /// Conflicts that resolved because the predecessor delivered during
    /// the park attempt
    pub chain_resolved: u64,
    /// High-water mark of polygons in flight
    pub polygon_max: usize,
    /// High-water mark of units in flight
    pub unit_max: usize,
    /// High-water mark of extra-data blocks in flight
    pub extra_max: usize,
}

pub(crate) struct StatCounters {
    pub(crate) polygons: AtomicU64,
    pub(crate) units: AtomicU64,
    pub(crate) polygon_waits: AtomicU64,
    pub(crate) unit_waits: AtomicU64,
    pub(crate) extra_waits: AtomicU64,
    pub(crate) chain_conflicts: AtomicU64,
    pub(crate) chain_resolved: AtomicU64,
    pub(crate) polygon_max: AtomicUsize,
    pub(crate) unit_max: AtomicUsize,
    pub(crate) extra_max: AtomicUsize,
}

impl StatCounters {
    fn new() -> Self {
        StatCounters {
            polygons: AtomicU64::new(0),
            units: AtomicU64::new(0),
            polygon_waits: AtomicU64::new(0),
            unit_waits: AtomicU64::new(0),
            extra_waits: AtomicU64::new(0),
            chain_conflicts: AtomicU64::new(0),
            chain_resolved: AtomicU64::new(0),
            polygon_max: AtomicUsize::new(0),
            unit_max: AtomicUsize::new(0),
            extra_max: AtomicUsize::new(0),
        }
    }
}

/// Affine plane of one triangle parameter, anchored at the polygon origin
#[derive(Debug,Default,Copy,Clone)]
pub(crate) struct ParamPlane {
    pub(crate) start: f32,
    pub(crate) dpdx: f32,
    pub(crate) dpdy: f32,
}

/// Per-call polygon record referenced by every work unit of the call
pub(crate) struct Polygon<D, E> {
    pub(crate) dest: Option<D>,
    pub(crate) callback: Option<ScanlineFn<D, E>>,
    pub(crate) extra: u16,
    pub(crate) numparams: u16,
    pub(crate) xorigin: i32,
    pub(crate) yorigin: i32,
    pub(crate) param: [ParamPlane; MAX_VERTEX_PARAMS],
}

impl<D, E> Default for Polygon<D, E> {
    fn default() -> Self {
        Polygon {
            dest: None,
            callback: None,
            extra: 0,
            numparams: 0,
            xorigin: 0,
            yorigin: 0,
            param: [ParamPlane::default(); MAX_VERTEX_PARAMS],
        }
    }
}

/// State shared between the submitting thread and the workers
pub(crate) struct Shared<D, E> {
    pub(crate) polygons: Box<[Slot<Polygon<D, E>>]>,
    pub(crate) units: Box<[UnitSlot]>,
    pub(crate) extras: Box<[Slot<E>]>,
    pub(crate) pending: Pending,
    pub(crate) stats: StatCounters,
}

/// Deferred scanline polygon rasterizer
///
/// Render calls decompose polygons into per-scanline extents, batch them
/// into work units and hand the units to a worker pool; the per-scanline
/// callback runs later on the workers. Units covering the same scanline
/// rows always deliver in submission order. [`wait`](PolyScan::wait)
/// drains everything and recycles the pools.
pub struct PolyScan<D, E>
where
    D: Send + Sync + 'static,
    E: Clone + Default + Send + Sync + 'static,
{
    pub(crate) shared: Arc<Shared<D, E>>,
    pub(crate) queue: Option<Arc<dyn WorkerPool>>,
    pub(crate) config: Config,
    pub(crate) bucket: BucketTable,
    pub(crate) polygon_next: usize,
    pub(crate) unit_next: usize,
    pub(crate) extra_next: usize,
}

impl<D, E> PolyScan<D, E>
where
    D: Send + Sync + 'static,
    E: Clone + Default + Send + Sync + 'static,
{
    /// New engine with the default rayon-backed worker pool, or none if
    /// the config says to run inline
    pub fn new(config: Config) -> Self {
        let queue: Option<Arc<dyn WorkerPool>> = if config.no_worker_pool {
            None
        } else {
            Some(Arc::new(RayonPool::new(config.workers)))
        };
        Self::build(config, queue)
    }

    /// New engine driving an externally supplied worker pool
    pub fn with_worker_pool(config: Config, pool: Arc<dyn WorkerPool>) -> Self {
        assert!(!config.no_worker_pool, "worker pool supplied but disabled in config");
        Self::build(config, Some(pool))
    }

    fn build(config: Config, queue: Option<Arc<dyn WorkerPool>>) -> Self {
        assert!(config.max_polys > 0, "polygon pool must not be empty");
        assert!(config.max_polys < NO_UNIT as usize, "polygon pool exceeds 16-bit slot indices");
        let unit_count = unit_pool_size(config.max_polys);
        let polygons = (0..config.max_polys)
            .map(|_| Slot::new(Polygon::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let units = (0..unit_count)
            .map(|_| UnitSlot::new())
            .collect::<Vec<_>>()
            .into_boxed_slice();
        // one block per polygon plus the carry slot
        let extras = (0..=config.max_polys)
            .map(|_| Slot::new(E::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        debug!(
            "polyscan: {} polygons, {} units, {} extra blocks, {} workers",
            config.max_polys,
            unit_count,
            config.max_polys,
            queue.as_ref().map(|q| q.num_threads()).unwrap_or(0)
        );
        PolyScan {
            shared: Arc::new(Shared {
                polygons,
                units,
                extras,
                pending: Pending::new(),
                stats: StatCounters::new(),
            }),
            queue,
            config,
            bucket: BucketTable::new(),
            polygon_next: 0,
            unit_next: 0,
            extra_next: 1,
        }
    }

    /// Worker threads behind the engine; 0 when running inline
    pub fn workers(&self) -> usize {
        self.queue.as_ref().map(|q| q.num_threads()).unwrap_or(0)
    }

    /// Snapshot the diagnostic counters
    pub fn stats(&self) -> Stats {
        let counters = &self.shared.stats;
        Stats {
            polygons: counters.polygons.load(Ordering::Relaxed),
            units: counters.units.load(Ordering::Relaxed),
            polygon_waits: counters.polygon_waits.load(Ordering::Relaxed),
            unit_waits: counters.unit_waits.load(Ordering::Relaxed),
            extra_waits: counters.extra_waits.load(Ordering::Relaxed),
            chain_conflicts: counters.chain_conflicts.load(Ordering::Relaxed),
            chain_resolved: counters.chain_resolved.load(Ordering::Relaxed),
            polygon_max: counters.polygon_max.load(Ordering::Relaxed),
            unit_max: counters.unit_max.load(Ordering::Relaxed),
            extra_max: counters.extra_max.load(Ordering::Relaxed),
        }
    }

    /// Reserve the extra-data block that subsequent render calls will
    /// carry, draining first if the pool is exhausted
    ///
    /// The block keeps its contents until the drain after next; the most
    /// recently reserved block also survives each drain as the block
    /// calls see when no new one has been reserved.
    pub fn extra_data(&mut self) -> &mut E {
        if self.extra_next + 1 > self.shared.extras.len() {
            self.shared.stats.extra_waits.fetch_add(1, Ordering::Relaxed);
            self.wait("out of extra data");
        }
        let index = self.extra_next;
        self.extra_next += 1;
        self.shared.stats.extra_max.fetch_max(self.extra_next, Ordering::Relaxed);
        // Safety: slot `index` is not attached to any queued polygon this
        // generation and the submitting thread holds &mut self.
        unsafe { self.shared.extras[index].get_mut() }
    }

    /// Drain every queued unit and reset the pools
    ///
    /// Blocks until all outstanding scanlines have been delivered,
    /// running them inline when no worker pool is configured. Afterwards
    /// every polygon, unit and extra-data slot is reclaimed; the most
    /// recently written extra-data block is carried into slot 0 of the
    /// next generation. Waiting with nothing queued is a no-op.
    pub fn wait(&mut self, reason: &str) {
        debug!("polyscan wait: {}", reason);
        match &self.queue {
            Some(_) => {
                if !self.shared.pending.drain(WAIT_TIMEOUT) {
                    warn!(
                        "polyscan wait ({}): units still pending after {:?}, continuing",
                        reason, WAIT_TIMEOUT
                    );
                }
            }
            None => {
                for unitnum in 0..self.unit_next {
                    process_chain(&self.shared, unitnum as u16, 0);
                }
            }
        }
        self.polygon_next = 0;
        self.unit_next = 0;
        self.bucket.reset();
        if self.extra_next > 1 {
            // Safety: every unit has delivered; no worker holds a slot.
            unsafe {
                let carried = self.shared.extras[self.extra_next - 1].get().clone();
                *self.shared.extras[0].get_mut() = carried;
            }
        }
        self.extra_next = 1;
    }

    /// Drain before the host serializes any state the callbacks write
    pub fn presave(&mut self) {
        self.wait("pre-save");
    }

    /// Reserve a polygon slot for a call spanning `miny..maxy`, draining
    /// first if either the polygon or the unit pool could run out
    pub(crate) fn allocate_polygon(&mut self, miny: i32, maxy: i32) -> usize {
        if self.polygon_next + 1 > self.shared.polygons.len() {
            self.shared.stats.polygon_waits.fetch_add(1, Ordering::Relaxed);
            self.wait("out of polygons");
        } else if self.unit_next + units_for_span(miny, maxy) > self.shared.units.len() {
            self.shared.stats.unit_waits.fetch_add(1, Ordering::Relaxed);
            self.wait("out of work units");
        }
        assert!(
            self.unit_next + units_for_span(miny, maxy) <= self.shared.units.len(),
            "unit pool too small for a single render call"
        );
        let index = self.polygon_next;
        self.polygon_next += 1;
        self.shared.stats.polygons.fetch_add(1, Ordering::Relaxed);
        self.shared.stats.polygon_max.fetch_max(self.polygon_next, Ordering::Relaxed);
        index
    }

    /// Reserve and arm the next work unit, chaining it behind whatever
    /// unit last touched its bucket
    pub(crate) fn allocate_unit(&mut self, polynum: usize, scanline: i32, count: usize) -> usize {
        let unitnum = self.unit_next;
        self.unit_next += 1;
        let previtem = self.bucket.chain(scanline, unitnum as u16);
        let slot = &self.shared.units[unitnum];
        // Safety: freshly reserved slot, not yet published.
        unsafe {
            let unit = slot.data.get_mut();
            unit.polygon = polynum as u16;
            unit.scanline = scanline;
            unit.previtem = previtem;
        }
        slot.state.arm(count as u32);
        self.shared.stats.units.fetch_add(1, Ordering::Relaxed);
        self.shared.stats.unit_max.fetch_max(self.unit_next, Ordering::Relaxed);
        unitnum
    }

    /// Publish the units created by the current render call
    pub(crate) fn submit_units(&mut self, startunit: usize) {
        let count = self.unit_next - startunit;
        if count == 0 {
            return;
        }
        // account before spawning so a fast worker cannot drain below zero
        self.shared.pending.add(count);
        if let Some(queue) = &self.queue {
            for unitnum in startunit..self.unit_next {
                let shared = Arc::clone(&self.shared);
                queue.spawn(Box::new(move |worker| {
                    process_chain(&shared, unitnum as u16, worker)
                }));
            }
        }
    }
}

impl<D, E> Drop for PolyScan<D, E>
where
    D: Send + Sync + 'static,
    E: Clone + Default + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.wait("teardown");
        debug!("polyscan stats: {:?}", self.stats());
    }
}

/// Deliver `unitnum`, then walk any successors handed to us by their
/// finished predecessors
///
/// This is the whole worker-side protocol. A unit whose predecessor is
/// still pending parks itself on the predecessor's state word and returns;
/// whoever finishes the predecessor picks it up here. Reading the count
/// from the state word makes re-delivery of an already finished unit a
/// no-op.
fn process_chain<D, E>(shared: &Shared<D, E>, start: u16, worker: usize)
where
    D: Send + Sync + 'static,
    E: Clone + Default + Send + Sync + 'static,
{
    let mut unitnum = start;
    loop {
        let slot = &shared.units[unitnum as usize];
        // Safety: published unit data is frozen until the next drain.
        let unit = unsafe { slot.data.get() };

        // gate on the unit queued against our bucket before us
        if unit.previtem != NO_UNIT {
            let prev = &shared.units[unit.previtem as usize];
            if prev.state.remaining() != 0 {
                shared.stats.chain_conflicts.fetch_add(1, Ordering::Relaxed);
                match prev.state.gate_or_defer(unitnum) {
                    Gate::Deferred => return,
                    Gate::Ready => {
                        shared.stats.chain_resolved.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }

        let count = slot.state.remaining() as usize;
        if count > 0 {
            // Safety: polygon and extra slots referenced by a published
            // unit are frozen until the next drain.
            let polygon = unsafe { shared.polygons[unit.polygon as usize].get() };
            let dest = polygon.dest.as_ref().expect("unit references an empty polygon slot");
            let callback = polygon.callback.expect("unit references an empty polygon slot");
            let extra = unsafe { shared.extras[polygon.extra as usize].get() };
            match &unit.extents {
                UnitExtents::Tri(extents) => {
                    for extnum in 0..count {
                        let scanline = unit.scanline + extnum as i32;
                        let extent = tri_to_extent(&extents[extnum], polygon, scanline);
                        callback(dest, scanline, &extent, extra, worker);
                    }
                }
                UnitExtents::Quad(extents) => {
                    for extnum in 0..count {
                        callback(dest, unit.scanline + extnum as i32, &extents[extnum], extra, worker);
                    }
                }
            }
        }

        let successor = slot.state.finish();
        if count > 0 {
            shared.pending.complete_one();
        }
        match successor {
            Some(next) => unitnum = next,
            None => return,
        }
    }
}

/// Expand a compact triangle extent, resolving the parameter planes at
/// this scanline
fn tri_to_extent<D, E>(src: &TriExtent, polygon: &Polygon<D, E>, scanline: i32) -> Extent {
    let mut extent = Extent {
        startx: src.startx as i32,
        stopx: src.stopx as i32,
        param: Default::default(),
    };
    for paramnum in 0..polygon.numparams as usize {
        let plane = &polygon.param[paramnum];
        extent.param[paramnum].start = plane.start
            + (src.startx as i32 - polygon.xorigin) as f32 * plane.dpdx
            + (scanline - polygon.yorigin) as f32 * plane.dpdy;
        extent.param[paramnum].dpdx = plane.dpdx;
    }
    extent
}
