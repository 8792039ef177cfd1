//! Deferred multi-threaded scanline polygon rasterization
//!
//! How this works
//!    engine = PolyScan::new(Config)
//!    engine.render_triangle / render_quad / render_polygon
//!      decompose into per-scanline extents against the clip rect
//!      batch extents into work units of up to 8 scanlines
//!        allocate_unit() -- chain behind the last unit on the bucket
//!      submit_units() -- hand the batch to the worker pool
//!  Workers
//!    process_chain()
//!      gate on the predecessor's hand-off word
//!        still pending: park, its finisher re-runs us
//!      deliver extents to the scanline callback
//!      finish() -- zero the word, pick up whoever parked on us
//!    Output: callback invocations, submission-ordered per scanline
//!  engine.wait()
//!    drain to zero pending, recycle all pools
//!
//! Rendering is deferred: a render call only decomposes and queues, the
//! per-scanline callback runs later on the worker pool. The one ordering
//! guarantee is that units overlapping in scanline range deliver in
//! submission order, which is what makes overlapping polygons come out
//! right.

pub mod bucket;
pub mod clip;
pub mod dispatch;
pub mod engine;
pub mod handoff;
pub mod pool;
pub mod unit;
pub mod vertex;

mod quad;
mod raster;

pub use crate::clip::{zclip_if_less, Rectangle};
pub use crate::dispatch::{Job, RayonPool, WorkerPool};
pub use crate::engine::{Config, PolyScan, Stats};
pub use crate::unit::{Extent, ParamExtent, TriExtent};
pub use crate::vertex::{round_coordinate, Vertex};

/// Maximum interpolated parameters per vertex
pub const MAX_VERTEX_PARAMS: usize = 6;
/// Maximum vertices accepted by `render_polygon`
pub const MAX_POLYGON_VERTS: usize = 32;
/// Scanlines per work unit; units never span two buckets
pub const SCANLINES_PER_BUCKET: usize = 8;
/// Dependency-tracking buckets across the scanline space
pub const TOTAL_BUCKETS: usize = 512 / SCANLINES_PER_BUCKET;

/// Per-scanline drawing callback
///
/// Runs on whichever worker delivers the unit. `dest` and `extra` are the
/// destination handle and extra-data block attached to the render call;
/// `worker` indexes the executing pool thread and can drive per-thread
/// scratch state.
pub type ScanlineFn<D, E> = fn(dest: &D, scanline: i32, extent: &Extent, extra: &E, worker: usize);
