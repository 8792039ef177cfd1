//! Work unit records and scanline extents

use crate::{MAX_VERTEX_PARAMS, SCANLINES_PER_BUCKET};

/// Sentinel for "no unit" in bucket chains and `previtem` fields
pub const NO_UNIT: u16 = 0xffff;

/// Start value and per-column step of one parameter across a scanline
#[derive(Debug,Default,Copy,Clone)]
pub struct ParamExtent {
    pub start: f32,
    pub dpdx: f32,
}

/// Pixel extent of one scanline
///
/// The covered columns are `startx..stopx` (stop exclusive). `param[n]`
/// holds the interpolation start and step for parameter `n`; entries past
/// the render call's `paramcount` are unused.
#[derive(Debug,Default,Copy,Clone)]
pub struct Extent {
    pub startx: i32,
    pub stopx: i32,
    pub param: [ParamExtent; MAX_VERTEX_PARAMS],
}

/// Compact extent used for triangles
///
/// Triangle parameters are affine across the whole face, so only the
/// column range is stored per scanline; parameter starts are derived from
/// the polygon's planes at delivery time.
#[derive(Debug,Default,Copy,Clone)]
pub struct TriExtent {
    pub startx: i16,
    pub stopx: i16,
}

/// Extent payload of one work unit
#[derive(Debug,Clone)]
pub enum UnitExtents {
    Tri([TriExtent; SCANLINES_PER_BUCKET]),
    Quad([Extent; SCANLINES_PER_BUCKET]),
}

impl Default for UnitExtents {
    fn default() -> Self {
        UnitExtents::Tri([TriExtent::default(); SCANLINES_PER_BUCKET])
    }
}

/// One schedulable batch of consecutive scanlines of one polygon
///
/// The scanline count lives in the unit's hand-off word, not here; a
/// delivered unit reads back a count of zero. `previtem` names the unit
/// that was queued against the same bucket before this one ([`NO_UNIT`]
/// if none) and must fully deliver first.
#[derive(Debug)]
pub struct WorkUnit {
    pub polygon: u16,
    pub scanline: i32,
    pub previtem: u16,
    pub extents: UnitExtents,
}

impl Default for WorkUnit {
    fn default() -> Self {
        WorkUnit {
            polygon: 0,
            scanline: 0,
            previtem: NO_UNIT,
            extents: UnitExtents::default(),
        }
    }
}
