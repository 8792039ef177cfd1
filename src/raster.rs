//! Triangle decomposition into per-scanline extents

use std::mem;

use crate::clip::Rectangle;
use crate::engine::{ParamPlane, PolyScan};
use crate::unit::{Extent, TriExtent, UnitExtents};
use crate::vertex::{round_coordinate, Vertex};
use crate::{ScanlineFn, MAX_VERTEX_PARAMS, SCANLINES_PER_BUCKET};

/// Triangles with a denominator below this are treated as degenerate and
/// get flat parameters pinned to the first vertex
const DEGENERATE_EPSILON: f32 = 0.001;

impl<D, E> PolyScan<D, E>
where
    D: Send + Sync + 'static,
    E: Clone + Default + Send + Sync + 'static,
{
    /// Queue a single triangle
    ///
    /// The triangle is cut into scanline extents clipped against
    /// `cliprect`, with the first `paramcount` vertex parameters
    /// interpolated affinely across the face. Returns the clipped pixel
    /// count; the callback runs later on the worker pool. A triangle
    /// whose rows all clip away costs nothing. Triangle extents are
    /// stored 16-bit, so `cliprect` must lie within the `i16` range.
    pub fn render_triangle(
        &mut self,
        dest: D,
        cliprect: &Rectangle,
        callback: ScanlineFn<D, E>,
        paramcount: usize,
        v1: &Vertex,
        v2: &Vertex,
        v3: &Vertex,
    ) -> u32 {
        assert!(paramcount <= MAX_VERTEX_PARAMS);
        assert!(
            cliprect.min_x >= i16::MIN as i32 && cliprect.max_x < i16::MAX as i32,
            "clip rectangle exceeds 16-bit extent range"
        );
        let (mut v1, mut v2, mut v3) = (v1, v2, v3);

        // sort the vertices by vertical position
        if v2.y < v1.y {
            mem::swap(&mut v1, &mut v2);
        }
        if v3.y < v2.y {
            mem::swap(&mut v2, &mut v3);
            if v2.y < v1.y {
                mem::swap(&mut v1, &mut v2);
            }
        }

        // integral scanline range, clipped
        let v1x = round_coordinate(v1.x);
        let v1y = round_coordinate(v1.y);
        let v3y = round_coordinate(v3.y);
        let bottom = if self.config.include_bottom_edge { 1 } else { 0 };
        let v1yclip = v1y.max(cliprect.min_y);
        let v3yclip = (v3y + bottom).min(cliprect.max_y + 1);
        if v3yclip - v1yclip <= 0 {
            return 0;
        }

        let polynum = self.allocate_polygon(v1yclip, v3yclip);
        {
            // Safety: freshly reserved slot, not yet published.
            let polygon = unsafe { self.shared.polygons[polynum].get_mut() };
            polygon.dest = Some(dest);
            polygon.callback = Some(callback);
            polygon.extra = (self.extra_next - 1) as u16;
            polygon.numparams = paramcount as u16;
            polygon.xorigin = v1x;
            polygon.yorigin = v1y;
        }

        // slopes along the three edges; horizontal edges never get walked
        let dxdy_v1v2 = if v2.y == v1.y { 0.0 } else { (v2.x - v1.x) / (v2.y - v1.y) };
        let dxdy_v1v3 = if v3.y == v1.y { 0.0 } else { (v3.x - v1.x) / (v3.y - v1.y) };
        let dxdy_v2v3 = if v3.y == v2.y { 0.0 } else { (v3.x - v2.x) / (v3.y - v2.y) };

        let mut pixels = 0u32;
        let startunit = self.unit_next;
        let mut curscan = v1yclip;
        while curscan < v3yclip {
            // batches never cross a bucket boundary
            let scaninc = (SCANLINES_PER_BUCKET as u32 - curscan as u32 % SCANLINES_PER_BUCKET as u32) as i32;
            let count = (v3yclip - curscan).min(scaninc) as usize;
            let unitnum = self.allocate_unit(polynum, curscan, count);

            let mut extents = [TriExtent::default(); SCANLINES_PER_BUCKET];
            for extnum in 0..count {
                // sample at the scanline center
                let fully = (curscan + extnum as i32) as f32 + 0.5;
                let startx = v1.x + (fully - v1.y) * dxdy_v1v3;
                let stopx = if fully < v2.y {
                    v1.x + (fully - v1.y) * dxdy_v1v2
                } else {
                    v2.x + (fully - v2.y) * dxdy_v2v3
                };

                let mut istartx = round_coordinate(startx);
                let mut istopx = round_coordinate(stopx);
                if istartx > istopx {
                    mem::swap(&mut istartx, &mut istopx);
                }
                if self.config.include_right_edge {
                    istopx += 1;
                }
                if istartx < cliprect.min_x {
                    istartx = cliprect.min_x;
                }
                if istopx > cliprect.max_x {
                    istopx = cliprect.max_x + 1;
                }
                if istartx >= istopx {
                    istartx = 0;
                    istopx = 0;
                }
                extents[extnum] = TriExtent { startx: istartx as i16, stopx: istopx as i16 };
                pixels += (istopx - istartx) as u32;
            }
            // Safety: same slot, still unpublished.
            unsafe {
                self.shared.units[unitnum].data.get_mut().extents = UnitExtents::Tri(extents);
            }
            curscan += scaninc;
        }

        // parameter planes from the three-vertex affine system
        if paramcount > 0 {
            let a00 = v2.y - v3.y;
            let a01 = v3.x - v2.x;
            let a02 = v2.x * v3.y - v3.x * v2.y;
            let a10 = v3.y - v1.y;
            let a11 = v1.x - v3.x;
            let a12 = v3.x * v1.y - v1.x * v3.y;
            let a20 = v1.y - v2.y;
            let a21 = v2.x - v1.x;
            let a22 = v1.x * v2.y - v2.x * v1.y;
            let det = a02 + a12 + a22;

            // Safety: the polygon slot is still unpublished.
            let polygon = unsafe { self.shared.polygons[polynum].get_mut() };
            if det.abs() < DEGENERATE_EPSILON {
                for paramnum in 0..paramcount {
                    polygon.param[paramnum] = ParamPlane {
                        start: v1.p[paramnum],
                        dpdx: 0.0,
                        dpdy: 0.0,
                    };
                }
            } else {
                let idet = 1.0 / det;
                for paramnum in 0..paramcount {
                    let dpdx = idet
                        * (v1.p[paramnum] * a00 + v2.p[paramnum] * a10 + v3.p[paramnum] * a20);
                    let dpdy = idet
                        * (v1.p[paramnum] * a01 + v2.p[paramnum] * a11 + v3.p[paramnum] * a21);
                    let start = idet
                        * (v1.p[paramnum] * a02 + v2.p[paramnum] * a12 + v3.p[paramnum] * a22)
                        + v1x as f32 * dpdx
                        + v1y as f32 * dpdy;
                    polygon.param[paramnum] = ParamPlane { start, dpdx, dpdy };
                }
            }
        }

        self.submit_units(startunit);
        pixels
    }

    /// Queue a fan of triangles sharing the first vertex
    pub fn render_triangle_fan(
        &mut self,
        dest: D,
        cliprect: &Rectangle,
        callback: ScanlineFn<D, E>,
        paramcount: usize,
        v: &[Vertex],
    ) -> u32
    where
        D: Clone,
    {
        let mut pixels = 0;
        for vertnum in 2..v.len() {
            pixels += self.render_triangle(
                dest.clone(),
                cliprect,
                callback,
                paramcount,
                &v[0],
                &v[vertnum - 1],
                &v[vertnum],
            );
        }
        pixels
    }

    /// Queue a triangle whose extents the caller has already computed
    ///
    /// `extents[i]` covers scanline `startscanline + i`. No parameters
    /// are interpolated and the right-edge flag does not apply; extents
    /// are only clamped against `cliprect` (reversed ones are swapped
    /// first). Storage is 16-bit, so `cliprect` must lie within the
    /// `i16` range.
    pub fn render_triangle_custom(
        &mut self,
        dest: D,
        cliprect: &Rectangle,
        callback: ScanlineFn<D, E>,
        startscanline: i32,
        extents: &[Extent],
    ) -> u32 {
        assert!(
            cliprect.min_x >= i16::MIN as i32 && cliprect.max_x < i16::MAX as i32,
            "clip rectangle exceeds 16-bit extent range"
        );
        let v1yclip = startscanline.max(cliprect.min_y);
        let v3yclip = (startscanline + extents.len() as i32).min(cliprect.max_y + 1);
        if v3yclip - v1yclip <= 0 {
            return 0;
        }

        let polynum = self.allocate_polygon(v1yclip, v3yclip);
        {
            // Safety: freshly reserved slot, not yet published.
            let polygon = unsafe { self.shared.polygons[polynum].get_mut() };
            polygon.dest = Some(dest);
            polygon.callback = Some(callback);
            polygon.extra = (self.extra_next - 1) as u16;
            polygon.numparams = 0;
            polygon.xorigin = 0;
            polygon.yorigin = 0;
        }

        let mut pixels = 0u32;
        let startunit = self.unit_next;
        let mut curscan = v1yclip;
        while curscan < v3yclip {
            let scaninc = (SCANLINES_PER_BUCKET as u32 - curscan as u32 % SCANLINES_PER_BUCKET as u32) as i32;
            let count = (v3yclip - curscan).min(scaninc) as usize;
            let unitnum = self.allocate_unit(polynum, curscan, count);

            let mut unit_extents = [TriExtent::default(); SCANLINES_PER_BUCKET];
            for extnum in 0..count {
                let srcextent = &extents[((curscan - startscanline) + extnum as i32) as usize];
                let mut istartx = srcextent.startx;
                let mut istopx = srcextent.stopx;
                if istartx > istopx {
                    mem::swap(&mut istartx, &mut istopx);
                }
                if istartx < cliprect.min_x {
                    istartx = cliprect.min_x;
                }
                if istopx > cliprect.max_x {
                    istopx = cliprect.max_x + 1;
                }
                if istartx >= istopx {
                    istartx = 0;
                    istopx = 0;
                }
                unit_extents[extnum] = TriExtent { startx: istartx as i16, stopx: istopx as i16 };
                pixels += (istopx - istartx) as u32;
            }
            // Safety: same slot, still unpublished.
            unsafe {
                self.shared.units[unitnum].data.get_mut().extents = UnitExtents::Tri(unit_extents);
            }
            curscan += scaninc;
        }

        self.submit_units(startunit);
        pixels
    }
}
