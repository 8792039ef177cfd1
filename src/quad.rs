//! Quad and convex polygon decomposition
//!
//! Quads and general polygons walk a left and a right edge list down the
//! scanline range instead of solving an affine system, so parameters vary
//! per scanline and the full extents are stored in the work units.

use crate::clip::Rectangle;
use crate::engine::PolyScan;
use crate::unit::{Extent, ParamExtent, UnitExtents};
use crate::vertex::{round_coordinate, Vertex};
use crate::{ScanlineFn, MAX_POLYGON_VERTS, MAX_VERTEX_PARAMS, SCANLINES_PER_BUCKET};

/// One non-horizontal edge of the ring, with per-scanline parameter steps
#[derive(Debug,Default,Copy,Clone)]
struct PolyEdge {
    v1: usize,
    v2: usize,
    dxdy: f32,
    dpdy: [f32; MAX_VERTEX_PARAMS],
}

impl<D, E> PolyScan<D, E>
where
    D: Send + Sync + 'static,
    E: Clone + Default + Send + Sync + 'static,
{
    /// Queue a single convex quad
    ///
    /// Vertices are taken in ring order (either winding). Requires
    /// `allow_quads` in the engine config.
    pub fn render_quad(
        &mut self,
        dest: D,
        cliprect: &Rectangle,
        callback: ScanlineFn<D, E>,
        paramcount: usize,
        v1: &Vertex,
        v2: &Vertex,
        v3: &Vertex,
        v4: &Vertex,
    ) -> u32 {
        let v = [*v1, *v2, *v3, *v4];
        self.render_convex(dest, cliprect, callback, paramcount, &v)
    }

    /// Queue a fan of quads sharing the first vertex
    ///
    /// An odd vertex count closes the last quad by repeating the final
    /// vertex, which degenerates it to a triangle.
    pub fn render_quad_fan(
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
        let mut vertnum = 2;
        while vertnum < v.len() {
            let lastv = (vertnum + 1).min(v.len() - 1);
            pixels += self.render_quad(
                dest.clone(),
                cliprect,
                callback,
                paramcount,
                &v[0],
                &v[vertnum - 1],
                &v[vertnum],
                &v[lastv],
            );
            vertnum += 2;
        }
        pixels
    }

    /// Queue a convex polygon of up to [`MAX_POLYGON_VERTS`] vertices
    ///
    /// Vertices are taken in ring order (either winding). Requires
    /// `allow_quads` in the engine config.
    pub fn render_polygon(
        &mut self,
        dest: D,
        cliprect: &Rectangle,
        callback: ScanlineFn<D, E>,
        paramcount: usize,
        v: &[Vertex],
    ) -> u32 {
        self.render_convex(dest, cliprect, callback, paramcount, v)
    }

    fn render_convex(
        &mut self,
        dest: D,
        cliprect: &Rectangle,
        callback: ScanlineFn<D, E>,
        paramcount: usize,
        v: &[Vertex],
    ) -> u32 {
        assert!(self.config.allow_quads, "quad rendering disabled in config");
        assert!(v.len() >= 3 && v.len() <= MAX_POLYGON_VERTS);
        assert!(paramcount <= MAX_VERTEX_PARAMS);

        // find the top and bottom vertices around the ring
        let mut minv = 0;
        let mut maxv = 0;
        for curv in 1..v.len() {
            if v[curv].y < v[minv].y {
                minv = curv;
            } else if v[curv].y > v[maxv].y {
                maxv = curv;
            }
        }

        // integral scanline range, clipped
        let miny = round_coordinate(v[minv].y);
        let maxy = round_coordinate(v[maxv].y);
        let bottom = if self.config.include_bottom_edge { 1 } else { 0 };
        let minyclip = miny.max(cliprect.min_y);
        let maxyclip = (maxy + bottom).min(cliprect.max_y + 1);
        if maxyclip - minyclip <= 0 {
            return 0;
        }

        // walk the ring forward from the top vertex to the bottom one,
        // then backward, building the two edge lists; horizontal edges
        // are dropped
        let mut fedge = [PolyEdge::default(); MAX_POLYGON_VERTS];
        let mut bedge = [PolyEdge::default(); MAX_POLYGON_VERTS];
        let mut fcount = 0;
        let mut bcount = 0;
        let mut curv = minv;
        while curv != maxv {
            let nextv = if curv == v.len() - 1 { 0 } else { curv + 1 };
            if v[nextv].y != v[curv].y {
                fedge[fcount] = make_edge(v, curv, nextv, paramcount);
                fcount += 1;
            }
            curv = nextv;
        }
        curv = minv;
        while curv != maxv {
            let nextv = if curv == 0 { v.len() - 1 } else { curv - 1 };
            if v[nextv].y != v[curv].y {
                bedge[bcount] = make_edge(v, curv, nextv, paramcount);
                bcount += 1;
            }
            curv = nextv;
        }
        // a ring of nothing but horizontal edges has no left or right
        // side; nothing to draw
        if fcount == 0 || bcount == 0 {
            return 0;
        }

        // decide which list is the left one: if both start at the same
        // vertex compare slopes, otherwise compare X coordinates
        let first_shared = fedge[0].v1 == bedge[0].v1;
        let (ledges, redges): (&[PolyEdge], &[PolyEdge]) = if (first_shared
            && fedge[0].dxdy < bedge[0].dxdy)
            || (!first_shared && v[fedge[0].v1].x < v[bedge[0].v1].x)
        {
            (&fedge[..fcount], &bedge[..bcount])
        } else {
            (&bedge[..bcount], &fedge[..fcount])
        };

        let polynum = self.allocate_polygon(minyclip, maxyclip);
        {
            // Safety: freshly reserved slot, not yet published.
            let polygon = unsafe { self.shared.polygons[polynum].get_mut() };
            polygon.dest = Some(dest);
            polygon.callback = Some(callback);
            polygon.extra = (self.extra_next - 1) as u16;
            polygon.numparams = paramcount as u16;
            polygon.xorigin = 0;
            polygon.yorigin = 0;
        }

        let mut lcur = 0;
        let mut rcur = 0;
        let mut pixels = 0u32;
        let startunit = self.unit_next;
        let mut curscan = minyclip;
        while curscan < maxyclip {
            let scaninc = (SCANLINES_PER_BUCKET as u32 - curscan as u32 % SCANLINES_PER_BUCKET as u32) as i32;
            let count = (maxyclip - curscan).min(scaninc) as usize;
            let unitnum = self.allocate_unit(polynum, curscan, count);

            let mut extents = [Extent::default(); SCANLINES_PER_BUCKET];
            for extnum in 0..count {
                let fully = (curscan + extnum as i32) as f32 + 0.5;

                // advance to the edges covering this scanline; the last
                // edge extrapolates past the bottom vertex
                while fully > v[ledges[lcur].v2].y && fully < v[maxv].y {
                    lcur += 1;
                }
                while fully > v[redges[rcur].v2].y && fully < v[maxv].y {
                    rcur += 1;
                }
                let ledge = &ledges[lcur];
                let redge = &redges[rcur];

                let startx = v[ledge.v1].x + (fully - v[ledge.v1].y) * ledge.dxdy;
                let stopx = v[redge.v1].x + (fully - v[redge.v1].y) * redge.dxdy;
                let mut istartx = round_coordinate(startx);
                let mut istopx = round_coordinate(stopx);

                // parameter start and step from the two edge crossings
                if paramcount > 0 {
                    let ldy = fully - v[ledge.v1].y;
                    let rdy = fully - v[redge.v1].y;
                    let oox = 1.0 / (stopx - startx);
                    for paramnum in 0..paramcount {
                        let lparam = v[ledge.v1].p[paramnum] + ldy * ledge.dpdy[paramnum];
                        let rparam = v[redge.v1].p[paramnum] + rdy * redge.dpdy[paramnum];
                        extents[extnum].param[paramnum] = ParamExtent {
                            start: lparam,
                            dpdx: (rparam - lparam) * oox,
                        };
                    }
                }

                if self.config.include_right_edge {
                    istopx += 1;
                }
                // left clipping shifts the parameter starts to the new
                // first column
                if istartx < cliprect.min_x {
                    for paramnum in 0..paramcount {
                        extents[extnum].param[paramnum].start +=
                            (cliprect.min_x - istartx) as f32 * extents[extnum].param[paramnum].dpdx;
                    }
                    istartx = cliprect.min_x;
                }
                if istopx > cliprect.max_x {
                    istopx = cliprect.max_x + 1;
                }
                if istartx >= istopx {
                    istartx = 0;
                    istopx = 0;
                }
                extents[extnum].startx = istartx;
                extents[extnum].stopx = istopx;
                pixels += (istopx - istartx) as u32;
            }
            // Safety: same slot, still unpublished.
            unsafe {
                self.shared.units[unitnum].data.get_mut().extents = UnitExtents::Quad(extents);
            }
            curscan += scaninc;
        }

        self.submit_units(startunit);
        pixels
    }
}

fn make_edge(v: &[Vertex], from: usize, to: usize, paramcount: usize) -> PolyEdge {
    let ooy = 1.0 / (v[to].y - v[from].y);
    let mut edge = PolyEdge {
        v1: from,
        v2: to,
        dxdy: (v[to].x - v[from].x) * ooy,
        dpdy: [0.0; MAX_VERTEX_PARAMS],
    };
    for paramnum in 0..paramcount {
        edge.dpdy[paramnum] = (v[to].p[paramnum] - v[from].p[paramnum]) * ooy;
    }
    edge
}
