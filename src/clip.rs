//! Clip rectangle and near-plane polygon clipping

use crate::vertex::Vertex;
use crate::{MAX_POLYGON_VERTS, MAX_VERTEX_PARAMS};

/// Integer clip rectangle, bounds inclusive on all four sides
#[derive(Debug,Copy,Clone,PartialEq)]
pub struct Rectangle {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
}

impl Rectangle {
    pub fn new(min_x: i32, max_x: i32, min_y: i32, max_y: i32) -> Self {
        Rectangle { min_x, max_x, min_y, max_y }
    }
}

/// Clip a polygon against the plane `p[0] == clipval`, discarding the
/// side where `p[0]` is smaller
///
/// Vertices on the kept side are copied through unchanged. Each edge that
/// crosses the plane inserts one vertex interpolated to the exact crossing
/// point, with the first `paramcount` parameters interpolated alongside
/// the coordinates. A polygon entirely on the kept side comes back as the
/// identical vertex list; one entirely on the clipped side comes back
/// empty.
pub fn zclip_if_less(verts: &[Vertex], paramcount: usize, clipval: f32) -> Vec<Vertex> {
    assert!(verts.len() <= MAX_POLYGON_VERTS);
    assert!(paramcount <= MAX_VERTEX_PARAMS);
    let mut out = Vec::with_capacity(verts.len() + 1);
    if verts.is_empty() {
        return out;
    }
    let mut prevclipped = verts[verts.len() - 1].p[0] < clipval;
    for (vertnum, vert) in verts.iter().enumerate() {
        let thisclipped = vert.p[0] < clipval;

        // clip state changed: insert a vertex at the crossing
        if thisclipped != prevclipped {
            let prev = &verts[if vertnum == 0 { verts.len() - 1 } else { vertnum - 1 }];
            out.push(interpolate_vertex(prev, vert, paramcount, clipval));
        }
        if !thisclipped {
            out.push(*vert);
        }
        prevclipped = thisclipped;
    }
    out
}

fn interpolate_vertex(v1: &Vertex, v2: &Vertex, paramcount: usize, clipval: f32) -> Vertex {
    let frac = (clipval - v1.p[0]) / (v2.p[0] - v1.p[0]);
    let mut out = Vertex::new(v1.x + frac * (v2.x - v1.x), v1.y + frac * (v2.y - v1.y));
    for paramnum in 0..paramcount {
        out.p[paramnum] = v1.p[paramnum] + frac * (v2.p[paramnum] - v1.p[paramnum]);
    }
    out
}
