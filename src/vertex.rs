//! Screen-space vertices and coordinate rounding

use crate::MAX_VERTEX_PARAMS;

/// Screen-space vertex
///
/// `x` and `y` are floating point pixel coordinates. `p` carries up to
/// [`MAX_VERTEX_PARAMS`](crate::MAX_VERTEX_PARAMS) caller-defined values
/// (texture coordinates, colors, 1/z, ...); a render call interpolates the
/// first `paramcount` of them across the face.
#[derive(Debug,Default,Copy,Clone,PartialEq)]
pub struct Vertex {
    pub x: f32,
    pub y: f32,
    pub p: [f32; MAX_VERTEX_PARAMS],
}

impl Vertex {
    /// New vertex with all parameters zero
    pub fn new(x: f32, y: f32) -> Self {
        Vertex { x, y, p: [0.0; MAX_VERTEX_PARAMS] }
    }
    /// New vertex with the leading parameters set from a slice
    pub fn with_params(x: f32, y: f32, params: &[f32]) -> Self {
        let mut v = Vertex::new(x, y);
        v.p[..params.len()].copy_from_slice(params);
        v
    }
}

/// Convert a floating point coordinate to an integer pixel coordinate
///
/// Ties round down: `round_coordinate(0.5) == 0` and
/// `round_coordinate(-0.5) == -1`. Every coordinate comparison in the
/// rasterizer goes through this so that shared edges land on the same
/// pixel columns.
pub fn round_coordinate(value: f32) -> i32 {
    let result = value.floor() as i32;
    result + (value - result as f32 > 0.5) as i32
}
