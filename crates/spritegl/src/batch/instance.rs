//! # Instance — Per-Sprite Data Sent to the GPU
//!
//! Instanced rendering draws the same six-vertex quad once per sprite. What
//! differs between copies lives in an *instance record*: 15 floats that the
//! vertex fetcher advances once per instance (attribute divisor 1) instead of
//! once per vertex.
//!
//! ```text
//! InstanceRecord (60 bytes per sprite)
//! ┌──────────────┬──────────┬───────┬────────────────┬────────────────┬────────┐
//! │ position     │ size     │ angle │ region         │ color          │ effect │
//! │ [f32; 3]     │ [f32; 2] │ f32   │ [f32; 4]       │ [f32; 4]       │ f32    │
//! │ offset 0     │ 12       │ 20    │ 24             │ 40             │ 56     │
//! └──────────────┴──────────┴───────┴────────────────┴────────────────┴────────┘
//! ```
//!
//! The quad itself is a second, static buffer holding one float per vertex:
//! the corner index `[0, 1, 2, 1, 2, 3]` (divisor 0). The vertex shader turns
//! that index into a corner `(index % 2, index / 2)` of the unit square, scales
//! it by `size`, rotates by `angle` and offsets by `position`.
//!
//! ## Without Instancing
//!
//! When instancing is turned off the batch expands every record into six
//! [`ExpandedVertex`]es, one per corner index, and issues a plain draw. The
//! shader inputs are the same; only the step rate changes.
//!
//! ```text
//! ExpandedVertex (64 bytes, 6 per sprite)
//! ┌───────┬──────────────────────────────┐
//! │ index │ InstanceRecord               │
//! │ f32   │ offset 4..64                 │
//! └───────┴──────────────────────────────┘
//! ```
//!
//! ## Comparison
//!
//! - **Per-vertex batching** (4 vertices x 36 bytes per sprite, CPU-side
//!   transform): more bytes per sprite and a CPU transform per corner, but no
//!   instancing extension required.
//! - **Bevy**: Also instances sprites, with a per-instance affine transform
//!   instead of position/size/angle.

use bytemuck::{Pod, Zeroable};

use crate::math::{Color, Region};

/// Vertex corner indices for two triangles covering the unit quad.
pub const QUAD_INDICES: [f32; 6] = [0.0, 1.0, 2.0, 1.0, 2.0, 3.0];

/// Number of floats in one [`InstanceRecord`].
pub const COMPONENT_COUNT: usize = 15;

/// Byte stride between records.
pub const STRIDE: u32 = (COMPONENT_COUNT * std::mem::size_of::<f32>()) as u32;

/// One sprite's worth of per-instance attributes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceRecord {
    pub position: [f32; 3],
    pub size: [f32; 2],
    pub angle: f32,
    pub region: [f32; 4],
    pub color: [f32; 4],
    pub effect: f32,
}

impl InstanceRecord {
    pub fn new(x: f32, y: f32, z: f32, width: f32, height: f32, region: Region, color: Color) -> Self {
        Self {
            position: [x, y, z],
            size: [width, height],
            angle: 0.0,
            region: region.to_array(),
            color: color.to_array(),
            effect: 0.0,
        }
    }
}

/// One vertex of an expanded quad: the corner index followed by a copy of
/// the sprite's record.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ExpandedVertex {
    pub index: f32,
    pub record: InstanceRecord,
}

/// Byte stride between [`ExpandedVertex`]es.
pub const VERTEX_STRIDE: u32 = std::mem::size_of::<ExpandedVertex>() as u32;

/// Offset of the record inside an [`ExpandedVertex`].
pub const VERTEX_RECORD_OFFSET: u32 = std::mem::size_of::<f32>() as u32;

/// Append the six vertices of `record` to `out`.
pub fn expand_into(record: &InstanceRecord, out: &mut Vec<ExpandedVertex>) {
    out.extend(QUAD_INDICES.iter().map(|&index| ExpandedVertex { index, record: *record }));
}

/// Where one named per-instance attribute lives inside a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceAttribute {
    pub name: &'static str,
    pub components: u32,
    pub offset: u32,
}

/// Per-instance attributes in record order. `index` is not listed: it reads
/// from the static quad buffer.
pub const INSTANCE_ATTRIBUTES: [InstanceAttribute; 6] = [
    InstanceAttribute { name: "position", components: 3, offset: 0 },
    InstanceAttribute { name: "size", components: 2, offset: 12 },
    InstanceAttribute { name: "angle", components: 1, offset: 20 },
    InstanceAttribute { name: "region", components: 4, offset: 24 },
    InstanceAttribute { name: "color", components: 4, offset: 40 },
    InstanceAttribute { name: "effect", components: 1, offset: 56 },
];
