//! Render-facing data: quad vertices, draw lists and indirect draw args
//!
//! Every type here is `Pod` so it can be copied byte-for-byte into GPU
//! upload buffers.

use crate::pool::{ParticleRecord, SlotId};
use bytemuck::{Pod, Zeroable};
use ember_core::Vec3;

pub const VERTICES_PER_PARTICLE: usize = 4;
pub const INDICES_PER_PARTICLE: usize = 6;

/// Corner texture coordinates, in vertex order
pub const QUAD_UVS: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

/// One corner of a camera-facing particle quad. 40 bytes.
///
/// All four corners carry the particle center; the vertex shader expands
/// them by `size` along the camera axes using `uv`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub color: [f32; 4],
    pub size: f32,
}

impl QuadVertex {
    /// The four corners of one particle's quad
    pub fn quad(record: &ParticleRecord) -> [QuadVertex; 4] {
        let position = record.position.to_array();
        let color = record.color.to_array();
        QUAD_UVS.map(|uv| QuadVertex {
            position,
            uv,
            color,
            size: record.size,
        })
    }
}

/// Static index buffer covering `capacity` quads as two triangles each
pub fn quad_indices(capacity: usize) -> Vec<u32> {
    let mut indices = Vec::with_capacity(capacity * INDICES_PER_PARTICLE);
    for p in 0..capacity as u32 {
        let i = p * VERTICES_PER_PARTICLE as u32;
        indices.extend_from_slice(&[i, i + 1, i + 2, i, i + 2, i + 3]);
    }
    indices
}

/// Per-instance particle data read by an instanced draw. 32 bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ParticleInstance {
    pub pos_size: [f32; 4], // xyz = position, w = size
    pub color: [f32; 4],
}

impl ParticleInstance {
    pub fn from_record(record: &ParticleRecord) -> Self {
        let p = record.position;
        Self {
            pos_size: [p.x, p.y, p.z, record.size],
            color: record.color.to_array(),
        }
    }
}

/// One surviving particle in a draw list
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct DrawListEntry {
    pub slot: SlotId,
    /// Squared distance to the view origin
    pub sort_key: f32,
}

impl DrawListEntry {
    pub fn new(slot: SlotId, position: Vec3, view_origin: Vec3) -> Self {
        Self {
            slot,
            sort_key: (position - view_origin).length_squared(),
        }
    }
}

/// Arguments of an indirect instanced draw. 16 bytes, matching the
/// layout GPU APIs read for non-indexed indirect draws.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawIndirectArgs {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_vertex: u32,
    pub first_instance: u32,
}

impl DrawIndirectArgs {
    /// Six vertices (two triangles) per instanced quad
    pub fn instanced_quads(instance_count: u32) -> Self {
        Self {
            vertex_count: INDICES_PER_PARTICLE as u32,
            instance_count,
            first_vertex: 0,
            first_instance: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::Color;

    #[test]
    fn gpu_struct_layouts() {
        assert_eq!(std::mem::size_of::<QuadVertex>(), 40);
        assert_eq!(std::mem::size_of::<ParticleInstance>(), 32);
        assert_eq!(std::mem::size_of::<DrawListEntry>(), 8);
        assert_eq!(std::mem::size_of::<DrawIndirectArgs>(), 16);
        assert_eq!(std::mem::align_of::<QuadVertex>(), 4);
    }

    #[test]
    fn index_pattern() {
        let indices = quad_indices(2);
        assert_eq!(indices, vec![0, 1, 2, 0, 2, 3, 4, 5, 6, 4, 6, 7]);
    }

    #[test]
    fn quad_corners_share_particle_attributes() {
        let mut record = ParticleRecord::dead();
        record.position = Vec3::new(1.0, 2.0, 3.0);
        record.size = 0.5;
        record.color = Color::new(1.0, 0.0, 0.0, 1.0);
        let quad = QuadVertex::quad(&record);
        for (vertex, uv) in quad.iter().zip(QUAD_UVS) {
            assert_eq!(vertex.position, [1.0, 2.0, 3.0]);
            assert_eq!(vertex.uv, uv);
            assert_eq!(vertex.size, 0.5);
        }
    }

    #[test]
    fn sort_key_is_squared_distance() {
        let entry = DrawListEntry::new(3, Vec3::new(3.0, 4.0, 0.0), Vec3::ZERO);
        assert_eq!(entry.slot, 3);
        assert!((entry.sort_key - 25.0).abs() < 1e-6);
    }

    #[test]
    fn args_cast_to_bytes() {
        let args = DrawIndirectArgs::instanced_quads(7);
        let words: &[u32] = bytemuck::cast_slice(std::slice::from_ref(&args));
        assert_eq!(words, &[6, 7, 0, 0]);
    }
}
