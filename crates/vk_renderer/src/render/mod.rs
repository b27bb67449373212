//! Rendering types shared between asset loading and the Vulkan backend

pub mod camera;
pub mod vulkan;

use ash::vk;
use bytemuck::{Pod, Zeroable};
use nalgebra::Matrix4;

/// Interleaved vertex as laid out in the vertex buffer and consumed by the
/// vertex shader: position, texture coordinate, color
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub tex_coord: [f32; 2],
    pub color: [f32; 3],
}

impl Vertex {
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        [
            vk::VertexInputAttributeDescription {
                location: 0,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 0,
            },
            vk::VertexInputAttributeDescription {
                location: 1,
                binding: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: 12,
            },
            vk::VertexInputAttributeDescription {
                location: 2,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 20,
            },
        ]
    }

    /// Bit-exact key for vertex deduplication. Comparing f32 bit patterns
    /// instead of values keeps 0.0 and -0.0 distinct and makes the key
    /// hashable.
    pub fn bit_key(&self) -> [u32; 8] {
        [
            self.position[0].to_bits(),
            self.position[1].to_bits(),
            self.position[2].to_bits(),
            self.tex_coord[0].to_bits(),
            self.tex_coord[1].to_bits(),
            self.color[0].to_bits(),
            self.color[1].to_bits(),
            self.color[2].to_bits(),
        ]
    }
}

/// Per-frame transform matrices, std140-compatible since Matrix4 is sixteen
/// contiguous f32 columns
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct UniformBufferObject {
    pub model: Matrix4<f32>,
    pub view: Matrix4<f32>,
    pub proj: Matrix4<f32>,
}

/// Flat mesh arrays ready for GPU upload
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_matches_shader_expectations() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
        let attrs = Vertex::attribute_descriptions();
        assert_eq!(attrs[0].offset, 0);
        assert_eq!(attrs[1].offset, 12);
        assert_eq!(attrs[2].offset, 20);
        assert_eq!(Vertex::binding_description().stride, 32);
    }

    #[test]
    fn uniform_buffer_object_is_three_matrices() {
        assert_eq!(std::mem::size_of::<UniformBufferObject>(), 3 * 16 * 4);
    }

    #[test]
    fn bit_key_distinguishes_signed_zero() {
        let a = Vertex {
            position: [0.0, 0.0, 0.0],
            tex_coord: [0.0, 0.0],
            color: [1.0, 1.0, 1.0],
        };
        let mut b = a;
        b.position[0] = -0.0;
        assert_ne!(a.bit_key(), b.bit_key());
    }

    #[test]
    fn mesh_bytes_cover_all_elements() {
        let mesh = MeshData {
            vertices: vec![
                Vertex {
                    position: [0.0; 3],
                    tex_coord: [0.0; 2],
                    color: [0.0; 3],
                };
                3
            ],
            indices: vec![0, 1, 2],
        };
        assert_eq!(mesh.vertex_bytes().len(), 3 * 32);
        assert_eq!(mesh.index_bytes().len(), 3 * 4);
    }
}
