use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::types::RowOrder;

use super::context::Gpu;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 3],
    pub tex_coord: [f32; 2],
}

const fn vertex(x: f32, y: f32, u: f32, v: f32) -> QuadVertex {
    QuadVertex {
        position: [x, y, 0.0],
        tex_coord: [u, v],
    }
}

/// Full-screen quad for sources whose first row is the top of the picture.
pub const TOP_DOWN: [QuadVertex; 6] = [
    vertex(-1.0, 1.0, 0.0, 0.0),
    vertex(-1.0, -1.0, 0.0, 1.0),
    vertex(1.0, 1.0, 1.0, 0.0),
    vertex(-1.0, -1.0, 0.0, 1.0),
    vertex(1.0, -1.0, 1.0, 1.0),
    vertex(1.0, 1.0, 1.0, 0.0),
];

/// Full-screen quad for sources whose first row is the bottom of the picture.
pub const BOTTOM_UP: [QuadVertex; 6] = [
    vertex(-1.0, 1.0, 0.0, 1.0),
    vertex(-1.0, -1.0, 0.0, 0.0),
    vertex(1.0, 1.0, 1.0, 1.0),
    vertex(-1.0, -1.0, 0.0, 0.0),
    vertex(1.0, -1.0, 1.0, 0.0),
    vertex(1.0, 1.0, 1.0, 1.0),
];

pub fn quad_vertices(order: RowOrder) -> [QuadVertex; 6] {
    match order {
        RowOrder::TopDown => TOP_DOWN,
        RowOrder::BottomUp => BOTTOM_UP,
    }
}

/// Shrinks a full-screen quad to `[-extent, extent]` in clip space.
pub fn scaled(vertices: [QuadVertex; 6], extent: f32) -> [QuadVertex; 6] {
    vertices.map(|mut v| {
        v.position[0] *= extent;
        v.position[1] *= extent;
        v
    })
}

impl QuadVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Vertex buffer holding one quad.
pub struct QuadBuffer {
    buffer: wgpu::Buffer,
    vertex_count: u32,
}

impl QuadBuffer {
    pub fn new(gpu: &Gpu, label: &str, vertices: &[QuadVertex]) -> Self {
        let buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        Self {
            buffer,
            vertex_count: vertices.len() as u32,
        }
    }

    pub fn for_rows(gpu: &Gpu, order: RowOrder) -> Self {
        let label = match order {
            RowOrder::TopDown => "top-down quad",
            RowOrder::BottomUp => "bottom-up quad",
        };
        Self::new(gpu, label, &quad_vertices(order))
    }

    pub(crate) fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.buffer.slice(..));
        pass.draw(0..self.vertex_count, 0..1);
    }
}
