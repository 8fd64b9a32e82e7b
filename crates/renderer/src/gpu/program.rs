use std::borrow::Cow;

use wgpu::naga::ShaderStage;

use crate::compile::{self, ProgramInterface, TEXTURE_GROUP, UNIFORM_GROUP};
use crate::error::{RenderError, StageKind};
use crate::library::{ProgramSpec, ShaderAsset, ShaderLibrary};

use super::context::Gpu;
use super::quad::{QuadBuffer, QuadVertex};
use super::texture::TextureBinding;
use super::uniforms::{UniformStorage, UniformValue};

/// A linked vertex + fragment program rendering into one colour format.
///
/// Construction either yields a fully usable program or fails with the
/// compiler's diagnostics; there is no half-built state.
pub struct ShaderProgram {
    label: String,
    interface: ProgramInterface,
    pipeline: wgpu::RenderPipeline,
    texture_layout: wgpu::BindGroupLayout,
    uniform_group: wgpu::BindGroup,
    uniform_buffer: Option<wgpu::Buffer>,
    storage: UniformStorage,
}

impl ShaderProgram {
    pub fn new(
        gpu: &Gpu,
        library: &ShaderLibrary,
        spec: &ProgramSpec,
        target_format: wgpu::TextureFormat,
    ) -> Result<Self, RenderError> {
        let label = spec.label;
        let vertex_asset = library.get(spec.vertex)?;
        let fragment_asset = library.get(spec.fragment)?;

        // naga first: it gives readable diagnostics and the reflection data.
        let vertex_ir = compile::parse_stage(label, vertex_asset)?;
        let fragment_ir = compile::parse_stage(label, fragment_asset)?;
        let interface = compile::link_program(label, &vertex_ir, &fragment_ir)?;

        let vertex_module = create_module(gpu, label, vertex_asset)?;
        let fragment_module = create_module(gpu, label, fragment_asset)?;

        let uniform_layout = gpu
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&format!("{label} uniform layout")),
                entries: &uniform_layout_entries(&interface),
            });
        let texture_layout = gpu
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&format!("{label} texture layout")),
                entries: &texture_layout_entries(&interface),
            });

        let uniform_size = interface.uniform_buffer_size();
        let uniform_buffer = (uniform_size > 0).then(|| {
            gpu.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("{label} uniforms")),
                size: uniform_size,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });
        let uniform_entries: Vec<wgpu::BindGroupEntry<'_>> = uniform_buffer
            .iter()
            .map(|buffer| wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        let uniform_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{label} uniform group")),
            layout: &uniform_layout,
            entries: &uniform_entries,
        });

        let pipeline_layout = gpu
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&format!("{label} pipeline layout")),
                bind_group_layouts: &[&uniform_layout, &texture_layout],
                push_constant_ranges: &[],
            });

        let (pipeline, error) = gpu.validated(|| {
            gpu.device
                .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some(label),
                    layout: Some(&pipeline_layout),
                    vertex: wgpu::VertexState {
                        module: &vertex_module,
                        entry_point: Some("main"),
                        buffers: &[QuadVertex::layout()],
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    },
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleList,
                        strip_index_format: None,
                        front_face: wgpu::FrontFace::Ccw,
                        cull_mode: None,
                        polygon_mode: wgpu::PolygonMode::Fill,
                        unclipped_depth: false,
                        conservative: false,
                    },
                    depth_stencil: None,
                    multisample: wgpu::MultisampleState::default(),
                    fragment: Some(wgpu::FragmentState {
                        module: &fragment_module,
                        entry_point: Some("main"),
                        targets: &[Some(wgpu::ColorTargetState {
                            format: target_format,
                            blend: None,
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    }),
                    multiview: None,
                    cache: None,
                })
        });
        if let Some(error) = error {
            return Err(RenderError::Link {
                label: label.to_string(),
                log: error.to_string(),
            });
        }

        tracing::debug!(
            program = label,
            vertex = spec.vertex,
            fragment = spec.fragment,
            uniform_bytes = uniform_size,
            textures = interface.textures.len(),
            ?target_format,
            "linked shader program"
        );

        Ok(Self {
            label: label.to_string(),
            storage: UniformStorage::new(uniform_size as usize),
            interface,
            pipeline,
            texture_layout,
            uniform_group,
            uniform_buffer,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn interface(&self) -> &ProgramInterface {
        &self.interface
    }

    /// Vertex attribute location, or None when the program has no such input.
    pub fn attribute_location(&self, name: &str) -> Option<u32> {
        self.interface.attribute(name)
    }

    /// Byte offset of a uniform inside the program's block, or None when the
    /// program does not declare it.
    pub fn uniform_location(&self, name: &str) -> Option<u32> {
        self.interface.uniform(name).map(|member| member.offset)
    }

    /// Stages a uniform write. Returns false when the program has no uniform
    /// named `name` or its type differs; optional uniforms are simply skipped.
    pub fn set_uniform(&mut self, name: &str, value: impl Into<UniformValue>) -> bool {
        let value = value.into();
        let Some(member) = self.interface.uniform(name) else {
            return false;
        };
        if member.kind != value.kind() {
            tracing::warn!(
                program = %self.label,
                uniform = name,
                expected = ?member.kind,
                actual = ?value.kind(),
                "uniform type mismatch; write ignored"
            );
            return false;
        }
        self.storage.write(member.offset, &value)
    }

    /// Uploads staged uniform writes.
    pub fn flush(&mut self, queue: &wgpu::Queue) {
        let Some(buffer) = &self.uniform_buffer else {
            return;
        };
        if let Some(bytes) = self.storage.take_dirty() {
            queue.write_buffer(buffer, 0, bytes);
        }
    }

    /// Records a quad draw with `textures` bound to the program's texture
    /// slots in binding order.
    pub(crate) fn draw(
        &self,
        gpu: &Gpu,
        pass: &mut wgpu::RenderPass<'_>,
        quad: &QuadBuffer,
        textures: &[TextureBinding<'_>],
    ) -> Result<(), RenderError> {
        if textures.len() != self.interface.textures.len() {
            return Err(RenderError::Link {
                label: self.label.clone(),
                log: format!(
                    "program expects {} textures but {} were bound",
                    self.interface.textures.len(),
                    textures.len()
                ),
            });
        }

        let mut entries = Vec::with_capacity(textures.len() * 2);
        for (slot, texture) in self.interface.textures.iter().zip(textures) {
            entries.push(wgpu::BindGroupEntry {
                binding: slot.binding,
                resource: wgpu::BindingResource::TextureView(texture.view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: slot.binding + 1,
                resource: wgpu::BindingResource::Sampler(texture.sampler),
            });
        }
        let texture_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{} texture group", self.label)),
            layout: &self.texture_layout,
            entries: &entries,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(UNIFORM_GROUP, &self.uniform_group, &[]);
        pass.set_bind_group(TEXTURE_GROUP, &texture_group, &[]);
        quad.draw(pass);
        Ok(())
    }
}

fn create_module(
    gpu: &Gpu,
    label: &str,
    asset: &ShaderAsset,
) -> Result<wgpu::ShaderModule, RenderError> {
    let stage = match asset.stage {
        StageKind::Vertex => ShaderStage::Vertex,
        StageKind::Fragment => ShaderStage::Fragment,
    };
    let (module, error) = gpu.validated(|| {
        gpu.device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("{label} {}", asset.name)),
                source: wgpu::ShaderSource::Glsl {
                    shader: Cow::Owned(asset.source.to_string()),
                    stage,
                    defines: &[],
                },
            })
    });
    match error {
        Some(error) => Err(RenderError::Compile {
            label: label.to_string(),
            stage: asset.stage,
            log: error.to_string(),
        }),
        None => Ok(module),
    }
}

fn uniform_layout_entries(interface: &ProgramInterface) -> Vec<wgpu::BindGroupLayoutEntry> {
    if interface.uniforms.is_none() {
        return Vec::new();
    }
    vec![wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }]
}

fn texture_layout_entries(interface: &ProgramInterface) -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = Vec::with_capacity(interface.textures.len() * 2);
    for slot in &interface.textures {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: slot.binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: slot.binding + 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }
    entries
}
