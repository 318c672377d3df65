use std::borrow::Cow;

use bytemuck::{Pod, Zeroable};
use wgpu::naga::ShaderStage;
use wgpu::util::DeviceExt;

use super::context::GpuContext;
use crate::error::BackendError;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct QuadVertex {
    position: [f32; 2],
    uv: [f32; 2],
}

/// Triangle strip covering clip space. V runs downwards so the first row of
/// the frame lands at the top of the drawable.
const QUAD: [QuadVertex; 4] = [
    QuadVertex {
        position: [-1.0, -1.0],
        uv: [0.0, 1.0],
    },
    QuadVertex {
        position: [1.0, -1.0],
        uv: [1.0, 1.0],
    },
    QuadVertex {
        position: [-1.0, 1.0],
        uv: [0.0, 0.0],
    },
    QuadVertex {
        position: [1.0, 1.0],
        uv: [1.0, 0.0],
    },
];

const QUAD_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) in vec2 a_position;
layout(location = 1) in vec2 a_uv;
layout(location = 0) out vec2 v_uv;

void main() {
    v_uv = a_uv;
    gl_Position = vec4(a_position, 0.0, 1.0);
}
";

/// Fragment stage; `{swizzle}` is `bgra` when caller bytes are uploaded
/// unreordered and `rgba` otherwise.
fn fragment_source(swizzle: bool) -> String {
    let swizzle = if swizzle { "bgra" } else { "rgba" };
    format!(
        r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

layout(set = 0, binding = 0) uniform texture2D frame_texture;
layout(set = 0, binding = 1) uniform sampler frame_sampler;

void main() {{
    vec4 texel = texture(sampler2D(frame_texture, frame_sampler), v_uv);
    outColor = texel.{swizzle};
}}
"
    )
}

/// Compiled shaders, sampler, layouts and quad geometry. Render pipelines
/// are built per surface format on first use.
pub(crate) struct ShaderProgram {
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub sampler: wgpu::Sampler,
    pipeline_layout: wgpu::PipelineLayout,
    pub quad: wgpu::Buffer,
    pipelines: Vec<(wgpu::TextureFormat, wgpu::RenderPipeline)>,
}

impl ShaderProgram {
    pub(crate) fn new(context: &GpuContext, swizzle: bool) -> Result<Self, BackendError> {
        let (vertex, fragment) = context
            .scoped(|device| {
                let vertex = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some("frame quad vertex"),
                    source: wgpu::ShaderSource::Glsl {
                        shader: Cow::Borrowed(VERTEX_SHADER_GLSL),
                        stage: ShaderStage::Vertex,
                        defines: &[],
                    },
                });
                let fragment = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some("frame quad fragment"),
                    source: wgpu::ShaderSource::Glsl {
                        shader: Cow::Owned(fragment_source(swizzle)),
                        stage: ShaderStage::Fragment,
                        defines: &[],
                    },
                });
                (vertex, fragment)
            })
            .map_err(|err| BackendError::ShaderCompile(err.to_string()))?;

        let device = &context.device;
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame texture layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("frame sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("frame pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let quad = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("frame quad"),
            contents: bytemuck::cast_slice(&QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let mut program = Self {
            vertex,
            fragment,
            bind_group_layout,
            sampler,
            pipeline_layout,
            quad,
            pipelines: Vec::new(),
        };
        // Build the common case up front so a broken program fails at create time.
        program.ensure_pipeline(context, wgpu::TextureFormat::Bgra8Unorm)?;
        Ok(program)
    }

    pub(crate) fn ensure_pipeline(
        &mut self,
        context: &GpuContext,
        format: wgpu::TextureFormat,
    ) -> Result<(), BackendError> {
        if self.pipeline(format).is_some() {
            return Ok(());
        }
        let pipeline = context
            .scoped(|device| self.build_pipeline(device, format))
            .map_err(|err| BackendError::ShaderCompile(err.to_string()))?;
        tracing::debug!(?format, "built frame render pipeline");
        self.pipelines.push((format, pipeline));
        Ok(())
    }

    pub(crate) fn pipeline(&self, format: wgpu::TextureFormat) -> Option<&wgpu::RenderPipeline> {
        self.pipelines
            .iter()
            .find(|(candidate, _)| *candidate == format)
            .map(|(_, pipeline)| pipeline)
    }

    fn build_pipeline(
        &self,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
    ) -> wgpu::RenderPipeline {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("frame pipeline"),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.vertex,
                entry_point: Some("main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &QUAD_ATTRIBUTES,
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
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
                module: &self.fragment,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        })
    }
}

/// Number of vertices in the quad strip.
pub(crate) const QUAD_VERTEX_COUNT: u32 = QUAD.len() as u32;
