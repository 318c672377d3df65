use super::context::GpuContext;
use super::shader::ShaderProgram;
use crate::backend::UploadLayout;
use crate::error::BackendError;

/// Frame-sized RGBA texture plus the bind group that samples it.
pub struct FrameTexture {
    texture: wgpu::Texture,
    pub(crate) bind_group: wgpu::BindGroup,
    size: wgpu::Extent3d,
}

impl FrameTexture {
    pub(crate) fn new(
        context: &GpuContext,
        program: &ShaderProgram,
        width: u32,
        height: u32,
    ) -> Result<Self, BackendError> {
        let max_dimension = context.profile.max_texture_dimension;
        if width > max_dimension || height > max_dimension {
            return Err(BackendError::Allocation(format!(
                "GPU max texture dimension is {max_dimension}, requested frame is {width}x{height}"
            )));
        }

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        context
            .scoped(|device| {
                let texture = device.create_texture(&wgpu::TextureDescriptor {
                    label: Some("frame texture"),
                    size,
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                    view_formats: &[],
                });
                let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("frame bind group"),
                    layout: &program.bind_group_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(&view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(&program.sampler),
                        },
                    ],
                });
                Self {
                    texture,
                    bind_group,
                    size,
                }
            })
            .map_err(|err| BackendError::Allocation(err.to_string()))
    }

    pub fn size(&self) -> (u32, u32) {
        (self.size.width, self.size.height)
    }

    /// Copies `data` into the texture, `layout.bytes_per_row` bytes apart.
    pub(crate) fn write(
        &self,
        context: &GpuContext,
        data: &[u8],
        layout: UploadLayout,
    ) -> Result<(), BackendError> {
        if (layout.width, layout.height) != self.size() {
            return Err(BackendError::Render(format!(
                "upload of {}x{} into {}x{} texture",
                layout.width, layout.height, self.size.width, self.size.height
            )));
        }
        context
            .scoped(|_| {
                context.queue.write_texture(
                    wgpu::TexelCopyTextureInfo {
                        texture: &self.texture,
                        mip_level: 0,
                        origin: wgpu::Origin3d::ZERO,
                        aspect: wgpu::TextureAspect::All,
                    },
                    data,
                    wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(layout.bytes_per_row),
                        rows_per_image: Some(layout.height),
                    },
                    self.size,
                );
            })
            .map_err(|err| BackendError::Render(err.to_string()))
    }

    pub(crate) fn destroy(self) {
        self.texture.destroy();
    }
}
