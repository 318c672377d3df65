use std::sync::Arc;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use super::context::{clamp_frame_latency, select_present_mode, select_surface_format, GpuContext, GpuOptions};
use super::shader::{ShaderProgram, QUAD_VERTEX_COUNT};
use super::texture::FrameTexture;
use crate::backend::{SurfaceHandle, SurfaceHost};
use crate::error::BackendError;

/// A native window a `wgpu::Surface` can be created for.
pub trait PresentableWindow: HasWindowHandle + HasDisplayHandle + Send + Sync {}

impl<T> PresentableWindow for T where T: HasWindowHandle + HasDisplayHandle + Send + Sync {}

/// A window as resolved from a surface handle.
#[derive(Clone)]
pub struct HostedWindow {
    pub window: Arc<dyn PresentableWindow>,
    /// Current drawable size in physical pixels.
    pub size: (u32, u32),
}

/// Surface host that can resolve handles to native windows.
pub trait WindowHost: SurfaceHost {
    /// `None` once the host stopped presenting `handle`.
    fn window(&self, handle: SurfaceHandle) -> Option<HostedWindow>;
}

/// A configured `wgpu::Surface` for one handle.
pub struct SurfaceBinding {
    handle: SurfaceHandle,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    lost: bool,
}

impl SurfaceBinding {
    pub(crate) fn new(
        context: &GpuContext,
        handle: SurfaceHandle,
        hosted: HostedWindow,
        options: &GpuOptions,
    ) -> Result<Self, BackendError> {
        let surface = context
            .instance
            .create_surface(hosted.window)
            .map_err(|err| BackendError::SurfaceBind(err.to_string()))?;

        let caps = surface.get_capabilities(&context.adapter);
        let format = select_surface_format(&caps).ok_or_else(|| {
            BackendError::SurfaceBind("adapter cannot present to this surface".into())
        })?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let max_dimension = context.profile.max_texture_dimension;
        let (width, height) = hosted.size;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.clamp(1, max_dimension),
            height: height.clamp(1, max_dimension),
            present_mode: select_present_mode(&caps, options.present_mode),
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: clamp_frame_latency(options.frame_latency),
        };
        surface.configure(&context.device, &config);

        tracing::debug!(
            surface = %handle,
            ?format,
            present_mode = ?config.present_mode,
            width = config.width,
            height = config.height,
            "surface configured"
        );
        Ok(Self {
            handle,
            surface,
            config,
            lost: false,
        })
    }

    pub fn handle(&self) -> SurfaceHandle {
        self.handle
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub(crate) fn is_lost(&self) -> bool {
        self.lost
    }

    pub(crate) fn resize(
        &mut self,
        context: &GpuContext,
        width: u32,
        height: u32,
    ) -> Result<(), BackendError> {
        let max_dimension = context.profile.max_texture_dimension;
        if width > max_dimension || height > max_dimension {
            return Err(BackendError::Render(format!(
                "GPU max texture dimension is {max_dimension}, requested surface is {width}x{height}"
            )));
        }
        if (width, height) == self.size() || width == 0 || height == 0 {
            return Ok(());
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&context.device, &self.config);
        tracing::debug!(surface = %self.handle, width, height, "surface resized");
        Ok(())
    }

    /// Acquires the next drawable and opens an encoder for it.
    pub(crate) fn begin_frame(&mut self, context: &GpuContext) -> Result<FrameScope, BackendError> {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.lost = true;
                return Err(BackendError::SurfaceLost);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(BackendError::Render("out of memory acquiring drawable".into()));
            }
            Err(wgpu::SurfaceError::Timeout) => {
                return Err(BackendError::Render("timed out acquiring drawable".into()));
            }
            Err(other) => return Err(BackendError::Render(other.to_string())),
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let encoder = context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });
        Ok(FrameScope {
            frame,
            view,
            encoder,
        })
    }

    /// Marks the binding stale after a suboptimal present.
    pub(crate) fn mark_lost(&mut self) {
        self.lost = true;
    }
}

/// One drawable plus the encoder recording into it. Dropping a scope
/// without calling [`FrameScope::present`] discards the frame.
pub(crate) struct FrameScope {
    frame: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
}

impl FrameScope {
    pub(crate) fn draw(
        &mut self,
        program: &ShaderProgram,
        pipeline: &wgpu::RenderPipeline,
        texture: &FrameTexture,
        clear_color: wgpu::Color,
    ) {
        let mut pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("frame pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear_color),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &texture.bind_group, &[]);
        pass.set_vertex_buffer(0, program.quad.slice(..));
        pass.draw(0..QUAD_VERTEX_COUNT, 0..1);
    }

    /// Submits the recorded commands and hands the drawable to the
    /// compositor. Returns whether the surface reported itself suboptimal.
    pub(crate) fn present(self, queue: &wgpu::Queue) -> bool {
        queue.submit(std::iter::once(self.encoder.finish()));
        let suboptimal = self.frame.suboptimal;
        self.frame.present();
        suboptimal
    }
}
