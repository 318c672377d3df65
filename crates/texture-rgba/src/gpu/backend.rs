use std::sync::Arc;

use super::context::{AdapterProfile, GpuContext, GpuOptions};
use super::shader::ShaderProgram;
use super::surface::{SurfaceBinding, WindowHost};
use super::texture::FrameTexture;
use crate::backend::{Backend, BackendFactory, SurfaceHandle, SurfaceHost, UploadLayout};
use crate::error::BackendError;

/// Builds one [`WgpuBackend`] per pipeline over a shared window host.
pub struct WgpuFactory<H> {
    host: Arc<H>,
    options: GpuOptions,
}

impl<H: WindowHost + 'static> WgpuFactory<H> {
    pub fn new(host: Arc<H>, options: GpuOptions) -> Self {
        Self { host, options }
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    pub fn options(&self) -> &GpuOptions {
        &self.options
    }
}

impl<H: WindowHost + 'static> BackendFactory for WgpuFactory<H> {
    type Backend = WgpuBackend<H>;

    fn surfaces(&self) -> &dyn SurfaceHost {
        self.host.as_ref()
    }

    fn initialize(&self) -> Result<WgpuBackend<H>, BackendError> {
        let context =
            GpuContext::new(&self.options).map_err(|err| BackendError::Device(format!("{err:#}")))?;
        let program = ShaderProgram::new(&context, self.options.swizzle)?;
        Ok(WgpuBackend {
            host: Arc::clone(&self.host),
            options: self.options,
            context: Some(context),
            program: Some(program),
        })
    }
}

pub struct WgpuBackend<H> {
    host: Arc<H>,
    options: GpuOptions,
    context: Option<GpuContext>,
    program: Option<ShaderProgram>,
}

impl<H> WgpuBackend<H> {
    pub fn adapter(&self) -> Option<&AdapterProfile> {
        self.context.as_ref().map(|context| &context.profile)
    }

    fn context(&self) -> Result<&GpuContext, BackendError> {
        self.context
            .as_ref()
            .ok_or_else(|| BackendError::Device("GPU context already released".into()))
    }

    fn parts(&mut self) -> Result<(&GpuContext, &mut ShaderProgram), BackendError> {
        match (self.context.as_ref(), self.program.as_mut()) {
            (Some(context), Some(program)) => Ok((context, program)),
            _ => Err(BackendError::Device("GPU program already released".into())),
        }
    }
}

impl<H: WindowHost + 'static> Backend for WgpuBackend<H> {
    type Binding = SurfaceBinding;
    type Texture = FrameTexture;

    fn bind_surface(&mut self, surface: SurfaceHandle) -> Result<SurfaceBinding, BackendError> {
        let hosted = self
            .host
            .window(surface)
            .ok_or_else(|| BackendError::SurfaceBind(format!("surface {surface} is not hosted")))?;
        let options = self.options;
        let (context, program) = self.parts()?;
        let binding = SurfaceBinding::new(context, surface, hosted, &options)?;
        program.ensure_pipeline(context, binding.format())?;
        Ok(binding)
    }

    fn binding_valid(&self, binding: &SurfaceBinding) -> bool {
        !binding.is_lost() && self.host.contains(binding.handle())
    }

    fn resize_surface(
        &mut self,
        binding: &mut SurfaceBinding,
        width: u32,
        height: u32,
    ) -> Result<(), BackendError> {
        binding.resize(self.context()?, width, height)
    }

    fn release_surface(&mut self, binding: SurfaceBinding) {
        tracing::trace!(surface = %binding.handle(), "surface binding released");
        drop(binding);
    }

    fn create_texture(&mut self, width: u32, height: u32) -> Result<FrameTexture, BackendError> {
        let (context, program) = self.parts()?;
        FrameTexture::new(context, program, width, height)
    }

    fn release_texture(&mut self, texture: FrameTexture) {
        texture.destroy();
    }

    fn upload(
        &mut self,
        texture: &FrameTexture,
        data: &[u8],
        layout: UploadLayout,
    ) -> Result<(), BackendError> {
        texture.write(self.context()?, data, layout)
    }

    fn present(
        &mut self,
        binding: &mut SurfaceBinding,
        texture: &FrameTexture,
    ) -> Result<(), BackendError> {
        let clear_color = self.options.clear_color;
        let (context, program) = self.parts()?;
        let pipeline = program.pipeline(binding.format()).ok_or_else(|| {
            BackendError::Render(format!("no pipeline for {:?}", binding.format()))
        })?;

        let mut scope = binding.begin_frame(context)?;
        context
            .scoped(|_| scope.draw(program, pipeline, texture, clear_color))
            .map_err(|err| BackendError::Render(err.to_string()))?;
        if scope.present(&context.queue) {
            tracing::debug!(surface = %binding.handle(), "surface suboptimal; rebinding on next frame");
            binding.mark_lost();
        }
        Ok(())
    }

    fn release_program(&mut self) {
        self.program = None;
    }

    fn shutdown(&mut self) {
        self.program = None;
        if let Some(context) = self.context.take() {
            tracing::debug!(adapter = %context.profile.name, "GPU context released");
        }
    }
}
