//! Recording backend for exercising pipelines without a GPU.

use std::sync::{Arc, Mutex, PoisonError};

use crate::backend::{Backend, BackendFactory, SurfaceArena, SurfaceHandle, SurfaceHost, UploadLayout};
use crate::error::BackendError;
use crate::observe::{PipelineEvent, PipelineObserver};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MockEvent {
    Initialize,
    BindSurface(SurfaceHandle),
    ResizeSurface(u32, u32),
    ReleaseSurface(SurfaceHandle),
    CreateTexture(u32, u32),
    ReleaseTexture(u32, u32),
    Upload(u32, u32),
    Present(SurfaceHandle),
    ReleaseProgram,
    Shutdown,
}

#[derive(Debug, Clone)]
pub(crate) struct MockUpload {
    pub layout: UploadLayout,
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
pub(crate) struct MockState {
    pub events: Vec<MockEvent>,
    pub uploads: Vec<MockUpload>,
    pub fail_register: bool,
    pub fail_initialize: bool,
    pub fail_bind: bool,
    pub fail_texture: bool,
    pub fail_upload: bool,
    pub fail_present: bool,
    /// Number of upcoming presents that report a lost surface.
    pub lose_presents: u32,
    /// Reported by `binding_valid` until the next successful bind.
    pub surface_lost: bool,
    pub live_bindings: i64,
    pub live_textures: i64,
    pub live_backends: i64,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MockControl(Arc<Mutex<MockState>>);

impl MockControl {
    pub fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.with(|state| state.events.clone())
    }

    pub fn clear_events(&self) {
        self.with(|state| state.events.clear());
    }

    pub fn count(&self, predicate: impl Fn(&MockEvent) -> bool) -> usize {
        self.with(|state| state.events.iter().filter(|event| predicate(event)).count())
    }

    fn record(&self, event: MockEvent) {
        self.with(|state| state.events.push(event));
    }

    pub fn backend(&self) -> MockBackend {
        self.with(|state| state.live_backends += 1);
        MockBackend {
            control: self.clone(),
        }
    }

    pub fn factory(&self) -> MockFactory {
        MockFactory {
            control: self.clone(),
            host: MockHost {
                control: self.clone(),
                surfaces: SurfaceArena::new(),
            },
        }
    }
}

pub(crate) struct MockHost {
    control: MockControl,
    surfaces: SurfaceArena<()>,
}

impl MockHost {
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }
}

impl SurfaceHost for MockHost {
    fn register(&self) -> Result<SurfaceHandle, BackendError> {
        if self.control.with(|state| state.fail_register) {
            return Err(BackendError::SurfaceBind("host refused registration".into()));
        }
        Ok(self.surfaces.insert(()))
    }

    fn unregister(&self, handle: SurfaceHandle) {
        self.surfaces.remove(handle);
    }

    fn contains(&self, handle: SurfaceHandle) -> bool {
        self.surfaces.contains(handle)
    }
}

pub(crate) struct MockFactory {
    control: MockControl,
    host: MockHost,
}

impl MockFactory {
    pub fn host(&self) -> &MockHost {
        &self.host
    }
}

impl BackendFactory for MockFactory {
    type Backend = MockBackend;

    fn surfaces(&self) -> &dyn SurfaceHost {
        &self.host
    }

    fn initialize(&self) -> Result<MockBackend, BackendError> {
        if self.control.with(|state| state.fail_initialize) {
            return Err(BackendError::Device("no adapter".into()));
        }
        self.control.record(MockEvent::Initialize);
        Ok(self.control.backend())
    }
}

#[derive(Debug)]
pub(crate) struct MockBinding {
    handle: SurfaceHandle,
}

#[derive(Debug)]
pub(crate) struct MockTexture {
    width: u32,
    height: u32,
}

pub(crate) struct MockBackend {
    control: MockControl,
}

impl Backend for MockBackend {
    type Binding = MockBinding;
    type Texture = MockTexture;

    fn bind_surface(&mut self, surface: SurfaceHandle) -> Result<MockBinding, BackendError> {
        self.control.with(|state| {
            if state.fail_bind {
                return Err(BackendError::SurfaceBind("surface refused".into()));
            }
            state.events.push(MockEvent::BindSurface(surface));
            state.surface_lost = false;
            state.live_bindings += 1;
            Ok(MockBinding { handle: surface })
        })
    }

    fn binding_valid(&self, _binding: &MockBinding) -> bool {
        !self.control.with(|state| state.surface_lost)
    }

    fn resize_surface(
        &mut self,
        _binding: &mut MockBinding,
        width: u32,
        height: u32,
    ) -> Result<(), BackendError> {
        self.control.record(MockEvent::ResizeSurface(width, height));
        Ok(())
    }

    fn release_surface(&mut self, binding: MockBinding) {
        self.control.with(|state| {
            state.events.push(MockEvent::ReleaseSurface(binding.handle));
            state.live_bindings -= 1;
        });
    }

    fn create_texture(&mut self, width: u32, height: u32) -> Result<MockTexture, BackendError> {
        self.control.with(|state| {
            if state.fail_texture {
                return Err(BackendError::Allocation("out of video memory".into()));
            }
            state.events.push(MockEvent::CreateTexture(width, height));
            state.live_textures += 1;
            Ok(MockTexture { width, height })
        })
    }

    fn release_texture(&mut self, texture: MockTexture) {
        self.control.with(|state| {
            state
                .events
                .push(MockEvent::ReleaseTexture(texture.width, texture.height));
            state.live_textures -= 1;
        });
    }

    fn upload(
        &mut self,
        _texture: &MockTexture,
        data: &[u8],
        layout: UploadLayout,
    ) -> Result<(), BackendError> {
        self.control.with(|state| {
            if state.fail_upload {
                return Err(BackendError::Render("upload rejected".into()));
            }
            state.events.push(MockEvent::Upload(layout.width, layout.height));
            state.uploads.push(MockUpload {
                layout,
                data: data.to_vec(),
            });
            Ok(())
        })
    }

    fn present(
        &mut self,
        binding: &mut MockBinding,
        _texture: &MockTexture,
    ) -> Result<(), BackendError> {
        self.control.with(|state| {
            if state.lose_presents > 0 {
                state.lose_presents -= 1;
                state.surface_lost = true;
                return Err(BackendError::SurfaceLost);
            }
            if state.fail_present {
                return Err(BackendError::Render("command submission failed".into()));
            }
            state.events.push(MockEvent::Present(binding.handle));
            Ok(())
        })
    }

    fn release_program(&mut self) {
        self.control.record(MockEvent::ReleaseProgram);
    }

    fn shutdown(&mut self) {
        self.control.with(|state| {
            state.events.push(MockEvent::Shutdown);
            state.live_backends -= 1;
        });
    }
}

#[derive(Default)]
pub(crate) struct RecordingObserver(Mutex<Vec<PipelineEvent>>);

impl RecordingObserver {
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PipelineObserver for RecordingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
