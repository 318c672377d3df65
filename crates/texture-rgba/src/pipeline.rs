//! The per-key renderer: one backend, one presentation binding, one frame
//! texture, driven through a small state machine.
//!
//! ```text
//!  create ──► Initialized ──submit──► Active ◄──recover── Invalid
//!                 │                     │  └──lost/invalidate──▲
//!                 └──────────── dispose ┴──────────────► Disposed
//! ```

use std::fmt;
use std::sync::Arc;

use crate::backend::{Backend, BackendFactory, SurfaceHandle};
use crate::error::{BackendError, RendererError};
use crate::frame::FrameDescriptor;
use crate::observe::{PipelineEvent, PipelineObserver, TracingObserver};
use crate::pixels::{Normalization, TruncationPolicy};
use crate::recovery::Presentation;
use crate::textures::TextureSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Initialized,
    Active,
    Invalid,
    Disposed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PipelineState::Initialized => "initialized",
            PipelineState::Active => "active",
            PipelineState::Invalid => "invalid",
            PipelineState::Disposed => "disposed",
        };
        f.write_str(label)
    }
}

/// Outcome of a frame that reached the drawable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Presented,
    /// Presented with rows blanked or clamped under a lenient truncation policy.
    Degraded { truncated_rows: u32 },
}

#[derive(Clone)]
pub struct PipelineOptions {
    pub normalization: Normalization,
    pub truncation: TruncationPolicy,
    pub observer: Arc<dyn PipelineObserver>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            normalization: Normalization::default(),
            truncation: TruncationPolicy::default(),
            observer: Arc::new(TracingObserver),
        }
    }
}

impl fmt::Debug for PipelineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineOptions")
            .field("normalization", &self.normalization)
            .field("truncation", &self.truncation)
            .finish_non_exhaustive()
    }
}

pub struct Pipeline<B: Backend> {
    key: i64,
    backend: B,
    presentation: Presentation<B::Binding>,
    textures: TextureSlot<B::Texture>,
    options: PipelineOptions,
    state: PipelineState,
    frames: u64,
}

impl<B: Backend> Pipeline<B> {
    /// Initializes a backend from `factory` and binds `surface`.
    ///
    /// Nothing acquired here outlives a failed call.
    pub fn create<F>(
        factory: &F,
        key: i64,
        surface: SurfaceHandle,
        options: PipelineOptions,
    ) -> Result<Self, RendererError>
    where
        F: BackendFactory<Backend = B>,
    {
        let mut backend = factory
            .initialize()
            .map_err(|err| RendererError::CreationFailed(err.to_string()))?;

        let presentation = match Presentation::bind(&mut backend, surface) {
            Ok(presentation) => presentation,
            Err(err) => {
                backend.release_program();
                backend.shutdown();
                return Err(RendererError::SurfaceBindFailure(err.to_string()));
            }
        };

        tracing::debug!(key, %surface, ?options, "renderer created");
        Ok(Self {
            key,
            backend,
            presentation,
            textures: TextureSlot::new(),
            options,
            state: PipelineState::Initialized,
            frames: 0,
        })
    }

    pub fn key(&self) -> i64 {
        self.key
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn surface(&self) -> SurfaceHandle {
        self.presentation.handle()
    }

    /// Dimensions of the most recently accepted frame, `(0, 0)` before the first.
    pub fn dimensions(&self) -> (u32, u32) {
        self.textures.dimensions()
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames
    }

    pub fn texture_allocations(&self) -> u64 {
        self.textures.allocations()
    }

    pub fn transfer_capacity(&self) -> usize {
        self.textures.transfer_capacity()
    }

    /// How many times the transfer buffer had to grow.
    pub fn transfer_growths(&self) -> u64 {
        self.textures.transfer_growths()
    }

    pub fn recovery_attempts(&self) -> u64 {
        self.presentation.recoveries()
    }

    fn emit(&self, event: PipelineEvent) {
        self.options.observer.on_event(&event);
    }

    /// Validates, uploads and presents one frame.
    pub fn submit_frame(
        &mut self,
        frame: &FrameDescriptor<'_>,
    ) -> Result<FrameStatus, RendererError> {
        if self.state == PipelineState::Disposed {
            return Err(RendererError::RendererNotFound(self.key));
        }

        let mut recovered = false;
        if self.state != PipelineState::Invalid && !self.presentation.is_valid(&self.backend) {
            self.mark_invalid("binding reported invalid");
        }
        if self.state == PipelineState::Invalid {
            self.recover()?;
            recovered = true;
        }

        let frame = frame.validate()?;
        let dimensions = frame.dimensions();

        if self.textures.texture().is_none() || self.textures.dimensions() != dimensions {
            self.reallocate(dimensions, frame.packed_len(), &mut recovered)?;
        }

        let truncated = self.textures.upload(
            &mut self.backend,
            &frame,
            self.options.normalization,
            self.options.truncation,
        )?;

        if !self.presentation.is_valid(&self.backend) {
            self.lost_surface("binding invalid before draw", &mut recovered)?;
        }
        self.present(&mut recovered)?;

        self.state = PipelineState::Active;
        self.frames += 1;
        self.emit(PipelineEvent::FrameAccepted {
            key: self.key,
            width: frame.width(),
            height: frame.height(),
            row_stride: frame.row_stride(),
        });

        if truncated > 0 {
            self.emit(PipelineEvent::FrameDegraded {
                key: self.key,
                truncated_rows: truncated,
            });
            return Ok(FrameStatus::Degraded {
                truncated_rows: truncated,
            });
        }
        Ok(FrameStatus::Presented)
    }

    fn reallocate(
        &mut self,
        dimensions: (u32, u32),
        packed_len: usize,
        recovered: &mut bool,
    ) -> Result<(), RendererError> {
        let previous = self.textures.dimensions();
        let (width, height) = dimensions;
        let stage = self
            .options
            .normalization
            .stages_on_host()
            .then_some(packed_len);

        if let Err(err) = self.textures.ensure(&mut self.backend, width, height, stage) {
            self.presentation.release(&mut self.backend);
            self.state = PipelineState::Invalid;
            self.emit(PipelineEvent::SurfaceLost {
                key: self.key,
                reason: "texture reallocation failed",
            });
            return Err(RendererError::RenderFailure(err.to_string()));
        }
        self.emit(PipelineEvent::Resized {
            key: self.key,
            from: previous,
            to: dimensions,
        });

        match self.presentation.resize(&mut self.backend, width, height) {
            Ok(()) => Ok(()),
            // Recovery reapplies the new dimensions.
            Err(BackendError::SurfaceLost) => {
                self.lost_surface("surface lost while resizing", recovered)
            }
            Err(err) => Err(RendererError::RenderFailure(err.to_string())),
        }
    }

    fn present(&mut self, recovered: &mut bool) -> Result<(), RendererError> {
        loop {
            let (Some(binding), Some(texture)) =
                (self.presentation.binding_mut(), self.textures.texture())
            else {
                return Err(RendererError::RenderFailure(
                    "no bound surface or texture to draw".into(),
                ));
            };
            match self.backend.present(binding, texture) {
                Ok(()) => return Ok(()),
                Err(BackendError::SurfaceLost) => {
                    self.lost_surface("surface lost during present", recovered)?
                }
                Err(err) => return Err(RendererError::RenderFailure(err.to_string())),
            }
        }
    }

    /// Marks the pipeline invalid and spends this call's single recovery
    /// attempt, if it has not been spent yet.
    fn lost_surface(
        &mut self,
        reason: &'static str,
        recovered: &mut bool,
    ) -> Result<(), RendererError> {
        self.mark_invalid(reason);
        if *recovered {
            return Err(RendererError::SurfaceUnavailable(reason.to_string()));
        }
        *recovered = true;
        self.recover()
    }

    fn mark_invalid(&mut self, reason: &'static str) {
        self.presentation.release(&mut self.backend);
        self.state = PipelineState::Invalid;
        self.emit(PipelineEvent::SurfaceLost {
            key: self.key,
            reason,
        });
    }

    fn recover(&mut self) -> Result<(), RendererError> {
        let dimensions = self.textures.dimensions();
        match self.presentation.recover(&mut self.backend, dimensions) {
            Ok(()) => {
                self.emit(PipelineEvent::RecoveryAttempted {
                    key: self.key,
                    error: None,
                });
                self.state = if self.textures.texture().is_some() {
                    PipelineState::Active
                } else {
                    PipelineState::Initialized
                };
                Ok(())
            }
            Err(err) => {
                self.emit(PipelineEvent::RecoveryAttempted {
                    key: self.key,
                    error: Some(err.to_string()),
                });
                Err(RendererError::SurfaceUnavailable(err.to_string()))
            }
        }
    }

    /// Platform notification that the surface was destroyed or resized.
    pub fn invalidate(&mut self) {
        if self.state == PipelineState::Disposed {
            return;
        }
        self.mark_invalid("platform reported surface change");
    }

    /// Releases every GPU resource; later calls do nothing.
    pub fn dispose(&mut self) {
        if self.state == PipelineState::Disposed {
            return;
        }
        self.textures.release(&mut self.backend);
        self.backend.release_program();
        self.presentation.release(&mut self.backend);
        self.backend.shutdown();
        self.state = PipelineState::Disposed;
        self.emit(PipelineEvent::Disposed { key: self.key });
    }
}

impl<B: Backend> Drop for Pipeline<B> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<B: Backend> fmt::Debug for Pipeline<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("key", &self.key)
            .field("surface", &self.presentation.handle())
            .field("state", &self.state)
            .field("dimensions", &self.textures.dimensions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBackend, MockControl, MockEvent, RecordingObserver};

    const SURFACE: SurfaceHandle = SurfaceHandle::from_raw(1);

    fn pipeline_with(
        options: PipelineOptions,
    ) -> (Pipeline<MockBackend>, MockControl) {
        let control = MockControl::default();
        let factory = control.factory();
        let pipeline = Pipeline::create(&factory, 1, SURFACE, options).unwrap();
        (pipeline, control)
    }

    fn pipeline() -> (Pipeline<MockBackend>, MockControl) {
        pipeline_with(PipelineOptions::default())
    }

    fn white(width: usize, height: usize, stride: usize) -> Vec<u8> {
        let mut pixels = vec![0u8; stride * height];
        for row in pixels.chunks_mut(stride) {
            row[..width * 4].fill(0xFF);
        }
        pixels
    }

    #[test]
    fn first_frame_allocates_and_presents() {
        let (mut pipeline, control) = pipeline();
        assert_eq!(pipeline.state(), PipelineState::Initialized);
        let pixels = white(64, 64, 256);
        let status = pipeline
            .submit_frame(&FrameDescriptor::new(&pixels, 64, 64, Some(256)))
            .unwrap();
        assert_eq!(status, FrameStatus::Presented);
        assert_eq!(pipeline.state(), PipelineState::Active);
        assert_eq!(pipeline.dimensions(), (64, 64));
        assert_eq!(control.count(|e| matches!(e, MockEvent::Present(_))), 1);
    }

    #[test]
    fn validation_failure_leaves_state_untouched() {
        let (mut pipeline, control) = pipeline();
        let pixels = white(8, 8, 32);
        pipeline
            .submit_frame(&FrameDescriptor::packed(&pixels, 8, 8))
            .unwrap();
        control.clear_events();

        let err = pipeline
            .submit_frame(&FrameDescriptor::new(&pixels, 8, 8, Some(16)))
            .unwrap_err();
        assert_eq!(err, RendererError::InvalidStride);
        let err = pipeline
            .submit_frame(&FrameDescriptor::new(&pixels[..100], 8, 8, None))
            .unwrap_err();
        assert_eq!(err, RendererError::BufferTooSmall);

        assert_eq!(pipeline.dimensions(), (8, 8));
        assert_eq!(pipeline.state(), PipelineState::Active);
        assert!(control.events().is_empty());
    }

    #[test]
    fn same_size_frames_allocate_once() {
        let (mut pipeline, control) = pipeline();
        let pixels = white(32, 16, 128);
        for _ in 0..10 {
            pipeline
                .submit_frame(&FrameDescriptor::packed(&pixels, 32, 16))
                .unwrap();
        }
        assert_eq!(pipeline.texture_allocations(), 1);
        assert_eq!(control.count(|e| matches!(e, MockEvent::CreateTexture(..))), 1);
        assert_eq!(pipeline.frames_presented(), 10);
    }

    #[test]
    fn host_reorder_reuses_transfer_buffer() {
        let (mut pipeline, _control) = pipeline_with(PipelineOptions {
            normalization: Normalization::HostReorder,
            ..PipelineOptions::default()
        });
        let pixels = white(16, 16, 64);
        pipeline
            .submit_frame(&FrameDescriptor::packed(&pixels, 16, 16))
            .unwrap();
        let capacity = pipeline.transfer_capacity();
        assert!(capacity >= 16 * 16 * 4);
        for _ in 0..5 {
            pipeline
                .submit_frame(&FrameDescriptor::packed(&pixels, 16, 16))
                .unwrap();
        }
        assert_eq!(pipeline.transfer_capacity(), capacity);
        assert_eq!(pipeline.transfer_growths(), 1);
    }

    #[test]
    fn resize_reallocates_exactly_once() {
        let (mut pipeline, control) = pipeline();
        let small = white(64, 64, 256);
        let large = white(128, 64, 512);
        pipeline
            .submit_frame(&FrameDescriptor::new(&small, 64, 64, Some(256)))
            .unwrap();
        control.clear_events();
        pipeline
            .submit_frame(&FrameDescriptor::new(&large, 128, 64, Some(512)))
            .unwrap();

        assert_eq!(pipeline.dimensions(), (128, 64));
        assert_eq!(
            control.events(),
            vec![
                MockEvent::ReleaseTexture(64, 64),
                MockEvent::CreateTexture(128, 64),
                MockEvent::ResizeSurface(128, 64),
                MockEvent::Upload(128, 64),
                MockEvent::Present(SURFACE),
            ]
        );
    }

    #[test]
    fn forced_invalid_recovers_on_next_submit() {
        let observer = Arc::new(RecordingObserver::default());
        let (mut pipeline, control) = pipeline_with(PipelineOptions {
            observer: observer.clone(),
            ..PipelineOptions::default()
        });
        let pixels = white(4, 4, 16);
        pipeline
            .submit_frame(&FrameDescriptor::packed(&pixels, 4, 4))
            .unwrap();

        pipeline.invalidate();
        assert_eq!(pipeline.state(), PipelineState::Invalid);
        control.clear_events();

        pipeline
            .submit_frame(&FrameDescriptor::packed(&pixels, 4, 4))
            .unwrap();
        assert_eq!(pipeline.state(), PipelineState::Active);
        assert_eq!(pipeline.recovery_attempts(), 1);
        assert_eq!(pipeline.surface(), SURFACE);
        assert_eq!(
            control.events(),
            vec![
                MockEvent::BindSurface(SURFACE),
                MockEvent::ResizeSurface(4, 4),
                MockEvent::Upload(4, 4),
                MockEvent::Present(SURFACE),
            ]
        );
        assert!(observer
            .events()
            .contains(&PipelineEvent::RecoveryAttempted { key: 1, error: None }));
    }

    #[test]
    fn failed_recovery_reports_unavailable_and_stays_invalid() {
        let (mut pipeline, control) = pipeline();
        let pixels = white(4, 4, 16);
        pipeline
            .submit_frame(&FrameDescriptor::packed(&pixels, 4, 4))
            .unwrap();
        pipeline.invalidate();
        control.with(|state| state.fail_bind = true);
        control.clear_events();

        let err = pipeline
            .submit_frame(&FrameDescriptor::packed(&pixels, 4, 4))
            .unwrap_err();
        assert!(matches!(err, RendererError::SurfaceUnavailable(_)));
        assert_eq!(pipeline.state(), PipelineState::Invalid);
        assert_eq!(pipeline.dimensions(), (4, 4));
        assert_eq!(pipeline.recovery_attempts(), 1);
        assert!(!control
            .events()
            .iter()
            .any(|e| matches!(e, MockEvent::Upload(..) | MockEvent::CreateTexture(..))));

        control.with(|state| state.fail_bind = false);
        pipeline
            .submit_frame(&FrameDescriptor::packed(&pixels, 4, 4))
            .unwrap();
        assert_eq!(pipeline.state(), PipelineState::Active);
    }

    #[test]
    fn binding_reported_lost_is_recovered_before_upload() {
        let (mut pipeline, control) = pipeline();
        let pixels = white(2, 2, 8);
        pipeline
            .submit_frame(&FrameDescriptor::packed(&pixels, 2, 2))
            .unwrap();
        control.with(|state| state.surface_lost = true);
        pipeline
            .submit_frame(&FrameDescriptor::packed(&pixels, 2, 2))
            .unwrap();
        assert_eq!(pipeline.recovery_attempts(), 1);
        assert_eq!(pipeline.state(), PipelineState::Active);
    }

    #[test]
    fn present_time_loss_recovers_within_the_call() {
        let (mut pipeline, control) = pipeline();
        let pixels = white(2, 2, 8);
        control.with(|state| state.lose_presents = 1);
        let status = pipeline
            .submit_frame(&FrameDescriptor::packed(&pixels, 2, 2))
            .unwrap();
        assert_eq!(status, FrameStatus::Presented);
        assert_eq!(pipeline.recovery_attempts(), 1);
        assert_eq!(control.count(|e| matches!(e, MockEvent::Present(_))), 1);
        assert_eq!(control.count(|e| matches!(e, MockEvent::Upload(..))), 1);
    }

    #[test]
    fn only_one_recovery_per_submit() {
        let (mut pipeline, control) = pipeline();
        let pixels = white(2, 2, 8);
        control.with(|state| state.lose_presents = 2);
        let err = pipeline
            .submit_frame(&FrameDescriptor::packed(&pixels, 2, 2))
            .unwrap_err();
        assert!(matches!(err, RendererError::SurfaceUnavailable(_)));
        assert_eq!(pipeline.state(), PipelineState::Invalid);
        assert_eq!(pipeline.recovery_attempts(), 1);
    }

    #[test]
    fn reallocation_failure_tears_down_to_invalid() {
        let (mut pipeline, control) = pipeline();
        let small = white(8, 8, 32);
        pipeline
            .submit_frame(&FrameDescriptor::packed(&small, 8, 8))
            .unwrap();
        control.with(|state| state.fail_texture = true);

        let large = white(16, 16, 64);
        let err = pipeline
            .submit_frame(&FrameDescriptor::packed(&large, 16, 16))
            .unwrap_err();
        assert!(matches!(err, RendererError::RenderFailure(_)));
        assert_eq!(pipeline.state(), PipelineState::Invalid);
        assert_eq!(pipeline.dimensions(), (0, 0));
        assert_eq!(control.with(|state| state.live_bindings), 0);
        assert_eq!(control.with(|state| state.live_textures), 0);

        // Recovery rebuilds from empty: no resize for (0, 0), then a fresh texture.
        control.with(|state| state.fail_texture = false);
        control.clear_events();
        pipeline
            .submit_frame(&FrameDescriptor::packed(&large, 16, 16))
            .unwrap();
        assert_eq!(
            control.events(),
            vec![
                MockEvent::BindSurface(SURFACE),
                MockEvent::CreateTexture(16, 16),
                MockEvent::ResizeSurface(16, 16),
                MockEvent::Upload(16, 16),
                MockEvent::Present(SURFACE),
            ]
        );
    }

    #[test]
    fn upload_failure_keeps_texture() {
        let (mut pipeline, control) = pipeline();
        let pixels = white(4, 4, 16);
        pipeline
            .submit_frame(&FrameDescriptor::packed(&pixels, 4, 4))
            .unwrap();
        control.with(|state| state.fail_upload = true);
        let err = pipeline
            .submit_frame(&FrameDescriptor::packed(&pixels, 4, 4))
            .unwrap_err();
        assert_eq!(err.code(), "RENDER_FAILED");
        assert_eq!(pipeline.dimensions(), (4, 4));
        assert_eq!(pipeline.state(), PipelineState::Active);
    }

    #[test]
    fn lenient_truncation_still_rejects_short_buffers() {
        let (mut pipeline, control) = pipeline_with(PipelineOptions {
            normalization: Normalization::HostReorder,
            truncation: TruncationPolicy::DropRows,
            ..PipelineOptions::default()
        });
        let pixels = white(4, 4, 16);
        let err = pipeline
            .submit_frame(&FrameDescriptor::packed(&pixels[..40], 4, 4))
            .unwrap_err();
        assert_eq!(err, RendererError::BufferTooSmall);
        assert_eq!(pipeline.dimensions(), (0, 0));
        assert_eq!(control.count(|e| matches!(e, MockEvent::Upload(..))), 0);
    }

    #[test]
    fn present_failure_keeps_texture_and_state() {
        let (mut pipeline, control) = pipeline();
        let pixels = white(4, 4, 16);
        pipeline
            .submit_frame(&FrameDescriptor::packed(&pixels, 4, 4))
            .unwrap();
        control.with(|state| state.fail_present = true);

        let err = pipeline
            .submit_frame(&FrameDescriptor::packed(&pixels, 4, 4))
            .unwrap_err();
        assert!(matches!(err, RendererError::RenderFailure(_)));
        assert_eq!(pipeline.dimensions(), (4, 4));
        assert_eq!(pipeline.state(), PipelineState::Active);
        assert_eq!(pipeline.texture_allocations(), 1);
        assert_eq!(control.count(|e| matches!(e, MockEvent::CreateTexture(..))), 1);
        assert_eq!(control.count(|e| matches!(e, MockEvent::ReleaseTexture(..))), 0);
        assert_eq!(pipeline.recovery_attempts(), 0);

        control.with(|state| state.fail_present = false);
        assert_eq!(
            pipeline.submit_frame(&FrameDescriptor::packed(&pixels, 4, 4)),
            Ok(FrameStatus::Presented)
        );
        assert_eq!(pipeline.frames_presented(), 2);
    }

    #[test]
    fn dispose_releases_in_order_and_is_idempotent() {
        let (mut pipeline, control) = pipeline();
        let pixels = white(4, 4, 16);
        pipeline
            .submit_frame(&FrameDescriptor::packed(&pixels, 4, 4))
            .unwrap();
        control.clear_events();

        pipeline.dispose();
        pipeline.dispose();
        assert_eq!(pipeline.state(), PipelineState::Disposed);
        assert_eq!(
            control.events(),
            vec![
                MockEvent::ReleaseTexture(4, 4),
                MockEvent::ReleaseProgram,
                MockEvent::ReleaseSurface(SURFACE),
                MockEvent::Shutdown,
            ]
        );

        let err = pipeline
            .submit_frame(&FrameDescriptor::packed(&pixels, 4, 4))
            .unwrap_err();
        assert_eq!(err, RendererError::RendererNotFound(1));
        pipeline.invalidate();
        assert_eq!(pipeline.state(), PipelineState::Disposed);
    }

    #[test]
    fn failed_bind_releases_backend() {
        let control = MockControl::default();
        control.with(|state| state.fail_bind = true);
        let factory = control.factory();
        let err = Pipeline::create(&factory, 9, SURFACE, PipelineOptions::default()).unwrap_err();
        assert!(matches!(err, RendererError::SurfaceBindFailure(_)));
        assert_eq!(control.with(|state| state.live_backends), 0);
    }

    #[test]
    fn failed_initialize_is_creation_failure() {
        let control = MockControl::default();
        control.with(|state| state.fail_initialize = true);
        let factory = control.factory();
        let err = Pipeline::create(&factory, 9, SURFACE, PipelineOptions::default()).unwrap_err();
        assert_eq!(err.code(), "CREATE_TEXTURE_FAILED");
    }

    #[test]
    fn drop_disposes() {
        let (pipeline, control) = pipeline();
        drop(pipeline);
        assert_eq!(control.count(|e| *e == MockEvent::Shutdown), 1);
        assert_eq!(control.with(|state| state.live_backends), 0);
    }
}
