//! Push raw BGRA frames, see them on a GPU-presented surface.
//!
//! A dispatch layer talks to a [`Registry`], which keeps one [`Pipeline`] per
//! client key. Each pipeline owns a backend context, a presentation binding
//! derived from a stable [`SurfaceHandle`], and a texture sized to the most
//! recent frame. The flow of one frame:
//!
//! ```text
//!   submit_frame(key, bytes, w, h, stride)
//!          │
//!          ▼
//!   Registry ──lookup──▶ Pipeline ──recover?──▶ validate ──▶ realloc on resize
//!                                                               │
//!                               present ◀── draw quad ◀── upload (swizzle / repack)
//! ```
//!
//! Everything that touches a graphics API sits behind the [`Backend`] trait.
//! [`gpu`] provides the `wgpu` implementation; callers supply a
//! [`gpu::WindowHost`] that maps surface handles onto native windows.

mod backend;
mod error;
mod frame;
pub mod gpu;
mod observe;
mod pipeline;
mod pixels;
mod recovery;
mod registry;
mod settings;
mod textures;

#[cfg(test)]
mod mock;

use std::sync::Arc;

pub use backend::{Backend, BackendFactory, SurfaceArena, SurfaceHandle, SurfaceHost, UploadLayout};
pub use error::{BackendError, RendererError};
pub use frame::{packed_stride, validate, FrameDescriptor, FrameRejection, ValidFrame, BYTES_PER_PIXEL};
pub use observe::{PipelineEvent, PipelineObserver, TracingObserver};
pub use pipeline::{FrameStatus, Pipeline, PipelineOptions, PipelineState};
pub use pixels::{pack_rows, reorder_bgra_rows, Normalization, RowLayout, TruncationPolicy};
pub use registry::Registry;

/// Registry over the `wgpu` backend with options taken from `settings`.
///
/// Normalization and the fragment swizzle are derived from the same setting
/// so the two cannot disagree.
pub fn wgpu_registry<H>(
    host: Arc<H>,
    settings: &rgbaconfig::RendererSettings,
    observer: Arc<dyn PipelineObserver>,
) -> Registry<gpu::WgpuFactory<H>>
where
    H: gpu::WindowHost + 'static,
{
    let factory = gpu::WgpuFactory::new(host, gpu::GpuOptions::from_settings(settings));
    Registry::new(factory, PipelineOptions::from_settings(settings, observer))
}
