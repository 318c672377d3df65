//! `wgpu` implementation of the backend seam.
//!
//! - `context` owns the instance, adapter, device and queue of one pipeline
//!   and picks surface formats, present modes and frame latency.
//! - `shader` compiles the GLSL quad program, owns the sampler, bind group
//!   layout and vertex buffer, and builds one render pipeline per surface
//!   format.
//! - `texture` allocates the frame-sized RGBA texture and writes uploads
//!   through the queue.
//! - `surface` derives a configured `wgpu::Surface` from a host window and
//!   scopes one acquire/draw/present cycle.
//! - `backend` glues these into [`WgpuBackend`] and [`WgpuFactory`].

mod backend;
mod context;
mod shader;
mod surface;
mod texture;

pub use backend::{WgpuBackend, WgpuFactory};
pub use context::{AdapterProfile, GpuOptions};
pub use surface::{HostedWindow, PresentableWindow, SurfaceBinding, WindowHost};
pub use texture::FrameTexture;

/// Requests an adapter without a surface and reports what it is.
pub fn probe_adapter(options: &GpuOptions) -> anyhow::Result<AdapterProfile> {
    context::GpuContext::new(options).map(|context| context.profile)
}
