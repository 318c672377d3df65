//! The trait boundary in front of every graphics-API call.
//!
//! A [`Backend`] is owned by exactly one pipeline and is only ever driven
//! from one thread at a time. [`BackendFactory`] produces backends and
//! fronts the [`SurfaceHost`], the compositor-side collaborator that hands
//! out stable surface handles.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use slab::Slab;

use crate::error::BackendError;

/// Stable identity of a presentable surface.
///
/// Handles are arena indices, never live pointers. They stay valid for the
/// whole life of a pipeline while the binding derived from them may be
/// torn down and recreated any number of times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceHandle(u64);

impl SurfaceHandle {
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SurfaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Layout of the bytes handed to [`Backend::upload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLayout {
    pub width: u32,
    pub height: u32,
    /// Distance between row starts in the source slice.
    pub bytes_per_row: u32,
}

pub trait Backend: Send {
    /// Live binding between a surface handle and this backend's context.
    type Binding: Send;
    /// GPU-resident frame image.
    type Texture: Send;

    /// Derives a binding for `surface`. Fails with [`BackendError::SurfaceBind`]
    /// when the host no longer presents it.
    fn bind_surface(&mut self, surface: SurfaceHandle) -> Result<Self::Binding, BackendError>;

    /// Cheap validity check run before drawing.
    fn binding_valid(&self, binding: &Self::Binding) -> bool;

    /// Sizes the presentation buffer behind `binding`.
    fn resize_surface(
        &mut self,
        binding: &mut Self::Binding,
        width: u32,
        height: u32,
    ) -> Result<(), BackendError>;

    fn release_surface(&mut self, binding: Self::Binding);

    fn create_texture(&mut self, width: u32, height: u32) -> Result<Self::Texture, BackendError>;

    fn release_texture(&mut self, texture: Self::Texture);

    /// Copies `data` into `texture`; `layout.bytes_per_row` may exceed the
    /// packed row size.
    fn upload(
        &mut self,
        texture: &Self::Texture,
        data: &[u8],
        layout: UploadLayout,
    ) -> Result<(), BackendError>;

    /// Draws `texture` over the whole drawable and hands it to the compositor.
    ///
    /// Returns [`BackendError::SurfaceLost`] when the binding went stale.
    fn present(
        &mut self,
        binding: &mut Self::Binding,
        texture: &Self::Texture,
    ) -> Result<(), BackendError>;

    /// Releases vertex geometry and the shader program.
    fn release_program(&mut self);

    /// Releases the context and device. Nothing may be called afterwards.
    fn shutdown(&mut self);
}

/// Compositor-side owner of presentable surfaces.
pub trait SurfaceHost: Send + Sync {
    /// Allocates a new surface and returns its stable handle.
    fn register(&self) -> Result<SurfaceHandle, BackendError>;

    /// Returns the surface to the host. Called after the owning pipeline
    /// released every binding derived from it.
    fn unregister(&self, handle: SurfaceHandle);

    /// Whether the host still presents `handle`.
    fn contains(&self, handle: SurfaceHandle) -> bool;
}

pub trait BackendFactory: Send + Sync {
    type Backend: Backend + 'static;

    fn surfaces(&self) -> &dyn SurfaceHost;

    /// Creates a device and context, compiles shaders and uploads static
    /// geometry. Each call yields an independent backend.
    fn initialize(&self) -> Result<Self::Backend, BackendError>;
}

/// Slab-backed handle allocator for [`SurfaceHost`] implementations.
///
/// Handle ids start at 1 so that 0 can never name a live surface.
pub struct SurfaceArena<T> {
    slots: Mutex<Slab<T>>,
}

impl<T> SurfaceArena<T> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Slab::new()),
        }
    }

    fn slots(&self) -> MutexGuard<'_, Slab<T>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn index(handle: SurfaceHandle) -> Option<usize> {
        handle.id().checked_sub(1).map(|index| index as usize)
    }

    pub fn insert(&self, value: T) -> SurfaceHandle {
        let index = self.slots().insert(value);
        SurfaceHandle::from_raw(index as u64 + 1)
    }

    pub fn remove(&self, handle: SurfaceHandle) -> Option<T> {
        let index = Self::index(handle)?;
        self.slots().try_remove(index)
    }

    pub fn contains(&self, handle: SurfaceHandle) -> bool {
        Self::index(handle).is_some_and(|index| self.slots().contains(index))
    }

    pub fn with<R>(&self, handle: SurfaceHandle, f: impl FnOnce(&T) -> R) -> Option<R> {
        let index = Self::index(handle)?;
        self.slots().get(index).map(f)
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for SurfaceArena<T> {
    fn default() -> Self {
        Self::new()
    }
}
