//! Presentation binding state and its recovery after surface loss.
//!
//! The stable [`SurfaceHandle`] is kept for the life of the pipeline; only
//! the binding derived from it is discarded and recreated.

use crate::backend::{Backend, SurfaceHandle};
use crate::error::BackendError;

pub(crate) struct Presentation<Bd> {
    handle: SurfaceHandle,
    binding: Option<Bd>,
    recoveries: u64,
}

impl<Bd> Presentation<Bd> {
    pub(crate) fn bind<B>(backend: &mut B, handle: SurfaceHandle) -> Result<Self, BackendError>
    where
        B: Backend<Binding = Bd>,
    {
        let binding = backend.bind_surface(handle)?;
        Ok(Self {
            handle,
            binding: Some(binding),
            recoveries: 0,
        })
    }

    pub(crate) fn handle(&self) -> SurfaceHandle {
        self.handle
    }

    pub(crate) fn recoveries(&self) -> u64 {
        self.recoveries
    }

    #[cfg(test)]
    pub(crate) fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    pub(crate) fn binding_mut(&mut self) -> Option<&mut Bd> {
        self.binding.as_mut()
    }

    pub(crate) fn is_valid<B>(&self, backend: &B) -> bool
    where
        B: Backend<Binding = Bd>,
    {
        self.binding
            .as_ref()
            .is_some_and(|binding| backend.binding_valid(binding))
    }

    pub(crate) fn resize<B>(
        &mut self,
        backend: &mut B,
        width: u32,
        height: u32,
    ) -> Result<(), BackendError>
    where
        B: Backend<Binding = Bd>,
    {
        match self.binding.as_mut() {
            Some(binding) => backend.resize_surface(binding, width, height),
            None => Err(BackendError::SurfaceLost),
        }
    }

    pub(crate) fn release<B>(&mut self, backend: &mut B)
    where
        B: Backend<Binding = Bd>,
    {
        if let Some(binding) = self.binding.take() {
            backend.release_surface(binding);
        }
    }

    /// Drops any stale binding and derives a fresh one from the stable handle.
    ///
    /// A non-zero `dimensions` is reapplied to the new binding. On failure no
    /// binding is held and the caller stays invalid.
    pub(crate) fn recover<B>(
        &mut self,
        backend: &mut B,
        dimensions: (u32, u32),
    ) -> Result<(), BackendError>
    where
        B: Backend<Binding = Bd>,
    {
        self.recoveries += 1;
        self.release(backend);

        let mut binding = backend.bind_surface(self.handle)?;
        let (width, height) = dimensions;
        if width > 0 && height > 0 {
            if let Err(err) = backend.resize_surface(&mut binding, width, height) {
                backend.release_surface(binding);
                return Err(err);
            }
        }
        self.binding = Some(binding);
        Ok(())
    }
}
