//! Desktop windows acting as the surface host.
//!
//! Windows are created up front on the event-loop thread and handed out one
//! per `register` call. Unregistering releases the host's reference, so the
//! window closes once no surface binding holds it either.

use std::sync::{Arc, Mutex, PoisonError};

use texture_rgba::gpu::{HostedWindow, PresentableWindow, WindowHost};
use texture_rgba::{BackendError, SurfaceArena, SurfaceHandle, SurfaceHost};
use winit::window::{Window, WindowId};

pub struct WindowSurfaces {
    idle: Mutex<Vec<Arc<Window>>>,
    surfaces: SurfaceArena<Arc<Window>>,
}

impl WindowSurfaces {
    pub fn new(windows: Vec<Window>) -> Self {
        // Handed out in creation order.
        let idle = windows.into_iter().rev().map(Arc::new).collect();
        Self {
            idle: Mutex::new(idle),
            surfaces: SurfaceArena::new(),
        }
    }

    pub fn window_id(&self, handle: SurfaceHandle) -> Option<WindowId> {
        self.surfaces.with(handle, |window| window.id())
    }

    pub fn request_redraw(&self, handle: SurfaceHandle) {
        self.surfaces.with(handle, |window| window.request_redraw());
    }
}

impl SurfaceHost for WindowSurfaces {
    fn register(&self) -> Result<SurfaceHandle, BackendError> {
        let window = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .ok_or_else(|| BackendError::SurfaceBind("no window left to host a surface".into()))?;
        window.set_visible(true);
        let handle = self.surfaces.insert(window);
        tracing::debug!(surface = %handle, "window registered");
        Ok(handle)
    }

    fn unregister(&self, handle: SurfaceHandle) {
        if let Some(window) = self.surfaces.remove(handle) {
            window.set_visible(false);
            tracing::debug!(surface = %handle, "window unregistered");
        }
    }

    fn contains(&self, handle: SurfaceHandle) -> bool {
        self.surfaces.contains(handle)
    }
}

impl WindowHost for WindowSurfaces {
    fn window(&self, handle: SurfaceHandle) -> Option<HostedWindow> {
        self.surfaces.with(handle, |window| {
            let size = window.inner_size();
            HostedWindow {
                window: Arc::clone(window) as Arc<dyn PresentableWindow>,
                size: (size.width, size.height),
            }
        })
    }
}
