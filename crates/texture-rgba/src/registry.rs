//! Keyed pipeline registry: the operations a dispatch layer calls.
//!
//! The map sits behind an `RwLock` and each pipeline behind its own `Mutex`.
//! Lookups hold the read lock only long enough to clone the pipeline's
//! `Arc`, so submits for distinct keys never contend past the lookup.
//! Creation claims its key in a separate in-flight set and initializes the
//! backend without holding the map lock; a racing create of the same key
//! waits for the claim to resolve instead of building a second context.

use std::collections::{HashMap, HashSet};
use std::sync::{
    Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use crate::backend::{BackendFactory, SurfaceHandle};
use crate::error::RendererError;
use crate::frame::FrameDescriptor;
use crate::pipeline::{FrameStatus, Pipeline, PipelineOptions, PipelineState};

type Shared<B> = Arc<Mutex<Pipeline<B>>>;

pub struct Registry<F: BackendFactory> {
    factory: F,
    options: PipelineOptions,
    pipelines: RwLock<HashMap<i64, Shared<F::Backend>>>,
    creating: Mutex<HashSet<i64>>,
    created: Condvar,
}

/// An in-flight creation. Dropping it releases the key and wakes waiters,
/// whether the creation was published, failed or panicked.
struct CreationClaim<'a> {
    key: i64,
    creating: &'a Mutex<HashSet<i64>>,
    created: &'a Condvar,
}

impl Drop for CreationClaim<'_> {
    fn drop(&mut self) {
        lock(self.creating).remove(&self.key);
        self.created.notify_all();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<F: BackendFactory> Registry<F> {
    pub fn new(factory: F, options: PipelineOptions) -> Self {
        Self {
            factory,
            options,
            pipelines: RwLock::new(HashMap::new()),
            creating: Mutex::new(HashSet::new()),
            created: Condvar::new(),
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<i64, Shared<F::Backend>>> {
        self.pipelines.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<i64, Shared<F::Backend>>> {
        self.pipelines.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, key: i64) -> Option<Shared<F::Backend>> {
        self.read().get(&key).cloned()
    }

    fn with_pipeline<R>(
        &self,
        key: i64,
        f: impl FnOnce(&mut Pipeline<F::Backend>) -> R,
    ) -> Option<R> {
        let pipeline = self.lookup(key)?;
        let mut guard = lock(&pipeline);
        Some(f(&mut guard))
    }

    fn existing_surface(&self, key: i64) -> Option<SurfaceHandle> {
        self.lookup(key).map(|pipeline| lock(&pipeline).surface())
    }

    /// Claims `key` for creation, or returns the handle of a pipeline that
    /// already exists or that a concurrent create just published.
    fn claim(&self, key: i64) -> Result<CreationClaim<'_>, SurfaceHandle> {
        let mut creating = lock(&self.creating);
        loop {
            if let Some(surface) = self.existing_surface(key) {
                return Err(surface);
            }
            if creating.insert(key) {
                return Ok(CreationClaim {
                    key,
                    creating: &self.creating,
                    created: &self.created,
                });
            }
            creating = self
                .created
                .wait(creating)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Creates the renderer for `key`, or returns the existing one's handle.
    ///
    /// Backend initialization runs without the map lock, so other keys keep
    /// submitting while a device is being requested.
    pub fn create_texture(&self, key: i64) -> Result<SurfaceHandle, RendererError> {
        let claim = match self.claim(key) {
            Ok(claim) => claim,
            Err(surface) => {
                tracing::debug!(key, %surface, "renderer already exists");
                return Ok(surface);
            }
        };

        let host = self.factory.surfaces();
        let surface = host
            .register()
            .map_err(|err| RendererError::CreationFailed(err.to_string()))?;

        match Pipeline::create(&self.factory, key, surface, self.options.clone()) {
            Ok(pipeline) => {
                self.write().insert(key, Arc::new(Mutex::new(pipeline)));
                drop(claim);
                tracing::info!(key, %surface, "texture created");
                Ok(surface)
            }
            Err(err) => {
                host.unregister(surface);
                tracing::warn!(key, error = %err, "texture creation failed");
                Err(err)
            }
        }
    }

    /// Disposes the renderer for `key`. Returns `false` for unknown keys.
    pub fn close_texture(&self, key: i64) -> bool {
        let Some(pipeline) = self.write().remove(&key) else {
            return false;
        };
        let surface = {
            let mut pipeline = lock(&pipeline);
            pipeline.dispose();
            pipeline.surface()
        };
        self.factory.surfaces().unregister(surface);
        tracing::info!(key, %surface, "texture closed");
        true
    }

    /// Validates and presents one frame for `key`.
    ///
    /// `row_stride` defaults to `width * 4`.
    pub fn submit_frame(
        &self,
        key: i64,
        data: &[u8],
        width: i64,
        height: i64,
        row_stride: Option<i64>,
    ) -> Result<FrameStatus, RendererError> {
        let frame = FrameDescriptor::new(data, width, height, row_stride);
        self.with_pipeline(key, |pipeline| pipeline.submit_frame(&frame))
            .unwrap_or(Err(RendererError::RendererNotFound(key)))
    }

    pub fn query_handle(&self, key: i64) -> Result<SurfaceHandle, RendererError> {
        self.with_pipeline(key, |pipeline| pipeline.surface())
            .ok_or(RendererError::RendererNotFound(key))
    }

    /// Forwards a platform surface-destroyed notification. Returns `false`
    /// for unknown keys.
    pub fn notify_surface_lost(&self, key: i64) -> bool {
        self.with_pipeline(key, |pipeline| pipeline.invalidate())
            .is_some()
    }

    pub fn state(&self, key: i64) -> Option<PipelineState> {
        self.with_pipeline(key, |pipeline| pipeline.state())
    }

    pub fn dimensions(&self, key: i64) -> Option<(u32, u32)> {
        self.with_pipeline(key, |pipeline| pipeline.dimensions())
    }

    pub fn keys(&self) -> Vec<i64> {
        let mut keys: Vec<i64> = self.read().keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Disposes every live renderer and empties the registry.
    pub fn shutdown(&self) {
        let drained: Vec<(i64, Shared<F::Backend>)> = self.write().drain().collect();
        if drained.is_empty() {
            return;
        }
        let count = drained.len();
        for (key, pipeline) in drained {
            let surface = {
                let mut pipeline = lock(&pipeline);
                pipeline.dispose();
                pipeline.surface()
            };
            self.factory.surfaces().unregister(surface);
            tracing::debug!(key, %surface, "texture closed on shutdown");
        }
        tracing::info!(count, "registry shut down");
    }
}

impl<F: BackendFactory> Drop for Registry<F> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
