//! Frame texture lifecycle: allocation on dimension change, per-frame upload
//! and the host-side transfer buffer used when rows need repacking.

use crate::backend::{Backend, UploadLayout};
use crate::error::{BackendError, RendererError};
use crate::frame::{ValidFrame, BYTES_PER_PIXEL};
use crate::pixels::{pack_rows, reorder_bgra_rows, Normalization, RowLayout, TruncationPolicy};

pub(crate) struct TextureSlot<T> {
    texture: Option<T>,
    dimensions: (u32, u32),
    transfer: Vec<u8>,
    allocations: u64,
    transfer_growths: u64,
}

impl<T> TextureSlot<T> {
    pub(crate) fn new() -> Self {
        Self {
            texture: None,
            dimensions: (0, 0),
            transfer: Vec::new(),
            allocations: 0,
            transfer_growths: 0,
        }
    }

    /// Size of the live texture, `(0, 0)` when none is allocated.
    pub(crate) fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    pub(crate) fn texture(&self) -> Option<&T> {
        self.texture.as_ref()
    }

    pub(crate) fn allocations(&self) -> u64 {
        self.allocations
    }

    pub(crate) fn transfer_capacity(&self) -> usize {
        self.transfer.capacity()
    }

    pub(crate) fn transfer_growths(&self) -> u64 {
        self.transfer_growths
    }

    /// Makes sure a texture of `width`×`height` exists.
    ///
    /// Returns `Ok(true)` when a new texture was allocated. On failure the
    /// slot is left empty with dimensions `(0, 0)`.
    pub(crate) fn ensure<B>(
        &mut self,
        backend: &mut B,
        width: u32,
        height: u32,
        stage_bytes: Option<usize>,
    ) -> Result<bool, BackendError>
    where
        B: Backend<Texture = T>,
    {
        if self.texture.is_some() && self.dimensions == (width, height) {
            return Ok(false);
        }

        self.release(backend);
        let texture = backend.create_texture(width, height)?;
        self.texture = Some(texture);
        self.dimensions = (width, height);
        self.allocations += 1;
        if let Some(bytes) = stage_bytes {
            self.grow_transfer(bytes);
        }
        Ok(true)
    }

    /// Capacity only ever grows; shrinking frames reuse the larger buffer.
    fn grow_transfer(&mut self, bytes: usize) {
        if self.transfer.capacity() < bytes {
            self.transfer
                .reserve_exact(bytes.saturating_sub(self.transfer.len()));
            self.transfer_growths += 1;
        }
    }

    /// Uploads `frame` into the live texture and returns the number of
    /// truncated rows.
    pub(crate) fn upload<B>(
        &mut self,
        backend: &mut B,
        frame: &ValidFrame<'_>,
        normalization: Normalization,
        truncation: TruncationPolicy,
    ) -> Result<u32, RendererError>
    where
        B: Backend<Texture = T>,
    {
        let (width, height) = frame.dimensions();
        let direct = normalization == Normalization::ShaderSwizzle
            && frame.row_stride() % BYTES_PER_PIXEL == 0;
        if !direct {
            self.grow_transfer(frame.packed_len());
        }

        let Some(texture) = self.texture.as_ref() else {
            return Err(RendererError::RenderFailure(
                "no frame texture allocated".into(),
            ));
        };
        if direct {
            let layout = UploadLayout {
                width,
                height,
                bytes_per_row: frame.row_stride(),
            };
            backend
                .upload(texture, frame.pixels(), layout)
                .map_err(|err| RendererError::RenderFailure(err.to_string()))?;
            return Ok(0);
        }

        let rows = RowLayout {
            width,
            height,
            row_stride: frame.row_stride(),
        };
        let truncated = match normalization {
            Normalization::HostReorder => {
                reorder_bgra_rows(frame.pixels(), rows, truncation, &mut self.transfer)?
            }
            Normalization::ShaderSwizzle => {
                pack_rows(frame.pixels(), rows, truncation, &mut self.transfer)?
            }
        };

        let layout = UploadLayout {
            width,
            height,
            bytes_per_row: frame.row_bytes() as u32,
        };
        backend
            .upload(texture, &self.transfer, layout)
            .map_err(|err| RendererError::RenderFailure(err.to_string()))?;
        Ok(truncated)
    }

    pub(crate) fn release<B>(&mut self, backend: &mut B)
    where
        B: Backend<Texture = T>,
    {
        if let Some(texture) = self.texture.take() {
            backend.release_texture(texture);
        }
        self.dimensions = (0, 0);
    }
}
