//! Byte-order normalization between caller frames (BGRA) and the texture
//! layout the draw samples (RGBA).

use crate::frame::{FrameRejection, BYTES_PER_PIXEL};

/// Where the BGRA → RGBA swap happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Normalization {
    /// Upload caller bytes as-is; the fragment shader reads `.bgra`.
    #[default]
    ShaderSwizzle,
    /// Swap channels on the host while packing into the transfer buffer.
    HostReorder,
}

impl Normalization {
    /// Whether every frame is staged through the transfer buffer.
    pub fn stages_on_host(self) -> bool {
        matches!(self, Normalization::HostReorder)
    }
}

/// Handling of a row whose byte range runs past the end of the buffer.
///
/// Only callers of [`reorder_bgra_rows`] and [`pack_rows`] can hit a short
/// row. `Pipeline::submit_frame` validates the buffer against
/// `stride * height` first, so frames it accepts never truncate and never
/// come back `Degraded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TruncationPolicy {
    /// Refuse the frame with [`FrameRejection::BufferTooSmall`].
    #[default]
    RejectFrame,
    /// Leave the whole row transparent black.
    DropRows,
    /// Copy the whole pixels that are present, pad the rest with zeros.
    ClampRow,
}

/// Source geometry for a repack.
#[derive(Debug, Clone, Copy)]
pub struct RowLayout {
    pub width: u32,
    pub height: u32,
    pub row_stride: u32,
}

impl RowLayout {
    fn row_bytes(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL as usize
    }
}

/// Packs `src` rows into `out` as tightly packed BGRA→RGBA pixels.
///
/// Exactly `width` pixels are read per row at `row_stride` intervals and
/// nothing past `src.len()` is touched. Returns the number of truncated
/// rows, which is only ever non-zero for the drop/clamp policies.
pub fn reorder_bgra_rows(
    src: &[u8],
    layout: RowLayout,
    policy: TruncationPolicy,
    out: &mut Vec<u8>,
) -> Result<u32, FrameRejection> {
    repack_rows(src, layout, true, policy, out)
}

/// Packs `src` rows into `out` without changing byte order.
pub fn pack_rows(
    src: &[u8],
    layout: RowLayout,
    policy: TruncationPolicy,
    out: &mut Vec<u8>,
) -> Result<u32, FrameRejection> {
    repack_rows(src, layout, false, policy, out)
}

fn repack_rows(
    src: &[u8],
    layout: RowLayout,
    swap: bool,
    policy: TruncationPolicy,
    out: &mut Vec<u8>,
) -> Result<u32, FrameRejection> {
    let row_bytes = layout.row_bytes();
    let stride = layout.row_stride as usize;
    out.clear();
    out.resize(row_bytes * layout.height as usize, 0);

    let mut truncated = 0u32;
    for (row, dst_row) in out.chunks_exact_mut(row_bytes.max(1)).enumerate() {
        let start = row.saturating_mul(stride);
        let end = start.saturating_add(row_bytes);
        let available = if end <= src.len() {
            row_bytes
        } else {
            match policy {
                TruncationPolicy::RejectFrame => return Err(FrameRejection::BufferTooSmall),
                TruncationPolicy::DropRows => 0,
                TruncationPolicy::ClampRow => {
                    let remaining = src.len().saturating_sub(start);
                    remaining - remaining % BYTES_PER_PIXEL as usize
                }
            }
        };
        if available < row_bytes {
            truncated += 1;
        }
        if available == 0 {
            continue;
        }

        let src_row = &src[start..start + available];
        if swap {
            for (dst, px) in dst_row.chunks_exact_mut(4).zip(src_row.chunks_exact(4)) {
                dst[0] = px[2];
                dst[1] = px[1];
                dst[2] = px[0];
                dst[3] = px[3];
            }
        } else {
            dst_row[..available].copy_from_slice(src_row);
        }
    }

    Ok(truncated)
}
