//! Frame descriptors and the validation gate that runs before any GPU call.

/// Bytes per packed pixel (BGRA8).
pub const BYTES_PER_PIXEL: u32 = 4;

/// Why a frame was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameRejection {
    #[error("frame dimensions must be positive")]
    InvalidDimensions,
    #[error("row stride is smaller than width * 4")]
    InvalidStride,
    #[error("pixel buffer is smaller than row stride * height")]
    BufferTooSmall,
}

/// Checks a frame's geometry against the length of its pixel buffer.
///
/// Rules are applied in order: positive dimensions, a stride that covers a
/// full row of pixels, and a buffer that covers `stride * height` bytes.
/// Values are taken as received from dispatch, so negative numbers and
/// values that overflow `u32` are rejected rather than wrapped.
pub fn validate(
    buffer_len: usize,
    width: i64,
    height: i64,
    row_stride: i64,
) -> Result<(), FrameRejection> {
    if width <= 0 || height <= 0 || width > u32::MAX as i64 || height > u32::MAX as i64 {
        return Err(FrameRejection::InvalidDimensions);
    }
    let min_stride = width as i128 * BYTES_PER_PIXEL as i128;
    if (row_stride as i128) < min_stride || row_stride > u32::MAX as i64 {
        return Err(FrameRejection::InvalidStride);
    }
    let required = row_stride as i128 * height as i128;
    if (buffer_len as i128) < required {
        return Err(FrameRejection::BufferTooSmall);
    }
    Ok(())
}

/// Default stride for tightly packed rows, saturating instead of wrapping.
pub fn packed_stride(width: i64) -> i64 {
    width.saturating_mul(BYTES_PER_PIXEL as i64)
}

/// A frame as submitted by a caller, before validation.
///
/// The pixel bytes are borrowed for the duration of the submit call only.
#[derive(Debug, Clone, Copy)]
pub struct FrameDescriptor<'a> {
    pub pixels: &'a [u8],
    pub width: i64,
    pub height: i64,
    pub row_stride: i64,
}

impl<'a> FrameDescriptor<'a> {
    pub fn new(pixels: &'a [u8], width: i64, height: i64, row_stride: Option<i64>) -> Self {
        Self {
            pixels,
            width,
            height,
            row_stride: row_stride.unwrap_or_else(|| packed_stride(width)),
        }
    }

    /// Frame with tightly packed rows (`stride = width * 4`).
    pub fn packed(pixels: &'a [u8], width: i64, height: i64) -> Self {
        Self::new(pixels, width, height, None)
    }

    pub fn validate(&self) -> Result<ValidFrame<'a>, FrameRejection> {
        validate(self.pixels.len(), self.width, self.height, self.row_stride)?;
        Ok(ValidFrame {
            pixels: self.pixels,
            width: self.width as u32,
            height: self.height as u32,
            row_stride: self.row_stride as u32,
        })
    }
}

/// A frame that passed [`validate`]; its buffer covers every row.
#[derive(Debug, Clone, Copy)]
pub struct ValidFrame<'a> {
    pixels: &'a [u8],
    width: u32,
    height: u32,
    row_stride: u32,
}

impl<'a> ValidFrame<'a> {
    pub fn pixels(&self) -> &'a [u8] {
        self.pixels
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn row_stride(&self) -> u32 {
        self.row_stride
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Bytes of pixel data in one row, excluding stride padding.
    pub fn row_bytes(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL as usize
    }

    /// Size of the frame once rows are tightly packed.
    pub fn packed_len(&self) -> usize {
        self.row_bytes() * self.height as usize
    }

    pub fn is_packed(&self) -> bool {
        self.row_stride as usize == self.row_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_tightly_packed_frame() {
        assert_eq!(validate(64 * 64 * 4, 64, 64, 256), Ok(()));
    }

    #[test]
    fn accepts_padded_stride() {
        assert_eq!(validate(300 * 2, 64, 2, 300), Ok(()));
    }

    #[test]
    fn rejects_non_positive_dimensions() {
        assert_eq!(
            validate(1024, 0, 4, 0),
            Err(FrameRejection::InvalidDimensions)
        );
        assert_eq!(
            validate(1024, 4, -1, 16),
            Err(FrameRejection::InvalidDimensions)
        );
    }

    #[test]
    fn dimension_check_runs_before_stride_check() {
        assert_eq!(validate(0, -3, 4, 1), Err(FrameRejection::InvalidDimensions));
    }

    #[test]
    fn rejects_short_stride() {
        assert_eq!(validate(4096, 16, 16, 63), Err(FrameRejection::InvalidStride));
    }

    #[test]
    fn rejects_short_buffer() {
        assert_eq!(
            validate(256 * 63, 64, 64, 256),
            Err(FrameRejection::BufferTooSmall)
        );
    }

    #[test]
    fn huge_values_do_not_wrap() {
        assert_eq!(
            validate(16, i64::from(u32::MAX) + 1, 1, i64::MAX),
            Err(FrameRejection::InvalidDimensions)
        );
        assert_eq!(
            validate(16, i64::from(u32::MAX), 1, i64::from(u32::MAX)),
            Err(FrameRejection::InvalidStride)
        );
        assert_eq!(
            validate(16, 1, i64::from(u32::MAX), 4),
            Err(FrameRejection::BufferTooSmall)
        );
    }

    #[test]
    fn descriptor_defaults_stride_to_packed_rows() {
        let pixels = [0u8; 32];
        let frame = FrameDescriptor::new(&pixels, 4, 2, None);
        assert_eq!(frame.row_stride, 16);
        let valid = frame.validate().expect("packed frame is valid");
        assert!(valid.is_packed());
        assert_eq!(valid.packed_len(), 32);
    }

    #[test]
    fn descriptor_validation_reports_reason() {
        let pixels = [0u8; 8];
        let frame = FrameDescriptor::new(&pixels, 2, 2, Some(8));
        assert_eq!(frame.validate().unwrap_err(), FrameRejection::BufferTooSmall);
    }
}
