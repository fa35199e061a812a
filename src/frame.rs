use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Pixel format enumeration for captured frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// YUV 4:2:0 planar - one full-resolution luma plane followed by two
    /// quarter-resolution chroma planes
    Yuv420,
}

impl PixelFormat {
    /// Get the number of luma bytes per pixel for the format
    pub fn luma_bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Yuv420 => 1,
        }
    }

    /// Check if the format carries a standalone luma plane
    pub fn has_luma_plane(&self) -> bool {
        matches!(self, PixelFormat::Yuv420)
    }
}

/// Frame data structure containing raw frame data and metadata
///
/// Rows of the luma plane may be padded: `stride` is the number of bytes
/// between row starts and may exceed `width`. Frame bytes are shared by
/// `Arc`; consumers borrow the data for the duration of one call and must
/// not hold on to it, since the producer recycles buffers between frames.
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Unique frame identifier
    pub id: u64,
    /// Arrival timestamp in milliseconds since an arbitrary monotonic epoch
    pub timestamp_ms: u64,
    /// Raw frame data, luma plane first (shared ownership for efficiency)
    pub data: Arc<Vec<u8>>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Bytes between successive luma rows (>= width)
    pub stride: u32,
    /// Frame pixel format
    pub format: PixelFormat,
}

impl FrameData {
    /// Create a new frame data instance
    pub fn new(
        id: u64,
        timestamp_ms: u64,
        data: Vec<u8>,
        width: u32,
        height: u32,
        stride: u32,
        format: PixelFormat,
    ) -> Self {
        Self {
            id,
            timestamp_ms,
            data: Arc::new(data),
            width,
            height,
            stride,
            format,
        }
    }

    /// Create a frame with no row padding (stride == width)
    pub fn tight(
        id: u64,
        timestamp_ms: u64,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Self {
        Self::new(id, timestamp_ms, data, width, height, width, format)
    }

    /// Get the expected luma plane size in bytes, padding included
    pub fn expected_luma_size(&self) -> usize {
        self.stride as usize * self.height as usize
    }

    /// Validate frame data size against the expected luma plane size
    ///
    /// The buffer must hold at least the full luma plane; chroma planes may
    /// or may not be present behind it.
    pub fn validate_size(&self) -> bool {
        self.stride >= self.width && self.data.len() >= self.expected_luma_size()
    }

    /// Check whether luma rows carry padding bytes
    pub fn is_padded(&self) -> bool {
        self.stride > self.width
    }

    /// Get the full luma plane, row padding included
    pub fn luma_plane(&self) -> &[u8] {
        &self.data[..self.expected_luma_size().min(self.data.len())]
    }

    /// Iterate over luma rows with padding stripped
    ///
    /// Each item is exactly `width` bytes long.
    pub fn luma_rows(&self) -> impl Iterator<Item = &[u8]> {
        let width = self.width as usize;
        self.luma_plane()
            .chunks_exact(self.stride as usize)
            .map(move |row| &row[..width])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_format_properties() {
        assert_eq!(PixelFormat::Yuv420.luma_bytes_per_pixel(), 1);
        assert!(PixelFormat::Yuv420.has_luma_plane());
    }

    #[test]
    fn test_frame_data_creation() {
        let data = vec![0u8; 640 * 480];
        let frame = FrameData::tight(1, 1_000, data, 640, 480, PixelFormat::Yuv420);

        assert_eq!(frame.id, 1);
        assert_eq!(frame.timestamp_ms, 1_000);
        assert_eq!(frame.width, 640);
        assert_eq!(frame.height, 480);
        assert_eq!(frame.stride, 640);
        assert!(!frame.is_padded());
        assert!(frame.validate_size());
    }

    #[test]
    fn test_frame_size_validation() {
        // Valid tight frame
        let valid = FrameData::tight(1, 0, vec![0u8; 64 * 48], 64, 48, PixelFormat::Yuv420);
        assert!(valid.validate_size());

        // Buffer too small for the luma plane
        let truncated = FrameData::tight(2, 0, vec![0u8; 100], 64, 48, PixelFormat::Yuv420);
        assert!(!truncated.validate_size());

        // Stride below width is never valid
        let bad_stride = FrameData::new(3, 0, vec![0u8; 64 * 48], 64, 48, 32, PixelFormat::Yuv420);
        assert!(!bad_stride.validate_size());
    }

    #[test]
    fn test_luma_rows_strip_padding() {
        // 4x2 frame with stride 6: two padding bytes at the end of each row
        let data = vec![
            1, 2, 3, 4, 99, 99, //
            5, 6, 7, 8, 99, 99,
        ];
        let frame = FrameData::new(1, 0, data, 4, 2, 6, PixelFormat::Yuv420);

        assert!(frame.is_padded());
        assert!(frame.validate_size());

        let rows: Vec<&[u8]> = frame.luma_rows().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], &[1, 2, 3, 4]);
        assert_eq!(rows[1], &[5, 6, 7, 8]);
    }

    #[test]
    fn test_luma_plane_ignores_trailing_chroma() {
        // Luma plane of 8 bytes followed by 4 chroma bytes
        let mut data = vec![10u8; 8];
        data.extend_from_slice(&[200, 200, 200, 200]);
        let frame = FrameData::tight(1, 0, data, 4, 2, PixelFormat::Yuv420);

        assert_eq!(frame.luma_plane().len(), 8);
        assert!(frame.luma_plane().iter().all(|&b| b == 10));
    }
}
