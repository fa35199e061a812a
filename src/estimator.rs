use crate::frame::FrameData;
use thiserror::Error;

/// Errors produced by the luminance estimator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EstimatorError {
    #[error("Invalid estimator input: {details}")]
    InvalidInput { details: String },
}

/// Compute the average luminance of a luma plane.
///
/// Each byte is an unsigned sample in [0, 255]; the sum accumulates in a
/// `u64`, which cannot overflow for any frame this crate models. The result
/// lies in the closed interval [0.0, 255.0].
pub fn average(luma: &[u8]) -> Result<f64, EstimatorError> {
    if luma.is_empty() {
        return Err(EstimatorError::InvalidInput {
            details: "luma plane is empty".to_string(),
        });
    }

    let sum: u64 = luma.iter().map(|&b| b as u64).sum();
    Ok(sum as f64 / luma.len() as f64)
}

/// Compute the average luminance of a frame's luma plane, stride-aware.
///
/// Averages exactly `width * height` samples; row padding bytes do not
/// contribute. Fails with `InvalidInput` on a zero-area frame or a buffer
/// too small to hold its luma plane.
pub fn average_of_frame(frame: &FrameData) -> Result<f64, EstimatorError> {
    let pixel_count = frame.width as u64 * frame.height as u64;
    if pixel_count == 0 {
        return Err(EstimatorError::InvalidInput {
            details: format!("frame {} has zero-area luma plane", frame.id),
        });
    }

    if !frame.validate_size() {
        return Err(EstimatorError::InvalidInput {
            details: format!(
                "frame {} buffer too small: {} bytes for {}x{} stride {}",
                frame.id,
                frame.data.len(),
                frame.width,
                frame.height,
                frame.stride
            ),
        });
    }

    if !frame.is_padded() {
        return average(frame.luma_plane());
    }

    let sum: u64 = frame
        .luma_rows()
        .flat_map(|row| row.iter())
        .map(|&b| b as u64)
        .sum();
    Ok(sum as f64 / pixel_count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelFormat;

    #[test]
    fn test_average_all_black() {
        assert_eq!(average(&[0, 0, 0, 0]).unwrap(), 0.0);
    }

    #[test]
    fn test_average_all_white() {
        assert_eq!(average(&[255, 255, 255, 255]).unwrap(), 255.0);
    }

    #[test]
    fn test_average_midpoint() {
        assert_eq!(average(&[0, 255]).unwrap(), 127.5);
    }

    #[test]
    fn test_average_treats_bytes_as_unsigned() {
        // 0x80 is 128, not -128
        assert_eq!(average(&[0x80]).unwrap(), 128.0);
        assert_eq!(average(&[0xFF, 0x01]).unwrap(), 128.0);
    }

    #[test]
    fn test_average_empty_input_is_invalid() {
        let err = average(&[]).unwrap_err();
        assert!(matches!(err, EstimatorError::InvalidInput { .. }));
    }

    #[test]
    fn test_average_of_frame_tight() {
        let frame = FrameData::tight(1, 0, vec![10, 20, 30, 40], 2, 2, PixelFormat::Yuv420);
        assert_eq!(average_of_frame(&frame).unwrap(), 25.0);
    }

    #[test]
    fn test_average_of_frame_skips_row_padding() {
        // 2x2 frame, stride 4: padding bytes set to 255 must not count
        let data = vec![
            0, 0, 255, 255, //
            0, 0, 255, 255,
        ];
        let frame = FrameData::new(1, 0, data, 2, 2, 4, PixelFormat::Yuv420);
        assert_eq!(average_of_frame(&frame).unwrap(), 0.0);
    }

    #[test]
    fn test_average_of_frame_zero_area() {
        let frame = FrameData::tight(1, 0, Vec::new(), 0, 0, PixelFormat::Yuv420);
        let err = average_of_frame(&frame).unwrap_err();
        assert!(matches!(err, EstimatorError::InvalidInput { .. }));
    }

    #[test]
    fn test_average_of_frame_truncated_buffer() {
        let frame = FrameData::tight(7, 0, vec![0u8; 3], 2, 2, PixelFormat::Yuv420);
        let err = average_of_frame(&frame).unwrap_err();
        assert!(matches!(err, EstimatorError::InvalidInput { .. }));
    }
}
