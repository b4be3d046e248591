use crate::{core, marker};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors produced by the high-level facade helpers.
#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    #[error("invalid grayscale image buffer length (expected {expected} bytes, got {got})")]
    InvalidGrayBuffer { expected: usize, got: usize },

    #[error("invalid grayscale image dimensions (width={width}, height={height})")]
    InvalidGrayDimensions { width: u32, height: u32 },

    #[error(transparent)]
    Image(#[from] ::image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convert an `image::GrayImage` into the lightweight `gazecal-core` view type.
pub fn gray_view(img: &::image::GrayImage) -> core::GrayImageView<'_> {
    core::GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Copy an `image::GrayImage` into an owned `gazecal-core` image.
pub fn to_core_image(img: &::image::GrayImage) -> core::GrayImage {
    core::GrayImage {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw().clone(),
    }
}

/// Run whichever strategy `config` selects, reporting through `sink`.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "info",
        skip(img, config, sink),
        fields(width = img.width(), height = img.height(), kind = ?config.kind())
    )
)]
pub fn detect_markers(
    img: &::image::GrayImage,
    config: &marker::DetectorConfig,
    sink: core::SharedSink,
) -> Vec<core::Marker> {
    config.build(sink).detect(&gray_view(img))
}

/// Concentric ring markers, best first. Diagnostics go to the `log` facade.
pub fn detect_rings(
    img: &::image::GrayImage,
    params: marker::RingDetectorParams,
) -> Vec<core::Marker> {
    detect_markers(
        img,
        &marker::DetectorConfig::Rings(params),
        core::default_sink(),
    )
}

/// The screen-corner marker, if the display outline was found.
pub fn detect_screen_corners(
    img: &::image::GrayImage,
    params: marker::ScreenCornerParams,
) -> Option<core::Marker> {
    detect_markers(
        img,
        &marker::DetectorConfig::ScreenCorners(params),
        core::default_sink(),
    )
    .into_iter()
    .next()
}

/// Build an `image::GrayImage` from a raw grayscale buffer.
pub fn gray_image_from_slice(
    width: u32,
    height: u32,
    pixels: &[u8],
) -> Result<::image::GrayImage, DetectError> {
    let w = usize::try_from(width).ok();
    let h = usize::try_from(height).ok();
    let Some((w, h)) = w.zip(h) else {
        return Err(DetectError::InvalidGrayDimensions { width, height });
    };
    let Some(expected) = w.checked_mul(h) else {
        return Err(DetectError::InvalidGrayDimensions { width, height });
    };
    if pixels.len() != expected {
        return Err(DetectError::InvalidGrayBuffer {
            expected,
            got: pixels.len(),
        });
    }
    ::image::GrayImage::from_raw(width, height, pixels.to_vec())
        .ok_or(DetectError::InvalidGrayDimensions { width, height })
}

pub fn detect_markers_from_gray_u8(
    width: u32,
    height: u32,
    pixels: &[u8],
    config: &marker::DetectorConfig,
) -> Result<Vec<core::Marker>, DetectError> {
    let img = gray_image_from_slice(width, height, pixels)?;
    Ok(detect_markers(&img, config, core::default_sink()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_buffer_length_is_checked() {
        let err = gray_image_from_slice(4, 4, &[0u8; 15]).unwrap_err();
        assert!(matches!(
            err,
            DetectError::InvalidGrayBuffer {
                expected: 16,
                got: 15
            }
        ));
        let img = gray_image_from_slice(4, 4, &[7u8; 16]).expect("valid");
        assert_eq!(gray_view(&img).get(3, 3), 7);
    }

    #[test]
    fn flat_buffer_has_no_markers() {
        let pixels = vec![200u8; 64 * 48];
        let markers =
            detect_markers_from_gray_u8(64, 48, &pixels, &marker::DetectorConfig::default())
                .expect("valid buffer");
        assert!(markers.is_empty());
    }

    #[test]
    fn core_copy_matches_source() {
        let img = ::image::GrayImage::from_fn(5, 3, |x, y| ::image::Luma([(x + 10 * y) as u8]));
        let owned = to_core_image(&img);
        assert_eq!((owned.width, owned.height), (5, 3));
        assert_eq!(owned.view().get(4, 2), 24);
    }
}
