use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};
use ndarray::Array4;
use tracing::{debug, instrument};

use crate::error::{PredictionError, Result};

/// Side length the image network expects.
pub const IMAGE_SIZE: u32 = 150;
pub const CHANNELS: usize = 3;

/// Decode an image file into a `1 x 150 x 150 x 3` batch of RGB values in `[0, 1]`.
#[instrument]
pub fn load_image_batch(path: &Path) -> Result<Array4<f32>> {
    let image = image::open(path).map_err(|e| {
        PredictionError::MalformedInput(format!("Cannot read image {}: {}", path.display(), e))
    })?;
    Ok(to_batch(image))
}

/// Same as [`load_image_batch`] for an in-memory encoded image.
#[cfg(test)]
pub(crate) fn image_batch_from_bytes(bytes: &[u8]) -> Result<Array4<f32>> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| PredictionError::MalformedInput(format!("Cannot decode image: {}", e)))?;
    Ok(to_batch(image))
}

fn to_batch(image: DynamicImage) -> Array4<f32> {
    debug!(
        "Preprocessing {}x{} image ({:?})",
        image.width(),
        image.height(),
        image.color()
    );
    let rgb: RgbImage = image.to_rgb8();
    let resized = imageops::resize(&rgb, IMAGE_SIZE, IMAGE_SIZE, FilterType::CatmullRom);

    let side = IMAGE_SIZE as usize;
    Array4::from_shape_fn((1, side, side, CHANNELS), |(_, y, x, c)| {
        f32::from(resized.get_pixel(x as u32, y as u32).0[c]) / 255.0
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    /// A PNG where the left half is `left` and the right half is `right`.
    pub fn two_tone_png(width: u32, height: u32, left: [u8; 3], right: [u8; 3]) -> Vec<u8> {
        let image = RgbImage::from_fn(width, height, |x, _| {
            if x < width / 2 { Rgb(left) } else { Rgb(right) }
        });
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    pub fn rgba_png(width: u32, height: u32, pixel: [u8; 4]) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba(pixel));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{rgba_png, two_tone_png};
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_batch_shape_and_range() {
        let png = two_tone_png(300, 200, [255, 0, 0], [0, 0, 255]);
        let batch = image_batch_from_bytes(&png).unwrap();

        assert_eq!(batch.shape(), &[1, 150, 150, 3]);
        assert!(batch.iter().all(|v| (0.0..=1.0).contains(v)));

        // Far left is red, far right is blue
        assert!((batch[[0, 75, 0, 0]] - 1.0).abs() < 1e-6);
        assert!(batch[[0, 75, 0, 2]].abs() < 1e-6);
        assert!((batch[[0, 75, 149, 2]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_alpha_channel_is_dropped() {
        let png = rgba_png(10, 10, [0, 255, 0, 128]);
        let batch = image_batch_from_bytes(&png).unwrap();
        assert_eq!(batch.shape(), &[1, 150, 150, 3]);
        assert!((batch[[0, 5, 5, 1]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flower.png");
        std::fs::write(&path, two_tone_png(20, 20, [10, 20, 30], [10, 20, 30])).unwrap();

        let batch = load_image_batch(&path).unwrap();
        assert!((batch[[0, 0, 0, 0]] - 10.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_garbage_is_malformed_input() {
        let err = image_batch_from_bytes(b"definitely not an image").unwrap_err();
        assert!(matches!(err, PredictionError::MalformedInput(_)));

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fake.png");
        std::fs::write(&path, b"nope").unwrap();
        assert!(matches!(
            load_image_batch(&path).unwrap_err(),
            PredictionError::MalformedInput(_)
        ));
    }
}
