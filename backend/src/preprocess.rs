use image::imageops::FilterType;
use image::{ImageFormat, ImageReader, RgbImage};
use ndarray::Array4;
use std::io::Cursor;

/// Spatial size the classifier was trained on.
pub const INPUT_SIZE: u32 = 224;
/// (batch, height, width, channels)
pub const INPUT_SHAPE: [usize; 4] = [1, INPUT_SIZE as usize, INPUT_SIZE as usize, 1];

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unsupported image format, expected JPEG or PNG")]
    UnsupportedFormat,
    #[error("image could not be decoded: {0}")]
    Malformed(#[from] image::ImageError),
    #[error("image has zero area ({width}x{height})")]
    Empty { width: u32, height: u32 },
    #[error("failed to read image bytes: {0}")]
    Io(#[from] std::io::Error),
}

/// Model-ready luminance tensor of shape `INPUT_SHAPE` with values in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor(Array4<f32>);

impl NormalizedTensor {
    /// Wraps an arbitrary array. Shape is not checked here; the classifier
    /// rejects anything that is not `INPUT_SHAPE`.
    pub fn from_array(array: Array4<f32>) -> Self {
        Self(array)
    }

    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    pub fn array(&self) -> &Array4<f32> {
        &self.0
    }

    /// Values in row-major order, copied only if the array is not contiguous.
    pub fn to_contiguous_vec(&self) -> Vec<f32> {
        match self.0.as_slice() {
            Some(slice) => slice.to_vec(),
            None => self.0.iter().copied().collect(),
        }
    }
}

/// Decodes JPEG/PNG bytes and normalizes them for the classifier.
pub fn normalize(bytes: &[u8]) -> Result<NormalizedTensor, DecodeError> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    match reader.format() {
        Some(ImageFormat::Jpeg) | Some(ImageFormat::Png) => {}
        _ => return Err(DecodeError::UnsupportedFormat),
    }
    let image = reader.decode()?;
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(DecodeError::Empty { width, height });
    }
    log::debug!("Decoded {}x{} image ({:?})", width, height, image.color());

    Ok(normalize_rgb(&image.to_rgb8()))
}

/// Resize, then convert to luminance, then scale. Resizing happens in RGB
/// space before the luma conversion.
pub fn normalize_rgb(rgb: &RgbImage) -> NormalizedTensor {
    let resized;
    let source = if rgb.dimensions() == (INPUT_SIZE, INPUT_SIZE) {
        rgb
    } else {
        resized = image::imageops::resize(rgb, INPUT_SIZE, INPUT_SIZE, FilterType::CatmullRom);
        &resized
    };

    let array = Array4::from_shape_fn(INPUT_SHAPE, |(_, y, x, _)| {
        luma_bt601(source.get_pixel(x as u32, y as u32).0) as f32 / 255.0
    });
    NormalizedTensor(array)
}

/// ITU-R 601-2 luma transform in 16-bit fixed point.
fn luma_bt601([r, g, b]: [u8; 3]) -> u8 {
    let l = (19595 * r as u32 + 38470 * g as u32 + 7471 * b as u32 + 0x8000) >> 16;
    l as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma, Rgb, RgbaImage};

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    fn assert_in_range(tensor: &NormalizedTensor) {
        assert_eq!(tensor.shape(), &INPUT_SHAPE);
        assert!(tensor.array().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn shape_is_fixed_for_small_and_large_inputs() {
        for (w, h) in [(50, 50), (1, 7), (224, 224)] {
            let bytes = encode(gradient(w, h), ImageFormat::Png);
            let tensor = normalize(&bytes).unwrap();
            assert_in_range(&tensor);
        }
        let large = gradient(4000, 3000).to_rgb8();
        assert_in_range(&normalize_rgb(&large));
    }

    #[test]
    fn normalize_is_deterministic() {
        let bytes = encode(gradient(317, 141), ImageFormat::Jpeg);
        let a = normalize(&bytes).unwrap();
        let b = normalize(&bytes).unwrap();
        let bits = |t: &NormalizedTensor| t.array().iter().map(|v| v.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&a), bits(&b));
    }

    #[test]
    fn native_size_is_not_resampled() {
        let gray = GrayImage::from_fn(INPUT_SIZE, INPUT_SIZE, |x, y| Luma([((x * 7 + y) % 256) as u8]));
        let bytes = encode(DynamicImage::ImageLuma8(gray.clone()), ImageFormat::Png);
        let tensor = normalize(&bytes).unwrap();
        for (x, y, p) in gray.enumerate_pixels() {
            let v = tensor.array()[[0, y as usize, x as usize, 0]];
            assert_eq!(v, p.0[0] as f32 / 255.0);
        }
    }

    #[test]
    fn extremes_map_to_unit_interval_bounds() {
        let white = RgbImage::from_pixel(INPUT_SIZE, INPUT_SIZE, Rgb([255, 255, 255]));
        let black = RgbImage::from_pixel(INPUT_SIZE, INPUT_SIZE, Rgb([0, 0, 0]));
        assert!(normalize_rgb(&white).array().iter().all(|&v| v == 1.0));
        assert!(normalize_rgb(&black).array().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn luma_uses_bt601_weights() {
        assert_eq!(luma_bt601([255, 0, 0]), 76);
        assert_eq!(luma_bt601([0, 255, 0]), 150);
        assert_eq!(luma_bt601([0, 0, 255]), 29);
        assert_eq!(luma_bt601([255, 255, 255]), 255);
    }

    #[test]
    fn alpha_channel_is_discarded() {
        let rgba = RgbaImage::from_pixel(60, 40, image::Rgba([255, 255, 255, 0]));
        let bytes = encode(DynamicImage::ImageRgba8(rgba), ImageFormat::Png);
        let tensor = normalize(&bytes).unwrap();
        assert!(tensor.array().iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        assert!(matches!(
            normalize(b"definitely not an image"),
            Err(DecodeError::UnsupportedFormat)
        ));
        assert!(normalize(&[]).is_err());
    }

    #[test]
    fn truncated_png_is_malformed() {
        let mut bytes = encode(gradient(64, 64), ImageFormat::Png);
        bytes.truncate(40);
        assert!(matches!(normalize(&bytes), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn other_formats_are_unsupported() {
        let bytes = encode(gradient(16, 16), ImageFormat::Bmp);
        assert!(matches!(normalize(&bytes), Err(DecodeError::UnsupportedFormat)));
    }
}
