use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{DynamicImage, imageops::FilterType};
use tch::Tensor;

use crate::config::NormalizationScheme;
use crate::error::ApiError;

/// Per-channel ImageNet statistics, applied after scaling to [0, 1].
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Decodes an uploaded image payload.
///
/// Rejects empty payloads explicitly so a zero-byte upload produces a
/// clear 400 instead of a format-guessing error.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, ApiError> {
    if bytes.is_empty() {
        return Err(ApiError::Decode("empty image payload".to_string()));
    }
    image::load_from_memory(bytes)
        .map_err(|e| ApiError::Decode(format!("unsupported or corrupt image: {e}")))
}

pub fn decode_base64_image(encoded: &str) -> Result<DynamicImage, ApiError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| ApiError::Decode(format!("invalid base64 image: {e}")))?;
    decode_image(&bytes)
}

/// Converts a decoded image into the `[1, 3, H, W]` float tensor the model
/// expects.
///
/// Any color mode (grayscale, palette, alpha) is forced to RGB, then the
/// image is resized with bilinear filtering. The same filter must have
/// been used when the training data was prepared; that is an external
/// invariant this function cannot check.
pub fn normalize(
    image: &DynamicImage,
    target_size: (u32, u32),
    scheme: NormalizationScheme,
) -> Tensor {
    let (height, width) = target_size;
    let rgb = image
        .resize_exact(width, height, FilterType::Triangle)
        .to_rgb8();

    // CHW packing, one channel plane at a time.
    let plane = (height * width) as usize;
    let mut data = vec![0f32; plane * 3];
    for (i, pixel) in rgb.pixels().enumerate() {
        for c in 0..3 {
            data[c * plane + i] = apply_scheme(pixel.0[c], c, scheme);
        }
    }

    Tensor::from_slice(&data).view([1, 3, height as i64, width as i64])
}

fn apply_scheme(value: u8, channel: usize, scheme: NormalizationScheme) -> f32 {
    let x = value as f32;
    match scheme {
        NormalizationScheme::UnitScale => x / 255.0,
        NormalizationScheme::SignedUnitScale => x / 127.5 - 1.0,
        NormalizationScheme::ImageNetMeanStd => {
            (x / 255.0 - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel]
        }
        NormalizationScheme::RawBytes => x,
    }
}
