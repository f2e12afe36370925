//! Image preprocessing: uploaded bytes → downscaled base64 JPEG `ImageData`.
//!
//! Phone photos of invoices arrive at 3–12 MP. The model reads printed
//! invoice text reliably at a few hundred pixels per edge, and a smaller
//! payload shortens both upload and model latency, so every image is
//! shrunk into a bounding box and re-encoded as JPEG before submission.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tracing::debug;

/// Decode, downscale and JPEG-encode an uploaded invoice image.
///
/// The aspect ratio is preserved and images already inside the
/// `max_dimension` box are not upscaled.
pub fn prepare_image(
    bytes: &[u8],
    max_dimension: u32,
    jpeg_quality: u8,
) -> Result<ImageData, image::ImageError> {
    let img = image::load_from_memory(bytes)?;
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

    let resized = if rgb.width() > max_dimension || rgb.height() > max_dimension {
        rgb.thumbnail(max_dimension, max_dimension)
    } else {
        rgb
    };

    let mut buf = Vec::new();
    resized.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, jpeg_quality))?;
    debug!(
        "Prepared image {}x{} → {:.2}KB JPEG",
        resized.width(),
        resized.height(),
        buf.len() as f64 / 1024.0
    );

    Ok(ImageData::new(STANDARD.encode(&buf), "image/jpeg"))
}
