use anyhow::{Context, Result};
use image::{codecs::jpeg::JpegEncoder, ImageFormat};

/// Lossy re-encode at the given quality.
pub fn recompress(data: &[u8], quality: u8) -> Result<Vec<u8>> {
    let img = image::load_from_memory_with_format(data, ImageFormat::Jpeg)
        .context("could not decode JPEG")?
        .to_rgb8();

    let mut output = Vec::new();
    JpegEncoder::new_with_quality(&mut output, quality).encode_image(&img)?;

    Ok(output)
}
