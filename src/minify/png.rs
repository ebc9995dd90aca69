use std::io::Cursor;

use anyhow::{Context, Result};
use ::png::{AdaptiveFilterType, Compression, Decoder, Encoder, Transformations};

/// Lossless re-encode with the strongest deflate setting and adaptive row
/// filters. Color type, bit depth, palette and transparency are preserved.
pub fn recompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = Decoder::new(Cursor::new(data));
    decoder.set_transformations(Transformations::IDENTITY);
    let mut reader = decoder.read_info().context("could not read PNG header")?;

    let mut pixels = vec![0; reader.output_buffer_size()];
    let frame = reader
        .next_frame(&mut pixels)
        .context("could not decode PNG image data")?;
    pixels.truncate(frame.buffer_size());

    let info = reader.info();
    let mut output = Vec::new();

    {
        let mut encoder = Encoder::new(&mut output, frame.width, frame.height);
        encoder.set_color(frame.color_type);
        encoder.set_depth(frame.bit_depth);
        encoder.set_compression(Compression::Best);
        encoder.set_adaptive_filter(AdaptiveFilterType::Adaptive);

        if let Some(palette) = &info.palette {
            encoder.set_palette(palette.to_vec());
        }
        if let Some(trns) = &info.trns {
            encoder.set_trns(trns.to_vec());
        }

        let mut writer = encoder.write_header()?;
        writer.write_image_data(&pixels)?;
        writer.finish()?;
    }

    Ok(output)
}
