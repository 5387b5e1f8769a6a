use std::io::Cursor;

use apng::{create_config, image_png, Encoder, Frame, PNGImage};
use rayon::prelude::*;

use crate::error::RasterError;
use crate::pipeline::{rasterize, render};
use crate::playback::traversal_duration_ms;
use crate::types::route::Route;
use crate::types::viz::{MapOptions, OutputConfig};

pub const MIN_FRAMES: u32 = 8;
pub const MAX_FRAMES: u32 = 180;

/// Renders one full traversal of the route marker as an APNG.
pub fn render_apng(
    route: &Route,
    options: &MapOptions,
    frame_count: u32,
    speed: f64,
) -> Result<Vec<u8>, RasterError> {
    let frame_count = frame_count.clamp(MIN_FRAMES, MAX_FRAMES);
    let output = OutputConfig::for_map(options);
    let frames: Vec<PNGImage> = (0..frame_count)
        .into_par_iter()
        .map(|idx| {
            let progress = frame_progress(idx, frame_count);
            let svg = render::render_map_svg(route, options, Some(progress)).map_err(|err| {
                RasterError::AnimationFailed(format!(
                    "Failed to render animation frame {}: {}",
                    idx, err
                ))
            })?;

            let png_bytes = rasterize::rasterize(&svg, &output)?;
            png_image_from_bytes(&png_bytes, idx)
        })
        .collect::<Result<Vec<_>, RasterError>>()?;

    let config = create_config(&frames, None)
        .map_err(|err| RasterError::AnimationFailed(format!("Failed to build APNG config: {}", err)))?;

    let mut output_bytes = Vec::new();
    {
        let mut cursor = Cursor::new(&mut output_bytes);
        let mut encoder = Encoder::new(&mut cursor, config)
            .map_err(|err| RasterError::AnimationFailed(format!("Failed to create APNG encoder: {}", err)))?;
        let delay_ms = frame_delay_ms(speed, frame_count);
        let frame = Frame {
            delay_num: Some(delay_ms),
            delay_den: Some(1000),
            ..Default::default()
        };
        encoder.encode_all(frames, Some(&frame)).map_err(|err| {
            RasterError::AnimationFailed(format!("Failed to encode APNG frames: {}", err))
        })?;
    }

    Ok(output_bytes)
}

/// Playback stops as soon as it reaches the end, so the last frame sits just
/// short of it.
fn frame_progress(idx: u32, frame_count: u32) -> f64 {
    idx as f64 / frame_count.max(1) as f64
}

fn frame_delay_ms(speed: f64, frame_count: u32) -> u16 {
    let total = traversal_duration_ms(speed);
    let per_frame = (total / frame_count.max(1) as f64).round();
    if per_frame.is_finite() {
        per_frame.clamp(16.0, u16::MAX as f64) as u16
    } else {
        16
    }
}

fn png_image_from_bytes(png_bytes: &[u8], frame_idx: u32) -> Result<PNGImage, RasterError> {
    let decoder = image_png::Decoder::new(Cursor::new(png_bytes));
    let mut reader = decoder.read_info().map_err(|err| {
        RasterError::AnimationFailed(format!(
            "Failed to decode PNG metadata for frame {}: {}",
            frame_idx, err
        ))
    })?;
    let mut data = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut data).map_err(|err| {
        RasterError::AnimationFailed(format!(
            "Failed to decode PNG pixels for frame {}: {}",
            frame_idx, err
        ))
    })?;
    data.truncate(info.buffer_size());

    Ok(PNGImage {
        width: info.width,
        height: info.height,
        data,
        color_type: info.color_type,
        bit_depth: info.bit_depth,
    })
}
