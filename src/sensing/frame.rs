use std::io::Cursor;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use image::{imageops::FilterType, GenericImageView, ImageFormat};

/// One encoded screenshot as handed over by the capture provider.
#[derive(Debug, Clone)]
pub struct Frame {
    pub bytes: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(bytes: Vec<u8>, captured_at: DateTime<Utc>) -> Self {
        Self { bytes, captured_at }
    }
}

/// Re-encodes `bytes` as PNG no wider than `max_width`, keeping the aspect
/// ratio. Frames already narrow enough are returned as captured.
pub fn downscale_for_upload(bytes: &[u8], max_width: u32) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes).context("failed to decode captured frame")?;
    let (width, _) = img.dimensions();
    if width <= max_width {
        return Ok(bytes.to_vec());
    }

    let resized = img.resize(max_width, u32::MAX, FilterType::Triangle);
    let mut out = Cursor::new(Vec::new());
    resized
        .write_to(&mut out, ImageFormat::Png)
        .context("failed to encode downscaled frame")?;
    Ok(out.into_inner())
}
