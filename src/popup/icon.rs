//! Caller icon loading
//!
//! Downloads the guild icon or avatar for a call and turns it into a round,
//! pre-composited BGRA bitmap the popup can blit straight onto its background.

use image::imageops::FilterType;
use log::debug;
use std::io::Read;
use std::time::Duration;

use crate::error::{CallRingError, CallRingResult};

/// Icons bigger than this are not worth waiting for
const MAX_ICON_BYTES: u64 = 2 * 1024 * 1024;
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// A square, top-down 32bpp BGRA bitmap
#[derive(Debug, Clone, PartialEq)]
pub struct IconImage {
    pub size: u32,
    pub bgra: Vec<u8>,
}

impl IconImage {
    /// Decode `bytes`, crop to a `size` square and mask it to a circle over
    /// `background` (RGB). Pixels outside the circle are the background.
    pub fn decode(bytes: &[u8], size: u32, background: [u8; 3]) -> CallRingResult<Self> {
        if size == 0 {
            return Err(CallRingError::Icon("icon size must be positive".into()));
        }
        let img = image::load_from_memory(bytes)
            .map_err(|e| CallRingError::Icon(format!("failed to decode icon: {}", e)))?;
        let rgba = img.resize_to_fill(size, size, FilterType::Triangle).to_rgba8();

        let radius = size as f32 / 2.0;
        let mut bgra = Vec::with_capacity((size * size * 4) as usize);
        for (x, y, pixel) in rgba.enumerate_pixels() {
            let dx = x as f32 + 0.5 - radius;
            let dy = y as f32 + 0.5 - radius;
            // One pixel of falloff keeps the edge smooth
            let coverage = (radius - (dx * dx + dy * dy).sqrt() + 0.5).clamp(0.0, 1.0);
            let alpha = pixel[3] as f32 / 255.0 * coverage;
            let blend = |src: u8, bg: u8| (src as f32 * alpha + bg as f32 * (1.0 - alpha)).round() as u8;

            bgra.push(blend(pixel[2], background[2]));
            bgra.push(blend(pixel[1], background[1]));
            bgra.push(blend(pixel[0], background[0]));
            bgra.push(255);
        }

        Ok(Self { size, bgra })
    }

    /// BGRA value at `(x, y)`
    #[cfg(test)]
    fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * self.size + x) * 4) as usize;
        [self.bgra[i], self.bgra[i + 1], self.bgra[i + 2], self.bgra[i + 3]]
    }
}

/// Download and decode the icon at `url`
pub fn fetch_icon(url: &str, size: u32, background: [u8; 3]) -> CallRingResult<IconImage> {
    debug!("Fetching caller icon from {}", url);
    let response = ureq::get(url)
        .set("User-Agent", concat!("callring/", env!("CARGO_PKG_VERSION")))
        .timeout(FETCH_TIMEOUT)
        .call()
        .map_err(|e| CallRingError::Icon(format!("HTTP error: {}", e)))?;

    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_ICON_BYTES)
        .read_to_end(&mut bytes)?;

    IconImage::decode(&bytes, size, background)
}
