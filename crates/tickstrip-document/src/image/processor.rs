// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: decode embedded raster data, reduce it to grey, and
// re-encode it. Operates on in-memory images using the `image` crate.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GrayImage, RgbImage};
use tickstrip_core::error::{Result, TickstripError};
use tracing::{debug, instrument};

/// Image processing pipeline operating on a single in-memory image.
///
/// Each transformation consumes `self` and returns a new `ImageProcessor`,
/// enabling method chaining.
///
/// ```ignore
/// let grey = ImageProcessor::from_bytes(&jpeg)?
///     .grayscale()
///     .to_jpeg_bytes(90)?;
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Create a processor from encoded bytes (JPEG, PNG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(data)
            .map_err(|err| TickstripError::Image(format!("failed to decode image: {}", err)))?;
        debug!(
            width = img.width(),
            height = img.height(),
            "Image decoded from bytes"
        );
        Ok(Self { image: img })
    }

    /// Wrap raw interleaved 8-bit RGB samples.
    pub fn from_rgb_samples(width: u32, height: u32, samples: Vec<u8>) -> Result<Self> {
        let rgb = RgbImage::from_raw(width, height, samples).ok_or_else(|| {
            TickstripError::Image(format!("RGB sample buffer too short for {}x{}", width, height))
        })?;
        Ok(Self {
            image: DynamicImage::ImageRgb8(rgb),
        })
    }

    /// Wrap raw interleaved 8-bit CMYK samples, converted naively to RGB.
    pub fn from_cmyk_samples(width: u32, height: u32, samples: &[u8]) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if samples.len() < expected {
            return Err(TickstripError::Image(format!(
                "CMYK sample buffer too short for {}x{}",
                width, height
            )));
        }
        let rgb: Vec<u8> = samples[..expected]
            .chunks_exact(4)
            .flat_map(|px| {
                let k = 255 - u16::from(px[3]);
                let channel = |c: u8| ((255 - u16::from(c)) * k / 255) as u8;
                [channel(px[0]), channel(px[1]), channel(px[2])]
            })
            .collect();
        Self::from_rgb_samples(width, height, rgb)
    }

    // -- Accessors ------------------------------------------------------------

    /// Current image width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Current image height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    // -- Transformations ------------------------------------------------------

    /// Convert the image to grayscale (luma).
    #[instrument(skip(self))]
    pub fn grayscale(self) -> Self {
        debug!(width = self.width(), height = self.height(), "Converting to grayscale");
        Self {
            image: DynamicImage::ImageLuma8(self.image.to_luma8()),
        }
    }

    // -- Output ---------------------------------------------------------------

    /// One 8-bit luma sample per pixel, row-major.
    pub fn to_luma_samples(&self) -> Vec<u8> {
        self.image.to_luma8().into_raw()
    }

    /// Encode as a single-channel JPEG with the given quality (1-100).
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let luma: GrayImage = self.image.to_luma8();
        let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
        luma.write_with_encoder(encoder)
            .map_err(|err| TickstripError::Image(format!("JPEG encoding failed: {}", err)))?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_samples_reduce_to_luma() {
        let red = vec![255, 0, 0, 255, 0, 0];
        let grey = ImageProcessor::from_rgb_samples(2, 1, red)
            .expect("wrap")
            .grayscale();
        let samples = grey.to_luma_samples();
        assert_eq!(samples.len(), 2);
        // Rec. 709 luma of pure red, as computed by the image crate.
        assert!(samples.iter().all(|&s| (50..=80).contains(&s)));
    }

    #[test]
    fn short_buffers_are_rejected() {
        assert!(ImageProcessor::from_rgb_samples(4, 4, vec![0; 10]).is_err());
        assert!(ImageProcessor::from_cmyk_samples(4, 4, &[0; 10]).is_err());
    }

    #[test]
    fn cmyk_black_is_black() {
        let processor = ImageProcessor::from_cmyk_samples(1, 1, &[0, 0, 0, 255]).expect("wrap");
        assert_eq!(processor.to_luma_samples(), vec![0]);
    }

    #[test]
    fn grey_jpeg_round_trips_dimensions() {
        let processor = ImageProcessor::from_rgb_samples(8, 4, vec![120; 8 * 4 * 3]).expect("wrap");
        let jpeg = processor.to_jpeg_bytes(85).expect("encode");
        let decoded = ImageProcessor::from_bytes(&jpeg).expect("decode");
        assert_eq!((decoded.width(), decoded.height()), (8, 4));
        assert!(matches!(decoded.image, DynamicImage::ImageLuma8(_)));
    }
}
