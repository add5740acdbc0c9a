//! RAW sensor development.
//!
//! rawloader hands back undemosaiced sensor values plus the camera's levels
//! and white balance. [`SensorFrame`] turns that into an RGB raster good
//! enough for thumbnails and previews: black/white level normalisation,
//! as-shot white balance, a display gamma, and a 2x2 CFA-binning demosaic.
//!
//! Binning at half resolution is both the fastest path and the one that
//! never invents colour: every output pixel is built from one red, two green
//! and one blue photosite of a Bayer sensor.

use std::path::Path;

use image::metadata::Orientation;
use image::{DynamicImage, Rgb, RgbImage};

use crate::error::ThumbnailError;

/// Display gamma applied after linear normalisation.
const DISPLAY_GAMMA: f32 = 1.0 / 2.2;

const RED: usize = 0;
const GREEN: usize = 1;
const BLUE: usize = 2;

/// One single-channel sensor readout with its colour filter layout.
#[derive(Debug, Clone)]
pub struct SensorFrame {
    width: usize,
    height: usize,
    data: Vec<u16>,
    /// Colour index (0 red, 1 green, 2 blue, 3 second green) at `[row % 2][col % 2]`
    pattern: [[usize; 2]; 2],
    black: [f32; 4],
    white: [f32; 4],
    wb: [f32; 4],
    orientation: Orientation,
}

impl SensorFrame {
    /// Frame with neutral levels (black 0, white `u16::MAX`) and no white balance.
    pub fn new(
        width: usize,
        height: usize,
        data: Vec<u16>,
        pattern: [[usize; 2]; 2],
    ) -> Result<Self, ThumbnailError> {
        if width < 2 || height < 2 || data.len() < width * height {
            return Err(ThumbnailError::Decode {
                message: format!(
                    "sensor frame {}x{} with {} samples is unusable",
                    width,
                    height,
                    data.len()
                ),
            });
        }
        Ok(Self {
            width,
            height,
            data,
            pattern,
            black: [0.0; 4],
            white: [u16::MAX as f32; 4],
            wb: [1.0; 4],
            orientation: Orientation::NoTransforms,
        })
    }

    /// Per-colour black and white levels.
    pub fn with_levels(mut self, black: [u16; 4], white: [u16; 4]) -> Self {
        self.black = black.map(f32::from);
        self.white = white.map(f32::from);
        self
    }

    /// As-shot white balance coefficients, normalised so green is 1.0.
    pub fn with_white_balance(mut self, coeffs: [f32; 4]) -> Self {
        self.wb = normalize_wb(coeffs);
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Decode a RAW file into a frame (blocking).
    pub fn load(path: &Path) -> Result<Self, ThumbnailError> {
        let raw = rawloader::decode_file(path).map_err(|e| ThumbnailError::Decode {
            message: format!("{:?}", e),
        })?;
        Self::from_raw(raw)
    }

    /// Convert a rawloader image, applying its crop.
    pub fn from_raw(raw: rawloader::RawImage) -> Result<Self, ThumbnailError> {
        if raw.cpp != 1 {
            return Err(ThumbnailError::Decode {
                message: format!("{} components per pixel is not a mosaic", raw.cpp),
            });
        }

        let (black, white) = match &raw.data {
            rawloader::RawImageData::Integer(_) => (raw.blacklevels, raw.whitelevels),
            // Float samples are already normalised to 0..1 and scaled below
            rawloader::RawImageData::Float(_) => ([0; 4], [u16::MAX; 4]),
        };
        let samples: Vec<u16> = match raw.data {
            rawloader::RawImageData::Integer(values) => values,
            rawloader::RawImageData::Float(values) => values
                .iter()
                .map(|&v| (v * 65535.0).clamp(0.0, 65535.0) as u16)
                .collect(),
        };

        // crops are [top, right, bottom, left]
        let [top, right, bottom, left] = raw.crops;
        let (top, left, width, height) = match (
            raw.width.checked_sub(left + right),
            raw.height.checked_sub(top + bottom),
        ) {
            (Some(w), Some(h)) if w >= 2 && h >= 2 => (top, left, w, h),
            _ => (0, 0, raw.width, raw.height),
        };

        let mut data = Vec::with_capacity(width * height);
        for row in top..top + height {
            let start = row * raw.width + left;
            let line = samples
                .get(start..start + width)
                .ok_or_else(|| ThumbnailError::Decode {
                    message: "sensor data shorter than its dimensions".to_string(),
                })?;
            data.extend_from_slice(line);
        }

        let mut pattern = [[GREEN; 2]; 2];
        for (r, row) in pattern.iter_mut().enumerate() {
            for (c, color) in row.iter_mut().enumerate() {
                *color = raw.cfa.color_at(top + r, left + c).min(3);
            }
        }

        Ok(Self::new(width, height, data, pattern)?
            .with_levels(black, white)
            .with_white_balance(raw.wb_coeffs)
            .with_orientation(map_orientation(raw.orientation)))
    }

    /// Develop at half resolution: one output pixel per 2x2 photosite block.
    pub fn demosaic_half(&self) -> RgbImage {
        let (out_w, out_h) = (self.width / 2, self.height / 2);
        RgbImage::from_fn(out_w as u32, out_h as u32, |x, y| {
            self.bin(y as usize * 2, x as usize * 2)
        })
    }

    /// Develop at full resolution from a sliding 2x2 window.
    pub fn demosaic_full(&self) -> RgbImage {
        RgbImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let row = (y as usize).min(self.height - 2);
            let col = (x as usize).min(self.width - 2);
            self.bin(row, col)
        })
    }

    /// Demosaic and apply the camera orientation.
    pub fn develop(&self, half_size: bool) -> DynamicImage {
        let rgb = if half_size {
            self.demosaic_half()
        } else {
            self.demosaic_full()
        };
        let mut img = DynamicImage::ImageRgb8(rgb);
        img.apply_orientation(self.orientation);
        img
    }

    /// Average each colour over the 2x2 window whose top-left is `(row, col)`.
    fn bin(&self, row: usize, col: usize) -> Rgb<u8> {
        let mut sum = [0.0f32; 3];
        let mut count = [0u32; 3];

        for r in row..row + 2 {
            for c in col..col + 2 {
                let color = self.pattern[r % 2][c % 2];
                let channel = match color {
                    RED => RED,
                    BLUE => BLUE,
                    _ => GREEN,
                };
                sum[channel] += self.linear(self.data[r * self.width + c], color);
                count[channel] += 1;
            }
        }

        // Non-Bayer layouts can miss a channel in a 2x2 window
        let green = if count[GREEN] > 0 {
            sum[GREEN] / count[GREEN] as f32
        } else {
            0.0
        };
        let channel = |i: usize| {
            if count[i] > 0 {
                sum[i] / count[i] as f32
            } else {
                green
            }
        };

        Rgb([
            to_display(channel(RED)),
            to_display(channel(GREEN)),
            to_display(channel(BLUE)),
        ])
    }

    /// Sample normalised to 0..1 and white balanced.
    fn linear(&self, value: u16, color: usize) -> f32 {
        let black = self.black[color];
        let range = (self.white[color] - black).max(1.0);
        ((value as f32 - black).max(0.0) / range) * self.wb[color]
    }
}

fn to_display(linear: f32) -> u8 {
    (linear.clamp(0.0, 1.0).powf(DISPLAY_GAMMA) * 255.0).round() as u8
}

fn normalize_wb(coeffs: [f32; 4]) -> [f32; 4] {
    let usable = |v: f32| v.is_finite() && v > 0.0;
    if !usable(coeffs[RED]) || !usable(coeffs[GREEN]) || !usable(coeffs[BLUE]) {
        return [1.0; 4];
    }
    let g = coeffs[GREEN];
    let g2 = if usable(coeffs[3]) { coeffs[3] } else { g };
    [coeffs[RED] / g, 1.0, coeffs[BLUE] / g, g2 / g]
}

fn map_orientation(orientation: rawloader::Orientation) -> Orientation {
    use rawloader::Orientation as Raw;
    match orientation {
        Raw::HorizontalFlip => Orientation::FlipHorizontal,
        Raw::Rotate180 => Orientation::Rotate180,
        Raw::VerticalFlip => Orientation::FlipVertical,
        Raw::Transpose => Orientation::Rotate90FlipH,
        Raw::Rotate90 => Orientation::Rotate90,
        Raw::Transverse => Orientation::Rotate270FlipH,
        Raw::Rotate270 => Orientation::Rotate270,
        Raw::Normal | Raw::Unknown => Orientation::NoTransforms,
    }
}
