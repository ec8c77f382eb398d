//! Shared types for the markcrop region-extraction pipeline.

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference binary
/// masks without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` so downstream crates can reference source and
/// cropped rasters without depending on `image` directly.
pub use image::RgbImage;

/// An integer pixel position in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelPoint {
    /// Column (pixels from left edge).
    pub x: u32,
    /// Row (pixels from top edge).
    pub y: u32,
}

impl PixelPoint {
    /// Create a new pixel position.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an image buffer.
    #[must_use]
    pub fn of(image: &RgbImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Total pixel count (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// An axis-aligned rectangle in source pixel coordinates.
///
/// `x`/`y` are the inclusive top-left corner; [`right`](Self::right)
/// and [`bottom`](Self::bottom) are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge (inclusive).
    pub x: u32,
    /// Top edge (inclusive).
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl BoundingBox {
    /// Right edge (exclusive).
    ///
    /// Saturates at `u32::MAX`, which no image width reaches, so an
    /// overflowing box never passes [`fits_within`](Self::fits_within).
    #[must_use]
    pub const fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// Bottom edge (exclusive). Saturates like [`right`](Self::right).
    #[must_use]
    pub const fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    /// Whether the box is non-empty and lies entirely inside an image
    /// of the given dimensions.
    #[must_use]
    pub const fn fits_within(&self, dimensions: Dimensions) -> bool {
        self.width > 0
            && self.height > 0
            && self.right() <= dimensions.width
            && self.bottom() <= dimensions.height
    }
}

/// Marker color band in hue/saturation/value space.
///
/// Hue is in degrees on `[0, 360]`. Saturation and value thresholds use
/// the 8-bit `0..=255` scale, so `sat_min = 50` accepts pixels whose
/// saturation is at least `50 / 255`.
///
/// The band does not wrap around 0°; red markers that straddle the
/// wrap point must pick one side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorBand {
    /// Lowest accepted hue in degrees (inclusive).
    pub hue_min: f32,
    /// Highest accepted hue in degrees (inclusive).
    pub hue_max: f32,
    /// Minimum saturation (0-255).
    pub sat_min: u8,
    /// Minimum value/brightness (0-255).
    pub val_min: u8,
}

impl ColorBand {
    /// Green highlighter or pen marks.
    pub const GREEN: Self = Self {
        hue_min: 70.0,
        hue_max: 170.0,
        sat_min: 50,
        val_min: 50,
    };

    /// Red pen marks (the lower, non-wrapping half of the red hues).
    pub const RED: Self = Self {
        hue_min: 0.0,
        hue_max: 20.0,
        sat_min: 70,
        val_min: 50,
    };

    /// Check the band invariants.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if either hue bound is
    /// non-finite or outside `[0, 360]`, or if `hue_min >= hue_max`.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let in_range = |h: f32| h.is_finite() && (0.0..=360.0).contains(&h);
        if !in_range(self.hue_min) || !in_range(self.hue_max) {
            return Err(PipelineError::InvalidConfig(format!(
                "hue bounds must lie in [0, 360], got {}..{}",
                self.hue_min, self.hue_max,
            )));
        }
        if self.hue_min >= self.hue_max {
            return Err(PipelineError::InvalidConfig(format!(
                "hue_min ({}) must be less than hue_max ({})",
                self.hue_min, self.hue_max,
            )));
        }
        Ok(())
    }

    /// Whether an HSV sample falls inside the band.
    ///
    /// `hue` is in degrees; `saturation` and `value` are fractions in
    /// `[0, 1]` and are quantized to 8 bits before comparison.
    #[must_use]
    pub fn contains(&self, hue: f32, saturation: f32, value: f32) -> bool {
        hue >= self.hue_min
            && hue <= self.hue_max
            && unit_to_u8(saturation) >= self.sat_min
            && unit_to_u8(value) >= self.val_min
    }
}

impl Default for ColorBand {
    fn default() -> Self {
        Self::GREEN
    }
}

/// Quantize a `[0, 1]` channel value to `0..=255`, clamping out-of-range
/// input.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn unit_to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Order in which a single image's regions are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionOrder {
    /// Contour discovery order of the border-following scan (row-major
    /// by each contour's first pixel).
    #[default]
    Discovery,
    /// Sorted top-to-bottom, then left-to-right, by bounding-box corner.
    Reading,
}

/// Configuration for the region-extraction pipeline.
///
/// Defaults reproduce the reference behavior: green marker band,
/// CLAHE with clip limit 3.0 on an 8x8 tile grid, a 3x3 structuring
/// element with one closing and one opening pass, a minimum contour
/// area of 100 square pixels, and a 2-pixel inward crop padding.
///
/// Call [`validate`](Self::validate) before running a batch; the
/// individual stage functions assume a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Marker color band used for thresholding.
    pub color_band: ColorBand,

    /// CLAHE clip limit, relative to the mean histogram bin height.
    /// Zero disables clipping (plain per-tile equalization).
    pub clahe_clip_limit: f32,

    /// Number of CLAHE tiles along each image axis.
    pub clahe_tile_size: u32,

    /// Side length of the square structuring element (odd).
    pub morph_kernel_size: u32,

    /// Closing passes (fill gaps in hand-drawn strokes).
    pub close_iterations: u32,

    /// Opening passes (remove isolated noise pixels).
    pub open_iterations: u32,

    /// Contours enclosing less than this area (square pixels) are
    /// discarded.
    pub min_region_area: f64,

    /// Pixels removed from each side of a bounding box before cropping,
    /// so the marker stroke itself is excluded.
    pub crop_padding: u32,

    /// Chebyshev radius by which the painting mask is grown before
    /// marker pixels are repainted white. Zero paints the mask as is.
    pub paint_dilation: u32,

    /// Per-image region ordering.
    pub region_order: RegionOrder,
}

impl PipelineConfig {
    /// Default CLAHE clip limit.
    pub const DEFAULT_CLAHE_CLIP_LIMIT: f32 = 3.0;
    /// Default CLAHE tile grid size.
    pub const DEFAULT_CLAHE_TILE_SIZE: u32 = 8;
    /// Default structuring element size.
    pub const DEFAULT_MORPH_KERNEL_SIZE: u32 = 3;
    /// Default closing passes.
    pub const DEFAULT_CLOSE_ITERATIONS: u32 = 1;
    /// Default opening passes.
    pub const DEFAULT_OPEN_ITERATIONS: u32 = 1;
    /// Default minimum contour area.
    pub const DEFAULT_MIN_REGION_AREA: f64 = 100.0;
    /// Default inward crop padding.
    pub const DEFAULT_CROP_PADDING: u32 = 2;
    /// Default painting mask dilation.
    pub const DEFAULT_PAINT_DILATION: u32 = 0;

    /// Check every configuration invariant.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] describing the first
    /// violated invariant.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.color_band.validate()?;
        if !self.clahe_clip_limit.is_finite() || self.clahe_clip_limit < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "clahe_clip_limit must be finite and non-negative, got {}",
                self.clahe_clip_limit,
            )));
        }
        if self.clahe_tile_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "clahe_tile_size must be at least 1".to_owned(),
            ));
        }
        if self.morph_kernel_size == 0 || self.morph_kernel_size % 2 == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "morph_kernel_size must be odd, got {}",
                self.morph_kernel_size,
            )));
        }
        if !self.min_region_area.is_finite() || self.min_region_area < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "min_region_area must be finite and non-negative, got {}",
                self.min_region_area,
            )));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            color_band: ColorBand::default(),
            clahe_clip_limit: Self::DEFAULT_CLAHE_CLIP_LIMIT,
            clahe_tile_size: Self::DEFAULT_CLAHE_TILE_SIZE,
            morph_kernel_size: Self::DEFAULT_MORPH_KERNEL_SIZE,
            close_iterations: Self::DEFAULT_CLOSE_ITERATIONS,
            open_iterations: Self::DEFAULT_OPEN_ITERATIONS,
            min_region_area: Self::DEFAULT_MIN_REGION_AREA,
            crop_padding: Self::DEFAULT_CROP_PADDING,
            paint_dilation: Self::DEFAULT_PAINT_DILATION,
            region_order: RegionOrder::default(),
        }
    }
}

/// A connected marker region found in a mask, before area filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRegion {
    /// Index of the owning source image within its batch.
    pub source: usize,
    /// External boundary pixels in tracing order.
    pub contour: Vec<PixelPoint>,
    /// Polygon area enclosed by `contour`, in square pixels of the
    /// traced mask.
    pub area: f64,
}

/// A cropped region ready for painting and persistence.
///
/// Does not derive `PartialEq`; compare `bounds` and pixel data
/// explicitly.
#[derive(Debug, Clone)]
pub struct ExtractedRegion {
    /// Index of the owning source image within its batch.
    pub source: usize,
    /// Crop rectangle in source coordinates, after padding and clamping.
    pub bounds: BoundingBox,
    /// Area of the contour this region was cut from.
    pub contour_area: f64,
    /// Cropped pixels.
    pub image: RgbImage,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("input image data is empty")]
    EmptyInput,

    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}
