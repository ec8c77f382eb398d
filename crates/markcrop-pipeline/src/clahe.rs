//! Contrast-limited adaptive histogram equalization (CLAHE).
//!
//! The image is divided into a grid of tiles. Each tile gets its own
//! equalization lookup table built from a clipped histogram: counts
//! above the clip limit are cut and redistributed evenly over all bins,
//! which bounds how much any single intensity can be stretched. Each
//! output pixel blends the lookup tables of the four nearest tile
//! centers bilinearly so tile seams do not show.
//!
//! `grid` is the number of tiles along each axis. Tiles are
//! `ceil(width / grid)` by `ceil(height / grid)` pixels, so images smaller
//! than the grid degrade gracefully to fewer, single-pixel tiles.

use image::GrayImage;

/// Number of histogram bins for 8-bit input.
const BINS: usize = 256;

/// Tile geometry for one image.
#[derive(Debug, Clone, Copy)]
struct TileLayout {
    tile_width: u32,
    tile_height: u32,
    columns: u32,
    rows: u32,
}

impl TileLayout {
    fn new(width: u32, height: u32, grid: u32) -> Self {
        let tile_width = width.div_ceil(grid);
        let tile_height = height.div_ceil(grid);
        Self {
            tile_width,
            tile_height,
            columns: width.div_ceil(tile_width),
            rows: height.div_ceil(tile_height),
        }
    }
}

/// Equalize a single-channel image with CLAHE.
///
/// `clip_limit` is relative to the mean bin height of a tile (the
/// conventional parameterization, where 3.0 is moderate). A limit of
/// zero disables clipping. A `grid` of zero or an empty image returns
/// the input unchanged.
#[must_use = "returns the equalized image"]
pub fn equalize(image: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || grid == 0 {
        return image.clone();
    }

    let layout = TileLayout::new(width, height, grid);
    let luts: Vec<[u8; BINS]> = (0..layout.rows)
        .flat_map(|row| (0..layout.columns).map(move |column| (column, row)))
        .map(|(column, row)| tile_lut(image, layout, column, row, clip_limit))
        .collect();

    GrayImage::from_fn(width, height, |x, y| {
        let value = usize::from(image.get_pixel(x, y).0[0]);
        image::Luma([interpolate(&luts, layout, x, y, value)])
    })
}

/// Build the equalization lookup table for one tile.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn tile_lut(
    image: &GrayImage,
    layout: TileLayout,
    column: u32,
    row: u32,
    clip_limit: f32,
) -> [u8; BINS] {
    let x0 = column * layout.tile_width;
    let y0 = row * layout.tile_height;
    let x1 = (x0 + layout.tile_width).min(image.width());
    let y1 = (y0 + layout.tile_height).min(image.height());

    let mut histogram = [0u32; BINS];
    for y in y0..y1 {
        for x in x0..x1 {
            histogram[usize::from(image.get_pixel(x, y).0[0])] += 1;
        }
    }

    let area = (x1 - x0) * (y1 - y0);
    if clip_limit > 0.0 {
        let limit = ((clip_limit * area as f32) / BINS as f32) as u32;
        clip_histogram(&mut histogram, limit.max(1));
    }

    let scale = 255.0 / area as f32;
    let mut lut = [0u8; BINS];
    let mut cumulative = 0u32;
    for (entry, &count) in lut.iter_mut().zip(histogram.iter()) {
        cumulative += count;
        *entry = (cumulative as f32 * scale).round().min(255.0) as u8;
    }
    lut
}

/// Clip histogram bins at `limit` and spread the excess over all bins.
///
/// The total count is preserved: the excess is added back as an even
/// share per bin, and any remainder goes one count at a time to bins
/// spaced evenly across the range.
fn clip_histogram(histogram: &mut [u32; BINS], limit: u32) {
    let mut excess = 0u32;
    for count in histogram.iter_mut() {
        if *count > limit {
            excess += *count - limit;
            *count = limit;
        }
    }

    // BINS fits in u32.
    #[allow(clippy::cast_possible_truncation)]
    let bins = BINS as u32;
    let share = excess / bins;
    let remainder = (excess % bins) as usize;

    for count in histogram.iter_mut() {
        *count += share;
    }
    if remainder > 0 {
        let step = (BINS / remainder).max(1);
        for bin in (0..BINS).step_by(step).take(remainder) {
            histogram[bin] += 1;
        }
    }
}

/// Bilinearly blend the lookup tables of the four tiles whose centers
/// surround pixel `(x, y)`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_possible_wrap
)]
fn interpolate(luts: &[[u8; BINS]], layout: TileLayout, x: u32, y: u32, value: usize) -> u8 {
    let fx = (x as f32 + 0.5) / layout.tile_width as f32 - 0.5;
    let fy = (y as f32 + 0.5) / layout.tile_height as f32 - 0.5;

    let left = fx.floor();
    let top = fy.floor();
    let ax = fx - left;
    let ay = fy - top;

    let clamp_col = |c: i64| c.clamp(0, i64::from(layout.columns) - 1) as usize;
    let clamp_row = |r: i64| r.clamp(0, i64::from(layout.rows) - 1) as usize;
    let (c0, c1) = (clamp_col(left as i64), clamp_col(left as i64 + 1));
    let (r0, r1) = (clamp_row(top as i64), clamp_row(top as i64 + 1));

    let columns = layout.columns as usize;
    let sample = |r: usize, c: usize| f32::from(luts[r * columns + c][value]);

    let upper = (1.0 - ax).mul_add(sample(r0, c0), ax * sample(r0, c1));
    let lower = (1.0 - ax).mul_add(sample(r1, c0), ax * sample(r1, c1));
    (1.0 - ay).mul_add(upper, ay * lower).round().clamp(0.0, 255.0) as u8
}
