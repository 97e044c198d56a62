//! # Integral image box aggregation
//!
//! Summed-area tables give the sum of any axis-aligned window in four lookups, so a box mean
//! costs O(1) per pixel whatever the radius. Windows are truncated at the image border: the
//! mean is taken over the pixels that exist, never over zero padding.
//!
//! [`box_mean_of_product`] is the "multiply then aggregate" mode used to obtain `E[XY]` for
//! local covariances, `cov(X, Y) = E[XY] - E[X]E[Y]`.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use rayon::prelude::*;

use crate::error::*;
use crate::image::Image;
use crate::region::Region;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Per-band summed-area table with a zero guard row and column.
///
/// Entry `(x, y)` holds the sum of all samples strictly above and to the left of pixel
/// `(x, y)`, so the table is `(width + 1) x (height + 1)`.
pub struct IntegralImage {
    width: usize,
    height: usize,
    bands: usize,
    sums: Vec<f64>
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl IntegralImage {
    /// Build the table with one running sum per row, added onto the row above.
    pub fn new(image: &Image) -> Self {
        let width = image.width();
        let height = image.height();
        let bands = image.bands();
        let stride = (width + 1) * bands;

        let mut sums = vec![0.0f64; stride * (height + 1)];
        let mut row_acc = vec![0.0f64; bands];

        for y in 0..height {
            row_acc.iter_mut().for_each(|a| *a = 0.0);
            let src = image.row(y);

            for x in 0..width {
                let above = y * stride + (x + 1) * bands;
                let here = above + stride;
                for b in 0..bands {
                    row_acc[b] += src[x * bands + b];
                    sums[here + b] = sums[above + b] + row_acc[b];
                }
            }
        }

        Self { width, height, bands, sums }
    }

    #[inline]
    fn at(&self, x: usize, y: usize, band: usize) -> f64 {
        self.sums[(y * (self.width + 1) + x) * self.bands + band]
    }

    /// Sum of `band` over `region`, which must lie inside the image.
    #[inline]
    pub fn sum(&self, region: &Region, band: usize) -> f64 {
        let (x0, y0) = (region.x, region.y);
        let (x1, y1) = (region.x_end(), region.y_end());
        self.at(x1, y1, band) - self.at(x0, y1, band) - self.at(x1, y0, band) + self.at(x0, y0, band)
    }

    /// Mean of `band` over a non-empty `region`.
    #[inline]
    pub fn mean(&self, region: &Region, band: usize) -> f64 {
        self.sum(region, band) / region.area() as f64
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn bands(&self) -> usize {
        self.bands
    }
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Per-pixel, per-band mean over the `(2r+1) x (2r+1)` window, truncated at the borders.
pub fn box_mean(image: &Image, radius: usize) -> Result<Image> {
    image.ensure_not_empty()?;

    let table = IntegralImage::new(image);
    let bounds = image.extent();
    let bands = image.bands();
    let mut out = Image::new(image.width(), image.height(), bands);
    let row_len = out.row_len();

    out.as_mut_slice()
        .par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_mut(bands).enumerate() {
                let window = Region::window(x, y, radius, &bounds);
                for (b, v) in px.iter_mut().enumerate() {
                    *v = table.mean(&window, b);
                }
            }
        });

    Ok(out)
}

/// Per-pixel outer product of the bands of `a` and `b`.
///
/// Band `i * b.bands() + j` of the result holds `a_i * b_j`.
pub fn outer_product(a: &Image, b: &Image) -> Result<Image> {
    a.ensure_not_empty()?;
    b.ensure_not_empty()?;
    a.ensure_congruent(b)?;

    let (na, nb) = (a.bands(), b.bands());
    let mut out = Image::new(a.width(), a.height(), na * nb);
    let row_len = out.row_len();

    out.as_mut_slice()
        .par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_mut(na * nb).enumerate() {
                let pa = a.pixel(x, y);
                let pb = b.pixel(x, y);
                for i in 0..na {
                    for j in 0..nb {
                        px[i * nb + j] = pa[i] * pb[j];
                    }
                }
            }
        });

    Ok(out)
}

/// Box mean of the per-pixel band products of `a` and `b`, i.e. the local `E[a_i b_j]`.
pub fn box_mean_of_product(a: &Image, b: &Image, radius: usize) -> Result<Image> {
    box_mean(&outer_product(a, b)?, radius)
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
