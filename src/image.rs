//! # Multi-band float images
//!
//! Owned `H x W x B` rasters of `f64` samples. Pixels are stored row-major with the bands of
//! a pixel interleaved, so every pixel is a contiguous slice of `bands` values and every row a
//! contiguous slice of `width * bands` values. The band count is run-time data.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use image::DynamicImage;

use crate::error::*;
use crate::region::Region;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    width: usize,
    height: usize,
    bands: usize,
    data: Vec<f64>
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Image {
    /// Create a zero filled image.
    pub fn new(width: usize, height: usize, bands: usize) -> Self {
        Self::filled(width, height, bands, 0.0)
    }

    /// Create an image with every sample set to `value`.
    pub fn filled(width: usize, height: usize, bands: usize, value: f64) -> Self {
        Self {
            width,
            height,
            bands,
            data: vec![value; width * height * bands]
        }
    }

    /// Wrap an interleaved, row-major sample buffer.
    pub fn from_vec(width: usize, height: usize, bands: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != width * height * bands {
            return Err(Error::BufferSize {
                len: data.len(),
                width,
                height,
                bands
            });
        }

        Ok(Self { width, height, bands, data })
    }

    /// Build an image by evaluating `f(x, y, band)` for every sample.
    pub fn from_fn<F>(width: usize, height: usize, bands: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize, usize) -> f64
    {
        let mut data = Vec::with_capacity(width * height * bands);
        for y in 0..height {
            for x in 0..width {
                for b in 0..bands {
                    data.push(f(x, y, b));
                }
            }
        }

        Self { width, height, bands, data }
    }

    /// Convert a decoded image into a float image.
    ///
    /// Grey images (with or without alpha) give one band, everything else three RGB bands.
    /// Samples keep their 8-bit scale.
    pub fn from_dynamic(img: &DynamicImage) -> Self {
        if img.color().channel_count() <= 2 {
            let luma = img.to_luma();
            let (width, height) = luma.dimensions();
            Self {
                width: width as usize,
                height: height as usize,
                bands: 1,
                data: luma.into_raw().into_iter().map(f64::from).collect()
            }
        }
        else {
            let rgb = img.to_rgb();
            let (width, height) = rgb.dimensions();
            Self {
                width: width as usize,
                height: height as usize,
                bands: 3,
                data: rgb.into_raw().into_iter().map(f64::from).collect()
            }
        }
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

    /// The full extent of the image as a region.
    pub fn extent(&self) -> Region {
        Region::new(0, 0, self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    fn offset(&self, x: usize, y: usize) -> usize {
        (y * self.width + x) * self.bands
    }

    /// All bands of the pixel at `(x, y)`.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> &[f64] {
        let o = self.offset(x, y);
        &self.data[o..o + self.bands]
    }

    #[inline]
    pub fn pixel_mut(&mut self, x: usize, y: usize) -> &mut [f64] {
        let o = self.offset(x, y);
        let bands = self.bands;
        &mut self.data[o..o + bands]
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, band: usize) -> f64 {
        self.data[self.offset(x, y) + band]
    }

    #[inline]
    pub fn put(&mut self, x: usize, y: usize, band: usize, val: f64) {
        let o = self.offset(x, y);
        self.data[o + band] = val;
    }

    /// The samples of row `y`, all bands interleaved.
    pub fn row(&self, y: usize) -> &[f64] {
        let len = self.width * self.bands;
        &self.data[y * len..(y + 1) * len]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Number of samples in one row.
    pub fn row_len(&self) -> usize {
        self.width * self.bands
    }

    /// Copy a single band out as a one band image.
    pub fn band(&self, band: usize) -> Result<Image> {
        if band >= self.bands {
            return Err(Error::BandMismatch {
                expected: band + 1,
                found: self.bands
            });
        }

        Ok(Self {
            width: self.width,
            height: self.height,
            bands: 1,
            data: self.data.iter().skip(band).step_by(self.bands).copied().collect()
        })
    }

    /// Multiply every sample by `k`.
    pub fn scaled(&self, k: f64) -> Image {
        Self {
            width: self.width,
            height: self.height,
            bands: self.bands,
            data: self.data.iter().map(|v| v * k).collect()
        }
    }

    /// Two images are congruent when their extents match.
    pub fn is_congruent(&self, other: &Image) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Fail with [`Error::EmptyImage`] if the image has no samples.
    pub fn ensure_not_empty(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::EmptyImage {
                width: self.width,
                height: self.height,
                bands: self.bands
            });
        }
        Ok(())
    }

    /// Fail with [`Error::ExtentMismatch`] unless `other` is congruent with `self`.
    pub fn ensure_congruent(&self, other: &Image) -> Result<()> {
        if !self.is_congruent(other) {
            return Err(Error::ExtentMismatch {
                left_width: self.width,
                left_height: self.height,
                right_width: other.width,
                right_height: other.height
            });
        }
        Ok(())
    }

    /// Fail with [`Error::BandMismatch`] unless the image has exactly `bands` bands.
    pub fn ensure_bands(&self, bands: usize) -> Result<()> {
        if self.bands != bands {
            return Err(Error::BandMismatch {
                expected: bands,
                found: self.bands
            });
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
