//! # General disparity objects
//!
//! This module provides the stereo input pair, the disparity map and the generic algorithm
//! trait shared by the pipeline stages.
//!
//! Sign convention: a disparity `d` of the left-reference map at `(x, y)` points to `(x - d, y)`
//! in the right image. The right-reference map uses the same formula with the views swapped, so
//! its values are the negated left values and a consistent pair satisfies
//! `Dr(x - Dl(x, y), y) == -Dl(x, y)`.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::ops::RangeInclusive;

use image::GrayImage;
use serde::Deserialize;

use crate::error::*;
use crate::image::Image;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// A rectified pair of congruent multi-band images.
#[derive(Clone, Debug)]
pub struct StereoPair {
    left: Image,
    right: Image
}

/// Inclusive range of horizontal disparities explored by the left-reference search.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisparityRange {
    pub min: i32,
    pub max: i32
}

/// An integer disparity map.
#[derive(Clone, Debug, PartialEq)]
pub struct DisparityMap {
    width: usize,
    height: usize,
    data: Vec<i32>,
    direction: Direction,
    pub max_disp: Option<i32>,
    pub min_disp: Option<i32>
}

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// Which view of the pair is the reference of a search.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    LeftToRight,
    RightToLeft
}

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

pub trait DisparityAlgorithm {
    /// Compute the disparity map of the given stereo pair.
    fn compute(&mut self, pair: &StereoPair) -> Result<DisparityMap>;
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl StereoPair {
    /// Build a pair, rejecting empty, non-congruent or band-mismatched views.
    pub fn new(left: Image, right: Image) -> Result<Self> {
        left.ensure_not_empty()?;
        right.ensure_not_empty()?;
        left.ensure_congruent(&right)?;
        right.ensure_bands(left.bands())?;

        Ok(Self { left, right })
    }

    pub fn left(&self) -> &Image {
        &self.left
    }

    pub fn right(&self) -> &Image {
        &self.right
    }

    pub fn width(&self) -> usize {
        self.left.width()
    }

    pub fn height(&self) -> usize {
        self.left.height()
    }

    pub fn bands(&self) -> usize {
        self.left.bands()
    }
}

impl DisparityRange {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn validate(&self) -> Result<()> {
        if self.min > self.max {
            return Err(Error::InvalidRange {
                min: self.min,
                max: self.max
            });
        }
        if self.min == i32::MIN {
            return Err(Error::param("min_disparity", "cannot be negated"));
        }
        Ok(())
    }

    /// Number of hypotheses in the range.
    pub fn len(&self) -> usize {
        (self.max as i64 - self.min as i64 + 1).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, d: i32) -> bool {
        d >= self.min && d <= self.max
    }
}

impl Direction {
    /// Hypotheses in scan order: `[min, max]` for the left reference, the negated range
    /// `[-max, -min]` for the right reference. Both ascend.
    pub fn hypotheses(self, range: &DisparityRange) -> RangeInclusive<i32> {
        match self {
            Direction::LeftToRight => range.min..=range.max,
            Direction::RightToLeft => -range.max..=-range.min
        }
    }

    /// Whether `d` is a hypothesis of this direction for `range`.
    pub fn admits(self, range: &DisparityRange, d: i32) -> bool {
        self.hypotheses(range).contains(&d)
    }

    /// The candidate lying on the farther surface.
    ///
    /// Left-reference disparities grow towards the camera, so the background is the smaller
    /// value. Right-reference values are negated, so there it is the larger one.
    pub fn background(self, a: i32, b: i32) -> i32 {
        match self {
            Direction::LeftToRight => a.min(b),
            Direction::RightToLeft => a.max(b)
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::LeftToRight => Direction::RightToLeft,
            Direction::RightToLeft => Direction::LeftToRight
        }
    }
}

impl DisparityMap {
    pub fn new(width: usize, height: usize, direction: Direction) -> Self {
        DisparityMap {
            width,
            height,
            data: vec![0; width * height],
            direction,
            min_disp: None,
            max_disp: None
        }
    }

    /// Wrap a row-major buffer and record its observed range.
    pub fn from_vec(
        width: usize,
        height: usize,
        direction: Direction,
        data: Vec<i32>
    ) -> Result<Self> {
        if data.len() != width * height {
            return Err(Error::BufferSize {
                len: data.len(),
                width,
                height,
                bands: 1
            });
        }

        let mut map = DisparityMap {
            width,
            height,
            data,
            direction,
            min_disp: None,
            max_disp: None
        };
        map.update_stats();
        Ok(map)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> i32 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn put(&mut self, x: usize, y: usize, val: i32) {
        self.data[y * self.width + x] = val
    }

    pub fn row(&self, y: usize) -> &[i32] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.data
    }

    /// Recompute `min_disp` and `max_disp` from the data.
    pub fn update_stats(&mut self) {
        self.min_disp = self.data.iter().copied().min();
        self.max_disp = self.data.iter().copied().max();
    }

    /// Fail with [`Error::EmptyImage`] if the map has no pixels.
    pub fn ensure_not_empty(&self) -> Result<()> {
        if self.data.is_empty() {
            return Err(Error::EmptyImage {
                width: self.width,
                height: self.height,
                bands: 1
            });
        }
        Ok(())
    }

    /// Fail unless `other` has the same extent.
    pub fn ensure_congruent(&self, other: &DisparityMap) -> Result<()> {
        if self.width != other.width || self.height != other.height {
            return Err(Error::ExtentMismatch {
                left_width: self.width,
                left_height: self.height,
                right_width: other.width,
                right_height: other.height
            });
        }
        Ok(())
    }

    /// The map as a single band float image.
    pub fn to_image(&self) -> Image {
        Image::from_fn(self.width, self.height, 1, |x, y, _| self.get(x, y) as f64)
    }

    /// Converts the map into a Luma8 image, clamping values to `[0, 255]`.
    pub fn to_luma(&self) -> GrayImage {
        GrayImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let val = self.get(x as usize, y as usize).max(0).min(255);
            image::Luma([val as u8])
        })
    }

    /// Converts the map to a normalised GrayImage.
    ///
    /// Stretches the observed range `[min_disp, max_disp]` over `[0, 255]`. If the range is not
    /// set the function is equivalent to `.to_luma()`.
    pub fn to_luma_normalised(&self) -> GrayImage {
        let (min, max) = match (self.min_disp, self.max_disp) {
            (Some(min), Some(max)) => (min as f64, max as f64),
            _ => return self.to_luma()
        };

        let mult = if max > min { 255.0 / (max - min) } else { 0.0 };

        GrayImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let val = (self.get(x as usize, y as usize) as f64 - min) * mult;
            image::Luma([val.max(0.0).min(255.0) as u8])
        })
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn right_reference_scans_the_negated_range() {
        let range = DisparityRange::new(-1, 3);
        let left: Vec<i32> = Direction::LeftToRight.hypotheses(&range).collect();
        let right: Vec<i32> = Direction::RightToLeft.hypotheses(&range).collect();
        assert_eq!(left, vec![-1, 0, 1, 2, 3]);
        assert_eq!(right, vec![-3, -2, -1, 0, 1]);
        assert!(Direction::RightToLeft.admits(&range, -3));
        assert!(!Direction::RightToLeft.admits(&range, 3));
    }

    #[test]
    fn background_follows_the_sign_convention() {
        assert_eq!(Direction::LeftToRight.background(4, 1), 1);
        assert_eq!(Direction::RightToLeft.background(-4, -1), -1);
    }

    #[test]
    fn invalid_range_is_rejected() {
        assert!(matches!(
            DisparityRange::new(2, 1).validate(),
            Err(Error::InvalidRange { min: 2, max: 1 })
        ));
        assert_eq!(DisparityRange::new(-4, 4).len(), 9);
    }

    #[test]
    fn pair_rejects_mismatched_views() {
        assert!(StereoPair::new(Image::new(4, 4, 1), Image::new(4, 5, 1)).is_err());
        assert!(StereoPair::new(Image::new(4, 4, 1), Image::new(4, 4, 3)).is_err());
        assert!(StereoPair::new(Image::new(0, 0, 1), Image::new(0, 0, 1)).is_err());
    }

    #[test]
    fn normalised_luma_stretches_signed_range() {
        let map = DisparityMap::from_vec(3, 1, Direction::RightToLeft, vec![-4, -2, 0]).unwrap();
        let luma = map.to_luma_normalised();
        assert_eq!(luma.get_pixel(0, 0)[0], 0);
        assert_eq!(luma.get_pixel(1, 0)[0], 127);
        assert_eq!(luma.get_pixel(2, 0)[0], 255);
        assert_eq!(map.to_luma().get_pixel(0, 0)[0], 0);
    }
}
