//! # Median filters
//!
//! The weighted median refines a disparity map with a joint-bilateral weight taken from a guide
//! image. Every pixel `q` in the window of `p` votes for its disparity with weight
//!
//! ```text
//! w(p, q) = exp(-|guide(p) - guide(q)|^2 * gamma_color) * exp(-|p - q|^2 * gamma_space)
//! ```
//!
//! and the output is the smallest disparity at which the cumulative weight reaches half the
//! window total. The output is therefore always a value present in the window.
//!
//! The plain per-band median is used to take the noise out of the guide before refinement.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::cmp::Ordering;

use rayon::prelude::*;
use serde::Deserialize;

use crate::disparity::DisparityMap;
use crate::error::*;
use crate::image::Image;
use crate::region::Region;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

#[derive(Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct WeightedMedianParams {
    pub radius: usize,
    pub gamma_color: f64,
    pub gamma_space: f64,
    pub kernel: WeightKernel
}

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// Weight formula of the weighted median.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WeightKernel {
    /// Colour similarity times spatial proximity.
    ColorSpatial,

    /// Colour similarity only, every position in the window counts the same.
    ColorOnly
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Default for WeightedMedianParams {
    fn default() -> Self {
        Self {
            radius: 19,
            gamma_color: 1.0 / (2.0 * 25.5 * 25.5),
            gamma_space: 1.0 / (2.0 * 9.0 * 9.0),
            kernel: WeightKernel::ColorSpatial
        }
    }
}

impl WeightedMedianParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.gamma_color >= 0.0) || !self.gamma_color.is_finite() {
            return Err(Error::param(
                "gamma_color",
                format!("{} is not a finite non-negative value", self.gamma_color)
            ));
        }
        if !(self.gamma_space >= 0.0) || !self.gamma_space.is_finite() {
            return Err(Error::param(
                "gamma_space",
                format!("{} is not a finite non-negative value", self.gamma_space)
            ));
        }
        Ok(())
    }

    /// Spatial weights of the full `(2r + 1)^2` window for radius `radius`, row-major.
    fn spatial_table(&self, radius: usize) -> Vec<f64> {
        let r = radius as isize;
        let side = 2 * radius + 1;
        let mut table = Vec::with_capacity(side * side);

        for dy in -r..=r {
            for dx in -r..=r {
                table.push(match self.kernel {
                    WeightKernel::ColorSpatial => {
                        (-((dx * dx + dy * dy) as f64) * self.gamma_space).exp()
                    }
                    WeightKernel::ColorOnly => 1.0
                });
            }
        }

        table
    }
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Windows never reach further than the larger image dimension.
fn effective_radius(radius: usize, image: &Image) -> usize {
    radius.min(image.width().max(image.height()))
}

/// Refine `map` with a weighted median guided by `guide`.
pub fn weighted_median(
    map: &DisparityMap,
    guide: &Image,
    params: &WeightedMedianParams
) -> Result<DisparityMap> {
    params.validate()?;
    guide.ensure_not_empty()?;
    if guide.width() != map.width() || guide.height() != map.height() {
        return Err(Error::ExtentMismatch {
            left_width: map.width(),
            left_height: map.height(),
            right_width: guide.width(),
            right_height: guide.height()
        });
    }

    let width = map.width();
    let radius = effective_radius(params.radius, guide);
    let side = 2 * radius + 1;
    let bounds = guide.extent();
    let spatial = params.spatial_table(radius);
    let mut data = vec![0i32; width * map.height()];

    data.par_chunks_mut(width)
        .enumerate()
        .for_each_init(
            || Vec::with_capacity(side * side),
            |votes: &mut Vec<(i32, f64)>, (y, row)| {
                for (x, out) in row.iter_mut().enumerate() {
                    let centre = guide.pixel(x, y);
                    let window = Region::window(x, y, radius, &bounds);

                    votes.clear();
                    for qy in window.y..window.y_end() {
                        let ty = qy + radius - y;
                        for qx in window.x..window.x_end() {
                            let tx = qx + radius - x;
                            let dist: f64 = centre
                                .iter()
                                .zip(guide.pixel(qx, qy))
                                .map(|(a, b)| (a - b) * (a - b))
                                .sum();
                            let w = (-dist * params.gamma_color).exp() * spatial[ty * side + tx];
                            votes.push((map.get(qx, qy), w));
                        }
                    }

                    *out = median_of_votes(votes);
                }
            }
        );

    DisparityMap::from_vec(width, map.height(), map.direction(), data)
}

/// Per-band median over a truncated `(2r + 1)^2` window.
///
/// Windows with an even number of samples take the upper of the two middle values.
pub fn median_filter(image: &Image, radius: usize) -> Result<Image> {
    image.ensure_not_empty()?;

    let bands = image.bands();
    let radius = effective_radius(radius, image);
    let side = 2 * radius + 1;
    let bounds = image.extent();
    let mut out = Image::new(image.width(), image.height(), bands);
    let row_len = out.row_len();

    out.as_mut_slice()
        .par_chunks_mut(row_len)
        .enumerate()
        .for_each_init(
            || Vec::with_capacity(side * side),
            |samples: &mut Vec<f64>, (y, row)| {
                for (x, px) in row.chunks_mut(bands).enumerate() {
                    let window = Region::window(x, y, radius, &bounds);
                    for (b, v) in px.iter_mut().enumerate() {
                        samples.clear();
                        for qy in window.y..window.y_end() {
                            for qx in window.x..window.x_end() {
                                samples.push(image.get(qx, qy, b));
                            }
                        }
                        let mid = samples.len() / 2;
                        let (_, m, _) = samples.select_nth_unstable_by(mid, |a, b| {
                            a.partial_cmp(b).unwrap_or(Ordering::Equal)
                        });
                        *v = *m;
                    }
                }
            }
        );

    Ok(out)
}

/// Smallest value whose cumulative weight reaches half the total.
fn median_of_votes(votes: &mut [(i32, f64)]) -> i32 {
    votes.sort_unstable_by_key(|&(d, _)| d);

    let half = 0.5 * votes.iter().map(|&(_, w)| w).sum::<f64>();
    let mut acc = 0.0;
    for &(d, w) in votes.iter() {
        acc += w;
        if acc >= half {
            return d;
        }
    }

    // Rounding can leave the running sum a hair under half.
    votes.last().map(|&(d, _)| d).unwrap_or(0)
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disparity::Direction;

    #[test]
    fn votes_split_at_half_weight() {
        let mut votes = vec![(4, 1.0), (1, 1.0), (9, 1.0)];
        assert_eq!(median_of_votes(&mut votes), 4);

        let mut heavy = vec![(4, 1.0), (1, 5.0), (9, 1.0)];
        assert_eq!(median_of_votes(&mut heavy), 1);

        // Reaching exactly half stops on the lower value.
        let mut even = vec![(2, 1.0), (7, 1.0)];
        assert_eq!(median_of_votes(&mut even), 2);
    }

    #[test]
    fn isolated_outlier_is_removed() {
        let mut data = vec![3; 25];
        data[12] = 9;
        let map = DisparityMap::from_vec(5, 5, Direction::LeftToRight, data).unwrap();
        let guide = Image::filled(5, 5, 1, 100.0);
        let params = WeightedMedianParams {
            radius: 1,
            ..Default::default()
        };

        let out = weighted_median(&map, &guide, &params).unwrap();
        assert!(out.as_slice().iter().all(|&d| d == 3));
        assert_eq!(out.direction(), Direction::LeftToRight);
    }

    #[test]
    fn guide_edges_are_kept() {
        let guide = Image::from_fn(6, 4, 3, |x, _, _| if x < 3 { 0.0 } else { 255.0 });
        let data = (0..24).map(|i| if i % 6 < 3 { 1 } else { 7 }).collect();
        let map = DisparityMap::from_vec(6, 4, Direction::LeftToRight, data).unwrap();

        for kernel in [WeightKernel::ColorSpatial, WeightKernel::ColorOnly].iter() {
            let params = WeightedMedianParams {
                radius: 2,
                kernel: *kernel,
                ..Default::default()
            };
            assert_eq!(weighted_median(&map, &guide, &params).unwrap(), map);
        }
    }

    #[test]
    fn plain_median_per_band() {
        let img = Image::from_fn(3, 3, 2, |x, y, b| {
            if b == 0 {
                (x + 3 * y) as f64
            }
            else if x == 1 && y == 1 {
                50.0
            }
            else {
                1.0
            }
        });
        let out = median_filter(&img, 1).unwrap();
        assert_eq!(out.get(1, 1, 0), 4.0);
        assert_eq!(out.get(1, 1, 1), 1.0);
        // Corner window holds 0, 1, 3, 4.
        assert_eq!(out.get(0, 0, 0), 3.0);
        assert_eq!(median_filter(&img, 0).unwrap(), img);
    }

    #[test]
    fn radius_beyond_the_image_covers_the_whole_image() {
        let guide = Image::from_fn(4, 3, 1, |x, y, _| (x * 40 + y * 15) as f64);
        let data = (0..12).map(|i| (i * 5) % 7 - 3).collect();
        let map = DisparityMap::from_vec(4, 3, Direction::LeftToRight, data).unwrap();

        let whole = WeightedMedianParams {
            radius: 3,
            ..Default::default()
        };
        let huge = WeightedMedianParams {
            radius: 1_000_000,
            ..whole
        };
        assert_eq!(
            weighted_median(&map, &guide, &huge).unwrap(),
            weighted_median(&map, &guide, &whole).unwrap()
        );
        assert_eq!(median_filter(&guide, 1_000_000).unwrap(), median_filter(&guide, 3).unwrap());
    }

    #[test]
    fn rejects_mismatched_guide() {
        let map = DisparityMap::new(4, 4, Direction::LeftToRight);
        let params = WeightedMedianParams::default();
        assert!(matches!(
            weighted_median(&map, &Image::new(4, 3, 1), &params),
            Err(Error::ExtentMismatch { .. })
        ));
        let bad = WeightedMedianParams {
            gamma_color: -1.0,
            ..params
        };
        assert!(weighted_median(&map, &Image::new(4, 4, 1), &bad).is_err());
    }
}
