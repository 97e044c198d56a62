//! # Matching cost
//!
//! For one disparity hypothesis `d`, the cost of pixel `(x, y)` of the reference view is
//!
//! `alpha * sum_c min(|L_c(x, y) - R_c(x - d, y)|, tau1)
//!     + (1 - alpha) * min(sum_c |Gl_c(x, y) - Gr_c(x - d, y)|, tau2)`
//!
//! where `G` is the horizontal gradient. Both terms are truncated before weighting. The
//! gradient term is only taken when both gradients come from the same kind of column: two
//! interior columns, or one border column against itself. A border gradient reads the border
//! fill and is not comparable with an interior one.
//!
//! When `x - d` falls outside the comparison view the pixel gets [`CostParams::max_cost`], the
//! largest value the truncated formula can reach. [`MatchingCost::padded_cost_map`] instead
//! repeats the nearest in-bounds cost of the row, which is what the aggregator is fed so that
//! the sentinel cannot leak into in-bounds windows.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::ops::Range;

use rayon::prelude::*;
use serde::Deserialize;

use crate::error::*;
use crate::image::Image;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Weighting and truncation of the colour and gradient terms.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct CostParams {
    pub alpha: f64,
    pub tau1: f64,
    pub tau2: f64
}

/// The reference and comparison views of one search direction, with their gradients.
pub struct MatchingCost<'a> {
    reference: &'a Image,
    comparison: &'a Image,
    reference_gradient: &'a Image,
    comparison_gradient: &'a Image,
    params: CostParams
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl CostParams {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(Error::param("alpha", format!("{} is outside [0, 1]", self.alpha)));
        }
        if !(self.tau1 > 0.0) {
            return Err(Error::param("tau1", format!("{} is not positive", self.tau1)));
        }
        if !(self.tau2 > 0.0) {
            return Err(Error::param("tau2", format!("{} is not positive", self.tau2)));
        }
        Ok(())
    }

    /// Upper bound of the truncated cost for `bands` colour bands.
    pub fn max_cost(&self, bands: usize) -> f64 {
        self.alpha * bands as f64 * self.tau1 + (1.0 - self.alpha) * self.tau2
    }
}

impl<'a> MatchingCost<'a> {
    /// Bundle the views of one direction. All four images must be congruent and share a band
    /// count.
    pub fn new(
        reference: &'a Image,
        comparison: &'a Image,
        reference_gradient: &'a Image,
        comparison_gradient: &'a Image,
        params: CostParams
    ) -> Result<Self> {
        params.validate()?;
        reference.ensure_not_empty()?;

        for other in [comparison, reference_gradient, comparison_gradient].iter() {
            reference.ensure_congruent(other)?;
            other.ensure_bands(reference.bands())?;
        }

        Ok(Self {
            reference,
            comparison,
            reference_gradient,
            comparison_gradient,
            params
        })
    }

    pub fn params(&self) -> &CostParams {
        &self.params
    }

    pub fn reference(&self) -> &'a Image {
        self.reference
    }

    /// Reference columns whose match `x - d` lies inside the comparison view.
    pub fn valid_columns(&self, d: i32) -> Range<usize> {
        let width = self.reference.width() as i64;
        let start = (d as i64).max(0).min(width);
        let end = (width + d as i64).min(width).max(start);
        start as usize..end as usize
    }

    /// Build the single band cost map of hypothesis `d`.
    pub fn cost_map(&self, d: i32) -> Image {
        let width = self.reference.width();
        let bands = self.reference.bands();
        let CostParams { alpha, tau1, tau2 } = self.params;
        let sentinel = self.params.max_cost(bands);
        let interior = |c: usize| c > 0 && c + 1 < width;

        let mut out = Image::new(width, self.reference.height(), 1);

        out.as_mut_slice()
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, cost) in row.iter_mut().enumerate() {
                    let xc = x as i64 - d as i64;
                    if xc < 0 || xc >= width as i64 {
                        *cost = sentinel;
                        continue;
                    }
                    let xc = xc as usize;

                    let l = self.reference.pixel(x, y);
                    let r = self.comparison.pixel(xc, y);
                    let colour: f64 = l
                        .iter()
                        .zip(r)
                        .map(|(a, b)| (a - b).abs().min(tau1))
                        .sum();

                    let gradient = if x == xc || (interior(x) && interior(xc)) {
                        let gl = self.reference_gradient.pixel(x, y);
                        let gr = self.comparison_gradient.pixel(xc, y);
                        gl.iter()
                            .zip(gr)
                            .map(|(a, b)| (a - b).abs())
                            .sum::<f64>()
                            .min(tau2)
                    }
                    else {
                        0.0
                    };

                    *cost = alpha * colour + (1.0 - alpha) * gradient;
                }
            });

        out
    }

    /// Cost map of `d` where every out-of-bounds pixel repeats the nearest in-bounds cost of its
    /// row. If no column is in bounds the sentinel is kept.
    pub fn padded_cost_map(&self, d: i32) -> Image {
        let mut out = self.cost_map(d);
        let valid = self.valid_columns(d);
        if valid.is_empty() {
            return out;
        }

        let width = out.width();
        out.as_mut_slice().par_chunks_mut(width).for_each(|row| {
            let first = row[valid.start];
            let last = row[valid.end - 1];
            row[..valid.start].iter_mut().for_each(|c| *c = first);
            row[valid.end..].iter_mut().for_each(|c| *c = last);
        });

        out
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
