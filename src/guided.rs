//! # Guided aggregation
//!
//! Edge-aware smoothing of a cost map by local linear regression onto a guide image (He et
//! al., "Guided Image Filtering"). Inside every window `w_k` the cost is modelled as
//! `cost ~ a_k . G + b_k` with
//!
//! ```text
//! a_k = (Sigma_k + eps I)^-1 (E_k[G cost] - mu_k mean_k(cost))
//! b_k = mean_k(cost) - a_k . mu_k
//! ```
//!
//! and the output at a pixel is `mean(a) . G + mean(b)`, the average of the models of every
//! window that contains it. All local statistics come from the integral image aggregator.
//!
//! The guide statistics (`mu`, and the inverse of the regularised covariance) do not depend
//! on the cost, so they are computed once in [`GuidedFilter::new`] and reused for every
//! disparity hypothesis.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::error::*;
use crate::image::Image;
use crate::integral::{box_mean, box_mean_of_product};

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

pub struct GuidedFilter<'a> {
    guide: &'a Image,
    radius: usize,
    epsilon: f64,

    /// Local mean of every guide band.
    mean_guide: Image,

    /// Per pixel `(Sigma + eps I)^-1`, `bands x bands` values in row-major order.
    inverse: Vec<f64>
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl<'a> GuidedFilter<'a> {
    /// Prepare the filter for `guide` with window radius `radius` and regulariser `epsilon`.
    pub fn new(guide: &'a Image, radius: usize, epsilon: f64) -> Result<Self> {
        guide.ensure_not_empty()?;
        if !(epsilon > 0.0) {
            return Err(Error::param("epsilon", format!("{} is not positive", epsilon)));
        }

        let bands = guide.bands();
        let bb = bands * bands;
        let mean_guide = box_mean(guide, radius)?;
        let second_moment = box_mean_of_product(guide, guide, radius)?;

        let mut inverse = vec![0.0f64; guide.width() * guide.height() * bb];
        let row_len = guide.width() * bb;

        inverse
            .par_chunks_mut(row_len)
            .zip(mean_guide.as_slice().par_chunks(guide.row_len()))
            .zip(second_moment.as_slice().par_chunks(row_len))
            .for_each(|((inv_row, mu_row), e_row)| {
                for ((inv, mu), e) in inv_row
                    .chunks_mut(bb)
                    .zip(mu_row.chunks(bands))
                    .zip(e_row.chunks(bb))
                {
                    invert_regularised(mu, e, epsilon, inv);
                }
            });

        Ok(Self {
            guide,
            radius,
            epsilon,
            mean_guide,
            inverse
        })
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Per-window linear models: bands `0..B` hold `a`, band `B` holds `b`.
    pub fn coefficients(&self, cost: &Image) -> Result<Image> {
        cost.ensure_bands(1)?;
        self.guide.ensure_congruent(cost)?;

        let bands = self.guide.bands();
        let bb = bands * bands;
        let width = self.guide.width();

        let mean_cost = box_mean(cost, self.radius)?;
        let mean_guide_cost = box_mean_of_product(self.guide, cost, self.radius)?;

        let mut coeffs = Image::new(width, self.guide.height(), bands + 1);
        let row_len = coeffs.row_len();

        coeffs
            .as_mut_slice()
            .par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, ab) in row.chunks_mut(bands + 1).enumerate() {
                    let i = y * width + x;
                    let mu = self.mean_guide.pixel(x, y);
                    let mc = mean_cost.as_slice()[i];
                    let egc = mean_guide_cost.pixel(x, y);
                    let inv = &self.inverse[i * bb..(i + 1) * bb];

                    let mut b = mc;
                    for r in 0..bands {
                        let mut a = 0.0;
                        for c in 0..bands {
                            a += inv[r * bands + c] * (egc[c] - mu[c] * mc);
                        }
                        ab[r] = a;
                        b -= a * mu[r];
                    }
                    ab[bands] = b;
                }
            });

        Ok(coeffs)
    }

    /// Filter a single band cost map congruent with the guide.
    pub fn filter(&self, cost: &Image) -> Result<Image> {
        let bands = self.guide.bands();
        let mean_coeffs = box_mean(&self.coefficients(cost)?, self.radius)?;

        let mut out = Image::new(self.guide.width(), self.guide.height(), 1);
        let width = out.width();

        out.as_mut_slice()
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, v) in row.iter_mut().enumerate() {
                    let g = self.guide.pixel(x, y);
                    let ab = mean_coeffs.pixel(x, y);
                    *v = g.iter().zip(ab).map(|(g, a)| g * a).sum::<f64>() + ab[bands];
                }
            });

        Ok(out)
    }
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Write `(E[GG^T] - mu mu^T + eps I)^-1` into `out`.
fn invert_regularised(mu: &[f64], second_moment: &[f64], epsilon: f64, out: &mut [f64]) {
    let n = mu.len();

    if n == 1 {
        let var = (second_moment[0] - mu[0] * mu[0]).max(0.0);
        out[0] = 1.0 / (var + epsilon);
        return;
    }

    let sigma = DMatrix::from_fn(n, n, |i, j| {
        let reg = if i == j { epsilon } else { 0.0 };
        second_moment[i * n + j] - mu[i] * mu[j] + reg
    });

    match sigma.try_inverse() {
        Some(inv) => {
            for i in 0..n {
                for j in 0..n {
                    out[i * n + j] = inv[(i, j)];
                }
            }
        }
        // Only reachable through rounding in flat windows; fall back to the plain mean.
        None => out.iter_mut().for_each(|v| *v = 0.0)
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
