//! # Evaluation against ground truth

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use crate::disparity::DisparityMap;
use crate::error::*;
use crate::image::Image;
use crate::occlusion::OcclusionMask;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Evaluation {
    /// Root mean squared disparity error.
    pub rmse: f64,

    /// Share of evaluated pixels whose absolute error exceeds the threshold.
    pub bad_pixel_ratio: f64,

    pub evaluated: usize
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Compare `map` with a single band floating point ground truth.
///
/// Non-finite ground truth samples are skipped, as are occluded pixels when `mask` is given.
/// With nothing left to evaluate both scores are zero.
pub fn evaluate(
    map: &DisparityMap,
    ground_truth: &Image,
    mask: Option<&OcclusionMask>,
    threshold: f64
) -> Result<Evaluation> {
    ground_truth.ensure_bands(1)?;
    if ground_truth.width() != map.width() || ground_truth.height() != map.height() {
        return Err(Error::ExtentMismatch {
            left_width: map.width(),
            left_height: map.height(),
            right_width: ground_truth.width(),
            right_height: ground_truth.height()
        });
    }
    if let Some(m) = mask {
        if m.width() != map.width() || m.height() != map.height() {
            return Err(Error::ExtentMismatch {
                left_width: map.width(),
                left_height: map.height(),
                right_width: m.width(),
                right_height: m.height()
            });
        }
    }

    let mut sq_sum = 0.0;
    let mut bad = 0usize;
    let mut evaluated = 0usize;

    for y in 0..map.height() {
        for x in 0..map.width() {
            let truth = ground_truth.get(x, y, 0);
            if !truth.is_finite() || mask.map_or(false, |m| !m.is_consistent(x, y)) {
                continue;
            }

            let err = map.get(x, y) as f64 - truth;
            sq_sum += err * err;
            if err.abs() > threshold {
                bad += 1;
            }
            evaluated += 1;
        }
    }

    if evaluated == 0 {
        return Ok(Evaluation {
            rmse: 0.0,
            bad_pixel_ratio: 0.0,
            evaluated
        });
    }

    Ok(Evaluation {
        rmse: (sq_sum / evaluated as f64).sqrt(),
        bad_pixel_ratio: bad as f64 / evaluated as f64,
        evaluated
    })
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
