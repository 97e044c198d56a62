//! # Horizontal gradient
//!
//! Central difference along image rows with the 2-tap kernel `[-0.5, 0, 0.5]`, applied to
//! every band independently:
//!
//! `G_c(x, y) = 0.5 * I_c(x + 1, y) - 0.5 * I_c(x - 1, y)`

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use rayon::prelude::*;
use serde::Deserialize;

use crate::error::*;
use crate::image::Image;

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// How samples outside the image are read by the kernel.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BorderMode {
    /// Outside samples are zero.
    Zero,

    /// Outside samples repeat the nearest column.
    Replicate
}

impl Default for BorderMode {
    fn default() -> Self {
        BorderMode::Zero
    }
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Compute the horizontal gradient of every band of `image`.
pub fn horizontal_gradient(image: &Image, border: BorderMode) -> Result<Image> {
    image.ensure_not_empty()?;

    let width = image.width();
    let bands = image.bands();
    let mut out = Image::new(width, image.height(), bands);
    let row_len = out.row_len();

    out.as_mut_slice()
        .par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, row)| {
            let src = image.row(y);
            let sample = |x: isize, b: usize| -> f64 {
                if x < 0 || x >= width as isize {
                    match border {
                        BorderMode::Zero => 0.0,
                        BorderMode::Replicate => {
                            let xc = x.max(0).min(width as isize - 1) as usize;
                            src[xc * bands + b]
                        }
                    }
                }
                else {
                    src[x as usize * bands + b]
                }
            };

            for x in 0..width {
                let xi = x as isize;
                for b in 0..bands {
                    row[x * bands + b] = 0.5 * sample(xi + 1, b) - 0.5 * sample(xi - 1, b);
                }
            }
        });

    Ok(out)
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
