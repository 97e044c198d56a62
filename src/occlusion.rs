//! # Occlusion detection and filling
//!
//! A left-reference disparity is kept when the right-reference map, read at the pixel it points
//! to, points back: `|Dr(x - d, y) + d| <= tolerance` with `d = Dl(x, y)`. Anything else,
//! including a lookup that leaves the image, is an occlusion.
//!
//! Occluded pixels sit on the near side of a depth step and are filled from the background:
//! the first consistent pixel found along each scan direction is a candidate, and the one on
//! the farther surface wins.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use image::GrayImage;
use log::{debug, warn};
use rayon::prelude::*;
use serde::Deserialize;

use crate::disparity::{DisparityMap, DisparityRange};
use crate::error::*;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

const ROW_DIRECTIONS: [(isize, isize); 2] = [(-1, 0), (1, 0)];

const WINDOW_DIRECTIONS: [(isize, isize); 8] = [
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (1, -1),
    (-1, 1),
    (1, 1)
];

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Binary consistency mask: 1 where the two maps agree, 0 where the pixel is occluded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OcclusionMask {
    width: usize,
    height: usize,
    data: Vec<u8>
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct FillParams {
    /// Furthest distance scanned from an occluded pixel, in pixels along each direction.
    pub radius: usize,
    pub neighbourhood: FillNeighbourhood
}

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// Directions scanned for fill candidates.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FillNeighbourhood {
    /// Left and right along the row.
    Row,

    /// The eight compass directions.
    Window
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl OcclusionMask {
    /// A mask with every pixel consistent.
    pub fn consistent(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![1; width * height]
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn is_consistent(&self, x: usize, y: usize) -> bool {
        self.get(x, y) == 1
    }

    pub fn set_occluded(&mut self, x: usize, y: usize) {
        self.data[y * self.width + x] = 0;
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn occluded_count(&self) -> usize {
        self.data.iter().filter(|&&v| v == 0).count()
    }

    /// Consistent pixels white, occluded pixels black.
    pub fn to_luma(&self) -> GrayImage {
        GrayImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            image::Luma([self.get(x as usize, y as usize) * 255])
        })
    }
}

impl Default for FillParams {
    fn default() -> Self {
        Self {
            radius: 9,
            neighbourhood: FillNeighbourhood::Row
        }
    }
}

impl FillParams {
    pub fn validate(&self) -> Result<()> {
        if self.radius == 0 {
            return Err(Error::param("fill_radius", "must be greater than zero"));
        }
        Ok(())
    }
}

impl FillNeighbourhood {
    fn directions(self) -> &'static [(isize, isize)] {
        match self {
            FillNeighbourhood::Row => &ROW_DIRECTIONS,
            FillNeighbourhood::Window => &WINDOW_DIRECTIONS
        }
    }
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Cross-check `direct` against `reverse`.
///
/// `direct` values outside the hypothesis range of its direction are occluded as well.
pub fn detect_occlusions(
    direct: &DisparityMap,
    reverse: &DisparityMap,
    range: &DisparityRange,
    tolerance: u32
) -> Result<OcclusionMask> {
    range.validate()?;
    direct.ensure_congruent(reverse)?;
    direct.ensure_not_empty()?;

    let width = direct.width();
    let direction = direct.direction();
    let mut mask = OcclusionMask::consistent(width, direct.height());

    mask.data
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            let back = reverse.row(y);
            for (x, m) in row.iter_mut().enumerate() {
                let d = direct.get(x, y);
                let xr = x as i64 - d as i64;

                let consistent = direction.admits(range, d)
                    && xr >= 0
                    && xr < width as i64
                    && (back[xr as usize] as i64 + d as i64).abs() <= tolerance as i64;

                *m = consistent as u8;
            }
        });

    debug!(
        "Consistency check: {} of {} pixels occluded",
        mask.occluded_count(),
        mask.data.len()
    );

    Ok(mask)
}

/// Replace every occluded pixel of `map` with the background value among its nearest
/// consistent neighbours. Pixels with no consistent neighbour within the radius keep their
/// value.
pub fn fill_occlusions(
    map: &DisparityMap,
    mask: &OcclusionMask,
    params: &FillParams
) -> Result<DisparityMap> {
    params.validate()?;
    if mask.width != map.width() || mask.height != map.height() {
        return Err(Error::ExtentMismatch {
            left_width: map.width(),
            left_height: map.height(),
            right_width: mask.width,
            right_height: mask.height
        });
    }
    map.ensure_not_empty()?;

    if mask.occluded_count() == mask.data.len() {
        warn!("No consistent pixel to fill occlusions from");
    }

    let width = map.width();
    let height = map.height() as isize;
    let direction = map.direction();
    let directions = params.neighbourhood.directions();
    let mut data = map.as_slice().to_vec();

    data.par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                if mask.is_consistent(x, y) {
                    continue;
                }

                let mut fill: Option<i32> = None;
                for &(dx, dy) in directions {
                    let (mut cx, mut cy) = (x as isize, y as isize);
                    for _ in 0..params.radius {
                        cx += dx;
                        cy += dy;
                        if cx < 0 || cy < 0 || cx >= width as isize || cy >= height {
                            break;
                        }
                        if mask.is_consistent(cx as usize, cy as usize) {
                            let candidate = map.get(cx as usize, cy as usize);
                            fill = Some(match fill {
                                Some(f) => direction.background(f, candidate),
                                None => candidate
                            });
                            break;
                        }
                    }
                }

                if let Some(f) = fill {
                    *out = f;
                }
            }
        });

    DisparityMap::from_vec(width, map.height(), direction, data)
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
