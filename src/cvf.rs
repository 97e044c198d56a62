//! # Cost volume filter
//!
//! The full disparity pipeline: horizontal gradients, a guided-filter aggregated winner-take-all
//! search run in both directions, a left/right consistency check, background filling of the
//! occluded pixels and a final weighted median. The cost volume itself is never stored, each
//! hypothesis is built, aggregated and folded into the running best before the next.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::path::Path;
use std::time::Instant;

use log::{debug, info};
use serde::Deserialize;

use crate::cost::CostParams;
use crate::disparity::{Direction, DisparityAlgorithm, DisparityMap, DisparityRange, StereoPair};
use crate::error::*;
use crate::gradient::{horizontal_gradient, BorderMode};
use crate::image::Image;
use crate::median::{median_filter, weighted_median, WeightKernel, WeightedMedianParams};
use crate::occlusion::{
    detect_occlusions, fill_occlusions, FillNeighbourhood, FillParams, OcclusionMask
};
use crate::search::{DisparitySearch, SearchParams};

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

pub struct CostVolumeFilter {
    params: Params
}

/// Pipeline configuration. Every field is optional in a TOML document, missing ones take the
/// [`Default`] value.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Params {
    pub min_disparity: i32,
    pub max_disparity: i32,

    /// Guided filter window radius.
    pub radius: usize,

    pub alpha: f64,
    pub tau1: f64,
    pub tau2: f64,

    /// Guided filter regulariser, in squared intensity units.
    pub epsilon: f64,

    /// Largest accepted `|Dr(x - d) + d|` of a consistent pixel.
    pub tolerance: u32,

    pub median_radius: usize,
    pub gamma_color: f64,
    pub gamma_space: f64,
    pub weight_kernel: WeightKernel,

    pub fill_radius: usize,
    pub fill_neighbourhood: FillNeighbourhood,

    /// Radius of the median applied to the guides of the weighted median, 0 disables it.
    pub guide_median_radius: usize,

    /// Refine both direction maps before the consistency check.
    pub refine_directional: bool,

    /// Refine the filled map.
    pub refine_output: bool,

    pub gradient_border: BorderMode
}

/// Every product of one pipeline run.
#[derive(Clone, Debug)]
pub struct CostVolumeOutput {
    /// Left-reference map as it entered the consistency check.
    pub left: DisparityMap,

    /// Right-reference map as it entered the consistency check.
    pub right: DisparityMap,

    pub occlusion: OcclusionMask,
    pub filled: DisparityMap,

    /// Final map, equal to `filled` when output refinement is off.
    pub refined: DisparityMap
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        let wm = WeightedMedianParams::default();
        let fill = FillParams::default();

        Self {
            min_disparity: -15,
            max_disparity: 0,
            radius: 9,
            alpha: 0.9,
            tau1: 7.0,
            tau2: 2.0,
            epsilon: 1e-4 * 255.0 * 255.0,
            tolerance: 1,
            median_radius: wm.radius,
            gamma_color: wm.gamma_color,
            gamma_space: wm.gamma_space,
            weight_kernel: wm.kernel,
            fill_radius: fill.radius,
            fill_neighbourhood: fill.neighbourhood,
            guide_median_radius: 1,
            refine_directional: true,
            refine_output: true,
            gradient_border: BorderMode::Zero
        }
    }
}

impl Params {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let params: Params = toml::from_str(s)?;
        params.validate()?;
        Ok(params)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    /// Check every parameter before any pixel is touched.
    pub fn validate(&self) -> Result<()> {
        self.search_params().validate()?;
        if self.radius == 0 {
            return Err(Error::param("radius", "must be greater than zero"));
        }
        if self.median_radius == 0 {
            return Err(Error::param("median_radius", "must be greater than zero"));
        }
        self.median_params().validate()?;
        self.fill_params().validate()?;
        Ok(())
    }

    pub fn range(&self) -> DisparityRange {
        DisparityRange::new(self.min_disparity, self.max_disparity)
    }

    pub fn cost_params(&self) -> CostParams {
        CostParams {
            alpha: self.alpha,
            tau1: self.tau1,
            tau2: self.tau2
        }
    }

    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            range: self.range(),
            radius: self.radius,
            epsilon: self.epsilon,
            cost: self.cost_params()
        }
    }

    pub fn median_params(&self) -> WeightedMedianParams {
        WeightedMedianParams {
            radius: self.median_radius,
            gamma_color: self.gamma_color,
            gamma_space: self.gamma_space,
            kernel: self.weight_kernel
        }
    }

    pub fn fill_params(&self) -> FillParams {
        FillParams {
            radius: self.fill_radius,
            neighbourhood: self.fill_neighbourhood
        }
    }
}

impl CostVolumeFilter {
    /// Create a new instance of the algorithm with the given parameters.
    pub fn new(params: Params) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Run the whole pipeline and keep every intermediate map.
    pub fn compute_all(&self, pair: &StereoPair) -> Result<CostVolumeOutput> {
        let p = &self.params;
        let start = Instant::now();

        info!(
            "Cost volume filter on {}x{}x{}, disparities {}..={}",
            pair.width(),
            pair.height(),
            pair.bands(),
            p.min_disparity,
            p.max_disparity
        );

        let grad_left = horizontal_gradient(pair.left(), p.gradient_border)?;
        let grad_right = horizontal_gradient(pair.right(), p.gradient_border)?;

        let search_params = p.search_params();
        let (left, right) = rayon::join(
            || {
                DisparitySearch::new(
                    pair.left(),
                    pair.right(),
                    &grad_left,
                    &grad_right,
                    &search_params,
                    Direction::LeftToRight
                )?
                .run()
            },
            || {
                DisparitySearch::new(
                    pair.right(),
                    pair.left(),
                    &grad_right,
                    &grad_left,
                    &search_params,
                    Direction::RightToLeft
                )?
                .run()
            }
        );
        let (mut left, mut right) = (left?, right?);
        debug!("Search of both directions done in {:?}", start.elapsed());

        let guide_left = self.guide(pair.left())?;

        if p.refine_directional {
            let t = Instant::now();
            let guide_right = self.guide(pair.right())?;
            let wm = p.median_params();
            let (l, r) = rayon::join(
                || weighted_median(&left, &guide_left, &wm),
                || weighted_median(&right, &guide_right, &wm)
            );
            left = l?;
            right = r?;
            debug!("Directional refinement done in {:?}", t.elapsed());
        }

        let t = Instant::now();
        let occlusion = detect_occlusions(&left, &right, &p.range(), p.tolerance)?;
        let filled = fill_occlusions(&left, &occlusion, &p.fill_params())?;
        debug!(
            "Occlusion handling done in {:?}, {} pixels filled",
            t.elapsed(),
            occlusion.occluded_count()
        );

        let refined = if p.refine_output {
            let t = Instant::now();
            let r = weighted_median(&filled, &guide_left, &p.median_params())?;
            debug!("Output refinement done in {:?}", t.elapsed());
            r
        }
        else {
            filled.clone()
        };

        info!("Cost volume filter finished in {:?}", start.elapsed());

        Ok(CostVolumeOutput {
            left,
            right,
            occlusion,
            filled,
            refined
        })
    }

    /// Weighted median guide for `view`.
    fn guide(&self, view: &Image) -> Result<Image> {
        match self.params.guide_median_radius {
            0 => Ok(view.clone()),
            r => median_filter(view, r)
        }
    }
}

impl DisparityAlgorithm for CostVolumeFilter {
    /// Compute the refined left-reference disparity map of the given pair.
    fn compute(&mut self, pair: &StereoPair) -> Result<DisparityMap> {
        Ok(self.compute_all(pair)?.refined)
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let p = Params::default();
        assert!(p.validate().is_ok());
        assert_eq!(p.range().len(), 16);
        assert_eq!(p.fill_params(), FillParams::default());
    }

    #[test]
    fn zero_radii_are_rejected() {
        let p = Params {
            radius: 0,
            ..Default::default()
        };
        assert!(matches!(p.validate(), Err(Error::InvalidParam { name: "radius", .. })));

        let p = Params {
            median_radius: 0,
            ..Default::default()
        };
        assert!(matches!(
            p.validate(),
            Err(Error::InvalidParam { name: "median_radius", .. })
        ));

        let p = Params {
            fill_radius: 0,
            ..Default::default()
        };
        assert!(matches!(
            p.validate(),
            Err(Error::InvalidParam { name: "fill_radius", .. })
        ));
    }

    #[test]
    fn toml_overrides_defaults() {
        let p = Params::from_toml_str(
            r#"
            min_disparity = -4
            max_disparity = 4
            weight_kernel = "color_only"
            fill_neighbourhood = "window"
            gradient_border = "replicate"
            refine_output = false
            "#
        )
        .unwrap();

        assert_eq!(p.range(), DisparityRange::new(-4, 4));
        assert_eq!(p.weight_kernel, WeightKernel::ColorOnly);
        assert_eq!(p.fill_neighbourhood, FillNeighbourhood::Window);
        assert_eq!(p.gradient_border, BorderMode::Replicate);
        assert!(!p.refine_output);
        assert_eq!(p.radius, 9);
    }

    #[test]
    fn toml_errors_surface() {
        assert!(matches!(Params::from_toml_str("radius = \"nine\""), Err(Error::Config(_))));
        assert!(matches!(
            Params::from_toml_str("min_disparity = 3\nmax_disparity = 1"),
            Err(Error::InvalidRange { min: 3, max: 1 })
        ));
        assert!(matches!(
            Params::from_toml_file("/nonexistent/cvf.toml"),
            Err(Error::Io(_))
        ));
    }
}
