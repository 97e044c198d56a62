//! # Cost Volume Filter Disparity
//!
//! This crate provides dense disparity estimation for rectified stereo pairs with a cost volume
//! filter: a colour and gradient matching cost aggregated by a guided filter, a winner-take-all
//! search in both directions, consistency based occlusion detection and filling, and weighted
//! median refinement.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod cost;
pub mod cvf;
pub mod disparity;
mod error;
pub mod gradient;
pub mod guided;
pub mod image;
pub mod integral;
pub mod median;
pub mod metrics;
pub mod occlusion;
pub mod region;
pub mod search;

pub use crate::error::{Error, Result};

// -----------------------------------------------------------------------------------------------
// EXPORTS
// -----------------------------------------------------------------------------------------------

pub mod prelude {
    pub use crate::cvf::{CostVolumeFilter, CostVolumeOutput, Params};
    pub use crate::disparity::{
        Direction, DisparityAlgorithm, DisparityMap, DisparityRange, StereoPair
    };
    pub use crate::error::{Error, Result};
    pub use crate::image::Image;
    pub use crate::occlusion::OcclusionMask;
}
