//! # Disparity search
//!
//! Winner-take-all scan over the hypothesis range that never holds more than one cost map at a
//! time. For each hypothesis the matching cost is built, aggregated by the guided filter and
//! folded into a running best state:
//!
//! ```text
//! Initializing -> Scanning(d0) -> Scanning(d0 + 1) -> ... -> Done
//! ```
//!
//! A pixel takes hypothesis `d` only if its aggregated cost is strictly lower than the best so
//! far, so among equal costs the first scanned hypothesis wins and scan order is observable.
//!
//! The aggregator sees the padded cost map of each hypothesis. Pixels whose match falls outside
//! the comparison view are then scored [`OUT_OF_BOUNDS_COST`], so any in-bounds hypothesis beats
//! them.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::ops::{Range, RangeInclusive};

use log::debug;
use rayon::prelude::*;

use crate::cost::{CostParams, MatchingCost};
use crate::disparity::{Direction, DisparityMap, DisparityRange};
use crate::error::*;
use crate::guided::GuidedFilter;
use crate::image::Image;

#[cfg(feature = "statistics")]
use plotters::prelude::*;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Aggregated cost of a pixel whose match lies outside the comparison view.
pub const OUT_OF_BOUNDS_COST: f64 = f64::MAX;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// The per-direction part of the configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SearchParams {
    pub range: DisparityRange,
    pub radius: usize,
    pub epsilon: f64,
    pub cost: CostParams
}

/// Running best disparity and aggregated cost of every pixel.
#[derive(Clone, Debug)]
pub struct SearchState {
    width: usize,
    height: usize,
    best_disparity: Vec<i32>,
    best_cost: Vec<f64>
}

/// One direction of the search, advanced hypothesis by hypothesis.
pub struct DisparitySearch<'a> {
    direction: Direction,
    matching: MatchingCost<'a>,
    guided: GuidedFilter<'a>,
    hypotheses: RangeInclusive<i32>,
    phase: SearchPhase,
    state: SearchState,

    /// `(d, pixels improved by d)` for every scanned hypothesis.
    history: Vec<(i32, usize)>
}

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchPhase {
    /// State holds `(first hypothesis, +inf)` everywhere.
    Initializing,

    /// The given hypothesis was the last one folded in.
    Scanning(i32),

    /// Every hypothesis has been folded in.
    Done
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl SearchParams {
    pub fn validate(&self) -> Result<()> {
        self.range.validate()?;
        self.cost.validate()?;
        if !(self.epsilon > 0.0) {
            return Err(Error::param("epsilon", format!("{} is not positive", self.epsilon)));
        }
        Ok(())
    }
}

impl SearchState {
    fn new(width: usize, height: usize, start: i32) -> Self {
        Self {
            width,
            height,
            best_disparity: vec![start; width * height],
            best_cost: vec![f64::INFINITY; width * height]
        }
    }

    /// Fold the aggregated cost of hypothesis `d` in, returning how many pixels improved.
    /// Columns outside `valid` count as [`OUT_OF_BOUNDS_COST`].
    fn update(&mut self, d: i32, cost: &Image, valid: &Range<usize>) -> usize {
        let width = self.width;
        self.best_disparity
            .par_chunks_mut(width)
            .zip(self.best_cost.par_chunks_mut(width))
            .zip(cost.as_slice().par_chunks(width))
            .map(|((best_d, best_c), row)| {
                let mut improved = 0;
                let cells = best_d.iter_mut().zip(best_c.iter_mut()).zip(row);
                for (x, ((bd, bc), &c)) in cells.enumerate() {
                    let c = if valid.contains(&x) { c } else { OUT_OF_BOUNDS_COST };
                    if c < *bc {
                        *bd = d;
                        *bc = c;
                        improved += 1;
                    }
                }
                improved
            })
            .sum()
    }

    pub fn best_disparity(&self) -> &[i32] {
        &self.best_disparity
    }

    pub fn best_cost(&self) -> &[f64] {
        &self.best_cost
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }
}

impl<'a> DisparitySearch<'a> {
    /// Prepare the search of `direction`, with `reference` as the view whose pixels receive
    /// disparities and `comparison` as the view they are matched into.
    pub fn new(
        reference: &'a Image,
        comparison: &'a Image,
        reference_gradient: &'a Image,
        comparison_gradient: &'a Image,
        params: &SearchParams,
        direction: Direction
    ) -> Result<Self> {
        params.validate()?;

        let matching = MatchingCost::new(
            reference,
            comparison,
            reference_gradient,
            comparison_gradient,
            params.cost
        )?;
        let guided = GuidedFilter::new(reference, params.radius, params.epsilon)?;

        let hypotheses = direction.hypotheses(&params.range);
        let state = SearchState::new(reference.width(), reference.height(), *hypotheses.start());

        Ok(Self {
            direction,
            matching,
            guided,
            hypotheses,
            phase: SearchPhase::Initializing,
            state,
            history: Vec::with_capacity(params.range.len())
        })
    }

    pub fn phase(&self) -> SearchPhase {
        self.phase
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Per-hypothesis count of improved pixels, in scan order.
    pub fn history(&self) -> &[(i32, usize)] {
        &self.history
    }

    /// Fold in the next hypothesis and return the new phase.
    pub fn step(&mut self) -> Result<SearchPhase> {
        let next = match self.phase {
            SearchPhase::Initializing => *self.hypotheses.start(),
            SearchPhase::Scanning(d) if d < *self.hypotheses.end() => d + 1,
            SearchPhase::Scanning(_) | SearchPhase::Done => {
                self.phase = SearchPhase::Done;
                return Ok(self.phase);
            }
        };

        let valid = self.matching.valid_columns(next);
        let padded = self.matching.padded_cost_map(next);
        let aggregated = self.guided.filter(&padded)?;
        let improved = self.state.update(next, &aggregated, &valid);

        debug!("{:?} d = {}: {} pixels improved", self.direction, next, improved);

        self.history.push((next, improved));
        self.phase = SearchPhase::Scanning(next);
        Ok(self.phase)
    }

    /// Scan every remaining hypothesis and return the winner-take-all map.
    pub fn run(mut self) -> Result<DisparityMap> {
        while self.step()? != SearchPhase::Done {}
        self.into_map()
    }

    /// The current best disparities as a map.
    pub fn into_map(self) -> Result<DisparityMap> {
        DisparityMap::from_vec(
            self.state.width,
            self.state.height,
            self.direction,
            self.state.best_disparity
        )
    }

    /// Plot the improvement history of this search.
    #[cfg(feature = "statistics")]
    pub fn plot_history(&self, path: &str) {
        let max_improved = self.history.iter().map(|&(_, n)| n).max().unwrap_or(0) + 1;

        let area = BitMapBackend::new(path, (800, 600)).into_drawing_area();
        area.fill(&WHITE).unwrap();

        let mut chart = ChartBuilder::on(&area)
            .caption("Pixels improved per hypothesis", ("sans-serif", 20).into_font())
            .margin(5)
            .x_label_area_size(30)
            .y_label_area_size(30)
            .build_ranged(
                *self.hypotheses.start()..(*self.hypotheses.end() + 1),
                0..max_improved
            ).unwrap();

        chart.configure_mesh().draw().unwrap();

        chart
            .draw_series(LineSeries::new(self.history.clone(), &RED))
            .unwrap()
            .label("Improved pixels")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw().unwrap();
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gradient::{horizontal_gradient, BorderMode};

    fn params(min: i32, max: i32) -> SearchParams {
        SearchParams {
            range: DisparityRange::new(min, max),
            radius: 1,
            epsilon: 1e-2,
            cost: CostParams {
                alpha: 0.5,
                tau1: 10.0,
                tau2: 10.0
            }
        }
    }

    #[test]
    fn phases_walk_the_range_in_order() {
        let img = Image::from_fn(6, 4, 1, |x, y, _| ((x * 3 + y) % 5) as f64);
        let g = horizontal_gradient(&img, BorderMode::Zero).unwrap();
        let mut search =
            DisparitySearch::new(&img, &img, &g, &g, &params(-1, 1), Direction::RightToLeft)
                .unwrap();

        assert_eq!(search.phase(), SearchPhase::Initializing);
        assert!(search.state().best_cost().iter().all(|c| c.is_infinite()));
        assert!(search.state().best_disparity().iter().all(|&d| d == -1));

        assert_eq!(search.step().unwrap(), SearchPhase::Scanning(-1));
        assert_eq!(search.step().unwrap(), SearchPhase::Scanning(0));
        assert_eq!(search.step().unwrap(), SearchPhase::Scanning(1));
        assert_eq!(search.step().unwrap(), SearchPhase::Done);
        assert_eq!(search.step().unwrap(), SearchPhase::Done);
        assert_eq!(search.history().len(), 3);
        // The first hypothesis improves on +inf everywhere.
        assert_eq!(search.history()[0], (-1, 24));
    }

    #[test]
    fn identical_views_settle_on_zero() {
        let img = Image::from_fn(12, 5, 1, |x, y, _| ((x * 7 + y * 3) % 11) as f64 * 9.0);
        let g = horizontal_gradient(&img, BorderMode::Zero).unwrap();
        // Colour only with a low cap: every wrong hypothesis saturates to the same cost.
        let mut p = params(-2, 2);
        p.cost = CostParams {
            alpha: 1.0,
            tau1: 1.0,
            tau2: 1.0
        };
        let map = DisparitySearch::new(&img, &img, &g, &g, &p, Direction::LeftToRight)
            .unwrap()
            .run()
            .unwrap();
        assert!(map.as_slice().iter().all(|&d| d == 0));
        assert_eq!(map.direction(), Direction::LeftToRight);
    }

    #[test]
    fn matches_never_leave_the_comparison_view() {
        // The right view is the left one shifted by three, so d = 3 is cheap wherever it is in
        // bounds and the first three columns must settle for something smaller.
        let texture = |x: usize, y: usize| ((x * 37 + y * 91) % 29) as f64 * 8.0;
        let left = Image::from_fn(10, 6, 1, |x, y, _| texture(x, y));
        let right = Image::from_fn(10, 6, 1, |x, y, _| texture(x + 3, y));
        let gl = horizontal_gradient(&left, BorderMode::Zero).unwrap();
        let gr = horizontal_gradient(&right, BorderMode::Zero).unwrap();

        let mut search =
            DisparitySearch::new(&left, &right, &gl, &gr, &params(0, 4), Direction::LeftToRight)
                .unwrap();
        while search.step().unwrap() != SearchPhase::Done {}

        assert!(search.state().best_cost().iter().all(|&c| c < OUT_OF_BOUNDS_COST));
        let map = search.into_map().unwrap();
        for y in 0..6 {
            for x in 0..10 {
                assert!(map.get(x, y) <= x as i32, "{} at ({}, {})", map.get(x, y), x, y);
            }
        }
    }

    #[test]
    fn invalid_range_fails_before_any_work() {
        let img = Image::new(4, 4, 1);
        assert!(matches!(
            DisparitySearch::new(&img, &img, &img, &img, &params(3, 2), Direction::LeftToRight),
            Err(Error::InvalidRange { .. })
        ));
    }
}
