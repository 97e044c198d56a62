//! Properties of the streaming winner-take-all search

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use cv_costvolume::cost::CostParams;
use cv_costvolume::gradient::{horizontal_gradient, BorderMode};
use cv_costvolume::prelude::*;
use cv_costvolume::search::{DisparitySearch, SearchParams, SearchPhase};

// -----------------------------------------------------------------------------------------------
// HELPERS
// -----------------------------------------------------------------------------------------------

fn params(min: i32, max: i32, radius: usize) -> SearchParams {
    SearchParams {
        range: DisparityRange::new(min, max),
        radius,
        epsilon: 1.0,
        cost: CostParams {
            alpha: 0.5,
            tau1: 10.0,
            tau2: 10.0
        }
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[test]
fn best_cost_never_increases() -> Result<()> {
    let left = Image::from_fn(20, 10, 3, |x, y, b| ((x * 13 + y * 7 + b * 5) % 17) as f64 * 6.0);
    let right = Image::from_fn(20, 10, 3, |x, y, b| ((x * 11 + y * 3 + b) % 19) as f64 * 5.0);
    let gl = horizontal_gradient(&left, BorderMode::Replicate)?;
    let gr = horizontal_gradient(&right, BorderMode::Replicate)?;

    for &direction in [Direction::LeftToRight, Direction::RightToLeft].iter() {
        let (reference, comparison, g_ref, g_cmp) = match direction {
            Direction::LeftToRight => (&left, &right, &gl, &gr),
            Direction::RightToLeft => (&right, &left, &gr, &gl)
        };
        let mut search =
            DisparitySearch::new(reference, comparison, g_ref, g_cmp, &params(-3, 5, 2), direction)?;

        let mut previous = search.state().best_cost().to_vec();
        while search.step()? != SearchPhase::Done {
            let current = search.state().best_cost();
            for (i, (c, p)) in current.iter().zip(&previous).enumerate() {
                assert!(c <= p, "{:?} pixel {} went from {} to {}", direction, i, p, c);
            }
            previous = current.to_vec();
        }

        assert_eq!(search.history().len(), 9);
        assert!(search.state().best_cost().iter().all(|c| c.is_finite()));
    }

    Ok(())
}

#[test]
fn ties_go_to_the_first_scanned_hypothesis() -> Result<()> {
    let flat = Image::filled(16, 4, 1, 5.0);
    let g = horizontal_gradient(&flat, BorderMode::Zero)?;
    let p = params(-1, 3, 1);

    let left = DisparitySearch::new(&flat, &flat, &g, &g, &p, Direction::LeftToRight)?.run()?;
    let right = DisparitySearch::new(&flat, &flat, &g, &g, &p, Direction::RightToLeft)?.run()?;

    // Every hypothesis costs exactly zero away from the borders.
    for y in 0..4 {
        assert_eq!(left.get(8, y), -1);
        assert_eq!(right.get(8, y), -3);
    }

    // Same inputs, same answer.
    let again = DisparitySearch::new(&flat, &flat, &g, &g, &p, Direction::LeftToRight)?.run()?;
    assert_eq!(left, again);

    Ok(())
}

#[test]
fn shifted_texture_is_found_in_both_directions() -> Result<()> {
    // Right view sees every column of the left view 3 pixels further left.
    let texture = |x: usize, y: usize| ((x * 7 + y * 5) % 13) as f64 * 10.0;
    let left = Image::from_fn(24, 6, 1, |x, y, _| texture(x + 10, y));
    let right = Image::from_fn(24, 6, 1, |x, y, _| texture(x + 13, y));
    let gl = horizontal_gradient(&left, BorderMode::Replicate)?;
    let gr = horizontal_gradient(&right, BorderMode::Replicate)?;

    let p = SearchParams {
        cost: CostParams {
            alpha: 1.0,
            tau1: 5.0,
            tau2: 5.0
        },
        ..params(0, 5, 1)
    };
    let dl = DisparitySearch::new(&left, &right, &gl, &gr, &p, Direction::LeftToRight)?.run()?;
    let dr = DisparitySearch::new(&right, &left, &gr, &gl, &p, Direction::RightToLeft)?.run()?;

    for y in 0..6 {
        for x in 6..18 {
            assert_eq!(dl.get(x, y), 3, "left at ({}, {})", x, y);
            assert_eq!(dr.get(x, y), -3, "right at ({}, {})", x, y);
        }
    }

    Ok(())
}
