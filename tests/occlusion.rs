//! Consistency checking and occlusion filling

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use cv_costvolume::occlusion::{detect_occlusions, fill_occlusions, FillNeighbourhood, FillParams};
use cv_costvolume::prelude::*;

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[test]
fn mutually_consistent_maps_have_no_occlusion() -> Result<()> {
    let (width, height) = (11usize, 7usize);
    let mut left = DisparityMap::new(width, height, Direction::LeftToRight);
    let mut right = DisparityMap::new(width, height, Direction::RightToLeft);

    // Each row is a different cyclic permutation, so every right column is hit exactly once.
    for y in 0..height {
        let shift = (3 * y + 1) % width;
        for x in 0..width {
            let target = (x + shift) % width;
            let d = x as i32 - target as i32;
            left.put(x, y, d);
            right.put(target, y, -d);
        }
    }

    let range = DisparityRange::new(-(width as i32 - 1), width as i32 - 1);
    for &t in [0, 1, 5].iter() {
        let mask = detect_occlusions(&left, &right, &range, t)?;
        assert_eq!(mask.occluded_count(), 0, "tolerance {}", t);
    }

    Ok(())
}

#[test]
fn occlusions_fill_from_the_background() -> Result<()> {
    // A foreground object at disparity 6 in front of a background at 1.
    let left = DisparityMap::from_vec(
        8,
        1,
        Direction::LeftToRight,
        vec![1, 1, 6, 6, 6, 0, 0, 1]
    )?;
    let right = DisparityMap::from_vec(
        8,
        1,
        Direction::RightToLeft,
        vec![-1, -1, -1, -1, -1, -1, -1, -1]
    )?;
    let range = DisparityRange::new(0, 6);

    let mask = detect_occlusions(&left, &right, &range, 0)?;
    assert_eq!(mask.as_slice(), &[0, 1, 0, 0, 0, 0, 0, 1]);

    let filled = fill_occlusions(&left, &mask, &FillParams::default())?;
    assert_eq!(filled.as_slice(), &[1, 1, 1, 1, 1, 1, 1, 1]);

    let window = FillParams {
        radius: 2,
        neighbourhood: FillNeighbourhood::Window
    };
    let near = fill_occlusions(&left, &mask, &window)?;
    // x = 4 sees no consistent pixel within two columns and keeps its value.
    assert_eq!(near.as_slice(), &[1, 1, 1, 1, 6, 1, 1, 1]);

    Ok(())
}

#[test]
fn mask_renders_as_luma() -> Result<()> {
    let left = DisparityMap::from_vec(3, 1, Direction::LeftToRight, vec![0, 0, 5])?;
    let right = DisparityMap::from_vec(3, 1, Direction::RightToLeft, vec![0, 0, 0])?;
    let mask = detect_occlusions(&left, &right, &DisparityRange::new(0, 5), 0)?;
    let luma = mask.to_luma();

    assert_eq!(luma.dimensions(), (3, 1));
    assert_eq!(luma.get_pixel(0, 0)[0], 255);
    assert_eq!(luma.get_pixel(2, 0)[0], 0);

    Ok(())
}

#[test]
fn mismatched_maps_are_rejected() {
    let left = DisparityMap::new(4, 4, Direction::LeftToRight);
    let right = DisparityMap::new(4, 3, Direction::RightToLeft);
    assert!(matches!(
        detect_occlusions(&left, &right, &DisparityRange::new(0, 2), 0),
        Err(Error::ExtentMismatch { .. })
    ));
}
