//! # Regions
//!
//! Rectangular sub-extents of an image. Window operators use [`Region::window`] to get the
//! part of a square neighbourhood that actually lies inside the image, so borders are handled
//! by truncation rather than padding.

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// A rectangle given by its top-left origin and its size, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Region {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self { x, y, width, height }
    }

    /// The square window of side `2 * radius + 1` centred on `(cx, cy)`, truncated to
    /// `bounds`.
    ///
    /// The centre must lie inside `bounds`, so the result always has at least one pixel.
    pub fn window(cx: usize, cy: usize, radius: usize, bounds: &Region) -> Self {
        let x0 = cx.saturating_sub(radius).max(bounds.x);
        let y0 = cy.saturating_sub(radius).max(bounds.y);
        let x1 = (cx + radius + 1).min(bounds.x_end());
        let y1 = (cy + radius + 1).min(bounds.y_end());

        Self {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0
        }
    }

    /// One past the last column.
    pub fn x_end(&self) -> usize {
        self.x + self.width
    }

    /// One past the last row.
    pub fn y_end(&self) -> usize {
        self.y + self.height
    }

    pub fn area(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }

    pub fn contains(&self, x: isize, y: isize) -> bool {
        x >= self.x as isize
            && y >= self.y as isize
            && x < self.x_end() as isize
            && y < self.y_end() as isize
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
