//! Fixed rich-menu layouts.
//!
//! Each supported action count maps to one hand-picked tiling of the canvas.
//! The tilings are data, not computed, so that every count renders the same
//! way everywhere the menu is drawn.

use crate::{Action, Error, Result, CANVAS_HEIGHT, CANVAS_WIDTH};
use serde::Serialize;

/// A tappable area in canvas pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// True when the two rectangles share interior pixels (touching edges do not count).
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.right() && other.x < self.right() && self.y < other.bottom() && other.y < self.bottom()
    }
}

pub const MAX_ACTIONS: usize = 6;

const HALF_W: u32 = CANVAS_WIDTH / 2;
const HALF_H: u32 = CANVAS_HEIGHT / 2;
// Thirds: 533 + 533 + 534. The two-thirds split of layout 3 shares the 1066 boundary.
const THIRD_W: u32 = CANVAS_WIDTH / 3;
const TWO_THIRDS_W: u32 = THIRD_W * 2;
const LAST_THIRD_W: u32 = CANVAS_WIDTH - TWO_THIRDS_W;

const LAYOUT_1: [Rect; 1] = [Rect::new(0, 0, CANVAS_WIDTH, CANVAS_HEIGHT)];

const LAYOUT_2: [Rect; 2] = [
    Rect::new(0, 0, HALF_W, CANVAS_HEIGHT),
    Rect::new(HALF_W, 0, CANVAS_WIDTH - HALF_W, CANVAS_HEIGHT),
];

const LAYOUT_3: [Rect; 3] = [
    Rect::new(0, 0, TWO_THIRDS_W, CANVAS_HEIGHT),
    Rect::new(TWO_THIRDS_W, 0, LAST_THIRD_W, HALF_H),
    Rect::new(TWO_THIRDS_W, HALF_H, LAST_THIRD_W, CANVAS_HEIGHT - HALF_H),
];

const LAYOUT_4: [Rect; 4] = [
    Rect::new(0, 0, HALF_W, HALF_H),
    Rect::new(HALF_W, 0, CANVAS_WIDTH - HALF_W, HALF_H),
    Rect::new(0, HALF_H, HALF_W, CANVAS_HEIGHT - HALF_H),
    Rect::new(HALF_W, HALF_H, CANVAS_WIDTH - HALF_W, CANVAS_HEIGHT - HALF_H),
];

const LAYOUT_5: [Rect; 5] = [
    Rect::new(0, 0, HALF_W, HALF_H),
    Rect::new(HALF_W, 0, CANVAS_WIDTH - HALF_W, HALF_H),
    Rect::new(0, HALF_H, THIRD_W, CANVAS_HEIGHT - HALF_H),
    Rect::new(THIRD_W, HALF_H, THIRD_W, CANVAS_HEIGHT - HALF_H),
    Rect::new(TWO_THIRDS_W, HALF_H, LAST_THIRD_W, CANVAS_HEIGHT - HALF_H),
];

const LAYOUT_6: [Rect; 6] = [
    Rect::new(0, 0, THIRD_W, HALF_H),
    Rect::new(THIRD_W, 0, THIRD_W, HALF_H),
    Rect::new(TWO_THIRDS_W, 0, LAST_THIRD_W, HALF_H),
    Rect::new(0, HALF_H, THIRD_W, CANVAS_HEIGHT - HALF_H),
    Rect::new(THIRD_W, HALF_H, THIRD_W, CANVAS_HEIGHT - HALF_H),
    Rect::new(TWO_THIRDS_W, HALF_H, LAST_THIRD_W, CANVAS_HEIGHT - HALF_H),
];

/// Indexed by `count - 1`.
static LAYOUTS: [&[Rect]; MAX_ACTIONS] = [&LAYOUT_1, &LAYOUT_2, &LAYOUT_3, &LAYOUT_4, &LAYOUT_5, &LAYOUT_6];

/// Borrow the fixed tiling for `count` actions.
pub fn layout_for(count: usize) -> Result<&'static [Rect]> {
    count
        .checked_sub(1)
        .and_then(|idx| LAYOUTS.get(idx))
        .copied()
        .ok_or(Error::InvalidActionCount(count))
}

/// Compute the tappable areas for `count` actions, in reading order.
///
/// The i-th rectangle belongs to the i-th action.
pub fn compute_areas(count: usize) -> Result<Vec<Rect>> {
    layout_for(count).map(<[Rect]>::to_vec)
}

/// Pair each action with its area positionally.
pub fn bind_areas(actions: &[Action]) -> Result<Vec<(Rect, &Action)>> {
    let areas = layout_for(actions.len())?;
    Ok(areas.iter().copied().zip(actions.iter()).collect())
}
