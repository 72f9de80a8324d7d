//! Hit-testing against rendered shapes: per-kind bounds, marquee selection and
//! point picking.
//!
//! All tests use axis-aligned bounds and ignore rotation. Callers pass the
//! reconciled shape list so that hits follow what the user actually sees.

#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use crate::consts::{DEFAULT_FONT_SIZE, TEXT_GLYPH_WIDTH, TEXT_LINE_HEIGHT};
use crate::doc::{Shape, ShapeId, ShapeKind};

/// A point in canvas (world) coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding box. `left <= right` and `top <= bottom` always hold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Bounds {
    /// Build bounds from two opposite corners given in any order, as produced by a
    /// marquee dragged in any direction.
    #[must_use]
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self { left: a.x.min(b.x), top: a.y.min(b.y), right: a.x.max(b.x), bottom: a.y.max(b.y) }
    }

    /// Separating-axis overlap test. Touching edges do not intersect.
    #[must_use]
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.left < other.right && self.right > other.left && self.top < other.bottom && self.bottom > other.top
    }

    /// Inclusive containment test.
    #[must_use]
    pub fn contains(&self, pt: Point) -> bool {
        pt.x >= self.left && pt.x <= self.right && pt.y >= self.top && pt.y <= self.bottom
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

/// Axis-aligned bounds of a shape according to its kind.
///
/// - rectangle: `x, y, width, height`
/// - circle: the square of side `2 * radius` centered on `x, y`
/// - line: the extent of its points offset by `x, y`
/// - text: `x, y` plus stored or estimated width and height
#[must_use]
pub fn shape_bounds(shape: &Shape) -> Bounds {
    match shape.kind {
        ShapeKind::Rectangle => {
            let w = shape.width.unwrap_or(0.0);
            let h = shape.height.unwrap_or(0.0);
            Bounds::from_corners(Point::new(shape.x, shape.y), Point::new(shape.x + w, shape.y + h))
        }
        ShapeKind::Circle => {
            let r = shape.radius.unwrap_or(0.0).abs();
            Bounds { left: shape.x - r, top: shape.y - r, right: shape.x + r, bottom: shape.y + r }
        }
        ShapeKind::Line => line_bounds(shape),
        ShapeKind::Text => {
            let (w, h) = text_extent(shape);
            Bounds { left: shape.x, top: shape.y, right: shape.x + w, bottom: shape.y + h }
        }
    }
}

fn line_bounds(shape: &Shape) -> Bounds {
    let points = shape.points.as_deref().unwrap_or(&[]);
    let mut bounds = Bounds { left: shape.x, top: shape.y, right: shape.x, bottom: shape.y };
    let mut first = true;
    for pair in points.chunks_exact(2) {
        let px = shape.x + pair[0];
        let py = shape.y + pair[1];
        if first {
            bounds = Bounds { left: px, top: py, right: px, bottom: py };
            first = false;
            continue;
        }
        bounds.left = bounds.left.min(px);
        bounds.top = bounds.top.min(py);
        bounds.right = bounds.right.max(px);
        bounds.bottom = bounds.bottom.max(py);
    }
    bounds
}

/// Width and height of a text block. Stored dimensions win; otherwise the height is
/// estimated from the font size and line count, and the width from the longest line.
#[allow(clippy::cast_precision_loss)]
fn text_extent(shape: &Shape) -> (f64, f64) {
    let font_size = shape.font_size.unwrap_or(DEFAULT_FONT_SIZE);
    let text = shape.text.as_deref().unwrap_or("");
    let lines = text.lines().count().max(1);
    let longest = text.lines().map(|l| l.chars().count()).max().unwrap_or(0);

    let width = shape
        .width
        .unwrap_or_else(|| longest as f64 * font_size * TEXT_GLYPH_WIDTH);
    let height = shape
        .height
        .unwrap_or_else(|| lines as f64 * font_size * TEXT_LINE_HEIGHT);
    (width, height)
}

/// Ids of every shape whose bounds intersect the marquee, in the input order.
#[must_use]
pub fn box_select(shapes: &[Shape], marquee: &Bounds) -> Vec<ShapeId> {
    shapes
        .iter()
        .filter(|shape| shape_bounds(shape).intersects(marquee))
        .map(|shape| shape.id.clone())
        .collect()
}

/// The front-most shape under `pt`. Ties on z-index go to the later shape in `shapes`,
/// which matches draw order when the list comes from the reconciler.
#[must_use]
pub fn hit_test(shapes: &[Shape], pt: Point) -> Option<&Shape> {
    shapes
        .iter()
        .filter(|shape| shape_bounds(shape).contains(pt))
        .max_by(|a, b| a.z_index.cmp(&b.z_index))
}
