//! Hit-testing predicates for elements.
//!
//! Rotated rectangles and ellipses are tested against their unrotated box.
//! Degenerate shapes (zero-size boxes, zero-length segments) never hit.

use crate::elements::{Element, ElementId, ElementKind};
use kurbo::{Point, Rect, Vec2};

const EPSILON: f64 = 1e-9;

/// Distance from a point to segment `a-b`, or `None` for a zero-length segment.
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> Option<f64> {
    let seg = b - a;
    let len_sq = seg.hypot2();
    if len_sq < EPSILON {
        return None;
    }
    let t = ((point - a).dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = a + seg * t;
    Some(point.distance(proj))
}

/// Minimum distance from a point to a polyline, skipping zero-length pairs.
pub fn point_to_polyline_dist(point: Point, points: &[Point]) -> Option<f64> {
    points
        .windows(2)
        .filter_map(|w| point_to_segment_dist(point, w[0], w[1]))
        .reduce(f64::min)
}

/// Whether `point` lies within `tolerance` of the element's outline.
///
/// Filled rectangles and ellipses also hit anywhere inside.
pub fn is_near(point: Point, element: &Element, tolerance: f64) -> bool {
    if !element.is_live() {
        return false;
    }
    let filled = !element.style.fill_color.is_transparent();
    match &element.kind {
        ElementKind::Rectangle => rect_edge_hit(point, element.bounds(), tolerance, filled),
        ElementKind::Ellipse => ellipse_edge_hit(point, element.bounds(), tolerance, filled),
        ElementKind::Line | ElementKind::Arrow => {
            let (start, end) = element.endpoints();
            point_to_segment_dist(point, start, end).is_some_and(|d| d <= tolerance)
        }
        ElementKind::Freehand { points } => {
            point_to_polyline_dist(point, points).is_some_and(|d| d <= tolerance)
        }
        ElementKind::Text { text, .. } => {
            !text.is_empty() && element.bounds().inflate(tolerance, tolerance).contains(point)
        }
        ElementKind::Eraser { .. } => false,
    }
}

/// Zero-tolerance hit used for click selection.
///
/// Closed shapes and text hit anywhere in their area; strokes hit within
/// half their stroke width.
pub fn is_inside(point: Point, element: &Element) -> bool {
    if !element.is_live() {
        return false;
    }
    match &element.kind {
        ElementKind::Rectangle => {
            let bounds = element.bounds();
            !is_degenerate_box(bounds) && bounds.contains(point)
        }
        ElementKind::Ellipse => ellipse_value(point, element.bounds()).is_some_and(|v| v <= 1.0),
        ElementKind::Line | ElementKind::Arrow | ElementKind::Freehand { .. } => {
            is_near(point, element, element.style.stroke_width / 2.0)
        }
        ElementKind::Text { .. } => is_near(point, element, 0.0),
        ElementKind::Eraser { .. } => false,
    }
}

/// Topmost live element whose area contains `point`.
pub fn hit_test_top<'a>(
    elements_top_down: impl IntoIterator<Item = &'a Element>,
    point: Point,
) -> Option<ElementId> {
    elements_top_down
        .into_iter()
        .find(|element| is_inside(point, element))
        .map(|element| element.id)
}

/// Rotate `v` by `degrees`.
pub fn rotate_vec(v: Vec2, degrees: f64) -> Vec2 {
    let (sin, cos) = degrees.to_radians().sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// Rotate `point` about `center` by `degrees`.
pub fn rotate_about(point: Point, center: Point, degrees: f64) -> Point {
    center + rotate_vec(point - center, degrees)
}

fn is_degenerate_box(rect: Rect) -> bool {
    rect.width() < EPSILON && rect.height() < EPSILON
}

fn rect_edge_hit(point: Point, rect: Rect, tolerance: f64, filled: bool) -> bool {
    if is_degenerate_box(rect) {
        return false;
    }
    let outer = rect.inflate(tolerance, tolerance);
    if !outer.contains(point) {
        return false;
    }
    if filled {
        return true;
    }
    let inner = rect.inflate(-tolerance, -tolerance);
    inner.width() <= 0.0 || inner.height() <= 0.0 || !strictly_contains(inner, point)
}

fn strictly_contains(rect: Rect, point: Point) -> bool {
    point.x > rect.x0 && point.x < rect.x1 && point.y > rect.y0 && point.y < rect.y1
}

/// Normalized ellipse equation value for the ellipse inscribed in `rect`.
fn ellipse_value(point: Point, rect: Rect) -> Option<f64> {
    let rx = rect.width() / 2.0;
    let ry = rect.height() / 2.0;
    if rx < EPSILON || ry < EPSILON {
        return None;
    }
    let c = rect.center();
    let dx = (point.x - c.x) / rx;
    let dy = (point.y - c.y) / ry;
    Some(dx * dx + dy * dy)
}

fn ellipse_edge_hit(point: Point, rect: Rect, tolerance: f64, filled: bool) -> bool {
    if ellipse_value(point, rect).is_none() {
        return false;
    }
    let Some(outer) = ellipse_value(point, rect.inflate(tolerance, tolerance)) else {
        return false;
    };
    if outer > 1.0 {
        return false;
    }
    if filled {
        return true;
    }
    match ellipse_value(point, rect.inflate(-tolerance, -tolerance)) {
        Some(inner) => inner >= 1.0,
        // Inner ellipse vanished: the whole shape is within tolerance.
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{ElementStyle, Rgba};

    fn style() -> ElementStyle {
        ElementStyle::default()
    }

    #[test]
    fn test_segment_distance() {
        let d = point_to_segment_dist(Point::new(5.0, 3.0), Point::ZERO, Point::new(10.0, 0.0));
        assert!((d.unwrap() - 3.0).abs() < 1e-9);
        let beyond = point_to_segment_dist(Point::new(13.0, 4.0), Point::ZERO, Point::new(10.0, 0.0));
        assert!((beyond.unwrap() - 5.0).abs() < 1e-9);
        assert!(point_to_segment_dist(Point::new(1.0, 1.0), Point::ZERO, Point::ZERO).is_none());
    }

    #[test]
    fn test_rectangle_edge() {
        let rect = Element::rectangle(Rect::new(0.0, 0.0, 100.0, 50.0), style());
        assert!(is_near(Point::new(50.0, 2.0), &rect, 5.0));
        assert!(is_near(Point::new(-4.0, 25.0), &rect, 5.0));
        assert!(!is_near(Point::new(50.0, 25.0), &rect, 5.0));
        assert!(!is_near(Point::new(120.0, 25.0), &rect, 5.0));
    }

    #[test]
    fn test_filled_rectangle_hits_inside() {
        let mut filled = style();
        filled.fill_color = Rgba::new(255, 0, 0, 255);
        let rect = Element::rectangle(Rect::new(0.0, 0.0, 100.0, 50.0), filled);
        assert!(is_near(Point::new(50.0, 25.0), &rect, 5.0));
    }

    #[test]
    fn test_negative_size_rectangle() {
        let rect = Element::new(ElementKind::Rectangle, Point::new(100.0, 100.0), style())
            .with_size(-50.0, -50.0);
        assert!(is_inside(Point::new(75.0, 75.0), &rect));
        assert!(is_near(Point::new(50.0, 75.0), &rect, 1.0));
    }

    #[test]
    fn test_ellipse() {
        let ellipse = Element::ellipse(Rect::new(0.0, 0.0, 100.0, 50.0), style());
        assert!(is_near(Point::new(100.0, 25.0), &ellipse, 2.0));
        assert!(!is_near(Point::new(50.0, 25.0), &ellipse, 2.0));
        assert!(is_inside(Point::new(50.0, 25.0), &ellipse));
        // Corner of the box is outside the ellipse
        assert!(!is_inside(Point::new(2.0, 2.0), &ellipse));
    }

    #[test]
    fn test_degenerate_shapes_never_hit() {
        let ellipse = Element::ellipse(Rect::new(10.0, 10.0, 10.0, 40.0), style());
        assert!(!is_near(Point::new(10.0, 20.0), &ellipse, 5.0));
        assert!(!is_inside(Point::new(10.0, 20.0), &ellipse));

        let rect = Element::rectangle(Rect::new(10.0, 10.0, 10.0, 10.0), style());
        assert!(!is_near(Point::new(10.0, 10.0), &rect, 5.0));

        let line = Element::line(Point::new(3.0, 3.0), Point::new(3.0, 3.0), style());
        assert!(!is_near(Point::new(3.0, 3.0), &line, 5.0));

        let dot = Element::freehand(vec![Point::new(1.0, 1.0)], style());
        assert!(!is_near(Point::new(1.0, 1.0), &dot, 5.0));
    }

    #[test]
    fn test_line_and_freehand() {
        let line = Element::arrow(Point::ZERO, Point::new(100.0, 100.0), style());
        assert!(is_near(Point::new(50.0, 52.0), &line, 3.0));
        assert!(!is_near(Point::new(50.0, 60.0), &line, 3.0));
        assert!(is_inside(Point::new(50.5, 50.0), &line));

        let stroke = Element::freehand(
            vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0)],
            style(),
        );
        assert!(is_near(Point::new(12.0, 5.0), &stroke, 3.0));
        assert!(!is_near(Point::new(5.0, 5.0), &stroke, 3.0));
    }

    #[test]
    fn test_tombstoned_and_trail_skipped() {
        let mut rect = Element::rectangle(Rect::new(0.0, 0.0, 10.0, 10.0), style());
        rect.deleted = true;
        assert!(!is_inside(Point::new(5.0, 5.0), &rect));

        let trail = Element::new(
            ElementKind::Eraser { points: vec![Point::ZERO, Point::new(5.0, 5.0)] },
            Point::ZERO,
            style(),
        );
        assert!(!is_near(Point::new(2.0, 2.0), &trail, 10.0));
    }

    #[test]
    fn test_hit_test_top_prefers_topmost() {
        let bottom = Element::rectangle(Rect::new(0.0, 0.0, 100.0, 100.0), style());
        let top = Element::rectangle(Rect::new(50.0, 50.0, 150.0, 150.0), style());
        let order = [&top, &bottom];
        assert_eq!(hit_test_top(order, Point::new(75.0, 75.0)), Some(top.id));
        assert_eq!(hit_test_top(order, Point::new(10.0, 10.0)), Some(bottom.id));
        assert_eq!(hit_test_top(order, Point::new(500.0, 500.0)), None);
    }

    #[test]
    fn test_rotate_about() {
        let p = rotate_about(Point::new(10.0, 0.0), Point::ZERO, 90.0);
        assert!(p.x.abs() < 1e-9);
        assert!((p.y - 10.0).abs() < 1e-9);
    }
}
