//! Single-element selection with move, resize and rotate.

use crate::elements::{Element, ElementId, ElementKind};
use crate::geometry::{hit_test_top, is_inside, rotate_about, rotate_vec};
use crate::scene::SceneReader;
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Distance of the rotate handle above the top edge, in screen pixels.
pub const ROTATE_HANDLE_OFFSET: f64 = 25.0;
/// Rotation snapping increment in degrees.
pub const ROTATION_SNAP_DEGREES: f64 = 15.0;

const EPSILON: f64 = 1e-9;

/// Type of selection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandleKind {
    /// Endpoint handle for lines/arrows (0 = start, 1 = end).
    Endpoint(usize),
    /// Corner handle for boxes and freehand strokes.
    Corner(Corner),
    /// Edge midpoint handle for boxes.
    Edge(Edge),
    /// Rotation handle (positioned above the shape).
    Rotate,
}

/// Corner positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Edge positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Edge {
    Top,
    Right,
    Bottom,
    Left,
}

/// A selection handle with its position and type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Handle {
    /// Position in world coordinates.
    pub position: Point,
    pub kind: HandleKind,
}

impl Handle {
    pub fn new(position: Point, kind: HandleKind) -> Self {
        Self { position, kind }
    }

    /// Check if a world point hits this handle. `tolerance` is in world units.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        self.position.distance(point) <= tolerance
    }
}

/// Whether the element supports the rotate handle.
fn is_rotatable(element: &Element) -> bool {
    matches!(element.kind, ElementKind::Rectangle | ElementKind::Ellipse)
}

/// Handles for an element. `zoom` keeps the rotate handle a fixed screen distance away.
pub fn get_handles(element: &Element, zoom: f64) -> Vec<Handle> {
    match &element.kind {
        ElementKind::Line | ElementKind::Arrow => {
            let (start, end) = element.endpoints();
            vec![
                Handle::new(start, HandleKind::Endpoint(0)),
                Handle::new(end, HandleKind::Endpoint(1)),
            ]
        }
        ElementKind::Rectangle | ElementKind::Ellipse => {
            let bounds = element.bounds();
            let center = bounds.center();
            let mut handles = box_handles(bounds);
            handles.push(Handle::new(
                Point::new(center.x, bounds.y0 - ROTATE_HANDLE_OFFSET / zoom),
                HandleKind::Rotate,
            ));
            for handle in handles.iter_mut() {
                handle.position = rotate_about(handle.position, center, element.angle);
            }
            handles
        }
        ElementKind::Freehand { .. } => box_handles(element.bounds())
            .into_iter()
            .filter(|h| matches!(h.kind, HandleKind::Corner(_)))
            .collect(),
        // Text moves only; eraser trails are never selectable.
        ElementKind::Text { .. } | ElementKind::Eraser { .. } => Vec::new(),
    }
}

fn box_handles(bounds: Rect) -> Vec<Handle> {
    let center = bounds.center();
    vec![
        Handle::new(Point::new(bounds.x0, bounds.y0), HandleKind::Corner(Corner::TopLeft)),
        Handle::new(Point::new(bounds.x1, bounds.y0), HandleKind::Corner(Corner::TopRight)),
        Handle::new(Point::new(bounds.x0, bounds.y1), HandleKind::Corner(Corner::BottomLeft)),
        Handle::new(Point::new(bounds.x1, bounds.y1), HandleKind::Corner(Corner::BottomRight)),
        Handle::new(Point::new(center.x, bounds.y0), HandleKind::Edge(Edge::Top)),
        Handle::new(Point::new(bounds.x1, center.y), HandleKind::Edge(Edge::Right)),
        Handle::new(Point::new(center.x, bounds.y1), HandleKind::Edge(Edge::Bottom)),
        Handle::new(Point::new(bounds.x0, center.y), HandleKind::Edge(Edge::Left)),
    ]
}

/// Which box sides a handle drags: (left, right, top, bottom).
fn moving_sides(handle: HandleKind) -> (bool, bool, bool, bool) {
    match handle {
        HandleKind::Corner(Corner::TopLeft) => (true, false, true, false),
        HandleKind::Corner(Corner::TopRight) => (false, true, true, false),
        HandleKind::Corner(Corner::BottomLeft) => (true, false, false, true),
        HandleKind::Corner(Corner::BottomRight) => (false, true, false, true),
        HandleKind::Edge(Edge::Top) => (false, false, true, false),
        HandleKind::Edge(Edge::Right) => (false, true, false, false),
        HandleKind::Edge(Edge::Bottom) => (false, false, false, true),
        HandleKind::Edge(Edge::Left) => (true, false, false, false),
        HandleKind::Endpoint(_) | HandleKind::Rotate => (false, false, false, false),
    }
}

fn signum_or_one(value: f64) -> f64 {
    if value < 0.0 { -1.0 } else { 1.0 }
}

/// Resize an element by dragging `handle` from `start` to `current` (world points).
///
/// The drag delta is rotated into the element's local frame, so rotated boxes
/// resize along their own axes. Negative extents flip the origin; the result
/// always has non-negative width and height (lines keep their direction).
pub fn apply_resize(
    original: &Element,
    handle: HandleKind,
    start: Point,
    current: Point,
    keep_aspect_ratio: bool,
) -> Element {
    let mut element = original.clone();
    let delta = current - start;

    if let HandleKind::Endpoint(index) = handle {
        if index == 0 {
            element.x += delta.x;
            element.y += delta.y;
            element.width -= delta.x;
            element.height -= delta.y;
        } else {
            element.width += delta.x;
            element.height += delta.y;
        }
        return element;
    }

    let bounds = original.bounds();
    let angle = if is_rotatable(original) { original.angle } else { 0.0 };
    let center = bounds.center();
    let local = rotate_vec(delta, -angle);
    let (w0, h0) = (bounds.width(), bounds.height());
    let (mut left, mut top, mut right, mut bottom) = (-w0 / 2.0, -h0 / 2.0, w0 / 2.0, h0 / 2.0);

    let (moves_left, moves_right, moves_top, moves_bottom) = moving_sides(handle);
    if moves_left {
        left += local.x;
    }
    if moves_right {
        right += local.x;
    }
    if moves_top {
        top += local.y;
    }
    if moves_bottom {
        bottom += local.y;
    }

    let is_corner = matches!(handle, HandleKind::Corner(_));
    if keep_aspect_ratio && is_corner && w0 > EPSILON && h0 > EPSILON {
        let new_w = right - left;
        let new_h = bottom - top;
        let scale = (new_w / w0).abs().max((new_h / h0).abs());
        let locked_w = scale * w0 * signum_or_one(new_w);
        let locked_h = scale * h0 * signum_or_one(new_h);
        if moves_left {
            left = right - locked_w;
        } else {
            right = left + locked_w;
        }
        if moves_top {
            top = bottom - locked_h;
        } else {
            bottom = top + locked_h;
        }
    }

    let new_center = center + rotate_vec(Vec2::new((left + right) / 2.0, (top + bottom) / 2.0), angle);
    let width = (right - left).abs();
    let height = (bottom - top).abs();

    if let Some(points) = element.points_mut() {
        // Map points from the old box onto the (possibly mirrored) new box.
        let new_x0 = center.x + left;
        let new_y0 = center.y + top;
        let sx = if w0 > EPSILON { (right - left) / w0 } else { 1.0 };
        let sy = if h0 > EPSILON { (bottom - top) / h0 } else { 1.0 };
        for point in points.iter_mut() {
            point.x = new_x0 + (point.x - bounds.x0) * sx;
            point.y = new_y0 + (point.y - bounds.y0) * sy;
        }
        element.refresh_point_bounds();
        return element;
    }

    element.x = new_center.x - width / 2.0;
    element.y = new_center.y - height / 2.0;
    element.width = width;
    element.height = height;
    element
}

/// Rotate an element by the change in polar angle of the pointer about its center.
///
/// With `snap`, the result is rounded to 15° steps. The angle is normalized to [0, 360).
pub fn apply_rotation(original: &Element, start: Point, current: Point, snap: bool) -> Element {
    let mut element = original.clone();
    let center = original.center();
    let from = (start - center).atan2();
    let to = (current - center).atan2();
    let mut angle = original.angle + (to - from).to_degrees();
    if snap {
        angle = (angle / ROTATION_SNAP_DEGREES).round() * ROTATION_SNAP_DEGREES;
    }
    element.angle = normalize_degrees(angle);
    element
}

/// Translate an element by the drag delta.
pub fn apply_move(original: &Element, start: Point, current: Point) -> Element {
    let mut element = original.clone();
    element.translate(current - start);
    element
}

/// Normalize an angle in degrees to [0, 360).
pub fn normalize_degrees(angle: f64) -> f64 {
    let normalized = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if normalized >= 360.0 { 0.0 } else { normalized }
}

/// State for an in-progress move/resize/rotate of the selected element.
#[derive(Debug, Clone)]
pub struct ManipulationState {
    pub element_id: ElementId,
    /// `None` means the body is being dragged.
    pub handle: Option<HandleKind>,
    pub start_point: Point,
    pub current_point: Point,
    pub original: Element,
}

/// Tracks the selected element and any active transform.
#[derive(Debug, Clone, Default)]
pub struct SelectionController {
    selected: Option<ElementId>,
    manipulation: Option<ManipulationState>,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<ElementId> {
        self.selected
    }

    pub fn select(&mut self, id: ElementId) {
        self.selected = Some(id);
        self.manipulation = None;
    }

    pub fn clear(&mut self) {
        self.selected = None;
        self.manipulation = None;
    }

    pub fn is_manipulating(&self) -> bool {
        self.manipulation.is_some()
    }

    pub fn manipulation(&self) -> Option<&ManipulationState> {
        self.manipulation.as_ref()
    }

    /// Select the topmost element under `point`, or clear the selection.
    pub fn select_at(&mut self, scene: &impl SceneReader, point: Point) -> Option<ElementId> {
        let hit = hit_test_top(scene.all().into_iter().rev(), point);
        self.selected = hit;
        self.manipulation = None;
        hit
    }

    /// Handles of the current selection; empty when nothing is selected.
    pub fn handles(&self, scene: &impl SceneReader, zoom: f64) -> Vec<Handle> {
        self.selected_element(scene)
            .map(|element| get_handles(element, zoom))
            .unwrap_or_default()
    }

    /// Handle of the current selection under a world point.
    pub fn handle_at(
        &self,
        scene: &impl SceneReader,
        point: Point,
        zoom: f64,
        tolerance_px: f64,
    ) -> Option<HandleKind> {
        let tolerance = tolerance_px / zoom;
        self.handles(scene, zoom)
            .into_iter()
            .find(|h| h.hit_test(point, tolerance))
            .map(|h| h.kind)
    }

    fn selected_element<'a>(&self, scene: &'a impl SceneReader) -> Option<&'a Element> {
        self.selected
            .and_then(|id| scene.get(id))
            .filter(|element| element.is_live())
    }

    /// Start a transform of the selected element if `point` is on a handle or its body.
    ///
    /// Returns false when the point misses the selection.
    pub fn begin(
        &mut self,
        scene: &impl SceneReader,
        point: Point,
        zoom: f64,
        tolerance_px: f64,
    ) -> bool {
        let handle = self.handle_at(scene, point, zoom, tolerance_px);
        let Some(element) = self.selected_element(scene) else {
            return false;
        };
        if handle.is_none() && !is_inside(point, element) {
            return false;
        }
        self.manipulation = Some(ManipulationState {
            element_id: element.id,
            handle,
            start_point: point,
            current_point: point,
            original: element.clone(),
        });
        true
    }

    /// Update the active transform. `constrain` locks aspect ratio on resize
    /// and snaps rotation.
    pub fn drag(&mut self, point: Point, constrain: bool) -> Option<Element> {
        let state = self.manipulation.as_mut()?;
        state.current_point = point;
        let element = match state.handle {
            None => apply_move(&state.original, state.start_point, point),
            Some(HandleKind::Rotate) => {
                apply_rotation(&state.original, state.start_point, point, constrain)
            }
            Some(handle) => apply_resize(&state.original, handle, state.start_point, point, constrain),
        };
        Some(element)
    }

    /// Finish the transform and hand back its state.
    pub fn finish(&mut self) -> Option<ManipulationState> {
        self.manipulation.take()
    }
}
