//! Frame renderer: background, grid, elements and selection chrome.

use crate::surface::Surface;
use inkroom_core::camera::{Camera, Transform};
use inkroom_core::config::EngineConfig;
use inkroom_core::drawing::TextOverlay;
use inkroom_core::elements::{Element, ElementId, ElementKind, StrokeStyle, TextAlign, TEXT_LINE_HEIGHT};
use inkroom_core::frame::RedrawFlag;
use inkroom_core::selection::{Handle, HandleKind};
use kurbo::{Affine, BezPath, Cap, Circle, Ellipse, Join, Line, Point, Rect, Shape, Stroke};
use peniko::{Color, Compose};
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Initialization failed: {0}")]
    InitFailed(String),
    #[error("Render failed: {0}")]
    RenderFailed(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

const DASH_PATTERN: [f64; 2] = [10.0, 5.0];
const DOT_PATTERN: [f64; 2] = [2.0, 4.0];
/// Half-width of the arrowhead wings.
const ARROWHEAD_ANGLE: f64 = std::f64::consts::PI / 6.0;
const HANDLE_SIZE: f64 = 8.0;
const CARET_WIDTH: f64 = 1.5;

/// Grid display style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GridStyle {
    /// Plain background.
    None,
    #[default]
    Lines,
    /// Only dots at intersections.
    Dots,
}

/// Context for a single render frame.
pub struct RenderContext<'a> {
    /// Live elements in paint order.
    pub elements: Vec<&'a Element>,
    pub camera: &'a Camera,
    pub background_color: Color,
    pub grid_style: GridStyle,
    /// Grid spacing at zoom 1.
    pub grid_size: f64,
    pub selection_color: Color,
    /// Selected element, outlined with a dashed box.
    pub selected: Option<&'a Element>,
    /// Selection handles in world coordinates.
    pub handles: &'a [Handle],
    /// Element hidden while its text is being edited.
    pub editing: Option<ElementId>,
    pub overlay: Option<&'a TextOverlay>,
    pub arrowhead_min_length: f64,
    pub arrowhead_size: f64,
}

impl<'a> RenderContext<'a> {
    pub fn new(elements: Vec<&'a Element>, camera: &'a Camera) -> Self {
        let defaults = EngineConfig::default();
        Self {
            elements,
            camera,
            background_color: Color::from_rgba8(255, 255, 255, 255),
            grid_style: GridStyle::Lines,
            grid_size: defaults.grid_size,
            selection_color: Color::from_rgba8(59, 130, 246, 255),
            selected: None,
            handles: &[],
            editing: None,
            overlay: None,
            arrowhead_min_length: defaults.arrowhead_min_length,
            arrowhead_size: defaults.arrowhead_size,
        }
    }

    /// Take grid and arrowhead sizes from `config`.
    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.grid_size = config.grid_size;
        self.arrowhead_min_length = config.arrowhead_min_length;
        self.arrowhead_size = config.arrowhead_size;
        self
    }

    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = color;
        self
    }

    pub fn with_grid(mut self, style: GridStyle) -> Self {
        self.grid_style = style;
        self
    }

    /// Set the selected element and its handles.
    pub fn with_selection(mut self, selected: Option<&'a Element>, handles: &'a [Handle]) -> Self {
        self.selected = selected;
        self.handles = handles;
        self
    }

    /// Show the text overlay and hide the element it edits.
    pub fn with_overlay(mut self, overlay: Option<&'a TextOverlay>) -> Self {
        self.overlay = overlay;
        self.editing = overlay.and_then(|o| o.editing);
        self
    }
}

/// Paints scene frames onto a [`Surface`] when the redraw flag is set.
pub struct Renderer<S: Surface> {
    surface: S,
    redraw: RedrawFlag,
    frames: u64,
}

impl<S: Surface> Renderer<S> {
    /// Fails if there is no surface to draw on.
    pub fn new(surface: Option<S>, redraw: RedrawFlag) -> RenderResult<Self> {
        let surface = surface.ok_or_else(|| RendererError::InitFailed("no drawing surface".into()))?;
        log::debug!("renderer initialized at {:?}", surface.size());
        Ok(Self {
            surface,
            redraw,
            frames: 0,
        })
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    /// Frames painted so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Paint a frame if one is pending. Returns whether anything was painted.
    pub fn render(&mut self, ctx: &RenderContext) -> RenderResult<bool> {
        if !self.redraw.take() {
            return Ok(false);
        }
        let size = self.surface.size();
        if !(size.width > 0.0 && size.height > 0.0) {
            self.redraw.mark();
            return Err(RendererError::RenderFailed(format!("empty viewport {size:?}")));
        }
        if !(ctx.camera.zoom.is_finite() && ctx.camera.zoom > 0.0) {
            self.redraw.mark();
            return Err(RendererError::RenderFailed(format!("invalid zoom {}", ctx.camera.zoom)));
        }

        self.surface.clear(ctx.background_color);
        self.render_grid(ctx);

        let transform = ctx.camera.transform();
        for element in &ctx.elements {
            if !element.is_live() || ctx.editing == Some(element.id) {
                continue;
            }
            self.render_element(element, transform, ctx);
        }

        if let Some(selected) = ctx.selected {
            self.render_selection_box(selected, transform, ctx.selection_color, ctx.camera.zoom);
        }
        for handle in ctx.handles {
            self.render_handle(handle, ctx);
        }
        if let Some(overlay) = ctx.overlay {
            self.render_overlay(overlay);
        }

        self.frames += 1;
        Ok(true)
    }

    /// Screen-space grid scrolled by the camera offset.
    fn render_grid(&mut self, ctx: &RenderContext) {
        if ctx.grid_style == GridStyle::None {
            return;
        }
        let step = ctx.grid_size * ctx.camera.zoom;
        if step < 2.0 {
            return;
        }
        let size = self.surface.size();
        let start_x = ctx.camera.offset.x.rem_euclid(step);
        let start_y = ctx.camera.offset.y.rem_euclid(step);
        let color = Color::from_rgba8(200, 200, 200, 100);

        let mut path = BezPath::new();
        match ctx.grid_style {
            GridStyle::Lines => {
                let mut x = start_x;
                while x <= size.width {
                    path.move_to((x, 0.0));
                    path.line_to((x, size.height));
                    x += step;
                }
                let mut y = start_y;
                while y <= size.height {
                    path.move_to((0.0, y));
                    path.line_to((size.width, y));
                    y += step;
                }
                self.surface.stroke(&Stroke::new(0.5), Affine::IDENTITY, color, &path);
            }
            GridStyle::Dots => {
                let mut x = start_x;
                while x <= size.width {
                    let mut y = start_y;
                    while y <= size.height {
                        path.extend(Circle::new((x, y), 1.0).path_elements(0.1));
                        y += step;
                    }
                    x += step;
                }
                self.surface.fill(Affine::IDENTITY, color, &path);
            }
            GridStyle::None => {}
        }
    }

    fn render_element(&mut self, element: &Element, transform: Affine, ctx: &RenderContext) {
        let style = &element.style;
        let stroke_color = style.stroke_color.to_peniko().multiply_alpha(style.opacity as f32);
        let fill_color = (!style.fill_color.is_transparent())
            .then(|| style.fill_color.to_peniko().multiply_alpha(style.opacity as f32));
        let stroke = stroke_for(style.stroke_width, style.stroke_style);

        match &element.kind {
            ElementKind::Rectangle | ElementKind::Ellipse => {
                let bounds = element.bounds();
                let local = Rect::from_center_size(Point::ZERO, bounds.size());
                let path = match element.kind {
                    ElementKind::Ellipse => Ellipse::from_rect(local).to_path(0.1),
                    _ => local.to_path(0.1),
                };
                let placed = transform
                    * Affine::translate(bounds.center().to_vec2())
                    * Affine::rotate(element.angle.to_radians());
                if let Some(fill) = fill_color {
                    self.surface.fill(placed, fill, &path);
                }
                self.surface.stroke(&stroke, placed, stroke_color, &path);
            }
            ElementKind::Line => {
                let (start, end) = element.endpoints();
                let path = Line::new(start, end).to_path(0.1);
                self.surface.stroke(&stroke, transform, stroke_color, &path);
            }
            ElementKind::Arrow => {
                let (start, end) = element.endpoints();
                let path = Line::new(start, end).to_path(0.1);
                self.surface.stroke(&stroke, transform, stroke_color, &path);
                if let Some(head) = arrowhead(start, end, ctx.arrowhead_min_length, ctx.arrowhead_size) {
                    let solid = stroke_for(style.stroke_width, StrokeStyle::Solid);
                    self.surface.fill(transform, stroke_color, &head);
                    self.surface.stroke(&solid, transform, stroke_color, &head);
                }
            }
            ElementKind::Freehand { points } => {
                let Some(path) = polyline(points) else {
                    return;
                };
                if let Some(fill) = fill_color {
                    self.surface.fill(transform, fill, &path);
                }
                self.surface.stroke(&stroke, transform, stroke_color, &path);
            }
            ElementKind::Eraser { points } => {
                let Some(path) = polyline(points) else {
                    return;
                };
                // Punches through everything painted so far.
                self.surface.push_compose(Compose::DestOut);
                self.surface.stroke(&stroke, transform, stroke_color, &path);
                self.surface.pop_compose();
            }
            ElementKind::Text {
                text,
                font_size,
                font_family,
                text_align,
            } => {
                self.render_text(element, text, *font_size, font_family, *text_align, stroke_color, transform);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn render_text(
        &mut self,
        element: &Element,
        text: &str,
        font_size: f64,
        font_family: &str,
        align: TextAlign,
        color: Color,
        transform: Affine,
    ) {
        let line_height = font_size * TEXT_LINE_HEIGHT;
        for (i, line) in text.split('\n').enumerate() {
            if line.is_empty() {
                continue;
            }
            let width = self.surface.measure_text(line, font_size, font_family).width;
            let x = match align {
                TextAlign::Left => element.x,
                TextAlign::Center => element.x - width / 2.0,
                TextAlign::Right => element.x - width,
            };
            let origin = Point::new(x, element.y + i as f64 * line_height);
            self.surface.draw_text(line, origin, font_size, font_family, color, transform);
        }
    }

    fn render_selection_box(&mut self, element: &Element, transform: Affine, color: Color, zoom: f64) {
        let bounds = element.bounds();
        let pad = 4.0 / zoom;
        let local = Rect::from_center_size(Point::ZERO, bounds.size()).inflate(pad, pad);
        let placed = transform
            * Affine::translate(bounds.center().to_vec2())
            * Affine::rotate(element.angle.to_radians());
        let dash = 4.0 / zoom;
        let stroke = Stroke::new(1.0 / zoom).with_dashes(0.0, [dash, dash]);
        self.surface.stroke(&stroke, placed, color, &local.to_path(0.1));
    }

    /// Handles are drawn at a fixed screen size.
    fn render_handle(&mut self, handle: &Handle, ctx: &RenderContext) {
        let center = ctx.camera.world_to_screen(handle.position);
        let white = Color::from_rgba8(255, 255, 255, 255);
        let path = match handle.kind {
            HandleKind::Rotate | HandleKind::Endpoint(_) => {
                Circle::new(center, HANDLE_SIZE / 2.0).to_path(0.1)
            }
            HandleKind::Corner(_) | HandleKind::Edge(_) => {
                Rect::from_center_size(center, (HANDLE_SIZE, HANDLE_SIZE)).to_path(0.1)
            }
        };
        self.surface.fill(Affine::IDENTITY, white, &path);
        self.surface.stroke(&Stroke::new(1.5), Affine::IDENTITY, ctx.selection_color, &path);
    }

    /// The open text input, in screen space, with a caret after the content.
    fn render_overlay(&mut self, overlay: &TextOverlay) {
        let size = overlay.screen_font_size;
        let color = Color::from_rgba8(30, 30, 30, 255);
        let line_height = size * TEXT_LINE_HEIGHT;
        let mut caret = overlay.screen_position;
        for (i, line) in overlay.content.split('\n').enumerate() {
            let origin = Point::new(
                overlay.screen_position.x,
                overlay.screen_position.y + i as f64 * line_height,
            );
            if !line.is_empty() {
                self.surface.draw_text(line, origin, size, "sans-serif", color, Affine::IDENTITY);
            }
            let width = self.surface.measure_text(line, size, "sans-serif").width;
            caret = Point::new(origin.x + width, origin.y);
        }
        let caret_line = Line::new(caret, (caret.x, caret.y + line_height)).to_path(0.1);
        let caret_color = Color::from_rgba8(100, 100, 100, 200);
        self.surface.stroke(&Stroke::new(CARET_WIDTH), Affine::IDENTITY, caret_color, &caret_line);
    }
}

/// Stroke with round caps and joins and the dash pattern for `style`.
pub fn stroke_for(width: f64, style: StrokeStyle) -> Stroke {
    let stroke = Stroke::new(width).with_caps(Cap::Round).with_join(Join::Round);
    match style {
        StrokeStyle::Solid => stroke,
        StrokeStyle::Dashed => stroke.with_dashes(0.0, DASH_PATTERN),
        StrokeStyle::Dotted => stroke.with_dashes(0.0, DOT_PATTERN),
    }
}

/// Closed triangle at `end`, or `None` for arrows shorter than `min_length`.
pub fn arrowhead(start: Point, end: Point, min_length: f64, size: f64) -> Option<BezPath> {
    if start.distance(end) < min_length {
        return None;
    }
    let angle = (end.y - start.y).atan2(end.x - start.x);
    let wing = |offset: f64| {
        Point::new(
            end.x - size * (angle - offset).cos(),
            end.y - size * (angle - offset).sin(),
        )
    };
    let mut path = BezPath::new();
    path.move_to(end);
    path.line_to(wing(ARROWHEAD_ANGLE));
    path.line_to(wing(-ARROWHEAD_ANGLE));
    path.close_path();
    Some(path)
}

fn polyline(points: &[Point]) -> Option<BezPath> {
    let (first, rest) = points.split_first()?;
    let mut path = BezPath::new();
    path.move_to(*first);
    if rest.is_empty() {
        // Single sample: a dot under round caps
        path.line_to(*first);
    }
    for point in rest {
        path.line_to(*point);
    }
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{DrawCommand, RecordingSurface};
    use inkroom_core::elements::{ElementStyle, Rgba};
    use kurbo::{PathEl, Size, Vec2};

    fn renderer() -> Renderer<RecordingSurface> {
        Renderer::new(Some(RecordingSurface::new(Size::new(200.0, 100.0))), RedrawFlag::new()).unwrap()
    }

    fn strokes(surface: &RecordingSurface) -> Vec<&Stroke> {
        surface
            .commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Stroke { style, .. } => Some(style),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_missing_surface_is_fatal() {
        let result = Renderer::<RecordingSurface>::new(None, RedrawFlag::new());
        assert!(matches!(result, Err(RendererError::InitFailed(_))));
    }

    #[test]
    fn test_render_is_noop_unless_dirty() {
        let mut renderer = renderer();
        let camera = Camera::new();
        let ctx = RenderContext::new(Vec::new(), &camera);
        assert!(renderer.render(&ctx).unwrap());
        assert!(!renderer.render(&ctx).unwrap());
        assert_eq!(renderer.frames(), 1);

        renderer.redraw.mark();
        assert!(renderer.render(&ctx).unwrap());
        assert_eq!(renderer.frames(), 2);
    }

    #[test]
    fn test_grid_scrolls_with_offset() {
        let mut renderer = renderer();
        let mut camera = Camera::new();
        camera.offset = Vec2::new(45.0, 0.0);
        camera.zoom = 2.0;
        let ctx = RenderContext::new(Vec::new(), &camera);
        renderer.render(&ctx).unwrap();

        let Some(DrawCommand::Stroke { path, .. }) = renderer.surface().commands().get(1) else {
            panic!("expected grid stroke");
        };
        // Step 40 px, first vertical line at 45 mod 40
        let first = path.elements()[0];
        assert_eq!(first, PathEl::MoveTo(Point::new(5.0, 0.0)));
        let second = path.elements()[2];
        assert_eq!(second, PathEl::MoveTo(Point::new(45.0, 0.0)));
    }

    #[test]
    fn test_filled_rotated_rect() {
        let mut renderer = renderer();
        let camera = Camera::new();
        let style = ElementStyle {
            fill_color: Rgba::parse("#ff0000").unwrap(),
            opacity: 0.5,
            ..ElementStyle::default()
        };
        let mut rect = Element::rectangle(Rect::new(0.0, 0.0, 40.0, 20.0), style);
        rect.angle = 90.0;
        let ctx = RenderContext::new(vec![&rect], &camera).with_grid(GridStyle::None);
        renderer.render(&ctx).unwrap();

        let commands = renderer.surface().commands();
        assert_eq!(commands.len(), 3);
        let DrawCommand::Fill { transform, color, .. } = &commands[1] else {
            panic!("expected fill");
        };
        assert!((color.components[3] - 0.5).abs() < 1e-6);
        // Local (20, 0) lands at center + rotated (0, 20)
        let corner = *transform * Point::new(20.0, 0.0);
        assert!((corner.x - 20.0).abs() < 1e-9 && (corner.y - 30.0).abs() < 1e-9);
        assert!(matches!(commands[2], DrawCommand::Stroke { .. }));
    }

    #[test]
    fn test_transparent_fill_is_skipped_and_dashes_applied() {
        let mut renderer = renderer();
        let camera = Camera::new();
        let style = ElementStyle {
            stroke_style: StrokeStyle::Dashed,
            ..ElementStyle::default()
        };
        let ellipse = Element::ellipse(Rect::new(0.0, 0.0, 40.0, 20.0), style);
        let ctx = RenderContext::new(vec![&ellipse], &camera).with_grid(GridStyle::None);
        renderer.render(&ctx).unwrap();

        let surface = renderer.surface();
        assert_eq!(surface.commands().len(), 2);
        let stroke = strokes(surface)[0];
        assert_eq!(stroke.dash_pattern.as_slice(), &DASH_PATTERN);
        assert_eq!(stroke.start_cap, Cap::Round);
    }

    #[test]
    fn test_arrowhead_threshold() {
        assert!(arrowhead(Point::ZERO, Point::new(9.0, 0.0), 10.0, 15.0).is_none());
        let head = arrowhead(Point::ZERO, Point::new(100.0, 0.0), 10.0, 15.0).unwrap();
        let PathEl::LineTo(wing) = head.elements()[1] else {
            panic!("expected wing");
        };
        assert!((wing.x - (100.0 - 15.0 * ARROWHEAD_ANGLE.cos())).abs() < 1e-9);
        assert!(wing.y > 0.0);

        let mut renderer = renderer();
        let camera = Camera::new();
        let short = Element::arrow(Point::ZERO, Point::new(5.0, 0.0), ElementStyle::default());
        let long = Element::arrow(Point::ZERO, Point::new(50.0, 0.0), ElementStyle::default());
        let ctx = RenderContext::new(vec![&short, &long], &camera).with_grid(GridStyle::None);
        renderer.render(&ctx).unwrap();
        let fills = renderer
            .surface()
            .commands()
            .iter()
            .filter(|c| matches!(c, DrawCommand::Fill { .. }))
            .count();
        assert_eq!(fills, 1);
    }

    #[test]
    fn test_eraser_trail_uses_dest_out() {
        let mut renderer = renderer();
        let camera = Camera::new();
        let trail = Element::new(
            ElementKind::Eraser {
                points: vec![Point::ZERO, Point::new(10.0, 0.0)],
            },
            Point::ZERO,
            ElementStyle::eraser_trail(10.0),
        );
        let ctx = RenderContext::new(vec![&trail], &camera).with_grid(GridStyle::None);
        renderer.render(&ctx).unwrap();

        let commands = renderer.surface().commands();
        assert!(matches!(commands[1], DrawCommand::PushCompose(Compose::DestOut)));
        assert!(matches!(commands[2], DrawCommand::Stroke { .. }));
        assert!(matches!(commands[3], DrawCommand::PopCompose));
    }

    #[test]
    fn test_text_lines_and_alignment() {
        let mut renderer = renderer();
        let camera = Camera::new();
        let mut text = Element::text(Point::new(100.0, 10.0), "ab\ncdef", 10.0, ElementStyle::default());
        if let ElementKind::Text { text_align, .. } = &mut text.kind {
            *text_align = TextAlign::Right;
        }
        let ctx = RenderContext::new(vec![&text], &camera).with_grid(GridStyle::None);
        renderer.render(&ctx).unwrap();

        let origins: Vec<Point> = renderer
            .surface()
            .commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { origin, .. } => Some(*origin),
                _ => None,
            })
            .collect();
        assert_eq!(renderer.surface().texts(), vec!["ab", "cdef"]);
        assert!((origins[0].x - 88.0).abs() < 1e-9);
        assert!((origins[1].x - 76.0).abs() < 1e-9);
        assert!((origins[1].y - 22.0).abs() < 1e-9);
    }

    #[test]
    fn test_edited_text_is_hidden_behind_overlay() {
        let mut renderer = renderer();
        let camera = Camera::new();
        let text = Element::text(Point::new(0.0, 0.0), "old", 10.0, ElementStyle::default());
        let overlay = TextOverlay {
            world_position: Point::ZERO,
            screen_position: Point::ZERO,
            font_size: 10.0,
            screen_font_size: 10.0,
            content: "new".into(),
            editing: Some(text.id),
        };
        let ctx = RenderContext::new(vec![&text], &camera)
            .with_grid(GridStyle::None)
            .with_overlay(Some(&overlay));
        renderer.render(&ctx).unwrap();
        assert_eq!(renderer.surface().texts(), vec!["new"]);
    }

    #[test]
    fn test_invalid_viewport_keeps_frame_pending() {
        let mut renderer = Renderer::new(Some(RecordingSurface::new(Size::ZERO)), RedrawFlag::new()).unwrap();
        let camera = Camera::new();
        let ctx = RenderContext::new(Vec::new(), &camera);
        assert!(matches!(renderer.render(&ctx), Err(RendererError::RenderFailed(_))));

        renderer.surface_mut().resize(Size::new(10.0, 10.0));
        assert!(renderer.render(&ctx).unwrap());
    }
}
