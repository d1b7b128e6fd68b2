//! Construction of new elements by the drawing tools, plus the inline text overlay.

use crate::camera::Transform;
use crate::config::EngineConfig;
use crate::elements::{Element, ElementId, ElementKind, ElementStyle};
use crate::scene::{SceneReader, SceneWriter};
use kurbo::Point;

/// Tools that drag out a box or segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeTool {
    Rectangle,
    Ellipse,
    Line,
    Arrow,
}

impl ShapeTool {
    fn kind(self) -> ElementKind {
        match self {
            ShapeTool::Rectangle => ElementKind::Rectangle,
            ShapeTool::Ellipse => ElementKind::Ellipse,
            ShapeTool::Line => ElementKind::Line,
            ShapeTool::Arrow => ElementKind::Arrow,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct InProgress {
    id: ElementId,
    anchor: Point,
}

/// An open text input positioned over the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct TextOverlay {
    /// Top-left of the text in world coordinates.
    pub world_position: Point,
    /// Same point in screen coordinates, where the input box is placed.
    pub screen_position: Point,
    /// Font size in world units.
    pub font_size: f64,
    /// Font size as displayed, scaled by the current zoom.
    pub screen_font_size: f64,
    pub content: String,
    /// Existing text element being edited, if any.
    pub editing: Option<ElementId>,
}

/// What committing the text overlay did to the scene.
#[derive(Debug, Clone, PartialEq)]
pub enum TextCommit {
    Created(Element),
    Updated(Element),
    /// An existing text element was emptied and tombstoned.
    Removed(ElementId),
    /// Empty new text; nothing happened.
    Discarded,
}

/// Builds elements for the shape, freehand and text tools.
#[derive(Debug, Clone)]
pub struct DrawingFactory {
    /// Style applied to new elements.
    pub style: ElementStyle,
    pub font_size: f64,
    min_drag_distance: f64,
    freehand_min_distance: f64,
    active: Option<InProgress>,
    overlay: Option<TextOverlay>,
}

impl DrawingFactory {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            style: ElementStyle::default(),
            font_size: config.default_font_size,
            min_drag_distance: config.min_drag_distance,
            freehand_min_distance: config.freehand_min_distance,
            active: None,
            overlay: None,
        }
    }

    /// Id of the element under construction.
    pub fn active(&self) -> Option<ElementId> {
        self.active.map(|a| a.id)
    }

    /// Add a zero-size shape at `anchor`.
    pub fn begin_shape(&mut self, scene: &mut impl SceneWriter, tool: ShapeTool, anchor: Point) -> ElementId {
        let element = Element::new(tool.kind(), anchor, self.style.clone());
        let id = element.id;
        scene.add(element);
        self.active = Some(InProgress { id, anchor });
        id
    }

    /// Stretch the shape to `current`. Negative sizes are kept as-is.
    pub fn update_shape(&mut self, scene: &mut impl SceneWriter, current: Point) {
        let Some(active) = self.active else {
            return;
        };
        let Some(mut element) = scene.get(active.id).cloned() else {
            return;
        };
        element.width = current.x - active.anchor.x;
        element.height = current.y - active.anchor.y;
        scene.update(element);
    }

    /// Finish the shape, or tombstone it if the drag was too small.
    pub fn finish_shape(&mut self, scene: &mut impl SceneWriter) -> Option<Element> {
        let active = self.active.take()?;
        let element = scene.get(active.id)?.clone();
        if element.width.hypot(element.height) < self.min_drag_distance {
            scene.delete(active.id);
            return None;
        }
        Some(element)
    }

    /// Start a freehand stroke with a single point.
    pub fn begin_freehand(&mut self, scene: &mut impl SceneWriter, point: Point) -> ElementId {
        let element = Element::freehand(vec![point], self.style.clone());
        let id = element.id;
        scene.add(element);
        self.active = Some(InProgress { id, anchor: point });
        id
    }

    /// Append `point` unless it is within the down-sampling distance of the last one.
    pub fn extend_freehand(&mut self, scene: &mut impl SceneWriter, point: Point) -> bool {
        let Some(active) = self.active else {
            return false;
        };
        let Some(mut element) = scene.get(active.id).cloned() else {
            return false;
        };
        let Some(points) = element.points_mut() else {
            return false;
        };
        if points.last().is_some_and(|last| last.distance(point) <= self.freehand_min_distance) {
            return false;
        }
        points.push(point);
        element.refresh_point_bounds();
        scene.update(element);
        true
    }

    /// Finish the stroke; strokes with fewer than two points are discarded.
    pub fn finish_freehand(&mut self, scene: &mut impl SceneWriter) -> Option<Element> {
        let active = self.active.take()?;
        let element = scene.get(active.id)?.clone();
        if element.points().is_none_or(|points| points.len() < 2) {
            scene.delete(active.id);
            return None;
        }
        Some(element)
    }

    /// Drop the element under construction.
    pub fn cancel(&mut self, scene: &mut impl SceneWriter) {
        if let Some(active) = self.active.take() {
            scene.delete(active.id);
        }
    }

    pub fn overlay(&self) -> Option<&TextOverlay> {
        self.overlay.as_ref()
    }

    pub fn overlay_mut(&mut self) -> Option<&mut TextOverlay> {
        self.overlay.as_mut()
    }

    /// Open an empty text input at a world point.
    pub fn open_text(&mut self, world: Point, camera: &impl Transform) -> &TextOverlay {
        self.overlay.insert(TextOverlay {
            world_position: world,
            screen_position: camera.world_to_screen(world),
            font_size: self.font_size,
            screen_font_size: self.font_size * camera.scale(),
            content: String::new(),
            editing: None,
        })
    }

    /// Open the input pre-filled with an existing text element.
    pub fn edit_text(&mut self, element: &Element, camera: &impl Transform) -> Option<&TextOverlay> {
        let ElementKind::Text { text, font_size, .. } = &element.kind else {
            return None;
        };
        let world = element.bounds().origin();
        Some(self.overlay.insert(TextOverlay {
            world_position: world,
            screen_position: camera.world_to_screen(world),
            font_size: *font_size,
            screen_font_size: font_size * camera.scale(),
            content: text.clone(),
            editing: Some(element.id),
        }))
    }

    /// Close the overlay without touching the scene.
    pub fn cancel_text(&mut self) -> Option<TextOverlay> {
        self.overlay.take()
    }

    /// Close the overlay and apply its content to the scene.
    pub fn commit_text(&mut self, scene: &mut impl SceneWriter) -> Option<TextCommit> {
        let overlay = self.overlay.take()?;
        let content = overlay.content.trim_end().to_string();

        if let Some(id) = overlay.editing {
            let existing = scene.get(id).filter(|e| e.is_live()).cloned();
            return Some(match existing {
                Some(_) if content.is_empty() => {
                    scene.delete(id);
                    TextCommit::Removed(id)
                }
                Some(mut element) => {
                    if let ElementKind::Text { text, .. } = &mut element.kind {
                        if *text == content {
                            return Some(TextCommit::Discarded);
                        }
                        *text = content;
                    }
                    element.refresh_text_bounds();
                    scene.update(element.clone());
                    TextCommit::Updated(element)
                }
                None => TextCommit::Discarded,
            });
        }

        if content.is_empty() {
            return Some(TextCommit::Discarded);
        }
        let mut style = self.style.clone();
        style.fill_color = crate::elements::Rgba::TRANSPARENT;
        let element = Element::text(overlay.world_position, content, overlay.font_size, style);
        scene.add(element.clone());
        Some(TextCommit::Created(element))
    }
}
