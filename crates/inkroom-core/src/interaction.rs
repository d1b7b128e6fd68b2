//! Interaction state machine: routes pointer and keyboard input to the tools.
//!
//! Exactly one [`Gesture`] is active at a time. A gesture starts on pointer
//! down (keyed by the current tool) and ends on pointer up or leave, which
//! always runs cleanup. Committed mutations come back as [`SceneChange`]s for
//! the sync layer; each one pushes exactly one history snapshot.

use crate::camera::{Camera, Transform};
use crate::config::EngineConfig;
use crate::drawing::{DrawingFactory, ShapeTool, TextCommit};
use crate::elements::{Element, ElementId, ElementKind};
use crate::eraser::EraserEngine;
use crate::geometry::hit_test_top;
use crate::history::UndoLedger;
use crate::scene::{SceneDiff, SceneReader, SceneWriter};
use crate::selection::{Handle, HandleKind, SelectionController};
use kurbo::Point;
use std::fmt;
use std::str::FromStr;

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Selection,
    Pan,
    Rectangle,
    Ellipse,
    Line,
    Arrow,
    Freehand,
    Eraser,
    Text,
}

impl ToolKind {
    pub const ALL: [ToolKind; 9] = [
        ToolKind::Selection,
        ToolKind::Pan,
        ToolKind::Rectangle,
        ToolKind::Ellipse,
        ToolKind::Line,
        ToolKind::Arrow,
        ToolKind::Freehand,
        ToolKind::Eraser,
        ToolKind::Text,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::Selection => "selection",
            ToolKind::Pan => "pan",
            ToolKind::Rectangle => "rect",
            ToolKind::Ellipse => "ellipse",
            ToolKind::Line => "line",
            ToolKind::Arrow => "arrow",
            ToolKind::Freehand => "freehand",
            ToolKind::Eraser => "eraser",
            ToolKind::Text => "text",
        }
    }

    fn shape(self) -> Option<ShapeTool> {
        match self {
            ToolKind::Rectangle => Some(ShapeTool::Rectangle),
            ToolKind::Ellipse => Some(ShapeTool::Ellipse),
            ToolKind::Line => Some(ShapeTool::Line),
            ToolKind::Arrow => Some(ShapeTool::Arrow),
            _ => None,
        }
    }

    /// Tools that keep the current selection when switched to.
    fn keeps_selection(self) -> bool {
        matches!(self, ToolKind::Selection | ToolKind::Pan)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for tool names that do not match any tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTool(pub String);

impl fmt::Display for UnknownTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown tool: {}", self.0)
    }
}

impl std::error::Error for UnknownTool {}

impl FromStr for ToolKind {
    type Err = UnknownTool;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "selection" | "select" => Ok(ToolKind::Selection),
            "pan" => Ok(ToolKind::Pan),
            "rect" | "rectangle" => Ok(ToolKind::Rectangle),
            "ellipse" | "circle" => Ok(ToolKind::Ellipse),
            "line" => Ok(ToolKind::Line),
            "arrow" => Ok(ToolKind::Arrow),
            "freehand" | "pencil" => Ok(ToolKind::Freehand),
            "eraser" => Ok(ToolKind::Eraser),
            "text" => Ok(ToolKind::Text),
            other => Err(UnknownTool(other.to_string())),
        }
    }
}

/// Keyboard modifier state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers { shift: false, ctrl: false, alt: false, meta: false };
    pub const SHIFT: Modifiers = Modifiers { shift: true, ctrl: false, alt: false, meta: false };
    pub const CTRL: Modifiers = Modifiers { shift: false, ctrl: true, alt: false, meta: false };

    /// Ctrl on most platforms, Cmd on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Escape,
    Enter,
    Backspace,
    Char(char),
    Other(String),
}

/// Raw input, with positions in screen coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    PointerDown { position: Point, button: PointerButton, modifiers: Modifiers },
    PointerMove { position: Point, modifiers: Modifiers },
    PointerUp { position: Point, modifiers: Modifiers },
    PointerLeave,
    DoubleClick { position: Point },
    Wheel { position: Point, delta_y: f64 },
    Key { key: Key, modifiers: Modifiers },
    /// The canvas or text input lost focus.
    Blur,
    /// Switch tool by name; unknown names select no tool.
    SetTool(String),
}

/// The single active gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gesture {
    #[default]
    Idle,
    Drawing(DrawTarget),
    Panning,
    Erasing,
    Transforming(TransformKind),
    EditingText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawTarget {
    Shape(ShapeTool),
    Freehand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    Move,
    Resize,
    Rotate,
}

/// A committed mutation that peers need to hear about.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneChange {
    Drawn(Element),
    Updated(Element),
    Erased(Vec<ElementId>),
}

/// Result of handling one input event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub changes: Vec<SceneChange>,
    /// Camera, selection or overlay state changed.
    pub redraw: bool,
}

impl Outcome {
    fn redraw() -> Self {
        Self { changes: Vec::new(), redraw: true }
    }

    fn merge(&mut self, other: Outcome) {
        self.changes.extend(other.changes);
        self.redraw |= other.redraw;
    }
}

/// Flattened view of the per-client interaction state.
#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub current_tool: Option<ToolKind>,
    pub selected_element: Option<ElementId>,
    pub dragging_element: Option<ElementId>,
    pub is_panning: bool,
    pub is_resizing: bool,
    pub is_rotating: bool,
}

/// Orchestrates tools, selection, history and the camera.
#[derive(Debug, Clone)]
pub struct InteractionStateMachine {
    config: EngineConfig,
    tool: Option<ToolKind>,
    gesture: Gesture,
    dragging: Option<ElementId>,
    selection: SelectionController,
    drawing: DrawingFactory,
    eraser: EraserEngine,
    history: UndoLedger,
}

impl InteractionStateMachine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            tool: Some(ToolKind::Selection),
            gesture: Gesture::Idle,
            dragging: None,
            selection: SelectionController::new(),
            drawing: DrawingFactory::new(&config),
            eraser: EraserEngine::new(config.eraser_radius),
            history: UndoLedger::new(Vec::new(), config.history_limit),
            config,
        }
    }

    pub fn tool(&self) -> Option<ToolKind> {
        self.tool
    }

    pub fn gesture(&self) -> Gesture {
        self.gesture
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    pub fn drawing(&self) -> &DrawingFactory {
        &self.drawing
    }

    pub fn drawing_mut(&mut self) -> &mut DrawingFactory {
        &mut self.drawing
    }

    pub fn history(&self) -> &UndoLedger {
        &self.history
    }

    /// Selection handles to draw, in world coordinates.
    pub fn handles(&self, scene: &impl SceneReader, camera: &Camera) -> Vec<Handle> {
        if self.gesture != Gesture::Idle && !matches!(self.gesture, Gesture::Transforming(_)) {
            return Vec::new();
        }
        self.selection.handles(scene, camera.zoom)
    }

    pub fn app_state(&self, camera: &Camera) -> AppState {
        AppState {
            current_tool: self.tool,
            selected_element: self.selection.selected(),
            dragging_element: self.dragging,
            is_panning: camera.is_panning(),
            is_resizing: self.gesture == Gesture::Transforming(TransformKind::Resize),
            is_rotating: self.gesture == Gesture::Transforming(TransformKind::Rotate),
        }
    }

    /// Make the current scene the undo base, e.g. after hydration.
    pub fn reset_history(&mut self, scene: &impl SceneReader) {
        self.history.reset(scene.snapshot());
    }

    /// Handle one input event.
    pub fn handle(
        &mut self,
        event: InputEvent,
        scene: &mut impl SceneWriter,
        camera: &mut Camera,
    ) -> Outcome {
        match event {
            InputEvent::PointerDown { position, button, .. } => {
                self.pointer_down(position, button, scene, camera)
            }
            InputEvent::PointerMove { position, modifiers } => {
                self.pointer_move(position, modifiers, scene, camera)
            }
            InputEvent::PointerUp { position, modifiers } => {
                let mut outcome = self.pointer_move(position, modifiers, scene, camera);
                outcome.merge(self.end_gesture(scene, camera));
                outcome
            }
            InputEvent::PointerLeave => self.end_gesture(scene, camera),
            InputEvent::DoubleClick { position } => self.double_click(position, scene, camera),
            InputEvent::Wheel { position, delta_y } => Outcome {
                changes: Vec::new(),
                redraw: camera.wheel(position, delta_y),
            },
            InputEvent::Key { key, modifiers } => self.key(key, modifiers, scene, camera),
            InputEvent::Blur => {
                if self.gesture == Gesture::EditingText {
                    self.commit_text(scene)
                } else {
                    self.end_gesture(scene, camera)
                }
            }
            InputEvent::SetTool(name) => self.set_tool(&name, scene, camera),
        }
    }

    fn set_tool(&mut self, name: &str, scene: &mut impl SceneWriter, camera: &mut Camera) -> Outcome {
        let mut outcome = if self.gesture == Gesture::EditingText {
            self.commit_text(scene)
        } else {
            self.end_gesture(scene, camera)
        };
        self.tool = match name.parse::<ToolKind>() {
            Ok(tool) => {
                log::debug!("tool switched to {tool}");
                Some(tool)
            }
            Err(err) => {
                log::warn!("{err}; ignoring pointer input");
                None
            }
        };
        if !self.tool.is_some_and(ToolKind::keeps_selection) {
            self.selection.clear();
        }
        outcome.redraw = true;
        outcome
    }

    fn pointer_down(
        &mut self,
        position: Point,
        button: PointerButton,
        scene: &mut impl SceneWriter,
        camera: &mut Camera,
    ) -> Outcome {
        let mut outcome = Outcome::default();
        if self.gesture == Gesture::EditingText {
            outcome.merge(self.commit_text(scene));
        }
        if self.gesture != Gesture::Idle || button != PointerButton::Primary {
            return outcome;
        }
        let Some(tool) = self.tool else {
            return outcome;
        };
        let world = camera.screen_to_world(position);

        match tool {
            ToolKind::Pan => {
                camera.begin_pan(position);
                self.gesture = Gesture::Panning;
            }
            ToolKind::Selection => {
                outcome.redraw = true;
                let tolerance = self.config.handle_tolerance;
                if !self.selection.begin(&*scene, world, camera.zoom, tolerance) {
                    self.selection.select_at(&*scene, world);
                    if !self.selection.begin(&*scene, world, camera.zoom, tolerance) {
                        return outcome;
                    }
                }
                let kind = match self.selection.manipulation().and_then(|m| m.handle) {
                    None => TransformKind::Move,
                    Some(HandleKind::Rotate) => TransformKind::Rotate,
                    Some(_) => TransformKind::Resize,
                };
                self.dragging = self.selection.selected();
                self.gesture = Gesture::Transforming(kind);
            }
            ToolKind::Rectangle | ToolKind::Ellipse | ToolKind::Line | ToolKind::Arrow => {
                if let Some(shape) = tool.shape() {
                    self.dragging = Some(self.drawing.begin_shape(scene, shape, world));
                    self.gesture = Gesture::Drawing(DrawTarget::Shape(shape));
                }
            }
            ToolKind::Freehand => {
                self.dragging = Some(self.drawing.begin_freehand(scene, world));
                self.gesture = Gesture::Drawing(DrawTarget::Freehand);
            }
            ToolKind::Eraser => {
                self.eraser.begin(scene, world);
                self.gesture = Gesture::Erasing;
            }
            ToolKind::Text => {
                self.drawing.open_text(world, &*camera);
                self.gesture = Gesture::EditingText;
                outcome.redraw = true;
            }
        }
        outcome
    }

    fn pointer_move(
        &mut self,
        position: Point,
        modifiers: Modifiers,
        scene: &mut impl SceneWriter,
        camera: &mut Camera,
    ) -> Outcome {
        let world = camera.screen_to_world(position);
        match self.gesture {
            Gesture::Panning => {
                return Outcome {
                    changes: Vec::new(),
                    redraw: camera.drag_pan(position),
                };
            }
            Gesture::Drawing(DrawTarget::Shape(_)) => self.drawing.update_shape(scene, world),
            Gesture::Drawing(DrawTarget::Freehand) => {
                self.drawing.extend_freehand(scene, world);
            }
            Gesture::Erasing => self.eraser.sample(scene, world),
            Gesture::Transforming(_) => {
                if let Some(element) = self.selection.drag(world, modifiers.shift) {
                    scene.update(element);
                }
            }
            Gesture::Idle | Gesture::EditingText => {}
        }
        Outcome::default()
    }

    /// Finish the active gesture, committing whatever it produced.
    fn end_gesture(&mut self, scene: &mut impl SceneWriter, camera: &mut Camera) -> Outcome {
        let mut outcome = Outcome::default();
        match self.gesture {
            Gesture::Idle | Gesture::EditingText => return outcome,
            Gesture::Panning => camera.end_pan(),
            Gesture::Drawing(DrawTarget::Shape(_)) => {
                if let Some(element) = self.drawing.finish_shape(scene) {
                    outcome.changes.push(SceneChange::Drawn(element));
                }
            }
            Gesture::Drawing(DrawTarget::Freehand) => {
                if let Some(element) = self.drawing.finish_freehand(scene) {
                    outcome.changes.push(SceneChange::Drawn(element));
                }
            }
            Gesture::Erasing => {
                let batch = self.eraser.end(scene);
                if !batch.erased.is_empty() {
                    outcome.changes.push(SceneChange::Erased(batch.erased));
                }
                outcome
                    .changes
                    .extend(batch.created.into_iter().map(SceneChange::Drawn));
            }
            Gesture::Transforming(_) => {
                if let Some(state) = self.selection.finish() {
                    if let Some(current) = scene.get(state.element_id).cloned() {
                        if current != state.original {
                            outcome.changes.push(SceneChange::Updated(current));
                        }
                    }
                }
            }
        }
        if !outcome.changes.is_empty() {
            self.commit(&*scene);
        }
        self.gesture = Gesture::Idle;
        self.dragging = None;
        outcome.redraw = true;
        outcome
    }

    /// Abort the active gesture and return to idle. Erasing is committed since
    /// its effects are already applied.
    fn cancel_gesture(&mut self, scene: &mut impl SceneWriter, camera: &mut Camera) -> Outcome {
        match self.gesture {
            Gesture::Drawing(_) => self.drawing.cancel(scene),
            Gesture::Transforming(_) => {
                if let Some(state) = self.selection.finish() {
                    scene.update(state.original);
                }
            }
            Gesture::EditingText => {
                self.drawing.cancel_text();
            }
            Gesture::Erasing | Gesture::Panning => return self.end_gesture(scene, camera),
            Gesture::Idle => {}
        }
        self.gesture = Gesture::Idle;
        self.dragging = None;
        Outcome::redraw()
    }

    fn double_click(&mut self, position: Point, scene: &mut impl SceneWriter, camera: &mut Camera) -> Outcome {
        if !matches!(self.tool, Some(ToolKind::Selection | ToolKind::Text)) {
            return Outcome::default();
        }
        let mut outcome = match self.gesture {
            Gesture::EditingText => self.commit_text(scene),
            Gesture::Idle => Outcome::default(),
            // Finish the press that preceded the double click
            _ => self.end_gesture(scene, camera),
        };
        let world = camera.screen_to_world(position);
        let hit = hit_test_top(scene.all().into_iter().rev(), world).and_then(|id| scene.get(id).cloned());
        match hit {
            Some(element) if matches!(element.kind, ElementKind::Text { .. }) => {
                self.selection.clear();
                self.drawing.edit_text(&element, &*camera);
            }
            Some(_) => return outcome,
            None => {
                self.drawing.open_text(world, &*camera);
            }
        }
        self.gesture = Gesture::EditingText;
        outcome.redraw = true;
        outcome
    }

    fn key(
        &mut self,
        key: Key,
        modifiers: Modifiers,
        scene: &mut impl SceneWriter,
        camera: &mut Camera,
    ) -> Outcome {
        if key == Key::Escape {
            let outcome = self.cancel_gesture(scene, camera);
            self.selection.clear();
            return outcome;
        }

        if self.gesture == Gesture::EditingText {
            return self.edit_key(key, modifiers, scene);
        }
        if self.gesture != Gesture::Idle || !modifiers.command() {
            return Outcome::default();
        }
        match key {
            Key::Char(c) if c.eq_ignore_ascii_case(&'z') => {
                if modifiers.shift {
                    self.redo(scene)
                } else {
                    self.undo(scene)
                }
            }
            Key::Char(c) if c.eq_ignore_ascii_case(&'y') => self.redo(scene),
            _ => Outcome::default(),
        }
    }

    fn edit_key(&mut self, key: Key, modifiers: Modifiers, scene: &mut impl SceneWriter) -> Outcome {
        if key == Key::Enter && !modifiers.shift {
            return self.commit_text(scene);
        }
        let Some(overlay) = self.drawing.overlay_mut() else {
            return Outcome::default();
        };
        match key {
            Key::Enter => overlay.content.push('\n'),
            Key::Backspace => {
                overlay.content.pop();
            }
            Key::Char(c) if !modifiers.command() => overlay.content.push(c),
            _ => return Outcome::default(),
        }
        Outcome::redraw()
    }

    fn commit_text(&mut self, scene: &mut impl SceneWriter) -> Outcome {
        self.gesture = Gesture::Idle;
        let change = match self.drawing.commit_text(scene) {
            Some(TextCommit::Created(element)) => Some(SceneChange::Drawn(element)),
            Some(TextCommit::Updated(element)) => Some(SceneChange::Updated(element)),
            Some(TextCommit::Removed(id)) => Some(SceneChange::Erased(vec![id])),
            Some(TextCommit::Discarded) | None => None,
        };
        let mut outcome = Outcome::redraw();
        if let Some(change) = change {
            self.commit(&*scene);
            outcome.changes.push(change);
        }
        outcome
    }

    fn commit(&mut self, scene: &impl SceneReader) {
        self.history.push_state(scene.snapshot());
        log::debug!("committed mutation, history depth {}", self.history.depth());
    }

    /// Step back one committed mutation.
    pub fn undo(&mut self, scene: &mut impl SceneWriter) -> Outcome {
        let from = self.history.current().to_vec();
        let Some(to) = self.history.undo().map(<[Element]>::to_vec) else {
            return Outcome::default();
        };
        log::debug!("undo");
        self.apply_snapshot(&from, &to, scene)
    }

    /// Re-apply the last undone mutation.
    pub fn redo(&mut self, scene: &mut impl SceneWriter) -> Outcome {
        let from = self.history.current().to_vec();
        let Some(to) = self.history.redo().map(<[Element]>::to_vec) else {
            return Outcome::default();
        };
        log::debug!("redo");
        self.apply_snapshot(&from, &to, scene)
    }

    fn apply_snapshot(&mut self, from: &[Element], to: &[Element], scene: &mut impl SceneWriter) -> Outcome {
        let SceneDiff { changed, removed } = scene.restore(from, to);
        if let Some(selected) = self.selection.selected() {
            if scene.get(selected).is_none_or(|e| !e.is_live()) {
                self.selection.clear();
            }
        }
        let mut outcome = Outcome::redraw();
        if !removed.is_empty() {
            outcome.changes.push(SceneChange::Erased(removed));
        }
        outcome.changes.extend(changed.into_iter().map(SceneChange::Updated));
        outcome
    }
}
