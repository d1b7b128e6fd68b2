//! Drawing surfaces the renderer paints onto.

use inkroom_core::elements::measure_text;
use kurbo::{Affine, BezPath, Point, Size, Stroke};
use peniko::{Color, Compose};

/// A 2D target accepting filled and stroked paths plus text.
pub trait Surface {
    /// Viewport size in pixels.
    fn size(&self) -> Size;

    /// Discard everything and fill with `color`.
    fn clear(&mut self, color: Color);

    fn fill(&mut self, transform: Affine, color: Color, path: &BezPath);

    fn stroke(&mut self, style: &Stroke, transform: Affine, color: Color, path: &BezPath);

    /// Start a group composited onto what is already painted with `compose`.
    fn push_compose(&mut self, compose: Compose);

    fn pop_compose(&mut self);

    /// Draw one line of text with its top-left at `origin`.
    fn draw_text(
        &mut self,
        text: &str,
        origin: Point,
        font_size: f64,
        font_family: &str,
        color: Color,
        transform: Affine,
    );

    /// Width and height of one line of text.
    fn measure_text(&mut self, text: &str, font_size: f64, _font_family: &str) -> Size {
        let (width, height) = measure_text(text, font_size);
        Size::new(width, height)
    }
}

/// One recorded call on a [`RecordingSurface`].
#[derive(Debug, Clone)]
pub enum DrawCommand {
    Clear(Color),
    Fill {
        transform: Affine,
        color: Color,
        path: BezPath,
    },
    Stroke {
        style: Stroke,
        transform: Affine,
        color: Color,
        path: BezPath,
    },
    PushCompose(Compose),
    PopCompose,
    Text {
        text: String,
        origin: Point,
        font_size: f64,
        font_family: String,
        color: Color,
        transform: Affine,
    },
}

/// Surface that records draw calls instead of rasterizing.
///
/// Used for headless rendering and tests.
#[derive(Debug, Clone)]
pub struct RecordingSurface {
    size: Size,
    commands: Vec<DrawCommand>,
}

impl RecordingSurface {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            commands: Vec::new(),
        }
    }

    pub fn resize(&mut self, size: Size) {
        self.size = size;
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Text drawn since the last clear, in order.
    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Surface for RecordingSurface {
    fn size(&self) -> Size {
        self.size
    }

    fn clear(&mut self, color: Color) {
        self.commands.clear();
        self.commands.push(DrawCommand::Clear(color));
    }

    fn fill(&mut self, transform: Affine, color: Color, path: &BezPath) {
        self.commands.push(DrawCommand::Fill {
            transform,
            color,
            path: path.clone(),
        });
    }

    fn stroke(&mut self, style: &Stroke, transform: Affine, color: Color, path: &BezPath) {
        self.commands.push(DrawCommand::Stroke {
            style: style.clone(),
            transform,
            color,
            path: path.clone(),
        });
    }

    fn push_compose(&mut self, compose: Compose) {
        self.commands.push(DrawCommand::PushCompose(compose));
    }

    fn pop_compose(&mut self) {
        self.commands.push(DrawCommand::PopCompose);
    }

    fn draw_text(
        &mut self,
        text: &str,
        origin: Point,
        font_size: f64,
        font_family: &str,
        color: Color,
        transform: Affine,
    ) {
        self.commands.push(DrawCommand::Text {
            text: text.to_string(),
            origin,
            font_size,
            font_family: font_family.to_string(),
            color,
            transform,
        });
    }
}
