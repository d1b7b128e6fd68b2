//! Drawable elements and their styling.
//!
//! Every element shares a common header (id, box, rotation, style, tombstone)
//! and carries type-specific data in [`ElementKind`]. The JSON form is a flat
//! camelCase object tagged by `"type"`, which is also the wire format.

use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for an element.
pub type ElementId = Uuid;

/// Width of a text glyph relative to the font size.
pub const TEXT_CHAR_WIDTH: f64 = 0.6;
/// Line height relative to the font size.
pub const TEXT_LINE_HEIGHT: f64 = 1.2;

/// Validation errors for element data.
#[derive(Debug, Error, PartialEq)]
pub enum ElementError {
    #[error("non-finite {field} on element {id}")]
    NonFinite { id: ElementId, field: &'static str },
    #[error("opacity {0} outside [0, 1]")]
    Opacity(f64),
    #[error("invalid color: {0}")]
    Color(String),
}

/// Result type for element validation.
pub type ElementResult<T> = Result<T, ElementError>;

/// An sRGB color with alpha, serialized as a CSS hex string.
///
/// A fully transparent color serializes as `"transparent"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);
    pub const BLACK: Rgba = Rgba::new(0x1e, 0x1e, 0x1e, 255);
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }

    /// Convert to a peniko color for rendering.
    pub fn to_peniko(&self) -> peniko::Color {
        peniko::Color::from_rgba8(self.r, self.g, self.b, self.a)
    }

    /// Parse `transparent`, `#rgb`, `#rrggbb` or `#rrggbbaa`.
    pub fn parse(value: &str) -> ElementResult<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("transparent") {
            return Ok(Self::TRANSPARENT);
        }
        let hex = value
            .strip_prefix('#')
            .ok_or_else(|| ElementError::Color(value.to_string()))?;
        // Slicing below is by byte; anything but ASCII hex digits is rejected first
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ElementError::Color(value.to_string()));
        }
        let channel = |s: &str| {
            u8::from_str_radix(s, 16).map_err(|_| ElementError::Color(value.to_string()))
        };
        match hex.len() {
            3 => {
                let expand = |i: usize| channel(&hex[i..i + 1]).map(|c| c * 17);
                Ok(Self::new(expand(0)?, expand(1)?, expand(2)?, 255))
            }
            6 => Ok(Self::new(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
                255,
            )),
            8 => Ok(Self::new(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
                channel(&hex[6..8])?,
            )),
            _ => Err(ElementError::Color(value.to_string())),
        }
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_transparent() {
            f.write_str("transparent")
        } else if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl TryFrom<String> for Rgba {
    type Error = ElementError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Rgba::parse(&value)
    }
}

impl From<Rgba> for String {
    fn from(color: Rgba) -> Self {
        color.to_string()
    }
}

/// Stroke dash pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

/// Horizontal alignment of text relative to the element's `x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Visual style shared by every element type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ElementStyle {
    pub stroke_color: Rgba,
    /// Background fill, `transparent` for none.
    pub fill_color: Rgba,
    pub stroke_width: f64,
    pub stroke_style: StrokeStyle,
    /// Opacity in [0, 1].
    pub opacity: f64,
}

impl Default for ElementStyle {
    fn default() -> Self {
        Self {
            stroke_color: Rgba::BLACK,
            fill_color: Rgba::TRANSPARENT,
            stroke_width: 2.0,
            stroke_style: StrokeStyle::Solid,
            opacity: 1.0,
        }
    }
}

impl ElementStyle {
    /// Style of the semi-transparent eraser trail.
    pub fn eraser_trail(radius: f64) -> Self {
        Self {
            stroke_color: Rgba::new(0x99, 0x99, 0x99, 255),
            fill_color: Rgba::TRANSPARENT,
            stroke_width: radius * 2.0,
            stroke_style: StrokeStyle::Solid,
            opacity: 0.3,
        }
    }
}

/// Type-specific element data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ElementKind {
    Rectangle,
    Ellipse,
    Line,
    Arrow,
    Freehand {
        points: Vec<Point>,
    },
    Text {
        text: String,
        font_size: f64,
        font_family: String,
        #[serde(default)]
        text_align: TextAlign,
    },
    /// Transient eraser feedback stroke. Never persisted or sent.
    Eraser {
        points: Vec<Point>,
    },
}

impl ElementKind {
    pub fn name(&self) -> &'static str {
        match self {
            ElementKind::Rectangle => "rectangle",
            ElementKind::Ellipse => "ellipse",
            ElementKind::Line => "line",
            ElementKind::Arrow => "arrow",
            ElementKind::Freehand { .. } => "freehand",
            ElementKind::Text { .. } => "text",
            ElementKind::Eraser { .. } => "eraser",
        }
    }
}

/// A drawable object in the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub id: ElementId,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    /// Rotation in degrees about the box center.
    #[serde(default)]
    pub angle: f64,
    #[serde(flatten)]
    pub style: ElementStyle,
    #[serde(default)]
    pub deleted: bool,
    #[serde(flatten)]
    pub kind: ElementKind,
}

impl Element {
    /// Create an element with a fresh id at `(x, y)` with zero size.
    pub fn new(kind: ElementKind, origin: Point, style: ElementStyle) -> Self {
        Self {
            id: Uuid::new_v4(),
            x: origin.x,
            y: origin.y,
            width: 0.0,
            height: 0.0,
            angle: 0.0,
            style,
            deleted: false,
            kind,
        }
    }

    pub fn rectangle(rect: Rect, style: ElementStyle) -> Self {
        Self::new(ElementKind::Rectangle, rect.origin(), style).with_size(rect.width(), rect.height())
    }

    pub fn ellipse(rect: Rect, style: ElementStyle) -> Self {
        Self::new(ElementKind::Ellipse, rect.origin(), style).with_size(rect.width(), rect.height())
    }

    pub fn line(start: Point, end: Point, style: ElementStyle) -> Self {
        Self::new(ElementKind::Line, start, style).with_size(end.x - start.x, end.y - start.y)
    }

    pub fn arrow(start: Point, end: Point, style: ElementStyle) -> Self {
        Self::new(ElementKind::Arrow, start, style).with_size(end.x - start.x, end.y - start.y)
    }

    pub fn freehand(points: Vec<Point>, style: ElementStyle) -> Self {
        let origin = points.first().copied().unwrap_or(Point::ZERO);
        let mut element = Self::new(ElementKind::Freehand { points }, origin, style);
        element.refresh_point_bounds();
        element
    }

    pub fn text(origin: Point, text: impl Into<String>, font_size: f64, style: ElementStyle) -> Self {
        let mut element = Self::new(
            ElementKind::Text {
                text: text.into(),
                font_size,
                font_family: "sans-serif".to_string(),
                text_align: TextAlign::Left,
            },
            origin,
            style,
        );
        element.refresh_text_bounds();
        element
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn is_live(&self) -> bool {
        !self.deleted
    }

    /// Whether this is the eraser's own feedback stroke.
    pub fn is_eraser_trail(&self) -> bool {
        matches!(self.kind, ElementKind::Eraser { .. })
    }

    /// Sampled points for freehand strokes and eraser trails.
    pub fn points(&self) -> Option<&[Point]> {
        match &self.kind {
            ElementKind::Freehand { points } | ElementKind::Eraser { points } => Some(points),
            _ => None,
        }
    }

    pub fn points_mut(&mut self) -> Option<&mut Vec<Point>> {
        match &mut self.kind {
            ElementKind::Freehand { points } | ElementKind::Eraser { points } => Some(points),
            _ => None,
        }
    }

    /// Start and end of a line or arrow.
    pub fn endpoints(&self) -> (Point, Point) {
        (
            Point::new(self.x, self.y),
            Point::new(self.x + self.width, self.y + self.height),
        )
    }

    /// Normalized, unrotated bounding box in world coordinates.
    pub fn bounds(&self) -> Rect {
        match &self.kind {
            ElementKind::Freehand { points } | ElementKind::Eraser { points } => {
                points_bounds(points).unwrap_or_else(|| Rect::from_origin_size((self.x, self.y), (0.0, 0.0)))
            }
            ElementKind::Text { text, font_size, text_align, .. } => {
                let (width, height) = measure_text(text, *font_size);
                let left = match text_align {
                    TextAlign::Left => self.x,
                    TextAlign::Center => self.x - width / 2.0,
                    TextAlign::Right => self.x - width,
                };
                Rect::new(left, self.y, left + width, self.y + height)
            }
            _ => Rect::new(self.x, self.y, self.x + self.width, self.y + self.height).abs(),
        }
    }

    pub fn center(&self) -> Point {
        self.bounds().center()
    }

    /// Move the element by a world-space delta.
    pub fn translate(&mut self, delta: Vec2) {
        self.x += delta.x;
        self.y += delta.y;
        if let Some(points) = self.points_mut() {
            for point in points.iter_mut() {
                *point += delta;
            }
        }
    }

    /// Recompute `x, y, width, height` from the stored points.
    pub fn refresh_point_bounds(&mut self) {
        if let Some(bounds) = self.points().and_then(points_bounds) {
            self.x = bounds.x0;
            self.y = bounds.y0;
            self.width = bounds.width();
            self.height = bounds.height();
        }
    }

    /// Recompute `width, height` from the text content.
    pub fn refresh_text_bounds(&mut self) {
        if let ElementKind::Text { text, font_size, .. } = &self.kind {
            let (width, height) = measure_text(text, *font_size);
            self.width = width;
            self.height = height;
        }
    }

    /// Copy of this element with a new id, used when splitting strokes.
    pub fn with_fresh_id(&self) -> Self {
        let mut copy = self.clone();
        copy.id = Uuid::new_v4();
        copy.deleted = false;
        copy
    }

    /// Check that geometry is finite and opacity is in range.
    pub fn validate(&self) -> ElementResult<()> {
        let id = self.id;
        let finite = |value: f64, field: &'static str| {
            if value.is_finite() {
                Ok(())
            } else {
                Err(ElementError::NonFinite { id, field })
            }
        };
        finite(self.x, "x")?;
        finite(self.y, "y")?;
        finite(self.width, "width")?;
        finite(self.height, "height")?;
        finite(self.angle, "angle")?;
        finite(self.style.stroke_width, "strokeWidth")?;
        if !(0.0..=1.0).contains(&self.style.opacity) {
            return Err(ElementError::Opacity(self.style.opacity));
        }
        if let Some(points) = self.points() {
            if points.iter().any(|p| !p.is_finite()) {
                return Err(ElementError::NonFinite { id, field: "points" });
            }
        }
        if let ElementKind::Text { font_size, .. } = &self.kind {
            finite(*font_size, "fontSize")?;
        }
        Ok(())
    }
}

/// Approximate text extent: `chars * size * 0.6` by `lines * size * 1.2`.
pub fn measure_text(text: &str, font_size: f64) -> (f64, f64) {
    let lines = text.split('\n').count().max(1);
    let longest = text.split('\n').map(|l| l.chars().count()).max().unwrap_or(0);
    (
        longest as f64 * font_size * TEXT_CHAR_WIDTH,
        lines as f64 * font_size * TEXT_LINE_HEIGHT,
    )
}

fn points_bounds(points: &[Point]) -> Option<Rect> {
    let first = points.first()?;
    let init = Rect::from_points(*first, *first);
    Some(points.iter().skip(1).fold(init, |acc, p| acc.union_pt(*p)))
}
