//! Vello-backed surface for GPU rendering.

use crate::surface::Surface;
use kurbo::{Affine, BezPath, Point, Rect, Size, Stroke};
use parley::layout::PositionedLayoutItem;
use parley::{FontContext, LayoutContext, StyleProperty};
use peniko::{BlendMode, Brush, Color, Compose, Fill, Mix};
use vello::Scene;

/// Surface that builds a [`vello::Scene`] for the host to submit.
pub struct VelloSurface {
    scene: Scene,
    size: Size,
    font_cx: FontContext,
    layout_cx: LayoutContext<Brush>,
    layers: usize,
}

impl VelloSurface {
    pub fn new(size: Size) -> Self {
        Self {
            scene: Scene::new(),
            size,
            font_cx: FontContext::new(),
            layout_cx: LayoutContext::new(),
            layers: 0,
        }
    }

    /// Register font data (TTF/OTF) for text rendering.
    pub fn register_font(&mut self, data: Vec<u8>) {
        let families = self
            .font_cx
            .collection
            .register_fonts(vello::peniko::Blob::new(std::sync::Arc::new(data)), None);
        log::debug!("registered {} font family(ies)", families.len());
    }

    pub fn resize(&mut self, size: Size) {
        self.size = size;
    }

    /// The scene built for the last frame.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Take ownership of the scene (resets internal scene).
    pub fn take_scene(&mut self) -> Scene {
        std::mem::take(&mut self.scene)
    }

    fn layout(&mut self, text: &str, font_size: f64, font_family: &str, color: Color) -> parley::Layout<Brush> {
        let mut builder = self.layout_cx.ranged_builder(&mut self.font_cx, text, 1.0, false);
        builder.push_default(StyleProperty::FontSize(font_size as f32));
        builder.push_default(StyleProperty::Brush(Brush::Solid(color)));
        builder.push_default(StyleProperty::FontStack(parley::FontStack::Source(
            font_family.to_string().into(),
        )));
        let mut layout = builder.build(text);
        layout.break_all_lines(None);
        layout.align(None, parley::Alignment::Start, parley::AlignmentOptions::default());
        layout
    }
}

impl Surface for VelloSurface {
    fn size(&self) -> Size {
        self.size
    }

    fn clear(&mut self, color: Color) {
        self.scene.reset();
        self.layers = 0;
        let rect = Rect::from_origin_size(Point::ZERO, self.size);
        self.scene.fill(Fill::NonZero, Affine::IDENTITY, color, None, &rect);
    }

    fn fill(&mut self, transform: Affine, color: Color, path: &BezPath) {
        self.scene.fill(Fill::NonZero, transform, color, None, path);
    }

    fn stroke(&mut self, style: &Stroke, transform: Affine, color: Color, path: &BezPath) {
        self.scene.stroke(style, transform, color, None, path);
    }

    fn push_compose(&mut self, compose: Compose) {
        let clip = Rect::from_origin_size(Point::ZERO, self.size);
        self.scene
            .push_layer(BlendMode::new(Mix::Normal, compose), 1.0, Affine::IDENTITY, &clip);
        self.layers += 1;
    }

    fn pop_compose(&mut self) {
        if self.layers > 0 {
            self.scene.pop_layer();
            self.layers -= 1;
        }
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
        let layout = self.layout(text, font_size, font_family, color);
        let brush = Brush::Solid(color);
        // Parley puts y=0 at the top of the first line
        let text_transform = transform * Affine::translate(origin.to_vec2());

        for line in layout.lines() {
            for item in line.items() {
                let PositionedLayoutItem::GlyphRun(glyph_run) = item else {
                    continue;
                };
                let mut x = glyph_run.offset();
                let y = glyph_run.baseline();
                let run = glyph_run.run();
                let synthesis = run.synthesis();
                let glyph_xform = synthesis
                    .skew()
                    .map(|angle| Affine::skew(angle.to_radians().tan() as f64, 0.0));
                let glyphs: Vec<vello::Glyph> = glyph_run
                    .glyphs()
                    .map(|glyph| {
                        let gx = x + glyph.x;
                        let gy = y - glyph.y;
                        x += glyph.advance;
                        vello::Glyph { id: glyph.id, x: gx, y: gy }
                    })
                    .collect();
                if glyphs.is_empty() {
                    continue;
                }
                self.scene
                    .draw_glyphs(run.font())
                    .brush(&brush)
                    .hint(true)
                    .transform(text_transform)
                    .glyph_transform(glyph_xform)
                    .font_size(run.font_size())
                    .normalized_coords(run.normalized_coords())
                    .draw(Fill::NonZero, glyphs.into_iter());
            }
        }
    }

    fn measure_text(&mut self, text: &str, font_size: f64, font_family: &str) -> Size {
        let layout = self.layout(text, font_size, font_family, Color::from_rgba8(0, 0, 0, 255));
        if layout.width() > 0.0 {
            Size::new(layout.width() as f64, layout.height() as f64)
        } else {
            // No fonts registered; fall back to the approximate metrics
            let (width, height) = inkroom_core::elements::measure_text(text, font_size);
            Size::new(width, height)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{RenderContext, Renderer};
    use inkroom_core::camera::Camera;
    use inkroom_core::elements::{Element, ElementStyle};
    use inkroom_core::frame::RedrawFlag;

    #[test]
    fn test_surface_creation() {
        let surface = VelloSurface::new(Size::new(800.0, 600.0));
        assert!(surface.scene().encoding().is_empty());
    }

    #[test]
    fn test_render_scene_with_elements() {
        let surface = VelloSurface::new(Size::new(800.0, 600.0));
        let mut renderer = Renderer::new(Some(surface), RedrawFlag::new()).unwrap();
        let camera = Camera::new();
        let rect = Element::rectangle(Rect::new(100.0, 100.0, 300.0, 250.0), ElementStyle::default());
        let ctx = RenderContext::new(vec![&rect], &camera);
        assert!(renderer.render(&ctx).unwrap());
        assert!(!renderer.surface().scene().encoding().is_empty());
    }
}
