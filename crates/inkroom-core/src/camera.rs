//! Camera module for pan/zoom transforms.

use crate::config::EngineConfig;
use kurbo::{Affine, Point, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Screen/world coordinate conversion.
pub trait Transform {
    /// Convert a screen point to world coordinates.
    fn screen_to_world(&self, screen_point: Point) -> Point;

    /// Convert a world point to screen coordinates.
    fn world_to_screen(&self, world_point: Point) -> Point;

    /// Current zoom factor.
    fn scale(&self) -> f64;
}

/// Camera manages the view transform for the canvas.
///
/// `world_to_screen(p) = p * zoom + offset`. Each client has its own
/// camera; it is never persisted or synced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camera {
    /// Current translation offset (pan), in screen pixels.
    pub offset: Vec2,
    /// Current zoom level.
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Zoom multiplier per wheel tick towards the user.
    pub zoom_in_factor: f64,
    /// Zoom multiplier per wheel tick away from the user.
    pub zoom_out_factor: f64,
    /// Last pointer position while a pan drag is active.
    #[serde(skip)]
    pan_anchor: Option<Point>,
}

impl Default for Camera {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl Camera {
    /// Create a new camera with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            offset: Vec2::ZERO,
            zoom: 1.0,
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
            zoom_in_factor: config.zoom_in_factor,
            zoom_out_factor: config.zoom_out_factor,
            pan_anchor: None,
        }
    }

    /// Camera at zoom 1 with the world origin in the middle of the viewport.
    pub fn centered(viewport: Size, config: &EngineConfig) -> Self {
        let mut camera = Self::from_config(config);
        camera.offset = Vec2::new(viewport.width / 2.0, viewport.height / 2.0);
        camera
    }

    /// Get the affine transform for rendering.
    ///
    /// This transform converts world coordinates to screen coordinates.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset) * Affine::scale(self.zoom)
    }

    /// Get the inverse transform for input handling.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.zoom) * Affine::translate(-self.offset)
    }

    /// Pan the camera by a delta in screen coordinates.
    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Zoom the camera, keeping the given screen point fixed.
    ///
    /// Returns false when the clamped zoom did not change.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) -> bool {
        let new_zoom = (self.zoom * factor).clamp(self.min_zoom, self.max_zoom);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return false;
        }

        let world_point = self.screen_to_world(screen_point);
        self.zoom = new_zoom;

        // Keep world_point under the cursor
        let new_screen = self.world_to_screen(world_point);
        self.offset += screen_point - new_screen;
        true
    }

    /// Apply one wheel tick. Negative `delta_y` zooms in.
    pub fn wheel(&mut self, screen_point: Point, delta_y: f64) -> bool {
        if delta_y == 0.0 {
            return false;
        }
        let factor = if delta_y < 0.0 {
            self.zoom_in_factor
        } else {
            self.zoom_out_factor
        };
        self.zoom_at(screen_point, factor)
    }

    /// Start a pan drag at a screen position.
    pub fn begin_pan(&mut self, screen_point: Point) {
        self.pan_anchor = Some(screen_point);
    }

    /// Continue a pan drag. Returns false when no pan is active.
    pub fn drag_pan(&mut self, screen_point: Point) -> bool {
        let Some(anchor) = self.pan_anchor else {
            return false;
        };
        self.pan(screen_point - anchor);
        self.pan_anchor = Some(screen_point);
        true
    }

    pub fn end_pan(&mut self) {
        self.pan_anchor = None;
    }

    pub fn is_panning(&self) -> bool {
        self.pan_anchor.is_some()
    }
}

impl Transform for Camera {
    fn screen_to_world(&self, screen_point: Point) -> Point {
        self.inverse_transform() * screen_point
    }

    fn world_to_screen(&self, world_point: Point) -> Point {
        self.transform() * world_point
    }

    fn scale(&self) -> f64 {
        self.zoom
    }
}
