//! Viewport camera used for zoom-to-fit after an import.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Zoom level shown as 100%.
pub const DEFAULT_ZOOM: f64 = 1.0;

/// Pan/zoom state of a whiteboard's viewport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Translation in screen space.
    pub offset: Vec2,
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            zoom: DEFAULT_ZOOM,
            min_zoom: 0.1,
            max_zoom: 8.0,
        }
    }
}

impl Camera {
    /// Create a camera at 100% with no pan.
    pub fn new() -> Self {
        Self::default()
    }

    /// World-to-screen transform.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset) * Affine::scale(self.zoom)
    }

    /// Convert world coordinates to screen coordinates.
    pub fn world_to_screen(&self, world_point: Point) -> Point {
        self.transform() * world_point
    }

    /// Reset pan and zoom.
    pub fn reset(&mut self) {
        self.offset = Vec2::ZERO;
        self.zoom = DEFAULT_ZOOM;
    }

    /// Camera `t` of the way from `self` to `target` (`t` clamped to 0..=1).
    pub fn lerp(&self, target: &Camera, t: f64) -> Camera {
        let t = t.clamp(0.0, 1.0);
        Camera {
            offset: self.offset.lerp(target.offset, t),
            zoom: self.zoom + (target.zoom - self.zoom) * t,
            ..target.clone()
        }
    }

    /// Zoom and center so `bounds` fills `viewport` minus `padding` on each side.
    pub fn fit_to_bounds(&mut self, bounds: Rect, viewport: Size, padding: f64) {
        if bounds.is_zero_area() {
            self.reset();
            self.offset = Vec2::new(
                viewport.width / 2.0 - bounds.center().x,
                viewport.height / 2.0 - bounds.center().y,
            );
            return;
        }

        let available = Size::new(
            (viewport.width - padding * 2.0).max(1.0),
            (viewport.height - padding * 2.0).max(1.0),
        );

        let scale_x = available.width / bounds.width();
        let scale_y = available.height / bounds.height();
        self.zoom = scale_x.min(scale_y).clamp(self.min_zoom, self.max_zoom);

        let center = bounds.center();
        self.offset = Vec2::new(
            viewport.width / 2.0 - center.x * self.zoom,
            viewport.height / 2.0 - center.y * self.zoom,
        );
    }
}
