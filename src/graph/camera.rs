//! Camera over the graph's world space.
//!
//! Pan and zoom are spring-animated; the widget calls [`Camera2D::update`]
//! once per frame, moves the camera from input (`pan`, `zoom_at`,
//! `fit_to_bounds`), and feeds the transforms to hit testing and the
//! renderer. State is UI-only and polled, never pushed.

use super::animation::{SpringConfig, SpringF32, SpringVec2};
use egui::{Pos2, Rect, Vec2};

/// Spring-animated pan/zoom camera.
#[derive(Debug, Clone)]
pub struct Camera2D {
    /// View center in world coordinates (animated)
    position: SpringVec2,
    /// Zoom level (animated) - 1.0 = 100%
    zoom: SpringF32,
    pub min_zoom: f32,
    pub max_zoom: f32,
}

impl Default for Camera2D {
    fn default() -> Self {
        let config = SpringConfig::from_preset("medium");
        Self {
            position: SpringVec2::with_config(0.0, 0.0, config),
            zoom: SpringF32::with_config(1.0, config),
            min_zoom: 0.1,
            max_zoom: 5.0,
        }
    }
}

impl Camera2D {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current view center in world coordinates
    pub fn center(&self) -> Pos2 {
        self.position.get_pos2()
    }

    /// Current zoom level, mirrored to the surface as the camera ratio
    pub fn zoom(&self) -> f32 {
        self.zoom.get()
    }

    /// Advance the springs (call every frame)
    pub fn update(&mut self, dt: f32) {
        self.position.tick(dt);
        self.zoom.tick(dt);
    }

    /// Jump to the animation targets immediately (initial fit, tests)
    pub fn snap_to_target(&mut self) {
        let (tx, ty) = self.position.target();
        self.position.set_immediate(tx, ty);
        self.zoom.set_immediate(self.zoom.target());
    }

    /// True while either spring is still converging; the widget keeps
    /// requesting repaints until this clears.
    pub fn is_animating(&self) -> bool {
        self.position.is_animating() || self.zoom.is_animating()
    }

    /// Pan by a pointer delta in screen coordinates. The view follows the
    /// drag, so the world moves with the pointer.
    pub fn pan(&mut self, screen_delta: Vec2) {
        let world_delta = screen_delta / self.zoom.get();
        let (tx, ty) = self.position.target();
        self.position
            .set_target(tx - world_delta.x, ty - world_delta.y);
    }

    /// Zoom by a factor, keeping the world point under `screen_pos` fixed
    /// in view (scroll-wheel zoom about the cursor).
    pub fn zoom_at(&mut self, factor: f32, screen_pos: Pos2, screen_rect: Rect) {
        let old_zoom = self.zoom.target();
        let new_zoom = self.clamp_zoom(old_zoom * factor);
        if (new_zoom - old_zoom).abs() <= 0.001 {
            return;
        }

        // Keep the cursor's world point stationary: the center shifts by
        // the difference the zoom change makes to the cursor offset.
        let offset = screen_pos - screen_rect.center();
        let correction = offset / old_zoom - offset / new_zoom;
        let (tx, ty) = self.position.target();
        self.position.set_target(tx + correction.x, ty + correction.y);
        self.zoom.set_target(new_zoom);
    }

    /// Center on a world-space bounding box and zoom until it fills the
    /// screen minus `padding`. Degenerate bounds (empty graph) are ignored.
    pub fn fit_to_bounds(&mut self, bounds: Rect, screen_rect: Rect, padding: f32) {
        if bounds.is_negative() || bounds.width() < 1.0 || bounds.height() < 1.0 {
            return;
        }

        self.position
            .set_target(bounds.center().x, bounds.center().y);

        let usable = screen_rect.size() - Vec2::splat(2.0 * padding);
        let fit = (usable.x / bounds.width()).min(usable.y / bounds.height());
        self.zoom.set_target(self.clamp_zoom(fit));
    }

    fn clamp_zoom(&self, zoom: f32) -> f32 {
        zoom.clamp(self.min_zoom, self.max_zoom)
    }

    // =========================================================================
    // COORDINATE TRANSFORMS
    // =========================================================================

    /// World position to screen position
    pub fn world_to_screen(&self, world_pos: Pos2, screen_rect: Rect) -> Pos2 {
        let offset = (world_pos - self.center()) * self.zoom.get();
        screen_rect.center() + offset
    }

    /// Screen position to world position
    pub fn screen_to_world(&self, screen_pos: Pos2, screen_rect: Rect) -> Pos2 {
        let offset = (screen_pos - screen_rect.center()) / self.zoom.get();
        self.center() + offset
    }
}

// =============================================================================
// TESTS
// =============================================================================
