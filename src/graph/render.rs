//! Rendering - draws nodes, edges, and overlays using egui::Painter.
//!
//! All drawing uses world coordinates transformed by the camera. Hidden
//! elements are skipped, provisional edges are dashed, selection halos ring
//! the active group, and the hover popup's type buckets are returned as
//! clickable screen rects for the widget to hit-test.

use egui::{Align2, Color32, FontId, Pos2, Rect, Shape, Stroke, Vec2};

use crate::graph::camera::Camera2D;
use crate::graph::expand::{FailureMarker, HoverPopup};
use crate::graph::surface::GraphSurface;
use crate::graph::types::{GraphEdge, GraphNode};

const ARROW_SIZE: f32 = 8.0;
const HALO_COLOR: Color32 = Color32::from_rgb(96, 165, 250);
const FAILURE_COLOR: Color32 = Color32::from_rgb(248, 113, 113);
const POPUP_BG: Color32 = Color32::from_rgba_premultiplied(30, 41, 59, 230);
const POPUP_ROW_HEIGHT: f32 = 20.0;
const LASSO_COLOR: Color32 = Color32::from_rgb(134, 239, 172);

/// Overlay state drawn on top of the graph.
#[derive(Default)]
pub struct RenderOptions<'a> {
    /// Node ids ringed with the selection halo
    pub halo: &'a [String],
    /// Transient expansion-failure markers
    pub failures: &'a [FailureMarker],
    /// Per-type count popup for the hovered node
    pub popup: Option<&'a HoverPopup>,
    /// Lasso path in world coordinates, while a gesture is in progress
    pub lasso: &'a [Pos2],
    /// Currently hovered node
    pub hovered: Option<&'a str>,
}

/// One clickable popup row: screen rect plus the node type it expands.
#[derive(Debug, Clone)]
pub struct PopupBucketHit {
    pub rect: Rect,
    pub node_type: String,
}

pub struct GraphRenderer;

impl Default for GraphRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Render the whole surface. Returns the popup's clickable rows.
    pub fn render(
        &self,
        painter: &egui::Painter,
        surface: &GraphSurface,
        camera: &Camera2D,
        screen_rect: Rect,
        opts: &RenderOptions<'_>,
    ) -> Vec<PopupBucketHit> {
        let settings = surface.settings();
        let zoom = camera.zoom();
        let show_labels = zoom >= settings.label_zoom_threshold;

        // Edges first (below nodes).
        for edge in surface.edges() {
            if edge.hidden {
                continue;
            }
            self.render_edge(painter, surface, edge, camera, screen_rect, show_labels);
        }

        for node in surface.nodes() {
            if node.hidden {
                continue;
            }
            let haloed = opts.halo.iter().any(|id| id == &node.id);
            let hovered = opts.hovered == Some(node.id.as_str());
            self.render_node(painter, node, camera, screen_rect, settings.node_scale, haloed, hovered, show_labels);
        }

        self.render_lasso(painter, opts.lasso, camera, screen_rect);
        self.render_failures(painter, surface, opts.failures, camera, screen_rect);
        self.render_popup(painter, surface, opts.popup, camera, screen_rect)
    }

    fn render_edge(
        &self,
        painter: &egui::Painter,
        surface: &GraphSurface,
        edge: &GraphEdge,
        camera: &Camera2D,
        screen_rect: Rect,
        show_labels: bool,
    ) {
        let (Some(source), Some(target)) =
            (surface.get_node(&edge.source_id), surface.get_node(&edge.target_id))
        else {
            return;
        };
        if source.hidden || target.hidden {
            return;
        }

        let zoom = camera.zoom();
        let from = camera.world_to_screen(source.position, screen_rect);
        let to = camera.world_to_screen(target.position, screen_rect);
        let direction = to - from;
        if direction.length() < 1.0 {
            return;
        }
        let unit = direction.normalized();
        let scale = surface.settings().node_scale;
        // Stop the line at the node boundary so the arrow head is visible.
        let tip = to - unit * (target.size * scale * zoom);
        let tail = from + unit * (source.size * scale * zoom);

        let stroke = Stroke::new(surface.settings().edge_width * zoom, edge.color);
        if edge.provisional {
            painter.extend(Shape::dashed_line(&[tail, tip], stroke, 6.0, 4.0));
        } else {
            painter.line_segment([tail, tip], stroke);
        }
        self.render_arrow_head(painter, tip, unit, edge.color, zoom);

        if show_labels {
            let mid = tail + (tip - tail) / 2.0;
            painter.text(
                mid + Vec2::new(0.0, -6.0),
                Align2::CENTER_BOTTOM,
                &edge.label,
                FontId::proportional(10.0 * zoom.clamp(0.5, 1.5)),
                Color32::from_rgb(148, 163, 184),
            );
        }
    }

    fn render_arrow_head(
        &self,
        painter: &egui::Painter,
        tip: Pos2,
        unit: Vec2,
        color: Color32,
        zoom: f32,
    ) {
        let size = ARROW_SIZE * zoom.clamp(0.5, 2.0);
        let normal = Vec2::new(-unit.y, unit.x);
        let base = tip - unit * size;
        painter.add(Shape::convex_polygon(
            vec![
                tip,
                base + normal * (size * 0.5),
                base - normal * (size * 0.5),
            ],
            color,
            Stroke::NONE,
        ));
    }

    #[allow(clippy::too_many_arguments)]
    fn render_node(
        &self,
        painter: &egui::Painter,
        node: &GraphNode,
        camera: &Camera2D,
        screen_rect: Rect,
        node_scale: f32,
        haloed: bool,
        hovered: bool,
        show_labels: bool,
    ) {
        let zoom = camera.zoom();
        let center = camera.world_to_screen(node.position, screen_rect);
        let radius = node.size * node_scale * zoom;

        if haloed {
            painter.circle_stroke(center, radius + 4.0 * zoom, Stroke::new(2.5 * zoom, HALO_COLOR));
        }
        painter.circle_filled(center, radius, node.color);
        let rim = if hovered {
            Stroke::new(2.0 * zoom, Color32::WHITE)
        } else {
            Stroke::new(1.0 * zoom, Color32::from_rgb(30, 41, 59))
        };
        painter.circle_stroke(center, radius, rim);

        // Pinned nodes get a small anchor dot.
        if node.fixed {
            painter.circle_filled(center, (2.0 * zoom).max(1.0), Color32::WHITE);
        }

        if show_labels {
            painter.text(
                center + Vec2::new(0.0, radius + 4.0),
                Align2::CENTER_TOP,
                &node.label,
                FontId::proportional(12.0 * zoom.clamp(0.5, 1.5)),
                Color32::from_rgb(226, 232, 240),
            );
        }
    }

    fn render_lasso(
        &self,
        painter: &egui::Painter,
        lasso: &[Pos2],
        camera: &Camera2D,
        screen_rect: Rect,
    ) {
        if lasso.len() < 2 {
            return;
        }
        let points: Vec<Pos2> = lasso
            .iter()
            .map(|p| camera.world_to_screen(*p, screen_rect))
            .collect();
        painter.add(Shape::line(points, Stroke::new(1.5, LASSO_COLOR)));
    }

    fn render_failures(
        &self,
        painter: &egui::Painter,
        surface: &GraphSurface,
        failures: &[FailureMarker],
        camera: &Camera2D,
        screen_rect: Rect,
    ) {
        for failure in failures {
            let Some(node) = surface.get_node(&failure.node_id) else {
                continue;
            };
            let center = camera.world_to_screen(node.position, screen_rect);
            let anchor = center + Vec2::new(0.0, -node.size * camera.zoom() - 8.0);
            painter.text(
                anchor,
                Align2::CENTER_BOTTOM,
                format!("! {}", failure.message),
                FontId::proportional(11.0),
                FAILURE_COLOR,
            );
        }
    }

    /// Draw the hover popup and return one hit rect per type bucket.
    fn render_popup(
        &self,
        painter: &egui::Painter,
        surface: &GraphSurface,
        popup: Option<&HoverPopup>,
        camera: &Camera2D,
        screen_rect: Rect,
    ) -> Vec<PopupBucketHit> {
        let Some(popup) = popup else {
            return Vec::new();
        };
        let Some(node) = surface.get_node(&popup.node_id) else {
            return Vec::new();
        };
        if popup.buckets.is_empty() {
            return Vec::new();
        }

        let anchor = camera.world_to_screen(node.position, screen_rect)
            + Vec2::new(node.size * camera.zoom() + 12.0, 0.0);
        let width = 140.0;
        let height = popup.buckets.len() as f32 * POPUP_ROW_HEIGHT + 8.0;
        let frame = Rect::from_min_size(anchor, Vec2::new(width, height));
        painter.rect_filled(frame, 4.0, POPUP_BG);

        let mut hits = Vec::with_capacity(popup.buckets.len());
        for (i, bucket) in popup.buckets.iter().enumerate() {
            let row = Rect::from_min_size(
                anchor + Vec2::new(4.0, 4.0 + i as f32 * POPUP_ROW_HEIGHT),
                Vec2::new(width - 8.0, POPUP_ROW_HEIGHT),
            );
            painter.text(
                row.left_center(),
                Align2::LEFT_CENTER,
                format!("{} ({})", bucket.node_type, bucket.count),
                FontId::proportional(12.0),
                Color32::from_rgb(226, 232, 240),
            );
            hits.push(PopupBucketHit {
                rect: row,
                node_type: bucket.node_type.clone(),
            });
        }
        hits
    }
}
