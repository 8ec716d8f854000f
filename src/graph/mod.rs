//! Interactive graph browser.
//!
//! # Architecture
//!
//! ```text
//! GraphConnection (host transport, injected)
//!        │ replies (crossbeam channel)
//!        ▼
//! GraphBrowserWidget ──► routes replies + input each frame
//!        ├──► GraphSurface (node/edge collections, events, spatial index)
//!        ├──► Expander (hover popup, expand/collapse, undo)
//!        ├──► GraphFilter (type filtering, hide/show)
//!        ├──► SelectionTool (named groups, lasso, halo)
//!        ├──► RelationshipEditor (drag-to-relate, background worker)
//!        └──► GraphRenderer (draws to egui::Painter via Camera2D)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let mut widget = GraphBrowserWidget::new(Box::new(my_connection));
//! widget.surface_mut().add_node(GraphNode::new("p1", "Apollo", "Project"));
//! widget.ui(ui);
//! ```

pub mod animation;
pub mod camera;
pub mod connection;
pub mod expand;
pub mod filter;
pub mod relate;
pub mod render;
pub mod schema;
pub mod select;
pub mod spatial;
pub mod surface;
pub mod types;

pub use camera::Camera2D;
pub use render::{GraphRenderer, PopupBucketHit, RenderOptions};

use std::time::{Duration, Instant};

use egui::{Rect, Sense};

use crate::graph::connection::{ConnectionHandle, ConnectionReply, GraphConnection, RequestId};
use crate::graph::expand::{Expander, ExpansionState, DEFAULT_FETCH_TIMEOUT};
use crate::graph::filter::{FilterMode, GraphFilter};
use crate::graph::relate::{worker::DragKeys, RelationshipEditor, DEFAULT_MAX_DRAG_DISTANCE};
use crate::graph::select::SelectionTool;
use crate::graph::surface::{GraphSurface, SettingValue, SurfaceEvent, SurfaceEventKind};
use crate::graph::types::NodePatch;
use crate::error::GraphBrowserError;

// =============================================================================
// CONFIG
// =============================================================================

/// Construction-time knobs for the browser widget.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// World-space radius within which drag-to-relate proposes edges
    pub max_drag_distance: f32,
    /// Deadline for the pair of expansion fetches
    pub fetch_timeout: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            max_drag_distance: DEFAULT_MAX_DRAG_DISTANCE,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

// =============================================================================
// WIDGET
// =============================================================================

/// Main widget: owns every module and routes input and replies.
pub struct GraphBrowserWidget {
    conn: ConnectionHandle,
    surface: GraphSurface,
    camera: Camera2D,
    expander: Expander,
    filter: GraphFilter,
    selection: SelectionTool,
    /// Present once the schema reply has arrived
    editor: Option<RelationshipEditor>,
    renderer: GraphRenderer,
    config: BrowserConfig,
    schema_request: Option<RequestId>,
    /// Node being dragged, if any
    dragging: Option<String>,
    lassoing: bool,
    hovered: Option<String>,
    popup_hits: Vec<PopupBucketHit>,
    needs_initial_fit: bool,
}

impl GraphBrowserWidget {
    pub fn new(conn: Box<dyn GraphConnection>) -> Self {
        Self::with_config(conn, BrowserConfig::default())
    }

    pub fn with_config(conn: Box<dyn GraphConnection>, config: BrowserConfig) -> Self {
        let mut conn = ConnectionHandle::new(conn);
        // Schema is fetched once, at startup; the editor exists after the
        // reply arrives.
        let schema_request = Some(conn.fetch_schema());
        Self {
            conn,
            surface: GraphSurface::new(),
            camera: Camera2D::new(),
            expander: Expander::new().with_fetch_timeout(config.fetch_timeout),
            filter: GraphFilter::new(),
            selection: SelectionTool::new(),
            editor: None,
            renderer: GraphRenderer::new(),
            config,
            schema_request,
            dragging: None,
            lassoing: false,
            hovered: None,
            popup_hits: Vec::new(),
            needs_initial_fit: true,
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn surface(&self) -> &GraphSurface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut GraphSurface {
        &mut self.surface
    }

    pub fn camera(&self) -> &Camera2D {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera2D {
        &mut self.camera
    }

    pub fn expander(&self) -> &Expander {
        &self.expander
    }

    pub fn selection(&self) -> &SelectionTool {
        &self.selection
    }

    /// True once the schema has loaded and drag-to-relate is available.
    pub fn relationship_editing_ready(&self) -> bool {
        self.editor.is_some()
    }

    // =========================================================================
    // HOST-FACING API
    // =========================================================================

    pub fn bind_event(
        &mut self,
        kind: SurfaceEventKind,
        handler: Box<dyn FnMut(&SurfaceEvent) + Send>,
    ) -> u64 {
        self.surface.bind_event(kind, handler)
    }

    pub fn unbind_event(&mut self, binding_id: u64) -> bool {
        self.surface.unbind_event(binding_id)
    }

    /// Expand every fetched type of a node (double-click affordance).
    pub fn expand_node(&mut self, node_id: &str) -> usize {
        let added = self.expander.expand_all(&mut self.surface, node_id);
        if added > 0 {
            self.sync_editor();
        }
        added
    }

    /// Collapse a node, removing everything its expansion introduced.
    pub fn collapse_node(&mut self, node_id: &str) {
        self.expander.collapse(&mut self.surface, node_id);
        self.sync_editor();
    }

    /// Pop the latest expansion snapshot.
    pub fn undo_expansion(&mut self) -> bool {
        self.expander.undo()
    }

    pub fn add_node_type_to_filter(&mut self, node_type: impl Into<String>) {
        self.filter.add_node_type(node_type);
    }

    pub fn remove_node_type_from_filter(&mut self, node_type: &str) {
        self.filter.remove_node_type(node_type);
    }

    pub fn set_filter_type(&mut self, mode: FilterMode) {
        self.filter.set_mode(mode);
    }

    /// Permanently drop every node the active filter excludes.
    pub fn filter_graph(&mut self) -> usize {
        let dropped = self.filter.filter_graph(&mut self.surface);
        if dropped > 0 {
            self.surface.refresh();
            self.sync_editor();
        }
        dropped
    }

    pub fn hide_node_type(&mut self, node_type: &str, hidden: bool) {
        self.filter.hide_node_type(&mut self.surface, node_type, hidden);
        self.surface.refresh();
    }

    pub fn hide_rel_type(&mut self, rel_type: &str, hidden: bool) {
        self.filter.hide_rel_type(&mut self.surface, rel_type, hidden);
    }

    pub fn hide_nodes<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>, hidden: bool) {
        self.filter.hide_nodes(&mut self.surface, ids, hidden);
        self.surface.refresh();
    }

    pub fn hide_rels<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>, hidden: bool) {
        self.filter.hide_rels(&mut self.surface, ids, hidden);
    }

    pub fn activate_selection(&mut self) {
        self.selection.activate();
    }

    pub fn deactivate_selection(&mut self) {
        self.selection.deactivate();
    }

    pub fn create_new_selection_group(&mut self, name: impl Into<String>) -> u64 {
        self.selection.create_group(name)
    }

    pub fn delete_selection(&mut self, group_id: u64) -> bool {
        self.selection.delete_group(group_id)
    }

    pub fn selection_snapshot(&self) -> Result<String, GraphBrowserError> {
        self.selection.snapshot()
    }

    pub fn restore_selection(&mut self, json: &str) -> Result<(), GraphBrowserError> {
        self.selection.restore(&mut self.surface, json)
    }

    pub fn set_group_hidden(&mut self, group_id: u64, hidden: bool) {
        self.selection.set_group_hidden(&mut self.surface, group_id, hidden);
        self.surface.refresh();
    }

    pub fn set_group_fixed(&mut self, group_id: u64, fixed: bool) {
        self.selection.set_group_fixed(&mut self.surface, group_id, fixed);
    }

    /// Change one visual setting; the fast refresh path skips the spatial
    /// reindex so this is safe to call per slider tick.
    pub fn change_setting(&mut self, key: &str, value: SettingValue) -> Result<(), GraphBrowserError> {
        self.surface.change_setting(key, value)?;
        self.surface.refresh_settings_only();
        Ok(())
    }

    /// Fit the camera to the current graph content.
    pub fn fit_to_content(&mut self, screen_rect: Rect) {
        let mut bounds = Rect::NOTHING;
        for node in self.surface.nodes() {
            if !node.hidden {
                bounds.extend_with(node.position);
            }
        }
        self.camera.fit_to_bounds(bounds.expand(40.0), screen_rect, 50.0);
    }

    // =========================================================================
    // REPLY ROUTING
    // =========================================================================

    fn poll_replies(&mut self) {
        while let Some(reply) = self.conn.try_recv() {
            match reply {
                ConnectionReply::Relationships {
                    request,
                    node_id,
                    direction,
                    result,
                } => {
                    self.expander.handle_relationships(
                        request,
                        &node_id,
                        direction,
                        result,
                        &self.filter,
                        &mut self.surface,
                    );
                }
                ConnectionReply::Schema { request, result } => {
                    if self.schema_request != Some(request) {
                        continue;
                    }
                    self.schema_request = None;
                    match result {
                        Ok(schema) => {
                            let editor =
                                RelationshipEditor::new(schema, self.config.max_drag_distance);
                            editor.sync_graph(&self.surface);
                            self.editor = Some(editor);
                            tracing::info!("schema loaded, relationship editing enabled");
                        }
                        Err(err) => {
                            tracing::warn!(%err, "schema load failed, relationship editing disabled");
                        }
                    }
                }
                ConnectionReply::Created { request, result } => {
                    if let Some(ref mut editor) = self.editor {
                        editor.handle_created(request, result, &mut self.surface, &mut self.conn);
                    }
                }
                ConnectionReply::OfType {
                    request, result, ..
                } => {
                    if let Some(ref mut editor) = self.editor {
                        editor.handle_of_type(request, result, &mut self.surface, &mut self.conn);
                    }
                }
                ConnectionReply::Deleted { request, result } => {
                    if let Err(err) = result {
                        tracing::warn!(request, %err, "relationship delete failed");
                    }
                }
            }
        }
    }

    fn sync_editor(&self) {
        if let Some(ref editor) = self.editor {
            editor.sync_graph(&self.surface);
        }
    }

    // =========================================================================
    // INPUT
    // =========================================================================

    fn drag_keys(ui: &egui::Ui) -> DragKeys {
        let modifiers = ui.input(|i| i.modifiers);
        DragKeys {
            outgoing: modifiers.shift,
            incoming: modifiers.alt,
        }
    }

    fn handle_input(&mut self, ui: &egui::Ui, response: &egui::Response, screen_rect: Rect) {
        let now = Instant::now();
        let pointer = response.hover_pos();
        let world = pointer.map(|p| self.camera.screen_to_world(p, screen_rect));
        let keys = Self::drag_keys(ui);

        // Popup rows eat clicks before the canvas sees them.
        if response.clicked() {
            if let (Some(screen_pos), Some(popup)) = (pointer, self.expander.popup()) {
                let node_id = popup.node_id.clone();
                if let Some(hit) = self
                    .popup_hits
                    .iter()
                    .find(|h| h.rect.contains(screen_pos))
                    .cloned()
                {
                    self.expander
                        .expand(&mut self.surface, &node_id, Some(hit.node_type.as_str()));
                    self.sync_editor();
                    return;
                }
            }
        }

        // Hover tracking drives the expansion state machine.
        let hit = world.and_then(|w| {
            self.surface
                .hit_test(w, self.surface.settings().hover_threshold / self.camera.zoom().max(0.1))
                .map(str::to_owned)
        });
        if hit != self.hovered {
            if let Some(ref id) = hit {
                self.expander.hover_start(id, &mut self.conn, now);
                self.surface.emit(SurfaceEvent::NodeHovered { id: id.clone() });
            } else if self.hovered.is_some() {
                self.expander.hover_end(now);
            }
            self.hovered = hit;
        }

        if response.clicked() {
            if let Some(ref id) = self.hovered {
                self.surface.emit(SurfaceEvent::NodeClicked { id: id.clone() });
            }
        }

        // Double-click: collapse an expanded node, expand-all otherwise.
        if response.double_clicked() {
            if let Some(id) = self.hovered.clone() {
                match self.expander.state(&id) {
                    ExpansionState::Expanded => self.collapse_node(&id),
                    _ => {
                        self.expand_node(&id);
                    }
                }
            }
        }

        if response.drag_started() {
            match (&self.hovered, world) {
                (Some(id), _) => {
                    self.dragging = Some(id.clone());
                    self.surface.emit(SurfaceEvent::DragStarted { id: id.clone() });
                }
                (None, Some(w)) if self.selection.is_active() => {
                    self.lassoing = true;
                    self.selection.begin_lasso(w);
                }
                _ => {}
            }
        }

        if response.dragged() {
            if let (Some(id), Some(w)) = (self.dragging.clone(), world) {
                self.surface.update_node(&id, &NodePatch::position(w));
                if keys.outgoing || keys.incoming {
                    if let Some(ref editor) = self.editor {
                        editor.drag_update(&self.surface, &id, keys);
                    }
                } else if let Some(ref editor) = self.editor {
                    // Key released mid-drag: unwind any proposal.
                    editor.cancel();
                }
            } else if self.lassoing {
                if let Some(w) = world {
                    self.selection.push_lasso_point(w);
                }
            } else {
                // Drag on empty space pans the camera.
                self.camera.pan(response.drag_delta());
            }
        }

        if response.drag_stopped() {
            if let Some(id) = self.dragging.take() {
                if let Some(ref mut editor) = self.editor {
                    if (keys.outgoing || keys.incoming) && editor.has_provisional() {
                        editor.commit(&mut self.surface, &mut self.conn);
                    } else {
                        editor.cancel();
                    }
                }
                self.surface.emit(SurfaceEvent::DragEnded { id });
                self.surface.refresh();
                self.sync_editor();
            }
            if self.lassoing {
                self.lassoing = false;
                let assigned = self.selection.complete_lasso(&mut self.surface);
                if assigned > 0 {
                    self.surface.refresh();
                }
            }
        }

        // Scroll wheel zooms about the cursor.
        let scroll = ui.input(|i| i.smooth_scroll_delta.y);
        if scroll.abs() > 0.0 {
            if let Some(p) = pointer {
                let factor = (scroll * 0.003).exp();
                self.camera.zoom_at(factor, p, screen_rect);
            }
        }
    }

    // =========================================================================
    // FRAME
    // =========================================================================

    /// Main UI function. Call once per frame.
    pub fn ui(&mut self, ui: &mut egui::Ui) {
        self.poll_replies();

        let available = ui.available_size();
        let (response, painter) = ui.allocate_painter(available, Sense::click_and_drag());
        let screen_rect = response.rect;

        if self.needs_initial_fit && self.surface.node_count() > 0 {
            self.fit_to_content(screen_rect);
            self.camera.snap_to_target();
            self.needs_initial_fit = false;
        }

        let dt = ui.input(|i| i.stable_dt);
        self.camera.update(dt);
        self.surface.set_camera_ratio(self.camera.zoom());

        self.handle_input(ui, &response, screen_rect);

        let now = Instant::now();
        self.expander.poll(now, &mut self.surface);
        if let Some(ref mut editor) = self.editor {
            if editor.poll(&mut self.surface) {
                self.surface.refresh();
            }
        }

        let opts = RenderOptions {
            halo: self.selection.halo_nodes(),
            failures: self.expander.failures(),
            popup: self.expander.popup(),
            lasso: self.selection.lasso_path(),
            hovered: self.hovered.as_deref(),
        };
        self.popup_hits = self
            .renderer
            .render(&painter, &self.surface, &self.camera, screen_rect, &opts);

        // Flush queued events without a reindex; mutations above already
        // refreshed where the index matters.
        self.surface.refresh_settings_only();

        if self.camera.is_animating() || self.dragging.is_some() || self.lassoing {
            ui.ctx().request_repaint();
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
