//! Render surface - owns the node/edge collections, visual settings, the
//! event bindings, and the spatial index.
//!
//! Every mutating operation tolerates "already absent" and "already present":
//! the return value says whether anything changed, so callers branch on a
//! `bool` instead of catching anything. Multiple modules race to mutate the
//! same collections; none of these paths panic.
//!
//! After a batch of mutations, call [`GraphSurface::refresh`] to rebuild the
//! spatial index and dispatch queued events. For rapid settings-only changes
//! (live slider drags) use [`GraphSurface::refresh_settings_only`], which
//! skips the reindex.

use std::collections::{HashMap, VecDeque};

use crate::error::GraphBrowserError;
use crate::graph::spatial::{SpatialEntry, SpatialIndex};
use crate::graph::types::{EdgePatch, GraphEdge, GraphNode, NodePatch};

// =============================================================================
// SETTINGS
// =============================================================================

/// Value for [`GraphSurface::change_setting`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingValue {
    Float(f32),
    Bool(bool),
}

/// Visual settings, adjustable at runtime by key.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceSettings {
    /// Multiplier applied to every node's visual size
    pub node_scale: f32,
    /// Base edge stroke width in world units
    pub edge_width: f32,
    /// Camera zoom below which edge labels are not drawn
    pub label_zoom_threshold: f32,
    /// World-space distance within which a pointer counts as hovering a node
    pub hover_threshold: f32,
    /// Whether camera movement is animated
    pub animate_camera: bool,
}

impl Default for SurfaceSettings {
    fn default() -> Self {
        Self {
            node_scale: 1.0,
            edge_width: 1.5,
            label_zoom_threshold: 0.5,
            hover_threshold: 8.0,
            animate_camera: true,
        }
    }
}

// =============================================================================
// EVENTS
// =============================================================================

/// Interaction and mutation events dispatched to bound handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    NodeAdded { id: String },
    NodeDropped { id: String },
    NodeUpdated { id: String },
    EdgeAdded { id: String },
    EdgeDropped { id: String },
    EdgeUpdated { id: String },
    NodeClicked { id: String },
    NodeHovered { id: String },
    DragStarted { id: String },
    DragEnded { id: String },
    /// Transient failure marker (fetch timeout, rejected create)
    OperationFailed { id: String, message: String },
}

/// Discriminant used when binding handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceEventKind {
    NodeAdded,
    NodeDropped,
    NodeUpdated,
    EdgeAdded,
    EdgeDropped,
    EdgeUpdated,
    NodeClicked,
    NodeHovered,
    DragStarted,
    DragEnded,
    OperationFailed,
}

impl SurfaceEvent {
    pub fn kind(&self) -> SurfaceEventKind {
        match self {
            SurfaceEvent::NodeAdded { .. } => SurfaceEventKind::NodeAdded,
            SurfaceEvent::NodeDropped { .. } => SurfaceEventKind::NodeDropped,
            SurfaceEvent::NodeUpdated { .. } => SurfaceEventKind::NodeUpdated,
            SurfaceEvent::EdgeAdded { .. } => SurfaceEventKind::EdgeAdded,
            SurfaceEvent::EdgeDropped { .. } => SurfaceEventKind::EdgeDropped,
            SurfaceEvent::EdgeUpdated { .. } => SurfaceEventKind::EdgeUpdated,
            SurfaceEvent::NodeClicked { .. } => SurfaceEventKind::NodeClicked,
            SurfaceEvent::NodeHovered { .. } => SurfaceEventKind::NodeHovered,
            SurfaceEvent::DragStarted { .. } => SurfaceEventKind::DragStarted,
            SurfaceEvent::DragEnded { .. } => SurfaceEventKind::DragEnded,
            SurfaceEvent::OperationFailed { .. } => SurfaceEventKind::OperationFailed,
        }
    }
}

type EventHandler = Box<dyn FnMut(&SurfaceEvent) + Send>;

struct EventBinding {
    id: u64,
    kind: SurfaceEventKind,
    handler: EventHandler,
}

// =============================================================================
// SURFACE
// =============================================================================

/// The render surface.
pub struct GraphSurface {
    nodes: HashMap<String, GraphNode>,
    edges: HashMap<String, GraphEdge>,
    settings: SurfaceSettings,
    index: SpatialIndex,
    bindings: Vec<EventBinding>,
    queue: VecDeque<SurfaceEvent>,
    next_binding: u64,
    camera_ratio: f32,
}

impl std::fmt::Debug for GraphSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphSurface")
            .field("nodes", &self.nodes.len())
            .field("edges", &self.edges.len())
            .field("bindings", &self.bindings.len())
            .finish_non_exhaustive()
    }
}

impl Default for GraphSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphSurface {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            settings: SurfaceSettings::default(),
            index: SpatialIndex::new(),
            bindings: Vec::new(),
            queue: VecDeque::new(),
            next_binding: 1,
            camera_ratio: 1.0,
        }
    }

    // =========================================================================
    // NODE OPERATIONS
    // =========================================================================

    /// Add a node. Returns false (and changes nothing) when the id is
    /// already present.
    pub fn add_node(&mut self, node: GraphNode) -> bool {
        if self.nodes.contains_key(&node.id) {
            return false;
        }
        self.queue.push_back(SurfaceEvent::NodeAdded { id: node.id.clone() });
        self.nodes.insert(node.id.clone(), node);
        true
    }

    /// Drop a node and its incident edges. Returns false when the id was
    /// not present.
    pub fn drop_node(&mut self, id: &str) -> bool {
        if self.nodes.remove(id).is_none() {
            return false;
        }
        let incident: Vec<String> = self
            .edges
            .values()
            .filter(|e| e.source_id == id || e.target_id == id)
            .map(|e| e.id.clone())
            .collect();
        for edge_id in incident {
            self.edges.remove(&edge_id);
            self.queue.push_back(SurfaceEvent::EdgeDropped { id: edge_id });
        }
        self.queue.push_back(SurfaceEvent::NodeDropped { id: id.to_owned() });
        true
    }

    /// Apply a partial update. Returns false when the id is unknown.
    pub fn update_node(&mut self, id: &str, patch: &NodePatch) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) => {
                patch.apply(node);
                self.queue.push_back(SurfaceEvent::NodeUpdated { id: id.to_owned() });
                true
            }
            None => false,
        }
    }

    pub fn get_node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // =========================================================================
    // EDGE OPERATIONS
    // =========================================================================

    /// Add an edge. Returns false when the id is already present or either
    /// endpoint is missing from the surface.
    pub fn add_edge(&mut self, edge: GraphEdge) -> bool {
        if self.edges.contains_key(&edge.id) {
            return false;
        }
        if !self.nodes.contains_key(&edge.source_id) || !self.nodes.contains_key(&edge.target_id) {
            tracing::debug!(edge = %edge.id, "add_edge skipped: endpoint missing");
            return false;
        }
        self.queue.push_back(SurfaceEvent::EdgeAdded { id: edge.id.clone() });
        self.edges.insert(edge.id.clone(), edge);
        true
    }

    /// Drop an edge. Returns false when the id was not present or the edge
    /// is locked (create request in flight).
    pub fn drop_edge(&mut self, id: &str) -> bool {
        match self.edges.get(id) {
            Some(edge) if edge.locked => {
                tracing::debug!(edge = id, "drop_edge refused: locked");
                false
            }
            Some(_) => {
                self.edges.remove(id);
                self.queue.push_back(SurfaceEvent::EdgeDropped { id: id.to_owned() });
                true
            }
            None => false,
        }
    }

    /// Drop whatever carries this id: node first, then edge.
    pub fn drop_element(&mut self, id: &str) -> bool {
        self.drop_node(id) || self.drop_edge(id)
    }

    /// Apply a partial update. Returns false when the id is unknown.
    pub fn update_edge(&mut self, id: &str, patch: &EdgePatch) -> bool {
        match self.edges.get_mut(id) {
            Some(edge) => {
                patch.apply(edge);
                self.queue.push_back(SurfaceEvent::EdgeUpdated { id: id.to_owned() });
                true
            }
            None => false,
        }
    }

    pub fn get_edge(&self, id: &str) -> Option<&GraphEdge> {
        self.edges.get(id)
    }

    pub fn contains_edge(&self, id: &str) -> bool {
        self.edges.contains_key(id)
    }

    pub fn edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges.values()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edges touching a node, in either direction.
    pub fn edges_of_node<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a GraphEdge> {
        self.edges
            .values()
            .filter(move |e| e.source_id == node_id || e.target_id == node_id)
    }

    // =========================================================================
    // SETTINGS / CAMERA
    // =========================================================================

    pub fn settings(&self) -> &SurfaceSettings {
        &self.settings
    }

    /// Change one setting by key. Unknown keys and mismatched value kinds
    /// are reported, not panicked on.
    pub fn change_setting(&mut self, key: &str, value: SettingValue) -> Result<(), GraphBrowserError> {
        use SettingValue::*;
        match (key, value) {
            ("node_scale", Float(v)) => self.settings.node_scale = v,
            ("edge_width", Float(v)) => self.settings.edge_width = v,
            ("label_zoom_threshold", Float(v)) => self.settings.label_zoom_threshold = v,
            ("hover_threshold", Float(v)) => self.settings.hover_threshold = v,
            ("animate_camera", Bool(v)) => self.settings.animate_camera = v,
            ("animate_camera", _) => {
                return Err(GraphBrowserError::SettingType(key.to_owned(), "bool"))
            }
            ("node_scale" | "edge_width" | "label_zoom_threshold" | "hover_threshold", _) => {
                return Err(GraphBrowserError::SettingType(key.to_owned(), "float"))
            }
            _ => return Err(GraphBrowserError::UnknownSetting(key.to_owned())),
        }
        Ok(())
    }

    /// Current camera zoom ratio, mirrored here each frame by the widget.
    pub fn camera_ratio(&self) -> f32 {
        self.camera_ratio
    }

    pub(crate) fn set_camera_ratio(&mut self, ratio: f32) {
        self.camera_ratio = ratio;
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    /// Register a handler for one event kind. Returns the binding id.
    pub fn bind_event(&mut self, kind: SurfaceEventKind, handler: EventHandler) -> u64 {
        let id = self.next_binding;
        self.next_binding += 1;
        self.bindings.push(EventBinding { id, kind, handler });
        id
    }

    /// Remove a binding. Returns false when the id is unknown.
    pub fn unbind_event(&mut self, binding_id: u64) -> bool {
        let before = self.bindings.len();
        self.bindings.retain(|b| b.id != binding_id);
        self.bindings.len() != before
    }

    /// Queue an interaction event for dispatch on the next refresh.
    pub fn emit(&mut self, event: SurfaceEvent) {
        self.queue.push_back(event);
    }

    fn dispatch_events(&mut self) {
        while let Some(event) = self.queue.pop_front() {
            let kind = event.kind();
            for binding in self.bindings.iter_mut() {
                if binding.kind == kind {
                    (binding.handler)(&event);
                }
            }
        }
    }

    // =========================================================================
    // REFRESH / HIT TESTING
    // =========================================================================

    /// Rebuild the spatial index over visible nodes and dispatch queued
    /// events.
    pub fn refresh(&mut self) {
        let scale = self.settings.node_scale;
        let entries = self
            .nodes
            .values()
            .filter(|n| !n.hidden)
            .map(|n| SpatialEntry::new(n.id.clone(), [n.position.x, n.position.y], n.size * scale))
            .collect::<Vec<_>>();
        self.index.rebuild(entries.into_iter());
        self.dispatch_events();
    }

    /// Fast path for rapid settings-only changes: dispatches events but
    /// skips the spatial reindex.
    pub fn refresh_settings_only(&mut self) {
        self.dispatch_events();
    }

    /// Id of the closest visible node within `threshold` world units.
    pub fn hit_test(&self, world: egui::Pos2, threshold: f32) -> Option<&str> {
        self.index
            .hit_test([world.x, world.y], threshold)
            .map(|e| e.id.as_str())
    }

    /// Ids of visible nodes within `radius` of a world position.
    pub fn nodes_within(&self, world: egui::Pos2, radius: f32) -> Vec<&str> {
        self.index
            .query_radius([world.x, world.y], radius)
            .into_iter()
            .map(|e| e.id.as_str())
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
