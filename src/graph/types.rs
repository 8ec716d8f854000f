//! Core graph element types shared by every browser module.
//!
//! Ids are opaque server-assigned strings. Visual fields use egui types so
//! the renderer can consume nodes and edges without conversion.

use egui::{Color32, Pos2};

/// A rendered graph node.
///
/// Ownership of the mutable fields is split across modules: the expansion
/// engine adds nodes, the filter toggles `hidden`, the selection tool toggles
/// `fixed`, and drag interaction moves `position`.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    /// Server-assigned id
    pub id: String,
    /// Display label
    pub label: String,
    /// Type tag (schema node type, e.g. "Project")
    pub node_type: String,
    /// Position in world coordinates
    pub position: Pos2,
    /// Visual radius in world units
    pub size: f32,
    /// Fill color
    pub color: Color32,
    /// Hidden elements stay in the collection but are not drawn
    pub hidden: bool,
    /// Pinned against layout movement
    pub fixed: bool,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, label: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            node_type: node_type.into(),
            position: Pos2::ZERO,
            size: 12.0,
            color: Color32::from_rgb(100, 149, 237),
            hidden: false,
            fixed: false,
        }
    }

    /// Builder: set position
    pub fn with_position(mut self, pos: Pos2) -> Self {
        self.position = pos;
        self
    }

    /// Builder: set color
    pub fn with_color(mut self, color: Color32) -> Self {
        self.color = color;
        self
    }

    /// Builder: set visual size
    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }
}

/// A rendered graph edge.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphEdge {
    /// Server-assigned id, or a synthetic uuid while provisional
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    /// Relationship type tag (e.g. "PROJECT_HAS_MILESTONE")
    pub rel_type: String,
    /// Display label (defaults to the relationship type)
    pub label: String,
    pub color: Color32,
    pub hidden: bool,
    /// Not yet persisted - shown during interactive relationship creation
    pub provisional: bool,
    /// Id of the edge this provisional edge visually replaces, if any
    pub replaces: Option<String>,
    /// Advisory lock while a create request is in flight; a locked edge
    /// refuses `drop_edge`
    pub locked: bool,
}

impl GraphEdge {
    pub fn new(
        id: impl Into<String>,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        rel_type: impl Into<String>,
    ) -> Self {
        let rel_type = rel_type.into();
        Self {
            id: id.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            label: rel_type.clone(),
            rel_type,
            color: Color32::from_rgb(148, 163, 184),
            hidden: false,
            provisional: false,
            replaces: None,
            locked: false,
        }
    }

    /// Builder: mark as provisional, optionally replacing another edge
    pub fn provisional(mut self, replaces: Option<String>) -> Self {
        self.provisional = true;
        self.replaces = replaces;
        self
    }

    /// Builder: set color
    pub fn with_color(mut self, color: Color32) -> Self {
        self.color = color;
        self
    }
}

/// Partial update for a node; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct NodePatch {
    pub label: Option<String>,
    pub position: Option<Pos2>,
    pub size: Option<f32>,
    pub color: Option<Color32>,
    pub hidden: Option<bool>,
    pub fixed: Option<bool>,
}

impl NodePatch {
    pub fn position(pos: Pos2) -> Self {
        Self {
            position: Some(pos),
            ..Self::default()
        }
    }

    pub fn hidden(hidden: bool) -> Self {
        Self {
            hidden: Some(hidden),
            ..Self::default()
        }
    }

    pub fn fixed(fixed: bool) -> Self {
        Self {
            fixed: Some(fixed),
            ..Self::default()
        }
    }

    pub(crate) fn apply(&self, node: &mut GraphNode) {
        if let Some(ref label) = self.label {
            node.label = label.clone();
        }
        if let Some(pos) = self.position {
            node.position = pos;
        }
        if let Some(size) = self.size {
            node.size = size;
        }
        if let Some(color) = self.color {
            node.color = color;
        }
        if let Some(hidden) = self.hidden {
            node.hidden = hidden;
        }
        if let Some(fixed) = self.fixed {
            node.fixed = fixed;
        }
    }
}

/// Partial update for an edge; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct EdgePatch {
    pub label: Option<String>,
    pub color: Option<Color32>,
    pub hidden: Option<bool>,
    pub locked: Option<bool>,
}

impl EdgePatch {
    pub fn hidden(hidden: bool) -> Self {
        Self {
            hidden: Some(hidden),
            ..Self::default()
        }
    }

    pub fn locked(locked: bool) -> Self {
        Self {
            locked: Some(locked),
            ..Self::default()
        }
    }

    pub(crate) fn apply(&self, edge: &mut GraphEdge) {
        if let Some(ref label) = self.label {
            edge.label = label.clone();
        }
        if let Some(color) = self.color {
            edge.color = color;
        }
        if let Some(hidden) = self.hidden {
            edge.hidden = hidden;
        }
        if let Some(locked) = self.locked {
            edge.locked = locked;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_builder() {
        let node = GraphNode::new("n1", "Node One", "Project")
            .with_position(Pos2::new(10.0, 20.0))
            .with_size(18.0);
        assert_eq!(node.id, "n1");
        assert_eq!(node.node_type, "Project");
        assert_eq!(node.position, Pos2::new(10.0, 20.0));
        assert!(!node.hidden);
        assert!(!node.fixed);
    }

    #[test]
    fn test_edge_defaults_label_to_rel_type() {
        let edge = GraphEdge::new("e1", "a", "b", "KNOWS");
        assert_eq!(edge.label, "KNOWS");
        assert!(!edge.provisional);
        assert!(!edge.locked);
    }

    #[test]
    fn test_patch_applies_only_set_fields() {
        let mut node = GraphNode::new("n1", "before", "T");
        NodePatch {
            label: Some("after".into()),
            ..NodePatch::default()
        }
        .apply(&mut node);
        assert_eq!(node.label, "after");
        assert_eq!(node.node_type, "T");

        let mut edge = GraphEdge::new("e1", "a", "b", "KNOWS");
        EdgePatch::hidden(true).apply(&mut edge);
        assert!(edge.hidden);
        assert!(!edge.locked);
    }
}
