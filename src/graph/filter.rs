//! Node/relationship filtering.
//!
//! Two independent mechanisms:
//! - pre-fetch filtering: a pure predicate over fetched relationship rows,
//!   applied before expansion candidates are counted or merged;
//! - post-render hiding: `hidden`-flag toggles on elements already on the
//!   surface, by type or by explicit id set.
//!
//! Explicit per-id state always wins over type-level toggles: an element
//! hidden (or shown) by id never changes just because its type's toggle
//! flips.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::graph::connection::{Direction, RelationshipRow};
use crate::graph::surface::GraphSurface;
use crate::graph::types::{EdgePatch, NodePatch};

/// How the type list is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// Listed types are removed; everything else passes.
    #[default]
    Blacklist,
    /// Only listed types pass.
    Whitelist,
}

/// Type filter plus hide bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct GraphFilter {
    mode: FilterMode,
    types: BTreeSet<String>,
    hidden_node_types: HashSet<String>,
    hidden_rel_types: HashSet<String>,
    /// Explicit per-node overrides (id -> hidden)
    node_overrides: HashMap<String, bool>,
    /// Explicit per-edge overrides (id -> hidden)
    rel_overrides: HashMap<String, bool>,
}

impl GraphFilter {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // TYPE LIST
    // =========================================================================

    pub fn add_node_type(&mut self, node_type: impl Into<String>) {
        self.types.insert(node_type.into());
    }

    pub fn remove_node_type(&mut self, node_type: &str) {
        self.types.remove(node_type);
    }

    pub fn set_mode(&mut self, mode: FilterMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(|s| s.as_str())
    }

    /// True when the active filter excludes this type.
    pub fn excludes(&self, node_type: &str) -> bool {
        match self.mode {
            FilterMode::Blacklist => self.types.contains(node_type),
            FilterMode::Whitelist => !self.types.contains(node_type),
        }
    }

    // =========================================================================
    // PRE-FETCH FILTERING
    // =========================================================================

    /// Pure predicate over fetch results: keeps exactly the rows whose far
    /// endpoint type passes the active filter.
    pub fn filter_nodes(&self, rows: Vec<RelationshipRow>, direction: Direction) -> Vec<RelationshipRow> {
        rows.into_iter()
            .filter(|row| !self.excludes(&row.far_endpoint(direction).node_type))
            .collect()
    }

    // =========================================================================
    // POST-RENDER HIDING
    // =========================================================================

    /// Toggle the hidden flag of every node of a type, skipping nodes with
    /// an explicit per-id override.
    pub fn hide_node_type(&mut self, surface: &mut GraphSurface, node_type: &str, hidden: bool) {
        if hidden {
            self.hidden_node_types.insert(node_type.to_owned());
        } else {
            self.hidden_node_types.remove(node_type);
        }
        let ids: Vec<String> = surface
            .nodes()
            .filter(|n| n.node_type == node_type)
            .filter(|n| !self.node_overrides.contains_key(&n.id))
            .map(|n| n.id.clone())
            .collect();
        for id in ids {
            surface.update_node(&id, &NodePatch::hidden(hidden));
        }
    }

    /// Toggle the hidden flag of every edge of a relationship type, skipping
    /// edges with an explicit per-id override.
    pub fn hide_rel_type(&mut self, surface: &mut GraphSurface, rel_type: &str, hidden: bool) {
        if hidden {
            self.hidden_rel_types.insert(rel_type.to_owned());
        } else {
            self.hidden_rel_types.remove(rel_type);
        }
        let ids: Vec<String> = surface
            .edges()
            .filter(|e| e.rel_type == rel_type)
            .filter(|e| !self.rel_overrides.contains_key(&e.id))
            .map(|e| e.id.clone())
            .collect();
        for id in ids {
            surface.update_edge(&id, &EdgePatch::hidden(hidden));
        }
    }

    /// Explicitly hide or show a set of nodes by id. These overrides take
    /// precedence over later type-level toggles.
    pub fn hide_nodes<'a>(
        &mut self,
        surface: &mut GraphSurface,
        ids: impl IntoIterator<Item = &'a str>,
        hidden: bool,
    ) {
        for id in ids {
            self.node_overrides.insert(id.to_owned(), hidden);
            surface.update_node(id, &NodePatch::hidden(hidden));
        }
    }

    /// Explicitly hide or show a set of edges by id.
    pub fn hide_rels<'a>(
        &mut self,
        surface: &mut GraphSurface,
        ids: impl IntoIterator<Item = &'a str>,
        hidden: bool,
    ) {
        for id in ids {
            self.rel_overrides.insert(id.to_owned(), hidden);
            surface.update_edge(id, &EdgePatch::hidden(hidden));
        }
    }

    /// Remove the explicit override for a node, returning it to type-level
    /// control.
    pub fn clear_node_override(&mut self, surface: &mut GraphSurface, id: &str) {
        if self.node_overrides.remove(id).is_some() {
            let hidden = surface
                .get_node(id)
                .map(|n| self.hidden_node_types.contains(&n.node_type))
                .unwrap_or(false);
            surface.update_node(id, &NodePatch::hidden(hidden));
        }
    }

    // =========================================================================
    // BULK DROP
    // =========================================================================

    /// Permanently drop every node the active filter excludes (incident
    /// edges go with them). Returns the number of nodes dropped.
    pub fn filter_graph(&self, surface: &mut GraphSurface) -> usize {
        let doomed: Vec<String> = surface
            .nodes()
            .filter(|n| self.excludes(&n.node_type))
            .map(|n| n.id.clone())
            .collect();
        let mut dropped = 0;
        for id in &doomed {
            if surface.drop_node(id) {
                dropped += 1;
            }
        }
        if dropped > 0 {
            tracing::info!(dropped, "filter_graph removed nodes");
        }
        dropped
    }
}

// =============================================================================
// TESTS
// =============================================================================
