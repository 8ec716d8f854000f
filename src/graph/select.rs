//! Selection tool - named, user-created groups of selected nodes.
//!
//! Radio-button semantics: however many groups exist, exactly one is active
//! for halo display and lasso assignment. Completing a lasso replaces the
//! active group's membership (other groups are untouched). Per-group hide
//! and fixed toggles apply to every current member; clearing membership
//! reverts both. Groups serialize to/from a JSON snapshot for session
//! restore.

use egui::Pos2;
use serde::{Deserialize, Serialize};

use crate::error::GraphBrowserError;
use crate::graph::surface::GraphSurface;
use crate::graph::types::NodePatch;

/// A named group of selected nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionGroup {
    pub id: u64,
    pub name: String,
    /// Member node ids, in assignment order
    pub members: Vec<String>,
    pub hidden: bool,
    pub fixed: bool,
}

/// The selection tool: group list, active-group marker, lasso state.
#[derive(Debug, Default)]
pub struct SelectionTool {
    groups: Vec<SelectionGroup>,
    active: Option<u64>,
    enabled: bool,
    lasso: Vec<Pos2>,
    next_id: u64,
}

/// Serializable snapshot of every group (not the lasso in progress).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SelectionSnapshot {
    groups: Vec<SelectionGroup>,
    active: Option<u64>,
}

impl SelectionTool {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    // =========================================================================
    // TOOL ACTIVATION
    // =========================================================================

    /// Enable the tool: the active group's halo becomes visible and lasso
    /// gestures start assigning.
    pub fn activate(&mut self) {
        self.enabled = true;
    }

    pub fn deactivate(&mut self) {
        self.enabled = false;
        self.lasso.clear();
    }

    pub fn is_active(&self) -> bool {
        self.enabled
    }

    // =========================================================================
    // GROUP LIFECYCLE
    // =========================================================================

    /// Create a group and make it the active one. Returns the group id.
    pub fn create_group(&mut self, name: impl Into<String>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.groups.push(SelectionGroup {
            id,
            name: name.into(),
            members: Vec::new(),
            hidden: false,
            fixed: false,
        });
        self.active = Some(id);
        id
    }

    /// Delete a group. Underlying graph nodes are never deleted; members
    /// keep whatever hidden/fixed state the group last applied.
    pub fn delete_group(&mut self, id: u64) -> bool {
        let before = self.groups.len();
        self.groups.retain(|g| g.id != id);
        if self.active == Some(id) {
            self.active = None;
        }
        self.groups.len() != before
    }

    /// Make one group the active one (radio semantics). Returns false for
    /// an unknown id.
    pub fn set_active(&mut self, id: u64) -> bool {
        if self.groups.iter().any(|g| g.id == id) {
            self.active = Some(id);
            true
        } else {
            false
        }
    }

    pub fn active_group(&self) -> Option<&SelectionGroup> {
        self.active
            .and_then(|id| self.groups.iter().find(|g| g.id == id))
    }

    pub fn group(&self, id: u64) -> Option<&SelectionGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn groups(&self) -> &[SelectionGroup] {
        &self.groups
    }

    /// Rename in place.
    pub fn rename_group(&mut self, id: u64, name: impl Into<String>) -> bool {
        match self.groups.iter_mut().find(|g| g.id == id) {
            Some(group) => {
                group.name = name.into();
                true
            }
            None => false,
        }
    }

    /// Node ids that get the halo: members of the active group while the
    /// tool is enabled.
    pub fn halo_nodes(&self) -> &[String] {
        if !self.enabled {
            return &[];
        }
        self.active_group().map(|g| g.members.as_slice()).unwrap_or(&[])
    }

    // =========================================================================
    // MEMBERSHIP
    // =========================================================================

    /// Replace the active group's membership. Members leaving the group get
    /// the group's hidden/fixed effects reverted; members joining get them
    /// applied.
    pub fn assign_members(&mut self, surface: &mut GraphSurface, ids: Vec<String>) {
        let Some(active) = self.active else {
            return;
        };
        let Some(group) = self.groups.iter_mut().find(|g| g.id == active) else {
            return;
        };

        for old in &group.members {
            if !ids.contains(old) {
                revert_flags(surface, old, group.hidden, group.fixed);
            }
        }
        for new in &ids {
            apply_flags(surface, new, group.hidden, group.fixed);
        }
        group.members = ids;
        tracing::debug!(group = group.id, members = group.members.len(), "selection assigned");
    }

    /// Remove every member from a group, reverting the group's hidden and
    /// fixed effects on them.
    pub fn clear_members(&mut self, surface: &mut GraphSurface, id: u64) {
        let Some(group) = self.groups.iter_mut().find(|g| g.id == id) else {
            return;
        };
        for member in &group.members {
            revert_flags(surface, member, group.hidden, group.fixed);
        }
        group.members.clear();
    }

    // =========================================================================
    // PER-GROUP TOGGLES
    // =========================================================================

    /// Hide or show every member of a group. Members of other groups are
    /// not touched.
    pub fn set_group_hidden(&mut self, surface: &mut GraphSurface, id: u64, hidden: bool) {
        let Some(group) = self.groups.iter_mut().find(|g| g.id == id) else {
            return;
        };
        group.hidden = hidden;
        for member in &group.members {
            surface.update_node(member, &NodePatch::hidden(hidden));
        }
    }

    /// Pin or release every member of a group.
    pub fn set_group_fixed(&mut self, surface: &mut GraphSurface, id: u64, fixed: bool) {
        let Some(group) = self.groups.iter_mut().find(|g| g.id == id) else {
            return;
        };
        group.fixed = fixed;
        for member in &group.members {
            surface.update_node(member, &NodePatch::fixed(fixed));
        }
    }

    // =========================================================================
    // LASSO
    // =========================================================================

    /// Start a lasso gesture (world coordinates).
    pub fn begin_lasso(&mut self, world: Pos2) {
        self.lasso.clear();
        self.lasso.push(world);
    }

    pub fn push_lasso_point(&mut self, world: Pos2) {
        self.lasso.push(world);
    }

    pub fn lasso_path(&self) -> &[Pos2] {
        &self.lasso
    }

    /// Complete the lasso: every visible node inside the drawn polygon is
    /// assigned to the active group. Returns the number of nodes assigned.
    pub fn complete_lasso(&mut self, surface: &mut GraphSurface) -> usize {
        let polygon = std::mem::take(&mut self.lasso);
        if polygon.len() < 3 || self.active.is_none() {
            return 0;
        }
        let inside: Vec<String> = surface
            .nodes()
            .filter(|n| !n.hidden && point_in_polygon(n.position, &polygon))
            .map(|n| n.id.clone())
            .collect();
        let count = inside.len();
        self.assign_members(surface, inside);
        count
    }

    // =========================================================================
    // SNAPSHOT
    // =========================================================================

    /// Serialize every group to a JSON snapshot.
    pub fn snapshot(&self) -> Result<String, GraphBrowserError> {
        let snapshot = SelectionSnapshot {
            groups: self.groups.clone(),
            active: self.active,
        };
        Ok(serde_json::to_string(&snapshot)?)
    }

    /// Restore groups from a snapshot, reapplying each group's hidden and
    /// fixed flags to members still present on the surface. Replaces the
    /// current group list.
    pub fn restore(&mut self, surface: &mut GraphSurface, json: &str) -> Result<(), GraphBrowserError> {
        let snapshot: SelectionSnapshot = serde_json::from_str(json)?;
        self.groups = snapshot.groups;
        self.active = snapshot
            .active
            .filter(|id| self.groups.iter().any(|g| g.id == *id));
        self.next_id = self.groups.iter().map(|g| g.id + 1).max().unwrap_or(1);
        for group in &self.groups {
            for member in &group.members {
                apply_flags(surface, member, group.hidden, group.fixed);
            }
        }
        tracing::info!(groups = self.groups.len(), "selection snapshot restored");
        Ok(())
    }

    /// Delete every group and the active marker.
    pub fn reset(&mut self) {
        self.groups.clear();
        self.active = None;
        self.lasso.clear();
    }
}

fn apply_flags(surface: &mut GraphSurface, id: &str, hidden: bool, fixed: bool) {
    if hidden {
        surface.update_node(id, &NodePatch::hidden(true));
    }
    if fixed {
        surface.update_node(id, &NodePatch::fixed(true));
    }
}

fn revert_flags(surface: &mut GraphSurface, id: &str, hidden: bool, fixed: bool) {
    if hidden {
        surface.update_node(id, &NodePatch::hidden(false));
    }
    if fixed {
        surface.update_node(id, &NodePatch::fixed(false));
    }
}

/// Ray-casting point-in-polygon test over the lasso path.
fn point_in_polygon(point: Pos2, polygon: &[Pos2]) -> bool {
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (pi, pj) = (polygon[i], polygon[j]);
        if (pi.y > point.y) != (pj.y > point.y)
            && point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

// =============================================================================
// TESTS
// =============================================================================
