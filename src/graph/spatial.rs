//! Spatial index for hit testing.
//!
//! R-tree (via `rstar`) so hover, lasso and drag-proximity queries stay
//! O(log n) as the graph grows. Rebuilt by `GraphSurface::refresh`; the
//! settings-only refresh path skips the rebuild.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

/// Index entry for one rendered node (world coordinates).
#[derive(Debug, Clone)]
pub struct SpatialEntry {
    pub id: String,
    bounds: AABB<[f32; 2]>,
    pub center: [f32; 2],
    pub radius: f32,
}

impl SpatialEntry {
    pub fn new(id: impl Into<String>, center: [f32; 2], radius: f32) -> Self {
        let bounds = AABB::from_corners(
            [center[0] - radius, center[1] - radius],
            [center[0] + radius, center[1] + radius],
        );
        Self {
            id: id.into(),
            bounds,
            center,
            radius,
        }
    }
}

impl RTreeObject for SpatialEntry {
    type Envelope = AABB<[f32; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.bounds
    }
}

impl PointDistance for SpatialEntry {
    fn distance_2(&self, point: &[f32; 2]) -> f32 {
        let edge = edge_distance(*point, self);
        edge * edge
    }

    fn contains_point(&self, point: &[f32; 2]) -> bool {
        let dx = point[0] - self.center[0];
        let dy = point[1] - self.center[1];
        dx * dx + dy * dy <= self.radius * self.radius
    }
}

/// Distance from a point to the node's edge (0 inside the node).
fn edge_distance(point: [f32; 2], entry: &SpatialEntry) -> f32 {
    let dx = point[0] - entry.center[0];
    let dy = point[1] - entry.center[1];
    ((dx * dx + dy * dy).sqrt() - entry.radius).max(0.0)
}

/// Hit-testing index over the surface's visible nodes.
#[derive(Clone, Default)]
pub struct SpatialIndex {
    tree: RTree<SpatialEntry>,
    count: usize,
}

impl std::fmt::Debug for SpatialIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialIndex")
            .field("count", &self.count)
            .finish_non_exhaustive()
    }
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from current node positions.
    pub fn rebuild(&mut self, entries: impl Iterator<Item = SpatialEntry>) {
        let entries: Vec<_> = entries.collect();
        self.count = entries.len();
        self.tree = RTree::bulk_load(entries);
    }

    pub fn clear(&mut self) {
        self.tree = RTree::new();
        self.count = 0;
    }

    /// Closest node within `threshold` of `point`, if any.
    pub fn hit_test(&self, point: [f32; 2], threshold: f32) -> Option<&SpatialEntry> {
        let search = AABB::from_corners(
            [point[0] - threshold, point[1] - threshold],
            [point[0] + threshold, point[1] + threshold],
        );
        self.tree
            .locate_in_envelope_intersecting(&search)
            .min_by(|a, b| {
                edge_distance(point, a)
                    .partial_cmp(&edge_distance(point, b))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .filter(|entry| edge_distance(point, entry) <= threshold)
    }

    /// All nodes within `radius` of `center`.
    pub fn query_radius(&self, center: [f32; 2], radius: f32) -> Vec<&SpatialEntry> {
        let bounds = AABB::from_corners(
            [center[0] - radius, center[1] - radius],
            [center[0] + radius, center[1] + radius],
        );
        self.tree
            .locate_in_envelope_intersecting(&bounds)
            .filter(|entry| edge_distance(center, entry) <= radius)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_test_picks_closest() {
        let mut index = SpatialIndex::new();
        index.rebuild(
            vec![
                SpatialEntry::new("a", [0.0, 0.0], 10.0),
                SpatialEntry::new("b", [50.0, 0.0], 10.0),
            ]
            .into_iter(),
        );

        let hit = index.hit_test([45.0, 0.0], 15.0).unwrap();
        assert_eq!(hit.id, "b");
        assert!(index.hit_test([200.0, 200.0], 15.0).is_none());
    }

    #[test]
    fn test_radius_query() {
        let mut index = SpatialIndex::new();
        index.rebuild(
            vec![
                SpatialEntry::new("a", [0.0, 0.0], 5.0),
                SpatialEntry::new("b", [20.0, 0.0], 5.0),
                SpatialEntry::new("c", [100.0, 0.0], 5.0),
            ]
            .into_iter(),
        );

        let near: Vec<_> = index
            .query_radius([10.0, 0.0], 20.0)
            .into_iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(near.len(), 2);
        assert!(near.contains(&"a") && near.contains(&"b"));
    }

    #[test]
    fn test_empty_index() {
        let index = SpatialIndex::new();
        assert!(index.is_empty());
        assert!(index.hit_test([0.0, 0.0], 10.0).is_none());
    }
}
