//! Node expansion engine.
//!
//! Per-node state machine: `Collapsed -> Loading -> Expanded -> Collapsed`.
//! Hovering a node fires two concurrent relationship fetches (incoming and
//! outgoing); the per-type count popup appears only after BOTH resolve.
//! Every interaction bumps a monotonically increasing token and replies
//! carrying a stale token are discarded, so out-of-order completion of an
//! abandoned hover can never corrupt the current one.
//!
//! Timers are deadline-based and driven by [`Expander::poll`]; the widget
//! passes `Instant::now()`, tests pass synthetic instants.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Duration, Instant};

use egui::Vec2;

use crate::graph::connection::{
    ConnectionError, ConnectionHandle, Direction, RelationshipRow, RequestId,
};
use crate::graph::filter::GraphFilter;
use crate::graph::surface::{GraphSurface, SurfaceEvent};
use crate::graph::types::{GraphEdge, GraphNode};

/// Distance from the parent at which expanded children are placed.
pub const EXPAND_RADIUS: f32 = 200.0;

/// Children are spread at golden-angle steps so siblings never coincide.
const GOLDEN_ANGLE: f32 = 2.399_963;

/// Idle delay after hover-end before the popup is cleared.
pub const HOVER_CLEAR_DELAY: Duration = Duration::from_millis(1000);

/// Default deadline for the pair of relationship fetches.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a failure marker stays visible.
const FAILURE_MARKER_TTL: Duration = Duration::from_secs(3);

// =============================================================================
// RECORDS
// =============================================================================

/// Expansion lifecycle of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpansionState {
    #[default]
    Collapsed,
    Loading,
    Expanded,
}

/// What expanding a node added, for later collapse.
///
/// Invariant: a node id appears in at most one record's `nodes` list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpansionRecord {
    pub state: ExpansionState,
    /// Node ids added as a direct result of expanding this parent
    pub nodes: Vec<String>,
    /// Edge ids added as a direct result of expanding this parent
    pub edges: Vec<String>,
}

/// One entry of the hover popup: "N genuinely new nodes of this type".
#[derive(Debug, Clone, PartialEq)]
pub struct TypeBucket {
    pub node_type: String,
    pub count: usize,
}

/// The per-type count popup shown once both fetches resolve.
#[derive(Debug, Clone, PartialEq)]
pub struct HoverPopup {
    pub node_id: String,
    pub buckets: Vec<TypeBucket>,
}

/// Transient "expansion failed" marker for the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureMarker {
    pub node_id: String,
    pub message: String,
    pub at: Instant,
}

struct PendingFetch {
    node_id: String,
    token: u64,
    req_in: RequestId,
    req_out: RequestId,
    in_rows: Option<Vec<RelationshipRow>>,
    out_rows: Option<Vec<RelationshipRow>>,
    deadline: Instant,
}

/// Filtered fetch results kept for the eventual expand click.
#[derive(Debug, Clone, Default)]
struct FetchedRelations {
    in_rows: Vec<RelationshipRow>,
    out_rows: Vec<RelationshipRow>,
}

// =============================================================================
// EXPANDER
// =============================================================================

pub struct Expander {
    records: HashMap<String, ExpansionRecord>,
    undo: Vec<HashMap<String, ExpansionRecord>>,
    fetched: HashMap<String, FetchedRelations>,
    pending: Option<PendingFetch>,
    popup: Option<HoverPopup>,
    clear_deadline: Option<Instant>,
    failures: Vec<FailureMarker>,
    token: u64,
    fetch_timeout: Duration,
}

impl std::fmt::Debug for Expander {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Expander")
            .field("records", &self.records.len())
            .field("undo_depth", &self.undo.len())
            .field("pending", &self.pending.as_ref().map(|p| p.node_id.clone()))
            .finish_non_exhaustive()
    }
}

impl Default for Expander {
    fn default() -> Self {
        Self::new()
    }
}

impl Expander {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            undo: Vec::new(),
            fetched: HashMap::new(),
            pending: None,
            popup: None,
            clear_deadline: None,
            failures: Vec::new(),
            token: 0,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    // =========================================================================
    // READ ACCESS
    // =========================================================================

    pub fn state(&self, node_id: &str) -> ExpansionState {
        self.records
            .get(node_id)
            .map(|r| r.state)
            .unwrap_or_default()
    }

    pub fn record(&self, node_id: &str) -> Option<&ExpansionRecord> {
        self.records.get(node_id)
    }

    pub fn records(&self) -> &HashMap<String, ExpansionRecord> {
        &self.records
    }

    pub fn popup(&self) -> Option<&HoverPopup> {
        self.popup.as_ref()
    }

    pub fn failures(&self) -> &[FailureMarker] {
        &self.failures
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    // =========================================================================
    // HOVER STATE MACHINE
    // =========================================================================

    /// Hover entered a node: cancel any pending clear timer and, unless the
    /// node is already expanded or already loading, start a fresh
    /// interaction (both fetches, new token).
    pub fn hover_start(&mut self, node_id: &str, conn: &mut ConnectionHandle, now: Instant) {
        self.clear_deadline = None;

        if self.state(node_id) == ExpansionState::Expanded {
            return;
        }
        if let Some(ref pending) = self.pending {
            if pending.node_id == node_id {
                return;
            }
            // Interest moved to another node; the still-pending fetch is
            // abandoned and its replies will arrive with a stale token.
            let old = pending.node_id.clone();
            self.reset_loading(&old);
        }

        self.token += 1;
        let req_in = conn.fetch_relationships(node_id, Direction::In);
        let req_out = conn.fetch_relationships(node_id, Direction::Out);
        self.records.entry(node_id.to_owned()).or_default().state = ExpansionState::Loading;
        self.pending = Some(PendingFetch {
            node_id: node_id.to_owned(),
            token: self.token,
            req_in,
            req_out,
            in_rows: None,
            out_rows: None,
            deadline: now + self.fetch_timeout,
        });
        self.popup = None;
        tracing::debug!(node_id, token = self.token, "hover fetch started");
    }

    /// Hover left the node: arm the idle clear timer.
    pub fn hover_end(&mut self, now: Instant) {
        self.clear_deadline = Some(now + HOVER_CLEAR_DELAY);
    }

    /// Route one relationships reply. Stale replies (abandoned interaction,
    /// unknown request id) are discarded silently.
    pub fn handle_relationships(
        &mut self,
        request: RequestId,
        node_id: &str,
        direction: Direction,
        result: Result<Vec<RelationshipRow>, ConnectionError>,
        filter: &GraphFilter,
        surface: &mut GraphSurface,
    ) {
        let Some(pending) = self.pending.as_mut() else {
            tracing::debug!(request, "discarding reply: no pending interaction");
            return;
        };
        if pending.node_id != node_id || (request != pending.req_in && request != pending.req_out) {
            tracing::debug!(request, node_id, "discarding stale reply");
            return;
        }

        let rows = match result {
            Ok(rows) => filter.filter_nodes(rows, direction),
            Err(err) => {
                tracing::warn!(node_id, %err, "expansion fetch failed");
                let node = pending.node_id.clone();
                self.fail(&node, err.to_string(), surface);
                return;
            }
        };
        match direction {
            Direction::In => pending.in_rows = Some(rows),
            Direction::Out => pending.out_rows = Some(rows),
        }

        // Join semantics: the popup waits for both directions.
        if let (Some(in_rows), Some(out_rows)) = (&pending.in_rows, &pending.out_rows) {
            let fetched = FetchedRelations {
                in_rows: in_rows.clone(),
                out_rows: out_rows.clone(),
            };
            let node = pending.node_id.clone();
            let token = pending.token;
            self.pending = None;
            self.popup = Some(build_popup(&node, &fetched, surface));
            self.fetched.insert(node.clone(), fetched);
            tracing::debug!(node_id = %node, token, "hover popup ready");
        }
    }

    /// Advance timers. Call once per frame.
    pub fn poll(&mut self, now: Instant, surface: &mut GraphSurface) {
        if let Some(deadline) = self.clear_deadline {
            if now >= deadline {
                self.clear_deadline = None;
                self.popup = None;
                if let Some(pending) = self.pending.take() {
                    self.reset_loading(&pending.node_id);
                    tracing::debug!(node_id = %pending.node_id, "hover interest cleared");
                }
            }
        }
        if let Some(ref pending) = self.pending {
            if now >= pending.deadline {
                let node = pending.node_id.clone();
                tracing::warn!(node_id = %node, "expansion fetch timed out");
                self.fail(&node, "expansion timed out".to_owned(), surface);
            }
        }
        self.failures.retain(|f| now.duration_since(f.at) < FAILURE_MARKER_TTL);
    }

    fn fail(&mut self, node_id: &str, message: String, surface: &mut GraphSurface) {
        self.pending = None;
        self.popup = None;
        self.reset_loading(node_id);
        surface.emit(SurfaceEvent::OperationFailed {
            id: node_id.to_owned(),
            message: message.clone(),
        });
        self.failures.push(FailureMarker {
            node_id: node_id.to_owned(),
            message,
            at: Instant::now(),
        });
    }

    fn reset_loading(&mut self, node_id: &str) {
        if let Some(record) = self.records.get_mut(node_id) {
            if record.state == ExpansionState::Loading {
                record.state = ExpansionState::Collapsed;
            }
        }
    }

    // =========================================================================
    // EXPAND / COLLAPSE / UNDO
    // =========================================================================

    /// Merge the fetched candidates for `node_id` into the surface,
    /// optionally restricted to one far-endpoint type. Returns the number of
    /// nodes added. A successful expansion pushes an undo snapshot.
    pub fn expand(
        &mut self,
        surface: &mut GraphSurface,
        node_id: &str,
        type_filter: Option<&str>,
    ) -> usize {
        let Some(fetched) = self.fetched.get(node_id).cloned() else {
            return 0;
        };
        let Some(parent_pos) = surface.get_node(node_id).map(|n| n.position) else {
            return 0;
        };

        let snapshot = self.records.clone();

        let mut added_nodes: Vec<String> = Vec::new();
        let mut added_edges: Vec<String> = Vec::new();
        let mut placed = self
            .records
            .get(node_id)
            .map(|r| r.nodes.len())
            .unwrap_or(0);

        let batches = [
            (Direction::In, &fetched.in_rows),
            (Direction::Out, &fetched.out_rows),
        ];
        for (direction, rows) in batches {
            for row in rows {
                let far = row.far_endpoint(direction);
                if let Some(wanted) = type_filter {
                    if far.node_type != wanted {
                        continue;
                    }
                }
                if !surface.contains_node(&far.id) {
                    let angle = placed as f32 * GOLDEN_ANGLE;
                    let position = parent_pos + Vec2::angled(angle) * EXPAND_RADIUS;
                    let node = GraphNode::new(far.id.clone(), far.name.clone(), far.node_type.clone())
                        .with_position(position);
                    if surface.add_node(node) {
                        self.disown(&far.id);
                        added_nodes.push(far.id.clone());
                        placed += 1;
                    }
                }
                if !surface.contains_edge(&row.id) {
                    let edge = GraphEdge::new(
                        row.id.clone(),
                        row.source_node.id.clone(),
                        row.target_node.id.clone(),
                        row.rel_type.clone(),
                    );
                    if surface.add_edge(edge) {
                        added_edges.push(row.id.clone());
                    }
                }
            }
        }

        if added_nodes.is_empty() && added_edges.is_empty() {
            return 0;
        }

        self.undo.push(snapshot);
        let record = self.records.entry(node_id.to_owned()).or_default();
        record.state = ExpansionState::Expanded;
        record.nodes.extend(added_nodes.iter().cloned());
        record.edges.extend(added_edges.iter().cloned());
        self.popup = None;
        surface.refresh();
        tracing::info!(
            node_id,
            nodes = added_nodes.len(),
            edges = added_edges.len(),
            "expanded"
        );
        added_nodes.len()
    }

    /// Expand every fetched type at once (double-click affordance).
    pub fn expand_all(&mut self, surface: &mut GraphSurface, node_id: &str) -> usize {
        self.expand(surface, node_id, None)
    }

    /// Collapse a node: recursively collapse expanded children first, then
    /// drop everything this expansion introduced. Already-removed ids are
    /// tolerated silently.
    pub fn collapse(&mut self, surface: &mut GraphSurface, node_id: &str) {
        let Some(record) = self.records.get(node_id) else {
            return;
        };
        if record.state != ExpansionState::Expanded {
            return;
        }
        let children = record.nodes.clone();
        let edges = record.edges.clone();

        for child in &children {
            if self.state(child) == ExpansionState::Expanded {
                self.collapse(surface, child);
            }
        }
        for edge_id in &edges {
            surface.drop_edge(edge_id);
        }
        for child in &children {
            surface.drop_node(child);
        }

        let record = self.records.entry(node_id.to_owned()).or_default();
        record.state = ExpansionState::Collapsed;
        record.nodes.clear();
        record.edges.clear();
        surface.refresh();
        tracing::info!(node_id, "collapsed");
    }

    /// Pop the latest snapshot and restore it as the current record map
    /// (state-replacement undo). Returns false when the stack is empty.
    pub fn undo(&mut self) -> bool {
        match self.undo.pop() {
            Some(snapshot) => {
                self.records = snapshot;
                true
            }
            None => false,
        }
    }

    /// Drop `id` from any record that still lists it (stale bookkeeping from
    /// a bulk drop) so an id never lives in two records.
    fn disown(&mut self, id: &str) {
        for record in self.records.values_mut() {
            record.nodes.retain(|n| n != id);
        }
    }
}

/// Count genuinely new far endpoints per type (unique ids, both directions,
/// skipping nodes already on the surface).
fn build_popup(node_id: &str, fetched: &FetchedRelations, surface: &GraphSurface) -> HoverPopup {
    let mut counted: HashSet<&str> = HashSet::new();
    let mut buckets: BTreeMap<&str, usize> = BTreeMap::new();
    let batches = [
        (Direction::In, &fetched.in_rows),
        (Direction::Out, &fetched.out_rows),
    ];
    for (direction, rows) in batches {
        for row in rows {
            let far = row.far_endpoint(direction);
            if surface.contains_node(&far.id) || !counted.insert(&far.id) {
                continue;
            }
            *buckets.entry(&far.node_type).or_insert(0) += 1;
        }
    }
    HoverPopup {
        node_id: node_id.to_owned(),
        buckets: buckets
            .into_iter()
            .map(|(node_type, count)| TypeBucket {
                node_type: node_type.to_owned(),
                count,
            })
            .collect(),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::connection::{ConnectionReply, GraphConnection, NodeRef};
    use crossbeam_channel::Sender;
    use egui::Pos2;

    /// Connection that records requests and lets tests reply by hand.
    #[derive(Default)]
    struct ManualConnection {
        requests: std::sync::Arc<std::sync::Mutex<Vec<(RequestId, String, Direction)>>>,
    }

    impl GraphConnection for ManualConnection {
        fn fetch_relationships(
            &mut self,
            request: RequestId,
            node_id: &str,
            direction: Direction,
            _reply: &Sender<ConnectionReply>,
        ) {
            self.requests
                .lock()
                .unwrap()
                .push((request, node_id.to_owned(), direction));
        }

        fn fetch_schema(&mut self, _request: RequestId, _reply: &Sender<ConnectionReply>) {}

        fn create_relationship(
            &mut self,
            _request: RequestId,
            _source_id: &str,
            _target_id: &str,
            _rel_type: &str,
            _reply: &Sender<ConnectionReply>,
        ) {
        }

        fn delete_relationship(
            &mut self,
            _request: RequestId,
            _relationship_id: &str,
            _reply: &Sender<ConnectionReply>,
        ) {
        }

        fn relationships_of_type(
            &mut self,
            _request: RequestId,
            _rel_type: &str,
            _reply: &Sender<ConnectionReply>,
        ) {
        }
    }

    fn setup() -> (
        GraphSurface,
        Expander,
        GraphFilter,
        ConnectionHandle,
        std::sync::Arc<std::sync::Mutex<Vec<(RequestId, String, Direction)>>>,
    ) {
        let mut surface = GraphSurface::new();
        surface.add_node(GraphNode::new("p1", "Apollo", "Project").with_position(Pos2::ZERO));
        surface.refresh();
        let conn = ManualConnection::default();
        let requests = conn.requests.clone();
        (
            surface,
            Expander::new(),
            GraphFilter::new(),
            ConnectionHandle::new(Box::new(conn)),
            requests,
        )
    }

    fn milestone_row(n: usize) -> RelationshipRow {
        RelationshipRow {
            source_node: NodeRef::new("p1", "Project", "Apollo"),
            target_node: NodeRef::new(format!("m{n}"), "Milestone", format!("Milestone {n}")),
            id: format!("r{n}"),
            rel_type: "PROJECT_HAS_MILESTONE".to_owned(),
        }
    }

    fn start_hover(
        expander: &mut Expander,
        conn: &mut ConnectionHandle,
        requests: &std::sync::Arc<std::sync::Mutex<Vec<(RequestId, String, Direction)>>>,
        now: Instant,
    ) -> (RequestId, RequestId) {
        expander.hover_start("p1", conn, now);
        let reqs = requests.lock().unwrap();
        let (in_req, _, _) = reqs[reqs.len() - 2].clone();
        let (out_req, _, _) = reqs[reqs.len() - 1].clone();
        (in_req, out_req)
    }

    #[test]
    fn test_popup_waits_for_both_directions() {
        let (mut surface, mut expander, filter, mut conn, requests) = setup();
        let now = Instant::now();
        let (in_req, out_req) = start_hover(&mut expander, &mut conn, &requests, now);
        assert_eq!(expander.state("p1"), ExpansionState::Loading);

        expander.handle_relationships(
            out_req,
            "p1",
            Direction::Out,
            Ok(vec![milestone_row(1), milestone_row(2)]),
            &filter,
            &mut surface,
        );
        assert!(expander.popup().is_none());

        expander.handle_relationships(in_req, "p1", Direction::In, Ok(vec![]), &filter, &mut surface);
        let popup = expander.popup().expect("popup after both replies");
        assert_eq!(popup.node_id, "p1");
        assert_eq!(popup.buckets.len(), 1);
        assert_eq!(popup.buckets[0].node_type, "Milestone");
        assert_eq!(popup.buckets[0].count, 2);
    }

    #[test]
    fn test_count_skips_nodes_already_in_graph() {
        let (mut surface, mut expander, filter, mut conn, requests) = setup();
        surface.add_node(GraphNode::new("m1", "Milestone 1", "Milestone"));
        let now = Instant::now();
        let (in_req, out_req) = start_hover(&mut expander, &mut conn, &requests, now);

        expander.handle_relationships(
            out_req,
            "p1",
            Direction::Out,
            Ok(vec![milestone_row(1), milestone_row(2)]),
            &filter,
            &mut surface,
        );
        expander.handle_relationships(in_req, "p1", Direction::In, Ok(vec![]), &filter, &mut surface);
        assert_eq!(expander.popup().unwrap().buckets[0].count, 1);
    }

    #[test]
    fn test_stale_reply_is_discarded() {
        let (mut surface, mut expander, filter, mut conn, requests) = setup();
        surface.add_node(GraphNode::new("p2", "Zeus", "Project"));
        let now = Instant::now();
        let (in_req, out_req) = start_hover(&mut expander, &mut conn, &requests, now);

        // Interest moves to p2 before p1's fetches resolve.
        expander.hover_start("p2", &mut conn, now);
        expander.handle_relationships(
            out_req,
            "p1",
            Direction::Out,
            Ok(vec![milestone_row(1)]),
            &filter,
            &mut surface,
        );
        expander.handle_relationships(in_req, "p1", Direction::In, Ok(vec![]), &filter, &mut surface);
        assert!(expander.popup().is_none());
        assert_eq!(expander.state("p1"), ExpansionState::Collapsed);
        assert_eq!(expander.state("p2"), ExpansionState::Loading);
    }

    #[test]
    fn test_hover_clear_timer_fires_and_cancels() {
        let (mut surface, mut expander, filter, mut conn, requests) = setup();
        let now = Instant::now();
        let (in_req, out_req) = start_hover(&mut expander, &mut conn, &requests, now);
        expander.handle_relationships(
            out_req,
            "p1",
            Direction::Out,
            Ok(vec![milestone_row(1)]),
            &filter,
            &mut surface,
        );
        expander.handle_relationships(in_req, "p1", Direction::In, Ok(vec![]), &filter, &mut surface);
        assert!(expander.popup().is_some());

        expander.hover_end(now);
        // Re-entering hover before the timer fires cancels it.
        expander.hover_start("p1", &mut conn, now + Duration::from_millis(500));
        expander.poll(now + Duration::from_millis(1500), &mut surface);
        assert!(expander.pending.is_some());

        // Let it fire for real this time.
        expander.hover_end(now + Duration::from_millis(1500));
        expander.poll(now + Duration::from_millis(2600), &mut surface);
        assert!(expander.popup().is_none());
        assert!(expander.pending.is_none());
        assert_eq!(expander.state("p1"), ExpansionState::Collapsed);
    }

    #[test]
    fn test_fetch_timeout_surfaces_failure() {
        let (mut surface, mut expander, _filter, mut conn, requests) = setup();
        expander = expander.with_fetch_timeout(Duration::from_secs(5));
        let now = Instant::now();
        start_hover(&mut expander, &mut conn, &requests, now);

        expander.poll(now + Duration::from_secs(6), &mut surface);
        assert_eq!(expander.state("p1"), ExpansionState::Collapsed);
        assert!(expander.pending.is_none());
        assert_eq!(expander.failures().len(), 1);
        assert_eq!(expander.failures()[0].node_id, "p1");
    }

    fn expand_p1_with_milestones(
        surface: &mut GraphSurface,
        expander: &mut Expander,
        filter: &GraphFilter,
        conn: &mut ConnectionHandle,
        requests: &std::sync::Arc<std::sync::Mutex<Vec<(RequestId, String, Direction)>>>,
        count: usize,
    ) {
        let now = Instant::now();
        let (in_req, out_req) = start_hover(expander, conn, requests, now);
        let rows: Vec<RelationshipRow> = (1..=count).map(milestone_row).collect();
        expander.handle_relationships(out_req, "p1", Direction::Out, Ok(rows), filter, surface);
        expander.handle_relationships(in_req, "p1", Direction::In, Ok(vec![]), filter, surface);
    }

    #[test]
    fn test_expand_records_additions() {
        let (mut surface, mut expander, filter, mut conn, requests) = setup();
        expand_p1_with_milestones(&mut surface, &mut expander, &filter, &mut conn, &requests, 3);

        let added = expander.expand(&mut surface, "p1", Some("Milestone"));
        assert_eq!(added, 3);
        assert_eq!(surface.node_count(), 4);
        assert_eq!(surface.edge_count(), 3);
        let record = expander.record("p1").unwrap();
        assert_eq!(record.state, ExpansionState::Expanded);
        assert_eq!(record.nodes.len(), 3);
        assert_eq!(record.edges.len(), 3);

        // Children sit on the expansion radius, no two coincident.
        let positions: Vec<Pos2> = record
            .nodes
            .iter()
            .map(|id| surface.get_node(id).unwrap().position)
            .collect();
        for p in &positions {
            assert!((p.to_vec2().length() - EXPAND_RADIUS).abs() < 0.5);
        }
        for (i, a) in positions.iter().enumerate() {
            for b in positions.iter().skip(i + 1) {
                assert!((*a - *b).length() > 1.0);
            }
        }
    }

    #[test]
    fn test_collapse_reverses_expand() {
        let (mut surface, mut expander, filter, mut conn, requests) = setup();
        let before: HashSet<String> = surface.nodes().map(|n| n.id.clone()).collect();
        expand_p1_with_milestones(&mut surface, &mut expander, &filter, &mut conn, &requests, 3);
        expander.expand(&mut surface, "p1", Some("Milestone"));

        expander.collapse(&mut surface, "p1");
        let after: HashSet<String> = surface.nodes().map(|n| n.id.clone()).collect();
        assert_eq!(before, after);
        assert_eq!(surface.edge_count(), 0);
        assert_eq!(expander.state("p1"), ExpansionState::Collapsed);
    }

    #[test]
    fn test_nested_collapse() {
        let (mut surface, mut expander, filter, mut conn, requests) = setup();
        expand_p1_with_milestones(&mut surface, &mut expander, &filter, &mut conn, &requests, 2);
        expander.expand(&mut surface, "p1", None);

        // Expand a child: m1 -> t1.
        let now = Instant::now();
        expander.hover_start("m1", &mut conn, now);
        let (in_req, out_req) = {
            let reqs = requests.lock().unwrap();
            (reqs[reqs.len() - 2].0, reqs[reqs.len() - 1].0)
        };
        let child_row = RelationshipRow {
            source_node: NodeRef::new("m1", "Milestone", "Milestone 1"),
            target_node: NodeRef::new("t1", "Task", "Task 1"),
            id: "rt1".to_owned(),
            rel_type: "MILESTONE_HAS_TASK".to_owned(),
        };
        expander.handle_relationships(
            out_req,
            "m1",
            Direction::Out,
            Ok(vec![child_row]),
            &filter,
            &mut surface,
        );
        expander.handle_relationships(in_req, "m1", Direction::In, Ok(vec![]), &filter, &mut surface);
        expander.expand(&mut surface, "m1", None);
        assert!(surface.contains_node("t1"));

        // Collapsing the parent removes the nested expansion too.
        expander.collapse(&mut surface, "p1");
        assert!(!surface.contains_node("t1"));
        assert!(!surface.contains_node("m1"));
        assert_eq!(surface.node_count(), 1);
        assert_eq!(expander.state("m1"), ExpansionState::Collapsed);
    }

    #[test]
    fn test_undo_restores_snapshot() {
        let (mut surface, mut expander, filter, mut conn, requests) = setup();
        expand_p1_with_milestones(&mut surface, &mut expander, &filter, &mut conn, &requests, 2);
        assert_eq!(expander.undo_depth(), 0);
        expander.expand(&mut surface, "p1", None);
        assert_eq!(expander.undo_depth(), 1);
        assert_eq!(expander.state("p1"), ExpansionState::Expanded);

        assert!(expander.undo());
        assert_ne!(expander.state("p1"), ExpansionState::Expanded);
        assert!(!expander.undo());
    }

    #[test]
    fn test_expand_without_fetch_is_noop() {
        let (mut surface, mut expander, _filter, _conn, _requests) = setup();
        assert_eq!(expander.expand(&mut surface, "p1", None), 0);
        assert_eq!(surface.node_count(), 1);
    }
}
