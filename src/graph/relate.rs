//! Relationship editor - drag-to-relate with a background worker.
//!
//! While a modifier key is held during a node drag, the worker proposes a
//! schema-valid provisional edge for the nearest compatible node; the
//! editor applies the proposals to the surface. On drag end every
//! provisional edge is locked and a create request goes to the server.
//! A duplicate-relationship rejection is recovered by looking up and
//! reusing the existing relationship; any other failure reverts exactly as
//! a cancelled drag would.

pub mod worker;

use std::collections::{HashMap, HashSet};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use egui::Color32;

use crate::graph::connection::{
    ConnectionError, ConnectionHandle, CreatedRelationship, RelationshipRow, RequestId,
};
use crate::graph::schema::Schema;
use crate::graph::surface::{GraphSurface, SurfaceEvent};
use crate::graph::types::{EdgePatch, GraphEdge};
use worker::{
    spawn_worker, DragKeys, WorkerCommand, WorkerEdge, WorkerNode, WorkerRequest,
};

/// Default world-space distance within which the worker proposes edges.
pub const DEFAULT_MAX_DRAG_DISTANCE: f32 = 300.0;

const PROVISIONAL_COLOR: Color32 = Color32::from_rgb(251, 191, 36);

/// Everything needed to resolve one in-flight create request.
#[derive(Debug, Clone)]
struct PendingCreate {
    provisional_id: String,
    source_id: String,
    target_id: String,
    rel_type: String,
    /// Edge hidden to make room for the provisional one, if any
    replaces: Option<String>,
}

pub struct RelationshipEditor {
    requests: Sender<WorkerRequest>,
    commands: Receiver<WorkerCommand>,
    worker: Option<JoinHandle<()>>,
    /// Provisional edge ids currently on the surface
    provisional: HashSet<String>,
    pending_creates: HashMap<RequestId, PendingCreate>,
    pending_lookups: HashMap<RequestId, PendingCreate>,
}

impl std::fmt::Debug for RelationshipEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationshipEditor")
            .field("provisional", &self.provisional.len())
            .field("pending_creates", &self.pending_creates.len())
            .finish_non_exhaustive()
    }
}

impl RelationshipEditor {
    /// Spawn the worker and hand it the schema.
    pub fn new(schema: Schema, max_distance: f32) -> Self {
        let (requests, commands, handle) = spawn_worker();
        let _ = requests.send(WorkerRequest::Init {
            schema,
            max_distance,
            nodes: Vec::new(),
            edges: Vec::new(),
        });
        Self {
            requests,
            commands,
            worker: Some(handle),
            provisional: HashSet::new(),
            pending_creates: HashMap::new(),
            pending_lookups: HashMap::new(),
        }
    }

    /// Push the current graph to the worker. Call after any mutation from
    /// another module (expansion, filter drop, collapse).
    pub fn sync_graph(&self, surface: &GraphSurface) {
        let nodes = surface
            .nodes()
            .map(|n| WorkerNode {
                id: n.id.clone(),
                node_type: n.node_type.clone(),
                x: n.position.x,
                y: n.position.y,
            })
            .collect();
        let edges = surface
            .edges()
            .filter(|e| !e.provisional)
            .map(|e| WorkerEdge {
                id: e.id.clone(),
                source_id: e.source_id.clone(),
                target_id: e.target_id.clone(),
                rel_type: e.rel_type.clone(),
            })
            .collect();
        let _ = self.requests.send(WorkerRequest::UpdateGraph { nodes, edges });
    }

    /// Forward one drag-move frame to the worker.
    pub fn drag_update(&self, surface: &GraphSurface, node_id: &str, keys: DragKeys) {
        let Some(node) = surface.get_node(node_id) else {
            return;
        };
        let _ = self.requests.send(WorkerRequest::HandleDrag {
            dragged: WorkerNode {
                id: node.id.clone(),
                node_type: node.node_type.clone(),
                x: node.position.x,
                y: node.position.y,
            },
            keys,
        });
    }

    /// Modifier released or drag stopped without commit.
    pub fn cancel(&self) {
        let _ = self.requests.send(WorkerRequest::RemoveNewEdges);
    }

    /// True while a provisional edge is on the surface.
    pub fn has_provisional(&self) -> bool {
        !self.provisional.is_empty()
    }

    // =========================================================================
    // WORKER COMMAND APPLICATION
    // =========================================================================

    /// Drain worker proposals and apply them to the surface. Returns true
    /// when anything changed. Proposals against edges involved in an
    /// in-flight create are skipped; the reply handlers own those.
    pub fn poll(&mut self, surface: &mut GraphSurface) -> bool {
        let mut changed = false;
        while let Ok(command) = self.commands.try_recv() {
            match command {
                WorkerCommand::AddProvisional {
                    id,
                    source_id,
                    target_id,
                    rel_type,
                    replaces,
                } => {
                    let edge = GraphEdge::new(id.clone(), source_id, target_id, rel_type)
                        .provisional(replaces)
                        .with_color(PROVISIONAL_COLOR);
                    if surface.add_edge(edge) {
                        self.provisional.insert(id);
                        changed = true;
                    }
                }
                WorkerCommand::RemoveProvisional { id } => {
                    if self.is_committing(&id) {
                        continue;
                    }
                    if surface.drop_edge(&id) {
                        changed = true;
                    }
                    self.provisional.remove(&id);
                }
                WorkerCommand::HideEdge { id } => {
                    changed |= surface.update_edge(&id, &EdgePatch::hidden(true));
                }
                WorkerCommand::UnhideEdge { id } => {
                    if self.replaced_by_pending(&id) {
                        continue;
                    }
                    changed |= surface.update_edge(&id, &EdgePatch::hidden(false));
                }
            }
        }
        changed
    }

    fn is_committing(&self, provisional_id: &str) -> bool {
        self.pending_creates
            .values()
            .chain(self.pending_lookups.values())
            .any(|p| p.provisional_id == provisional_id)
    }

    fn replaced_by_pending(&self, edge_id: &str) -> bool {
        self.pending_creates
            .values()
            .chain(self.pending_lookups.values())
            .any(|p| p.replaces.as_deref() == Some(edge_id))
    }

    // =========================================================================
    // COMMIT
    // =========================================================================

    /// Drag ended with the modifier held: lock every provisional edge and
    /// send its create request. Returns the number of requests issued.
    pub fn commit(&mut self, surface: &mut GraphSurface, conn: &mut ConnectionHandle) -> usize {
        let ids: Vec<String> = self.provisional.iter().cloned().collect();
        let mut issued = 0;
        for id in ids {
            let Some(edge) = surface.get_edge(&id) else {
                self.provisional.remove(&id);
                continue;
            };
            let pending = PendingCreate {
                provisional_id: id.clone(),
                source_id: edge.source_id.clone(),
                target_id: edge.target_id.clone(),
                rel_type: edge.rel_type.clone(),
                replaces: edge.replaces.clone(),
            };
            surface.update_edge(&id, &EdgePatch::locked(true));
            let request =
                conn.create_relationship(&pending.source_id, &pending.target_id, &pending.rel_type);
            self.pending_creates.insert(request, pending);
            issued += 1;
        }
        // The worker forgets its proposal; the reply handlers own the
        // locked edges from here (poll skips stale unwind commands).
        let _ = self.requests.send(WorkerRequest::RemoveNewEdges);
        issued
    }

    /// Route a create-relationship reply.
    pub fn handle_created(
        &mut self,
        request: RequestId,
        result: Result<CreatedRelationship, ConnectionError>,
        surface: &mut GraphSurface,
        conn: &mut ConnectionHandle,
    ) {
        let Some(pending) = self.pending_creates.remove(&request) else {
            return;
        };
        match result {
            Ok(created) => {
                tracing::info!(id = %created.id, rel_type = %pending.rel_type, "relationship created");
                self.replace_provisional(surface, conn, &pending, &created.id);
            }
            Err(ConnectionError::AlreadyExists) => {
                // Duplicate: look up the existing relationship and reuse it.
                let lookup = conn.relationships_of_type(&pending.rel_type);
                self.pending_lookups.insert(lookup, pending);
            }
            Err(err) => {
                tracing::warn!(%err, rel_type = %pending.rel_type, "relationship create failed");
                self.revert(surface, &pending, err.to_string());
            }
        }
    }

    /// Route a relationships-of-type reply (duplicate-create recovery).
    pub fn handle_of_type(
        &mut self,
        request: RequestId,
        result: Result<Vec<RelationshipRow>, ConnectionError>,
        surface: &mut GraphSurface,
        conn: &mut ConnectionHandle,
    ) {
        let Some(pending) = self.pending_lookups.remove(&request) else {
            return;
        };
        let existing = match result {
            Ok(rows) => rows.into_iter().find(|row| {
                row.source_node.id == pending.source_id && row.target_node.id == pending.target_id
            }),
            Err(err) => {
                self.revert(surface, &pending, err.to_string());
                return;
            }
        };
        match existing {
            Some(row) => {
                tracing::info!(id = %row.id, "reusing existing relationship");
                self.replace_provisional(surface, conn, &pending, &row.id);
            }
            None => {
                self.revert(surface, &pending, "duplicate relationship not found".to_owned());
            }
        }
    }

    /// Success path: swap the provisional edge for one carrying the server
    /// id and delete the edge it replaced, if any.
    fn replace_provisional(
        &mut self,
        surface: &mut GraphSurface,
        conn: &mut ConnectionHandle,
        pending: &PendingCreate,
        server_id: &str,
    ) {
        surface.update_edge(&pending.provisional_id, &EdgePatch::locked(false));
        surface.drop_edge(&pending.provisional_id);
        self.provisional.remove(&pending.provisional_id);

        if let Some(ref replaced) = pending.replaces {
            if replaced != server_id {
                surface.drop_edge(replaced);
                conn.delete_relationship(replaced);
            }
        }
        if !surface.contains_edge(server_id) {
            surface.add_edge(GraphEdge::new(
                server_id,
                pending.source_id.clone(),
                pending.target_id.clone(),
                pending.rel_type.clone(),
            ));
        } else {
            surface.update_edge(server_id, &EdgePatch::hidden(false));
        }
        surface.refresh();
        self.sync_graph(surface);
    }

    /// Failure path: restore the surface exactly as if the drag had been
    /// released away from any target.
    fn revert(&mut self, surface: &mut GraphSurface, pending: &PendingCreate, message: String) {
        surface.update_edge(&pending.provisional_id, &EdgePatch::locked(false));
        surface.drop_edge(&pending.provisional_id);
        self.provisional.remove(&pending.provisional_id);
        if let Some(ref replaced) = pending.replaces {
            surface.update_edge(replaced, &EdgePatch::hidden(false));
        }
        surface.emit(SurfaceEvent::OperationFailed {
            id: pending.provisional_id.clone(),
            message,
        });
        surface.refresh();
        self.sync_graph(surface);
    }
}

impl Drop for RelationshipEditor {
    fn drop(&mut self) {
        let _ = self.requests.send(WorkerRequest::Shutdown);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::connection::{ConnectionReply, GraphConnection, NodeRef};
    use crate::graph::types::GraphNode;
    use egui::Pos2;
    use std::time::{Duration, Instant};

    fn schema() -> Schema {
        serde_json::from_str(
            r#"{
                "Project": {
                    "relatedTo": [
                        {"relType": "PROJECT_HAS_MILESTONE", "targetMultiplicity": "1",
                         "possibleTargetTypes": ["Milestone"]}
                    ]
                },
                "Milestone": {}
            }"#,
        )
        .unwrap()
    }

    /// Connection whose create/lookup replies are scripted per call.
    #[derive(Default)]
    struct ScriptedConnection {
        create_results: Vec<Result<CreatedRelationship, ConnectionError>>,
        of_type_rows: Vec<RelationshipRow>,
    }

    impl GraphConnection for ScriptedConnection {
        fn fetch_relationships(
            &mut self,
            _request: RequestId,
            _node_id: &str,
            _direction: crate::graph::connection::Direction,
            _reply: &crossbeam_channel::Sender<ConnectionReply>,
        ) {
        }

        fn fetch_schema(
            &mut self,
            _request: RequestId,
            _reply: &crossbeam_channel::Sender<ConnectionReply>,
        ) {
        }

        fn create_relationship(
            &mut self,
            request: RequestId,
            _source_id: &str,
            _target_id: &str,
            _rel_type: &str,
            reply: &crossbeam_channel::Sender<ConnectionReply>,
        ) {
            let result = if self.create_results.is_empty() {
                Ok(CreatedRelationship { id: "r-new".into() })
            } else {
                self.create_results.remove(0)
            };
            let _ = reply.send(ConnectionReply::Created { request, result });
        }

        fn delete_relationship(
            &mut self,
            request: RequestId,
            _relationship_id: &str,
            reply: &crossbeam_channel::Sender<ConnectionReply>,
        ) {
            let _ = reply.send(ConnectionReply::Deleted {
                request,
                result: Ok(()),
            });
        }

        fn relationships_of_type(
            &mut self,
            request: RequestId,
            rel_type: &str,
            reply: &crossbeam_channel::Sender<ConnectionReply>,
        ) {
            let _ = reply.send(ConnectionReply::OfType {
                request,
                rel_type: rel_type.to_owned(),
                result: Ok(self.of_type_rows.clone()),
            });
        }
    }

    fn surface() -> GraphSurface {
        let mut surface = GraphSurface::new();
        surface.add_node(GraphNode::new("p1", "Apollo", "Project").with_position(Pos2::new(0.0, 0.0)));
        surface.add_node(
            GraphNode::new("m1", "Launch", "Milestone").with_position(Pos2::new(40.0, 0.0)),
        );
        surface
    }

    /// Drive poll until the predicate holds or a deadline passes.
    fn poll_until(
        editor: &mut RelationshipEditor,
        surface: &mut GraphSurface,
        mut done: impl FnMut(&GraphSurface, &RelationshipEditor) -> bool,
    ) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            editor.poll(surface);
            if done(surface, editor) {
                return;
            }
            assert!(Instant::now() < deadline, "worker did not respond in time");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn provisional_id(surface: &GraphSurface) -> String {
        surface
            .edges()
            .find(|e| e.provisional)
            .map(|e| e.id.clone())
            .expect("provisional edge present")
    }

    const OUT: DragKeys = DragKeys {
        outgoing: true,
        incoming: false,
    };

    #[test]
    fn test_drag_proposes_and_cancel_unwinds() {
        let mut surface = surface();
        let mut editor = RelationshipEditor::new(schema(), 100.0);
        editor.sync_graph(&surface);

        editor.drag_update(&surface, "p1", OUT);
        poll_until(&mut editor, &mut surface, |s, _| s.edge_count() == 1);
        let edge_id = provisional_id(&surface);
        assert!(surface.get_edge(&edge_id).unwrap().provisional);

        editor.cancel();
        poll_until(&mut editor, &mut surface, |s, _| s.edge_count() == 0);
        assert!(!editor.has_provisional());
    }

    #[test]
    fn test_commit_success_swaps_in_server_id() {
        let mut surface = surface();
        let conn = ScriptedConnection::default();
        let mut handle = ConnectionHandle::new(Box::new(conn));
        let mut editor = RelationshipEditor::new(schema(), 100.0);
        editor.sync_graph(&surface);

        editor.drag_update(&surface, "p1", OUT);
        poll_until(&mut editor, &mut surface, |s, _| s.edge_count() == 1);

        assert_eq!(editor.commit(&mut surface, &mut handle), 1);
        assert!(surface.edges().next().unwrap().locked);

        // Scripted connection replies synchronously.
        match handle.try_recv().expect("created reply") {
            ConnectionReply::Created { request, result } => {
                editor.handle_created(request, result, &mut surface, &mut handle);
            }
            other => panic!("unexpected reply {other:?}"),
        }
        assert_eq!(surface.edge_count(), 1);
        let edge = surface.get_edge("r-new").expect("server edge");
        assert!(!edge.provisional);
        assert!(!edge.locked);
    }

    #[test]
    fn test_commit_failure_reverts_like_cancel() {
        let mut surface = surface();
        surface.add_node(GraphNode::new("p9", "Old", "Project").with_position(Pos2::new(500.0, 0.0)));
        surface.add_edge(GraphEdge::new("e-old", "p9", "m1", "PROJECT_HAS_MILESTONE"));

        let conn = ScriptedConnection {
            create_results: vec![Err(ConnectionError::Transport("boom".into()))],
            ..Default::default()
        };
        let mut handle = ConnectionHandle::new(Box::new(conn));
        let mut editor = RelationshipEditor::new(schema(), 100.0);
        editor.sync_graph(&surface);

        editor.drag_update(&surface, "p1", OUT);
        // The conflicting e-old is hidden before the proposal appears.
        poll_until(&mut editor, &mut surface, |s, _| s.edge_count() == 2);
        assert!(surface.get_edge("e-old").unwrap().hidden);

        editor.commit(&mut surface, &mut handle);
        match handle.try_recv().expect("created reply") {
            ConnectionReply::Created { request, result } => {
                editor.handle_created(request, result, &mut surface, &mut handle);
            }
            other => panic!("unexpected reply {other:?}"),
        }

        // Reverted exactly as a cancelled drag: original unhidden, no
        // provisional left.
        assert_eq!(surface.edge_count(), 1);
        assert!(!surface.get_edge("e-old").unwrap().hidden);
        assert!(!editor.has_provisional());
    }

    #[test]
    fn test_duplicate_create_reuses_existing() {
        let mut surface = surface();
        let conn = ScriptedConnection {
            create_results: vec![Err(ConnectionError::AlreadyExists)],
            of_type_rows: vec![RelationshipRow {
                source_node: NodeRef::new("p1", "Project", "Apollo"),
                target_node: NodeRef::new("m1", "Milestone", "Launch"),
                id: "r-existing".into(),
                rel_type: "PROJECT_HAS_MILESTONE".into(),
            }],
        };
        let mut handle = ConnectionHandle::new(Box::new(conn));
        let mut editor = RelationshipEditor::new(schema(), 100.0);
        editor.sync_graph(&surface);

        editor.drag_update(&surface, "p1", OUT);
        poll_until(&mut editor, &mut surface, |s, _| s.edge_count() == 1);
        editor.commit(&mut surface, &mut handle);

        match handle.try_recv().expect("created reply") {
            ConnectionReply::Created { request, result } => {
                editor.handle_created(request, result, &mut surface, &mut handle);
            }
            other => panic!("unexpected reply {other:?}"),
        }
        match handle.try_recv().expect("lookup reply") {
            ConnectionReply::OfType {
                request, result, ..
            } => {
                editor.handle_of_type(request, result, &mut surface, &mut handle);
            }
            other => panic!("unexpected reply {other:?}"),
        }

        assert_eq!(surface.edge_count(), 1);
        assert!(surface.contains_edge("r-existing"));
        assert!(!editor.has_provisional());
    }
}
