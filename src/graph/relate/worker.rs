//! Background worker for drag-to-relate geometry.
//!
//! The per-frame distance computation runs on a dedicated thread so the UI
//! never blocks during a drag. Communication is message passing over
//! crossbeam channels in both directions; the worker only ever PROPOSES
//! mutations ([`WorkerCommand`]) and the main thread applies them, so the
//! node/edge collections need no locking.
//!
//! [`WorkerState`] holds the actual logic and is driven synchronously by
//! tests; [`spawn_worker`] wraps it in the thread + channel plumbing.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::thread::JoinHandle;

use crate::graph::schema::{Multiplicity, Schema};

/// Modifier keys held during the drag. One key proposes relationships
/// OUTGOING from the dragged node, the other INCOMING to it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DragKeys {
    pub outgoing: bool,
    pub incoming: bool,
}

/// Worker's view of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerNode {
    pub id: String,
    pub node_type: String,
    pub x: f32,
    pub y: f32,
}

impl WorkerNode {
    fn distance_to(&self, other: &WorkerNode) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Worker's view of one edge.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerEdge {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub rel_type: String,
}

/// Main thread -> worker.
#[derive(Debug, Clone)]
pub enum WorkerRequest {
    /// One-time setup with the schema and the current graph snapshot.
    Init {
        schema: Schema,
        max_distance: f32,
        nodes: Vec<WorkerNode>,
        edges: Vec<WorkerEdge>,
    },
    /// Refresh the worker's view after any external mutation.
    UpdateGraph {
        nodes: Vec<WorkerNode>,
        edges: Vec<WorkerEdge>,
    },
    /// One drag-move frame while a modifier key is held.
    HandleDrag { dragged: WorkerNode, keys: DragKeys },
    /// Unwind all provisional edges and restore hidden originals.
    RemoveNewEdges,
    Shutdown,
}

/// Worker -> main thread. Proposed mutations only; the main thread owns the
/// collections.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerCommand {
    /// Render a provisional edge, optionally replacing a hidden one.
    AddProvisional {
        id: String,
        source_id: String,
        target_id: String,
        rel_type: String,
        replaces: Option<String>,
    },
    RemoveProvisional { id: String },
    HideEdge { id: String },
    UnhideEdge { id: String },
}

struct Provisional {
    id: String,
    source_id: String,
    target_id: String,
    rel_type: String,
}

/// The drag-evaluation logic, free of any thread plumbing.
#[derive(Default)]
pub struct WorkerState {
    schema: Schema,
    max_distance: f32,
    nodes: Vec<WorkerNode>,
    edges: Vec<WorkerEdge>,
    provisional: Option<Provisional>,
    /// Edges hidden to make room for the current provisional edge
    hidden: Vec<String>,
}

impl WorkerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one request, returning the proposed mutations in order.
    pub fn handle(&mut self, request: WorkerRequest) -> Vec<WorkerCommand> {
        match request {
            WorkerRequest::Init {
                schema,
                max_distance,
                nodes,
                edges,
            } => {
                self.schema = schema;
                self.max_distance = max_distance;
                self.nodes = nodes;
                self.edges = edges;
                Vec::new()
            }
            WorkerRequest::UpdateGraph { nodes, edges } => {
                self.nodes = nodes;
                self.edges = edges;
                Vec::new()
            }
            WorkerRequest::HandleDrag { dragged, keys } => self.handle_drag(dragged, keys),
            WorkerRequest::RemoveNewEdges => self.retreat(),
            WorkerRequest::Shutdown => Vec::new(),
        }
    }

    fn handle_drag(&mut self, dragged: WorkerNode, keys: DragKeys) -> Vec<WorkerCommand> {
        if !keys.outgoing && !keys.incoming {
            return self.retreat();
        }

        // Nearest other node within range, using the dragged node's live
        // position from the message.
        let near = self
            .nodes
            .iter()
            .filter(|n| n.id != dragged.id)
            .map(|n| (n, n.distance_to(&dragged)))
            .filter(|(_, d)| *d <= self.max_distance)
            .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let Some((other, distance)) = near else {
            return self.retreat();
        };
        let other = other.clone();

        // Held key decides the direction; outgoing wins when both are down.
        let (source, target) = if keys.outgoing {
            (&dragged, &other)
        } else {
            (&other, &dragged)
        };

        let candidates = self
            .schema
            .candidates_between(&source.node_type, &target.node_type);
        if candidates.is_empty() {
            // Schema-incompatible pair: silently offer nothing.
            return self.retreat();
        }

        // Partition max_distance into equal bands, one per candidate type;
        // the band the current distance falls into picks the type.
        let band = self.max_distance / candidates.len() as f32;
        let index = ((distance / band) as usize).min(candidates.len() - 1);
        let descriptor = candidates[index];
        let rel_type = descriptor.rel_type.clone();
        let source_mult = descriptor.source_multiplicity;
        let target_mult = descriptor.target_multiplicity;

        if let Some(ref current) = self.provisional {
            if current.source_id == source.id
                && current.target_id == target.id
                && current.rel_type == rel_type
            {
                return Vec::new();
            }
        }

        // The pair or type changed: unwind the previous proposal first.
        let mut commands = self.retreat();

        // A multiplicity-1 end conflicts with any existing edge of the same
        // type sharing that end; hide those before showing the provisional.
        let mut conflicts: Vec<String> = Vec::new();
        for edge in &self.edges {
            if edge.rel_type != rel_type {
                continue;
            }
            let on_source_end = edge.source_id == source.id || edge.target_id == source.id;
            let on_target_end = edge.source_id == target.id || edge.target_id == target.id;
            if (source_mult == Multiplicity::One && on_source_end)
                || (target_mult == Multiplicity::One && on_target_end)
            {
                conflicts.push(edge.id.clone());
            }
        }
        for id in &conflicts {
            commands.push(WorkerCommand::HideEdge { id: id.clone() });
        }

        let id = format!("tmp-{}", uuid::Uuid::new_v4());
        commands.push(WorkerCommand::AddProvisional {
            id: id.clone(),
            source_id: source.id.clone(),
            target_id: target.id.clone(),
            rel_type: rel_type.clone(),
            replaces: conflicts.first().cloned(),
        });
        self.provisional = Some(Provisional {
            id,
            source_id: source.id.clone(),
            target_id: target.id.clone(),
            rel_type,
        });
        self.hidden = conflicts;
        commands
    }

    /// Unwind the current proposal: remove the provisional edge and restore
    /// every edge hidden for it.
    fn retreat(&mut self) -> Vec<WorkerCommand> {
        let mut commands = Vec::new();
        if let Some(provisional) = self.provisional.take() {
            commands.push(WorkerCommand::RemoveProvisional { id: provisional.id });
        }
        for id in self.hidden.drain(..) {
            commands.push(WorkerCommand::UnhideEdge { id });
        }
        commands
    }
}

/// Spawn the worker thread. Returns the request sender, the command
/// receiver, and the join handle (joined on editor drop after `Shutdown`).
pub fn spawn_worker() -> (Sender<WorkerRequest>, Receiver<WorkerCommand>, JoinHandle<()>) {
    let (req_tx, req_rx) = unbounded::<WorkerRequest>();
    let (cmd_tx, cmd_rx) = unbounded::<WorkerCommand>();
    let handle = std::thread::spawn(move || {
        let mut state = WorkerState::new();
        tracing::debug!("relationship worker started");
        while let Ok(request) = req_rx.recv() {
            if matches!(request, WorkerRequest::Shutdown) {
                break;
            }
            for command in state.handle(request) {
                if cmd_tx.send(command).is_err() {
                    return;
                }
            }
        }
        tracing::debug!("relationship worker stopped");
    });
    (req_tx, cmd_rx, handle)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        serde_json::from_str(
            r#"{
                "Project": {
                    "relatedTo": [
                        {"relType": "PROJECT_HAS_MILESTONE", "targetMultiplicity": "1",
                         "possibleTargetTypes": ["Milestone"]},
                        {"relType": "PROJECT_TRACKS", "possibleTargetTypes": ["Milestone"]}
                    ]
                },
                "Milestone": {}
            }"#,
        )
        .unwrap()
    }

    fn node(id: &str, node_type: &str, x: f32) -> WorkerNode {
        WorkerNode {
            id: id.to_owned(),
            node_type: node_type.to_owned(),
            x,
            y: 0.0,
        }
    }

    fn init(state: &mut WorkerState, edges: Vec<WorkerEdge>) {
        state.handle(WorkerRequest::Init {
            schema: schema(),
            max_distance: 100.0,
            nodes: vec![node("p1", "Project", 0.0), node("m1", "Milestone", 40.0)],
            edges,
        });
    }

    fn drag(state: &mut WorkerState, x: f32, keys: DragKeys) -> Vec<WorkerCommand> {
        state.handle(WorkerRequest::HandleDrag {
            dragged: node("p1", "Project", x),
            keys,
        })
    }

    const OUT: DragKeys = DragKeys {
        outgoing: true,
        incoming: false,
    };

    #[test]
    fn test_close_band_picks_first_candidate() {
        let mut state = WorkerState::new();
        init(&mut state, vec![]);

        // Distance 40, two candidates, band width 50: first type.
        let commands = drag(&mut state, 0.0, OUT);
        assert_eq!(commands.len(), 1);
        match &commands[0] {
            WorkerCommand::AddProvisional {
                source_id,
                target_id,
                rel_type,
                replaces,
                ..
            } => {
                assert_eq!(source_id, "p1");
                assert_eq!(target_id, "m1");
                assert_eq!(rel_type, "PROJECT_HAS_MILESTONE");
                assert!(replaces.is_none());
            }
            other => panic!("expected AddProvisional, got {other:?}"),
        }
    }

    #[test]
    fn test_far_band_picks_later_candidate_and_swaps() {
        let mut state = WorkerState::new();
        init(&mut state, vec![]);
        drag(&mut state, 0.0, OUT);

        // Move away: distance 80 falls in the second band. The first
        // proposal is withdrawn before the new one appears.
        let commands = drag(&mut state, -40.0, OUT);
        assert!(matches!(commands[0], WorkerCommand::RemoveProvisional { .. }));
        match &commands[1] {
            WorkerCommand::AddProvisional { rel_type, .. } => {
                assert_eq!(rel_type, "PROJECT_TRACKS")
            }
            other => panic!("expected AddProvisional, got {other:?}"),
        }
    }

    #[test]
    fn test_stable_drag_repeats_nothing() {
        let mut state = WorkerState::new();
        init(&mut state, vec![]);
        drag(&mut state, 0.0, OUT);
        assert!(drag(&mut state, 1.0, OUT).is_empty());
    }

    #[test]
    fn test_multiplicity_conflict_hides_existing_edge() {
        let mut state = WorkerState::new();
        // m1 already has an incoming PROJECT_HAS_MILESTONE from elsewhere;
        // targetMultiplicity 1 means it must be hidden first.
        init(
            &mut state,
            vec![WorkerEdge {
                id: "e-old".to_owned(),
                source_id: "p9".to_owned(),
                target_id: "m1".to_owned(),
                rel_type: "PROJECT_HAS_MILESTONE".to_owned(),
            }],
        );

        let commands = drag(&mut state, 0.0, OUT);
        assert_eq!(
            commands[0],
            WorkerCommand::HideEdge {
                id: "e-old".to_owned()
            }
        );
        match &commands[1] {
            WorkerCommand::AddProvisional { replaces, .. } => {
                assert_eq!(replaces.as_deref(), Some("e-old"))
            }
            other => panic!("expected AddProvisional, got {other:?}"),
        }

        // Releasing the key restores the hidden edge.
        let commands = drag(&mut state, 0.0, DragKeys::default());
        assert!(matches!(commands[0], WorkerCommand::RemoveProvisional { .. }));
        assert_eq!(
            commands[1],
            WorkerCommand::UnhideEdge {
                id: "e-old".to_owned()
            }
        );
    }

    #[test]
    fn test_incoming_key_reverses_direction() {
        let mut state = WorkerState::new();
        state.handle(WorkerRequest::Init {
            schema: schema(),
            max_distance: 100.0,
            nodes: vec![node("m1", "Milestone", 0.0), node("p1", "Project", 40.0)],
            edges: vec![],
        });

        // Dragging the milestone with the incoming key: p1 -> m1.
        let commands = state.handle(WorkerRequest::HandleDrag {
            dragged: node("m1", "Milestone", 0.0),
            keys: DragKeys {
                outgoing: false,
                incoming: true,
            },
        });
        match &commands[0] {
            WorkerCommand::AddProvisional {
                source_id,
                target_id,
                ..
            } => {
                assert_eq!(source_id, "p1");
                assert_eq!(target_id, "m1");
            }
            other => panic!("expected AddProvisional, got {other:?}"),
        }
    }

    #[test]
    fn test_incompatible_pair_is_silently_ignored() {
        let mut state = WorkerState::new();
        state.handle(WorkerRequest::Init {
            schema: schema(),
            max_distance: 100.0,
            nodes: vec![node("m1", "Milestone", 0.0), node("m2", "Milestone", 40.0)],
            edges: vec![],
        });
        let commands = state.handle(WorkerRequest::HandleDrag {
            dragged: node("m1", "Milestone", 0.0),
            keys: OUT,
        });
        assert!(commands.is_empty());
    }

    #[test]
    fn test_out_of_range_retreats() {
        let mut state = WorkerState::new();
        init(&mut state, vec![]);
        drag(&mut state, 0.0, OUT);
        let commands = drag(&mut state, -500.0, OUT);
        assert_eq!(commands.len(), 1);
        assert!(matches!(commands[0], WorkerCommand::RemoveProvisional { .. }));
    }

    #[test]
    fn test_remove_new_edges_request() {
        let mut state = WorkerState::new();
        init(&mut state, vec![]);
        drag(&mut state, 0.0, OUT);
        let commands = state.handle(WorkerRequest::RemoveNewEdges);
        assert!(matches!(commands[0], WorkerCommand::RemoveProvisional { .. }));
        assert!(state.handle(WorkerRequest::RemoveNewEdges).is_empty());
    }

    #[test]
    fn test_spawned_worker_round_trip() {
        let (tx, rx, handle) = spawn_worker();
        tx.send(WorkerRequest::Init {
            schema: schema(),
            max_distance: 100.0,
            nodes: vec![node("p1", "Project", 0.0), node("m1", "Milestone", 40.0)],
            edges: vec![],
        })
        .unwrap();
        tx.send(WorkerRequest::HandleDrag {
            dragged: node("p1", "Project", 0.0),
            keys: OUT,
        })
        .unwrap();

        let command = rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("worker reply");
        assert!(matches!(command, WorkerCommand::AddProvisional { .. }));

        tx.send(WorkerRequest::Shutdown).unwrap();
        handle.join().unwrap();
    }
}
