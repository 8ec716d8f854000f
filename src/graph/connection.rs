//! Connection seam between the browser and the host transport.
//!
//! The browser never talks to a server directly. The host injects a
//! [`GraphConnection`] implementation (WebSocket, REST, fixture data - the
//! browser does not care) and every call carries a request id plus a reply
//! sender. Replies arrive asynchronously on a single crossbeam channel and
//! are routed by the widget each frame; nothing here blocks.

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Deserialize;

/// Monotonically increasing request identifier, assigned by
/// [`ConnectionHandle`]. Used to discard stale replies.
pub type RequestId = u64;

/// Relationship fetch direction, relative to the queried node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Relationships pointing at the node
    In,
    /// Relationships leaving the node
    Out,
}

/// One endpoint of a fetched relationship.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NodeRef {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub name: String,
}

impl NodeRef {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            name: name.into(),
        }
    }
}

/// One row of a relationship fetch result.
///
/// Unknown extra fields in the server payload are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RelationshipRow {
    #[serde(rename = "sourceNode")]
    pub source_node: NodeRef,
    #[serde(rename = "targetNode")]
    pub target_node: NodeRef,
    pub id: String,
    #[serde(rename = "relType")]
    pub rel_type: String,
}

impl RelationshipRow {
    /// The endpoint on the far side of the queried node for the given
    /// direction: target for outgoing rows, source for incoming ones.
    pub fn far_endpoint(&self, direction: Direction) -> &NodeRef {
        match direction {
            Direction::Out => &self.target_node,
            Direction::In => &self.source_node,
        }
    }
}

/// Result of a successful create-relationship request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreatedRelationship {
    /// Server-assigned relationship id
    pub id: String,
}

/// Failures reported by the connection collaborator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnectionError {
    /// The relationship to create already exists. Recoverable: the editor
    /// looks up and reuses the existing relationship.
    #[error("relationship already exists")]
    AlreadyExists,

    /// Anything else the transport reports.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Replies delivered on the shared channel. Each variant echoes the request
/// id (and enough context to route without a lookup table).
#[derive(Debug, Clone)]
pub enum ConnectionReply {
    Relationships {
        request: RequestId,
        node_id: String,
        direction: Direction,
        result: Result<Vec<RelationshipRow>, ConnectionError>,
    },
    Schema {
        request: RequestId,
        result: Result<crate::graph::schema::Schema, ConnectionError>,
    },
    Created {
        request: RequestId,
        result: Result<CreatedRelationship, ConnectionError>,
    },
    Deleted {
        request: RequestId,
        result: Result<(), ConnectionError>,
    },
    OfType {
        request: RequestId,
        rel_type: String,
        result: Result<Vec<RelationshipRow>, ConnectionError>,
    },
}

/// The transport seam. Implementations must not block: fire the request,
/// return, and deliver the outcome on `reply` whenever it completes.
/// Out-of-order completion is expected and handled by the callers.
pub trait GraphConnection: Send {
    /// Fetch relationships of `node_id` in one direction.
    fn fetch_relationships(
        &mut self,
        request: RequestId,
        node_id: &str,
        direction: Direction,
        reply: &Sender<ConnectionReply>,
    );

    /// Fetch the schema relation descriptors (once, at startup).
    fn fetch_schema(&mut self, request: RequestId, reply: &Sender<ConnectionReply>);

    /// Create a relationship between two existing nodes.
    fn create_relationship(
        &mut self,
        request: RequestId,
        source_id: &str,
        target_id: &str,
        rel_type: &str,
        reply: &Sender<ConnectionReply>,
    );

    /// Delete a relationship by id.
    fn delete_relationship(&mut self, request: RequestId, relationship_id: &str, reply: &Sender<ConnectionReply>);

    /// Fetch every relationship of one type (duplicate-create recovery).
    fn relationships_of_type(&mut self, request: RequestId, rel_type: &str, reply: &Sender<ConnectionReply>);
}

/// Owns the injected connection, the reply channel, and the request counter.
pub struct ConnectionHandle {
    conn: Box<dyn GraphConnection>,
    tx: Sender<ConnectionReply>,
    rx: Receiver<ConnectionReply>,
    next_request: RequestId,
}

impl ConnectionHandle {
    pub fn new(conn: Box<dyn GraphConnection>) -> Self {
        let (tx, rx) = unbounded();
        Self {
            conn,
            tx,
            rx,
            next_request: 1,
        }
    }

    fn next(&mut self) -> RequestId {
        let id = self.next_request;
        self.next_request += 1;
        id
    }

    pub fn fetch_relationships(&mut self, node_id: &str, direction: Direction) -> RequestId {
        let id = self.next();
        tracing::debug!(request = id, node_id, ?direction, "fetch relationships");
        self.conn.fetch_relationships(id, node_id, direction, &self.tx);
        id
    }

    pub fn fetch_schema(&mut self) -> RequestId {
        let id = self.next();
        tracing::debug!(request = id, "fetch schema");
        self.conn.fetch_schema(id, &self.tx);
        id
    }

    pub fn create_relationship(&mut self, source_id: &str, target_id: &str, rel_type: &str) -> RequestId {
        let id = self.next();
        tracing::debug!(request = id, source_id, target_id, rel_type, "create relationship");
        self.conn
            .create_relationship(id, source_id, target_id, rel_type, &self.tx);
        id
    }

    pub fn delete_relationship(&mut self, relationship_id: &str) -> RequestId {
        let id = self.next();
        tracing::debug!(request = id, relationship_id, "delete relationship");
        self.conn.delete_relationship(id, relationship_id, &self.tx);
        id
    }

    pub fn relationships_of_type(&mut self, rel_type: &str) -> RequestId {
        let id = self.next();
        tracing::debug!(request = id, rel_type, "fetch relationships of type");
        self.conn.relationships_of_type(id, rel_type, &self.tx);
        id
    }

    /// Drain one pending reply, if any. Called in a loop each frame.
    pub fn try_recv(&mut self) -> Option<ConnectionReply> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relationship_row_deserializes_server_shape() {
        let json = r#"{
            "sourceNode": {"id": "p1", "type": "Project", "name": "Apollo"},
            "targetNode": {"id": "m1", "type": "Milestone", "name": "Launch"},
            "id": "r1",
            "relType": "PROJECT_HAS_MILESTONE",
            "someExtraField": 42
        }"#;
        let row: RelationshipRow = serde_json::from_str(json).unwrap();
        assert_eq!(row.source_node.node_type, "Project");
        assert_eq!(row.target_node.id, "m1");
        assert_eq!(row.rel_type, "PROJECT_HAS_MILESTONE");
    }

    #[test]
    fn test_far_endpoint_by_direction() {
        let row = RelationshipRow {
            source_node: NodeRef::new("a", "A", "a"),
            target_node: NodeRef::new("b", "B", "b"),
            id: "r".into(),
            rel_type: "REL".into(),
        };
        assert_eq!(row.far_endpoint(Direction::Out).id, "b");
        assert_eq!(row.far_endpoint(Direction::In).id, "a");
    }
}
