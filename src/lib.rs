//! Graph Browser Widget
//!
//! This crate contains ONLY the graph browser widget - no API client, no app
//! shell. The host application owns the transport and injects it through the
//! [`GraphConnection`] seam; the widget owns everything from the wire rows to
//! the pixels.
//!
//! # Architecture
//!
//! ```text
//! GraphConnection (host-provided transport)
//!        │ replies (crossbeam channel)
//!        ▼
//! GraphBrowserWidget
//!        ├──► GraphSurface (node/edge collections, events, spatial index)
//!        ├──► Expander (hover popup, expand/collapse, undo)
//!        ├──► GraphFilter (type filtering, hide/show)
//!        ├──► SelectionTool (named groups, lasso, halo)
//!        ├──► RelationshipEditor (drag-to-relate, background worker)
//!        └──► GraphRenderer (draws to egui::Painter via Camera2D)
//! ```
//!
//! The `diagram` module is an independent, synchronous pipeline that formats
//! layout-engine output into SVG.

pub mod diagram;
pub mod error;
pub mod graph;

pub use error::GraphBrowserError;

pub use graph::{
    // Camera
    camera::Camera2D,
    // Connection seam
    connection::{
        ConnectionError, ConnectionHandle, ConnectionReply, CreatedRelationship, Direction,
        GraphConnection, NodeRef, RelationshipRow, RequestId,
    },
    // Expansion
    expand::{ExpansionRecord, ExpansionState, Expander, HoverPopup, TypeBucket},
    // Filtering
    filter::{FilterMode, GraphFilter},
    // Relationship editing
    relate::{
        worker::{DragKeys, WorkerCommand, WorkerEdge, WorkerNode, WorkerRequest},
        RelationshipEditor,
    },
    // Rendering
    render::GraphRenderer,
    // Schema
    schema::{RelationDescriptor, Multiplicity, NodeSchema, Schema, TypeSet},
    // Selection
    select::{SelectionGroup, SelectionTool},
    // Surface
    surface::{GraphSurface, SettingValue, SurfaceEvent, SurfaceEventKind, SurfaceSettings},
    // Core types
    types::{EdgePatch, GraphEdge, GraphNode, NodePatch},
    // Widget
    BrowserConfig, GraphBrowserWidget,
};

pub use diagram::{
    render_diagram, DiagramEdge, DiagramNode, DiagramOptions, EdgeRouting, EdgeSection, Point,
    ShapeKind,
};
