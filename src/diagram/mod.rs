//! SVG diagram formatters.
//!
//! A pure, synchronous pipeline, independent of the interactive browser:
//! layout-engine output (positioned boxes, edges with bend points) goes in,
//! an SVG string comes out. Child nodes recurse with an accumulated offset
//! and an incremented color seed used for depth shading.

mod edges;
mod shapes;

use std::collections::HashMap;

use serde::Deserialize;

pub use edges::EdgeRouting;
pub use shapes::ShapeKind;

/// A 2D point in diagram coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One node of the layout-engine output. Coordinates are relative to the
/// parent node; children recurse.
#[derive(Debug, Clone, Deserialize)]
pub struct DiagramNode {
    pub id: String,
    /// Display text, centered in the shape
    pub label: String,
    /// Shape selector
    pub kind: ShapeKind,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub children: Vec<DiagramNode>,
    /// Connection ports on the node boundary, if the layout engine emits any
    #[serde(default)]
    pub ports: Vec<Point>,
}

/// One routing section of an edge: start, end, and the bend points between.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EdgeSection {
    pub start: Point,
    pub end: Point,
    #[serde(default)]
    pub bends: Vec<Point>,
}

/// One edge of the layout-engine output.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiagramEdge {
    pub sections: Vec<EdgeSection>,
}

/// Rendering options.
#[derive(Debug, Clone)]
pub struct DiagramOptions {
    pub routing: EdgeRouting,
    /// Corner radius for `EdgeRouting::Rounded`
    pub corner_radius: f32,
    pub font_size: f32,
}

impl Default for DiagramOptions {
    fn default() -> Self {
        Self {
            routing: EdgeRouting::Rounded,
            corner_radius: 6.0,
            font_size: 12.0,
        }
    }
}

/// Render a complete diagram: edges below nodes, then the manually supplied
/// inheritance edges as dashed lines between nodes looked up by id.
pub fn render_diagram(
    nodes: &[DiagramNode],
    edges: &[DiagramEdge],
    inheritance: &[(String, String)],
    options: &DiagramOptions,
) -> String {
    let (width, height) = extent(nodes);
    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.0}\" height=\"{height:.0}\" viewBox=\"0 0 {width:.0} {height:.0}\">",
    ));

    for edge in edges {
        edges::render_edge(&mut svg, edge, options);
    }

    // Absolute bounds per node id, recorded while rendering, for the
    // inheritance pass.
    let mut positions: HashMap<String, (f32, f32, f32, f32)> = HashMap::new();
    for node in nodes {
        shapes::render_node(&mut svg, node, Point::default(), 0, options, &mut positions);
    }

    for (from, to) in inheritance {
        render_inheritance_edge(&mut svg, from, to, &positions);
    }

    svg.push_str("</svg>");
    svg
}

/// Dashed straight line between the centers of two already-rendered nodes.
/// Unknown ids are skipped.
fn render_inheritance_edge(
    svg: &mut String,
    from: &str,
    to: &str,
    positions: &HashMap<String, (f32, f32, f32, f32)>,
) {
    let (Some(a), Some(b)) = (positions.get(from), positions.get(to)) else {
        return;
    };
    let (ax, ay) = (a.0 + a.2 / 2.0, a.1 + a.3 / 2.0);
    let (bx, by) = (b.0 + b.2 / 2.0, b.1 + b.3 / 2.0);
    svg.push_str(&format!(
        "<line x1=\"{ax:.2}\" y1=\"{ay:.2}\" x2=\"{bx:.2}\" y2=\"{by:.2}\" stroke=\"#64748b\" stroke-width=\"1.2\" stroke-dasharray=\"6 4\"/>",
    ));
}

fn extent(nodes: &[DiagramNode]) -> (f32, f32) {
    fn walk(node: &DiagramNode, ox: f32, oy: f32, max: &mut (f32, f32)) {
        let x = ox + node.x + node.width;
        let y = oy + node.y + node.height;
        max.0 = max.0.max(x);
        max.1 = max.1.max(y);
        for child in &node.children {
            walk(child, ox + node.x, oy + node.y, max);
        }
    }
    let mut max = (200.0_f32, 200.0_f32);
    for node in nodes {
        walk(node, 0.0, 0.0, &mut max);
    }
    (max.0 + 20.0, max.1 + 20.0)
}

pub(crate) fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, kind: ShapeKind, x: f32, y: f32) -> DiagramNode {
        DiagramNode {
            id: id.to_owned(),
            label: id.to_owned(),
            kind,
            x,
            y,
            width: 100.0,
            height: 40.0,
            children: Vec::new(),
            ports: Vec::new(),
        }
    }

    #[test]
    fn test_renders_well_formed_svg() {
        let nodes = vec![node("a", ShapeKind::Rectangle, 10.0, 10.0)];
        let svg = render_diagram(&nodes, &[], &[], &DiagramOptions::default());
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("<rect"));
        assert!(svg.contains(">a</text>"));
    }

    #[test]
    fn test_children_render_with_accumulated_offset() {
        let mut parent = node("parent", ShapeKind::Rectangle, 10.0, 10.0);
        parent.width = 300.0;
        parent.height = 200.0;
        parent.children.push(node("child", ShapeKind::Rectangle, 20.0, 30.0));
        let svg = render_diagram(&[parent], &[], &[], &DiagramOptions::default());

        // Child rect sits at parent origin + child offset.
        assert!(svg.contains("x=\"30.00\""));
        assert!(svg.contains("y=\"40.00\""));
    }

    #[test]
    fn test_inheritance_edge_between_rendered_nodes() {
        let nodes = vec![
            node("a", ShapeKind::Rectangle, 0.0, 0.0),
            node("b", ShapeKind::Rectangle, 200.0, 0.0),
        ];
        let svg = render_diagram(
            &nodes,
            &[],
            &[("a".to_owned(), "b".to_owned())],
            &DiagramOptions::default(),
        );
        assert!(svg.contains("stroke-dasharray=\"6 4\""));
        // Line runs center to center.
        assert!(svg.contains("x1=\"50.00\""));
        assert!(svg.contains("x2=\"250.00\""));
    }

    #[test]
    fn test_inheritance_with_unknown_id_is_skipped() {
        let nodes = vec![node("a", ShapeKind::Rectangle, 0.0, 0.0)];
        let svg = render_diagram(
            &nodes,
            &[],
            &[("a".to_owned(), "ghost".to_owned())],
            &DiagramOptions::default(),
        );
        assert!(!svg.contains("<line"));
    }

    #[test]
    fn test_label_is_escaped() {
        let mut n = node("a", ShapeKind::Rectangle, 0.0, 0.0);
        n.label = "a < b & c".to_owned();
        let svg = render_diagram(&[n], &[], &[], &DiagramOptions::default());
        assert!(svg.contains("a &lt; b &amp; c"));
    }

    #[test]
    fn test_deserializes_layout_engine_shape() {
        let json = r#"{
            "id": "n1", "label": "Start", "kind": "action",
            "x": 0, "y": 0, "width": 80, "height": 30,
            "children": [
                {"id": "n2", "label": "Inner", "kind": "condition",
                 "x": 5, "y": 5, "width": 40, "height": 20}
            ]
        }"#;
        let node: DiagramNode = serde_json::from_str(json).unwrap();
        assert_eq!(node.kind, ShapeKind::Action);
        assert_eq!(node.children.len(), 1);
        assert_eq!(node.children[0].kind, ShapeKind::Condition);
    }
}
