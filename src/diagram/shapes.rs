//! Shape renderers, one per semantic node kind.
//!
//! The kind is a closed enum so every renderer is matched exhaustively;
//! adding a kind without a shape is a compile error.

use std::collections::HashMap;

use serde::Deserialize;

use super::{escape_xml, DiagramNode, DiagramOptions, Point};

const STROKE: &str = "#475569";
const LABEL_COLOR: &str = "#1e293b";
const PAGE_FOLD: f32 = 12.0;

/// Semantic node kinds and the shapes that render them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    /// Plain box
    Rectangle,
    /// Box with a folded page corner
    Page,
    /// Diamond decision icon
    Condition,
    /// Cylinder icon
    Datasource,
    /// Rounded box with a status dot
    Action,
}

/// Depth-based fill shade. The seed increments per nesting level; shading
/// only, never used for collision or identity.
fn fill_for_seed(seed: usize) -> String {
    let shades = [
        "#e2e8f0", "#cbd5e1", "#bfdbfe", "#bbf7d0", "#fde68a", "#fecaca",
    ];
    shades[seed % shades.len()].to_owned()
}

/// Render one node recursively: shape by kind, centered label, then the
/// children with the accumulated offset and an incremented color seed.
/// Absolute bounds land in `positions` for the inheritance pass.
pub(super) fn render_node(
    svg: &mut String,
    node: &DiagramNode,
    offset: Point,
    color_seed: usize,
    options: &DiagramOptions,
    positions: &mut HashMap<String, (f32, f32, f32, f32)>,
) {
    let x = offset.x + node.x;
    let y = offset.y + node.y;
    let (w, h) = (node.width, node.height);
    let fill = fill_for_seed(color_seed);

    match node.kind {
        ShapeKind::Rectangle => {
            svg.push_str(&format!(
                "<rect x=\"{x:.2}\" y=\"{y:.2}\" width=\"{w:.2}\" height=\"{h:.2}\" fill=\"{fill}\" stroke=\"{STROKE}\" stroke-width=\"1\"/>",
            ));
        }
        ShapeKind::Page => {
            // Rectangle with the top-right corner folded in.
            let f = PAGE_FOLD.min(w / 2.0).min(h / 2.0);
            svg.push_str(&format!(
                "<polygon points=\"{x:.2},{y:.2} {:.2},{y:.2} {:.2},{:.2} {:.2},{:.2} {x:.2},{:.2}\" fill=\"{fill}\" stroke=\"{STROKE}\" stroke-width=\"1\"/>",
                x + w - f,
                x + w,
                y + f,
                x + w,
                y + h,
                y + h,
            ));
            svg.push_str(&format!(
                "<polyline points=\"{:.2},{y:.2} {:.2},{:.2} {:.2},{:.2}\" fill=\"none\" stroke=\"{STROKE}\" stroke-width=\"1\"/>",
                x + w - f,
                x + w - f,
                y + f,
                x + w,
                y + f,
            ));
        }
        ShapeKind::Condition => {
            // Diamond spanning the node bounds.
            let (cx, cy) = (x + w / 2.0, y + h / 2.0);
            svg.push_str(&format!(
                "<polygon points=\"{cx:.2},{y:.2} {:.2},{cy:.2} {cx:.2},{:.2} {x:.2},{cy:.2}\" fill=\"{fill}\" stroke=\"{STROKE}\" stroke-width=\"1\"/>",
                x + w,
                y + h,
            ));
        }
        ShapeKind::Datasource => {
            // Cylinder: body plus elliptical lid.
            let ry = (h * 0.15).min(10.0);
            svg.push_str(&format!(
                "<path d=\"M {x:.2} {:.2} A {:.2} {ry:.2} 0 0 1 {:.2} {:.2} L {:.2} {:.2} A {:.2} {ry:.2} 0 0 1 {x:.2} {:.2} Z\" fill=\"{fill}\" stroke=\"{STROKE}\" stroke-width=\"1\"/>",
                y + ry,
                w / 2.0,
                x + w,
                y + ry,
                x + w,
                y + h - ry,
                w / 2.0,
                y + h - ry,
            ));
            svg.push_str(&format!(
                "<ellipse cx=\"{:.2}\" cy=\"{:.2}\" rx=\"{:.2}\" ry=\"{ry:.2}\" fill=\"{fill}\" stroke=\"{STROKE}\" stroke-width=\"1\"/>",
                x + w / 2.0,
                y + ry,
                w / 2.0,
            ));
        }
        ShapeKind::Action => {
            svg.push_str(&format!(
                "<rect x=\"{x:.2}\" y=\"{y:.2}\" width=\"{w:.2}\" height=\"{h:.2}\" rx=\"8\" ry=\"8\" fill=\"{fill}\" stroke=\"{STROKE}\" stroke-width=\"1\"/>",
            ));
            svg.push_str(&format!(
                "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"3\" fill=\"{STROKE}\"/>",
                x + 10.0,
                y + h / 2.0,
            ));
        }
    }

    if !node.label.is_empty() {
        svg.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" dominant-baseline=\"middle\" font-family=\"sans-serif\" font-size=\"{}\" fill=\"{LABEL_COLOR}\">{}</text>",
            x + w / 2.0,
            y + h / 2.0,
            options.font_size,
            escape_xml(&node.label),
        ));
    }

    for port in &node.ports {
        svg.push_str(&format!(
            "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"2.5\" fill=\"{STROKE}\"/>",
            x + port.x,
            y + port.y,
        ));
    }

    positions.insert(node.id.clone(), (x, y, w, h));

    let child_offset = Point::new(x, y);
    for child in &node.children {
        render_node(svg, child, child_offset, color_seed + 1, options, positions);
    }
}

// =============================================================================
// TESTS
// =============================================================================
