//! Edge routing: orthogonal polylines or rounded corners.
//!
//! Rounded mode insets each bend point by a fixed radius along the unit
//! vectors toward its neighbors and emits a quadratic curve whose control
//! point is the original bend. Collinear bends therefore degenerate to a
//! straight line: the control point already lies on it.

use serde::Deserialize;

use super::{DiagramEdge, DiagramOptions, EdgeSection, Point};

const EDGE_COLOR: &str = "#475569";

/// How bend points are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeRouting {
    /// Straight line through every bend point
    Orthogonal,
    /// Corners rounded with a quadratic curve
    #[default]
    Rounded,
}

pub(super) fn render_edge(svg: &mut String, edge: &DiagramEdge, options: &DiagramOptions) {
    for section in &edge.sections {
        let d = match options.routing {
            EdgeRouting::Orthogonal => orthogonal_path(section),
            EdgeRouting::Rounded => rounded_path(section, options.corner_radius),
        };
        svg.push_str(&format!(
            "<path d=\"{d}\" fill=\"none\" stroke=\"{EDGE_COLOR}\" stroke-width=\"1.4\"/>",
        ));
    }
}

fn orthogonal_path(section: &EdgeSection) -> String {
    let mut d = format!("M {:.2} {:.2}", section.start.x, section.start.y);
    for bend in &section.bends {
        d.push_str(&format!(" L {:.2} {:.2}", bend.x, bend.y));
    }
    d.push_str(&format!(" L {:.2} {:.2}", section.end.x, section.end.y));
    d
}

fn rounded_path(section: &EdgeSection, radius: f32) -> String {
    let mut d = format!("M {:.2} {:.2}", section.start.x, section.start.y);
    let mut previous = section.start;
    for (i, bend) in section.bends.iter().enumerate() {
        let next = section
            .bends
            .get(i + 1)
            .copied()
            .unwrap_or(section.end);
        let (approach, depart) = corner_points(previous, *bend, next, radius);
        d.push_str(&format!(" L {:.2} {:.2}", approach.x, approach.y));
        d.push_str(&format!(
            " Q {:.2} {:.2} {:.2} {:.2}",
            bend.x, bend.y, depart.x, depart.y
        ));
        previous = *bend;
    }
    d.push_str(&format!(" L {:.2} {:.2}", section.end.x, section.end.y));
    d
}

/// The approach and departure points of a rounded corner: the bend inset by
/// `radius` along the normalized vectors to each neighbor, clamped to half
/// the segment length so short segments never overshoot.
fn corner_points(prev: Point, bend: Point, next: Point, radius: f32) -> (Point, Point) {
    (
        inset_toward(bend, prev, radius),
        inset_toward(bend, next, radius),
    )
}

fn inset_toward(from: Point, to: Point, radius: f32) -> Point {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let length = (dx * dx + dy * dy).sqrt();
    if length < f32::EPSILON {
        return from;
    }
    let r = radius.min(length / 2.0);
    Point::new(from.x + dx / length * r, from.y + dy / length * r)
}

// =============================================================================
// TESTS
// =============================================================================
