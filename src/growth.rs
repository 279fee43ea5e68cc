//! Dynamic graph growth: materializing children from generation results.
//!
//! Translates a completed step's fan-out into canvas mutations: fresh child
//! nodes whose `inputs` point back at the originating node, matching
//! connections, and optionally a cosmetic group bounding the new siblings.
//! Growth is strictly append-only (no existing node, edge, or group is ever
//! removed) and the engine pairs each fan-out with a single history
//! checkpoint so it is undoable as one unit.
//!
//! Child ids are `<kind-tag>-<timestamp-ms>-<hex suffix>`: fresh and unique
//! per call, collisions negligible. Positions are parent-relative with
//! siblings stacked vertically at a fixed gap; cosmetic only.

use chrono::Utc;

use crate::canvas::{Canvas, Group, Node, NodePayload};
use crate::config::LayoutConfig;
use crate::types::{NodeId, NodeKind, Position, Size};

/// Blueprint for one child node.
#[derive(Clone, Debug)]
pub struct SpawnSpec {
    pub payload: NodePayload,
}

impl SpawnSpec {
    pub fn new(payload: NodePayload) -> Self {
        Self { payload }
    }
}

/// Blueprint for the optional group bounding a batch of spawned siblings.
#[derive(Clone, Debug)]
pub struct GroupSpec {
    pub title: String,
}

impl GroupSpec {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

/// Generate a fresh node id for a spawned child.
#[must_use]
pub fn fresh_node_id(kind: NodeKind) -> NodeId {
    NodeId::new(format!(
        "{}-{}-{:04x}",
        kind.tag(),
        Utc::now().timestamp_millis(),
        rand::random::<u16>()
    ))
}

/// Insert children (and the optional bounding group) for `parent`, returning
/// the new ids in spawn order.
///
/// Each child's `inputs` gains the parent id and a matching connection is
/// appended. A missing parent is tolerated (children land at the origin) so
/// a stale spawn can never fault the engine.
pub fn spawn_children(
    canvas: &mut Canvas,
    parent: &NodeId,
    spawns: Vec<SpawnSpec>,
    group: Option<GroupSpec>,
    layout: &LayoutConfig,
) -> Vec<NodeId> {
    if spawns.is_empty() {
        return Vec::new();
    }
    let base = match canvas.node(parent) {
        Some(node) => node.position,
        None => {
            tracing::warn!(%parent, "spawning children for a node missing from the canvas");
            Position::default()
        }
    };
    let (dx, dy) = layout.child_offset;
    let first = base.offset(dx, dy);

    let mut spawned = Vec::with_capacity(spawns.len());
    for (index, spec) in spawns.into_iter().enumerate() {
        let id = fresh_node_id(spec.payload.kind());
        let position = first.offset(0.0, index as f64 * layout.sibling_gap);
        let mut node = Node::new(id.clone(), position, spec.payload);
        node.inputs.push(parent.clone());
        canvas.insert_node(node);
        spawned.push(id);
    }

    if let Some(spec) = group {
        canvas.insert_group(bounding_group(canvas, &spawned, spec, layout));
    }
    spawned
}

/// Compute the group bounding the spawned children, padded on all sides.
fn bounding_group(canvas: &Canvas, children: &[NodeId], spec: GroupSpec, layout: &LayoutConfig) -> Group {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for node in canvas.nodes_by_ids(children) {
        let size = node.size.unwrap_or(layout.default_node_size);
        min_x = min_x.min(node.position.x);
        min_y = min_y.min(node.position.y);
        max_x = max_x.max(node.position.x + size.width);
        max_y = max_y.max(node.position.y + size.height);
    }
    let pad = layout.group_padding;
    Group {
        id: format!(
            "group-{}-{:04x}",
            Utc::now().timestamp_millis(),
            rand::random::<u16>()
        ),
        title: spec.title,
        origin: Position::new(min_x - pad, min_y - pad),
        size: Size::new(max_x - min_x + pad * 2.0, max_y - min_y + pad * 2.0),
    }
}
