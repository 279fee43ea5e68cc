//! Upstream context resolution.
//!
//! Walks the canvas backward from a node to aggregate the textual context its
//! ancestors contribute, and to find the style triple of the nearest planning
//! ancestor. Both searches share one traversal utility, [`visit_ancestors`]:
//! a pre-order depth-first walk over `inputs` edges guarded by a visited set,
//! so graphs containing cycles (which the editor does not prevent from being
//! authored) terminate in O(V+E) with each node visited at most once.
//!
//! Contribution extraction is kind-dispatched: each kind defines a pure
//! projection from its payload to zero-or-one context strings. The resolver
//! never fails: absent ancestors produce defaults, and cycles are tolerated
//! silently.

use rustc_hash::FxHashSet;
use std::ops::ControlFlow;

use crate::canvas::{Canvas, Node, NodePayload};
use crate::types::{NodeId, StyleContext};

/// Pre-order depth-first walk over all ancestors of `start`.
///
/// Direct inputs are visited in declared order, each followed immediately by
/// its own ancestors (so a direct input is always seen before anything deeper
/// on its branch). The start node is pre-seeded into the visited set: a cycle
/// that leads back to it contributes nothing, and no node is visited twice.
///
/// The visitor may short-circuit with `ControlFlow::Break`; the break value
/// is returned. Dangling input ids are skipped.
pub fn visit_ancestors<B>(
    canvas: &Canvas,
    start: &NodeId,
    visitor: &mut impl FnMut(&Node) -> ControlFlow<B>,
) -> Option<B> {
    let Some(node) = canvas.node(start) else {
        return None;
    };
    let mut visited: FxHashSet<NodeId> = FxHashSet::default();
    visited.insert(start.clone());
    match walk(canvas, node, &mut visited, visitor) {
        ControlFlow::Break(value) => Some(value),
        ControlFlow::Continue(()) => None,
    }
}

fn walk<B>(
    canvas: &Canvas,
    node: &Node,
    visited: &mut FxHashSet<NodeId>,
    visitor: &mut impl FnMut(&Node) -> ControlFlow<B>,
) -> ControlFlow<B> {
    for input in &node.inputs {
        if !visited.insert(input.clone()) {
            continue;
        }
        let Some(ancestor) = canvas.node(input) else {
            continue;
        };
        visitor(ancestor)?;
        walk(canvas, ancestor, visited, visitor)?;
    }
    ControlFlow::Continue(())
}

/// Collect the context strings contributed by every ancestor of `id`, in
/// traversal order. Each ancestor contributes at most once; the caller
/// concatenates as needed.
#[must_use]
pub fn resolve_upstream_context(canvas: &Canvas, id: &NodeId) -> Vec<String> {
    let mut context = Vec::new();
    visit_ancestors::<()>(canvas, id, &mut |node| {
        if let Some(text) = contribution(node) {
            context.push(text);
        }
        ControlFlow::Continue(())
    });
    context
}

/// Kind-dispatched projection from a node's payload to its context
/// contribution. Structural kinds (splitters, planners-of-shots, artifact
/// holders) contribute nothing.
fn contribution(node: &Node) -> Option<String> {
    match &node.payload {
        NodePayload::ScriptPlanner { outline, .. } => {
            outline.as_ref().filter(|o| !o.is_empty()).cloned()
        }
        NodePayload::EpisodeScript { script, .. } => {
            script.as_ref().filter(|s| !s.is_empty()).cloned()
        }
        NodePayload::Analyzer {
            propagate, report, ..
        } => {
            // Opt-in allowlist: only fields the user flagged for propagation.
            let report = report.as_ref()?;
            let lines: Vec<String> = report
                .fields
                .iter()
                .filter(|f| propagate.contains(&f.name))
                .map(|f| format!("{}: {}", f.name, f.value))
                .collect();
            if lines.is_empty() {
                None
            } else {
                Some(lines.join("\n"))
            }
        }
        _ => None,
    }
}

/// Find the style triple of the nearest planning ancestor of `id`.
///
/// The search passes through chaptering and any other kind on its way up;
/// under the pre-order walk a direct input is checked before anything deeper
/// on its branch, so the nearer of two conflicting planners wins. Returns
/// [`StyleContext::default`] (fixed identifiers) when no planner ancestor
/// exists.
#[must_use]
pub fn resolve_style_context(canvas: &Canvas, id: &NodeId) -> StyleContext {
    // A planner resolves its own style from its payload.
    if let Some(node) = canvas.node(id)
        && let NodePayload::ScriptPlanner { style, .. } = &node.payload
    {
        return style.clone();
    }
    visit_ancestors(canvas, id, &mut |node| match &node.payload {
        NodePayload::ScriptPlanner { style, .. } => ControlFlow::Break(style.clone()),
        _ => ControlFlow::Continue(()),
    })
    .unwrap_or_default()
}
