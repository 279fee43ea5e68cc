//! The canvas graph model: nodes, connections, groups, and read-only queries.
//!
//! A [`Canvas`] is an in-memory snapshot of the editor graph. The engine
//! treats it as effectively single-writer: every structural mutation goes
//! through copy-on-write replacement (clone, mutate, bump `version`, publish),
//! so concurrent readers always observe a consistent prior snapshot, never a
//! partially updated one. The query surface here is purely read-only
//! projections; missing ids yield an empty/`None` result, never a fault.
//!
//! Edges are stored redundantly: a [`Connection`] list for enumeration plus
//! each downstream node's ordered `inputs` for O(1) upstream lookup. The
//! mutation helpers keep both in sync, and reject self-loops at the
//! single-edge level (longer cycles can still be authored and are handled
//! defensively by the resolver).
//!
//! # Examples
//!
//! ```rust
//! use storyloom::canvas::{Canvas, Node, NodePayload};
//! use storyloom::types::{NodeId, NodeKind, Position};
//!
//! let canvas = Canvas::builder()
//!     .with_node(Node::new(
//!         "planner-1",
//!         Position::new(0.0, 0.0),
//!         NodePayload::script_planner("a lighthouse keeper finds a map"),
//!     ))
//!     .with_node(Node::new(
//!         "splitter-1",
//!         Position::new(400.0, 0.0),
//!         NodePayload::episode_splitter(3),
//!     ))
//!     .with_edge("planner-1", "splitter-1")
//!     .build();
//!
//! let upstream = canvas.upstream_nodes(&NodeId::from("splitter-1"), Some(NodeKind::ScriptPlanner));
//! assert_eq!(upstream.len(), 1);
//! assert!(canvas.node(&NodeId::from("missing")).is_none());
//! ```

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::artifacts::{
    AnalysisReport, AudioArtifact, EpisodeBeat, ImageAsset, Shot, VideoArtifact,
};
use crate::grouping::TaskGroup;
use crate::types::{ExecStatus, NodeId, NodeKind, PipelineStage, Position, Size, StyleContext};

/// Mutable pipeline state of a storyboard batch node.
///
/// `selection` holds user-chosen indices into `candidates`; `batches` is the
/// duration-bounded plan rebuilt on every Selecting step. `prompt` and
/// `reference` survive provider failures so a retry does not repeat
/// completed sub-steps.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryboardState {
    pub stage: PipelineStage,
    pub candidates: Vec<Shot>,
    pub selection: Vec<usize>,
    pub batches: Vec<TaskGroup<Shot>>,
    pub prompt: Option<String>,
    pub reference: Option<ImageAsset>,
}

/// Kind-specific payload of a node.
///
/// One variant per [`NodeKind`]; [`NodePayload::kind`] is the authoritative
/// mapping and [`Node::new`] derives the node's kind from its payload, so a
/// mismatch cannot be constructed through this API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum NodePayload {
    ScriptPlanner {
        idea: String,
        style: StyleContext,
        outline: Option<String>,
    },
    EpisodeSplitter {
        episode_count: usize,
        episodes: Vec<EpisodeBeat>,
    },
    EpisodeScript {
        beat: EpisodeBeat,
        script: Option<String>,
    },
    ShotPlanner {
        shots: Vec<Shot>,
    },
    StoryboardBatch(StoryboardState),
    ImageBoard {
        prompt: String,
        panel_count: usize,
        panels: Vec<ImageAsset>,
    },
    Narration {
        voice: String,
        script_override: Option<String>,
        audio: Option<AudioArtifact>,
    },
    Analyzer {
        source_text: Option<String>,
        /// Opt-in allowlist of report field names that propagate downstream.
        propagate: Vec<String>,
        report: Option<AnalysisReport>,
    },
    VideoClip {
        video: VideoArtifact,
    },
    PanelImage {
        image: ImageAsset,
    },
}

impl NodePayload {
    /// Fresh planner payload with default style.
    pub fn script_planner(idea: impl Into<String>) -> Self {
        NodePayload::ScriptPlanner {
            idea: idea.into(),
            style: StyleContext::default(),
            outline: None,
        }
    }

    pub fn episode_splitter(episode_count: usize) -> Self {
        NodePayload::EpisodeSplitter {
            episode_count,
            episodes: Vec::new(),
        }
    }

    pub fn episode_script(beat: EpisodeBeat) -> Self {
        NodePayload::EpisodeScript { beat, script: None }
    }

    pub fn shot_planner() -> Self {
        NodePayload::ShotPlanner { shots: Vec::new() }
    }

    pub fn storyboard_batch() -> Self {
        NodePayload::StoryboardBatch(StoryboardState::default())
    }

    pub fn image_board(prompt: impl Into<String>, panel_count: usize) -> Self {
        NodePayload::ImageBoard {
            prompt: prompt.into(),
            panel_count,
            panels: Vec::new(),
        }
    }

    pub fn narration(voice: impl Into<String>) -> Self {
        NodePayload::Narration {
            voice: voice.into(),
            script_override: None,
            audio: None,
        }
    }

    pub fn analyzer() -> Self {
        NodePayload::Analyzer {
            source_text: None,
            propagate: Vec::new(),
            report: None,
        }
    }

    /// The node kind this payload belongs to.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            NodePayload::ScriptPlanner { .. } => NodeKind::ScriptPlanner,
            NodePayload::EpisodeSplitter { .. } => NodeKind::EpisodeSplitter,
            NodePayload::EpisodeScript { .. } => NodeKind::EpisodeScript,
            NodePayload::ShotPlanner { .. } => NodeKind::ShotPlanner,
            NodePayload::StoryboardBatch(_) => NodeKind::StoryboardBatch,
            NodePayload::ImageBoard { .. } => NodeKind::ImageBoard,
            NodePayload::Narration { .. } => NodeKind::Narration,
            NodePayload::Analyzer { .. } => NodeKind::Analyzer,
            NodePayload::VideoClip { .. } => NodeKind::VideoClip,
            NodePayload::PanelImage { .. } => NodeKind::PanelImage,
        }
    }

    /// Pipeline stage, for multi-stage payloads.
    #[must_use]
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            NodePayload::StoryboardBatch(state) => Some(state.stage),
            _ => None,
        }
    }

    /// Set the pipeline stage on multi-stage payloads; no-op otherwise.
    pub fn set_stage(&mut self, stage: PipelineStage) {
        if let NodePayload::StoryboardBatch(state) = self {
            state.stage = stage;
        }
    }
}

/// A unit of work on the canvas.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub position: Position,
    pub size: Option<Size>,
    pub status: ExecStatus,
    /// Human-readable failure message from the last step, if any. The sole
    /// failure surface exposed to the user.
    pub error: Option<String>,
    /// Ordered ids of upstream nodes whose output this node may consume.
    /// Never contains `id` itself.
    pub inputs: Vec<NodeId>,
    pub payload: NodePayload,
}

impl Node {
    /// Create a node; the kind is derived from the payload.
    pub fn new(id: impl Into<NodeId>, position: Position, payload: NodePayload) -> Self {
        Self {
            id: id.into(),
            kind: payload.kind(),
            position,
            size: None,
            status: ExecStatus::Idle,
            error: None,
            inputs: Vec::new(),
            payload,
        }
    }

    #[must_use]
    pub fn with_size(mut self, size: Size) -> Self {
        self.size = Some(size);
        self
    }
}

/// A directed edge. Bookkeeping parallel to the downstream node's `inputs`:
/// an edge exists iff `to`'s inputs contain `from`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub from: NodeId,
    pub to: NodeId,
}

/// A cosmetic container bundling a batch of spawned siblings. No effect on
/// execution semantics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub title: String,
    pub origin: Position,
    pub size: Size,
}

/// Snapshot of the editor graph.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Canvas {
    nodes: FxHashMap<NodeId, Node>,
    connections: Vec<Connection>,
    groups: Vec<Group>,
    version: u64,
}

impl Canvas {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fluent construction for hosts and tests.
    #[must_use]
    pub fn builder() -> CanvasBuilder {
        CanvasBuilder::default()
    }

    /// Monotonic snapshot version; bumped once per published engine step.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Direct predecessors of `id` in `inputs` order, optionally filtered by
    /// kind. Unknown ids (the node itself, or dangling inputs) are skipped.
    #[must_use]
    pub fn upstream_nodes(&self, id: &NodeId, kind: Option<NodeKind>) -> Vec<&Node> {
        let Some(node) = self.nodes.get(id) else {
            return Vec::new();
        };
        node.inputs
            .iter()
            .filter_map(|input| self.nodes.get(input))
            .filter(|n| kind.is_none_or(|k| n.kind == k))
            .collect()
    }

    /// Nodes for the given ids, in the given order; unknown ids are skipped.
    #[must_use]
    pub fn nodes_by_ids(&self, ids: &[NodeId]) -> Vec<&Node> {
        ids.iter().filter_map(|id| self.nodes.get(id)).collect()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    #[must_use]
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn iter_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Insert a node, materializing connections for any pre-seeded inputs.
    /// Self-referencing inputs are stripped with a warning.
    pub fn insert_node(&mut self, mut node: Node) {
        if node.inputs.contains(&node.id) {
            tracing::warn!(node = %node.id, "stripping self-loop input");
            node.inputs.retain(|input| *input != node.id);
        }
        for input in &node.inputs {
            self.connections.push(Connection {
                from: input.clone(),
                to: node.id.clone(),
            });
        }
        self.nodes.insert(node.id.clone(), node);
    }

    /// Connect `from → to`, keeping `inputs` and the connection list in
    /// sync. Returns `false` (and leaves the canvas untouched) for
    /// self-loops, unknown endpoints, or duplicate edges.
    pub fn connect(&mut self, from: &NodeId, to: &NodeId) -> bool {
        if from == to {
            tracing::warn!(node = %from, "rejecting self-loop edge");
            return false;
        }
        if !self.nodes.contains_key(from) {
            return false;
        }
        let Some(target) = self.nodes.get_mut(to) else {
            return false;
        };
        if target.inputs.contains(from) {
            return false;
        }
        target.inputs.push(from.clone());
        self.connections.push(Connection {
            from: from.clone(),
            to: to.clone(),
        });
        true
    }

    pub fn insert_group(&mut self, group: Group) {
        self.groups.push(group);
    }

    pub(crate) fn node_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Bump the snapshot version. Called once per published engine step.
    pub(crate) fn touch(&mut self) {
        self.version += 1;
    }
}

/// Builder for assembling an initial canvas.
#[derive(Debug, Default)]
pub struct CanvasBuilder {
    canvas: Canvas,
    edges: Vec<(NodeId, NodeId)>,
}

impl CanvasBuilder {
    #[must_use]
    pub fn with_node(mut self, node: Node) -> Self {
        self.canvas.insert_node(node);
        self
    }

    #[must_use]
    pub fn with_edge(mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        self.edges.push((from.into(), to.into()));
        self
    }

    pub fn build(mut self) -> Canvas {
        for (from, to) in std::mem::take(&mut self.edges) {
            if !self.canvas.connect(&from, &to) {
                tracing::warn!(%from, %to, "dropping invalid edge");
            }
        }
        self.canvas
    }
}
