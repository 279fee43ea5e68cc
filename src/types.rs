//! Core types for the storyloom execution engine.
//!
//! This module defines the fundamental vocabulary used throughout the crate:
//! node identity, the closed set of node kinds, execution status versus
//! pipeline stage, style context, and canvas geometry.
//!
//! # Key Types
//!
//! - [`NodeId`]: Opaque identifier for a node on the canvas
//! - [`NodeKind`]: Closed enumeration of node roles (planner/generator/analyzer/utility)
//! - [`ExecStatus`]: Execution status of a node (Idle/Working/Success/Error)
//! - [`PipelineStage`]: Pipeline position of a multi-stage generator node
//! - [`StyleContext`]: The (visual style, genre, setting) triple resolved from
//!   the nearest planning ancestor
//!
//! `ExecStatus` and `PipelineStage` are deliberately independent: a storyboard
//! node can be `Working` while its pipeline sits at `Prompting`, and observers
//! read both.
//!
//! # Examples
//!
//! ```rust
//! use storyloom::types::{NodeId, NodeKind, NodeRole};
//!
//! let id = NodeId::from("planner-1");
//! assert_eq!(id.as_str(), "planner-1");
//!
//! assert_eq!(NodeKind::ScriptPlanner.role(), NodeRole::Planner);
//! assert!(NodeKind::StoryboardBatch.is_executable());
//! assert!(!NodeKind::VideoClip.is_executable());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier for a node on the canvas.
///
/// Ids are plain strings: user-created nodes carry whatever id the host
/// application assigned, while spawned children receive fresh
/// `<tag>-<timestamp>-<suffix>` ids from the growth module.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Broad role of a node kind, used for palette grouping and dispatch sanity
/// checks. Roles have no effect on execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRole {
    /// Kinds that establish narrative/style context for their descendants.
    Planner,
    /// Kinds that call a generation collaborator and produce artifacts.
    Generator,
    /// Kinds that inspect upstream output and expose flagged findings.
    Analyzer,
    /// Artifact holders spawned by generators; never executed.
    Utility,
}

/// The closed set of node kinds understood by the engine.
///
/// Each executable kind has exactly one handler registered in the
/// [`HandlerRegistry`](crate::handlers::HandlerRegistry); utility kinds hold
/// generated artifacts and are never dispatched.
///
/// # Examples
///
/// ```rust
/// use storyloom::types::NodeKind;
///
/// assert_eq!(NodeKind::ScriptPlanner.tag(), "planner");
/// assert_eq!(NodeKind::VideoClip.to_string(), "video-clip");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Plans a story from an idea: produces the outline and owns the style
    /// triple that descendants inherit.
    ScriptPlanner,
    /// Splits a planner outline into per-episode beats and spawns one
    /// [`EpisodeScript`](Self::EpisodeScript) child per beat.
    EpisodeSplitter,
    /// Writes the full script for one episode beat.
    EpisodeScript,
    /// Breaks an episode script into timed shots for downstream generation.
    ShotPlanner,
    /// Multi-stage storyboard/video generator
    /// (Idle → Selecting → Prompting → Generating → Completed).
    StoryboardBatch,
    /// Generates a grid of storyboard panel images and spawns one
    /// [`PanelImage`](Self::PanelImage) child per panel.
    ImageBoard,
    /// Synthesizes voiceover narration for an upstream script.
    Narration,
    /// Analyzes upstream text; only explicitly flagged findings propagate
    /// downstream.
    Analyzer,
    /// Artifact: a generated video clip spawned by a storyboard batch.
    VideoClip,
    /// Artifact: a single storyboard panel spawned by an image board.
    PanelImage,
}

impl NodeKind {
    /// Short stable tag, used in spawned node ids and display output.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            NodeKind::ScriptPlanner => "planner",
            NodeKind::EpisodeSplitter => "splitter",
            NodeKind::EpisodeScript => "episode",
            NodeKind::ShotPlanner => "shots",
            NodeKind::StoryboardBatch => "storyboard",
            NodeKind::ImageBoard => "imageboard",
            NodeKind::Narration => "narration",
            NodeKind::Analyzer => "analyzer",
            NodeKind::VideoClip => "video-clip",
            NodeKind::PanelImage => "panel",
        }
    }

    /// Broad role of this kind.
    #[must_use]
    pub fn role(&self) -> NodeRole {
        match self {
            NodeKind::ScriptPlanner | NodeKind::EpisodeSplitter | NodeKind::ShotPlanner => {
                NodeRole::Planner
            }
            NodeKind::EpisodeScript
            | NodeKind::StoryboardBatch
            | NodeKind::ImageBoard
            | NodeKind::Narration => NodeRole::Generator,
            NodeKind::Analyzer => NodeRole::Analyzer,
            NodeKind::VideoClip | NodeKind::PanelImage => NodeRole::Utility,
        }
    }

    /// Returns `true` if this kind has a handler and can be triggered.
    #[must_use]
    pub fn is_executable(&self) -> bool {
        self.role() != NodeRole::Utility
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Execution status of a node, written by the engine on every step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecStatus {
    #[default]
    Idle,
    Working,
    Success,
    Error,
}

impl fmt::Display for ExecStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecStatus::Idle => "idle",
            ExecStatus::Working => "working",
            ExecStatus::Success => "success",
            ExecStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Pipeline position of a multi-stage generator node.
///
/// Advanced by exactly one observable step per `execute` call. `Generating`
/// is transient: it is published while a `Prompting` (or `Completed`) step
/// has a provider call in flight and is never the resting stage of a node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineStage {
    #[default]
    Idle,
    Selecting,
    Prompting,
    Generating,
    Completed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Selecting => "selecting",
            PipelineStage::Prompting => "prompting",
            PipelineStage::Generating => "generating",
            PipelineStage::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

/// Default visual style applied when no planner ancestor exists.
pub const DEFAULT_VISUAL_STYLE: &str = "cinematic";
/// Default genre applied when no planner ancestor exists.
pub const DEFAULT_GENRE: &str = "drama";
/// Default setting applied when no planner ancestor exists.
pub const DEFAULT_SETTING: &str = "contemporary";

/// Style triple inherited from the nearest planning ancestor.
///
/// Resolved by [`resolve_style_context`](crate::resolver::resolve_style_context);
/// the defaults are fixed identifiers so generation collaborators always
/// receive a complete triple.
///
/// ```rust
/// use storyloom::types::StyleContext;
///
/// let style = StyleContext::default();
/// assert_eq!(style.visual_style, "cinematic");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleContext {
    pub visual_style: String,
    pub genre: String,
    pub setting: String,
}

impl Default for StyleContext {
    fn default() -> Self {
        Self {
            visual_style: DEFAULT_VISUAL_STYLE.to_string(),
            genre: DEFAULT_GENRE.to_string(),
            setting: DEFAULT_SETTING.to_string(),
        }
    }
}

impl StyleContext {
    pub fn new(
        visual_style: impl Into<String>,
        genre: impl Into<String>,
        setting: impl Into<String>,
    ) -> Self {
        Self {
            visual_style: visual_style.into(),
            genre: genre.into(),
            setting: setting.into(),
        }
    }
}

/// 2D canvas position. Purely cosmetic; never affects execution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Node/group extent. Purely cosmetic.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}
