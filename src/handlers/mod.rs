//! Per-kind step handlers.
//!
//! The state machine is a single dispatch over a lookup table: one
//! [`KindHandler`] per executable [`NodeKind`], registered in a
//! [`HandlerRegistry`]. Each handler advances its node by exactly one
//! observable step: it reads upstream context through the resolver, calls
//! collaborators, and returns a [`StepOutcome`] the engine applies to the
//! canvas.
//!
//! # Outcome contract
//!
//! - `Err(EngineError)`: validation/upstream failure before any durable
//!   work; the engine records the message on the node and leaves the payload
//!   untouched, so the pipeline stage stays at the last stable stage and no
//!   user input is lost. `Err(EngineError::Cancelled)` is the exception: a
//!   user abort on a single-stage step, settled as Success with no message.
//! - [`StepOutcome::Failed`]: a collaborator failed after partial progress;
//!   the returned payload is still applied (keeping e.g. an already-uploaded
//!   reference), then the node enters `Error`.
//! - [`StepOutcome::Cancelled`]: user-initiated abort; payload applied,
//!   status `Success`, no error recorded, nothing spawned.
//! - [`StepOutcome::Advanced`]: the step completed; any spawns are applied
//!   through the growth module behind a history checkpoint.

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::canvas::{Canvas, Node, NodePayload};
use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::events::{EventDetail, EventEmitter};
use crate::growth::{GroupSpec, SpawnSpec};
use crate::resolver::{resolve_style_context, resolve_upstream_context, visit_ancestors};
use crate::services::{ProgressFn, Services};
use crate::types::{NodeKind, PipelineStage, StyleContext};

mod analyzer;
mod imageboard;
mod narration;
mod planner;
mod script;
mod shots;
mod splitter;
mod storyboard;

pub use analyzer::AnalyzerHandler;
pub use imageboard::ImageBoardHandler;
pub use narration::NarrationHandler;
pub use planner::ScriptPlannerHandler;
pub use script::EpisodeScriptHandler;
pub use shots::ShotPlannerHandler;
pub use splitter::EpisodeSplitterHandler;
pub use storyboard::StoryboardHandler;

/// Result of one handler step.
#[derive(Debug)]
pub enum StepOutcome {
    /// The step completed its stage's work.
    Advanced {
        payload: NodePayload,
        spawns: Vec<SpawnSpec>,
        group: Option<GroupSpec>,
    },
    /// A collaborator failed after partial progress worth keeping.
    Failed {
        payload: NodePayload,
        error: EngineError,
    },
    /// Controlled reset after a user-initiated abort.
    Cancelled { payload: NodePayload },
}

impl StepOutcome {
    pub fn advanced(payload: NodePayload) -> Self {
        StepOutcome::Advanced {
            payload,
            spawns: Vec::new(),
            group: None,
        }
    }

    pub fn fanned_out(payload: NodePayload, spawns: Vec<SpawnSpec>, group: Option<GroupSpec>) -> Self {
        StepOutcome::Advanced {
            payload,
            spawns,
            group,
        }
    }
}

/// Execution context for one step of one node.
///
/// Carries the canvas snapshot the step observes, a clone of the node as of
/// step start, the collaborator bundle, and the node's cancellation token.
/// Helper methods wrap the resolver and the fire-and-forget side channels.
#[derive(Clone)]
pub struct StepContext {
    pub canvas: Arc<Canvas>,
    pub node: Node,
    pub override_prompt: Option<String>,
    pub services: Arc<Services>,
    pub cancel: CancellationToken,
    pub config: EngineConfig,
    pub(crate) events: EventEmitter,
}

impl StepContext {
    /// Ordered context strings contributed by all ancestors.
    #[must_use]
    pub fn upstream_context(&self) -> Vec<String> {
        resolve_upstream_context(&self.canvas, &self.node.id)
    }

    /// Style triple from the nearest planning ancestor (or defaults).
    #[must_use]
    pub fn style_context(&self) -> StyleContext {
        resolve_style_context(&self.canvas, &self.node.id)
    }

    /// Nearest ancestor of the given kind, if any (pre-order over inputs).
    #[must_use]
    pub fn nearest_ancestor(&self, kind: NodeKind) -> Option<Node> {
        visit_ancestors(&self.canvas, &self.node.id, &mut |node| {
            if node.kind == kind {
                std::ops::ControlFlow::Break(node.clone())
            } else {
                std::ops::ControlFlow::Continue(())
            }
        })
    }

    /// Consult the output cache before generation. Cache failures are
    /// logged, never surfaced.
    pub async fn check_cache(&self) -> Option<serde_json::Value> {
        let cache = self.services.cache.as_ref()?;
        match cache.check(&self.node.id, self.node.kind).await {
            Ok(hit) => {
                if hit.is_some() {
                    self.note("serving cached output");
                }
                hit
            }
            Err(err) => {
                tracing::warn!(node = %self.node.id, %err, "cache check failed");
                None
            }
        }
    }

    /// Persist a successful output. Fire-and-forget: the save runs detached
    /// so it can never block the stage transition, and failures are logged.
    pub fn save_output(&self, output: serde_json::Value) {
        let Some(cache) = self.services.cache.clone() else {
            return;
        };
        let node = self.node.id.clone();
        let kind = self.node.kind;
        tokio::spawn(async move {
            if let Err(err) = cache.save(&node, kind, &output).await {
                tracing::warn!(%node, %err, "saving output failed");
            }
        });
    }

    /// Emit a raw progress percentage for this node.
    pub fn progress(&self, percent: u8) {
        self.events
            .emit(&self.node.id, EventDetail::Progress(percent.min(100)));
    }

    /// Emit a free-form note for this node.
    pub fn note(&self, message: impl Into<String>) {
        self.events
            .emit(&self.node.id, EventDetail::Note(message.into()));
    }

    /// Progress callback for the video provider: rescales provider 0–100%
    /// onto the band above the configured floor, so fusion/upload keep the
    /// earlier visible range.
    #[must_use]
    pub fn provider_progress_fn(&self) -> ProgressFn {
        let events = self.events.clone();
        let node = self.node.id.clone();
        let floor = self.config.generation_progress_floor;
        Arc::new(move |percent: u8| {
            let p = percent.min(100) as u16;
            let span = (100 - floor) as u16;
            let mapped = floor as u16 + p * span / 100;
            events.emit(&node, EventDetail::Progress(mapped as u8));
        })
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// One handler per executable node kind.
#[async_trait]
pub trait KindHandler: Send + Sync {
    /// Advance the node by exactly one observable step.
    async fn run(&self, ctx: StepContext) -> Result<StepOutcome, EngineError>;

    /// Transient pipeline stage to publish while this step is in flight
    /// (e.g. `Generating` during a `Prompting` step). Defaults to none.
    fn working_stage(&self, _node: &Node) -> Option<PipelineStage> {
        None
    }
}

/// Lookup table mapping each executable kind to its handler.
pub struct HandlerRegistry {
    handlers: FxHashMap<NodeKind, Arc<dyn KindHandler>>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl HandlerRegistry {
    /// Empty registry; useful for tests swapping in custom handlers.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            handlers: FxHashMap::default(),
        }
    }

    /// The standard table: every executable kind, no utility kinds.
    #[must_use]
    pub fn standard() -> Self {
        Self::empty()
            .with_handler(NodeKind::ScriptPlanner, ScriptPlannerHandler)
            .with_handler(NodeKind::EpisodeSplitter, EpisodeSplitterHandler)
            .with_handler(NodeKind::EpisodeScript, EpisodeScriptHandler)
            .with_handler(NodeKind::ShotPlanner, ShotPlannerHandler)
            .with_handler(NodeKind::StoryboardBatch, StoryboardHandler)
            .with_handler(NodeKind::ImageBoard, ImageBoardHandler)
            .with_handler(NodeKind::Narration, NarrationHandler)
            .with_handler(NodeKind::Analyzer, AnalyzerHandler)
    }

    #[must_use]
    pub fn with_handler(mut self, kind: NodeKind, handler: impl KindHandler + 'static) -> Self {
        self.handlers.insert(kind, Arc::new(handler));
        self
    }

    #[must_use]
    pub fn get(&self, kind: NodeKind) -> Option<Arc<dyn KindHandler>> {
        self.handlers.get(&kind).cloned()
    }
}
