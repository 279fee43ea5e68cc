//! The node action state machine.
//!
//! [`Engine`] is the single entry point for advancing canvas nodes:
//! [`Engine::execute`] moves one node through exactly one observable step of
//! its kind-specific state machine, then publishes a new canvas snapshot.
//!
//! ```text
//!  execute(id)
//!    ├─ resolve node + handler          (UnknownNode / NotExecutable)
//!    ├─ claim in-flight slot            (NodeBusy)
//!    ├─ publish Working snapshot        (status + transient stage)
//!    ├─ register cancellation token
//!    ├─ dispatch to the kind handler    (resolver, grouping, collaborators)
//!    └─ settle:
//!         Err          → record on node, payload untouched
//!         Failed       → record on node, payload applied (partial progress)
//!         Cancelled    → Success, no error, payload applied
//!         Advanced     → history checkpoint, growth, Success
//! ```
//!
//! # Snapshot discipline
//!
//! The canvas lives behind an `RwLock<Arc<Canvas>>`. Every mutation clones
//! the current snapshot, applies the change, bumps the version, and swaps
//! the `Arc`: copy-on-write, so readers holding an older `Arc` always see a
//! consistent graph. Execution is cooperative: the engine suspends only at
//! awaited collaborator calls and performs no polling of its own.
//!
//! # Failure surface
//!
//! Handler failures never cross the trigger boundary: they are recorded on
//! the node (`Error` status plus a human-readable message) and reported in
//! the returned [`StepReport`]. Only `UnknownNode`, `NotExecutable`, and
//! `NodeBusy` (faults with no node state to record on) surface as `Err`.

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashSet;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::cancel::CancelRegistry;
use crate::canvas::{Canvas, Node};
use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::events::{EngineEvent, EventBus, EventDetail};
use crate::growth;
use crate::handlers::{HandlerRegistry, StepContext, StepOutcome};
use crate::services::Services;
use crate::types::{ExecStatus, NodeId, NodeKind, PipelineStage};

/// What one `execute` call did, from the caller's point of view.
#[derive(Clone, Debug)]
pub struct StepReport {
    /// Fresh id for this invocation, threaded through tracing spans.
    pub run_id: Uuid,
    pub node: NodeId,
    /// Execution status the node settled on.
    pub status: ExecStatus,
    /// Pipeline stage after the step, for multi-stage kinds.
    pub stage: Option<PipelineStage>,
    /// Children materialized by this step, in spawn order.
    pub spawned: Vec<NodeId>,
    /// Version of the snapshot published by this step.
    pub canvas_version: u64,
}

/// The workflow execution engine.
pub struct Engine {
    canvas: RwLock<Arc<Canvas>>,
    handlers: HandlerRegistry,
    services: Arc<Services>,
    config: EngineConfig,
    cancellations: CancelRegistry,
    in_flight: Mutex<FxHashSet<NodeId>>,
    bus: EventBus,
}

impl Engine {
    pub fn new(canvas: Canvas, services: Services, config: EngineConfig) -> Self {
        Self {
            canvas: RwLock::new(Arc::new(canvas)),
            handlers: HandlerRegistry::standard(),
            services: Arc::new(services),
            config,
            cancellations: CancelRegistry::new(),
            in_flight: Mutex::new(FxHashSet::default()),
            bus: EventBus::new(),
        }
    }

    /// Swap in a custom handler table (tests, host extensions).
    #[must_use]
    pub fn with_handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    /// The current canvas snapshot. Cheap; holds no lock after returning.
    #[must_use]
    pub fn canvas(&self) -> Arc<Canvas> {
        self.canvas.read().clone()
    }

    /// Receiver for the engine event stream.
    #[must_use]
    pub fn subscribe(&self) -> flume::Receiver<EngineEvent> {
        self.bus.receiver()
    }

    /// Signal the node's in-flight step, if any. The abort settles as a
    /// controlled reset, not an error.
    pub fn cancel(&self, id: &NodeId) -> bool {
        let signalled = self.cancellations.cancel(id);
        if signalled {
            tracing::debug!(node = %id, "cancellation requested");
        }
        signalled
    }

    /// Apply a host-side edit (selection, prompt text, style fields) to one
    /// node and publish the resulting snapshot. Structural changes go
    /// through the canvas builder or growth, not here.
    pub fn update_node(
        &self,
        id: &NodeId,
        edit: impl FnOnce(&mut Node),
    ) -> Result<(), EngineError> {
        if self.canvas().node(id).is_none() {
            return Err(EngineError::UnknownNode { id: id.clone() });
        }
        self.publish(|canvas| {
            if let Some(node) = canvas.node_mut(id) {
                edit(node);
            }
        });
        Ok(())
    }

    /// Force a multi-stage node back to `Prompting` so the user can re-edit
    /// and regenerate without re-running Idle/Selecting.
    pub fn reset_stage(&self, id: &NodeId) -> Result<(), EngineError> {
        let snapshot = self.canvas();
        let node = snapshot
            .node(id)
            .ok_or_else(|| EngineError::UnknownNode { id: id.clone() })?;
        if node.kind != NodeKind::StoryboardBatch {
            return Err(EngineError::NotExecutable { kind: node.kind });
        }
        self.publish(|canvas| {
            if let Some(node) = canvas.node_mut(id) {
                node.payload.set_stage(PipelineStage::Prompting);
                node.error = None;
            }
        });
        self.emit(id, EventDetail::Stage(PipelineStage::Prompting));
        Ok(())
    }

    /// Advance one node by exactly one observable step.
    ///
    /// `override_prompt` stands in for the node's local prompt/idea/source
    /// for this invocation (and is persisted as the new local value by the
    /// kinds that accept it).
    #[instrument(skip(self, override_prompt), fields(node = %id))]
    pub async fn execute(
        &self,
        id: &NodeId,
        override_prompt: Option<String>,
    ) -> Result<StepReport, EngineError> {
        let run_id = Uuid::new_v4();
        let snapshot = self.canvas();
        let node = snapshot
            .node(id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownNode { id: id.clone() })?;
        let handler = self
            .handlers
            .get(node.kind)
            .ok_or(EngineError::NotExecutable { kind: node.kind })?;
        let _guard = self.claim(id)?;

        // Publish the Working snapshot before suspending: observers see the
        // node spin up, and multi-stage kinds surface their transient stage.
        let working_stage = handler.working_stage(&node);
        self.publish(|canvas| {
            if let Some(node) = canvas.node_mut(id) {
                node.status = ExecStatus::Working;
                node.error = None;
                if let Some(stage) = working_stage {
                    node.payload.set_stage(stage);
                }
            }
        });
        let working = self.canvas();
        self.emit(id, EventDetail::Status(ExecStatus::Working));
        if let Some(stage) = working_stage {
            self.emit(id, EventDetail::Stage(stage));
        }

        let token = self.cancellations.register(id);
        let ctx = StepContext {
            canvas: working,
            node,
            override_prompt,
            services: self.services.clone(),
            cancel: token,
            config: self.config.clone(),
            events: self.bus.emitter(),
        };
        let result = handler.run(ctx).await;
        self.cancellations.remove(id);

        let report = self.settle(run_id, id, result).await;
        self.emit(id, EventDetail::Status(report.status));
        if let Some(stage) = report.stage {
            self.emit(id, EventDetail::Stage(stage));
        }
        if !report.spawned.is_empty() {
            self.emit(id, EventDetail::Spawned(report.spawned.clone()));
        }
        Ok(report)
    }

    /// Apply a handler result to the canvas and build the report.
    async fn settle(
        &self,
        run_id: Uuid,
        id: &NodeId,
        result: Result<StepOutcome, EngineError>,
    ) -> StepReport {
        let (status, spawned) = match result {
            // A tripped token on a single-stage step: nothing to roll back,
            // nothing to record. Multi-stage kinds return
            // `StepOutcome::Cancelled` instead so their stage can rewind.
            Err(EngineError::Cancelled) => {
                tracing::debug!(node = %id, "step cancelled; resetting");
                self.publish(|canvas| {
                    if let Some(node) = canvas.node_mut(id) {
                        node.status = ExecStatus::Success;
                        node.error = None;
                    }
                });
                (ExecStatus::Success, Vec::new())
            }
            Err(err) => {
                tracing::warn!(node = %id, %err, "step failed");
                self.publish(|canvas| {
                    if let Some(node) = canvas.node_mut(id) {
                        node.status = ExecStatus::Error;
                        node.error = Some(err.to_string());
                    }
                });
                (ExecStatus::Error, Vec::new())
            }
            Ok(StepOutcome::Failed { payload, error }) => {
                tracing::warn!(node = %id, err = %error, "step failed after partial progress");
                self.publish(|canvas| {
                    if let Some(node) = canvas.node_mut(id) {
                        node.payload = payload;
                        node.status = ExecStatus::Error;
                        node.error = Some(error.to_string());
                    }
                });
                (ExecStatus::Error, Vec::new())
            }
            Ok(StepOutcome::Cancelled { payload }) => {
                tracing::debug!(node = %id, "step cancelled; resetting");
                self.publish(|canvas| {
                    if let Some(node) = canvas.node_mut(id) {
                        node.payload = payload;
                        node.status = ExecStatus::Success;
                        node.error = None;
                    }
                });
                (ExecStatus::Success, Vec::new())
            }
            Ok(StepOutcome::Advanced {
                payload,
                spawns,
                group,
            }) => {
                // Checkpoint first so the whole fan-out lands in one undo
                // unit. A checkpoint failure is logged, not fatal.
                if !spawns.is_empty()
                    && let Err(err) = self.services.history.save_history().await
                {
                    tracing::warn!(node = %id, %err, "history checkpoint failed");
                }
                let layout = self.config.layout.clone();
                let spawned = self.publish(|canvas| {
                    if let Some(node) = canvas.node_mut(id) {
                        node.payload = payload;
                        node.status = ExecStatus::Success;
                        node.error = None;
                    }
                    growth::spawn_children(canvas, id, spawns, group, &layout)
                });
                (ExecStatus::Success, spawned)
            }
        };

        let settled = self.canvas();
        StepReport {
            run_id,
            node: id.clone(),
            status,
            stage: settled.node(id).and_then(|n| n.payload.stage()),
            spawned,
            canvas_version: settled.version(),
        }
    }

    /// Copy-on-write canvas mutation: clone, apply, bump version, swap.
    fn publish<R>(&self, f: impl FnOnce(&mut Canvas) -> R) -> R {
        let mut slot = self.canvas.write();
        let mut next = (**slot).clone();
        let value = f(&mut next);
        next.touch();
        *slot = Arc::new(next);
        value
    }

    fn emit(&self, id: &NodeId, detail: EventDetail) {
        self.bus.emitter().emit(id, detail);
    }

    /// Per-node mutual exclusion: a node with a step in flight cannot be
    /// re-entered. Released when the returned guard drops.
    fn claim(&self, id: &NodeId) -> Result<FlightGuard<'_>, EngineError> {
        let mut in_flight = self.in_flight.lock();
        if !in_flight.insert(id.clone()) {
            return Err(EngineError::NodeBusy { id: id.clone() });
        }
        Ok(FlightGuard {
            engine: self,
            id: id.clone(),
        })
    }
}

struct FlightGuard<'a> {
    engine: &'a Engine,
    id: NodeId,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.engine.in_flight.lock().remove(&self.id);
    }
}
