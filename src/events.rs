//! Engine event stream.
//!
//! The engine reports status transitions, pipeline stage changes, progress
//! percentages, and spawn notifications over a flume channel so the host UI
//! can react without polling the canvas. Emission is non-blocking and
//! failure-tolerant: a disconnected receiver is trace-logged and otherwise
//! ignored; observability must never fail a step.

use crate::types::{ExecStatus, NodeId, PipelineStage};

/// One observable engine occurrence, scoped to a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineEvent {
    pub node: NodeId,
    pub detail: EventDetail,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventDetail {
    /// Execution status changed.
    Status(ExecStatus),
    /// Pipeline stage changed (multi-stage kinds only).
    Stage(PipelineStage),
    /// Visible progress, 0–100. Fusion/upload occupy the band below the
    /// configured floor; provider progress is mapped onto the band above it.
    Progress(u8),
    /// Children materialized by a fan-out.
    Spawned(Vec<NodeId>),
    /// Free-form note (cache hits, collaborator warnings).
    Note(String),
}

/// Cloneable sending half handed to execution contexts.
#[derive(Clone, Debug)]
pub struct EventEmitter {
    tx: flume::Sender<EngineEvent>,
}

impl EventEmitter {
    pub fn emit(&self, node: &NodeId, detail: EventDetail) {
        let event = EngineEvent {
            node: node.clone(),
            detail,
        };
        if self.tx.send(event).is_err() {
            tracing::trace!(%node, "event receiver disconnected; dropping event");
        }
    }
}

/// Unbounded event channel owned by the engine.
#[derive(Debug)]
pub struct EventBus {
    tx: flume::Sender<EngineEvent>,
    rx: flume::Receiver<EngineEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = flume::unbounded();
        Self { tx, rx }
    }

    #[must_use]
    pub fn emitter(&self) -> EventEmitter {
        EventEmitter {
            tx: self.tx.clone(),
        }
    }

    /// Receiver for the event stream. flume receivers are cloneable, but
    /// each event is delivered to exactly one receiver; use a single
    /// consumer per bus.
    #[must_use]
    pub fn receiver(&self) -> flume::Receiver<EngineEvent> {
        self.rx.clone()
    }

    /// Drain everything currently buffered. Test convenience.
    #[must_use]
    pub fn drain(&self) -> Vec<EngineEvent> {
        self.rx.try_iter().collect()
    }
}
