//! Error taxonomy for the execution engine.
//!
//! Three groups of variants, with different propagation rules (see
//! [`Engine::execute`](crate::engine::Engine::execute)):
//!
//! - **Caller-facing**: [`UnknownNode`](EngineError::UnknownNode),
//!   [`NotExecutable`](EngineError::NotExecutable),
//!   [`NodeBusy`](EngineError::NodeBusy): returned as `Err` because there is
//!   no sensible node state to record them on.
//! - **Node-recorded**: validation and upstream failures plus
//!   [`Service`](EngineError::Service): caught at the top of `execute`,
//!   stored on the node as an `Error` status with the message preserved for
//!   user inspection, never propagated across the trigger boundary.
//! - **Signal**: [`Cancelled`](EngineError::Cancelled), which is not a failure but a
//!   user-initiated abort that resets the node without an error banner.

use miette::Diagnostic;
use thiserror::Error;

use crate::services::ServiceError;
use crate::types::{NodeId, NodeKind};

/// Errors raised while advancing a node by one step.
#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    /// A required local field is missing or empty.
    #[error("missing required input: {field}")]
    #[diagnostic(
        code(storyloom::engine::validation),
        help("Fill the named field on the node before triggering it.")
    )]
    Validation { field: &'static str },

    /// A multi-stage node was advanced past Selecting with no selection.
    #[error("no work items selected")]
    #[diagnostic(
        code(storyloom::engine::empty_selection),
        help("Choose at least one candidate shot before continuing.")
    )]
    EmptySelection,

    /// A multi-stage node reached generation with an empty prompt.
    #[error("no generation prompt available")]
    #[diagnostic(code(storyloom::engine::missing_prompt))]
    MissingPrompt,

    /// A required upstream ancestor kind is absent or produced nothing.
    #[error("required upstream {kind} is absent or empty")]
    #[diagnostic(
        code(storyloom::engine::missing_upstream),
        help("Connect a node of the named kind upstream and run it first.")
    )]
    MissingUpstream { kind: NodeKind },

    /// A generation/upload/prompt collaborator failed; carries the raw
    /// provider message.
    #[error("provider error ({provider}): {message}")]
    #[diagnostic(code(storyloom::engine::provider))]
    Service {
        provider: &'static str,
        message: String,
    },

    /// User-initiated abort observed by an in-flight collaborator call.
    /// A controlled reset, not a failure.
    #[error("generation cancelled")]
    #[diagnostic(code(storyloom::engine::cancelled))]
    Cancelled,

    /// The triggered id does not exist on the canvas.
    #[error("unknown node: {id}")]
    #[diagnostic(code(storyloom::engine::unknown_node))]
    UnknownNode { id: NodeId },

    /// The triggered node is an artifact kind with no handler.
    #[error("node kind {kind} is not executable")]
    #[diagnostic(code(storyloom::engine::not_executable))]
    NotExecutable { kind: NodeKind },

    /// The node already has a step in flight.
    #[error("node {id} is already working")]
    #[diagnostic(
        code(storyloom::engine::node_busy),
        help("Wait for the current step to finish or cancel it.")
    )]
    NodeBusy { id: NodeId },

    /// A node's payload variant does not match its declared kind. Internal
    /// invariant breach; cannot occur for nodes built through the canvas API.
    #[error("node payload does not match kind {kind}")]
    #[diagnostic(code(storyloom::engine::payload_mismatch))]
    PayloadMismatch { kind: NodeKind },
}

impl From<ServiceError> for EngineError {
    fn from(err: ServiceError) -> Self {
        EngineError::Service {
            provider: err.provider,
            message: err.message,
        }
    }
}

impl EngineError {
    /// Whether this error is recorded on the node rather than returned to
    /// the trigger caller. Cancellation is neither: it settles as a
    /// controlled reset with no message.
    #[must_use]
    pub fn is_node_recorded(&self) -> bool {
        !matches!(
            self,
            EngineError::UnknownNode { .. }
                | EngineError::NotExecutable { .. }
                | EngineError::NodeBusy { .. }
                | EngineError::Cancelled
        )
    }
}
