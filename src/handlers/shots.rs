//! Shot planner: breaks an episode script into timed shots.

use async_trait::async_trait;

use crate::canvas::NodePayload;
use crate::errors::EngineError;
use crate::types::NodeKind;

use super::{KindHandler, StepContext, StepOutcome};

/// Single-shot handler for [`NodeKind::ShotPlanner`].
///
/// Requires an episode-script ancestor whose script has been written; the
/// resulting shots are the candidate pool for downstream storyboard batches.
pub struct ShotPlannerHandler;

#[async_trait]
impl KindHandler for ShotPlannerHandler {
    async fn run(&self, ctx: StepContext) -> Result<StepOutcome, EngineError> {
        if !matches!(ctx.node.payload, NodePayload::ShotPlanner { .. }) {
            return Err(EngineError::PayloadMismatch {
                kind: ctx.node.kind,
            });
        }

        let script = ctx
            .nearest_ancestor(NodeKind::EpisodeScript)
            .and_then(|node| match node.payload {
                NodePayload::EpisodeScript { script, .. } => script,
                _ => None,
            })
            .filter(|script| !script.is_empty())
            .ok_or(EngineError::MissingUpstream {
                kind: NodeKind::EpisodeScript,
            })?;

        let style = ctx.style_context();
        match ctx
            .services
            .script
            .plan_shots(&script, &style, &ctx.cancel)
            .await
        {
            Ok(shots) => {
                if let Ok(value) = serde_json::to_value(&shots) {
                    ctx.save_output(value);
                }
                Ok(StepOutcome::advanced(NodePayload::ShotPlanner { shots }))
            }
            Err(_) if ctx.is_cancelled() => Err(EngineError::Cancelled),
            Err(err) => Err(err.into()),
        }
    }
}
