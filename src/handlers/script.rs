//! Episode script writer.

use async_trait::async_trait;

use crate::canvas::NodePayload;
use crate::errors::EngineError;

use super::{KindHandler, StepContext, StepOutcome};

/// Single-shot handler for [`NodeKind::EpisodeScript`](crate::types::NodeKind):
/// writes the full script for one episode beat, feeding the whole upstream
/// context (outline, flagged analysis, sibling scripts) to the collaborator.
pub struct EpisodeScriptHandler;

#[async_trait]
impl KindHandler for EpisodeScriptHandler {
    async fn run(&self, ctx: StepContext) -> Result<StepOutcome, EngineError> {
        let NodePayload::EpisodeScript { beat, .. } = &ctx.node.payload else {
            return Err(EngineError::PayloadMismatch {
                kind: ctx.node.kind,
            });
        };
        let beat = beat.clone();

        if let Some(cached) = ctx.check_cache().await
            && let Some(script) = cached.as_str()
        {
            return Ok(StepOutcome::advanced(NodePayload::EpisodeScript {
                beat,
                script: Some(script.to_string()),
            }));
        }

        let context = ctx.upstream_context();
        let style = ctx.style_context();
        match ctx
            .services
            .script
            .write_episode_script(&beat, &context, &style, &ctx.cancel)
            .await
        {
            Ok(script) => {
                ctx.save_output(serde_json::Value::String(script.clone()));
                Ok(StepOutcome::advanced(NodePayload::EpisodeScript {
                    beat,
                    script: Some(script),
                }))
            }
            Err(_) if ctx.is_cancelled() => Err(EngineError::Cancelled),
            Err(err) => Err(err.into()),
        }
    }
}
