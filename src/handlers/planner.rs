//! Script planner: turns an idea into an outline.

use async_trait::async_trait;

use crate::canvas::NodePayload;
use crate::errors::EngineError;

use super::{KindHandler, StepContext, StepOutcome};

/// Single-shot handler for [`NodeKind::ScriptPlanner`](crate::types::NodeKind).
///
/// Validates the idea, consults the output cache, then asks the script
/// collaborator for an outline. The planner's own style triple rides along
/// so descendants inherit it through the resolver.
pub struct ScriptPlannerHandler;

#[async_trait]
impl KindHandler for ScriptPlannerHandler {
    async fn run(&self, ctx: StepContext) -> Result<StepOutcome, EngineError> {
        let NodePayload::ScriptPlanner { idea, style, .. } = &ctx.node.payload else {
            return Err(EngineError::PayloadMismatch {
                kind: ctx.node.kind,
            });
        };
        let idea = ctx
            .override_prompt
            .as_deref()
            .unwrap_or(idea)
            .trim()
            .to_string();
        if idea.is_empty() {
            return Err(EngineError::Validation { field: "idea" });
        }
        let style = style.clone();

        if let Some(cached) = ctx.check_cache().await
            && let Some(outline) = cached.as_str()
        {
            return Ok(StepOutcome::advanced(NodePayload::ScriptPlanner {
                idea,
                style,
                outline: Some(outline.to_string()),
            }));
        }

        let context = ctx.upstream_context();
        match ctx
            .services
            .script
            .generate_outline(&idea, &style, &context, &ctx.cancel)
            .await
        {
            Ok(outline) => {
                ctx.save_output(serde_json::Value::String(outline.clone()));
                Ok(StepOutcome::advanced(NodePayload::ScriptPlanner {
                    idea,
                    style,
                    outline: Some(outline),
                }))
            }
            Err(_) if ctx.is_cancelled() => Err(EngineError::Cancelled),
            Err(err) => Err(err.into()),
        }
    }
}
