//! Analyzer: structured findings over a source text.

use async_trait::async_trait;

use crate::canvas::NodePayload;
use crate::errors::EngineError;

use super::{KindHandler, StepContext, StepOutcome};

/// Single-shot handler for [`NodeKind::Analyzer`](crate::types::NodeKind).
///
/// The source text is a required local field (an override may stand in for
/// it); the report is stored whole, but only fields named in the node's
/// `propagate` allowlist ever reach downstream context.
pub struct AnalyzerHandler;

#[async_trait]
impl KindHandler for AnalyzerHandler {
    async fn run(&self, ctx: StepContext) -> Result<StepOutcome, EngineError> {
        let NodePayload::Analyzer {
            source_text,
            propagate,
            ..
        } = &ctx.node.payload
        else {
            return Err(EngineError::PayloadMismatch {
                kind: ctx.node.kind,
            });
        };
        let source = ctx
            .override_prompt
            .as_deref()
            .or(source_text.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or(EngineError::Validation {
                field: "source_text",
            })?;
        let propagate = propagate.clone();

        let context = ctx.upstream_context();
        match ctx.services.script.analyze(&source, &context, &ctx.cancel).await {
            Ok(report) => {
                if let Ok(value) = serde_json::to_value(&report) {
                    ctx.save_output(value);
                }
                Ok(StepOutcome::advanced(NodePayload::Analyzer {
                    source_text: Some(source),
                    propagate,
                    report: Some(report),
                }))
            }
            Err(_) if ctx.is_cancelled() => Err(EngineError::Cancelled),
            Err(err) => Err(err.into()),
        }
    }
}
