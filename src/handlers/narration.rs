//! Narration: voiceover synthesis for an upstream script.

use async_trait::async_trait;

use crate::canvas::NodePayload;
use crate::errors::EngineError;
use crate::types::NodeKind;

use super::{KindHandler, StepContext, StepOutcome};

/// Single-shot handler for [`NodeKind::Narration`].
///
/// The narrated text comes from the node's own `script_override` when set,
/// otherwise from the nearest episode-script ancestor.
pub struct NarrationHandler;

#[async_trait]
impl KindHandler for NarrationHandler {
    async fn run(&self, ctx: StepContext) -> Result<StepOutcome, EngineError> {
        let NodePayload::Narration {
            voice,
            script_override,
            ..
        } = &ctx.node.payload
        else {
            return Err(EngineError::PayloadMismatch {
                kind: ctx.node.kind,
            });
        };
        let voice = voice.trim().to_string();
        if voice.is_empty() {
            return Err(EngineError::Validation { field: "voice" });
        }
        let script_override = script_override.clone();

        let script = script_override
            .clone()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| {
                ctx.nearest_ancestor(NodeKind::EpisodeScript)
                    .and_then(|node| match node.payload {
                        NodePayload::EpisodeScript { script, .. } => script,
                        _ => None,
                    })
                    .filter(|s| !s.is_empty())
            })
            .ok_or(EngineError::MissingUpstream {
                kind: NodeKind::EpisodeScript,
            })?;

        match ctx
            .services
            .audio
            .synthesize(&script, &voice, &ctx.cancel)
            .await
        {
            Ok(audio) => {
                if let Ok(value) = serde_json::to_value(&audio) {
                    ctx.save_output(value);
                }
                Ok(StepOutcome::advanced(NodePayload::Narration {
                    voice,
                    script_override,
                    audio: Some(audio),
                }))
            }
            Err(_) if ctx.is_cancelled() => Err(EngineError::Cancelled),
            Err(err) => Err(err.into()),
        }
    }
}
