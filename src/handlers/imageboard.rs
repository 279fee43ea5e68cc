//! Image board: a prompt fans out into a grid of storyboard panels.

use async_trait::async_trait;

use crate::canvas::NodePayload;
use crate::errors::EngineError;
use crate::growth::{GroupSpec, SpawnSpec};

use super::{KindHandler, StepContext, StepOutcome};

/// Single-shot handler for [`NodeKind::ImageBoard`](crate::types::NodeKind).
///
/// Generates `panel_count` panel images and spawns one `PanelImage` child
/// per panel, bundled under a group.
pub struct ImageBoardHandler;

#[async_trait]
impl KindHandler for ImageBoardHandler {
    async fn run(&self, ctx: StepContext) -> Result<StepOutcome, EngineError> {
        let NodePayload::ImageBoard {
            prompt,
            panel_count,
            ..
        } = &ctx.node.payload
        else {
            return Err(EngineError::PayloadMismatch {
                kind: ctx.node.kind,
            });
        };
        let prompt = ctx
            .override_prompt
            .as_deref()
            .unwrap_or(prompt)
            .trim()
            .to_string();
        if prompt.is_empty() {
            return Err(EngineError::Validation { field: "prompt" });
        }
        let panel_count = *panel_count;
        if panel_count == 0 {
            return Err(EngineError::Validation {
                field: "panel_count",
            });
        }

        let style = ctx.style_context();
        match ctx
            .services
            .image
            .generate_panels(&prompt, &style, panel_count, &ctx.cancel)
            .await
        {
            Ok(panels) => {
                if let Ok(value) = serde_json::to_value(&panels) {
                    ctx.save_output(value);
                }
                let spawns = panels
                    .iter()
                    .cloned()
                    .map(|image| SpawnSpec::new(NodePayload::PanelImage { image }))
                    .collect();
                Ok(StepOutcome::fanned_out(
                    NodePayload::ImageBoard {
                        prompt,
                        panel_count,
                        panels,
                    },
                    spawns,
                    Some(GroupSpec::new("Storyboard panels")),
                ))
            }
            Err(_) if ctx.is_cancelled() => Err(EngineError::Cancelled),
            Err(err) => Err(err.into()),
        }
    }
}
