//! Episode splitter: fans a planner outline out into per-episode children.

use async_trait::async_trait;

use crate::canvas::NodePayload;
use crate::errors::EngineError;
use crate::growth::{GroupSpec, SpawnSpec};
use crate::types::NodeKind;

use super::{KindHandler, StepContext, StepOutcome};

/// Single-shot handler for [`NodeKind::EpisodeSplitter`].
///
/// Requires a planner ancestor with a generated outline, splits it into
/// episode beats, and spawns one `EpisodeScript` child per beat, bundled in
/// an "Episodes" group.
pub struct EpisodeSplitterHandler;

#[async_trait]
impl KindHandler for EpisodeSplitterHandler {
    async fn run(&self, ctx: StepContext) -> Result<StepOutcome, EngineError> {
        let NodePayload::EpisodeSplitter { episode_count, .. } = &ctx.node.payload else {
            return Err(EngineError::PayloadMismatch {
                kind: ctx.node.kind,
            });
        };
        let episode_count = *episode_count;
        if episode_count == 0 {
            return Err(EngineError::Validation {
                field: "episode_count",
            });
        }

        let outline = ctx
            .nearest_ancestor(NodeKind::ScriptPlanner)
            .and_then(|node| match node.payload {
                NodePayload::ScriptPlanner { outline, .. } => outline,
                _ => None,
            })
            .filter(|outline| !outline.is_empty())
            .ok_or(EngineError::MissingUpstream {
                kind: NodeKind::ScriptPlanner,
            })?;

        let style = ctx.style_context();
        match ctx
            .services
            .script
            .split_episodes(&outline, &style, episode_count, &ctx.cancel)
            .await
        {
            Ok(episodes) => {
                if let Ok(value) = serde_json::to_value(&episodes) {
                    ctx.save_output(value);
                }
                let spawns = episodes
                    .iter()
                    .cloned()
                    .map(|beat| SpawnSpec::new(NodePayload::episode_script(beat)))
                    .collect();
                Ok(StepOutcome::fanned_out(
                    NodePayload::EpisodeSplitter {
                        episode_count,
                        episodes,
                    },
                    spawns,
                    Some(GroupSpec::new("Episodes")),
                ))
            }
            Err(_) if ctx.is_cancelled() => Err(EngineError::Cancelled),
            Err(err) => Err(err.into()),
        }
    }
}
