//! The multi-stage storyboard/video pipeline.
//!
//! A storyboard batch node cycles through
//! `Idle → Selecting → Prompting → Generating → Completed`, advancing one
//! stage per `execute` call:
//!
//! - **Idle** pulls candidate shots from the nearest upstream shot planner.
//! - **Selecting** turns the user's chosen subset into duration-bounded
//!   batches and builds the generation prompt.
//! - **Prompting** fuses reference images, uploads the composite when an
//!   asset store is configured, submits the video job, and spawns one
//!   `VideoClip` child on success. Provider progress is rescaled onto the
//!   upper band so fusion/upload keep the earlier visible range.
//! - **Completed** renders like Prompting: another call runs a fresh
//!   generation pass and appends another child without re-running
//!   Idle/Selecting.
//!
//! Provider failure returns the node to Prompting with the prompt and any
//! uploaded reference intact (idempotent retry); a tripped cancellation token
//! is a controlled reset to Prompting, distinct from failure.

use async_trait::async_trait;

use crate::artifacts::{ImageAsset, Shot};
use crate::canvas::{Node, NodePayload, StoryboardState};
use crate::errors::EngineError;
use crate::grouping::{GroupStage, group_by_duration};
use crate::growth::SpawnSpec;
use crate::services::{ServiceError, VideoRequest};
use crate::types::{NodeKind, PipelineStage};

use super::{KindHandler, StepContext, StepOutcome};

pub struct StoryboardHandler;

/// Progress milestones for the sub-steps preceding generation.
const FUSION_PROGRESS: u8 = 10;
const UPLOAD_PROGRESS: u8 = 25;

#[async_trait]
impl KindHandler for StoryboardHandler {
    async fn run(&self, ctx: StepContext) -> Result<StepOutcome, EngineError> {
        let NodePayload::StoryboardBatch(state) = &ctx.node.payload else {
            return Err(EngineError::PayloadMismatch {
                kind: ctx.node.kind,
            });
        };
        let mut state = state.clone();

        match state.stage {
            PipelineStage::Idle => fetch_candidates(&ctx, state),
            PipelineStage::Selecting => plan_batches(&ctx, state).await,
            // A persisted Generating stage means a step died mid-flight;
            // treat it like Prompting so the prompt is not lost.
            PipelineStage::Prompting | PipelineStage::Generating | PipelineStage::Completed => {
                generate(&ctx, &mut state).await
            }
        }
    }

    fn working_stage(&self, node: &Node) -> Option<PipelineStage> {
        match node.payload.stage()? {
            PipelineStage::Prompting | PipelineStage::Generating | PipelineStage::Completed => {
                Some(PipelineStage::Generating)
            }
            _ => None,
        }
    }
}

/// Idle: load the candidate pool from the nearest shot planner ancestor.
fn fetch_candidates(
    ctx: &StepContext,
    mut state: StoryboardState,
) -> Result<StepOutcome, EngineError> {
    let candidates = ctx
        .nearest_ancestor(NodeKind::ShotPlanner)
        .and_then(|node| match node.payload {
            NodePayload::ShotPlanner { shots } => Some(shots),
            _ => None,
        })
        .filter(|shots| !shots.is_empty())
        .ok_or(EngineError::MissingUpstream {
            kind: NodeKind::ShotPlanner,
        })?;

    // Fresh candidates invalidate any previous selection and plan.
    state.candidates = candidates;
    state.selection.clear();
    state.batches.clear();
    state.stage = PipelineStage::Selecting;
    Ok(StepOutcome::advanced(NodePayload::StoryboardBatch(state)))
}

/// Selecting: batch the chosen shots and build the generation prompt.
async fn plan_batches(
    ctx: &StepContext,
    mut state: StoryboardState,
) -> Result<StepOutcome, EngineError> {
    let chosen = chosen_shots(&state);
    if chosen.is_empty() {
        return Err(EngineError::EmptySelection);
    }

    let style = ctx.style_context();
    let prompt = match ctx.services.prompts.build_batch_prompt(&chosen, &style).await {
        Ok(prompt) => prompt,
        Err(_) if ctx.is_cancelled() => {
            return Ok(StepOutcome::Cancelled {
                payload: ctx.node.payload.clone(),
            });
        }
        Err(err) => return Err(err.into()),
    };

    state.batches = group_by_duration(chosen, ctx.config.max_group_seconds);
    for batch in &mut state.batches {
        batch.stage = GroupStage::PromptReady;
        batch.prompt = Some(prompt.clone());
    }
    state.prompt = Some(prompt);
    state.stage = PipelineStage::Prompting;
    Ok(StepOutcome::advanced(NodePayload::StoryboardBatch(state)))
}

/// Prompting/Completed: fuse, upload, submit, spawn.
async fn generate(
    ctx: &StepContext,
    state: &mut StoryboardState,
) -> Result<StepOutcome, EngineError> {
    let prompt = state
        .prompt
        .clone()
        .filter(|p| !p.trim().is_empty())
        .ok_or(EngineError::MissingPrompt)?;
    let chosen = chosen_shots(state);

    // Fuse the selected shots' reference images into one composite, once.
    if state.reference.is_none() {
        let references: Vec<ImageAsset> =
            chosen.iter().filter_map(|s| s.reference.clone()).collect();
        if !references.is_empty() {
            match ctx.services.fuser.fuse(&references).await {
                Ok(composite) => {
                    state.reference = Some(composite);
                    ctx.progress(FUSION_PROGRESS);
                }
                Err(err) => return Ok(settle_failure(ctx, state, err)),
            }
        }
    }

    // Upload the composite when a remote store is configured; otherwise the
    // asset stays inline. An already-uploaded reference is not re-sent.
    if let Some(store) = ctx.services.asset_store.clone()
        && let Some(reference) = state.reference.as_mut()
        && !reference.is_uploaded()
    {
        match store.upload(reference).await {
            Ok(url) => {
                reference.remote_url = Some(url);
                ctx.progress(UPLOAD_PROGRESS);
            }
            Err(err) => return Ok(settle_failure(ctx, state, err)),
        }
    }

    let total_duration: f64 = chosen.iter().map(|s| s.duration_seconds).sum();
    let request = VideoRequest {
        prompt,
        reference: state.reference.clone(),
        total_duration,
        style: ctx.style_context(),
    };
    for batch in &mut state.batches {
        batch.stage = GroupStage::Generating;
    }

    match ctx
        .services
        .video
        .submit(request, ctx.provider_progress_fn(), &ctx.cancel)
        .await
    {
        Ok(video) => {
            for batch in &mut state.batches {
                batch.stage = GroupStage::Completed;
                batch.remote_job_id = Some(video.job_id.clone());
                batch.progress = 100;
                batch.error = None;
            }
            if let Ok(value) = serde_json::to_value(&video) {
                ctx.save_output(value);
            }
            ctx.progress(100);
            state.stage = PipelineStage::Completed;
            Ok(StepOutcome::fanned_out(
                NodePayload::StoryboardBatch(state.clone()),
                vec![SpawnSpec::new(NodePayload::VideoClip { video })],
                None,
            ))
        }
        Err(err) => Ok(settle_failure(ctx, state, err)),
    }
}

/// Roll the pipeline back to Prompting, distinguishing a user abort from a
/// provider failure. Prompt and uploaded reference are kept either way so a
/// retry does not repeat completed sub-steps.
fn settle_failure(ctx: &StepContext, state: &mut StoryboardState, err: ServiceError) -> StepOutcome {
    state.stage = PipelineStage::Prompting;
    if ctx.is_cancelled() {
        for batch in &mut state.batches {
            batch.stage = GroupStage::PromptReady;
        }
        return StepOutcome::Cancelled {
            payload: NodePayload::StoryboardBatch(state.clone()),
        };
    }
    for batch in &mut state.batches {
        batch.stage = GroupStage::Failed;
        batch.error = Some(err.message.clone());
    }
    StepOutcome::Failed {
        payload: NodePayload::StoryboardBatch(state.clone()),
        error: err.into(),
    }
}

/// The user-chosen subset of candidates, in narrative order. Indices are
/// deduplicated and out-of-range entries dropped.
fn chosen_shots(state: &StoryboardState) -> Vec<Shot> {
    let mut indices: Vec<usize> = state
        .selection
        .iter()
        .copied()
        .filter(|&i| i < state.candidates.len())
        .collect();
    indices.sort_unstable();
    indices.dedup();
    indices
        .into_iter()
        .map(|i| state.candidates[i].clone())
        .collect()
}
