mod common;

use std::sync::Arc;

use common::fixtures::storyboard_canvas;
use common::stubs::{self, BlockingVideo, FailingVideo, StubStore};
use storyloom::artifacts::ImageAsset;
use storyloom::canvas::NodePayload;
use storyloom::config::EngineConfig;
use storyloom::engine::Engine;
use storyloom::events::EventDetail;
use storyloom::grouping::GroupStage;
use storyloom::services::Services;
use storyloom::types::{ExecStatus, NodeId, PipelineStage};

fn board_id() -> NodeId {
    NodeId::from("board")
}

fn engine_at(stage: PipelineStage, durations: &[f64]) -> Engine {
    Engine::new(
        storyboard_canvas(stage, durations),
        stubs::base_services(),
        EngineConfig::default().with_max_group_seconds(10.0),
    )
}

fn board_state(engine: &Engine) -> storyloom::canvas::StoryboardState {
    let canvas = engine.canvas();
    match &canvas.node(&board_id()).unwrap().payload {
        NodePayload::StoryboardBatch(state) => state.clone(),
        other => panic!("unexpected payload: {other:?}"),
    }
}

fn select(engine: &Engine, indices: &[usize]) {
    engine
        .update_node(&board_id(), |node| {
            if let NodePayload::StoryboardBatch(state) = &mut node.payload {
                state.selection = indices.to_vec();
            }
        })
        .unwrap();
}

#[tokio::test]
async fn idle_step_loads_candidates_and_moves_to_selecting() {
    let engine = engine_at(PipelineStage::Idle, &[4.0, 4.0, 4.0]);
    let report = engine.execute(&board_id(), None).await.unwrap();

    assert_eq!(report.status, ExecStatus::Success);
    assert_eq!(report.stage, Some(PipelineStage::Selecting));
    let state = board_state(&engine);
    assert_eq!(state.candidates.len(), 3);
    assert!(state.selection.is_empty());
}

#[tokio::test]
async fn idle_without_shot_planner_reports_missing_upstream() {
    // Shot planner present but empty: same failure as absent.
    let engine = engine_at(PipelineStage::Idle, &[]);
    let report = engine.execute(&board_id(), None).await.unwrap();

    assert_eq!(report.status, ExecStatus::Error);
    assert_eq!(report.stage, Some(PipelineStage::Idle));
    let canvas = engine.canvas();
    let message = canvas.node(&board_id()).unwrap().error.clone().unwrap();
    assert!(message.contains("upstream"), "message was: {message}");
}

#[tokio::test]
async fn empty_selection_errors_and_stage_remains_selecting() {
    let engine = engine_at(PipelineStage::Idle, &[4.0, 4.0, 4.0]);
    engine.execute(&board_id(), None).await.unwrap();

    let report = engine.execute(&board_id(), None).await.unwrap();
    assert_eq!(report.status, ExecStatus::Error);
    assert_eq!(report.stage, Some(PipelineStage::Selecting));

    let canvas = engine.canvas();
    let node = canvas.node(&board_id()).unwrap();
    let message = node.error.as_deref().unwrap();
    assert!(message.contains("selected"), "message was: {message}");
}

#[tokio::test]
async fn selecting_builds_prompt_and_duration_bounded_batches() {
    let engine = engine_at(PipelineStage::Idle, &[4.0, 4.0, 4.0]);
    engine.execute(&board_id(), None).await.unwrap();
    select(&engine, &[0, 1, 2]);

    let report = engine.execute(&board_id(), None).await.unwrap();
    assert_eq!(report.status, ExecStatus::Success);
    assert_eq!(report.stage, Some(PipelineStage::Prompting));

    let state = board_state(&engine);
    assert_eq!(state.prompt.as_deref(), Some("3 shots in watercolor"));
    // 4+4 fits the 10s bound, the third shot opens a second batch.
    assert_eq!(state.batches.len(), 2);
    assert!(
        state
            .batches
            .iter()
            .all(|b| b.stage == GroupStage::PromptReady)
    );
}

#[tokio::test]
async fn prompting_success_spawns_exactly_one_clip_child() {
    let engine = engine_at(PipelineStage::Idle, &[4.0, 4.0, 4.0]);
    engine.execute(&board_id(), None).await.unwrap();
    select(&engine, &[0, 1]);
    engine.execute(&board_id(), None).await.unwrap();

    let report = engine.execute(&board_id(), None).await.unwrap();
    assert_eq!(report.status, ExecStatus::Success);
    assert_eq!(report.stage, Some(PipelineStage::Completed));
    assert_eq!(report.spawned.len(), 1);

    let canvas = engine.canvas();
    let child = canvas.node(&report.spawned[0]).unwrap();
    assert_eq!(child.inputs, vec![board_id()]);
    match &child.payload {
        NodePayload::VideoClip { video } => {
            assert_eq!(video.duration_seconds, 8.0);
        }
        other => panic!("unexpected payload: {other:?}"),
    }

    let state = board_state(&engine);
    assert!(state.batches.iter().all(|b| b.stage == GroupStage::Completed));
    assert!(
        state
            .batches
            .iter()
            .all(|b| b.remote_job_id.as_deref() == Some("job-0001"))
    );
}

#[tokio::test]
async fn completed_rerun_appends_another_child() {
    let engine = engine_at(PipelineStage::Idle, &[4.0, 4.0, 4.0]);
    engine.execute(&board_id(), None).await.unwrap();
    select(&engine, &[0]);
    engine.execute(&board_id(), None).await.unwrap();
    let first = engine.execute(&board_id(), None).await.unwrap();
    let second = engine.execute(&board_id(), None).await.unwrap();

    assert_eq!(first.spawned.len(), 1);
    assert_eq!(second.spawned.len(), 1);
    assert_ne!(first.spawned[0], second.spawned[0]);

    let canvas = engine.canvas();
    let clips = canvas
        .iter_nodes()
        .filter(|n| n.kind == storyloom::types::NodeKind::VideoClip)
        .count();
    assert_eq!(clips, 2);
}

#[tokio::test]
async fn provider_failure_returns_to_prompting_and_keeps_the_prompt() {
    let services = Services::new(
        Arc::new(stubs::StubScript::default()),
        Arc::new(stubs::StubImage),
        Arc::new(FailingVideo("render farm on fire")),
        Arc::new(stubs::StubAudio),
        Arc::new(stubs::StubPrompts),
        Arc::new(stubs::StubFuser),
        Arc::new(stubs::RecordingHistory::default()),
    );
    let engine = Engine::new(
        storyboard_canvas(PipelineStage::Idle, &[4.0, 4.0]),
        services,
        EngineConfig::default().with_max_group_seconds(10.0),
    );
    engine.execute(&board_id(), None).await.unwrap();
    select(&engine, &[0, 1]);
    engine.execute(&board_id(), None).await.unwrap();

    let report = engine.execute(&board_id(), None).await.unwrap();
    assert_eq!(report.status, ExecStatus::Error);
    assert_eq!(report.stage, Some(PipelineStage::Prompting));
    assert!(report.spawned.is_empty());

    let canvas = engine.canvas();
    let node = canvas.node(&board_id()).unwrap();
    let message = node.error.as_deref().unwrap();
    assert!(message.contains("render farm on fire"), "message was: {message}");

    // Prompt survives for an idempotent retry.
    let state = board_state(&engine);
    assert!(state.prompt.is_some());
    assert!(state.batches.iter().all(|b| b.stage == GroupStage::Failed));
}

#[tokio::test]
async fn cancellation_resets_to_prompting_without_error_or_child() {
    let services = Services::new(
        Arc::new(stubs::StubScript::default()),
        Arc::new(stubs::StubImage),
        Arc::new(BlockingVideo),
        Arc::new(stubs::StubAudio),
        Arc::new(stubs::StubPrompts),
        Arc::new(stubs::StubFuser),
        Arc::new(stubs::RecordingHistory::default()),
    );
    let engine = Arc::new(Engine::new(
        storyboard_canvas(PipelineStage::Idle, &[4.0, 4.0]),
        services,
        EngineConfig::default().with_max_group_seconds(10.0),
    ));
    engine.execute(&board_id(), None).await.unwrap();
    select(&engine, &[0, 1]);
    engine.execute(&board_id(), None).await.unwrap();

    let background = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.execute(&board_id(), None).await })
    };
    while engine.canvas().node(&board_id()).unwrap().status != ExecStatus::Working {
        tokio::task::yield_now().await;
    }
    assert!(engine.cancel(&board_id()));

    let report = background.await.unwrap().unwrap();
    assert_eq!(report.status, ExecStatus::Success);
    assert_eq!(report.stage, Some(PipelineStage::Prompting));
    assert!(report.spawned.is_empty());

    let canvas = engine.canvas();
    let node = canvas.node(&board_id()).unwrap();
    assert!(node.error.is_none());
    assert_eq!(node.status, ExecStatus::Success);
}

#[tokio::test]
async fn references_are_fused_and_uploaded_when_store_is_configured() {
    let services = stubs::base_services().with_asset_store(Arc::new(StubStore));
    let engine = Engine::new(
        storyboard_canvas(PipelineStage::Idle, &[]),
        services,
        EngineConfig::default().with_max_group_seconds(10.0),
    );
    // Attach references to the candidate shots.
    engine
        .update_node(&"shots".into(), |node| {
            if let NodePayload::ShotPlanner { shots } = &mut node.payload {
                *shots = vec![
                    storyloom::artifacts::Shot::new(1, "shot 1", 4.0)
                        .with_reference(ImageAsset::inline("ref-1", "png:ref-1")),
                    storyloom::artifacts::Shot::new(2, "shot 2", 4.0)
                        .with_reference(ImageAsset::inline("ref-2", "png:ref-2")),
                ];
            }
        })
        .unwrap();

    engine.execute(&board_id(), None).await.unwrap();
    select(&engine, &[0, 1]);
    engine.execute(&board_id(), None).await.unwrap();
    let report = engine.execute(&board_id(), None).await.unwrap();

    assert_eq!(report.status, ExecStatus::Success);
    let state = board_state(&engine);
    let reference = state.reference.unwrap();
    assert_eq!(reference.label, "composite");
    assert_eq!(
        reference.remote_url.as_deref(),
        Some("https://assets.example/composite")
    );
}

#[tokio::test]
async fn provider_progress_is_mapped_onto_the_upper_band() {
    let engine = engine_at(PipelineStage::Idle, &[4.0]);
    let events = engine.subscribe();
    engine.execute(&board_id(), None).await.unwrap();
    select(&engine, &[0]);
    engine.execute(&board_id(), None).await.unwrap();
    for _ in events.try_iter() {}

    engine.execute(&board_id(), None).await.unwrap();
    let progress: Vec<u8> = events
        .try_iter()
        .filter_map(|e| match e.detail {
            EventDetail::Progress(p) => Some(p),
            _ => None,
        })
        .collect();
    // StubVideo reports 0/50/100; the floor is 30, so the mapped band is
    // 30/65/100 followed by the engine's terminal 100.
    assert_eq!(progress, vec![30, 65, 100, 100]);
}

#[tokio::test]
async fn working_storyboard_surfaces_transient_generating_stage() {
    let engine = engine_at(PipelineStage::Idle, &[4.0]);
    let events = engine.subscribe();
    engine.execute(&board_id(), None).await.unwrap();
    select(&engine, &[0]);
    engine.execute(&board_id(), None).await.unwrap();
    for _ in events.try_iter() {}

    engine.execute(&board_id(), None).await.unwrap();
    let stages: Vec<PipelineStage> = events
        .try_iter()
        .filter_map(|e| match e.detail {
            EventDetail::Stage(stage) => Some(stage),
            _ => None,
        })
        .collect();
    assert_eq!(
        stages,
        vec![PipelineStage::Generating, PipelineStage::Completed]
    );
}

#[tokio::test]
async fn reset_stage_forces_prompting_for_reedit() {
    let engine = engine_at(PipelineStage::Idle, &[4.0]);
    engine.execute(&board_id(), None).await.unwrap();
    select(&engine, &[0]);
    engine.execute(&board_id(), None).await.unwrap();
    engine.execute(&board_id(), None).await.unwrap();
    assert_eq!(board_state(&engine).stage, PipelineStage::Completed);

    engine.reset_stage(&board_id()).unwrap();
    assert_eq!(board_state(&engine).stage, PipelineStage::Prompting);
}
