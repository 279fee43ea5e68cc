//! Stub collaborators for driving the engine in tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

use storyloom::artifacts::{
    AnalysisField, AnalysisReport, AudioArtifact, EpisodeBeat, ImageAsset, Shot, VideoArtifact,
};
use storyloom::services::{
    AssetStore, AudioService, HistoryWriter, ImageService, ImageFuser, OutputCache, ProgressFn,
    PromptBuilder, ScriptService, ServiceError, ServiceResult, Services, VideoRequest,
    VideoService,
};
use storyloom::types::{NodeId, NodeKind, StyleContext};

/// Deterministic script collaborator that counts outline calls.
#[derive(Default)]
pub struct StubScript {
    pub outline_calls: AtomicUsize,
}

#[async_trait]
impl ScriptService for StubScript {
    async fn generate_outline(
        &self,
        idea: &str,
        style: &StyleContext,
        _context: &[String],
        _cancel: &CancellationToken,
    ) -> ServiceResult<String> {
        self.outline_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{} outline for: {idea}", style.genre))
    }

    async fn split_episodes(
        &self,
        outline: &str,
        _style: &StyleContext,
        count: usize,
        _cancel: &CancellationToken,
    ) -> ServiceResult<Vec<EpisodeBeat>> {
        Ok((1..=count)
            .map(|i| EpisodeBeat::new(i, format!("Episode {i}"), format!("beat {i} of {outline}")))
            .collect())
    }

    async fn write_episode_script(
        &self,
        beat: &EpisodeBeat,
        _context: &[String],
        _style: &StyleContext,
        _cancel: &CancellationToken,
    ) -> ServiceResult<String> {
        Ok(format!("SCRIPT[{}]", beat.title))
    }

    async fn plan_shots(
        &self,
        _script: &str,
        _style: &StyleContext,
        _cancel: &CancellationToken,
    ) -> ServiceResult<Vec<Shot>> {
        Ok(vec![
            Shot::new(1, "establishing", 4.0),
            Shot::new(2, "two-shot", 4.0),
            Shot::new(3, "insert", 4.0),
        ])
    }

    async fn analyze(
        &self,
        _source: &str,
        _context: &[String],
        _cancel: &CancellationToken,
    ) -> ServiceResult<AnalysisReport> {
        Ok(AnalysisReport {
            fields: vec![
                AnalysisField {
                    name: "tone".into(),
                    value: "melancholic".into(),
                },
                AnalysisField {
                    name: "pacing".into(),
                    value: "slow burn".into(),
                },
            ],
        })
    }
}

/// Script collaborator that parks until cancelled, for busy-guard and
/// cancellation tests.
pub struct BlockingScript;

#[async_trait]
impl ScriptService for BlockingScript {
    async fn generate_outline(
        &self,
        _idea: &str,
        _style: &StyleContext,
        _context: &[String],
        cancel: &CancellationToken,
    ) -> ServiceResult<String> {
        cancel.cancelled().await;
        Err(ServiceError::new("script", "aborted"))
    }

    async fn split_episodes(
        &self,
        _outline: &str,
        _style: &StyleContext,
        _count: usize,
        cancel: &CancellationToken,
    ) -> ServiceResult<Vec<EpisodeBeat>> {
        cancel.cancelled().await;
        Err(ServiceError::new("script", "aborted"))
    }

    async fn write_episode_script(
        &self,
        _beat: &EpisodeBeat,
        _context: &[String],
        _style: &StyleContext,
        cancel: &CancellationToken,
    ) -> ServiceResult<String> {
        cancel.cancelled().await;
        Err(ServiceError::new("script", "aborted"))
    }

    async fn plan_shots(
        &self,
        _script: &str,
        _style: &StyleContext,
        cancel: &CancellationToken,
    ) -> ServiceResult<Vec<Shot>> {
        cancel.cancelled().await;
        Err(ServiceError::new("script", "aborted"))
    }

    async fn analyze(
        &self,
        _source: &str,
        _context: &[String],
        cancel: &CancellationToken,
    ) -> ServiceResult<AnalysisReport> {
        cancel.cancelled().await;
        Err(ServiceError::new("script", "aborted"))
    }
}

pub struct StubImage;

#[async_trait]
impl ImageService for StubImage {
    async fn generate_panels(
        &self,
        prompt: &str,
        _style: &StyleContext,
        count: usize,
        _cancel: &CancellationToken,
    ) -> ServiceResult<Vec<ImageAsset>> {
        Ok((1..=count)
            .map(|i| ImageAsset::inline(format!("panel-{i}"), format!("png:{prompt}:{i}")))
            .collect())
    }
}

/// Video provider that succeeds immediately, reporting staged progress.
pub struct StubVideo;

#[async_trait]
impl VideoService for StubVideo {
    async fn submit(
        &self,
        request: VideoRequest,
        progress: ProgressFn,
        _cancel: &CancellationToken,
    ) -> ServiceResult<VideoArtifact> {
        progress(0);
        progress(50);
        progress(100);
        Ok(VideoArtifact {
            job_id: "job-0001".into(),
            url: "https://cdn.example/clip.mp4".into(),
            duration_seconds: request.total_duration,
        })
    }
}

/// Video provider that always fails with the given message.
pub struct FailingVideo(pub &'static str);

#[async_trait]
impl VideoService for FailingVideo {
    async fn submit(
        &self,
        _request: VideoRequest,
        _progress: ProgressFn,
        _cancel: &CancellationToken,
    ) -> ServiceResult<VideoArtifact> {
        Err(ServiceError::new("video", self.0))
    }
}

/// Video provider that parks until the token trips, then reports an abort.
pub struct BlockingVideo;

#[async_trait]
impl VideoService for BlockingVideo {
    async fn submit(
        &self,
        _request: VideoRequest,
        _progress: ProgressFn,
        cancel: &CancellationToken,
    ) -> ServiceResult<VideoArtifact> {
        cancel.cancelled().await;
        Err(ServiceError::new("video", "aborted by user"))
    }
}

pub struct StubAudio;

#[async_trait]
impl AudioService for StubAudio {
    async fn synthesize(
        &self,
        _script: &str,
        voice: &str,
        _cancel: &CancellationToken,
    ) -> ServiceResult<AudioArtifact> {
        Ok(AudioArtifact {
            url: "https://cdn.example/narration.mp3".into(),
            duration_seconds: 12.5,
            voice: voice.to_string(),
        })
    }
}

pub struct StubPrompts;

#[async_trait]
impl PromptBuilder for StubPrompts {
    async fn build_batch_prompt(
        &self,
        shots: &[Shot],
        style: &StyleContext,
    ) -> ServiceResult<String> {
        Ok(format!("{} shots in {}", shots.len(), style.visual_style))
    }
}

pub struct StubFuser;

#[async_trait]
impl ImageFuser for StubFuser {
    async fn fuse(&self, references: &[ImageAsset]) -> ServiceResult<ImageAsset> {
        Ok(ImageAsset::inline(
            "composite",
            format!("fused:{}", references.len()),
        ))
    }
}

pub struct StubStore;

#[async_trait]
impl AssetStore for StubStore {
    async fn upload(&self, asset: &ImageAsset) -> ServiceResult<String> {
        Ok(format!("https://assets.example/{}", asset.label))
    }
}

/// In-memory output cache.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<(NodeId, NodeKind), serde_json::Value>>,
}

impl MemoryCache {
    pub fn seeded(node: NodeId, kind: NodeKind, value: serde_json::Value) -> Self {
        let cache = Self::default();
        cache.entries.lock().insert((node, kind), value);
        cache
    }
}

#[async_trait]
impl OutputCache for MemoryCache {
    async fn check(
        &self,
        node: &NodeId,
        kind: NodeKind,
    ) -> ServiceResult<Option<serde_json::Value>> {
        Ok(self.entries.lock().get(&(node.clone(), kind)).cloned())
    }

    async fn save(
        &self,
        node: &NodeId,
        kind: NodeKind,
        output: &serde_json::Value,
    ) -> ServiceResult<()> {
        self.entries
            .lock()
            .insert((node.clone(), kind), output.clone());
        Ok(())
    }
}

/// History checkpoint that counts invocations.
#[derive(Default)]
pub struct RecordingHistory {
    pub checkpoints: AtomicUsize,
}

impl RecordingHistory {
    pub fn count(&self) -> usize {
        self.checkpoints.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HistoryWriter for RecordingHistory {
    async fn save_history(&self) -> ServiceResult<()> {
        self.checkpoints.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Happy-path bundle around the default stubs.
pub fn base_services() -> Services {
    Services::new(
        Arc::new(StubScript::default()),
        Arc::new(StubImage),
        Arc::new(StubVideo),
        Arc::new(StubAudio),
        Arc::new(StubPrompts),
        Arc::new(StubFuser),
        Arc::new(RecordingHistory::default()),
    )
}
