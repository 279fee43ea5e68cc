//! External collaborator contracts.
//!
//! The engine's boundary: narrow async traits for the generation services
//! (text, image, video, audio, prompt construction, image fusion), the
//! optional asset store and output cache, and the history checkpoint. The
//! bodies of these calls (network protocols, file formats, provider quirks)
//! are not part of this crate; tests supply stubs.
//!
//! Long-running calls receive the node's [`CancellationToken`] and are
//! expected to return promptly once it trips; the kind handler then reports
//! the abort as a controlled reset. Providers report progress as 0–100
//! through the supplied [`ProgressFn`]; the engine rescales it onto the
//! visible band.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::artifacts::{
    AnalysisReport, AudioArtifact, EpisodeBeat, ImageAsset, Shot, VideoArtifact,
};
use crate::types::{NodeId, NodeKind, StyleContext};

/// Failure from any collaborator, carrying the provider's raw message.
#[derive(Debug, Clone, Error)]
#[error("provider error ({provider}): {message}")]
pub struct ServiceError {
    pub provider: &'static str,
    pub message: String,
}

impl ServiceError {
    pub fn new(provider: &'static str, message: impl Into<String>) -> Self {
        Self {
            provider,
            message: message.into(),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Callback for provider-reported progress, 0–100.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Language-model collaborator for all script-side generation.
#[async_trait]
pub trait ScriptService: Send + Sync {
    async fn generate_outline(
        &self,
        idea: &str,
        style: &StyleContext,
        context: &[String],
        cancel: &CancellationToken,
    ) -> ServiceResult<String>;

    async fn split_episodes(
        &self,
        outline: &str,
        style: &StyleContext,
        count: usize,
        cancel: &CancellationToken,
    ) -> ServiceResult<Vec<EpisodeBeat>>;

    async fn write_episode_script(
        &self,
        beat: &EpisodeBeat,
        context: &[String],
        style: &StyleContext,
        cancel: &CancellationToken,
    ) -> ServiceResult<String>;

    async fn plan_shots(
        &self,
        script: &str,
        style: &StyleContext,
        cancel: &CancellationToken,
    ) -> ServiceResult<Vec<Shot>>;

    async fn analyze(
        &self,
        source: &str,
        context: &[String],
        cancel: &CancellationToken,
    ) -> ServiceResult<AnalysisReport>;
}

/// Storyboard panel image generator.
#[async_trait]
pub trait ImageService: Send + Sync {
    async fn generate_panels(
        &self,
        prompt: &str,
        style: &StyleContext,
        count: usize,
        cancel: &CancellationToken,
    ) -> ServiceResult<Vec<ImageAsset>>;
}

/// Submission parameters for one video generation job.
#[derive(Clone, Debug)]
pub struct VideoRequest {
    pub prompt: String,
    pub reference: Option<ImageAsset>,
    pub total_duration: f64,
    pub style: StyleContext,
}

/// Video generation provider. Remote job polling, where needed, is the
/// provider's concern; the engine only awaits the terminal result.
#[async_trait]
pub trait VideoService: Send + Sync {
    async fn submit(
        &self,
        request: VideoRequest,
        progress: ProgressFn,
        cancel: &CancellationToken,
    ) -> ServiceResult<VideoArtifact>;
}

/// Narration synthesis provider.
#[async_trait]
pub trait AudioService: Send + Sync {
    async fn synthesize(
        &self,
        script: &str,
        voice: &str,
        cancel: &CancellationToken,
    ) -> ServiceResult<AudioArtifact>;
}

/// Builds the natural-language generation prompt for a batch of shots.
#[async_trait]
pub trait PromptBuilder: Send + Sync {
    async fn build_batch_prompt(
        &self,
        shots: &[Shot],
        style: &StyleContext,
    ) -> ServiceResult<String>;
}

/// Fuses several reference images into one composite.
#[async_trait]
pub trait ImageFuser: Send + Sync {
    async fn fuse(&self, references: &[ImageAsset]) -> ServiceResult<ImageAsset>;
}

/// Remote asset store. Optional: when absent, assets travel inline.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Upload the asset and return its remote URL.
    async fn upload(&self, asset: &ImageAsset) -> ServiceResult<String>;
}

/// Output cache keyed by node id and kind. Optional; both calls are
/// fire-and-forget side channels: failures are logged by the engine and
/// never surface as node errors.
#[async_trait]
pub trait OutputCache: Send + Sync {
    async fn check(&self, node: &NodeId, kind: NodeKind) -> ServiceResult<Option<serde_json::Value>>;
    async fn save(
        &self,
        node: &NodeId,
        kind: NodeKind,
        output: &serde_json::Value,
    ) -> ServiceResult<()>;
}

/// Undo-history checkpoint, invoked once immediately before any graph-growth
/// mutation so a whole fan-out is undoable as one unit.
#[async_trait]
pub trait HistoryWriter: Send + Sync {
    async fn save_history(&self) -> ServiceResult<()>;
}

/// The collaborator bundle handed to the engine.
#[derive(Clone)]
pub struct Services {
    pub script: Arc<dyn ScriptService>,
    pub image: Arc<dyn ImageService>,
    pub video: Arc<dyn VideoService>,
    pub audio: Arc<dyn AudioService>,
    pub prompts: Arc<dyn PromptBuilder>,
    pub fuser: Arc<dyn ImageFuser>,
    pub history: Arc<dyn HistoryWriter>,
    pub asset_store: Option<Arc<dyn AssetStore>>,
    pub cache: Option<Arc<dyn OutputCache>>,
}

impl Services {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        script: Arc<dyn ScriptService>,
        image: Arc<dyn ImageService>,
        video: Arc<dyn VideoService>,
        audio: Arc<dyn AudioService>,
        prompts: Arc<dyn PromptBuilder>,
        fuser: Arc<dyn ImageFuser>,
        history: Arc<dyn HistoryWriter>,
    ) -> Self {
        Self {
            script,
            image,
            video,
            audio,
            prompts,
            fuser,
            history,
            asset_store: None,
            cache: None,
        }
    }

    #[must_use]
    pub fn with_asset_store(mut self, store: Arc<dyn AssetStore>) -> Self {
        self.asset_store = Some(store);
        self
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn OutputCache>) -> Self {
        self.cache = Some(cache);
        self
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("asset_store", &self.asset_store.is_some())
            .field("cache", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}
