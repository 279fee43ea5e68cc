//! Domain value objects exchanged between node payloads and collaborators.
//!
//! Everything here is plain serializable data: episode beats from the
//! splitter, timed shots from the shot planner, and the image/video/audio
//! artifacts returned by generation collaborators. The engine owns no wire
//! format; these types are what crosses the collaborator boundary.

use serde::{Deserialize, Serialize};

use crate::grouping::Timed;

/// One episode beat produced by splitting a planner outline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeBeat {
    /// 1-based position within the season/outline.
    pub index: usize,
    pub title: String,
    pub summary: String,
}

impl EpisodeBeat {
    pub fn new(index: usize, title: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            index,
            title: title.into(),
            summary: summary.into(),
        }
    }
}

/// A single timed shot planned from an episode script.
///
/// Shots are the work items fed to
/// [`group_by_duration`](crate::grouping::group_by_duration); their order is
/// narrative order and must survive batching.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Shot {
    /// 1-based position within the episode.
    pub index: usize,
    pub description: String,
    pub duration_seconds: f64,
    /// Optional reference image attached by the user or an upstream board.
    pub reference: Option<ImageAsset>,
}

impl Shot {
    pub fn new(index: usize, description: impl Into<String>, duration_seconds: f64) -> Self {
        Self {
            index,
            description: description.into(),
            duration_seconds,
            reference: None,
        }
    }

    #[must_use]
    pub fn with_reference(mut self, reference: ImageAsset) -> Self {
        self.reference = Some(reference);
        self
    }
}

impl Timed for Shot {
    fn duration(&self) -> f64 {
        self.duration_seconds
    }
}

/// An image artifact, either remotely addressable or embedded inline.
///
/// `remote_url` is filled by the asset-upload collaborator when a remote
/// store is configured; otherwise the asset travels as `inline_data`
/// (base64). Both may be present after an upload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub label: String,
    pub remote_url: Option<String>,
    pub inline_data: Option<String>,
}

impl ImageAsset {
    /// An asset already hosted remotely.
    pub fn remote(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            remote_url: Some(url.into()),
            inline_data: None,
        }
    }

    /// An asset embedded inline (no remote store configured).
    pub fn inline(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            remote_url: None,
            inline_data: Some(data.into()),
        }
    }

    /// Returns `true` once the asset is addressable without inline payload.
    #[must_use]
    pub fn is_uploaded(&self) -> bool {
        self.remote_url.is_some()
    }
}

/// A generated video clip returned by the video provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoArtifact {
    /// Provider-side job id, kept for re-download and support inquiries.
    pub job_id: String,
    pub url: String,
    pub duration_seconds: f64,
}

/// A synthesized narration track.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AudioArtifact {
    pub url: String,
    pub duration_seconds: f64,
    pub voice: String,
}

/// One named finding produced by an analyzer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisField {
    pub name: String,
    pub value: String,
}

/// Structured analyzer output. Only fields whose names the user flagged for
/// propagation contribute to downstream context.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub fields: Vec<AnalysisField>,
}

impl AnalysisReport {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}
