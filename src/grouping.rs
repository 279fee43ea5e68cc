//! Duration-bounded batching of ordered work items.
//!
//! [`group_by_duration`] partitions an ordered sequence of timed items into
//! [`TaskGroup`]s whose summed duration stays within a caller-supplied bound,
//! while preserving item order. Shots must render in original sequence for
//! narrative continuity, so this is a single greedy left-to-right pass. It is
//! not optimal bin-packing, deliberately: no look-ahead, no reordering.
//!
//! # Examples
//!
//! ```rust
//! use storyloom::artifacts::Shot;
//! use storyloom::grouping::group_by_duration;
//!
//! let shots = vec![
//!     Shot::new(1, "wide establishing", 4.0),
//!     Shot::new(2, "close-up", 4.0),
//!     Shot::new(3, "reaction", 4.0),
//! ];
//! let groups = group_by_duration(shots, 10.0);
//! assert_eq!(groups.len(), 2);
//! assert_eq!(groups[0].items.len(), 2);
//! assert_eq!(groups[1].items.len(), 1);
//! ```

use serde::{Deserialize, Serialize};

use crate::artifacts::ImageAsset;

/// An ordered work item with a duration, eligible for batching.
pub trait Timed {
    fn duration(&self) -> f64;
}

/// Generation stage of one batch, written by later pipeline steps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupStage {
    #[default]
    Idle,
    PromptReady,
    ImageFused,
    Uploading,
    Generating,
    Completed,
    Failed,
}

/// An ordered, duration-bounded batch of work items destined for one
/// downstream generation call.
///
/// Created fresh on each plan step of a generator node and owned exclusively
/// by that node's payload. The ephemeral fields (`prompt`, `reference`,
/// `remote_job_id`, `progress`, `error`) are written by later pipeline steps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskGroup<T> {
    pub items: Vec<T>,
    pub total_duration: f64,
    /// 1-based position of this group within the plan.
    pub sequence_number: usize,
    pub stage: GroupStage,
    pub prompt: Option<String>,
    pub reference: Option<ImageAsset>,
    pub remote_job_id: Option<String>,
    pub progress: u8,
    pub error: Option<String>,
}

impl<T> TaskGroup<T> {
    fn sealed(items: Vec<T>, total_duration: f64, sequence_number: usize) -> Self {
        Self {
            items,
            total_duration,
            sequence_number,
            stage: GroupStage::Idle,
            prompt: None,
            reference: None,
            remote_job_id: None,
            progress: 0,
            error: None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Partition `items` into duration-bounded groups, preserving order.
///
/// A group is closed only when it is non-empty and admitting the next item
/// would exceed `max_duration`; the item then opens the next group. A single
/// item whose own duration exceeds the bound is therefore placed alone in an
/// over-limit group rather than dropped or split; an accepted edge case,
/// not an error.
///
/// Linear-time and deterministic: the same input always yields the same
/// partition, and concatenating the output groups reproduces the input
/// sequence exactly.
///
/// ```rust
/// use storyloom::artifacts::Shot;
/// use storyloom::grouping::group_by_duration;
///
/// // An over-limit singleton stays whole.
/// let groups = group_by_duration(vec![Shot::new(1, "oner", 12.0)], 10.0);
/// assert_eq!(groups.len(), 1);
/// assert_eq!(groups[0].total_duration, 12.0);
/// ```
pub fn group_by_duration<T: Timed>(items: Vec<T>, max_duration: f64) -> Vec<TaskGroup<T>> {
    let mut groups: Vec<TaskGroup<T>> = Vec::new();
    let mut current: Vec<T> = Vec::new();
    let mut total = 0.0_f64;

    for item in items {
        let duration = item.duration();
        if !current.is_empty() && total + duration > max_duration {
            let sequence = groups.len() + 1;
            groups.push(TaskGroup::sealed(std::mem::take(&mut current), total, sequence));
            total = 0.0;
        }
        total += duration;
        current.push(item);
    }
    if !current.is_empty() {
        let sequence = groups.len() + 1;
        groups.push(TaskGroup::sealed(current, total, sequence));
    }
    groups
}
