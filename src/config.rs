//! Engine configuration.
//!
//! Defaults suit the reference editor; hosts can override programmatically
//! via the `with_*` builders or from the environment via
//! [`EngineConfig::from_env`] (a `.env` file is honored through `dotenvy`).

use crate::types::Size;

/// Layout constants for spawned children. Purely cosmetic.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutConfig {
    /// Offset from the parent's position to the first child.
    pub child_offset: (f64, f64),
    /// Vertical gap between stacked siblings.
    pub sibling_gap: f64,
    /// Padding applied around spawned children when bounding them in a group.
    pub group_padding: f64,
    /// Extent assumed for nodes without an explicit size.
    pub default_node_size: Size,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            child_offset: (380.0, 0.0),
            sibling_gap: 150.0,
            group_padding: 48.0,
            default_node_size: Size::new(320.0, 120.0),
        }
    }
}

/// Tunables for the execution engine.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Duration bound for one generation batch, in seconds.
    pub max_group_seconds: f64,
    /// Lower edge of the visible progress band reserved for provider
    /// progress; fusion and upload report below this floor.
    pub generation_progress_floor: u8,
    pub layout: LayoutConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_group_seconds: 30.0,
            generation_progress_floor: 30,
            layout: LayoutConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `STORYLOOM_MAX_GROUP_SECONDS` and
    /// `STORYLOOM_PROGRESS_FLOOR` when present and parseable.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        if let Ok(raw) = std::env::var("STORYLOOM_MAX_GROUP_SECONDS")
            && let Ok(seconds) = raw.parse::<f64>()
            && seconds > 0.0
        {
            config.max_group_seconds = seconds;
        }
        if let Ok(raw) = std::env::var("STORYLOOM_PROGRESS_FLOOR")
            && let Ok(floor) = raw.parse::<u8>()
            && floor < 100
        {
            config.generation_progress_floor = floor;
        }
        config
    }

    #[must_use]
    pub fn with_max_group_seconds(mut self, seconds: f64) -> Self {
        self.max_group_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_progress_floor(mut self, floor: u8) -> Self {
        self.generation_progress_floor = floor.min(99);
        self
    }

    #[must_use]
    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_floor_is_clamped_below_hundred() {
        let config = EngineConfig::default().with_progress_floor(150);
        assert_eq!(config.generation_progress_floor, 99);
    }
}
