use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_VIRTUALIZATION_THRESHOLD: usize = 300;
pub const DEFAULT_OVERSCAN: usize = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("estimatedRowHeight must be a positive number, got {0}")]
    RowHeight(f64),
}

/// How rows are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Indented tree with metrics.
    #[default]
    Tree,
    /// Indented tree with a timing bar per row.
    Timeline,
}

impl ViewMode {
    /// Row height estimate used when the config does not set one.
    pub fn default_row_height(self) -> f64 {
        match self {
            Self::Tree => 50.0,
            Self::Timeline => 60.0,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Tree => Self::Timeline,
            Self::Timeline => Self::Tree,
        }
    }
}

/// What each row shows besides its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisplayToggles {
    pub show_metrics: bool,
    pub show_scores: bool,
    pub show_comments: bool,
    /// Color latency and cost by their share of the trace total.
    pub color_code_metrics: bool,
}

impl Default for DisplayToggles {
    fn default() -> Self {
        Self {
            show_metrics: true,
            show_scores: true,
            show_comments: true,
            color_code_metrics: false,
        }
    }
}

/// Tree view options. Every key is optional in the JSON form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ViewConfig {
    /// Node count above which rows are windowed instead of all rendered.
    pub virtualization_threshold: usize,
    /// Extra rows rendered on each side of the visible range.
    pub overscan_count: usize,
    /// Fixed row height; `None` picks the view mode's default.
    pub estimated_row_height: Option<f64>,
    pub view_mode: ViewMode,
    pub toggles: DisplayToggles,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            virtualization_threshold: DEFAULT_VIRTUALIZATION_THRESHOLD,
            overscan_count: DEFAULT_OVERSCAN,
            estimated_row_height: None,
            view_mode: ViewMode::default(),
            toggles: DisplayToggles::default(),
        }
    }
}

impl ViewConfig {
    pub fn from_json(data: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_slice(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.estimated_row_height {
            Some(h) if !(h.is_finite() && h > 0.0) => Err(ConfigError::RowHeight(h)),
            _ => Ok(()),
        }
    }

    pub fn row_height(&self) -> f64 {
        self.estimated_row_height
            .unwrap_or_else(|| self.view_mode.default_row_height())
    }
}
