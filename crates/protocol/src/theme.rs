use serde::{Deserialize, Serialize};

/// Semantic color tokens resolved by the renderer's active theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThemeToken {
    TextPrimary,
    TextSecondary,
    TextMuted,

    SelectionHighlight,
    TreeGuide,
    Background,

    // Observation type badges and timeline bars
    SpanBar,
    GenerationBar,
    EventMarker,
    AgentBar,
    ToolBar,

    // Severity
    LevelDebug,
    LevelWarning,
    LevelError,

    // Color-coded metrics (share of trace total)
    MetricLow,
    MetricMid,
    MetricHigh,

    ScoreBadge,
    CommentBadge,
}
