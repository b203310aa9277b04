use std::ops::Range;

use super::window::VirtualWindow;

/// Whether the row list is windowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Every flattened row is rendered.
    Plain,
    /// Only the rows near the viewport are rendered.
    Windowed,
}

/// Windowing kicks in strictly above `threshold` nodes.
///
/// `node_count` is the full observation count, independent of collapse and
/// filter state, so toggling a node never flips the mode. It is recomputed
/// on every render with no hysteresis.
pub fn select_mode(node_count: usize, threshold: usize) -> RenderMode {
    if node_count > threshold {
        RenderMode::Windowed
    } else {
        RenderMode::Plain
    }
}

/// The rows one render pass instantiates.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderPlan {
    Plain { range: Range<usize> },
    Windowed(VirtualWindow),
}

impl RenderPlan {
    pub fn mode(&self) -> RenderMode {
        match self {
            Self::Plain { .. } => RenderMode::Plain,
            Self::Windowed(_) => RenderMode::Windowed,
        }
    }

    pub fn range(&self) -> Range<usize> {
        match self {
            Self::Plain { range } => range.clone(),
            Self::Windowed(window) => window.range.clone(),
        }
    }
}
