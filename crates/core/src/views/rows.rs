use std::collections::HashMap;

use tracelens_protocol::{
    ObservationLevel, ObservationType, Point, Rect, RenderCommand, Score, SharedStr, TextAlign,
    ThemeToken, format_cost, format_latency, format_tokens,
};

use crate::config::{DisplayToggles, ViewMode};
use crate::model::{NodeIdx, ObservationTree, ScoreIndex, Selection};

use super::flatten::{FlatRow, RowKind};
use super::timeline;

/// Indentation per depth level.
pub const INDENT: f64 = 2.0;
const GAP: f64 = 1.0;

/// Everything besides the row itself that a row renderer reads.
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'a> {
    pub tree: &'a ObservationTree,
    pub scores: &'a ScoreIndex,
    pub comment_counts: &'a HashMap<SharedStr, u32>,
    pub selection: &'a Selection,
    pub toggles: DisplayToggles,
    pub view_mode: ViewMode,
    pub width: f64,
    pub row_height: f64,
}

impl RowContext<'_> {
    pub fn is_selected(&self, row: &FlatRow) -> bool {
        match (self.selection, row.kind) {
            (Selection::Trace, RowKind::Trace) => true,
            (Selection::Observation(id), RowKind::Observation(_)) => *id == row.id,
            _ => false,
        }
    }

    fn comment_count(&self, id: &str) -> u32 {
        self.comment_counts.get(id).copied().unwrap_or(0)
    }
}

/// Render any row according to the view mode. Commands are relative to the
/// row's top-left corner; x units are character cells.
pub fn render_row(ctx: &RowContext<'_>, row: &FlatRow) -> Vec<RenderCommand> {
    match (ctx.view_mode, row.kind) {
        (ViewMode::Timeline, _) => timeline::render_timeline_row(ctx, row),
        (ViewMode::Tree, RowKind::Trace) => render_trace_row(ctx, row),
        (ViewMode::Tree, RowKind::Observation(idx)) => render_observation_row(ctx, row, idx),
    }
}

/// The root row: trace name, end-to-end latency, aggregate cost, trace-level
/// scores and comments.
pub fn render_trace_row(ctx: &RowContext<'_>, row: &FlatRow) -> Vec<RenderCommand> {
    let trace = ctx.tree.trace();
    let mut line = RowLine::new(ctx, row);

    line.text("TRACE", ThemeToken::TextMuted);
    line.text(trace.display_name(), ThemeToken::TextPrimary);

    if ctx.toggles.show_metrics {
        if let Some(latency) = trace.latency {
            line.text(&format_latency(latency), ThemeToken::TextSecondary);
        }
        if let Some(cost) = trace_cost(ctx.tree) {
            line.text(&format_cost(cost), ThemeToken::TextSecondary);
        }
    }
    if ctx.toggles.show_scores {
        line.scores(ctx.scores.for_trace());
    }
    if ctx.toggles.show_comments {
        line.comments(ctx.comment_count(&trace.id));
    }
    line.finish()
}

/// One observation: indentation, collapse marker, type badge, name, level,
/// metrics, scores and comments.
pub fn render_observation_row(
    ctx: &RowContext<'_>,
    row: &FlatRow,
    idx: NodeIdx,
) -> Vec<RenderCommand> {
    let node = ctx.tree.node(idx);
    let observation = &node.observation;
    let mut line = RowLine::new(ctx, row);

    line.text(
        observation.observation_type.badge(),
        type_token(observation.observation_type),
    );
    line.text(observation.display_name(), ThemeToken::TextPrimary);
    if let Some(token) = level_token(observation.level) {
        line.text(&observation.level.to_string(), token);
    }

    if ctx.toggles.show_metrics {
        let trace = ctx.tree.trace();
        if let Some(latency) = observation.latency() {
            let color = metric_token(ctx.toggles, latency, trace.latency);
            line.text(&format_latency(latency), color);
        }
        // Parents show what their whole subtree cost.
        let cost = if node.children.is_empty() {
            observation.cost()
        } else {
            node.subtree_cost
        };
        if let Some(cost) = cost {
            let color = metric_token(ctx.toggles, cost, trace_cost(ctx.tree));
            line.text(&format_cost(cost), color);
        }
        if observation.observation_type.is_generation_like()
            && let Some(tokens) = observation.usage.total_tokens()
        {
            line.text(
                &format!("{} tok", format_tokens(tokens)),
                ThemeToken::TextSecondary,
            );
        }
    }
    if ctx.toggles.show_scores {
        line.scores(ctx.scores.for_observation(&observation.id));
    }
    if ctx.toggles.show_comments {
        line.comments(ctx.comment_count(&observation.id));
    }
    line.finish()
}

/// Trace cost as reported, else the sum over top-level subtrees.
pub fn trace_cost(tree: &ObservationTree) -> Option<f64> {
    tree.trace().total_cost.or_else(|| {
        tree.roots()
            .iter()
            .filter_map(|&r| tree.node(r).subtree_cost)
            .reduce(|a, b| a + b)
    })
}

pub fn type_token(kind: ObservationType) -> ThemeToken {
    match kind {
        ObservationType::Generation | ObservationType::Embedding => ThemeToken::GenerationBar,
        ObservationType::Event => ThemeToken::EventMarker,
        ObservationType::Agent | ObservationType::Chain => ThemeToken::AgentBar,
        ObservationType::Tool | ObservationType::Retriever => ThemeToken::ToolBar,
        ObservationType::Span | ObservationType::Evaluator | ObservationType::Guardrail => {
            ThemeToken::SpanBar
        }
    }
}

fn level_token(level: ObservationLevel) -> Option<ThemeToken> {
    match level {
        ObservationLevel::Warning => Some(ThemeToken::LevelWarning),
        ObservationLevel::Error => Some(ThemeToken::LevelError),
        ObservationLevel::Debug => Some(ThemeToken::LevelDebug),
        ObservationLevel::Default => None,
    }
}

/// Color for a metric given the trace-wide total it is a share of.
pub fn metric_token(toggles: DisplayToggles, value: f64, total: Option<f64>) -> ThemeToken {
    if !toggles.color_code_metrics {
        return ThemeToken::TextSecondary;
    }
    match total {
        Some(total) if total > 0.0 => {
            let share = value / total;
            if share >= 0.75 {
                ThemeToken::MetricHigh
            } else if share >= 0.25 {
                ThemeToken::MetricMid
            } else {
                ThemeToken::MetricLow
            }
        }
        _ => ThemeToken::TextSecondary,
    }
}

/// Left-to-right text layout for one row.
pub(crate) struct RowLine {
    commands: Vec<RenderCommand>,
    x: f64,
    width: f64,
}

impl RowLine {
    pub(crate) fn new(ctx: &RowContext<'_>, row: &FlatRow) -> Self {
        let mut commands = Vec::with_capacity(12);
        if ctx.is_selected(row) {
            commands.push(RenderCommand::DrawRect {
                rect: Rect::new(0.0, 0.0, ctx.width, ctx.row_height),
                color: ThemeToken::SelectionHighlight,
                border_color: None,
                label: None,
                node_id: Some(row.id.clone()),
            });
        }
        let mut line = Self {
            commands,
            x: f64::from(row.depth.saturating_sub(1)) * INDENT,
            width: ctx.width,
        };
        if matches!(row.kind, RowKind::Observation(_)) {
            let marker = match (row.has_children, row.collapsed) {
                (false, _) => " ",
                (true, false) => "▾",
                (true, true) => "▸",
            };
            line.text(marker, ThemeToken::TreeGuide);
        }
        line
    }

    /// Stop laying out text past `width`.
    pub(crate) fn clip_at(&mut self, width: f64) {
        self.width = width;
    }

    pub(crate) fn text(&mut self, text: &str, color: ThemeToken) {
        if self.x >= self.width {
            return;
        }
        self.commands.push(RenderCommand::DrawText {
            position: Point::new(self.x, 0.0),
            text: text.into(),
            color,
            align: TextAlign::Left,
        });
        self.x += text.chars().count() as f64 + GAP;
    }

    fn scores(&mut self, scores: &[Score]) {
        for score in scores {
            self.text(&score.label(), ThemeToken::ScoreBadge);
        }
    }

    fn comments(&mut self, count: u32) {
        if count > 0 {
            self.text(&format!("✉ {count}"), ThemeToken::CommentBadge);
        }
    }

    pub(crate) fn push(&mut self, command: RenderCommand) {
        self.commands.push(command);
    }

    pub(crate) fn finish(self) -> Vec<RenderCommand> {
        self.commands
    }
}
