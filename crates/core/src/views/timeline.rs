use tracelens_protocol::{ObservationType, Rect, RenderCommand, ThemeToken, format_latency};
use tracing::debug;

use super::flatten::{FlatRow, RowKind};
use super::rows::{RowContext, RowLine, type_token};

/// Share of the row width given to the label column.
pub const LABEL_SHARE: f64 = 0.4;
/// Narrowest bar drawn for a short but non-zero observation.
const MIN_BAR: f64 = 1.0;

/// Render one row in timeline layout.
///
/// Renders nothing when the trace has no usable latency: without a span
/// there is no axis to place bars on.
pub fn render_timeline_row(ctx: &RowContext<'_>, row: &FlatRow) -> Vec<RenderCommand> {
    let Some(span) = ctx.tree.trace().timeline_span() else {
        debug!(row = %row.id, "trace has no latency, skipping timeline row");
        return Vec::new();
    };

    let label_width = (ctx.width * LABEL_SHARE).floor();
    let bar_width = ctx.width - label_width;
    let mut line = RowLine::new(ctx, row);
    line.clip_at(label_width);

    let (color, is_event, caption) = match row.kind {
        RowKind::Trace => {
            let trace = ctx.tree.trace();
            line.text(trace.display_name(), ThemeToken::TextPrimary);
            (ThemeToken::SpanBar, false, format_latency(span))
        }
        RowKind::Observation(idx) => {
            let observation = &ctx.tree.node(idx).observation;
            let kind = observation.observation_type;
            line.text(kind.badge(), type_token(kind));
            line.text(observation.display_name(), ThemeToken::TextPrimary);
            let mut caption = observation.latency().map(format_latency).unwrap_or_default();
            if kind.is_generation_like()
                && let Some(ttft) = observation.time_to_first_token()
            {
                caption = format!("{caption} (ttft {})", format_latency(ttft));
            }
            (type_token(kind), kind == ObservationType::Event, caption)
        }
    };

    if bar_width <= 0.0 {
        return line.finish();
    }

    let start = (row.timeline.start / span).clamp(0.0, 1.0);
    let x = label_width + start * bar_width;
    let right = label_width + bar_width;
    let (w, border) = match row.timeline.duration {
        _ if is_event => (MIN_BAR, None),
        Some(duration) => ((duration / span * bar_width).max(MIN_BAR), None),
        // Still running: open-ended to the end of the axis.
        None => (right - x, Some(ThemeToken::TextMuted)),
    };
    let w = w.min(right - x).max(0.0);

    line.push(RenderCommand::DrawRect {
        rect: Rect::new(x, 0.0, w, ctx.row_height),
        color,
        border_color: border,
        label: (ctx.toggles.show_metrics && !caption.is_empty()).then(|| caption.into()),
        node_id: Some(row.id.clone()),
    });
    line.finish()
}
