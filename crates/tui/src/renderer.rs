use std::io::stdout;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind, MouseButton,
        MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Borders},
};
use tracelens_core::RenderOutput;
use tracelens_core::views::RenderMode;
use tracelens_protocol::{Point, RenderCommand, TextAlign, ThemeToken, format_cost, format_latency};

use crate::app::App;

fn theme_to_color(token: ThemeToken) -> Color {
    match token {
        ThemeToken::TextPrimary => Color::White,
        ThemeToken::TextSecondary => Color::Gray,
        ThemeToken::TextMuted => Color::DarkGray,
        ThemeToken::SelectionHighlight => Color::Rgb(40, 60, 90),
        ThemeToken::TreeGuide => Color::DarkGray,
        ThemeToken::Background => Color::Black,
        ThemeToken::SpanBar => Color::Rgb(90, 130, 200),
        ThemeToken::GenerationBar => Color::Rgb(160, 110, 220),
        ThemeToken::EventMarker => Color::Rgb(230, 180, 60),
        ThemeToken::AgentBar => Color::Rgb(60, 170, 160),
        ThemeToken::ToolBar => Color::Rgb(200, 120, 80),
        ThemeToken::LevelDebug => Color::DarkGray,
        ThemeToken::LevelWarning => Color::Yellow,
        ThemeToken::LevelError => Color::Red,
        ThemeToken::MetricLow => Color::Green,
        ThemeToken::MetricMid => Color::Yellow,
        ThemeToken::MetricHigh => Color::LightRed,
        ThemeToken::ScoreBadge => Color::Cyan,
        ThemeToken::CommentBadge => Color::LightBlue,
    }
}

/// Replay a command list into `buf`, one abstract unit per cell.
pub fn paint(buf: &mut Buffer, area: Rect, commands: &[RenderCommand]) {
    let mut offsets: Vec<Point> = Vec::new();
    let mut offset = Point::new(0.0, 0.0);
    let mut clip: Option<(f64, f64, f64, f64)> = None;

    let visible = |x: f64, y: f64, clip: Option<(f64, f64, f64, f64)>| {
        let in_clip = clip.is_none_or(|(cx, cy, cw, ch)| {
            x >= cx && x < cx + cw && y >= cy && y < cy + ch
        });
        in_clip && x >= 0.0 && y >= 0.0 && x < f64::from(area.width) && y < f64::from(area.height)
    };

    for cmd in commands {
        match cmd {
            RenderCommand::PushTransform { translate } => {
                offsets.push(offset);
                offset = Point::new(offset.x + translate.x, offset.y + translate.y);
            }
            RenderCommand::PopTransform => {
                offset = offsets.pop().unwrap_or(Point::new(0.0, 0.0));
            }
            RenderCommand::SetClip { rect } => {
                clip = Some((rect.x + offset.x, rect.y + offset.y, rect.w, rect.h));
            }
            RenderCommand::ClearClip => clip = None,
            RenderCommand::DrawRect {
                rect,
                color,
                border_color,
                label,
                ..
            } => {
                let y = (rect.y + offset.y).floor();
                let x0 = (rect.x + offset.x).floor();
                let width = rect.w.round().max(1.0) as usize;
                let bg = theme_to_color(*color);
                let label: Vec<char> = label.as_deref().unwrap_or("").chars().collect();
                for i in 0..width {
                    let x = x0 + i as f64;
                    if !visible(x, y, clip) {
                        continue;
                    }
                    let cell = &mut buf[(area.x + x as u16, area.y + y as u16)];
                    cell.set_bg(bg);
                    if let Some(ch) = label.get(i) {
                        cell.set_char(*ch).set_fg(Color::Black);
                    } else if border_color.is_some() {
                        cell.set_char('░').set_fg(Color::Black);
                    } else if !label.is_empty() {
                        cell.set_char(' ');
                    }
                }
            }
            RenderCommand::DrawText {
                position,
                text,
                color,
                align,
            } => {
                let chars: Vec<char> = text.chars().collect();
                let len = chars.len() as f64;
                let start = match align {
                    TextAlign::Left => position.x,
                    TextAlign::Center => position.x - len / 2.0,
                    TextAlign::Right => position.x - len,
                };
                let y = (position.y + offset.y).floor();
                let x0 = (start + offset.x).floor();
                let fg = theme_to_color(*color);
                for (i, ch) in chars.into_iter().enumerate() {
                    let x = x0 + i as f64;
                    if visible(x, y, clip) {
                        buf[(area.x + x as u16, area.y + y as u16)]
                            .set_char(ch)
                            .set_fg(fg);
                    }
                }
            }
            RenderCommand::BeginGroup { .. } | RenderCommand::EndGroup => {}
        }
    }
}

fn header_text(app: &App) -> String {
    let trace = app.document.tree.trace();
    let mut parts = vec![format!(" tracelens — {}", trace.display_name())];
    if let Some(latency) = trace.latency {
        parts.push(format_latency(latency));
    }
    if let Some(cost) = trace.total_cost {
        parts.push(format_cost(cost));
    }
    parts.push(format!("{} observations", app.document.node_count()));
    parts.join(" | ")
}

pub fn status_text(app: &App, out: &RenderOutput) -> String {
    let mode = match out.mode {
        RenderMode::Plain => "plain",
        RenderMode::Windowed => "windowed",
    };
    let level = app
        .min_level
        .map_or_else(|| "all levels".to_string(), |l| format!(">= {l}"));
    let mut status = format!(
        " {mode} | rows {}..{} of {} | {level}",
        out.rendered_range.start, out.rendered_range.end, out.row_count
    );
    if out.hidden_count > 0 {
        status.push_str(&format!(" | {} hidden", out.hidden_count));
    }
    status.push_str(" | ↑↓ select ⏎ fold c/e all l level t view q quit ");
    status
}

pub fn render_tui(app: &mut App) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    while !app.quit {
        let term_size = terminal.size()?;
        let content = Rect::new(
            0,
            1,
            term_size.width,
            term_size.height.saturating_sub(2),
        );
        let out = app.render(content.width, content.height);
        let header = header_text(app);
        let status = status_text(app, &out);

        terminal.draw(|frame| {
            let area = frame.area();

            let header_block = Block::default()
                .title(header)
                .style(Style::default().fg(Color::White).bg(Color::DarkGray));
            frame.render_widget(header_block, Rect::new(0, 0, area.width, 1));

            let block = Block::default()
                .borders(Borders::NONE)
                .style(Style::default().bg(theme_to_color(ThemeToken::Background)));
            frame.render_widget(block, content);
            paint(frame.buffer_mut(), content, &out.commands);

            let status_block = Block::default()
                .title(status)
                .style(Style::default().fg(Color::White).bg(Color::DarkGray));
            frame.render_widget(
                status_block,
                Rect::new(0, area.height.saturating_sub(1), area.width, 1),
            );
        })?;

        if event::poll(Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => app.handle_key(key.code),
                Event::Mouse(mouse) => match mouse.kind {
                    MouseEventKind::ScrollDown => app.scroll(3.0),
                    MouseEventKind::ScrollUp => app.scroll(-3.0),
                    MouseEventKind::Down(MouseButton::Left)
                        if mouse.row >= content.y && mouse.row < content.y + content.height =>
                    {
                        app.click(mouse.row - content.y);
                    }
                    _ => {}
                },
                _ => {}
            }
        }
    }

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracelens_protocol::Rect as CmdRect;

    fn row(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width)
            .map(|x| buf[(x, y)].symbol().to_string())
            .collect::<String>()
    }

    #[test]
    fn paint_applies_transforms_and_clip() {
        let area = Rect::new(0, 0, 10, 3);
        let mut buf = Buffer::empty(area);
        let commands = vec![
            RenderCommand::PushTransform {
                translate: Point::new(0.0, -5.0),
            },
            RenderCommand::SetClip {
                rect: CmdRect::new(0.0, 5.0, 10.0, 2.0),
            },
            RenderCommand::PushTransform {
                translate: Point::new(0.0, 6.0),
            },
            RenderCommand::DrawText {
                position: Point::new(2.0, 0.0),
                text: "abc".into(),
                color: ThemeToken::TextPrimary,
                align: TextAlign::Left,
            },
            RenderCommand::PopTransform,
            RenderCommand::PushTransform {
                translate: Point::new(0.0, 7.0),
            },
            RenderCommand::DrawText {
                position: Point::new(0.0, 0.0),
                text: "clipped".into(),
                color: ThemeToken::TextPrimary,
                align: TextAlign::Left,
            },
            RenderCommand::PopTransform,
            RenderCommand::ClearClip,
            RenderCommand::PopTransform,
        ];
        paint(&mut buf, area, &commands);
        assert_eq!(row(&buf, 1), "  abc     ");
        assert_eq!(row(&buf, 2), "          ");
    }

    #[test]
    fn status_shows_mode_range_and_hidden() {
        use std::sync::Arc;
        use tracelens_core::{TraceDocument, ViewConfig, parse_trace};
        use tracelens_protocol::{ObservationLevel, Viewport};

        let data = parse_trace(br#"{"id": "t", "timestamp": "2024-01-01T00:00:00Z"}"#)
            .expect("trace");
        let mut app = App::new(Arc::new(TraceDocument::new(data)), ViewConfig::default());
        app.min_level = Some(ObservationLevel::Warning);
        let out = RenderOutput {
            commands: Vec::new(),
            mode: RenderMode::Windowed,
            rendered_range: 40..75,
            row_count: 900,
            hidden_count: 12,
            total_height: 900.0,
            viewport: Viewport::new(80.0, 20.0),
        };
        let status = status_text(&app, &out);
        assert!(status.starts_with(" windowed | rows 40..75 of 900 | >= WARNING | 12 hidden"));
    }

    #[test]
    fn paint_rect_label_and_bounds() {
        let area = Rect::new(0, 0, 6, 1);
        let mut buf = Buffer::empty(area);
        paint(
            &mut buf,
            area,
            &[RenderCommand::DrawRect {
                rect: CmdRect::new(3.0, 0.0, 10.0, 1.0),
                color: ThemeToken::SpanBar,
                border_color: None,
                label: Some("1.2s".into()),
                node_id: None,
            }],
        );
        assert_eq!(row(&buf, 0), "   1.2");
        assert_eq!(buf[(4, 0)].bg, theme_to_color(ThemeToken::SpanBar));
    }
}
