mod app;
mod renderer;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, bail};
use tracelens_core::{TraceDocument, ViewConfig, ViewMode, parse_trace};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: tracelens <trace.json> [--config <file>] [--timeline]";

struct Args {
    trace: PathBuf,
    config: Option<PathBuf>,
    timeline: bool,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut trace = None;
    let mut config = None;
    let mut timeline = false;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().context("--config needs a file")?;
                config = Some(PathBuf::from(path));
            }
            "--timeline" => timeline = true,
            flag if flag.starts_with("--") => bail!("unknown flag {flag}\n{USAGE}"),
            path if trace.is_none() => trace = Some(PathBuf::from(path)),
            extra => bail!("unexpected argument {extra}\n{USAGE}"),
        }
    }
    Ok(Args {
        trace: trace.context(USAGE)?,
        config,
        timeline,
    })
}

/// Logs go to a file: the terminal belongs to the UI. Off unless
/// `TRACELENS_LOG` is set.
fn init_logging() -> Result<()> {
    let Ok(filter) = std::env::var("TRACELENS_LOG") else {
        return Ok(());
    };
    let file = std::fs::File::create("tracelens.log").context("creating tracelens.log")?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn load_config(args: &Args) -> Result<ViewConfig> {
    let config = match &args.config {
        Some(path) => {
            let data = std::fs::read(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            ViewConfig::from_json(&data)?
        }
        None => ViewConfig::default(),
    };
    Ok(for_terminal(config, args.timeline))
}

/// One terminal row per tree row, whatever height the config names.
fn for_terminal(mut config: ViewConfig, timeline: bool) -> ViewConfig {
    if timeline {
        config.view_mode = ViewMode::Timeline;
    }
    if let Some(height) = config.estimated_row_height {
        tracing::debug!(height, "row height rescaled to one terminal cell");
    }
    config.estimated_row_height = Some(1.0);
    config
}

fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;
    init_logging()?;
    let config = load_config(&args)?;

    let data = std::fs::read(&args.trace)
        .with_context(|| format!("reading trace {}", args.trace.display()))?;
    let trace = parse_trace(&data)?;
    tracing::info!(
        path = %args.trace.display(),
        observations = trace.observations.len(),
        "loaded trace"
    );

    let mut app = app::App::new(Arc::new(TraceDocument::new(trace)), config);
    renderer::render_tui(&mut app)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_positional_and_flags() {
        let parsed = args(&["trace.json", "--config", "view.json", "--timeline"]).expect("args");
        assert_eq!(parsed.trace, PathBuf::from("trace.json"));
        assert_eq!(parsed.config, Some(PathBuf::from("view.json")));
        assert!(parsed.timeline);
    }

    #[test]
    fn rejects_bad_invocations() {
        assert!(args(&[]).is_err());
        assert!(args(&["a.json", "b.json"]).is_err());
        assert!(args(&["a.json", "--config"]).is_err());
        assert!(args(&["a.json", "--zoom"]).is_err());
    }

    #[test]
    fn terminal_rows_default_to_one_cell() {
        let parsed = args(&["trace.json", "--timeline"]).expect("args");
        let config = load_config(&parsed).expect("config");
        assert_eq!(config.row_height(), 1.0);
        assert_eq!(config.view_mode, ViewMode::Timeline);
    }

    #[test]
    fn configured_row_height_becomes_one_cell() {
        let config = ViewConfig::from_json(br#"{"estimatedRowHeight": 50, "overscanCount": 4}"#)
            .expect("config");
        let config = for_terminal(config, false);
        assert_eq!(config.row_height(), 1.0);
        assert_eq!(config.overscan_count, 4);
        assert_eq!(config.view_mode, ViewMode::Tree);
    }
}
