use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracelens_core::views::RenderMode;
use tracelens_core::{
    CollapsedSet, ConfigError, DisplayToggles, ParseError, Selection, TraceDocument,
    TraceTreeView, TreeAction, TreeCallbacks, TreeProps, ViewConfig, ViewMode, parse_trace,
};
use tracelens_protocol::{ObservationLevel, RenderCommand};
use wasm_bindgen::prelude::*;

/// One loaded trace plus the view rendering it.
struct Session {
    document: Arc<TraceDocument>,
    view: TraceTreeView,
    callbacks: TreeCallbacks,
    actions: Rc<RefCell<Vec<TreeAction>>>,
}

thread_local! {
    static SESSIONS: RefCell<Vec<Session>> = const { RefCell::new(Vec::new()) };
}

#[derive(Debug, Error)]
enum BridgeError {
    #[error("invalid trace handle {0}")]
    InvalidHandle(usize),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Host-owned tree state, sent with every render.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct TreeState {
    collapsed: Vec<String>,
    /// `None` selects the trace row.
    selected_id: Option<String>,
    min_level: Option<ObservationLevel>,
    /// Overrides the loaded config when present.
    toggles: Option<DisplayToggles>,
    view_mode: Option<ViewMode>,
    scroll_top: f64,
    width: f64,
    height: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RenderResult<'a> {
    commands: &'a [RenderCommand],
    mode: &'static str,
    rendered_range: [usize; 2],
    row_count: usize,
    hidden_count: usize,
    total_height: f64,
    scroll_top: f64,
}

/// A state change for the JS host to apply before the next render.
#[derive(Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum HostAction {
    Select { id: Option<String> },
    ToggleCollapse { id: String },
    CollapseAll,
    ExpandAll,
    SetMinLevel { level: Option<ObservationLevel> },
}

impl From<TreeAction> for HostAction {
    fn from(action: TreeAction) -> Self {
        match action {
            TreeAction::Select(selection) => Self::Select {
                id: selection.observation_id().map(ToString::to_string),
            },
            TreeAction::ToggleCollapse(id) => Self::ToggleCollapse { id: id.to_string() },
            TreeAction::CollapseAll => Self::CollapseAll,
            TreeAction::ExpandAll => Self::ExpandAll,
            TreeAction::SetMinLevel(level) => Self::SetMinLevel { level },
        }
    }
}

fn with_session<T>(
    handle: usize,
    f: impl FnOnce(&mut Session) -> Result<T, BridgeError>,
) -> Result<T, BridgeError> {
    SESSIONS.with_borrow_mut(|sessions| {
        let session = sessions
            .get_mut(handle)
            .ok_or(BridgeError::InvalidHandle(handle))?;
        f(session)
    })
}

fn drain_actions(session: &Session) -> Result<String, BridgeError> {
    let actions: Vec<HostAction> = session
        .actions
        .borrow_mut()
        .drain(..)
        .map(HostAction::from)
        .collect();
    Ok(serde_json::to_string(&actions)?)
}

fn load(data: &[u8], config: ViewConfig) -> Result<usize, BridgeError> {
    let document = Arc::new(TraceDocument::new(parse_trace(data)?));
    let actions = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&actions);
    let session = Session {
        document,
        view: TraceTreeView::new(config),
        callbacks: TreeCallbacks::from_sink(move |action| sink.borrow_mut().push(action)),
        actions,
    };
    Ok(SESSIONS.with_borrow_mut(|sessions| {
        sessions.push(session);
        sessions.len() - 1
    }))
}

fn render(handle: usize, state_json: &str) -> Result<String, BridgeError> {
    let state: TreeState = serde_json::from_str(state_json)?;
    with_session(handle, |session| {
        let collapsed: CollapsedSet = state.collapsed.iter().map(String::as_str).collect();
        let selection = state
            .selected_id
            .map_or(Selection::Trace, |id| Selection::Observation(id.into()));
        if let Some(mode) = state.view_mode {
            session.view.set_view_mode(mode);
        }
        if let Some(toggles) = state.toggles.filter(|t| *t != session.view.config().toggles) {
            let mut config = session.view.config().clone();
            config.toggles = toggles;
            session.view.set_config(config);
        }
        let props = TreeProps {
            document: &session.document,
            collapsed: &collapsed,
            selection: &selection,
            min_level: state.min_level,
            callbacks: &session.callbacks,
            width: state.width,
            height: state.height,
        };
        session.view.set_scroll_offset(state.scroll_top);
        let out = session.view.render(&props);
        let result = RenderResult {
            commands: &out.commands,
            mode: match out.mode {
                RenderMode::Plain => "plain",
                RenderMode::Windowed => "windowed",
            },
            rendered_range: [out.rendered_range.start, out.rendered_range.end],
            row_count: out.row_count,
            hidden_count: out.hidden_count,
            total_height: out.total_height,
            scroll_top: out.viewport.y,
        };
        Ok(serde_json::to_string(&result)?)
    })
}

/// Parse a trace export and open a view on it. Returns a handle.
#[wasm_bindgen]
pub fn load_trace(data: &[u8]) -> Result<usize, JsError> {
    Ok(load(data, ViewConfig::default())?)
}

/// Like [`load_trace`] with a JSON view config (`virtualizationThreshold`,
/// `overscanCount`, `estimatedRowHeight`, `viewMode`, `toggles`).
#[wasm_bindgen]
pub fn load_trace_with_config(data: &[u8], config_json: &[u8]) -> Result<usize, JsError> {
    let config = ViewConfig::from_json(config_json).map_err(BridgeError::from)?;
    Ok(load(data, config)?)
}

/// Render the tree for the given host state, returning commands and window
/// metadata as JSON.
#[wasm_bindgen]
pub fn render_tree(handle: usize, state_json: &str) -> Result<String, JsError> {
    Ok(render(handle, state_json)?)
}

/// Row under a point `y` units below the top of the scroll container.
#[wasm_bindgen]
pub fn row_at(handle: usize, y: f64) -> Result<Option<usize>, JsError> {
    Ok(with_session(handle, |session| Ok(session.view.row_at(y)))?)
}

/// Click row `index`; returns the resulting actions as JSON.
#[wasm_bindgen]
pub fn click_row(handle: usize, index: usize) -> Result<String, JsError> {
    Ok(with_session(handle, |session| {
        session.view.click_row(index);
        drain_actions(session)
    })?)
}

/// Toggle row `index`; returns the resulting actions as JSON.
#[wasm_bindgen]
pub fn toggle_row(handle: usize, index: usize) -> Result<String, JsError> {
    Ok(with_session(handle, |session| {
        session.view.toggle_row(index);
        drain_actions(session)
    })?)
}

/// Number of observations in the trace, excluding the trace row.
#[wasm_bindgen]
pub fn node_count(handle: usize) -> Result<usize, JsError> {
    Ok(with_session(handle, |session| Ok(session.document.node_count()))?)
}
