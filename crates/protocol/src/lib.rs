pub mod commands;
pub mod format;
pub mod shared_str;
pub mod theme;
pub mod trace;
pub mod types;

pub use commands::{RenderCommand, TextAlign};
pub use format::{format_cost, format_latency, format_tokens};
pub use shared_str::SharedStr;
pub use theme::ThemeToken;
pub use trace::{
    Observation, ObservationLevel, ObservationType, Score, TraceContext, TraceData, Usage,
};
pub use types::{Point, Rect, Viewport};
