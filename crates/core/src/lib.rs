pub mod callback;
pub mod config;
pub mod model;
pub mod parsers;
pub mod views;

pub use config::{ConfigError, DisplayToggles, ViewConfig, ViewMode};
pub use model::{CollapsedSet, ObservationTree, Selection, TraceDocument, TreeAction, TreeCallbacks};
pub use parsers::{ParseError, parse_trace};
pub use views::{RenderMode, RenderOutput, TraceTreeView, TreeProps};
