pub mod collapsed;
pub mod document;
pub mod scores;
pub mod selection;
pub mod tree;

pub use collapsed::CollapsedSet;
pub use document::TraceDocument;
pub use scores::ScoreIndex;
pub use selection::{Selection, TreeAction, TreeCallbacks};
pub use tree::{NodeIdx, ObservationTree, TreeNode};
