use std::collections::HashMap;
use std::sync::Arc;

use tracelens_protocol::{SharedStr, TraceData};

use super::{ObservationTree, ScoreIndex};

/// A loaded trace: the observation tree plus the annotations rows display.
///
/// Hosts keep one of these behind an `Arc` and replace it wholesale when new
/// data arrives; the view treats a new allocation as new data.
#[derive(Debug)]
pub struct TraceDocument {
    pub tree: Arc<ObservationTree>,
    pub scores: ScoreIndex,
    pub comment_counts: HashMap<SharedStr, u32>,
}

impl TraceDocument {
    pub fn new(data: TraceData) -> Self {
        let TraceData {
            trace,
            observations,
            scores,
            comment_counts,
        } = data;
        Self {
            tree: Arc::new(ObservationTree::build(trace, observations)),
            scores: ScoreIndex::new(&scores),
            comment_counts,
        }
    }

    /// Observation count, excluding the trace row.
    pub fn node_count(&self) -> usize {
        self.tree.node_count()
    }
}

impl From<TraceData> for TraceDocument {
    fn from(data: TraceData) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tree::tests::{obs, trace};
    use tracelens_protocol::Score;

    #[test]
    fn splits_payload() {
        let doc = TraceDocument::new(TraceData {
            trace: trace(),
            observations: vec![obs("a", None, 0), obs("b", Some("a"), 10)],
            scores: vec![Score {
                id: "s1".into(),
                name: "accuracy".into(),
                value: Some(0.5),
                string_value: None,
                source: None,
                observation_id: None,
            }],
            comment_counts: HashMap::from([(SharedStr::from("a"), 1)]),
        });
        assert_eq!(doc.node_count(), 2);
        assert_eq!(doc.scores.for_trace().len(), 1);
        assert_eq!(doc.comment_counts.get("a"), Some(&1));
    }
}
