use std::collections::HashMap;

use tracelens_protocol::{Score, SharedStr};

/// Scores grouped by what they evaluate.
#[derive(Debug, Clone, Default)]
pub struct ScoreIndex {
    trace: Vec<Score>,
    by_observation: HashMap<SharedStr, Vec<Score>>,
}

impl ScoreIndex {
    pub fn new(scores: &[Score]) -> Self {
        let mut index = Self::default();
        for score in scores {
            match &score.observation_id {
                Some(id) => index
                    .by_observation
                    .entry(id.clone())
                    .or_default()
                    .push(score.clone()),
                None => index.trace.push(score.clone()),
            }
        }
        index
    }

    pub fn for_trace(&self) -> &[Score] {
        &self.trace
    }

    pub fn for_observation(&self, id: &str) -> &[Score] {
        self.by_observation.get(id).map_or(&[], Vec::as_slice)
    }
}
