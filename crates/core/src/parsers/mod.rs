pub mod langfuse;

use thiserror::Error;
use tracelens_protocol::TraceData;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("trace is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("unable to detect trace format")]
    UnknownFormat,
}

/// Detect the export shape and parse it into the payload the tree view takes.
pub fn parse_trace(data: &[u8]) -> Result<TraceData, ParseError> {
    let trace = langfuse::parse_langfuse(data)?;
    debug!(
        trace = %trace.trace.id,
        observations = trace.observations.len(),
        scores = trace.scores.len(),
        "parsed trace"
    );
    Ok(trace)
}
