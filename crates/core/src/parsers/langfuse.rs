use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracelens_protocol::{Observation, Score, SharedStr, TraceContext, TraceData};

use super::ParseError;

/// Fields without which a trace cannot be placed on a time axis.
const REQUIRED: [&str; 2] = ["id", "timestamp"];

/// Langfuse trace export, in either of two shapes:
///
/// - the public API trace object, with `observations` and `scores` embedded
///   next to `id`, `timestamp`, `latency`, `totalCost`, ...
/// - a wrapper `{trace, observations, scores, comments}`.
///
/// `comments` may be a list of comment objects (counted per `objectId`) or a
/// ready-made `{id: count}` map.
pub fn parse_langfuse(data: &[u8]) -> Result<TraceData, ParseError> {
    let value: Value = serde_json::from_slice(data)?;
    let Value::Object(mut root) = value else {
        return Err(ParseError::UnknownFormat);
    };

    let (mut trace, mut wrapper) = match root.remove("trace") {
        Some(Value::Object(trace)) => (trace, root),
        Some(_) => return Err(ParseError::UnknownFormat),
        None if root.contains_key("id") => (root, Map::new()),
        None => return Err(ParseError::UnknownFormat),
    };

    let observations = take_list(&mut wrapper, &mut trace, "observations");
    let scores = take_list(&mut wrapper, &mut trace, "scores");
    let comments = wrapper.remove("comments").or_else(|| trace.remove("comments"));

    for field in REQUIRED {
        if trace.get(field).is_none_or(Value::is_null) {
            return Err(ParseError::MissingField(field));
        }
    }

    let trace: TraceContext = from_object(trace)?;
    let observations = observations
        .into_iter()
        .map(from_value::<Observation>)
        .collect::<Result<Vec<_>, _>>()?;
    let scores = scores
        .into_iter()
        .map(from_value::<Score>)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TraceData {
        trace,
        observations,
        scores,
        comment_counts: comments.map(comment_counts).unwrap_or_default(),
    })
}

/// The list under `key`, from the wrapper first, then the trace object.
fn take_list(
    wrapper: &mut Map<String, Value>,
    trace: &mut Map<String, Value>,
    key: &str,
) -> Vec<Value> {
    let from_trace = trace.remove(key);
    match wrapper.remove(key).or(from_trace) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

/// Null means "absent" in the export; serde defaults only cover missing keys.
fn from_object<T: DeserializeOwned>(mut object: Map<String, Value>) -> Result<T, ParseError> {
    object.retain(|_, v| !v.is_null());
    Ok(serde_json::from_value(Value::Object(object))?)
}

fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, ParseError> {
    match value {
        Value::Object(object) => from_object(object),
        other => Ok(serde_json::from_value(other)?),
    }
}

fn comment_counts(comments: Value) -> HashMap<SharedStr, u32> {
    let mut counts: HashMap<SharedStr, u32> = HashMap::new();
    match comments {
        Value::Array(items) => {
            for item in items {
                if let Some(id) = item.get("objectId").and_then(Value::as_str) {
                    *counts.entry(id.into()).or_default() += 1;
                }
            }
        }
        Value::Object(map) => {
            for (id, count) in map {
                if let Some(n) = count.as_u64() {
                    counts.insert(id.into(), u32::try_from(n).unwrap_or(u32::MAX));
                }
            }
        }
        _ => {}
    }
    counts
}
