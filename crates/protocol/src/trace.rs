use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared_str::SharedStr;

/// The fully fetched payload a host hands to the tree view.
///
/// ```text
///   trace export ─▶ TraceData ──▶ ObservationTree ──▶ flatten ──▶ window ──▶ RenderCommand[]
///                    (this)        (owned tree)        (rows)      (range)
/// ```
///
/// Observations arrive as a flat list with parent pointers, the shape the
/// tracing backend stores and serves. The core turns them into a strict tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceData {
    pub trace: TraceContext,
    #[serde(default)]
    pub observations: Vec<Observation>,
    #[serde(default)]
    pub scores: Vec<Score>,
    /// Comment count per object id (trace id or observation id). Supplied by
    /// the host; a missing entry means zero.
    #[serde(default, alias = "comments")]
    pub comment_counts: HashMap<SharedStr, u32>,
}

/// The synthetic root row: trace-wide name, timing and totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceContext {
    pub id: SharedStr,
    #[serde(default)]
    pub name: Option<SharedStr>,
    pub timestamp: DateTime<Utc>,
    /// End-to-end latency in seconds. Absent for traces still in flight.
    #[serde(default)]
    pub latency: Option<f64>,
    /// Aggregate cost in USD across all observations.
    #[serde(default)]
    pub total_cost: Option<f64>,
    #[serde(default)]
    pub user_id: Option<SharedStr>,
    #[serde(default)]
    pub session_id: Option<SharedStr>,
    #[serde(default)]
    pub tags: Vec<SharedStr>,
}

impl TraceContext {
    /// Display name, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Latency usable as a timeline span: present, finite and positive.
    pub fn timeline_span(&self) -> Option<f64> {
        self.latency.filter(|l| l.is_finite() && *l > 0.0)
    }
}

/// One node of the trace: a span, an LLM generation, a point event, ...
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub id: SharedStr,
    #[serde(default)]
    pub parent_observation_id: Option<SharedStr>,
    #[serde(rename = "type", default)]
    pub observation_type: ObservationType,
    #[serde(default)]
    pub name: Option<SharedStr>,
    #[serde(default)]
    pub level: ObservationLevel,
    #[serde(default)]
    pub status_message: Option<String>,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completion_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub model: Option<SharedStr>,
    #[serde(default)]
    pub usage: Usage,
    #[serde(default, alias = "calculatedInputCost")]
    pub input_cost: Option<f64>,
    #[serde(default, alias = "calculatedOutputCost")]
    pub output_cost: Option<f64>,
    #[serde(default, alias = "calculatedTotalCost")]
    pub total_cost: Option<f64>,
}

impl Observation {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Wall time in seconds, if the observation has ended.
    pub fn latency(&self) -> Option<f64> {
        self.end_time.map(|end| seconds_between(self.start_time, end))
    }

    /// Time from start until the first streamed token, for generations.
    pub fn time_to_first_token(&self) -> Option<f64> {
        self.completion_start_time
            .map(|first| seconds_between(self.start_time, first))
    }

    /// Own cost in USD: the total when reported, else input + output.
    pub fn cost(&self) -> Option<f64> {
        self.total_cost.or(match (self.input_cost, self.output_cost) {
            (None, None) => None,
            (input, output) => Some(input.unwrap_or(0.0) + output.unwrap_or(0.0)),
        })
    }
}

/// Seconds from `from` to `to`, millisecond resolution.
pub fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObservationType {
    #[default]
    Span,
    Generation,
    Event,
    Agent,
    Tool,
    Chain,
    Retriever,
    Embedding,
    Evaluator,
    Guardrail,
}

impl ObservationType {
    /// Short badge text shown in front of the name.
    pub fn badge(&self) -> &'static str {
        match self {
            Self::Span => "SPAN",
            Self::Generation => "GEN",
            Self::Event => "EVENT",
            Self::Agent => "AGENT",
            Self::Tool => "TOOL",
            Self::Chain => "CHAIN",
            Self::Retriever => "RETR",
            Self::Embedding => "EMBED",
            Self::Evaluator => "EVAL",
            Self::Guardrail => "GUARD",
        }
    }

    /// Whether this observation carries model usage and cost.
    pub fn is_generation_like(&self) -> bool {
        matches!(self, Self::Generation | Self::Embedding)
    }
}

/// Severity of an observation. Declaration order is severity order, which the
/// minimum-level filter relies on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObservationLevel {
    Debug,
    #[default]
    Default,
    Warning,
    Error,
}

impl ObservationLevel {
    pub const ALL: [ObservationLevel; 4] = [Self::Debug, Self::Default, Self::Warning, Self::Error];

    /// Whether an observation at this level passes a minimum-level filter.
    pub fn passes(self, min_level: Option<ObservationLevel>) -> bool {
        min_level.is_none_or(|min| self >= min)
    }

    /// The next stricter level, wrapping back to "no filter" after `Error`.
    pub fn cycle(current: Option<ObservationLevel>) -> Option<ObservationLevel> {
        match current {
            None => Some(Self::Default),
            Some(Self::Debug) => Some(Self::Default),
            Some(Self::Default) => Some(Self::Warning),
            Some(Self::Warning) => Some(Self::Error),
            Some(Self::Error) => None,
        }
    }
}

impl std::fmt::Display for ObservationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Debug => write!(f, "DEBUG"),
            Self::Default => write!(f, "DEFAULT"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Token usage reported for a generation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub input: Option<u64>,
    pub output: Option<u64>,
    pub total: Option<u64>,
}

impl Usage {
    pub fn total_tokens(&self) -> Option<u64> {
        self.total.or(match (self.input, self.output) {
            (None, None) => None,
            (input, output) => Some(input.unwrap_or(0).saturating_add(output.unwrap_or(0))),
        })
    }
}

/// An evaluation attached to the trace or to one observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub id: SharedStr,
    pub name: SharedStr,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub string_value: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    /// Absent for trace-level scores.
    #[serde(default)]
    pub observation_id: Option<SharedStr>,
}

impl Score {
    /// Compact `name: value` label for score badges.
    pub fn label(&self) -> String {
        match (&self.string_value, self.value) {
            (Some(s), _) => format!("{}: {s}", self.name),
            (None, Some(v)) if v.fract() == 0.0 => format!("{}: {v:.0}", self.name),
            (None, Some(v)) => format!("{}: {v:.2}", self.name),
            (None, None) => self.name.to_string(),
        }
    }
}
