//! Panel-facing query model.
//!
//! The panel layer posts query batches in the dashboard JSON dialect
//! (camelCase keys, epoch-millisecond ranges). Targets arrive either in
//! the current nested shape (`metricQuery` / `sloQuery` payloads) or in
//! the legacy flat shape, which [`crate::query::normalize`] migrates.

use crate::template::ScopedVars;
use serde::{Deserialize, Serialize};

pub const VIEW_FULL: &str = "FULL";
pub const VIEW_HEADERS: &str = "HEADERS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Metrics,
    Slo,
}

/// One query descriptor within a request batch. `query_type` decides
/// which of the two payloads is semantically active; the other is
/// carried along untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub ref_id: String,
    #[serde(default)]
    pub query_type: Option<QueryType>,
    #[serde(default)]
    pub hide: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_query: Option<MetricsQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slo_query: Option<SloQuery>,
    #[serde(flatten)]
    pub legacy: LegacyMetricFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricsQuery {
    pub project_name: String,
    pub metric_type: String,
    pub cross_series_reducer: String,
    pub per_series_aligner: String,
    pub alignment_period: String,
    pub group_bys: Vec<String>,
    pub filters: Vec<String>,
    pub view: String,
    pub unit: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SloQuery {
    pub project_name: String,
    pub service_id: String,
    pub selector_name: String,
    pub slo_id: String,
    pub alignment_period: String,
}

/// Scalar fields of the legacy flat target shape. Queries saved before
/// the nested schema carry these at the top level; normalization folds
/// them into a [`MetricsQuery`] payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegacyMetricFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cross_series_reducer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_series_aligner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignment_period: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_bys: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl LegacyMetricFields {
    pub fn is_empty(&self) -> bool {
        self.project_name.is_none()
            && self.metric_type.is_none()
            && self.cross_series_reducer.is_none()
            && self.per_series_aligner.is_none()
            && self.alignment_period.is_none()
            && self.group_bys.is_none()
            && self.filters.is_none()
            && self.view.is_none()
            && self.unit.is_none()
    }
}

/// Panel time range, epoch milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: i64,
    pub to: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub range: TimeRange,
    #[serde(default)]
    pub interval_ms: Option<i64>,
    #[serde(default)]
    pub scoped_vars: ScopedVars,
    #[serde(default)]
    pub targets: Vec<Target>,
}

/// One metric filter. On the wire filters travel as a flat token
/// sequence in chunks of four (key, operator, value, connective); in
/// process they are structured records converted at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSegment {
    pub key: String,
    pub operator: String,
    pub value: String,
    pub condition: Option<String>,
}

impl FilterSegment {
    /// Reconstructs structured filters from the flat token sequence.
    /// Trailing groups too short to carry a value are discarded.
    pub fn chunk(tokens: &[String]) -> Vec<FilterSegment> {
        tokens
            .chunks(4)
            .filter(|group| group.len() >= 3)
            .map(|group| FilterSegment {
                key: group[0].clone(),
                operator: group[1].clone(),
                value: group[2].clone(),
                condition: group.get(3).cloned(),
            })
            .collect()
    }

    /// Flattens structured filters back into the wire token sequence.
    pub fn flatten(segments: Vec<FilterSegment>) -> Vec<String> {
        let mut tokens = Vec::with_capacity(segments.len() * 4);
        for segment in segments {
            tokens.push(segment.key);
            tokens.push(segment.operator);
            tokens.push(segment.value);
            if let Some(condition) = segment.condition {
                tokens.push(condition);
            }
        }
        tokens
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationRequest {
    pub range: TimeRange,
    #[serde(default)]
    pub scoped_vars: ScopedVars,
    pub annotation: AnnotationTarget,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnnotationTarget {
    pub project_name: String,
    pub metric_type: String,
    pub filters: Vec<String>,
    pub title: String,
    pub text: String,
    pub tags: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnotationEvent {
    pub time: i64,
    pub title: String,
    pub text: String,
    pub tags: Vec<String>,
}

/// Dashboard variable query, dispatched by kind to the ancillary
/// lookups or the static option tables.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricFindRequest {
    pub selected_query_type: MetricFindKind,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub metric_type: Option<String>,
    #[serde(default)]
    pub label_key: Option<String>,
    #[serde(default)]
    pub service_id: Option<String>,
    #[serde(default)]
    pub range: Option<TimeRange>,
    #[serde(default)]
    pub scoped_vars: ScopedVars,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricFindKind {
    Projects,
    Services,
    Slo,
    MetricTypes,
    LabelKeys,
    LabelValues,
    Aggregations,
    Aligners,
    AlignmentPeriods,
}

/// One selection-list entry returned to the variable editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectableValue {
    pub text: String,
    pub value: String,
}

impl SelectableValue {
    pub fn new(text: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            value: value.into(),
        }
    }
}
