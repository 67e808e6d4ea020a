//! Ancillary read-only lookups feeding the query editor and dashboard
//! variables: projects, metric descriptors, SLO services and
//! objectives, label keys/values, and the static option tables.

use super::{QueryEngine, REDUCE_NONE};
use crate::{
    error::Result,
    models::{
        MetricFindKind, MetricFindRequest, MetricsQuery, QueryRequest, QueryType, SelectableValue,
        Target, TimeRange, VIEW_HEADERS,
    },
    provider::ApiBase,
    query::interpolate,
    template::{self, Format, ScopedVars},
};
use chrono::{Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;

/// Cross-series reducers offered by the query editor.
pub const AGGREGATIONS: &[(&str, &str)] = &[
    ("REDUCE_NONE", "none"),
    ("REDUCE_MEAN", "mean"),
    ("REDUCE_MIN", "min"),
    ("REDUCE_MAX", "max"),
    ("REDUCE_SUM", "sum"),
    ("REDUCE_STDDEV", "std. dev."),
    ("REDUCE_COUNT", "count"),
    ("REDUCE_COUNT_TRUE", "count true"),
    ("REDUCE_COUNT_FALSE", "count false"),
    ("REDUCE_FRACTION_TRUE", "fraction true"),
    ("REDUCE_PERCENTILE_99", "99th percentile"),
    ("REDUCE_PERCENTILE_95", "95th percentile"),
    ("REDUCE_PERCENTILE_50", "50th percentile"),
    ("REDUCE_PERCENTILE_05", "5th percentile"),
];

/// Per-series aligners offered by the query editor.
pub const ALIGNERS: &[(&str, &str)] = &[
    ("ALIGN_NONE", "none"),
    ("ALIGN_DELTA", "delta"),
    ("ALIGN_RATE", "rate"),
    ("ALIGN_INTERPOLATE", "interpolate"),
    ("ALIGN_NEXT_OLDER", "next older"),
    ("ALIGN_MIN", "min"),
    ("ALIGN_MAX", "max"),
    ("ALIGN_MEAN", "mean"),
    ("ALIGN_COUNT", "count"),
    ("ALIGN_SUM", "sum"),
    ("ALIGN_STDDEV", "std. dev."),
    ("ALIGN_COUNT_TRUE", "count true"),
    ("ALIGN_COUNT_FALSE", "count false"),
    ("ALIGN_FRACTION_TRUE", "fraction true"),
    ("ALIGN_PERCENTILE_99", "99th percentile"),
    ("ALIGN_PERCENTILE_95", "95th percentile"),
    ("ALIGN_PERCENTILE_50", "50th percentile"),
    ("ALIGN_PERCENTILE_05", "5th percentile"),
    ("ALIGN_PERCENT_CHANGE", "percent change"),
];

pub const ALIGNMENT_PERIODS: &[(&str, &str)] = &[
    ("+60s", "1m"),
    ("+300s", "5m"),
    ("+900s", "15m"),
    ("+1800s", "30m"),
    ("+3600s", "1h"),
    ("+10800s", "3h"),
    ("+21600s", "6h"),
    ("+43200s", "12h"),
    ("+86400s", "1d"),
];

impl QueryEngine {
    /// Dashboard variable query dispatch.
    pub async fn metric_find(&self, request: &MetricFindRequest) -> Result<Vec<SelectableValue>> {
        self.ensure_default_project().await?;

        let scope = &request.scoped_vars;
        let project = self.resolve_project(request.project_name.as_deref(), scope);

        match request.selected_query_type {
            MetricFindKind::Projects => self.get_projects().await,
            MetricFindKind::Services => self.get_slo_services(&project).await,
            MetricFindKind::Slo => {
                let service = request
                    .service_id
                    .as_deref()
                    .map(|id| template::replace(id, scope, Format::Plain))
                    .unwrap_or_default();
                self.get_service_level_objectives(&project, &service).await
            }
            MetricFindKind::MetricTypes => {
                let descriptors = self.get_metric_types(&project).await?;
                Ok(descriptors
                    .iter()
                    .filter_map(descriptor_option)
                    .collect())
            }
            MetricFindKind::LabelKeys => {
                let labels = self.label_query(request, &project, Vec::new()).await?;
                Ok(labels
                    .keys()
                    .map(|key| SelectableValue::new(key, key))
                    .collect())
            }
            MetricFindKind::LabelValues => {
                let label_key = request.label_key.clone().unwrap_or_default();
                let labels = self
                    .label_query(request, &project, vec![label_key.clone()])
                    .await?;
                Ok(labels
                    .get(&label_key)
                    .map(|values| {
                        values
                            .iter()
                            .map(|value| SelectableValue::new(value, value))
                            .collect()
                    })
                    .unwrap_or_default())
            }
            MetricFindKind::Aggregations => Ok(static_options(AGGREGATIONS)),
            MetricFindKind::Aligners => Ok(static_options(ALIGNERS)),
            MetricFindKind::AlignmentPeriods => Ok(static_options(ALIGNMENT_PERIODS)),
        }
    }

    /// Label discovery: one HEADERS-view query whose result metadata
    /// carries the label map. Returns an empty map when the provider
    /// sends no metadata.
    pub async fn get_labels(
        &self,
        metric_type: &str,
        ref_id: &str,
        project_name: &str,
        group_bys: Vec<String>,
        range: TimeRange,
    ) -> Result<HashMap<String, Vec<String>>> {
        let scope = ScopedVars::new();
        let target = Target {
            ref_id: ref_id.to_string(),
            query_type: Some(QueryType::Metrics),
            hide: false,
            interval_ms: None,
            metric_query: Some(MetricsQuery {
                project_name: project_name.to_string(),
                metric_type: template::replace(metric_type, &scope, Format::Plain),
                cross_series_reducer: REDUCE_NONE.to_string(),
                group_bys: interpolate::interpolate_group_bys(&group_bys, &scope),
                view: VIEW_HEADERS.to_string(),
                ..Default::default()
            }),
            slo_query: None,
            legacy: Default::default(),
        };

        let response = self
            .get_time_series(&QueryRequest {
                range,
                interval_ms: None,
                scoped_vars: scope,
                targets: vec![target],
            })
            .await?;

        let labels = response
            .results
            .get(ref_id)
            .and_then(|result| result.meta.as_ref())
            .and_then(|meta| meta.get("labels"))
            .and_then(|labels| {
                serde_json::from_value::<HashMap<String, Vec<String>>>(labels.clone()).ok()
            })
            .unwrap_or_default();
        Ok(labels)
    }

    /// Metric descriptors for a project, each annotated with its service
    /// namespace, the short service name, and a display-name fallback.
    pub async fn get_metric_types(&self, project_name: &str) -> Result<Vec<Value>> {
        let path = format!(
            "{}/metricDescriptors",
            urlencoding::encode(project_name)
        );
        let descriptors = self.provider().get_list(ApiBase::Monitoring, &path).await?;
        Ok(descriptors
            .into_iter()
            .map(annotate_descriptor)
            .collect())
    }

    pub async fn get_slo_services(&self, project_name: &str) -> Result<Vec<SelectableValue>> {
        let path = format!("{}/services?pageSize=1000", urlencoding::encode(project_name));
        let services = self.provider().get_list(ApiBase::Monitoring, &path).await?;
        Ok(services.iter().filter_map(resource_name_option).collect())
    }

    pub async fn get_service_level_objectives(
        &self,
        project_name: &str,
        service_id: &str,
    ) -> Result<Vec<SelectableValue>> {
        if service_id.is_empty() {
            return Ok(Vec::new());
        }

        let path = format!(
            "{}/services/{}/serviceLevelObjectives",
            urlencoding::encode(project_name),
            urlencoding::encode(service_id)
        );
        let objectives = self.provider().get_list(ApiBase::Monitoring, &path).await?;
        Ok(objectives.iter().filter_map(resource_name_option).collect())
    }

    pub async fn get_projects(&self) -> Result<Vec<SelectableValue>> {
        let projects = self
            .provider()
            .get_list(ApiBase::ResourceManager, "projects")
            .await?;
        Ok(projects
            .iter()
            .filter_map(|project| {
                let id = project.get("projectId")?.as_str()?;
                let name = project
                    .get("name")
                    .and_then(|name| name.as_str())
                    .unwrap_or(id);
                Some(SelectableValue::new(name, id))
            })
            .collect())
    }

    async fn label_query(
        &self,
        request: &MetricFindRequest,
        project: &str,
        group_bys: Vec<String>,
    ) -> Result<HashMap<String, Vec<String>>> {
        let metric_type = request.metric_type.clone().unwrap_or_default();
        let range = request.range.unwrap_or_else(default_lookup_range);
        self.get_labels(&metric_type, "metricFindQuery", project, group_bys, range)
            .await
    }

    fn resolve_project(&self, configured: Option<&str>, scope: &ScopedVars) -> String {
        match configured.filter(|p| !p.is_empty()) {
            Some(project) => template::replace(project, scope, Format::Plain),
            None => self.default_project(),
        }
    }
}

fn default_lookup_range() -> TimeRange {
    let now = Utc::now();
    TimeRange {
        from: (now - Duration::hours(1)).timestamp_millis(),
        to: now.timestamp_millis(),
    }
}

fn static_options(table: &[(&str, &str)]) -> Vec<SelectableValue> {
    table
        .iter()
        .map(|(value, text)| SelectableValue::new(*text, *value))
        .collect()
}

/// Adds `service`, `serviceShortName`, and a `displayName` fallback to
/// a raw metric descriptor. The service is the namespace prefix of the
/// metric type (`compute.googleapis.com/instance/cpu/utilization` →
/// `compute.googleapis.com`), the short name its first dotted segment.
fn annotate_descriptor(mut descriptor: Value) -> Value {
    let metric_type = descriptor
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or_default()
        .to_string();
    let service = metric_type.split('/').next().unwrap_or_default().to_string();
    let short_name = service.split('.').next().unwrap_or_default().to_string();

    if let Some(fields) = descriptor.as_object_mut() {
        fields.insert("service".to_string(), Value::String(service));
        fields.insert("serviceShortName".to_string(), Value::String(short_name));
        let missing_display_name = !fields
            .get("displayName")
            .and_then(|name| name.as_str())
            .is_some_and(|name| !name.is_empty());
        if missing_display_name {
            fields.insert("displayName".to_string(), Value::String(metric_type));
        }
    }
    descriptor
}

fn descriptor_option(descriptor: &Value) -> Option<SelectableValue> {
    let metric_type = descriptor.get("type")?.as_str()?;
    let display_name = descriptor
        .get("displayName")
        .and_then(|name| name.as_str())
        .unwrap_or(metric_type);
    Some(SelectableValue::new(display_name, metric_type))
}

/// Selection-list entry from a provider resource name: the trailing
/// path segment serves as both value and label.
fn resource_name_option(resource: &Value) -> Option<SelectableValue> {
    let name = resource.get("name")?.as_str()?;
    let segment = trailing_segment(name);
    Some(SelectableValue::new(segment, segment))
}

fn trailing_segment(name: &str) -> &str {
    name.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(name)
}
