//! Target normalization: legacy-shape migration and the runnable gate.

use crate::models::{MetricsQuery, QueryType, Target, VIEW_FULL};

/// Migrates a legacy flat target into the nested shape. Targets that
/// already carry a `metricQuery` payload pass through unchanged, so the
/// migration is idempotent. Malformed legacy input is repackaged
/// best-effort; nothing here fails.
pub fn normalize(mut target: Target) -> Target {
    if target.metric_query.is_some() {
        return target;
    }

    let legacy = std::mem::take(&mut target.legacy);
    target.metric_query = Some(MetricsQuery {
        project_name: legacy.project_name.unwrap_or_default(),
        metric_type: legacy.metric_type.unwrap_or_default(),
        cross_series_reducer: legacy.cross_series_reducer.unwrap_or_default(),
        per_series_aligner: legacy.per_series_aligner.unwrap_or_default(),
        alignment_period: legacy.alignment_period.unwrap_or_default(),
        group_bys: legacy.group_bys.unwrap_or_default(),
        filters: legacy.filters.unwrap_or_default(),
        view: legacy.view.unwrap_or_else(|| VIEW_FULL.to_string()),
        unit: legacy.unit.unwrap_or_default(),
    });
    target.query_type = Some(QueryType::Metrics);
    target
}

/// The sole gate deciding which targets reach the wire: hidden targets
/// never run, SLO targets need their full selector, metrics targets need
/// a metric type.
pub fn should_run(target: &Target) -> bool {
    if target.hide {
        return false;
    }

    if target.query_type == Some(QueryType::Slo) {
        return match &target.slo_query {
            Some(slo) => {
                !slo.selector_name.is_empty()
                    && !slo.service_id.is_empty()
                    && !slo.slo_id.is_empty()
                    && !slo.project_name.is_empty()
            }
            None => false,
        };
    }

    match &target.metric_query {
        Some(metric) => !metric.metric_type.is_empty(),
        None => false,
    }
}
