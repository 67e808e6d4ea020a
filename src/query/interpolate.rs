//! Template variable expansion over query parameters.
//!
//! Scalar properties resolve in plain mode. Filter values resolve in
//! regex mode, since the provider matches them as regular expressions.
//! Group-bys resolve in CSV mode and multi-value expansions are spliced
//! in place.

use crate::models::{FilterSegment, MetricsQuery, SloQuery};
use crate::template::{self, Format, ScopedVars};

pub fn interpolate_metric_query(query: MetricsQuery, scope: &ScopedVars) -> MetricsQuery {
    MetricsQuery {
        project_name: template::replace(&query.project_name, scope, Format::Plain),
        metric_type: template::replace(&query.metric_type, scope, Format::Plain),
        cross_series_reducer: template::replace(&query.cross_series_reducer, scope, Format::Plain),
        per_series_aligner: template::replace(&query.per_series_aligner, scope, Format::Plain),
        alignment_period: template::replace(&query.alignment_period, scope, Format::Plain),
        group_bys: interpolate_group_bys(&query.group_bys, scope),
        filters: interpolate_filters(&query.filters, scope),
        view: template::replace(&query.view, scope, Format::Plain),
        unit: template::replace(&query.unit, scope, Format::Plain),
    }
}

pub fn interpolate_slo_query(query: SloQuery, scope: &ScopedVars) -> SloQuery {
    SloQuery {
        project_name: template::replace(&query.project_name, scope, Format::Plain),
        service_id: template::replace(&query.service_id, scope, Format::Plain),
        selector_name: template::replace(&query.selector_name, scope, Format::Plain),
        slo_id: template::replace(&query.slo_id, scope, Format::Plain),
        alignment_period: template::replace(&query.alignment_period, scope, Format::Plain),
    }
}

/// Chunks the flat token sequence into filter records, drops records
/// with an empty value, resolves keys in plain mode and values in regex
/// mode, and flattens back. Order is preserved; records are only ever
/// removed, never reordered.
pub fn interpolate_filters(tokens: &[String], scope: &ScopedVars) -> Vec<String> {
    let resolved = FilterSegment::chunk(tokens)
        .into_iter()
        .filter(|segment| !segment.value.is_empty())
        .map(|segment| FilterSegment {
            key: template::replace(&segment.key, scope, Format::Plain),
            operator: segment.operator,
            value: template::replace(&segment.value, scope, Format::Regex),
            condition: segment.condition,
        })
        .collect();
    FilterSegment::flatten(resolved)
}

/// Resolves each token in CSV mode and splices the comma-split
/// expansion in place, so a multi-value variable contributes all of its
/// values at the token's position.
pub fn interpolate_group_bys(tokens: &[String], scope: &ScopedVars) -> Vec<String> {
    let mut out = Vec::with_capacity(tokens.len());
    for token in tokens {
        let resolved = template::replace(token, scope, Format::Csv);
        out.extend(resolved.split(',').map(str::to_string));
    }
    out
}
