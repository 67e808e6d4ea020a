//! Flattens the provider's per-query result map into series frames.

use crate::models::Target;
use crate::provider::BatchResponse;
use serde::Serialize;
use serde_json::Value;

/// Provider unit code → panel display unit. Only exact, shared units
/// are surfaced; anything else renders unitless.
const UNIT_MAPPINGS: &[(&str, &str)] = &[
    ("bit", "bits"),
    ("By", "bytes"),
    ("s", "s"),
    ("min", "m"),
    ("h", "h"),
    ("d", "d"),
    ("us", "µs"),
    ("ms", "ms"),
    ("ns", "ns"),
    ("%", "percent"),
    ("1", "none"),
    ("percent", "percent"),
    ("By/s", "Bps"),
    ("GBy", "decgbytes"),
];

/// One reshaped output series.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub target: String,
    pub datapoints: Vec<Value>,
    pub ref_id: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub meta: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PanelResponse {
    pub data: Vec<Frame>,
}

/// Emits one frame per series, in refId order. Result entries without
/// series carry no data for their query and are skipped. `refId` and
/// `meta` propagate from the owning result entry, not the series.
pub fn reshape(targets: &[Target], response: BatchResponse) -> PanelResponse {
    let unit = resolve_panel_unit(targets);
    let mut data = Vec::new();

    for (key, result) in response.results {
        let series = match result.series {
            Some(series) => series,
            None => continue,
        };

        let ref_id = result.ref_id.unwrap_or(key);
        let meta = result.meta.unwrap_or(Value::Null);

        for serie in series {
            data.push(Frame {
                target: serie.name,
                datapoints: serie.points,
                ref_id: ref_id.clone(),
                meta: meta.clone(),
                unit: unit.map(str::to_string),
            });
        }
    }

    PanelResponse { data }
}

/// A display unit applies only when every target in the batch configures
/// the same provider unit and that unit has a mapping. Heterogeneous
/// batches stay unitless.
fn resolve_panel_unit(targets: &[Target]) -> Option<&'static str> {
    let first = targets.first()?;
    let unit = first.metric_query.as_ref().map(|q| q.unit.as_str())?;

    let shared = targets.iter().all(|target| {
        target
            .metric_query
            .as_ref()
            .map(|q| q.unit.as_str() == unit)
            .unwrap_or(false)
    });
    if !shared {
        return None;
    }

    UNIT_MAPPINGS
        .iter()
        .find(|(code, _)| *code == unit)
        .map(|(_, display)| *display)
}
