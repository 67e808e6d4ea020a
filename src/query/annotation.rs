//! Annotation queries: one fixed-shape unaggregated query whose table
//! rows become timeline events.

use super::{AnnotationPayload, QueryEngine, ALIGN_NONE, ANNOTATION_QUERY, REDUCE_NONE};
use crate::{
    error::Result,
    models::{AnnotationEvent, AnnotationRequest, VIEW_FULL},
    provider::RequestBatch,
    query::interpolate,
    template::{self, Format},
};
use chrono::DateTime;
use serde_json::Value;

impl QueryEngine {
    pub async fn annotation_query(
        &self,
        request: &AnnotationRequest,
    ) -> Result<Vec<AnnotationEvent>> {
        self.ensure_default_project().await?;

        let scope = &request.scoped_vars;
        let annotation = &request.annotation;
        let project = if annotation.project_name.is_empty() {
            self.default_project()
        } else {
            annotation.project_name.clone()
        };

        let payload = AnnotationPayload {
            ref_id: ANNOTATION_QUERY.to_string(),
            kind: ANNOTATION_QUERY,
            view: VIEW_FULL.to_string(),
            cross_series_reducer: REDUCE_NONE.to_string(),
            per_series_aligner: ALIGN_NONE.to_string(),
            title: template::replace(&annotation.title, scope, Format::Plain),
            text: template::replace(&annotation.text, scope, Format::Plain),
            tags: template::replace(&annotation.tags, scope, Format::Plain),
            project_name: template::replace(&project, scope, Format::Plain),
            filters: interpolate::interpolate_filters(&annotation.filters, scope),
            metric_type: template::replace(&annotation.metric_type, scope, Format::Plain),
        };

        let response = self
            .provider()
            .post_batch(&RequestBatch {
                from: Some(request.range.from.to_string()),
                to: Some(request.range.to.to_string()),
                queries: vec![payload],
            })
            .await?;

        let rows = response
            .results
            .get(ANNOTATION_QUERY)
            .and_then(|result| result.tables.as_ref())
            .and_then(|tables| tables.first())
            .map(|table| table.rows.clone())
            .unwrap_or_default();

        Ok(rows.into_iter().filter_map(row_to_event).collect())
    }
}

/// Row layout: time, title, (series), text. Rows without a parseable
/// time cell are dropped.
fn row_to_event(row: Vec<Value>) -> Option<AnnotationEvent> {
    let time = parse_time_cell(row.first()?)?;
    Some(AnnotationEvent {
        time,
        title: text_cell(row.get(1)),
        text: text_cell(row.get(3)),
        tags: Vec::new(),
    })
}

fn parse_time_cell(value: &Value) -> Option<i64> {
    match value {
        Value::String(raw) => DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|time| time.timestamp_millis()),
        Value::Number(number) => number.as_i64(),
        _ => None,
    }
}

fn text_cell(value: Option<&Value>) -> String {
    value
        .and_then(|cell| cell.as_str())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_table_row_to_event() {
        let event = row_to_event(vec![
            json!("2026-01-15T10:30:00Z"),
            json!("deployment finished"),
            json!("series-name"),
            json!("version 4.2 rolled out"),
        ])
        .unwrap();

        assert_eq!(event.time, 1_768_473_000_000);
        assert_eq!(event.title, "deployment finished");
        assert_eq!(event.text, "version 4.2 rolled out");
        assert!(event.tags.is_empty());
    }

    #[test]
    fn accepts_epoch_millisecond_time_cells() {
        let event = row_to_event(vec![json!(1_700_000_000_000i64), json!("t")]).unwrap();
        assert_eq!(event.time, 1_700_000_000_000);
        assert_eq!(event.text, "");
    }

    #[test]
    fn drops_rows_without_parseable_time() {
        assert!(row_to_event(vec![json!("not a time"), json!("t")]).is_none());
        assert!(row_to_event(vec![]).is_none());
    }
}
