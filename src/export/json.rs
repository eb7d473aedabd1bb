use super::write_file;
use crate::host::Host;
use crate::relations::children_for_relation;
use crate::types::{Record, RelationsSnapshot, Value};
use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};
use serde_json::{json, Value as JsonValue};
use std::path::Path;
use tracing::info;

fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Integer(i) => json!(i),
        Value::Real(r) => json!(r),
        Value::Text(t) => json!(t),
        // Encode blob as base64
        Value::Blob(b) => json!(general_purpose::STANDARD.encode(b)),
    }
}

fn record_to_json(
    host: &dyn Host,
    snapshot: &RelationsSnapshot,
    layer_id: &str,
    record: &Record,
    depth: usize,
) -> JsonValue {
    let values: serde_json::Map<String, JsonValue> = record
        .fields
        .iter()
        .zip(&record.values)
        .map(|(f, v)| (f.clone(), value_to_json(v)))
        .collect();

    let mut obj = json!({
        "id": record.id.0,
        "label": record.default_label(),
        "values": values,
    });

    if depth > 0 {
        let relations: Vec<JsonValue> = snapshot
            .outgoing(layer_id)
            .map(|edge| {
                let children: Vec<JsonValue> = children_for_relation(host, record, edge)
                    .iter()
                    .map(|child| record_to_json(host, snapshot, &edge.child_layer_id, child, depth - 1))
                    .collect();
                json!({
                    "relation": edge.id,
                    "child_layer": snapshot.layer_name(&edge.child_layer_id),
                    "records": children,
                })
            })
            .collect();
        obj["relations"] = JsonValue::Array(relations);
    }
    obj
}

/// Rows of `layer_id` with their related child rows, `depth` levels deep
pub fn build_report(
    host: &dyn Host,
    snapshot: &RelationsSnapshot,
    layer_id: &str,
    limit: Option<usize>,
    depth: usize,
) -> Result<JsonValue> {
    let records = host
        .records(layer_id, limit)
        .with_context(|| format!("Failed to read layer {}", layer_id))?;

    let rows: Vec<JsonValue> = records
        .iter()
        .map(|r| record_to_json(host, snapshot, layer_id, r, depth))
        .collect();

    Ok(json!({
        "layer": { "id": layer_id, "name": snapshot.layer_name(layer_id) },
        "records": rows,
    }))
}

pub fn export_report(
    host: &dyn Host,
    snapshot: &RelationsSnapshot,
    layer_id: &str,
    limit: Option<usize>,
    depth: usize,
    output_path: &Path,
) -> Result<()> {
    let report = build_report(host, snapshot, layer_id, limit, depth)?;
    let output = serde_json::to_string_pretty(&report).context("Failed to serialize JSON")?;
    write_file(output_path, output.as_bytes())?;
    info!(path = %output_path.display(), layer = layer_id, "exported relation report");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relations::capture;
    use crate::relations::fixtures::{self, PARENT_CHILD};
    use pretty_assertions::assert_eq;

    #[test]
    fn report_nests_children_under_their_relation() {
        let host = fixtures::host(PARENT_CHILD);
        let snap = capture(&host).unwrap();
        let report = build_report(&host, &snap, "parent", None, 1).unwrap();

        assert_eq!(report["layer"]["name"], "parent");
        let five = &report["records"][0];
        assert_eq!(five["id"], 5);
        assert_eq!(five["values"]["name"], "five");
        let children = five["relations"][0]["records"].as_array().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0]["values"]["label"], "b");
        // depth exhausted at the child level
        assert!(children[0].get("relations").is_none());
    }

    #[test]
    fn blobs_are_base64() {
        assert_eq!(value_to_json(&Value::Blob(vec![1, 2, 3])), json!("AQID"));
    }

    #[test]
    fn export_writes_pretty_json() {
        let host = fixtures::host(PARENT_CHILD);
        let snap = capture(&host).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("report.json");
        export_report(&host, &snap, "child", Some(1), 0, &out).unwrap();
        let parsed: JsonValue = serde_json::from_str(&std::fs::read_to_string(out).unwrap()).unwrap();
        assert_eq!(parsed["records"].as_array().unwrap().len(), 1);
    }
}
