//! Legacy on-disk graph/targets file formats, kept for compatibility.
//!
//! The embedded catalog (`catalog::Catalog`) is always the source of truth:
//! `ensure_files` rewrites the on-disk files from it at startup, the same
//! way the rest of this service always persists from its canonical
//! in-memory state rather than trusting whatever is already on disk.

use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

use crate::catalog::Catalog;
use crate::graph::{Floor, Point};

/// (Re)writes the legacy graph and targets files from the embedded catalog.
/// Never fails the caller — a write error is logged and the process
/// continues serving from memory.
pub async fn ensure_files(catalog: &Catalog, graph_path: &str, targets_path: &str) {
    let graph_json = graph_file_json(catalog);
    if let Err(e) = tokio::fs::write(graph_path, serde_json::to_vec_pretty(&graph_json).unwrap_or_default()).await {
        warn!("catalog_io: could not write {graph_path}: {e}");
    }

    let targets_json = targets_file_json(catalog, Floor::B1);
    if let Err(e) = tokio::fs::write(targets_path, serde_json::to_vec_pretty(&targets_json).unwrap_or_default()).await
    {
        warn!("catalog_io: could not write {targets_path}: {e}");
    }
}

fn graph_file_json(catalog: &Catalog) -> Value {
    let mut out = serde_json::Map::new();
    if let Some(adj) = catalog.graphs.get(&Floor::B1) {
        for (node, neighbors) in adj {
            let keys: Vec<String> = neighbors.iter().map(|n| n.to_key()).collect();
            out.insert(node.to_key(), serde_json::json!(keys));
        }
    }
    Value::Object(out)
}

fn targets_file_json(catalog: &Catalog, floor: Floor) -> Value {
    let Some(targets) = catalog.targets_for(floor) else { return Value::Array(Vec::new()) };
    let flat: Vec<String> = targets.values().flatten().map(|p| p.to_key()).collect();
    Value::Array(flat.into_iter().map(Value::String).collect())
}

/// Parses a legacy `"(x,y)" -> ["(x,y)", ...]` graph file into an adjacency
/// map. Malformed entries are skipped with a warning rather than failing
/// the whole load.
pub fn parse_graph_file(raw: &str) -> HashMap<Point, Vec<Point>> {
    let mut out = HashMap::new();
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw) else {
        warn!("catalog_io: graph file is not a JSON object, ignoring");
        return out;
    };
    for (key, value) in map {
        let Ok(node) = Point::parse_key(&key) else {
            warn!("catalog_io: skipping unparsable node key {key}");
            continue;
        };
        let Some(list) = value.as_array() else { continue };
        let neighbors = list
            .iter()
            .filter_map(|v| v.as_str())
            .filter_map(|s| Point::parse_key(s).ok())
            .collect();
        out.insert(node, neighbors);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_legacy_graph_file() {
        let raw = r#"{"(0,0)": ["(1,0)"], "(1,0)": ["(0,0)"]}"#;
        let adj = parse_graph_file(raw);
        assert_eq!(adj.get(&Point(0, 0)).unwrap(), &vec![Point(1, 0)]);
    }

    #[test]
    fn malformed_file_degrades_to_empty() {
        let adj = parse_graph_file("not json");
        assert!(adj.is_empty());
    }
}
