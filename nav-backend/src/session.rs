//! Per-connection message dispatch.
//!
//! One `Session` lives for the duration of one client connection; within a
//! session, messages are handled strictly in arrival order. Graph mutation
//! and lookups go through the shared [`Engine`], which owns the per-floor
//! exclusive sections; everything else here is private per-connection
//! state.

use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tracing::warn;

use crate::graph::{Floor, Point};
use crate::planner::best_path;
use crate::state::Engine;
use crate::window::{Reading, SampleWindow};

pub struct Session {
    window: SampleWindow,
    last_floor: Option<Floor>,
}

impl Session {
    pub fn new(rssi_min_valid: f64) -> Self {
        Self { window: SampleWindow::new(rssi_min_valid), last_floor: None }
    }
}

fn parse_node(value: &Value) -> Option<Point> {
    if let Some(arr) = value.as_array() {
        if arr.len() == 2 {
            let x = arr[0].as_i64()?;
            let y = arr[1].as_i64()?;
            return Some(Point(x, y));
        }
    }
    if let Some(s) = value.as_str() {
        return Point::parse_key(s).ok();
    }
    None
}

fn path_loss_distance(base: f64) -> f64 {
    10f64.powf((-86.0 - base) / 20.0)
}

fn readings_from(value: &Value) -> Vec<Reading> {
    let Some(list) = value.as_array() else { return Vec::new() };
    list.iter()
        .filter_map(|r| {
            let id = r.get("id")?.as_str()?.to_string();
            let rssi = r.get("rssi").and_then(Value::as_f64);
            let filtered = r.get("filtered").and_then(Value::as_f64);
            let distance = r.get("distance").and_then(Value::as_f64).or_else(|| {
                let base = filtered.or(rssi)?;
                Some(path_loss_distance(base))
            });
            Some(Reading { id, rssi, filtered, distance })
        })
        .collect()
}

/// Handles one inbound JSON message, mutating `session` and shared
/// `engine` state as needed, and returns the outbound messages to
/// broadcast to every connected client (possibly empty).
pub async fn handle_message(engine: &Engine, session: &mut Session, msg: Value) -> Vec<Value> {
    let Some(kind) = msg.get("kind").and_then(Value::as_str) else {
        warn!("session: dropping message with no kind: {msg}");
        return Vec::new();
    };

    match kind {
        "rssi_batch" | "ble_readings" => {
            if let Some(floor_raw) = msg.get("floor").and_then(Value::as_str) {
                if let Some(floor) = Floor::parse(floor_raw) {
                    session.last_floor = Some(floor);
                }
            }
            let readings_key = if msg.get("readings").is_some() { "readings" } else { "list" };
            let readings = readings_from(msg.get(readings_key).unwrap_or(&Value::Null));
            session.window.push(readings);
            session.window.prune(Duration::from_secs(engine.config.max_window_age_secs));

            let Some(envelope) = try_recompute(engine, session).await else { return Vec::new() };
            session.window.clear();
            vec![envelope]
        }
        "floor_detected" => {
            if let Some(floor_raw) = msg.get("floor").and_then(Value::as_str) {
                if let Some(floor) = Floor::parse(floor_raw) {
                    session.last_floor = Some(floor);
                }
            }
            Vec::new()
        }
        "fire_alert" => {
            let Some(floor_raw) = msg.get("floor").and_then(Value::as_str) else {
                warn!("session: dropping {kind} message with no floor field");
                return Vec::new();
            };
            let Some(floor) = Floor::parse(floor_raw) else {
                warn!("session: dropping {kind} message with unknown floor {floor_raw:?}");
                return Vec::new();
            };
            engine.graph(floor).write().await.note_fire(Instant::now());
            let confidence = msg.get("confidence").and_then(Value::as_f64).unwrap_or(0.0);
            let ts = chrono::Utc::now().to_rfc3339();
            vec![json!({ "kind": "fire_alert", "floor": floor_raw, "confidence": confidence, "ts": ts })]
        }
        "delete_node" | "remove_node" | "graph_delete" => {
            let Some(floor_raw) = msg.get("floor").and_then(Value::as_str) else {
                warn!("session: dropping {kind} message with no floor field");
                return Vec::new();
            };
            let Some(floor) = Floor::parse(floor_raw) else {
                warn!("session: dropping {kind} message with unknown floor {floor_raw:?}");
                return Vec::new();
            };
            let Some(node_raw) = msg.get("node") else {
                warn!("session: dropping {kind} message with no node field");
                return Vec::new();
            };
            let Some(node) = parse_node(node_raw) else {
                warn!("session: dropping {kind} message with unparsable node {node_raw}");
                return Vec::new();
            };
            let window = Duration::from_secs(engine.config.fire_delete_window_secs);
            let fire_related = engine.graph(floor).write().await.delete(node, Instant::now(), window);
            let mut out = vec![json!({
                "kind": "graph_ack", "op": "delete", "floor": floor_raw,
                "node": node.to_key(), "ok": true, "fire_related": fire_related,
            })];
            if let Some(envelope) = try_recompute(engine, session).await {
                out.push(envelope);
            }
            out
        }
        "restore_graph" | "graph_restore" => {
            let Some(floor_raw) = msg.get("floor").and_then(Value::as_str) else {
                warn!("session: dropping {kind} message with no floor field");
                return Vec::new();
            };
            let Some(floor) = Floor::parse(floor_raw) else {
                warn!("session: dropping {kind} message with unknown floor {floor_raw:?}");
                return Vec::new();
            };
            let excluded = engine.graph(floor).write().await.restore_all();
            let mut out = vec![json!({
                "kind": "graph_ack", "op": "restore_graph", "floor": floor_raw,
                "ok": true, "blocked_excluded": excluded,
            })];
            if let Some(envelope) = try_recompute(engine, session).await {
                out.push(envelope);
            }
            out
        }
        "restore_node" | "graph_restore_node" => {
            let Some(floor_raw) = msg.get("floor").and_then(Value::as_str) else {
                warn!("session: dropping {kind} message with no floor field");
                return Vec::new();
            };
            let Some(floor) = Floor::parse(floor_raw) else {
                warn!("session: dropping {kind} message with unknown floor {floor_raw:?}");
                return Vec::new();
            };
            let Some(node_raw) = msg.get("node") else {
                warn!("session: dropping {kind} message with no node field");
                return Vec::new();
            };
            let Some(node) = parse_node(node_raw) else {
                warn!("session: dropping {kind} message with unparsable node {node_raw}");
                return Vec::new();
            };
            let result = engine.graph(floor).write().await.restore_node(node);
            let mut out = vec![json!({
                "kind": "graph_ack", "op": "restore_node", "floor": floor_raw,
                "node": node.to_key(), "ok": result.is_ok(),
            })];
            if let Some(envelope) = try_recompute(engine, session).await {
                out.push(envelope);
            }
            out
        }
        "hazard" => {
            let Some(floor_raw) = msg.get("floor").and_then(Value::as_str) else {
                warn!("session: dropping {kind} message with no floor field");
                return Vec::new();
            };
            let Some(floor) = Floor::parse(floor_raw) else {
                warn!("session: dropping {kind} message with unknown floor {floor_raw:?}");
                return Vec::new();
            };
            let Some(node_raw) = msg.get("node") else {
                warn!("session: dropping {kind} message with no node field");
                return Vec::new();
            };
            let Some(node) = parse_node(node_raw) else {
                warn!("session: dropping {kind} message with unparsable node {node_raw}");
                return Vec::new();
            };
            let active = msg.get("active").and_then(Value::as_bool).unwrap_or(true);
            let nodes = engine.toggle_hazard(floor, node, active).await;
            let hazard_nodes: Vec<[i64; 2]> = nodes.iter().map(|p| [p.0, p.1]).collect();
            vec![json!({ "kind": "hazard_state", "floor": floor_raw, "hazard_nodes": hazard_nodes })]
        }
        _ => {
            warn!("session: ignoring unknown kind {kind}");
            Vec::new()
        }
    }
}

/// Solves and plans from the session's current window, without clearing it.
/// Returns `None` if no floor is known yet or the window is not yet ready.
async fn try_recompute(engine: &Engine, session: &Session) -> Option<Value> {
    let floor = session.last_floor?;
    let top3 = session.window.top3_ready(engine.config.count_trigger)?;

    let mut anchors = Vec::with_capacity(3);
    for t in top3.iter() {
        let Some(&(ax, ay)) = engine.catalog.anchors.get(&t.id) else {
            warn!("session: dropping top3 beacon with unknown id {}", t.id);
            continue;
        };
        let Some(dist) = t.filtered.or(t.rssi).map(path_loss_distance) else {
            warn!("session: beacon {} has neither a filtered nor an rssi reading", t.id);
            continue;
        };
        anchors.push(crate::trilateration::Anchor { x: ax, y: ay, dist });
    }
    let anchors: [crate::trilateration::Anchor; 3] = anchors.try_into().ok()?;

    let (pos, method) = crate::trilateration::auto(&anchors);
    let recent = session.window.snapshot_readings();
    Some(emit_recompute(engine, floor, pos, method, &top3, &recent).await)
}

async fn emit_recompute(
    engine: &Engine,
    floor: Floor,
    pos: crate::trilateration::Pos2D,
    method: crate::trilateration::Method,
    top3: &[crate::window::Top3Entry; 3],
    recent_batches: &[Reading],
) -> Value {
    let graph = engine.graph(floor).read().await;
    let plan = best_path(&engine.catalog, &graph, floor, pos.x, pos.y);
    let area = engine
        .catalog
        .zones_for(floor)
        .iter()
        .find(|z| z.representative == Some(plan.start_node))
        .map(|z| z.name.clone());

    let method_str = match method {
        crate::trilateration::Method::Direct => "direct",
        crate::trilateration::Method::LeastSquares => "least_squares",
    };

    json!({
        "kind": "recompute",
        "floor": floor.as_str(),
        "snapped_list": [[plan.start_node.0, plan.start_node.1]],
        "best_path": plan.path.iter().map(|p| [p.0, p.1]).collect::<Vec<_>>(),
        "note": "live_update",
        "method": method_str,
        "area": area,
        "debug": {
            "top3": top3,
            "tag_xy": [pos.x, pos.y],
            "recent_batches": recent_batches,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_array_and_string_node_forms() {
        assert_eq!(parse_node(&json!([1, 2])), Some(Point(1, 2)));
        assert_eq!(parse_node(&json!("(-1,2)")), Some(Point(-1, 2)));
        assert_eq!(parse_node(&json!("not a node")), None);
    }

    #[tokio::test]
    async fn unknown_kind_is_ignored() {
        let engine = Engine::new(crate::config::Config::default(), crate::catalog::Catalog::embedded());
        let mut session = Session::new(-99.0);
        let out = handle_message(&engine, &mut session, json!({"kind": "not_a_real_kind"})).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn delete_node_acknowledges() {
        let engine = Engine::new(crate::config::Config::default(), crate::catalog::Catalog::embedded());
        let mut session = Session::new(-99.0);
        let out = handle_message(
            &engine,
            &mut session,
            json!({"kind": "delete_node", "floor": "B1", "node": [-18, -19]}),
        )
        .await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["ok"], true);
    }

    #[tokio::test]
    async fn delete_node_recomputes_ready_window_without_clearing_it() {
        let engine = Engine::new(crate::config::Config::default(), crate::catalog::Catalog::embedded());
        let mut session = Session::new(-99.0);

        // No floor carried yet: the window fills to readiness but the
        // per-batch recompute check has nothing to solve against, so it
        // never fires (and never clears the window).
        for _ in 0..10 {
            handle_message(
                &engine,
                &mut session,
                json!({
                    "kind": "rssi_batch",
                    "readings": [
                        {"id": "beacon-1", "filtered": -60.0},
                        {"id": "beacon-2", "filtered": -65.0},
                        {"id": "beacon-3", "filtered": -70.0},
                    ],
                }),
            )
            .await;
        }
        assert!(session.window.top3_ready(10).is_some());

        handle_message(&engine, &mut session, json!({"kind": "floor_detected", "floor": "B1"})).await;

        let out = handle_message(
            &engine,
            &mut session,
            json!({"kind": "delete_node", "floor": "B1", "node": [999, 999]}),
        )
        .await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["kind"], "graph_ack");
        assert_eq!(out[1]["kind"], "recompute");
        // A mutation-triggered recompute must not clear the window.
        assert!(session.window.top3_ready(10).is_some());
    }
}
