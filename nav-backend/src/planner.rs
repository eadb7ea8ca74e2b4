//! Orchestrates shape classification and graph search into a single
//! best-path decision for a solved position.

use crate::catalog::Catalog;
use crate::graph::{Floor, FloorGraph, Point};
use crate::shapes::classify;

pub struct PlanResult {
    pub start_node: Point,
    pub path: Vec<Point>,
    pub chosen_target: Option<Point>,
    pub priority: Option<i32>,
    pub distance: Option<u32>,
}

/// Resolves a start node from `(x, y)` — the representative node of its
/// zone if one resolves and is present in the current graph, else the
/// nearest graph node — then searches priority groups in ascending order,
/// stopping at the first group that reaches any target.
pub fn best_path(catalog: &Catalog, graph: &FloorGraph, floor: Floor, x: f64, y: f64) -> PlanResult {
    let zones = catalog.zones_for(floor);
    let floor_label = floor.as_str();

    let zone = classify(zones, floor_label, x, y, true)
        .unwrap_or_else(|_| classify(zones, floor_label, x, y, false).unwrap_or(None));

    let start_node = zone
        .and_then(|z| z.representative)
        .filter(|n| graph.current().contains_key(n))
        .or_else(|| graph.nearest(Point(x.round() as i64, y.round() as i64)));

    let Some(start_node) = start_node else {
        return PlanResult { start_node: Point(0, 0), path: Vec::new(), chosen_target: None, priority: None, distance: None };
    };

    let Some(targets) = catalog.targets_for(floor) else {
        return PlanResult { start_node, path: vec![start_node], chosen_target: None, priority: None, distance: None };
    };

    for (&priority, candidates) in targets.iter() {
        let mut best: Option<(u32, Vec<Point>, Point)> = None;
        for &target in candidates {
            if !graph.current().contains_key(&target) {
                continue;
            }
            let (dist, path) = graph.bfs(start_node, target);
            if let Some(dist) = dist {
                if best.as_ref().map(|(best_dist, _, _)| dist < *best_dist).unwrap_or(true) {
                    best = Some((dist, path, target));
                }
            }
        }
        if let Some((dist, path, target)) = best {
            return PlanResult {
                start_node,
                path,
                chosen_target: Some(target),
                priority: Some(priority),
                distance: Some(dist),
            };
        }
    }

    PlanResult { start_node, path: vec![start_node], chosen_target: None, priority: None, distance: None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reaches_highest_priority_target_first() {
        let catalog = Catalog::embedded();
        let graph = FloorGraph::new(catalog.original_graph(Floor::B1));
        let result = best_path(&catalog, &graph, Floor::B1, -22.0, -19.0);
        assert_eq!(result.chosen_target, Some(Point(18, 17)));
        assert_eq!(result.priority, Some(1));
    }

    #[test]
    fn falls_back_to_lower_priority_when_top_group_unreachable() {
        let catalog = Catalog::embedded();
        let mut graph = FloorGraph::new(catalog.original_graph(Floor::B1));
        graph.delete(Point(18, 13), std::time::Instant::now(), std::time::Duration::from_secs(5));
        let result = best_path(&catalog, &graph, Floor::B1, -22.0, -19.0);
        assert_eq!(result.chosen_target, Some(Point(-14, -19)));
        assert_eq!(result.priority, Some(2));
    }

    #[test]
    fn no_reachable_target_returns_start_alone() {
        let catalog = Catalog::embedded();
        let mut graph = FloorGraph::new(catalog.original_graph(Floor::B1));
        graph.delete(Point(18, 13), std::time::Instant::now(), std::time::Duration::from_secs(5));
        graph.delete(Point(-14, -19), std::time::Instant::now(), std::time::Duration::from_secs(5));
        let result = best_path(&catalog, &graph, Floor::B1, -22.0, -19.0);
        assert_eq!(result.chosen_target, None);
        assert_eq!(result.path, vec![Point(-22, -19)]);
    }
}
