//! Per-floor undirected adjacency graph with hazard-aware mutation.
//!
//! A node's entry into `fire_blocked` is permanent for the life of the
//! process: once marked, neither `restore_node` nor `restore_graph` will
//! bring it back.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::NavError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point(pub i64, pub i64);

impl Point {
    pub fn to_key(self) -> String {
        format!("({},{})", self.0, self.1)
    }

    pub fn parse_key(s: &str) -> Result<Point, NavError> {
        let trimmed = s.trim().trim_start_matches('(').trim_end_matches(')');
        let mut parts = trimmed.split(',');
        let x = parts
            .next()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .ok_or_else(|| NavError::Parse(s.to_string()))?;
        let y = parts
            .next()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .ok_or_else(|| NavError::Parse(s.to_string()))?;
        Ok(Point(x, y))
    }

    pub fn dist_sq(self, other: Point) -> i64 {
        let dx = self.0 - other.0;
        let dy = self.1 - other.1;
        dx * dx + dy * dy
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Floor {
    B2,
    B1,
    #[serde(rename = "1F")]
    F1,
    #[serde(rename = "4F")]
    F4,
}

impl Floor {
    pub fn parse(raw: &str) -> Option<Floor> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "B2" => Some(Floor::B2),
            "B1" => Some(Floor::B1),
            "1F" | "F1" => Some(Floor::F1),
            "4F" | "F4" => Some(Floor::F4),
            _ => None,
        }
    }

    /// Canonical wire label — matches the `serde` renames above, unlike
    /// `Debug`, which would print `F1`/`F4` instead of `1F`/`4F`.
    pub fn as_str(self) -> &'static str {
        match self {
            Floor::B2 => "B2",
            Floor::B1 => "B1",
            Floor::F1 => "1F",
            Floor::F4 => "4F",
        }
    }
}

/// Insertion-ordered adjacency: `nearest()` tie-breaks on catalog/graph
/// insertion order (§4.E), which a plain `HashMap` cannot preserve.
pub type Adjacency = IndexMap<Point, Vec<Point>>;

/// Mutable per-floor state: the current graph, the frozen original it was
/// seeded from, nodes permanently excluded by fire, and the last fire-alert
/// timestamp used to decide whether a delete is fire-caused.
pub struct FloorGraph {
    original: Adjacency,
    current: Adjacency,
    fire_blocked: HashSet<Point>,
    recent_fire_at: Option<Instant>,
}

impl FloorGraph {
    pub fn new(original: Adjacency) -> Self {
        let current = original.clone();
        Self { original, current, fire_blocked: HashSet::new(), recent_fire_at: None }
    }

    pub fn current(&self) -> &Adjacency {
        &self.current
    }

    pub fn note_fire(&mut self, now: Instant) {
        self.recent_fire_at = Some(now);
    }

    fn is_fire_caused(&self, now: Instant, window: std::time::Duration) -> bool {
        matches!(self.recent_fire_at, Some(t) if now.duration_since(t) <= window)
    }

    /// Removes `node` and every reference to it. A missing node is a no-op
    /// success. If the delete follows a fire alert within `window`, the node
    /// becomes permanently fire-blocked; returns whether that happened, so
    /// the caller can report `fire_related` on its acknowledgement.
    pub fn delete(&mut self, node: Point, now: Instant, window: std::time::Duration) -> bool {
        if self.current.shift_remove(&node).is_none() {
            return false;
        }
        for neighbors in self.current.values_mut() {
            neighbors.retain(|n| *n != node);
        }
        let fire_related = self.is_fire_caused(now, window);
        if fire_related {
            self.fire_blocked.insert(node);
        }
        fire_related
    }

    /// Overwrites the current graph with the original, then strips every
    /// fire-blocked node from both the key set and all neighbor lists.
    pub fn restore_all(&mut self) -> usize {
        let mut restored = self.original.clone();
        for blocked in &self.fire_blocked {
            restored.shift_remove(blocked);
        }
        for neighbors in restored.values_mut() {
            neighbors.retain(|n| !self.fire_blocked.contains(n));
        }
        self.current = restored;
        self.fire_blocked.len()
    }

    /// Reintroduces a single node with its original neighbors, keeping only
    /// the reciprocal edges whose endpoint is already present in the current
    /// graph. Fails if the node is fire-blocked.
    pub fn restore_node(&mut self, node: Point) -> Result<(), NavError> {
        if self.fire_blocked.contains(&node) {
            return Err(NavError::Blocked(node));
        }
        let Some(original_neighbors) = self.original.get(&node) else {
            return Ok(());
        };
        let live_neighbors: Vec<Point> = original_neighbors
            .iter()
            .copied()
            .filter(|n| self.current.contains_key(n))
            .collect();
        for n in &live_neighbors {
            let entry = self.current.entry(*n).or_default();
            if !entry.contains(&node) {
                entry.push(node);
            }
        }
        self.current.insert(node, live_neighbors);
        Ok(())
    }

    /// Nearest node by squared distance; ties broken by the node's position
    /// in the current graph's insertion order (§4.E), not by coordinate.
    pub fn nearest(&self, point: Point) -> Option<Point> {
        self.current
            .keys()
            .enumerate()
            .min_by_key(|(index, candidate)| (candidate.dist_sq(point), *index))
            .map(|(_, candidate)| *candidate)
    }

    /// Unweighted shortest path by edge count. Unreachable or missing start
    /// both yield `(None, [])`.
    pub fn bfs(&self, start: Point, target: Point) -> (Option<u32>, Vec<Point>) {
        if !self.current.contains_key(&start) {
            return (None, Vec::new());
        }
        if start == target {
            return (Some(0), vec![start]);
        }
        let mut visited = HashSet::new();
        visited.insert(start);
        let mut queue = VecDeque::new();
        queue.push_back(start);
        let mut came_from: HashMap<Point, Point> = HashMap::new();

        while let Some(node) = queue.pop_front() {
            let Some(neighbors) = self.current.get(&node) else { continue };
            for &next in neighbors {
                if visited.insert(next) {
                    came_from.insert(next, node);
                    if next == target {
                        let mut path = vec![target];
                        let mut cur = target;
                        while let Some(&prev) = came_from.get(&cur) {
                            path.push(prev);
                            cur = prev;
                        }
                        path.reverse();
                        return (Some((path.len() - 1) as u32), path);
                    }
                    queue.push_back(next);
                }
            }
        }
        (None, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_graph() -> Adjacency {
        let mut g = Adjacency::new();
        g.insert(Point(0, 0), vec![Point(1, 0)]);
        g.insert(Point(1, 0), vec![Point(0, 0), Point(2, 0)]);
        g.insert(Point(2, 0), vec![Point(1, 0)]);
        g
    }

    #[test]
    fn bfs_finds_shortest_path() {
        let fg = FloorGraph::new(line_graph());
        let (dist, path) = fg.bfs(Point(0, 0), Point(2, 0));
        assert_eq!(dist, Some(2));
        assert_eq!(path, vec![Point(0, 0), Point(1, 0), Point(2, 0)]);
    }

    #[test]
    fn bfs_unreachable_returns_empty() {
        let mut adj = line_graph();
        adj.insert(Point(9, 9), vec![]);
        let fg = FloorGraph::new(adj);
        let (dist, path) = fg.bfs(Point(0, 0), Point(9, 9));
        assert_eq!(dist, None);
        assert!(path.is_empty());
    }

    #[test]
    fn delete_within_fire_window_sticks() {
        let mut fg = FloorGraph::new(line_graph());
        let t0 = Instant::now();
        fg.note_fire(t0);
        fg.delete(Point(1, 0), t0, std::time::Duration::from_secs(5));
        assert!(!fg.current.contains_key(&Point(1, 0)));

        fg.restore_all();
        assert!(!fg.current.contains_key(&Point(1, 0)));
        assert!(fg.restore_node(Point(1, 0)).is_err());
    }

    #[test]
    fn delete_without_fire_is_restorable() {
        let mut fg = FloorGraph::new(line_graph());
        let t0 = Instant::now();
        fg.delete(Point(1, 0), t0, std::time::Duration::from_secs(5));
        assert!(!fg.current.contains_key(&Point(1, 0)));

        fg.restore_all();
        assert!(fg.current.contains_key(&Point(1, 0)));
        let neighbors = fg.current.get(&Point(1, 0)).unwrap();
        assert_eq!(neighbors.len(), 2);
    }

    #[test]
    fn delete_is_idempotent() {
        let mut fg = FloorGraph::new(line_graph());
        let t0 = Instant::now();
        fg.delete(Point(1, 0), t0, std::time::Duration::from_secs(5));
        let after_first = fg.current.clone();
        fg.delete(Point(1, 0), t0, std::time::Duration::from_secs(5));
        assert_eq!(fg.current, after_first);
    }

    #[test]
    fn point_key_round_trips() {
        let p = Point(-18, -19);
        let key = p.to_key();
        assert_eq!(key, "(-18,-19)");
        assert_eq!(Point::parse_key(&key).unwrap(), p);
    }
}
