//! Static building data: beacon anchors, zone polygons, per-floor graphs and
//! ranked exit targets.
//!
//! This data is authored offline (floor-plan surveying, polygon drawing) and
//! is treated here as a frozen, compile-time resource — the authoring
//! workflow is out of scope for this service. The in-memory tables below are
//! the illustrative seed data shipped with the binary; `catalog_io` layers
//! the legacy on-disk graph/targets file formats on top for compatibility,
//! but this module is always the source of truth.

use std::collections::{BTreeMap, HashMap};

use crate::graph::{Adjacency, Floor, Point};
use crate::shapes::{Rectangle, Shape, Zone};

pub struct Catalog {
    pub anchors: HashMap<String, (f64, f64)>,
    pub zones: HashMap<Floor, Vec<Zone>>,
    pub graphs: HashMap<Floor, Adjacency>,
    pub targets: HashMap<Floor, BTreeMap<i32, Vec<Point>>>,
}

impl Catalog {
    pub fn embedded() -> Self {
        let mut anchors = HashMap::new();
        anchors.insert("beacon-1".to_string(), (2.0, 1.0));
        anchors.insert("beacon-2".to_string(), (4.0, 3.0));
        anchors.insert("beacon-3".to_string(), (6.0, 1.0));

        let mut zones = HashMap::new();
        zones.insert(
            Floor::B1,
            vec![Zone {
                name: "B1_07".to_string(),
                shape: Shape::Rect(Rectangle { xmin: -2.0, xmax: 2.0, ymin: -2.0, ymax: 2.0 }),
                representative: Some(Point(0, 0)),
            }],
        );

        let mut graphs = HashMap::new();
        graphs.insert(Floor::B1, b1_graph());

        let mut targets = HashMap::new();
        let mut b1_targets = BTreeMap::new();
        b1_targets.insert(1, vec![Point(18, 17)]);
        b1_targets.insert(2, vec![Point(-14, -19)]);
        targets.insert(Floor::B1, b1_targets);

        Self { anchors, zones, graphs, targets }
    }

    pub fn zones_for(&self, floor: Floor) -> &[Zone] {
        self.zones.get(&floor).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn targets_for(&self, floor: Floor) -> Option<&BTreeMap<i32, Vec<Point>>> {
        self.targets.get(&floor)
    }

    pub fn original_graph(&self, floor: Floor) -> Adjacency {
        self.graphs.get(&floor).cloned().unwrap_or_default()
    }
}

fn b1_graph() -> Adjacency {
    let mut g = Adjacency::new();
    let mut edge = |a: Point, b: Point| {
        g.entry(a).or_insert_with(Vec::new).push(b);
        g.entry(b).or_insert_with(Vec::new).push(a);
    };
    edge(Point(-22, -19), Point(-18, -19));
    edge(Point(-18, -19), Point(-14, -19));
    edge(Point(-18, -19), Point(-18, -15));
    edge(Point(-18, -15), Point(-16, -13));
    edge(Point(-16, -13), Point(-12, -10));
    edge(Point(-12, -10), Point(-8, -7));
    edge(Point(-8, -7), Point(-4, -4));
    edge(Point(-4, -4), Point(0, -1));
    edge(Point(0, -1), Point(4, 2));
    edge(Point(4, 2), Point(8, 5));
    edge(Point(8, 5), Point(12, 8));
    edge(Point(12, 8), Point(14, 10));
    edge(Point(14, 10), Point(16, 12));
    edge(Point(16, 12), Point(18, 13));
    edge(Point(18, 13), Point(18, 17));
    g
}
