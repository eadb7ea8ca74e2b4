//! Shared, process-wide engine state: per-floor graphs and hazard sets.
//!
//! Each floor gets its own exclusive section so a mutation on one floor
//! never blocks readers on another. The hazard-node set is independent of
//! the graph's own fire-blocked bookkeeping — it is a separate, toggled
//! "currently flagged" overlay surfaced to clients as `hazard_state`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::graph::{Floor, FloorGraph, Point};

pub struct Engine {
    pub config: Config,
    pub catalog: Catalog,
    graphs: HashMap<Floor, RwLock<FloorGraph>>,
    hazard_nodes: HashMap<Floor, RwLock<HashSet<Point>>>,
}

const ALL_FLOORS: [Floor; 4] = [Floor::B2, Floor::B1, Floor::F1, Floor::F4];

impl Engine {
    pub fn new(config: Config, catalog: Catalog) -> Self {
        let mut graphs = HashMap::new();
        let mut hazard_nodes = HashMap::new();
        for floor in ALL_FLOORS {
            graphs.insert(floor, RwLock::new(FloorGraph::new(catalog.original_graph(floor))));
            hazard_nodes.insert(floor, RwLock::new(HashSet::new()));
        }
        Self { config, catalog, graphs, hazard_nodes }
    }

    pub fn graph(&self, floor: Floor) -> &RwLock<FloorGraph> {
        &self.graphs[&floor]
    }

    pub fn hazard_nodes(&self, floor: Floor) -> &RwLock<HashSet<Point>> {
        &self.hazard_nodes[&floor]
    }

    pub async fn toggle_hazard(&self, floor: Floor, node: Point, active: bool) -> Vec<Point> {
        let mut set = self.hazard_nodes(floor).write().await;
        if active {
            set.insert(node);
        } else {
            set.remove(&node);
        }
        set.iter().copied().collect()
    }
}

pub type SharedEngine = Arc<Engine>;
