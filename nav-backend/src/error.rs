//! Domain error type for the positioning/planning core.
//!
//! Recoverable, typed failures live here; start-up plumbing (catalog load,
//! socket bind) uses `anyhow` instead, the same split the rest of this
//! codebase makes between "this has a meaning the caller should branch on"
//! and "this should simply not fail, and if it does we log and move on".

use thiserror::Error;

use crate::graph::Point;

#[derive(Debug, Error)]
pub enum NavError {
    #[error("no feasible trilateration for anchors {0:?}")]
    Infeasible(Vec<(i32, i32, f64)>),

    #[error("point lies in more than one zone on floor {floor}: {zones:?}")]
    Overlap { floor: String, zones: Vec<String> },

    #[error("unknown {kind} id: {id}")]
    Unknown { kind: &'static str, id: String },

    #[error("could not parse node coordinate: {0}")]
    Parse(String),

    #[error("node {0:?} is fire-blocked and cannot be restored")]
    Blocked(Point),

    #[error("no reachable target from {0:?}")]
    NotFound(Point),
}
