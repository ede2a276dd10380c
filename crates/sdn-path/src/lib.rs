//! Delay-aware path control for the diamond fabric
//!
//! # Features
//!
//! - Active one-way delay probing with control-channel compensation
//! - Epoch-correlated measurement rounds (stale replies are rejected)
//! - SLA-aware greedy intent placement with flow-count balancing
//! - Minimal flow reconciliation (add new keys, modify moved keys)
//! - Immediate admission of flows without an intent

#![warn(missing_docs)]

pub mod admission;
pub mod estimator;
pub mod probe;
pub mod reconciler;
pub mod routing;
pub mod scheduler;
pub mod selector;

pub use admission::{admission_path, AdHocFlows};
pub use estimator::{DelayEstimator, DelaySample, Measurement, ProbeRequest, StaleReason};
pub use probe::{decode_probe_payload, encode_probe_frame};
pub use reconciler::{reconcile, route_flow_mods, teardown_flow_mods, FlowOp};
pub use routing::RoutingState;
pub use scheduler::{ProbePhase, ProbeScheduler};
pub use selector::{select_paths, PathAssignment, PathRanking};
