//! Diamond SDN Controller - Delay-aware intent routing
//!
//! Measures the one-way delay of the three parallel paths through the
//! diamond, places every declared intent on a path that meets its delay
//! budget while keeping per-path flow counts balanced, and admits flows
//! without an intent on first sight.
//!
//! # Architecture
//!
//! ```text
//!  switch events ──► mpsc ──► ControllerRuntime ──► Controller::handle
//!                                  ▲    │                  │
//!                         interval ┘    └── ControlChannel ◄┘ commands
//! ```

#![warn(missing_docs)]

pub mod channel;
pub mod config;
pub mod controller;
pub mod counters;
pub mod emulator;
pub mod forwarding;
pub mod runtime;

pub use channel::ControlChannel;
pub use config::{ControllerConfig, EmulatorConfig};
pub use controller::{Controller, ControllerSnapshot, SwitchRegistry};
pub use emulator::{emulated_dpid, EmulatedFabric};
pub use runtime::{ControllerClock, ControllerRuntime};
