//! Diamond SDN Common - Shared types for the delay-aware controller
//!
//! This crate provides the vocabulary every other crate speaks:
//! - Fixed diamond topology (switch roles, hosts, the three parallel paths)
//! - Flow keys, intents, routes and per-path flow counts
//! - Control-channel commands and events exchanged with the switches
//! - Error handling
//!
//! # Topology
//!
//! ```text
//!             ┌──── s2 ────┐
//!  h1 ─┐      │  (path A)  │      ┌─ h4
//!  h2 ─┼─ s1 ─┼──── s3 ────┼─ s5 ─┼─ h5
//!  h3 ─┘      │  (path B)  │      └─ h6
//!             └──── s4 ────┘
//!                (path C)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod flow;
pub mod openflow;
pub mod topology;

pub use error::*;
pub use flow::*;
pub use openflow::*;
pub use topology::*;

use serde::{Deserialize, Serialize};

/// Controller-local time in tenths of a millisecond since controller start
///
/// Probe frames embed the low 32 bits of this clock, so differences against
/// an embedded stamp go through [`Tenths::since_stamp`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Tenths(pub u64);

impl Tenths {
    /// Tenths per millisecond
    pub const PER_MS: u64 = 10;

    /// 32-bit stamp carried in probe frames
    #[inline]
    pub const fn probe_stamp(&self) -> u32 {
        self.0 as u32
    }

    /// Ticks elapsed since a 32-bit probe stamp, tolerating wrap-around
    #[inline]
    pub const fn since_stamp(&self, stamp: u32) -> u64 {
        self.probe_stamp().wrapping_sub(stamp) as u64
    }

    /// Signed difference `self - earlier` in ticks
    #[inline]
    pub fn delta(&self, earlier: Tenths) -> f64 {
        self.0 as f64 - earlier.0 as f64
    }
}

impl std::ops::Add<u64> for Tenths {
    type Output = Tenths;

    fn add(self, rhs: u64) -> Tenths {
        Tenths(self.0 + rhs)
    }
}
