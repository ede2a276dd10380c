//! Round-robin probe scheduler
//!
//! One phase runs per timer tick:
//! `MeasurePathA → MeasurePathB → MeasurePathC → Recompute → MeasurePathA …`

use sdn_common::PathId;
use serde::Serialize;
use std::fmt;

/// Scheduler phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProbePhase {
    /// Probe path A
    MeasurePathA,
    /// Probe path B
    MeasurePathB,
    /// Probe path C
    MeasurePathC,
    /// Re-run path selection and reconcile flows
    Recompute,
}

impl ProbePhase {
    /// Phase following this one
    pub const fn next(&self) -> Self {
        match self {
            Self::MeasurePathA => Self::MeasurePathB,
            Self::MeasurePathB => Self::MeasurePathC,
            Self::MeasurePathC => Self::Recompute,
            Self::Recompute => Self::MeasurePathA,
        }
    }

    /// Path probed in this phase
    pub const fn path(&self) -> Option<PathId> {
        match self {
            Self::MeasurePathA => Some(PathId::A),
            Self::MeasurePathB => Some(PathId::B),
            Self::MeasurePathC => Some(PathId::C),
            Self::Recompute => None,
        }
    }
}

impl Default for ProbePhase {
    fn default() -> Self {
        Self::MeasurePathA
    }
}

impl fmt::Display for ProbePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.path() {
            Some(path) => write!(f, "measure {}", path),
            None => f.write_str("recompute"),
        }
    }
}

/// Scheduler state; idle until started
#[derive(Debug, Default)]
pub struct ProbeScheduler {
    phase: ProbePhase,
    running: bool,
    generation: u64,
}

impl ProbeScheduler {
    /// Idle scheduler at `MeasurePathA`
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from `MeasurePathA` in a new generation; no-op when running
    pub fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        self.phase = ProbePhase::MeasurePathA;
        self.generation += 1;
        true
    }

    /// Stop issuing phases; returns whether it was running
    pub fn stop(&mut self) -> bool {
        std::mem::replace(&mut self.running, false)
    }

    /// Whether ticks produce phases
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Incremented on every start
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Phase the next tick will run
    pub fn phase(&self) -> ProbePhase {
        self.phase
    }

    /// Timer tick: phase to execute now, advancing the cycle
    pub fn tick(&mut self) -> Option<ProbePhase> {
        if !self.running {
            return None;
        }
        let current = self.phase;
        self.phase = current.next();
        Some(current)
    }
}
