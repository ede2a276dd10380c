//! One-way delay estimation with control-channel compensation
//!
//! Each measurement round for a path collects three inputs:
//!
//! 1. the near switch's (`s1`) statistics reply, giving `ctrl_near = (r1 - t1) / 2`
//! 2. the far switch's statistics reply, giving `ctrl_far = (r2 - t2) / 2`
//! 3. the probe frame coming back through the far switch at `r3`, carrying its
//!    send stamp `d`
//!
//! and commits `r3 - d - ctrl_near - ctrl_far` as the path's delay. Inputs may
//! arrive in any order. Every round has an epoch; statistics requests carry it
//! in their transaction id and probes are matched on their send stamp, so a
//! reply belonging to an abandoned round is rejected instead of mixing
//! timestamps from two rounds.

use sdn_common::{PathId, PerPath, SdnResult, SwitchRole, Tenths};
use serde::Serialize;
use tracing::{debug, warn};

use crate::probe::decode_probe_payload;

const EPOCH_MASK: u32 = 0x7FFF_FFFF;

/// Which end of the path a statistics request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeSide {
    /// Ingress edge switch
    Near,
    /// Aggregation switch of the path
    Far,
}

impl ProbeSide {
    const fn bit(&self) -> u32 {
        match self {
            Self::Near => 0,
            Self::Far => 1,
        }
    }
}

/// Transaction id for a statistics request of round `epoch`
pub const fn stats_xid(epoch: u32, side: ProbeSide) -> u32 {
    ((epoch & EPOCH_MASK) << 1) | side.bit()
}

/// Split a transaction id back into (epoch, side)
pub const fn split_xid(xid: u32) -> (u32, ProbeSide) {
    let side = if xid & 1 == 0 {
        ProbeSide::Near
    } else {
        ProbeSide::Far
    };
    (xid >> 1, side)
}

/// What the controller must send to start a round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeRequest {
    /// Measured path
    pub path: PathId,
    /// Round epoch
    pub epoch: u32,
    /// Transaction id for the near-side statistics request
    pub near_xid: u32,
    /// Transaction id for the far-side statistics request
    pub far_xid: u32,
    /// Stamp to embed in the probe frame
    pub stamp: u32,
}

/// A committed delay estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DelaySample {
    /// Measured path
    pub path: PathId,
    /// Round epoch
    pub epoch: u32,
    /// One-way data-plane delay in ms
    pub delay_ms: f64,
    /// Estimated controller to near switch latency in ms
    pub ctrl_near_ms: f64,
    /// Estimated controller to far switch latency in ms
    pub ctrl_far_ms: f64,
    /// Raw value was negative and got clamped to zero
    pub clamped: bool,
}

/// Why an input was not attributed to the outstanding round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// No outstanding round has this epoch
    UnknownEpoch,
    /// Reply came from a switch that is not that side of the round's path
    WrongSwitch,
    /// This input was already recorded for the round
    Duplicate,
    /// Probe stamp does not match the outstanding probe
    StampMismatch,
    /// Probe surfaced on a switch that terminates no path
    NotAggregation,
}

/// Outcome of feeding one input to the estimator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measurement {
    /// Recorded; round still waiting for other inputs
    Pending,
    /// Round complete, estimate replaced
    Completed(DelaySample),
    /// Input discarded
    Stale(StaleReason),
}

#[derive(Debug, Clone, Copy)]
struct ProbeRound {
    epoch: u32,
    sent_at: Tenths,
    stamp: u32,
    ctrl_near: Option<f64>,
    ctrl_far: Option<f64>,
    arrival: Option<Tenths>,
}

impl ProbeRound {
    fn ctrl_slot(&mut self, side: ProbeSide) -> &mut Option<f64> {
        match side {
            ProbeSide::Near => &mut self.ctrl_near,
            ProbeSide::Far => &mut self.ctrl_far,
        }
    }
}

/// Delay estimator for the three paths
#[derive(Debug)]
pub struct DelayEstimator {
    delays: PerPath<f64>,
    rounds: [Option<ProbeRound>; 3],
    next_epoch: u32,
}

impl DelayEstimator {
    /// Create with every delay at zero
    pub fn new() -> Self {
        Self {
            delays: PerPath::splat(0.0),
            rounds: [None; 3],
            next_epoch: 1,
        }
    }

    /// Current estimates in ms
    pub fn delays(&self) -> PerPath<f64> {
        self.delays
    }

    /// Current estimate for one path in ms
    pub fn delay(&self, path: PathId) -> f64 {
        self.delays.get(path)
    }

    /// Whether a round is outstanding for `path`
    pub fn in_flight(&self, path: PathId) -> bool {
        self.rounds[path.index()].is_some()
    }

    /// Open a new round for `path`; requests and probe are sent at `now`
    ///
    /// An unfinished round for the same path is abandoned.
    pub fn begin(&mut self, path: PathId, now: Tenths) -> ProbeRequest {
        let epoch = self.next_epoch;
        self.next_epoch = (self.next_epoch + 1) & EPOCH_MASK;
        if self.next_epoch == 0 {
            self.next_epoch = 1;
        }

        if let Some(old) = self.rounds[path.index()] {
            debug!(%path, epoch = old.epoch, "abandoning unfinished probe round");
        }

        let stamp = now.probe_stamp();
        self.rounds[path.index()] = Some(ProbeRound {
            epoch,
            sent_at: now,
            stamp,
            ctrl_near: None,
            ctrl_far: None,
            arrival: None,
        });

        ProbeRequest {
            path,
            epoch,
            near_xid: stats_xid(epoch, ProbeSide::Near),
            far_xid: stats_xid(epoch, ProbeSide::Far),
            stamp,
        }
    }

    /// Drop every outstanding round
    pub fn abandon_all(&mut self) {
        self.rounds = [None; 3];
    }

    /// Feed a statistics reply from `switch` received at `now`
    pub fn record_stats_reply(&mut self, switch: SwitchRole, xid: u32, now: Tenths) -> Measurement {
        let (epoch, side) = split_xid(xid);
        let Some(path) = self.path_for_epoch(epoch) else {
            return Measurement::Stale(StaleReason::UnknownEpoch);
        };

        let expected = match side {
            ProbeSide::Near => SwitchRole::S1,
            ProbeSide::Far => path.aggregation_switch(),
        };
        if switch != expected {
            return Measurement::Stale(StaleReason::WrongSwitch);
        }

        let Some(round) = self.rounds[path.index()].as_mut() else {
            return Measurement::Stale(StaleReason::UnknownEpoch);
        };
        let sent_at = round.sent_at;
        let slot = round.ctrl_slot(side);
        if slot.is_some() {
            return Measurement::Stale(StaleReason::Duplicate);
        }
        *slot = Some(0.5 * now.delta(sent_at));

        self.try_complete(path)
    }

    /// Feed a probe that surfaced at `switch` at `now`
    ///
    /// Fails only when the payload cannot be decoded.
    pub fn record_probe(&mut self, switch: SwitchRole, payload: &[u8], now: Tenths) -> SdnResult<Measurement> {
        let stamp = decode_probe_payload(payload)?;
        let Some(path) = switch.aggregated_path() else {
            return Ok(Measurement::Stale(StaleReason::NotAggregation));
        };
        let Some(round) = self.rounds[path.index()].as_mut() else {
            return Ok(Measurement::Stale(StaleReason::UnknownEpoch));
        };
        if round.stamp != stamp {
            return Ok(Measurement::Stale(StaleReason::StampMismatch));
        }
        if round.arrival.is_some() {
            return Ok(Measurement::Stale(StaleReason::Duplicate));
        }
        round.arrival = Some(now);

        Ok(self.try_complete(path))
    }

    fn path_for_epoch(&self, epoch: u32) -> Option<PathId> {
        PathId::ALL
            .into_iter()
            .find(|p| self.rounds[p.index()].map(|r| r.epoch) == Some(epoch))
    }

    fn try_complete(&mut self, path: PathId) -> Measurement {
        let Some(round) = self.rounds[path.index()] else {
            return Measurement::Pending;
        };
        let (Some(ctrl_near), Some(ctrl_far), Some(arrival)) = (round.ctrl_near, round.ctrl_far, round.arrival) else {
            return Measurement::Pending;
        };

        let raw = arrival.since_stamp(round.stamp) as f64 - ctrl_near - ctrl_far;
        let clamped = raw < 0.0;
        if clamped {
            warn!(%path, epoch = round.epoch, raw_tenths = raw, "negative delay estimate clamped to zero");
        }
        let per_ms = Tenths::PER_MS as f64;
        let sample = DelaySample {
            path,
            epoch: round.epoch,
            delay_ms: raw.max(0.0) / per_ms,
            ctrl_near_ms: ctrl_near / per_ms,
            ctrl_far_ms: ctrl_far / per_ms,
            clamped,
        };

        self.delays.set(path, sample.delay_ms);
        self.rounds[path.index()] = None;
        Measurement::Completed(sample)
    }
}

impl Default for DelayEstimator {
    fn default() -> Self {
        Self::new()
    }
}
