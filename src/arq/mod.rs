//! Stop-and-wait ARQ.
//!
//! Every outbound flow owns a [`StopWaitTx`], every inbound flow a
//! [`StopWaitRx`]. The transmitter runs as a tokio task that keeps at most
//! one PDU in flight; the receiver is a plain state machine driven by the
//! flow.

mod rx;
mod tx;

pub use rx::{FrameVerdict, RxOutcome, StopWaitRx};
pub use tx::StopWaitTx;

use parking_lot::Mutex;

use crate::core::{ArqStats, StatsMode};

/// Transmitter state of the PDU currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArqState {
    /// No PDU taken yet.
    #[default]
    Idle,
    /// Queued below, waiting for the lower layer to send it.
    WaitingForTx,
    /// Sent by the lower layer.
    TxOver,
    /// Waiting for the matching acknowledgment.
    WaitingForAck,
    /// Acknowledged, lost or sent unreliably.
    Finished,
    /// Acknowledgment timed out; a retransmission follows.
    Timeout,
}

/// Running and total counters of one engine.
#[derive(Debug, Default)]
pub(crate) struct ArqCounters {
    total: ArqStats,
    snapshot: ArqStats,
}

impl ArqCounters {
    pub(crate) fn total_mut(&mut self) -> &mut ArqStats {
        &mut self.total
    }

    /// Running reads return the delta since the previous running read.
    pub(crate) fn read(&mut self, mode: StatsMode) -> ArqStats {
        match mode {
            StatsMode::Total => self.total.clone().with_total_fer(),
            StatsMode::Running => {
                let window = self.total.since(&self.snapshot);
                self.snapshot = self.total.clone();
                window
            }
        }
    }
}

/// The ARQ engine attached to a flow.
#[derive(Debug)]
pub enum ArqEngine {
    /// Outbound side.
    Transmitter(StopWaitTx),
    /// Inbound side.
    Receiver(StopWaitRx),
}

impl ArqEngine {
    /// Statistics over the requested window.
    pub fn stats(&self, mode: StatsMode) -> ArqStats {
        self.counters().lock().read(mode)
    }

    pub(crate) fn counters(&self) -> &Mutex<ArqCounters> {
        match self {
            ArqEngine::Transmitter(tx) => tx.counters(),
            ArqEngine::Receiver(rx) => rx.counters(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_window_resets() {
        let mut counters = ArqCounters::default();
        counters.total_mut().pdus_for_below = 3;

        assert_eq!(counters.read(StatsMode::Running).pdus_for_below, 3);
        assert_eq!(counters.read(StatsMode::Running).pdus_for_below, 0);

        counters.total_mut().pdus_for_below += 2;
        assert_eq!(counters.read(StatsMode::Total).pdus_for_below, 5);
        assert_eq!(counters.read(StatsMode::Running).pdus_for_below, 2);
    }

    #[test]
    fn test_total_fer() {
        let mut counters = ArqCounters::default();
        counters.total_mut().sdus_for_above = 4;
        counters.total_mut().lost_pdus = 1;

        let stats = counters.read(StatsMode::Total);
        assert!((stats.fer - 0.2).abs() < 1e-9);
    }
}
