//! Statistics reported by flows and the encoder.

/// Which window a statistics read covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatsMode {
    /// Counts since the previous running read.
    #[default]
    Running,
    /// Counts since the flow was created.
    Total,
}

/// Per-flow ARQ counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArqStats {
    /// SDUs accepted from the upper layer.
    pub sdus_from_above: u64,
    /// SDUs delivered to the upper layer.
    pub sdus_for_above: u64,
    /// PDUs handed to the engine from below.
    pub pdus_from_below: u64,
    /// PDUs queued for the lower layer (including retransmissions and acks).
    pub pdus_for_below: u64,
    /// Retransmissions.
    pub retransmitted_pdus: u64,
    /// PDUs given up on (transmitter) or skipped over (receiver).
    pub lost_pdus: u64,
    /// Payload bytes accepted from the upper layer.
    pub bytes_from_above: u64,
    /// Payload bytes delivered to the upper layer.
    pub bytes_for_above: u64,
    /// Frame error rate over the window.
    pub fer: f64,
}

impl ArqStats {
    /// `lost / (lost + delivered)`, or `0.0` with nothing to report.
    pub fn frame_error_rate(delivered: u64, lost: u64) -> f64 {
        let total = delivered + lost;
        if total == 0 {
            0.0
        } else {
            lost as f64 / total as f64
        }
    }

    /// Counters accumulated since `snapshot`, with the FER recomputed over
    /// that window.
    pub fn since(&self, snapshot: &ArqStats) -> ArqStats {
        let sdus_for_above = self.sdus_for_above.saturating_sub(snapshot.sdus_for_above);
        let lost_pdus = self.lost_pdus.saturating_sub(snapshot.lost_pdus);
        ArqStats {
            sdus_from_above: self.sdus_from_above.saturating_sub(snapshot.sdus_from_above),
            sdus_for_above,
            pdus_from_below: self.pdus_from_below.saturating_sub(snapshot.pdus_from_below),
            pdus_for_below: self.pdus_for_below.saturating_sub(snapshot.pdus_for_below),
            retransmitted_pdus: self
                .retransmitted_pdus
                .saturating_sub(snapshot.retransmitted_pdus),
            lost_pdus,
            bytes_from_above: self.bytes_from_above.saturating_sub(snapshot.bytes_from_above),
            bytes_for_above: self.bytes_for_above.saturating_sub(snapshot.bytes_for_above),
            fer: Self::frame_error_rate(sdus_for_above, lost_pdus),
        }
    }

    /// Same counters with the FER computed over the whole lifetime.
    pub fn with_total_fer(mut self) -> ArqStats {
        self.fer = Self::frame_error_rate(self.sdus_for_above, self.lost_pdus);
        self
    }
}

/// Byte and frame counters of a facade instance's codec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncoderStats {
    /// Payload bytes accepted from the upper layer.
    pub bytes_from_above: u64,
    /// Encoded bytes received from the lower layer.
    pub bytes_from_below: u64,
    /// Payload bytes handed to the upper layer.
    pub bytes_for_above: u64,
    /// Encoded bytes handed to the lower layer.
    pub bytes_for_below: u64,
    /// Frames handed to the lower layer.
    pub frames_for_below: u64,
    /// Frames received from the lower layer.
    pub frames_from_below: u64,
    /// Frames dropped because they failed to decode.
    pub decode_errors: u64,
}

/// Combined view returned by the facade.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowStats {
    /// ARQ counters of the flow.
    pub arq: ArqStats,
    /// Encoder counters of the facade.
    pub encoder: EncoderStats,
}
