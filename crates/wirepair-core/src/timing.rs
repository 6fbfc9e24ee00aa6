//! Protocol timing configuration
//!
//! Every duration the protocol depends on lives here: nominal signal
//! lengths, the classification tolerance, contention-slot range, settle and
//! echo windows, per-state timeouts, and both workers' poll periods.
//!
//! The exact values are configuration, not contract. The only hard
//! invariant is separation: nominal signal durations must sit far enough
//! apart that their ±tolerance windows cannot overlap, and the echo window
//! must stay below the smallest legitimate inter-signal gap. [`validate`]
//! enforces both.
//!
//! [`validate`]: SignalTiming::validate

use std::time::Duration;

use rand::Rng;

use crate::error::TimingError;
use crate::signal::SignalKind;

/// All protocol timings for one controller
#[derive(Debug, Clone)]
pub struct SignalTiming {
    /// Nominal SYN high-time
    pub syn: Duration,
    /// Nominal SYN_ACK high-time
    pub syn_ack: Duration,
    /// Nominal ACK high-time
    pub ack: Duration,
    /// Classification window half-width around each nominal duration
    pub tolerance: Duration,
    /// Upper bound of the randomized contention slot
    pub slot_max: Duration,
    /// Contention slots are quantized to multiples of this step
    pub slot_step: Duration,
    /// Idle delay between receiving a signal and answering it
    pub settle: Duration,
    /// Decoded events this close after our own release are our own echo
    pub echo_window: Duration,
    /// How long MAYBE_RESPONDER waits for a decoded SYN
    pub responder_timeout: Duration,
    /// How long INITIATOR waits for a decoded SYN_ACK
    pub syn_ack_timeout: Duration,
    /// How long RESPONDER waits for a decoded ACK
    pub ack_timeout: Duration,
    /// PASSIVE_RESPONDER grace period before the engine exits
    pub grace_period: Duration,
    /// Monitor poll period (level sampling)
    pub monitor_poll: Duration,
    /// Engine poll period (wait-loop tick)
    pub engine_poll: Duration,
    /// MAYBE_RESPONDER timeouts on one line before it is disturbed
    pub max_false_responses: u32,
}

impl Default for SignalTiming {
    fn default() -> Self {
        Self {
            syn: Duration::from_millis(500),
            syn_ack: Duration::from_millis(1000),
            ack: Duration::from_millis(1500),
            tolerance: Duration::from_millis(100),
            slot_max: Duration::from_millis(1000),
            slot_step: Duration::from_millis(10),
            settle: Duration::from_millis(50),
            echo_window: Duration::from_millis(200),
            responder_timeout: Duration::from_millis(2000),
            syn_ack_timeout: Duration::from_millis(2000),
            ack_timeout: Duration::from_millis(2500),
            grace_period: Duration::from_millis(3000),
            monitor_poll: Duration::from_millis(1),
            engine_poll: Duration::from_micros(100),
            max_false_responses: 2,
        }
    }
}

impl SignalTiming {
    /// A 5x faster preset for tests and quick demo runs
    ///
    /// Windows stay disjoint and every window stays wide relative to the
    /// poll periods, so classification behaves the same as at full speed.
    pub fn accelerated() -> Self {
        Self {
            syn: Duration::from_millis(100),
            syn_ack: Duration::from_millis(200),
            ack: Duration::from_millis(300),
            tolerance: Duration::from_millis(40),
            slot_max: Duration::from_millis(200),
            slot_step: Duration::from_millis(10),
            settle: Duration::from_millis(20),
            echo_window: Duration::from_millis(40),
            responder_timeout: Duration::from_millis(800),
            syn_ack_timeout: Duration::from_millis(800),
            ack_timeout: Duration::from_millis(1000),
            grace_period: Duration::from_millis(1000),
            monitor_poll: Duration::from_micros(500),
            engine_poll: Duration::from_micros(100),
            max_false_responses: 2,
        }
    }

    /// Nominal high-time of a signal kind
    pub fn nominal(&self, kind: SignalKind) -> Duration {
        match kind {
            SignalKind::Syn => self.syn,
            SignalKind::SynAck => self.syn_ack,
            SignalKind::Ack => self.ack,
        }
    }

    /// Classify a measured high-time into a signal kind
    ///
    /// First match wins, in SYN, SYN_ACK, ACK order. Pulses outside every
    /// window classify as nothing.
    pub fn classify(&self, measured: Duration) -> Option<SignalKind> {
        for kind in [SignalKind::Syn, SignalKind::SynAck, SignalKind::Ack] {
            if measured.abs_diff(self.nominal(kind)) <= self.tolerance {
                return Some(kind);
            }
        }
        None
    }

    /// Draw a uniformly random contention slot, quantized to `slot_step`
    pub fn draw_slot(&self) -> Duration {
        let steps = (self.slot_max.as_millis() / self.slot_step.as_millis().max(1)) as u32;
        self.slot_step * rand::rng().random_range(0..=steps)
    }

    /// Check the separation invariants
    pub fn validate(&self) -> Result<(), TimingError> {
        for (field, value) in [
            ("syn", self.syn),
            ("syn_ack", self.syn_ack),
            ("ack", self.ack),
            ("tolerance", self.tolerance),
            ("slot_step", self.slot_step),
            ("monitor_poll", self.monitor_poll),
            ("engine_poll", self.engine_poll),
        ] {
            if value.is_zero() {
                return Err(TimingError::ZeroDuration { field });
            }
        }

        if self.syn + self.tolerance >= self.syn_ack.saturating_sub(self.tolerance) {
            return Err(TimingError::OverlappingWindows {
                first: SignalKind::Syn,
                second: SignalKind::SynAck,
            });
        }
        if self.syn_ack + self.tolerance >= self.ack.saturating_sub(self.tolerance) {
            return Err(TimingError::OverlappingWindows {
                first: SignalKind::SynAck,
                second: SignalKind::Ack,
            });
        }

        // The smallest legitimate gap between our release and a peer's
        // response reaching the decoder is the settle delay plus the
        // shortest signal. An echo window at or past it would eat real
        // peer signals.
        let min_gap = self.settle + self.syn;
        if self.echo_window >= min_gap {
            return Err(TimingError::EchoWindowTooWide {
                echo_window: self.echo_window,
                min_gap,
            });
        }

        if self.max_false_responses == 0 {
            return Err(TimingError::ZeroFalseResponseCeiling);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_and_accelerated_are_valid() {
        SignalTiming::default().validate().unwrap();
        SignalTiming::accelerated().validate().unwrap();
    }

    #[test]
    fn test_classify_within_tolerance() {
        let timing = SignalTiming::default();
        assert_eq!(
            timing.classify(Duration::from_millis(500)),
            Some(SignalKind::Syn)
        );
        assert_eq!(
            timing.classify(Duration::from_millis(420)),
            Some(SignalKind::Syn)
        );
        assert_eq!(
            timing.classify(Duration::from_millis(600)),
            Some(SignalKind::Syn)
        );
        assert_eq!(
            timing.classify(Duration::from_millis(1080)),
            Some(SignalKind::SynAck)
        );
        assert_eq!(
            timing.classify(Duration::from_millis(1470)),
            Some(SignalKind::Ack)
        );
    }

    #[test]
    fn test_classify_outside_tolerance() {
        let timing = SignalTiming::default();
        assert_eq!(timing.classify(Duration::from_millis(250)), None);
        assert_eq!(timing.classify(Duration::from_millis(750)), None);
        assert_eq!(timing.classify(Duration::from_millis(1250)), None);
        assert_eq!(timing.classify(Duration::from_millis(2000)), None);
        assert_eq!(timing.classify(Duration::ZERO), None);
    }

    #[test]
    fn test_draw_slot_is_quantized_and_bounded() {
        let timing = SignalTiming::default();
        for _ in 0..100 {
            let slot = timing.draw_slot();
            assert!(slot <= timing.slot_max);
            assert_eq!(slot.as_millis() % timing.slot_step.as_millis(), 0);
        }
    }

    #[test]
    fn test_draw_slot_zero_range() {
        let timing = SignalTiming {
            slot_max: Duration::ZERO,
            ..SignalTiming::accelerated()
        };
        assert_eq!(timing.draw_slot(), Duration::ZERO);
    }

    #[test]
    fn test_overlapping_windows_rejected() {
        let timing = SignalTiming {
            tolerance: Duration::from_millis(300),
            ..SignalTiming::default()
        };
        assert!(matches!(
            timing.validate(),
            Err(TimingError::OverlappingWindows { .. })
        ));
    }

    #[test]
    fn test_echo_window_bound() {
        let timing = SignalTiming {
            echo_window: Duration::from_millis(600),
            ..SignalTiming::default()
        };
        assert!(matches!(
            timing.validate(),
            Err(TimingError::EchoWindowTooWide { .. })
        ));
    }
}
