//! Single-slot hand-off between the sensing delivery context and the tick.
//!
//! A backend delivers frames from its own thread through a [`MeasurementSink`].
//! The slot holds at most one measurement: the first frame after a tick is
//! kept and everything that arrives before the next tick consumes it is
//! dropped. Nothing is ever queued beyond that one slot.

use crate::sensing::types::Measurement;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Cloneable handle a sensing backend uses to deliver frames.
#[derive(Debug, Clone)]
pub struct MeasurementSink {
    sender: Sender<Measurement>,
    open: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
}

impl MeasurementSink {
    /// Offer a measurement for the next tick.
    ///
    /// Returns `false` if the intake is closed (sensing suspended) or the slot
    /// is already occupied.
    pub fn deliver(&self, measurement: Measurement) -> bool {
        if !self.open.load(Ordering::SeqCst) {
            return false;
        }
        match self.sender.try_send(measurement) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Whether the engine is currently accepting measurements.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// Receiving side of the hand-off, owned by the engine.
#[derive(Debug)]
pub struct SampleIntake {
    sink: MeasurementSink,
    receiver: Receiver<Measurement>,
}

impl SampleIntake {
    /// Create a closed intake. The engine opens it when monitoring starts.
    pub fn new() -> Self {
        let (sender, receiver) = bounded(1);
        Self {
            sink: MeasurementSink {
                sender,
                open: Arc::new(AtomicBool::new(false)),
                dropped: Arc::new(AtomicU64::new(0)),
            },
            receiver,
        }
    }

    /// Get a sink to hand to a sensing backend.
    pub fn sink(&self) -> MeasurementSink {
        self.sink.clone()
    }

    /// Take the pending measurement, if one arrived since the last tick.
    pub fn take(&self) -> Option<Measurement> {
        self.receiver.try_recv().ok()
    }

    /// Start accepting measurements. Anything stale in the slot is discarded.
    pub fn open(&self) {
        self.drain();
        self.sink.open.store(true, Ordering::SeqCst);
    }

    /// Stop accepting measurements and discard the slot.
    pub fn close(&self) {
        self.sink.open.store(false, Ordering::SeqCst);
        self.drain();
    }

    pub fn is_open(&self) -> bool {
        self.sink.is_open()
    }

    /// Number of frames dropped because the slot was occupied.
    pub fn dropped(&self) -> u64 {
        self.sink.dropped.load(Ordering::Relaxed)
    }

    fn drain(&self) {
        while self.receiver.try_recv().is_ok() {}
    }
}

impl Default for SampleIntake {
    fn default() -> Self {
        Self::new()
    }
}
