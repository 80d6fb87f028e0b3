//! Sensing backends for the chew gate.
//!
//! A backend owns whatever produces frames (camera pipeline, face tracker,
//! recorded session) and pushes one [`Measurement`] per frame into a
//! [`MeasurementSink`]. The engine is the only party that starts, pauses,
//! resumes, or stops a session.

pub mod intake;
pub mod noop;
pub mod replay;
pub mod types;

use thiserror::Error;

// Re-export commonly used types
pub use intake::{MeasurementSink, SampleIntake};
pub use noop::NoopSession;
pub use replay::ReplaySession;
pub use types::{Measurement, Point};

/// Lifecycle of an external sensing session.
pub trait SensingSession: Send {
    /// Acquire the device and begin delivering frames.
    fn start(&mut self) -> Result<(), SensingError>;

    /// Stop delivering frames without releasing the device.
    fn pause(&mut self);

    /// Continue delivering frames after `pause`.
    fn resume(&mut self) -> Result<(), SensingError>;

    /// Stop delivering frames and release the device.
    fn stop(&mut self);

    /// Whether the session is started and not yet stopped.
    fn is_running(&self) -> bool;
}

impl<S: SensingSession + ?Sized> SensingSession for Box<S> {
    fn start(&mut self) -> Result<(), SensingError> {
        (**self).start()
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn resume(&mut self) -> Result<(), SensingError> {
        (**self).resume()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn is_running(&self) -> bool {
        (**self).is_running()
    }
}

/// Errors that can occur while driving a sensing session.
#[derive(Debug, Error)]
pub enum SensingError {
    #[error("Sensing session is already running")]
    AlreadyRunning,

    #[error("Sensing session is not running")]
    NotRunning,

    #[error("No compatible sensing device: {0}")]
    Unavailable(String),

    #[error("Sensing session setup failed: {0}")]
    SetupFailed(String),
}
