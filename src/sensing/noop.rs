//! A sensing session with no device behind it.
//!
//! Useful when measurements are pushed into the sink by the caller directly
//! (tests, embedding applications that run their own tracker).

use crate::sensing::{SensingError, SensingSession};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A session that never delivers frames on its own.
#[derive(Debug)]
pub struct NoopSession {
    available: bool,
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
}

impl NoopSession {
    /// Create a session that starts successfully.
    pub fn new() -> Self {
        Self {
            available: true,
            running: Arc::new(AtomicBool::new(false)),
            paused: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a session whose device is missing, so `start` always fails.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Shared flag that reads `true` while the session is paused.
    pub fn paused_flag(&self) -> Arc<AtomicBool> {
        self.paused.clone()
    }

    /// Shared flag that reads `true` while the session is running.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }
}

impl Default for NoopSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SensingSession for NoopSession {
    fn start(&mut self) -> Result<(), SensingError> {
        if !self.available {
            return Err(SensingError::Unavailable("no device attached".to_string()));
        }
        if self.running.load(Ordering::SeqCst) {
            return Err(SensingError::AlreadyRunning);
        }
        self.paused.store(false, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&mut self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&mut self) -> Result<(), SensingError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(SensingError::NotRunning);
        }
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_lifecycle() {
        let mut session = NoopSession::new();
        assert!(!session.is_running());
        session.start().unwrap();
        assert!(session.is_running());
        assert!(matches!(session.start(), Err(SensingError::AlreadyRunning)));

        session.pause();
        assert!(session.paused_flag().load(Ordering::SeqCst));
        session.resume().unwrap();
        assert!(!session.paused_flag().load(Ordering::SeqCst));

        session.stop();
        assert!(!session.is_running());
        assert!(matches!(session.resume(), Err(SensingError::NotRunning)));
    }

    #[test]
    fn test_unavailable_device() {
        let mut session = NoopSession::unavailable();
        assert!(matches!(session.start(), Err(SensingError::Unavailable(_))));
        assert!(!session.is_running());
    }
}
