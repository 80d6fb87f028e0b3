//! Replay a recorded measurement stream as if it came from a live tracker.
//!
//! Input is JSON Lines, one [`Measurement`] per line. A background thread
//! reads the stream and delivers one frame every `frame_interval`, which
//! mimics the cadence of a camera delivery callback.

use crate::sensing::intake::MeasurementSink;
use crate::sensing::types::Measurement;
use crate::sensing::{SensingError, SensingSession};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const PAUSE_POLL: Duration = Duration::from_millis(20);

/// Sensing session backed by a JSON Lines reader.
pub struct ReplaySession {
    reader: Option<Box<dyn BufRead + Send>>,
    sink: MeasurementSink,
    frame_interval: Duration,
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    reading: Arc<AtomicBool>,
    frames_read: Arc<AtomicU64>,
    thread_handle: Option<JoinHandle<()>>,
}

impl ReplaySession {
    /// Create a replay session that delivers into `sink`.
    pub fn new(
        reader: Box<dyn BufRead + Send>,
        sink: MeasurementSink,
        frame_interval: Duration,
    ) -> Self {
        Self {
            reader: Some(reader),
            sink,
            frame_interval,
            running: Arc::new(AtomicBool::new(false)),
            paused: Arc::new(AtomicBool::new(false)),
            reading: Arc::new(AtomicBool::new(false)),
            frames_read: Arc::new(AtomicU64::new(0)),
            thread_handle: None,
        }
    }

    /// Shared flag that reads `false` once the replay has stopped or run out.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Number of measurements parsed so far.
    pub fn frames_read(&self) -> u64 {
        self.frames_read.load(Ordering::Relaxed)
    }
}

impl SensingSession for ReplaySession {
    fn start(&mut self) -> Result<(), SensingError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(SensingError::AlreadyRunning);
        }
        let reader = self.reader.take().ok_or_else(|| {
            SensingError::SetupFailed("replay input has already been consumed".to_string())
        })?;

        self.running.store(true, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);

        let sink = self.sink.clone();
        let flags = ReplayFlags {
            running: self.running.clone(),
            paused: self.paused.clone(),
            reading: self.reading.clone(),
        };
        let frames_read = self.frames_read.clone();
        let frame_interval = self.frame_interval;

        let handle = thread::Builder::new()
            .name("chew-gate-replay".to_string())
            .spawn(move || {
                replay_loop(reader, sink, &flags, &frames_read, frame_interval);
                flags.reading.store(false, Ordering::SeqCst);
                flags.running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                SensingError::SetupFailed(e.to_string())
            })?;

        self.thread_handle = Some(handle);
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
        if let Some(handle) = self.thread_handle.take() {
            // Anywhere but a blocking read the thread sees `running` within one
            // frame interval. A thread blocked on stdin is left to exit on its own.
            if handle.is_finished() || !self.reading.load(Ordering::SeqCst) {
                let _ = handle.join();
            }
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for ReplaySession {
    fn drop(&mut self) {
        self.stop();
    }
}

struct ReplayFlags {
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    reading: Arc<AtomicBool>,
}

fn replay_loop(
    reader: Box<dyn BufRead + Send>,
    sink: MeasurementSink,
    flags: &ReplayFlags,
    frames_read: &AtomicU64,
    frame_interval: Duration,
) {
    let mut lines = reader.lines().enumerate();
    loop {
        // Raised before checking `running` so `stop` either sees the read
        // coming or this check sees the stop.
        flags.reading.store(true, Ordering::SeqCst);
        if !flags.running.load(Ordering::SeqCst) {
            return;
        }
        let next = lines.next();
        flags.reading.store(false, Ordering::SeqCst);

        let Some((line_no, line)) = next else {
            break;
        };

        while flags.paused.load(Ordering::SeqCst) && flags.running.load(Ordering::SeqCst) {
            thread::sleep(PAUSE_POLL);
        }
        if !flags.running.load(Ordering::SeqCst) {
            return;
        }

        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "replay input unreadable, stopping");
                return;
            }
        };
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match serde_json::from_str::<Measurement>(line) {
            Ok(measurement) => {
                frames_read.fetch_add(1, Ordering::Relaxed);
                sink.deliver(measurement);
            }
            Err(e) => {
                tracing::warn!(line = line_no + 1, error = %e, "skipping malformed measurement");
            }
        }

        thread::sleep(frame_interval);
    }
    tracing::info!("replay input exhausted");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensing::intake::SampleIntake;
    use std::io::Cursor;

    fn wait_until_stopped(session: &ReplaySession) {
        for _ in 0..200 {
            if !session.is_running() {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("replay thread did not finish");
    }

    #[test]
    fn test_replay_delivers_and_skips_garbage() {
        let intake = SampleIntake::new();
        intake.open();

        let input = "{\"kind\":\"scalar\",\"value\":0.7}\nnot json\n\n# comment\n";
        let mut session = ReplaySession::new(
            Box::new(Cursor::new(input.to_string())),
            intake.sink(),
            Duration::from_millis(1),
        );
        session.start().unwrap();
        wait_until_stopped(&session);

        assert_eq!(session.frames_read(), 1);
        assert_eq!(intake.take(), Some(Measurement::scalar(0.7)));
    }

    #[test]
    fn test_stop_joins_paused_replay_thread() {
        let intake = SampleIntake::new();
        let input = "{\"kind\":\"scalar\",\"value\":0.7}\n".repeat(100);
        let mut session = ReplaySession::new(
            Box::new(Cursor::new(input)),
            intake.sink(),
            Duration::from_millis(1),
        );
        session.start().unwrap();
        session.pause();
        thread::sleep(Duration::from_millis(30));

        session.stop();
        // Joined: the thread's clone of the flags is gone.
        assert_eq!(Arc::strong_count(&session.reading), 1);
        assert!(!session.is_running());

        let frames = session.frames_read();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(session.frames_read(), frames);
    }

    #[test]
    fn test_replay_cannot_restart_after_input_consumed() {
        let intake = SampleIntake::new();
        let mut session = ReplaySession::new(
            Box::new(Cursor::new(String::new())),
            intake.sink(),
            Duration::from_millis(1),
        );
        session.start().unwrap();
        wait_until_stopped(&session);
        session.stop();

        assert!(matches!(
            session.start(),
            Err(SensingError::SetupFailed(_))
        ));
    }
}
