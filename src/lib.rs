//! Chew Gate - keep media playing only while the viewer keeps chewing.
//!
//! This library watches a per-frame mouth-movement signal, counts distinct
//! chews over a rolling window, and decides whether playback may continue.
//! A compliant window earns an uninterrupted reward during which sensing is
//! paused; once the reward runs out the engine checks that playback is still
//! active before it starts watching again.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            Chew Gate                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐            │
//! │  │   Sensing   │──▶│   Signal    │──▶│  Windowing  │            │
//! │  │  (frames)   │   │ (movement?) │   │ (5s, edges) │            │
//! │  └─────────────┘   └─────────────┘   └─────────────┘            │
//! │         ▲                                   │ verdict           │
//! │         │ pause/resume                      ▼                   │
//! │  ┌─────────────┐                     ┌─────────────┐            │
//! │  │  Scheduler  │◀────────────────────│   Reward    │──▶ state   │
//! │  │ (tick/wait) │   start/cancel wait │   Machine   │──▶ progress│
//! │  └─────────────┘                     └─────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use chew_gate::{ChewEngine, Config, Measurement, NoopSession, SampleIntake};
//!
//! # async fn run() -> Result<(), chew_gate::EngineError> {
//! let intake = SampleIntake::new();
//! let sink = intake.sink();
//! let engine = ChewEngine::new(Config::default(), intake, NoopSession::new())
//!     .with_playback_probe(|| async { true });
//! engine.start()?;
//!
//! // From the tracker's delivery thread:
//! sink.deliver(Measurement::scalar(0.8));
//!
//! let mut state = engine.subscribe_state();
//! state.changed().await.ok();
//! println!("playback allowed: {}", state.borrow().allows_playback());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod engine;
pub mod scheduler;
pub mod sensing;
pub mod signal;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError, CountPolicy, SignalKind};
pub use core::{ChewState, RewardStateMachine, WindowAggregator, WindowVerdict};
pub use engine::{ChewEngine, EngineError, PlaybackProbe, PROBE_TIMEOUT};
pub use scheduler::{CancelToken, Scheduler};
pub use sensing::{
    Measurement, MeasurementSink, NoopSession, Point, ReplaySession, SampleIntake, SensingError,
    SensingSession,
};
pub use signal::{AreaRatioSignal, SignalSource, ThresholdSignal};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Declaration of what the gate observes, suitable for showing to users.
pub const GATING_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║                   CHEW GATE - WHAT IS OBSERVED                   ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  Playback continues only while you keep chewing.                 ║
║                                                                  ║
║  ✓ WHAT WE USE:                                                  ║
║    • How far your jaw is open, or the area of your mouth         ║
║    • Whether that changed since the previous frame               ║
║    • How many distinct chews happened in the current window      ║
║                                                                  ║
║  ✗ WHAT WE NEVER KEEP:                                           ║
║    • Camera images or face landmarks                             ║
║    • Who you are, or anyone else in the frame                    ║
║    • Chew counts from earlier windows                            ║
║                                                                  ║
║  Nothing leaves this device. Counts are discarded every time     ║
║  a window closes.                                                ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gating_declaration_contents() {
        assert!(GATING_DECLARATION.contains("CHEW GATE"));
        assert!(GATING_DECLARATION.contains("NEVER KEEP"));
        assert!(GATING_DECLARATION.contains("Camera images"));
    }
}
