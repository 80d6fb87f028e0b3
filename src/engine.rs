//! The chew gate engine.
//!
//! Wires a sensing session, a signal source, the window aggregator and the
//! reward state machine to a per-instance [`Scheduler`]. All mutable state
//! lives in one mutex-guarded core, so ticks, expiry continuations and
//! lifecycle calls are serialized and never race each other.
//!
//! Consumers observe the gate through two watch channels: the current
//! [`ChewState`] and the progress counter in seconds.

use crate::config::Config;
use crate::core::{ChewState, Effect, RewardStateMachine, WindowAggregator};
use crate::scheduler::{CancelToken, Scheduler};
use crate::sensing::{MeasurementSink, SampleIntake, SensingError, SensingSession};
use crate::signal::{self, SignalSource};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Future returned by a [`PlaybackProbe`].
pub type ProbeFuture = Pin<Box<dyn Future<Output = bool> + Send + 'static>>;

/// Asks the media consumer whether playback is still active.
///
/// Called once each time a reward expires. A probe that panics, either when
/// called or while its future runs, counts as `false`. So does one that has
/// not answered after [`PROBE_TIMEOUT`].
pub trait PlaybackProbe: Send + Sync {
    fn playback_is_active(&self) -> ProbeFuture;
}

impl<F, Fut> PlaybackProbe for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send + 'static,
{
    fn playback_is_active(&self) -> ProbeFuture {
        Box::pin(self())
    }
}

/// Errors returned when starting the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine is already running")]
    AlreadyRunning,

    #[error("No async runtime available: {0}")]
    NoRuntime(String),

    #[error("Sensing unavailable: {0}")]
    SensingUnavailable(#[from] SensingError),
}

/// How long a reward expiry waits for the playback probe to answer.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

type SharedCore = Arc<Mutex<EngineCore>>;

fn lock(core: &Mutex<EngineCore>) -> MutexGuard<'_, EngineCore> {
    core.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Detection-and-gating engine.
pub struct ChewEngine {
    core: SharedCore,
    state: watch::Receiver<ChewState>,
    progress: watch::Receiver<f64>,
    sink: MeasurementSink,
    instance_id: Uuid,
}

impl ChewEngine {
    /// Build an engine around `session`, which must deliver into `intake`'s sink.
    pub fn new(
        config: Config,
        intake: SampleIntake,
        session: impl SensingSession + 'static,
    ) -> Self {
        let instance_id = Uuid::new_v4();
        let machine = RewardStateMachine::new(config.reward_length());
        let (state_tx, state) = watch::channel(machine.state());
        let (progress_tx, progress) = watch::channel(machine.progress().seconds());
        let sink = intake.sink();

        let core = Arc::new_cyclic(|weak_self| {
            Mutex::new(EngineCore {
                instance_id,
                weak_self: weak_self.clone(),
                signal: signal::from_config(&config),
                aggregator: WindowAggregator::new(&config),
                machine,
                config,
                intake,
                session: Box::new(session),
                scheduler: None,
                probe: None,
                running: false,
                state_tx,
                progress_tx,
            })
        });

        Self {
            core,
            state,
            progress,
            sink,
            instance_id,
        }
    }

    /// Install the playback-validity predicate consulted on reward expiry.
    pub fn with_playback_probe(self, probe: impl PlaybackProbe + 'static) -> Self {
        lock(&self.core).probe = Some(Arc::new(probe));
        self
    }

    /// Begin monitoring from a fresh state.
    ///
    /// Must be called from within a tokio runtime. On failure the engine
    /// stays inert; retrying is up to the caller.
    pub fn start(&self) -> Result<(), EngineError> {
        lock(&self.core).start()
    }

    /// Cancel all pending schedules and release the sensing session.
    pub fn stop(&self) {
        lock(&self.core).stop();
    }

    /// Apply a new configuration.
    ///
    /// The window in progress is discarded and, while running, the sampling
    /// tick is reinstalled. A reward already pending keeps its length.
    pub fn reconfigure(&self, config: Config) {
        lock(&self.core).reconfigure(config);
    }

    pub fn is_running(&self) -> bool {
        lock(&self.core).running
    }

    /// Current gate state.
    pub fn state(&self) -> ChewState {
        *self.state.borrow()
    }

    /// Seconds into the current window, or seconds left in the reward.
    pub fn progress(&self) -> f64 {
        *self.progress.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ChewState> {
        self.state.clone()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<f64> {
        self.progress.clone()
    }

    /// Sink for a backend that was not handed one at construction.
    pub fn measurement_sink(&self) -> MeasurementSink {
        self.sink.clone()
    }

    pub fn config(&self) -> Config {
        lock(&self.core).config.clone()
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }
}

impl Drop for ChewEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

struct EngineCore {
    instance_id: Uuid,
    weak_self: Weak<Mutex<EngineCore>>,
    config: Config,
    signal: Box<dyn SignalSource>,
    aggregator: WindowAggregator,
    machine: RewardStateMachine,
    intake: SampleIntake,
    session: Box<dyn SensingSession>,
    scheduler: Option<Scheduler>,
    probe: Option<Arc<dyn PlaybackProbe>>,
    running: bool,
    state_tx: watch::Sender<ChewState>,
    progress_tx: watch::Sender<f64>,
}

impl EngineCore {
    fn start(&mut self) -> Result<(), EngineError> {
        if self.running {
            return Err(EngineError::AlreadyRunning);
        }
        let scheduler = Scheduler::current().map_err(|e| EngineError::NoRuntime(e.to_string()))?;

        if let Err(e) = self.session.start() {
            warn!(engine = %self.instance_id, error = %e, "sensing session failed to start");
            return Err(e.into());
        }

        self.scheduler = Some(scheduler);
        self.signal.reset();
        self.aggregator.reset();
        self.machine = RewardStateMachine::new(self.config.reward_length());
        self.running = true;

        info!(
            engine = %self.instance_id,
            signal = self.signal.name(),
            rule = %self.config.summary(),
            reward_secs = self.config.reward_length().as_secs(),
            "chew gate started"
        );

        let effects = self.machine.begin();
        self.apply(effects);
        self.install_ticker();
        self.publish();
        Ok(())
    }

    fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;

        let effects = self.machine.shutdown();
        self.apply(effects);
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.shutdown();
        }
        self.intake.close();
        self.session.stop();

        info!(
            engine = %self.instance_id,
            dropped_frames = self.intake.dropped(),
            "chew gate stopped"
        );
    }

    fn reconfigure(&mut self, config: Config) {
        self.signal = signal::from_config(&config);
        self.aggregator.reconfigure(&config);
        self.machine.set_reward_length(config.reward_length());
        self.config = config;

        if self.running {
            self.install_ticker();
            self.machine.track_window(self.aggregator.elapsed());
            self.publish();
        }
        info!(engine = %self.instance_id, rule = %self.config.summary(), "chew gate reconfigured");
    }

    fn install_ticker(&mut self) {
        let period = self.config.sampling_interval();
        let weak = self.weak_self.clone();
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.start_ticking(period, move |token| {
                if let Some(core) = weak.upgrade() {
                    lock(&core).on_tick(token);
                }
            });
        }
    }

    fn on_tick(&mut self, token: &CancelToken) {
        if !self.running || token.is_cancelled() {
            return;
        }

        if self.machine.state().is_monitoring() {
            let sample = self
                .intake
                .take()
                .and_then(|measurement| self.signal.sample(&measurement))
                .unwrap_or(false);

            let verdict = self.aggregator.observe(sample);
            self.machine.track_window(self.aggregator.elapsed());

            if let Some(verdict) = verdict {
                debug!(
                    engine = %self.instance_id,
                    qualifying = verdict.qualifying,
                    threshold = verdict.threshold,
                    compliant = verdict.compliant,
                    "window closed"
                );
                let effects = self.machine.transition(&verdict);
                self.apply(effects);
            }
        } else {
            self.machine.count_down(self.config.sampling_interval());
        }

        self.publish();
    }

    fn on_reward_expired(&mut self, generation: u64, playback_active: bool) {
        debug!(engine = %self.instance_id, generation, playback_active, "reward expired");
        let effects = self.machine.on_reward_expired(generation, playback_active);
        self.apply(effects);
        self.publish();
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::SuspendSensing => {
                    self.intake.close();
                    self.session.pause();
                }
                Effect::ResumeSensing => {
                    self.signal.reset();
                    if let Err(e) = self.session.resume() {
                        warn!(engine = %self.instance_id, error = %e, "sensing session failed to resume");
                    }
                    self.intake.open();
                    // Align the first monitoring window with the resume instant.
                    self.install_ticker();
                }
                Effect::ResetWindow => self.aggregator.reset(),
                Effect::CancelRewardWait => {
                    if let Some(scheduler) = self.scheduler.as_mut() {
                        scheduler.cancel_scheduled();
                    }
                }
                Effect::StartRewardWait {
                    generation,
                    duration,
                } => self.schedule_expiry(generation, duration),
            }
        }
    }

    fn schedule_expiry(&mut self, generation: u64, duration: Duration) {
        let weak = self.weak_self.clone();
        let Some(scheduler) = self.scheduler.as_mut() else {
            return;
        };

        scheduler.schedule_once(duration, move |token| async move {
            let probe = match weak.upgrade() {
                Some(core) => {
                    let core = lock(&core);
                    if !core.running || token.is_cancelled() {
                        return;
                    }
                    core.probe.clone()
                }
                None => return,
            };

            let playback_active = ask_probe(probe).await;

            if let Some(core) = weak.upgrade() {
                let mut core = lock(&core);
                if core.running && !token.is_cancelled() {
                    core.on_reward_expired(generation, playback_active);
                }
            }
        });
    }

    fn publish(&mut self) {
        let state = self.machine.state();
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            info!(
                engine = %self.instance_id,
                from = %previous,
                to = %state,
                playback = state.allows_playback(),
                "gate state changed"
            );
        }
        self.progress_tx
            .send_replace(self.machine.progress().seconds());
    }
}

async fn ask_probe(probe: Option<Arc<dyn PlaybackProbe>>) -> bool {
    let Some(probe) = probe else {
        return false;
    };
    // The probe is invoked on its own task so a panic while building the
    // future is caught the same way as a panic while polling it.
    let mut task = tokio::spawn(async move { probe.playback_is_active().await });
    match tokio::time::timeout(PROBE_TIMEOUT, &mut task).await {
        Ok(Ok(active)) => active,
        Ok(Err(e)) => {
            warn!(error = %e, "playback probe failed, treating playback as inactive");
            false
        }
        Err(_) => {
            task.abort();
            warn!(
                timeout_secs = PROBE_TIMEOUT.as_secs(),
                "playback probe did not answer, treating playback as inactive"
            );
            false
        }
    }
}
