//! Reward state machine.
//!
//! `Ok` and `Recheck` are monitoring states: sensing runs and every closed
//! window produces a verdict. A compliant verdict moves the machine into
//! `Reward`, where sensing is suspended and a single expiry wait is pending.
//! When that wait completes the caller reports whether playback is still
//! active: if so the machine returns to `Ok`, otherwise it re-enters
//! `Reward` with a fresh wait of the full reward length.
//!
//! The machine is pure. Every input returns the list of [`Effect`]s the
//! owner must apply, in order.

use crate::core::windowing::WindowVerdict;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Externally visible gate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChewState {
    /// Monitoring after a confirmed reward; playback allowed.
    Ok,
    /// Monitoring after a non-compliant window; playback suspended.
    Recheck,
    /// Sensing paused, playback allowed until the reward expires.
    Reward,
}

impl ChewState {
    /// Whether media should be playing in this state.
    pub fn allows_playback(&self) -> bool {
        !matches!(self, ChewState::Recheck)
    }

    /// Whether samples should be fed to the aggregator in this state.
    pub fn is_monitoring(&self) -> bool {
        !matches!(self, ChewState::Reward)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChewState::Ok => "ok",
            ChewState::Recheck => "recheck",
            ChewState::Reward => "reward",
        }
    }
}

impl std::fmt::Display for ChewState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Stop feeding the aggregator and pause the sensing session.
    SuspendSensing,
    /// Resume the sensing session and start feeding the aggregator again.
    ResumeSensing,
    /// Clear the window counters and edge tracker.
    ResetWindow,
    /// Cancel the pending expiry wait.
    CancelRewardWait,
    /// Schedule an expiry wait; its completion must carry `generation`.
    StartRewardWait { generation: u64, duration: Duration },
}

/// Seconds into the current window, or seconds left in the current reward.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressCounter {
    seconds: f64,
}

impl ProgressCounter {
    pub fn seconds(&self) -> f64 {
        self.seconds
    }

    pub fn set(&mut self, value: Duration) {
        self.seconds = value.as_secs_f64();
    }

    pub fn clear(&mut self) {
        self.seconds = 0.0;
    }

    /// Count down by `step`, stopping at zero.
    pub fn count_down(&mut self, step: Duration) {
        self.seconds = (self.seconds - step.as_secs_f64()).max(0.0);
    }
}

/// Owns the gate state and the identity of the single pending expiry wait.
#[derive(Debug, Clone)]
pub struct RewardStateMachine {
    state: ChewState,
    reward_length: Duration,
    progress: ProgressCounter,
    next_generation: u64,
    pending_wait: Option<u64>,
}

impl RewardStateMachine {
    /// Create a machine in the optimistic `Reward` state with nothing scheduled yet.
    pub fn new(reward_length: Duration) -> Self {
        Self {
            state: ChewState::Reward,
            reward_length,
            progress: ProgressCounter::default(),
            next_generation: 0,
            pending_wait: None,
        }
    }

    pub fn state(&self) -> ChewState {
        self.state
    }

    pub fn progress(&self) -> ProgressCounter {
        self.progress
    }

    pub fn reward_length(&self) -> Duration {
        self.reward_length
    }

    /// Generation of the expiry wait currently in flight, if any.
    pub fn pending_wait(&self) -> Option<u64> {
        self.pending_wait
    }

    /// Takes effect from the next reward entry.
    pub fn set_reward_length(&mut self, reward_length: Duration) {
        self.reward_length = reward_length;
    }

    /// Start from a fresh session: enter `Reward` and suspend sensing.
    pub fn begin(&mut self) -> Vec<Effect> {
        self.enter(true)
    }

    /// Handle a closed window.
    pub fn transition(&mut self, verdict: &WindowVerdict) -> Vec<Effect> {
        match self.state {
            ChewState::Ok | ChewState::Recheck if verdict.compliant => self.enter_reward(),
            ChewState::Ok | ChewState::Recheck => {
                self.state = ChewState::Recheck;
                Vec::new()
            }
            // Sensing is suspended; a verdict here is stale.
            ChewState::Reward => Vec::new(),
        }
    }

    /// Enter (or re-enter) `Reward`.
    ///
    /// Any pending wait is cancelled before the new one is started.
    pub fn enter_reward(&mut self) -> Vec<Effect> {
        let suspend = self.state != ChewState::Reward;
        self.enter(suspend)
    }

    /// Handle completion of the expiry wait identified by `generation`.
    ///
    /// Completions for any wait other than the pending one are ignored.
    pub fn on_reward_expired(&mut self, generation: u64, playback_active: bool) -> Vec<Effect> {
        if self.state != ChewState::Reward || self.pending_wait != Some(generation) {
            return Vec::new();
        }
        self.pending_wait = None;

        if playback_active {
            self.state = ChewState::Ok;
            self.progress.clear();
            vec![Effect::ResetWindow, Effect::ResumeSensing]
        } else {
            self.enter(false)
        }
    }

    /// Publish how far the current monitoring window has run.
    pub fn track_window(&mut self, elapsed: Duration) {
        if self.state.is_monitoring() {
            self.progress.set(elapsed);
        }
    }

    /// Count the reward down by one tick.
    pub fn count_down(&mut self, step: Duration) {
        if self.state == ChewState::Reward {
            self.progress.count_down(step);
        }
    }

    /// Drop the pending wait on teardown.
    pub fn shutdown(&mut self) -> Vec<Effect> {
        match self.pending_wait.take() {
            Some(_) => vec![Effect::CancelRewardWait],
            None => Vec::new(),
        }
    }

    fn enter(&mut self, suspend: bool) -> Vec<Effect> {
        let mut effects = Vec::with_capacity(4);
        if suspend {
            effects.push(Effect::SuspendSensing);
            effects.push(Effect::ResetWindow);
        }
        if self.pending_wait.take().is_some() {
            effects.push(Effect::CancelRewardWait);
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        self.pending_wait = Some(generation);
        effects.push(Effect::StartRewardWait {
            generation,
            duration: self.reward_length,
        });

        self.state = ChewState::Reward;
        self.progress.set(self.reward_length);
        effects
    }
}
