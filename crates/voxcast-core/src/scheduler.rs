//! Frame scheduling: fixed tick cadence, render throttling and adaptive
//! sampling.
//!
//! The scheduler never reads the clock itself. Callers pass the current
//! [`Instant`] to [`FrameScheduler::tick`], which keeps it deterministic
//! under test and lets the winit loop drive it from `ControlFlow::WaitUntil`.

use std::time::{Duration, Instant};

use crate::readiness::{ReadinessTracker, RenderReadiness};
use crate::sampling::{AdaptiveSampling, RateChange, SamplingState};
use crate::Options;

/// Outcome of a single scheduler tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    /// The scheduler was stopped; nothing happens.
    Stopped,
    /// Volume or colormap missing.
    NotReady,
    /// Ready, but nothing changed since the last frame.
    Unchanged,
    /// Ready, but the last render was too recent.
    Throttled,
    /// Draw a frame now.
    Render,
}

/// Drives the render loop.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    tick_interval: Duration,
    throttle_interval: Duration,
    last_render: Option<Instant>,
    last_tick: Option<Instant>,
    stopped: bool,
    adaptive_enabled: bool,
    readiness: ReadinessTracker,
    sampling: SamplingState,
    adaptive: AdaptiveSampling,
}

impl FrameScheduler {
    /// Creates a scheduler with the given cadence and throttle.
    #[must_use]
    pub fn new(tick_interval: Duration, throttle_interval: Duration) -> Self {
        Self {
            tick_interval,
            throttle_interval,
            last_render: None,
            last_tick: None,
            stopped: false,
            adaptive_enabled: true,
            readiness: ReadinessTracker::new(),
            sampling: SamplingState::default(),
            adaptive: AdaptiveSampling::default(),
        }
    }

    /// Creates a scheduler configured from `options`.
    #[must_use]
    pub fn from_options(options: &Options) -> Self {
        let mut scheduler = Self::new(
            Duration::from_millis(options.tick_interval_ms),
            Duration::from_millis(options.throttle_interval_ms),
        );
        scheduler.adaptive = options.adaptive_sampling();
        scheduler.adaptive_enabled = options.adaptive_sampling_enabled;
        scheduler.sampling = SamplingState::new(
            scheduler.adaptive.clamp(options.initial_sampling_rate),
            options.target_frame_time_ms,
        );
        scheduler
    }

    /// Decides what to do at time `now`.
    ///
    /// A `Render` decision records `now` as the last render time.
    pub fn tick(&mut self, now: Instant) -> TickDecision {
        self.tick_with_changes(now, true)
    }

    /// Like [`tick`](Self::tick), but returns `Unchanged` when the scene
    /// has not changed since the last frame. An unchanged tick leaves the
    /// throttle window untouched.
    pub fn tick_with_changes(&mut self, now: Instant, scene_changed: bool) -> TickDecision {
        if self.stopped {
            return TickDecision::Stopped;
        }
        self.last_tick = Some(now);

        if !self.readiness.state().can_render() {
            return TickDecision::NotReady;
        }

        if !scene_changed {
            return TickDecision::Unchanged;
        }

        if let Some(last) = self.last_render {
            if now.saturating_duration_since(last) < self.throttle_interval {
                log::debug!("tick throttled");
                return TickDecision::Throttled;
            }
        }

        self.last_render = Some(now);
        TickDecision::Render
    }

    /// Feeds a measured frame time into the adaptive sampling policy.
    pub fn record_frame_time(&mut self, frame_time: Duration) -> RateChange {
        if !self.adaptive_enabled {
            return RateChange::Unchanged;
        }
        let ms = frame_time.as_secs_f32() * 1000.0;
        let change = self.adaptive.adjust(&mut self.sampling, ms);
        if change != RateChange::Unchanged {
            log::debug!(
                "sampling rate {:?} to {:.3} after {ms:.1} ms frame",
                change,
                self.sampling.sampling_rate
            );
        }
        change
    }

    /// Stops the scheduler; every later tick is a no-op.
    pub fn stop(&mut self) {
        if !self.stopped {
            log::info!("frame scheduler stopped");
        }
        self.stopped = true;
    }

    /// Returns true once [`stop`](Self::stop) has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// When the next tick should fire, or `None` when stopped.
    #[must_use]
    pub fn next_deadline(&self, now: Instant) -> Option<Instant> {
        if self.stopped {
            return None;
        }
        let Some(last_tick) = self.last_tick else {
            return Some(now);
        };
        Some((last_tick + self.tick_interval).max(now))
    }

    /// Current readiness.
    #[must_use]
    pub fn readiness(&self) -> RenderReadiness {
        self.readiness.state()
    }

    /// Mutable access to the readiness tracker.
    pub fn readiness_mut(&mut self) -> &mut ReadinessTracker {
        &mut self.readiness
    }

    /// Current sampling rate.
    #[must_use]
    pub fn sampling_rate(&self) -> f32 {
        self.sampling.sampling_rate
    }

    /// Current sampling state.
    #[must_use]
    pub fn sampling(&self) -> SamplingState {
        self.sampling
    }

    /// Overrides the sampling rate, clamped to the policy bounds.
    pub fn set_sampling_rate(&mut self, rate: f32) {
        self.sampling.sampling_rate = self.adaptive.clamp(rate);
    }

    /// The adaptive policy in use.
    #[must_use]
    pub fn adaptive(&self) -> &AdaptiveSampling {
        &self.adaptive
    }

    /// Tick cadence.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Minimum time between renders.
    #[must_use]
    pub fn throttle_interval(&self) -> Duration {
        self.throttle_interval
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::from_options(&Options::default())
    }
}
