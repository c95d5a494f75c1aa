//! Session timer state machine.
//!
//! A pure, session-scoped state object: every transition takes an explicit
//! `now` and the runtime advances it with one scheduler tick per second.
//! The authoritative remaining time is always *recomputed* from the sync
//! point (`remaining_at_sync - elapsed`), never accumulated by per-tick
//! decrements, because decrement-only timers drift when the host throttles
//! background tabs. Notifications are returned as [`TimerEvent`]s for the
//! presentation layer to consume; the timer never performs side effects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timer lifecycle. `Submitted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerPhase {
    Idle,
    Running,
    Paused,
    Submitted,
}

/// One-shot notifications emitted by `tick`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// Remaining time first crossed the given threshold (seconds).
    Warning(u64),
    /// Remaining time reached zero while running. Emitted exactly once;
    /// the session translates this into an auto-submit.
    Expired,
}

/// Countdown state for one attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTimer {
    pub time_limit_secs: u64,
    remaining_secs: u64,
    phase: TimerPhase,
    /// Wall-clock instant of the last resync point.
    sync_timestamp: Option<DateTime<Utc>>,
    /// Remaining seconds at the resync point.
    remaining_at_sync: Option<u64>,
    paused_at: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    warned_60: bool,
    warned_30: bool,
}

const WARN_THRESHOLDS: [u64; 2] = [60, 30];

impl SessionTimer {
    /// A fresh timer in `Idle` with the full limit remaining.
    pub fn new(time_limit_secs: u64) -> Self {
        SessionTimer {
            time_limit_secs,
            remaining_secs: time_limit_secs,
            phase: TimerPhase::Idle,
            sync_timestamp: None,
            remaining_at_sync: None,
            paused_at: None,
            started_at: None,
            warned_60: false,
            warned_30: false,
        }
    }

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    /// Enter `Running` with a wall-clock baseline at `now`.
    pub fn start(&mut self, now: DateTime<Utc>) {
        if self.phase != TimerPhase::Idle {
            return;
        }
        self.phase = TimerPhase::Running;
        self.started_at = Some(now);
        self.resync(now);
    }

    /// Re-establish the sync point at `now` with the current remaining value.
    fn resync(&mut self, now: DateTime<Utc>) {
        self.sync_timestamp = Some(now);
        self.remaining_at_sync = Some(self.remaining_secs);
    }

    /// Recompute remaining from the sync point. Always wins over the naive
    /// per-tick decrement when a sync point exists.
    fn recompute(&mut self, now: DateTime<Utc>) {
        if let (Some(ts), Some(at_sync)) = (self.sync_timestamp, self.remaining_at_sync) {
            let elapsed = (now - ts).num_seconds().max(0) as u64;
            self.remaining_secs = at_sync.saturating_sub(elapsed);
        } else {
            self.remaining_secs = self.remaining_secs.saturating_sub(1);
        }
    }

    /// Advance the countdown by one scheduler tick.
    ///
    /// Returns the one-shot events that fired on this tick. No-op outside
    /// `Running`.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<TimerEvent> {
        if self.phase != TimerPhase::Running {
            return Vec::new();
        }

        self.recompute(now);

        let mut events = Vec::new();
        for threshold in WARN_THRESHOLDS {
            let warned = match threshold {
                60 => &mut self.warned_60,
                _ => &mut self.warned_30,
            };
            if self.remaining_secs <= threshold && self.remaining_secs > 0 && !*warned {
                *warned = true;
                events.push(TimerEvent::Warning(threshold));
            }
        }

        if self.remaining_secs == 0 {
            self.phase = TimerPhase::Submitted;
            events.push(TimerEvent::Expired);
        }

        events
    }

    /// Freeze the countdown (hosting view hidden or navigated away).
    pub fn pause(&mut self, now: DateTime<Utc>) {
        if self.phase != TimerPhase::Running {
            return;
        }
        self.recompute(now);
        self.sync_timestamp = None;
        self.remaining_at_sync = None;
        self.paused_at = Some(now);
        self.phase = TimerPhase::Paused;
    }

    /// Re-enter `Running`, charging the time spent paused against the
    /// frozen remaining value (clamped at zero).
    pub fn resume(&mut self, now: DateTime<Utc>) {
        if self.phase != TimerPhase::Paused {
            return;
        }
        if let Some(paused_at) = self.paused_at.take() {
            let away = (now - paused_at).num_seconds().max(0) as u64;
            self.remaining_secs = self.remaining_secs.saturating_sub(away);
        }
        self.phase = TimerPhase::Running;
        self.resync(now);
    }

    /// Terminal transition on explicit or automatic submission.
    pub fn mark_submitted(&mut self) {
        self.phase = TimerPhase::Submitted;
        self.sync_timestamp = None;
        self.remaining_at_sync = None;
    }

    /// Format remaining time as M:SS.
    pub fn format_remaining(&self) -> String {
        let minutes = self.remaining_secs / 60;
        let secs = self.remaining_secs % 60;
        format!("{minutes}:{secs:02}")
    }
}
