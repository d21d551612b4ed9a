use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard},
};

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info};

use super::{registry::Registry, store::PlaytimeStore};

/// A session that ended during a poll cycle, already folded into the totals.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedSession {
    pub identifier: String,
    pub display_name: String,
    pub seconds: f64,
}

struct TrackerState {
    /// Instant tracking was paused at, when paused.
    paused_at: Option<DateTime<Utc>>,
    /// identifier -> session start. At most one session per identifier.
    active: HashMap<String, DateTime<Utc>>,
    store: PlaytimeStore,
}

/// Owns every piece of state shared between the poll loop and the control
/// surface. The pause flag, the active-session table and the accumulated
/// totals sit behind a single lock, so a pause toggle or a shutdown flush can
/// never observe a poll cycle mid-transition.
pub struct SessionTracker {
    registry: Registry,
    state: Mutex<TrackerState>,
}

impl SessionTracker {
    pub fn new(registry: Registry, store: PlaytimeStore) -> Self {
        Self {
            registry,
            state: Mutex::new(TrackerState {
                paused_at: None,
                active: HashMap::new(),
                store,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().expect("tracker state lock poisoned")
    }

    /// Applies one sampled running set at time `now` and returns the sessions
    /// that ended this cycle. Registered identifiers that appeared get an
    /// active session, ones that disappeared have their session closed and
    /// accumulated; anything not in the registry is ignored. While paused the
    /// whole cycle is a no-op.
    pub fn observe(&self, running: &HashSet<String>, now: DateTime<Utc>) -> Vec<CompletedSession> {
        let mut state = self.state();
        if state.paused_at.is_some() {
            return Vec::new();
        }

        let mut completed = Vec::new();
        for identifier in self.registry.identifiers() {
            if running.contains(identifier) {
                if !state.active.contains_key(identifier) {
                    debug!("Session started for {identifier}");
                    state.active.insert(identifier.to_owned(), now);
                }
            } else if let Some(started_at) = state.active.remove(identifier) {
                completed.push(Self::close_session(
                    &self.registry,
                    &mut state.store,
                    identifier,
                    started_at,
                    now,
                ));
            }
        }
        completed
    }

    /// Closes every active session against `now` and folds it into the
    /// totals, so a clean exit never drops an in-progress session. While
    /// paused, sessions are closed against the pause instant instead. A
    /// second call finds no active sessions and does nothing.
    pub fn flush_active(&self, now: DateTime<Utc>) -> Vec<CompletedSession> {
        let mut state = self.state();
        let end = state.paused_at.unwrap_or(now);

        let drained = state.active.drain().collect::<Vec<_>>();
        drained
            .into_iter()
            .map(|(identifier, started_at)| {
                Self::close_session(&self.registry, &mut state.store, &identifier, started_at, end)
            })
            .collect()
    }

    /// Freezes tracking. Active sessions keep their start instant but stop
    /// accruing; nothing starts or closes until [resume](Self::resume).
    pub fn pause(&self, now: DateTime<Utc>) {
        let mut state = self.state();
        if state.paused_at.is_none() {
            state.paused_at = Some(now);
            info!("Tracking paused");
        }
    }

    /// Continues tracking. Each active session's start is shifted forward by
    /// the paused span, so the session goes on uninterrupted and the paused
    /// interval never counts toward its duration.
    pub fn resume(&self, now: DateTime<Utc>) {
        let mut state = self.state();
        let Some(paused_at) = state.paused_at.take() else {
            return;
        };
        let paused_for = (now - paused_at).max(TimeDelta::zero());
        for started_at in state.active.values_mut() {
            *started_at += paused_for;
        }
        info!("Tracking resumed after {paused_for}");
    }

    /// Flips the pause state, returning true when now paused.
    pub fn toggle_pause(&self, now: DateTime<Utc>) -> bool {
        if self.is_paused() {
            self.resume(now);
            false
        } else {
            self.pause(now);
            true
        }
    }

    pub fn is_paused(&self) -> bool {
        self.state().paused_at.is_some()
    }

    pub fn active_count(&self) -> usize {
        self.state().active.len()
    }

    pub fn snapshot(&self) -> HashMap<String, f64> {
        self.state().store.snapshot()
    }

    fn close_session(
        registry: &Registry,
        store: &mut PlaytimeStore,
        identifier: &str,
        started_at: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CompletedSession {
        // Active sessions only ever exist for registered identifiers.
        let display_name = registry
            .display_name(identifier)
            .unwrap_or(identifier)
            .to_owned();
        // Clamp against a clock that jumped backwards between samples.
        let seconds = (end - started_at).as_seconds_f64().max(0.0);
        store.add(&display_name, seconds);
        info!("Session ended for {identifier}: {seconds}s of {display_name}");
        CompletedSession {
            identifier: identifier.to_owned(),
            display_name,
            seconds,
        }
    }
}
