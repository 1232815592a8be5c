use chrono::Duration;

use crate::distance;
use crate::error::TrackingError;
use crate::gps_processor::CoordinateFix;
use crate::session_timer::SessionTimer;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RecorderState {
    Idle,
    Active,
    Paused,
    Stopped,
}

/// What is left of a tracking session once it is stopped.
#[derive(Clone, Debug, PartialEq)]
pub struct FinalizedSession {
    pub start_ms: i64,
    pub end_ms: i64,
    pub fixes: Vec<CoordinateFix>,
    pub distance_m: f64,
    pub active_duration: Duration,
}

impl FinalizedSession {
    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }
}

/// Accumulates the fixes of a single tracking session.
///
/// Fixes are append-only and the cumulative distance only ever grows by the
/// distance between the previous fix and the new one. All mutations are
/// expected to come from one logical thread (whatever adapter listens to the
/// platform location stream); the recorder itself does no locking.
pub struct RouteRecorder {
    state: RecorderState,
    fixes: Vec<CoordinateFix>,
    distance_m: f64,
    start_ms: Option<i64>,
    timer: SessionTimer,
}

impl RouteRecorder {
    pub fn new() -> Self {
        RouteRecorder {
            state: RecorderState::Idle,
            fixes: Vec::new(),
            distance_m: 0.,
            start_ms: None,
            timer: SessionTimer::new(),
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn distance_m(&self) -> f64 {
        self.distance_m
    }

    pub fn fixes(&self) -> &[CoordinateFix] {
        &self.fixes
    }

    pub fn start_ms(&self) -> Option<i64> {
        self.start_ms
    }

    // `(lat, lng)` pairs in recording order, for drawing the route.
    pub fn polyline(&self) -> Vec<(f64, f64)> {
        self.fixes
            .iter()
            .map(|fix| (fix.latitude, fix.longitude))
            .collect()
    }

    fn invalid(&self, action: &'static str) -> TrackingError {
        TrackingError::InvalidStateTransition {
            state: self.state,
            action,
        }
    }

    pub fn start(&mut self, now_ms: i64) -> Result<(), TrackingError> {
        match self.state {
            RecorderState::Idle | RecorderState::Stopped => {
                self.fixes.clear();
                self.distance_m = 0.;
                self.start_ms = Some(now_ms);
                self.timer.restart(now_ms);
                self.state = RecorderState::Active;
                debug!("[route_recorder] started at {}", now_ms);
                Ok(())
            }
            RecorderState::Active | RecorderState::Paused => Err(self.invalid("start")),
        }
    }

    pub fn pause(&mut self, now_ms: i64) -> Result<(), TrackingError> {
        if self.state != RecorderState::Active {
            return Err(self.invalid("pause"));
        }
        self.timer.pause(now_ms);
        self.state = RecorderState::Paused;
        Ok(())
    }

    pub fn resume(&mut self, now_ms: i64) -> Result<(), TrackingError> {
        if self.state != RecorderState::Paused {
            return Err(self.invalid("resume"));
        }
        self.timer.resume(now_ms);
        self.state = RecorderState::Active;
        Ok(())
    }

    /// Appends `fix` and returns the distance it added to the session.
    pub fn record_fix(&mut self, fix: CoordinateFix) -> Result<f64, TrackingError> {
        if self.state != RecorderState::Active {
            return Err(self.invalid("record a fix for"));
        }
        let segment_m = match self.fixes.last() {
            None => 0.,
            Some(prev) => distance::distance_between(prev, &fix),
        };
        self.distance_m += segment_m;
        self.fixes.push(fix);
        Ok(segment_m)
    }

    pub fn stop(&mut self, now_ms: i64) -> Result<FinalizedSession, TrackingError> {
        match self.state {
            RecorderState::Active | RecorderState::Paused => {
                self.timer.pause(now_ms);
                self.state = RecorderState::Stopped;
                let session = FinalizedSession {
                    start_ms: self.start_ms.unwrap_or(now_ms),
                    end_ms: now_ms,
                    fixes: self.fixes.clone(),
                    distance_m: self.distance_m,
                    active_duration: self.timer.elapsed(now_ms),
                };
                info!(
                    "[route_recorder] stopped: fixes={}, distance_m={:.1}, active_ms={}",
                    session.fixes.len(),
                    session.distance_m,
                    session.active_duration.num_milliseconds()
                );
                Ok(session)
            }
            RecorderState::Idle | RecorderState::Stopped => Err(self.invalid("stop")),
        }
    }

    pub fn elapsed_duration(&self, now_ms: i64) -> Duration {
        match self.state {
            RecorderState::Idle => Duration::zero(),
            RecorderState::Active | RecorderState::Paused | RecorderState::Stopped => {
                self.timer.elapsed(now_ms)
            }
        }
    }
}
