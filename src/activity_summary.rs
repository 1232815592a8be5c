use std::fmt;
use std::str::FromStr;

use crate::route_recorder::FinalizedSession;

// NOTE: this is a flat per-meter approximation, it is not a physiological
// model (no body weight, no pace, no terrain). Users can override it through
// `Setting::KcalPerMeter`.
pub const DEFAULT_KCAL_PER_METER: f64 = 0.06;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CalorieEstimator {
    pub kcal_per_meter: f64,
}

impl Default for CalorieEstimator {
    fn default() -> Self {
        CalorieEstimator {
            kcal_per_meter: DEFAULT_KCAL_PER_METER,
        }
    }
}

impl CalorieEstimator {
    pub fn estimate_kcal(&self, distance_m: f64) -> f64 {
        distance_m * self.kcal_per_meter
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    Run,
    Walk,
    Cycle,
    Other,
}

impl ActivityKind {
    pub fn to_db_str(self) -> &'static str {
        match self {
            ActivityKind::Run => "run",
            ActivityKind::Walk => "walk",
            ActivityKind::Cycle => "cycle",
            ActivityKind::Other => "other",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl FromStr for ActivityKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "run" => Ok(ActivityKind::Run),
            "walk" => Ok(ActivityKind::Walk),
            "cycle" => Ok(ActivityKind::Cycle),
            "other" => Ok(ActivityKind::Other),
            _ => Err(anyhow!("unknown activity kind: {}", s)),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ActivitySummary {
    pub kind: ActivityKind,
    pub distance_m: f64,
    pub active_duration_ms: i64,
    pub kcal: f64,
}

impl ActivitySummary {
    pub fn of(
        session: &FinalizedSession,
        kind: ActivityKind,
        estimator: &CalorieEstimator,
    ) -> Self {
        ActivitySummary {
            kind,
            distance_m: session.distance_m,
            active_duration_ms: session.active_duration.num_milliseconds(),
            kcal: estimator.estimate_kcal(session.distance_m),
        }
    }

    pub fn average_speed_m_per_s(&self) -> f64 {
        if self.active_duration_ms <= 0 {
            0.
        } else {
            self.distance_m / (self.active_duration_ms as f64 / 1000.)
        }
    }

    // seconds per kilometer
    pub fn pace_sec_per_km(&self) -> Option<f64> {
        if self.distance_m <= 0. {
            None
        } else {
            Some((self.active_duration_ms as f64 / 1000.) / (self.distance_m / 1000.))
        }
    }
}
