use std::collections::BTreeSet;
use std::fs::File;

use anyhow::Result;
use chrono::NaiveDate;

use crate::activity_summary::ActivityKind;
use crate::error::RouteStoreError;
use crate::gps_processor::{self, CoordinateFix, GpsProcessor, ProcessResult};
use crate::main_db::{ActivityRecord, DailyReport, Meal, MealRecord, Setting, UserProfile};
use crate::route_recorder::{FinalizedSession, RecorderState, RouteRecorder};
use crate::route_store::SessionId;
use crate::storage::{RawDataFile, Storage};
use crate::{distance, export_data, logs};

pub fn init_logging(cache_dir: &str) -> Result<()> {
    logs::init(cache_dir)?;
    info!("logging initialized");
    Ok(())
}

pub fn export_logs(cache_dir: &str, target_file_path: &str) -> Result<()> {
    logs::export(cache_dir, target_file_path)
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrackingStatus {
    pub state: RecorderState,
    pub distance_m: f64,
    pub elapsed_ms: i64,
    pub fix_count: usize,
    pub kcal: f64,
}

/// Everything the host app talks to. Owns the storage and the single
/// tracking session; the host keeps one of these around and calls into it
/// from one thread (the location callback included).
pub struct App {
    storage: Storage,
    gps_processor: GpsProcessor,
    recorder: RouteRecorder,
    activity_kind: ActivityKind,
    // a stopped session whose finalization failed, kept for `retry_finalize`
    pending: Option<(ActivityKind, FinalizedSession)>,
}

impl App {
    pub fn open(support_dir: String) -> Result<App> {
        let mut storage = Storage::init(support_dir)?;
        let max_accuracy_m = storage.main_db().get_setting_with_default(
            Setting::MaxAccuracyM,
            gps_processor::DEFAULT_MAX_ACCURACY_M,
        );
        info!("initialized, max_accuracy_m={}", max_accuracy_m);
        Ok(App {
            storage,
            gps_processor: GpsProcessor::with_max_accuracy(max_accuracy_m),
            recorder: RouteRecorder::new(),
            activity_kind: ActivityKind::Other,
            pending: None,
        })
    }

    /// Fails while a stopped session is still waiting to be saved; the host
    /// has to `retry_finalize` or `discard_pending_session` first.
    pub fn start_tracking(&mut self, kind: ActivityKind, now_ms: i64) -> Result<()> {
        if let Some((pending_kind, _)) = &self.pending {
            bail!(
                "a stopped {} session has not been saved yet, retry or discard it first",
                pending_kind
            );
        }
        self.recorder.start(now_ms)?;
        self.gps_processor.reset();
        self.activity_kind = kind;
        info!("tracking started: kind={}", kind);
        Ok(())
    }

    pub fn pause_tracking(&mut self, now_ms: i64) -> Result<()> {
        self.recorder.pause(now_ms)?;
        Ok(())
    }

    pub fn resume_tracking(&mut self, now_ms: i64) -> Result<()> {
        self.recorder.resume(now_ms)?;
        Ok(())
    }

    /// Stops the session and persists it. On a storage error the stopped
    /// session is kept and can be persisted later with `retry_finalize`.
    pub fn stop_tracking(&mut self, now_ms: i64) -> Result<SessionId> {
        let session = self.recorder.stop(now_ms)?;
        self.pending = Some((self.activity_kind, session));
        self.finalize_pending()
    }

    pub fn has_pending_session(&self) -> bool {
        self.pending.is_some()
    }

    pub fn retry_finalize(&mut self) -> Result<SessionId> {
        if self.pending.is_none() {
            bail!("no stopped session waiting to be saved");
        }
        self.finalize_pending()
    }

    pub fn discard_pending_session(&mut self) -> Option<FinalizedSession> {
        let (kind, session) = self.pending.take()?;
        warn!(
            "discarding unsaved {} session with {} fixes",
            kind,
            session.fixes.len()
        );
        Some(session)
    }

    fn finalize_pending(&mut self) -> Result<SessionId> {
        let (kind, session) = match &self.pending {
            Some(pending) => pending,
            None => bail!("no stopped session waiting to be saved"),
        };
        match self.storage.finalize_session(*kind, session) {
            Ok(id) => {
                self.pending = None;
                Ok(id)
            }
            Err(error) => {
                warn!("failed to finalize session: {:?}", error);
                Err(error)
            }
        }
    }

    pub fn on_location_update(&mut self, mut fixes: Vec<CoordinateFix>) {
        // platforms may hand us a batch that is not in order
        fixes.sort_by_key(|fix| fix.timestamp_ms);
        for fix in fixes {
            let process_result = self.gps_processor.preprocess(&fix);
            self.storage.record_gps_data(&fix, process_result);
            if process_result == ProcessResult::Ignore {
                continue;
            }
            if let Err(error) = self.recorder.record_fix(fix) {
                debug!("location update ignored: {}", error);
            }
        }
    }

    pub fn tracking_status(&mut self, now_ms: i64) -> TrackingStatus {
        let distance_m = self.recorder.distance_m();
        TrackingStatus {
            state: self.recorder.state(),
            distance_m,
            elapsed_ms: self.recorder.elapsed_duration(now_ms).num_milliseconds(),
            fix_count: self.recorder.fixes().len(),
            kcal: self.storage.calorie_estimator().estimate_kcal(distance_m),
        }
    }

    pub fn current_polyline(&self) -> Vec<(f64, f64)> {
        self.recorder.polyline()
    }

    pub fn load_route(&self, id: SessionId) -> Result<Vec<CoordinateFix>, RouteStoreError> {
        self.storage.route_store().load(id)
    }

    pub fn route_distance_m(&self, id: SessionId) -> Result<f64, RouteStoreError> {
        Ok(distance::path_length_m(&self.load_route(id)?))
    }

    pub fn list_sessions_with_routes(&self) -> Result<BTreeSet<SessionId>, RouteStoreError> {
        self.storage.route_store().list_sessions_with_routes()
    }

    pub fn export_route_gpx(&self, id: SessionId, target_filepath: &str) -> Result<()> {
        let fixes = self.load_route(id)?;
        let file = File::create(target_filepath)?;
        export_data::route_to_gpx_file(&format!("Activity {id}"), &fixes, file)
    }

    pub fn get_activity(&mut self, id: SessionId) -> Result<Option<ActivityRecord>> {
        self.storage.with_db_txn(|txn| txn.get_activity(id))
    }

    pub fn list_activities(
        &mut self,
        from_ms: Option<i64>,
        to_ms: Option<i64>,
    ) -> Result<Vec<ActivityRecord>> {
        self.storage
            .with_db_txn(|txn| txn.query_activities(from_ms, to_ms))
    }

    pub fn delete_activity(&mut self, id: SessionId) -> Result<()> {
        self.storage.delete_activity(id)
    }

    pub fn get_user_profile(&mut self) -> Result<Option<UserProfile>> {
        self.storage.with_db_txn(|txn| txn.get_user_profile())
    }

    pub fn set_user_profile(&mut self, profile: UserProfile) -> Result<()> {
        self.storage
            .with_db_txn(|txn| txn.set_user_profile(&profile))
    }

    pub fn log_meal(&mut self, meal: Meal) -> Result<i64> {
        self.storage.with_db_txn(|txn| txn.insert_meal(&meal))
    }

    pub fn list_meals(&mut self, from_ms: Option<i64>, to_ms: Option<i64>) -> Result<Vec<MealRecord>> {
        self.storage
            .with_db_txn(|txn| txn.query_meals(from_ms, to_ms))
    }

    pub fn delete_meal(&mut self, id: i64) -> Result<()> {
        self.storage.with_db_txn(|txn| txn.delete_meal(id))
    }

    pub fn daily_report(&mut self, date: NaiveDate) -> Result<DailyReport> {
        self.storage.with_db_txn(|txn| txn.daily_report(date))
    }

    pub fn set_kcal_per_meter(&mut self, kcal_per_meter: f64) -> Result<()> {
        if !(kcal_per_meter >= 0.) {
            bail!("invalid kcal per meter: {}", kcal_per_meter);
        }
        self.storage
            .main_db()
            .set_setting(Setting::KcalPerMeter, kcal_per_meter)
    }

    pub fn list_all_raw_data(&self) -> Result<Vec<RawDataFile>> {
        self.storage.list_all_raw_data()
    }

    pub fn get_raw_data_mode(&self) -> bool {
        self.storage.get_raw_data_mode()
    }

    pub fn toggle_raw_data_mode(&mut self, enable: bool) -> Result<()> {
        self.storage.toggle_raw_data_mode(enable)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.storage.flush()
    }
}
