use anyhow::Result;
use chrono::Utc;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::activity_summary::{ActivityKind, ActivitySummary, CalorieEstimator};
use crate::gps_processor::{CoordinateFix, ProcessResult};
use crate::main_db::{MainDb, Setting, Txn};
use crate::route_recorder::FinalizedSession;
use crate::route_store::{RouteStore, SessionId};

pub struct RawDataFile {
    pub name: String,
    pub path: String,
}

/* This is an optional feature that should be off by default: storing every
   fix we got from the platform together with what the preprocessor decided.
   It is meant for debugging the location pipeline. It stores data in a
   simple csv format and uses a new file every time it is enabled.
*/
struct RawDataRecorder {
    dir: PathBuf,
    file: Option<File>,
}

impl RawDataRecorder {
    fn init(support_dir: &str) -> Result<RawDataRecorder> {
        let dir = Path::new(support_dir).join("raw_data/");
        std::fs::create_dir_all(&dir)?;
        Ok(RawDataRecorder { dir, file: None })
    }

    fn open_new_file(&self) -> Result<File> {
        let timestamp_sec = Utc::now().timestamp();
        let mut i = 0;
        let filename = loop {
            let filename = self.dir.join(format!("gps-{}-{}.csv", timestamp_sec, i));
            if std::fs::metadata(&filename).is_err() {
                break filename;
            }
            i += 1;
        };
        let mut file = File::create(filename)?;
        file.write_all(
            "timestamp_ms,latitude,longitude,accuracy,altitude,speed,process_result\n".as_bytes(),
        )?;
        Ok(file)
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(ref mut file) = self.file {
            file.flush()?;
        }
        Ok(())
    }

    fn record(&mut self, fix: &CoordinateFix, process_result: ProcessResult) -> Result<()> {
        let file = match self.file.take() {
            Some(file) => file,
            None => self.open_new_file()?,
        };
        let file = self.file.insert(file);
        let optional = |x: Option<f32>| x.map(|x| x.to_string()).unwrap_or_default();
        file.write_all(
            format!(
                "{},{},{},{},{},{},{}\n",
                fix.timestamp_ms,
                fix.latitude,
                fix.longitude,
                optional(fix.accuracy),
                optional(fix.altitude),
                optional(fix.speed),
                process_result.to_int()
            )
            .as_bytes(),
        )?;
        Ok(())
    }
}

pub struct Storage {
    support_dir: String,
    main_db: MainDb,
    route_store: RouteStore,
    raw_data_recorder: Option<RawDataRecorder>, // `None` means disabled
}

impl Storage {
    pub fn init(support_dir: String) -> Result<Self> {
        let mut main_db = MainDb::open(&support_dir)?;
        let route_store = RouteStore::open(Path::new(&support_dir).join("routes/"))?;
        let raw_data_recorder = if main_db.get_setting_with_default(Setting::RawDataMode, false) {
            Some(RawDataRecorder::init(&support_dir)?)
        } else {
            None
        };
        Ok(Storage {
            support_dir,
            main_db,
            route_store,
            raw_data_recorder,
        })
    }

    pub fn route_store(&self) -> &RouteStore {
        &self.route_store
    }

    pub fn main_db(&mut self) -> &mut MainDb {
        &mut self.main_db
    }

    pub fn with_db_txn<F, O>(&mut self, f: F) -> Result<O>
    where
        F: FnOnce(&mut Txn) -> Result<O>,
    {
        self.main_db.with_txn(f)
    }

    pub fn calorie_estimator(&mut self) -> CalorieEstimator {
        let default = CalorieEstimator::default();
        CalorieEstimator {
            kcal_per_meter: self
                .main_db
                .get_setting_with_default(Setting::KcalPerMeter, default.kcal_per_meter),
        }
    }

    pub fn toggle_raw_data_mode(&mut self, enable: bool) -> Result<()> {
        if enable {
            if self.raw_data_recorder.is_none() {
                self.raw_data_recorder = Some(RawDataRecorder::init(&self.support_dir)?);
                debug!("[storage] raw data mod enabled");
                self.main_db.set_setting(Setting::RawDataMode, true)?;
            }
        } else if self.raw_data_recorder.is_some() {
            debug!("[storage] raw data mod disabled");
            // `drop` should do the right thing and release all resources.
            self.raw_data_recorder = None;
            self.main_db.set_setting(Setting::RawDataMode, false)?;
        }
        Ok(())
    }

    pub fn get_raw_data_mode(&self) -> bool {
        self.raw_data_recorder.is_some()
    }

    pub fn record_gps_data(&mut self, fix: &CoordinateFix, process_result: ProcessResult) {
        if let Some(ref mut recorder) = self.raw_data_recorder {
            // losing debug data is not worth interrupting the session for
            if let Err(error) = recorder.record(fix, process_result) {
                warn!("[storage] failed to record raw data: {}", error);
            }
        }
    }

    pub fn list_all_raw_data(&self) -> Result<Vec<RawDataFile>> {
        let dir = Path::new(&self.support_dir).join("raw_data/");
        let mut result = Vec::new();
        if !dir.exists() {
            return Ok(result);
        }
        for entry in std::fs::read_dir(dir)? {
            let file = match entry {
                Ok(file) => file,
                Err(error) => {
                    warn!("[storage] skipping raw data entry: {}", error);
                    continue;
                }
            };
            let filename = file.file_name().to_string_lossy().into_owned();
            if filename.ends_with(".csv") {
                result.push(RawDataFile {
                    name: filename,
                    path: file.path().to_string_lossy().into_owned(),
                })
            }
        }
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    /// Persists a stopped session: one `activity` row plus its route file when
    /// there are fixes. If the route cannot be written the row is rolled back
    /// and the error is returned; `session` is untouched so the caller can
    /// try again.
    pub fn finalize_session(
        &mut self,
        kind: ActivityKind,
        session: &FinalizedSession,
    ) -> Result<SessionId> {
        let estimator = self.calorie_estimator();
        let summary = ActivitySummary::of(session, kind, &estimator);
        let route_store = &self.route_store;
        let mut saved_route = None;
        let result = self.main_db.with_txn(|txn| {
            let id = txn.insert_activity(&summary, session.start_ms, session.end_ms)?;
            if let Some(path) = route_store.save(id, &session.fixes)? {
                debug!("[storage] route of activity {} at {:?}", id, path);
                saved_route = Some(path.clone());
                txn.set_activity_has_route(id, true)?;
            }
            Ok(id)
        });
        // the rowid may be handed out again, so a route left behind by a
        // rolled back insert would be loaded for the next activity
        if result.is_err() {
            if let Some(path) = saved_route {
                if let Err(error) = std::fs::remove_file(&path) {
                    warn!("[storage] failed to remove orphan route {:?}: {}", path, error);
                }
            }
        }
        result
    }

    pub fn delete_activity(&mut self, id: SessionId) -> Result<()> {
        let has_route = self.main_db.with_txn(|txn| {
            let has_route = txn
                .get_activity(id)?
                .ok_or_else(|| anyhow!("Failed to find activity with id = {}", id))?
                .has_route;
            txn.delete_activity(id)?;
            Ok(has_route)
        })?;
        // the row is gone at this point, leftover files only cost disk space
        if has_route && !self.route_store.delete(id) {
            warn!("[storage] some route files of activity {} were not removed", id);
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        debug!("[storage] flushing");
        self.main_db.flush()?;
        if let Some(ref mut recorder) = self.raw_data_recorder {
            recorder.flush()?;
        }
        Ok(())
    }
}
