use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::RouteStoreError;
use crate::gps_processor::CoordinateFix;

/* Finished routes are kept as one small json document per session under
   `<support_dir>/routes/`, named `route_<session id>_<random suffix>.json`.
   There is no index file, everything is found by scanning the directory and
   matching on the name prefix. The random suffix only exists to avoid
   clobbering an existing file if the same session is saved twice.
*/

pub type SessionId = i64;

const FILE_PREFIX: &str = "route_";
const FILE_EXTENSION: &str = ".json";
const SUFFIX_LEN: usize = 8;

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct RoutePoint {
    lat: f64,
    lng: f64,
    time: i64,
    #[serde(default)]
    speed: f64,
    #[serde(default)]
    altitude: f64,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct RouteDocument {
    activity_id: SessionId,
    timestamp: i64,
    points: Vec<RoutePoint>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PersistedRoute {
    pub session_id: SessionId,
    pub created_at_ms: i64,
    pub fixes: Vec<CoordinateFix>,
}

impl From<&CoordinateFix> for RoutePoint {
    fn from(fix: &CoordinateFix) -> Self {
        RoutePoint {
            lat: fix.latitude,
            lng: fix.longitude,
            time: fix.timestamp_ms,
            speed: fix.speed.map(f64::from).unwrap_or(0.),
            altitude: fix.altitude.map(f64::from).unwrap_or(0.),
        }
    }
}

impl From<RoutePoint> for CoordinateFix {
    fn from(point: RoutePoint) -> Self {
        CoordinateFix {
            latitude: point.lat,
            longitude: point.lng,
            timestamp_ms: point.time,
            speed: Some(point.speed as f32),
            altitude: Some(point.altitude as f32),
            accuracy: None,
        }
    }
}

fn file_prefix_of(session_id: SessionId) -> String {
    format!("{FILE_PREFIX}{session_id}_")
}

// `route_42_a1b2c3d4.json` -> `Some(42)`
fn parse_session_id(file_name: &str) -> Option<SessionId> {
    let stem = file_name
        .strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_EXTENSION)?;
    let (id, suffix) = stem.rsplit_once('_')?;
    if suffix.len() != SUFFIX_LEN || !suffix.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    id.parse().ok()
}


pub struct RouteStore {
    dir: PathBuf,
}

impl RouteStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<RouteStore, RouteStoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| RouteStoreError::Storage {
            path: dir.clone(),
            source,
        })?;
        Ok(RouteStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn new_file_path(&self, session_id: SessionId) -> PathBuf {
        loop {
            let suffix = random_string::generate(SUFFIX_LEN, random_string::charsets::ALPHANUMERIC);
            let path = self.dir.join(format!(
                "{}{}{}",
                file_prefix_of(session_id),
                suffix,
                FILE_EXTENSION
            ));
            if fs::metadata(&path).is_err() {
                break path;
            }
        }
    }

    /// Writes the route of `session_id`. Returns `None` and writes nothing
    /// when `fixes` is empty.
    pub fn save(
        &self,
        session_id: SessionId,
        fixes: &[CoordinateFix],
    ) -> Result<Option<PathBuf>, RouteStoreError> {
        if fixes.is_empty() {
            debug!("[route_store] nothing to save for session {}", session_id);
            return Ok(None);
        }
        let document = RouteDocument {
            activity_id: session_id,
            timestamp: Utc::now().timestamp_millis(),
            points: fixes.iter().map(RoutePoint::from).collect(),
        };
        let path = self.new_file_path(session_id);
        let storage_error = |source| RouteStoreError::Storage {
            path: path.clone(),
            source,
        };

        let bytes = serde_json::to_vec(&document).map_err(|e| storage_error(io::Error::from(e)))?;
        if let Err(error) = fs::write(&path, bytes) {
            // don't leave a half written document behind for `load` to trip on
            let _ = fs::remove_file(&path);
            return Err(storage_error(error));
        }
        info!(
            "[route_store] saved {} points for session {} to {:?}",
            fixes.len(),
            session_id,
            path
        );
        Ok(Some(path))
    }

    // Names of all files that belong to `session_id`, sorted.
    fn files_of(&self, session_id: SessionId) -> Result<Vec<PathBuf>, RouteStoreError> {
        let prefix = file_prefix_of(session_id);
        let mut result = Vec::new();
        for entry in self.read_dir()? {
            if let Some(file_name) = entry.file_name().to_str() {
                if file_name.starts_with(&prefix) && file_name.ends_with(FILE_EXTENSION) {
                    result.push(entry.path());
                }
            }
        }
        result.sort();
        Ok(result)
    }

    fn read_dir(&self) -> Result<impl Iterator<Item = fs::DirEntry>, RouteStoreError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| RouteStoreError::Storage {
            path: self.dir.clone(),
            source,
        })?;
        Ok(entries.filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(error) => {
                warn!("[route_store] skipping unreadable entry: {}", error);
                None
            }
        }))
    }

    pub fn load_route(&self, session_id: SessionId) -> Result<PersistedRoute, RouteStoreError> {
        let path = self
            .files_of(session_id)?
            .into_iter()
            .next()
            .ok_or(RouteStoreError::NotFound(session_id))?;
        let bytes = fs::read(&path).map_err(|source| RouteStoreError::Storage {
            path: path.clone(),
            source,
        })?;
        let document: RouteDocument = serde_json::from_slice(&bytes)
            .map_err(|source| RouteStoreError::Parse { path, source })?;
        Ok(PersistedRoute {
            // the file name is what we matched on, so it wins over the body
            session_id,
            created_at_ms: document.timestamp,
            fixes: document.points.into_iter().map(CoordinateFix::from).collect(),
        })
    }

    pub fn load(&self, session_id: SessionId) -> Result<Vec<CoordinateFix>, RouteStoreError> {
        Ok(self.load_route(session_id)?.fixes)
    }

    pub fn list_sessions_with_routes(&self) -> Result<BTreeSet<SessionId>, RouteStoreError> {
        let mut result = BTreeSet::new();
        for entry in self.read_dir()? {
            let file_name = entry.file_name();
            match file_name.to_str().and_then(parse_session_id) {
                Some(session_id) => {
                    result.insert(session_id);
                }
                None => warn!(
                    "[route_store] skipping unexpected file: {:?}",
                    entry.file_name()
                ),
            }
        }
        Ok(result)
    }

    /// Removes every route file of `session_id`. Returns `false` if any of
    /// them could not be removed (or the directory could not be scanned).
    pub fn delete(&self, session_id: SessionId) -> bool {
        let files = match self.files_of(session_id) {
            Ok(files) => files,
            Err(error) => {
                warn!("[route_store] delete session {}: {}", session_id, error);
                return false;
            }
        };
        let mut all_removed = true;
        for path in files {
            if let Err(error) = fs::remove_file(&path) {
                warn!("[route_store] failed to remove {:?}: {}", path, error);
                all_removed = false;
            }
        }
        all_removed
    }
}
