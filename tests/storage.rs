pub mod test_utils;

use assert_float_eq::*;
use chrono::Duration;
use fittrack_core::{
    activity_summary::ActivityKind,
    distance,
    gps_processor::ProcessResult,
    main_db::Setting,
    route_recorder::FinalizedSession,
    storage::Storage,
};
use rusqlite::Connection;
use std::fs;
use tempdir::TempDir;

fn session_of(fixes: Vec<fittrack_core::gps_processor::CoordinateFix>) -> FinalizedSession {
    FinalizedSession {
        start_ms: test_utils::START_MS,
        end_ms: test_utils::START_MS + 600_000,
        distance_m: distance::path_length_m(&fixes),
        fixes,
        active_duration: Duration::seconds(600),
    }
}

#[test]
fn finalize_session() {
    let temp_dir = TempDir::new("storage-finalize_session").unwrap();
    println!("temp dir: {:?}", temp_dir.path());
    let mut storage = Storage::init(test_utils::sub_folder(temp_dir.path(), "support/")).unwrap();

    let session = session_of(test_utils::synthetic_run(101, 10.));
    let id = storage
        .finalize_session(ActivityKind::Run, &session)
        .unwrap();

    let record = storage
        .with_db_txn(|txn| txn.get_activity(id))
        .unwrap()
        .unwrap();
    assert!(record.has_route);
    assert_eq!(record.kind, ActivityKind::Run);
    assert_float_absolute_eq!(record.distance_m, 1000., 1e-6);
    assert_float_absolute_eq!(record.kcal, 60., 1e-6);
    assert_eq!(record.active_duration_ms, 600_000);

    let fixes = storage.route_store().load(id).unwrap();
    assert_eq!(fixes.len(), 101);
    assert_float_absolute_eq!(distance::path_length_m(&fixes), 1000., 1e-6);

    storage.delete_activity(id).unwrap();
    assert!(storage.route_store().load(id).unwrap_err().is_not_found());
    assert!(storage
        .with_db_txn(|txn| txn.get_activity(id))
        .unwrap()
        .is_none());
    assert!(storage.delete_activity(id).is_err());
}

#[test]
fn finalize_empty_session() {
    let temp_dir = TempDir::new("storage-finalize_empty_session").unwrap();
    let mut storage = Storage::init(test_utils::sub_folder(temp_dir.path(), "support/")).unwrap();

    let id = storage
        .finalize_session(ActivityKind::Walk, &session_of(vec![]))
        .unwrap();
    let record = storage
        .with_db_txn(|txn| txn.get_activity(id))
        .unwrap()
        .unwrap();
    assert!(!record.has_route);
    assert_eq!(record.distance_m, 0.);
    assert!(storage
        .route_store()
        .list_sessions_with_routes()
        .unwrap()
        .is_empty());
    storage.delete_activity(id).unwrap();
}

#[test]
fn configured_calorie_estimate() {
    let temp_dir = TempDir::new("storage-calories").unwrap();
    let mut storage = Storage::init(test_utils::sub_folder(temp_dir.path(), "support/")).unwrap();
    storage
        .main_db()
        .set_setting(Setting::KcalPerMeter, 0.1)
        .unwrap();

    let id = storage
        .finalize_session(
            ActivityKind::Cycle,
            &session_of(test_utils::synthetic_run(11, 100.)),
        )
        .unwrap();
    let record = storage
        .with_db_txn(|txn| txn.get_activity(id))
        .unwrap()
        .unwrap();
    assert_float_absolute_eq!(record.kcal, 100., 1e-6);
}

#[cfg(unix)]
#[test]
fn route_write_failure_rolls_back() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new("storage-write_failure").unwrap();
    let support_dir = test_utils::sub_folder(temp_dir.path(), "support/");
    let mut storage = Storage::init(support_dir.clone()).unwrap();
    let routes_dir = temp_dir.path().join("support/routes");
    fs::set_permissions(&routes_dir, fs::Permissions::from_mode(0o555)).unwrap();
    // root ignores permissions, nothing to test then
    if fs::write(routes_dir.join("probe"), "").is_ok() {
        return;
    }

    let session = session_of(test_utils::synthetic_run(5, 10.));
    assert!(storage.finalize_session(ActivityKind::Run, &session).is_err());
    assert!(storage
        .with_db_txn(|txn| txn.query_activities(None, None))
        .unwrap()
        .is_empty());

    fs::set_permissions(&routes_dir, fs::Permissions::from_mode(0o755)).unwrap();
    let id = storage.finalize_session(ActivityKind::Run, &session).unwrap();
    assert_eq!(storage.route_store().load(id).unwrap().len(), 5);
}

#[test]
fn failed_finalize_removes_saved_route() {
    let temp_dir = TempDir::new("storage-failed_finalize").unwrap();
    let support_dir = test_utils::sub_folder(temp_dir.path(), "support/");
    let mut storage = Storage::init(support_dir).unwrap();

    // the route gets written, then marking the row fails and the insert is rolled back
    let conn = Connection::open(temp_dir.path().join("support/main.db")).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER reject_has_route BEFORE UPDATE OF has_route ON activity
         BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
    )
    .unwrap();

    let first = session_of(test_utils::synthetic_run(5, 10.));
    assert!(storage.finalize_session(ActivityKind::Run, &first).is_err());
    assert!(storage
        .route_store()
        .list_sessions_with_routes()
        .unwrap()
        .is_empty());
    assert!(storage
        .with_db_txn(|txn| txn.query_activities(None, None))
        .unwrap()
        .is_empty());

    conn.execute_batch("DROP TRIGGER reject_has_route;").unwrap();
    let second = session_of(test_utils::synthetic_run(8, 10.));
    let id = storage.finalize_session(ActivityKind::Run, &second).unwrap();
    assert_eq!(storage.route_store().load(id).unwrap().len(), 8);
}

#[test]
fn delete_activity_with_undeletable_route() {
    let temp_dir = TempDir::new("storage-undeletable_route").unwrap();
    let mut storage = Storage::init(test_utils::sub_folder(temp_dir.path(), "support/")).unwrap();
    let id = storage
        .finalize_session(
            ActivityKind::Walk,
            &session_of(test_utils::synthetic_run(5, 10.)),
        )
        .unwrap();

    // a directory matching the route name pattern cannot be removed as a file
    let routes_dir = temp_dir.path().join("support/routes");
    let blocker = routes_dir.join(format!("route_{}_zzzzzzzz.json", id));
    fs::create_dir(&blocker).unwrap();

    storage.delete_activity(id).unwrap();
    assert!(storage
        .with_db_txn(|txn| txn.get_activity(id))
        .unwrap()
        .is_none());
    let remaining: Vec<_> = fs::read_dir(&routes_dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(remaining, vec![blocker]);
}

#[test]
fn raw_data_mode() {
    let temp_dir = TempDir::new("storage-raw_data_mode").unwrap();
    let support_dir = test_utils::sub_folder(temp_dir.path(), "support/");
    let mut storage = Storage::init(support_dir.clone()).unwrap();
    assert!(!storage.get_raw_data_mode());
    assert!(storage.list_all_raw_data().unwrap().is_empty());

    storage.toggle_raw_data_mode(true).unwrap();
    for fix in test_utils::synthetic_run(10, 3.) {
        storage.record_gps_data(&fix, ProcessResult::Accept);
    }
    storage.flush().unwrap();

    let files = storage.list_all_raw_data().unwrap();
    assert_eq!(files.len(), 1);
    let content = fs::read_to_string(&files[0].path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 11);
    assert!(lines[0].starts_with("timestamp_ms,"));
    assert!(lines[1].ends_with(",0"));

    // the setting survives a restart
    drop(storage);
    let mut storage = Storage::init(support_dir).unwrap();
    assert!(storage.get_raw_data_mode());
    storage.toggle_raw_data_mode(false).unwrap();
    assert!(!storage.get_raw_data_mode());
}
