pub mod test_utils;

use chrono::NaiveDate;
use fittrack_core::activity_summary::{ActivityKind, ActivitySummary};
use fittrack_core::main_db::{Meal, MainDb, Setting, UserProfile};
use fittrack_core::utils;
use rusqlite::Connection;
use tempdir::TempDir;

fn meal(name: &str, eaten_at_ms: i64, kcal: f64) -> Meal {
    Meal {
        eaten_at_ms,
        name: name.to_owned(),
        kcal,
        protein_g: Some(10.),
        carbs_g: None,
        fat_g: Some(3.5),
    }
}

fn summary(kind: ActivityKind, distance_m: f64, kcal: f64) -> ActivitySummary {
    ActivitySummary {
        kind,
        distance_m,
        active_duration_ms: 600_000,
        kcal,
    }
}

#[test]
fn user_profile() {
    let temp_dir = TempDir::new("main_db-user_profile").unwrap();
    let mut main_db = MainDb::open(temp_dir.path().to_str().unwrap()).unwrap();
    assert_eq!(main_db.with_txn(|txn| txn.get_user_profile()).unwrap(), None);

    let mut profile = UserProfile {
        name: "Sam".to_owned(),
        age: Some(31),
        sex: None,
        height_cm: Some(172.),
        weight_kg: Some(65.5),
    };
    main_db
        .with_txn(|txn| txn.set_user_profile(&profile))
        .unwrap();
    profile.weight_kg = Some(64.);
    main_db
        .with_txn(|txn| txn.set_user_profile(&profile))
        .unwrap();

    // reopen, there is still exactly one profile
    drop(main_db);
    let mut main_db = MainDb::open(temp_dir.path().to_str().unwrap()).unwrap();
    assert_eq!(
        main_db.with_txn(|txn| txn.get_user_profile()).unwrap(),
        Some(profile)
    );
}

#[test]
fn meals() {
    let temp_dir = TempDir::new("main_db-meals").unwrap();
    let mut main_db = MainDb::open(temp_dir.path().to_str().unwrap()).unwrap();

    let id1 = main_db
        .with_txn(|txn| txn.insert_meal(&meal("oatmeal", 3000, 350.)))
        .unwrap();
    let id2 = main_db
        .with_txn(|txn| txn.insert_meal(&meal("salad", 1000, 200.)))
        .unwrap();
    assert_ne!(id1, id2);

    let meals = main_db.with_txn(|txn| txn.query_meals(None, None)).unwrap();
    assert_eq!(meals.len(), 2);
    // oldest first
    assert_eq!(meals[0].id, id2);
    assert_eq!(meals[0].meal, meal("salad", 1000, 200.));

    let meals = main_db
        .with_txn(|txn| txn.query_meals(Some(2000), None))
        .unwrap();
    assert_eq!(meals.len(), 1);
    assert_eq!(meals[0].id, id1);

    main_db.with_txn(|txn| txn.delete_meal(id1)).unwrap();
    assert!(main_db.with_txn(|txn| txn.delete_meal(id1)).is_err());
    assert_eq!(
        main_db
            .with_txn(|txn| txn.query_meals(None, None))
            .unwrap()
            .len(),
        1
    );

    assert!(main_db
        .with_txn(|txn| txn.insert_meal(&meal(" ", 1000, 200.)))
        .is_err());
    assert!(main_db
        .with_txn(|txn| txn.insert_meal(&meal("soup", 1000, -1.)))
        .is_err());
}

#[test]
fn activities() {
    let temp_dir = TempDir::new("main_db-activities").unwrap();
    let mut main_db = MainDb::open(temp_dir.path().to_str().unwrap()).unwrap();

    let id = main_db
        .with_txn(|txn| txn.insert_activity(&summary(ActivityKind::Run, 5000., 300.), 100, 200))
        .unwrap();
    let record = main_db
        .with_txn(|txn| txn.get_activity(id))
        .unwrap()
        .unwrap();
    assert_eq!(record.kind, ActivityKind::Run);
    assert_eq!(record.start_ms, 100);
    assert_eq!(record.end_ms, 200);
    assert_eq!(record.distance_m, 5000.);
    assert!(!record.has_route);

    main_db
        .with_txn(|txn| txn.set_activity_has_route(id, true))
        .unwrap();
    assert!(
        main_db
            .with_txn(|txn| txn.get_activity(id))
            .unwrap()
            .unwrap()
            .has_route
    );
    assert!(main_db
        .with_txn(|txn| txn.set_activity_has_route(id + 1, true))
        .is_err());

    main_db.with_txn(|txn| txn.delete_activity(id)).unwrap();
    assert_eq!(main_db.with_txn(|txn| txn.get_activity(id)).unwrap(), None);
    assert!(main_db.with_txn(|txn| txn.delete_activity(id)).is_err());
}

#[test]
fn failed_txn_rolls_back() {
    let temp_dir = TempDir::new("main_db-rollback").unwrap();
    let mut main_db = MainDb::open(temp_dir.path().to_str().unwrap()).unwrap();

    let result: anyhow::Result<()> = main_db.with_txn(|txn| {
        txn.insert_activity(&summary(ActivityKind::Walk, 100., 6.), 100, 200)?;
        Err(anyhow::anyhow!("boom"))
    });
    assert!(result.is_err());
    assert!(main_db
        .with_txn(|txn| txn.query_activities(None, None))
        .unwrap()
        .is_empty());
}

#[test]
fn daily_report() {
    let temp_dir = TempDir::new("main_db-daily_report").unwrap();
    let mut main_db = MainDb::open(temp_dir.path().to_str().unwrap()).unwrap();

    let date = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
    let (start, end) = utils::local_day_range_ms(date).unwrap();

    main_db
        .with_txn(|txn| {
            txn.insert_meal(&meal("breakfast", start, 400.))?;
            txn.insert_meal(&meal("dinner", end - 1, 700.))?;
            // the next day
            txn.insert_meal(&meal("midnight snack", end, 250.))?;
            txn.insert_activity(&summary(ActivityKind::Run, 5000., 300.), start + 1000, start + 2000)?;
            txn.insert_activity(&summary(ActivityKind::Cycle, 10000., 600.), start - 1, start)?;
            Ok(())
        })
        .unwrap();

    let report = main_db.with_txn(|txn| txn.daily_report(date)).unwrap();
    assert_eq!(report.date, date);
    assert_eq!(report.meal_count, 2);
    assert_eq!(report.kcal_in, 1100.);
    assert_eq!(report.activity_count, 1);
    assert_eq!(report.kcal_out, 300.);
    assert_eq!(report.distance_m, 5000.);
    assert_eq!(report.active_duration_ms, 600_000);
    assert_eq!(report.kcal_balance(), 800.);

    let empty = main_db
        .with_txn(|txn| txn.daily_report(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()))
        .unwrap();
    assert_eq!(empty.meal_count, 0);
    assert_eq!(empty.kcal_in, 0.);
    assert_eq!(empty.active_duration_ms, 0);
}

#[test]
fn settings() {
    let temp_dir = TempDir::new("main_db-settings").unwrap();
    let mut main_db = MainDb::open(temp_dir.path().to_str().unwrap()).unwrap();

    assert!(!main_db.get_setting_with_default(Setting::RawDataMode, false));
    main_db.set_setting(Setting::RawDataMode, true).unwrap();
    assert!(main_db.get_setting_with_default(Setting::RawDataMode, false));

    main_db.set_setting(Setting::KcalPerMeter, 0.08).unwrap();
    assert_eq!(
        main_db.get_setting_with_default(Setting::KcalPerMeter, 0.06),
        0.08
    );
    // unparsable values fall back to the default
    main_db.set_setting(Setting::MaxAccuracyM, "lots").unwrap();
    assert_eq!(
        main_db.get_setting_with_default(Setting::MaxAccuracyM, 50.0f32),
        50.0
    );
}

#[test]
fn version_too_high() {
    let temp_dir = TempDir::new("main_db-version_too_high").unwrap();
    let support_dir = temp_dir.path().to_str().unwrap();
    drop(MainDb::open(support_dir).unwrap());

    let conn = Connection::open(temp_dir.path().join("main.db")).unwrap();
    conn.execute(
        "UPDATE `db_metadata` SET value = '99' WHERE key = 'version'",
        (),
    )
    .unwrap();
    drop(conn);

    assert!(MainDb::open(support_dir).is_err());
}
