use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, Transaction};
use std::cmp::Ordering;
use std::error::Error;
use std::path::Path;
use std::str::FromStr;

use crate::activity_summary::{ActivityKind, ActivitySummary};
use crate::utils;

/* The main database. It keeps the relational side of the app: the single
user profile, logged meals, one row per finished activity and a small
key/value `setting` table. Recorded routes are NOT stored here, they live as
json files managed by `route_store` and are keyed by the `activity` row id.

`MainDb` is a plain owned object, whoever needs it gets it passed in (see
`Storage`).
*/

type Migration = dyn Fn(&Transaction) -> Result<()>;

fn open_db_and_run_migration(
    support_dir: &str,
    file_name: &str,
    migrations: &[&Migration],
) -> Result<Connection> {
    debug!("open and run migration for {}", file_name);
    let mut conn = Connection::open(Path::new(support_dir).join(file_name))?;
    let tx = conn.transaction()?;

    tx.execute(
        "CREATE TABLE IF NOT EXISTS `db_metadata` (
            `key`   TEXT NOT NULL,
            `value` TEXT,
            PRIMARY KEY(`key`)
        )",
        (),
    )?;
    let version_str: Option<String> = tx
        .query_row(
            "SELECT `value` FROM `db_metadata` WHERE key='version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    let version: usize = match version_str {
        None => 0,
        Some(s) => s.parse()?,
    };

    let target_version = migrations.len();
    debug!(
        "current version = {}, target_version = {}",
        version, target_version
    );
    match version.cmp(&target_version) {
        Ordering::Equal => (),
        Ordering::Less => {
            for (i, f) in migrations.iter().enumerate().skip(version) {
                info!("running migration for version: {}", i + 1);
                f(&tx)?;
            }
            tx.execute(
                "INSERT OR REPLACE INTO `db_metadata` (key, value) VALUES (?1, ?2)",
                ("version", target_version.to_string()),
            )?;
        }
        Ordering::Greater => {
            bail!(
                "version too high: current version = {}, target_version = {}",
                version,
                target_version
            );
        }
    }
    tx.commit()?;
    Ok(conn)
}

#[derive(Clone, Debug, PartialEq)]
pub struct UserProfile {
    pub name: String,
    pub age: Option<u32>,
    pub sex: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Meal {
    pub eaten_at_ms: i64,
    pub name: String,
    pub kcal: f64,
    pub protein_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub fat_g: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MealRecord {
    pub id: i64,
    pub meal: Meal,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ActivityRecord {
    pub id: i64,
    pub kind: ActivityKind,
    pub start_ms: i64,
    pub end_ms: i64,
    pub active_duration_ms: i64,
    pub distance_m: f64,
    pub kcal: f64,
    pub has_route: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub kcal_in: f64,
    pub kcal_out: f64,
    pub distance_m: f64,
    pub active_duration_ms: i64,
    pub meal_count: u32,
    pub activity_count: u32,
}

impl DailyReport {
    pub fn kcal_balance(&self) -> f64 {
        self.kcal_in - self.kcal_out
    }
}

const ACTIVITY_COLUMNS: &str =
    "id, kind, start_ms, end_ms, active_duration_ms, distance_m, kcal, has_route";

fn activity_of_row(row: &Row) -> rusqlite::Result<(ActivityRecord, String)> {
    // `kind` is parsed by the caller so a bad value becomes an `anyhow` error
    let kind: String = row.get(1)?;
    Ok((
        ActivityRecord {
            id: row.get(0)?,
            kind: ActivityKind::Other,
            start_ms: row.get(2)?,
            end_ms: row.get(3)?,
            active_duration_ms: row.get(4)?,
            distance_m: row.get(5)?,
            kcal: row.get(6)?,
            has_route: row.get(7)?,
        },
        kind,
    ))
}

fn finish_activity((mut record, kind): (ActivityRecord, String)) -> Result<ActivityRecord> {
    record.kind = kind.parse()?;
    Ok(record)
}

pub struct Txn<'a> {
    db_txn: Transaction<'a>,
}

impl Txn<'_> {
    pub fn get_user_profile(&self) -> Result<Option<UserProfile>> {
        Ok(self
            .db_txn
            .query_row(
                "SELECT name, age, sex, height_cm, weight_kg FROM user_profile WHERE id = 1;",
                (),
                |row| {
                    Ok(UserProfile {
                        name: row.get(0)?,
                        age: row.get(1)?,
                        sex: row.get(2)?,
                        height_cm: row.get(3)?,
                        weight_kg: row.get(4)?,
                    })
                },
            )
            .optional()?)
    }

    pub fn set_user_profile(&mut self, profile: &UserProfile) -> Result<()> {
        info!("Updating user profile");
        let sql = "INSERT OR REPLACE INTO user_profile (id, name, age, sex, height_cm, weight_kg) VALUES (1, ?1, ?2, ?3, ?4, ?5);";
        self.db_txn.execute(
            sql,
            (
                &profile.name,
                profile.age,
                &profile.sex,
                profile.height_cm,
                profile.weight_kg,
            ),
        )?;
        Ok(())
    }

    pub fn insert_meal(&mut self, meal: &Meal) -> Result<i64> {
        if meal.name.trim().is_empty() {
            bail!("[insert_meal] meal name is empty");
        }
        if !(meal.kcal >= 0.) {
            bail!("[insert_meal] invalid kcal: {}", meal.kcal);
        }
        let sql = "INSERT INTO meal (eaten_at_ms, name, kcal, protein_g, carbs_g, fat_g) VALUES (?1, ?2, ?3, ?4, ?5, ?6);";
        self.db_txn.execute(
            sql,
            (
                meal.eaten_at_ms,
                &meal.name,
                meal.kcal,
                meal.protein_g,
                meal.carbs_g,
                meal.fat_g,
            ),
        )?;
        Ok(self.db_txn.last_insert_rowid())
    }

    // meals with `from_ms <= eaten_at_ms < to_ms`, oldest first
    pub fn query_meals(&self, from_ms: Option<i64>, to_ms: Option<i64>) -> Result<Vec<MealRecord>> {
        let mut query = self.db_txn.prepare(
            "SELECT id, eaten_at_ms, name, kcal, protein_g, carbs_g, fat_g FROM meal
             WHERE (?1 IS NULL OR eaten_at_ms >= ?1) AND (?2 IS NULL OR eaten_at_ms < ?2)
             ORDER BY eaten_at_ms, id;",
        )?;
        let results = query.query_map((from_ms, to_ms), |row| {
            Ok(MealRecord {
                id: row.get(0)?,
                meal: Meal {
                    eaten_at_ms: row.get(1)?,
                    name: row.get(2)?,
                    kcal: row.get(3)?,
                    protein_g: row.get(4)?,
                    carbs_g: row.get(5)?,
                    fat_g: row.get(6)?,
                },
            })
        })?;
        Ok(results.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn delete_meal(&mut self, id: i64) -> Result<()> {
        info!("Deleting meal: id={}", id);
        let changes = self
            .db_txn
            .execute("DELETE FROM meal WHERE id = ?1;", (id,))?;
        if changes == 1 {
            Ok(())
        } else {
            Err(anyhow!("Failed to find meal with id = {}", id))
        }
    }

    pub fn insert_activity(
        &mut self,
        summary: &ActivitySummary,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<i64> {
        let sql = "INSERT INTO activity (kind, start_ms, end_ms, active_duration_ms, distance_m, kcal, has_route) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0);";
        self.db_txn.execute(
            sql,
            (
                summary.kind.to_db_str(),
                start_ms,
                end_ms,
                summary.active_duration_ms,
                summary.distance_m,
                summary.kcal,
            ),
        )?;
        let id = self.db_txn.last_insert_rowid();
        info!("Inserted activity: id={}, kind={}", id, summary.kind);
        Ok(id)
    }

    pub fn set_activity_has_route(&mut self, id: i64, has_route: bool) -> Result<()> {
        let changes = self.db_txn.execute(
            "UPDATE activity SET has_route = ?1 WHERE id = ?2;",
            (has_route, id),
        )?;
        if changes != 1 {
            bail!("Failed to find activity with id = {}", id);
        }
        Ok(())
    }

    pub fn get_activity(&self, id: i64) -> Result<Option<ActivityRecord>> {
        let sql = format!("SELECT {ACTIVITY_COLUMNS} FROM activity WHERE id = ?1;");
        self.db_txn
            .query_row(&sql, (id,), activity_of_row)
            .optional()?
            .map(finish_activity)
            .transpose()
    }

    // activities with `from_ms <= start_ms < to_ms`, oldest first
    pub fn query_activities(
        &self,
        from_ms: Option<i64>,
        to_ms: Option<i64>,
    ) -> Result<Vec<ActivityRecord>> {
        let sql = format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activity
             WHERE (?1 IS NULL OR start_ms >= ?1) AND (?2 IS NULL OR start_ms < ?2)
             ORDER BY start_ms, id;"
        );
        let mut query = self.db_txn.prepare(&sql)?;
        let results = query.query_map((from_ms, to_ms), activity_of_row)?;
        let mut activities = Vec::new();
        for result in results {
            activities.push(finish_activity(result?)?);
        }
        Ok(activities)
    }

    pub fn delete_activity(&mut self, id: i64) -> Result<()> {
        info!("Deleting activity: id={}", id);
        let changes = self
            .db_txn
            .execute("DELETE FROM activity WHERE id = ?1;", (id,))?;
        if changes == 1 {
            Ok(())
        } else {
            Err(anyhow!("Failed to find activity with id = {}", id))
        }
    }

    pub fn daily_report(&self, date: NaiveDate) -> Result<DailyReport> {
        let (from_ms, to_ms) = utils::local_day_range_ms(date)?;
        let (meal_count, kcal_in): (u32, f64) = self.db_txn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(kcal), 0.0) FROM meal WHERE eaten_at_ms >= ?1 AND eaten_at_ms < ?2;",
            (from_ms, to_ms),
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let (activity_count, kcal_out, distance_m, active_duration_ms): (u32, f64, f64, i64) =
            self.db_txn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(kcal), 0.0), COALESCE(SUM(distance_m), 0.0), COALESCE(SUM(active_duration_ms), 0)
                 FROM activity WHERE start_ms >= ?1 AND start_ms < ?2;",
                (from_ms, to_ms),
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;
        Ok(DailyReport {
            date,
            kcal_in,
            kcal_out,
            distance_m,
            active_duration_ms,
            meal_count,
            activity_count,
        })
    }
}

pub struct MainDb {
    conn: Connection,
}

impl MainDb {
    pub fn open(support_dir: &str) -> Result<MainDb> {
        let conn = open_db_and_run_migration(
            support_dir,
            "main.db",
            &[&|tx| {
                let sql = "
                CREATE TABLE user_profile (
                    id        INTEGER PRIMARY KEY
                                      NOT NULL
                                      CHECK (id = 1),
                    name      TEXT    NOT NULL,
                    age       INTEGER,
                    sex       TEXT,
                    height_cm REAL,
                    weight_kg REAL
                );
                CREATE TABLE meal (
                    id          INTEGER PRIMARY KEY AUTOINCREMENT
                                        UNIQUE
                                        NOT NULL,
                    eaten_at_ms INTEGER NOT NULL,
                    name        TEXT    NOT NULL,
                    kcal        REAL    NOT NULL,
                    protein_g   REAL,
                    carbs_g     REAL,
                    fat_g       REAL
                );
                CREATE INDEX meal_eaten_at_index ON meal (
                    eaten_at_ms
                );
                CREATE TABLE activity (
                    id                 INTEGER PRIMARY KEY AUTOINCREMENT
                                               UNIQUE
                                               NOT NULL,
                    kind               TEXT    NOT NULL,
                    start_ms           INTEGER NOT NULL,
                    end_ms             INTEGER NOT NULL,
                    active_duration_ms INTEGER NOT NULL,
                    distance_m         REAL    NOT NULL,
                    kcal               REAL    NOT NULL,
                    has_route          INTEGER NOT NULL DEFAULT 0
                );
                CREATE INDEX activity_start_index ON activity (
                    start_ms
                );
                CREATE TABLE setting (
                    key               TEXT    PRIMARY KEY
                                              NOT NULL
                                              UNIQUE,
                    value             TEXT
                );
                ";
                tx.execute_batch(sql)?;
                Ok(())
            }],
        )?;
        Ok(MainDb { conn })
    }

    pub fn with_txn<F, O>(&mut self, f: F) -> Result<O>
    where
        F: FnOnce(&mut Txn) -> Result<O>,
    {
        let mut txn = Txn {
            db_txn: self.conn.transaction()?,
        };
        // dropping `txn` without commit rolls it back
        let output = f(&mut txn)?;
        txn.db_txn.commit()?;
        Ok(output)
    }

    pub fn flush(&self) -> Result<()> {
        self.conn.cache_flush()?;
        Ok(())
    }

    fn get_setting<T: FromStr>(&mut self, setting: Setting) -> Result<Option<T>>
    where
        <T as FromStr>::Err: Error + Send + Sync + 'static,
    {
        let result: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM setting WHERE key = ?1;",
                [setting.to_db_key()],
                |row| row.get(0),
            )
            .optional()?;
        match result {
            None => Ok(None),
            Some(s) => {
                let v = FromStr::from_str(&s)?;
                Ok(Some(v))
            }
        }
    }

    pub fn get_setting_with_default<T: FromStr>(&mut self, setting: Setting, default: T) -> T
    where
        <T as FromStr>::Err: Error + Send + Sync + 'static,
    {
        match self.get_setting(setting) {
            Ok(v) => v,
            Err(error) => {
                warn!(
                    "[main_db.get_setting_with_default] setting:{:?}, error:{}",
                    setting, error
                );
                None
            }
        }
        .unwrap_or(default)
    }

    pub fn set_setting<T: ToString>(&mut self, setting: Setting, value: T) -> Result<()> {
        let sql = "INSERT OR REPLACE INTO setting (key, value) VALUES (?1, ?2);";
        self.conn
            .execute(sql, (setting.to_db_key(), value.to_string()))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Setting {
    RawDataMode,
    KcalPerMeter,
    MaxAccuracyM,
}

impl Setting {
    fn to_db_key(self) -> &'static str {
        match self {
            Self::RawDataMode => "RAW_DATA_MODE",
            Self::KcalPerMeter => "KCAL_PER_METER",
            Self::MaxAccuracyM => "MAX_ACCURACY_M",
        }
    }
}
