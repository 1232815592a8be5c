use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, TimeZone};

// `[start, end)` of a local calendar day, in epoch millis. Days that start in
// a DST gap use the earliest valid local time.
pub fn local_day_range_ms(date: NaiveDate) -> Result<(i64, i64)> {
    let start_of = |date: NaiveDate| -> Result<i64> {
        let naive = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow!("invalid date: {}", date))?;
        let local = Local
            .from_local_datetime(&naive)
            .earliest()
            .ok_or_else(|| anyhow!("no local midnight for {}", date))?;
        Ok(local.timestamp_millis())
    };
    let next_day = date
        .succ_opt()
        .ok_or_else(|| anyhow!("date out of range: {}", date))?;
    Ok((start_of(date)?, start_of(next_day)?))
}

pub fn local_date_of_ms(timestamp_ms: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(timestamp_ms).map(|x| x.with_timezone(&Local).date_naive())
}
