//! Daily quota arithmetic. The ledger count comes from the repository; this
//! module owns the limit comparison and the definition of "today".

use chrono::{DateTime, Days, NaiveTime, TimeZone, Utc};

/// A limit of zero means no limit is enforced.
pub fn limit_reached(count_today: i64, limit: u32) -> bool {
    limit > 0 && count_today >= i64::from(limit)
}

/// Half-open `[midnight, next midnight)` window for the calendar day of
/// `now` in its own timezone, expressed in UTC for storage comparisons.
pub fn day_bounds<Tz: TimeZone>(now: DateTime<Tz>) -> (DateTime<Utc>, DateTime<Utc>) {
    let midnight = now.date_naive().and_time(NaiveTime::MIN);
    let start = now
        .timezone()
        .from_local_datetime(&midnight)
        .earliest()
        .unwrap_or_else(|| now.timezone().from_utc_datetime(&midnight));
    let end = start
        .clone()
        .checked_add_days(Days::new(1))
        .unwrap_or_else(|| start.clone());

    (start.with_timezone(&Utc), end.with_timezone(&Utc))
}
