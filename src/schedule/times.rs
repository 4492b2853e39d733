//! Daily trigger time arithmetic

use chrono::{DateTime, Days, NaiveDate, TimeZone};
use tracing::warn;

use crate::clock::{InvalidTimeFormat, TimeOfDay};

/// Parse every entry, failing on the first invalid one.
///
/// The result is sorted and free of duplicates.
pub fn normalize<S: AsRef<str>>(raw: &[S]) -> Result<Vec<TimeOfDay>, InvalidTimeFormat> {
    let mut times = raw
        .iter()
        .map(|s| s.as_ref().parse::<TimeOfDay>())
        .collect::<Result<Vec<_>, _>>()?;
    times.sort();
    times.dedup();
    Ok(times)
}

/// Parse what can be parsed, logging and skipping the rest
pub fn parse_lenient<S: AsRef<str>>(raw: &[S]) -> Vec<TimeOfDay> {
    let mut times: Vec<TimeOfDay> = raw
        .iter()
        .filter_map(|s| match s.as_ref().parse() {
            Ok(time) => Some(time),
            Err(e) => {
                warn!(error = %e, "Skipping invalid schedule entry");
                None
            }
        })
        .collect();
    times.sort();
    times.dedup();
    times
}

/// Earliest instant strictly after `now` that falls on one of `times`.
///
/// Each time is tried today and, if already past, tomorrow. Returns `None`
/// for an empty list.
pub fn calculate_next_sync_time<Tz: TimeZone>(
    times: &[TimeOfDay],
    now: &DateTime<Tz>,
) -> Option<DateTime<Tz>> {
    let today = now.date_naive();
    let tomorrow = today.checked_add_days(Days::new(1))?;

    times
        .iter()
        .filter_map(|time| {
            [today, tomorrow]
                .into_iter()
                .filter_map(|day| at(&now.timezone(), day, *time))
                .find(|candidate| candidate > now)
        })
        .min()
}

/// `time` on `day` in `tz`. Inside a DST gap the wall-clock time does not
/// exist and the instant one hour later is used instead.
fn at<Tz: TimeZone>(tz: &Tz, day: NaiveDate, time: TimeOfDay) -> Option<DateTime<Tz>> {
    let local = day.and_time(time.to_naive());
    tz.from_local_datetime(&local).earliest().or_else(|| {
        let shifted = local + chrono::Duration::hours(1);
        tz.from_local_datetime(&shifted).earliest()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn times(raw: &[&str]) -> Vec<TimeOfDay> {
        normalize(raw).unwrap()
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_next_time_later_today() {
        let next = calculate_next_sync_time(&times(&["15:00", "03:00"]), &utc("2024-05-10T10:00:00Z"));
        assert_eq!(next, Some(utc("2024-05-10T15:00:00Z")));
    }

    #[test]
    fn test_next_time_rolls_over_to_tomorrow() {
        let next = calculate_next_sync_time(&times(&["09:00", "08:00"]), &utc("2024-05-10T10:00:00Z"));
        assert_eq!(next, Some(utc("2024-05-11T08:00:00Z")));
    }

    #[test]
    fn test_next_time_is_strictly_after_now() {
        let next = calculate_next_sync_time(&times(&["10:00"]), &utc("2024-05-10T10:00:00Z"));
        assert_eq!(next, Some(utc("2024-05-11T10:00:00Z")));
    }

    #[test]
    fn test_next_time_across_month_end() {
        let next = calculate_next_sync_time(&times(&["00:30"]), &utc("2024-02-29T23:59:00Z"));
        assert_eq!(next, Some(utc("2024-03-01T00:30:00Z")));
    }

    #[test]
    fn test_next_time_uses_local_wall_clock() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2024, 5, 10, 23, 0, 0).unwrap();

        let next = calculate_next_sync_time(&times(&["06:00"]), &now).unwrap();
        assert_eq!(next, tz.with_ymd_and_hms(2024, 5, 11, 6, 0, 0).unwrap());
    }

    #[test]
    fn test_empty_schedule_has_no_next_time() {
        assert_eq!(calculate_next_sync_time(&[], &utc("2024-05-10T10:00:00Z")), None);
    }

    #[test]
    fn test_normalize_sorts_and_dedups() {
        let normalized = normalize(&["9:00", "03:15", "09:00"]).unwrap();
        let rendered: Vec<String> = normalized.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["03:15", "09:00"]);
    }

    #[test]
    fn test_normalize_rejects_whole_list_on_one_bad_entry() {
        let err = normalize(&["09:00", "25:00"]).unwrap_err();
        assert_eq!(err, InvalidTimeFormat("25:00".to_string()));
    }

    #[test]
    fn test_parse_lenient_skips_bad_entries() {
        let parsed = parse_lenient(&["12:00", "noon", "12:60", "06:30"]);
        assert_eq!(parsed, times(&["06:30", "12:00"]));
    }
}
