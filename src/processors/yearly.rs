use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime};

/// Recorded hours per year. An activity that crosses New Year is split:
/// the start year gets the time up to 23:59 on 31 December, the end year
/// the time from 00:00 on 1 January.
pub fn recorded_hours_per_year(activities: &[(NaiveDateTime, NaiveDateTime)]) -> BTreeMap<i32, f64> {
    let mut hours: BTreeMap<i32, f64> = BTreeMap::new();
    let to_hours = |delta: chrono::Duration| delta.num_seconds() as f64 / 3600.0;

    for (start, end) in activities {
        let (start_year, end_year) = (start.year(), end.year());

        if start_year == end_year {
            *hours.entry(start_year).or_insert(0.0) += to_hours(*end - *start);
            continue;
        }

        let end_of_start_year = NaiveDate::from_ymd_opt(start_year, 12, 31)
            .and_then(|d| d.and_hms_opt(23, 59, 0));
        let beginning_of_end_year =
            NaiveDate::from_ymd_opt(end_year, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0));

        if let (Some(year_end), Some(year_start)) = (end_of_start_year, beginning_of_end_year) {
            *hours.entry(start_year).or_insert(0.0) += to_hours(year_end - *start);
            *hours.entry(end_year).or_insert(0.0) += to_hours(*end - year_start);
        }
    }

    hours
}

/// The year with the most hours, ties resolved to the earliest year.
pub fn busiest_year(hours: &BTreeMap<i32, f64>) -> Option<(i32, f64)> {
    hours
        .iter()
        .fold(None, |best: Option<(i32, f64)>, (year, h)| match best {
            Some((_, best_hours)) if best_hours >= *h => best,
            _ => Some((*year, *h)),
        })
}
