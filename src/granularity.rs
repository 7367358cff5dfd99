//! The four fixed chart windows and how instants map onto their buckets.
//!
//! The hourly and monthly windows count back from `now`: bucket `n - 1 - k`
//! is the unit that ended `k` units before `now`, so each bucket starts at
//! its label. The daily and yearly-over-years windows count forward from the
//! window start: bucket `i` is the `i`-th whole unit after it, and its label
//! is the day or year that unit begins in.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, Months, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ParseGranularityError;

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Granularity {
    #[serde(rename = "1 Day")]
    Day,
    #[serde(rename = "1 Week")]
    Week,
    #[serde(rename = "1 Year")]
    Year,
    #[serde(rename = "Multi-Year")]
    MultiYear,
}

impl Granularity {
    pub const ALL: [Granularity; 4] = [
        Granularity::Day,
        Granularity::Week,
        Granularity::Year,
        Granularity::MultiYear,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Granularity::Day => "1 Day",
            Granularity::Week => "1 Week",
            Granularity::Year => "1 Year",
            Granularity::MultiYear => "Multi-Year",
        }
    }

    pub fn bucket_count(&self) -> usize {
        match self {
            Granularity::Day => 24,
            Granularity::Week => 7,
            Granularity::Year => 12,
            Granularity::MultiYear => 7,
        }
    }

    /// Earliest instant still inside the window.
    ///
    /// Week and Multi-Year step back one unit less than their bucket count
    /// so the current day/year is the last of the covered periods.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Granularity::Day => now - Duration::hours(24),
            Granularity::Week => now - Duration::days(6),
            Granularity::Year => months_before(now, 12),
            Granularity::MultiYear => months_before(now, 6 * 12),
        }
    }

    /// Whole bucket widths elapsed between `at` and `now`; zero when `at` is
    /// at or after `now`.
    pub fn units_ago(&self, at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
        if at >= now {
            return 0;
        }
        match self {
            Granularity::Day => (now - at).num_hours(),
            Granularity::Week => (now - at).num_days(),
            Granularity::Year => whole_months_between(at, now),
            Granularity::MultiYear => whole_months_between(at, now) / 12,
        }
    }

    /// Whole bucket widths elapsed between the window start and `at`.
    pub fn units_since_start(&self, at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
        let start = self.window_start(now);
        if at <= start {
            return 0;
        }
        match self {
            Granularity::Day => (at - start).num_hours(),
            Granularity::Week => (at - start).num_days(),
            Granularity::Year => whole_months_between(start, at),
            Granularity::MultiYear => whole_months_between(start, at) / 12,
        }
    }

    /// Zero-based bucket (oldest first) for an event at `at`, or `None` when
    /// the event predates the window.
    pub fn bucket_index(&self, at: DateTime<Utc>, now: DateTime<Utc>) -> Option<usize> {
        if at < self.window_start(now) {
            return None;
        }
        let last = self.bucket_count() as i64 - 1;
        let index = match self {
            Granularity::Day | Granularity::Year => last - self.units_ago(at, now),
            Granularity::Week | Granularity::MultiYear => self.units_since_start(at, now),
        };
        Some(index.clamp(0, last) as usize)
    }

    pub fn labels(&self, now: DateTime<Utc>) -> Vec<String> {
        let start = self.window_start(now);
        let count = self.bucket_count() as i64;
        match self {
            Granularity::Day => (0..count)
                .map(|i| format!("{}:00", (start + Duration::hours(i)).hour()))
                .collect(),
            Granularity::Week => (0..count)
                .map(|i| (start + Duration::days(i)).format("%b %-d").to_string())
                .collect(),
            Granularity::Year => (0..count)
                .map(|i| months_before(now, (count - i) as u32).format("%b").to_string())
                .collect(),
            Granularity::MultiYear => (0..count)
                .map(|i| (start.year() as i64 + i).to_string())
                .collect(),
        }
    }

    /// Labels used when there is no rating history at all. Only the yearly
    /// window differs: it shows the plain calendar months.
    pub fn empty_labels(&self, now: DateTime<Utc>) -> Vec<String> {
        match self {
            Granularity::Year => MONTH_ABBREVIATIONS.iter().map(|m| m.to_string()).collect(),
            _ => self.labels(now),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Granularity {
    type Err = ParseGranularityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1 day" | "1d" | "day" => Ok(Granularity::Day),
            "1 week" | "1w" | "week" => Ok(Granularity::Week),
            "1 year" | "1y" | "year" => Ok(Granularity::Year),
            "multi-year" | "multi" | "7y" => Ok(Granularity::MultiYear),
            _ => Err(ParseGranularityError(s.to_string())),
        }
    }
}

fn months_before(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Calendar months between two instants, counting only months that have
/// fully elapsed (Jan 20 -> Mar 14 is one month).
fn whole_months_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    if earlier >= later {
        return 0;
    }
    let month_number = |at: DateTime<Utc>| at.year() as i64 * 12 + at.month0() as i64;
    let mut months = (month_number(later) - month_number(earlier)).max(0);

    while months > 0 {
        match earlier.checked_add_months(Months::new(months as u32)) {
            Some(shifted) if shifted <= later => break,
            _ => months -= 1,
        }
    }
    months
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 15, 30, 0).unwrap()
    }

    #[test]
    fn window_starts_follow_fixed_offsets() {
        let now = now();
        assert_eq!(
            Granularity::Day.window_start(now),
            Utc.with_ymd_and_hms(2026, 3, 13, 15, 30, 0).unwrap()
        );
        assert_eq!(
            Granularity::Week.window_start(now),
            Utc.with_ymd_and_hms(2026, 3, 8, 15, 30, 0).unwrap()
        );
        assert_eq!(
            Granularity::Year.window_start(now),
            Utc.with_ymd_and_hms(2025, 3, 14, 15, 30, 0).unwrap()
        );
        assert_eq!(
            Granularity::MultiYear.window_start(now),
            Utc.with_ymd_and_hms(2020, 3, 14, 15, 30, 0).unwrap()
        );
    }

    #[test]
    fn labels_run_oldest_to_newest() {
        let now = now();

        let day = Granularity::Day.labels(now);
        assert_eq!(day.len(), 24);
        assert_eq!(day[0], "15:00");
        assert_eq!(day[8], "23:00");
        assert_eq!(day[9], "0:00");
        assert_eq!(day[23], "14:00");

        let week = Granularity::Week.labels(now);
        assert_eq!(week, vec!["Mar 8", "Mar 9", "Mar 10", "Mar 11", "Mar 12", "Mar 13", "Mar 14"]);

        let year = Granularity::Year.labels(now);
        assert_eq!(year.len(), 12);
        assert_eq!(year[0], "Mar");
        assert_eq!(year[11], "Feb");

        let multi = Granularity::MultiYear.labels(now);
        assert_eq!(multi, vec!["2020", "2021", "2022", "2023", "2024", "2025", "2026"]);
    }

    #[test]
    fn empty_labels_use_calendar_months_for_the_year_window() {
        let now = now();
        let year = Granularity::Year.empty_labels(now);
        assert_eq!(year[0], "Jan");
        assert_eq!(year[11], "Dec");
        assert_eq!(Granularity::Week.empty_labels(now), Granularity::Week.labels(now));
    }

    #[test]
    fn bucket_index_per_window() {
        let now = now();
        assert_eq!(Granularity::Day.bucket_index(now - Duration::hours(2), now), Some(21));
        assert_eq!(Granularity::Day.bucket_index(now - Duration::minutes(10), now), Some(23));
        assert_eq!(Granularity::Day.bucket_index(now - Duration::hours(24), now), Some(0));
        assert_eq!(Granularity::Day.bucket_index(now - Duration::hours(25), now), None);

        assert_eq!(Granularity::Week.bucket_index(now - Duration::days(2), now), Some(4));
        assert_eq!(Granularity::Week.bucket_index(now - Duration::days(6), now), Some(0));
        assert_eq!(Granularity::Week.bucket_index(now - Duration::days(7), now), None);

        let january = Utc.with_ymd_and_hms(2026, 1, 20, 9, 0, 0).unwrap();
        assert_eq!(Granularity::Year.bucket_index(january, now), Some(10));

        let mid_2023 = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(Granularity::MultiYear.bucket_index(mid_2023, now), Some(3));
    }

    #[test]
    fn week_and_multi_year_buckets_match_their_labels() {
        let now = now();
        let week = Granularity::Week.labels(now);
        for (at, label) in [
            (Utc.with_ymd_and_hms(2026, 3, 8, 16, 0, 0).unwrap(), "Mar 8"),
            (Utc.with_ymd_and_hms(2026, 3, 9, 3, 30, 0).unwrap(), "Mar 8"),
            (Utc.with_ymd_and_hms(2026, 3, 12, 20, 0, 0).unwrap(), "Mar 12"),
            (Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap(), "Mar 13"),
            (now, "Mar 14"),
        ] {
            let index = Granularity::Week.bucket_index(at, now).unwrap();
            assert_eq!(week[index], label, "event at {at}");
        }

        let years = Granularity::MultiYear.labels(now);
        for (at, label) in [
            (Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap(), "2020"),
            (Utc.with_ymd_and_hms(2021, 8, 1, 12, 0, 0).unwrap(), "2021"),
            (Utc.with_ymd_and_hms(2023, 12, 31, 23, 0, 0).unwrap(), "2023"),
            (Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap(), "2025"),
            (now, "2026"),
        ] {
            let index = Granularity::MultiYear.bucket_index(at, now).unwrap();
            assert_eq!(years[index], label, "event at {at}");
        }
    }

    #[test]
    fn future_events_land_in_last_bucket() {
        let now = now();
        for granularity in Granularity::ALL {
            assert_eq!(
                granularity.bucket_index(now + Duration::hours(3), now),
                Some(granularity.bucket_count() - 1)
            );
            assert_eq!(
                granularity.bucket_index(now, now),
                Some(granularity.bucket_count() - 1)
            );
        }
    }

    #[test]
    fn whole_months_ignore_partial_months() {
        let later = now();
        let earlier = Utc.with_ymd_and_hms(2026, 2, 14, 15, 30, 0).unwrap();
        assert_eq!(whole_months_between(earlier, later), 1);
        let earlier = Utc.with_ymd_and_hms(2026, 2, 14, 15, 31, 0).unwrap();
        assert_eq!(whole_months_between(earlier, later), 0);
        assert_eq!(whole_months_between(later, earlier), 0);
    }

    #[test]
    fn parses_display_names_and_short_forms() {
        for granularity in Granularity::ALL {
            assert_eq!(granularity.to_string().parse::<Granularity>(), Ok(granularity));
        }
        assert_eq!("1W".parse::<Granularity>(), Ok(Granularity::Week));
        assert_eq!("multi".parse::<Granularity>(), Ok(Granularity::MultiYear));
        assert!("fortnight".parse::<Granularity>().is_err());
    }

    #[test]
    fn serializes_as_display_name() {
        let json = serde_json::to_string(&Granularity::MultiYear).unwrap();
        assert_eq!(json, "\"Multi-Year\"");
    }
}
