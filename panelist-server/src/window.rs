//! Time-window classification for a scheduled interview.
//!
//! All timestamps are stored and compared in UTC; any display-timezone
//! rendering happens at the presentation boundary. `classify` is pure
//! and total over well-formed timestamps; malformed input is rejected
//! by [`parse_utc_timestamp`] before classification is ever attempted.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Where "now" falls relative to the interview's live window [start, end].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// Before the window opens. Carries whole seconds until start,
    /// floored at zero.
    Waiting { seconds_until_start: i64 },
    /// Inside the window, inclusive on both ends.
    Live,
    /// After the window closed.
    Expired,
}

/// Classify `now` against the inclusive live window `[start, end]`.
pub fn classify(now: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> Window {
    if now < start {
        Window::Waiting {
            seconds_until_start: (start - now).num_seconds().max(0),
        }
    } else if now <= end {
        Window::Live
    } else {
        Window::Expired
    }
}

/// Parse an ISO-8601 timestamp into UTC.
///
/// Accepts an explicit offset (including a trailing `Z`); a naive
/// timestamp with no offset is treated as already UTC.
pub fn parse_utc_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(with_offset.with_timezone(&Utc));
    }

    trimmed
        .parse::<NaiveDateTime>()
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn utc(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn scheduled_hour_scenario() {
        let start = utc(1_700_000_000);
        let end = start + Duration::seconds(3600);

        assert_eq!(
            classify(start - Duration::seconds(10), start, end),
            Window::Waiting {
                seconds_until_start: 10
            }
        );
        assert_eq!(classify(start + Duration::seconds(1), start, end), Window::Live);
        assert_eq!(
            classify(start + Duration::seconds(3601), start, end),
            Window::Expired
        );
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let start = utc(100);
        let end = utc(200);
        assert_eq!(classify(start, start, end), Window::Live);
        assert_eq!(classify(end, start, end), Window::Live);
        assert_eq!(
            classify(start - Duration::seconds(1), start, end),
            Window::Waiting {
                seconds_until_start: 1
            }
        );
        assert_eq!(classify(end + Duration::seconds(1), start, end), Window::Expired);
    }

    #[test]
    fn parses_offset_and_zulu_and_naive() {
        let zulu = parse_utc_timestamp("2026-03-01T10:00:00Z").unwrap();
        let offset = parse_utc_timestamp("2026-03-01T15:30:00+05:30").unwrap();
        let naive = parse_utc_timestamp("2026-03-01T10:00:00").unwrap();

        assert_eq!(zulu, offset);
        assert_eq!(zulu, naive);
    }

    #[test]
    fn rejects_malformed_timestamps() {
        assert!(parse_utc_timestamp("not a time").is_none());
        assert!(parse_utc_timestamp("2026-13-40T99:00:00Z").is_none());
        assert!(parse_utc_timestamp("").is_none());
    }

    proptest! {
        /// classify partitions the timeline into exactly three contiguous
        /// intervals: waiting before start, live on [start, end], expired after.
        #[test]
        fn partitions_the_timeline(now in -1_000_000i64..1_000_000, len in 0i64..100_000) {
            let start = utc(0);
            let end = utc(len);
            let at = utc(now);

            let expected = if now < 0 {
                Window::Waiting { seconds_until_start: -now }
            } else if now <= len {
                Window::Live
            } else {
                Window::Expired
            };
            prop_assert_eq!(classify(at, start, end), expected);
        }

        #[test]
        fn waiting_seconds_never_negative(now in -1_000_000i64..0) {
            let start = utc(0);
            let end = utc(60);
            match classify(utc(now), start, end) {
                Window::Waiting { seconds_until_start } => prop_assert!(seconds_until_start >= 0),
                other => prop_assert!(false, "expected waiting, got {:?}", other),
            }
        }
    }
}
