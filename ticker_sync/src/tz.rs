//! Timestamp storage and display helpers.
//!
//! What this module provides:
//! - [`parse_ts_to_utc`]: Parse RFC-3339 timestamps with an explicit offset and convert to UTC.
//! - [`to_rfc3339_micros`]: The on-disk form of every timestamp column.
//! - [`format_market_time`]: Render an instant in exchange time (America/New_York).
//! - [`friendly_age`]: "Just now" / "N minutes ago" style labels.
//!
//! Notes:
//! - All database writes are RFC-3339 UTC strings with microsecond precision, so two
//!   refreshes a few milliseconds apart still store strictly increasing values.
//! - Local time only appears at the display edge.
//!
//! Examples
//! - RFC-3339 with offset to UTC:
//!   "2024-03-10T09:30:00-05:00" -> "2024-03-10T14:30:00Z"
//! - Market time for 2024-01-15T14:30:00Z: "2024-01-15 09:30 AM EST"

use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::{America::New_York, Tz};

/// Exchange time zone used for display.
pub const MARKET_TZ: Tz = New_York;

/// RFC-3339 with offset -> UTC.
///
/// Example:
/// - "2024-03-10T09:30:00-05:00" -> "2024-03-10T14:30:00Z"
pub fn parse_ts_to_utc(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let dt = DateTime::parse_from_rfc3339(s).with_context(|| format!("bad rfc3339: {s}"))?;
    Ok(dt.with_timezone(&Utc))
}

/// Format a UTC datetime as an RFC-3339 string with microsecond precision.
pub fn to_rfc3339_micros(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Format an instant in New York time, e.g. `2024-07-01 09:30 AM EDT`.
pub fn format_market_time(dt: DateTime<Utc>) -> String {
    dt.with_timezone(&MARKET_TZ)
        .format("%Y-%m-%d %I:%M %p %Z")
        .to_string()
}

/// Human label for how long ago `then` was, relative to `now`.
///
/// Anything under a minute (including clock skew into the future) is "Just now".
pub fn friendly_age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - then).num_minutes();
    match minutes {
        m if m < 1 => "Just now".to_string(),
        1 => "1 minute ago".to_string(),
        m => format!("{m} minutes ago"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn parse_rfc3339_offset_to_utc() {
        // Offset timestamp: 2024-03-10 09:30 at -05:00 -> 14:30Z
        let ts = "2024-03-10T09:30:00-05:00";
        let got = parse_ts_to_utc(ts).expect("parse");
        let want = Utc.with_ymd_and_hms(2024, 3, 10, 14, 30, 0).unwrap();
        assert_eq!(got, want);
    }

    #[test]
    fn micros_round_trip_and_sort_lexically() {
        let a = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let b = a + Duration::microseconds(1);
        let (sa, sb) = (to_rfc3339_micros(a), to_rfc3339_micros(b));

        assert_eq!(sa, "2024-05-01T12:00:00.000000Z");
        assert!(sa < sb);
        assert_eq!(parse_ts_to_utc(&sb).unwrap(), b);
    }

    #[test]
    fn market_time_tracks_dst() {
        let winter = Utc.with_ymd_and_hms(2024, 1, 15, 14, 30, 0).unwrap();
        assert_eq!(format_market_time(winter), "2024-01-15 09:30 AM EST");

        let summer = Utc.with_ymd_and_hms(2024, 7, 1, 20, 5, 0).unwrap();
        assert_eq!(format_market_time(summer), "2024-07-01 04:05 PM EDT");
    }

    #[test]
    fn friendly_age_labels() {
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 20, 5, 0).unwrap();
        assert_eq!(friendly_age(now - Duration::seconds(59), now), "Just now");
        assert_eq!(friendly_age(now + Duration::seconds(30), now), "Just now");
        assert_eq!(friendly_age(now - Duration::seconds(61), now), "1 minute ago");
        assert_eq!(friendly_age(now - Duration::minutes(42), now), "42 minutes ago");
    }
}
