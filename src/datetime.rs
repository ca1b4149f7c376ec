//! Conversions between stored UTC instants and the user's display timezone.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;
use eyre::{Result, eyre};

const DISPLAY_DATE: &str = "%d/%m/%Y";
const DISPLAY_DATE_TIME: &str = "%d/%m/%Y, %I:%M:%S %P";

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a stored timestamp into a UTC instant.
///
/// Accepts RFC 3339, naive date-times (read as UTC) and bare `YYYY-MM-DD`
/// dates (midnight UTC). Anything else is `None`.
pub fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// True iff `value` is present and parses to an instant.
pub fn is_valid_date<S: AsRef<str>>(value: Option<S>) -> bool {
    value.is_some_and(|v| parse_instant(v.as_ref()).is_some())
}

/// Render an instant in `tz` using the console's fixed `en-AU` layout.
pub fn format_instant(tz: Tz, instant: DateTime<Utc>, display_time: bool) -> String {
    let local = instant.with_timezone(&tz);
    if display_time {
        local.format(DISPLAY_DATE_TIME).to_string()
    } else {
        local.format(DISPLAY_DATE).to_string()
    }
}

/// Render a stored timestamp in `tz`; missing or invalid input renders as `""`.
pub fn format_dt(tz: Tz, value: Option<&str>, display_time: bool) -> String {
    match value.and_then(parse_instant) {
        Some(instant) => format_instant(tz, instant, display_time),
        None => String::new(),
    }
}

/// Pin wall-clock components to `tz`.
///
/// The components are taken as the user typed them, not converted from the
/// machine's own zone. Ambiguous local times take the earlier instant; times
/// skipped by a DST transition have no instant.
pub fn pin_to_timezone(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// [`pin_to_timezone`] rendered as an ISO-8601 UTC string with millisecond precision.
pub fn extract_iso_date(naive: NaiveDateTime, tz: Tz) -> Option<String> {
    pin_to_timezone(naive, tz).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Parse a user-entered date or date-time as wall-clock components.
pub fn parse_wall_clock(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(naive);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parse a filter bound: explicit offsets are honoured, anything naive is
/// read as wall-clock time in `tz`.
pub fn parse_instant_in(value: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    parse_wall_clock(value).and_then(|naive| pin_to_timezone(naive, tz))
}

/// Resolve an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| eyre!("unknown timezone `{name}`"))
}

/// The zone named by `TZ` when it is a valid IANA name, otherwise UTC.
pub fn local_timezone() -> Tz {
    std::env::var("TZ")
        .ok()
        .and_then(|name| name.parse::<Tz>().ok())
        .unwrap_or(Tz::UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn validity() {
        assert!(!is_valid_date(None::<&str>));
        assert!(!is_valid_date(Some("")));
        assert!(!is_valid_date(Some("not-a-date")));
        assert!(is_valid_date(Some("2024-01-01")));
        assert!(is_valid_date(Some("2024-01-01T10:00:00.250")));
        assert!(is_valid_date(Some("2024-01-01T10:00:00+10:30")));
        assert!(is_valid_date(Some(Utc::now().to_rfc3339())));
    }

    #[test]
    fn bare_date_is_midnight_utc() {
        let dt = parse_instant("2024-03-05").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 5));
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (0, 0, 0));
    }

    #[test]
    fn formats_in_requested_zone() {
        let v = Some("2024-06-01T15:30:45Z");
        assert_eq!(format_dt(Tz::UTC, v, true), "01/06/2024, 03:30:45 pm");
        // ACST, +09:30 in June
        let adl = chrono_tz::Australia::Adelaide;
        assert_eq!(format_dt(adl, v, true), "02/06/2024, 01:00:45 am");
        assert_eq!(format_dt(adl, v, false), "02/06/2024");
    }

    #[test]
    fn format_swallows_bad_input() {
        assert_eq!(format_dt(Tz::UTC, None, true), "");
        assert_eq!(format_dt(Tz::UTC, Some(""), true), "");
        assert_eq!(format_dt(Tz::UTC, Some("yesterday"), false), "");
    }

    #[test]
    fn wall_clock_is_pinned_not_converted() {
        let naive = parse_wall_clock("2024-06-01").unwrap();
        let iso = extract_iso_date(naive, chrono_tz::Australia::Adelaide).unwrap();
        assert_eq!(iso, "2024-05-31T14:30:00.000Z");
        let iso = extract_iso_date(naive, Tz::UTC).unwrap();
        assert_eq!(iso, "2024-06-01T00:00:00.000Z");
    }

    #[test]
    fn dst_gap_has_no_instant() {
        let naive = parse_wall_clock("2024-03-10 02:30:00").unwrap();
        assert!(pin_to_timezone(naive, chrono_tz::America::New_York).is_none());
    }

    #[test]
    fn filter_bounds_honour_offsets() {
        let adl = chrono_tz::Australia::Adelaide;
        let naive = parse_instant_in("2024-06-01", adl).unwrap();
        assert_eq!(naive.to_rfc3339(), "2024-05-31T14:30:00+00:00");
        let explicit = parse_instant_in("2024-06-01T00:00:00Z", adl).unwrap();
        assert_eq!(explicit.to_rfc3339(), "2024-06-01T00:00:00+00:00");
        assert!(parse_instant_in("soon", adl).is_none());
    }

    #[test]
    fn timezone_names() {
        assert_eq!(
            parse_timezone("Australia/Adelaide").unwrap(),
            chrono_tz::Australia::Adelaide
        );
        let err = parse_timezone("Mars/Olympus").unwrap_err();
        assert!(err.to_string().contains("Mars/Olympus"));
    }
}
