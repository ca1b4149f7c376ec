use crate::consts::{DEFAULT_NAME_RE, WILDCARD};
use crate::types::DirFileItem;
use chrono::{DateTime, TimeZone, Utc};
use eyre::{Result, WrapErr};
use regex::Regex;
use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;

/// Fields captured from a file name by the `date`, `time`, `site`, `sensor`
/// and `trial` named groups.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawName {
    /// `YYYYMMDD`
    pub date: String,
    /// `HHMMSS`
    pub time: String,
    pub site: String,
    pub sensor: String,
    pub trial: String,
}

/// A matched file name together with the instant its `date`/`time` encode.
///
/// `datetime` is `None` when the captured digits do not form a real instant
/// (non-digits, short captures, month 13, ...). The match itself still counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub raw: RawName,
    pub datetime: Option<DateTime<Utc>>,
}

/// Per-extension file-name patterns for a project.
///
/// Keys are extensions without the leading dot, or `*` for the fallback.
#[derive(Debug, Clone, Default)]
pub struct RegexMap {
    patterns: HashMap<String, Regex>,
}

impl RegexMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile every `(extension, pattern)` pair. The first invalid pattern fails
    /// the whole map, naming its extension.
    pub fn from_patterns<I, K, V>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut map = Self::new();
        for (ext, pattern) in patterns {
            map.insert(ext.as_ref(), pattern.as_ref())?;
        }
        Ok(map)
    }

    /// A map holding only [`DEFAULT_NAME_RE`] as the wildcard.
    pub fn fallback() -> Self {
        let mut map = Self::new();
        map.patterns
            .insert(WILDCARD.to_string(), DEFAULT_NAME_RE.clone());
        map
    }

    pub fn insert(&mut self, ext: &str, pattern: &str) -> Result<()> {
        let key = normalize_key(ext);
        let re = Regex::new(pattern)
            .wrap_err_with(|| format!("invalid file name pattern for `{key}`"))?;
        tracing::debug!(ext = %key, pattern, "registered name pattern");
        self.patterns.insert(key, re);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Pattern for `file_name`: exact extension, lowercased extension, then `*`.
    pub fn pattern_for(&self, file_name: &str) -> Option<&Regex> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str());
        ext.and_then(|e| {
            self.patterns
                .get(e)
                .or_else(|| self.patterns.get(&e.to_ascii_lowercase()))
        })
        .or_else(|| self.patterns.get(WILDCARD))
    }
}

fn normalize_key(ext: &str) -> String {
    let key = ext.trim();
    if key == WILDCARD {
        return key.to_string();
    }
    key.trim_start_matches('.').to_string()
}

/// Match `file_name` against its pattern in `map`.
///
/// `None` when no pattern applies, the pattern does not match, or the match
/// lacks a `date` or `time` group. Missing `site`/`sensor`/`trial` groups read
/// as empty strings.
pub fn parse_file_name(file_name: &str, map: &RegexMap) -> Option<ParsedName> {
    let re = map.pattern_for(file_name)?;
    let caps = re.captures(file_name)?;
    let date = caps.name("date")?.as_str();
    let time = caps.name("time")?.as_str();
    let group = |name: &str| {
        caps.name(name)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    };
    let raw = RawName {
        date: date.to_string(),
        time: time.to_string(),
        site: group("site"),
        sensor: group("sensor"),
        trial: group("trial"),
    };
    let datetime = instant_from_parts(&raw.date, &raw.time);
    tracing::trace!(file = file_name, ?datetime, site = %raw.site, sensor = %raw.sensor);
    Some(ParsedName { raw, datetime })
}

fn digits(s: &str, range: Range<usize>) -> Option<u32> {
    s.get(range)?.parse().ok()
}

/// Build a UTC instant from `YYYYMMDD` and `HHMMSS`; no offset is applied.
fn instant_from_parts(date: &str, time: &str) -> Option<DateTime<Utc>> {
    let year = i32::try_from(digits(date, 0..4)?).ok()?;
    let month = digits(date, 4..6)?;
    let day = digits(date, 6..8)?;
    let hour = digits(time, 0..2)?;
    let minute = digits(time, 2..4)?;
    let second = digits(time, 4..6)?;
    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
}

/// Outcome of running a listing entry through the name parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameParse {
    Parsed(ParsedName),
    Unparsed,
}

/// A listing entry plus whatever its name told us. Used as a table row.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFile {
    pub item: DirFileItem,
    pub name: NameParse,
}

impl ParsedFile {
    pub fn parsed(&self) -> Option<&ParsedName> {
        match &self.name {
            NameParse::Parsed(p) => Some(p),
            NameParse::Unparsed => None,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self.name, NameParse::Parsed(_))
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        self.parsed().and_then(|p| p.datetime)
    }

    pub fn site(&self) -> Option<&str> {
        self.parsed().map(|p| p.raw.site.as_str())
    }

    pub fn sensor(&self) -> Option<&str> {
        self.parsed().map(|p| p.raw.sensor.as_str())
    }

    pub fn trial(&self) -> Option<&str> {
        self.parsed().map(|p| p.raw.trial.as_str())
    }
}

/// Attach the parse outcome of `item.name` to the entry.
pub fn parse_file_data(item: DirFileItem, map: &RegexMap) -> ParsedFile {
    let name = match parse_file_name(&item.name, map) {
        Some(parsed) => NameParse::Parsed(parsed),
        None => NameParse::Unparsed,
    };
    ParsedFile { item, name }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    const SITE_SENSOR: &str =
        r"^(?P<date>\d{8})_(?P<time>\d{6})_(?P<site>[^_]+)_(?P<sensor>[^_.]+)";

    fn item(name: &str) -> DirFileItem {
        DirFileItem {
            id: format!("/data/{name}"),
            name: name.to_string(),
            is_dir: false,
            is_hidden: false,
            size: 10.0,
            mod_date: None,
        }
    }

    #[test]
    fn parses_site_and_sensor() {
        let map = RegexMap::from_patterns([("bin", SITE_SENSOR)]).unwrap();
        let p = parse_file_name("20240601_153045_siteA_sensorB.bin", &map).unwrap();
        assert_eq!(p.raw.site, "siteA");
        assert_eq!(p.raw.sensor, "sensorB");
        assert_eq!(p.raw.trial, "");
        assert_eq!(
            p.datetime.unwrap().to_rfc3339(),
            "2024-06-01T15:30:45+00:00"
        );
    }

    #[test]
    fn instant_fields_equal_substrings() {
        for (date, time) in [
            ("19991231", "235959"),
            ("20000101", "000000"),
            ("20240229", "120102"),
        ] {
            let dt = instant_from_parts(date, time).unwrap();
            assert_eq!(format!("{:04}{:02}{:02}", dt.year(), dt.month(), dt.day()), date);
            assert_eq!(format!("{:02}{:02}{:02}", dt.hour(), dt.minute(), dt.second()), time);
        }
    }

    #[test]
    fn extension_wins_over_wildcard() {
        let map = RegexMap::from_patterns([
            (".csv", r"^(?P<site>\w+)-(?P<date>\d{8})-(?P<time>\d{6})"),
            ("*", SITE_SENSOR),
        ])
        .unwrap();
        let p = parse_file_name("waite-20240102-030405.csv", &map).unwrap();
        assert_eq!(p.raw.site, "waite");
        assert!(parse_file_name("20240102_030405_waite_lidar.csv", &map).is_none());
        assert!(parse_file_name("20240102_030405_waite_lidar.bin", &map).is_some());
    }

    #[test]
    fn extension_lookup_falls_back_to_lowercase() {
        let map = RegexMap::from_patterns([("bin", SITE_SENSOR)]).unwrap();
        assert!(parse_file_name("20240102_030405_a_b.BIN", &map).is_some());
    }

    #[test]
    fn no_extension_uses_wildcard() {
        let map = RegexMap::from_patterns([("*", SITE_SENSOR)]).unwrap();
        assert!(parse_file_name("20240102_030405_a_b", &map).is_some());

        let only_bin = RegexMap::from_patterns([("bin", SITE_SENSOR)]).unwrap();
        assert!(parse_file_name("20240102_030405_a_b", &only_bin).is_none());
    }

    #[test]
    fn missing_date_or_time_group_is_no_match() {
        let map = RegexMap::from_patterns([("*", r"^(\d{8})_(\d{6})")]).unwrap();
        assert!(parse_file_name("20240102_030405.bin", &map).is_none());
        let map = RegexMap::from_patterns([("*", r"^(?P<date>\d{8})")]).unwrap();
        assert!(parse_file_name("20240102_030405.bin", &map).is_none());
    }

    #[test]
    fn malformed_digits_keep_match_without_instant() {
        let map = RegexMap::from_patterns([("*", r"^(?P<date>\w{8})_(?P<time>\w{6})")]).unwrap();
        let p = parse_file_name("2024ab01_153045.bin", &map).unwrap();
        assert_eq!(p.raw.date, "2024ab01");
        assert!(p.datetime.is_none());

        let p = parse_file_name("20241301_000000.bin", &map).unwrap();
        assert!(p.datetime.is_none());
        let p = parse_file_name("20240100_000000.bin", &map).unwrap();
        assert!(p.datetime.is_none());
    }

    #[test]
    fn invalid_pattern_names_extension() {
        let err = RegexMap::from_patterns([("raw", "(?P<date>")]).unwrap_err();
        assert!(err.to_string().contains("`raw`"));
    }

    #[test]
    fn file_data_is_tagged() {
        let map = RegexMap::fallback();
        let row = parse_file_data(item("20240601_153045_siteA_sensorB_t3.bin"), &map);
        assert!(row.is_parsed());
        assert_eq!(row.trial(), Some("t3"));
        assert_eq!(row.sensor(), Some("sensorB"));

        let row = parse_file_data(item("notes.txt"), &map);
        assert_eq!(row.name, NameParse::Unparsed);
        assert_eq!(row.site(), None);
        assert_eq!(row.item.name, "notes.txt");
    }
}
