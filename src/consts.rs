use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

/// Key of the fallback entry in a `RegexMap`.
pub const WILDCARD: &str = "*";

/// Delimiter the preview endpoint places between the proposed path and its existence flag.
pub const PREVIEW_EXISTS_DELIMITER: &str = "| Exists:";

/// Delay between the last preview input change and the request being sent.
pub const PREVIEW_DEBOUNCE: Duration = Duration::from_millis(500);

/// Base URL used when neither the config file nor the command line name one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Rows per page unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Page sizes offered by the table pager.
pub const PAGE_SIZES: [usize; 3] = [10, 50, 100];

/// Browser starting address when nothing was remembered for a field.
pub const DEFAULT_ADDRESS: &str = "/home";

/// Value of select/boolean filters that means "no filter".
pub const FILTER_ALL: &str = "All";

/// Server logs the backend lets clients read.
pub const LOG_FILES: [&str; 4] = [
    "errors.log",
    "django.log",
    "celery-worker.log",
    "celery-phenomate.log",
];

/// Bytes fetched by a log tail unless asked otherwise.
pub const DEFAULT_TAIL_BYTES: u64 = 256 * 1024;

/// Largest tail the backend will serve.
pub const MAX_TAIL_BYTES: u64 = 10 * 1024 * 1024;

/// Pattern used when a project has no configured regex map:
/// `YYYYMMDD_HHMMSS_site_sensor[_trial].ext`.
pub static DEFAULT_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?P<date>\d{8})_(?P<time>\d{6})_",
        r"(?P<site>[^_.]+)_(?P<sensor>[^_.]+)(?:_(?P<trial>[^_.]+))?",
    ))
    .unwrap()
});

/// Splits `key=value` pairs given on the command line.
pub static KEY_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([^=\s]+)\s*=\s*(.*?)\s*$").unwrap());
