//! Column filter functions for the table engine.
//!
//! Every filter resolves its raw input once when the filter changes, reports
//! whether the resolved value should drop the filter entirely, and then tests
//! rows. A row whose value is missing or unparseable never passes a filter
//! that is actually active.

use crate::consts::FILTER_ALL;
use crate::datetime::parse_instant_in;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

pub trait FilterFn {
    /// Row value the filter inspects.
    type Cell: ?Sized;
    /// Filter value as entered by the user.
    type Raw;
    /// Filter value after coercion.
    type Value;

    fn resolve_filter_value(&self, raw: Self::Raw) -> Self::Value;

    /// `true` when `value` means "no filter" and should leave the active set.
    fn auto_remove(&self, value: &Self::Value) -> bool;

    fn matches(&self, cell: Option<&Self::Cell>, value: &Self::Value) -> bool;
}

fn blank_or_all(raw: &str) -> bool {
    let raw = raw.trim();
    raw.is_empty() || raw.eq_ignore_ascii_case(FILTER_ALL)
}

/// Tri-state boolean filter: `None` passes every row.
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualsBoolean;

impl FilterFn for EqualsBoolean {
    type Cell = bool;
    type Raw = Option<String>;
    type Value = Option<bool>;

    fn resolve_filter_value(&self, raw: Option<String>) -> Option<bool> {
        match raw.as_deref().map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("true") => Some(true),
            Some(v) if v.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    fn auto_remove(&self, value: &Option<bool>) -> bool {
        value.is_none()
    }

    fn matches(&self, cell: Option<&bool>, value: &Option<bool>) -> bool {
        match value {
            None => true,
            Some(want) => cell == Some(want),
        }
    }
}

/// Same calendar day in `tz` (UTC by default). Naive input is wall-clock time in `tz`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EqualsDate {
    pub tz: Tz,
}

impl Default for EqualsDate {
    fn default() -> Self {
        Self { tz: Tz::UTC }
    }
}

impl FilterFn for EqualsDate {
    type Cell = DateTime<Utc>;
    type Raw = Option<String>;
    type Value = Option<DateTime<Utc>>;

    fn resolve_filter_value(&self, raw: Option<String>) -> Option<DateTime<Utc>> {
        raw.as_deref().and_then(|v| parse_instant_in(v, self.tz))
    }

    fn auto_remove(&self, value: &Option<DateTime<Utc>>) -> bool {
        value.is_none()
    }

    fn matches(&self, cell: Option<&DateTime<Utc>>, value: &Option<DateTime<Utc>>) -> bool {
        let day = |dt: &DateTime<Utc>| dt.with_timezone(&self.tz).date_naive();
        match value {
            None => true,
            Some(want) => cell.is_some_and(|c| day(c) == day(want)),
        }
    }
}

/// Same instant to the second. Naive input is wall-clock time in `tz`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EqualsDateTime {
    pub tz: Tz,
}

impl Default for EqualsDateTime {
    fn default() -> Self {
        Self { tz: Tz::UTC }
    }
}

impl FilterFn for EqualsDateTime {
    type Cell = DateTime<Utc>;
    type Raw = Option<String>;
    type Value = Option<DateTime<Utc>>;

    fn resolve_filter_value(&self, raw: Option<String>) -> Option<DateTime<Utc>> {
        raw.as_deref().and_then(|v| parse_instant_in(v, self.tz))
    }

    fn auto_remove(&self, value: &Option<DateTime<Utc>>) -> bool {
        value.is_none()
    }

    fn matches(&self, cell: Option<&DateTime<Utc>>, value: &Option<DateTime<Utc>>) -> bool {
        match value {
            None => true,
            Some(want) => cell.is_some_and(|c| c.timestamp() == want.timestamp()),
        }
    }
}

/// Inclusive instant range; either side may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub min: Option<DateTime<Utc>>,
    pub max: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn is_open(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// Date-range filter. Naive bounds are wall-clock time in `tz`.
#[derive(Debug, Clone, Copy)]
pub struct InDateRange {
    pub tz: Tz,
}

impl Default for InDateRange {
    fn default() -> Self {
        Self { tz: Tz::UTC }
    }
}

impl FilterFn for InDateRange {
    type Cell = DateTime<Utc>;
    type Raw = (Option<String>, Option<String>);
    type Value = DateRange;

    fn resolve_filter_value(&self, (min, max): Self::Raw) -> DateRange {
        let parse = |v: Option<String>| v.and_then(|v| parse_instant_in(&v, self.tz));
        let (mut min, mut max) = (parse(min), parse(max));
        if let (Some(lo), Some(hi)) = (min, max)
            && lo > hi
        {
            (min, max) = (Some(hi), Some(lo));
        }
        DateRange { min, max }
    }

    fn auto_remove(&self, value: &DateRange) -> bool {
        value.is_open()
    }

    fn matches(&self, cell: Option<&DateTime<Utc>>, value: &DateRange) -> bool {
        if value.is_open() {
            return true;
        }
        let Some(c) = cell else {
            return false;
        };
        value.min.is_none_or(|lo| *c >= lo) && value.max.is_none_or(|hi| *c <= hi)
    }
}

/// Inclusive numeric range; either side may be open.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NumberRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumberRange {
    pub fn is_open(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InNumberRange;

impl FilterFn for InNumberRange {
    type Cell = f64;
    type Raw = (Option<String>, Option<String>);
    type Value = NumberRange;

    fn resolve_filter_value(&self, (min, max): Self::Raw) -> NumberRange {
        let parse = |v: Option<String>| {
            v.and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|n| n.is_finite())
        };
        let (mut min, mut max) = (parse(min), parse(max));
        if let (Some(lo), Some(hi)) = (min, max)
            && lo > hi
        {
            (min, max) = (Some(hi), Some(lo));
        }
        NumberRange { min, max }
    }

    fn auto_remove(&self, value: &NumberRange) -> bool {
        value.is_open()
    }

    fn matches(&self, cell: Option<&f64>, value: &NumberRange) -> bool {
        if value.is_open() {
            return true;
        }
        let Some(c) = cell.filter(|c| c.is_finite()) else {
            return false;
        };
        value.min.is_none_or(|lo| *c >= lo) && value.max.is_none_or(|hi| *c <= hi)
    }
}

/// Case-insensitive substring search.
#[derive(Debug, Clone, Copy, Default)]
pub struct IncludesString;

impl FilterFn for IncludesString {
    type Cell = str;
    type Raw = String;
    type Value = Option<String>;

    fn resolve_filter_value(&self, raw: String) -> Option<String> {
        let needle = raw.trim().to_lowercase();
        (!needle.is_empty()).then_some(needle)
    }

    fn auto_remove(&self, value: &Option<String>) -> bool {
        value.is_none()
    }

    fn matches(&self, cell: Option<&str>, value: &Option<String>) -> bool {
        match value {
            None => true,
            Some(needle) => cell.is_some_and(|c| c.to_lowercase().contains(needle.as_str())),
        }
    }
}

/// Exact match against one faceted value; `All` clears the filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualsString;

impl FilterFn for EqualsString {
    type Cell = str;
    type Raw = Option<String>;
    type Value = Option<String>;

    fn resolve_filter_value(&self, raw: Option<String>) -> Option<String> {
        raw.filter(|v| !blank_or_all(v))
    }

    fn auto_remove(&self, value: &Option<String>) -> bool {
        value.is_none()
    }

    fn matches(&self, cell: Option<&str>, value: &Option<String>) -> bool {
        match value {
            None => true,
            Some(want) => cell == Some(want.as_str()),
        }
    }
}
