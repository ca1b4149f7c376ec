//! Client-side filtering, sorting and pagination over typed rows.

use crate::consts::DEFAULT_PAGE_SIZE;
use crate::datetime::format_instant;
use crate::filter::{
    DateRange, EqualsBoolean, EqualsDate, EqualsDateTime, EqualsString, FilterFn, InDateRange,
    InNumberRange, IncludesString, NumberRange,
};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use eyre::{Result, eyre};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// A row value as seen by filters and sorting.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
    /// `None` is a value that should have been a date but did not parse.
    Date(Option<DateTime<Utc>>),
    Empty,
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    pub fn opt_text(value: Option<&str>) -> Self {
        value.map_or(CellValue::Empty, CellValue::text)
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            CellValue::Date(d) => *d,
            _ => None,
        }
    }

    /// Display form; dates are shown in `tz`.
    pub fn render(&self, tz: Tz) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) if n.fract() == 0.0 => format!("{n:.0}"),
            CellValue::Number(n) => format!("{n:.2}"),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Date(Some(dt)) => format_instant(tz, *dt, true),
            CellValue::Date(None) | CellValue::Empty => String::new(),
        }
    }

    fn is_missing(&self) -> bool {
        matches!(self, CellValue::Empty | CellValue::Date(None))
    }
}

/// Ordering of two present values; mismatched kinds compare equal.
fn compare_cells(a: &CellValue, b: &CellValue) -> Ordering {
    use CellValue::{Bool, Date, Number, Text};
    match (a, b) {
        (Text(x), Text(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
        (Number(x), Number(y)) => x.total_cmp(y),
        (Bool(x), Bool(y)) => x.cmp(y),
        (Date(Some(x)), Date(Some(y))) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

/// Which kind of filter a column accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterVariant {
    Text,
    Range,
    Boolean,
    Date,
    Select,
}

pub struct Column<R> {
    pub id: &'static str,
    pub title: &'static str,
    pub accessor: fn(&R) -> CellValue,
    /// `None` disables filtering on this column.
    pub filter: Option<FilterVariant>,
    pub sortable: bool,
}

impl<R> Column<R> {
    pub fn new(id: &'static str, title: &'static str, accessor: fn(&R) -> CellValue) -> Self {
        Self {
            id,
            title,
            accessor,
            filter: Some(FilterVariant::Text),
            sortable: true,
        }
    }

    pub fn filter(mut self, variant: FilterVariant) -> Self {
        self.filter = Some(variant);
        self
    }

    pub fn no_filter(mut self) -> Self {
        self.filter = None;
        self
    }

    pub fn unsortable(mut self) -> Self {
        self.sortable = false;
        self
    }
}

/// A filter value after resolution, ready to test rows.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnFilter {
    Text(Option<String>),
    Select(Option<String>),
    Range(NumberRange),
    Boolean(Option<bool>),
    Date(DateRange),
    /// Same calendar day in `tz` as the value.
    Day(EqualsDate, Option<DateTime<Utc>>),
    /// Same instant, to the second.
    At(Option<DateTime<Utc>>),
}

fn split_range(raw: &str) -> (Option<String>, Option<String>) {
    let part = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };
    match raw.split_once("..") {
        Some((lo, hi)) => (part(lo), part(hi)),
        None => (part(raw), part(raw)),
    }
}

impl ColumnFilter {
    /// Resolve a command-line filter value for a column of `variant`.
    ///
    /// Range and date filters take `min..max`, either side may be empty. A single
    /// number means both bounds; a single date matches that day, a single
    /// date-time that exact second.
    pub fn resolve(variant: FilterVariant, raw: &str, tz: Tz) -> Self {
        match variant {
            FilterVariant::Text => {
                ColumnFilter::Text(IncludesString.resolve_filter_value(raw.into()))
            }
            FilterVariant::Select => {
                ColumnFilter::Select(EqualsString.resolve_filter_value(Some(raw.into())))
            }
            FilterVariant::Boolean => {
                ColumnFilter::Boolean(EqualsBoolean.resolve_filter_value(Some(raw.into())))
            }
            FilterVariant::Range => {
                ColumnFilter::Range(InNumberRange.resolve_filter_value(split_range(raw)))
            }
            FilterVariant::Date if raw.contains("..") => {
                ColumnFilter::Date(InDateRange { tz }.resolve_filter_value(split_range(raw)))
            }
            FilterVariant::Date if NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").is_ok() => {
                let day = EqualsDate { tz };
                ColumnFilter::Day(day, day.resolve_filter_value(Some(raw.into())))
            }
            FilterVariant::Date => {
                ColumnFilter::At(EqualsDateTime { tz }.resolve_filter_value(Some(raw.into())))
            }
        }
    }

    pub fn auto_remove(&self) -> bool {
        match self {
            ColumnFilter::Text(v) => IncludesString.auto_remove(v),
            ColumnFilter::Select(v) => EqualsString.auto_remove(v),
            ColumnFilter::Range(v) => InNumberRange.auto_remove(v),
            ColumnFilter::Boolean(v) => EqualsBoolean.auto_remove(v),
            ColumnFilter::Date(v) => InDateRange::default().auto_remove(v),
            ColumnFilter::Day(f, v) => f.auto_remove(v),
            ColumnFilter::At(v) => EqualsDateTime::default().auto_remove(v),
        }
    }

    pub fn matches(&self, cell: &CellValue) -> bool {
        match self {
            ColumnFilter::Text(v) => IncludesString.matches(cell.as_str(), v),
            ColumnFilter::Select(v) => EqualsString.matches(cell.as_str(), v),
            ColumnFilter::Range(v) => InNumberRange.matches(cell.as_number().as_ref(), v),
            ColumnFilter::Boolean(v) => EqualsBoolean.matches(cell.as_bool().as_ref(), v),
            ColumnFilter::Date(v) => InDateRange::default().matches(cell.as_date().as_ref(), v),
            ColumnFilter::Day(f, v) => f.matches(cell.as_date().as_ref(), v),
            ColumnFilter::At(v) => EqualsDateTime::default().matches(cell.as_date().as_ref(), v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub desc: bool,
}

/// Filters, sort order and page position of one table view.
#[derive(Debug, Clone, PartialEq)]
pub struct TableState {
    pub filters: Vec<(String, ColumnFilter)>,
    pub sorting: Vec<SortKey>,
    pub page_index: usize,
    pub page_size: usize,
}

impl Default for TableState {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sorting: Vec::new(),
            page_index: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl TableState {
    /// Replace the filter on `column`; filters that resolve to "no filter" are dropped.
    pub fn set_filter(&mut self, column: &str, filter: ColumnFilter) {
        self.filters.retain(|(c, _)| c != column);
        if filter.auto_remove() {
            tracing::trace!(column, "filter removed");
            return;
        }
        self.filters.push((column.to_string(), filter));
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
    }

    pub fn sort_by(&mut self, column: &str, desc: bool) {
        self.sorting = vec![SortKey {
            column: column.to_string(),
            desc,
        }];
    }

    pub fn clear_sorting(&mut self) {
        self.sorting.clear();
    }

    /// Page sizes of zero are treated as one.
    pub fn set_page_size(&mut self, size: usize) {
        self.page_size = size.max(1);
        self.page_index = 0;
    }
}

/// One page of a filtered and sorted row set.
#[derive(Debug)]
pub struct Page<'a, R> {
    /// Rows on this page with their 1-based position in the filtered set.
    pub rows: Vec<(usize, &'a R)>,
    pub page_index: usize,
    pub page_count: usize,
    pub filtered: usize,
    pub total: usize,
}

impl<R> Page<'_, R> {
    pub fn can_previous(&self) -> bool {
        self.page_index > 0
    }

    pub fn can_next(&self) -> bool {
        self.page_index + 1 < self.page_count
    }
}

pub struct Table<R> {
    pub columns: Vec<Column<R>>,
}

impl<R> Table<R> {
    pub fn new(columns: Vec<Column<R>>) -> Self {
        Self { columns }
    }

    pub fn column(&self, id: &str) -> Result<&Column<R>> {
        self.columns.iter().find(|c| c.id == id).ok_or_else(|| {
            let known: Vec<_> = self.columns.iter().map(|c| c.id).collect();
            eyre!("unknown column `{id}` (expected one of: {})", known.join(", "))
        })
    }

    /// Resolve `raw` with the filter variant of `column`.
    pub fn resolve_filter(&self, column: &str, raw: &str, tz: Tz) -> Result<ColumnFilter> {
        let col = self.column(column)?;
        let variant = col
            .filter
            .ok_or_else(|| eyre!("column `{column}` cannot be filtered"))?;
        Ok(ColumnFilter::resolve(variant, raw, tz))
    }

    /// Filter, sort, then cut out the requested page.
    ///
    /// A page index past the end is clamped to the last page.
    pub fn apply<'a>(&self, rows: &'a [R], state: &TableState) -> Result<Page<'a, R>> {
        let mut filters = Vec::with_capacity(state.filters.len());
        for (id, f) in &state.filters {
            filters.push((self.column(id)?.accessor, f));
        }
        let mut kept: Vec<&'a R> = rows
            .iter()
            .filter(|row| filters.iter().all(|(get, f)| f.matches(&get(*row))))
            .collect();

        let mut keys = Vec::with_capacity(state.sorting.len());
        for key in &state.sorting {
            let col = self.column(&key.column)?;
            if !col.sortable {
                eyre::bail!("column `{}` cannot be sorted", key.column);
            }
            keys.push((col.accessor, key.desc));
        }
        // missing values sort last in either direction
        if !keys.is_empty() {
            kept.sort_by(|a, b| {
                for (get, desc) in &keys {
                    let (va, vb) = (get(*a), get(*b));
                    let ord = match (va.is_missing(), vb.is_missing()) {
                        (true, true) => Ordering::Equal,
                        (true, false) => Ordering::Greater,
                        (false, true) => Ordering::Less,
                        (false, false) if *desc => compare_cells(&vb, &va),
                        (false, false) => compare_cells(&va, &vb),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        let size = state.page_size.max(1);
        let filtered = kept.len();
        let page_count = filtered.div_ceil(size).max(1);
        let page_index = state.page_index.min(page_count - 1);
        let start = page_index * size;
        let page_rows = kept
            .into_iter()
            .enumerate()
            .skip(start)
            .take(size)
            .map(|(i, r)| (i + 1, r))
            .collect();
        tracing::debug!(total = rows.len(), filtered, page_index, page_count, "table applied");
        Ok(Page {
            rows: page_rows,
            page_index,
            page_count,
            filtered,
            total: rows.len(),
        })
    }

    /// Sorted distinct text values of `column`, for select filters.
    pub fn unique_values(&self, rows: &[R], column: &str) -> Result<Vec<String>> {
        let get = self.column(column)?.accessor;
        let values: BTreeSet<String> = rows
            .iter()
            .filter_map(|r| match get(r) {
                CellValue::Text(s) if !s.is_empty() => Some(s),
                _ => None,
            })
            .collect();
        Ok(values.into_iter().collect())
    }

    /// Smallest and largest number in `column`, for range filters.
    pub fn min_max(&self, rows: &[R], column: &str) -> Result<Option<(f64, f64)>> {
        let get = self.column(column)?.accessor;
        Ok(rows
            .iter()
            .filter_map(|r| get(r).as_number())
            .filter(|n| n.is_finite())
            .fold(None, |acc, n| match acc {
                None => Some((n, n)),
                Some((lo, hi)) => Some((lo.min(n), hi.max(n))),
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Row {
        name: &'static str,
        year: f64,
        internal: bool,
        updated: Option<&'static str>,
        site: Option<&'static str>,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row {
                name: "Canola",
                year: 2024.0,
                internal: true,
                updated: Some("2024-06-01T00:00:00Z"),
                site: Some("waite"),
            },
            Row {
                name: "barley",
                year: 2021.0,
                internal: false,
                updated: Some("2023-01-10T00:00:00Z"),
                site: Some("roseworthy"),
            },
            Row {
                name: "Wheat",
                year: 2022.0,
                internal: true,
                updated: Some("broken"),
                site: None,
            },
            Row {
                name: "oats",
                year: 2023.0,
                internal: true,
                updated: None,
                site: Some("waite"),
            },
        ]
    }

    fn table() -> Table<Row> {
        Table::new(vec![
            Column::new("name", "Name", |r: &Row| CellValue::text(r.name)),
            Column::new("year", "Year", |r: &Row| CellValue::Number(r.year))
                .filter(FilterVariant::Range),
            Column::new("internal", "Internal", |r: &Row| CellValue::Bool(r.internal))
                .filter(FilterVariant::Boolean),
            Column::new("updated", "Updated", |r: &Row| {
                CellValue::Date(r.updated.and_then(crate::datetime::parse_instant))
            })
            .filter(FilterVariant::Date),
            Column::new("site", "Site", |r: &Row| CellValue::opt_text(r.site))
                .filter(FilterVariant::Select),
            Column::new("actions", "", |_: &Row| CellValue::Empty).no_filter().unsortable(),
        ])
    }

    fn names<'a>(page: &Page<'a, Row>) -> Vec<&'a str> {
        page.rows.iter().map(|(_, r)| r.name).collect()
    }

    #[test]
    fn filters_combine() {
        let t = table();
        let data = rows();
        let mut state = TableState::default();
        state.set_filter("internal", t.resolve_filter("internal", "true", Tz::UTC).unwrap());
        state.set_filter("year", t.resolve_filter("year", "2022..", Tz::UTC).unwrap());
        let page = t.apply(&data, &state).unwrap();
        assert_eq!(names(&page), ["Canola", "Wheat", "oats"]);
        assert_eq!(page.total, 4);
    }

    #[test]
    fn date_filter_excludes_unparseable_rows() {
        let t = table();
        let data = rows();
        let mut state = TableState::default();
        let range = t
            .resolve_filter("updated", "2020-01-01..2030-01-01", Tz::UTC)
            .unwrap();
        state.set_filter("updated", range);
        let page = t.apply(&data, &state).unwrap();
        assert_eq!(names(&page), ["Canola", "barley"]);
    }

    #[test]
    fn single_date_matches_day_or_instant() {
        let t = table();
        let data = rows();
        let mut state = TableState::default();
        state.set_filter("updated", t.resolve_filter("updated", "2024-06-01", Tz::UTC).unwrap());
        assert_eq!(names(&t.apply(&data, &state).unwrap()), ["Canola"]);
        state.set_filter(
            "updated",
            t.resolve_filter("updated", "2023-01-10T00:00:00Z", Tz::UTC).unwrap(),
        );
        assert_eq!(names(&t.apply(&data, &state).unwrap()), ["barley"]);
        state.set_filter("updated", t.resolve_filter("updated", "not a date", Tz::UTC).unwrap());
        assert!(state.filters.is_empty());
    }

    #[test]
    fn point_and_range_agree_outside_utc() {
        let adl = chrono_tz::Australia::Adelaide;
        let t = table();
        let data = rows();
        let mut state = TableState::default();
        // Canola was updated at 09:30 local time
        for raw in [
            "2024-06-01 09:30:00",
            "2024-06-01 09:30:00..2024-06-01 09:30:00",
            "2024-06-01",
        ] {
            state.set_filter("updated", t.resolve_filter("updated", raw, adl).unwrap());
            assert_eq!(names(&t.apply(&data, &state).unwrap()), ["Canola"], "{raw}");
        }
        let midnight = t
            .resolve_filter("updated", "2024-06-01 00:00:00", adl)
            .unwrap();
        state.set_filter("updated", midnight);
        assert!(t.apply(&data, &state).unwrap().rows.is_empty());
    }

    #[test]
    fn select_all_drops_filter() {
        let t = table();
        let mut state = TableState::default();
        state.set_filter("site", t.resolve_filter("site", "waite", Tz::UTC).unwrap());
        assert_eq!(state.filters.len(), 1);
        state.set_filter("site", t.resolve_filter("site", "All", Tz::UTC).unwrap());
        assert!(state.filters.is_empty());
    }

    #[test]
    fn sorting_is_case_insensitive_and_missing_last() {
        let t = table();
        let data = rows();
        let mut state = TableState::default();
        state.sort_by("name", false);
        assert_eq!(names(&t.apply(&data, &state).unwrap()), ["barley", "Canola", "oats", "Wheat"]);
        state.sort_by("updated", true);
        let page = t.apply(&data, &state).unwrap();
        assert_eq!(names(&page)[..2], ["Canola", "barley"]);
        state.sort_by("actions", false);
        assert!(t.apply(&data, &state).is_err());
        state.clear_sorting();
        assert_eq!(names(&t.apply(&data, &state).unwrap())[0], "Canola");
    }

    #[test]
    fn pagination_numbers_rows_across_pages() {
        let t = table();
        let data = rows();
        let mut state = TableState::default();
        state.set_page_size(3);
        state.page_index = 1;
        let page = t.apply(&data, &state).unwrap();
        assert_eq!(page.page_count, 2);
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0].0, 4);
        assert!(page.can_previous());
        assert!(!page.can_next());

        state.page_index = 9;
        assert_eq!(t.apply(&data, &state).unwrap().page_index, 1);
    }

    #[test]
    fn unknown_or_unfilterable_columns_error() {
        let t = table();
        assert!(t.resolve_filter("nope", "x", Tz::UTC).is_err());
        assert!(t.resolve_filter("actions", "x", Tz::UTC).is_err());
    }

    #[test]
    fn facets() {
        let t = table();
        let data = rows();
        assert_eq!(t.unique_values(&data, "site").unwrap(), ["roseworthy", "waite"]);
        assert_eq!(t.min_max(&data, "year").unwrap(), Some((2021.0, 2024.0)));
    }

    #[test]
    fn render() {
        assert_eq!(CellValue::Number(2024.0).render(Tz::UTC), "2024");
        assert_eq!(CellValue::Number(1.5).render(Tz::UTC), "1.50");
        assert_eq!(CellValue::Date(None).render(Tz::UTC), "");
    }
}
