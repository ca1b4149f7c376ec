use phenomate_console::datetime::parse_instant;
use phenomate_console::name::ParsedFile;
use phenomate_console::table::{CellValue, Column, FilterVariant, Table};
use phenomate_console::types::{Activity, DirFileItem, Project};
use phenomate_console::vfs::parent_dir;

fn kilobytes(size: f64) -> CellValue {
    CellValue::Number(size / 1000.0)
}

fn optional_date(value: Option<&str>) -> CellValue {
    match value {
        Some(v) => CellValue::Date(parse_instant(v)),
        None => CellValue::Empty,
    }
}

pub fn projects() -> Table<Project> {
    Table::new(vec![
        Column::new("id", "Id", |p: &Project| CellValue::Number(p.id as f64))
            .filter(FilterVariant::Range),
        Column::new("name", "Name", |p: &Project| CellValue::text(&p.name)),
        // location is the project folder; its parent is the root it lives in
        Column::new("location", "Location", |p: &Project| {
            CellValue::text(parent_dir(&p.location))
        }),
        Column::new("updated", "Updated", |p: &Project| {
            CellValue::Date(parse_instant(&p.updated))
        })
        .filter(FilterVariant::Date),
        Column::new("year", "Year", |p: &Project| CellValue::Number(p.year.into()))
            .filter(FilterVariant::Range),
        Column::new("researcher", "Researcher", |p: &Project| {
            CellValue::opt_text(p.researcher_name.as_deref())
        })
        .filter(FilterVariant::Select),
        Column::new("organisation", "Organisation", |p: &Project| {
            CellValue::opt_text(p.organisation_name.as_deref())
        })
        .filter(FilterVariant::Select),
        Column::new("internal", "Internal", |p: &Project| CellValue::Bool(p.internal))
            .filter(FilterVariant::Boolean),
        Column::new("valid", "Valid", |p: &Project| CellValue::Bool(p.is_valid))
            .filter(FilterVariant::Boolean),
    ])
}

pub fn activities() -> Table<Activity> {
    Table::new(vec![
        Column::new("id", "Id", |a: &Activity| CellValue::Number(a.id as f64))
            .filter(FilterVariant::Range),
        Column::new("activity", "Activity", |a: &Activity| CellValue::text(a.activity.as_str()))
            .filter(FilterVariant::Select),
        Column::new("filename", "File", |a: &Activity| CellValue::text(&a.filename)),
        Column::new("target", "Target", |a: &Activity| CellValue::opt_text(a.target.as_deref())),
        Column::new("status", "Status", |a: &Activity| CellValue::text(a.status.as_str()))
            .filter(FilterVariant::Select),
        Column::new("error", "Error", |a: &Activity| {
            CellValue::opt_text(a.error_log.as_deref().filter(|e| !e.is_empty()))
        })
        .unsortable(),
    ])
}

pub fn listing() -> Table<DirFileItem> {
    Table::new(vec![
        Column::new("name", "Name", |f: &DirFileItem| CellValue::text(&f.name)),
        Column::new("type", "Type", |f: &DirFileItem| {
            CellValue::text(if f.is_dir { "dir" } else { "file" })
        })
        .filter(FilterVariant::Select),
        Column::new("size", "Size (kB)", |f: &DirFileItem| kilobytes(f.size))
            .filter(FilterVariant::Range),
        Column::new("modified", "Modified", |f: &DirFileItem| optional_date(f.mod_date.as_deref()))
            .filter(FilterVariant::Date),
        Column::new("path", "Path", |f: &DirFileItem| CellValue::text(&f.id)),
    ])
}

pub fn parsed_files() -> Table<ParsedFile> {
    Table::new(vec![
        Column::new("name", "Name", |f: &ParsedFile| CellValue::text(&f.item.name)),
        Column::new("datetime", "Date", |f: &ParsedFile| {
            if f.is_parsed() {
                CellValue::Date(f.datetime())
            } else {
                CellValue::Empty
            }
        })
        .filter(FilterVariant::Date),
        Column::new("site", "Site", |f: &ParsedFile| CellValue::opt_text(f.site()))
            .filter(FilterVariant::Select),
        Column::new("sensor", "Sensor", |f: &ParsedFile| CellValue::opt_text(f.sensor()))
            .filter(FilterVariant::Select),
        Column::new("trial", "Trial", |f: &ParsedFile| CellValue::opt_text(f.trial()))
            .filter(FilterVariant::Select),
        Column::new("path", "Path", |f: &ParsedFile| CellValue::text(&f.item.id)),
        Column::new("size", "Size (kB)", |f: &ParsedFile| kilobytes(f.item.size))
            .filter(FilterVariant::Range),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Tz;
    use phenomate_console::name::{RegexMap, parse_file_data};
    use phenomate_console::table::TableState;

    fn item(name: &str, size: f64) -> DirFileItem {
        DirFileItem {
            id: format!("/data/{name}"),
            name: name.to_string(),
            is_dir: false,
            is_hidden: false,
            size,
            mod_date: None,
        }
    }

    #[test]
    fn parsed_file_rows_filter_by_site_and_date() {
        let map = RegexMap::fallback();
        let rows: Vec<ParsedFile> = [
            item("20240601_101500_waite_lidar.bin", 2000.0),
            item("20240602_090000_roseworthy_hyper.bin", 500.0),
            item("notes.txt", 10.0),
        ]
        .into_iter()
        .map(|i| parse_file_data(i, &map))
        .collect();

        let t = parsed_files();
        let mut state = TableState::default();
        state.set_filter("site", t.resolve_filter("site", "waite", Tz::UTC).unwrap());
        let page = t.apply(&rows, &state).unwrap();
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0].1.item.name, "20240601_101500_waite_lidar.bin");

        state.clear_filters();
        state.set_filter(
            "datetime",
            t.resolve_filter("datetime", "2024-06-02..2024-06-01", Tz::UTC).unwrap(),
        );
        // bounds are swapped and the unparsed file is excluded
        assert_eq!(t.apply(&rows, &state).unwrap().rows.len(), 1);

        assert_eq!(t.unique_values(&rows, "sensor").unwrap(), ["hyper", "lidar"]);
        assert_eq!(t.min_max(&rows, "size").unwrap(), Some((0.01, 2.0)));
    }

    #[test]
    fn project_location_shows_parent_folder() {
        let p = Project {
            id: 1,
            name: "2024_canola".into(),
            location: "/projects/2024_canola".into(),
            is_valid: true,
            updated: "2024-06-01T00:00:00Z".into(),
            year: 2024,
            internal: false,
            researcher_name: None,
            organisation_name: None,
            summary: None,
            root: None,
        };
        let t = projects();
        let loc = (t.column("location").unwrap().accessor)(&p);
        assert_eq!(loc, CellValue::text("/projects"));
    }
}
