use chrono_tz::Tz;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table as Grid};
use phenomate_console::table::{CellValue, Page, Table};

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn apply_style(grid: &mut Grid) {
    grid.load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
}

fn align_column(grid: &mut Grid, index: usize, alignment: CellAlignment) {
    if let Some(column) = grid.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

/// Print one page of `table` with a row-number column and a paging footer.
pub fn print_page<R>(table: &Table<R>, page: &Page<'_, R>, tz: Tz) {
    let mut grid = Grid::new();
    let mut header = vec![header_cell("#")];
    header.extend(table.columns.iter().map(|c| header_cell(c.title)));
    grid.set_header(header);
    apply_style(&mut grid);
    align_column(&mut grid, 0, CellAlignment::Right);

    let mut numeric = vec![false; table.columns.len()];
    for (position, row) in &page.rows {
        let mut cells = vec![Cell::new(position)];
        for (i, column) in table.columns.iter().enumerate() {
            let value = (column.accessor)(*row);
            if matches!(value, CellValue::Number(_)) {
                numeric[i] = true;
            }
            cells.push(Cell::new(value.render(tz)));
        }
        grid.add_row(cells);
    }
    for (i, is_numeric) in numeric.into_iter().enumerate() {
        if is_numeric {
            align_column(&mut grid, i + 1, CellAlignment::Right);
        }
    }

    println!("{grid}");
    println!("{}", footer(page));
}

fn footer<R>(page: &Page<'_, R>) -> String {
    let mut text = format!(
        "Page {} of {}, {} of {} row(s)",
        page.page_index + 1,
        page.page_count,
        page.filtered,
        page.total
    );
    if page.can_next() {
        text.push_str(&format!(" (next: --page {})", page.page_index + 2));
    }
    text
}

/// Distinct values of a select column, or the extent of a range column.
pub fn print_facets(column: &str, values: &[String], extent: Option<(f64, f64)>) {
    let mut grid = Grid::new();
    grid.set_header(vec![header_cell(column)]);
    apply_style(&mut grid);
    match extent {
        Some((lo, hi)) => {
            grid.add_row(vec![format!("min {lo}")]);
            grid.add_row(vec![format!("max {hi}")]);
        }
        None => {
            for value in values {
                grid.add_row(vec![value.as_str()]);
            }
        }
    }
    println!("{grid}");
}

/// Two-column field/value listing for a single record.
pub fn print_record(fields: &[(&str, String)]) {
    let mut grid = Grid::new();
    grid.set_header(vec![header_cell("Field"), header_cell("Value")]);
    apply_style(&mut grid);
    for (field, value) in fields {
        grid.add_row(vec![Cell::new(field).add_attribute(Attribute::Bold), Cell::new(value)]);
    }
    println!("{grid}");
}

/// Single-column listing of names.
pub fn print_names<'a, I: IntoIterator<Item = &'a str>>(title: &str, names: I) {
    let mut grid = Grid::new();
    grid.set_header(vec![header_cell(title)]);
    apply_style(&mut grid);
    for name in names {
        grid.add_row(vec![name]);
    }
    println!("{grid}");
}
