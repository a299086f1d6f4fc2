//! Plain-text column listing used by `--plan`.

use std::fmt::Write as _;

use itertools::Itertools;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

/// A header cell plus how its column is padded.
#[derive(Debug, Clone)]
pub struct Column {
    pub title: String,
    pub align: Align,
}

impl Column {
    pub fn left(title: &str) -> Self {
        Self {
            title: title.to_string(),
            align: Align::Left,
        }
    }

    pub fn right(title: &str) -> Self {
        Self {
            title: title.to_string(),
            align: Align::Right,
        }
    }
}

pub fn render_table(columns: &[Column], rows: &[Vec<String>]) -> String {
    let mut widths = columns
        .iter()
        .map(|column| cell_width(&column.title))
        .collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell_width(cell));
        }
    }

    let mut output = String::new();
    let titles = columns.iter().map(|c| c.title.clone()).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_line(columns, &titles, &widths));
    let rule = widths.iter().map(|w| "-".repeat(*w)).join("  ");
    let _ = writeln!(output, "{rule}");
    for row in rows {
        let _ = writeln!(output, "{}", format_line(columns, row, &widths));
    }
    output
}

pub fn print_table(columns: &[Column], rows: &[Vec<String>]) {
    print!("{}", render_table(columns, rows));
}

fn format_line(columns: &[Column], cells: &[String], widths: &[usize]) -> String {
    let line = columns
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(idx, (column, width))| {
            let cell = cells.get(idx).map(|c| flatten(c)).unwrap_or_default();
            let pad = " ".repeat(width.saturating_sub(cell_width(&cell)));
            match column.align {
                Align::Left => format!("{cell}{pad}"),
                Align::Right => format!("{pad}{cell}"),
            }
        })
        .join("  ");
    line.trim_end().to_string()
}

fn cell_width(value: &str) -> usize {
    value.chars().count()
}

// Header names can carry stray control characters from badly exported feeds.
fn flatten(value: &str) -> String {
    value
        .chars()
        .map(|ch| if ch.is_control() { ' ' } else { ch })
        .collect()
}
