//! Plain-text rendering of command results.

use std::fmt::Write as _;

use unicode_width::UnicodeWidthStr;

/// Column-aligned table with a header row.
#[derive(Debug, Default)]
pub(crate) struct Table {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub(crate) fn new<I, S>(header: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            header: header.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub(crate) fn push<I, S>(&mut self, row: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(row.into_iter().map(Into::into).collect());
    }

    /// Renders the table; the last column is never padded.
    pub(crate) fn render(&self) -> String {
        let mut widths: Vec<usize> = self.header.iter().map(|cell| cell.width()).collect();
        for row in &self.rows {
            for (index, cell) in row.iter().enumerate() {
                match widths.get_mut(index) {
                    Some(width) => *width = (*width).max(cell.width()),
                    None => widths.push(cell.width()),
                }
            }
        }

        let mut output = String::new();
        for row in std::iter::once(&self.header).chain(&self.rows) {
            let mut line = String::new();
            let last = row.len().saturating_sub(1);
            for (index, cell) in row.iter().enumerate() {
                if index > 0 {
                    line.push_str("  ");
                }
                line.push_str(cell);
                if index < last {
                    let width = widths.get(index).copied().unwrap_or_default();
                    let padding = width.saturating_sub(cell.width());
                    line.extend(std::iter::repeat_n(' ', padding));
                }
            }
            let _ = writeln!(output, "{}", line.trim_end());
        }
        output
    }
}

/// Marker printed in front of each batch result line.
pub(crate) const fn outcome_marker(ok: bool) -> &'static str {
    if ok { "ok  " } else { "FAIL" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligns_columns_by_display_width() {
        let mut table = Table::new(["NAME", "PORT", "URL"]);
        table.push(["coevo-api", "8000", "http://127.0.0.1:8000/"]);
        table.push(["ünï", "-", "-"]);

        let rendered = table.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(
            lines,
            vec![
                "NAME       PORT  URL",
                "coevo-api  8000  http://127.0.0.1:8000/",
                "ünï        -     -",
            ]
        );
    }

    #[test]
    fn empty_table_renders_only_the_header() {
        assert_eq!(Table::new(["A", "B"]).render(), "A  B\n");
    }
}
