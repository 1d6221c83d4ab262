//! Tabular summary of a report, shared by the CSV and Markdown writers.

use crate::result::Report;
use std::cmp::Ordering;
use std::fmt;
use tracing::debug;

/// Column the tables are sorted by unless asked otherwise.
pub const DEFAULT_SORT_COLUMN: &str = "mean wall [s]";

/// Header of the baseline speedup column.
pub const SPEEDUP_COLUMN: &str = "wall speedup";

/// One table cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Free text
    Text(String),
    /// Numeric value, NaN when undefined
    Number(f64),
}

impl Cell {
    fn cmp_cell(&self, other: &Cell) -> Ordering {
        match (self, other) {
            (Cell::Number(a), Cell::Number(b)) => a.total_cmp(b),
            (Cell::Text(a), Cell::Text(b)) => a.cmp(b),
            (Cell::Number(_), Cell::Text(_)) => Ordering::Less,
            (Cell::Text(_), Cell::Number(_)) => Ordering::Greater,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(text) => f.write_str(text),
            Cell::Number(value) => write!(f, "{value}"),
        }
    }
}

/// One row per command with min/max/mean/stdev of every dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryTable {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl SummaryTable {
    /// Build the table for `report`, rows in insertion order.
    pub fn from_report(report: &Report) -> Self {
        let unit = report.setup.unit();
        let dimensions = report.dimensions();
        let with_speedup = report.baseline.is_some();

        let mut headers = vec!["name".to_string(), "command".to_string()];
        if with_speedup {
            headers.push(SPEEDUP_COLUMN.to_string());
        }
        for dimension in &dimensions {
            for stat in ["min", "max", "mean", "stdev"] {
                headers.push(format!("{stat} {dimension} [{unit}]"));
            }
        }

        let rows = report
            .results
            .iter()
            .map(|series| {
                let mut row = vec![
                    Cell::Text(series.name.clone()),
                    Cell::Text(series.command.clone()),
                ];
                if with_speedup {
                    row.push(Cell::Number(
                        report.wall_speedup(&series.name).unwrap_or(f64::NAN),
                    ));
                }
                for dimension in &dimensions {
                    match series.statistics(dimension) {
                        Some(stats) => row.extend(
                            [stats.min, stats.max, stats.mean, stats.stdev].map(Cell::Number),
                        ),
                        None => row.extend([f64::NAN; 4].map(Cell::Number)),
                    }
                }
                row
            })
            .collect();

        Self { headers, rows }
    }

    /// Stable sort by `column`. An unknown column leaves the insertion order
    /// untouched; returns whether a sort happened.
    pub fn sort_by(&mut self, column: &str) -> bool {
        let Some(index) = self.headers.iter().position(|h| h == column) else {
            debug!(column, "unknown sort column, keeping insertion order");
            return false;
        };
        self.rows.sort_by(|a, b| a[index].cmp_cell(&b[index]));
        true
    }

    /// Builder-style [`SummaryTable::sort_by`].
    pub fn sorted_by(mut self, column: &str) -> Self {
        self.sort_by(column);
        self
    }

    /// Column headers.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Rows in current order.
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Names of the rows in current order.
    pub fn names(&self) -> Vec<String> {
        self.rows.iter().map(|row| row[0].to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::tests::gnu_report;

    #[test]
    fn test_headers() {
        let table = SummaryTable::from_report(&gnu_report());
        let headers = table.headers();
        assert_eq!(&headers[..4], ["name", "command", "wall speedup", "min wall [s]"]);
        assert_eq!(headers.len(), 3 + 4 * 4);
        assert!(headers.contains(&"stdev cpu [s]".to_string()));
    }

    #[test]
    fn test_sort_by_mean_wall() {
        let table = SummaryTable::from_report(&gnu_report()).sorted_by(DEFAULT_SORT_COLUMN);
        assert_eq!(table.names(), vec!["cat", "xs grep", "GNU grep"]);
    }

    #[test]
    fn test_unknown_column_keeps_insertion_order() {
        let mut table = SummaryTable::from_report(&gnu_report());
        assert!(!table.sort_by("mean gpu [s]"));
        assert_eq!(table.names(), vec!["cat", "GNU grep", "xs grep"]);
    }

    #[test]
    fn test_sort_by_text_column() {
        let table = SummaryTable::from_report(&gnu_report()).sorted_by("name");
        assert_eq!(table.names(), vec!["GNU grep", "cat", "xs grep"]);
    }
}
