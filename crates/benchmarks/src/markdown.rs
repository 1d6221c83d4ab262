//! Markdown output generation for benchmark reports.

use crate::result::Report;
use crate::table::{Cell, SummaryTable};
use std::fmt::Write;

/// Render a number compactly: integers for nanosecond-scale values, four
/// decimals otherwise.
fn format_cell(cell: &Cell) -> String {
    match cell {
        Cell::Text(text) => text.replace('|', "\\|"),
        Cell::Number(value) if value.is_nan() => "NaN".to_string(),
        Cell::Number(value) if value.abs() >= 1000.0 => format!("{value:.0}"),
        Cell::Number(value) => format!("{value:.4}"),
    }
}

/// Render `table` as a Markdown table.
pub fn generate_table(table: &SummaryTable) -> String {
    let mut output = String::new();

    writeln!(output, "| {} |", table.headers().join(" | ")).unwrap();
    let separator: Vec<String> = table
        .headers()
        .iter()
        .map(|h| "-".repeat(h.len().max(3)))
        .collect();
    writeln!(output, "|{}|", separator.join("|")).unwrap();

    for row in table.rows() {
        let cells: Vec<String> = row.iter().map(format_cell).collect();
        writeln!(output, "| {} |", cells.join(" | ")).unwrap();
    }

    output
}

/// Generate a Markdown report: setup header followed by the summary table
/// sorted by `sort_column`.
pub fn generate_report(report: &Report, sort_column: &str) -> String {
    let setup = &report.setup;
    let mut output = String::new();

    writeln!(output, "# {}", setup.name).unwrap();
    writeln!(output).unwrap();
    if !setup.description.is_empty() {
        writeln!(output, "{}", setup.description).unwrap();
        writeln!(output).unwrap();
    }
    writeln!(output, "- **Host:** {}", setup.hardware.host).unwrap();
    writeln!(output, "- **CPU:** {}", setup.hardware.cpu).unwrap();
    writeln!(output, "- **Timer:** {}", setup.timer).unwrap();
    writeln!(output, "- **Iterations:** {}", setup.iterations).unwrap();
    writeln!(output, "- **Cache:** {}", if setup.cached { "warm" } else { "dropped" }).unwrap();
    if let Some(pattern) = &setup.pattern {
        writeln!(output, "- **Pattern:** `{pattern}`").unwrap();
    }
    if let Some(baseline) = &report.baseline {
        writeln!(output, "- **Baseline:** {baseline}").unwrap();
    }
    writeln!(
        output,
        "- **Generated:** {}",
        setup.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    )
    .unwrap();
    writeln!(output).unwrap();

    let table = SummaryTable::from_report(report).sorted_by(sort_column);
    output.push_str(&generate_table(&table));

    writeln!(output).unwrap();
    writeln!(output, "---").unwrap();
    writeln!(output, "Total commands: {}", report.results.len()).unwrap();

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::tests::gnu_report;
    use crate::table::DEFAULT_SORT_COLUMN;

    #[test]
    fn test_generate_report() {
        let md = generate_report(&gnu_report(), DEFAULT_SORT_COLUMN);
        assert!(md.starts_with("# literal\n"));
        assert!(md.contains("- **Pattern:** `Sherlock`"));
        assert!(md.contains("| name | command | wall speedup |"));
        assert!(md.contains("Total commands: 3"));

        let cat = md.find("| cat |").unwrap();
        let grep = md.find("| GNU grep |").unwrap();
        assert!(cat < grep);
    }

    #[test]
    fn test_cells_are_escaped_and_rounded() {
        assert_eq!(format_cell(&Cell::Text("a | b".into())), "a \\| b");
        assert_eq!(format_cell(&Cell::Number(0.123456)), "0.1235");
        assert_eq!(format_cell(&Cell::Number(123456.7)), "123457");
        assert_eq!(format_cell(&Cell::Number(f64::NAN)), "NaN");
    }
}
