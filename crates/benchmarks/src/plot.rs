//! Bar chart rendering.
//!
//! Every report becomes one chart per plotted dimension with one bar per
//! command. The fastest bar is green, the slowest red and everything else
//! gray. Error bars show the standard deviation whenever at least one
//! command has a nonzero one. Charts are written as SVG or drawn on the
//! terminal.

use crate::error::Result;
use crate::result::Report;
use colored::Colorize;
use std::fmt::Write;
use std::fs;
use std::path::Path;
use xsbench_core::measurement::{CPU, WALL};
use xsbench_core::TimerKind;

/// Extension of chart files.
pub const EXTENSION: &str = "svg";

const PANEL_WIDTH: f64 = 320.0;
const PANEL_HEIGHT: f64 = 380.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_LEFT: f64 = 56.0;
const MARGIN_BOTTOM: f64 = 130.0;
const TERMINAL_WIDTH: usize = 40;

/// Colour role of one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarColor {
    /// Smallest value
    Min,
    /// Largest value
    Max,
    /// Anything in between
    Other,
}

impl BarColor {
    fn fill(&self) -> &'static str {
        match self {
            BarColor::Min => "#2e7d32",
            BarColor::Max => "#c62828",
            BarColor::Other => "#9e9e9e",
        }
    }
}

/// One bar: mean and standard deviation of a command.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    /// Command name
    pub label: String,
    /// Mean value in the chart unit
    pub value: f64,
    /// Standard deviation in the chart unit, 0 when undefined
    pub error: f64,
}

/// One chart panel.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    /// Panel title
    pub title: String,
    /// Unit of the y axis
    pub unit: &'static str,
    /// Bars in report order
    pub bars: Vec<Bar>,
}

impl Chart {
    /// Colour role of every bar. A bar that is both minimum and maximum is
    /// drawn as maximum.
    pub fn colors(&self) -> Vec<BarColor> {
        let min = self.bars.iter().map(|b| b.value).fold(f64::INFINITY, f64::min);
        let max = self.bars.iter().map(|b| b.value).fold(f64::NEG_INFINITY, f64::max);
        self.bars
            .iter()
            .map(|bar| {
                if bar.value == max {
                    BarColor::Max
                } else if bar.value == min {
                    BarColor::Min
                } else {
                    BarColor::Other
                }
            })
            .collect()
    }

    /// Whether error bars are drawn.
    pub fn has_error_bars(&self) -> bool {
        self.bars.iter().any(|bar| bar.error != 0.0)
    }

    fn top(&self) -> f64 {
        let top = self
            .bars
            .iter()
            .map(|bar| bar.value + bar.error)
            .fold(0.0, f64::max);
        if top > 0.0 {
            top * 1.1
        } else {
            1.0
        }
    }
}

/// Chart data of `report`.
pub fn charts(report: &Report) -> Vec<Chart> {
    let structured = report.setup.timer == TimerKind::InlineBench;
    // Structured values are nanoseconds; milliseconds read better.
    let (divisor, unit) = if structured { (1e6, "ms") } else { (1.0, "s") };

    report
        .plot_dimensions()
        .into_iter()
        .map(|dimension| {
            let title = match dimension.as_str() {
                WALL => "Wall Time".to_string(),
                CPU => "CPU Time".to_string(),
                other => other.strip_prefix("Wall/").unwrap_or(other).to_string(),
            };
            let bars = report
                .results
                .iter()
                .filter_map(|series| {
                    let stats = series.statistics(&dimension)?;
                    let error = if stats.stdev.is_nan() { 0.0 } else { stats.stdev };
                    Some(Bar {
                        label: series.name.clone(),
                        value: stats.mean / divisor,
                        error: error / divisor,
                    })
                })
                .collect();
            Chart { title, unit, bars }
        })
        .collect()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn render_panel(output: &mut String, chart: &Chart, offset_x: f64) {
    let plot_width = PANEL_WIDTH - MARGIN_LEFT - 16.0;
    let plot_height = PANEL_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let baseline_y = MARGIN_TOP + plot_height;
    let top = chart.top();
    let slot = plot_width / chart.bars.len().max(1) as f64;
    let bar_width = slot * 0.7;
    let y_of = |value: f64| baseline_y - value / top * plot_height;

    writeln!(output, r#"<g transform="translate({offset_x:.1},0)">"#).unwrap();
    writeln!(
        output,
        r#"<text x="{:.1}" y="24" text-anchor="middle" font-size="14">{} [{}]</text>"#,
        PANEL_WIDTH / 2.0,
        escape(&chart.title),
        chart.unit
    )
    .unwrap();
    writeln!(
        output,
        r##"<line x1="{MARGIN_LEFT}" y1="{MARGIN_TOP}" x2="{MARGIN_LEFT}" y2="{baseline_y:.1}" stroke="#333"/>"##
    )
    .unwrap();
    writeln!(
        output,
        r##"<line x1="{MARGIN_LEFT}" y1="{baseline_y:.1}" x2="{:.1}" y2="{baseline_y:.1}" stroke="#333"/>"##,
        MARGIN_LEFT + plot_width
    )
    .unwrap();
    for tick in 0..=4 {
        let value = top * tick as f64 / 4.0;
        writeln!(
            output,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="end" font-size="10">{value:.3}</text>"#,
            MARGIN_LEFT - 4.0,
            y_of(value) + 3.0
        )
        .unwrap();
    }

    let error_bars = chart.has_error_bars();
    for (i, (bar, color)) in chart.bars.iter().zip(chart.colors()).enumerate() {
        let x = MARGIN_LEFT + slot * i as f64 + (slot - bar_width) / 2.0;
        let y = y_of(bar.value);
        let center = x + bar_width / 2.0;
        writeln!(
            output,
            r#"<rect x="{x:.1}" y="{y:.1}" width="{bar_width:.1}" height="{:.1}" fill="{}"><title>{}: {:.4} {}</title></rect>"#,
            baseline_y - y,
            color.fill(),
            escape(&bar.label),
            bar.value,
            chart.unit
        )
        .unwrap();
        if error_bars {
            writeln!(
                output,
                r##"<line x1="{center:.1}" y1="{:.1}" x2="{center:.1}" y2="{:.1}" stroke="#1565c0" stroke-width="1.5"/>"##,
                y_of((bar.value - bar.error).max(0.0)),
                y_of(bar.value + bar.error)
            )
            .unwrap();
        }
        writeln!(
            output,
            r#"<text transform="translate({center:.1},{:.1}) rotate(90)" font-size="10">{}</text>"#,
            baseline_y + 6.0,
            escape(&bar.label)
        )
        .unwrap();
    }
    writeln!(output, "</g>").unwrap();
}

/// Render all charts of `report` side by side as one SVG document.
pub fn render_svg(report: &Report) -> String {
    let charts = charts(report);
    let width = PANEL_WIDTH * charts.len().max(1) as f64;
    let height = PANEL_HEIGHT + 30.0;
    let mut output = String::new();

    writeln!(
        output,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width:.0}" height="{height:.0}" viewBox="0 0 {width:.0} {height:.0}" font-family="sans-serif">"#
    )
    .unwrap();
    writeln!(output, r#"<rect width="100%" height="100%" fill="white"/>"#).unwrap();
    writeln!(
        output,
        r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="12">{}</text>"#,
        width / 2.0,
        height - 10.0,
        escape(&report.setup.name)
    )
    .unwrap();
    for (i, chart) in charts.iter().enumerate() {
        render_panel(&mut output, chart, PANEL_WIDTH * i as f64);
    }
    writeln!(output, "</svg>").unwrap();

    output
}

/// Write the SVG charts of `report` to `path`.
pub fn write_svg(report: &Report, path: impl AsRef<Path>) -> Result<()> {
    fs::write(path, render_svg(report))?;
    Ok(())
}

/// Render the charts of `report` as horizontal bars for a terminal.
pub fn render_terminal(report: &Report) -> String {
    let mut output = String::new();
    for chart in charts(report) {
        writeln!(output, "{} [{}]", chart.title.bold(), chart.unit).unwrap();
        let label_width = chart.bars.iter().map(|b| b.label.len()).max().unwrap_or(0);
        let top = chart.top();
        let error_bars = chart.has_error_bars();

        for (bar, color) in chart.bars.iter().zip(chart.colors()) {
            let filled = ((bar.value / top) * TERMINAL_WIDTH as f64).round() as usize;
            let blocks = "█".repeat(filled.min(TERMINAL_WIDTH));
            let blocks = match color {
                BarColor::Min => blocks.green(),
                BarColor::Max => blocks.red(),
                BarColor::Other => blocks.dimmed(),
            };
            write!(
                output,
                "  {:<label_width$} {:<width$} {:.4}",
                bar.label,
                blocks,
                bar.value,
                width = TERMINAL_WIDTH
            )
            .unwrap();
            if error_bars {
                write!(output, " ± {:.4}", bar.error).unwrap();
            }
            writeln!(output).unwrap();
        }
        writeln!(output).unwrap();
    }
    output
}

/// Save the charts to `path` as SVG, or print them to stdout without one.
pub fn plot(report: &Report, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => write_svg(report, path),
        None => {
            print!("{}", render_terminal(report));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::tests::{gnu_report, setup};
    use xsbench_core::{ResultAccumulator, RunMeasurement};

    #[test]
    fn test_gnu_time_charts() {
        let charts = charts(&gnu_report());
        assert_eq!(charts.len(), 2);
        assert_eq!(charts[0].title, "Wall Time");
        assert_eq!(charts[1].title, "CPU Time");
        assert_eq!(charts[0].bars.len(), 3);
        assert_eq!(
            charts[0].colors(),
            vec![BarColor::Min, BarColor::Max, BarColor::Other]
        );
        assert!(charts[0].has_error_bars());
    }

    #[test]
    fn test_structured_charts_in_milliseconds() {
        let mut acc = ResultAccumulator::new();
        acc.merge("4K", "mmap_read f -s 4096", RunMeasurement::new().with("Wall/read", 2_000_000.0))
            .unwrap();
        acc.merge("32K", "mmap_read f -s 32768", RunMeasurement::new().with("Wall/read", 1_000_000.0))
            .unwrap();
        let report = Report::new(setup(TimerKind::InlineBench), acc, None);

        let charts = charts(&report);
        assert_eq!(charts.len(), 1);
        assert_eq!(charts[0].title, "read");
        assert_eq!(charts[0].unit, "ms");
        assert_eq!(charts[0].bars[0].value, 2.0);
        // single samples have no stdev, so no error bars
        assert!(!charts[0].has_error_bars());
        assert_eq!(charts[0].colors(), vec![BarColor::Max, BarColor::Min]);
    }

    #[test]
    fn test_svg_document() {
        let svg = render_svg(&gnu_report());
        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert_eq!(svg.matches("<rect x=").count(), 6);
        assert!(svg.contains("GNU grep"));
        assert!(svg.contains("#2e7d32"));
    }

    #[test]
    fn test_terminal_chart() {
        let text = render_terminal(&gnu_report());
        assert!(text.contains("Wall Time"));
        assert!(text.contains("xs grep"));
        assert!(text.contains("±"));
    }

    #[test]
    fn test_plot_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.svg");
        plot(&gnu_report(), Some(&path)).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("<svg"));
    }
}
