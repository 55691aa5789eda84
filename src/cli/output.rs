//! Text rendering for agent reports, tables and sampled graphs.

use std::collections::BTreeSet;
use std::io::{self, Write};

use crate::agent::{Report, Table};
use crate::sampling::GraphSnapshot;

/// Print one report. Errors go to stderr, everything else to `out`.
///
/// Table cells are not printed one by one; the finished table is.
pub fn write_report(out: &mut impl Write, report: &Report) -> io::Result<()> {
    match report {
        Report::Value { oid, formatted } => writeln!(out, "{} = {}", oid, formatted),
        Report::WalkComplete { message, .. } => write!(out, "{}", message),
        Report::Error(message) => {
            write_error(message);
            Ok(())
        }
        Report::TableCell(_) => Ok(()),
        Report::TableComplete(table) => write!(out, "{}", format_table(table)),
    }
}

/// Print an error message to stderr.
pub fn write_error(message: &str) {
    eprintln!("Error: {}", message);
}

/// Lay a table out as aligned rows, one line per index.
pub fn format_table(table: &Table) -> String {
    let columns: Vec<u32> = table.columns().collect();

    let mut header = vec!["index".to_string()];
    header.extend(columns.iter().map(|c| c.to_string()));

    let mut lines = vec![header];
    for (index, cells) in table.rows() {
        let mut line = vec![index.to_string()];
        line.extend(columns.iter().map(|c| {
            cells
                .get(c)
                .map(ToString::to_string)
                .unwrap_or_else(|| "-".into())
        }));
        lines.push(line);
    }

    align(&lines)
}

/// Lay a graph snapshot out with one line per tick and one column per curve.
///
/// Ticks where a curve had no valid sample print as `-`.
pub fn format_graph(graph: &GraphSnapshot) -> String {
    let ticks: BTreeSet<u64> = graph
        .curves
        .iter()
        .flat_map(|c| c.samples.iter().map(|s| s.tick))
        .collect();

    let mut header = vec!["tick".to_string()];
    header.extend(graph.curves.iter().map(|c| c.name.clone()));

    let mut lines = vec![header];
    for tick in ticks {
        let mut line = vec![tick.to_string()];
        line.extend(graph.curves.iter().map(|curve| {
            curve
                .samples
                .iter()
                .find(|s| s.tick == tick)
                .and_then(|s| s.value)
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".into())
        }));
        lines.push(line);
    }

    align(&lines)
}

fn align(lines: &[Vec<String>]) -> String {
    let width = lines.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..width)
        .map(|i| {
            lines
                .iter()
                .filter_map(|l| l.get(i))
                .map(|s| s.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    for line in lines {
        let cells: Vec<String> = line
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<w$}", cell, w = *w))
            .collect();
        out.push_str(cells.join("  ").trim_end());
        out.push('\n');
    }
    out
}
