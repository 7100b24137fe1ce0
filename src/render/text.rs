// Plain-text rendering for terminals and logs

use std::fmt::Write;

use crate::reconciliation::PeriodCounts;
use crate::report::PeriodReport;

use super::{
    column_headers, count_cells, detail_line, group_heading, period_subtitle, AREAS_OF_CONCERN,
    DETAILS_HEADING, GRAND_TOTAL, NO_VITAL_OBSERVATIONS, OVERALL_HEADING,
    UNDER_DEVELOPMENT_HEADING,
};

const NUMBER_WIDTH: usize = 12;

pub fn render_text(report: &PeriodReport, title: &str) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = write_report(&mut out, report, title);
    out
}

fn write_report(out: &mut String, report: &PeriodReport, title: &str) -> std::fmt::Result {
    writeln!(out, "{}", title)?;
    writeln!(out, "{}", period_subtitle(&report.period))?;
    writeln!(out)?;

    writeln!(out, "{}", OVERALL_HEADING)?;
    let label_width = report
        .groups
        .iter()
        .map(|g| g.group_name.chars().count())
        .chain([GRAND_TOTAL.len(), "GROUP".len()])
        .max()
        .unwrap_or(0);

    let headers = column_headers(&report.period, "GROUP");
    write_header(out, &headers, label_width)?;
    for group in &report.groups {
        write_row(out, &group.group_name, &group.counts, label_width)?;
    }
    write_row(out, GRAND_TOTAL, &report.grand_total, label_width)?;
    writeln!(out)?;

    for group in &report.groups {
        writeln!(out, "{}", group_heading(&group.group_name))?;

        let label_width = group
            .modules
            .iter()
            .map(|m| m.module_name.chars().count())
            .chain(["MODULE".len()])
            .max()
            .unwrap_or(0);
        write_header(out, &column_headers(&report.period, "MODULE"), label_width)?;
        for module in &group.modules {
            write_row(out, &module.module_name, &module.counts, label_width)?;
        }

        writeln!(out)?;
        writeln!(out, "{}", AREAS_OF_CONCERN)?;
        if group.areas_of_concern.is_empty() {
            writeln!(out, "  {}", NO_VITAL_OBSERVATIONS)?;
        }
        for entry in &group.areas_of_concern {
            writeln!(out, "  {}", detail_line(entry, true))?;
        }
        writeln!(out)?;
    }

    writeln!(out, "{}", UNDER_DEVELOPMENT_HEADING)?;
    for name in &report.under_development {
        writeln!(out, "- {}", name)?;
    }
    writeln!(out)?;

    writeln!(out, "{}", DETAILS_HEADING)?;
    writeln!(out, "IDENTIFIED")?;
    if report.details.identified.is_empty() {
        writeln!(out, "  None identified")?;
    }
    for entry in &report.details.identified {
        writeln!(out, "  {}", detail_line(entry, true))?;
    }
    writeln!(out, "RESOLVED")?;
    if report.details.resolved.is_empty() {
        writeln!(out, "  None resolved")?;
    }
    for entry in &report.details.resolved {
        writeln!(out, "  {}", detail_line(entry, false))?;
    }

    Ok(())
}

fn write_header(out: &mut String, headers: &[String], label_width: usize) -> std::fmt::Result {
    let mut line = format!("{:<width$}", headers[0], width = label_width);
    for header in &headers[1..] {
        // Date headings are wider than the number column
        let short = header.strip_prefix("Pending as on ").unwrap_or(header);
        write!(line, " {:>width$}", short, width = NUMBER_WIDTH)?;
    }
    writeln!(out, "{}", line.trim_end())?;
    writeln!(out, "{}", "-".repeat(label_width + headers[1..].len() * (NUMBER_WIDTH + 1)))
}

fn write_row(out: &mut String, label: &str, counts: &PeriodCounts, label_width: usize) -> std::fmt::Result {
    let mut line = format!("{:<width$}", label, width = label_width);
    for cell in count_cells(counts) {
        write!(line, " {:>width$}", cell, width = NUMBER_WIDTH)?;
    }
    writeln!(out, "{}", line)
}
