// 🖨️ Report Renderer
//
// Every renderer consumes one PeriodReport and prints its numbers verbatim.
//
//   text    - fixed-width plain text (CLI)
//   layout  - A4 page layout in points, backend independent
//   pdf     - layout → PDF bytes (printpdf, built-in Helvetica)

pub mod layout;
pub mod pdf;
pub mod text;

pub use layout::{layout_report, Document, Item, Page};
pub use pdf::render_pdf;
pub use text::render_text;

use crate::period::{ReportPeriod, DATE_FORMAT};
use crate::reconciliation::PeriodCounts;
use crate::report::DetailEntry;

pub const OVERALL_HEADING: &str = "OVERALL PENDING VITAL OBSERVATIONS";
pub const GRAND_TOTAL: &str = "GRAND TOTAL";
pub const AREAS_OF_CONCERN: &str = "AREAS OF CONCERN:";
pub const NO_VITAL_OBSERVATIONS: &str = "No Vital observations found.";
pub const UNDER_DEVELOPMENT_HEADING: &str = "MODULES UNDER DEVELOPMENT";
pub const DETAILS_HEADING: &str = "DETAILS OF VITAL OBSERVATIONS IDENTIFIED IN THIS PERIOD";

/// "(From 2025-01-01 to 2025-01-31)"
pub fn period_subtitle(period: &ReportPeriod) -> String {
    format!("({})", period.label())
}

pub fn group_heading(group_name: &str) -> String {
    format!("{} - Pending Vital Observations", group_name)
}

/// Column headings of the count tables; `first` is GROUP or MODULE
pub fn column_headers(period: &ReportPeriod, first: &str) -> Vec<String> {
    vec![
        first.to_string(),
        format!("Pending as on {}", period.from.format(DATE_FORMAT)),
        "Resurfaced".to_string(),
        "New".to_string(),
        "Resolved".to_string(),
        format!("Pending as on {}", period.to.format(DATE_FORMAT)),
    ]
}

/// The five numbers of a row, in column order
pub fn count_cells(counts: &PeriodCounts) -> [String; 5] {
    [
        counts.pending_from.to_string(),
        counts.resurfaced.to_string(),
        counts.new.to_string(),
        counts.resolved.to_string(),
        counts.pending_to.to_string(),
    ]
}

/// "<module>: <text> (Date: YYYY-MM-DD, Status: OPEN)"
pub fn detail_line(entry: &DetailEntry, with_status: bool) -> String {
    let date = entry.date.format(DATE_FORMAT);
    if with_status {
        format!(
            "{}: {} (Date: {}, Status: {})",
            entry.module_name, entry.text, date, entry.status
        )
    } else {
        format!("{}: {} (Date: {})", entry.module_name, entry.text, date)
    }
}
