// PDF output - draws a laid-out Document with printpdf's built-in Helvetica
//
// Layout works in points from the top-left; printpdf wants millimetres from
// the bottom-left. Text runs arrive already reduced to WinAnsi by the layout.

use printpdf::{BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point};
use tracing::debug;

use crate::error::{ObservationError, Result};
use crate::report::PeriodReport;

use super::layout::{encodable, layout_report, Document, Item, PAGE_HEIGHT, PAGE_WIDTH};

fn pt_to_mm(pt: f32) -> f32 {
    pt * 25.4 / 72.0
}

fn render_error(e: impl std::fmt::Debug) -> ObservationError {
    ObservationError::Render(format!("{:?}", e))
}

/// Lay out and render a report in one step
pub fn render_pdf(report: &PeriodReport, title: &str) -> Result<Vec<u8>> {
    render_document(&layout_report(report, title))
}

pub fn render_document(document: &Document) -> Result<Vec<u8>> {
    let width = Mm(pt_to_mm(PAGE_WIDTH));
    let height = Mm(pt_to_mm(PAGE_HEIGHT));

    let (doc, first_page, first_layer) =
        PdfDocument::new(encodable(&document.title), width, height, "Layer 1".to_string());
    let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(render_error)?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(render_error)?;

    for (index, page) in document.pages.iter().enumerate() {
        let (page_index, layer_index) = if index == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(width, height, "Layer 1")
        };
        let layer = doc.get_page(page_index).get_layer(layer_index);

        for item in &page.items {
            draw_item(&layer, item, &regular, &bold);
        }
    }

    let bytes = doc.save_to_bytes().map_err(render_error)?;
    debug!(pages = document.pages.len(), bytes = bytes.len(), "pdf rendered");
    Ok(bytes)
}

fn draw_item(layer: &PdfLayerReference, item: &Item, regular: &IndirectFontRef, bold: &IndirectFontRef) {
    match item {
        Item::Text(run) => {
            let font = if run.bold { bold } else { regular };
            layer.use_text(
                run.text.as_str(),
                run.size,
                Mm(pt_to_mm(run.x)),
                Mm(pt_to_mm(PAGE_HEIGHT - run.baseline)),
                font,
            );
        }
        Item::Rule(rule) => {
            layer.set_outline_thickness(rule.thickness);
            layer.add_line(Line {
                points: vec![
                    (
                        Point::new(Mm(pt_to_mm(rule.x1)), Mm(pt_to_mm(PAGE_HEIGHT - rule.y1))),
                        false,
                    ),
                    (
                        Point::new(Mm(pt_to_mm(rule.x2)), Mm(pt_to_mm(PAGE_HEIGHT - rule.y2))),
                        false,
                    ),
                ],
                is_closed: false,
            });
        }
    }
}
