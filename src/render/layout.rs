// 📐 Page layout - A4 portrait, measured in points from the top-left corner
//
// Produces positioned text runs and rules; the PDF backend only draws them.
// Tables repeat their header row after every page break and wrap long cells.
// Nothing is placed below PAGE_HEIGHT - MARGIN_BOTTOM.

use crate::report::PeriodReport;

use super::{
    column_headers, count_cells, detail_line, group_heading, period_subtitle, AREAS_OF_CONCERN,
    DETAILS_HEADING, GRAND_TOTAL, NO_VITAL_OBSERVATIONS, OVERALL_HEADING,
    UNDER_DEVELOPMENT_HEADING,
};

pub const PAGE_WIDTH: f32 = 595.0;
pub const PAGE_HEIGHT: f32 = 842.0;
pub const MARGIN_LEFT: f32 = 36.0;
pub const MARGIN_RIGHT: f32 = 36.0;
pub const MARGIN_TOP: f32 = 50.0;
pub const MARGIN_BOTTOM: f32 = 36.0;

const CONTENT_WIDTH: f32 = PAGE_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
const CONTENT_BOTTOM: f32 = PAGE_HEIGHT - MARGIN_BOTTOM;
const LEADING: f32 = 1.2;
const CELL_PADDING: f32 = 3.0;
const RULE_THICKNESS: f32 = 0.75;

// ============================================================================
// OUTPUT
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub x: f32,
    /// Baseline, measured down from the top of the page
    pub baseline: f32,
    pub size: f32,
    pub bold: bool,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub thickness: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Text(TextRun),
    Rule(Rule),
}

impl Item {
    /// Lowest point the item reaches, measured down from the top
    pub fn bottom(&self) -> f32 {
        match self {
            Item::Text(run) => run.baseline + run.size * 0.2,
            Item::Rule(rule) => rule.y1.max(rule.y2),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Item>,
}

impl Page {
    pub fn texts(&self) -> impl Iterator<Item = &TextRun> + '_ {
        self.items.iter().filter_map(|item| match item {
            Item::Text(run) => Some(run),
            Item::Rule(_) => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub title: String,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn texts(&self) -> impl Iterator<Item = &TextRun> + '_ {
        self.pages.iter().flat_map(|p| p.texts())
    }
}

// ============================================================================
// TEXT METRICS (Helvetica approximation, em units)
// ============================================================================

fn char_width(c: char) -> f32 {
    match c {
        ' ' | 'i' | 'j' | 'l' | '.' | ',' | '\'' | ':' | ';' | '|' | '!' | 'I' => 0.278,
        'f' | 't' | 'r' | '(' | ')' | '-' | '/' | '[' | ']' => 0.333,
        'm' | 'M' | 'W' => 0.833,
        'w' => 0.722,
        'A'..='Z' | '&' => 0.667,
        '0'..='9' => 0.556,
        _ => 0.556,
    }
}

pub fn text_width(text: &str, size: f32, bold: bool) -> f32 {
    let em: f32 = text.chars().map(char_width).sum();
    em * size * if bold { 1.06 } else { 1.0 }
}

/// Characters WinAnsiEncoding places in 0x80-0x9F, where it departs from Latin-1
const WIN_ANSI_EXTRAS: &str = "\u{20ac}\u{201a}\u{0192}\u{201e}\u{2026}\u{2020}\u{2021}\u{02c6}\u{2030}\
    \u{0160}\u{2039}\u{0152}\u{017d}\u{2018}\u{2019}\u{201c}\u{201d}\u{2022}\u{2013}\u{2014}\
    \u{02dc}\u{2122}\u{0161}\u{203a}\u{0153}\u{017e}\u{0178}";

/// Built-in PDF fonts draw WinAnsi only; anything else becomes '?'
pub fn encodable(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            ' '..='~' | '\u{a0}'..='\u{ff}' => c,
            _ if WIN_ANSI_EXTRAS.contains(c) => c,
            _ => '?',
        })
        .collect()
}

/// Greedy word wrap; words wider than `width` are split by character.
/// Text is made encodable first so measured and drawn widths agree.
pub fn wrap(text: &str, width: f32, size: f32, bold: bool) -> Vec<String> {
    let text = encodable(text);
    let fits = |s: &str| text_width(s, size, bold) <= width;
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };

        if fits(&candidate) {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }

        if fits(word) {
            current = word.to_string();
        } else {
            for c in word.chars() {
                current.push(c);
                if !fits(&current) && current.chars().count() > 1 {
                    current.pop();
                    lines.push(std::mem::take(&mut current));
                    current.push(c);
                }
            }
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

// ============================================================================
// LAYOUT ENGINE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Center,
}

#[derive(Debug, Clone, Copy)]
struct Style {
    size: f32,
    bold: bool,
    align: Align,
}

const TITLE: Style = Style { size: 16.0, bold: true, align: Align::Center };
const SUBTITLE: Style = Style { size: 12.0, bold: true, align: Align::Center };
const HEADING: Style = Style { size: 11.0, bold: true, align: Align::Left };
const BODY: Style = Style { size: 9.0, bold: false, align: Align::Left };
const LIST: Style = Style { size: 10.0, bold: false, align: Align::Left };

struct TableSpec {
    widths: Vec<f32>,
    header: Vec<String>,
    rows: Vec<TableRow>,
    size: f32,
    /// Alignment of the first column; the rest are centered
    first_align: Align,
}

struct TableRow {
    cells: Vec<String>,
    bold: bool,
}

impl TableRow {
    fn plain(cells: Vec<String>) -> Self {
        TableRow { cells, bold: false }
    }
}

struct Layouter {
    finished: Vec<Page>,
    current: Page,
    cursor: f32,
}

impl Layouter {
    fn new() -> Self {
        Layouter {
            finished: Vec::new(),
            current: Page::default(),
            cursor: MARGIN_TOP,
        }
    }

    fn new_page(&mut self) {
        self.finished.push(std::mem::take(&mut self.current));
        self.cursor = MARGIN_TOP;
    }

    /// Break the page unless `height` still fits (an empty page always accepts)
    fn ensure(&mut self, height: f32) {
        if self.cursor + height > CONTENT_BOTTOM && self.cursor > MARGIN_TOP {
            self.new_page();
        }
    }

    fn spacer(&mut self, height: f32) {
        self.cursor += height;
    }

    fn paragraph(&mut self, text: &str, style: Style) {
        let line_height = style.size * LEADING;
        for line in wrap(text, CONTENT_WIDTH, style.size, style.bold) {
            self.ensure(line_height);
            let x = match style.align {
                Align::Left => MARGIN_LEFT,
                Align::Center => {
                    MARGIN_LEFT + (CONTENT_WIDTH - text_width(&line, style.size, style.bold)).max(0.0) / 2.0
                }
            };
            self.current.items.push(Item::Text(TextRun {
                x,
                baseline: self.cursor + style.size,
                size: style.size,
                bold: style.bold,
                text: line,
            }));
            self.cursor += line_height;
        }
    }

    fn table(&mut self, spec: &TableSpec) {
        let total: f32 = spec.widths.iter().sum();
        let x0 = MARGIN_LEFT + (CONTENT_WIDTH - total).max(0.0) / 2.0;
        let line_height = spec.size * LEADING;

        let header = self.wrap_row(spec, &spec.header, true, usize::MAX);
        let header_height = row_height(&header, line_height);

        // Tallest row that still fits on a fresh page under the header
        let max_lines = (((CONTENT_BOTTOM - MARGIN_TOP - header_height) - 2.0 * CELL_PADDING)
            / line_height)
            .floor()
            .max(1.0) as usize;

        let rows: Vec<(Vec<Vec<String>>, bool)> = spec
            .rows
            .iter()
            .map(|row| (self.wrap_row(spec, &row.cells, row.bold, max_lines), row.bold))
            .collect();

        let first_height = rows
            .first()
            .map(|(cells, _)| row_height(cells, line_height))
            .unwrap_or(0.0);
        self.ensure(header_height + first_height);
        self.draw_row(spec, x0, &header, true);

        for (cells, bold) in &rows {
            if self.cursor + row_height(cells, line_height) > CONTENT_BOTTOM {
                self.new_page();
                self.draw_row(spec, x0, &header, true);
            }
            self.draw_row(spec, x0, cells, *bold);
        }
    }

    fn wrap_row(&self, spec: &TableSpec, cells: &[String], bold: bool, max_lines: usize) -> Vec<Vec<String>> {
        cells
            .iter()
            .zip(&spec.widths)
            .map(|(cell, width)| {
                let mut lines = wrap(cell, width - 2.0 * CELL_PADDING, spec.size, bold);
                if lines.len() > max_lines {
                    lines.truncate(max_lines);
                    if let Some(last) = lines.last_mut() {
                        let keep = last.chars().count().saturating_sub(3);
                        *last = last.chars().take(keep).collect::<String>() + "...";
                    }
                }
                lines
            })
            .collect()
    }

    fn draw_row(&mut self, spec: &TableSpec, x0: f32, cells: &[Vec<String>], bold: bool) {
        let line_height = spec.size * LEADING;
        let top = self.cursor;
        let height = row_height(cells, line_height);
        let total: f32 = spec.widths.iter().sum();

        for y in [top, top + height] {
            self.rule(x0, y, x0 + total, y);
        }

        let mut x = x0;
        self.rule(x, top, x, top + height);
        for (col, (lines, width)) in cells.iter().zip(&spec.widths).enumerate() {
            let align = if col == 0 { spec.first_align } else { Align::Center };

            for (i, line) in lines.iter().enumerate() {
                let text_x = match align {
                    Align::Left => x + CELL_PADDING,
                    Align::Center => x + (width - text_width(line, spec.size, bold)).max(0.0) / 2.0,
                };
                self.current.items.push(Item::Text(TextRun {
                    x: text_x,
                    baseline: top + CELL_PADDING + spec.size + i as f32 * line_height,
                    size: spec.size,
                    bold,
                    text: line.clone(),
                }));
            }

            x += width;
            self.rule(x, top, x, top + height);
        }

        self.cursor += height;
    }

    fn rule(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) {
        self.current.items.push(Item::Rule(Rule {
            x1,
            y1,
            x2,
            y2,
            thickness: RULE_THICKNESS,
        }));
    }

    fn finish(mut self, title: &str) -> Document {
        self.finished.push(self.current);
        Document {
            title: title.to_string(),
            pages: self.finished,
        }
    }
}

fn row_height(cells: &[Vec<String>], line_height: f32) -> f32 {
    let lines = cells.iter().map(Vec::len).max().unwrap_or(1).max(1);
    lines as f32 * line_height + 2.0 * CELL_PADDING
}

// ============================================================================
// REPORT LAYOUT
// ============================================================================

pub fn layout_report(report: &PeriodReport, title: &str) -> Document {
    let mut l = Layouter::new();

    l.paragraph(title, TITLE);
    l.spacer(8.0);
    l.paragraph(&period_subtitle(&report.period), SUBTITLE);
    l.spacer(12.0);

    // Overall table
    l.paragraph(OVERALL_HEADING, HEADING);
    l.spacer(6.0);
    let mut rows: Vec<TableRow> = report
        .groups
        .iter()
        .map(|g| TableRow::plain(with_label(&g.group_name, count_cells(&g.counts))))
        .collect();
    rows.push(TableRow {
        cells: with_label(GRAND_TOTAL, count_cells(&report.grand_total)),
        bold: true,
    });
    l.table(&TableSpec {
        widths: vec![120.0, 70.0, 60.0, 50.0, 50.0, 70.0],
        header: column_headers(&report.period, "GROUP"),
        rows,
        size: 10.0,
        first_align: Align::Center,
    });
    l.spacer(18.0);

    // Per-group module tables
    for group in &report.groups {
        l.paragraph(&group_heading(&group.group_name), SUBTITLE);
        l.spacer(6.0);
        l.table(&TableSpec {
            widths: vec![200.0, 60.0, 50.0, 50.0, 50.0, 60.0],
            header: column_headers(&report.period, "MODULE"),
            rows: group
                .modules
                .iter()
                .map(|m| TableRow::plain(with_label(&m.module_name, count_cells(&m.counts))))
                .collect(),
            size: 8.0,
            first_align: Align::Left,
        });
        l.spacer(12.0);

        l.paragraph(AREAS_OF_CONCERN, HEADING);
        l.spacer(6.0);
        if group.areas_of_concern.is_empty() {
            l.paragraph(NO_VITAL_OBSERVATIONS, BODY);
        } else {
            for entry in &group.areas_of_concern {
                l.paragraph(&detail_line(entry, true), BODY);
                l.spacer(4.0);
            }
        }
        l.spacer(18.0);
    }

    l.paragraph(UNDER_DEVELOPMENT_HEADING, SUBTITLE);
    l.spacer(6.0);
    for name in &report.under_development {
        l.paragraph(&format!("- {}", name), LIST);
    }
    l.spacer(18.0);

    // Identified / resolved, side by side
    l.paragraph(DETAILS_HEADING, SUBTITLE);
    l.spacer(6.0);
    l.table(&TableSpec {
        widths: vec![250.0, 273.0],
        header: vec!["IDENTIFIED".to_string(), "RESOLVED".to_string()],
        rows: detail_rows(report),
        size: 9.0,
        first_align: Align::Left,
    });

    l.finish(title)
}

fn with_label(label: &str, counts: [String; 5]) -> Vec<String> {
    std::iter::once(label.to_string()).chain(counts).collect()
}

fn detail_rows(report: &PeriodReport) -> Vec<TableRow> {
    let identified: Vec<String> = report
        .details
        .identified
        .iter()
        .map(|e| detail_line(e, true))
        .collect();
    let resolved: Vec<String> = report
        .details
        .resolved
        .iter()
        .map(|e| detail_line(e, false))
        .collect();

    let rows = identified.len().max(resolved.len()).max(1);
    (0..rows)
        .map(|i| {
            let cell = |list: &[String], empty: &str| match list.get(i) {
                Some(line) => line.clone(),
                None if i == 0 => empty.to_string(),
                None => String::new(),
            };
            TableRow {
                cells: vec![cell(&identified, "None identified"), cell(&resolved, "None resolved")],
                bold: false,
            }
        })
        .collect()
}
