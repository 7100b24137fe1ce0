use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use erp_observations::render::{count_cells, detail_line, GRAND_TOTAL};
use erp_observations::{DetailEntry, PeriodCounts, PeriodReport};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, List, ListItem, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Overall,
    Modules,
    Details,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Overall => Page::Modules,
            Page::Modules => Page::Details,
            Page::Details => Page::Overall,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Overall => Page::Details,
            Page::Modules => Page::Overall,
            Page::Details => Page::Modules,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Overall => "Overall",
            Page::Modules => "Modules",
            Page::Details => "Identified / Resolved",
        }
    }
}

/// One line of the Modules page: module counts plus the group it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleLine {
    pub group_index: usize,
    pub group_name: String,
    pub module_name: String,
    pub counts: PeriodCounts,
}

pub struct App {
    pub report: PeriodReport,
    pub title: String,
    pub module_lines: Vec<ModuleLine>,
    pub state: TableState,
    pub overall_state: TableState,
    pub current_page: Page,
    pub show_detail: bool,
}

impl App {
    pub fn new(report: PeriodReport, title: &str) -> Self {
        let module_lines: Vec<ModuleLine> = report
            .groups
            .iter()
            .enumerate()
            .flat_map(|(group_index, group)| {
                group.modules.iter().map(move |m| ModuleLine {
                    group_index,
                    group_name: group.group_name.clone(),
                    module_name: m.module_name.clone(),
                    counts: m.counts,
                })
            })
            .collect();

        let mut state = TableState::default();
        if !module_lines.is_empty() {
            state.select(Some(0));
        }

        let mut overall_state = TableState::default();
        overall_state.select(Some(0));

        Self {
            report,
            title: title.to_string(),
            module_lines,
            state,
            overall_state,
            current_page: Page::Overall,
            show_detail: false,
        }
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    pub fn selected_line(&self) -> Option<&ModuleLine> {
        self.state.selected().and_then(|i| self.module_lines.get(i))
    }

    /// Areas of concern for the group of the selected module
    pub fn selected_concerns(&self) -> &[DetailEntry] {
        self.selected_line()
            .and_then(|line| self.report.groups.get(line.group_index))
            .map(|g| g.areas_of_concern.as_slice())
            .unwrap_or(&[])
    }

    /// Overall page: groups plus the grand total row
    fn overall_len(&self) -> usize {
        self.report.groups.len() + 1
    }

    fn active(&mut self) -> (&mut TableState, usize) {
        match self.current_page {
            Page::Overall => {
                let len = self.overall_len();
                (&mut self.overall_state, len)
            }
            _ => {
                let len = self.module_lines.len();
                (&mut self.state, len)
            }
        }
    }

    pub fn next(&mut self) {
        let (state, len) = self.active();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(i) if i >= len - 1 => 0,
            Some(i) => i + 1,
            None => 0,
        };
        state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let (state, len) = self.active();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let (state, len) = self.active();
        if len == 0 {
            return;
        }
        let i = state.selected().map_or(0, |i| (i + 10).min(len - 1));
        state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let (state, _) = self.active();
        let i = state.selected().map_or(0, |i| i.saturating_sub(10));
        state.select(Some(i));
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res.map_err(Into::into)
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.previous_page();
                    } else {
                        app.next_page();
                    }
                }
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Overall => render_overall(f, chunks[1], app),
        Page::Modules if app.show_detail => {
            let content_chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                .split(chunks[1]);

            render_modules(f, content_chunks[0], app);
            render_concerns(f, content_chunks[1], app);
        }
        Page::Modules => render_modules(f, chunks[1], app),
        Page::Details => render_details(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in [Page::Overall, Page::Modules, Page::Details].iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    let total = &app.report.grand_total;
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        app.report.period.label(),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("+{} new", total.new),
        Style::default().fg(Color::Red),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("-{} resolved", total.resolved),
        Style::default().fg(Color::Green),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(format!(" {} ", app.title)),
    );

    f.render_widget(header, area);
}

fn count_header(first: &str) -> Row<'static> {
    let cells = [first, "Pending (start)", "Resurfaced", "New", "Resolved", "Pending (end)"]
        .into_iter()
        .map(|h| {
            Cell::from(h.to_string()).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        });
    Row::new(cells).style(Style::default().bg(Color::DarkGray)).height(1)
}

fn count_row(label: String, counts: &PeriodCounts, style: Style) -> Row<'static> {
    let mut cells = vec![Cell::from(label)];
    cells.extend(count_cells(counts).into_iter().map(Cell::from));
    Row::new(cells).style(style).height(1)
}

const COUNT_WIDTHS: [Constraint; 5] = [Constraint::Length(16); 5];

fn render_overall(f: &mut Frame, area: Rect, app: &mut App) {
    let mut rows: Vec<Row> = app
        .report
        .groups
        .iter()
        .map(|g| count_row(g.group_name.clone(), &g.counts, Style::default()))
        .collect();
    rows.push(count_row(
        GRAND_TOTAL.to_string(),
        &app.report.grand_total,
        Style::default().add_modifier(Modifier::BOLD),
    ));

    let widths = std::iter::once(Constraint::Length(24)).chain(COUNT_WIDTHS);
    let table = Table::new(rows, widths)
        .header(count_header("Group"))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Overall Pending Vital Observations "),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.overall_state);
}

fn render_modules(f: &mut Frame, area: Rect, app: &mut App) {
    let rows: Vec<Row> = app
        .module_lines
        .iter()
        .map(|line| {
            let style = if line.counts.pending_to > 0 {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };
            count_row(truncate(&line.module_name, 40), &line.counts, style)
        })
        .collect();

    let group = app
        .selected_line()
        .map(|l| l.group_name.clone())
        .unwrap_or_default();

    let widths = std::iter::once(Constraint::Length(42)).chain(COUNT_WIDTHS);
    let table = Table::new(rows, widths)
        .header(count_header("Module"))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Modules - {} ", group)),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_concerns(f: &mut Frame, area: Rect, app: &App) {
    let concerns = app.selected_concerns();
    let lines: Vec<Line> = if concerns.is_empty() {
        vec![Line::from("No Vital observations found.")]
    } else {
        concerns
            .iter()
            .map(|e| Line::from(detail_line(e, true)))
            .collect()
    };

    let panel = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(" Areas of Concern "));
    f.render_widget(panel, area);
}

fn render_details(f: &mut Frame, area: Rect, app: &App) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let list = |entries: &[DetailEntry], with_status: bool, empty: &str| -> Vec<ListItem<'static>> {
        if entries.is_empty() {
            return vec![ListItem::new(empty.to_string())];
        }
        entries
            .iter()
            .map(|e| ListItem::new(detail_line(e, with_status)))
            .collect()
    };

    let identified = List::new(list(&app.report.details.identified, true, "None identified"))
        .block(Block::default().borders(Borders::ALL).title(" Identified "));
    let resolved = List::new(list(&app.report.details.resolved, false, "None resolved"))
        .block(Block::default().borders(Borders::ALL).title(" Resolved "));

    f.render_widget(identified, columns[0]);
    f.render_widget(resolved, columns[1]);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let help = match app.current_page {
        Page::Modules => "↑↓/jk: Move | Enter: Areas of concern | Tab: Next page | q: Quit",
        _ => "↑↓/jk: Move | Tab: Next page | Shift+Tab: Previous | q: Quit",
    };

    let status = Paragraph::new(help)
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(status, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
