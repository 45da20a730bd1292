use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, BorderType, Cell, Clear, Paragraph, Row, Table, TableState, Tabs, Wrap},
};

use crate::dashboard::{Metric, TabId, table_metrics};
use crate::domain::{CMDMode, Severity};
use crate::model::Model;
use crate::schema::Swatch;
use crate::settings::SettingField;
use crate::table::{LoadState, SortOrder, TableController, TableState as FilterMode};

pub const TOAST_WIDTH: u16 = 50;
pub const TOAST_HEIGHT: u16 = 3;

#[derive(Debug, Default)]
pub struct DashboardUI {
    table_state: TableState,
}

impl DashboardUI {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let accent = accent_color(model);
        let screen = frame.area();
        let [header, tabs, body, status] = Layout::vertical([
            Constraint::Length(2),
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .areas(screen);

        draw_header(model, frame, header, accent);
        draw_tabs(model, frame, tabs, accent);
        match model.dashboard().active_tab() {
            Some(TabId::Overview) => draw_overview(model, frame, body),
            Some(TabId::Settings) => draw_settings(model, frame, body, accent),
            Some(_) => {
                if let Some(table) = model.dashboard().focused_table() {
                    let metrics = model.dashboard().metrics();
                    self.draw_table_page(table, &metrics, frame, body, accent);
                }
            }
            None => {}
        }
        draw_status(model, frame, status);
        draw_toasts(model, frame, screen);
        if let Some(popup) = model.popup() {
            draw_popup(&popup.title, &popup.body, frame, accent);
        }
    }

    fn draw_table_page(
        &mut self,
        table: &TableController,
        metrics: &[Metric],
        frame: &mut Frame,
        area: Rect,
        accent: Color,
    ) {
        let [metrics_area, filters, rows] = Layout::vertical([
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(3),
        ])
        .areas(area);

        frame.render_widget(
            Paragraph::new(metrics_line(metrics)).block(Block::bordered()),
            metrics_area,
        );
        frame.render_widget(Paragraph::new(filter_line(table, accent)), filters);

        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .title(format!(" {} ", table.schema().name));
        if table.rows().is_empty() {
            let message = match table.load_state() {
                LoadState::Unloaded | LoadState::Loading => "Loading ...",
                LoadState::Live | LoadState::Fallback => "No matching records",
            };
            frame.render_widget(Paragraph::new(message.dim()).centered().block(block), rows);
            return;
        }

        let header = Row::new(["", "Name", "Contact", "Category", "Status", "Created"])
            .style(Style::new().add_modifier(Modifier::BOLD));
        let body = table.rows().iter().map(|row| {
            let color = swatch_color(row.swatch);
            Row::new(vec![
                Cell::from(Span::styled(
                    format!(" {} ", row.avatar),
                    Style::new().fg(Color::Black).bg(color),
                )),
                Cell::from(row.title.as_str()),
                Cell::from(row.subtitle.as_str().dim()),
                Cell::from(Span::styled(row.badge.as_str(), Style::new().fg(color))),
                Cell::from(row.status.as_str()),
                Cell::from(row.date.as_str()),
            ])
        });
        let widget = Table::new(
            body,
            [
                Constraint::Length(3),
                Constraint::Fill(2),
                Constraint::Fill(2),
                Constraint::Length(12),
                Constraint::Length(10),
                Constraint::Length(13),
            ],
        )
        .header(header)
        .block(block)
        .row_highlight_style(Style::new().fg(accent).add_modifier(Modifier::REVERSED))
        .highlight_symbol("▶ ");

        self.table_state.select(Some(table.selected()));
        frame.render_stateful_widget(widget, rows, &mut self.table_state);
    }
}

fn accent_color(model: &Model) -> Color {
    let (r, g, b) = model.settings().accent_rgb();
    Color::Rgb(r, g, b)
}

pub fn swatch_color(swatch: Swatch) -> Color {
    match swatch {
        Swatch::Blue => Color::Blue,
        Swatch::Green => Color::Green,
        Swatch::Amber => Color::Yellow,
        Swatch::Purple => Color::Magenta,
        Swatch::Gray => Color::Gray,
    }
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Info => Color::Cyan,
        Severity::Success => Color::Green,
        Severity::Warning => Color::Yellow,
        Severity::Error => Color::Red,
    }
}

fn draw_header(model: &Model, frame: &mut Frame, area: Rect, accent: Color) {
    let (title, subtitle) = model.dashboard().header();
    let text = Text::from(vec![
        Line::from(vec![
            Span::styled(title, Style::new().fg(accent).add_modifier(Modifier::BOLD)),
            "  ·  ".dim(),
            model.settings().platform_name.as_str().dim(),
        ]),
        Line::from(subtitle.italic()),
    ]);
    frame.render_widget(Paragraph::new(text), area);
}

fn draw_tabs(model: &Model, frame: &mut Frame, area: Rect, accent: Color) {
    let titles = TabId::ALL
        .iter()
        .map(|tab| format!("{} {}", tab.index() + 1, tab.label()));
    let selected = model.dashboard().active_tab().map(TabId::index);
    let tabs = Tabs::new(titles)
        .select(selected)
        .highlight_style(Style::new().fg(accent).add_modifier(Modifier::BOLD))
        .divider("|");
    frame.render_widget(tabs, area);
}

fn metrics_line(metrics: &[Metric]) -> Line<'static> {
    let mut spans = Vec::with_capacity(metrics.len() * 3);
    for (idx, metric) in metrics.iter().enumerate() {
        if idx > 0 {
            spans.push("   │   ".dim());
        }
        spans.push(Span::from(format!("{}: ", metric.label)));
        spans.push(Span::from(metric.value.clone()).bold());
    }
    Line::from(spans)
}

fn filter_line(table: &TableController, accent: Color) -> Line<'static> {
    let state = table.filter_state();
    let mut spans = vec![
        " Search: ".dim(),
        Span::from(if state.search_text.is_empty() {
            "-".to_string()
        } else {
            state.search_text.clone()
        }),
    ];
    for facet in table.schema().facets {
        let value = state.facet(facet.field);
        spans.push(Span::from(format!("  {}: ", facet.label)).dim());
        spans.push(Span::from(if value.is_empty() { "All".to_string() } else { value.to_string() }));
    }
    match table.sort() {
        Some(SortOrder::Ascending) => spans.push("  name ↑".dim()),
        Some(SortOrder::Descending) => spans.push("  name ↓".dim()),
        None => {}
    }
    let mode = match table.state() {
        FilterMode::Idle => "  all rows".dim(),
        FilterMode::Filtered => Span::styled("  filtered", Style::new().fg(accent)),
    };
    spans.push(mode);
    spans.push(Span::from(format!("  {}/{}", table.rows().len(), table.records().len())).dim());
    let diff = table.last_diff();
    if diff.inserted > 0 || diff.removed > 0 {
        spans.push(Span::from(format!(" (+{} -{} ={})", diff.inserted, diff.removed, diff.kept)).dim());
    }
    if table.load_state() == LoadState::Fallback {
        spans.push("  sample data".yellow());
    }
    if table.is_loading() {
        spans.push("  loading ...".dim());
    }
    Line::from(spans)
}

fn load_label(table: &TableController) -> Span<'static> {
    match table.load_state() {
        LoadState::Unloaded => "not loaded".dim(),
        LoadState::Loading => "loading ...".dim(),
        LoadState::Live => "live".green(),
        LoadState::Fallback => "sample data".yellow(),
    }
}

fn draw_overview(model: &Model, frame: &mut Frame, area: Rect) {
    let Some(page) = model.dashboard().active_page() else {
        return;
    };
    let constraints = page.tables.iter().map(|_| Constraint::Fill(1));
    let areas = Layout::horizontal(constraints).spacing(1).split(area);
    for (table, area) in page.tables.iter().zip(areas.iter()) {
        let mut lines = vec![Line::from(vec!["Data: ".dim(), load_label(table)]), Line::default()];
        lines.extend(table_metrics(table).into_iter().map(|metric| {
            Line::from(vec![
                Span::from(format!("{:<24}", metric.label)),
                Span::from(metric.value).bold(),
            ])
        }));
        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .title(format!(" {} ", table.schema().name));
        frame.render_widget(Paragraph::new(lines).block(block), *area);
    }
}

fn draw_settings(model: &Model, frame: &mut Frame, area: Rect, accent: Color) {
    let settings = model.settings();
    let lines: Vec<Line> = SettingField::ALL
        .iter()
        .enumerate()
        .map(|(idx, &field)| {
            let selected = idx == model.settings_cursor();
            let marker = if selected { "▶ " } else { "  " };
            let label = Span::from(format!("{marker}{:<24}", field.label()));
            let value = Span::from(settings.value(field));
            if selected {
                Line::from(vec![label.fg(accent).bold(), value.bold()])
            } else {
                Line::from(vec![label, value])
            }
        })
        .collect();
    let block = Block::bordered()
        .border_type(BorderType::Rounded)
        .title(" settings ")
        .title_bottom(Line::from(" Enter edit · Esc cancel ").centered());
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_status(model: &Model, frame: &mut Frame, area: Rect) {
    if let Some((mode, input)) = model.cmd_input() {
        let prompt = match mode {
            CMDMode::Search => "/".to_string(),
            CMDMode::EditSetting => {
                format!("{}: ", SettingField::ALL[model.settings_cursor()].label())
            }
        };
        let x = area.x + (prompt.chars().count() + input.cursor_pos) as u16;
        frame.render_widget(
            Paragraph::new(Line::from(vec![Span::from(prompt).bold(), Span::from(input.input.clone())])),
            area,
        );
        frame.set_cursor_position((x.min(area.right().saturating_sub(1)), area.y));
    } else {
        let [left, right] =
            Layout::horizontal([Constraint::Fill(1), Constraint::Length(10)]).areas(area);
        frame.render_widget(Paragraph::new(model.status_message().dim()), left);
        frame.render_widget(Paragraph::new("? help".dim()).right_aligned(), right);
    }
}

fn draw_toasts(model: &Model, frame: &mut Frame, area: Rect) {
    let toasts = model.toasts();
    if toasts.is_empty() {
        return;
    }
    let width = TOAST_WIDTH.min(area.width);
    let fits = (area.height.saturating_sub(1) / TOAST_HEIGHT) as usize;
    // Newest toasts win when the screen is too small for all of them.
    let skip = toasts.len().saturating_sub(fits);
    let mut y = area.y + 1;
    for toast in toasts.visible().skip(skip) {
        let rect = Rect {
            x: area.right().saturating_sub(width + 1),
            y,
            width,
            height: TOAST_HEIGHT,
        };
        let color = severity_color(toast.severity);
        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .border_style(Style::new().fg(color))
            .title(format!(" {:?} ", toast.severity).to_lowercase());
        frame.render_widget(Clear, rect);
        frame.render_widget(Paragraph::new(toast.message.as_str()).block(block), rect);
        y += TOAST_HEIGHT;
    }
}

fn draw_popup(title: &str, body: &str, frame: &mut Frame, accent: Color) {
    let area = popup_area(frame.area(), 70, 70);
    let block = Block::bordered()
        .border_type(BorderType::Double)
        .border_style(Style::new().fg(accent))
        .title(format!(" {title} "))
        .title_bottom(Line::from(" Esc close ").centered());
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(body.to_string())
            .wrap(Wrap { trim: false })
            .block(block),
        area,
    );
}

fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let [area] = Layout::vertical([Constraint::Percentage(percent_y)])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(Flex::Center)
        .areas(area);
    area
}
