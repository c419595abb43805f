use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, Wrap},
};

use crate::model::Model;
use crate::render::{CellRenderers, truncate};
use crate::schema::FieldKind;
use crate::table::{Projection, SortState};
use crate::transfer::Level;

pub const MAX_COLUMN_WIDTH: usize = 32;
pub const COLUMN_WIDTH_MARGIN: usize = 1;
pub const CMDLINE_HEIGHT: u16 = 1;

#[derive(Debug, Default)]
pub struct TableUI;

impl TableUI {
    pub fn new() -> Self {
        Self
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let [title_area, table_area, pager_area, cmd_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(CMDLINE_HEIGHT),
        ])
        .areas(frame.area());

        self.draw_title(model, frame, title_area);
        self.draw_table(model, frame, table_area);
        self.draw_pager(model, frame, pager_area);
        self.draw_cmdline(model, frame, cmd_area);

        if let Some(message) = model.popup_message() {
            let area = popup_area(frame.area(), 70, 80);
            frame.render_widget(Clear, area);
            frame.render_widget(
                Paragraph::new(message)
                    .wrap(Wrap { trim: false })
                    .block(Block::bordered().title(" Help ".bold())),
                area,
            );
        }
    }

    fn draw_title(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let table = model.table();
        let name = if model.source_name().is_empty() {
            "no data"
        } else {
            model.source_name()
        };
        let mut spans = vec![
            " datadeck ".bold().reversed(),
            " ".into(),
            name.yellow(),
            format!(
                "  {} of {} rows",
                table.projection().filtered_count(),
                table.dataset().len()
            )
            .into(),
        ];
        let filter = table.filter();
        if !filter.global.is_empty() {
            spans.push(format!("  search \"{}\"", filter.global).cyan());
        }
        for (field, query) in filter.columns.iter() {
            spans.push(format!("  {}~\"{}\"", field.name(), query).cyan());
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_table(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let table = model.table();
        let projection = table.projection();
        let renderers = model.renderers();
        let sort = table.sort();
        let block = Block::bordered();

        if projection.columns.is_empty() || projection.rows.is_empty() {
            let text = if projection.columns.is_empty() {
                "All columns are hidden."
            } else {
                "No results."
            };
            frame.render_widget(Paragraph::new(text).centered().block(block), area);
            return;
        }

        let header_cells = projection.columns.iter().enumerate().map(|(cidx, &f)| {
            let cell = Cell::from(renderers.header(f, sort));
            if cidx == model.selected_column() {
                cell.style(Style::new().reversed())
            } else {
                cell
            }
        });
        let header = Row::new(std::iter::once(Cell::from("#")).chain(header_cells))
            .style(Style::new().bold());

        let rows = body_cells(projection, renderers)
            .into_iter()
            .zip(projection.row_indices.iter())
            .map(|(cells, ridx)| {
                let index = Line::from(format!("{}", ridx + 1)).right_aligned().dark_gray();
                Row::new(std::iter::once(index).chain(cells).map(Cell::from))
            });

        let mut widths = vec![Constraint::Length(index_width(projection) as u16)];
        widths.extend(column_widths(projection, renderers, sort));
        frame.render_widget(
            Table::new(rows, widths)
                .header(header)
                .column_spacing(1)
                .block(block),
            area,
        );
    }

    fn draw_pager(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let table = model.table();
        let projection = table.projection();
        let enabled = |on: bool, label: &'static str| -> Span<'static> {
            if on { label.bold() } else { label.dark_gray() }
        };
        let page = if projection.page_count == 0 {
            "Page 0 of 0".to_string()
        } else {
            let first = table.page_index() * projection.page_size + 1;
            let last = first + projection.rows.len() - 1;
            format!(
                "Rows {first}-{last}  Page {} of {}",
                table.page_index() + 1,
                projection.page_count
            )
        };
        let line = Line::from(vec![
            enabled(projection.can_previous_page(), "< Previous"),
            format!("  {page}  ").into(),
            enabled(projection.can_next_page(), "Next >"),
        ])
        .right_aligned();
        frame.render_widget(Paragraph::new(line), area);
    }

    fn draw_cmdline(&self, model: &Model, frame: &mut Frame, area: Rect) {
        if let Some((mode, input)) = model.cmd_input() {
            let prompt = mode.prompt();
            let cursor_x = area.x + (prompt.chars().count() + input.cursor_pos) as u16;
            let line = Line::from(vec![prompt.bold(), input.input.clone().into()]);
            frame.render_widget(Paragraph::new(line), area);
            frame.set_cursor_position((cursor_x.min(area.right().saturating_sub(1)), area.y));
            return;
        }

        let line = match model.notification() {
            Some(note) => {
                let color = match note.level {
                    Level::Success => Color::Green,
                    Level::Error => Color::Red,
                };
                Line::from(vec![
                    format!("{}: ", note.title).fg(color).bold(),
                    note.message.clone().into(),
                ])
            }
            None => Line::from(model.status_message().to_string()),
        };
        frame.render_widget(Paragraph::new(line), area);
    }
}

fn column_widths(
    projection: &Projection,
    renderers: &CellRenderers,
    sort: Option<SortState>,
) -> Vec<Constraint> {
    projection
        .columns
        .iter()
        .enumerate()
        .map(|(cidx, &f)| {
            let header = renderers.header(f, sort).chars().count();
            let cells = projection
                .rows
                .iter()
                .map(|row| renderers.cell(f, &row[cidx]).chars().count())
                .max()
                .unwrap_or(0);
            let width = std::cmp::min(std::cmp::max(header, cells), MAX_COLUMN_WIDTH);
            Constraint::Length((width + COLUMN_WIDTH_MARGIN) as u16)
        })
        .collect()
}

/// Rendered page cells, numeric columns right aligned.
fn body_cells(projection: &Projection, renderers: &CellRenderers) -> Vec<Vec<Line<'static>>> {
    projection
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .zip(projection.columns.iter())
                .map(|(value, &f)| {
                    let text = Line::from(truncate(&renderers.cell(f, value), MAX_COLUMN_WIDTH));
                    match f.kind() {
                        FieldKind::Numeric => text.right_aligned(),
                        FieldKind::Text => text,
                    }
                })
                .collect()
        })
        .collect()
}

// Wide enough for the largest dataset row number on the page.
fn index_width(projection: &Projection) -> usize {
    let widest = projection.row_indices.iter().max().map_or(0, |i| i + 1);
    widest.to_string().len() + COLUMN_WIDTH_MARGIN
}

fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::vertical([Constraint::Percentage(percent_y)]).flex(Flex::Center);
    let horizontal = Layout::horizontal([Constraint::Percentage(percent_x)]).flex(Flex::Center);
    let [area] = vertical.areas(area);
    let [area] = horizontal.areas(area);
    area
}
