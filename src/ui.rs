use std::ops::Range;

use crate::app::{App, Focus, InputMode};
use crate::braille::BrailleCanvas;
use crate::derive::{Card, CardValue, MarkerTier, Projection};
use crate::format::{format_coordinates, format_currency, format_number, truncate_text};
use crate::map::MapLayers;
use crate::state::{ActionStatus, FeedbackKind};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Margin, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
    Frame,
};

/// Screen regions, shared by rendering and mouse hit-testing.
#[derive(Debug, Clone, Copy)]
pub struct Areas {
    pub header: Rect,
    pub upload: Rect,
    pub cards: [Rect; 4],
    pub map: Rect,
    pub map_inner: Rect,
    pub search: Rect,
    pub top: Rect,
    pub list: Rect,
    pub list_inner: Rect,
    pub detail: Rect,
    pub status: Rect,
}

pub fn layout(area: Rect) -> Areas {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Length(3), // Upload bar
            Constraint::Length(4), // Summary cards
            Constraint::Min(6),    // Map + list
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 4); 4])
        .split(rows[2]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(58), Constraint::Percentage(42)])
        .split(rows[3]);

    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Search
            Constraint::Length(3), // Top bairros
            Constraint::Min(3),    // Ranked list
            Constraint::Length(7), // Selected bairro
        ])
        .split(body[1]);

    let border = Margin::new(1, 1);
    Areas {
        header: rows[0],
        upload: rows[1],
        cards: [cards[0], cards[1], cards[2], cards[3]],
        map: body[0],
        map_inner: body[0].inner(border),
        search: side[0],
        top: side[1],
        list: side[2],
        list_inner: side[2].inner(border),
        detail: side[3],
        status: rows[4],
    }
}

/// Rows of a `len`-item list visible in `rows` lines, scrolled so the
/// selected item stays on screen.
pub fn list_window(len: usize, selected: Option<usize>, rows: usize) -> Range<usize> {
    let offset = match selected {
        Some(idx) if rows > 0 && idx >= rows => idx + 1 - rows,
        _ => 0,
    };
    offset..len.min(offset + rows)
}

pub fn tier_color(tier: MarkerTier) -> Color {
    match tier {
        MarkerTier::Low => Color::Rgb(0x22, 0xc5, 0x5e),
        MarkerTier::Caution => Color::Rgb(0xea, 0xb3, 0x08),
        MarkerTier::High => Color::Rgb(0xf9, 0x73, 0x16),
        MarkerTier::Critical => Color::Rgb(0xdc, 0x26, 0x26),
        MarkerTier::Neutral => Color::Rgb(0x25, 0x63, 0xeb),
    }
}

fn dim() -> Style {
    Style::default().fg(Color::DarkGray)
}

fn panel(title: &str, focused: bool) -> Block<'_> {
    let border = if focused { Color::Cyan } else { Color::DarkGray };
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
}

/// Render the UI
pub fn render(frame: &mut Frame, app: &App) {
    let areas = layout(frame.area());
    let projection = app.state.projection();

    render_header(frame, app, areas.header);
    render_upload_bar(frame, app, areas.upload);
    render_cards(frame, app, &areas.cards);
    render_map(frame, app, &projection, areas.map);
    render_search(frame, app, areas.search);
    render_top(frame, &projection, areas.top);
    render_list(frame, app, &projection, areas.list);
    render_detail(frame, app, areas.detail);
    render_status_bar(frame, app, areas.status);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let state = &app.state;
    let mut spans = vec![
        Span::styled(
            " Crime Dashboard ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("{} ", app.api_url), dim()),
    ];

    match &state.refresh {
        ActionStatus::Loading if state.initial_load => {
            spans.push(Span::styled("Loading data...", Style::default().fg(Color::Yellow)));
        }
        ActionStatus::Loading => {
            spans.push(Span::styled("Refreshing...", Style::default().fg(Color::Yellow)));
        }
        ActionStatus::Succeeded => {
            spans.push(Span::styled(
                format!("{} bairros loaded", state.aggregations.len()),
                Style::default().fg(Color::Green),
            ));
        }
        ActionStatus::Idle | ActionStatus::Failed(_) => {}
    }
    if state.clear.is_loading() {
        spans.push(Span::styled(" Clearing data...", Style::default().fg(Color::Yellow)));
    }
    if let Some(message) = &state.error_message {
        spans.push(Span::styled(
            format!("  {message}"),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_upload_bar(frame: &mut Frame, app: &App, area: Rect) {
    let state = &app.state;
    let block = panel("Upload CSV", matches!(app.mode, InputMode::FilePrompt(_)));

    let mut spans = match &app.mode {
        InputMode::FilePrompt(input) => vec![
            Span::styled("Path: ", dim()),
            Span::styled(format!("{input}▏"), Style::default().fg(Color::White)),
            Span::styled("  Enter to select, Esc to cancel", dim()),
        ],
        _ => {
            let file = match &state.selected_file {
                Some(path) => Span::styled(
                    path.file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| path.display().to_string()),
                    Style::default().fg(Color::White),
                ),
                None => Span::styled("Select an updated CSV file", dim()),
            };
            vec![Span::styled("File: ", dim()), file]
        }
    };

    if state.upload.is_loading() {
        spans.push(Span::styled("  Uploading...", Style::default().fg(Color::Yellow)));
    } else if let Some(feedback) = &state.upload_feedback {
        let color = match feedback.kind {
            FeedbackKind::Success => Color::Green,
            FeedbackKind::Error => Color::Red,
        };
        spans.push(Span::styled(format!("  {}", feedback.message), Style::default().fg(color)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn card_value(value: &CardValue, width: usize) -> String {
    match value {
        CardValue::Count(n) => format_number(*n),
        CardValue::Money(amount) => format_currency(*amount),
        CardValue::Name(name) => truncate_text(name, width),
    }
}

fn render_cards(frame: &mut Frame, app: &App, areas: &[Rect; 4]) {
    let cards = app.state.summary_cards();
    for (card, &area) in cards.cards().into_iter().zip(areas.iter()) {
        render_card(frame, card, area);
    }
}

fn render_card(frame: &mut Frame, card: &Card, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(dim())
        .title(Span::styled(format!(" {} ", card.label), dim()));
    let width = block.inner(area).width as usize;

    let value = card
        .value
        .as_ref()
        .map(|v| card_value(v, width))
        .unwrap_or_else(|| "--".to_string());
    let mut lines = vec![Line::from(Span::styled(
        value,
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
    ))];
    if let Some((label, secondary)) = &card.secondary {
        let text = format!("{label}: {}", card_value(secondary, width));
        lines.push(Line::from(Span::styled(truncate_text(&text, width), dim())));
    }

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_map(frame: &mut Frame, app: &App, projection: &Projection<'_>, area: Rect) {
    let mut legend = vec![Span::raw(" ")];
    for tier in MarkerTier::LEGEND {
        legend.push(Span::styled("● ", Style::default().fg(tier_color(tier))));
        legend.push(Span::styled(format!("{}  ", tier.label()), dim()));
    }
    let block = panel("Map", app.focus == Focus::Map).title_bottom(Line::from(legend));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let state = &app.state;
    if projection.markers.is_empty() {
        let message = if state.initial_load && state.refresh.is_loading() {
            "Loading data..."
        } else if state.has_data() {
            "No bairro has coordinates."
        } else {
            "No information available."
        };
        frame.render_widget(
            Paragraph::new(Span::styled(message, dim())).alignment(ratatui::layout::Alignment::Center),
            inner,
        );
        return;
    }

    // Update viewport size for rendering
    let mut viewport = app.viewport.clone();
    viewport.width = inner.width as usize * 2;
    viewport.height = inner.height as usize * 4;

    let labelled: Vec<&str> = projection.top.iter().map(|r| r.bairro.as_str()).collect();
    let layers = app.map_renderer.render(
        inner.width as usize,
        inner.height as usize,
        &viewport,
        &projection.markers,
        state.selected_name(),
        &labelled,
    );
    frame.render_widget(MapWidget { layers }, inner);
}

/// Braille map layers with text labels overlaid
struct MapWidget {
    layers: MapLayers,
}

impl MapWidget {
    /// Render a braille canvas layer with a specific color
    fn render_layer(canvas: &BrailleCanvas, color: Color, area: Rect, buf: &mut Buffer) {
        for (col, row, ch) in canvas.glyphs() {
            if col >= area.width || row >= area.height {
                continue;
            }
            buf[(area.x + col, area.y + row)].set_char(ch).set_fg(color);
        }
    }
}

impl Widget for MapWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Back to front: outlines, quiet markers, busy markers, halo
        Self::render_layer(&self.layers.basemap, Color::DarkGray, area, buf);
        for (tier, canvas) in &self.layers.tiers {
            Self::render_layer(canvas, tier_color(*tier), area, buf);
        }
        Self::render_layer(&self.layers.highlight, Color::White, area, buf);

        let label_style = Style::default().fg(Color::White).add_modifier(Modifier::BOLD);
        for (lx, ly, text) in &self.layers.labels {
            if *ly >= area.height || *lx >= area.width {
                continue;
            }
            let max_len = area.width.saturating_sub(*lx) as usize;
            let display_text = truncate_text(text, max_len.min(24));
            buf.set_string(area.x + *lx, area.y + *ly, display_text, label_style);
        }
    }
}

fn render_search(frame: &mut Frame, app: &App, area: Rect) {
    let searching = app.mode == InputMode::Search;
    let block = panel("Search", searching);
    let term = &app.state.search_term;

    let line = if searching {
        Line::from(Span::styled(format!("{term}▏"), Style::default().fg(Color::White)))
    } else if term.is_empty() {
        Line::from(Span::styled("Search by bairro name (/)", dim()))
    } else {
        Line::from(Span::styled(term.as_str(), Style::default().fg(Color::White)))
    };
    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn render_top(frame: &mut Frame, projection: &Projection<'_>, area: Rect) {
    let mut spans = Vec::new();
    for (rank, record) in projection.top.iter().enumerate() {
        let tier = crate::derive::marker_tier(record.total_crimes, projection.max_total_crimes);
        spans.push(Span::styled(
            format!("#{} {} ", rank + 1, truncate_text(&record.bairro, 14)),
            Style::default().fg(tier_color(tier)),
        ));
        spans.push(Span::styled(format!("{}  ", format_number(record.total_crimes)), dim()));
    }
    if spans.is_empty() {
        spans.push(Span::styled("--", dim()));
    }
    let block = panel("Highest incidence", false);
    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_list(frame: &mut Frame, app: &App, projection: &Projection<'_>, area: Rect) {
    let title = format!("Bairros ({})", projection.list.len());
    let block = panel(&title, app.focus == Focus::List);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if projection.list.is_empty() {
        let term = app.state.search_term.trim();
        let message = if !term.is_empty() {
            format!("No bairro matches \"{term}\".")
        } else {
            "No information available.".to_string()
        };
        frame.render_widget(Paragraph::new(Span::styled(message, dim())), inner);
        return;
    }

    let selected = projection.selected_index();
    let window = list_window(projection.list.len(), selected, inner.height as usize);
    let count_width = 9;
    let name_width = (inner.width as usize).saturating_sub(count_width + 5);

    let lines: Vec<Line> = window
        .map(|idx| {
            let record = projection.list[idx];
            let text = format!(
                "{:>3}. {:<name_width$}{:>count_width$}",
                idx + 1,
                truncate_text(&record.bairro, name_width),
                format_number(record.total_crimes),
            );
            let style = if Some(idx) == selected {
                Style::default().fg(Color::Black).bg(Color::Cyan)
            } else {
                Style::default().fg(Color::White)
            };
            Line::from(Span::styled(text, style))
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_detail(frame: &mut Frame, app: &App, area: Rect) {
    let state = &app.state;
    let block = panel("Selected bairro", false);

    let record = state.detail.as_ref().or_else(|| state.selected_record());
    let Some(record) = record else {
        let paragraph = Paragraph::new(Span::styled("Select a bairro in the list or on the map.", dim()))
            .wrap(Wrap { trim: true })
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    };

    let status = match &state.inspect {
        ActionStatus::Idle => Span::styled("Enter: fetch latest figures", dim()),
        ActionStatus::Loading => Span::styled("Fetching...", Style::default().fg(Color::Yellow)),
        ActionStatus::Succeeded => Span::styled("Up to date", Style::default().fg(Color::Green)),
        ActionStatus::Failed(message) => Span::styled(message.clone(), Style::default().fg(Color::Red)),
    };

    let lines = vec![
        Line::from(Span::styled(
            record.bairro.clone(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::styled("Crimes: ", dim()),
            Span::raw(format_number(record.total_crimes)),
            Span::styled("  Loss: ", dim()),
            Span::raw(format_currency(record.prejuizo_total)),
        ]),
        Line::from(vec![
            Span::styled("Coordinates: ", dim()),
            Span::raw(format_coordinates(record.coordinates())),
        ]),
        Line::from(""),
        Line::from(status),
    ];
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let line = match &app.mode {
        InputMode::ConfirmClear => Line::from(Span::styled(
            " Delete ALL aggregated data on the server? Press y to confirm, any other key cancels.",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        InputMode::Search => Line::from(Span::styled(
            " Type to filter | ↑/↓:select Enter:done Esc:clear",
            dim(),
        )),
        InputMode::FilePrompt(_) => Line::from(Span::styled(" Type the path of a .csv file", dim())),
        InputMode::Normal => {
            let settings = &app.map_renderer.settings;
            let focus = match app.focus {
                Focus::Map => "map",
                Focus::List => "list",
            };
            let mut spans = vec![
                Span::styled(" Focus: ", dim()),
                Span::styled(focus, Style::default().fg(Color::Cyan)),
                Span::styled(" Zoom: ", dim()),
                Span::styled(app.zoom_level(), Style::default().fg(Color::Yellow)),
                Span::raw(" "),
            ];
            if app.map_renderer.has_basemap() {
                spans.push(Span::styled(
                    if settings.show_basemap { "[B]asemap " } else { "[b]asemap " },
                    Style::default().fg(if settings.show_basemap { Color::Green } else { Color::DarkGray }),
                ));
            }
            spans.push(Span::styled(
                if settings.show_labels { "[L]abels " } else { "[l]abels " },
                Style::default().fg(if settings.show_labels { Color::Green } else { Color::DarkGray }),
            ));
            spans.push(Span::styled(
                "| r:refresh f:file u:upload /:search Enter:inspect X:clear Tab:focus c:center q:quit",
                dim(),
            ));
            Line::from(spans)
        }
    };
    frame.render_widget(Paragraph::new(line), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::tests::record;
    use crate::derive::SelectionFallback;
    use crate::models::StatsSummary;
    use crate::state::{DashboardState, Snapshot};
    use ratatui::{backend::TestBackend, Terminal};

    fn screen(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|frame| render(frame, app)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        (0..buffer.area.height)
            .map(|y| {
                (0..buffer.area.width)
                    .map(|x| buffer[(x, y)].symbol().to_string())
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_list_window_scrolls_to_selection() {
        assert_eq!(list_window(10, None, 4), 0..4);
        assert_eq!(list_window(10, Some(3), 4), 0..4);
        assert_eq!(list_window(10, Some(6), 4), 3..7);
        assert_eq!(list_window(2, Some(1), 4), 0..2);
        assert_eq!(list_window(5, Some(2), 0), 0..0);
    }

    #[test]
    fn test_layout_inner_areas() {
        let areas = layout(Rect::new(0, 0, 120, 40));
        assert_eq!(areas.map_inner.x, areas.map.x + 1);
        assert_eq!(areas.list_inner.width, areas.list.width - 2);
        assert!(areas.map.width > areas.list.width);
    }

    #[test]
    fn test_empty_dashboard_shows_placeholders() {
        let app = App::new(
            DashboardState::new(SelectionFallback::FetchOrder),
            "http://localhost:5000/api",
            120,
            40,
        );
        let text = screen(&app);
        assert!(text.contains("--"));
        assert!(text.contains("Select an updated CSV file"));
    }

    #[test]
    fn test_dashboard_with_data() {
        let mut state = DashboardState::new(SelectionFallback::FetchOrder);
        state.apply_snapshot(Snapshot {
            aggregations: vec![
                record("Centro", 1234, Some((-8.06, -34.88))),
                record("Pina", 10, Some((-8.09, -34.88))),
            ],
            stats: Some(StatsSummary {
                total_crimes: 1244,
                total_prejuizo: 124_400.0,
                total_bairros: 2,
                bairro_mais_crimes: None,
            }),
        });
        let app = App::new(state, "http://localhost:5000/api", 120, 40);
        let text = screen(&app);
        assert!(text.contains("1.244"));
        assert!(text.contains("R$ 124.400"));
        assert!(text.contains("Bairros (2)"));
        assert!(text.contains("Centro"));
    }

    #[test]
    fn test_search_narrows_list_but_not_top() {
        let mut state = DashboardState::new(SelectionFallback::FetchOrder);
        state.apply_snapshot(Snapshot {
            aggregations: vec![
                record("Centro", 1234, Some((-8.06, -34.88))),
                record("Pina", 10, Some((-8.09, -34.88))),
                record("Boa Vista", 77, None),
            ],
            stats: None,
        });
        state.set_search_term("pin");
        let app = App::new(state, "http://localhost:5000/api", 120, 40);
        let text = screen(&app);
        assert!(text.contains("Bairros (1)"));
        assert!(text.contains("#1 Centro"));
        assert!(text.contains("#2 Boa Vista"));
    }
}
