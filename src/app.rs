use std::path::Path;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::{Position, Rect};

use crate::controller::Command;
use crate::map::{marker_at, MapRenderer, Viewport, CITY_ZOOM};
use crate::state::DashboardState;
use crate::ui;

/// Which panel receives navigation keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Map,
    List,
}

/// What typed characters do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    /// Typing edits the search term
    Search,
    /// Typing a CSV path
    FilePrompt(String),
    /// Waiting for `y` before clearing all data
    ConfirmClear,
}

/// Application state
pub struct App {
    pub state: DashboardState,
    pub viewport: Viewport,
    pub map_renderer: MapRenderer,
    pub focus: Focus,
    pub mode: InputMode,
    pub should_quit: bool,
    /// Shown in the header
    pub api_url: String,
    /// Terminal area
    area: Rect,
    /// Last mouse position for drag tracking
    pub last_mouse: Option<(u16, u16)>,
    dragged: bool,
    /// Map center the viewport last followed
    view_center: Option<(f64, f64)>,
    fitted: bool,
}

impl App {
    pub fn new(state: DashboardState, api_url: impl Into<String>, width: u16, height: u16) -> Self {
        let mut app = Self {
            state,
            viewport: Viewport::new(0.0, 0.0, CITY_ZOOM, 0, 0),
            map_renderer: MapRenderer::new(),
            focus: Focus::List,
            mode: InputMode::Normal,
            should_quit: false,
            api_url: api_url.into(),
            area: Rect::new(0, 0, width, height),
            last_mouse: None,
            dragged: false,
            view_center: None,
            fitted: false,
        };
        app.resize(width, height);
        app.sync_view();
        app
    }

    /// Update viewport size when terminal resizes
    pub fn resize(&mut self, width: u16, height: u16) {
        self.area = Rect::new(0, 0, width, height);
        let map = ui::layout(self.area).map_inner;
        // Braille gives 2x4 resolution per character
        self.viewport.width = map.width as usize * 2;
        self.viewport.height = map.height as usize * 4;
    }

    /// Follow the derived map center. The first time markers are available
    /// the zoom is fitted to them; afterwards only the center moves.
    pub fn sync_view(&mut self) {
        let (center, points) = {
            let projection = self.state.projection();
            let points: Vec<(f64, f64)> = projection.markers.iter().map(|m| (m.lat, m.lon)).collect();
            (projection.center, points)
        };

        if !self.fitted && !points.is_empty() {
            self.fit(center, &points);
            self.fitted = true;
        } else if self.view_center != Some(center) {
            self.viewport.center_lat = center.0;
            self.viewport.center_lon = center.1;
        }
        self.view_center = Some(center);
    }

    /// Zoom to fit every marker around the derived center
    pub fn recenter(&mut self) {
        let (center, points) = {
            let projection = self.state.projection();
            let points: Vec<(f64, f64)> = projection.markers.iter().map(|m| (m.lat, m.lon)).collect();
            (projection.center, points)
        };
        self.fit(center, &points);
        self.view_center = Some(center);
    }

    fn fit(&mut self, center: (f64, f64), points: &[(f64, f64)]) {
        self.viewport = Viewport::fitting(center, points, self.viewport.width, self.viewport.height);
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Map => Focus::List,
            Focus::List => Focus::Map,
        };
    }

    /// Get current zoom level as a string
    pub fn zoom_level(&self) -> String {
        format!("{:.0}x", self.viewport.zoom)
    }

    /// Handle a key press. Returns the action to dispatch, if any.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Command> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.quit();
            return None;
        }

        match &mut self.mode {
            InputMode::Normal => self.handle_normal_key(key),
            InputMode::Search => {
                match key.code {
                    KeyCode::Enter => self.mode = InputMode::Normal,
                    KeyCode::Esc => {
                        self.state.set_search_term("");
                        self.mode = InputMode::Normal;
                    }
                    KeyCode::Backspace => {
                        let mut term = self.state.search_term.clone();
                        term.pop();
                        self.state.set_search_term(term);
                    }
                    KeyCode::Up => {
                        self.state.select_relative(-1);
                    }
                    KeyCode::Down => {
                        self.state.select_relative(1);
                    }
                    KeyCode::Char(c) => {
                        let term = format!("{}{c}", self.state.search_term);
                        self.state.set_search_term(term);
                    }
                    _ => {}
                }
                None
            }
            InputMode::FilePrompt(input) => {
                match key.code {
                    KeyCode::Esc => self.mode = InputMode::Normal,
                    KeyCode::Backspace => {
                        input.pop();
                    }
                    KeyCode::Char(c) => input.push(c),
                    KeyCode::Enter => {
                        let path = input.trim().to_string();
                        self.mode = InputMode::Normal;
                        if !path.is_empty() {
                            // Rejection is reported through the upload feedback
                            let _ = self.state.choose_file(Path::new(&path));
                        }
                    }
                    _ => {}
                }
                None
            }
            InputMode::ConfirmClear => {
                self.mode = InputMode::Normal;
                match key.code {
                    KeyCode::Char('y') | KeyCode::Char('Y') => Some(Command::Clear),
                    _ => None,
                }
            }
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Option<Command> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.quit(),

            KeyCode::Char('r') => return Some(Command::Refresh),
            KeyCode::Char('u') => return Some(Command::Upload),
            KeyCode::Enter => return Some(Command::Inspect),
            KeyCode::Char('f') => {
                let current = self
                    .state
                    .selected_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                self.mode = InputMode::FilePrompt(current);
            }
            KeyCode::Char('/') => {
                self.focus = Focus::List;
                self.mode = InputMode::Search;
            }
            KeyCode::Char('X') => self.mode = InputMode::ConfirmClear,
            KeyCode::Tab => self.toggle_focus(),

            KeyCode::Char('c') => self.recenter(),
            KeyCode::Char('+') | KeyCode::Char('=') => self.viewport.zoom_in(),
            KeyCode::Char('-') | KeyCode::Char('_') => self.viewport.zoom_out(),
            KeyCode::Char('b') => self.map_renderer.toggle_basemap(),
            KeyCode::Char('L') => self.map_renderer.toggle_labels(),

            KeyCode::Up | KeyCode::Char('k') => match self.focus {
                Focus::List => {
                    self.state.select_relative(-1);
                }
                Focus::Map => self.viewport.pan(0, -6),
            },
            KeyCode::Down | KeyCode::Char('j') => match self.focus {
                Focus::List => {
                    self.state.select_relative(1);
                }
                Focus::Map => self.viewport.pan(0, 6),
            },
            KeyCode::Left | KeyCode::Char('h') if self.focus == Focus::Map => self.viewport.pan(-10, 0),
            KeyCode::Right | KeyCode::Char('l') if self.focus == Focus::Map => self.viewport.pan(10, 0),
            _ => {}
        }
        None
    }

    /// Handle mouse events: wheel zoom, drag to pan, click to select
    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        let areas = ui::layout(self.area);
        let pos = Position::new(mouse.column, mouse.row);
        let in_map = areas.map_inner.contains(pos);
        let in_list = areas.list_inner.contains(pos);

        match mouse.kind {
            MouseEventKind::ScrollUp if in_map => {
                let (px, py) = map_pixel(areas.map_inner, pos);
                self.viewport.zoom_in_at(px, py);
            }
            MouseEventKind::ScrollDown if in_map => {
                let (px, py) = map_pixel(areas.map_inner, pos);
                self.viewport.zoom_out_at(px, py);
            }
            MouseEventKind::ScrollUp if in_list => {
                self.state.select_relative(-1);
            }
            MouseEventKind::ScrollDown if in_list => {
                self.state.select_relative(1);
            }
            MouseEventKind::Down(MouseButton::Left) => {
                if in_map {
                    self.focus = Focus::Map;
                    self.last_mouse = Some((mouse.column, mouse.row));
                } else if in_list {
                    self.focus = Focus::List;
                }
                self.dragged = false;
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                if let Some((last_x, last_y)) = self.last_mouse {
                    let dx = last_x as i32 - mouse.column as i32;
                    let dy = last_y as i32 - mouse.row as i32;
                    self.viewport.pan(dx * 2, dy * 4);
                    self.dragged = true;
                }
                self.last_mouse = Some((mouse.column, mouse.row));
            }
            MouseEventKind::Up(MouseButton::Left) => {
                if !self.dragged {
                    if in_map {
                        self.click_map(areas.map_inner, pos);
                    } else if in_list {
                        self.click_list(areas.list_inner, pos);
                    }
                }
                self.last_mouse = None;
                self.dragged = false;
            }
            _ => {}
        }
    }

    fn click_map(&mut self, map: Rect, pos: Position) {
        let (px, py) = map_pixel(map, pos);
        let hit = {
            let projection = self.state.projection();
            marker_at(&projection.markers, &self.viewport, px, py).map(str::to_string)
        };
        if let Some(name) = hit {
            self.state.select(&name);
        }
    }

    fn click_list(&mut self, list: Rect, pos: Position) {
        let hit = {
            let projection = self.state.projection();
            let window = ui::list_window(projection.list.len(), projection.selected_index(), list.height as usize);
            let row = window.start + (pos.y - list.y) as usize;
            window
                .contains(&row)
                .then(|| projection.list[row].bairro.clone())
        };
        if let Some(name) = hit {
            self.state.select(&name);
        }
    }
}

/// Terminal cell to braille pixel (cell center)
fn map_pixel(map: Rect, pos: Position) -> (i32, i32) {
    let px = (pos.x - map.x) as i32 * 2 + 1;
    let py = (pos.y - map.y) as i32 * 4 + 2;
    (px, py)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::tests::record;
    use crate::derive::SelectionFallback;
    use crate::state::{FeedbackKind, Snapshot};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn click(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    fn app_with(names: &[(&str, u64)]) -> App {
        let mut state = DashboardState::new(SelectionFallback::FetchOrder);
        state.apply_snapshot(Snapshot {
            aggregations: names
                .iter()
                .enumerate()
                .map(|(i, (n, total))| record(n, *total, Some((-8.0 - i as f64 * 0.02, -34.9))))
                .collect(),
            stats: None,
        });
        App::new(state, "http://localhost:5000/api", 120, 40)
    }

    #[test]
    fn test_action_keys() {
        let mut app = app_with(&[]);
        assert_eq!(app.handle_key(key(KeyCode::Char('r'))), Some(Command::Refresh));
        assert_eq!(app.handle_key(key(KeyCode::Char('u'))), Some(Command::Upload));
        assert_eq!(app.handle_key(key(KeyCode::Enter)), Some(Command::Inspect));
        app.handle_key(key(KeyCode::Char('q')));
        assert!(app.should_quit);
    }

    #[test]
    fn test_clear_needs_confirmation() {
        let mut app = app_with(&[("Centro", 3)]);
        assert_eq!(app.handle_key(key(KeyCode::Char('X'))), None);
        assert_eq!(app.mode, InputMode::ConfirmClear);
        assert_eq!(app.handle_key(key(KeyCode::Char('n'))), None);
        assert_eq!(app.mode, InputMode::Normal);

        app.handle_key(key(KeyCode::Char('X')));
        assert_eq!(app.handle_key(key(KeyCode::Char('y'))), Some(Command::Clear));
    }

    #[test]
    fn test_search_mode_edits_term() {
        let mut app = app_with(&[("Boa Viagem", 3), ("Centro", 5)]);
        app.handle_key(key(KeyCode::Char('/')));
        for c in "boax".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::Backspace));
        assert_eq!(app.state.search_term, "boa");
        // 'r' is text while searching
        assert_eq!(app.handle_key(key(KeyCode::Char('r'))), None);
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.mode, InputMode::Normal);
        assert_eq!(app.state.search_term, "boar");

        app.handle_key(key(KeyCode::Char('/')));
        app.handle_key(key(KeyCode::Esc));
        assert_eq!(app.state.search_term, "");
    }

    #[test]
    fn test_file_prompt_rejects_missing_file() {
        let mut app = app_with(&[]);
        app.handle_key(key(KeyCode::Char('f')));
        for c in "/nonexistent/dados.csv".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.mode, InputMode::Normal);
        assert!(app.state.selected_file.is_none());
        assert_eq!(
            app.state.upload_feedback.as_ref().map(|f| f.kind),
            Some(FeedbackKind::Error)
        );
    }

    #[test]
    fn test_arrows_follow_focus() {
        let mut app = app_with(&[("A", 1), ("B", 5)]);
        assert_eq!(app.state.selected_name(), Some("A"));
        app.handle_key(key(KeyCode::Up));
        assert_eq!(app.state.selected_name(), Some("B"));

        app.handle_key(key(KeyCode::Tab));
        assert_eq!(app.focus, Focus::Map);
        let lon = app.viewport.center_lon;
        app.handle_key(key(KeyCode::Right));
        assert!(app.viewport.center_lon > lon);
        app.handle_key(key(KeyCode::Down));
        assert_eq!(app.state.selected_name(), Some("B"));
    }

    #[test]
    fn test_view_follows_selection() {
        let mut app = app_with(&[("A", 1), ("B", 5)]);
        assert!((app.viewport.center_lat + 8.0).abs() < 1e-9);
        app.state.select("B");
        app.sync_view();
        assert!((app.viewport.center_lat + 8.02).abs() < 1e-9);
    }

    #[test]
    fn test_click_list_row_selects() {
        let mut app = app_with(&[("A", 1), ("B", 5), ("C", 3)]);
        let list = ui::layout(Rect::new(0, 0, 120, 40)).list_inner;
        // Ranked: B, C, A
        app.handle_mouse(click(MouseEventKind::Down(MouseButton::Left), list.x + 2, list.y + 1));
        app.handle_mouse(click(MouseEventKind::Up(MouseButton::Left), list.x + 2, list.y + 1));
        assert_eq!(app.state.selected_name(), Some("C"));
        assert_eq!(app.focus, Focus::List);
    }

    #[test]
    fn test_click_marker_selects() {
        let mut app = app_with(&[("A", 1), ("B", 5)]);
        let map = ui::layout(Rect::new(0, 0, 120, 40)).map_inner;
        let (px, py) = app.viewport.project(-8.02, -34.9);
        let (col, row) = (map.x + (px / 2) as u16, map.y + (py / 4) as u16);
        app.handle_mouse(click(MouseEventKind::Down(MouseButton::Left), col, row));
        app.handle_mouse(click(MouseEventKind::Up(MouseButton::Left), col, row));
        assert_eq!(app.state.selected_name(), Some("B"));
        assert_eq!(app.focus, Focus::Map);
    }

    #[test]
    fn test_drag_pans_without_selecting() {
        let mut app = app_with(&[("A", 1), ("B", 5)]);
        let map = ui::layout(Rect::new(0, 0, 120, 40)).map_inner;
        let (col, row) = (map.x + 5, map.y + 5);
        let lon = app.viewport.center_lon;
        app.handle_mouse(click(MouseEventKind::Down(MouseButton::Left), col, row));
        app.handle_mouse(click(MouseEventKind::Drag(MouseButton::Left), col - 3, row));
        app.handle_mouse(click(MouseEventKind::Up(MouseButton::Left), col - 3, row));
        assert!(app.viewport.center_lon > lon);
        assert_eq!(app.state.selected_name(), Some("A"));
    }
}
