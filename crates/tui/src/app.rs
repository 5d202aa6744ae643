use crossterm::event::KeyCode;
use vizwire_core::{RetryScheduler, Route, Transport, VizClient};

/// Navigation state of the terminal dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct App {
    pub route: Route,
    /// Highlighted row on the dashboard.
    pub selected: usize,
    pub quit: bool,
}

impl App {
    pub fn new(route: Route) -> Self {
        let selected = match route {
            Route::Record(index) => index,
            _ => 0,
        };
        Self {
            route,
            selected,
            quit: false,
        }
    }

    pub fn handle_key<T: Transport, S: RetryScheduler>(
        &mut self,
        key: KeyCode,
        client: &mut VizClient<T, S>,
    ) {
        let len = client.records().len();
        match key {
            KeyCode::Char('q') => self.quit = true,
            KeyCode::Char('c') => {
                client.clear();
                self.selected = 0;
            }
            KeyCode::Char('r') => client.reconnect(),
            KeyCode::Char('d') => self.route = Route::Dashboard,
            _ => match self.route {
                Route::Dashboard => self.dashboard_key(key, len),
                Route::Record(index) => self.record_key(key, index, len),
                Route::InvalidRecord(_) => {
                    if matches!(key, KeyCode::Esc | KeyCode::Backspace) {
                        self.route = Route::Dashboard;
                    }
                }
            },
        }
    }

    fn dashboard_key(&mut self, key: KeyCode, len: usize) {
        match key {
            KeyCode::Up => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down => {
                if self.selected + 1 < len {
                    self.selected += 1;
                }
            }
            KeyCode::Home => self.selected = 0,
            KeyCode::End => self.selected = len.saturating_sub(1),
            KeyCode::Enter if self.selected < len => {
                self.route = Route::Record(self.selected);
            }
            _ => {}
        }
    }

    fn record_key(&mut self, key: KeyCode, index: usize, len: usize) {
        match key {
            KeyCode::Esc | KeyCode::Backspace => {
                self.selected = index.min(len.saturating_sub(1));
                self.route = Route::Dashboard;
            }
            KeyCode::Left if index > 0 => self.route = Route::Record(index - 1),
            KeyCode::Right if index + 1 < len => self.route = Route::Record(index + 1),
            _ => {}
        }
    }

    /// Keep the dashboard highlight inside the record list after a clear.
    pub fn clamp_selection(&mut self, len: usize) {
        self.selected = self.selected.min(len.saturating_sub(1));
    }
}
