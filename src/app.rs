use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::warn;

use crate::assignment::AssignmentKind;
use crate::clock::{Clock, MonotonicClock};
use crate::config::Config;
use crate::editor::{Editor, Mode};
use crate::grid::{Coordinate, MemoryGrid};
use crate::history::{HistoryDb, HistoryEntry};
use crate::layout::Planned;
use crate::session::{
    SessionError, SessionEvent, SessionFinished, SessionHandle, SessionManager, SessionTracker,
};

/// Put into the register when a paste assignment comes up, so `p` has
/// something to put.
const PASTE_TEXT: &str = "+";

/// How many earlier runs the results screen lists.
const RECENT_RUNS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Drilling,
    Results,
}

/// Everything the terminal front end shows and drives.
#[derive(Debug)]
pub struct App<C: Clock + Clone = MonotonicClock> {
    pub config: Config,
    pub grid: MemoryGrid,
    pub editor: Editor,
    pub state: AppState,
    /// Instruction or notice shown under the board.
    pub message: Option<String>,
    pub result: Option<SessionFinished>,
    /// Best earlier time for the same number of assignments.
    pub best_time: Option<f64>,
    /// Latest runs from the history, newest first.
    pub recent: Vec<HistoryEntry>,
    pub should_quit: bool,
    manager: SessionManager<C>,
    handle: Option<SessionHandle>,
    history: Option<HistoryDb>,
    started_at: Option<std::time::Instant>,
    clock: C,
}

impl<C: Clock + Clone> App<C> {
    pub fn new(config: Config, clock: C, history: Option<HistoryDb>) -> Result<Self, SessionError> {
        let mut app = Self {
            grid: MemoryGrid::new(config.board_width, config.board_height),
            config,
            editor: Editor::new(),
            state: AppState::Drilling,
            message: None,
            result: None,
            best_time: None,
            recent: Vec::new(),
            should_quit: false,
            manager: SessionManager::new(clock.clone()),
            handle: None,
            history,
            started_at: None,
            clock,
        };
        app.start()?;
        Ok(app)
    }

    fn start(&mut self) -> Result<(), SessionError> {
        self.begin(None)
    }

    fn begin(&mut self, plan: Option<Vec<Planned>>) -> Result<(), SessionError> {
        self.grid = MemoryGrid::new(self.config.board_width, self.config.board_height);
        self.editor = Editor::new();
        let handle = match plan {
            Some(plan) => self
                .manager
                .start_session_with_plan(&self.config, &mut self.grid, plan)?,
            None => self.manager.start_session(&self.config, &mut self.grid)?,
        };
        self.handle = Some(handle);
        self.state = AppState::Drilling;
        self.message = None;
        self.result = None;
        self.started_at = Some(self.clock.now());
        self.process_events();
        Ok(())
    }

    pub fn session(&self) -> Option<&SessionTracker<C>> {
        self.manager.session()
    }

    pub fn marker(&self) -> Option<Coordinate> {
        self.session()?.current_coordinate(&self.grid)
    }

    /// What the live marker asks for.
    pub fn current_kind(&self) -> Option<AssignmentKind> {
        self.session()?.current_kind()
    }

    pub fn elapsed_secs(&self) -> f64 {
        match (&self.result, self.started_at) {
            (Some(result), _) => result.elapsed_seconds,
            (None, Some(start)) => self.clock.now().duration_since(start).as_secs_f64(),
            (None, None) => 0.0,
        }
    }

    pub fn on_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.stop();
            self.should_quit = true;
            return;
        }

        match self.state {
            AppState::Drilling => self.on_drill_key(key),
            AppState::Results => match key.code {
                KeyCode::Char('r') => {
                    if let Err(err) = self.start() {
                        self.message = Some(err.to_string());
                    }
                }
                KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
                _ => {}
            },
        }
    }

    fn on_drill_key(&mut self, key: KeyEvent) {
        if self.editor.mode() == Mode::Normal
            && !self.editor.awaiting_operand()
            && key.code == KeyCode::Char('q')
        {
            self.stop();
            return;
        }

        if let Some(tracker) = self.manager.session_mut() {
            tracker.record_keypress();
        }
        self.editor.handle_key(&mut self.grid, key);
        if let Some(tracker) = self.manager.session_mut() {
            tracker.pump(&mut self.grid);
        }
        self.process_events();
    }

    /// Abort the running session, if any.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle {
            if self.manager.is_running() {
                self.manager.stop_session(handle, &mut self.grid);
            }
        }
        self.process_events();
    }

    fn process_events(&mut self) {
        let events = match self.manager.session_mut() {
            Some(tracker) => tracker.drain_events(),
            None => return,
        };
        for ev in events {
            match ev {
                SessionEvent::Instruction { text, .. } => self.message = Some(text.to_string()),
                // markers and cleanups rewrite the grid behind the editor's back
                SessionEvent::Activated { kind, .. } => {
                    self.editor.forget_history();
                    if kind == AssignmentKind::Paste {
                        self.editor.offer_paste_text(PASTE_TEXT);
                    }
                    self.message = None;
                }
                SessionEvent::Completed { .. } => {
                    self.editor.forget_history();
                    self.message = None;
                }
                SessionEvent::Skipped { id, .. } => {
                    self.message = Some(format!("assignment {id} was wiped out, moving on"))
                }
                SessionEvent::Warning(warning) => self.message = Some(warning),
                SessionEvent::Finished(result) => self.on_finished(result),
            }
        }
    }

    fn on_finished(&mut self, result: SessionFinished) {
        if let Some(db) = &self.history {
            self.best_time = db.best_time(result.total).unwrap_or_else(|err| {
                warn!(error = %err, "could not read history");
                None
            });
            if let Err(err) = db.record(&result) {
                warn!(error = %err, "could not record session");
            }
            self.recent = db.recent(RECENT_RUNS).unwrap_or_else(|err| {
                warn!(error = %err, "could not read history");
                Vec::new()
            });
        }
        self.result = Some(result);
        self.state = AppState::Results;
    }
}
