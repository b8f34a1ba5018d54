use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::assignment::AssignmentKind;
use crate::clock::Clock;
use crate::config::{Config, ConfigError, DrillSettings};
use crate::grid::{Coordinate, GridSurface, Subscription, SurfaceEvent, SurfaceEventKind};
use crate::layout::{self, LayoutError, Planned};
use crate::queue::{AssignmentEvent, AssignmentState, EditOutcome};
use crate::util::{keys_per_minute, mean, std_dev};

/// Lower bound for the minutes denominator of keys-per-minute (100ms).
pub const MIN_ELAPSED_MINUTES: f64 = 0.1 / 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    NotStarted,
    Running,
    Finished,
    Aborted,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Finished | SessionStatus::Aborted)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub start_time: Option<Instant>,
    pub key_count: u64,
    pub completed: usize,
    pub total: usize,
    pub skipped: usize,
    /// Seconds each completed assignment took, measured from the previous one.
    pub completion_secs: Vec<f64>,
}

/// Final numbers of a session, handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionFinished {
    pub completed: usize,
    pub total: usize,
    pub skipped: usize,
    pub elapsed_seconds: f64,
    pub key_count: u64,
    pub keys_per_minute: f64,
    pub avg_secs_per_assignment: Option<f64>,
    /// Spread of the per-assignment times.
    pub std_dev_secs: Option<f64>,
    pub aborted: bool,
}

impl SessionFinished {
    pub fn is_complete(&self) -> bool {
        !self.aborted && self.completed == self.total
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Activated {
        id: usize,
        kind: AssignmentKind,
        at: Coordinate,
    },
    Instruction {
        id: usize,
        kind: AssignmentKind,
        text: &'static str,
    },
    Completed {
        id: usize,
        kind: AssignmentKind,
    },
    /// The marker was destroyed before it could be solved.
    Skipped {
        id: usize,
        kind: AssignmentKind,
        reason: String,
    },
    Warning(String),
    Finished(SessionFinished),
}

impl From<AssignmentEvent> for SessionEvent {
    fn from(ev: AssignmentEvent) -> Self {
        match ev {
            AssignmentEvent::Activated { id, kind, at } => SessionEvent::Activated { id, kind, at },
            AssignmentEvent::Instruction { id, kind, text } => {
                SessionEvent::Instruction { id, kind, text }
            }
            AssignmentEvent::Completed { id, kind } => SessionEvent::Completed { id, kind },
            AssignmentEvent::Skipped { id, kind, reason } => {
                SessionEvent::Skipped { id, kind, reason }
            }
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("a session is already running")]
    AlreadyRunning,
    #[error("this session has already ended")]
    Terminated,
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// One drill run: owns the statistics and the assignment queue.
#[derive(Debug)]
pub struct SessionTracker<C: Clock> {
    settings: DrillSettings,
    clock: C,
    status: SessionStatus,
    stats: SessionStats,
    state: Option<AssignmentState>,
    edits: Option<Subscription>,
    cursor_moves: Option<Subscription>,
    last_completion: Option<Instant>,
    result: Option<SessionFinished>,
    events: Vec<SessionEvent>,
}

impl<C: Clock> SessionTracker<C> {
    pub fn new(settings: DrillSettings, clock: C) -> Self {
        Self {
            settings,
            clock,
            status: SessionStatus::NotStarted,
            stats: SessionStats::default(),
            state: None,
            edits: None,
            cursor_moves: None,
            last_completion: None,
            result: None,
            events: Vec::new(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn result(&self) -> Option<&SessionFinished> {
        self.result.as_ref()
    }

    pub fn current_coordinate(&self, surface: &dyn GridSurface) -> Option<Coordinate> {
        self.state.as_ref()?.current_coordinate(surface)
    }

    pub fn current_kind(&self) -> Option<AssignmentKind> {
        self.state.as_ref()?.current().map(|a| a.kind)
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.collect_assignment_events();
        std::mem::take(&mut self.events)
    }

    /// Lay out the board and activate the first assignment.
    pub fn start(&mut self, surface: &mut dyn GridSurface) -> Result<(), SessionError> {
        self.ensure_startable()?;
        let plan = layout::generate(
            self.settings.board_width,
            self.settings.board_height,
            self.settings.assignment_count,
            &self.settings.pool,
        )?;
        self.start_with_plan(surface, plan)
    }

    /// Like [`SessionTracker::start`] with a layout chosen by the caller.
    pub fn start_with_plan(
        &mut self,
        surface: &mut dyn GridSurface,
        plan: Vec<Planned>,
    ) -> Result<(), SessionError> {
        self.ensure_startable()?;

        for warning in &self.settings.warnings {
            warn!(%warning, "configuration");
            self.events.push(SessionEvent::Warning(warning.clone()));
        }

        let now = self.clock.now();
        self.stats = SessionStats {
            start_time: Some(now),
            total: plan.len(),
            ..SessionStats::default()
        };
        self.last_completion = Some(now);
        self.edits = Some(surface.subscribe_edits());
        self.cursor_moves = Some(surface.subscribe_cursor_moves());
        self.status = SessionStatus::Running;
        info!(
            total = plan.len(),
            width = self.settings.board_width,
            height = self.settings.board_height,
            "session started"
        );

        let mut state = AssignmentState::new(plan, self.settings.board_width);
        state.activate_next(surface);
        self.state = Some(state);
        self.sync_counts();
        self.finish_if_exhausted(surface);
        Ok(())
    }

    fn ensure_startable(&self) -> Result<(), SessionError> {
        match self.status {
            SessionStatus::NotStarted => Ok(()),
            SessionStatus::Running => Err(SessionError::AlreadyRunning),
            SessionStatus::Finished | SessionStatus::Aborted => Err(SessionError::Terminated),
        }
    }

    pub fn record_keypress(&mut self) {
        if self.is_running() {
            self.stats.key_count += 1;
        }
    }

    /// Handle every notification the surface delivered since the last call, in
    /// delivery order.
    pub fn pump(&mut self, surface: &mut dyn GridSurface) {
        if !self.is_running() {
            return;
        }
        let mut pending: Vec<SurfaceEvent> = self
            .edits
            .iter()
            .chain(self.cursor_moves.iter())
            .flat_map(Subscription::drain)
            .collect();
        pending.sort_by_key(|ev| ev.seq);

        for ev in pending {
            if !self.is_running() {
                break;
            }
            match ev.kind {
                SurfaceEventKind::Edit => self.on_edit_notification(surface),
                SurfaceEventKind::CursorMoved(at) => self.on_cursor_notification(surface, at),
            }
        }
    }

    pub fn on_edit_notification(&mut self, surface: &mut dyn GridSurface) {
        if !self.is_running() {
            return;
        }
        let Some(state) = self.state.as_mut() else {
            return;
        };
        if let EditOutcome::Completed(id) = state.on_edit_notification(surface) {
            let now = self.clock.now();
            let since = self.last_completion.unwrap_or(now);
            let secs = now.duration_since(since).as_secs_f64();
            debug!(id, secs, "assignment solved");
            self.stats.completion_secs.push(secs);
            self.last_completion = Some(now);
        }
        self.sync_counts();
        self.finish_if_exhausted(surface);
    }

    pub fn on_cursor_notification(&mut self, surface: &dyn GridSurface, at: Coordinate) {
        if !self.is_running() {
            return;
        }
        if let Some(state) = self.state.as_mut() {
            state.on_cursor_notification(surface, at);
        }
        self.collect_assignment_events();
    }

    fn sync_counts(&mut self) {
        if let Some(state) = &self.state {
            debug_assert!(state.completed() >= self.stats.completed);
            self.stats.completed = state.completed();
            self.stats.skipped = state.skipped();
        }
        self.collect_assignment_events();
    }

    fn collect_assignment_events(&mut self) {
        if let Some(state) = self.state.as_mut() {
            self.events
                .extend(state.drain_events().into_iter().map(SessionEvent::from));
        }
    }

    fn finish_if_exhausted(&mut self, surface: &mut dyn GridSurface) {
        if self.state.as_ref().is_some_and(AssignmentState::is_exhausted) {
            self.finish(surface, false);
        }
    }

    /// End the session. Calling it again returns the same numbers and does
    /// nothing else.
    pub fn finish(&mut self, surface: &mut dyn GridSurface, aborted: bool) -> SessionFinished {
        if let Some(result) = &self.result {
            return result.clone();
        }

        let now = self.clock.now();
        let elapsed_seconds = self
            .stats
            .start_time
            .map_or(0.0, |start| now.duration_since(start).as_secs_f64());

        if let Some(state) = self.state.as_mut() {
            state.teardown(surface);
        }
        if let Some(sub) = self.edits.take() {
            sub.unsubscribe();
        }
        if let Some(sub) = self.cursor_moves.take() {
            sub.unsubscribe();
        }
        self.sync_counts();

        let result = SessionFinished {
            completed: self.stats.completed,
            total: self.stats.total,
            skipped: self.stats.skipped,
            elapsed_seconds,
            key_count: self.stats.key_count,
            keys_per_minute: keys_per_minute(self.stats.key_count, elapsed_seconds),
            avg_secs_per_assignment: mean(&self.stats.completion_secs),
            std_dev_secs: std_dev(&self.stats.completion_secs),
            aborted,
        };

        self.status = if aborted {
            SessionStatus::Aborted
        } else {
            SessionStatus::Finished
        };
        info!(
            completed = result.completed,
            total = result.total,
            elapsed = result.elapsed_seconds,
            keys = result.key_count,
            aborted,
            "session ended"
        );
        self.events.push(SessionEvent::Finished(result.clone()));
        self.result = Some(result.clone());
        result
    }
}

/// Identifies the session a [`SessionManager`] handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(u64);

/// Holds the one live session of the process.
#[derive(Debug)]
pub struct SessionManager<C: Clock + Clone> {
    clock: C,
    next_handle: u64,
    slot: Option<(SessionHandle, SessionTracker<C>)>,
}

impl<C: Clock + Clone> SessionManager<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            next_handle: 0,
            slot: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.session().is_some_and(SessionTracker::is_running)
    }

    pub fn session(&self) -> Option<&SessionTracker<C>> {
        self.slot.as_ref().map(|(_, t)| t)
    }

    pub fn session_mut(&mut self) -> Option<&mut SessionTracker<C>> {
        self.slot.as_mut().map(|(_, t)| t)
    }

    /// Validate `config` and start a new session. A running session is left
    /// untouched and reported as [`SessionError::AlreadyRunning`]; a finished
    /// one is replaced.
    pub fn start_session(
        &mut self,
        config: &Config,
        surface: &mut dyn GridSurface,
    ) -> Result<SessionHandle, SessionError> {
        self.start_with(config, surface, |tracker, surface| tracker.start(surface))
    }

    /// Like [`SessionManager::start_session`] with a fixed layout.
    pub fn start_session_with_plan(
        &mut self,
        config: &Config,
        surface: &mut dyn GridSurface,
        plan: Vec<Planned>,
    ) -> Result<SessionHandle, SessionError> {
        self.start_with(config, surface, |tracker, surface| {
            tracker.start_with_plan(surface, plan)
        })
    }

    fn start_with<F>(
        &mut self,
        config: &Config,
        surface: &mut dyn GridSurface,
        begin: F,
    ) -> Result<SessionHandle, SessionError>
    where
        F: FnOnce(&mut SessionTracker<C>, &mut dyn GridSurface) -> Result<(), SessionError>,
    {
        if self.is_running() {
            return Err(SessionError::AlreadyRunning);
        }
        let settings = config.validate()?;
        let mut tracker = SessionTracker::new(settings, self.clock.clone());
        begin(&mut tracker, surface)?;

        self.next_handle += 1;
        let handle = SessionHandle(self.next_handle);
        self.slot = Some((handle, tracker));
        Ok(handle)
    }

    /// Abort the session behind `handle`. Returns its final numbers, or `None`
    /// if the handle is stale.
    pub fn stop_session(
        &mut self,
        handle: SessionHandle,
        surface: &mut dyn GridSurface,
    ) -> Option<SessionFinished> {
        match self.slot.as_mut() {
            Some((live, tracker)) if *live == handle => Some(tracker.finish(surface, true)),
            _ => None,
        }
    }
}
