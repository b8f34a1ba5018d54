use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::anchor::AnchoredPosition;
use crate::assignment::{AssignmentKind, CellView, Progress};
use crate::grid::{Coordinate, GridSurface, SurfaceError};
use crate::layout::Planned;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing current, assignments still queued.
    Idle,
    Spawning,
    AwaitingCompletion,
    Completing,
    /// Queue empty and nothing current.
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub id: usize,
    pub kind: AssignmentKind,
    pub planned: Coordinate,
    pub done: bool,
    pub instruction_shown: bool,
    progress: Progress,
}

impl Assignment {
    fn new(id: usize, planned: Planned) -> Self {
        Self {
            id,
            kind: planned.kind,
            planned: planned.at,
            done: false,
            instruction_shown: false,
            progress: Progress::default(),
        }
    }
}

#[derive(Debug)]
struct Live {
    assignment: Assignment,
    anchor: AnchoredPosition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentEvent {
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
    Skipped {
        id: usize,
        kind: AssignmentKind,
        reason: String,
    },
}

/// Result of handling one edit notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Ignored,
    Pending,
    Completed(usize),
    Skipped(usize),
}

/// The assignment queue and the single live assignment.
#[derive(Debug)]
pub struct AssignmentState {
    queue: VecDeque<Assignment>,
    current: Option<Live>,
    total: usize,
    completed: usize,
    skipped: usize,
    board_width: usize,
    phase: Phase,
    events: Vec<AssignmentEvent>,
}

impl AssignmentState {
    pub fn new(plan: Vec<Planned>, board_width: usize) -> Self {
        let queue: VecDeque<Assignment> = plan
            .into_iter()
            .enumerate()
            .map(|(idx, p)| Assignment::new(idx + 1, p))
            .collect();
        let phase = if queue.is_empty() {
            Phase::Exhausted
        } else {
            Phase::Idle
        };
        Self {
            total: queue.len(),
            queue,
            current: None,
            completed: 0,
            skipped: 0,
            board_width,
            phase,
            events: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn current(&self) -> Option<&Assignment> {
        self.current.as_ref().map(|l| &l.assignment)
    }

    /// Where the live marker is now, if there is one and it still exists.
    pub fn current_coordinate(&self, surface: &dyn GridSurface) -> Option<Coordinate> {
        self.current
            .as_ref()
            .and_then(|l| l.anchor.current_coordinate(surface).ok())
    }

    pub fn is_exhausted(&self) -> bool {
        self.phase == Phase::Exhausted
    }

    pub fn drain_events(&mut self) -> Vec<AssignmentEvent> {
        std::mem::take(&mut self.events)
    }

    /// Make the head of the queue current. Assignments that cannot be placed
    /// are skipped. Returns false once the queue is empty.
    pub fn activate_next(&mut self, surface: &mut dyn GridSurface) -> bool {
        assert!(
            self.current.is_none(),
            "activate_next while assignment {:?} is current",
            self.current().map(|a| a.id)
        );

        while let Some(next) = self.queue.pop_front() {
            self.phase = Phase::Spawning;
            match self.spawn(surface, &next) {
                Ok((anchor, at)) => {
                    debug!(id = next.id, kind = %next.kind, %at, "assignment activated");
                    self.events.push(AssignmentEvent::Activated {
                        id: next.id,
                        kind: next.kind,
                        at,
                    });
                    self.current = Some(Live {
                        assignment: next,
                        anchor,
                    });
                    self.phase = Phase::AwaitingCompletion;
                    return true;
                }
                Err(err) => {
                    warn!(id = next.id, error = %err, "could not place assignment, skipping");
                    self.skip(next, err.to_string());
                }
            }
        }

        self.phase = Phase::Exhausted;
        false
    }

    fn spawn(
        &self,
        surface: &mut dyn GridSurface,
        next: &Assignment,
    ) -> Result<(AnchoredPosition, Coordinate), SurfaceError> {
        let line_count = surface.line_count();
        if line_count == 0 {
            return Err(SurfaceError::RowOutOfBounds {
                row: next.planned.row,
                line_count,
            });
        }
        // lines may have been removed since the layout was drawn
        let at = Coordinate::new(next.planned.row.min(line_count), next.planned.col);
        next.kind
            .descriptor()
            .write_marker(surface, at, self.board_width)?;
        let anchor = AnchoredPosition::new(surface, at)?;
        Ok((anchor, at))
    }

    fn skip(&mut self, assignment: Assignment, reason: String) {
        self.skipped += 1;
        self.events.push(AssignmentEvent::Skipped {
            id: assignment.id,
            kind: assignment.kind,
            reason,
        });
    }

    /// Re-evaluate the live assignment after the surface changed.
    pub fn on_edit_notification(&mut self, surface: &mut dyn GridSurface) -> EditOutcome {
        let Some(live) = self.current.as_mut() else {
            return EditOutcome::Ignored;
        };
        if live.assignment.done {
            return EditOutcome::Ignored;
        }

        let at = match live.anchor.current_coordinate(surface) {
            Ok(at) => at,
            Err(err) => {
                let Some(mut live) = self.current.take() else {
                    unreachable!("live assignment vanished during evaluation");
                };
                let id = live.assignment.id;
                live.anchor.release(surface);
                warn!(id, error = %err, "marker lost, skipping assignment");
                self.skip(live.assignment, err.to_string());
                self.activate_next(surface);
                return EditOutcome::Skipped(id);
            }
        };

        let descriptor = live.assignment.kind.descriptor();
        let satisfied = CellView::observe(surface, at)
            .is_some_and(|view| (descriptor.is_complete)(&view, &mut live.assignment.progress));
        if !satisfied {
            return EditOutcome::Pending;
        }

        self.phase = Phase::Completing;
        let Some(mut live) = self.current.take() else {
            unreachable!("live assignment vanished during completion");
        };
        live.assignment.done = true;
        let id = live.assignment.id;
        if let Err(err) = (descriptor.cleanup)(surface, at, self.board_width) {
            warn!(id, error = %err, "cleanup failed");
        }
        live.anchor.release(surface);
        self.completed += 1;
        debug_assert!(self.completed + self.skipped <= self.total);
        debug!(id, completed = self.completed, total = self.total, "assignment completed");
        self.events.push(AssignmentEvent::Completed {
            id,
            kind: live.assignment.kind,
        });

        self.activate_next(surface);
        EditOutcome::Completed(id)
    }

    /// Show the instruction the first time the cursor lands on the live marker.
    pub fn on_cursor_notification(
        &mut self,
        surface: &dyn GridSurface,
        cursor: Coordinate,
    ) -> Option<&'static str> {
        let live = self.current.as_mut()?;
        if live.assignment.instruction_shown {
            return None;
        }
        if live.anchor.current_coordinate(surface).ok()? != cursor {
            return None;
        }

        live.assignment.instruction_shown = true;
        let text = live.assignment.kind.descriptor().instruction;
        self.events.push(AssignmentEvent::Instruction {
            id: live.assignment.id,
            kind: live.assignment.kind,
            text,
        });
        Some(text)
    }

    /// Drop the live assignment without counting it. The marker stays on the
    /// grid.
    pub fn teardown(&mut self, surface: &mut dyn GridSurface) {
        if let Some(mut live) = self.current.take() {
            live.anchor.release(surface);
        }
        self.phase = if self.queue.is_empty() {
            Phase::Exhausted
        } else {
            Phase::Idle
        };
    }
}
