use std::collections::HashMap;
use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};

use thiserror::Error;

/// Character occupying every cell that holds nothing.
pub const FILLER: char = ' ';

/// 1-based grid position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coordinate {
    pub row: usize,
    pub col: usize,
}

impl Coordinate {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.col)
    }
}

impl From<(usize, usize)> for Coordinate {
    fn from(v: (usize, usize)) -> Self {
        Coordinate { row: v.0, col: v.1 }
    }
}

/// Handle to a tracked position owned by a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnchorId(u64);

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("row {row} is outside the grid ({line_count} lines)")]
    RowOutOfBounds { row: usize, line_count: usize },
    #[error("column {col} is outside line {row} ({len} characters)")]
    ColumnOutOfBounds { row: usize, col: usize, len: usize },
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AnchorError {
    #[error("anchor {0} was invalidated by an edit")]
    Invalidated(AnchorId),
    #[error("anchor {0} is not registered")]
    Unknown(AnchorId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEventKind {
    Edit,
    CursorMoved(Coordinate),
}

/// A notification from the surface. `seq` increases across all subscriptions of
/// one surface so edit and cursor notifications can be merged back into order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceEvent {
    pub seq: u64,
    pub kind: SurfaceEventKind,
}

/// Receiving end of a surface subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    rx: Receiver<SurfaceEvent>,
}

impl Subscription {
    /// Create a subscription together with the sender a surface should keep.
    pub fn channel() -> (Sender<SurfaceEvent>, Subscription) {
        let (tx, rx) = mpsc::channel();
        (tx, Subscription { rx })
    }

    /// All notifications delivered so far, without blocking.
    pub fn drain(&self) -> Vec<SurfaceEvent> {
        self.rx.try_iter().collect()
    }

    pub fn unsubscribe(self) {}
}

/// The capabilities the drill needs from whatever owns the text.
pub trait GridSurface {
    fn line_count(&self) -> usize;

    fn read_line(&self, row: usize) -> Option<String>;

    fn write_line(&mut self, row: usize, text: &str) -> Result<(), SurfaceError>;

    fn remove_line(&mut self, row: usize) -> Result<(), SurfaceError>;

    /// Start tracking `at`. Must not modify any line.
    fn create_anchor(&mut self, at: Coordinate) -> Result<AnchorId, SurfaceError>;

    fn dereference(&self, id: AnchorId) -> Result<Coordinate, AnchorError>;

    /// Stop tracking `id`. Releasing an unknown id does nothing.
    fn release(&mut self, id: AnchorId);

    fn subscribe_edits(&mut self) -> Subscription;

    fn subscribe_cursor_moves(&mut self) -> Subscription;

    /// Character at `at`; cells past the end of a line read as filler.
    fn cell(&self, at: Coordinate) -> Option<char> {
        let line = self.read_line(at.row)?;
        Some(
            at.col
                .checked_sub(1)
                .and_then(|idx| line.chars().nth(idx))
                .unwrap_or(FILLER),
        )
    }
}

/// Primitive mutation of a [`MemoryGrid`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    InsertChar { at: Coordinate, ch: char },
    DeleteChar { at: Coordinate },
    ReplaceChar { at: Coordinate, ch: char },
    InsertLine { row: usize, text: String },
    RemoveLine { row: usize },
    SetLine { row: usize, text: String },
}

#[derive(Debug, Clone, Copy)]
struct AnchorSlot {
    at: Coordinate,
    valid: bool,
}

#[derive(Debug, Default)]
struct Subscribers {
    seq: u64,
    edits: Vec<Sender<SurfaceEvent>>,
    cursor: Vec<Sender<SurfaceEvent>>,
}

impl Subscribers {
    fn next_event(&mut self, kind: SurfaceEventKind) -> SurfaceEvent {
        self.seq += 1;
        SurfaceEvent {
            seq: self.seq,
            kind,
        }
    }

    fn notify_edit(&mut self) {
        let ev = self.next_event(SurfaceEventKind::Edit);
        self.edits.retain(|tx| tx.send(ev).is_ok());
    }

    fn notify_cursor(&mut self, at: Coordinate) {
        let ev = self.next_event(SurfaceEventKind::CursorMoved(at));
        self.cursor.retain(|tx| tx.send(ev).is_ok());
    }
}

/// In-memory text surface with edit-tracking anchors.
#[derive(Debug)]
pub struct MemoryGrid {
    lines: Vec<Vec<char>>,
    anchors: HashMap<AnchorId, AnchorSlot>,
    next_anchor: u64,
    cursor: Coordinate,
    subscribers: Subscribers,
}

impl MemoryGrid {
    /// `height` lines of `width` filler characters.
    pub fn new(width: usize, height: usize) -> Self {
        Self::from_lines((0..height).map(|_| FILLER.to_string().repeat(width)))
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            lines: lines
                .into_iter()
                .map(|l| l.as_ref().chars().collect())
                .collect(),
            anchors: HashMap::new(),
            next_anchor: 0,
            cursor: Coordinate::new(1, 1),
            subscribers: Subscribers::default(),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.iter().map(|l| l.iter().collect()).collect()
    }

    pub fn line_len(&self, row: usize) -> Option<usize> {
        self.row_index(row).ok().map(|idx| self.lines[idx].len())
    }

    pub fn cursor(&self) -> Coordinate {
        self.cursor
    }

    /// Move the cursor, clamped to the text. Columns may sit one past the end of
    /// a line so appends are possible.
    pub fn set_cursor(&mut self, at: Coordinate) {
        let clamped = self.clamp(at);
        if clamped != self.cursor {
            self.cursor = clamped;
            self.subscribers.notify_cursor(clamped);
        }
    }

    fn clamp(&self, at: Coordinate) -> Coordinate {
        let row = at.row.clamp(1, self.lines.len().max(1));
        let len = self.lines.get(row - 1).map_or(0, Vec::len);
        Coordinate::new(row, at.col.clamp(1, len + 1))
    }

    fn row_index(&self, row: usize) -> Result<usize, SurfaceError> {
        if row == 0 || row > self.lines.len() {
            return Err(SurfaceError::RowOutOfBounds {
                row,
                line_count: self.lines.len(),
            });
        }
        Ok(row - 1)
    }

    fn col_index(&self, at: Coordinate, allow_end: bool) -> Result<(usize, usize), SurfaceError> {
        let row = self.row_index(at.row)?;
        let len = self.lines[row].len();
        let limit = if allow_end { len + 1 } else { len };
        if at.col == 0 || at.col > limit {
            return Err(SurfaceError::ColumnOutOfBounds {
                row: at.row,
                col: at.col,
                len,
            });
        }
        Ok((row, at.col - 1))
    }

    fn shift_anchors<F: FnMut(&mut AnchorSlot)>(&mut self, f: F) {
        self.anchors.values_mut().filter(|a| a.valid).for_each(f);
    }

    /// Apply `edit` and return the edit that reverts it.
    pub fn apply(&mut self, edit: Edit) -> Result<Edit, SurfaceError> {
        let inverse = match edit {
            Edit::InsertChar { at, ch } => {
                let (row, idx) = self.col_index(at, true)?;
                self.lines[row].insert(idx, ch);
                self.shift_anchors(|a| {
                    if a.at.row == at.row && a.at.col >= at.col {
                        a.at.col += 1;
                    }
                });
                Edit::DeleteChar { at }
            }
            Edit::DeleteChar { at } => {
                let (row, idx) = self.col_index(at, false)?;
                let ch = self.lines[row].remove(idx);
                self.shift_anchors(|a| {
                    if a.at.row == at.row && a.at.col > at.col {
                        a.at.col -= 1;
                    }
                });
                Edit::InsertChar { at, ch }
            }
            Edit::ReplaceChar { at, ch } => {
                let (row, idx) = self.col_index(at, false)?;
                let old = std::mem::replace(&mut self.lines[row][idx], ch);
                Edit::ReplaceChar { at, ch: old }
            }
            Edit::InsertLine { row, text } => {
                if row == 0 || row > self.lines.len() + 1 {
                    return Err(SurfaceError::RowOutOfBounds {
                        row,
                        line_count: self.lines.len(),
                    });
                }
                self.lines.insert(row - 1, text.chars().collect());
                self.shift_anchors(|a| {
                    if a.at.row >= row {
                        a.at.row += 1;
                    }
                });
                Edit::RemoveLine { row }
            }
            Edit::RemoveLine { row } => {
                let idx = self.row_index(row)?;
                let removed: String = self.lines.remove(idx).into_iter().collect();
                self.shift_anchors(|a| {
                    if a.at.row == row {
                        a.valid = false;
                    } else if a.at.row > row {
                        a.at.row -= 1;
                    }
                });
                Edit::InsertLine { row, text: removed }
            }
            Edit::SetLine { row, text } => {
                let idx = self.row_index(row)?;
                let old = std::mem::replace(&mut self.lines[idx], text.chars().collect());
                Edit::SetLine {
                    row,
                    text: old.into_iter().collect(),
                }
            }
        };

        self.subscribers.notify_edit();
        let clamped = self.clamp(self.cursor);
        if clamped != self.cursor {
            self.cursor = clamped;
            self.subscribers.notify_cursor(clamped);
        }
        Ok(inverse)
    }
}

impl GridSurface for MemoryGrid {
    fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn read_line(&self, row: usize) -> Option<String> {
        let idx = self.row_index(row).ok()?;
        Some(self.lines[idx].iter().collect())
    }

    fn write_line(&mut self, row: usize, text: &str) -> Result<(), SurfaceError> {
        self.apply(Edit::SetLine {
            row,
            text: text.to_string(),
        })
        .map(|_| ())
    }

    fn remove_line(&mut self, row: usize) -> Result<(), SurfaceError> {
        self.apply(Edit::RemoveLine { row }).map(|_| ())
    }

    fn create_anchor(&mut self, at: Coordinate) -> Result<AnchorId, SurfaceError> {
        self.row_index(at.row)?;
        if at.col == 0 {
            return Err(SurfaceError::ColumnOutOfBounds {
                row: at.row,
                col: at.col,
                len: self.line_len(at.row).unwrap_or(0),
            });
        }
        self.next_anchor += 1;
        let id = AnchorId(self.next_anchor);
        self.anchors.insert(id, AnchorSlot { at, valid: true });
        Ok(id)
    }

    fn dereference(&self, id: AnchorId) -> Result<Coordinate, AnchorError> {
        match self.anchors.get(&id) {
            Some(slot) if slot.valid => Ok(slot.at),
            Some(_) => Err(AnchorError::Invalidated(id)),
            None => Err(AnchorError::Unknown(id)),
        }
    }

    fn release(&mut self, id: AnchorId) {
        self.anchors.remove(&id);
    }

    fn subscribe_edits(&mut self) -> Subscription {
        let (tx, sub) = Subscription::channel();
        self.subscribers.edits.push(tx);
        sub
    }

    fn subscribe_cursor_moves(&mut self) -> Subscription {
        let (tx, sub) = Subscription::channel();
        self.subscribers.cursor.push(tx);
        sub
    }
}
