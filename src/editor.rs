use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::warn;

use crate::grid::{Coordinate, Edit, GridSurface, MemoryGrid, FILLER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Insert,
}

/// Operator waiting for its second key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Replace,
    Yank,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Register {
    Chars(String),
    Line(String),
}

/// Small modal vi-style editor driving a [`MemoryGrid`].
#[derive(Debug)]
pub struct Editor {
    mode: Mode,
    pending: Option<Pending>,
    register: Option<Register>,
    undo: Vec<Vec<Edit>>,
    group: Vec<Edit>,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

impl Editor {
    pub fn new() -> Self {
        Self {
            mode: Mode::Normal,
            pending: None,
            register: None,
            undo: Vec::new(),
            group: Vec::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn register(&self) -> Option<&Register> {
        self.register.as_ref()
    }

    /// True between an operator key such as `r` and the key it applies to.
    pub fn awaiting_operand(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop every undo step. Needed whenever something other than this editor
    /// rewrites the grid, since the recorded inverses no longer line up.
    pub fn forget_history(&mut self) {
        self.undo.clear();
        self.group.clear();
    }

    /// Make `text` available to `p` unless the register already holds
    /// characters worth pasting.
    pub fn offer_paste_text(&mut self, text: &str) {
        let usable = matches!(
            &self.register,
            Some(Register::Chars(held)) if held.chars().any(|c| c != FILLER)
        );
        if !usable {
            self.register = Some(Register::Chars(text.to_string()));
        }
    }

    /// Feed one key. Returns false if the key means nothing to the editor.
    pub fn handle_key(&mut self, grid: &mut MemoryGrid, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return false;
        }
        match self.mode {
            Mode::Normal => self.normal(grid, key.code),
            Mode::Insert => self.insert(grid, key.code),
        }
    }

    fn normal(&mut self, grid: &mut MemoryGrid, code: KeyCode) -> bool {
        let at = grid.cursor();

        if let Some(pending) = self.pending.take() {
            match (pending, code) {
                (Pending::Replace, KeyCode::Char(ch)) => {
                    if self.has_char(grid, at) {
                        self.edit(grid, Edit::ReplaceChar { at, ch });
                    }
                }
                (Pending::Yank, KeyCode::Char('y')) => {
                    if let Some(line) = grid.read_line(at.row) {
                        self.register = Some(Register::Line(line));
                    }
                }
                (Pending::Delete, KeyCode::Char('d')) => {
                    if let Some(line) = grid.read_line(at.row) {
                        self.register = Some(Register::Line(line));
                        self.edit(grid, Edit::RemoveLine { row: at.row });
                    }
                }
                _ => {}
            }
            self.commit();
            self.settle(grid);
            return true;
        }

        match code {
            KeyCode::Char('h') | KeyCode::Left => self.move_to(grid, at.row, at.col.saturating_sub(1)),
            KeyCode::Char('l') | KeyCode::Right => self.move_to(grid, at.row, at.col + 1),
            KeyCode::Char('k') | KeyCode::Up => self.move_to(grid, at.row.saturating_sub(1), at.col),
            KeyCode::Char('j') | KeyCode::Down => self.move_to(grid, at.row + 1, at.col),
            KeyCode::Char('0') => self.move_to(grid, at.row, 1),
            KeyCode::Char('$') => {
                let len = grid.line_len(at.row).unwrap_or(1);
                self.move_to(grid, at.row, len)
            }
            KeyCode::Char('x') => {
                if let Some(ch) = self.char_at(grid, at) {
                    self.register = Some(Register::Chars(ch.to_string()));
                    self.edit(grid, Edit::DeleteChar { at });
                    self.commit();
                }
                self.settle(grid);
            }
            KeyCode::Char('s') => {
                if self.has_char(grid, at) {
                    self.edit(grid, Edit::DeleteChar { at });
                }
                self.mode = Mode::Insert;
            }
            KeyCode::Char('r') => self.pending = Some(Pending::Replace),
            KeyCode::Char('y') => self.pending = Some(Pending::Yank),
            KeyCode::Char('d') => self.pending = Some(Pending::Delete),
            KeyCode::Char('i') => self.mode = Mode::Insert,
            KeyCode::Char('a') => {
                if self.has_char(grid, at) {
                    grid.set_cursor(Coordinate::new(at.row, at.col + 1));
                }
                self.mode = Mode::Insert;
            }
            KeyCode::Char('o') => {
                let row = at.row + 1;
                if self.edit(grid, Edit::InsertLine { row, text: String::new() }) {
                    grid.set_cursor(Coordinate::new(row, 1));
                    self.mode = Mode::Insert;
                }
            }
            KeyCode::Char('p') => self.put(grid, true),
            KeyCode::Char('P') => self.put(grid, false),
            KeyCode::Char('u') => self.undo(grid),
            _ => return false,
        }
        true
    }

    fn insert(&mut self, grid: &mut MemoryGrid, code: KeyCode) -> bool {
        let at = grid.cursor();
        match code {
            KeyCode::Esc => {
                self.mode = Mode::Normal;
                self.commit();
                self.move_to(grid, at.row, at.col.saturating_sub(1));
            }
            KeyCode::Char(ch) => {
                if self.edit(grid, Edit::InsertChar { at, ch }) {
                    grid.set_cursor(Coordinate::new(at.row, at.col + 1));
                }
            }
            KeyCode::Backspace if at.col > 1 => {
                let prev = Coordinate::new(at.row, at.col - 1);
                if self.edit(grid, Edit::DeleteChar { at: prev }) {
                    grid.set_cursor(prev);
                }
            }
            KeyCode::Left => grid.set_cursor(Coordinate::new(at.row, at.col.saturating_sub(1))),
            KeyCode::Right => grid.set_cursor(Coordinate::new(at.row, at.col + 1)),
            KeyCode::Up => grid.set_cursor(Coordinate::new(at.row.saturating_sub(1), at.col)),
            KeyCode::Down => grid.set_cursor(Coordinate::new(at.row + 1, at.col)),
            _ => return false,
        }
        true
    }

    fn put(&mut self, grid: &mut MemoryGrid, after: bool) {
        let at = grid.cursor();
        match self.register.clone() {
            Some(Register::Line(text)) => {
                let row = if after { at.row + 1 } else { at.row };
                if self.edit(grid, Edit::InsertLine { row, text }) {
                    grid.set_cursor(Coordinate::new(row, at.col));
                }
            }
            Some(Register::Chars(text)) => {
                let mut col = if after && self.has_char(grid, at) {
                    at.col + 1
                } else {
                    at.col
                };
                for ch in text.chars() {
                    if !self.edit(grid, Edit::InsertChar {
                        at: Coordinate::new(at.row, col),
                        ch,
                    }) {
                        break;
                    }
                    col += 1;
                }
                grid.set_cursor(Coordinate::new(at.row, col.saturating_sub(1)));
            }
            None => {}
        }
        self.commit();
        self.settle(grid);
    }

    fn undo(&mut self, grid: &mut MemoryGrid) {
        let Some(group) = self.undo.pop() else {
            return;
        };
        let mut first = None;
        for inverse in group.into_iter().rev() {
            let at = edit_position(&inverse);
            if let Err(err) = grid.apply(inverse) {
                warn!(error = %err, "undo step no longer fits, dropping history");
                self.undo.clear();
                break;
            }
            first = Some(at);
        }
        if let Some(at) = first {
            grid.set_cursor(at);
        }
        self.settle(grid);
    }

    fn edit(&mut self, grid: &mut MemoryGrid, edit: Edit) -> bool {
        match grid.apply(edit) {
            Ok(inverse) => {
                self.group.push(inverse);
                true
            }
            Err(_) => false,
        }
    }

    fn commit(&mut self) {
        if !self.group.is_empty() {
            self.undo.push(std::mem::take(&mut self.group));
        }
    }

    fn char_at(&self, grid: &MemoryGrid, at: Coordinate) -> Option<char> {
        grid.read_line(at.row)?.chars().nth(at.col.checked_sub(1)?)
    }

    fn has_char(&self, grid: &MemoryGrid, at: Coordinate) -> bool {
        self.char_at(grid, at).is_some()
    }

    fn move_to(&self, grid: &mut MemoryGrid, row: usize, col: usize) {
        let row = row.clamp(1, grid.line_count().max(1));
        let len = grid.line_len(row).unwrap_or(0).max(1);
        grid.set_cursor(Coordinate::new(row, col.clamp(1, len)));
    }

    /// Keep the normal-mode cursor on an existing character.
    fn settle(&self, grid: &mut MemoryGrid) {
        let at = grid.cursor();
        self.move_to(grid, at.row, at.col);
    }
}

fn edit_position(edit: &Edit) -> Coordinate {
    match edit {
        Edit::InsertChar { at, .. } | Edit::DeleteChar { at } | Edit::ReplaceChar { at, .. } => *at,
        Edit::InsertLine { row, .. } | Edit::RemoveLine { row } | Edit::SetLine { row, .. } => {
            Coordinate::new(*row, 1)
        }
    }
}
