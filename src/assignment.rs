use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grid::{Coordinate, GridSurface, SurfaceError, FILLER};

/// The editing actions a drill can ask for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AssignmentKind {
    Delete,
    Replace,
    YankLine,
    ChangeUndo,
    Paste,
}

impl AssignmentKind {
    pub const ALL: [AssignmentKind; 5] = [
        AssignmentKind::Delete,
        AssignmentKind::Replace,
        AssignmentKind::YankLine,
        AssignmentKind::ChangeUndo,
        AssignmentKind::Paste,
    ];

    pub fn descriptor(self) -> &'static Descriptor {
        // REGISTRY is declared in the same order as the enum
        &REGISTRY[self as usize]
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown assignment type '{0}'")]
    UnknownType(String),
}

/// What a completion predicate is allowed to look at: the anchored cell and the
/// line that contains it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellView {
    pub at: Coordinate,
    pub cell: char,
    /// The cell right of `at`, if the line reaches that far.
    pub next: Option<char>,
    pub line: String,
    /// The line directly below, used to recognise a duplicated line.
    pub below: Option<String>,
}

impl CellView {
    pub fn observe(surface: &dyn GridSurface, at: Coordinate) -> Option<Self> {
        let line = surface.read_line(at.row)?;
        let mut chars = line.chars().skip(at.col.saturating_sub(1));
        let cell = chars.next().unwrap_or(FILLER);
        let next = chars.next();
        Some(Self {
            at,
            cell,
            next,
            below: surface.read_line(at.row + 1),
            line,
        })
    }
}

/// Observation history an assignment carries between edits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub changed_seen: bool,
}

pub type Predicate = fn(&CellView, &mut Progress) -> bool;
pub type Cleanup = fn(&mut dyn GridSurface, Coordinate, usize) -> Result<(), SurfaceError>;

pub struct Descriptor {
    pub kind: AssignmentKind,
    pub glyph: char,
    pub instruction: &'static str,
    pub is_complete: Predicate,
    /// Runs once, right after `is_complete` first holds. Receives the board width.
    pub cleanup: Cleanup,
}

impl std::fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Descriptor")
            .field("kind", &self.kind)
            .field("glyph", &self.glyph)
            .finish()
    }
}

impl Descriptor {
    /// Write this type's glyph at `at`, padding the line with filler when it is
    /// too short.
    pub fn write_marker(
        &self,
        surface: &mut dyn GridSurface,
        at: Coordinate,
        board_width: usize,
    ) -> Result<(), SurfaceError> {
        let glyph = self.glyph;
        edit_line(surface, at.row, board_width.max(at.col), |chars| {
            chars[at.col - 1] = glyph;
        })
    }
}

static REGISTRY: [Descriptor; 5] = [
    Descriptor {
        kind: AssignmentKind::Delete,
        glyph: 'x',
        instruction: "Delete this character (x)",
        is_complete: deleted,
        cleanup: pad_only,
    },
    Descriptor {
        kind: AssignmentKind::Replace,
        glyph: 'r',
        instruction: "Replace this character with any other (r)",
        is_complete: replaced,
        cleanup: clear_cell,
    },
    Descriptor {
        kind: AssignmentKind::YankLine,
        glyph: 'y',
        instruction: "Yank this line and put it below (yyp)",
        is_complete: line_duplicated,
        cleanup: remove_duplicate,
    },
    Descriptor {
        kind: AssignmentKind::ChangeUndo,
        glyph: 'c',
        instruction: "Change this character (r), then undo it (u)",
        is_complete: changed_and_undone,
        cleanup: clear_cell,
    },
    Descriptor {
        kind: AssignmentKind::Paste,
        glyph: 'p',
        instruction: "Put some text right after this character (p)",
        is_complete: pasted_after,
        cleanup: clear_line,
    },
];

/// Resolve a configured tag such as `yank-line`.
pub fn lookup(tag: &str) -> Result<&'static Descriptor, RegistryError> {
    let wanted = tag.trim().to_ascii_lowercase();
    REGISTRY
        .iter()
        .find(|d| d.kind.to_string() == wanted)
        .ok_or_else(|| RegistryError::UnknownType(tag.to_string()))
}

fn deleted(view: &CellView, _: &mut Progress) -> bool {
    view.cell == FILLER
}

fn replaced(view: &CellView, _: &mut Progress) -> bool {
    view.cell != FILLER && view.cell != 'r'
}

fn line_duplicated(view: &CellView, _: &mut Progress) -> bool {
    view.cell == 'y' && view.below.as_deref() == Some(view.line.as_str())
}

fn changed_and_undone(view: &CellView, progress: &mut Progress) -> bool {
    if view.cell != 'c' {
        progress.changed_seen = true;
        return false;
    }
    progress.changed_seen
}

fn pasted_after(view: &CellView, _: &mut Progress) -> bool {
    view.cell == 'p' && view.next.is_some_and(|c| c != FILLER)
}

/// Read `row`, pad it to `width`, let `f` change it and write it back if
/// anything differs.
fn edit_line<F>(
    surface: &mut dyn GridSurface,
    row: usize,
    width: usize,
    f: F,
) -> Result<(), SurfaceError>
where
    F: FnOnce(&mut Vec<char>),
{
    let original = surface
        .read_line(row)
        .ok_or(SurfaceError::RowOutOfBounds {
            row,
            line_count: surface.line_count(),
        })?;
    let mut chars: Vec<char> = original.chars().collect();
    if chars.len() < width {
        chars.resize(width, FILLER);
    }
    f(&mut chars);
    let updated: String = chars.into_iter().collect();
    if updated != original {
        surface.write_line(row, &updated)?;
    }
    Ok(())
}

fn pad_only(surface: &mut dyn GridSurface, at: Coordinate, width: usize) -> Result<(), SurfaceError> {
    edit_line(surface, at.row, width, |_| {})
}

fn clear_cell(surface: &mut dyn GridSurface, at: Coordinate, width: usize) -> Result<(), SurfaceError> {
    edit_line(surface, at.row, width.max(at.col), |chars| {
        chars[at.col - 1] = FILLER;
    })
}

fn remove_duplicate(
    surface: &mut dyn GridSurface,
    at: Coordinate,
    width: usize,
) -> Result<(), SurfaceError> {
    if surface.read_line(at.row + 1) == surface.read_line(at.row) {
        surface.remove_line(at.row + 1)?;
    }
    clear_cell(surface, at, width)
}

fn clear_line(surface: &mut dyn GridSurface, at: Coordinate, width: usize) -> Result<(), SurfaceError> {
    edit_line(surface, at.row, width, |chars| {
        chars.clear();
        chars.resize(width, FILLER);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Edit, MemoryGrid};
    use assert_matches::assert_matches;

    const WIDTH: usize = 8;

    fn marked(kind: AssignmentKind, at: Coordinate) -> MemoryGrid {
        let mut grid = MemoryGrid::new(WIDTH, 3);
        kind.descriptor()
            .write_marker(&mut grid, at, WIDTH)
            .unwrap();
        grid
    }

    fn check(grid: &MemoryGrid, kind: AssignmentKind, at: Coordinate, progress: &mut Progress) -> bool {
        let view = CellView::observe(grid, at).unwrap();
        (kind.descriptor().is_complete)(&view, progress)
    }

    #[test]
    fn registry_order_matches_kinds() {
        for kind in AssignmentKind::ALL {
            assert_eq!(kind.descriptor().kind, kind);
        }
    }

    #[test]
    fn lookup_by_tag() {
        assert_eq!(lookup("yank-line").unwrap().kind, AssignmentKind::YankLine);
        assert_eq!(lookup(" Delete ").unwrap().kind, AssignmentKind::Delete);
        assert_eq!(
            lookup("teleport").unwrap_err(),
            RegistryError::UnknownType("teleport".into())
        );
    }

    #[test]
    fn untouched_markers_are_never_complete() {
        for kind in AssignmentKind::ALL {
            for at in [
                Coordinate::new(1, 1),
                Coordinate::new(2, 4),
                Coordinate::new(3, WIDTH),
            ] {
                let grid = marked(kind, at);
                let mut progress = Progress::default();
                assert!(
                    !check(&grid, kind, at, &mut progress),
                    "{kind} complete on untouched marker at {at}"
                );
            }
        }
    }

    #[test]
    fn write_marker_pads_short_lines() {
        let mut grid = MemoryGrid::from_lines(["ab"]);
        AssignmentKind::Delete
            .descriptor()
            .write_marker(&mut grid, Coordinate::new(1, 5), 6)
            .unwrap();
        assert_eq!(grid.read_line(1).unwrap(), "ab  x ");
    }

    #[test]
    fn delete_completes_and_cleanup_restores_width() {
        let at = Coordinate::new(2, 3);
        let mut grid = marked(AssignmentKind::Delete, at);
        grid.apply(Edit::DeleteChar { at }).unwrap();
        assert!(check(&grid, AssignmentKind::Delete, at, &mut Progress::default()));

        assert_eq!(grid.line_len(2), Some(WIDTH - 1));
        (AssignmentKind::Delete.descriptor().cleanup)(&mut grid, at, WIDTH).unwrap();
        assert_eq!(grid.line_len(2), Some(WIDTH));
        assert!(grid.lines().iter().all(|l| l.trim().is_empty()));
    }

    #[test]
    fn delete_of_last_column_reads_as_filler() {
        let at = Coordinate::new(1, WIDTH);
        let mut grid = marked(AssignmentKind::Delete, at);
        grid.apply(Edit::DeleteChar { at }).unwrap();
        assert!(check(&grid, AssignmentKind::Delete, at, &mut Progress::default()));
    }

    #[test]
    fn replace_needs_a_visible_different_char() {
        let at = Coordinate::new(1, 2);
        let mut grid = marked(AssignmentKind::Replace, at);
        grid.apply(Edit::ReplaceChar { at, ch: FILLER }).unwrap();
        assert!(!check(&grid, AssignmentKind::Replace, at, &mut Progress::default()));
        grid.apply(Edit::ReplaceChar { at, ch: 'q' }).unwrap();
        assert!(check(&grid, AssignmentKind::Replace, at, &mut Progress::default()));

        (AssignmentKind::Replace.descriptor().cleanup)(&mut grid, at, WIDTH).unwrap();
        assert_eq!(grid.cell(at), Some(FILLER));
    }

    #[test]
    fn yank_line_needs_a_copy_below() {
        let at = Coordinate::new(1, 4);
        let mut grid = marked(AssignmentKind::YankLine, at);
        let line = grid.read_line(1).unwrap();
        grid.apply(Edit::InsertLine { row: 2, text: line }).unwrap();
        assert!(check(&grid, AssignmentKind::YankLine, at, &mut Progress::default()));

        (AssignmentKind::YankLine.descriptor().cleanup)(&mut grid, at, WIDTH).unwrap();
        assert_eq!(grid.line_count(), 3);
        assert!(grid.lines().iter().all(|l| l.trim().is_empty()));
    }

    #[test]
    fn yank_line_copy_above_does_not_count() {
        let at = Coordinate::new(2, 4);
        let mut grid = marked(AssignmentKind::YankLine, at);
        let line = grid.read_line(2).unwrap();
        grid.apply(Edit::InsertLine { row: 2, text: line }).unwrap();
        // the original line moved down; nothing below it is a copy
        let moved = Coordinate::new(3, 4);
        assert!(!check(&grid, AssignmentKind::YankLine, moved, &mut Progress::default()));
    }

    #[test]
    fn change_undo_needs_both_steps() {
        let at = Coordinate::new(3, 5);
        let mut grid = marked(AssignmentKind::ChangeUndo, at);
        let mut progress = Progress::default();

        let undo = grid.apply(Edit::ReplaceChar { at, ch: 'z' }).unwrap();
        assert!(!check(&grid, AssignmentKind::ChangeUndo, at, &mut progress));
        assert!(progress.changed_seen);

        grid.apply(undo).unwrap();
        assert!(check(&grid, AssignmentKind::ChangeUndo, at, &mut progress));
    }

    #[test]
    fn paste_needs_text_after_the_marker() {
        let at = Coordinate::new(1, 3);
        let mut grid = marked(AssignmentKind::Paste, at);
        grid.apply(Edit::InsertChar {
            at: Coordinate::new(1, 4),
            ch: 'w',
        })
        .unwrap();
        assert!(check(&grid, AssignmentKind::Paste, at, &mut Progress::default()));

        (AssignmentKind::Paste.descriptor().cleanup)(&mut grid, at, WIDTH).unwrap();
        assert_eq!(grid.read_line(1).unwrap(), " ".repeat(WIDTH));
    }

    #[test]
    fn cleanup_on_missing_row_reports_error() {
        let mut grid = MemoryGrid::new(WIDTH, 1);
        assert_matches!(
            (AssignmentKind::Delete.descriptor().cleanup)(&mut grid, Coordinate::new(4, 1), WIDTH),
            Err(SurfaceError::RowOutOfBounds { row: 4, .. })
        );
    }
}
