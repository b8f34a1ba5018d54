use std::time::Duration;

use assert_matches::assert_matches;
use gridrill::assignment::AssignmentKind;
use gridrill::clock::ManualClock;
use gridrill::config::{Config, DrillSettings};
use gridrill::grid::{Coordinate, Edit, GridSurface, MemoryGrid};
use gridrill::layout::Planned;
use gridrill::session::{SessionError, SessionEvent, SessionManager, SessionStatus, SessionTracker};

fn config(count: usize, types: &[&str]) -> Config {
    Config {
        assignment_count: count,
        board_width: 10,
        board_height: 5,
        assignment_types: types.iter().map(|t| t.to_string()).collect(),
    }
}

fn deletes(cells: &[(usize, usize)]) -> Vec<Planned> {
    cells
        .iter()
        .map(|&(row, col)| Planned {
            at: Coordinate::new(row, col),
            kind: AssignmentKind::Delete,
        })
        .collect()
}

fn settings(count: usize) -> DrillSettings {
    config(count, &["delete"]).validate().unwrap()
}

/// Delete the live marker and let the tracker see it.
fn solve_delete(tracker: &mut SessionTracker<ManualClock>, grid: &mut MemoryGrid) -> Coordinate {
    let at = tracker.current_coordinate(grid).expect("live marker");
    grid.apply(Edit::DeleteChar { at }).unwrap();
    tracker.pump(grid);
    at
}

#[test]
fn three_deletes_complete_in_order() {
    let clock = ManualClock::new();
    let mut manager = SessionManager::new(clock.clone());
    let mut grid = MemoryGrid::new(10, 5);
    manager
        .start_session(&config(3, &["delete"]), &mut grid)
        .unwrap();

    let tracker = manager.session_mut().unwrap();
    assert_eq!(tracker.stats().total, 3);
    for expected in 1..=3 {
        clock.advance(Duration::from_secs(2));
        let at = tracker.current_coordinate(&grid).expect("live marker");
        assert_eq!(grid.cell(at), Some('x'));
        solve_delete(tracker, &mut grid);
        assert_eq!(tracker.stats().completed, expected);
    }

    assert_eq!(tracker.status(), SessionStatus::Finished);
    let completed: Vec<usize> = tracker
        .drain_events()
        .into_iter()
        .filter_map(|ev| match ev {
            SessionEvent::Completed { id, .. } => Some(id),
            _ => None,
        })
        .collect();
    assert_eq!(completed, vec![1, 2, 3]);

    let result = tracker.result().unwrap();
    assert!(result.is_complete());
    assert_eq!(result.elapsed_seconds, 6.0);
    assert_eq!(result.avg_secs_per_assignment, Some(2.0));
    assert_eq!(result.std_dev_secs, Some(0.0));
    assert!(!manager.is_running());
}

#[test]
fn removing_the_marker_line_skips_to_the_next() {
    let mut grid = MemoryGrid::new(10, 5);
    let mut tracker = SessionTracker::new(settings(2), ManualClock::new());
    tracker
        .start_with_plan(&mut grid, deletes(&[(2, 3), (4, 4)]))
        .unwrap();

    grid.apply(Edit::RemoveLine { row: 2 }).unwrap();
    tracker.pump(&mut grid);

    let events = tracker.drain_events();
    assert!(events
        .iter()
        .any(|ev| matches!(ev, SessionEvent::Skipped { id: 1, .. })));
    assert!(events.iter().any(|ev| matches!(
        ev,
        SessionEvent::Activated { id: 2, at, .. } if *at == Coordinate::new(4, 4)
    )));
    assert_eq!(tracker.stats().skipped, 1);
    assert!(tracker.is_running());

    solve_delete(&mut tracker, &mut grid);
    let result = tracker.result().unwrap();
    assert_eq!((result.completed, result.skipped, result.total), (1, 1, 2));
    assert!(!result.is_complete());
}

#[test]
fn stopping_mid_session_freezes_the_numbers() {
    let clock = ManualClock::new();
    let mut manager = SessionManager::new(clock.clone());
    let mut grid = MemoryGrid::new(10, 5);
    let handle = manager
        .start_session(&config(5, &["delete"]), &mut grid)
        .unwrap();

    solve_delete(manager.session_mut().unwrap(), &mut grid);
    assert_eq!(manager.session().unwrap().stats().completed, 1);

    // the live marker survives the stop
    let marker = manager.session().unwrap().current_coordinate(&grid).unwrap();
    clock.advance(Duration::from_secs(3));
    let result = manager.stop_session(handle, &mut grid).unwrap();
    assert!(result.aborted);
    assert_eq!((result.completed, result.total), (1, 5));
    assert_eq!(grid.cell(marker), Some('x'));

    // edits after the stop are never looked at
    grid.apply(Edit::DeleteChar { at: marker }).unwrap();
    let tracker = manager.session_mut().unwrap();
    tracker.pump(&mut grid);
    tracker.on_edit_notification(&mut grid);
    assert_eq!(tracker.stats().completed, 1);
    assert_eq!(tracker.status(), SessionStatus::Aborted);
    assert_eq!(tracker.result(), Some(&result));

    // stopping again is a no-op with the same numbers
    assert_eq!(manager.stop_session(handle, &mut grid), Some(result));
}

#[test]
fn finishing_immediately_gives_finite_rates() {
    let mut grid = MemoryGrid::new(10, 5);
    let mut tracker = SessionTracker::new(settings(2), ManualClock::new());
    tracker.start(&mut grid).unwrap();
    tracker.record_keypress();

    let result = tracker.finish(&mut grid, false);
    assert_eq!(result.elapsed_seconds, 0.0);
    assert!(result.keys_per_minute.is_finite());
    assert_eq!(result.avg_secs_per_assignment, None);

    let again = tracker.finish(&mut grid, true);
    assert_eq!(again, result);
    let finished = tracker
        .drain_events()
        .into_iter()
        .filter(|ev| matches!(ev, SessionEvent::Finished(_)))
        .count();
    assert_eq!(finished, 1);
}

#[test]
fn only_one_session_at_a_time() {
    let mut manager = SessionManager::new(ManualClock::new());
    let mut grid = MemoryGrid::new(10, 5);
    let first = manager
        .start_session(&config(2, &["delete"]), &mut grid)
        .unwrap();

    let mut other = MemoryGrid::new(10, 5);
    assert_matches!(
        manager.start_session(&config(2, &["delete"]), &mut other),
        Err(SessionError::AlreadyRunning)
    );

    manager.stop_session(first, &mut grid);
    let second = manager
        .start_session(&config(2, &["delete"]), &mut other)
        .unwrap();
    assert_ne!(first, second);
    assert_eq!(manager.stop_session(first, &mut other), None);
}

#[test]
fn bad_configs_are_rejected() {
    let mut manager = SessionManager::new(ManualClock::new());
    let mut grid = MemoryGrid::new(10, 5);
    assert_matches!(
        manager.start_session(&config(0, &["delete"]), &mut grid),
        Err(SessionError::Config(_))
    );
    assert_matches!(
        manager.start_session(&config(51, &["delete"]), &mut grid),
        Err(SessionError::Config(_))
    );
    assert_matches!(
        manager.start_session(&config(2, &["bogus"]), &mut grid),
        Err(SessionError::Config(_))
    );
    assert!(!manager.is_running());
}

#[test]
fn unknown_types_warn_but_run() {
    let mut manager = SessionManager::new(ManualClock::new());
    let mut grid = MemoryGrid::new(10, 5);
    manager
        .start_session(&config(2, &["delete", "teleport"]), &mut grid)
        .unwrap();
    let events = manager.session_mut().unwrap().drain_events();
    assert!(events
        .iter()
        .any(|ev| matches!(ev, SessionEvent::Warning(w) if w.contains("teleport"))));
}

#[test]
fn counts_never_go_backwards() {
    let mut grid = MemoryGrid::new(10, 5);
    let mut tracker = SessionTracker::new(settings(4), ManualClock::new());
    tracker
        .start_with_plan(&mut grid, deletes(&[(1, 1), (2, 2), (3, 3), (5, 5)]))
        .unwrap();

    let mut last = 0;
    let mut step = 0;
    while tracker.is_running() {
        if step == 2 {
            // wipe the live line instead of solving it
            let at = tracker.current_coordinate(&grid).unwrap();
            grid.apply(Edit::RemoveLine { row: at.row }).unwrap();
            tracker.pump(&mut grid);
        } else {
            solve_delete(&mut tracker, &mut grid);
        }
        let stats = tracker.stats();
        assert!(stats.completed >= last);
        assert!(stats.completed + stats.skipped <= stats.total);
        last = stats.completed;
        step += 1;
    }

    let result = tracker.result().unwrap();
    assert_eq!(result.completed + result.skipped, result.total);
}
