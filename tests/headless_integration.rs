use std::sync::mpsc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use gridrill::app::{App, AppState};
use gridrill::clock::ManualClock;
use gridrill::config::Config;
use gridrill::grid::Coordinate;
use gridrill::runtime::{DrillEvent, FixedTicker, Runner, TestEventSource};

fn key(c: char) -> DrillEvent {
    DrillEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
}

/// Keystrokes that walk the cursor from anywhere to `at`.
fn walk_to(at: Coordinate) -> Vec<DrillEvent> {
    let mut keys = vec![key('0')];
    keys.extend(std::iter::repeat_with(|| key('k')).take(10));
    keys.extend(std::iter::repeat_with(|| key('j')).take(at.row - 1));
    keys.extend(std::iter::repeat_with(|| key('l')).take(at.col - 1));
    keys
}

fn drive(app: &mut App<ManualClock>, runner: &Runner<TestEventSource, FixedTicker>) {
    for _ in 0..200u32 {
        match runner.step() {
            DrillEvent::Key(key) => app.on_key(key),
            DrillEvent::Tick => break,
            DrillEvent::Resize => {}
        }
        if app.should_quit {
            break;
        }
    }
}

// Headless integration using the internal runtime + App without a TTY
#[test]
fn headless_drill_flow_completes() {
    let config = Config {
        assignment_count: 1,
        board_width: 10,
        board_height: 4,
        assignment_types: vec!["delete".into()],
    };
    let mut app = App::new(config, ManualClock::new(), None).unwrap();

    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );

    let at = app.marker().expect("marker on the board");
    for ev in walk_to(at) {
        tx.send(ev).unwrap();
    }
    tx.send(key('x')).unwrap();
    drive(&mut app, &runner);

    assert_eq!(app.state, AppState::Results);
    let result = app.result.clone().unwrap();
    assert!(result.is_complete());
    assert!(result.key_count > 0);
    assert!(result.keys_per_minute.is_finite());

    tx.send(key('q')).unwrap();
    drive(&mut app, &runner);
    assert!(app.should_quit);
}

#[test]
fn headless_give_up_then_retry() {
    let config = Config {
        assignment_count: 2,
        board_width: 8,
        board_height: 3,
        assignment_types: vec!["replace".into(), "paste".into()],
    };
    let mut app = App::new(config, ManualClock::new(), None).unwrap();

    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );

    tx.send(key('j')).unwrap();
    tx.send(key('q')).unwrap();
    drive(&mut app, &runner);

    assert_eq!(app.state, AppState::Results);
    let result = app.result.clone().unwrap();
    assert!(result.aborted);
    assert_eq!(result.completed, 0);
    assert_eq!(result.key_count, 1);

    tx.send(key('r')).unwrap();
    drive(&mut app, &runner);
    assert_eq!(app.state, AppState::Drilling);
    assert!(app.session().unwrap().is_running());
}

#[test]
fn headless_idle_runner_only_ticks() {
    let (_tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );
    assert!(matches!(runner.step(), DrillEvent::Tick));
}
