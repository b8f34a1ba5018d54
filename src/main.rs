use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    fs::{self, File},
    io::{self, stdin},
    sync::Mutex,
    time::Duration,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gridrill::{
    app::App,
    app_dirs::AppDirs,
    clock::MonotonicClock,
    config::{Config, ConfigStore, FileConfigStore},
    history::HistoryDb,
    runtime::{CrosstermEventSource, DrillEvent, FixedTicker, Runner},
};

const TICK_RATE_MS: u64 = 100;

/// practice editor motions on a board of scattered markers
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Markers are scattered over a character grid. Move to each one and perform the edit it asks for; the session ends when every marker is done."
)]
pub struct Cli {
    /// number of assignments per session
    #[clap(short = 'n', long)]
    count: Option<usize>,

    /// board width in columns
    #[clap(long)]
    width: Option<usize>,

    /// board height in lines
    #[clap(long)]
    height: Option<usize>,

    /// assignment types to draw from, e.g. delete,replace,paste
    #[clap(short = 't', long, value_delimiter = ',')]
    types: Option<Vec<String>>,

    /// write the resulting settings back to the config file
    #[clap(long)]
    save_config: bool,

    /// forget every recorded session and exit
    #[clap(long)]
    clear_history: bool,
}

impl Cli {
    /// Layer the command line on top of the stored config.
    fn apply(&self, mut config: Config) -> Config {
        if let Some(n) = self.count {
            config.assignment_count = n;
        }
        if let Some(w) = self.width {
            config.board_width = w;
        }
        if let Some(h) = self.height {
            config.board_height = h;
        }
        if let Some(types) = &self.types {
            config.assignment_types = types.clone();
        }
        config
    }
}

/// File logging, only when RUST_LOG asks for it; the terminal belongs to the UI.
fn init_logging() {
    if std::env::var_os("RUST_LOG").is_none() {
        return;
    }
    let Some(path) = AppDirs::log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        if fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(file) = File::create(&path) else {
        return;
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging();

    if cli.clear_history {
        HistoryDb::new()?.clear()?;
        info!("cleared history");
        println!("history cleared");
        return Ok(());
    }

    let store = FileConfigStore::new();
    let config = cli.apply(store.load());
    if let Err(err) = config.validate() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::InvalidValue, err).exit();
    }
    if cli.save_config {
        store.save(&config)?;
        info!(path = %store.path().display(), "saved config");
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let history = match HistoryDb::new() {
        Ok(db) => Some(db),
        Err(err) => {
            warn!(error = %err, "history disabled");
            None
        }
    };
    let mut app = App::new(config, MonotonicClock, history)?;

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    terminal.draw(|f| f.render_widget(&*app, f.area()))?;
    while !app.should_quit {
        match runner.step() {
            DrillEvent::Key(key) => app.on_key(key),
            // the clock in the header moves on every tick
            DrillEvent::Tick | DrillEvent::Resize => {}
        }
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_leave_config_alone() {
        let cli = Cli::parse_from(["gridrill"]);
        assert!(!cli.save_config);
        assert_eq!(cli.apply(Config::default()), Config::default());
    }

    #[test]
    fn cli_overrides_config() {
        let cli = Cli::parse_from([
            "gridrill", "-n", "3", "--width", "10", "--height", "5", "-t", "delete,paste",
        ]);
        let config = cli.apply(Config::default());
        assert_eq!(config.assignment_count, 3);
        assert_eq!(config.board_width, 10);
        assert_eq!(config.board_height, 5);
        assert_eq!(config.assignment_types, vec!["delete", "paste"]);
    }

    #[test]
    fn save_config_flag() {
        let cli = Cli::parse_from(["gridrill", "--save-config"]);
        assert!(cli.save_config);
    }

    #[test]
    fn clear_history_flag() {
        assert!(!Cli::parse_from(["gridrill"]).clear_history);
        let cli = Cli::parse_from(["gridrill", "--clear-history"]);
        assert!(cli.clear_history);
        assert!(!cli.save_config);
    }
}
