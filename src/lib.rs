// Library surface for headless/integration tests and reuse.
pub mod anchor;
pub mod app;
pub mod app_dirs;
pub mod assignment;
pub mod clock;
pub mod config;
pub mod editor;
pub mod grid;
pub mod history;
pub mod layout;
pub mod queue;
pub mod runtime;
pub mod session;
pub mod ui;
pub mod util;
