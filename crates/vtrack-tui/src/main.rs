//! vtrack - terminal client for the violation tracker.
//!
//! Signs the user in against the tracker's auth service and keeps the
//! session alive while they are active; after a period of inactivity the
//! user is warned and then signed out.

mod app;
mod ui;

use std::io;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, EventStream},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vtrack_core::config::Config;
use vtrack_core::{BootstrapOutcome, SessionManager};

use app::{App, AppState};
use ui::input::handle_event;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Redraw interval so the warning countdown keeps moving without input
const TICK_INTERVAL_MS: u64 = 250;

const LOG_FILE: &str = "vtrack.log";

/// Initialize tracing to a log file; the terminal belongs to the UI.
///
/// Use RUST_LOG to control the level (e.g. RUST_LOG=debug).
fn init_tracing() -> Result<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let log_dir = Config::cache_dir()?;
    std::fs::create_dir_all(&log_dir)?;
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(&log_dir, LOG_FILE));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();
    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing()?;
    let config = Config::load()?;

    // Check for CLI commands
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 && args[1] == "--status" {
        return print_status(&config).await;
    }

    info!(server = %config.server_url, "vtrack starting");

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = match App::new(config) {
        Ok(mut app) => run_app(&mut terminal, &mut app).await,
        Err(e) => Err(e),
    };

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        error!(error = %e, "vtrack exited with error");
        eprintln!("Error: {}", e);
    }

    info!("vtrack shutting down");
    Ok(())
}

/// One-shot session check without the UI
async fn print_status(config: &Config) -> Result<()> {
    let manager = SessionManager::from_config(config)?;
    match manager.bootstrap().await {
        BootstrapOutcome::Authenticated(user) => {
            println!("Signed in as {} <{}> ({:?})", user.display_name(), user.email, user.role);
        }
        BootstrapOutcome::Anonymous => println!("Not signed in"),
        BootstrapOutcome::Deferred => {
            println!(
                "No answer from {} within {:?}",
                config.server_url,
                manager.settings().bootstrap_fallback
            );
        }
    }
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    // Show "checking session" while the startup check runs
    terminal.draw(|f| render(f, app))?;
    app.bootstrap().await;

    let mut events = EventStream::new();
    let mut tick = tokio::time::interval(Duration::from_millis(TICK_INTERVAL_MS));

    loop {
        app.check_session_events();
        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }

        terminal.draw(|f| render(f, app))?;

        tokio::select! {
            maybe_event = events.next() => match maybe_event {
                Some(Ok(event)) => {
                    if handle_event(app, event).await? {
                        return Ok(());
                    }
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(()),
            },
            _ = tick.tick() => {}
        }
    }
}
