//! ClinicDesk TUI - a terminal client for the clinic admin API.
//!
//! Keyboard-driven screens for patients and appointments, behind a login
//! that keeps the bearer token between runs and re-checks it on startup.

mod app;
mod ui;

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use clinicdesk_core::auth::{
    open_store, CredentialStore, LoginFlow, LoginForm, LoginOutcome, MemoryCredentialStore,
    RouteGuard, Session, SessionStatus,
};
use clinicdesk_core::{ApiClient, Config};

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

const LOG_FILE_NAME: &str = "clinicdesk.log";

const USAGE: &str = "\
Usage: clinicdesk [OPTIONS]

Options:
  --login       Sign in from the command line and store the token
  --logout      Forget the stored token and remembered screen
  --ephemeral   Keep the token in memory only for this run
  -h, --help    Show this help";

/// Command line flags
#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    login: bool,
    logout: bool,
    ephemeral: bool,
    help: bool,
}

impl Args {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut parsed = Args::default();
        for arg in args {
            match arg.as_str() {
                "--login" => parsed.login = true,
                "--logout" => parsed.logout = true,
                "--ephemeral" => parsed.ephemeral = true,
                "-h" | "--help" => parsed.help = true,
                other => anyhow::bail!("unknown option: {}\n\n{}", other, USAGE),
            }
        }
        Ok(parsed)
    }
}

/// Initialize the tracing subscriber for logging.
///
/// The terminal belongs to the UI, so logs go to a daily file in the data
/// directory. Use RUST_LOG to control the level (e.g. RUST_LOG=debug).
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let log_dir = config.data_dir().ok()?.join("logs");
    std::fs::create_dir_all(&log_dir).ok()?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(non_blocking),
        )
        .with(filter)
        .init();

    Some(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args = Args::parse(std::env::args().skip(1))?;
    if args.help {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = Config::load()?;

    // Keep the guard alive so buffered log lines get flushed on exit
    let _log_guard = init_tracing(&config);
    info!("ClinicDesk starting");

    let store: Arc<dyn CredentialStore> = if args.ephemeral {
        Arc::new(MemoryCredentialStore::new())
    } else {
        open_store(&config)?
    };

    if args.logout {
        store.clear()?;
        println!("Signed out.");
        return Ok(());
    }
    if args.login {
        return cli_login(config, store).await;
    }

    // Create app before touching the terminal so config errors print normally
    let mut app = App::new(config, store)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    app.start();

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;
    app.session.shutdown();

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("ClinicDesk shutting down");
    Ok(())
}

/// Prompt for credentials on the terminal, store the token and wait for
/// the server to confirm it.
async fn cli_login(mut config: Config, store: Arc<dyn CredentialStore>) -> Result<()> {
    let default_username = config.last_username.clone().unwrap_or_default();
    if default_username.is_empty() {
        print!("Username: ");
    } else {
        print!("Username [{}]: ", default_username);
    }
    io::stdout().flush()?;

    let mut username = String::new();
    io::stdin().read_line(&mut username)?;
    let username = match username.trim() {
        "" => default_username,
        typed => typed.to_string(),
    };
    let password = rpassword::prompt_password("Password: ")?;

    let api = Arc::new(ApiClient::from_config(&config)?);
    let mut session = Session::new(Arc::clone(&store), api.clone());
    let guard = RouteGuard::new(store);
    let flow = LoginFlow::new(api);

    let form = LoginForm::new(username.clone(), password);
    match flow.submit(&form, &mut session, &guard).await? {
        LoginOutcome::LoggedIn { .. } => {}
        other => {
            let message = other.message().unwrap_or_default();
            anyhow::bail!(message);
        }
    }

    config.last_username = Some(username);
    config.save()?;

    let status = session.settle().await?;
    match status {
        SessionStatus::Authenticated => println!("Signed in."),
        SessionStatus::DegradedError => {
            println!("Token stored, but the server could not be reached to confirm it.")
        }
        other => anyhow::bail!("Sign-in was not accepted ({})", other.label()),
    }
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                // Handle input
                if handle_input(app, key).await? {
                    return Ok(());
                }
            }
        }

        // Apply finished validations and API results
        app.check_background_tasks();

        // Check if we should quit
        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}
