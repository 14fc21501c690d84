// Copyright (c) 2024-2025 The portalguard Authors
// Licensed under the MIT License. See LICENSE file for details.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use portalguard::auth::{password, AuthService};
use portalguard::auth::principals::RosterStore;
use portalguard::auth::token::TokenSigner;
use portalguard::client::{ClientError, PortalClient};
use portalguard::config::PortalConfig;
use portalguard::guard::AttemptGuard;
use portalguard::server::Server;
use portalguard::session::store::SessionStore;
use portalguard::session::{
    format_countdown, format_elapsed, MonitorEvent, MonitorState, SessionConfig, SessionMonitor,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit codes following sysexits.h conventions
mod exit_codes {
    /// Success - operation completed successfully
    pub const SUCCESS: i32 = 0;
    /// General error - unspecified error
    pub const ERROR: i32 = 1;
    /// Service unavailable - portal server not reachable
    pub const SERVICE_UNAVAILABLE: i32 = 69;
    /// Temporary failure - locked out or session expired, try again later
    pub const TEMP_FAIL: i32 = 75;
    /// Configuration error - invalid or missing config
    pub const CONFIG: i32 = 78;
}

use exit_codes::*;

/// portalguard - Student portal authentication
#[derive(Parser)]
#[command(name = "portalguard")]
#[command(version = VERSION)]
#[command(about = "Student portal authentication: login, session watch, logout.")]
#[command(long_about = "portalguard - Student portal authentication\n\n\
    Run the server:      portalguard serve\n\
    Log in:              portalguard login\n\
    Watch the session:   portalguard watch\n\
    Log out:             portalguard logout\n\
    Roster tooling:      portalguard hash-password")]
struct Cli {
    /// Path to the config file (default: ~/.portalguard/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the portal API server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
        /// Bind address (overrides config; 0.0.0.0 exposes on the network)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Log in to the portal and store the session locally
    Login {
        /// Student identifier (prompted when omitted)
        #[arg(long)]
        student_id: Option<String>,
        /// Remember the identifier (never the password) for next time
        #[arg(long)]
        remember: bool,
    },
    /// Watch the current session: activity resets the inactivity timer,
    /// a warning shows 5 minutes before auto-logout
    Watch,
    /// End the current session
    Logout {
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Show the locally stored session
    Status,
    /// Hash a password for a roster entry
    HashPassword,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portalguard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = match PortalConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "[✗]".red(), e);
            std::process::exit(CONFIG);
        }
    };

    let code = match cli.command {
        Command::Serve { port, bind } => cmd_serve(&config, port, bind).await,
        Command::Login {
            student_id,
            remember,
        } => cmd_login(&config, student_id, remember).await,
        Command::Watch => cmd_watch(&config).await,
        Command::Logout { yes } => cmd_logout(&config, yes).await,
        Command::Status => cmd_status(),
        Command::HashPassword => cmd_hash_password(),
    };

    std::process::exit(code);
}

// =============================================================================
// serve
// =============================================================================

async fn cmd_serve(config: &PortalConfig, port: Option<u16>, bind: Option<String>) -> i32 {
    let secret = match PortalConfig::jwt_secret() {
        Ok(secret) => secret,
        Err(e) => {
            eprintln!("{} {}", "[✗]".red(), e);
            return CONFIG;
        }
    };

    let roster = match RosterStore::load(&config.auth.roster_path) {
        Ok(roster) => roster,
        Err(e) => {
            eprintln!("{} {:#}", "[✗]".red(), e);
            eprintln!(
                "Create one with: portalguard hash-password, then write {}",
                config.auth.roster_path.display()
            );
            return CONFIG;
        }
    };
    if roster.is_empty() {
        tracing::warn!("Roster is empty; every login will fail");
    }

    let auth = AuthService::new(
        Arc::new(roster),
        AttemptGuard::new(
            config.auth.max_login_attempts,
            config.auth.lockout_window_secs,
        ),
        TokenSigner::new(&secret, config.auth.token_ttl_secs),
    );

    let server = Server::new(port.unwrap_or(config.server.port)).with_bind_address(
        bind.unwrap_or_else(|| config.server.bind_address.clone()),
    );

    match server.start(auth).await {
        Ok(()) => SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "[✗]".red(), e);
            ERROR
        }
    }
}

// =============================================================================
// login
// =============================================================================

async fn cmd_login(config: &PortalConfig, student_id: Option<String>, remember: bool) -> i32 {
    let store = match SessionStore::new() {
        Ok(store) => store,
        Err(e) => {
            eprintln!("{} {}", "[✗]".red(), e);
            return ERROR;
        }
    };

    let remembered = store
        .load()
        .ok()
        .and_then(|state| state.remembered_student_id);

    let student_id = match student_id {
        Some(id) => id,
        None => {
            let mut prompt = inquire::Text::new("Student ID:");
            if let Some(ref remembered) = remembered {
                prompt = prompt.with_initial_value(remembered);
            }
            match prompt.prompt() {
                Ok(id) => id,
                Err(_) => return ERROR,
            }
        }
    };

    let client = PortalClient::new(&config.api_base);
    let max_attempts = config.auth.max_login_attempts;
    let mut failed_attempts: usize = 0;

    loop {
        let password = match inquire::Password::new("Password:")
            .without_confirmation()
            .with_display_mode(inquire::PasswordDisplayMode::Masked)
            .prompt()
        {
            Ok(password) => password,
            Err(_) => return ERROR,
        };

        match client.login(&student_id, &password).await {
            Ok(success) => {
                let now_ms = Utc::now().timestamp_millis();
                if let Err(e) =
                    store.save_login(&success.token, &success.student, now_ms, remember)
                {
                    eprintln!("{} Could not persist session: {}", "[✗]".red(), e);
                    return ERROR;
                }

                println!(
                    "{} Welcome, {} {}! Session valid for {} hours.",
                    "[OK]".green(),
                    success.student.first_name,
                    success.student.last_name,
                    success.expires_in / 3600
                );
                println!("Run {} to keep the session alive.", "portalguard watch".bold());
                return SUCCESS;
            }
            Err(ClientError::InvalidCredentials { message }) => {
                failed_attempts += 1;
                let remaining = max_attempts.saturating_sub(failed_attempts);
                eprintln!("{} {}", "[✗]".red(), message);
                if remaining > 0 {
                    eprintln!("Attempts remaining: {}", remaining);
                }
            }
            Err(ClientError::RateLimited {
                remaining_seconds, ..
            }) => {
                eprintln!(
                    "{} Too many login attempts. Account locked for {}.",
                    "[✗]".red(),
                    format_countdown(remaining_seconds)
                );
                return TEMP_FAIL;
            }
            Err(ClientError::InvalidInput { message }) => {
                eprintln!("{} {}", "[✗]".red(), message);
                return ERROR;
            }
            Err(e @ ClientError::Network { .. }) => {
                eprintln!("{} {}", "[✗]".red(), e);
                return SERVICE_UNAVAILABLE;
            }
            Err(ClientError::Server { message }) => {
                eprintln!("{} {}", "[✗]".red(), message);
                return ERROR;
            }
        }
    }
}

// =============================================================================
// watch
// =============================================================================

/// Lines typed by the user while the watcher runs. Anything counts as
/// activity; `q`, `quit`, and `logout` open the logout confirmation.
enum WatchInput {
    Activity,
    LogoutRequested,
    ConfirmLine(String),
}

async fn cmd_watch(config: &PortalConfig) -> i32 {
    let store = match SessionStore::new() {
        Ok(store) => store,
        Err(e) => {
            eprintln!("{} {}", "[✗]".red(), e);
            return ERROR;
        }
    };

    let Some(session) = store.load().ok().and_then(|state| state.session) else {
        eprintln!("{} Not logged in. Run: portalguard login", "[✗]".red());
        return ERROR;
    };

    let student_id = session.profile.student_id.clone();
    let login_at_ms = session.login_at_ms;
    let token = session.token.clone();

    println!(
        "Watching session for {} ({} {}). Press Enter to register activity, 'q' to log out.",
        student_id.bold(),
        session.profile.first_name,
        session.profile.last_name
    );

    // Stdin reader thread: every line becomes an input event. The channel
    // also carries confirmation replies, interpreted by the loop below.
    let (tx, rx) = std::sync::mpsc::channel::<String>();
    std::thread::spawn(move || {
        use std::io::BufRead;
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    // Ctrl+C stops the watcher without ending the session. Token expiry on
    // the server is unaffected either way.
    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        if let Err(e) = ctrlc::set_handler(move || {
            interrupted.store(true, Ordering::SeqCst);
        }) {
            tracing::warn!("Could not install Ctrl+C handler: {}", e);
        }
    }

    let mut monitor = SessionMonitor::new(SessionConfig {
        timeout_secs: config.session.timeout_secs,
        warning_secs: config.session.warning_secs,
        ..SessionConfig::default()
    });

    let client = PortalClient::new(&config.api_base);
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let mut awaiting_confirmation = false;

    loop {
        ticker.tick().await;

        if interrupted.load(Ordering::SeqCst) {
            println!();
            println!("Watcher stopped. The session stays active until it times out.");
            return SUCCESS;
        }

        // Drain pending input events.
        while let Ok(line) = rx.try_recv() {
            let input = if awaiting_confirmation {
                WatchInput::ConfirmLine(line)
            } else {
                match line.trim() {
                    "q" | "quit" | "logout" => WatchInput::LogoutRequested,
                    _ => WatchInput::Activity,
                }
            };

            match input {
                WatchInput::Activity => {
                    if monitor.record_activity() {
                        let _ = store.touch_activity(Utc::now().timestamp_millis());
                        println!("\n{} Activity recorded.", "[OK]".green());
                    }
                }
                WatchInput::LogoutRequested => {
                    let elapsed = elapsed_since_ms(login_at_ms);
                    println!();
                    println!(
                        "Are you sure you want to end your session? Session active for {}. [y/N]",
                        format_elapsed(elapsed).bold()
                    );
                    awaiting_confirmation = true;
                }
                WatchInput::ConfirmLine(reply) => {
                    awaiting_confirmation = false;
                    if matches!(reply.trim().to_lowercase().as_str(), "y" | "yes") {
                        monitor.terminate();
                        client.logout(&token).await;
                        let _ = store.clear_session();
                        println!("{} Logged out successfully.", "[OK]".green());
                        return SUCCESS;
                    }
                    println!("Logout cancelled.");
                    // The exchange itself is user activity.
                    monitor.record_activity();
                    let _ = store.touch_activity(Utc::now().timestamp_millis());
                }
            }
        }

        match monitor.poll() {
            Some(MonitorEvent::WarningStarted { remaining_secs }) => {
                println!();
                println!(
                    "{} Session expires in {}. Press Enter to stay signed in.",
                    "[!]".yellow(),
                    format_countdown(remaining_secs).bold()
                );
            }
            Some(MonitorEvent::Expired { .. }) => {
                // Inactivity ran the warning down. Best-effort server
                // notification; local cleanup happens regardless of whether
                // it lands.
                client.logout(&token).await;
                let _ = store.clear_session();
                println!();
                println!(
                    "{} Session expired due to inactivity. Please login again.",
                    "[!]".yellow()
                );
                return TEMP_FAIL;
            }
            None => {}
        }

        render_status_line(&monitor, &student_id, login_at_ms);
    }
}

/// One-line rolling status display, rewritten in place once per second.
fn render_status_line(monitor: &SessionMonitor, student_id: &str, login_at_ms: i64) {
    use std::io::Write;

    let elapsed = format_elapsed(elapsed_since_ms(login_at_ms));
    let line = match monitor.state() {
        MonitorState::Active => format!(
            "Session active | {} | elapsed {} | auto-logout in {}",
            student_id,
            elapsed,
            format_countdown(monitor.remaining_secs())
        ),
        MonitorState::WarningActive => format!(
            "{} expiring in {} | press Enter to stay signed in",
            student_id,
            format_countdown(monitor.remaining_secs())
        )
        .yellow()
        .to_string(),
        MonitorState::Expired => String::new(),
    };

    print!("\r{:<78}", line);
    let _ = std::io::stdout().flush();
}

fn elapsed_since_ms(login_at_ms: i64) -> u64 {
    let elapsed_ms = Utc::now().timestamp_millis().saturating_sub(login_at_ms);
    (elapsed_ms / 1000).max(0) as u64
}

// =============================================================================
// logout / status
// =============================================================================

async fn cmd_logout(config: &PortalConfig, yes: bool) -> i32 {
    let store = match SessionStore::new() {
        Ok(store) => store,
        Err(e) => {
            eprintln!("{} {}", "[✗]".red(), e);
            return ERROR;
        }
    };

    let Some(session) = store.load().ok().and_then(|state| state.session) else {
        println!("Not logged in.");
        return SUCCESS;
    };

    let elapsed = format_elapsed(elapsed_since_ms(session.login_at_ms));

    // Confirmation shows the elapsed session duration before committing.
    // Skipped when --yes is given or stdin is not a terminal.
    if !yes && atty::is(atty::Stream::Stdin) {
        let confirmed = inquire::Confirm::new(&format!(
            "End your session? (active for {})",
            elapsed
        ))
        .with_default(false)
        .prompt()
        .unwrap_or(false);

        if !confirmed {
            println!("Logout cancelled.");
            return SUCCESS;
        }
    }

    let client = PortalClient::new(&config.api_base);
    client.logout(&session.token).await;

    if let Err(e) = store.clear_session() {
        eprintln!("{} Could not clear session state: {}", "[✗]".red(), e);
        return ERROR;
    }

    println!(
        "{} Logged out successfully. Session lasted {}.",
        "[OK]".green(),
        elapsed
    );
    SUCCESS
}

fn cmd_status() -> i32 {
    let store = match SessionStore::new() {
        Ok(store) => store,
        Err(e) => {
            eprintln!("{} {}", "[✗]".red(), e);
            return ERROR;
        }
    };

    let state = match store.load() {
        Ok(state) => state,
        Err(e) => {
            eprintln!("{} {}", "[✗]".red(), e);
            return ERROR;
        }
    };

    match state.session {
        Some(session) => {
            println!("Logged in as {}", session.profile.student_id.bold());
            println!(
                "  Name:    {} {}",
                session.profile.first_name, session.profile.last_name
            );
            println!("  Course:  {} ({})", session.profile.course, session.profile.batch);
            println!(
                "  Elapsed: {}",
                format_elapsed(elapsed_since_ms(session.login_at_ms))
            );
        }
        None => match state.remembered_student_id {
            Some(id) => println!("Not logged in (remembered student: {})", id),
            None => println!("Not logged in."),
        },
    }
    SUCCESS
}

// =============================================================================
// hash-password
// =============================================================================

fn cmd_hash_password() -> i32 {
    let password = match inquire::Password::new("Password to hash:")
        .with_display_mode(inquire::PasswordDisplayMode::Masked)
        .prompt()
    {
        Ok(password) => password,
        Err(_) => return ERROR,
    };

    match password::hash_password(&password) {
        Ok(hash) => {
            println!("{}", hash);
            println!();
            println!("Roster entry template:");
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "student_id": "NEET2024001",
                    "password_hash": hash,
                    "first_name": "First",
                    "last_name": "Last",
                    "email": "student@example.org",
                    "course": "NEET",
                    "batch": "2024-A",
                    "is_active": true
                }))
                .unwrap_or_default()
            );
            SUCCESS
        }
        Err(e) => {
            eprintln!("{} {}", "[✗]".red(), e);
            ERROR
        }
    }
}
