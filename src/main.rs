mod api;
mod app;
mod config;
mod constants;
mod draft;
mod error;
mod events;
mod inbox;
mod model;
mod session;
#[cfg(test)]
mod testing;
mod thread;
mod transport;
mod ui;

use anyhow::{Context, Result};
use std::env;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::{App, AppController};
use crate::config::Config;
use crate::events::Emitter;

fn setup_logging() {
    use std::fs::OpenOptions;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,draftly=debug"));

    // Try to create a log file in the config directory
    let log_file = Config::config_dir()
        .ok()
        .map(|dir| dir.join("draftly.log"))
        .and_then(|path| {
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&path)
                .ok()
        });

    if let Some(file) = log_file {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false),
            )
            .init();
    } else {
        // Fallback to stderr if file logging fails
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_usage() {
    eprintln!(
        r#"draftly - AI reply drafts for your inbox, from the terminal

Usage: draftly [command]

Commands:
    (none)      Start the client
    login       Sign in through the browser and store the session
    logout      Sign out and forget the stored session
    help        Show this help message

Configuration file: ~/.config/draftly/config.toml
Environment: DRAFTLY_BASE_URL, DRAFTLY_SESSION_TOKEN, RUST_LOG
"#
    );
}

async fn run_login() -> Result<()> {
    use std::io::{self, Write};

    let config = Config::load()?;
    config.ensure_dirs()?;
    let config_path = Config::config_path()?;
    if !config_path.exists() {
        config.save()?;
        println!("Wrote default configuration to {}", config_path.display());
    }

    let url = config.server.login_url();
    println!("Opening {} in your browser.", url);
    if let Err(e) = open::that(&url) {
        println!("Could not open a browser ({}); visit the address above.", e);
    }

    print!("Paste the session token shown after signing in: ");
    io::stdout().flush()?;
    let token = read_secret()?;
    println!();
    if token.is_empty() {
        anyhow::bail!("No token entered");
    }

    let controller = AppController::new(config, Emitter::silent())?;
    let email = controller
        .sign_in_with_token(&token)
        .await
        .context("The server did not accept that token")?;
    println!("Signed in as {}. Run 'draftly' to start.", email);
    Ok(())
}

async fn run_logout() -> Result<()> {
    let config = Config::load()?;
    let controller = AppController::new(config, Emitter::silent())?;
    controller.logout().await;
    println!("Signed out.");
    Ok(())
}

fn read_secret() -> Result<String> {
    use std::io;

    let _guard = DisableEcho::new()?;

    let mut secret = String::new();
    io::stdin().read_line(&mut secret)?;
    Ok(secret.trim().to_string())
}

struct DisableEcho {
    #[cfg(unix)]
    original: libc::termios,
}

impl DisableEcho {
    #[cfg(unix)]
    fn new() -> Result<Self> {
        use std::mem::MaybeUninit;
        use std::os::unix::io::AsRawFd;

        let fd = std::io::stdin().as_raw_fd();
        let mut termios = MaybeUninit::<libc::termios>::uninit();

        unsafe {
            if libc::tcgetattr(fd, termios.as_mut_ptr()) != 0 {
                anyhow::bail!("Failed to get terminal attributes");
            }
            let original = termios.assume_init();
            let mut quiet = original;
            quiet.c_lflag &= !libc::ECHO;
            if libc::tcsetattr(fd, libc::TCSANOW, &quiet) != 0 {
                anyhow::bail!("Failed to set terminal attributes");
            }
            Ok(Self { original })
        }
    }

    #[cfg(not(unix))]
    fn new() -> Result<Self> {
        Ok(Self {})
    }
}

#[cfg(unix)]
impl Drop for DisableEcho {
    fn drop(&mut self) {
        use std::os::unix::io::AsRawFd;
        let fd = std::io::stdin().as_raw_fd();
        unsafe {
            libc::tcsetattr(fd, libc::TCSANOW, &self.original);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("help") | Some("--help") | Some("-h") => {
            print_usage();
            Ok(())
        }
        Some("login") => {
            setup_logging();
            run_login().await
        }
        Some("logout") => {
            setup_logging();
            run_logout().await
        }
        Some(cmd) => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            std::process::exit(1);
        }
        None => {
            setup_logging();

            let config = Config::load()?;
            config.ensure_dirs()?;
            tracing::info!("Using backend {}", config.server.base_url);

            let mut app = App::new(config)?;
            app.run().await
        }
    }
}
