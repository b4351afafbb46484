//! GWM Check-in CLI
//!
//! Command-line interface for the daily check-in on the GWM (Haval) app.
//!
//! # Usage
//!
//! ```bash
//! # Show the current point balance
//! gwm-checkin points
//!
//! # Do the daily check-in
//! gwm-checkin check-in
//!
//! # Balance, check-in, balance again (suitable for cron)
//! gwm-checkin run --format json
//!
//! # Keep the account password in the OS keyring
//! echo 'hunter2' | gwm-checkin set-password
//! ```

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use gwm_checkin_core::config::APP_NAME;
use gwm_checkin_core::{
    ApiClient, ApiResult, CheckInReceipt, Config, DEFAULT_BUSINESS_ID, DEFAULT_TASK_CODE,
    FileSessionStore, KeyringPasswordStore, PointBalance, Secret, SessionStore,
};

#[derive(Parser)]
#[command(name = "gwm-checkin")]
#[command(about = "Daily check-in and point balance for the GWM Haval app")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current point balance
    Points,

    /// Submit a check-in task
    CheckIn {
        /// Task code
        #[arg(long, default_value = DEFAULT_TASK_CODE)]
        task_code: String,

        /// Business identifier
        #[arg(long, default_value = DEFAULT_BUSINESS_ID)]
        business_id: String,
    },

    /// Log in and store a fresh session, even if one is stored already
    Login,

    /// Balance, daily check-in, then the balance again
    Run,

    /// Forget the stored session
    Logout,

    /// Store the account password in the OS keyring (read from stdin)
    SetPassword {
        /// Account to store the password for (defaults to the configured one)
        #[arg(short, long)]
        username: Option<String>,

        /// Remove the stored password instead
        #[arg(long)]
        delete: bool,
    },
}

#[derive(Serialize)]
struct LoginReport<'a> {
    account: &'a str,
    session_path: PathBuf,
}

#[derive(Serialize)]
struct RunReport {
    points: ApiResult<PointBalance>,
    check_in: ApiResult<CheckInReceipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    points_after: Option<ApiResult<PointBalance>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("warning: failed to read .env: {}", e);
        }
    }
    init_tracing(cli.verbose);

    let format = cli.format;
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Points => points(config_path, format).await,
        Commands::CheckIn {
            task_code,
            business_id,
        } => check_in(config_path, format, &task_code, &business_id).await,
        Commands::Login => login(config_path, format).await,
        Commands::Run => run(config_path, format).await,
        Commands::Logout => logout(config_path).await,
        Commands::SetPassword { username, delete } => set_password(config_path, username, delete),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration without requiring it to be complete.
fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = Config::load(path).context("Failed to load configuration")?;
    if let Some(path) = &config.config_path {
        debug!("Using configuration file {:?}", path);
    }
    Ok(config)
}

/// Load configuration for commands that talk to the backend.
fn load_complete_config(path: Option<&Path>) -> Result<Arc<Config>> {
    let mut config = load_config(path)?;
    if let Err(e) = config.fill_password_from_keyring() {
        warn!("Could not read the password from the OS keyring: {}", e);
    }
    config.validate().context("Incomplete configuration")?;
    Ok(Arc::new(config))
}

fn client(path: Option<&Path>) -> Result<ApiClient<FileSessionStore>> {
    let config = load_complete_config(path)?;
    ApiClient::from_config(config).context("Failed to create API client")
}

fn emit<T: Serialize>(format: OutputFormat, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => println!("{}", text()),
    }
    Ok(())
}

fn describe_points(result: &ApiResult<PointBalance>) -> String {
    match result {
        ApiResult::Success(points) => format!("Points: {}", points),
        ApiResult::DomainError { code, message } => {
            format!("Point balance refused ({}): {}", code, message)
        }
    }
}

fn describe_check_in(result: &ApiResult<CheckInReceipt>) -> String {
    match result {
        ApiResult::Success(receipt) if receipt.message.is_empty() => "Check-in done".to_string(),
        ApiResult::Success(receipt) => format!("Check-in done: {}", receipt.message),
        ApiResult::DomainError { code, message } => {
            format!("Check-in refused ({}): {}", code, message)
        }
    }
}

async fn points(path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let mut client = client(path)?;
    let result = client
        .get_points()
        .await
        .context("Failed to fetch the point balance")?;
    emit(format, &result, || describe_points(&result))
}

async fn check_in(
    path: Option<&Path>,
    format: OutputFormat,
    task_code: &str,
    business_id: &str,
) -> Result<()> {
    let mut client = client(path)?;
    let result = client
        .check_in(task_code, business_id)
        .await
        .context("Failed to check in")?;
    emit(format, &result, || describe_check_in(&result))
}

async fn login(path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let mut client = client(path)?;
    client.session_mut().login().await.context("Login failed")?;

    let report = LoginReport {
        account: &client.config().credentials.username,
        session_path: client.config().session_path(),
    };
    emit(format, &report, || {
        format!(
            "Logged in as {}, session stored at {}",
            report.account,
            report.session_path.display()
        )
    })
}

async fn run(path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let mut client = client(path)?;

    let points = client
        .get_points()
        .await
        .context("Failed to fetch the point balance")?;
    let check_in = client
        .check_in_default()
        .await
        .context("Failed to check in")?;
    let points_after = if check_in.is_success() {
        Some(
            client
                .get_points()
                .await
                .context("Failed to fetch the point balance after check-in")?,
        )
    } else {
        None
    };

    let report = RunReport {
        points,
        check_in,
        points_after,
    };
    emit(format, &report, || {
        let mut lines = vec![
            describe_points(&report.points),
            describe_check_in(&report.check_in),
        ];
        if let Some(after) = &report.points_after {
            lines.push(describe_points(after).replacen("Points", "Points now", 1));
        }
        lines.join("\n")
    })
}

async fn logout(path: Option<&Path>) -> Result<()> {
    let config = load_config(path)?;
    let store = FileSessionStore::new(config.session_path());
    store
        .clear()
        .await
        .with_context(|| format!("Failed to remove {}", store.path().display()))?;
    println!("Session cleared");
    Ok(())
}

fn set_password(path: Option<&Path>, username: Option<String>, delete: bool) -> Result<()> {
    let config = load_config(path)?;
    let Some(username) = username
        .or_else(|| Some(config.credentials.username.clone()))
        .filter(|u| !u.trim().is_empty())
    else {
        bail!("No account given: pass --username or configure USERNAME");
    };
    let vault = KeyringPasswordStore::try_new(APP_NAME).context("OS keyring is not available")?;

    if delete {
        vault
            .delete(&username)
            .context("Failed to remove the password from the OS keyring")?;
        println!("Password removed for {}", username);
        return Ok(());
    }

    eprintln!("Password for {} (read from stdin):", username);
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read the password")?;
    let password = Secret::new(line.trim_end_matches(['\r', '\n']));
    if password.is_empty() {
        bail!("Empty password, nothing stored");
    }

    vault
        .set(&username, &password)
        .context("Failed to store the password in the OS keyring")?;
    println!("Password stored for {}", username);
    Ok(())
}
