use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use fitsync::config::{encryption_key_from_env, load_config, FitsyncConfig};
use fitsync::credentials::{generate_key, CredentialStore};
use fitsync::endpoints::{is_known_period, ActivityDate, EndpointRegistry, DEFAULT_PERIOD};
use fitsync::oauth::FitbitClient;
use fitsync::session::{ApiResult, ApiSession, UnitSystem};
use fitsync_views::{execute, ReportQuery};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "fitsync", version, about = "Fitbit token lifecycle and API access")]
struct Cli {
    /// TOML config file; FITSYNC_* variables override it
    #[arg(short, long, env = "FITSYNC_CONFIG")]
    config: Option<String>,

    /// Unit system for this run: "" or metric, en_US, en_GB
    #[arg(long, global = true)]
    units: Option<UnitSystem>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a Fitbit authorization URL and its state token
    AuthorizeUrl,
    /// Exchange an authorization code and store the user's tokens
    Link { user_id: String, code: String },
    /// Remove the user's stored tokens
    Unlink { user_id: String },
    Profile { user_id: String },
    Badges { user_id: String },
    /// Daily activity summary
    Activity {
        user_id: String,
        /// YYYY-MM-DD; defaults to the user's today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Activity time series, e.g. `activities/steps`
    Series {
        user_id: String,
        resource: String,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, default_value = DEFAULT_PERIOD)]
        period: String,
    },
    /// Rows for one endpoint across users
    Report {
        /// profile, badges or daily_activity_summary
        endpoint: String,
        /// Repeatable; defaults to every linked user
        #[arg(long = "user")]
        users: Vec<String>,
        /// Path parameter as name=value, e.g. date=2024-05-01
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
    /// List users with stored tokens
    Users,
    /// Print a new base64 encryption key
    GenKey,
}

fn parse_param(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected name=value, got '{s}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays parseable JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fitsync=info,fitsync_views=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Command::GenKey = cli.command {
        println!("{}", generate_key());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => FitsyncConfig::from_env()?,
    };
    let session = build_session(&config, cli.units)?;

    match cli.command {
        Command::AuthorizeUrl => {
            let request = session.authorization_request();
            print_json(&serde_json::json!({ "url": request.url, "state": request.state }))?;
        }
        Command::Link { user_id, code } => {
            let window = api(session.link_user(&user_id, &code).await)?;
            print_json(&serde_json::json!({
                "user_id": user_id,
                "provider_subject_id": window.provider_subject_id,
                "expires_at": window.expires_at,
            }))?;
        }
        Command::Unlink { user_id } => {
            let removed = api(session.unlink_user(&user_id).await)?;
            print_json(&serde_json::json!({ "user_id": user_id, "removed": removed }))?;
        }
        Command::Profile { user_id } => {
            print_json(&api(session.get_profile(&user_id).await)?)?;
        }
        Command::Badges { user_id } => {
            print_json(&api(session.get_badges(&user_id).await)?)?;
        }
        Command::Activity { user_id, date } => {
            let date = date.map(ActivityDate::from);
            print_json(&api(session.get_daily_activity_summary(&user_id, date).await)?)?;
        }
        Command::Series {
            user_id,
            resource,
            date,
            period,
        } => {
            if !is_known_period(&period) {
                warn!(period = %period, "Unrecognised period, sending as-is");
            }
            let date = date.map(ActivityDate::from);
            let series = session
                .get_activity_time_series(&user_id, &resource, date, Some(&period))
                .await;
            print_json(&api(series)?)?;
        }
        Command::Report {
            endpoint,
            users,
            params,
        } => {
            let mut query = ReportQuery::new(endpoint);
            if !users.is_empty() {
                query = query.for_users(users);
            }
            query.params = params;
            let report = execute(&session, &EndpointRegistry::builtin(), &query).await?;
            print_json(&report)?;
        }
        Command::Users => {
            print_json(&api(session.linked_users())?)?;
        }
        // Needs no config; handled above
        Command::GenKey => {}
    }

    Ok(())
}

fn build_session(config: &FitsyncConfig, units: Option<UnitSystem>) -> Result<ApiSession> {
    let encryption_key = encryption_key_from_env()?;
    let store = Arc::new(
        CredentialStore::new(&config.storage.database, &encryption_key)
            .context("Failed to initialize credential store")?,
    );
    let provider = Arc::new(
        FitbitClient::with_base_url(config.provider_config()?, config.api.base_url.clone())
            .context("Failed to initialize Fitbit client")?,
    );
    let unit_system = units.unwrap_or(config.api.unit_system);

    info!(
        database = %config.storage.database,
        api_base_url = %config.api.base_url,
        unit_system = %unit_system,
        "Configuration loaded"
    );
    Ok(ApiSession::with_unit_system(store, provider, unit_system))
}

/// Adds a re-link hint to failures only re-authorization can clear.
fn api<T>(result: ApiResult<T>) -> Result<T> {
    result.map_err(|e| {
        if e.needs_reauthorization() {
            warn!("Run `fitsync authorize-url` and `fitsync link` to re-authorize this user");
        }
        anyhow::Error::new(e)
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
