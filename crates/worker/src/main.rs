use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use feed::youtube::{YouTubeClient, DEFAULT_API_URL};
use focustube_core::auth::generate_api_key;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

mod jobs;

#[derive(Debug, Parser)]
#[command(name = "focustube-worker")]
#[command(about = "FocusTube background jobs and admin tasks", version)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Keep the channel cache fresh until interrupted.
    Run {
        #[command(flatten)]
        youtube: YoutubeArgs,
        #[arg(
            long,
            env = "FOCUSTUBE_REFRESH_INTERVAL_SECS",
            default_value_t = 3600,
            value_parser = clap::value_parser!(u64).range(1..)
        )]
        interval_secs: u64,
        #[arg(
            long,
            env = "FOCUSTUBE_REFRESH_BATCH_SIZE",
            default_value_t = 50,
            value_parser = clap::value_parser!(i64).range(1..)
        )]
        batch_size: i64,
    },
    /// Refresh every subscribed channel once, regardless of age.
    RefreshAll {
        #[command(flatten)]
        youtube: YoutubeArgs,
        #[arg(long, default_value_t = 1000)]
        limit: i64,
    },
    /// Create a profile and print its first API key.
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "UTC")]
        timezone: String,
        #[arg(long, default_value = "default")]
        key_name: String,
    },
}

#[derive(Debug, Args)]
struct YoutubeArgs {
    #[arg(long, env = "FOCUSTUBE_YOUTUBE_API_KEY", hide_env_values = true)]
    youtube_api_key: String,
    #[arg(long, env = "FOCUSTUBE_YOUTUBE_API_URL", default_value = DEFAULT_API_URL)]
    youtube_api_url: String,
}

impl YoutubeArgs {
    fn client(&self) -> Result<YouTubeClient> {
        Ok(YouTubeClient::new(&self.youtube_api_url, &self.youtube_api_key)?)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    let database_url = cli
        .database_url
        .or_else(|| std::env::var("FOCUSTUBE_DATABASE_URL").ok())
        .context("DATABASE_URL or FOCUSTUBE_DATABASE_URL must be set")?;

    let db = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;
    db::migrate(&db).await?;

    match cli.command {
        Command::Run {
            youtube,
            interval_secs,
            batch_size,
        } => {
            let client = youtube.client()?;
            info!(interval_secs, batch_size, "worker starting");
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!(error = %e, "ctrl-c listener failed");
                }
            };
            jobs::refresh::run_loop(
                &db,
                &client,
                Duration::from_secs(interval_secs),
                batch_size,
                shutdown,
            )
            .await;
        }
        Command::RefreshAll { youtube, limit } => {
            let client = youtube.client()?;
            let summary =
                jobs::refresh::refresh_stale(&db, &client, Duration::ZERO, limit).await?;
            info!(refreshed = summary.refreshed, failed = summary.failed, "refresh finished");
        }
        Command::CreateUser {
            email,
            timezone,
            key_name,
        } => create_user(&db, &email, &timezone, &key_name).await?,
    }

    Ok(())
}

async fn create_user(db: &PgPool, email: &str, timezone: &str, key_name: &str) -> Result<()> {
    let email = email.trim().to_lowercase();
    if !email.contains('@') {
        anyhow::bail!("{email:?} is not an email address");
    }
    if !db::queries::profiles::is_valid_timezone(db, timezone).await? {
        anyhow::bail!("unknown timezone {timezone:?}");
    }

    let user_id = format!("usr_{}", nanoid::nanoid!(16));
    let profile = db::queries::profiles::create(db, &user_id, &email, timezone)
        .await
        .map_err(|e| {
            if db::is_unique_violation(&e) {
                anyhow::anyhow!("a profile for {email} already exists")
            } else {
                e.into()
            }
        })?;

    let (raw, hash, prefix) = generate_api_key();
    let key_id = format!("key_{}", nanoid::nanoid!(12));
    db::queries::api_keys::create(db, &key_id, &hash, &prefix, &profile.id, Some(key_name)).await?;

    info!(user_id = %profile.id, key_id = %key_id, "user created");
    println!("user_id: {}", profile.id);
    println!("api_key: {raw}");
    Ok(())
}
