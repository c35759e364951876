use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use modgate::config::Config;
use modgate::crypto::{MasterKey, SigningKeys, rotate_master_secret};
use modgate::db::{self, AppState};
use modgate::handlers;

#[derive(Parser)]
#[command(name = "modgate", about = "Entitlement verification and key distribution server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Re-encrypt every stored account secret under a new master secret.
    /// Offline maintenance: run against a quiesced or live database, then
    /// update MASTER_SECRET in the deployment before the next restart.
    RotateMasterKey {
        /// The new master secret. The old one is read from MASTER_SECRET.
        #[arg(long)]
        new_secret: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::RotateMasterKey { new_secret } => rotate(config, &new_secret),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = db::open_pool(&config.database_path)?;
    {
        let conn = pool.get()?;
        db::init_schema(&conn)?;
    }

    // A stable signing identity is a precondition for serving Verify:
    // unreadable or corrupt key material must stop the process here.
    let signing = SigningKeys::load_or_generate(&config.keys_dir)
        .context("failed to load signing keypair")?;
    tracing::info!(
        public_key = %hex::encode(signing.public_key().to_bytes()),
        "signing identity loaded"
    );

    let state = AppState {
        db: pool,
        master_key: MasterKey::from_secret(&config.master_secret),
        signing: Arc::new(signing),
        admin_token: config.admin_token.clone(),
    };

    let app = handlers::app(state);
    let listener = tokio::net::TcpListener::bind(config.addr()).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

fn rotate(config: Config, new_secret: &str) -> anyhow::Result<()> {
    if new_secret.len() < 16 {
        anyhow::bail!("new master secret must be at least 16 characters");
    }
    if new_secret == config.master_secret {
        anyhow::bail!("new master secret matches the current one");
    }

    let pool = db::open_pool(&config.database_path)?;
    {
        let conn = pool.get()?;
        db::init_schema(&conn)?;
    }

    let old = MasterKey::from_secret(&config.master_secret);
    let new = MasterKey::from_secret(new_secret);

    let report = rotate_master_secret(&pool, &old, &new)?;

    println!("Rotation complete.");
    println!("  rotated: {}", report.rotated);
    println!("  skipped: {}", report.skipped);
    println!("  failed:  {}", report.failed.len());
    for account_id in &report.failed {
        println!("  FAILED {account_id} - secret must be re-issued manually");
    }
    println!("Update MASTER_SECRET to the new value before the next restart.");

    if report.failed.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("{} account(s) failed to rotate", report.failed.len())
    }
}
