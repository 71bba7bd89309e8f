use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use form_auth_server::{config::parse_log_level, serve, JwtIssuer, RedbDirectory, ServerConfig};
use form_eth_auth::{AuthContext, MemoryDirectory, UserDirectory};

#[derive(Clone, Debug, Parser)]
pub struct Cli {
    /// Address to listen on, overrides ETH_AUTH_BIND
    #[clap(long, short)]
    bind: Option<SocketAddr>,
    /// Path of the user database, overrides ETH_AUTH_DB_PATH
    #[clap(long, short, alias = "db")]
    db_path: Option<PathBuf>,
    /// Keep users in memory only (development)
    #[clap(long)]
    in_memory: bool,
    /// Log level, overrides ETH_AUTH_LOG_LEVEL
    #[clap(long, short)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let parser = Cli::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(bind) = parser.bind {
        config.bind = bind;
    }
    if let Some(db_path) = parser.db_path {
        config.db_path = db_path;
    }
    if let Some(level) = &parser.log_level {
        config.log_level = parse_log_level(level)?;
    }

    simple_logger::SimpleLogger::new().with_level(config.log_level).init()?;

    config.validate()?;
    let secret = config
        .token_secret
        .as_deref()
        .ok_or("token secret required")?;

    let directory: Arc<dyn UserDirectory> = if parser.in_memory {
        log::warn!("Using in-memory user directory, users are lost on restart");
        Arc::new(MemoryDirectory::new())
    } else {
        log::info!("Opening user database at {}", config.db_path.display());
        Arc::new(RedbDirectory::open(&config.db_path).map_err(|e| e.to_string())?)
    };

    let issuer = Arc::new(JwtIssuer::new(secret.as_bytes(), config.token_ttl));
    let ctx = AuthContext::new(directory, issuer);

    serve(ctx, config.bind).await?;

    Ok(())
}
