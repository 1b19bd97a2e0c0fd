use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use shipping::crypto::CredentialCipher;
use shipping::wx::WxClient;
use shipping::{db, routes, task, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|arg| arg == "-help" || arg == "--help") {
        println!("Usage: shipping [OPTIONS]");
        println!("Options:");
        println!("  -config <path>  Path to configuration file (default: ./etc/shipping.toml)");
        println!("  -help, --help   Print this help message");
        return Ok(());
    }

    let config_path = args
        .iter()
        .skip_while(|arg| arg.as_str() != "-config")
        .nth(1)
        .map(|s| s.to_string())
        .unwrap_or_else(|| "./etc/shipping.toml".to_string());

    // Load configuration first (before logging init)
    let config = Config::load(&config_path).unwrap_or_else(|e| {
        eprintln!("Could not load config file: {}, using defaults", e);
        Config::default()
    });

    // Priority: RUST_LOG env var > config file > default "info"
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting Shipping server...");
    info!("Loading configuration from: {}", config_path);

    let cipher = match &config.rsa.private_key_path {
        Some(path) => CredentialCipher::from_pem_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to load RSA private key: {}", e))?,
        None => CredentialCipher::plaintext(),
    };
    if cipher.is_plaintext() {
        tracing::warn!("No RSA private key configured, login credentials are read as plaintext");
    }

    let db_conn = db::init_database(&config.database).await.map_err(|e| {
        tracing::error!("Database initialization failed: {}", e);
        anyhow::anyhow!("Database initialization failed: {}", e)
    })?;
    db::seed(&db_conn, &config.bootstrap).await?;

    let oauth = WxClient::new(config.wx.clone())?;
    let sweep_interval = config.secret.sweep_interval();
    let addr_config = config.addr.clone();

    let state = AppState::new(db_conn, config, cipher, Arc::new(oauth));
    task::spawn_secret_sweeper(state.secrets().clone(), sweep_interval);

    let app = routes::create_router(state);

    let addr: SocketAddr = match addr_config.parse() {
        Ok(addr) => addr,
        Err(_) => {
            tracing::warn!("Invalid address '{}', using default 0.0.0.0:8080", addr_config);
            SocketAddr::from(([0, 0, 0, 0], 8080))
        }
    };

    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
