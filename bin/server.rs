// ERP Observation Tracker - Web Server
// REST API with Axum

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use erp_observations::api::{router, AppState};
use erp_observations::{init_tracing, load_catalog, open_database, seed_catalog, AppConfig, Catalog};

#[derive(Parser, Debug)]
#[command(
    name = "erp-observations-server",
    version,
    about = "HTTP API for the ERP observation tracker",
    long_about = None
)]
struct ServerCli {
    #[command(flatten)]
    config: AppConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = ServerCli::parse().config;

    println!("🌐 ERP Observation Tracker - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let conn = open_database(&config.db_path)
        .with_context(|| format!("opening database {}", config.db_path.display()))?;
    seed_catalog(&conn, &Catalog::default_seed()).context("seeding module catalog")?;
    let catalog = load_catalog(&conn).context("loading module catalog")?;
    println!("✓ Database opened: {}", config.db_path.display());

    if config.access_code.is_none() {
        warn!("no access code configured (ERP_OBS_ACCESS_CODE); all mutations will be refused");
    }

    let addr = config.bind.clone();
    let app = router(AppState::new(conn, catalog, config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    info!(%addr, "server listening");
    println!("\n🚀 Server running on http://{}", addr);
    println!("   API: http://{}/api/health", addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
