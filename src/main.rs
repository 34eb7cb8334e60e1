use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer};
use anyhow::Context;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cobranza::config::Config;
use cobranza::core::retry::ConflictRetry;
use cobranza::core::GatewayClock;
use cobranza::gateways::PagoFacilClient;
use cobranza::storage::MySqlLedgerStore;
use cobranza::AppServices;

fn init_tracing(log_level: &str, log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("cobranza={},actix_web=info,sqlx=warn", log_level))
    });

    let registry = tracing_subscriber::registry().with(filter);

    if log_format == "pretty" {
        registry.with(tracing_subscriber::fmt::layer().pretty()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init();
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    init_tracing(&config.app.log_level, &config.app.log_format);

    tracing::info!(
        environment = config.app.env.as_str(),
        bind_address = config.server.bind_address().as_str(),
        "Starting cobranza"
    );

    // Create database connection pool
    let db_pool = config
        .database
        .create_pool()
        .await
        .context("Failed to create database pool")?;

    sqlx::migrate!()
        .run(&db_pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!(
        max_connections = config.database.max_connections,
        "Database pool initialized"
    );

    let clock = GatewayClock::new(config.pagofacil.utc_offset_hours)?;
    let retry = ConflictRetry::new(config.scheduler.reconcile_max_attempts);
    let store = Arc::new(MySqlLedgerStore::new(db_pool));
    let gateway = Arc::new(PagoFacilClient::new(config.pagofacil.clone(), clock)?);

    let services = AppServices::new(store, gateway, clock, retry);

    let sweep = Arc::new(services.overdue_sweep(Duration::from_secs(
        config.scheduler.overdue_sweep_interval_secs,
    )));
    tokio::spawn(sweep.start());

    // Start HTTP server
    let bind_address = config.server.bind_address();
    let server = HttpServer::new(move || {
        let services = services.clone();
        App::new()
            .wrap(TracingLogger::default())
            .configure(move |cfg| cobranza::configure(cfg, &services))
    })
    .workers(config.server.workers)
    .bind(&bind_address)?
    .run();

    tracing::info!(bind_address = bind_address.as_str(), "Server started");

    server.await?;

    Ok(())
}
