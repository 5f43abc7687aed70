pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

#[cfg(test)]
mod test_support;

use std::io;
use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::services::{geofence, reconciliation};
use crate::state::AppState;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Démarre le serveur. Toute erreur de configuration empêche le démarrage.
pub async fn run() -> io::Result<()> {
    let config = AppConfig::from_env().map_err(|err| {
        error!(error = %err, "Invalid configuration");
        io::Error::new(io::ErrorKind::InvalidInput, err)
    })?;

    info!("Connecting to database...");
    let db = db::establish_connection(&config.database_url)
        .await
        .map_err(|err| {
            error!(error = %err, "Failed to connect to database");
            io::Error::other(err)
        })?;
    db::sync_schema(&db).await.map_err(io::Error::other)?;
    info!("Database connected");

    // Pas de trafic de passage tant qu'une mess n'a pas de géofence
    geofence::ensure_geofences_configured(&db)
        .await
        .map_err(|err| {
            error!(error = %err, "Refusing to start");
            io::Error::other(err)
        })?;

    let bind = (config.bind_addr.clone(), config.port);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = AppState::new(db, config, clock);

    let _reconciler = reconciliation::spawn_reconciler(
        state.db.clone(),
        state.tokens.clone(),
        state.clock.clone(),
        state.config.utc_offset,
        state.config.reconcile_interval,
    );

    info!(addr = %bind.0, port = bind.1, "Starting server");
    let data = web::Data::new(state);

    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .configure(routes::configure_routes)
    })
    .bind(bind)?
    .run()
    .await
}
