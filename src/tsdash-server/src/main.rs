use actix_cors::Cors;
use actix_files as fs;
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use std::path::Path;
use tracing_actix_web::TracingLogger;
use tsdash_core::config::{Config, StoreBackend};
use tsdash_server::api;

mod telemetry;

#[actix_web::main]
async fn main() -> Result<()> {
    let _guard = telemetry::init_telemetry(Path::new("./logs"))?;

    let config = Config::load("config.json").unwrap_or_else(|e| {
        tracing::warn!("Failed to load config.json, using defaults: {}", e);
        Config::default()
    });

    tracing::info!("tsdash starting");
    tracing::info!("  Port: {}", config.port);
    tracing::info!("  Connection store: {:?}", config.connection_store);
    if config.connection_store == StoreBackend::File {
        tracing::info!("  Data directory: {}", config.data_dir);
    }
    tracing::info!(
        "  Upstream requests: timeout={}s, retries={}, backoff={}ms",
        config.request.timeout_secs,
        config.request.max_retries,
        config.request.retry_backoff_ms
    );
    tracing::info!(
        "  CORS: enabled={}, origins={:?}",
        config.cors.enabled,
        config.cors.allowed_origins
    );
    if !config.production {
        tracing::warn!("Not in production mode: connection cookie is sent without Secure");
    }

    let app_state = web::Data::new(api::AppState::new(config.clone())?);

    let static_dir = config.static_dir.clone();
    let serve_static = Path::new(&static_dir).is_dir();
    if serve_static {
        tracing::info!("✓ Serving dashboard UI from {}", static_dir);
    } else {
        tracing::info!("No UI build at {}, serving the API only", static_dir);
    }

    let bind_addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("🚀 Starting HTTP server on {}", bind_addr);

    let cors_config = config.cors.clone();
    let server = HttpServer::new(move || {
        let mut cors = Cors::default();

        if cors_config.enabled {
            for origin in &cors_config.allowed_origins {
                cors = cors.allowed_origin(origin);
            }
            cors = cors
                .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
                .allowed_headers(vec![
                    actix_web::http::header::ACCEPT,
                    actix_web::http::header::CONTENT_TYPE,
                ])
                .supports_credentials()
                .max_age(3600);
        }

        let static_dir = static_dir.clone();
        App::new()
            .app_data(app_state.clone())
            .wrap(cors)
            .wrap(TracingLogger::default())
            .configure(api::configure)
            .configure(move |cfg| {
                if serve_static {
                    cfg.service(fs::Files::new("/", &static_dir).index_file("index.html"));
                }
            })
    })
    .bind(&bind_addr)?
    .run();

    tracing::info!("Server running, press Ctrl+C to stop");

    server.await?;

    tracing::info!("Shutting down");
    Ok(())
}
