use actix_cors::Cors;
use actix_files::{Files, NamedFile};
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::sync::Arc;

mod clock;
mod config;
mod controllers;
mod db;
mod error;
mod items;
mod language;

use clock::SystemClock;
use config::Config;
use items::{ItemService, ItemStore};

pub struct AppState {
    pub service: Arc<ItemService>,
    pub config: Config,
    pub started_at: std::time::Instant,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    log::info!("CopyPasta v{}", env!("CARGO_PKG_VERSION"));

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    config::initialize_data_dir(&config)?;

    let store = match ItemStore::open(&config, Arc::new(SystemClock)) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            log::error!("Failed to open item store in {:?}: {}", config.data_dir, e);
            std::process::exit(1);
        }
    };

    // Startup pass over files and records left inconsistent by a crash
    if let Err(e) = store.reconcile() {
        log::warn!("Reconciliation failed: {}", e);
    }

    let service = Arc::new(ItemService::from_config(
        store.clone(),
        language::default_detector(),
        &config,
    ));

    let sweeper = items::sweeper::spawn_expiry_sweeper(
        store.clone(),
        std::time::Duration::from_secs(config.sweep_interval_secs),
    );

    let frontend_dir = config::frontend_dir_if_present(&config).map(|p| p.to_path_buf());
    match &frontend_dir {
        Some(dir) => log::info!("Serving frontend from {:?}", dir),
        None => log::info!("No frontend directory configured, serving API only"),
    }

    let bind_addr = config.bind_addr.clone();
    let port = config.port;
    let started_at = std::time::Instant::now();
    log::info!("Starting server on {}:{}", bind_addr, port);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        let mut app = App::new()
            .app_data(web::Data::new(AppState {
                service: Arc::clone(&service),
                config: config.clone(),
                started_at,
            }))
            .app_data(controllers::json_config(config.max_upload_bytes))
            .wrap(Logger::default())
            .wrap(cors)
            .configure(controllers::health::config_routes)
            .configure(controllers::items::config)
            .configure(controllers::download::config);

        // Serve the browser UI only if a built frontend is present
        if let Some(dir) = frontend_dir.clone() {
            let index = dir.join("index.html");
            app = app.service(
                Files::new("/", dir)
                    .index_file("index.html")
                    .default_handler(web::to(move || {
                        let index = index.clone();
                        async move { NamedFile::open_async(index).await }
                    })),
            );
        }

        app
    })
    .bind((bind_addr.as_str(), port))?
    .run();

    let server_handle = server.handle();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        log::info!("Received Ctrl+C, shutting down...");

        sweeper.abort();

        log::info!("Stopping HTTP server...");
        let server_stop = server_handle.stop(true);
        if tokio::time::timeout(std::time::Duration::from_secs(5), server_stop).await.is_err() {
            log::warn!("Timeout waiting for HTTP server to stop, forcing exit...");
        }

        log::info!("Shutdown complete");
    });

    server.await
}
