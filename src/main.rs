// src/main.rs
use actix_web::{App, HttpServer, middleware::Logger, web};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod auth;
mod config;
mod db;
mod error;
mod models;
mod reconciler;
mod store;
mod watch_history;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    tracing::info!("Starting watch history service");

    dotenv::dotenv().ok();
    let config = config::Config::from_env().expect("Failed to load config from environment");

    let pool = PgPool::connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    if config.run_migrations {
        db::run_migrations(&pool)
            .await
            .expect("Failed to run database migrations");
        tracing::info!("Database migrations applied");
    }

    let store = db::PgStore::new(
        pool,
        config.video_cache_capacity,
        Duration::from_secs(config.video_cache_ttl_secs),
    );
    let reconciler = reconciler::ProgressReconciler::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(store),
    );

    let bind = (config.bind_address.clone(), config.port);
    tracing::info!("Binding to {}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(reconciler.clone()))
            .app_data(web::Data::new(config.clone()))
            .app_data(watch_history::payload_config(config.json_body_limit))
            .wrap(Logger::default())
            .configure(watch_history::init_routes)
    })
    .bind(bind)?
    .run()
    .await
}
