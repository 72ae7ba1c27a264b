//! Trash retention sweeper service.
//!
//! Exposes the retention sweep as a small HTTP job endpoint so an external
//! scheduler (cron, platform timer) can invoke it daily. The sweep is
//! stateless and idempotent; re-invoking after an interrupted run is safe.

use actix_web::{get, post, web, App, HttpResponse, HttpServer, Responder};
use shopkeeper::app_config::AppConfig;
use shopkeeper::store::{PostgresStore, RecordStore};
use shopkeeper::sweeper;
use std::sync::Arc;

#[post("/jobs/auto-clean-trash")]
async fn run_sweep(store: web::Data<Arc<dyn RecordStore>>) -> impl Responder {
    let summary = sweeper::run(store.get_ref().as_ref()).await;
    log::info!(
        "sweep finished: {} rows removed ({:?})",
        summary.total_removed(),
        summary.cleaned
    );
    HttpResponse::Ok().json(summary)
}

#[get("/healthz")]
async fn healthz() -> impl Responder {
    HttpResponse::Ok().body("ok")
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("failed to load config file, using defaults: {}", e);
        AppConfig::default()
    });

    let database_url = if config.database.url.is_empty() {
        std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set when config has no database.url"))?
    } else {
        config.database.url.clone()
    };

    let store: Arc<dyn RecordStore> = Arc::new(PostgresStore::connect(&database_url).await?);
    let data = web::Data::new(store);

    log::info!("trash sweeper listening on {}", config.server.listen);
    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .service(run_sweep)
            .service(healthz)
    })
    .bind(&config.server.listen)?
    .run()
    .await?;
    Ok(())
}
