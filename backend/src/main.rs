mod auth;
mod config;
mod detection;
mod redact;
mod render;
mod routes;
mod tasks;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use auth::jwt::JwtService;
use auth::middleware::AuthMiddleware;
use config::{Config, DetectorBackend};
use detection::{Detector, HttpDetector, MockDetector};
use redact::RedactionService;
use routes::configure_routes;
use std::sync::Arc;
use tasks::{DynamoDbTaskStore, InMemoryTaskStore, TaskStore};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    let detector: Arc<dyn Detector> = match config.detector_backend {
        DetectorBackend::Http => {
            let client = HttpDetector::new(&config.detection_service_url, config.detection_timeout)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
            log::info!(
                "Using detection service at {} (timeout {:?})",
                config.detection_service_url,
                config.detection_timeout
            );
            Arc::new(client)
        }
        DetectorBackend::Mock => {
            log::warn!("Using mock detector; detections are random");
            Arc::new(MockDetector::new())
        }
    };

    let task_store: Arc<dyn TaskStore> = match &config.tasks_table {
        Some(table) => Arc::new(DynamoDbTaskStore::from_env(table.clone()).await),
        None => {
            log::warn!("DYNAMODB_TASKS_TABLE is not set; task records are kept in memory only");
            Arc::new(InMemoryTaskStore::new())
        }
    };

    let redaction_service = RedactionService::new(detector, task_store, config.max_upload_bytes);
    let auth_middleware = AuthMiddleware::new(JwtService::new(&config.jwt_secret));

    let bind_address = format!("0.0.0.0:{}", config.port);
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::AUTHORIZATION,
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .wrap(actix_web::middleware::Logger::default())
            .app_data(web::Data::new(redaction_service.clone()))
            .app_data(web::Data::new(config.clone()))
            .configure(|cfg| configure_routes(cfg, auth_middleware.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
