use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse};
use futures::TryStreamExt;
use log::{debug, info};
use serde_json::json;
use shared::EntitiesResponse;

use crate::auth::middleware::{AuthMiddleware, AuthenticatedUser};
use crate::config::Config;
use crate::redact::{ImageUpload, RedactError, RedactOptions, RedactionService};

const ENTITIES: [&str; 7] = [
    "name",
    "email",
    "phone",
    "address",
    "passport",
    "ssn",
    "credit_card",
];

pub fn configure_routes(cfg: &mut web::ServiceConfig, auth_middleware: AuthMiddleware) {
    cfg.service(web::resource("/health").route(web::get().to(health)))
        .service(
            web::scope("")
                .wrap(auth_middleware)
                .service(web::resource("/redact").route(web::post().to(redact)))
                .service(web::resource("/logs/{task_id}").route(web::get().to(get_task_log)))
                .service(web::resource("/entities").route(web::get().to(get_entities))),
        );
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({"status": "ok", "service": "backend"}))
}

async fn redact(
    user: AuthenticatedUser,
    service: web::Data<RedactionService>,
    config: web::Data<Config>,
    payload: Multipart,
) -> Result<HttpResponse, RedactError> {
    let (upload, options) = read_redact_form(payload, &config).await?;
    info!(
        "Redaction requested by user {} for {} ({} bytes)",
        user.0,
        upload.filename,
        upload.bytes.len()
    );
    let response = service.redact(user.0, upload, options).await?;
    Ok(HttpResponse::Ok().json(response))
}

async fn get_task_log(
    user: AuthenticatedUser,
    service: web::Data<RedactionService>,
    path: web::Path<String>,
) -> Result<HttpResponse, RedactError> {
    let task_id = path.into_inner();
    let log = service.task_log(user.0, &task_id).await?;
    info!("Retrieved task log: {}", task_id);
    Ok(HttpResponse::Ok().json(log))
}

async fn get_entities(_user: AuthenticatedUser) -> HttpResponse {
    HttpResponse::Ok().json(EntitiesResponse {
        entities: ENTITIES.iter().map(|e| e.to_string()).collect(),
    })
}

fn malformed(e: impl std::fmt::Display) -> RedactError {
    RedactError::InvalidInput(format!("Malformed multipart body: {}", e))
}

async fn read_redact_form(
    mut payload: Multipart,
    config: &Config,
) -> Result<(ImageUpload, RedactOptions), RedactError> {
    let mut upload: Option<ImageUpload> = None;
    let mut options = RedactOptions {
        confidence_threshold: config.default_confidence_threshold,
        ..RedactOptions::default()
    };

    while let Some(mut field) = payload.try_next().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename())
                    .unwrap_or("upload")
                    .to_string();
                let content_type = field.content_type().map(|m| m.essence_str().to_string());
                let bytes = read_field(&mut field, config.max_upload_bytes).await?;
                upload = Some(ImageUpload {
                    bytes,
                    filename,
                    content_type,
                });
            }
            "confidence_threshold" => {
                let raw = read_text(&mut field).await?;
                options.confidence_threshold = raw.trim().parse().map_err(|_| {
                    RedactError::InvalidInput(format!("Invalid confidence_threshold '{}'", raw))
                })?;
            }
            "return_image" => {
                let raw = read_text(&mut field).await?;
                options.return_image = parse_bool(&raw).ok_or_else(|| {
                    RedactError::InvalidInput(format!("Invalid return_image '{}'", raw))
                })?;
            }
            other => {
                debug!("Ignoring unexpected form field '{}'", other);
                while field.try_next().await.map_err(malformed)?.is_some() {}
            }
        }
    }

    let upload = upload.ok_or_else(|| RedactError::InvalidInput("Missing file field".to_string()))?;
    Ok((upload, options))
}

async fn read_field(field: &mut Field, limit: usize) -> Result<Vec<u8>, RedactError> {
    let mut data = Vec::new();
    while let Some(chunk) = field.try_next().await.map_err(malformed)? {
        if data.len() + chunk.len() > limit {
            return Err(RedactError::InvalidInput(format!(
                "File exceeds the {} byte limit",
                limit
            )));
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

async fn read_text(field: &mut Field) -> Result<String, RedactError> {
    const TEXT_LIMIT: usize = 64;
    let bytes = read_field(field, TEXT_LIMIT).await?;
    String::from_utf8(bytes)
        .map_err(|_| RedactError::InvalidInput("Form field is not valid UTF-8".to_string()))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
