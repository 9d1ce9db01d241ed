// src/watch_history.rs
use crate::auth::AuthenticatedUser;
use crate::error::WatchError;
use crate::models::{HistoryQuery, ProgressReport};
use crate::reconciler::ProgressReconciler;
use actix_web::{HttpResponse, delete, get, patch, post, web};
use serde_json::json;
use uuid::Uuid;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::PathConfig::default().error_handler(|err, _| WatchError::invalid(err.to_string()).into()),
    );
    cfg.service(health_check);
    cfg.service(get_watch_history);
    cfg.service(create_watch_history);
    cfg.service(update_watch_history);
    cfg.service(delete_watch_history);
}

/// Caps the size of progress report bodies.
pub fn payload_config(limit: usize) -> web::PayloadConfig {
    web::PayloadConfig::new(limit)
}

// An absent body counts as `{}`; a present one must be valid JSON.
fn parse_report(body: &[u8]) -> Result<ProgressReport, WatchError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ProgressReport::default());
    }
    serde_json::from_slice(body).map_err(|e| WatchError::invalid(format!("Malformed progress report: {}", e)))
}

#[get("/healthcheck")]
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({"status": "ok"}))
}

#[get("/watch-history")]
pub async fn get_watch_history(
    reconciler: web::Data<ProgressReconciler>,
    user: AuthenticatedUser,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, WatchError> {
    let page = reconciler.get_history(user.0, &query).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Watch history",
        "watchHistory": page.items,
        "totalWatchHistory": page.total,
        "page": page.page,
        "limit": page.limit,
    })))
}

#[post("/watch-history/{video_id}")]
pub async fn create_watch_history(
    reconciler: web::Data<ProgressReconciler>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Bytes,
) -> Result<HttpResponse, WatchError> {
    let video_id = path.into_inner();
    let report = parse_report(&body)?;

    let outcome = reconciler.report_progress(user.0, video_id, report).await?;

    if outcome.created() {
        Ok(HttpResponse::Created().json(json!({
            "message": "Watch history created",
            "data": outcome.entry,
        })))
    } else {
        Ok(HttpResponse::Ok().json(json!({
            "message": "Watch history updated",
            "data": outcome.entry,
        })))
    }
}

#[patch("/watch-history/{video_id}")]
pub async fn update_watch_history(
    reconciler: web::Data<ProgressReconciler>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Bytes,
) -> Result<HttpResponse, WatchError> {
    let video_id = path.into_inner();
    let report = parse_report(&body)?;

    let outcome = reconciler.update_progress(user.0, video_id, report).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Watch history updated",
        "data": outcome.entry,
    })))
}

#[delete("/watch-history/{video_id}")]
pub async fn delete_watch_history(
    reconciler: web::Data<ProgressReconciler>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, WatchError> {
    let video_id = path.into_inner();

    reconciler.delete_history(user.0, video_id).await?;

    Ok(HttpResponse::Ok().json(json!({"message": "Watch history deleted"})))
}
