use actix_web::http::StatusCode;
use actix_web::HttpResponse;

use crate::envelope::ApiResponse;

pub async fn health_check() -> HttpResponse {
    tracing::debug!("Health check endpoint called");
    HttpResponse::Ok().json(ApiResponse::new(
        StatusCode::OK,
        serde_json::json!({ "status": "ok" }),
        "Service is healthy",
    ))
}
