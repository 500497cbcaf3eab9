use actix_web::{HttpResponse, get, web};

use crate::model::AppState;

/// Prometheus text exposition.
#[get("/metrics")]
pub async fn render(data: web::Data<AppState>) -> HttpResponse {
    match &data.metrics {
        Some(handle) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(handle.render()),
        None => HttpResponse::NotFound().finish(),
    }
}
