use actix_web::HttpResponse;

/// `GET /health_check`
///
/// Liveness only; neither SMTP nor the mailing-list provider is contacted.
pub async fn health_check() -> HttpResponse { HttpResponse::Ok().finish() }
