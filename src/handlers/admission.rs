use crate::models::*;
use crate::services::AdmissionService;
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, ResponseError, Result};
use serde_json::json;

fn get_member_id_from_request(req: &HttpRequest) -> Option<i64> {
    req.extensions().get::<i64>().copied()
}

#[utoipa::path(
    post,
    path = "/events/{event_id}/verify-ticket",
    tag = "admission",
    params(("event_id" = i64, Path, description = "Event id")),
    request_body = VerifyTicketRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Ticket checked in", body = VerifyTicketResponse),
        (status = 400, description = "Invalid credential"),
        (status = 409, description = "Already checked in or cancelled"),
        (status = 403, description = "Not the organizer"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn verify_ticket(
    admission_service: web::Data<AdmissionService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<VerifyTicketRequest>,
) -> Result<HttpResponse> {
    let organizer_id = get_member_id_from_request(&req).unwrap_or(0);
    let event_id = path.into_inner();

    match admission_service
        .verify(event_id, organizer_id, &request.qr_data)
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn admission_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/{event_id}/verify-ticket", web::post().to(verify_ticket));
}
