use crate::models::*;
use crate::services::RegistrationService;
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, ResponseError, Result};
use serde_json::json;

fn get_member_id_from_request(req: &HttpRequest) -> Option<i64> {
    req.extensions().get::<i64>().copied()
}

#[utoipa::path(
    post,
    path = "/events/{event_id}/register",
    tag = "registration",
    params(("event_id" = i64, Path, description = "Event id")),
    request_body = RegisterRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Registration created", body = RegisterResponse),
        (status = 400, description = "Invalid cart or promo code"),
        (status = 409, description = "Sold out, sale closed or already registered"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn register(
    registration_service: web::Data<RegistrationService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<RegisterRequest>,
) -> Result<HttpResponse> {
    let member_id = get_member_id_from_request(&req).unwrap_or(0);
    let event_id = path.into_inner();

    match registration_service
        .register(event_id, member_id, request.into_inner())
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/events/{event_id}/cancel-registration",
    tag = "registration",
    params(("event_id" = i64, Path, description = "Event id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Registration cancelled", body = CancelResponse),
        (status = 404, description = "No active registration"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn cancel_registration(
    registration_service: web::Data<RegistrationService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let member_id = get_member_id_from_request(&req).unwrap_or(0);
    let event_id = path.into_inner();

    match registration_service.cancel(event_id, member_id).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/events/{event_id}/my-ticket",
    tag = "registration",
    params(("event_id" = i64, Path, description = "Event id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Ticket detail with QR payload", body = TicketDetailResponse),
        (status = 404, description = "No registration"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn my_ticket(
    registration_service: web::Data<RegistrationService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let member_id = get_member_id_from_request(&req).unwrap_or(0);
    let event_id = path.into_inner();

    match registration_service.my_ticket(event_id, member_id).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/events/{event_id}/bookmark",
    tag = "registration",
    params(("event_id" = i64, Path, description = "Event id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Bookmark toggled"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn toggle_bookmark(
    registration_service: web::Data<RegistrationService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let member_id = get_member_id_from_request(&req).unwrap_or(0);
    let event_id = path.into_inner();

    match registration_service.toggle_bookmark(event_id, member_id).await {
        Ok(bookmarked) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": { "bookmarked": bookmarked }
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/events/{event_id}/attendees",
    tag = "registration",
    params(
        ("event_id" = i64, Path, description = "Event id"),
        ("page" = Option<u32>, Query, description = "Page number"),
        ("per_page" = Option<u32>, Query, description = "Page size")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Attendee roster"),
        (status = 403, description = "Not the organizer"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn attendees(
    registration_service: web::Data<RegistrationService>,
    req: HttpRequest,
    path: web::Path<i64>,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    let organizer_id = get_member_id_from_request(&req).unwrap_or(0);
    let event_id = path.into_inner();

    match registration_service
        .attendees(event_id, organizer_id, &query)
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn registration_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/{event_id}/register", web::post().to(register))
        .route(
            "/{event_id}/cancel-registration",
            web::post().to(cancel_registration),
        )
        .route("/{event_id}/my-ticket", web::get().to(my_ticket))
        .route("/{event_id}/bookmark", web::post().to(toggle_bookmark))
        .route("/{event_id}/attendees", web::get().to(attendees));
}
