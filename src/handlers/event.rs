use crate::models::*;
use crate::services::EventCatalogService;
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, ResponseError, Result};
use serde_json::json;

fn get_member_id_from_request(req: &HttpRequest) -> Option<i64> {
    req.extensions().get::<i64>().copied()
}

#[utoipa::path(
    post,
    path = "/events",
    tag = "catalog",
    request_body = CreateEventRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Event created", body = Event),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn create_event(
    catalog_service: web::Data<EventCatalogService>,
    req: HttpRequest,
    request: web::Json<CreateEventRequest>,
) -> Result<HttpResponse> {
    let organizer_id = get_member_id_from_request(&req).unwrap_or(0);

    match catalog_service
        .create_event(organizer_id, request.into_inner())
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
    path = "/events/{event_id}/publish",
    tag = "catalog",
    params(("event_id" = i64, Path, description = "Event id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Event published", body = Event),
        (status = 403, description = "Not the organizer"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn publish_event(
    catalog_service: web::Data<EventCatalogService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let organizer_id = get_member_id_from_request(&req).unwrap_or(0);
    let event_id = path.into_inner();

    match catalog_service.publish_event(event_id, organizer_id).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/events/{event_id}/ticket-types",
    tag = "catalog",
    params(("event_id" = i64, Path, description = "Event id")),
    request_body = CreateTicketTypeRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Ticket type created", body = TicketType),
        (status = 400, description = "Invalid refund policy or bounds"),
        (status = 403, description = "Not the organizer"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn create_ticket_type(
    catalog_service: web::Data<EventCatalogService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<CreateTicketTypeRequest>,
) -> Result<HttpResponse> {
    let organizer_id = get_member_id_from_request(&req).unwrap_or(0);
    let event_id = path.into_inner();

    match catalog_service
        .create_ticket_type(event_id, organizer_id, request.into_inner())
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
    put,
    path = "/events/{event_id}/ticket-types/{ticket_type_id}",
    tag = "catalog",
    params(
        ("event_id" = i64, Path, description = "Event id"),
        ("ticket_type_id" = i64, Path, description = "Ticket type id")
    ),
    request_body = UpdateTicketTypeRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Ticket type updated", body = TicketType),
        (status = 400, description = "Invalid update"),
        (status = 403, description = "Not the organizer"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn update_ticket_type(
    catalog_service: web::Data<EventCatalogService>,
    req: HttpRequest,
    path: web::Path<(i64, i64)>,
    request: web::Json<UpdateTicketTypeRequest>,
) -> Result<HttpResponse> {
    let organizer_id = get_member_id_from_request(&req).unwrap_or(0);
    let (event_id, ticket_type_id) = path.into_inner();

    match catalog_service
        .update_ticket_type(event_id, ticket_type_id, organizer_id, request.into_inner())
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
    path = "/events/{event_id}/discount-codes",
    tag = "catalog",
    params(("event_id" = i64, Path, description = "Event id")),
    request_body = CreateDiscountCodeRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Discount code created", body = DiscountCode),
        (status = 400, description = "Invalid discount configuration"),
        (status = 403, description = "Not the organizer"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn create_discount_code(
    catalog_service: web::Data<EventCatalogService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<CreateDiscountCodeRequest>,
) -> Result<HttpResponse> {
    let organizer_id = get_member_id_from_request(&req).unwrap_or(0);
    let event_id = path.into_inner();

    match catalog_service
        .create_discount_code(event_id, organizer_id, request.into_inner())
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
    path = "/events/{event_id}/pricing-rules",
    tag = "catalog",
    params(("event_id" = i64, Path, description = "Event id")),
    request_body = CreatePricingRuleRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Pricing rule created", body = PricingRule),
        (status = 400, description = "Invalid rule configuration"),
        (status = 403, description = "Not the organizer"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn create_pricing_rule(
    catalog_service: web::Data<EventCatalogService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<CreatePricingRuleRequest>,
) -> Result<HttpResponse> {
    let organizer_id = get_member_id_from_request(&req).unwrap_or(0);
    let event_id = path.into_inner();

    match catalog_service
        .create_pricing_rule(event_id, organizer_id, request.into_inner())
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn event_config(cfg: &mut web::ServiceConfig) {
    cfg.route("", web::post().to(create_event))
        .route("/{event_id}/publish", web::post().to(publish_event))
        .route("/{event_id}/ticket-types", web::post().to(create_ticket_type))
        .route(
            "/{event_id}/ticket-types/{ticket_type_id}",
            web::put().to(update_ticket_type),
        )
        .route(
            "/{event_id}/discount-codes",
            web::post().to(create_discount_code),
        )
        .route(
            "/{event_id}/pricing-rules",
            web::post().to(create_pricing_rule),
        );
}
