use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::registration::register,
        handlers::registration::cancel_registration,
        handlers::registration::my_ticket,
        handlers::registration::toggle_bookmark,
        handlers::registration::attendees,
        handlers::admission::verify_ticket,
        handlers::event::create_event,
        handlers::event::publish_event,
        handlers::event::create_ticket_type,
        handlers::event::update_ticket_type,
        handlers::event::create_discount_code,
        handlers::event::create_pricing_rule,
    ),
    components(
        schemas(
            Event,
            CreateEventRequest,
            TicketType,
            CreateTicketTypeRequest,
            UpdateTicketTypeRequest,
            RefundPolicy,
            Gender,
            Member,
            DiscountCode,
            DiscountType,
            CreateDiscountCodeRequest,
            PricingRule,
            RuleKind,
            CreatePricingRuleRequest,
            Registration,
            RegistrationStatus,
            RegistrationTicket,
            CartLine,
            RegisterRequest,
            RegisterResponse,
            CancelResponse,
            TicketLineDetail,
            TicketDetailResponse,
            VerifyTicketRequest,
            VerifyTicketResponse,
            AttendeeRow,
            PaginationParams,
            PaginationInfo,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "registration", description = "Ticket booking and cancellation"),
        (name = "admission", description = "QR check-in at the door"),
        (name = "catalog", description = "Organizer catalog management")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    );
}
