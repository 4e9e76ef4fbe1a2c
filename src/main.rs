use actix_web::{middleware::Logger, web, App, HttpResponse, HttpServer};
use chrono::Local;
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter

use snoo_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    external::{EmailService, NotificationSink},
    handlers,
    middlewares::{create_cors, AuthMiddleware},
    services::*,
    swagger::swagger_config,
    tasks,
    utils::JwtService,
};

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    let config = Config::from_toml().expect("Failed to load configuration file");

    let pool = create_pool(&config.database)
        .await
        .expect("Failed to create database connection pool");

    run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    let jwt_service = JwtService::new(&config.jwt.secret, config.jwt.access_token_expires_in);

    let notification_sink = NotificationSink::new(config.notifications.clone());
    let email_service = EmailService::new(config.email.clone());

    let registration_service = RegistrationService::new(pool.clone());
    let admission_service = AdmissionService::new(pool.clone());
    let catalog_service = EventCatalogService::new(pool.clone());
    let reminder_service = ReminderService::new(pool.clone(), notification_sink.clone());
    let outbox_service = OutboxService::new(pool.clone(), notification_sink, email_service);

    // Reminder sweep and outbox drain run for the lifetime of the process.
    tasks::spawn_all(reminder_service, outbox_service);

    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors())
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .app_data(web::Data::new(registration_service.clone()))
            .app_data(web::Data::new(admission_service.clone()))
            .app_data(web::Data::new(catalog_service.clone()))
            .configure(swagger_config)
            .route("/health", web::get().to(health))
            .service(
                web::scope("/api/v1").service(
                    web::scope("/events")
                        .configure(handlers::event_config)
                        .configure(handlers::registration_config)
                        .configure(handlers::admission_config),
                ),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
