use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use spg_engine::{events::EventHandlers, NotificationDispatcher, ReconciliationApi, SqliteDatabase};

use crate::{
    auth::IdentityResolver,
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    integrations::{gateway::ProviderGateway, realtime::realtime_hooks},
    poll_worker::start_poll_worker,
    routes::configure_routes,
};

const EVENT_BUFFER_SIZE: usize = 128;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Database migration failed. {e}")))?;
    let gateway = ProviderGateway::new(config.gateway.clone(), config.webhook_secret.clone(), config.payment_expiry)
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, realtime_hooks(config.realtime.clone()));
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let notifications = NotificationDispatcher::new(db.clone(), producers);
    let api = ReconciliationApi::new(db.clone(), gateway, notifications.clone(), config.reconciliation_options());
    let resolver = IdentityResolver::new(db, &config.auth);
    if config.disable_poll {
        warn!("🕰️ The payment poll worker is disabled. Pending orders will only be updated by webhooks and checks.");
    } else {
        // The handle is never awaited. The worker lives as long as the server.
        let _handle = start_poll_worker(api.clone(), config.poll_interval);
    }
    let srv = create_server_instance(config, api, notifications, resolver)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    api: ReconciliationApi<SqliteDatabase, ProviderGateway>,
    notifications: NotificationDispatcher<SqliteDatabase>,
    resolver: IdentityResolver<SqliteDatabase>,
) -> Result<Server, ServerError> {
    let options = ServerOptions::from_config(&config);
    info!("💻️ Starting server on {}:{}", config.host, config.port);
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("spg::access_log"))
            .app_data(web::Data::new(api.clone()))
            .app_data(web::Data::new(notifications.clone()))
            .app_data(web::Data::new(resolver.clone()))
            .app_data(web::Data::new(options))
            .configure(configure_routes::<SqliteDatabase, ProviderGateway>)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
