use std::time::Duration;

use actix_web::{http::KeepAlive, middleware::Logger, web, App, HttpServer};
use actix_web::dev::Server;
use campus_eats_engine::{
    events::{EventHandlers, EventProducers},
    ContractApi,
    OrderFlowApi,
    PaymentApi,
    SqliteDatabase,
};
use log::*;

use crate::{
    auth::TokenIssuer,
    config::ServerConfig,
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    integrations::{
        chapa::ChapaGateway,
        fcm::{notification_hooks, FcmNotifier},
    },
    routes,
};

const EVENT_BUFFER_SIZE: usize = 32;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = ChapaGateway::new(&config.chapa);
    let notifier = FcmNotifier::new(&config.fcm);
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, notification_hooks(notifier));
    let producers = handlers.producers();
    handlers.start_handlers().await;
    start_expiry_worker(db.clone());
    info!("🚀️ Event handlers and expiry worker are running");
    let srv = create_server_instance(config, db, gateway, producers)?;
    srv.await.map_err(|e| ServerError::BackendError(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: ChapaGateway,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let order_api = OrderFlowApi::new(db.clone(), producers.clone());
        let contract_api = ContractApi::new(db.clone());
        let payment_api = PaymentApi::new(db.clone(), gateway.clone());
        let token_issuer = TokenIssuer::new(&config.jwt_secret);
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("ce::access_log"))
            .app_data(web::Data::new(order_api))
            .app_data(web::Data::new(contract_api))
            .app_data(web::Data::new(payment_api))
            .app_data(web::Data::new(token_issuer))
            .app_data(web::Data::new(config.clone()))
            .service(web::resource("/health").route(web::get().to(routes::health)))
            .service(
                web::scope("/api/v1")
                    .service(
                        web::resource("/orders")
                            .route(web::post().to(routes::create_order::<SqliteDatabase>))
                            .route(web::get().to(routes::my_orders::<SqliteDatabase>)),
                    )
                    // fixed segments before the `{id}` matchers
                    .service(
                        web::resource("/orders/verify-qr")
                            .route(web::post().to(routes::verify_qr::<SqliteDatabase>)),
                    )
                    .service(
                        web::resource("/orders/lounge/{lounge_id}")
                            .route(web::get().to(routes::lounge_orders::<SqliteDatabase>)),
                    )
                    .service(
                        web::resource("/orders/{id}")
                            .route(web::get().to(routes::get_order::<SqliteDatabase>)),
                    )
                    .service(
                        web::resource("/orders/{id}/status")
                            .route(web::patch().to(routes::update_order_status::<SqliteDatabase>)),
                    )
                    .service(
                        web::resource("/contracts")
                            .route(web::post().to(routes::create_contract::<SqliteDatabase>))
                            .route(web::get().to(routes::my_contracts::<SqliteDatabase>)),
                    )
                    .service(
                        web::resource("/contracts/lounge/{lounge_id}")
                            .route(web::get().to(routes::lounge_contract::<SqliteDatabase>)),
                    )
                    .service(
                        web::resource("/contracts/{id}")
                            .route(web::get().to(routes::contract_by_id::<SqliteDatabase>)),
                    )
                    .service(
                        web::resource("/contracts/{id}/renew")
                            .route(web::post().to(routes::renew_contract::<SqliteDatabase>)),
                    )
                    .service(
                        web::resource("/payments")
                            .route(web::get().to(routes::my_payments::<SqliteDatabase, ChapaGateway>)),
                    )
                    .service(
                        web::resource("/payments/initialize")
                            .route(web::post().to(routes::initialize_payment::<SqliteDatabase, ChapaGateway>)),
                    )
                    .service(
                        web::resource("/payments/webhook")
                            .route(web::post().to(routes::payment_webhook::<SqliteDatabase, ChapaGateway>)),
                    )
                    .service(
                        web::resource("/payments/{id}/verify")
                            .route(web::get().to(routes::poll_payment::<SqliteDatabase, ChapaGateway>)),
                    ),
            )
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
