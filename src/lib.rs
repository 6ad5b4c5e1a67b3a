pub mod application;
pub mod config;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;

use std::sync::Arc;

use actix_web::{error, middleware::Logger, web, App, HttpServer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use application::order_service::{OrderService, SharedOrderService};
pub use config::{Config, StoreBackend};

use domain::errors::StoreError;
use domain::ports::OrderRepository;
use handlers::orders;
use infrastructure::memory_store::InMemoryStore;
use infrastructure::order_repo::KvOrderRepository;
use infrastructure::redis_store::RedisStore;

#[derive(OpenApi)]
#[openapi(
    paths(
        orders::create_order,
        orders::list_orders,
        orders::get_order,
        orders::update_order,
        orders::delete_order,
    ),
    components(schemas(
        orders::CreateOrderRequest,
        orders::LineItemRequest,
        orders::UpdateOrderRequest,
        orders::OrderResponse,
        orders::LineItemResponse,
        orders::ListOrdersResponse,
    )),
    tags((name = "orders", description = "Order management"))
)]
pub struct ApiDoc;

/// Opens the configured store once; the returned repository is shared by
/// every worker and closes its connection when the last handle is dropped.
pub async fn connect_repository(
    backend: &StoreBackend,
) -> Result<Arc<dyn OrderRepository>, StoreError> {
    match backend {
        StoreBackend::Redis { address } => {
            let store = RedisStore::connect(&config::redis_url(address)).await?;
            Ok(Arc::new(KvOrderRepository::new(store)))
        }
        StoreBackend::Memory => {
            log::warn!("using the in-memory store; orders are lost on shutdown");
            Ok(Arc::new(KvOrderRepository::new(InMemoryStore::new())))
        }
    }
}

/// Registers the service routes. The caller provides the
/// [`SharedOrderService`] as app data.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::PathConfig::default().error_handler(|err, _req| error::ErrorBadRequest(err)),
    )
    .route("/", web::get().to(orders::health))
    .service(
        web::scope("/orders")
            .route("", web::post().to(orders::create_order))
            .route("", web::get().to(orders::list_orders))
            .route("/{id}", web::get().to(orders::get_order))
            .route("/{id}", web::put().to(orders::update_order))
            .route("/{id}", web::delete().to(orders::delete_order)),
    );
}

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(
    service: SharedOrderService,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    let service = web::Data::new(service);
    Ok(HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .wrap(Logger::default())
            .configure(configure_routes)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi()),
            )
    })
    .bind((host.to_string(), port))?
    .run())
}
