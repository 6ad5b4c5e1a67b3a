use dotenvy::dotenv;
use orders_api::{build_server, connect_repository, Config, OrderService};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(std::io::Error::other)?;
    let repo = connect_repository(&config.store)
        .await
        .map_err(std::io::Error::other)?;

    log::info!("Starting server at http://{}:{}", config.host, config.port);

    // Actix stops gracefully on SIGINT/SIGTERM; the store connection is
    // dropped once the server future completes.
    let result = build_server(OrderService::new(repo), &config.host, config.port)?.await;
    log::info!("Server stopped");
    result
}
