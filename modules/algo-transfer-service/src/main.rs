//! Algo Transfer Service: standalone binary for sending ALGO on TestNet and
//! tracking each transfer until it is confirmed or known to have failed.
//!
//! Default: http://127.0.0.1:5000/

mod algod;
mod config;
mod db;
mod error;
mod reconcile;
mod routes;
mod store;
mod submission;
#[cfg(test)]
mod testing;
mod validation;

use routes::AppState;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = config::Config::from_env();

    log::info!("Opening database at: {}", config.db_path);
    let database = Arc::new(db::Db::open(&config.db_path).expect("Failed to open database"));

    let algod_url = config.algod.base_url();
    log::info!("[ALGOD] Using node at {}", algod_url);
    let chain = Arc::new(algod::AlgodClient::new(algod_url, config.algod.token.clone()));

    let state = Arc::new(AppState::new(
        chain,
        database,
        config.confirmation_rounds,
        config.min_amount,
    ));
    let app = routes::router(state, &config.frontend_url);

    let addr = format!("127.0.0.1:{}", config.port);
    log::info!("Algo Transfer Service listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    axum::serve(listener, app).await.expect("Server error");
}
