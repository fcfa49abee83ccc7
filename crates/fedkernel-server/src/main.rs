//! Binary entrypoint for the fedkernel HTTP server.
//!
//! Reads configuration from environment variables:
//! - `FEDERATION_DB_PATH`: SQLite database file path (default: "fedkernel.db")
//! - `FEDERATION_PORT`: Server listen port (default: "3000")

use fedkernel_server::router::build_router;
use fedkernel_server::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let db_path =
        std::env::var("FEDERATION_DB_PATH").unwrap_or_else(|_| "fedkernel.db".to_string());
    let port = std::env::var("FEDERATION_PORT").unwrap_or_else(|_| "3000".to_string());

    let state = AppState::new(&db_path).expect("Failed to initialize application state");

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    tracing::info!("fedkernel server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
