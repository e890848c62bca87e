mod auth;
mod config;
mod context;
mod docs;
mod errors;
mod rooms;
mod schemas;
mod serialized;
mod ws;

use std::{
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
};

use axum::routing::get;
use huddle_collab::Collab;
use log::info;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub use config::*;
pub use context::ServerContext;

pub type Router = axum::Router<ServerContext>;

/// Builds the routes of the server around a collab instance
pub fn router(collab: Arc<Collab>) -> axum::Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let version_one_router = Router::new().nest("/rooms", rooms::router());

    Router::new()
        .nest("/v1", version_one_router)
        .route("/api.json", get(docs::docs))
        .layer(cors)
        .with_state(ServerContext { collab })
}

/// Starts the huddle server
pub async fn run_server(collab: Arc<Collab>, config: &ServerConfig) -> std::io::Result<()> {
    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, config.port).into();
    let listener = TcpListener::bind(&addr).await?;

    info!("Listening on {}", addr);

    axum::serve(listener, router(collab)).await
}

#[cfg(test)]
pub(crate) async fn test_collab() -> Arc<Collab> {
    use huddle_collab::SqliteDatabase;
    use huddle_core::Config;

    let database = SqliteDatabase::new("sqlite::memory:")
        .await
        .expect("in-memory database connects");

    let upload_dir = std::env::temp_dir().join("huddle-server-test");

    Arc::new(Collab::new(Config::default(), database, upload_dir))
}

/// Serves the router on an ephemeral local port, returning its address
#[cfg(test)]
pub(crate) async fn serve_test_router(collab: Arc<Collab>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("ephemeral port is free");
    let addr = listener.local_addr().expect("listener has an address");

    tokio::spawn(async move { axum::serve(listener, router(collab)).await });

    addr
}
