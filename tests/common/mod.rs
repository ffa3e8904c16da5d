#![allow(dead_code)]

use recipe_capture::{build_router, GatewayConfig};
use tokio::net::TcpListener;

/// Start a gateway on an ephemeral port and return its base URL.
pub async fn spawn_gateway(config: GatewayConfig) -> String {
    let app = build_router(config).expect("router");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });
    format!("http://{}", addr)
}

/// A base URL that accepts connections and never answers.
pub async fn silent_upstream_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let url = format!("http://{}", listener.local_addr().expect("local addr"));
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    url
}

/// A base URL nothing is listening on.
pub fn closed_upstream_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let url = format!("http://{}", listener.local_addr().expect("local addr"));
    drop(listener);
    url
}
