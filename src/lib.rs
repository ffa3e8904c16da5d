//! HTTP gateway for the recipe capture workflow.
//!
//! Clients post a URL, a transcript or a media file; the gateway validates the
//! input, forwards it to the transcription or parser service and relays a
//! normalized result or an [`ErrorEnvelope`].
//!
//! ```no_run
//! use recipe_capture::{serve, GatewayConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::with_upstream("http://127.0.0.1:8000");
//! serve(config).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod model;
pub mod normalize;
pub mod routes;
pub mod server;
pub mod upstream;

pub use config::{load_config, GatewayConfig};
pub use error::{ErrorEnvelope, GatewayError};
pub use gateway::{Gateway, HealthReport};
pub use model::{ParsedRecipe, Step, Transcript, Upload};
pub use normalize::Normalized;
pub use server::run as serve;

/// Build the router for `config` without binding a socket.
pub fn build_router(config: GatewayConfig) -> Result<axum::Router, GatewayError> {
    Ok(server::router(Gateway::new(config)?))
}
