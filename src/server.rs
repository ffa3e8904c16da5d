use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::BytesRejection,
        DefaultBodyLimit, Multipart, State,
    },
    http::{header::CONTENT_LENGTH, HeaderMap, Method, StatusCode, Uri},
    response::Json,
    routing::{get, post, MethodRouter},
    Router,
};
use log::{error, info};
use std::error::Error;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use crate::error::{ErrorEnvelope, GatewayError};
use crate::gateway::{Gateway, HealthReport};
use crate::model::Upload;
use crate::normalize::{format_size, Normalized};
use crate::routes::{Input, Route, HEALTH_PATH, ROUTES};

/// Room for multipart framing on top of the file size ceiling.
const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;

type SharedGateway = Arc<Gateway>;

/// Build the axum router serving every forwarding route plus the health check.
pub fn router(gateway: Gateway) -> Router {
    let body_limit = usize::try_from(body_limit(gateway.config())).unwrap_or(usize::MAX);

    let mut router = Router::new().route(
        HEALTH_PATH,
        get(health).fallback(method_not_allowed),
    );
    for route in ROUTES {
        router = router.route(route.path, forwarding_route(route));
    }

    router
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(Arc::new(gateway))
}

/// Largest request body accepted on any route.
fn body_limit(config: &GatewayConfig) -> u64 {
    config
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES)
}

fn forwarding_route(route: Route) -> MethodRouter<SharedGateway> {
    let method_router = match route.input {
        Input::JsonField(_) => post(
            move |State(gateway): State<SharedGateway>,
                  headers: HeaderMap,
                  body: Result<Bytes, BytesRejection>| {
                forward_json(gateway, route, headers, body)
            },
        ),
        Input::File(_) => post(
            move |State(gateway): State<SharedGateway>,
                  headers: HeaderMap,
                  multipart: Result<Multipart, MultipartRejection>| {
                forward_file(gateway, route, headers, multipart)
            },
        ),
    };
    method_router.fallback(method_not_allowed)
}

async fn forward_json(
    gateway: SharedGateway,
    route: Route,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Normalized>, GatewayError> {
    let body = body
        .map_err(|e| body_error(&gateway, route.input, &headers, e.status(), e.body_text()))?;
    gateway.forward_json_field(&route, &body).await.map(Json)
}

async fn forward_file(
    gateway: SharedGateway,
    route: Route,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Normalized>, GatewayError> {
    let field = route.field();
    let multipart = multipart.map_err(|_| missing_file(field))?;
    let upload = read_upload(multipart, field)
        .await
        .map_err(|e| body_error(&gateway, route.input, &headers, e.status(), e.body_text()))?
        .ok_or_else(|| missing_file(field))?;
    gateway.forward_binary_file(&route, upload).await.map(Json)
}

/// Pull the first file part named `field` out of the form.
async fn read_upload(
    mut multipart: Multipart,
    field: &str,
) -> Result<Option<Upload>, MultipartError> {
    while let Some(part) = multipart.next_field().await? {
        if part.name() != Some(field) {
            continue;
        }
        // Parts without a filename are plain form values, not files
        let Some(file_name) = part.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = part.content_type().map(str::to_string);
        let data = part.bytes().await?;
        return Ok(Some(Upload {
            file_name,
            content_type,
            data,
        }));
    }
    Ok(None)
}

fn missing_file(field: &str) -> GatewayError {
    GatewayError::Validation(format!(
        "Missing file upload. Field name must be '{field}'."
    ))
}

/// Translate a body-reading rejection, typically the body size limit.
fn body_error(
    gateway: &Gateway,
    input: Input,
    headers: &HeaderMap,
    status: StatusCode,
    text: String,
) -> GatewayError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        let declared = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let config = gateway.config();
        let (subject, limit) = match input {
            Input::File(_) => ("File", config.max_upload_bytes),
            Input::JsonField(_) => ("Request body", body_limit(config)),
        };
        GatewayError::PayloadTooLarge {
            subject,
            size: declared.map_or_else(|| "unknown size".to_string(), format_size),
            limit: format_size(limit),
        }
    } else {
        GatewayError::Validation(format!("Could not read request body: {text}"))
    }
}

async fn health(
    State(gateway): State<SharedGateway>,
) -> Result<Json<HealthReport>, GatewayError> {
    gateway.health().await.map(Json)
}

async fn not_found(uri: Uri) -> (StatusCode, Json<ErrorEnvelope>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorEnvelope {
            error: format!("No route for {}", uri.path()),
            detail: None,
            status: None,
        }),
    )
}

async fn method_not_allowed(method: Method, uri: Uri) -> (StatusCode, Json<ErrorEnvelope>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ErrorEnvelope {
            error: format!("Method {} not allowed on {}", method, uri.path()),
            detail: None,
            status: None,
        }),
    )
}

/// Bind `config.listen_addr` and serve until Ctrl-C.
pub async fn run(config: GatewayConfig) -> Result<(), Box<dyn Error>> {
    let addr = config.listen_addr.clone();
    let transcriber = config.transcriber_url().to_string();
    let parser = config.parser_url().to_string();
    let app = router(Gateway::new(config)?);

    let listener = TcpListener::bind(addr.as_str()).await.map_err(|e| {
        error!("Failed to bind {}: {}", addr, e);
        e
    })?;
    info!(
        "Listening on http://{} (transcriber: {}, parser: {})",
        addr, transcriber, parser
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}
