use log::{info, warn};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::model::Upload;
use crate::normalize::{self, Normalized};
use crate::routes::{Route, Target};
use crate::upstream::{UpstreamClient, UpstreamResponse};

/// Forwards validated client requests to the upstream services.
///
/// Holds no per-request state; one instance is shared by every handler.
#[derive(Debug, Clone)]
pub struct Gateway {
    config: GatewayConfig,
    client: UpstreamClient,
}

/// Body of a successful `/api/health` check.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub ok: bool,
    pub upstreams: Map<String, Value>,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = UpstreamClient::new(config.timeout(), config.connect_timeout())?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn base_url(&self, target: Target) -> &str {
        match target {
            Target::Transcriber => self.config.transcriber_url(),
            Target::Parser => self.config.parser_url(),
        }
    }

    /// Validate a JSON body carrying `route`'s field and forward it upstream.
    pub async fn forward_json_field(
        &self,
        route: &Route,
        body: &[u8],
    ) -> Result<Normalized, GatewayError> {
        let field = route.field();
        let value = normalize::require_json_field(body, field)?;
        info!("{}: forwarding '{}' ({} chars)", route.name, field, value.len());

        let mut payload = Map::new();
        payload.insert(field.to_string(), Value::String(value));

        let base_url = self.base_url(route.target);
        let response = self
            .client
            .post_json(base_url, route.upstream_path, &Value::Object(payload))
            .await?;

        self.finish(route, &response)
    }

    /// Check the size of an uploaded file and forward it as a fresh multipart form.
    pub async fn forward_binary_file(
        &self,
        route: &Route,
        upload: Upload,
    ) -> Result<Normalized, GatewayError> {
        normalize::check_upload(&upload, self.config.max_upload_bytes)?;
        info!(
            "{}: forwarding file '{}' ({})",
            route.name,
            upload.file_name,
            normalize::format_size(upload.size())
        );

        let base_url = self.base_url(route.target);
        let response = self
            .client
            .post_file(base_url, route.upstream_path, route.field(), upload)
            .await?;

        self.finish(route, &response)
    }

    fn finish(
        &self,
        route: &Route,
        response: &UpstreamResponse,
    ) -> Result<Normalized, GatewayError> {
        let result = normalize::normalize(route, response, self.config.preview_chars);
        if let Err(e) = &result {
            warn!("{}: upstream answered {}: {}", route.name, response.status, e);
        }
        result
    }

    /// Call `GET /health` on every distinct upstream.
    pub async fn health(&self) -> Result<HealthReport, GatewayError> {
        let mut upstreams = Map::new();
        for (name, target) in [("transcriber", Target::Transcriber), ("parser", Target::Parser)] {
            let base_url = self.base_url(target);
            let response = self.client.get(base_url, "/health").await?;
            let data: Option<Value> = serde_json::from_slice(&response.body).ok();
            if !response.is_success() {
                let raw = String::from_utf8_lossy(&response.body);
                return Err(normalize::upstream_error(
                    response.status,
                    data.as_ref(),
                    &raw,
                    self.config.preview_chars,
                ));
            }
            let body = data.unwrap_or_else(|| {
                Value::String(String::from_utf8_lossy(&response.body).into_owned())
            });
            upstreams.insert(name.to_string(), body);

            if self.config.parser_url.is_none() {
                break;
            }
        }
        Ok(HealthReport {
            ok: true,
            upstreams,
        })
    }
}
