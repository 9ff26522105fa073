//! REST backend.
//!
//! Talks to the Flight Control API under `{host}/api/v1`. Resources are
//! addressed as `/{plural}/{name}`; fleet-scoped kinds live under
//! `/fleets/{fleet}/{plural}/{name}`. Updates are sent as JSON Patch
//! documents (`application/json-patch+json`).

use crate::backend::ResourceApi;
use crate::config::AuthConfig;
use crate::error::{Error, Result};
use crate::types::Target;
use json_patch::Patch;
use serde_json::Value;
use std::sync::Arc;
use ureq::tls::{Certificate, RootCerts, TlsConfig};
use url::Url;

const API_PREFIX: &[&str] = &["api", "v1"];
const USER_AGENT: &str = concat!("flightctl-resource/", env!("CARGO_PKG_VERSION"));
const JSON_PATCH_CONTENT_TYPE: &str = "application/json-patch+json";

/// Blocking REST client for the Flight Control API.
///
/// # Example
///
/// ```no_run
/// use flightctl::backend::ResourceApi;
/// use flightctl::backend::http::HttpApi;
/// use flightctl::{AuthConfig, KindInfo, Target};
///
/// let api = HttpApi::new(&AuthConfig::new("https://api.flightctl.example.com").token("t"))?;
/// let device = KindInfo::lookup("Device").unwrap();
/// let current = api.get(Target::new(device, "dev1"))?;
/// # Ok::<(), flightctl::Error>(())
/// ```
pub struct HttpApi {
    agent: ureq::Agent,
    base: Url,
    token: Option<String>,
}

impl HttpApi {
    /// Build a client from connection settings.
    pub fn new(auth: &AuthConfig) -> Result<Self> {
        let base = Url::parse(&auth.base_url()?)
            .map_err(|e| Error::Config(format!("invalid flightctl_host: {}", e)))?;
        if base.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "flightctl_host cannot be used as a base URL: {}",
                base
            )));
        }

        let mut tls = TlsConfig::builder().disable_verification(!auth.validate_certs);
        if let Some(path) = &auth.ca_path {
            let pem = std::fs::read(path).map_err(|e| Error::io(path, e))?;
            let cert = Certificate::from_pem(&pem).map_err(|e| {
                Error::Config(format!("invalid CA certificate {}: {}", path.display(), e))
            })?;
            tls = tls.root_certs(RootCerts::Specific(Arc::new(vec![cert])));
        }

        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(auth.request_timeout))
            .tls_config(tls.build())
            .build();

        if !auth.validate_certs {
            log::warn!("TLS certificate verification is disabled for {}", base);
        }

        Ok(Self {
            agent: config.into(),
            base,
            token: auth.token.clone(),
        })
    }

    /// URL of a single resource.
    pub fn item_url(&self, target: Target<'_>) -> Result<String> {
        let mut segments = self.scope_segments(target)?;
        segments.push(target.name);
        Ok(self.url_for(&segments))
    }

    /// URL of the collection a resource is created in.
    pub fn collection_url(&self, target: Target<'_>) -> Result<String> {
        let segments = self.scope_segments(target)?;
        Ok(self.url_for(&segments))
    }

    fn scope_segments<'a>(&self, target: Target<'a>) -> Result<Vec<&'a str>> {
        let mut segments = Vec::with_capacity(4);
        if target.kind.fleet_scoped {
            let fleet = target.fleet.ok_or_else(|| {
                Error::Config(format!("{} resources require a fleet name", target.kind))
            })?;
            segments.extend(["fleets", fleet]);
        }
        segments.push(target.kind.plural);
        Ok(segments)
    }

    fn url_for(&self, segments: &[&str]) -> String {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(API_PREFIX).extend(segments);
        }
        url.to_string()
    }

    fn authorize<B>(&self, request: ureq::RequestBuilder<B>) -> ureq::RequestBuilder<B> {
        let request = request
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT);
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }
}

impl ResourceApi for HttpApi {
    fn get(&self, target: Target<'_>) -> Result<Option<Value>> {
        let url = self.item_url(target)?;
        log::debug!("GET {}", url);

        let mut response = self
            .authorize(self.agent.get(&url))
            .call()
            .map_err(|e| transport(&url, e))?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        read_success(&mut response).map(Some)
    }

    fn create(&self, target: Target<'_>, body: &Value) -> Result<Value> {
        let url = self.collection_url(target)?;
        log::debug!("POST {}", url);

        let mut response = self
            .authorize(self.agent.post(&url))
            .header("Content-Type", "application/json")
            .send_json(body)
            .map_err(|e| transport(&url, e))?;

        read_success(&mut response)
    }

    fn patch(&self, target: Target<'_>, patch: &Patch) -> Result<Value> {
        let url = self.item_url(target)?;
        log::debug!("PATCH {} ({} operations)", url, patch.0.len());

        let payload = serde_json::to_vec(patch)?;
        let mut response = self
            .authorize(self.agent.patch(&url))
            .header("Content-Type", JSON_PATCH_CONTENT_TYPE)
            .send(payload.as_slice())
            .map_err(|e| transport(&url, e))?;

        read_success(&mut response)
    }

    fn delete(&self, target: Target<'_>) -> Result<()> {
        let url = self.item_url(target)?;
        log::debug!("DELETE {}", url);

        let mut response = self
            .authorize(self.agent.delete(&url))
            .call()
            .map_err(|e| transport(&url, e))?;

        match response.status().as_u16() {
            200..=299 => Ok(()),
            404 => {
                log::warn!("{} was already gone when deleting", target);
                Ok(())
            }
            status => Err(Error::status(status, error_message(&mut response))),
        }
    }
}

fn transport(url: &str, err: ureq::Error) -> Error {
    Error::Transport {
        url: url.to_string(),
        message: err.to_string(),
    }
}

fn read_success(response: &mut ureq::http::Response<ureq::Body>) -> Result<Value> {
    let status = response.status().as_u16();
    if !(200..300).contains(&status) {
        return Err(Error::status(status, error_message(response)));
    }

    let text = response
        .body_mut()
        .read_to_string()
        .map_err(|e| Error::InvalidResponse(e.to_string()))?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
}

/// Best-effort message from an error response body.
fn error_message(response: &mut ureq::http::Response<ureq::Body>) -> String {
    let reason = response
        .status()
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string();
    match response.body_mut().read_to_string() {
        Ok(text) => extract_message(&text).unwrap_or(reason),
        Err(_) => reason,
    }
}

/// Pull `message` out of an API `Status` document, or fall back to raw text.
fn extract_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(body) {
        Ok(doc) => doc
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(body.to_string())),
        Err(_) => Some(body.to_string()),
    }
}
