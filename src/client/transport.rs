//! Single-attempt HTTP transport
//!
//! The transport issues exactly one HTTP exchange per call. It signs every
//! attempt afresh and hands back whatever response arrives, leaving status
//! classification to the retry policy.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use reqwest::Client as HttpClient;
use reqwest::Url;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};

use super::request::{Method, Request, Response};
use super::session::Session;
use crate::config::Credentials;
use crate::error::{ApiError, Result};

/// Computes the `Authorization` header for one attempt.
///
/// Signatures are time-bound, so implementations are called once per attempt
/// and must not cache results across attempts.
pub trait Signer: Send + Sync {
    fn authorization(&self, credentials: &Credentials, method: Method, url: &Url) -> Result<String>;
}

/// Executes a single request
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one HTTP exchange.
    ///
    /// Returns normally for every HTTP response, including non-2xx ones. Fails
    /// with [`ApiError::Network`] only when no response was received.
    async fn execute(&self, request: &Request) -> Result<Response>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    http: HttpClient,
    session: Arc<Session>,
    signer: Arc<dyn Signer>,
}

impl HttpTransport {
    pub fn new(session: Arc<Session>, signer: Arc<dyn Signer>) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(session.http().timeout())
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            session,
            signer,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Final URL for a request, query string included
    pub fn url_for(&self, request: &Request) -> Result<Url> {
        let raw = request.resolve_url(self.session.base_url(request.family()));
        let mut url = Url::parse(&raw)
            .map_err(|e| ApiError::InvalidRequest(format!("{}: {}", raw, e)))?;
        if !request.query().is_empty() {
            url.query_pairs_mut().extend_pairs(request.query());
        }
        Ok(url)
    }
}

/// Defaults first, then overrides; an override replaces a default of the same name.
fn merge_headers(
    defaults: Vec<(String, String)>,
    overrides: &[(String, String)],
) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = defaults
        .into_iter()
        .filter(|(name, _)| {
            !overrides
                .iter()
                .any(|(o, _)| o.eq_ignore_ascii_case(name))
        })
        .collect();
    merged.extend(overrides.iter().cloned());
    merged
}

/// Convert header pairs, rejecting names or values HTTP cannot carry.
fn header_map(headers: &[(String, String)]) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ApiError::InvalidRequest(format!("invalid header name '{}'", name)))?;
        let header_value = HeaderValue::from_str(value).map_err(|_| {
            ApiError::InvalidRequest(format!("invalid value for header '{}'", name))
        })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &Request) -> Result<Response> {
        let url = self.url_for(request)?;

        // Fresh signature for every attempt
        let authorization =
            self.signer
                .authorization(self.session.credentials(), request.method(), &url)?;

        let headers = header_map(&merge_headers(
            request.default_headers(&self.session.http().user_agent),
            request.headers(),
        ))?;

        let mut builder = self
            .http
            .request(request.method().to_reqwest(), url.clone())
            .header(AUTHORIZATION, authorization)
            .headers(headers);

        if !request.files().is_empty() {
            let mut form = reqwest::multipart::Form::new();
            for file in request.files() {
                let part = reqwest::multipart::Part::bytes(file.bytes.clone())
                    .file_name(file.file_name.clone());
                form = form.part(file.field.clone(), part);
            }
            builder = builder.multipart(form);
        } else if let Some(body) = request.body() {
            builder = builder.body(body.to_vec());
        }

        debug!("{} {}", request.method(), url);

        let response = builder.send().await.map_err(ApiError::from)?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let response_headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(ApiError::from)?.to_vec();

        debug!(
            "{} {} -> {} ({} bytes)",
            request.method(),
            final_url,
            status,
            body.len()
        );

        Ok(Response::new(
            status,
            response_headers,
            body,
            final_url,
            request.clone(),
        ))
    }
}
