//! Veracode API client implementation

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::api::{FindingsApi, XmlApi};
use super::models::{AnnotationAction, AnnotationRequest, Finding, ScanType};
use super::pagination::{ElementMode, PagedResult, Paginator};
use super::request::{ApiFamily, Method, Request, Response};
use super::retry::RetryPolicy;
use super::session::Session;
use super::transport::{HttpTransport, Signer, Transport};
use crate::error::{ApiError, Result};

/// Veracode API client.
///
/// Every call goes through the retry policy; paged REST collections go
/// through the paginator. The client holds no mutable state besides the
/// throttle, so it can be shared across tasks behind an `Arc`.
pub struct VeracodeClient {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    element_mode: ElementMode,
}

impl VeracodeClient {
    /// Create a client talking HTTP for the given session
    pub fn new(session: Session, signer: Arc<dyn Signer>) -> Result<Self> {
        let policy = RetryPolicy::from_settings(session.retry());
        let transport = HttpTransport::new(Arc::new(session), signer)?;
        Ok(Self::with_transport(Arc::new(transport), policy))
    }

    /// Create a client over any transport (used by tests and custom stacks)
    pub fn with_transport(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            element_mode: ElementMode::default(),
        }
    }

    /// Choose how paged calls treat a missing embedded collection
    pub fn with_element_mode(mut self, mode: ElementMode) -> Self {
        self.element_mode = mode;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn paginator(&self) -> Paginator<'_> {
        Paginator::new(self.transport.as_ref(), &self.policy).with_mode(self.element_mode)
    }

    /// Send one request through the retry policy.
    ///
    /// XML endpoints only accept GET and POST; anything else fails before
    /// any I/O with [`ApiError::UnsupportedMethod`].
    pub async fn send(&self, request: &Request) -> Result<Response> {
        if request.family() == ApiFamily::Xml
            && !matches!(request.method(), Method::Get | Method::Post)
        {
            return Err(ApiError::UnsupportedMethod(format!(
                "{} is not supported by the XML API",
                request.method()
            ))
            .into());
        }
        self.policy
            .send_with_retry(self.transport.as_ref(), request)
            .await
    }

    /// Send a REST request and parse the body as JSON (empty body is `null`)
    pub async fn rest_json(&self, request: &Request) -> Result<Value> {
        self.send(request).await?.json_value()
    }

    /// Send a REST request and deserialize the body
    pub async fn rest_as<T: DeserializeOwned>(&self, request: &Request) -> Result<T> {
        self.send(request).await?.json()
    }

    /// Send an XML API request and return the raw body.
    ///
    /// Parsing the XML is left to the caller.
    pub async fn xml_bytes(&self, request: &Request) -> Result<Vec<u8>> {
        Ok(self.send(request).await?.into_body())
    }

    /// Every element of a paged REST collection
    pub async fn paged(&self, request: &Request, element: &str) -> Result<Vec<Value>> {
        self.paginator().fetch_all(request, element).await
    }

    /// Every element of a paged REST collection, deserialized
    pub async fn paged_as<T: DeserializeOwned>(
        &self,
        request: &Request,
        element: &str,
    ) -> Result<Vec<T>> {
        self.paginator().fetch_all_as(request, element).await
    }

    /// Full-response paging: the envelope for a single page, else the elements
    pub async fn paged_full(&self, request: &Request, element: &str) -> Result<PagedResult> {
        self.paginator().fetch_all_full(request, element).await
    }
}

#[async_trait]
impl FindingsApi for VeracodeClient {
    async fn get_findings(
        &self,
        app_guid: &str,
        scan_type: Option<ScanType>,
        include_annotations: bool,
        params: &[(&str, &str)],
    ) -> Result<Vec<Finding>> {
        // Explicit arguments replace same-named entries in `params`
        let mut request = Request::rest(
            Method::Get,
            format!("appsec/v2/applications/{}/findings", app_guid),
        )
        .query_pairs(params.iter().copied())
        .build();
        if let Some(scan_type) = scan_type.filter(|t| *t != ScanType::Other) {
            request = request.with_query_param("scan_type", scan_type.as_str());
        }
        let request = request.with_query_param(
            "include_annot",
            if include_annotations { "TRUE" } else { "FALSE" },
        );

        let findings: Vec<Finding> = self.paged_as(&request, "findings").await?;
        debug!("Fetched {} findings for application {}", findings.len(), app_guid);
        Ok(findings)
    }

    async fn add_annotation(
        &self,
        app_guid: &str,
        issue_ids: &[u64],
        comment: &str,
        action: AnnotationAction,
    ) -> Result<Value> {
        let body = AnnotationRequest::new(issue_ids, comment, action);
        let request = Request::rest(
            Method::Post,
            format!("appsec/v2/applications/{}/annotations", app_guid),
        )
        .json(&body)?
        .build();
        self.rest_json(&request).await
    }
}

#[async_trait]
impl XmlApi for VeracodeClient {
    async fn get_app_list(&self) -> Result<Vec<u8>> {
        let request = Request::xml(Method::Get, "4.0/getapplist.do").build();
        self.xml_bytes(&request).await
    }

    async fn get_sandbox_list(&self, app_id: u64) -> Result<Vec<u8>> {
        let request = Request::xml(Method::Get, "5.0/getsandboxlist.do")
            .query("app_id", app_id)
            .build();
        self.xml_bytes(&request).await
    }

    async fn get_build_info(
        &self,
        app_id: u64,
        build_id: Option<u64>,
        sandbox_id: Option<u64>,
    ) -> Result<Vec<u8>> {
        let mut builder = Request::xml(Method::Get, "5.0/getbuildinfo.do").query("app_id", app_id);
        if let Some(sandbox_id) = sandbox_id {
            builder = builder.query("sandbox_id", sandbox_id);
        }
        if let Some(build_id) = build_id {
            builder = builder.query("build_id", build_id);
        }
        self.xml_bytes(&builder.build()).await
    }

    async fn upload_file(
        &self,
        app_id: u64,
        file: &Path,
        sandbox_id: Option<u64>,
        save_as: Option<&str>,
    ) -> Result<Vec<u8>> {
        let bytes = tokio::fs::read(file).await?;
        let file_name = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                ApiError::InvalidRequest(format!("{} is not a file path", file.display()))
            })?;

        let mut builder = Request::xml(Method::Post, "5.0/uploadfile.do").query("app_id", app_id);
        if let Some(sandbox_id) = sandbox_id {
            builder = builder.query("sandbox_id", sandbox_id);
        }
        if let Some(save_as) = save_as {
            builder = builder.query("save_as", save_as);
        }
        let request = builder.file("file", file_name, bytes).build();

        debug!("Uploading {} to application {}", file.display(), app_id);
        self.xml_bytes(&request).await
    }
}
