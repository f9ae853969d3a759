//! Immutable per-process session: credentials, region and base URLs

use crate::client::region::{Endpoints, RegionLookup};
use crate::client::request::ApiFamily;
use crate::config::{Config, Credentials, HttpSettings, RetrySettings};
use crate::error::Result;

/// Everything the transport needs to know about the account it talks for.
///
/// Built once at startup and shared read-only afterwards; the region is
/// resolved here and never again.
#[derive(Debug, Clone)]
pub struct Session {
    credentials: Credentials,
    endpoints: Endpoints,
    http: HttpSettings,
    retry: RetrySettings,
}

impl Session {
    pub fn new(credentials: Credentials, endpoints: Endpoints) -> Self {
        Self {
            credentials,
            endpoints,
            http: HttpSettings::default(),
            retry: RetrySettings::default(),
        }
    }

    /// Build a session from configuration.
    ///
    /// The region comes from the config override if present, otherwise from
    /// the lookup collaborator. Base URL overrides replace the table values.
    pub fn from_config(config: &Config, lookup: &dyn RegionLookup) -> Result<Self> {
        let credentials = config.credentials()?;

        let mut endpoints = match config.region {
            Some(region) => Endpoints::for_region(region),
            None => Endpoints::for_credential(&credentials.api_key_id, lookup),
        };
        if let Some(url) = &config.rest_base_url {
            endpoints.rest_base_url = url.clone();
        }
        if let Some(url) = &config.xml_base_url {
            endpoints.xml_base_url = url.clone();
        }

        log::debug!(
            "Session resolved to region {} (rest: {}, xml: {})",
            endpoints.region,
            endpoints.rest_base_url,
            endpoints.xml_base_url
        );

        Ok(Self {
            credentials,
            endpoints,
            http: config.http.clone(),
            retry: config.retry.clone(),
        })
    }

    pub fn with_http_settings(mut self, http: HttpSettings) -> Self {
        self.http = http;
        self
    }

    pub fn with_retry_settings(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn http(&self) -> &HttpSettings {
        &self.http
    }

    pub fn retry(&self) -> &RetrySettings {
        &self.retry
    }

    pub fn base_url(&self, family: ApiFamily) -> &str {
        match family {
            ApiFamily::Rest => &self.endpoints.rest_base_url,
            ApiFamily::Xml => &self.endpoints.xml_base_url,
        }
    }
}
