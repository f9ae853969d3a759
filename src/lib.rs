//! Veracode API client core
//!
//! Signed transport, retry and polling policy, paginated REST fetching,
//! region resolution and cross-scan finding correlation.
//!
//! ```ignore
//! use std::sync::Arc;
//! use veracode_api::client::{FindingsApi, PrefixRegionLookup, Session, VeracodeClient};
//! use veracode_api::client::models::ScanType;
//! use veracode_api::config::Config;
//!
//! let config = Config::load()?;
//! let session = Session::from_config(&config, &PrefixRegionLookup)?;
//! let client = VeracodeClient::new(session, Arc::new(my_hmac_signer))?;
//! let findings = client
//!     .get_findings("app-guid", Some(ScanType::Static), true, &[])
//!     .await?;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod matching;

pub use client::VeracodeClient;
pub use error::{ApiError, ConfigError, Error, Result};
