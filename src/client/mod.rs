//! Veracode API client
//!
//! Layered bottom-up: [`transport`] performs one signed HTTP exchange,
//! [`retry`] decides whether to repeat it, [`pagination`] walks paged
//! collections, and [`VeracodeClient`] ties them to a [`session::Session`].

pub mod api;
#[cfg(test)]
pub mod mock;
pub mod models;
pub mod pagination;
pub mod rate_limit;
pub mod region;
pub mod request;
pub mod retry;
pub mod session;
pub mod transport;
mod veracode;

pub use api::{FindingsApi, XmlApi};
pub use pagination::{ElementMode, PagedEnvelope, PagedResult, Paginator};
pub use region::{Endpoints, PrefixRegionLookup, Region, RegionLookup};
pub use request::{ApiFamily, Method, Request, RequestBuilder, Response};
pub use retry::RetryPolicy;
pub use session::Session;
pub use transport::{HttpTransport, Signer, Transport};
pub use veracode::VeracodeClient;
