//! Pagination over Veracode's paged REST envelopes
//!
//! Collection endpoints answer with an envelope like:
//!
//! ```json
//! {
//!   "_embedded": { "applications": [ ... ] },
//!   "page": { "size": 50, "total_elements": 120, "total_pages": 3, "number": 0 }
//! }
//! ```
//!
//! The paginator walks the zero-based `page` query parameter from 0 until the
//! reported `total_pages` is reached, concatenating the embedded arrays in
//! server order.

use futures::stream::{self, Stream, TryStreamExt};
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::request::Request;
use super::retry::RetryPolicy;
use super::transport::Transport;
use crate::error::{ApiError, Error, Result};

/// Query parameter carrying the zero-based page index
pub const PAGE_PARAM: &str = "page";

/// How to treat an envelope without the requested embedded collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ElementMode {
    /// A missing key is an empty page
    #[default]
    Lenient,
    /// A missing key is [`ApiError::MissingElement`]
    Strict,
}

/// Read-only view over one paged response body
#[derive(Debug, Clone, PartialEq)]
pub struct PagedEnvelope {
    body: Value,
}

impl PagedEnvelope {
    pub fn new(body: Value) -> Self {
        Self { body }
    }

    /// `page.total_pages`, or 0 when absent
    pub fn total_pages(&self) -> usize {
        self.body
            .get("page")
            .and_then(|page| page.get("total_pages"))
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(0)
    }

    /// `page.total_elements`, when reported
    pub fn total_elements(&self) -> Option<u64> {
        self.body
            .get("page")
            .and_then(|page| page.get("total_elements"))
            .and_then(Value::as_u64)
    }

    /// The array under `_embedded.<element>`, if present
    pub fn elements(&self, element: &str) -> Option<&Vec<Value>> {
        self.body
            .get("_embedded")
            .and_then(|embedded| embedded.get(element))
            .and_then(Value::as_array)
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn into_body(self) -> Value {
        self.body
    }
}

/// One fetched page
#[derive(Debug, Clone)]
pub struct Page {
    /// Zero-based index this page was requested with
    pub index: usize,
    pub total_pages: usize,
    pub elements: Vec<Value>,
    pub envelope: PagedEnvelope,
}

/// Result of the full-response variant of [`Paginator::fetch_all_full`]
#[derive(Debug, Clone, PartialEq)]
pub enum PagedResult {
    /// Exactly one page was fetched: its whole envelope
    Envelope(Value),
    /// Several pages were fetched: the flattened elements
    Elements(Vec<Value>),
}

impl PagedResult {
    /// Elements regardless of variant
    pub fn into_elements(self, element: &str) -> Vec<Value> {
        match self {
            PagedResult::Envelope(body) => PagedEnvelope::new(body)
                .elements(element)
                .cloned()
                .unwrap_or_default(),
            PagedResult::Elements(elements) => elements,
        }
    }
}

/// Walks every page of a collection through the retry policy
pub struct Paginator<'a> {
    transport: &'a dyn Transport,
    policy: &'a RetryPolicy,
    mode: ElementMode,
}

impl<'a> Paginator<'a> {
    pub fn new(transport: &'a dyn Transport, policy: &'a RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            mode: ElementMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: ElementMode) -> Self {
        self.mode = mode;
        self
    }

    /// Fetch a single page of the collection
    pub async fn fetch_page(
        &self,
        template: &Request,
        element: &str,
        index: usize,
    ) -> Result<Page> {
        let request = template.with_query_param(PAGE_PARAM, index);
        let response = self.policy.send_with_retry(self.transport, &request).await?;
        let envelope = PagedEnvelope::new(response.json_value()?);

        let total_pages = envelope.total_pages();
        let elements = match envelope.elements(element) {
            Some(elements) => elements.clone(),
            None if self.mode == ElementMode::Strict => {
                return Err(ApiError::MissingElement {
                    element: element.to_string(),
                    page: index,
                }
                .into());
            }
            None => Vec::new(),
        };

        debug!(
            "Fetched page {} of {} with {} '{}' elements",
            index + 1,
            total_pages.max(1),
            elements.len(),
            element
        );

        Ok(Page {
            index,
            total_pages,
            elements,
            envelope,
        })
    }

    /// Every page in order, as a stream.
    ///
    /// Pages are requested one at a time; the stream ends after the page whose
    /// index + 1 reaches the reported `total_pages`.
    pub fn pages<'s>(
        &'s self,
        template: &'s Request,
        element: &'s str,
    ) -> impl Stream<Item = Result<Page>> + 's {
        stream::try_unfold(Some(0usize), move |next| async move {
            let Some(index) = next else {
                return Ok::<_, Error>(None);
            };
            let page = self.fetch_page(template, element, index).await?;
            let following = index + 1;
            let next = (following < page.total_pages).then_some(following);
            Ok(Some((page, next)))
        })
    }

    /// All elements across all pages, in server order
    pub async fn fetch_all(&self, template: &Request, element: &str) -> Result<Vec<Value>> {
        let mut all = Vec::new();
        let mut pages = std::pin::pin!(self.pages(template, element));
        while let Some(page) = pages.try_next().await? {
            all.extend(page.elements);
        }
        Ok(all)
    }

    /// Like [`fetch_all`](Self::fetch_all), but deserializes each element
    pub async fn fetch_all_as<T: DeserializeOwned>(
        &self,
        template: &Request,
        element: &str,
    ) -> Result<Vec<T>> {
        self.fetch_all(template, element)
            .await?
            .into_iter()
            .map(|value| {
                serde_json::from_value(value).map_err(|e| {
                    ApiError::InvalidResponse(format!(
                        "Failed to parse '{}' element: {}",
                        element, e
                    ))
                    .into()
                })
            })
            .collect()
    }

    /// Full-response variant.
    ///
    /// Returns the whole envelope when exactly one page was fetched, otherwise
    /// the flattened element list; page metadata of a multi-page walk is not kept.
    pub async fn fetch_all_full(&self, template: &Request, element: &str) -> Result<PagedResult> {
        let mut all = Vec::new();
        let mut fetched = 0usize;
        let mut last = None;

        let mut pages = std::pin::pin!(self.pages(template, element));
        while let Some(page) = pages.try_next().await? {
            fetched += 1;
            all.extend(page.elements);
            last = Some(page.envelope);
        }

        match (fetched, last) {
            (1, Some(envelope)) => Ok(PagedResult::Envelope(envelope.into_body())),
            _ => Ok(PagedResult::Elements(all)),
        }
    }
}
