//! Findings API trait

use async_trait::async_trait;
use serde_json::Value;

use crate::client::models::{AnnotationAction, Finding, ScanType};
use crate::error::Result;

/// Operations on `appsec/v2/applications/{app}/findings` and annotations
#[async_trait]
pub trait FindingsApi: Send + Sync {
    /// All findings of an application, across every page.
    ///
    /// `scan_type` of `None` (or [`ScanType::Other`]) omits the filter and
    /// returns findings of every scan type. `params` are passed through as
    /// additional query parameters (e.g. `context` for a sandbox).
    async fn get_findings(
        &self,
        app_guid: &str,
        scan_type: Option<ScanType>,
        include_annotations: bool,
        params: &[(&str, &str)],
    ) -> Result<Vec<Finding>>;

    /// Annotate a set of findings with a comment and mitigation action
    async fn add_annotation(
        &self,
        app_guid: &str,
        issue_ids: &[u64],
        comment: &str,
        action: AnnotationAction,
    ) -> Result<Value>;
}
