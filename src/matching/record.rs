//! Flat comparison records built from findings

use crate::client::models::{Finding, ScanType};

use super::path::normalize_source_path;

/// Fields of a static finding used for correlation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticRecord {
    pub id: Option<u64>,
    pub cwe: Option<u32>,
    /// Normalized file path; `None` when absent or empty
    pub source_file: Option<String>,
    pub line: Option<u32>,
    pub procedure: Option<String>,
    pub relative_location: Option<i64>,
}

/// Fields of a dynamic finding used for correlation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicRecord {
    pub id: Option<u64>,
    pub cwe: Option<u32>,
    pub path: Option<String>,
    /// Empty when the API omits the parameter
    pub vulnerable_parameter: String,
}

/// Correlation view of a finding, per scan type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComparisonRecord {
    Static(StaticRecord),
    Dynamic(DynamicRecord),
}

impl ComparisonRecord {
    /// Build the record for a finding; scan types without a correlation
    /// algorithm yield `None`.
    pub fn from_finding(finding: &Finding) -> Option<Self> {
        match finding.scan_type {
            ScanType::Static => Some(Self::Static(StaticRecord::from(finding))),
            ScanType::Dynamic => Some(Self::Dynamic(DynamicRecord::from(finding))),
            _ => None,
        }
    }
}

impl From<&Finding> for StaticRecord {
    fn from(finding: &Finding) -> Self {
        let details = &finding.finding_details;
        Self {
            id: finding.issue_id,
            cwe: finding.cwe_id(),
            source_file: details
                .file_path
                .as_deref()
                .map(normalize_source_path)
                .filter(|path| !path.is_empty())
                .map(str::to_string),
            line: details.file_line_number,
            procedure: non_empty(details.procedure.as_deref()),
            relative_location: details.relative_location,
        }
    }
}

impl From<&Finding> for DynamicRecord {
    fn from(finding: &Finding) -> Self {
        let details = &finding.finding_details;
        Self {
            id: finding.issue_id,
            cwe: finding.cwe_id(),
            path: non_empty(details.path.as_deref()),
            vulnerable_parameter: details.vulnerable_parameter.clone().unwrap_or_default(),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}
