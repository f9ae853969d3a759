//! Finding models for the Findings API v2

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de};

/// Scan type a finding was produced by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScanType {
    Static,
    Dynamic,
    Manual,
    Sca,
    /// Any scan type this client does not know about
    #[serde(other)]
    Other,
}

impl ScanType {
    /// Value of the `scan_type` query parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanType::Static => "STATIC",
            ScanType::Dynamic => "DYNAMIC",
            ScanType::Manual => "MANUAL",
            ScanType::Sca => "SCA",
            ScanType::Other => "OTHER",
        }
    }
}

/// Resolution status value marking an approved mitigation
pub const RESOLUTION_APPROVED: &str = "APPROVED";

/// A single security finding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Issue id, unique within an application
    #[serde(default, deserialize_with = "deserialize_optional_u64_or_string")]
    pub issue_id: Option<u64>,

    pub scan_type: ScanType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,

    /// APPLICATION or SANDBOX
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_guid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violates_policy: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_id: Option<u64>,

    #[serde(default)]
    pub finding_status: FindingStatus,

    #[serde(default)]
    pub finding_details: FindingDetails,
}

impl Finding {
    /// CWE id from the finding details
    pub fn cwe_id(&self) -> Option<u32> {
        self.finding_details.cwe.as_ref().and_then(|cwe| cwe.id)
    }

    /// Whether the finding carries an approved mitigation
    pub fn is_approved(&self) -> bool {
        self.finding_status.resolution_status.as_deref() == Some(RESOLUTION_APPROVED)
    }
}

/// Triage state of a finding
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindingStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_found_date: Option<String>,

    /// OPEN or CLOSED
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// e.g. UNRESOLVED, MITIGATED, POTENTIAL_FALSE_POSITIVE
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mitigation_review_status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<bool>,

    /// NONE, PROPOSED, APPROVED or REJECTED
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_date: Option<String>,
}

impl FindingStatus {
    pub fn first_found(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.first_found_date.as_deref())
    }

    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.last_seen_date.as_deref())
    }
}

fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// CWE reference
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cwe {
    #[serde(default, deserialize_with = "deserialize_optional_u32_or_string")]
    pub id: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

/// Finding category reference
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindingCategory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

/// Scan-type-specific details.
///
/// Static findings fill the file/procedure fields, dynamic findings the
/// URL/path/parameter fields; everything is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindingDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwe: Option<Cwe>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finding_category: Option<FindingCategory>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exploitability: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack_vector: Option<String>,

    // Static
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_u32_or_string"
    )]
    pub file_line_number: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub procedure: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_location: Option<i64>,

    // Dynamic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vulnerable_parameter: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovered_by_vsa: Option<bool>,

    // Manual
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Deserializer for u32 fields that may arrive as numbers or strings
fn deserialize_optional_u32_or_string<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<u32>, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntOrString {
        Int(u32),
        String(String),
    }

    match Option::<IntOrString>::deserialize(deserializer)? {
        Some(IntOrString::Int(i)) => Ok(Some(i)),
        Some(IntOrString::String(s)) if s.trim().is_empty() => Ok(None),
        Some(IntOrString::String(s)) => s.trim().parse().map(Some).map_err(de::Error::custom),
        None => Ok(None),
    }
}

/// Deserializer for u64 fields that may arrive as numbers or strings
fn deserialize_optional_u64_or_string<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<u64>, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntOrString {
        Int(u64),
        String(String),
    }

    match Option::<IntOrString>::deserialize(deserializer)? {
        Some(IntOrString::Int(i)) => Ok(Some(i)),
        Some(IntOrString::String(s)) => s.trim().parse().map(Some).map_err(de::Error::custom),
        None => Ok(None),
    }
}
