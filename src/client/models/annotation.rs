//! Annotation (mitigation/comment) models for the Findings API

use std::fmt;

use serde::{Deserialize, Serialize};

/// Annotation action accepted by `appsec/v2/applications/{app}/annotations`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnnotationAction {
    Comment,
    /// Potential false positive
    Fp,
    /// Mitigated by design
    AppDesign,
    /// Mitigated by OS environment
    OsEnv,
    /// Mitigated by network environment
    NetEnv,
    Library,
    AcceptRisk,
    Accepted,
    Rejected,
}

impl fmt::Display for AnnotationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AnnotationAction::Comment => "COMMENT",
            AnnotationAction::Fp => "FP",
            AnnotationAction::AppDesign => "APPDESIGN",
            AnnotationAction::OsEnv => "OSENV",
            AnnotationAction::NetEnv => "NETENV",
            AnnotationAction::Library => "LIBRARY",
            AnnotationAction::AcceptRisk => "ACCEPTRISK",
            AnnotationAction::Accepted => "ACCEPTED",
            AnnotationAction::Rejected => "REJECTED",
        };
        write!(f, "{}", s)
    }
}

/// Request body for adding an annotation to one or more findings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationRequest {
    pub comment: String,
    pub action: AnnotationAction,
    /// Comma-separated issue ids
    pub issue_list: String,
}

impl AnnotationRequest {
    pub fn new(issue_ids: &[u64], comment: impl Into<String>, action: AnnotationAction) -> Self {
        let issue_list = issue_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        Self {
            comment: comment.into(),
            action,
            issue_list,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_annotation_request_body() {
        let ids = [12, 7, 1021];
        let request = AnnotationRequest::new(&ids, "Reviewed", AnnotationAction::AppDesign);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "comment": "Reviewed",
                "action": "APPDESIGN",
                "issue_list": "12,7,1021"
            })
        );
    }

    #[test]
    fn test_action_display_matches_wire_value() {
        for action in [
            AnnotationAction::Fp,
            AnnotationAction::AcceptRisk,
            AnnotationAction::NetEnv,
        ] {
            let wire = serde_json::to_value(action).unwrap();
            assert_eq!(wire, json!(action.to_string()));
        }
    }
}
