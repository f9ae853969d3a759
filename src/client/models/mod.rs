//! Veracode API data models

mod annotation;
mod finding;

pub use annotation::{AnnotationAction, AnnotationRequest};
pub use finding::{
    Cwe, Finding, FindingCategory, FindingDetails, FindingStatus, RESOLUTION_APPROVED, ScanType,
};
