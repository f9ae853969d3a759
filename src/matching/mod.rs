//! Finding correlation across scans
//!
//! Given a finding from one scan and the findings of another, pick the
//! candidate that represents the same issue so triage decisions (comments,
//! approved mitigations) can be carried over.
//!
//! Static findings are compared in strict precedence order:
//! 1. same CWE, origin path contains candidate path, same line
//! 2. same CWE and path, line within [`FUZZY_LINE_TOLERANCE`] (opt-in)
//! 3. same CWE, origin procedure contains candidate procedure, same
//!    relative location
//!
//! Dynamic findings need the same CWE, path and vulnerable parameter.
//! No match is a normal outcome, not an error.

mod path;
mod record;

use log::{debug, trace};

use crate::client::models::Finding;

pub use path::{CI_PATH_MARKER, CI_PATH_OFFSET, normalize_source_path};
pub use record::{ComparisonRecord, DynamicRecord, StaticRecord};

/// Maximum line drift accepted by the fuzzy static rule
pub const FUZZY_LINE_TOLERANCE: u32 = 3;

/// Correlation switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOptions {
    /// Only consider candidates whose mitigation was approved
    pub approved_only: bool,
    /// Enable the line-tolerance rule for static findings
    pub allow_fuzzy: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            approved_only: true,
            allow_fuzzy: false,
        }
    }
}

/// Which rule produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    StaticExact,
    StaticFuzzy,
    StaticProcedure,
    Dynamic,
}

/// Candidate set prepared once and matched against many origins
#[derive(Debug)]
pub struct Correlator<'c> {
    candidates: Vec<(&'c Finding, ComparisonRecord)>,
    options: MatchOptions,
}

impl<'c> Correlator<'c> {
    pub fn new<I>(candidates: I, options: MatchOptions) -> Self
    where
        I: IntoIterator<Item = &'c Finding>,
    {
        let candidates = candidates
            .into_iter()
            .filter(|finding| !options.approved_only || finding.is_approved())
            .filter_map(|finding| {
                ComparisonRecord::from_finding(finding).map(|record| (finding, record))
            })
            .collect();
        Self {
            candidates,
            options,
        }
    }

    /// Number of candidates left after filtering
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Best candidate for `origin`, or `None`
    pub fn find(&self, origin: &Finding) -> Option<&'c Finding> {
        self.find_with_rule(origin).map(|(finding, _)| finding)
    }

    /// Best candidate for `origin` together with the rule that matched
    pub fn find_with_rule(&self, origin: &Finding) -> Option<(&'c Finding, MatchRule)> {
        let found = match ComparisonRecord::from_finding(origin)? {
            ComparisonRecord::Static(record) => self.find_static(&record),
            ComparisonRecord::Dynamic(record) => self.find_dynamic(&record),
        };

        match found {
            Some((finding, rule)) => debug!(
                "Finding {:?} matched {:?} by {:?}",
                origin.issue_id, finding.issue_id, rule
            ),
            None => trace!("Finding {:?} has no match", origin.issue_id),
        }
        found
    }

    fn statics(&self) -> impl Iterator<Item = (&'c Finding, &StaticRecord)> + '_ {
        self.candidates.iter().filter_map(|(finding, record)| match record {
            ComparisonRecord::Static(record) => Some((*finding, record)),
            _ => None,
        })
    }

    fn find_static(&self, origin: &StaticRecord) -> Option<(&'c Finding, MatchRule)> {
        if origin.source_file.is_some() {
            let exact = self
                .statics()
                .find(|(_, candidate)| same_file_line(origin, candidate, 0));
            if let Some((finding, _)) = exact {
                return Some((finding, MatchRule::StaticExact));
            }

            if self.options.allow_fuzzy {
                let fuzzy = self.statics().find(|(_, candidate)| {
                    same_file_line(origin, candidate, FUZZY_LINE_TOLERANCE)
                });
                if let Some((finding, _)) = fuzzy {
                    return Some((finding, MatchRule::StaticFuzzy));
                }
            }
        }

        self.statics()
            .find(|(_, candidate)| same_procedure(origin, candidate))
            .map(|(finding, _)| (finding, MatchRule::StaticProcedure))
    }

    fn find_dynamic(&self, origin: &DynamicRecord) -> Option<(&'c Finding, MatchRule)> {
        self.candidates
            .iter()
            .find(|(_, record)| match record {
                ComparisonRecord::Dynamic(candidate) => {
                    same_cwe(origin.cwe, candidate.cwe)
                        && origin.path.is_some()
                        && origin.path == candidate.path
                        && origin.vulnerable_parameter == candidate.vulnerable_parameter
                }
                _ => false,
            })
            .map(|(finding, _)| (*finding, MatchRule::Dynamic))
    }
}

fn same_cwe(a: Option<u32>, b: Option<u32>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}

/// CWE equal, origin path contains candidate path, lines within `tolerance`
fn same_file_line(origin: &StaticRecord, candidate: &StaticRecord, tolerance: u32) -> bool {
    let (Some(origin_file), Some(candidate_file)) = (&origin.source_file, &candidate.source_file)
    else {
        return false;
    };
    let (Some(origin_line), Some(candidate_line)) = (origin.line, candidate.line) else {
        return false;
    };
    same_cwe(origin.cwe, candidate.cwe)
        && origin_file.contains(candidate_file.as_str())
        && origin_line.abs_diff(candidate_line) <= tolerance
}

/// CWE equal, origin procedure contains candidate procedure, same location
fn same_procedure(origin: &StaticRecord, candidate: &StaticRecord) -> bool {
    let (Some(origin_proc), Some(candidate_proc)) = (&origin.procedure, &candidate.procedure)
    else {
        return false;
    };
    same_cwe(origin.cwe, candidate.cwe)
        && origin_proc.contains(candidate_proc.as_str())
        && origin.relative_location.is_some()
        && origin.relative_location == candidate.relative_location
}

/// Find the candidate representing the same issue as `origin`.
///
/// Candidates of a different scan type than the origin are never returned;
/// origins that are neither STATIC nor DYNAMIC never match.
pub fn match_finding<'c, I>(
    origin: &Finding,
    candidates: I,
    options: MatchOptions,
) -> Option<&'c Finding>
where
    I: IntoIterator<Item = &'c Finding>,
{
    Correlator::new(candidates, options).find(origin)
}

/// Pair every origin with its match among `candidates`, in origin order
pub fn match_findings<'o, 'c>(
    origins: &'o [Finding],
    candidates: &'c [Finding],
    options: MatchOptions,
) -> Vec<(&'o Finding, Option<&'c Finding>)> {
    let correlator = Correlator::new(candidates, options);
    let pairs: Vec<_> = origins
        .iter()
        .map(|origin| (origin, correlator.find(origin)))
        .collect();
    debug!(
        "Matched {} of {} findings against {} candidates",
        pairs.iter().filter(|(_, m)| m.is_some()).count(),
        origins.len(),
        correlator.len()
    );
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn finding(value: Value) -> Finding {
        serde_json::from_value(value).unwrap()
    }

    fn static_finding(id: u64, cwe: u32, file: &str, line: u32, approved: bool) -> Finding {
        finding(json!({
            "issue_id": id,
            "scan_type": "STATIC",
            "finding_status": { "resolution_status": if approved { "APPROVED" } else { "NONE" } },
            "finding_details": {
                "cwe": { "id": cwe },
                "file_path": file,
                "file_line_number": line,
                "procedure": "com.example.Login.doPost",
                "relative_location": 12
            }
        }))
    }

    fn procedure_finding(id: u64, cwe: u32, procedure: &str, location: i64) -> Finding {
        finding(json!({
            "issue_id": id,
            "scan_type": "STATIC",
            "finding_status": { "resolution_status": "APPROVED" },
            "finding_details": {
                "cwe": { "id": cwe },
                "procedure": procedure,
                "relative_location": location
            }
        }))
    }

    fn dynamic_finding(id: u64, cwe: u32, path: &str, parameter: Option<&str>) -> Finding {
        let mut details = json!({ "cwe": { "id": cwe }, "path": path });
        if let Some(parameter) = parameter {
            details["vulnerable_parameter"] = json!(parameter);
        }
        finding(json!({
            "issue_id": id,
            "scan_type": "DYNAMIC",
            "finding_status": { "resolution_status": "APPROVED" },
            "finding_details": details
        }))
    }

    fn fuzzy() -> MatchOptions {
        MatchOptions {
            allow_fuzzy: true,
            ..MatchOptions::default()
        }
    }

    fn ids(found: Option<&Finding>) -> Option<u64> {
        found.and_then(|f| f.issue_id)
    }

    #[test]
    fn test_default_options() {
        let options = MatchOptions::default();
        assert!(options.approved_only);
        assert!(!options.allow_fuzzy);
    }

    #[test]
    fn test_static_exact_wins_over_fuzzy() {
        let origin = static_finding(1, 80, "src/a/b/c.java", 10, false);
        let near = static_finding(2, 80, "a/b/c.java", 12, true);
        let exact = static_finding(3, 80, "a/b/c.java", 10, true);
        let candidates = vec![near, exact];

        let found = match_finding(&origin, &candidates, MatchOptions::default());
        assert_eq!(ids(found), Some(3));

        let found = match_finding(&origin, &candidates, fuzzy());
        assert_eq!(ids(found), Some(3));
    }

    #[test]
    fn test_fuzzy_only_when_allowed() {
        let origin = static_finding(1, 80, "a/b/c.java", 10, false);
        let mut near = static_finding(2, 80, "a/b/c.java", 12, true);
        // Different procedure so the fallback cannot pick it up
        near.finding_details.procedure = Some("other".to_string());
        let candidates = vec![near];

        assert!(match_finding(&origin, &candidates, MatchOptions::default()).is_none());
        assert_eq!(ids(match_finding(&origin, &candidates, fuzzy())), Some(2));
    }

    #[test]
    fn test_fuzzy_window_is_three_lines() {
        let origin = static_finding(1, 80, "a/b/c.java", 10, false);
        let mut at_edge = static_finding(2, 80, "a/b/c.java", 7, true);
        at_edge.finding_details.procedure = None;
        let mut outside = static_finding(3, 80, "a/b/c.java", 14, true);
        outside.finding_details.procedure = None;

        let edge = [at_edge];
        assert_eq!(ids(match_finding(&origin, &edge, fuzzy())), Some(2));
        let far = [outside];
        assert!(match_finding(&origin, &far, fuzzy()).is_none());
    }

    #[test]
    fn test_static_procedure_fallback() {
        let origin = static_finding(1, 80, "a/b/c.java", 10, false);
        let candidates = vec![
            procedure_finding(4, 80, "Login.doPost", 11),
            procedure_finding(5, 79, "Login.doPost", 12),
            procedure_finding(6, 80, "Login.doPost", 12),
        ];

        assert_eq!(
            ids(match_finding(&origin, &candidates, MatchOptions::default())),
            Some(6)
        );
    }

    #[test]
    fn test_origin_without_file_uses_fallback() {
        let origin = procedure_finding(1, 80, "com.example.Login.doPost", 12);
        let candidates = vec![
            static_finding(2, 80, "a/b/c.java", 10, true),
            procedure_finding(3, 80, "doPost", 12),
        ];

        // Candidate 2 shares procedure and location too, and comes first
        assert_eq!(
            ids(match_finding(&origin, &candidates, MatchOptions::default())),
            Some(2)
        );
        assert_eq!(
            ids(match_finding(&origin, &candidates[1..], MatchOptions::default())),
            Some(3)
        );
    }

    #[test]
    fn test_static_no_match() {
        let origin = static_finding(1, 80, "a/b/c.java", 10, false);
        let candidates = vec![
            static_finding(2, 89, "a/b/c.java", 10, true),
            procedure_finding(3, 80, "Other.run", 12),
        ];

        assert!(match_finding(&origin, &candidates, fuzzy()).is_none());
    }

    #[test]
    fn test_static_ignores_dynamic_candidates() {
        let origin = static_finding(1, 80, "a/b/c.java", 10, false);
        let candidates = vec![dynamic_finding(2, 80, "a/b/c.java", None)];
        assert!(match_finding(&origin, &candidates, fuzzy()).is_none());
    }

    #[test]
    fn test_dynamic_exact_match() {
        let origin = dynamic_finding(1, 89, "/login", Some("user"));
        let candidates = vec![
            dynamic_finding(2, 89, "/login", Some("password")),
            dynamic_finding(3, 79, "/login", Some("user")),
            dynamic_finding(4, 89, "/login", Some("user")),
        ];

        assert_eq!(
            ids(match_finding(&origin, &candidates, MatchOptions::default())),
            Some(4)
        );
        assert!(match_finding(&origin, &candidates[..2], fuzzy()).is_none());
    }

    #[test]
    fn test_dynamic_missing_parameter_matches_empty() {
        let origin = dynamic_finding(1, 89, "/search", None);
        let candidates = vec![
            dynamic_finding(2, 89, "/search", Some("q")),
            dynamic_finding(3, 89, "/search", Some("")),
        ];

        assert_eq!(
            ids(match_finding(&origin, &candidates, MatchOptions::default())),
            Some(3)
        );
    }

    #[test]
    fn test_approved_only_filter() {
        let origin = static_finding(1, 80, "a/b/c.java", 10, false);
        let unapproved = vec![static_finding(2, 80, "a/b/c.java", 10, false)];

        assert!(match_finding(&origin, &unapproved, MatchOptions::default()).is_none());

        let any = MatchOptions {
            approved_only: false,
            ..MatchOptions::default()
        };
        assert_eq!(ids(match_finding(&origin, &unapproved, any)), Some(2));
    }

    #[test]
    fn test_ci_prefix_does_not_defeat_matching() {
        let origin = static_finding(
            1,
            80,
            "/ci/teamcity/buildagent/work/0123456789abcdef/src/a/b/c.java",
            10,
            false,
        );
        let candidate = static_finding(
            2,
            80,
            "teamcity/buildagent/work/fedcba9876543210/src/a/b/c.java",
            10,
            true,
        );

        let candidates = [candidate];
        assert_eq!(
            ids(match_finding(&origin, &candidates, MatchOptions::default())),
            Some(2)
        );
    }

    #[test]
    fn test_other_scan_types_never_match() {
        let origin = finding(json!({ "issue_id": 1, "scan_type": "MANUAL" }));
        let candidates = vec![finding(json!({
            "issue_id": 2,
            "scan_type": "MANUAL",
            "finding_status": { "resolution_status": "APPROVED" }
        }))];
        assert!(match_finding(&origin, &candidates, MatchOptions::default()).is_none());
    }

    #[test]
    fn test_match_rule_reported() {
        let origin = static_finding(1, 80, "a/b/c.java", 10, false);
        let candidates = vec![static_finding(2, 80, "b/c.java", 10, true)];
        let correlator = Correlator::new(&candidates, MatchOptions::default());

        let (found, rule) = correlator.find_with_rule(&origin).unwrap();
        assert_eq!(found.issue_id, Some(2));
        assert_eq!(rule, MatchRule::StaticExact);
    }

    #[test]
    fn test_match_findings_pairs_in_order() {
        let origins = vec![
            static_finding(10, 80, "a/b/c.java", 10, false),
            dynamic_finding(11, 89, "/login", Some("user")),
            static_finding(12, 22, "x/y.java", 1, false),
        ];
        let candidates = vec![
            dynamic_finding(21, 89, "/login", Some("user")),
            static_finding(20, 80, "a/b/c.java", 10, true),
        ];

        let pairs = match_findings(&origins, &candidates, MatchOptions::default());

        let summary: Vec<_> = pairs
            .iter()
            .map(|(origin, found)| (origin.issue_id, ids(*found)))
            .collect();
        assert_eq!(
            summary,
            vec![(Some(10), Some(20)), (Some(11), Some(21)), (Some(12), None)]
        );
    }
}
