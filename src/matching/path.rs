//! Source path normalization

/// Marker of a TeamCity build agent checkout inside a reported file path
pub const CI_PATH_MARKER: &str = "teamcity/buildagent/work/";

/// Bytes stripped from the marker start: the marker, the 16-char checkout
/// directory and its trailing slash.
pub const CI_PATH_OFFSET: usize = 42;

/// Strip a CI working-directory prefix from a source file path.
///
/// Paths without the marker are returned unchanged. The marker is matched
/// case-insensitively; a path too short to hold the full prefix normalizes
/// to an empty string.
pub fn normalize_source_path(path: &str) -> &str {
    match path.to_ascii_lowercase().find(CI_PATH_MARKER) {
        Some(start) => path.get(start + CI_PATH_OFFSET..).unwrap_or(""),
        None => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_without_marker_is_unchanged() {
        assert_eq!(
            normalize_source_path("com/example/Login.java"),
            "com/example/Login.java"
        );
    }

    #[test]
    fn test_strips_build_agent_prefix() {
        assert_eq!(
            normalize_source_path(
                "/opt/teamcity/buildagent/work/8c3f0e1a2b4d6f70/src/main/Login.java"
            ),
            "src/main/Login.java"
        );
    }

    #[test]
    fn test_marker_at_path_start() {
        assert_eq!(
            normalize_source_path("teamcity/buildagent/work/0123456789abcdef/app/Main.java"),
            "app/Main.java"
        );
    }

    #[test]
    fn test_marker_is_case_insensitive() {
        assert_eq!(
            normalize_source_path("D:/TeamCity/BuildAgent/work/0123456789abcdef/Main.java"),
            "Main.java"
        );
    }

    #[test]
    fn test_paths_differing_only_in_prefix_normalize_equal() {
        let a = "/home/ci/teamcity/buildagent/work/aaaaaaaaaaaaaaaa/lib/util.c";
        let b = "/var/teamcity/buildagent/work/bbbbbbbbbbbbbbbb/lib/util.c";
        assert_eq!(normalize_source_path(a), normalize_source_path(b));
    }

    #[test]
    fn test_truncated_prefix_normalizes_to_empty() {
        assert_eq!(normalize_source_path("teamcity/buildagent/work/abc"), "");
    }
}
