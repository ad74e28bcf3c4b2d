//! Canonicalization of SCM-reported file paths.
//!
//! The engine reports item paths with an inconsistent number of leading
//! separators and, for revisioned items, a trailing `;<revision>` qualifier.
//! [`strip_revision`] turns every such string into one stable
//! repository-relative form.
//!
//! | raw | canonical |
//! |-----|-----------|
//! | `//proj/src/main.c;5` | `proj/src/main.c` |
//! | `///a//b//` | `a//b//` |
//! | `a;1;1` | `a;1` |
//! | `;;` | `;` |

/// Separator stripped from the front of raw paths.
pub const SEPARATOR: char = '/';

/// Marker introducing a revision qualifier.
pub const QUALIFIER_MARKER: char = ';';

/// Canonicalize a raw SCM path.
///
/// Removes every leading `/`, then drops the last `;` together with whatever
/// follows it. Earlier semicolons and internal separator runs are kept
/// verbatim. Never fails; the empty string maps to itself.
pub fn strip_revision(raw: &str) -> String {
    let body = raw.trim_start_matches(SEPARATOR);
    match body.rfind(QUALIFIER_MARKER) {
        Some(pos) => body[..pos].to_string(),
        None => body.to_string(),
    }
}

/// The qualifier text that [`strip_revision`] would remove, without the
/// leading `;`. `None` when the path carries no qualifier.
pub fn revision_qualifier(raw: &str) -> Option<&str> {
    let body = raw.trim_start_matches(SEPARATOR);
    body.rfind(QUALIFIER_MARKER).map(|pos| &body[pos + 1..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_table() {
        let cases = [
            ("/a;1", "a"),
            ("//a;", "a"),
            ("///a", "a"),
            ("/a/b;1", "a/b"),
            ("//a/b/;", "a/b/"),
            ("///a//b//", "a//b//"),
            ("a;1;1", "a;1"),
            (";;", ";"),
            ("///;;////", ";"),
            ("a;1", "a"),
            ("a;", "a"),
            ("a", "a"),
            (";1", ""),
            (";", ""),
            ("", ""),
        ];
        for (raw, expected) in cases {
            assert_eq!(strip_revision(raw), expected, "input {:?}", raw);
        }
    }

    #[test]
    fn test_internal_separators_preserved() {
        assert_eq!(strip_revision("///a//b//"), "a//b//");
        assert_eq!(strip_revision("/proj//src;3"), "proj//src");
    }

    #[test]
    fn test_only_trailing_segment_removed() {
        assert_eq!(strip_revision(";;"), ";");
        assert_eq!(strip_revision("dir;v1/file.c;7"), "dir;v1/file.c");
    }

    #[test]
    fn test_separators_only() {
        assert_eq!(strip_revision("////"), "");
    }

    #[test]
    fn test_revision_qualifier() {
        assert_eq!(revision_qualifier("//proj/src/main.c;5"), Some("5"));
        assert_eq!(revision_qualifier("a;1;2"), Some("2"));
        assert_eq!(revision_qualifier("a;"), Some(""));
        assert_eq!(revision_qualifier("///a"), None);
        assert_eq!(revision_qualifier(""), None);
    }
}
