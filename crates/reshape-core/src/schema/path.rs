//! Field-path parsing
//!
//! Paths are dot-separated segments. A segment may be wrapped in double
//! quotes to embed literal dots (`"a.b".c`), and may carry a trailing
//! `[N]` array-index suffix. Quote characters are stripped, never
//! preserved.
//!
//! Copyright (c) 2025 Reshape Team
//! Licensed under the Apache-2.0 license

/// Split a full path into its segments, honoring double-quoted segments.
pub fn parse_path(full_path: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for ch in full_path.chars() {
        if ch == '"' {
            quoted = !quoted;
            continue;
        }
        if ch == '.' && !quoted {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            continue;
        }
        current.push(ch);
    }
    if !current.is_empty() {
        parts.push(current);
    }

    parts
}

/// Split one segment into its key and optional array index.
///
/// `name[3]` yields `("name", Some(3))`. A missing closing bracket, or a
/// non-numeric or negative index, yields the whole segment with no index.
pub fn parse_path_entry(entry: &str) -> (&str, Option<usize>) {
    match entry.split_once('[') {
        None => (entry, None),
        Some((key, rest)) => match rest.strip_suffix(']').and_then(|s| s.parse::<usize>().ok()) {
            Some(index) => (key, Some(index)),
            None => (entry, None),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_dotted_path() {
        assert_eq!(parse_path("a.b.c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn quoted_segment_embeds_dots() {
        assert_eq!(parse_path("\"a.b\".c"), vec!["a.b", "c"]);
        assert_eq!(parse_path("x.\"y.z\""), vec!["x", "y.z"]);
    }

    #[test]
    fn empty_segments_are_dropped() {
        assert_eq!(parse_path("a..b"), vec!["a", "b"]);
        assert_eq!(parse_path(""), Vec::<String>::new());
    }

    #[test]
    fn entry_with_index() {
        assert_eq!(parse_path_entry("tags[0]"), ("tags", Some(0)));
        assert_eq!(parse_path_entry("tags[12]"), ("tags", Some(12)));
    }

    #[test]
    fn entry_without_usable_index() {
        assert_eq!(parse_path_entry("tags"), ("tags", None));
        assert_eq!(parse_path_entry("tags[x]"), ("tags[x]", None));
        assert_eq!(parse_path_entry("tags[-1]"), ("tags[-1]", None));
        assert_eq!(parse_path_entry("tags[3"), ("tags[3", None));
    }
}
