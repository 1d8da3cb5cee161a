//! Object key helpers.
//!
//! S3 keys are plain `/`-separated strings. These helpers build and take apart
//! keys without ever producing doubled or leading separators.

/// Join key segments with `/`.
///
/// Leading and trailing slashes on each segment are trimmed and empty
/// segments are skipped, so an empty root prefix disappears from the key.
///
/// # Arguments
/// * `segments` - Key segments in order
///
/// # Returns
/// The joined key.
pub fn join_key<S: AsRef<str>>(segments: &[S]) -> String {
    let mut key: String = String::new();
    for segment in segments {
        let trimmed: &str = segment.as_ref().trim_matches('/');
        if trimmed.is_empty() {
            continue;
        }
        if !key.is_empty() {
            key.push('/');
        }
        key.push_str(trimmed);
    }
    key
}

/// Build a listing prefix that ends in exactly one `/`.
///
/// # Arguments
/// * `segments` - Prefix segments in order
pub fn directory_prefix<S: AsRef<str>>(segments: &[S]) -> String {
    let mut prefix: String = join_key(segments);
    if !prefix.is_empty() {
        prefix.push('/');
    }
    prefix
}

/// Strip a listing prefix from a key.
///
/// Returns the key unchanged if it does not start with `prefix`.
///
/// # Arguments
/// * `key` - Full object key
/// * `prefix` - Prefix the key was listed under
pub fn strip_key_prefix<'a>(key: &'a str, prefix: &str) -> &'a str {
    key.strip_prefix(prefix).unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_key_basic() {
        assert_eq!(join_key(&["daily", "abc-2024-03-01", "courses", "c.gz"]), "daily/abc-2024-03-01/courses/c.gz");
    }

    #[test]
    fn test_join_key_trims_slashes() {
        assert_eq!(join_key(&["canvas-data/daily/", "/courses", "c.gz"]), "canvas-data/daily/courses/c.gz");
    }

    #[test]
    fn test_join_key_skips_empty_segments() {
        assert_eq!(join_key(&["", "requests", "r.gz"]), "requests/r.gz");
        assert_eq!(join_key::<&str>(&[]), "");
    }

    #[test]
    fn test_directory_prefix() {
        assert_eq!(directory_prefix(&["current-term", "requests"]), "current-term/requests/");
        assert_eq!(directory_prefix(&["current-term/", "requests/"]), "current-term/requests/");
        assert_eq!(directory_prefix(&["", ""]), "");
    }

    #[test]
    fn test_strip_key_prefix() {
        assert_eq!(strip_key_prefix("requests/foo.gz", "requests/"), "foo.gz");
        assert_eq!(strip_key_prefix("requests/sub/foo.gz", "requests/"), "sub/foo.gz");
        assert_eq!(strip_key_prefix("other/foo.gz", "requests/"), "other/foo.gz");
        assert_eq!(strip_key_prefix("requests/", "requests/"), "");
    }
}
