//! URL processing utilities.

/// Check if a link is external (has a URL scheme like http:, mailto:, etc.)
///
/// A valid scheme must:
/// - Have at least 1 character before the colon
/// - Only contain ASCII alphanumeric or `+`, `-`, `.`
///
/// # Examples
/// ```ignore
/// assert!(is_external_link("https://example.com"));
/// assert!(is_external_link("mailto:user@example.com"));
/// assert!(!is_external_link("/about"));
/// assert!(!is_external_link("./file.txt"));
/// ```
#[inline]
pub fn is_external_link(link: &str) -> bool {
    link.find(':').is_some_and(|pos| {
        pos > 0
            && link[..pos]
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

/// Split a URL into path and query-or-fragment parts
///
/// Used by the preview server to drop `?query` and `#fragment` from request URLs.
///
/// # Examples
/// ```ignore
/// assert_eq!(split_path_fragment("/about#team"), ("/about", "team"));
/// assert_eq!(split_path_fragment("/about?v=1"), ("/about", "v=1"));
/// assert_eq!(split_path_fragment("/about"), ("/about", ""));
/// ```
#[inline]
pub fn split_path_fragment(url: &str) -> (&str, &str) {
    url.split_once(['?', '#']).unwrap_or((url, ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_external_link() {
        assert!(is_external_link("https://example.com"));
        assert!(is_external_link("http://localhost:2368/"));
        assert!(is_external_link("mailto:user@example.com"));
        assert!(is_external_link("tel:+1234567890"));
        assert!(!is_external_link("/about"));
        assert!(!is_external_link("./file.txt"));
        assert!(!is_external_link("about.html"));
        assert!(!is_external_link(":missing-scheme"));
        assert!(!is_external_link("/path/with:colon"));
    }

    #[test]
    fn test_split_path_fragment() {
        assert_eq!(split_path_fragment("/about#team"), ("/about", "team"));
        assert_eq!(split_path_fragment("/about?v=1"), ("/about", "v=1"));
        assert_eq!(split_path_fragment("/about"), ("/about", ""));
        assert_eq!(split_path_fragment("#top"), ("", "top"));
    }
}
