//! URI rewriting boundary.
//!
//! The host embedder supplies the rewriter at install time. The
//! contract is idempotence: sanitized markup may be fed back through
//! the sanitizer, so `rewrite` applied to its own output must return
//! that output unchanged.

use std::collections::HashSet;

use url::Url;

pub trait UriRewriter {
    /// Returns the URI to emit, or `None` to reject it outright.
    /// `mime_type` narrows intent, e.g. `image/*` for image sources.
    fn rewrite(&self, uri: &str, mime_type: &str) -> Option<String>;
}

/// Rejects every URI. The fail-closed default.
#[derive(Debug, Default)]
pub struct DenyAllRewriter;

impl UriRewriter for DenyAllRewriter {
    fn rewrite(&self, _uri: &str, _mime_type: &str) -> Option<String> {
        None
    }
}

/// Allows absolute URIs whose scheme is on an allowlist, normalized
/// through a full parse. Relative and unparseable URIs are rejected.
#[derive(Debug)]
pub struct SchemeRewriter {
    allowed: HashSet<String>,
}

impl SchemeRewriter {
    pub fn new<I, S>(schemes: I) -> SchemeRewriter
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SchemeRewriter {
            allowed: schemes
                .into_iter()
                .map(|s| s.into().to_ascii_lowercase())
                .collect(),
        }
    }

    /// http, https and mailto.
    pub fn web_default() -> SchemeRewriter {
        SchemeRewriter::new(["http", "https", "mailto"])
    }
}

impl UriRewriter for SchemeRewriter {
    fn rewrite(&self, uri: &str, _mime_type: &str) -> Option<String> {
        let parsed = Url::parse(uri).ok()?;
        if self.allowed.contains(parsed.scheme()) {
            Some(parsed.to_string())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_rewriter_filters_by_scheme() {
        let rewriter = SchemeRewriter::web_default();
        assert_eq!(
            rewriter.rewrite("http://example.com/a", "*/*").as_deref(),
            Some("http://example.com/a")
        );
        assert_eq!(rewriter.rewrite("javascript:alert(1)", "*/*"), None);
        assert_eq!(rewriter.rewrite("no scheme here", "*/*"), None);
    }

    #[test]
    fn scheme_rewriter_is_idempotent() {
        let rewriter = SchemeRewriter::web_default();
        let once = rewriter.rewrite("HTTP://Example.COM/p?q=1", "*/*").unwrap();
        let twice = rewriter.rewrite(&once, "*/*").unwrap();
        assert_eq!(once, twice);
    }
}
