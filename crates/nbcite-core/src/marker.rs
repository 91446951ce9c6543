//! Citation markers embedded in markdown cell text.
//!
//! The citation-manager extension renders a citation as
//! `<cite id="IDENT"><a href="#TOKEN">...</a></cite>` where `TOKEN` is the
//! URL-encoded form of `<provider>|<external-id>`. Only this tag shape is
//! recognized; the surrounding markup is never parsed.

use once_cell::sync::Lazy;
use regex::Regex;

static CITE_MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r##"<cite id="([^"]+)"><a\s+href="#([^"]+)">"##).expect("valid cite marker regex")
});

/// A `<cite>` marker found in cell text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationMarker {
    pub cite_id: String,
    /// The href target with the leading `#` removed, still URL-encoded.
    pub href: String,
}

impl CitationMarker {
    /// URL-decode the href. Invalid UTF-8 sequences are replaced, never rejected.
    pub fn decoded_href(&self) -> String {
        decode_href(&self.href)
    }

    /// The external identifier following `separator` in the decoded href.
    ///
    /// Returns `None` when the href does not carry the provider separator.
    pub fn external_id(&self, separator: &str) -> Option<String> {
        let decoded = self.decoded_href();
        decoded
            .split_once(separator)
            .map(|(_, external)| external.to_string())
    }
}

/// Find every non-overlapping citation marker in `text`, in order.
pub fn scan_markers(text: &str) -> Vec<CitationMarker> {
    CITE_MARKER_RE
        .captures_iter(text)
        .map(|caps| CitationMarker {
            cite_id: caps[1].to_string(),
            href: caps[2].to_string(),
        })
        .collect()
}

pub fn decode_href(href: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(href.as_bytes())).into_owned()
}
