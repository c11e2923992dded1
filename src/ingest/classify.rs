//! Fingerprinting and full-text classification of feed entries.
//!
//! Everything here is pure: no I/O, no clock.

use std::fmt::Write as _;

use sha2::{Digest, Sha256};

use crate::feed::RawEntry;

/// Notice appended to the description when an entry carries no full text.
pub const FALLBACK_NOTICE: &str =
    "Only the description is available. Full text is at the original source.";

/// Extension element names that carry a full-text body, compared case-insensitively.
const FULL_TEXT_EXTENSIONS: [&str; 3] = ["full-text", "fulltext", "full_text"];

/// Number of digest bytes kept in a fingerprint (128 bits).
const FINGERPRINT_BYTES: usize = 16;

/// Content identity of an entry.
///
/// Hashes the GUID when present and non-blank, otherwise the link, after
/// trimming and lowercasing. Returns 32 lowercase hex characters.
pub fn fingerprint(entry: &RawEntry) -> String {
    let identity = entry
        .guid
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .or_else(|| entry.link.as_deref().map(str::trim))
        .unwrap_or_default()
        .to_lowercase();

    let digest = Sha256::digest(identity.as_bytes());
    let mut out = String::with_capacity(FINGERPRINT_BYTES * 2);
    for b in digest.iter().take(FINGERPRINT_BYTES) {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Full text embedded in the entry, if any.
///
/// Prefers the content body, then full-text extension elements.
pub fn extract_full_text(entry: &RawEntry) -> Option<String> {
    if let Some(content) = entry.content.as_deref().filter(|c| !c.trim().is_empty()) {
        return Some(content.to_string());
    }

    entry
        .extensions
        .iter()
        .filter(|(name, _)| {
            FULL_TEXT_EXTENSIONS
                .iter()
                .any(|known| name.eq_ignore_ascii_case(known))
        })
        .flat_map(|(_, values)| values.iter())
        .find(|value| !value.trim().is_empty())
        .cloned()
}

/// Body to publish for an entry and whether it is real full text.
///
/// Entries without full text get their description wrapped together with
/// [`FALLBACK_NOTICE`].
pub fn classify(entry: &RawEntry) -> (String, bool) {
    match extract_full_text(entry) {
        Some(text) => (text, true),
        None => (fallback_body(&entry.description), false),
    }
}

fn fallback_body(description: &str) -> String {
    format!(
        "<p>{}</p><p><b>{}</b></p>",
        description.trim(),
        FALLBACK_NOTICE
    )
}

/// First category, or empty.
pub fn category(entry: &RawEntry) -> String {
    entry.categories.first().cloned().unwrap_or_default()
}

/// URL of the first image enclosure, or empty.
pub fn image_enclosure(entry: &RawEntry) -> String {
    entry
        .enclosures
        .iter()
        .find(|e| e.media_type.contains("image/"))
        .map(|e| e.url.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::Enclosure;

    fn entry(guid: Option<&str>, link: Option<&str>) -> RawEntry {
        RawEntry {
            guid: guid.map(str::to_string),
            link: link.map(str::to_string),
            description: "Summary".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_fingerprint_is_128_bit_hex() {
        let fp = fingerprint(&entry(Some("abc"), None));
        assert_eq!(fp.len(), 32);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let a = entry(Some("guid-1"), Some("https://a.example/1"));
        assert_eq!(fingerprint(&a), fingerprint(&a.clone()));
    }

    #[test]
    fn test_fingerprint_ignores_case_and_whitespace() {
        let a = entry(Some("  ABC-123 "), None);
        let b = entry(Some("abc-123"), None);
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_prefers_guid() {
        let with_guid = entry(Some("G"), Some("https://a.example/1"));
        let other_link = entry(Some("G"), Some("https://a.example/2"));
        let guid_only = entry(Some("g"), None);
        assert_eq!(fingerprint(&with_guid), fingerprint(&other_link));
        assert_eq!(fingerprint(&with_guid), fingerprint(&guid_only));
    }

    #[test]
    fn test_fingerprint_falls_back_to_link() {
        let blank_guid = entry(Some("   "), Some("https://A.example/1"));
        let no_guid = entry(None, Some("https://a.example/1"));
        assert_eq!(fingerprint(&blank_guid), fingerprint(&no_guid));
        assert_ne!(
            fingerprint(&no_guid),
            fingerprint(&entry(None, Some("https://a.example/2")))
        );
    }

    #[test]
    fn test_full_text_from_content() {
        let mut e = entry(Some("g"), None);
        e.content = Some("<p>Body</p>".into());
        e.extensions
            .insert("full-text".into(), vec!["Extension".into()]);
        assert_eq!(classify(&e), ("<p>Body</p>".to_string(), true));
    }

    #[test]
    fn test_full_text_from_extension_case_variants() {
        for name in ["full-text", "Full-Text", "FULLTEXT", "full_text"] {
            let mut e = entry(Some("g"), None);
            e.content = Some("   ".into());
            e.extensions.insert(name.into(), vec!["".into(), "Ext body".into()]);
            assert_eq!(extract_full_text(&e).as_deref(), Some("Ext body"), "{name}");
        }
    }

    #[test]
    fn test_unrelated_extension_ignored() {
        let mut e = entry(Some("g"), None);
        e.extensions.insert("genre".into(), vec!["message".into()]);
        assert!(extract_full_text(&e).is_none());
    }

    #[test]
    fn test_fallback_body() {
        let mut e = entry(Some("g"), None);
        e.description = " Short text ".into();
        let (body, has_full_text) = classify(&e);
        assert!(!has_full_text);
        assert_eq!(
            body,
            format!("<p>Short text</p><p><b>{}</b></p>", FALLBACK_NOTICE)
        );
    }

    #[test]
    fn test_category_and_enclosure() {
        let mut e = entry(Some("g"), None);
        assert_eq!(category(&e), "");
        assert_eq!(image_enclosure(&e), "");

        e.categories = vec!["Sport".into(), "Football".into()];
        e.enclosures = vec![
            Enclosure {
                url: "https://a.example/clip.mp4".into(),
                media_type: "video/mp4".into(),
            },
            Enclosure {
                url: "https://a.example/pic.jpg".into(),
                media_type: "image/jpeg".into(),
            },
        ];
        assert_eq!(category(&e), "Sport");
        assert_eq!(image_enclosure(&e), "https://a.example/pic.jpg");
    }
}
