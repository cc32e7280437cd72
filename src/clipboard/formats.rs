//! MIME type bookkeeping: interning, validation, paste preference.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

/// MIME types that carry plain text, most preferred first.
pub const TEXT_MIME_TYPES: &[&str] = &[
    "text/plain;charset=utf-8",
    "text/plain",
    "UTF8_STRING",
    "STRING",
    "TEXT",
];

/// `type/subtype` with optional `;param` tail, plus the bare X11 target
/// atoms that clients still advertise for text.
static MIME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9][\w.+-]*/[\w.+-]+(?:\s*;.*)?|[A-Z][A-Z0-9_]*)$")
        .expect("MIME pattern is valid")
});

/// Stable numeric id for an interned MIME name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FormatId(u32);

/// Bidirectional MIME name ↔ [`FormatId`] table.
///
/// Ids are assigned in first-seen order and never reused, so the same
/// name always maps to the same id for the life of the registry.
#[derive(Debug, Default)]
pub struct FormatRegistry {
    by_name: HashMap<String, FormatId>,
    names: Vec<String>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for `name`, registering it on first sight.
    pub fn intern(&mut self, name: &str) -> FormatId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = FormatId(self.names.len() as u32);
        self.names.push(name.to_owned());
        self.by_name.insert(name.to_owned(), id);
        id
    }

    /// Id for `name` if it was ever registered.
    pub fn lookup(&self, name: &str) -> Option<FormatId> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, id: FormatId) -> Option<&str> {
        self.names.get(id.0 as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
}

/// Whether `mime_type` is one of the plain-text types.
pub fn is_text(mime_type: &str) -> bool {
    TEXT_MIME_TYPES.contains(&mime_type) || mime_type.starts_with("text/plain")
}

/// Whether `mime_type` names an image representation.
pub fn is_image(mime_type: &str) -> bool {
    mime_type.starts_with("image/")
}

/// Check that a user-supplied MIME type is well formed.
pub fn is_valid_mime(mime_type: &str) -> bool {
    MIME_PATTERN.is_match(mime_type)
}

/// Pick the format to paste from `offered`.
///
/// Text types win in [`TEXT_MIME_TYPES`] order, then any other plain-text
/// charset, then the first image type, then whatever was offered first.
pub fn preferred_type<S: AsRef<str>>(offered: &[S]) -> Option<&str> {
    TEXT_MIME_TYPES
        .iter()
        .find_map(|want| {
            offered
                .iter()
                .map(|s| s.as_ref())
                .find(|have| have == want)
        })
        .or_else(|| offered.iter().map(|s| s.as_ref()).find(|s| is_text(s)))
        .or_else(|| offered.iter().map(|s| s.as_ref()).find(|s| is_image(s)))
        .or_else(|| offered.first().map(|s| s.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- Registry --

    #[test]
    fn intern_assigns_sequential_ids() {
        let mut r = FormatRegistry::new();
        let a = r.intern("text/plain");
        let b = r.intern("text/html");
        assert_ne!(a, b);
        assert_eq!(r.len(), 2);
        assert_eq!(r.name(a), Some("text/plain"));
        assert_eq!(r.name(b), Some("text/html"));
    }

    #[test]
    fn intern_is_idempotent() {
        let mut r = FormatRegistry::new();
        let a = r.intern("image/png");
        let again = r.intern("image/png");
        assert_eq!(a, again);
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn lookup_miss() {
        let mut r = FormatRegistry::new();
        r.intern("text/plain");
        assert!(r.lookup("text/html").is_none());
        assert_eq!(r.lookup("text/plain"), Some(FormatId(0)));
    }

    // -- Classification --

    #[test]
    fn text_types() {
        assert!(is_text("text/plain;charset=utf-8"));
        assert!(is_text("UTF8_STRING"));
        assert!(is_text("text/plain;charset=iso-8859-1"));
        assert!(!is_text("text/html"));
        assert!(!is_text("image/png"));
    }

    #[test]
    fn image_types() {
        assert!(is_image("image/png"));
        assert!(!is_image("text/uri-list"));
    }

    #[test]
    fn mime_validation() {
        assert!(is_valid_mime("text/plain"));
        assert!(is_valid_mime("text/plain;charset=utf-8"));
        assert!(is_valid_mime("application/vnd.oasis.opendocument.text"));
        assert!(is_valid_mime("UTF8_STRING"));
        assert!(!is_valid_mime(""));
        assert!(!is_valid_mime("plain"));
        assert!(!is_valid_mime("text/"));
        assert!(!is_valid_mime("/html"));
    }

    // -- Preference --

    #[test]
    fn prefers_utf8_text() {
        let offered = ["text/html", "text/plain", "text/plain;charset=utf-8"];
        assert_eq!(preferred_type(&offered), Some("text/plain;charset=utf-8"));
    }

    #[test]
    fn other_charsets_before_images() {
        let offered = ["image/png", "text/plain;charset=iso-8859-1"];
        assert_eq!(preferred_type(&offered), Some("text/plain;charset=iso-8859-1"));
    }

    #[test]
    fn images_before_other_types() {
        let offered = vec![
            "application/x-kde-cutselection".to_string(),
            "image/png".to_string(),
            "image/jpeg".to_string(),
        ];
        assert_eq!(preferred_type(&offered), Some("image/png"));
    }

    #[test]
    fn falls_back_to_first_offered() {
        let offered = ["application/pdf", "application/octet-stream"];
        assert_eq!(preferred_type(&offered), Some("application/pdf"));
    }

    #[test]
    fn nothing_offered() {
        let offered: [&str; 0] = [];
        assert_eq!(preferred_type(&offered), None);
    }
}
