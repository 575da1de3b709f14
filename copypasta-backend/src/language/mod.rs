//! Best-effort content language detection for display highlighting.
//!
//! The detected tag only drives syntax highlighting in the UI; nothing in
//! storage depends on it. Detectors are swappable behind `LanguageDetector`.

mod keyword;

use std::sync::Arc;

pub use keyword::KeywordDetector;

/// Tag used when nothing better is found
pub const FALLBACK_LANGUAGE: &str = "text";

/// Tag stored for non-text file uploads
pub const BINARY_LANGUAGE: &str = "binary";

pub trait LanguageDetector: Send + Sync {
    /// Return a language tag for `content`, or `FALLBACK_LANGUAGE`
    fn detect(&self, content: &str) -> String;

    fn name(&self) -> &'static str;
}

pub fn default_detector() -> Arc<dyn LanguageDetector> {
    Arc::new(KeywordDetector)
}
