//! Keyword-scoring language detector
//!
//! Every language has a set of weighted patterns. Each pattern contributes
//! `weight * min(matches, MAX_HITS_PER_PATTERN)`; the best score at or above
//! `MIN_SCORE` wins. JSON is recognised by actually parsing it.

use regex::Regex;
use std::sync::LazyLock;

use super::{LanguageDetector, FALLBACK_LANGUAGE};

/// Only the head of large pastes is inspected
const SAMPLE_BYTES: usize = 64 * 1024;
const MAX_HITS_PER_PATTERN: usize = 5;
const MIN_SCORE: usize = 4;

struct LanguageRules {
    language: &'static str,
    patterns: Vec<(Regex, usize)>,
}

fn rules(language: &'static str, patterns: &[(&str, usize)]) -> LanguageRules {
    LanguageRules {
        language,
        patterns: patterns
            .iter()
            .map(|(p, w)| (Regex::new(p).unwrap(), *w))
            .collect(),
    }
}

// Order matters on ties: earlier entries win.
static RULES: LazyLock<Vec<LanguageRules>> = LazyLock::new(|| {
    vec![
        rules("rust", &[
            (r"\bfn\s+\w+\s*[<(]", 3),
            (r"\blet\s+mut\b", 4),
            (r"\bimpl\b", 2),
            (r"\bpub\s+(fn|struct|enum|mod|trait)\b", 3),
            (r"\b(println|format|vec|assert_eq)!\(", 4),
            (r"(?m)^\s*use\s+\w+(::\w+)+", 3),
            (r"::", 1),
        ]),
        rules("python", &[
            (r"(?m)^\s*def\s+\w+\(.*\)\s*(->\s*[\w\[\], ]+)?:\s*$", 4),
            (r"(?m)^\s*import\s+\w+", 1),
            (r"(?m)^\s*from\s+[\w.]+\s+import\b", 3),
            (r"\belif\b", 3),
            (r"\bself\.", 1),
            (r"\bprint\(", 1),
            (r"(?m)^#!.*python", 6),
            (r"(?m):\s*$", 1),
        ]),
        rules("typescript", &[
            (r":\s*(string|number|boolean|any|void)\b", 3),
            (r"\binterface\s+\w+\s*\{", 3),
            (r"\bexport\s+(type|interface)\b", 4),
        ]),
        rules("javascript", &[
            (r"\bconst\s+\w+\s*=", 2),
            (r"\bfunction\s*\w*\s*\(", 2),
            (r"=>", 1),
            (r"console\.log\(", 4),
            (r"\brequire\(", 3),
            (r"\bdocument\.", 3),
            (r"\bimport\s+.*\s+from\s+['\x22]", 2),
        ]),
        rules("go", &[
            (r"(?m)^package\s+\w+", 4),
            (r"\bfunc\s+(\(\w+\s+\*?\w+\)\s*)?\w+\(", 4),
            (r":=", 2),
            (r"\bfmt\.\w+", 4),
        ]),
        rules("java", &[
            (r"\bpublic\s+(final\s+)?class\b", 4),
            (r"System\.out\.print", 5),
            (r"\bpublic\s+static\s+void\s+main\b", 5),
            (r"@Override", 3),
        ]),
        rules("csharp", &[
            (r"\busing\s+System", 5),
            (r"Console\.Write", 5),
            (r"\bnamespace\s+[\w.]+", 2),
        ]),
        rules("cpp", &[
            (r"#include\s*<(iostream|vector|string|map|memory)>", 5),
            (r"\bstd::", 3),
            (r"\bcout\s*<<", 4),
            (r"\btemplate\s*<", 4),
        ]),
        rules("c", &[
            (r"#include\s*<\w+\.h>", 5),
            (r"\bprintf\(", 2),
            (r"\bint\s+main\s*\(", 3),
            (r"\bmalloc\(", 3),
        ]),
        rules("php", &[
            (r"<\?php", 8),
            (r"\$\w+\s*=", 2),
            (r"\becho\b", 1),
        ]),
        rules("ruby", &[
            (r"(?m)^\s*def\s+\w+[^:]*$", 2),
            (r"(?m)^\s*end\s*$", 2),
            (r"\bputs\b", 3),
            (r"\bdo\s*\|\w+\|", 4),
            (r"\battr_(accessor|reader)\b", 4),
        ]),
        rules("bash", &[
            (r"(?m)^#!.*\b(ba|z)?sh\b", 8),
            (r"(?m)^\s*(echo|export|fi|then|esac)\b", 2),
            (r"\$\{\w+\}", 1),
            (r"\b(sudo|apt-get|chmod|grep)\b", 2),
        ]),
        rules("sql", &[
            (r"(?is)\bselect\b.+?\bfrom\b", 4),
            (r"(?i)\binsert\s+into\b", 4),
            (r"(?i)\bcreate\s+table\b", 5),
            (r"(?i)\bupdate\s+\w+\s+set\b", 4),
            (r"(?i)\bwhere\b", 1),
        ]),
        rules("xml", &[
            (r"^\s*<\?xml", 8),
            (r"</\w+:\w+>", 2),
        ]),
        rules("html", &[
            (r"(?i)<!doctype\s+html", 8),
            (r"(?i)<(html|head|body|div|span|p|a|ul|li)\b[^>]*>", 2),
            (r"(?i)</(html|body|div|span|p|a|ul|li)>", 2),
        ]),
        rules("css", &[
            (r"@media\b", 4),
            (r"\b(color|margin|padding|display|font-size|background)\s*:", 3),
            (r"(?m)^\s*[.#]?[\w-]+(\s*[,>+~]?\s*[.#]?[\w-]+)*\s*\{\s*$", 1),
        ]),
        rules("markdown", &[
            (r"(?m)^#{1,6}\s+\S", 3),
            (r"\[[^\]]+\]\([^)]+\)", 3),
            (r"(?m)^```", 3),
            (r"(?m)^\s*[-*]\s+\S", 1),
        ]),
        rules("yaml", &[
            (r"(?m)^---\s*$", 3),
            (r"(?m)^\s*-\s+\w+:\s", 2),
            (r"(?m)^[\w-]+:\s+\S", 1),
        ]),
    ]
});

/// Heuristic detector driven by weighted regex hints
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordDetector;

impl KeywordDetector {
    fn sample(content: &str) -> &str {
        if content.len() <= SAMPLE_BYTES {
            return content;
        }
        let mut end = SAMPLE_BYTES;
        while !content.is_char_boundary(end) {
            end -= 1;
        }
        &content[..end]
    }

    fn looks_like_json(sample: &str) -> bool {
        let trimmed = sample.trim();
        (trimmed.starts_with('{') || trimmed.starts_with('['))
            && serde_json::from_str::<serde_json::Value>(trimmed).is_ok()
    }

    /// Score every known language; exposed for diagnostics and tests
    pub fn scores(&self, content: &str) -> Vec<(&'static str, usize)> {
        let sample = Self::sample(content);
        RULES
            .iter()
            .map(|lang| {
                let score = lang
                    .patterns
                    .iter()
                    .map(|(re, weight)| re.find_iter(sample).take(MAX_HITS_PER_PATTERN).count() * weight)
                    .sum();
                (lang.language, score)
            })
            .collect()
    }
}

impl LanguageDetector for KeywordDetector {
    fn detect(&self, content: &str) -> String {
        if content.trim().is_empty() {
            return FALLBACK_LANGUAGE.to_string();
        }

        let sample = Self::sample(content);
        if Self::looks_like_json(sample) {
            return "json".to_string();
        }

        let mut best: Option<(&'static str, usize)> = None;
        for (language, score) in self.scores(sample) {
            if score >= MIN_SCORE && best.map(|(_, s)| score > s).unwrap_or(true) {
                best = Some((language, score));
            }
        }

        best.map(|(language, _)| language.to_string())
            .unwrap_or_else(|| FALLBACK_LANGUAGE.to_string())
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}
