//! Deterministic script cleanup floor
//!
//! The LLM cleanup pass is allowed to fail; this regex pass always runs
//! afterwards, so cleanup fails safe instead of open: whatever reaches
//! the speech synthesizer contains no bracketed annotations.

use regex::Regex;
use std::sync::OnceLock;

fn annotation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Any parenthesized, bracketed, braced, or angled run. Non-greedy,
        // no nesting: repeated application handles the rare nested case.
        Regex::new(r"\([^()]*\)|\[[^\[\]]*\]|\{[^{}]*\}|<[^<>]*>").unwrap()
    })
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Strip residual annotation blocks and collapse whitespace
pub fn strip_annotations(text: &str) -> String {
    let mut current = text.to_string();

    // Re-apply until stable to unwrap nested annotations
    loop {
        let stripped = annotation_re().replace_all(&current, " ").into_owned();
        if stripped == current {
            break;
        }
        current = stripped;
    }

    whitespace_re().replace_all(&current, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_all_bracket_kinds() {
        let input = "(bg music)Hello [cue]world{emoji}";
        assert_eq!(strip_annotations(input), "Hello world");
    }

    #[test]
    fn test_strips_angle_brackets() {
        assert_eq!(strip_annotations("Hi <pause> there"), "Hi there");
    }

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(strip_annotations("one   two\n\nthree\t four"), "one two three four");
    }

    #[test]
    fn test_nested_annotations() {
        assert_eq!(strip_annotations("a (x (y) z) b"), "a b");
    }

    #[test]
    fn test_clean_text_unchanged() {
        assert_eq!(strip_annotations("Already clean text."), "Already clean text.");
    }

    #[test]
    fn test_empty_after_stripping() {
        assert_eq!(strip_annotations("(all annotation)"), "");
    }
}
