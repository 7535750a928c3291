//! Opening fence line parsing.
//!
//! A fence line has the shape `` ```<lang>{<label>} ``, where both the
//! language token and the brace-delimited label are optional:
//!
//! ```text
//! fence := "```" lang? ws* label? rest*
//! lang  := (char - whitespace - '{')+
//! label := '{' (char - '}')+ '}'
//! ```
//!
//! Text following the label (or following the language token when no label
//! is present) is ignored.

const FENCE: &str = "```";

/// The tokens declared on an opening fence line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FenceLine<'a> {
    /// Language token, empty when the fence declares none
    pub language: &'a str,
    /// Bracketed label, if a non-empty `{...}` group follows the language
    pub label: Option<&'a str>,
}

impl FenceLine<'_> {
    /// Whether this block is claimed by `target`.
    ///
    /// True if either the language token or the label equals `target`
    /// exactly. Comparison is case-sensitive with no normalization.
    pub fn matches_target(&self, target: &str) -> bool {
        self.language == target || self.label == Some(target)
    }
}

/// Parse an opening fence line.
///
/// Returns `None` if the line does not start with three backticks, in which
/// case the block is not a candidate at all.
pub fn parse_fence_line(line: &str) -> Option<FenceLine<'_>> {
    let rest = line.strip_prefix(FENCE)?;

    let lang_end = rest
        .find(|c: char| c.is_whitespace() || c == '{')
        .unwrap_or(rest.len());
    let language = &rest[..lang_end];

    let after_lang = rest[lang_end..].trim_start();
    let label = after_lang.strip_prefix('{').and_then(|inner| {
        let close = inner.find('}')?;
        let label = &inner[..close];
        (!label.is_empty()).then_some(label)
    });

    Some(FenceLine { language, label })
}

/// Extract the opening fence line of a block from its section text.
///
/// `line_start` is the zero-based line offset of the block within `text`.
pub fn opening_fence_line(text: &str, line_start: usize) -> Option<&str> {
    text.split('\n')
        .nth(line_start)
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fence(language: &'static str, label: Option<&'static str>) -> Option<FenceLine<'static>> {
        Some(FenceLine { language, label })
    }

    #[test]
    fn test_language_only() {
        assert_eq!(parse_fence_line("```dot"), fence("dot", None));
    }

    #[test]
    fn test_language_and_label() {
        assert_eq!(parse_fence_line("```python{dot}"), fence("python", Some("dot")));
    }

    #[test]
    fn test_whitespace_between_language_and_label() {
        assert_eq!(parse_fence_line("```dot  {graph}"), fence("dot", Some("graph")));
    }

    #[test]
    fn test_empty_language() {
        assert_eq!(parse_fence_line("```"), fence("", None));
        assert_eq!(parse_fence_line("```{dot}"), fence("", Some("dot")));
    }

    #[test]
    fn test_empty_label_is_no_label() {
        assert_eq!(parse_fence_line("```dot{}"), fence("dot", None));
    }

    #[test]
    fn test_unmatched_brace_is_no_label() {
        assert_eq!(parse_fence_line("```dot{graph"), fence("dot", None));
    }

    #[test]
    fn test_trailing_text_ignored() {
        assert_eq!(parse_fence_line("```dot title=\"x\""), fence("dot", None));
        assert_eq!(parse_fence_line("```c{dot} extra"), fence("c", Some("dot")));
    }

    #[test]
    fn test_not_a_fence() {
        assert_eq!(parse_fence_line("~~~dot"), None);
        assert_eq!(parse_fence_line("  ```dot"), None);
        assert_eq!(parse_fence_line("``dot"), None);
        assert_eq!(parse_fence_line("digraph {}"), None);
    }

    #[test]
    fn test_match_via_label() {
        let line = parse_fence_line("```python{dot}").unwrap();
        assert!(line.matches_target("dot"));
        assert!(!line.matches_target("python{dot}"));
    }

    #[test]
    fn test_match_via_label_when_language_differs() {
        let line = parse_fence_line("```dot{other}").unwrap();
        assert!(line.matches_target("other"));
        assert!(line.matches_target("dot"));
    }

    #[test]
    fn test_match_is_case_sensitive() {
        let line = parse_fence_line("```DOT").unwrap();
        assert!(!line.matches_target("dot"));
    }

    #[test]
    fn test_opening_fence_line() {
        let text = "# Title\n\n```dot\ndigraph {}\n```\n";
        assert_eq!(opening_fence_line(text, 2), Some("```dot"));
        assert_eq!(opening_fence_line(text, 42), None);
    }

    #[test]
    fn test_opening_fence_line_crlf() {
        let text = "intro\r\n```dot\r\ngraph {}\r\n```";
        assert_eq!(opening_fence_line(text, 1), Some("```dot"));
    }

    proptest! {
        #[test]
        fn prop_matches_iff_language_or_label(
            lang in "[a-zA-Z0-9_+-]{0,8}",
            label in "[a-zA-Z0-9_+-]{1,8}",
            target in "[a-zA-Z0-9_+-]{1,8}",
        ) {
            let line = format!("```{lang}{{{label}}}");
            let parsed = parse_fence_line(&line).unwrap();
            prop_assert_eq!(parsed.language, lang.as_str());
            prop_assert_eq!(parsed.label, Some(label.as_str()));
            prop_assert_eq!(parsed.matches_target(&target), lang == target || label == target);
        }

        #[test]
        fn prop_lines_without_backticks_never_parse(line in "[^`]{0,20}") {
            prop_assert!(parse_fence_line(&line).is_none());
        }
    }
}
