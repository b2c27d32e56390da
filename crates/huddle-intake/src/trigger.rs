//! Trigger-word gating for non-`main` groups (spec.md §4.3 step 2).

use regex::Regex;

/// Builds the `^<trigger>\b` matcher for a group's configured trigger word.
/// Case-insensitive, word-bounded so `@Alfredo` does not match trigger
/// `@Alfred`.
pub fn trigger_regex(trigger: &str) -> Regex {
    let pattern = format!(r"(?i)^{}\b", regex::escape(trigger));
    // The escaped trigger is always a valid pattern fragment; this only
    // panics if `trigger` were empty in a way regex::escape couldn't handle,
    // which it handles fine (escapes to the empty string, anchors match).
    Regex::new(&pattern).expect("trigger pattern is always valid")
}

/// `true` if `content` is addressed to `trigger` at the start of the
/// message. `main` groups bypass this gate entirely (spec.md §4.3 step 2)
/// and should never call this function.
pub fn matches_trigger(trigger: &str, content: &str) -> bool {
    trigger_regex(trigger).is_match(content.trim_start())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_case_insensitively_at_start() {
        assert!(matches_trigger("@Alfred", "@alfred can you help?"));
        assert!(matches_trigger("@Alfred", "@ALFRED!"));
    }

    #[test]
    fn requires_word_boundary() {
        assert!(!matches_trigger("@Alfred", "@Alfredo, are you there?"));
    }

    #[test]
    fn requires_anchor_at_start() {
        assert!(!matches_trigger("@Alfred", "hey @Alfred are you there?"));
    }

    #[test]
    fn leading_whitespace_is_tolerated() {
        assert!(matches_trigger("@Alfred", "   @Alfred hello"));
    }

    #[test]
    fn non_matching_content_is_ignored() {
        assert!(!matches_trigger("@Alfred", "just chatting"));
    }
}
