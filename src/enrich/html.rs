//! HTML stripping for user-visible broadcast text.

use regex::Regex;
use std::sync::OnceLock;

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^<]+?>").expect("static regex is valid"))
}

/// Remove any `<tag>` or `<tag attr="x">` span, preserving surrounding
/// whitespace. Plain text with no markup is returned unchanged.
pub fn strip_html(input: &str) -> String {
    tag_pattern().replace_all(input, " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_simple_tags() {
        assert_eq!(strip_html("<b>bold</b> text"), "  bold   text");
    }

    #[test]
    fn strips_tags_with_attributes() {
        assert_eq!(
            strip_html(r#"<a href="x">link</a>"#),
            "  link  "
        );
    }

    #[test]
    fn leaves_plain_text_unchanged() {
        assert_eq!(strip_html("no markup here"), "no markup here");
    }

    #[test]
    fn leaves_unclosed_angle_bracket_with_no_close_alone() {
        // `<[^<]+?>` requires a closing `>`. A stray `<` with no matching
        // `>` is left alone, matching the Python original's `re.sub`.
        assert_eq!(strip_html("5 < 10"), "5 < 10");
    }
}
