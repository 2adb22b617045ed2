//! Cleaning transform applied to every raw output line before queueing.

use once_cell::sync::Lazy;
use regex::Regex;

/// ANSI escape sequences of the CSI colour/style family: ESC followed by
/// anything up to and including the first `m`.
static ANSI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new("\x1b[^m]*m").expect("ANSI escape pattern is valid")
});

/// Clean one raw output line for display in a markdown context.
///
/// Decodes as UTF-8 (invalid sequences become U+FFFD rather than failing
/// the line), removes carriage returns and trailing newlines, strips ANSI
/// escapes, and inserts a zero-width space between double backticks so the
/// output cannot close a surrounding code fence.
pub fn clean_line(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw).replace('\r', "");
    let text = text.trim_end_matches('\n');
    let text = ANSI_RE.replace_all(text, "");
    let text = text.replace("``", "`\u{200b}`");
    text.trim_end_matches('\n').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_line_is_identity_modulo_newline() {
        assert_eq!(clean_line(b"hello\n"), "hello");
        assert_eq!(clean_line(b"hello"), "hello");
        assert_eq!(clean_line(b""), "");
    }

    #[test]
    fn carriage_returns_are_removed() {
        assert_eq!(clean_line(b"hello\r\n"), "hello");
        assert_eq!(clean_line(b"a\rb\r\n"), "ab");
    }

    #[test]
    fn ansi_sequences_are_stripped_exactly() {
        assert_eq!(clean_line(b"\x1b[31mred\x1b[0m\n"), "red");
        assert_eq!(clean_line(b"a\x1b[1mb\n"), "ab");
        // Two separate sequences must not be merged into one greedy match.
        assert_eq!(clean_line(b"\x1b[31mred\x1b[0m middle\n"), "red middle");
    }

    #[test]
    fn double_backticks_get_a_zero_width_space() {
        let cleaned = clean_line(b"``code``\n");
        assert_eq!(cleaned, "`\u{200b}`code`\u{200b}`");
        assert!(!cleaned.contains("``"));
    }

    #[test]
    fn single_backticks_are_untouched() {
        assert_eq!(clean_line(b"`inline`\n"), "`inline`");
    }

    #[test]
    fn invalid_utf8_becomes_replacement_char() {
        assert_eq!(clean_line(b"a\xffb\n"), "a\u{fffd}b");
    }
}
