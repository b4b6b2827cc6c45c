//! Text cleanup: escape stripping for the whole chunk, math markers for prose

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// CSI sequences (colors, cursor movement) and OSC sequences (titles, hyperlinks)
static ANSI_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1B\[[0-?]*[ -/]*[@-~]|\x1B\][^\x07\x1B]*(?:\x07|\x1B\\)|\x1B[@-Z\\-_]").unwrap()
});

/// Display math between `$$` pairs
static MATH_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\$([^$]+)\$\$").unwrap());

/// Remove escape sequences already present in the source
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    ANSI_REGEX.replace_all(text, "")
}

/// Replace `$$...$$` with a readable `[Math: ...]` marker
pub fn preprocess_math(text: &str) -> Cow<'_, str> {
    MATH_REGEX.replace_all(text, |caps: &Captures<'_>| format!("[Math: {}]", caps[1].trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi_colors() {
        assert_eq!(strip_ansi("\x1b[31mred\x1b[0m plain"), "red plain");
        assert_eq!(strip_ansi("\x1b[1;38;2;1;2;3mx"), "x");
    }

    #[test]
    fn test_strip_osc_hyperlink() {
        let text = "\x1b]8;;https://a.b\x1b\\link\x1b]8;;\x1b\\";
        assert_eq!(strip_ansi(text), "link");
    }

    #[test]
    fn test_plain_text_is_borrowed() {
        assert!(matches!(strip_ansi("no escapes"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_math_blocks() {
        assert_eq!(preprocess_math("a $$ x^2 $$ b"), "a [Math: x^2] b");
        assert_eq!(preprocess_math("cost $5"), "cost $5");
    }
}
