//! Post text helpers.
//!
//! A published post carries its sequence number as a `#<n> ` prefix. The
//! prefix is the only link between a post on the surface and its number, so
//! formatting and parsing live together here.

/// Render the surface text for `body` carrying `number`.
pub fn format_post_text(number: u64, body: &str) -> String {
    format!("#{number} {body}")
}

/// Extract the leading `#<n>` number from surface text.
pub fn parse_post_number(text: &str) -> Option<u64> {
    let token = text.split_whitespace().next()?;
    let digits = token.strip_prefix('#')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Remove a leading `#<n> ` prefix, leaving other text untouched.
///
/// Hashtags such as `#rust` are not numbers and are kept.
pub fn strip_post_number(text: &str) -> &str {
    if parse_post_number(text).is_none() {
        return text;
    }
    let trimmed = text.trim_start();
    match trimmed.find(char::is_whitespace) {
        Some(idx) => trimmed[idx..].trim_start(),
        None => "",
    }
}

/// Character-safe preview, suffixed with `...` when truncated.
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_and_parse() {
        let text = format_post_text(42, "hello world");
        assert_eq!(text, "#42 hello world");
        assert_eq!(parse_post_number(&text), Some(42));
        assert_eq!(strip_post_number(&text), "hello world");
    }

    #[test]
    fn test_hashtag_is_not_a_number() {
        assert_eq!(parse_post_number("#rust is fun"), None);
        assert_eq!(strip_post_number("#rust is fun"), "#rust is fun");
        assert_eq!(parse_post_number("# 12 spaced"), None);
        assert_eq!(parse_post_number("no prefix"), None);
    }

    #[test]
    fn test_strip_number_only() {
        assert_eq!(strip_post_number("#7"), "");
    }

    #[test]
    fn test_preview_multibyte() {
        let text = "שלום ".repeat(20);
        let short = preview(&text, 10);
        assert_eq!(short.chars().count(), 13);
        assert!(short.ends_with("..."));
        assert_eq!(preview("short", 50), "short");
    }
}
