//! Strip contact details and identifiers from log text before it leaves the
//! process in a prompt.

use once_cell::sync::OnceCell;
use regex::Regex;

static RE_URL: OnceCell<Regex> = OnceCell::new();
static RE_EMAIL: OnceCell<Regex> = OnceCell::new();
static RE_PHONE: OnceCell<Regex> = OnceCell::new();
static RE_DIGITS: OnceCell<Regex> = OnceCell::new();
static RE_WS: OnceCell<Regex> = OnceCell::new();

/// Replace URLs, e-mail addresses, phone numbers and long digit runs with
/// placeholders, then collapse whitespace.
pub fn sanitize_log_text(s: &str) -> String {
    // URLs first so their digits and @ signs are gone before the other passes.
    let re_url = RE_URL.get_or_init(|| Regex::new(r"(?i)\b(?:https?://|www\.)\S+").unwrap());
    let re_email = RE_EMAIL
        .get_or_init(|| Regex::new(r"(?i)\b[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,}\b").unwrap());
    let re_phone = RE_PHONE
        .get_or_init(|| Regex::new(r"\+?\d{2,4}[\s.\-]\d{3,4}[\s.\-]\d{4}\b|\+\d{9,14}\b").unwrap());
    let re_digits = RE_DIGITS.get_or_init(|| Regex::new(r"\d{6,}").unwrap());
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());

    let out = re_url.replace_all(s, "[link]");
    let out = re_email.replace_all(&out, "[email]");
    let out = re_phone.replace_all(&out, "[phone]");
    let out = re_digits.replace_all(&out, "[number]");
    re_ws.replace_all(&out, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_contact_details() {
        let s = sanitize_log_text(
            "Mail me at jane.doe@example.com or call 010-1234-5678, see https://x.io/a?b=1",
        );
        assert!(!s.contains("example.com"));
        assert!(!s.contains("1234"));
        assert!(!s.contains("x.io"));
        assert!(s.contains("[email]"));
        assert!(s.contains("[phone]"));
        assert!(s.contains("[link]"));
    }

    #[test]
    fn long_digit_runs_are_masked_but_small_numbers_stay() {
        let s = sanitize_log_text("Ran 5 km, order 98765432 arrived");
        assert_eq!(s, "Ran 5 km, order [number] arrived");
    }

    #[test]
    fn plain_text_is_untouched_apart_from_whitespace() {
        assert_eq!(sanitize_log_text("  커피를   마셨다 \n"), "커피를 마셨다");
    }
}
