use regex::Regex;
use std::sync::OnceLock;

fn mobile_separators() -> &'static Regex {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    SEPARATORS.get_or_init(|| Regex::new(r"[\s\-().]").expect("valid separator pattern"))
}

/// Trimmed, non-empty value or `None`.
pub fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Lower-cased, trimmed email used as the natural key when combining email lists.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Mobile number with spaces, dashes, dots and parentheses removed.
pub fn normalize_mobile(mobile: &str) -> String {
    mobile_separators().replace_all(mobile.trim(), "").into_owned()
}

/// Key for tag and city names.
pub fn normalize_label(name: &str) -> String {
    name.trim().to_lowercase()
}
