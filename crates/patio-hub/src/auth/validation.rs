//! Account field rules.

use std::sync::LazyLock;

use regex::Regex;

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z\s]+$").expect("static regex is valid"));

static PASSWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-zA-Z_!@#$%^&*-]{9,12}$").expect("static regex is valid")
});

/// Letters and whitespace only, non-empty.
pub fn is_valid_name(name: &str) -> bool {
    NAME_RE.is_match(name)
}

/// 9 to 12 characters from letters, digits and `_!@#$%^&*-`.
pub fn is_valid_password(password: &str) -> bool {
    PASSWORD_RE.is_match(password)
}
