//! Shell quoting for values embedded in commands

/// Quote `input` for safe use as a single POSIX shell word.
///
/// Plain words made of unambiguous characters are returned as-is.
#[must_use]
pub fn quote(input: &str) -> String {
    if !input.is_empty() && input.chars().all(is_plain) {
        return input.to_string();
    }
    let mut escaped = String::from("'");
    for ch in input.chars() {
        if ch == '\'' {
            escaped.push_str("'\"'\"'");
        } else {
            escaped.push(ch);
        }
    }
    escaped.push('\'');
    escaped
}

fn is_plain(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/' | ':' | '=' | '@' | '+' | ',')
}
