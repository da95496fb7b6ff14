//! Pattern-matched line replacement in text files

use regex::Regex;

/// Outcome of a line edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineEdit {
    pub contents: String,
    pub changed: bool,
}

/// Ensure `line` is present in `contents`.
///
/// The last line matching `regexp` is replaced by `line`. With no match,
/// `contents` is left alone if it already has `line` verbatim, and `line`
/// is appended otherwise. Line terminators of untouched lines are kept.
#[must_use]
pub fn apply(contents: &str, regexp: &Regex, line: &str) -> LineEdit {
    let lines: Vec<&str> = contents.split_inclusive('\n').collect();
    let body = |l: &str| l.trim_end_matches('\n').trim_end_matches('\r').to_string();

    if let Some(idx) = lines.iter().rposition(|l| regexp.is_match(&body(l))) {
        if body(lines[idx]) == line {
            return unchanged(contents);
        }
        let terminator = &lines[idx][body(lines[idx]).len()..];
        let replacement = format!("{line}{terminator}");

        let mut out = String::with_capacity(contents.len() + line.len());
        for (i, l) in lines.iter().enumerate() {
            if i == idx {
                out.push_str(&replacement);
            } else {
                out.push_str(l);
            }
        }
        return LineEdit {
            contents: out,
            changed: true,
        };
    }

    if lines.iter().any(|l| body(l) == line) {
        return unchanged(contents);
    }

    let mut out = contents.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(line);
    out.push('\n');
    LineEdit {
        contents: out,
        changed: true,
    }
}

fn unchanged(contents: &str) -> LineEdit {
    LineEdit {
        contents: contents.to_string(),
        changed: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn re(pattern: &str) -> Regex {
        Regex::new(pattern).unwrap()
    }

    #[test]
    fn test_uncomments_matching_line() {
        let edit = apply(
            "[http]\n# redirectToHttps = false\nport = 80\n",
            &re(r"^#?\s*redirectToHttps\s*="),
            "redirectToHttps = true",
        );

        assert!(edit.changed);
        assert_eq!(edit.contents, "[http]\nredirectToHttps = true\nport = 80\n");
    }

    #[test]
    fn test_replaces_last_match_only() {
        let edit = apply("key = 'a'\nkey = 'b'\n", &re(r"^key\s*="), "key = 'c'");
        assert_eq!(edit.contents, "key = 'a'\nkey = 'c'\n");
    }

    #[test]
    fn test_already_set_is_unchanged() {
        let input = "port = 443\n";
        let edit = apply(input, &re(r"^#?\s*port\s*="), "port = 443");
        assert!(!edit.changed);
        assert_eq!(edit.contents, input);
    }

    #[test]
    fn test_no_match_but_line_present() {
        let input = "port = 443\n";
        let edit = apply(input, &re(r"^port = 80$"), "port = 443");
        assert!(!edit.changed);
    }

    #[test]
    fn test_appends_when_absent() {
        let edit = apply("a = 1", &re(r"^b\s*="), "b = 2");
        assert!(edit.changed);
        assert_eq!(edit.contents, "a = 1\nb = 2\n");

        let edit = apply("", &re(r"^b\s*="), "b = 2");
        assert_eq!(edit.contents, "b = 2\n");
    }

    #[test]
    fn test_keeps_crlf_terminator() {
        let edit = apply("#cert = 'x'\r\nother\r\n", &re(r"^#?cert"), "cert = '/c.pem'");
        assert_eq!(edit.contents, "cert = '/c.pem'\r\nother\r\n");
    }

    #[test]
    fn test_second_application_is_identity() {
        let pattern = re(r"^#?\s*publicUrl\s*=");
        let line = "publicUrl = 'https://xo.lan'";
        let first = apply("# publicUrl = 'https://xoa.company.lan'\n", &pattern, line);
        let second = apply(&first.contents, &pattern, line);

        assert!(first.changed);
        assert!(!second.changed);
        assert_eq!(first.contents, second.contents);
    }
}
