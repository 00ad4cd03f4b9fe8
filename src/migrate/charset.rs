//! Rewrites in-document `charset=` declarations so stored text always
//! declares the encoding it is actually written in. Token-level: only the
//! encoding name changes, surrounding markup and quote style stay verbatim.

use crate::migrate::config::CharsetConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeAction {
    /// Canonical declaration already present, nothing to do.
    Unchanged,
    /// One or more legacy tokens replaced.
    Rewritten,
    /// No declaration existed; one was inserted after the head opening tag.
    Inserted,
}

#[derive(Debug, Clone)]
pub struct NormalizeOutcome {
    pub text: String,
    pub action: NormalizeAction,
}

fn is_token_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.'
}

/// Byte span of the encoding-name token for the `charset` occurrence starting
/// at `pos` (position of the `c`), or `None` when it is not a declaration.
fn token_span(lower: &str, pos: usize) -> Option<(usize, usize)> {
    let mut i = pos + "charset".len();
    let bytes = lower.as_bytes();
    while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
        i += 1;
    }
    if i >= bytes.len() || bytes[i] != b'=' {
        return None;
    }
    i += 1;
    while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
        i += 1;
    }
    if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
        i += 1;
    }
    let start = i;
    while i < bytes.len() && is_token_char(bytes[i] as char) {
        i += 1;
    }
    if i == start {
        return None;
    }
    Some((start, i))
}

/// Ensure `text` declares `canonical`. Idempotent: already-normalized text
/// comes back `Unchanged` and byte-identical.
pub fn normalize_declaration(
    text: &str,
    canonical: &str,
    cfg: &CharsetConfig,
) -> NormalizeOutcome {
    // ASCII lowering preserves byte offsets.
    let lower = text.to_ascii_lowercase();

    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut saw_declaration = false;
    let mut from = 0;
    while let Some(found) = lower[from..].find("charset") {
        let pos = from + found;
        if let Some((start, end)) = token_span(&lower, pos) {
            saw_declaration = true;
            let token = &lower[start..end];
            if cfg.legacy_names.iter().any(|n| n.eq_ignore_ascii_case(token)) {
                spans.push((start, end));
            }
        }
        from = pos + "charset".len();
    }

    if !spans.is_empty() {
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        for (start, end) in spans {
            out.push_str(&text[cursor..start]);
            out.push_str(canonical);
            cursor = end;
        }
        out.push_str(&text[cursor..]);
        return NormalizeOutcome {
            text: out,
            action: NormalizeAction::Rewritten,
        };
    }

    if saw_declaration {
        // Declarations exist and none are legacy; trust them.
        return NormalizeOutcome {
            text: text.to_string(),
            action: NormalizeAction::Unchanged,
        };
    }

    // No declaration anywhere: insert one right after the opening head tag so
    // it takes effect before any content is interpreted downstream.
    if let Some(insert_at) = head_open_end(&lower) {
        let mut out = String::with_capacity(text.len() + 32);
        out.push_str(&text[..insert_at]);
        out.push_str("\n\t");
        out.push_str(&format!("<meta charset=\"{canonical}\">"));
        out.push_str(&text[insert_at..]);
        return NormalizeOutcome {
            text: out,
            action: NormalizeAction::Inserted,
        };
    }

    NormalizeOutcome {
        text: text.to_string(),
        action: NormalizeAction::Unchanged,
    }
}

/// Byte offset just past the `>` of the opening `<head …>` tag.
fn head_open_end(lower: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(found) = lower[from..].find("<head") {
        let pos = from + found;
        let after = lower.as_bytes().get(pos + 5).copied();
        match after {
            Some(b'>') => return Some(pos + 6),
            Some(b) if b.is_ascii_whitespace() => {
                let close = pos + lower[pos..].find('>')?;
                return Some(close + 1);
            }
            _ => from = pos + 5,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::config::CharsetConfig;

    fn run(text: &str) -> NormalizeOutcome {
        normalize_declaration(text, "utf-8", &CharsetConfig::default())
    }

    #[test]
    fn bare_legacy_token_is_replaced_in_place() {
        let out = run("<meta http-equiv=Content-Type content=\"text/html; charset=gb2312\">");
        assert_eq!(out.action, NormalizeAction::Rewritten);
        assert_eq!(
            out.text,
            "<meta http-equiv=Content-Type content=\"text/html; charset=utf-8\">"
        );
    }

    #[test]
    fn quoted_token_keeps_quote_style() {
        let out = run("<meta charset='GB18030'>");
        assert_eq!(out.action, NormalizeAction::Rewritten);
        assert_eq!(out.text, "<meta charset='utf-8'>");
    }

    #[test]
    fn missing_declaration_is_inserted_after_head() {
        let out = run("<html><head lang=\"zh\"><title>t</title></head></html>");
        assert_eq!(out.action, NormalizeAction::Inserted);
        assert!(
            out.text
                .starts_with("<html><head lang=\"zh\">\n\t<meta charset=\"utf-8\">")
        );
    }

    #[test]
    fn normalizing_twice_is_a_no_op() {
        let once = run("<html><head><meta charset=gbk></head></html>");
        assert_eq!(once.action, NormalizeAction::Rewritten);
        let twice = run(&once.text);
        assert_eq!(twice.action, NormalizeAction::Unchanged);
        assert_eq!(twice.text, once.text);
    }

    #[test]
    fn headless_fragment_is_left_alone() {
        let out = run("<p>fragment without a head</p>");
        assert_eq!(out.action, NormalizeAction::Unchanged);
        assert_eq!(out.text, "<p>fragment without a head</p>");
    }

    #[test]
    fn unrelated_declarations_are_preserved() {
        let src = "<meta charset=\"iso-8859-1\"><meta name=\"x\" content=\"y\">";
        let out = run(src);
        assert_eq!(out.action, NormalizeAction::Unchanged);
        assert_eq!(out.text, src);
    }
}
