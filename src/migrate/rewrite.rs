//! Rewrites references to relocated assets inside document text.
//!
//! A reference is only recognized in two contexts: the quoted value of a
//! `src`/`href` attribute, or a bare occurrence bounded by non-identifier
//! characters. Matching runs in a single pass over the original text with
//! moves tried longest-old-identifier-first at every position, so a shorter
//! identifier can never fire inside a longer one and replaced output is
//! never rescanned.

use crate::migrate::relocate::{AssetMove, MoveKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefContext {
    /// Inside the value of a `src=` or `href=` attribute.
    AttrValue,
    /// Bounded occurrence in ordinary text.
    BareText,
}

#[derive(Debug, Clone, Copy)]
pub struct ReferenceSite {
    pub offset: usize,
    pub len: usize,
    pub context: RefContext,
    /// Index into the caller's move slice.
    pub move_idx: usize,
}

#[derive(Debug, Clone)]
pub struct RewriteOutcome {
    pub text: String,
    pub rewritten: usize,
    pub changed: bool,
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '.' || ch == '_' || ch == '-'
}

/// Spans of `src=`/`href=` attribute values, quoted or bare.
fn attr_value_spans(text: &str) -> Vec<(usize, usize)> {
    let lower = text.to_ascii_lowercase();
    let bytes = lower.as_bytes();
    let mut spans = Vec::new();
    for key in ["src", "href"] {
        let mut from = 0;
        while let Some(found) = lower[from..].find(key) {
            let pos = from + found;
            from = pos + key.len();
            if pos > 0 && is_ident_char(bytes[pos - 1] as char) {
                continue;
            }
            let mut i = pos + key.len();
            while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
                i += 1;
            }
            if i >= bytes.len() || bytes[i] != b'=' {
                continue;
            }
            i += 1;
            while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
                i += 1;
            }
            let (start, end) = if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
                let quote = bytes[i];
                let start = i + 1;
                match lower[start..].find(quote as char) {
                    Some(off) => (start, start + off),
                    None => continue,
                }
            } else {
                let start = i;
                let mut end = start;
                while end < bytes.len()
                    && !(bytes[end] as char).is_ascii_whitespace()
                    && bytes[end] != b'>'
                {
                    end += 1;
                }
                (start, end)
            };
            if end > start {
                spans.push((start, end));
            }
        }
    }
    spans.sort_unstable();
    spans
}

fn in_spans(spans: &[(usize, usize)], offset: usize) -> bool {
    spans
        .iter()
        .any(|&(start, end)| offset >= start && offset < end)
}

fn prev_char(text: &str, offset: usize) -> Option<char> {
    text[..offset].chars().next_back()
}

fn next_char(text: &str, offset: usize) -> Option<char> {
    text[offset..].chars().next()
}

/// A match that directly follows the prefix the move already added is a
/// reference migrated by an earlier run; touching it again would stack
/// prefixes.
fn already_migrated(text: &str, offset: usize, mv: &AssetMove) -> bool {
    let Some(added) = mv.new.strip_suffix(mv.old.as_str()) else {
        return false;
    };
    !added.is_empty() && text[..offset].ends_with(added)
}

fn match_at(text: &str, offset: usize, mv: &AssetMove) -> bool {
    if mv.old.is_empty() || mv.old == mv.new || !text[offset..].starts_with(mv.old.as_str()) {
        return false;
    }
    if let Some(prev) = prev_char(text, offset) {
        if is_ident_char(prev) {
            return false;
        }
    }
    if mv.kind == MoveKind::File {
        if let Some(next) = next_char(text, offset + mv.old.len()) {
            if is_ident_char(next) {
                return false;
            }
        }
    }
    !already_migrated(text, offset, mv)
}

/// All recognized sites, in document order. Moves are tried
/// longest-old-first at each position and a match consumes its span.
pub fn find_reference_sites(text: &str, moves: &[AssetMove]) -> Vec<ReferenceSite> {
    let mut order: Vec<usize> = (0..moves.len()).collect();
    order.sort_by(|&a, &b| moves[b].old.len().cmp(&moves[a].old.len()));

    let spans = attr_value_spans(text);
    let mut sites = Vec::new();
    let mut offset = 0;
    while offset < text.len() {
        let mut advanced = false;
        for &idx in &order {
            let mv = &moves[idx];
            if match_at(text, offset, mv) {
                let context = if in_spans(&spans, offset) {
                    RefContext::AttrValue
                } else {
                    RefContext::BareText
                };
                sites.push(ReferenceSite {
                    offset,
                    len: mv.old.len(),
                    context,
                    move_idx: idx,
                });
                offset += mv.old.len();
                advanced = true;
                break;
            }
        }
        if !advanced {
            offset += text[offset..].chars().next().map_or(1, char::len_utf8);
        }
    }
    sites
}

/// Replace every recognized site exactly once. Unchanged text is returned
/// as-is so callers can skip the write-back.
pub fn rewrite_references(text: &str, moves: &[AssetMove]) -> RewriteOutcome {
    let sites = find_reference_sites(text, moves);
    if sites.is_empty() {
        return RewriteOutcome {
            text: text.to_string(),
            rewritten: 0,
            changed: false,
        };
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for site in &sites {
        out.push_str(&text[cursor..site.offset]);
        out.push_str(&moves[site.move_idx].new);
        cursor = site.offset + site.len;
    }
    out.push_str(&text[cursor..]);
    let changed = out != text;
    RewriteOutcome {
        rewritten: sites.len(),
        text: out,
        changed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::relocate::{AssetMove, MoveKind};

    fn file_move(old: &str, new: &str) -> AssetMove {
        AssetMove {
            old: old.to_string(),
            new: new.to_string(),
            kind: MoveKind::File,
        }
    }

    fn prefix_move(old: &str, new: &str) -> AssetMove {
        AssetMove {
            old: old.to_string(),
            new: new.to_string(),
            kind: MoveKind::DirPrefix,
        }
    }

    #[test]
    fn attribute_reference_is_rewritten() {
        let moves = [file_move("old_assets/photo.jpg", "images/photo.jpg")];
        let out = rewrite_references("<img src=\"old_assets/photo.jpg\">", &moves);
        assert!(out.changed);
        assert_eq!(out.text, "<img src=\"images/photo.jpg\">");
        assert_eq!(out.rewritten, 1);
    }

    #[test]
    fn filename_only_mention_of_a_pathed_move_is_untouched() {
        let moves = [file_move("old_assets/photo.jpg", "images/photo.jpg")];
        let out = rewrite_references("see photo.jpg for details", &moves);
        assert!(!out.changed);
        assert_eq!(out.rewritten, 0);
    }

    #[test]
    fn directory_prefix_rewrites_every_child_path() {
        let moves = [prefix_move("ENT1-P1_files/", "src/page-assets/ent1-p1-files/")];
        let text = "<img src=\"ENT1-P1_files/a.jpg\"> <a href='ENT1-P1_files/b.png'>x</a>";
        let out = rewrite_references(text, &moves);
        assert_eq!(
            out.text,
            "<img src=\"src/page-assets/ent1-p1-files/a.jpg\"> <a href='src/page-assets/ent1-p1-files/b.png'>x</a>"
        );
        assert_eq!(out.rewritten, 2);
    }

    #[test]
    fn longest_identifier_wins_and_boundaries_block_substrings() {
        let moves = [
            file_move("cover.jpg", "c.jpg"),
            file_move("b1-cover.jpg", "z.jpg"),
        ];
        let out = rewrite_references("<img src=\"b1-cover.jpg\"> plus cover.jpg", &moves);
        assert_eq!(out.text, "<img src=\"z.jpg\"> plus c.jpg");
    }

    #[test]
    fn already_migrated_reference_is_not_rewritten_again() {
        let moves = [file_move("a.jpg", "img/a.jpg")];
        let first = rewrite_references("<img src=\"a.jpg\">", &moves);
        assert_eq!(first.text, "<img src=\"img/a.jpg\">");
        let second = rewrite_references(&first.text, &moves);
        assert!(!second.changed);
        assert_eq!(second.text, first.text);
    }

    #[test]
    fn non_ascii_identifiers_match_with_boundaries() {
        let moves = [file_move("日文E.jpg", "japaneseE.jpg")];
        let out = rewrite_references("<img src=\"日文E.jpg\"> 日文E.jpg", &moves);
        assert_eq!(out.text, "<img src=\"japaneseE.jpg\"> japaneseE.jpg");
        assert_eq!(out.rewritten, 2);
    }

    #[test]
    fn sites_carry_their_syntactic_context() {
        let moves = [file_move("a.jpg", "b.jpg")];
        let sites = find_reference_sites("<img src=\"a.jpg\"> and a.jpg", &moves);
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].context, RefContext::AttrValue);
        assert_eq!(sites[1].context, RefContext::BareText);
    }

    #[test]
    fn no_stale_reference_remains_after_rewrite() {
        let moves = [
            file_move("B1.jpg", "b1.jpg"),
            file_move("B1_cover.jpg", "b1-cover.jpg"),
        ];
        let out = rewrite_references("B1_cover.jpg then B1.jpg", &moves);
        for mv in &moves {
            assert!(!out.text.contains(&mv.old));
        }
        assert_eq!(out.text, "b1-cover.jpg then b1.jpg");
    }
}
