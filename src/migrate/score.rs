//! Scores candidate encodings by how plausible the decoded text looks.
//!
//! The primary signal is the number of code points in the configured target
//! script block; a readable `<title>` adds a fixed bonus. Candidates whose
//! label cannot be resolved at all are excluded rather than scored as zero,
//! since an unresolvable label is stronger evidence than a low score.

use crate::migrate::config::RecoveryConfig;
use encoding_rs::Encoding;

#[derive(Debug, Clone)]
pub struct EncodingCandidate {
    /// Caller-supplied label, preserved verbatim for reporting.
    pub label: String,
    pub score: u32,
    /// Count of code points inside the target script block.
    pub target_chars: usize,
    pub title: Option<String>,
    /// Whether the lenient decode substituted malformed sequences.
    pub lossy: bool,
}

pub fn in_target_block(ch: char, cfg: &RecoveryConfig) -> bool {
    let cp = ch as u32;
    cp >= cfg.target_block_start && cp <= cfg.target_block_end
}

pub fn count_target_chars(text: &str, cfg: &RecoveryConfig) -> usize {
    text.chars().filter(|ch| in_target_block(*ch, cfg)).count()
}

/// First `<title>…</title>` pair, tag names matched case-insensitively.
/// A plain scan, not a parser: nested or malformed markup yields `None`.
pub fn extract_title(text: &str) -> Option<&str> {
    let lower = text.to_ascii_lowercase();
    let open = lower.find("<title")?;
    let open_end = open + lower[open..].find('>')?;
    let body_start = open_end + 1;
    let close = body_start + lower[body_start..].find("</title")?;
    text.get(body_start..close)
}

/// Produce one candidate per resolvable label via lenient decoding;
/// a single malformed byte never disqualifies an otherwise-correct encoding.
pub fn score_candidates(bytes: &[u8], labels: &[String], cfg: &RecoveryConfig) -> Vec<EncodingCandidate> {
    let mut out = Vec::with_capacity(labels.len());
    for label in labels {
        let Some(encoding) = Encoding::for_label(label.trim().as_bytes()) else {
            continue;
        };
        let (decoded, _, had_errors) = encoding.decode(bytes);
        let target_chars = count_target_chars(&decoded, cfg);
        let title = extract_title(&decoded).map(|t| t.trim().to_string());
        let mut score = target_chars as u32;
        if let Some(title) = &title {
            if title.chars().any(|ch| in_target_block(ch, cfg)) {
                score += cfg.title_bonus;
            }
        }
        out.push(EncodingCandidate {
            label: label.clone(),
            score,
            target_chars,
            title,
            lossy: had_errors,
        });
    }
    out
}

/// Highest score wins; equal scores keep the candidate listed earlier,
/// since callers order labels by decreasing a-priori likelihood.
pub fn best_candidate(candidates: &[EncodingCandidate]) -> Option<&EncodingCandidate> {
    let mut best: Option<&EncodingCandidate> = None;
    for candidate in candidates {
        match best {
            Some(current) if candidate.score <= current.score => {}
            _ => best = Some(candidate),
        }
    }
    best
}

/// True when more than one candidate shares the winning score.
pub fn is_ambiguous(candidates: &[EncodingCandidate]) -> bool {
    let Some(best) = best_candidate(candidates) else {
        return false;
    };
    candidates.iter().filter(|c| c.score == best.score).count() > 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::config::RecoveryConfig;

    // "中文" in GB2312 bytes.
    const HAN_GB: [u8; 4] = [0xD6, 0xD0, 0xCE, 0xC4];

    fn gb_page(han_pairs: usize) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"<html><head><title>");
        bytes.extend_from_slice(&HAN_GB);
        bytes.extend_from_slice(b"</title></head><body>");
        for _ in 0..han_pairs {
            bytes.extend_from_slice(&HAN_GB);
        }
        bytes.extend_from_slice(b"</body></html>");
        bytes
    }

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn gb2312_outscores_utf8_on_gb_bytes_regardless_of_order() {
        let cfg = RecoveryConfig::default();
        let bytes = gb_page(25);
        let candidates = score_candidates(&bytes, &labels(&["utf-8", "gb2312"]), &cfg);
        let best = best_candidate(&candidates).expect("candidates");
        assert_eq!(best.label, "gb2312");
        assert_eq!(best.target_chars, 52);
        // title bonus applies on top of the raw count
        assert_eq!(best.score, 52 + cfg.title_bonus);
    }

    #[test]
    fn utf8_decode_of_gb_bytes_scores_zero_target_chars() {
        let cfg = RecoveryConfig::default();
        let candidates = score_candidates(&gb_page(5), &labels(&["utf-8"]), &cfg);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].target_chars, 0);
        assert!(candidates[0].lossy);
    }

    #[test]
    fn equal_scores_keep_the_earlier_candidate() {
        // gb2312 and gbk resolve to the same decoder, so scores always tie.
        let cfg = RecoveryConfig::default();
        let candidates = score_candidates(&gb_page(10), &labels(&["gb2312", "gbk"]), &cfg);
        assert!(is_ambiguous(&candidates));
        assert_eq!(best_candidate(&candidates).unwrap().label, "gb2312");
    }

    #[test]
    fn unresolvable_label_is_excluded_not_scored() {
        let cfg = RecoveryConfig::default();
        let candidates = score_candidates(b"hello", &labels(&["no-such-charset", "utf-8"]), &cfg);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].label, "utf-8");
    }

    #[test]
    fn empty_bytes_score_zero_for_every_candidate() {
        let cfg = RecoveryConfig::default();
        let candidates = score_candidates(b"", &labels(&["gb2312", "big5", "utf-8"]), &cfg);
        assert_eq!(candidates.len(), 3);
        assert!(candidates.iter().all(|c| c.score == 0));
    }

    #[test]
    fn title_extraction_is_case_insensitive() {
        assert_eq!(extract_title("<TITLE>Hello</TITLE>"), Some("Hello"));
        assert_eq!(extract_title("<p>no title here</p>"), None);
    }
}
