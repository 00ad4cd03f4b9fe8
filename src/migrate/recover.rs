//! Selects the best-scoring candidate encoding and produces the canonical
//! in-memory text for a document. Pure over its inputs: all I/O belongs to
//! the command layer.

use crate::error::MigrateError;
use crate::migrate::config::RecoveryConfig;
use crate::migrate::score::{self, EncodingCandidate};
use encoding_rs::Encoding;

#[derive(Debug, Clone)]
pub struct RecoveredDocument {
    pub text: String,
    /// Winning candidate label.
    pub encoding: String,
    pub source_id: String,
    /// The final decode substituted malformed sequences. Callers must surface
    /// this as a partial-recovery warning, never drop it.
    pub lossy: bool,
    /// More than one candidate shared the winning score; resolved by the
    /// configured candidate order.
    pub ambiguous: bool,
}

#[derive(Debug, Clone)]
pub enum RecoveryOutcome {
    Recovered(RecoveredDocument),
    /// The document needs no re-encoding: it is already valid under the
    /// canonical encoding, or no candidate reached the target-script
    /// threshold. A true result, not a failure.
    NoConversionNeeded {
        /// Bytes decode cleanly under the canonical encoding as-is.
        already_canonical: bool,
        best_label: Option<String>,
        target_chars: usize,
    },
}

fn canonical_clean_decode(bytes: &[u8], cfg: &RecoveryConfig) -> Option<usize> {
    let encoding = Encoding::for_label(cfg.canonical.as_bytes())?;
    let text = encoding.decode_without_bom_handling_and_without_replacement(bytes)?;
    Some(score::count_target_chars(&text, cfg))
}

pub fn recover_document(
    bytes: &[u8],
    source_id: &str,
    cfg: &RecoveryConfig,
) -> Result<RecoveryOutcome, MigrateError> {
    if bytes.is_empty() {
        return Ok(RecoveryOutcome::NoConversionNeeded {
            already_canonical: true,
            best_label: Some(cfg.canonical.clone()),
            target_chars: 0,
        });
    }

    // An error-free decode under the canonical encoding trumps heuristic
    // scoring: mojibake decoders can outscore the truth on valid input.
    let canonical_target_chars = canonical_clean_decode(bytes, cfg);
    if let Some(target_chars) = canonical_target_chars {
        if target_chars >= cfg.min_target_chars {
            return Ok(RecoveryOutcome::NoConversionNeeded {
                already_canonical: true,
                best_label: Some(cfg.canonical.clone()),
                target_chars,
            });
        }
    }

    let candidates = score::score_candidates(bytes, &cfg.candidates, cfg);
    let Some(best) = score::best_candidate(&candidates) else {
        return Err(MigrateError::DecodeFailure {
            source_id: source_id.to_string(),
            detail: "no candidate label resolved to a known encoding".to_string(),
        });
    };

    if best.target_chars < cfg.min_target_chars {
        return Ok(RecoveryOutcome::NoConversionNeeded {
            already_canonical: canonical_target_chars.is_some(),
            best_label: Some(best.label.clone()),
            target_chars: best.target_chars,
        });
    }

    if best.label.eq_ignore_ascii_case(&cfg.canonical) {
        return Ok(RecoveryOutcome::NoConversionNeeded {
            already_canonical: true,
            best_label: Some(best.label.clone()),
            target_chars: best.target_chars,
        });
    }

    let ambiguous = score::is_ambiguous(&candidates);
    Ok(RecoveryOutcome::Recovered(decode_winner(
        bytes, source_id, best, ambiguous,
    )))
}

fn decode_winner(
    bytes: &[u8],
    source_id: &str,
    winner: &EncodingCandidate,
    ambiguous: bool,
) -> RecoveredDocument {
    // The label resolved during scoring, so it resolves here too.
    let encoding = Encoding::for_label(winner.label.trim().as_bytes())
        .unwrap_or(encoding_rs::UTF_8);
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    RecoveredDocument {
        text: text.into_owned(),
        encoding: winner.label.clone(),
        source_id: source_id.to_string(),
        lossy: had_errors,
        ambiguous,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::config::RecoveryConfig;

    const HAN_GB: [u8; 4] = [0xD6, 0xD0, 0xCE, 0xC4];

    fn gb_body(pairs: usize) -> Vec<u8> {
        let mut bytes = Vec::from(&b"<html><body>"[..]);
        for _ in 0..pairs {
            bytes.extend_from_slice(&HAN_GB);
        }
        bytes.extend_from_slice(b"</body></html>");
        bytes
    }

    #[test]
    fn gb2312_bytes_recover_to_readable_text() {
        let cfg = RecoveryConfig::default();
        let outcome = recover_document(&gb_body(8), "zh/index.html", &cfg).unwrap();
        let RecoveryOutcome::Recovered(doc) = outcome else {
            panic!("expected recovery");
        };
        assert_eq!(doc.encoding, "gb2312");
        assert!(doc.text.contains("中文"));
        assert!(!doc.lossy);
    }

    #[test]
    fn valid_canonical_text_needs_no_conversion() {
        let cfg = RecoveryConfig::default();
        let text = format!("<html><body>{}</body></html>", "中文".repeat(8));
        let outcome = recover_document(text.as_bytes(), "doc", &cfg).unwrap();
        let RecoveryOutcome::NoConversionNeeded {
            already_canonical, ..
        } = outcome
        else {
            panic!("expected no conversion");
        };
        assert!(already_canonical);
    }

    #[test]
    fn ascii_document_stays_below_threshold() {
        let cfg = RecoveryConfig::default();
        let outcome = recover_document(b"<html><body>plain</body></html>", "doc", &cfg).unwrap();
        let RecoveryOutcome::NoConversionNeeded { target_chars, .. } = outcome else {
            panic!("expected no conversion");
        };
        assert_eq!(target_chars, 0);
    }

    #[test]
    fn empty_bytes_fall_back_to_canonical() {
        let cfg = RecoveryConfig::default();
        let outcome = recover_document(b"", "doc", &cfg).unwrap();
        let RecoveryOutcome::NoConversionNeeded { best_label, .. } = outcome else {
            panic!("expected no conversion");
        };
        assert_eq!(best_label.as_deref(), Some("utf-8"));
    }

    #[test]
    fn unresolvable_candidate_list_is_a_decode_failure() {
        let mut cfg = RecoveryConfig::default();
        cfg.candidates = vec!["no-such-charset".to_string()];
        let err = recover_document(&gb_body(8), "doc", &cfg).unwrap_err();
        assert!(matches!(err, MigrateError::DecodeFailure { .. }));
    }

    #[test]
    fn gb_and_gbk_tie_is_flagged_ambiguous() {
        let mut cfg = RecoveryConfig::default();
        cfg.candidates = vec!["gb2312".to_string(), "gbk".to_string()];
        let outcome = recover_document(&gb_body(8), "doc", &cfg).unwrap();
        let RecoveryOutcome::Recovered(doc) = outcome else {
            panic!("expected recovery");
        };
        assert_eq!(doc.encoding, "gb2312");
        assert!(doc.ambiguous);
    }
}
