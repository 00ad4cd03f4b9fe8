use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Candidate encoding labels, ordered by decreasing a-priori likelihood.
    pub candidates: Vec<String>,
    /// The single encoding every recovered document is stored under.
    pub canonical: String,
    /// Minimum target-script code points below which no conversion is done.
    pub min_target_chars: usize,
    /// Fixed score bonus for a readable title.
    pub title_bonus: u32,
    pub target_block_start: u32,
    pub target_block_end: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            candidates: vec![
                "gb2312".to_string(),
                "gb18030".to_string(),
                "gbk".to_string(),
                "big5".to_string(),
                "utf-8".to_string(),
            ],
            canonical: "utf-8".to_string(),
            min_target_chars: 10,
            title_bonus: 100,
            // CJK Unified Ideographs.
            target_block_start: 0x4E00,
            target_block_end: 0x9FFF,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharsetConfig {
    /// Declaration tokens rewritten to the canonical encoding name.
    pub legacy_names: Vec<String>,
}

impl Default for CharsetConfig {
    fn default() -> Self {
        Self {
            legacy_names: vec![
                "gb2312".to_string(),
                "gbk".to_string(),
                "gb18030".to_string(),
                "big5".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RecodeConfig {
    pub recovery: RecoveryConfig,
    pub charset: CharsetConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialRecodeConfig {
    recovery: Option<RecoveryConfig>,
    charset: Option<CharsetConfig>,
}

fn env_or_usize(var: &str, fallback: usize) -> usize {
    match env::var(var) {
        Ok(v) => v.trim().parse::<usize>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn env_or_csv(var: &str, fallback: &[String]) -> Vec<String> {
    match env::var(var) {
        Ok(v) => {
            let out = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
                .collect::<Vec<_>>();
            if out.is_empty() {
                fallback.to_vec()
            } else {
                out
            }
        }
        Err(_) => fallback.to_vec(),
    }
}

fn validate(cfg: &RecodeConfig) -> Result<()> {
    if cfg.recovery.candidates.is_empty() {
        return Err(anyhow!("invalid recovery config: candidate list is empty"));
    }
    if cfg.recovery.canonical.trim().is_empty() {
        return Err(anyhow!("invalid recovery config: canonical encoding is empty"));
    }
    if cfg.recovery.target_block_start > cfg.recovery.target_block_end {
        return Err(anyhow!(
            "invalid recovery config: target block start exceeds end"
        ));
    }
    Ok(())
}

fn resolve_config_path(explicit: Option<&Path>, work_root: &Path) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(custom) = env::var("RECODE_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    Some(work_root.join("site-recode.toml"))
}

fn merge_file_config(base: &mut RecodeConfig, explicit: Option<&Path>, work_root: &Path) -> Result<()> {
    let Some(path) = resolve_config_path(explicit, work_root) else {
        return Ok(());
    };
    if !path.exists() {
        if explicit.is_some() {
            return Err(anyhow!("config file not found: {}", path.display()));
        }
        return Ok(());
    }

    let raw = fs::read_to_string(&path)?;
    let parsed: PartialRecodeConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse config {}: {err}", path.display()))?;
    if let Some(recovery) = parsed.recovery {
        base.recovery = recovery;
    }
    if let Some(charset) = parsed.charset {
        base.charset = charset;
    }
    Ok(())
}

pub fn load_config(explicit: Option<&Path>, work_root: &Path) -> Result<RecodeConfig> {
    let mut cfg = RecodeConfig::default();
    merge_file_config(&mut cfg, explicit, work_root)?;

    cfg.recovery.candidates = env_or_csv("RECODE_CANDIDATES", &cfg.recovery.candidates);
    cfg.recovery.canonical = env_or_string("RECODE_CANONICAL", &cfg.recovery.canonical);
    cfg.recovery.min_target_chars =
        env_or_usize("RECODE_MIN_TARGET_CHARS", cfg.recovery.min_target_chars);
    cfg.charset.legacy_names = env_or_csv("RECODE_LEGACY_NAMES", &cfg.charset.legacy_names);

    validate(&cfg)?;
    Ok(cfg)
}
