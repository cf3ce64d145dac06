use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TARGET_URL: &str =
    "https://www.mlit.go.jp/seisakutokatsu/freight/seisakutokatsu_freight_mn1_000029.html";

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    // TOMLでは値をテーブルより先に出力する必要がある
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
    pub monitor: MonitorConfig,
    pub storage: StorageConfig,
    pub analysis: AnalysisConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StorageConfig {
    pub snapshot_dir: PathBuf,
    pub report_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisConfig {
    pub model: String,
    pub max_tokens: u32,
    pub excerpt_chars: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotifyConfig {
    pub enabled: bool,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            config_path: None,
            monitor: MonitorConfig {
                url: DEFAULT_TARGET_URL.to_string(),
            },
            storage: StorageConfig {
                snapshot_dir: PathBuf::from("snapshots"),
                report_dir: PathBuf::from("reports"),
            },
            analysis: AnalysisConfig {
                model: "claude-sonnet-4-5-20250929".to_string(),
                max_tokens: 4096,
                excerpt_chars: 2000,
            },
            notify: NotifyConfig { enabled: true },
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    monitor: Option<RawMonitorConfig>,
    storage: Option<RawStorageConfig>,
    analysis: Option<RawAnalysisConfig>,
    notify: Option<RawNotifyConfig>,
}

#[derive(Debug, Deserialize)]
struct RawMonitorConfig {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawStorageConfig {
    snapshot_dir: Option<PathBuf>,
    report_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RawAnalysisConfig {
    model: Option<String>,
    max_tokens: Option<u32>,
    excerpt_chars: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawNotifyConfig {
    enabled: Option<bool>,
}

pub fn effective_home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .filter(|p| !p.as_os_str().is_empty())
        .context("HOME環境変数が設定されていません")
}

pub fn default_config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/mlitwatch/config.toml")
}

pub fn load(config_path: Option<&Path>, home_dir: &Path) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::default();

    let path = config_path
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| default_config_path(home_dir));

    if path.exists() {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("設定ファイルの読み取りに失敗しました: {}", path.display()))?;
        let raw: RawConfig =
            toml::from_str(&s).context("設定ファイル(TOML)の解析に失敗しました")?;
        apply_raw_config(&mut cfg, raw);
        cfg.config_path = Some(path.display().to_string());
    }

    apply_env_overrides(&mut cfg)?;

    Ok(cfg)
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig) {
    if let Some(monitor) = raw.monitor {
        if let Some(url) = monitor.url {
            cfg.monitor.url = url;
        }
    }

    if let Some(storage) = raw.storage {
        if let Some(snapshot_dir) = storage.snapshot_dir {
            cfg.storage.snapshot_dir = snapshot_dir;
        }
        if let Some(report_dir) = storage.report_dir {
            cfg.storage.report_dir = report_dir;
        }
    }

    if let Some(analysis) = raw.analysis {
        if let Some(model) = analysis.model {
            cfg.analysis.model = model;
        }
        if let Some(max_tokens) = analysis.max_tokens {
            cfg.analysis.max_tokens = max_tokens;
        }
        if let Some(excerpt_chars) = analysis.excerpt_chars {
            cfg.analysis.excerpt_chars = excerpt_chars;
        }
    }

    if let Some(notify) = raw.notify {
        if let Some(enabled) = notify.enabled {
            cfg.notify.enabled = enabled;
        }
    }
}

fn apply_env_overrides(cfg: &mut EffectiveConfig) -> Result<()> {
    if let Ok(v) = std::env::var("MLITWATCH_TARGET_URL") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.monitor.url = v.to_string();
        }
    }
    if let Ok(v) = std::env::var("MLITWATCH_SNAPSHOT_DIR") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.storage.snapshot_dir = PathBuf::from(v);
        }
    }
    if let Ok(v) = std::env::var("MLITWATCH_REPORT_DIR") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.storage.report_dir = PathBuf::from(v);
        }
    }
    if let Ok(v) = std::env::var("MLITWATCH_ANALYSIS_MODEL") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.analysis.model = v.to_string();
        }
    }
    if let Ok(v) = std::env::var("MLITWATCH_ANALYSIS_MAX_TOKENS") {
        cfg.analysis.max_tokens = v
            .trim()
            .parse::<u32>()
            .with_context(|| format!("MLITWATCH_ANALYSIS_MAX_TOKENSの値が不正です: {v}"))?;
    }
    if let Ok(v) = std::env::var("MLITWATCH_ANALYSIS_EXCERPT_CHARS") {
        cfg.analysis.excerpt_chars = v
            .trim()
            .parse::<usize>()
            .with_context(|| format!("MLITWATCH_ANALYSIS_EXCERPT_CHARSの値が不正です: {v}"))?;
    }
    if let Ok(v) = std::env::var("MLITWATCH_NOTIFY_ENABLED") {
        cfg.notify.enabled =
            parse_bool(&v).with_context(|| format!("MLITWATCH_NOTIFY_ENABLEDの値が不正です: {v}"))?;
    }

    Ok(())
}

fn parse_bool(s: &str) -> Result<bool> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow::anyhow!(
            "真偽値が不正です: {s}（true|false|1|0|yes|no|on|off を指定してください）"
        )),
    }
}
