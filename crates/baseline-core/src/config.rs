//! 配置文件加载（TOML）
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::options::ScanOptions;

/// [fetch] 段
#[derive(Debug, Clone, Default, Deserialize)]
struct FetchSection {
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub excluded_script_domains: Option<Vec<String>>,
    #[serde(default)]
    pub cross_origin_styles: Option<bool>,
    #[serde(default)]
    pub external_scripts: Option<bool>,
}

/// [scan] 段
#[derive(Debug, Clone, Default, Deserialize)]
struct ScanSection {
    #[serde(default)]
    pub threads: Option<usize>,
}

/// 顶层配置文件结构；缺省键回落到默认值，未知键忽略
#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    pub fetch: FetchSection,
    #[serde(default)]
    pub scan: ScanSection,
}

/// 解析 TOML 文本为扫描选项
pub fn parse_scan_options(txt: &str) -> Result<ScanOptions> {
    let parsed: ConfigFile = toml::from_str(txt)?;
    let mut opts = ScanOptions::default();
    let f = parsed.fetch;
    if let Some(n) = f.concurrency { opts.fetch_concurrency = Some(n.max(1)); }
    if let Some(secs) = f.timeout_secs { opts.fetch_timeout = Duration::from_secs(secs); }
    if let Some(list) = f.excluded_script_domains { opts.excluded_script_domains = list; }
    if let Some(b) = f.cross_origin_styles { opts.fetch_cross_origin_styles = b; }
    if let Some(b) = f.external_scripts { opts.fetch_external_scripts = b; }
    if let Some(n) = parsed.scan.threads { opts.threads = Some(n.max(1)); }
    Ok(opts)
}

/// 从 TOML 配置文件加载扫描选项
pub fn load_scan_options(path: &Path) -> Result<ScanOptions> {
    let txt = std::fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    parse_scan_options(&txt).with_context(|| format!("parse config {}", path.display()))
}
