//! 数据集归一化：原始 web-features 数据 → FeatureRecord
//!
//! 类别推断为有序启发式，先命中者生效：
//! 1. CSS：id 含冒号 / 以 `@` 开头 / name 以 "CSS" 开头 / spec 含 "css" / id 含 CSS 关键字
//! 2. HTML：id 为小写字母数字连字符，且不含 "api" 与 "."，且（name 含 element/attribute 或 id 以 html 开头）
//! 3. 其余归为 JS
//!
//! 规则顺序与关键字表决定分类结果，不能调整。
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{BaselineError, Result};
use crate::types::{FeatureKind, FeatureRecord, Maturity};

/// CSS 领域关键字（顺序固定）
pub const CSS_KEYWORDS: [&str; 15] = [
    "grid", "flexbox", "mask", "filter", "transform", "transition", "animation", "backdrop",
    "border", "background", "font", "text", "color", "margin", "padding",
];

/// 描述最大长度（字符数），超出截断并追加省略标记
pub const DESCRIPTION_MAX_CHARS: usize = 150;
const TRUNCATION_MARKER: &str = "...";

fn markup_regex() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    // 字面量正则，编译不会失败
    RX.get_or_init(|| Regex::new(r"<[^>]*>?").expect("valid markup pattern"))
}

fn html_id_regex() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    RX.get_or_init(|| Regex::new(r"^[a-z0-9-]+$").expect("valid id pattern"))
}

/// 归一化统计（便于日志与 CLI 打印）
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeStats {
    pub entries_seen: usize,
    pub records_built: usize,
    /// 缺少 status 的条目
    pub skipped_no_status: usize,
    /// 结构不合法（非对象 / 缺 name）的条目
    pub skipped_malformed: usize,
}

/// 解析原始数据集文本并归一化
pub fn normalize_dataset_str(raw: &str) -> Result<(Vec<FeatureRecord>, NormalizeStats)> {
    let value: Value = serde_json::from_str(raw).map_err(|e| BaselineError::Dataset(e.to_string()))?;
    normalize_dataset(&value)
}

/// 归一化已解析的数据集
/// - 支持 `{ "features": {...} }` 与裸 `{ id: {...} }` 两种形态
/// - 输出顺序与源文档中条目顺序一致
/// - 不可用条目跳过并计数，不导致整体失败
pub fn normalize_dataset(value: &Value) -> Result<(Vec<FeatureRecord>, NormalizeStats)> {
    let root = value
        .as_object()
        .ok_or_else(|| BaselineError::Dataset("top-level value is not an object".into()))?;
    let features = match root.get("features") {
        Some(Value::Object(f)) => f,
        Some(_) => return Err(BaselineError::Dataset("`features` is not an object".into())),
        None => root,
    };

    let mut stats = NormalizeStats::default();
    let mut out = Vec::with_capacity(features.len());
    for (key, entry) in features {
        stats.entries_seen += 1;
        let Some(obj) = entry.as_object() else {
            stats.skipped_malformed += 1;
            continue;
        };
        // 没有 status 就无法推导成熟度，整条丢弃
        let Some(status) = obj.get("status").and_then(Value::as_object) else {
            stats.skipped_no_status += 1;
            continue;
        };
        let Some(name) = obj.get("name").and_then(Value::as_str) else {
            stats.skipped_malformed += 1;
            debug!(id = %key, "dataset entry without name skipped");
            continue;
        };
        out.push(normalize_entry(key, name, obj, status));
    }
    stats.records_built = out.len();
    info!(
        entries = stats.entries_seen,
        records = stats.records_built,
        no_status = stats.skipped_no_status,
        malformed = stats.skipped_malformed,
        "dataset normalized"
    );
    Ok((out, stats))
}

fn normalize_entry(id: &str, name: &str, obj: &Map<String, Value>, status: &Map<String, Value>) -> FeatureRecord {
    let specs = spec_links(obj.get("spec"));
    let kind = infer_kind(id, name, &specs);
    let description = match obj.get("description_html").and_then(Value::as_str) {
        Some(html) if !html.is_empty() => clean_description(html),
        _ => name.to_string(),
    };
    let browser_support = match status.get("support") {
        Some(Value::Object(m)) => m.clone(),
        _ => Map::new(),
    };
    FeatureRecord {
        id: id.to_string(),
        name: name.to_string(),
        description,
        spec_link: specs.first().map(|s| s.to_string()),
        kind,
        maturity: Maturity::from_baseline(status.get("baseline")),
        browser_support,
    }
}

/// spec 字段可能是字符串或字符串数组
fn spec_links(v: Option<&Value>) -> Vec<&str> {
    match v {
        Some(Value::String(s)) => vec![s.as_str()],
        Some(Value::Array(a)) => a.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

/// 按固定顺序推断特性类别
pub fn infer_kind(id: &str, name: &str, specs: &[&str]) -> FeatureKind {
    if is_css(id, name, specs) {
        return FeatureKind::Css;
    }
    if is_html(id, name) {
        return FeatureKind::Html;
    }
    FeatureKind::Js
}

fn is_css(id: &str, name: &str, specs: &[&str]) -> bool {
    id.contains(':')
        || id.starts_with('@')
        || name.starts_with("CSS")
        || specs.iter().any(|s| s.contains("css"))
        || CSS_KEYWORDS.iter().any(|k| id.contains(k))
}

fn is_html(id: &str, name: &str) -> bool {
    html_id_regex().is_match(id)
        && !id.contains("api")
        && !id.contains('.')
        && (name.contains("element") || name.contains("attribute") || id.starts_with("html"))
}

/// 去除标记并按字符数截断
pub fn clean_description(html: &str) -> String {
    let plain = markup_regex().replace_all(html, "");
    match plain.char_indices().nth(DESCRIPTION_MAX_CHARS) {
        Some((cut, _)) => {
            let mut s = plain[..cut].to_string();
            s.push_str(TRUNCATION_MARKER);
            s
        }
        None => plain.into_owned(),
    }
}
