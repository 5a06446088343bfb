//! 公共类型（对外暴露）：特性记录、命中项与扫描结果
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 特性所属的产物类别（CSS / HTML / JS）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Css,
    Html,
    Js,
}

impl FeatureKind {
    /// 固定的展示顺序：CSS → HTML → JS
    pub const ALL: [FeatureKind; 3] = [FeatureKind::Css, FeatureKind::Html, FeatureKind::Js];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKind::Css => "css",
            FeatureKind::Html => "html",
            FeatureKind::Js => "js",
        }
    }
}

/// 跨浏览器成熟度（由数据集 baseline 字段推导）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Maturity {
    #[serde(rename = "widely")]
    WidelyAvailable,
    #[serde(rename = "newly")]
    NewlyAvailable,
    #[serde(rename = "limited")]
    Limited,
}

impl Maturity {
    /// `high` → Widely，`low` → Newly，其余（含缺失）→ Limited
    pub fn from_baseline(level: Option<&Value>) -> Self {
        match level.and_then(Value::as_str) {
            Some("high") => Maturity::WidelyAvailable,
            Some("low") => Maturity::NewlyAvailable,
            _ => Maturity::Limited,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Maturity::WidelyAvailable => "widely",
            Maturity::NewlyAvailable => "newly",
            Maturity::Limited => "limited",
        }
    }
}

/// 归一化后的单条特性记录；kind 与 maturity 在归一化时确定，此后不再变化
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_link: Option<String>,
    pub kind: FeatureKind,
    pub maturity: Maturity,
    /// 浏览器 → 支持信息（原样透传，不做校验）
    #[serde(default)]
    pub browser_support: Map<String, Value>,
}

/// 单次命中：特性记录 + 命中所在的产物类别（与记录自身 kind 相同）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanMatch {
    pub id: String,
    pub name: String,
    pub description: String,
    pub maturity: Maturity,
    pub kind: FeatureKind,
    pub browser_support: Map<String, Value>,
}

impl From<&FeatureRecord> for ScanMatch {
    fn from(r: &FeatureRecord) -> Self {
        Self {
            id: r.id.clone(),
            name: r.name.clone(),
            description: r.description.clone(),
            maturity: r.maturity,
            kind: r.kind,
            browser_support: r.browser_support.clone(),
        }
    }
}

/// 按成熟度分桶的计数
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub total: usize,
    pub widely: usize,
    pub newly: usize,
    pub limited: usize,
}

impl ScanSummary {
    pub fn from_matches(matches: &[ScanMatch]) -> Self {
        let mut s = ScanSummary { total: matches.len(), ..Default::default() };
        for m in matches {
            match m.maturity {
                Maturity::WidelyAvailable => s.widely += 1,
                Maturity::NewlyAvailable => s.newly += 1,
                Maturity::Limited => s.limited += 1,
            }
        }
        s
    }
}

/// 一次扫描的结果：按首次检出顺序排列的唯一命中 + 汇总
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    pub matches: Vec<ScanMatch>,
    pub summary: ScanSummary,
}

impl ScanResult {
    pub(crate) fn new(matches: Vec<ScanMatch>) -> Self {
        let summary = ScanSummary::from_matches(&matches);
        Self { matches, summary }
    }

    /// 只保留指定成熟度的命中（用于展示层过滤）
    pub fn filter(&self, maturity: Maturity) -> impl Iterator<Item = &ScanMatch> + '_ {
        self.matches.iter().filter(move |m| m.maturity == maturity)
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

/// 批量扫描输出项（对应 result.json 的单个元素）
#[derive(Debug, Clone, Serialize)]
pub struct PageReport<'a> {
    pub target: &'a str,
    pub matches: &'a [ScanMatch],
    pub summary: ScanSummary,
}
