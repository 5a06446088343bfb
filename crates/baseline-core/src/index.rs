//! 特性索引：按类别分区的只读查找结构，以及可整体替换的索引句柄
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::{info, warn};

use crate::error::{BaselineError, Result};
use crate::normalize::{normalize_dataset, normalize_dataset_str, NormalizeStats};
use crate::prefilter::IdentifierMatcher;
use crate::types::{FeatureKind, FeatureRecord};

/// JS 标识符与派生标识符的最短有效长度（严格大于该值才参与匹配）
pub(crate) const JS_MIN_ID_LEN: usize = 2;
const MIN_DERIVED_ID_LEN: usize = JS_MIN_ID_LEN;
/// 数据集中 CSS 特性常见的 id 前缀
const CSS_ID_PREFIX: &str = "css-";

/// 单个类别的分区：记录按数据集顺序存放，id → 下标
pub struct Partition {
    kind: FeatureKind,
    records: Vec<FeatureRecord>,
    by_id: HashMap<String, usize>,
    /// 预编译的标识符匹配器（CSS 与 JS 各两个，HTML 无）
    matchers: Vec<IdentifierMatcher>,
}

impl Partition {
    fn build(kind: FeatureKind, records: Vec<FeatureRecord>) -> Self {
        let by_id = records.iter().enumerate().map(|(i, r)| (r.id.clone(), i)).collect();
        let matchers = match kind {
            FeatureKind::Css => {
                let raw = records.iter().enumerate().map(|(i, r)| (r.id.clone(), i)).collect();
                // `css-` 前缀标识符同时按去前缀形式匹配（css-grid ↔ display: grid）
                let unprefixed = records
                    .iter()
                    .enumerate()
                    .filter_map(|(i, r)| r.id.strip_prefix(CSS_ID_PREFIX).map(|rest| (rest.to_string(), i)))
                    .filter(|(rest, _)| rest.chars().count() > MIN_DERIVED_ID_LEN)
                    .collect();
                vec![IdentifierMatcher::build(raw, false), IdentifierMatcher::build(unprefixed, false)]
            }
            FeatureKind::Js => {
                let eligible: Vec<(usize, &FeatureRecord)> = records
                    .iter()
                    .enumerate()
                    .filter(|(_, r)| r.id.chars().count() > JS_MIN_ID_LEN)
                    .collect();
                // 原样标识符：大小写敏感
                let raw = eligible.iter().map(|(i, r)| (r.id.clone(), *i)).collect();
                // 去连字符标识符：大小写不敏感（intersection-observer ↔ IntersectionObserver）
                let stripped = eligible.iter().map(|(i, r)| (r.id.replace('-', ""), *i)).collect();
                vec![IdentifierMatcher::build(raw, false), IdentifierMatcher::build(stripped, true)]
            }
            FeatureKind::Html => Vec::new(),
        };
        Self { kind, records, by_id, matchers }
    }

    pub fn kind(&self) -> FeatureKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 按数据集顺序遍历 (id, record)
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureRecord)> + '_ {
        self.records.iter().map(|r| (r.id.as_str(), r))
    }

    pub fn get(&self, id: &str) -> Option<&FeatureRecord> {
        self.by_id.get(id).map(|&i| &self.records[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub(crate) fn record_at(&self, pos: usize) -> &FeatureRecord {
        &self.records[pos]
    }

    /// 文本中包含其标识符的全部记录下标（升序 = 数据集顺序）
    pub(crate) fn positions_in(&self, text: &str) -> BTreeSet<usize> {
        let mut out = BTreeSet::new();
        for m in &self.matchers {
            m.collect_into(text, &mut out);
        }
        out
    }
}

/// 各分区记录数
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub css: usize,
    pub html: usize,
    pub js: usize,
}

impl IndexStats {
    pub fn total(&self) -> usize {
        self.css + self.html + self.js
    }
}

/// 不可变特性索引；构建一次，多次扫描并发只读共享
pub struct FeatureIndex {
    css: Partition,
    html: Partition,
    js: Partition,
}

impl FeatureIndex {
    /// 从归一化记录构建；空输入得到合法的空索引。重复 id 保留第一条。
    pub fn from_records(records: impl IntoIterator<Item = FeatureRecord>) -> Self {
        let mut seen: HashSet<String> = HashSet::new();
        let (mut css, mut html, mut js) = (Vec::new(), Vec::new(), Vec::new());
        for r in records {
            if !seen.insert(r.id.clone()) {
                warn!(id = %r.id, "duplicate feature id ignored");
                continue;
            }
            match r.kind {
                FeatureKind::Css => css.push(r),
                FeatureKind::Html => html.push(r),
                FeatureKind::Js => js.push(r),
            }
        }
        let index = Self {
            css: Partition::build(FeatureKind::Css, css),
            html: Partition::build(FeatureKind::Html, html),
            js: Partition::build(FeatureKind::Js, js),
        };
        let stats = index.stats();
        info!(css = stats.css, html = stats.html, js = stats.js, "feature index built");
        index
    }

    /// 原始数据集 → 索引
    pub fn from_dataset(value: &Value) -> Result<(Self, NormalizeStats)> {
        let (records, stats) = normalize_dataset(value)?;
        Ok((Self::from_records(records), stats))
    }

    pub fn from_dataset_str(raw: &str) -> Result<(Self, NormalizeStats)> {
        let (records, stats) = normalize_dataset_str(raw)?;
        Ok((Self::from_records(records), stats))
    }

    /// 从归一化快照（FeatureRecord 数组）恢复，不重新推断类别
    pub fn from_snapshot_str(raw: &str) -> Result<Self> {
        let records: Vec<FeatureRecord> = serde_json::from_str(raw)?;
        Ok(Self::from_records(records))
    }

    pub fn lookup(&self, kind: FeatureKind) -> &Partition {
        match kind {
            FeatureKind::Css => &self.css,
            FeatureKind::Html => &self.html,
            FeatureKind::Js => &self.js,
        }
    }

    pub fn get(&self, id: &str) -> Option<&FeatureRecord> {
        FeatureKind::ALL.iter().find_map(|k| self.lookup(*k).get(id))
    }

    /// 按 CSS → HTML → JS 顺序遍历全部记录
    pub fn records(&self) -> impl Iterator<Item = &FeatureRecord> + '_ {
        FeatureKind::ALL.into_iter().flat_map(move |k| self.lookup(k).iter().map(|(_, r)| r))
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats { css: self.css.len(), html: self.html.len(), js: self.js.len() }
    }

    pub fn is_empty(&self) -> bool {
        self.stats().total() == 0
    }
}

/// 当前生效索引的句柄：刷新时整体替换引用，进行中的扫描继续使用旧版本
#[derive(Default)]
pub struct IndexHandle {
    current: RwLock<Option<Arc<FeatureIndex>>>,
}

impl IndexHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_index(index: FeatureIndex) -> Self {
        Self { current: RwLock::new(Some(Arc::new(index))) }
    }

    /// 取当前索引；从未初始化时报 IndexUnavailable
    pub fn current(&self) -> Result<Arc<FeatureIndex>> {
        // 写锁只在替换指针时持有，中毒时沿用其中的值
        let guard = self.current.read().unwrap_or_else(|p| p.into_inner());
        guard.as_ref().map(Arc::clone).ok_or(BaselineError::IndexUnavailable)
    }

    pub fn replace(&self, index: FeatureIndex) -> Arc<FeatureIndex> {
        let next = Arc::new(index);
        let mut guard = self.current.write().unwrap_or_else(|p| p.into_inner());
        *guard = Some(Arc::clone(&next));
        next
    }

    /// 数据集刷新：归一化 + 构建 + 替换。失败时保留旧索引。
    pub fn refresh(&self, dataset: &Value) -> Result<NormalizeStats> {
        let (index, stats) = FeatureIndex::from_dataset(dataset)?;
        self.replace(index);
        Ok(stats)
    }

    pub fn refresh_from_str(&self, raw: &str) -> Result<NormalizeStats> {
        let (index, stats) = FeatureIndex::from_dataset_str(raw)?;
        self.replace(index);
        Ok(stats)
    }

    pub fn is_initialized(&self) -> bool {
        self.current().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Maturity;
    use serde_json::{json, Map};

    fn rec(id: &str, kind: FeatureKind) -> FeatureRecord {
        FeatureRecord {
            id: id.into(),
            name: id.into(),
            description: id.into(),
            spec_link: None,
            kind,
            maturity: Maturity::Limited,
            browser_support: Map::new(),
        }
    }

    #[test]
    fn partitions_by_kind_and_dedups_ids() {
        let idx = FeatureIndex::from_records(vec![
            rec("grid", FeatureKind::Css),
            rec("dialog", FeatureKind::Html),
            rec("fetch", FeatureKind::Js),
            rec("grid", FeatureKind::Js),
        ]);
        assert_eq!(idx.stats(), IndexStats { css: 1, html: 1, js: 1 });
        assert!(idx.lookup(FeatureKind::Css).contains("grid"));
        assert!(!idx.lookup(FeatureKind::Js).contains("grid"));
        assert_eq!(idx.get("dialog").map(|r| r.kind), Some(FeatureKind::Html));
        let order: Vec<_> = idx.records().map(|r| r.id.as_str()).collect();
        assert_eq!(order, ["grid", "dialog", "fetch"]);
    }

    #[test]
    fn empty_index_is_valid() {
        let idx = FeatureIndex::from_records(Vec::new());
        assert!(idx.is_empty());
        assert!(idx.lookup(FeatureKind::Css).positions_in("display: grid").is_empty());
    }

    #[test]
    fn short_js_ids_are_not_matchable() {
        let idx = FeatureIndex::from_records(vec![rec("at", FeatureKind::Js), rec("fetch", FeatureKind::Js)]);
        let js = idx.lookup(FeatureKind::Js);
        let hits = js.positions_in("const at = await fetch(url)");
        assert_eq!(hits.into_iter().map(|p| js.record_at(p).id.as_str()).collect::<Vec<_>>(), ["fetch"]);
    }

    #[test]
    fn handle_reports_unavailable_then_swaps() {
        let handle = IndexHandle::new();
        assert!(matches!(handle.current(), Err(BaselineError::IndexUnavailable)));
        assert!(!handle.is_initialized());

        handle
            .refresh(&json!({ "css-grid": { "name": "CSS Grid", "status": { "baseline": "high" } } }))
            .unwrap();
        assert!(handle.is_initialized());
        let first = handle.current().unwrap();
        assert_eq!(first.stats().css, 1);

        handle.refresh(&json!({})).unwrap();
        // 旧引用不受替换影响
        assert_eq!(first.stats().css, 1);
        assert!(handle.current().unwrap().is_empty());
    }

    #[test]
    fn failed_refresh_keeps_previous_index() {
        let handle = IndexHandle::with_index(FeatureIndex::from_records(vec![rec("fetch", FeatureKind::Js)]));
        assert!(handle.refresh_from_str("{ not json").is_err());
        assert_eq!(handle.current().unwrap().stats().js, 1);
    }

    #[test]
    fn snapshot_round_trip_keeps_kinds() {
        let idx = FeatureIndex::from_records(vec![rec("dialog", FeatureKind::Html)]);
        let snap = serde_json::to_string(&idx.records().collect::<Vec<_>>()).unwrap();
        let back = FeatureIndex::from_snapshot_str(&snap).unwrap();
        assert_eq!(back.stats().html, 1);
    }
}
