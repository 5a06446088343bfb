//! 标识符预筛（Aho-Corasick）
//!
//! 设计目标：
//! - 将分区内全部特性标识符构建为一个 AC 自动机，每个文本块只扫描一遍。
//! - 语义等价于逐个标识符做子串包含测试；命中结果映射回记录下标。
//! - 自动机构建失败（超出内部限制）时退回逐个 `contains`，结果不变。

use std::collections::BTreeSet;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use tracing::warn;

/// 单个匹配器：一组模式串，每个模式对应一个记录下标
pub(crate) struct IdentifierMatcher {
    engine: Engine,
    /// 模式索引 -> 记录下标
    pattern_to_record: Vec<usize>,
}

enum Engine {
    Automaton(AhoCorasick),
    /// 回退路径：保存模式文本，逐个测试
    Naive { patterns: Vec<String>, case_insensitive: bool },
}

impl IdentifierMatcher {
    /// 从 (模式, 记录下标) 列表构建；空模式被忽略
    pub(crate) fn build(entries: Vec<(String, usize)>, case_insensitive: bool) -> Self {
        let (patterns, pattern_to_record): (Vec<String>, Vec<usize>) =
            entries.into_iter().filter(|(p, _)| !p.is_empty()).unzip();

        // 需要全部重叠命中（一个位置可能同时命中多个标识符），因此用 Standard 语义
        let built = AhoCorasickBuilder::new()
            .match_kind(MatchKind::Standard)
            .ascii_case_insensitive(case_insensitive)
            .build(&patterns);
        let engine = match built {
            Ok(ac) => Engine::Automaton(ac),
            Err(e) => {
                warn!(error = %e, patterns = patterns.len(), "aho-corasick build failed, falling back to naive matching");
                let patterns = if case_insensitive {
                    patterns.iter().map(|p| p.to_ascii_lowercase()).collect()
                } else {
                    patterns
                };
                Engine::Naive { patterns, case_insensitive }
            }
        };
        Self { engine, pattern_to_record }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pattern_to_record.is_empty()
    }

    /// 收集 `haystack` 中出现过的所有记录下标（去重，按下标升序）
    pub(crate) fn collect_into(&self, haystack: &str, out: &mut BTreeSet<usize>) {
        if self.is_empty() || haystack.is_empty() { return; }
        match &self.engine {
            Engine::Automaton(ac) => {
                for m in ac.find_overlapping_iter(haystack) {
                    out.insert(self.pattern_to_record[m.pattern().as_usize()]);
                }
            }
            Engine::Naive { patterns, case_insensitive } => {
                let lowered;
                let hay = if *case_insensitive {
                    lowered = haystack.to_ascii_lowercase();
                    lowered.as_str()
                } else {
                    haystack
                };
                for (pi, p) in patterns.iter().enumerate() {
                    if hay.contains(p.as_str()) { out.insert(self.pattern_to_record[pi]); }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(ps: &[&str]) -> Vec<(String, usize)> {
        ps.iter().enumerate().map(|(i, p)| (p.to_string(), i)).collect()
    }

    #[test]
    fn overlapping_identifiers_all_reported() {
        let m = IdentifierMatcher::build(entries(&["grid", "subgrid", "grid-template"]), false);
        let mut out = BTreeSet::new();
        m.collect_into("grid-template-rows: subgrid", &mut out);
        assert_eq!(out.into_iter().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn case_insensitive_flag_respected() {
        let cs = IdentifierMatcher::build(entries(&["intersectionobserver"]), false);
        let ci = IdentifierMatcher::build(entries(&["intersectionobserver"]), true);
        let mut a = BTreeSet::new();
        let mut b = BTreeSet::new();
        cs.collect_into("new IntersectionObserver(cb)", &mut a);
        ci.collect_into("new IntersectionObserver(cb)", &mut b);
        assert!(a.is_empty());
        assert!(b.contains(&0));
    }

    #[test]
    fn empty_patterns_ignored() {
        let m = IdentifierMatcher::build(entries(&["", ""]), false);
        assert!(m.is_empty());
        let mut out = BTreeSet::new();
        m.collect_into("anything", &mut out);
        assert!(out.is_empty());
    }
}
