//! 单次扫描内的命中收集与去重（内部使用）
use std::collections::HashSet;

use crate::index::Partition;
use crate::types::ScanMatch;

/// 命中收集器：以记录在分区中的下标为键去重，保留首次检出顺序。
/// 生命周期限于一次扫描，用完即弃。
pub(crate) struct MatchCollector<'p> {
    partition: &'p Partition,
    seen: HashSet<usize>,
    matches: Vec<ScanMatch>,
}

impl<'p> MatchCollector<'p> {
    pub(crate) fn new(partition: &'p Partition) -> Self {
        Self { partition, seen: HashSet::new(), matches: Vec::new() }
    }

    /// 记录一次命中；已命中过的记录不再重复输出
    pub(crate) fn record(&mut self, pos: usize) -> bool {
        if !self.seen.insert(pos) { return false; }
        self.matches.push(ScanMatch::from(self.partition.record_at(pos)));
        true
    }

    /// 分区内所有记录都已命中时可提前结束
    pub(crate) fn is_saturated(&self) -> bool {
        self.seen.len() == self.partition.len()
    }

    pub(crate) fn into_matches(self) -> Vec<ScanMatch> {
        self.matches
    }
}
