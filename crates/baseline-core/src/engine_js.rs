//! JS 扫描：脚本正文上的标识符匹配
use crate::findings::MatchCollector;
use crate::index::Partition;
use crate::types::ScanMatch;

/// 对每段脚本正文，长度大于 2 的标识符满足任一条件即命中：
/// 1. 原样标识符大小写敏感子串包含（如 `fetch`）
/// 2. 去掉连字符后大小写不敏感子串包含（`intersection-observer` ↔ `IntersectionObserver`）
///
/// 去重范围是整次扫描，而非单段脚本。
pub(crate) fn scan_js_bodies<'a, I>(partition: &Partition, bodies: I) -> Vec<ScanMatch>
where
    I: IntoIterator<Item = &'a str>,
{
    if partition.is_empty() { return Vec::new(); }
    let mut collector = MatchCollector::new(partition);
    for code in bodies {
        if code.is_empty() { continue; }
        for pos in partition.positions_in(code) {
            collector.record(pos);
        }
        if collector.is_saturated() { break; }
    }
    collector.into_matches()
}
