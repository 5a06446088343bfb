//! CSS 扫描：内联样式 + 样式表规则文本上的子串匹配
use crate::findings::MatchCollector;
use crate::index::Partition;
use crate::types::ScanMatch;

/// 依次扫描每个文本块：
/// - 文本块统一转小写后测试标识符子串包含
/// - 同一标识符整次扫描只记一次，输出保持首次检出顺序
/// - 同一文本块内的多个命中按数据集顺序输出
pub(crate) fn scan_css_blocks<'a, I>(partition: &Partition, blocks: I) -> Vec<ScanMatch>
where
    I: IntoIterator<Item = &'a str>,
{
    if partition.is_empty() { return Vec::new(); }
    let mut collector = MatchCollector::new(partition);
    for block in blocks {
        if block.is_empty() { continue; }
        let lowered = block.to_lowercase();
        for pos in partition.positions_in(&lowered) {
            collector.record(pos);
        }
        if collector.is_saturated() { break; }
    }
    collector.into_matches()
}
