//! HTML 扫描：按标签名做结构匹配（不扫描任意文本）
use crate::findings::MatchCollector;
use crate::index::Partition;
use crate::types::ScanMatch;

/// 标识符与标签名的匹配规则：`tag` / `html-<tag>` / `*-<tag>`
fn id_matches_tag(id: &str, tag: &str) -> bool {
    if id == tag { return true; }
    match id.strip_suffix(tag) {
        // `html-<tag>` 也落在后缀规则内
        Some(prefix) => prefix.ends_with('-'),
        None => false,
    }
}

/// `tags` 需已小写去重（见 `ArtifactBundle::distinct_tags`）；
/// 每个标签按数据集顺序检查全部记录，同一记录只命中一次
pub(crate) fn scan_html_tags(partition: &Partition, tags: &[String]) -> Vec<ScanMatch> {
    if partition.is_empty() { return Vec::new(); }
    let mut collector = MatchCollector::new(partition);
    for tag in tags {
        for (pos, (id, _)) in partition.iter().enumerate() {
            if id_matches_tag(id, tag) {
                collector.record(pos);
            }
        }
        if collector.is_saturated() { break; }
    }
    collector.into_matches()
}
