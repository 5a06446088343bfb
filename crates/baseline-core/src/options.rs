//! 扫描选项与统计信息（模块）
use std::time::Duration;

/// 默认排除的高流量统计/广告脚本域名
pub const DEFAULT_EXCLUDED_SCRIPT_DOMAINS: [&str; 2] = ["google-analytics", "doubleclick"];

/// 扫描选项
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOptions {
    /// 外部资源拉取并发度：None 表示自动（等于 CPU 核数）；Some(1) 走串行
    pub fetch_concurrency: Option<usize>,
    /// 单个资源拉取超时
    pub fetch_timeout: Duration,
    /// 外部脚本 URL 含其中任一子串则不拉取
    pub excluded_script_domains: Vec<String>,
    /// 是否拉取无法直接读取规则的样式表源码
    pub fetch_cross_origin_styles: bool,
    /// 是否拉取外部脚本
    pub fetch_external_scripts: bool,
    /// 批量扫描时的页面级线程数：None 表示自动；Some(1) 走串行
    pub threads: Option<usize>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            fetch_concurrency: None,
            fetch_timeout: Duration::from_secs(10),
            excluded_script_domains: DEFAULT_EXCLUDED_SCRIPT_DOMAINS.iter().map(|s| s.to_string()).collect(),
            fetch_cross_origin_styles: true,
            fetch_external_scripts: true,
            threads: None,
        }
    }
}

impl ScanOptions {
    /// 离线模式：不发起任何网络拉取
    pub fn offline(mut self) -> Self {
        self.fetch_cross_origin_styles = false;
        self.fetch_external_scripts = false;
        self
    }

    pub(crate) fn effective_fetch_concurrency(&self) -> usize {
        self.fetch_concurrency.unwrap_or_else(num_cpus::get).max(1)
    }

    pub(crate) fn effective_threads(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get).max(1)
    }

    /// 页面并行时各页面分摊拉取并发度，总并发不超过 max(页面线程数, 拉取并发度)
    pub(crate) fn per_page(&self, page_threads: usize) -> Self {
        let share = self.effective_fetch_concurrency() / page_threads.max(1);
        Self { fetch_concurrency: Some(share.max(1)), ..self.clone() }
    }
}

/// 批量扫描统计信息（便于 CLI 打印）
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchStats {
    pub pages_scanned: usize,
    pub pages_failed: usize,
    pub matches_written: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_threads_share_the_fetch_budget() {
        let opts = ScanOptions { fetch_concurrency: Some(8), ..Default::default() };
        assert_eq!(opts.per_page(1).fetch_concurrency, Some(8));
        assert_eq!(opts.per_page(4).fetch_concurrency, Some(2));
        assert_eq!(opts.per_page(16).fetch_concurrency, Some(1));
        assert_eq!(opts.per_page(4).excluded_script_domains, opts.excluded_script_domains);
    }

    #[test]
    fn offline_disables_both_fetch_kinds() {
        let opts = ScanOptions::default().offline();
        assert!(!opts.fetch_cross_origin_styles);
        assert!(!opts.fetch_external_scripts);
    }
}
