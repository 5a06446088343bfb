//! 扫描编排：拉取外部资源 → CSS / HTML / JS 三个扫描器 → 合并与汇总
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::bundle::{ArtifactBundle, Script, Stylesheet};
use crate::engine_css::scan_css_blocks;
use crate::engine_html::scan_html_tags;
use crate::engine_js::scan_js_bodies;
use crate::error::{FetchError, Result};
use crate::fetch::{fetch_all, is_excluded, ResourceFetcher};
use crate::index::{FeatureIndex, IndexHandle};
use crate::normalize::NormalizeStats;
use crate::options::ScanOptions;
use crate::types::{FeatureKind, ScanResult};

/// 一次扫描需要拉取的外部资源（同一 URL 只拉一次）
#[derive(Default)]
struct FetchPlan {
    urls: Vec<String>,
    slot_of: HashMap<String, usize>,
}

impl FetchPlan {
    fn slot(&mut self, url: &str) -> usize {
        if let Some(&i) = self.slot_of.get(url) { return i; }
        let i = self.urls.len();
        self.urls.push(url.to_string());
        self.slot_of.insert(url.to_string(), i);
        i
    }
}

/// 文本来源：直接可读，或指向拉取结果槽位
enum Source<'a> {
    Text(&'a str),
    Fetched(usize),
    /// 无法获得文本（无 href / 被排除 / 已关闭拉取）
    Skipped,
}

fn plan_sources<'a>(bundle: &'a ArtifactBundle, opts: &ScanOptions, plan: &mut FetchPlan) -> (Vec<Source<'a>>, Vec<Source<'a>>) {
    let mut css: Vec<Source<'a>> = bundle.inline_styles.iter().map(|s| Source::Text(s.as_str())).collect();
    for sheet in &bundle.stylesheets {
        match sheet {
            Stylesheet::Readable { rules, .. } => css.extend(rules.iter().map(|r| Source::Text(r.as_str()))),
            Stylesheet::Opaque { href: Some(href) } if opts.fetch_cross_origin_styles => css.push(Source::Fetched(plan.slot(href))),
            Stylesheet::Opaque { href: Some(href) } => {
                debug!(%href, "stylesheet fetching disabled, skipped");
                css.push(Source::Skipped);
            }
            Stylesheet::Opaque { href: None } => {
                debug!(error = %FetchError::NoSource, "stylesheet not readable, skipped");
                css.push(Source::Skipped);
            }
        }
    }

    let mut js = Vec::with_capacity(bundle.scripts.len());
    for script in &bundle.scripts {
        match script {
            Script::Inline { text } => js.push(Source::Text(text.as_str())),
            Script::External { src } if !opts.fetch_external_scripts => {
                debug!(%src, "external script fetching disabled, skipped");
                js.push(Source::Skipped);
            }
            Script::External { src } if is_excluded(src, &opts.excluded_script_domains) => {
                debug!(%src, error = %FetchError::Excluded, "external script skipped");
                js.push(Source::Skipped);
            }
            Script::External { src } => js.push(Source::Fetched(plan.slot(src))),
        }
    }
    (css, js)
}

fn resolve_texts<'a>(sources: &'a [Source<'a>], fetched: &'a [std::result::Result<String, FetchError>]) -> impl Iterator<Item = &'a str> + 'a {
    sources.iter().filter_map(move |s| match s {
        Source::Text(t) => Some(*t),
        Source::Fetched(i) => fetched.get(*i).and_then(|r| r.as_deref().ok()),
        Source::Skipped => None,
    })
}

/// 针对一个产物包执行完整扫描。
/// 结果顺序固定：CSS 命中在前，其次 HTML，最后 JS；各自内部保持首次检出顺序。
/// 单个资源拉取失败只会使该资源不贡献命中。
pub fn scan_bundle(index: &FeatureIndex, bundle: &ArtifactBundle, fetcher: &dyn ResourceFetcher, opts: &ScanOptions) -> ScanResult {
    let mut plan = FetchPlan::default();
    let (css_sources, js_sources) = plan_sources(bundle, opts, &mut plan);
    let fetched = fetch_all(fetcher, &plan.urls, opts.effective_fetch_concurrency());
    let failed = fetched.iter().filter(|r| r.is_err()).count();

    let mut matches = scan_css_blocks(index.lookup(FeatureKind::Css), resolve_texts(&css_sources, &fetched));
    let css_count = matches.len();
    matches.extend(scan_html_tags(index.lookup(FeatureKind::Html), &bundle.distinct_tags()));
    let html_count = matches.len() - css_count;
    matches.extend(scan_js_bodies(index.lookup(FeatureKind::Js), resolve_texts(&js_sources, &fetched)));
    let js_count = matches.len() - css_count - html_count;

    let result = ScanResult::new(matches);
    info!(
        css = css_count,
        html = html_count,
        js = js_count,
        fetched = plan.urls.len(),
        fetch_failed = failed,
        total = result.summary.total,
        "scan complete"
    );
    result
}

/// 对外唯一入口：持有当前索引句柄、资源拉取器与扫描选项
pub struct Inspector {
    index: IndexHandle,
    fetcher: Arc<dyn ResourceFetcher>,
    opts: ScanOptions,
}

impl Inspector {
    /// 未加载数据集的检查器；在 `refresh` 之前扫描会返回 IndexUnavailable
    pub fn new(fetcher: Arc<dyn ResourceFetcher>, opts: ScanOptions) -> Self {
        Self { index: IndexHandle::new(), fetcher, opts }
    }

    pub fn with_index(index: FeatureIndex, fetcher: Arc<dyn ResourceFetcher>, opts: ScanOptions) -> Self {
        Self { index: IndexHandle::with_index(index), fetcher, opts }
    }

    pub fn options(&self) -> &ScanOptions {
        &self.opts
    }

    pub fn fetcher(&self) -> &dyn ResourceFetcher {
        self.fetcher.as_ref()
    }

    pub fn index(&self) -> Result<Arc<FeatureIndex>> {
        self.index.current()
    }

    /// 数据集刷新；进行中的扫描继续使用开始时的索引版本
    pub fn refresh(&self, dataset: &serde_json::Value) -> Result<NormalizeStats> {
        self.index.refresh(dataset)
    }

    pub fn refresh_from_str(&self, raw: &str) -> Result<NormalizeStats> {
        self.index.refresh_from_str(raw)
    }

    pub fn replace_index(&self, index: FeatureIndex) {
        self.index.replace(index);
    }

    /// 扫描产物包；索引从未初始化时返回 IndexUnavailable
    pub fn scan(&self, bundle: &ArtifactBundle) -> Result<ScanResult> {
        let index = self.index.current()?;
        Ok(scan_bundle(&index, bundle, self.fetcher.as_ref(), &self.opts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// 记录被请求过的 URL
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl ResourceFetcher for Recorder {
        fn fetch_text(&self, url: &str) -> std::result::Result<String, FetchError> {
            self.seen.lock().unwrap().push(url.to_string());
            Ok(String::new())
        }
    }

    #[test]
    fn plan_dedups_urls_and_honours_exclusions() {
        let bundle = ArtifactBundle {
            stylesheets: vec![
                Stylesheet::Opaque { href: Some("https://a.test/x.css".into()) },
                Stylesheet::Opaque { href: None },
                Stylesheet::Opaque { href: Some("https://a.test/x.css".into()) },
            ],
            scripts: vec![
                Script::External { src: "https://www.google-analytics.com/ga.js".into() },
                Script::External { src: "https://a.test/app.js".into() },
            ],
            ..Default::default()
        };
        let mut plan = FetchPlan::default();
        let (css, js) = plan_sources(&bundle, &ScanOptions::default(), &mut plan);
        assert_eq!(plan.urls, vec!["https://a.test/x.css", "https://a.test/app.js"]);
        assert_eq!(css.len(), 3);
        assert!(matches!(js[0], Source::Skipped));
        assert!(matches!(js[1], Source::Fetched(1)));
    }

    #[test]
    fn offline_mode_never_fetches() {
        let bundle = ArtifactBundle {
            stylesheets: vec![Stylesheet::Opaque { href: Some("https://a.test/x.css".into()) }],
            scripts: vec![Script::External { src: "https://a.test/app.js".into() }],
            ..Default::default()
        };
        let rec = Arc::new(Recorder::default());
        let idx = FeatureIndex::from_records(Vec::new());
        let result = scan_bundle(&idx, &bundle, rec.as_ref(), &ScanOptions::default().offline());
        assert!(result.is_empty());
        assert!(rec.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn uninitialized_inspector_is_a_hard_error() {
        let inspector = Inspector::new(Arc::new(Recorder::default()), ScanOptions::default());
        assert!(matches!(inspector.scan(&ArtifactBundle::default()), Err(crate::BaselineError::IndexUnavailable)));
    }
}
