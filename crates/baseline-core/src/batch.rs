//! 批量扫描：单个 HTML 文件或目录下的全部 HTML 文件，结果以 JSON 数组流式写出
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use reqwest::Url;
use tracing::{debug, warn};

use crate::bundle::ArtifactBundle;
use crate::index::FeatureIndex;
use crate::fetch::ResourceFetcher;
use crate::options::{BatchStats, ScanOptions};
use crate::scan::{scan_bundle, Inspector};
use crate::types::{PageReport, ScanResult};

/// 收集待扫描页面：文件直接返回；目录取第一层的 .html/.htm 文件并按文件名排序
pub(crate) fn collect_pages(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        anyhow::bail!("input {} is neither a file nor a directory", input.display());
    }
    let mut files: Vec<PathBuf> = vec![];
    for entry in WalkDir::new(input).min_depth(1).max_depth(1) {
        let entry = match entry { Ok(e) => e, Err(_) => continue };
        if !entry.file_type().is_file() { continue; }
        let is_html = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
            .unwrap_or(false);
        if is_html { files.push(entry.into_path()); }
    }
    // 按文件名排序，确保输出顺序稳定
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// 读取并扫描单个页面；相对资源地址以 `base_url`（缺省为文件自身的 file:// 地址）解析
fn scan_page(
    path: &Path,
    base_url: Option<&str>,
    index: &FeatureIndex,
    fetcher: &dyn ResourceFetcher,
    opts: &ScanOptions,
) -> Result<ScanResult> {
    let html = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let file_base = std::fs::canonicalize(path).ok().and_then(|p| Url::from_file_path(p).ok()).map(|u| u.to_string());
    let base = base_url.map(str::to_string).or(file_base);
    let bundle = ArtifactBundle::from_html(&html, base.as_deref());
    Ok(scan_bundle(index, &bundle, fetcher, opts))
}

fn target_name(path: &Path) -> String {
    path.file_name().and_then(|s| s.to_str()).map(str::to_string).unwrap_or_else(|| path.display().to_string())
}

fn write_report(out: &mut dyn Write, first: &mut bool, target: &str, result: &ScanResult) -> Result<()> {
    if !*first { write!(out, ",")?; } else { *first = false; }
    let item = PageReport { target, matches: &result.matches, summary: result.summary };
    serde_json::to_writer(&mut *out, &item)?;
    Ok(())
}

/// 扫描页面并将结果以 JSON 数组流式写入 `out`
/// 稳定性保证：页面按文件名排序；并行扫描时由单线程 Writer 按 idx 重排后输出。
/// 所有页面共享扫描开始时的同一索引版本。
pub fn scan_and_write(input: &Path, base_url: Option<&str>, out: &mut dyn Write, inspector: &Inspector) -> Result<BatchStats> {
    let index = inspector.index()?;
    let pages = collect_pages(input)?;
    let threads = inspector.options().effective_threads();
    let mut stats = BatchStats::default();

    if threads <= 1 || pages.len() <= 1 {
        write!(out, "[")?;
        let mut first = true;
        for path in &pages {
            match scan_page(path, base_url, &index, inspector.fetcher(), inspector.options()) {
                Ok(result) => {
                    stats.pages_scanned += 1;
                    stats.matches_written += result.matches.len();
                    write_report(out, &mut first, &target_name(path), &result)?;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "page skipped");
                    stats.pages_failed += 1;
                }
            }
        }
        write!(out, "]")?;
        return Ok(stats);
    }

    scan_and_write_parallel(&pages, base_url, out, &index, inspector, &mut stats, threads)?;
    Ok(stats)
}

/// 并行调度：
/// - Rayon 线程池并行扫描页面
/// - 单线程 Writer 按 idx 重排并流式写 JSON，保证稳定顺序
fn scan_and_write_parallel(
    pages: &[PathBuf],
    base_url: Option<&str>,
    out: &mut dyn Write,
    index: &FeatureIndex,
    inspector: &Inspector,
    stats: &mut BatchStats,
    threads: usize,
) -> Result<()> {
    use crossbeam_channel as channel;
    use rayon::prelude::*;
    use std::collections::BTreeMap;

    let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build().context("build rayon pool")?;
    // 页面线程分摊拉取并发度，避免对同一站点的请求数按线程数成倍放大
    let page_opts = inspector.options().per_page(threads);
    let page_opts = &page_opts;
    let fetcher = inspector.fetcher();

    write!(out, "[")?;
    let mut first = true;

    // 通道用于 worker → writer 传递结果；None 表示该页面失败
    type Msg = (usize /*idx*/, Option<ScanResult>);
    let (tx, rx) = channel::bounded::<Msg>(256);

    std::thread::scope(|s| -> Result<()> {
        // Writer 保持在当前线程持有 &mut out，扫描在作用域线程内执行
        s.spawn(move || {
            pool.install(|| {
                pages.par_iter().enumerate().for_each(|(idx, path)| {
                    let res = match scan_page(path, base_url, index, fetcher, page_opts) {
                        Ok(r) => Some(r),
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "page skipped");
                            None
                        }
                    };
                    let _ = tx.send((idx, res));
                });
            });
        });

        // rx 归本闭包所有：Writer 提前出错返回时通道随之关闭，worker 不会阻塞
        let rx = rx;
        let mut next_idx: usize = 0;
        let mut buffer: BTreeMap<usize, Option<ScanResult>> = BTreeMap::new();
        while let Ok((idx, res)) = rx.recv() {
            buffer.insert(idx, res);
            // 尝试从 next_idx 开始顺序冲刷
            while let Some(res) = buffer.remove(&next_idx) {
                match res {
                    Some(result) => {
                        stats.pages_scanned += 1;
                        stats.matches_written += result.matches.len();
                        write_report(out, &mut first, &target_name(&pages[next_idx]), &result)?;
                    }
                    None => stats.pages_failed += 1,
                }
                next_idx += 1;
            }
        }
        debug!(flushed = next_idx, "parallel writer drained");
        Ok(())
    })?;

    write!(out, "]")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_pages_sorted_and_filtered() {
        let dir = std::env::temp_dir().join(format!("baseline-batch-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        for name in ["b.html", "a.HTM", "notes.txt"] {
            std::fs::write(dir.join(name), "<p></p>").unwrap();
        }
        std::fs::write(dir.join("nested").join("c.html"), "<p></p>").unwrap();
        let pages = collect_pages(&dir).unwrap();
        let names: Vec<_> = pages.iter().map(|p| target_name(p)).collect();
        assert_eq!(names, ["a.HTM", "b.html"]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_input_is_an_error() {
        assert!(collect_pages(Path::new("/definitely/not/here")).is_err());
    }
}
