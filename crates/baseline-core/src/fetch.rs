//! 外部资源拉取（跨域样式表 / 外部脚本）
//!
//! 每个资源独立拉取，失败只影响该资源本身；批量拉取在有界线程池中并行，
//! 结果按输入顺序返回。
use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::Url;
use tracing::{debug, warn};

use crate::error::FetchError;

/// 资源拉取接口；实现需可跨线程共享
pub trait ResourceFetcher: Send + Sync {
    fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
}

/// 基于 reqwest 阻塞客户端的实现；`file://` 地址直接读本地文件
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("baseline-inspector/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl ResourceFetcher for HttpFetcher {
    fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::Transport(e.to_string()))?;
        if parsed.scheme() == "file" {
            let path = parsed
                .to_file_path()
                .map_err(|_| FetchError::Transport(format!("invalid file url: {url}")))?;
            return std::fs::read_to_string(path).map_err(|e| FetchError::Transport(e.to_string()));
        }
        let resp = self.client.get(parsed).send().map_err(|e| FetchError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Http { status: status.as_u16() });
        }
        resp.text().map_err(|e| FetchError::Transport(e.to_string()))
    }
}

/// URL 是否命中排除列表（子串匹配，如 "google-analytics"）
pub(crate) fn is_excluded(url: &str, excluded: &[String]) -> bool {
    excluded.iter().any(|d| !d.is_empty() && url.contains(d.as_str()))
}

/// 批量拉取：
/// - 并发度为 1 或资源不超过 1 个时串行执行
/// - 否则在独立 Rayon 线程池中并行，worker → collector 通过通道传递，按 idx 重排
pub(crate) fn fetch_all(fetcher: &dyn ResourceFetcher, urls: &[String], concurrency: usize) -> Vec<Result<String, FetchError>> {
    if concurrency <= 1 || urls.len() <= 1 {
        return urls.iter().map(|u| fetch_logged(fetcher, u)).collect();
    }
    let pool = match rayon::ThreadPoolBuilder::new().num_threads(concurrency.min(urls.len())).build() {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "fetch pool unavailable, fetching serially");
            return urls.iter().map(|u| fetch_logged(fetcher, u)).collect();
        }
    };

    use crossbeam_channel as channel;
    use rayon::prelude::*;

    type Msg = (usize /*idx*/, Result<String, FetchError>);
    let (tx, rx) = channel::bounded::<Msg>(urls.len());

    std::thread::scope(|s| {
        s.spawn(move || {
            pool.install(|| {
                urls.par_iter().enumerate().for_each(|(idx, url)| {
                    let _ = tx.send((idx, fetch_logged(fetcher, url)));
                });
            });
            // tx 在此被丢弃，collector 收到关闭信号
        });

        let mut buffer: BTreeMap<usize, Result<String, FetchError>> = BTreeMap::new();
        while let Ok((idx, res)) = rx.recv() {
            buffer.insert(idx, res);
        }
        (0..urls.len())
            .map(|i| buffer.remove(&i).unwrap_or_else(|| Err(FetchError::Transport("fetch worker lost".into()))))
            .collect()
    })
}

fn fetch_logged(fetcher: &dyn ResourceFetcher, url: &str) -> Result<String, FetchError> {
    let res = fetcher.fetch_text(url);
    if let Err(e) = &res {
        debug!(%url, error = %e, "resource fetch failed, skipping its contribution");
    }
    res
}
