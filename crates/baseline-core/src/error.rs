//! 错误类型
use thiserror::Error;

/// 对调用方可见的硬错误
#[derive(Debug, Error)]
pub enum BaselineError {
    /// 顶层数据集结构不可读（非 JSON / 非对象）
    #[error("dataset is unreadable: {0}")]
    Dataset(String),

    /// 尚未成功加载任何数据集就发起扫描
    #[error("feature index is not initialized")]
    IndexUnavailable,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// 单个外部资源的获取失败；只在扫描内部消化，不向调用方传播
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("url matches an excluded domain")]
    Excluded,
    #[error("http status {status}")]
    Http { status: u16 },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("resource has no source url")]
    NoSource,
}

pub type Result<T> = std::result::Result<T, BaselineError>;
