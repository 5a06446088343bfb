//! Baseline 特性检测核心库
//!
//! 设计要点：
//! - 原始特性兼容数据集 → 归一化记录（类别启发式推断 + 成熟度分桶）→ 按类别分区的只读索引。
//! - 扫描是词法/启发式的：CSS 与 JS 做标识符子串匹配（AC 自动机一次扫描），HTML 按标签名结构匹配。
//! - 单次扫描内按标识符去重，输出顺序 CSS → HTML → JS，各自保持首次检出顺序，可复现。
//! - 外部资源（跨域样式表、外部脚本）拉取失败只影响该资源，不影响整次扫描。
//! - 数据集刷新整体替换索引引用，进行中的扫描继续使用旧版本。

mod batch;
mod bundle;
mod config;
mod engine_css;
mod engine_html;
mod engine_js;
mod error;
mod fetch;
mod findings;
mod index;
mod normalize;
mod options;
mod prefilter;
mod scan;
mod types;

pub use batch::scan_and_write;
pub use bundle::{ArtifactBundle, Script, Stylesheet};
pub use config::{load_scan_options, parse_scan_options};
pub use error::{BaselineError, FetchError, Result};
pub use fetch::{HttpFetcher, ResourceFetcher};
pub use index::{FeatureIndex, IndexHandle, IndexStats, Partition};
pub use normalize::{clean_description, infer_kind, normalize_dataset, normalize_dataset_str, NormalizeStats, CSS_KEYWORDS, DESCRIPTION_MAX_CHARS};
pub use options::{BatchStats, ScanOptions, DEFAULT_EXCLUDED_SCRIPT_DOMAINS};
pub use scan::{scan_bundle, Inspector};
pub use types::{FeatureKind, FeatureRecord, Maturity, PageReport, ScanMatch, ScanResult, ScanSummary};
