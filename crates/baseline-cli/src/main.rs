use anyhow::{Context, Result};
use baseline_core::{
    load_scan_options, scan_and_write, ArtifactBundle, FeatureIndex, HttpFetcher, Inspector, ResourceFetcher,
    ScanOptions,
};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// web-features 数据集默认下载地址
const DEFAULT_DATASET_URL: &str = "https://unpkg.com/web-features/data.json";

/// 命令行入口（基于 clap）
#[derive(Parser, Debug)]
#[command(name = "baseline", version, about = "Baseline 网页特性检测")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 下载原始特性数据集
    Sync {
        /// 数据集地址
        #[arg(long, default_value = DEFAULT_DATASET_URL)]
        url: String,

        /// 输出文件
        #[arg(long, default_value = "./data.json")]
        output: PathBuf,

        /// 下载超时（秒）
        #[arg(long, default_value_t = 60)]
        timeout: u64,
    },

    /// 将原始数据集归一化为特性记录快照
    Normalize {
        /// 原始数据集（web-features data.json）
        #[arg(long)]
        dataset: PathBuf,

        /// 输出文件（FeatureRecord 数组）
        #[arg(long, default_value = "./features.json")]
        output: PathBuf,
    },

    /// 扫描页面并生成 result.json
    Scan(ScanArgs),
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// 原始数据集
    #[arg(long, conflicts_with = "features", required_unless_present = "features")]
    dataset: Option<PathBuf>,

    /// 归一化快照（normalize 的输出）
    #[arg(long)]
    features: Option<PathBuf>,

    /// HTML 文件或目录（目录下第一层 .html/.htm）
    #[arg(long, conflicts_with = "bundle", required_unless_present = "bundle")]
    input: Option<PathBuf>,

    /// 产物包 JSON（ArtifactBundle）
    #[arg(long)]
    bundle: Option<PathBuf>,

    /// 相对资源地址的解析基准（缺省为页面自身的 file:// 地址）
    #[arg(long)]
    base_url: Option<String>,

    /// 配置文件（TOML）
    #[arg(long)]
    config: Option<PathBuf>,

    /// 离线模式：不拉取跨域样式表与外部脚本
    #[arg(long, default_value_t = false)]
    offline: bool,

    /// 页面级线程数（"auto"=CPU 核心数）
    #[arg(long)]
    threads: Option<String>,

    /// 输出文件（JSON）
    #[arg(long, default_value = "./result.json")]
    output: PathBuf,
}

fn main() -> Result<()> {
    // 初始化日志（支持通过 RUST_LOG 控制等级，例如 info、debug）
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Sync { url, output, timeout } => {
            info!(%url, ?output, "downloading dataset");
            let fetcher = HttpFetcher::new(Duration::from_secs(timeout))?;
            let body = fetcher.fetch_text(&url).with_context(|| format!("download {url}"))?;
            // 落盘前确认可以归一化，避免写入无效数据
            let (index, stats) = FeatureIndex::from_dataset_str(&body).context("downloaded dataset is unreadable")?;
            std::fs::write(&output, body).context("write dataset file")?;
            info!(features = index.stats().total(), skipped = stats.skipped_no_status, "dataset saved");
        }
        Commands::Normalize { dataset, output } => {
            let raw = std::fs::read_to_string(&dataset).context("read dataset file")?;
            let (index, stats) = FeatureIndex::from_dataset_str(&raw).context("normalize dataset")?;
            let out = BufWriter::new(File::create(&output).context("create output file")?);
            write_records(&index, out)?;
            let s = index.stats();
            info!(css = s.css, html = s.html, js = s.js, skipped = stats.skipped_no_status + stats.skipped_malformed, ?output, "features written");
        }
        Commands::Scan(args) => run_scan(args)?,
    }

    Ok(())
}

fn run_scan(args: ScanArgs) -> Result<()> {
    let mut opts = match &args.config {
        Some(path) => load_scan_options(path)?,
        None => ScanOptions::default(),
    };
    if args.offline { opts = opts.offline(); }
    if let Some(t) = &args.threads { opts.threads = parse_threads(t); }

    let index = load_index(args.dataset.as_deref(), args.features.as_deref())?;
    let fetcher = HttpFetcher::new(opts.fetch_timeout)?;
    let inspector = Inspector::with_index(index, Arc::new(fetcher), opts);

    // 以缓冲方式打开输出文件
    let mut out = BufWriter::new(File::create(&args.output).context("create output file")?);

    if let Some(bundle_path) = &args.bundle {
        let raw = std::fs::read_to_string(bundle_path).context("read bundle file")?;
        let bundle: ArtifactBundle = serde_json::from_str(&raw).context("parse bundle file")?;
        let result = inspector.scan(&bundle)?;
        serde_json::to_writer(&mut out, &result)?;
        out.flush().ok();
        let s = result.summary;
        info!(total = s.total, widely = s.widely, newly = s.newly, limited = s.limited, "scan finished");
        return Ok(());
    }

    let Some(input) = &args.input else {
        anyhow::bail!("either --input or --bundle is required");
    };
    info!(?input, output = ?args.output, "starting scan");
    let stats = scan_and_write(input, args.base_url.as_deref(), &mut out, &inspector).context("scan and write failed")?;
    out.flush().ok();

    if stats.pages_failed > 0 {
        warn!(pages_failed = stats.pages_failed, "some pages could not be read");
    }
    info!(pages_scanned = stats.pages_scanned, matches_written = stats.matches_written, "scan finished");
    Ok(())
}

/// 以 FeatureRecord 数组写出归一化快照（CSS → HTML → JS）
fn write_records(index: &FeatureIndex, mut out: impl Write) -> Result<()> {
    let records: Vec<_> = index.records().collect();
    serde_json::to_writer_pretty(&mut out, &records).context("serialize features")?;
    out.flush()?;
    Ok(())
}

/// 原始数据集或归一化快照二选一
fn load_index(dataset: Option<&Path>, features: Option<&Path>) -> Result<FeatureIndex> {
    match (dataset, features) {
        (Some(path), _) => {
            let raw = std::fs::read_to_string(path).context("read dataset file")?;
            let (index, _) = FeatureIndex::from_dataset_str(&raw).context("normalize dataset")?;
            Ok(index)
        }
        (None, Some(path)) => {
            let raw = std::fs::read_to_string(path).context("read features file")?;
            Ok(FeatureIndex::from_snapshot_str(&raw).context("parse features file")?)
        }
        (None, None) => anyhow::bail!("either --dataset or --features is required"),
    }
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    // 支持通过环境变量 RUST_LOG 控制日志等级，如：RUST_LOG=debug
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(env_filter).with_writer(std::io::stderr).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// 解析线程参数
fn parse_threads(s: &str) -> Option<usize> {
    if s.eq_ignore_ascii_case("auto") { return None; }
    match s.parse::<usize>() {
        Ok(n) if n >= 1 => Some(n),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threads_argument() {
        assert_eq!(parse_threads("auto"), None);
        assert_eq!(parse_threads("AUTO"), None);
        assert_eq!(parse_threads("3"), Some(3));
        assert_eq!(parse_threads("0"), None);
        assert_eq!(parse_threads("x"), None);
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn normalized_snapshot_reloads() {
        let raw = r#"{ "features": {
            "html-dialog": { "name": "dialog element", "status": { "baseline": "high" } },
            "css-grid": { "name": "CSS Grid", "status": { "baseline": "high" } },
            "no-status": { "name": "skipped" }
        } }"#;
        let (index, _) = FeatureIndex::from_dataset_str(raw).unwrap();
        let mut buf = Vec::new();
        write_records(&index, &mut buf).unwrap();

        let records: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        let ids: Vec<_> = records.as_array().unwrap().iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, ["css-grid", "html-dialog"]);
        let back = FeatureIndex::from_snapshot_str(std::str::from_utf8(&buf).unwrap()).unwrap();
        assert_eq!(back.stats(), index.stats());
    }

    #[test]
    fn scan_requires_a_dataset_source() {
        assert!(Cli::try_parse_from(["baseline", "scan", "--input", "page.html"]).is_err());
        assert!(Cli::try_parse_from(["baseline", "scan", "--features", "f.json", "--input", "page.html"]).is_ok());
        assert!(Cli::try_parse_from(["baseline", "scan", "--dataset", "d.json", "--features", "f.json", "--input", "p"]).is_err());
    }
}
