//! 产物包：一个页面的全部样式、标签名与脚本，以及基于正则的 HTML 提取
//!
//! 提取是纯词法的（不构建 DOM）：
//! - `style="..."` 属性值 → 内联样式
//! - `<style>` 元素内容 → 可直接读取的样式表
//! - `<link rel="stylesheet" href>` → 需要拉取源码的样式表
//! - 标签名（去除脚本/样式/注释内容后统计，小写去重）
//! - `<script>` 内联内容与 `src` 引用
use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// 单个样式表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Stylesheet {
    /// 规则文本可直接读取
    Readable {
        #[serde(default)]
        href: Option<String>,
        rules: Vec<String>,
    },
    /// 规则不可直接读取（跨域），需按 href 拉取源码
    Opaque {
        #[serde(default)]
        href: Option<String>,
    },
}

/// 单个脚本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Script {
    Inline { text: String },
    External { src: String },
}

/// 一次扫描的输入
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ArtifactBundle {
    pub inline_styles: Vec<String>,
    pub stylesheets: Vec<Stylesheet>,
    pub tag_names: Vec<String>,
    pub scripts: Vec<Script>,
}

impl ArtifactBundle {
    /// 小写去重后的标签名，保持首次出现顺序
    pub fn distinct_tags(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.tag_names
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty() && seen.insert(t.clone()))
            .collect()
    }

    /// 从 HTML 源码中词法提取产物；相对地址按 `base_url` 解析
    pub fn from_html(html: &str, base_url: Option<&str>) -> Self {
        let rx = patterns();
        let base = base_url.and_then(|b| Url::parse(b).ok());
        let mut bundle = ArtifactBundle::default();

        for caps in rx.script.captures_iter(html) {
            let attrs = caps.get(1).map_or("", |m| m.as_str());
            match attr_value(&rx.src_attr, attrs) {
                Some(src) if !src.is_empty() => {
                    bundle.scripts.push(Script::External { src: resolve(base.as_ref(), &src) });
                }
                _ => {
                    let text = caps.get(2).map_or("", |m| m.as_str());
                    bundle.scripts.push(Script::Inline { text: text.to_string() });
                }
            }
        }

        // 样式表按文档顺序：<style> 与 <link> 混排
        let mut sheets: Vec<(usize, Stylesheet)> = Vec::new();
        for caps in rx.style_block.captures_iter(html) {
            let pos = caps.get(0).map_or(0, |m| m.start());
            let body = caps.get(1).map_or("", |m| m.as_str());
            sheets.push((pos, Stylesheet::Readable { href: None, rules: vec![body.to_string()] }));
        }
        for m in rx.link.find_iter(html) {
            let tag = m.as_str();
            let is_sheet = attr_value(&rx.rel_attr, tag)
                .map(|rel| rel.to_ascii_lowercase().split_whitespace().any(|t| t == "stylesheet"))
                .unwrap_or(false);
            if !is_sheet { continue; }
            let href = attr_value(&rx.href_attr, tag).map(|h| resolve(base.as_ref(), &h));
            sheets.push((m.start(), Stylesheet::Opaque { href }));
        }
        sheets.sort_by_key(|(pos, _)| *pos);
        bundle.stylesheets = sheets.into_iter().map(|(_, s)| s).collect();

        // 标签名与 style 属性只在“标记”部分统计，排除脚本/样式正文与注释
        let markup = rx.comment.replace_all(html, "");
        let markup = rx.script.replace_all(&markup, "<script>");
        let markup = rx.style_block.replace_all(&markup, "<style>");
        for caps in rx.style_attr.captures_iter(&markup) {
            if let Some(v) = caps.get(1).or_else(|| caps.get(2)) {
                bundle.inline_styles.push(v.as_str().to_string());
            }
        }
        let mut seen = HashSet::new();
        for caps in rx.tag.captures_iter(&markup) {
            let name = caps[1].to_lowercase();
            if seen.insert(name.clone()) {
                bundle.tag_names.push(name);
            }
        }
        bundle
    }
}

struct Patterns {
    tag: Regex,
    comment: Regex,
    script: Regex,
    style_block: Regex,
    style_attr: Regex,
    link: Regex,
    rel_attr: Regex,
    href_attr: Regex,
    src_attr: Regex,
}

fn patterns() -> &'static Patterns {
    static P: OnceLock<Patterns> = OnceLock::new();
    P.get_or_init(|| {
        // 全部为字面量正则
        let rx = |p: &str| Regex::new(p).expect("valid extraction pattern");
        Patterns {
            tag: rx(r"<([a-zA-Z][a-zA-Z0-9-]*)"),
            comment: rx(r"(?s)<!--.*?-->"),
            script: rx(r"(?is)<script\b([^>]*)>(.*?)</script\s*>"),
            style_block: rx(r"(?is)<style\b[^>]*>(.*?)</style\s*>"),
            style_attr: rx(r#"(?i)\sstyle\s*=\s*(?:"([^"]*)"|'([^']*)')"#),
            link: rx(r"(?i)<link\b[^>]*>"),
            rel_attr: rx(r#"(?i)(?:^|\s)rel\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#),
            href_attr: rx(r#"(?i)(?:^|\s)href\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#),
            src_attr: rx(r#"(?i)(?:^|\s)src\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#),
        }
    })
}

/// 取属性值（双引号 / 单引号 / 无引号三种写法）
fn attr_value(rx: &Regex, tag: &str) -> Option<String> {
    let caps = rx.captures(tag)?;
    caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)).map(|m| m.as_str().trim().to_string())
}

/// 相对地址解析；无法解析时原样保留（后续拉取失败只影响该资源）
fn resolve(base: Option<&Url>, href: &str) -> String {
    if let Ok(abs) = Url::parse(href) {
        return abs.to_string();
    }
    match base.and_then(|b| b.join(href).ok()) {
        Some(u) => u.to_string(),
        None => href.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!doctype html>
<html>
<head>
  <link rel="stylesheet" href="/css/site.css">
  <style>.a { display: grid; }</style>
  <link rel="icon" href="/favicon.ico">
  <script src="https://cdn.example.com/app.js"></script>
  <script>const el = document.createElement("<section>"); new IntersectionObserver(cb);</script>
</head>
<body>
  <!-- <marquee>old</marquee> -->
  <DIALOG open style="container-type: inline-size">hi</DIALOG>
  <div style='display:flex'></div><div></div>
</body>
</html>"#;

    #[test]
    fn extracts_all_artifact_kinds() {
        let b = ArtifactBundle::from_html(PAGE, Some("https://site.test/blog/post.html"));
        assert_eq!(b.inline_styles, vec!["container-type: inline-size", "display:flex"]);
        assert_eq!(
            b.stylesheets,
            vec![
                Stylesheet::Opaque { href: Some("https://site.test/css/site.css".into()) },
                Stylesheet::Readable { href: None, rules: vec![".a { display: grid; }".into()] },
            ]
        );
        assert_eq!(b.scripts.len(), 2);
        assert_eq!(b.scripts[0], Script::External { src: "https://cdn.example.com/app.js".into() });
        assert!(matches!(&b.scripts[1], Script::Inline { text } if text.contains("IntersectionObserver")));
    }

    #[test]
    fn tag_names_skip_script_bodies_and_comments() {
        let b = ArtifactBundle::from_html(PAGE, None);
        assert!(b.tag_names.contains(&"dialog".to_string()));
        assert!(b.tag_names.contains(&"div".to_string()));
        assert!(!b.tag_names.contains(&"section".to_string()));
        assert!(!b.tag_names.contains(&"marquee".to_string()));
        assert_eq!(b.tag_names.iter().filter(|t| *t == "div").count(), 1);
    }

    #[test]
    fn relative_href_without_base_kept_verbatim() {
        let b = ArtifactBundle::from_html(r#"<link href=main.css rel=stylesheet>"#, None);
        assert_eq!(b.stylesheets, vec![Stylesheet::Opaque { href: Some("main.css".into()) }]);
    }

    #[test]
    fn data_attributes_are_not_resource_references() {
        let b = ArtifactBundle::from_html(
            r#"<script data-src="lazy.js">fetch('/')</script>
               <link data-rel="stylesheet" data-href="a.css">
               <link rel="stylesheet" data-href="b.css">"#,
            None,
        );
        assert!(matches!(&b.scripts[..], [Script::Inline { text }] if text.contains("fetch")));
        assert_eq!(b.stylesheets, vec![Stylesheet::Opaque { href: None }]);
    }

    #[test]
    fn distinct_tags_lowercases_and_dedups() {
        let b = ArtifactBundle { tag_names: vec!["DIV".into(), "div".into(), "Dialog".into(), " ".into()], ..Default::default() };
        assert_eq!(b.distinct_tags(), vec!["div", "dialog"]);
    }

    #[test]
    fn bundle_json_shape() {
        let raw = r#"{
            "inlineStyles": ["display: grid"],
            "stylesheets": [{ "type": "opaque", "href": "https://x.test/a.css" }],
            "scripts": [{ "type": "inline", "text": "fetch('/')" }, { "type": "external", "src": "https://x.test/a.js" }]
        }"#;
        let b: ArtifactBundle = serde_json::from_str(raw).unwrap();
        assert_eq!(b.inline_styles.len(), 1);
        assert!(b.tag_names.is_empty());
        assert_eq!(b.scripts.len(), 2);
    }
}
