//! HTTrack command line construction.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::models::{CrawlSettings, StandardSettings};

/// Maximum transfer rate in bytes/second (`-A`).
pub const MAX_TRANSFER_RATE: u64 = 100_000_000_000;
/// Maximum connections per second (`-%c`).
pub const MAX_CONNECTIONS_PER_SECOND: u32 = 10;
/// Largest image, in KB, kept by the preview crawl.
pub const PREVIEW_MAX_IMAGE_KB: u32 = 150;

/// Bare domain token such as `example.com` or `www.example.org/path`.
static BARE_DOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[a-z0-9](?:[a-z0-9-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]*[a-z0-9])?)*\.[a-z]{2,}(?::\d+)?(?:/\S*)?$")
        .expect("bare domain regex is valid")
});

/// Builds crawler command lines for one configured binary.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    binary: String,
}

impl CommandBuilder {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Full-crawl command for the given settings, without an output directory.
    ///
    /// ADVANCED arguments are appended verbatim; they are not sanitized.
    pub fn archive(&self, settings: &CrawlSettings) -> String {
        match settings {
            CrawlSettings::Standard(s) => self.standard(s),
            CrawlSettings::Advanced { arguments } => format!("{} {}", self.binary, arguments),
        }
    }

    fn standard(&self, s: &StandardSettings) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(10 + s.include_domains.len() + s.exclude_paths.len());
        parts.push(self.binary.clone());
        parts.push(shell_arg(&s.url));
        parts.extend(s.include_domains.iter().map(|d| shell_arg(d)));
        parts.extend(s.exclude_paths.iter().map(|p| shell_arg(&exclude_filter(p))));
        parts.push(format!("-s{}", s.robots.flag_value()));
        parts.push(format!("-N{}", s.structure));
        parts.push(format!("-A{}", MAX_TRANSFER_RATE));
        parts.push(format!("-%c{}", MAX_CONNECTIONS_PER_SECOND));
        // No cache, all logs in one file, never prompt.
        parts.push("-C0".to_string());
        parts.push("-f2".to_string());
        parts.push("-q".to_string());
        parts.join(" ")
    }

    /// Restricted crawl of HTML, CSS, JS and small images for in-app previews.
    pub fn preview(&self, url: &Url, output_dir: &Path) -> String {
        let command = format!(
            "{bin} {url} -* +*.html +*.css +*.js \"+*.jpg*[<{kb}]\" \"+*.png*[<{kb}]\"",
            bin = self.binary,
            url = shell_arg(url.as_str()),
            kb = PREVIEW_MAX_IMAGE_KB,
        );
        with_output_dir(&command, output_dir)
    }
}

/// Exclusion filter for one path, e.g. `/private` becomes `-*/private/*`.
pub fn exclude_filter(path: &str) -> String {
    format!("-*{}/*", path)
}

/// Quote one argument for the shell unless it is made of plain URL characters.
///
/// Validation already rejects `"`, `$`, backquote and backslash, which stay
/// live inside double quotes.
pub fn shell_arg(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=+,@%".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("\"{}\"", arg)
    }
}

/// Append the `-O` output directory to a command line.
pub fn with_output_dir(command: &str, output_dir: &Path) -> String {
    format!("{} -O \"{}\"", command, output_dir.display())
}

/// The crawl targets named in the settings' arguments.
pub fn target_urls(settings: &CrawlSettings) -> Vec<Url> {
    match settings {
        CrawlSettings::Standard(s) => {
            let mut text = s.url.clone();
            for domain in &s.include_domains {
                text.push(' ');
                text.push_str(domain);
            }
            extract_urls(&text)
        }
        CrawlSettings::Advanced { arguments } => extract_urls(arguments),
    }
}

/// Find every http(s) URL or bare domain in an argument string, in order.
///
/// Filter tokens (`+...`, `-...`) are skipped. Bare domains are read as `http://`.
pub fn extract_urls(text: &str) -> Vec<Url> {
    let mut urls: Vec<Url> = Vec::new();
    for token in text.split_whitespace() {
        let token = token.trim_matches(|c| c == '"' || c == '\'');
        if token.is_empty() || token.starts_with('-') || token.starts_with('+') {
            continue;
        }

        let parsed = if token.contains("://") {
            Url::parse(token).ok()
        } else if BARE_DOMAIN.is_match(token) {
            Url::parse(&format!("http://{}", token)).ok()
        } else {
            None
        };

        if let Some(url) = parsed {
            if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() {
                urls.push(url);
            }
        }
    }
    urls
}

/// Distinct hostnames of the given URLs, in first-seen order.
pub fn hostnames(urls: &[Url]) -> Vec<String> {
    let mut hosts: Vec<String> = Vec::new();
    for url in urls {
        if let Some(host) = url.host_str() {
            if !hosts.iter().any(|h| h == host) {
                hosts.push(host.to_string());
            }
        }
    }
    hosts
}
