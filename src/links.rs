use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use scraper::{Html, Selector};
use tracing::{debug, info, warn};

use crate::error::{open_input, StageError};
use crate::http::{Fetcher, Identity};

static ANCHOR_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Overwrite,
    Append,
}

#[derive(Debug)]
pub struct ExpandSummary {
    pub pages: usize,
    pub failed: usize,
    pub links: usize,
}

pub struct FilterSummary {
    pub kept: usize,
    pub dropped: usize,
}

// ── Link Collector ──

/// Every `href` in document order.
pub fn extract_hrefs(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| href.to_string())
        .collect()
}

/// Fetch `url` as a browser would and write its links to `out`, one per line.
pub fn collect_links(
    fetcher: &Fetcher,
    url: &str,
    out: &Path,
    mode: WriteMode,
) -> Result<usize, StageError> {
    let html = fetcher.fetch_html(url, Identity::Browser)?;
    let links = extract_hrefs(&html);
    write_lines(out, &links, mode)?;
    info!(url, count = links.len(), out = %out.display(), "collected links");
    Ok(links.len())
}

// ── URL List Builder ──

/// Collect links from every year-index page listed in `index_file` into `out`.
pub fn expand_index(
    fetcher: &Fetcher,
    base_url: &str,
    index_file: &Path,
    out: &Path,
    delay: Duration,
) -> Result<ExpandSummary, StageError> {
    let refs: Vec<String> = read_lines(index_file)?
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();

    let mut summary = ExpandSummary {
        pages: refs.len(),
        failed: 0,
        links: 0,
    };

    for (i, page) in refs.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let url = format!("{}/{}", base_url.trim_end_matches('/'), page);
        match collect_links(fetcher, &url, out, WriteMode::Append) {
            Ok(n) => summary.links += n,
            Err(e) => {
                warn!("Skipping {}: {}", url, e);
                summary.failed += 1;
            }
        }
    }

    info!(
        pages = summary.pages,
        failed = summary.failed,
        links = summary.links,
        "expanded year-index pages"
    );
    Ok(summary)
}

/// Crash pages live under a four-digit year directory, so their links start
/// with `1` or `2`. Anything else on the year pages is navigation.
pub fn is_crash_link(line: &str) -> bool {
    !line.trim().is_empty() && matches!(line.chars().next(), Some('1' | '2'))
}

/// `base/{year}/{line}` for lines of at least four characters.
pub fn repair_url(base_url: &str, line: &str) -> Option<String> {
    let line = line.trim();
    if line.chars().count() < 4 {
        return None;
    }
    let year: String = line.chars().take(4).collect();
    Some(format!("{}/{}/{}", base_url.trim_end_matches('/'), year, line))
}

pub fn filter_crash_links(input: &Path, out: &Path) -> Result<FilterSummary, StageError> {
    let lines = read_lines(input)?;
    let total = lines.len();
    let kept: Vec<String> = lines.into_iter().filter(|l| is_crash_link(l)).collect();
    write_lines(out, &kept, WriteMode::Overwrite)?;

    let summary = FilterSummary {
        kept: kept.len(),
        dropped: total - kept.len(),
    };
    info!(kept = summary.kept, dropped = summary.dropped, out = %out.display(), "filtered links");
    Ok(summary)
}

pub fn repair_urls(base_url: &str, input: &Path, out: &Path) -> Result<usize, StageError> {
    let urls: Vec<String> = read_lines(input)?
        .iter()
        .filter_map(|l| {
            let url = repair_url(base_url, l);
            if url.is_none() {
                debug!(line = %l, "dropping short link");
            }
            url
        })
        .collect();
    write_lines(out, &urls, WriteMode::Overwrite)?;
    info!(count = urls.len(), out = %out.display(), "wrote absolute crash-page URLs");
    Ok(urls.len())
}

// ── Line files ──

pub fn read_lines(path: &Path) -> Result<Vec<String>, StageError> {
    let reader = BufReader::new(open_input(path)?);
    let mut lines = Vec::new();
    for line in reader.lines() {
        lines.push(line?);
    }
    Ok(lines)
}

fn write_lines(path: &Path, lines: &[String], mode: WriteMode) -> Result<(), StageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = match mode {
        WriteMode::Overwrite => OpenOptions::new().write(true).create(true).truncate(true).open(path)?,
        WriteMode::Append => OpenOptions::new().append(true).create(true).open(path)?,
    };
    let mut writer = BufWriter::new(file);
    for line in lines {
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    Ok(())
}
