use std::fs::OpenOptions;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use crate::config::RawLayout;
use crate::error::StageError;
use crate::http::Fetcher;
use crate::links::read_lines;

static TABLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static ROW_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());

/// Field order of a crash page's table, also the header of a `records` raw table.
pub const RAW_COLUMNS: [&str; 13] = [
    "Date",
    "Time",
    "Location",
    "Operator",
    "Flight #",
    "Route",
    "Aircraft Type",
    "Registration",
    "cn / ln",
    "Aboard",
    "Fatalities",
    "Ground",
    "Summary",
];

#[derive(Debug)]
pub struct ExtractSummary {
    pub total: usize,
    pub ok: usize,
    pub failed: usize,
}

/// First `<table>` of a page, minus its heading row, transposed so that each
/// returned row holds one value per field. `None` when the page has no table.
///
/// Crash pages lay fields out as `<tr><td>Label:</td><td>value</td></tr>`, so
/// the result is normally a label row followed by a value row.
pub fn parse_table(html: &str) -> Option<Vec<Vec<String>>> {
    let document = Html::parse_document(html);
    let table = document.select(&TABLE_SELECTOR).next()?;

    let rows: Vec<Vec<String>> = table
        .select(&ROW_SELECTOR)
        .skip(1)
        .map(|tr| tr.select(&CELL_SELECTOR).map(cell_text).collect())
        .collect();

    Some(transpose(rows))
}

/// Text of a cell with every fragment trimmed and joined back without spaces.
fn cell_text(cell: ElementRef) -> String {
    cell.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Zip-style transpose: the width is the shortest row.
fn transpose(rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let width = rows.iter().map(Vec::len).min().unwrap_or(0);
    (0..width)
        .map(|col| rows.iter().map(|row| row[col].clone()).collect())
        .collect()
}

/// Fetch one crash page and append its record to the raw table at `out`.
pub fn extract_page(
    fetcher: &Fetcher,
    url: &str,
    out: &Path,
    layout: RawLayout,
) -> Result<usize, StageError> {
    let html = fetcher.fetch_html(url, fetcher.page_identity())?;
    let rows = parse_table(&html).ok_or_else(|| StageError::NoTable {
        url: url.to_string(),
    })?;
    if rows.is_empty() {
        return Err(StageError::EmptyTable {
            url: url.to_string(),
        });
    }
    let written = append_raw_rows(out, &rows, layout)?;
    debug!(url, rows = written, "appended page");
    Ok(written)
}

/// Append transposed page rows. The header is written only when `out` does
/// not exist yet.
pub fn append_raw_rows(
    out: &Path,
    rows: &[Vec<String>],
    layout: RawLayout,
) -> Result<usize, StageError> {
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let is_new = !out.exists();
    let file = OpenOptions::new().append(true).create(true).open(out)?;
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(file);

    let data: &[Vec<String>] = match layout {
        RawLayout::Interleaved => rows,
        RawLayout::Records => rows.get(1..).unwrap_or(&[]),
    };

    if is_new {
        match layout {
            RawLayout::Interleaved => {
                let width = rows.first().map(Vec::len).unwrap_or(0);
                writer.write_record((0..width).map(|i| i.to_string()))?;
            }
            RawLayout::Records => writer.write_record(RAW_COLUMNS)?,
        }
    }
    for row in data {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(data.len())
}

/// Extract every URL listed in `urls_file`, pausing `delay` between pages.
/// Bad pages are logged and counted; the loop always runs to the end.
pub fn extract_all(
    fetcher: &Fetcher,
    urls_file: &Path,
    out: &Path,
    layout: RawLayout,
    delay: Duration,
    limit: Option<usize>,
) -> Result<ExtractSummary, StageError> {
    let mut urls: Vec<String> = read_lines(urls_file)?
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();
    if let Some(n) = limit {
        urls.truncate(n);
    }

    let total = urls.len();
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let mut ok = 0usize;
    let mut failed = 0usize;
    for (i, url) in urls.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            std::thread::sleep(delay);
        }
        match extract_page(fetcher, url, out, layout) {
            Ok(_) => ok += 1,
            Err(e) if e.is_skippable() => {
                pb.suspend(|| warn!("Skipping {}: {}", url, e));
                failed += 1;
            }
            Err(e) => {
                pb.suspend(|| warn!("Failed to record {}: {}", url, e));
                failed += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!(total, ok, failed, out = %out.display(), "extracted crash pages");
    Ok(ExtractSummary { total, ok, failed })
}
