pub mod category;
pub mod render;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::Datelike;
use serde::Serialize;

use crate::dataset::CrashRecord;
use category::{categorize, CrashCategory};

const TOP_N: usize = 10;
const HISTOGRAM_BINS: usize = 20;
const SMOOTHING_WINDOW: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranked {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorstCrash {
    pub datetime: Option<String>,
    pub location: String,
    pub fatalities: u32,
    pub summary: String,
}

/// Descriptive statistics over a scrubbed dataset.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub records: usize,
    pub undated: usize,
    pub crashes_per_year: BTreeMap<i32, usize>,
    pub fatalities_per_year: BTreeMap<i32, u64>,
    pub top_locations: Vec<Ranked>,
    pub top_operators: Vec<Ranked>,
    pub survival_histogram: Vec<HistogramBin>,
    pub worst_crashes: Vec<WorstCrash>,
    pub category_counts: BTreeMap<CrashCategory, usize>,
    /// Rolling mean (three year rows, at least one observation) of crashes per category.
    pub categories_by_year_smoothed: BTreeMap<i32, BTreeMap<CrashCategory, f64>>,
}

pub fn build(records: &[CrashRecord]) -> Report {
    let mut crashes_per_year = BTreeMap::new();
    let mut fatalities_per_year = BTreeMap::new();
    let mut category_counts = BTreeMap::new();
    let mut category_years: BTreeMap<i32, BTreeMap<CrashCategory, usize>> = BTreeMap::new();

    for record in records {
        let category = categorize(&record.summary);
        *category_counts.entry(category).or_insert(0) += 1;

        if let Some(year) = record.datetime.map(|dt| dt.year()) {
            *crashes_per_year.entry(year).or_insert(0) += 1;
            *fatalities_per_year.entry(year).or_insert(0u64) += u64::from(record.total_fatalities);
            *category_years
                .entry(year)
                .or_default()
                .entry(category)
                .or_insert(0) += 1;
        }
    }

    let rates: Vec<f64> = records.iter().map(survival_rate).collect();

    Report {
        records: records.len(),
        undated: records.iter().filter(|r| r.datetime.is_none()).count(),
        crashes_per_year,
        fatalities_per_year,
        top_locations: top_values(records.iter().map(|r| r.location.as_str()), TOP_N),
        top_operators: top_values(records.iter().map(|r| r.operator.as_str()), TOP_N),
        survival_histogram: histogram(&rates, HISTOGRAM_BINS),
        worst_crashes: worst_crashes(records, TOP_N),
        category_counts,
        categories_by_year_smoothed: smooth_by_year(&category_years, SMOOTHING_WINDOW),
    }
}

/// Percentage of people aboard who survived; zero when nobody is recorded aboard.
pub fn survival_rate(record: &CrashRecord) -> f64 {
    if record.total_aboard == 0 {
        return 0.0;
    }
    (1.0 - f64::from(record.total_fatalities) / f64::from(record.total_aboard)) * 100.0
}

/// Most frequent values, count descending then name ascending.
pub fn top_values<'a>(values: impl Iterator<Item = &'a str>, n: usize) -> Vec<Ranked> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    let mut ranked: Vec<Ranked> = counts
        .into_iter()
        .map(|(name, count)| Ranked {
            name: name.to_string(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    ranked.truncate(n);
    ranked
}

/// Equal-width bins over `[min, max]`; the last bin includes `max`.
pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }
    let mut lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let mut hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / bins as f64;

    let mut counts = vec![0usize; bins];
    for v in values {
        let idx = (((v - lo) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            start: lo + width * i as f64,
            end: lo + width * (i + 1) as f64,
            count,
        })
        .collect()
}

/// Deadliest crashes first; ties keep dataset order.
pub fn worst_crashes(records: &[CrashRecord], n: usize) -> Vec<WorstCrash> {
    let mut sorted: Vec<&CrashRecord> = records.iter().collect();
    sorted.sort_by(|a, b| b.total_fatalities.cmp(&a.total_fatalities));
    sorted
        .into_iter()
        .take(n)
        .map(|r| WorstCrash {
            datetime: r
                .datetime
                .map(|dt| dt.format(crate::dataset::DATETIME_FORMAT).to_string()),
            location: r.location.clone(),
            fatalities: r.total_fatalities,
            summary: r.summary.clone(),
        })
        .collect()
}

/// Rolling mean over consecutive year rows. A category absent in a year is a
/// missing observation rather than zero; windows with no observations are omitted.
fn smooth_by_year(
    counts: &BTreeMap<i32, BTreeMap<CrashCategory, usize>>,
    window: usize,
) -> BTreeMap<i32, BTreeMap<CrashCategory, f64>> {
    let years: Vec<i32> = counts.keys().copied().collect();
    let mut categories: Vec<CrashCategory> = counts.values().flat_map(|m| m.keys().copied()).collect();
    categories.sort();
    categories.dedup();

    let mut smoothed = BTreeMap::new();
    for (i, year) in years.iter().enumerate() {
        let start = (i + 1).saturating_sub(window);
        let mut row = BTreeMap::new();
        for category in &categories {
            let observed: Vec<usize> = years[start..=i]
                .iter()
                .filter_map(|y| counts[y].get(category).copied())
                .collect();
            if !observed.is_empty() {
                let mean = observed.iter().sum::<usize>() as f64 / observed.len() as f64;
                row.insert(*category, mean);
            }
        }
        smoothed.insert(*year, row);
    }
    smoothed
}

pub fn write_json(path: &Path, report: &Report) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    Ok(())
}
