pub mod fields;

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, info};

use crate::config::RawLayout;
use crate::dataset::{self, CrashRecord};
use crate::error::{open_input, StageError};
use crate::table::RAW_COLUMNS;
use fields::Counts;

/// Diagnostics from one scrub run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScrubSummary {
    pub records: usize,
    pub null_datetimes: usize,
    pub duplicate_datetimes: usize,
    pub aboard_with_unknowns: usize,
    pub unmatched_aboard: usize,
    pub unmatched_fatalities: usize,
}

/// One raw row with the canonical column names attached.
struct RawFields {
    date: String,
    time: String,
    location: String,
    operator: String,
    flight_number: String,
    route: String,
    aircraft_type: String,
    registration: String,
    aboard: String,
    fatalities: String,
    ground: String,
    summary: String,
}

impl RawFields {
    /// Short rows are padded with empty cells; extra cells are ignored.
    fn from_row(mut row: Vec<String>) -> Self {
        row.resize(RAW_COLUMNS.len(), String::new());
        let mut cells = row.into_iter();
        let mut next = || cells.next().unwrap_or_default();
        let date = next();
        let time = next();
        let location = next();
        let operator = next();
        let flight_number = next();
        let route = next();
        let aircraft_type = next();
        let registration = next();
        let _cn_ln = next();
        RawFields {
            date,
            time,
            location,
            operator,
            flight_number,
            route,
            aircraft_type,
            registration,
            aboard: next(),
            fatalities: next(),
            ground: next(),
            summary: next(),
        }
    }
}

/// Pick the data rows out of a raw accumulation (header line already removed).
///
/// Interleaved tables alternate label and data rows, so only odd indices are
/// kept, and then the first of those is dropped as well. `n` pages yield `n - 1`
/// records. Existing accumulations depend on this exact alternation.
pub fn select_rows(rows: Vec<Vec<String>>, layout: RawLayout) -> Vec<Vec<String>> {
    match layout {
        RawLayout::Interleaved => rows.into_iter().skip(1).step_by(2).skip(1).collect(),
        RawLayout::Records => rows,
    }
}

fn scrub_row(raw: RawFields, summary: &mut ScrubSummary) -> CrashRecord {
    let time = fields::normalize_time(&raw.time);
    let datetime = fields::parse_datetime(&raw.date, &time);
    let id = fields::content_hash(datetime.as_ref(), &raw.location);

    let aboard = fields::parse_counts(&raw.aboard).unwrap_or_else(|| {
        summary.unmatched_aboard += 1;
        Counts::default()
    });
    let fatalities = fields::parse_counts(&raw.fatalities).unwrap_or_else(|| {
        summary.unmatched_fatalities += 1;
        Counts::default()
    });
    if raw.aboard.contains('?') {
        summary.aboard_with_unknowns += 1;
    }

    CrashRecord {
        id,
        datetime,
        location: fields::clean_location(&raw.location),
        operator: fields::clean_operator(&raw.operator),
        flight_number: fields::unknown_if_missing(&raw.flight_number),
        route: fields::unknown_if_missing(&raw.route),
        aircraft_type: fields::unknown_if_missing(&raw.aircraft_type),
        registration: fields::unknown_if_missing(&raw.registration),
        total_aboard: aboard.total(),
        passengers_aboard: aboard.passengers,
        crew_aboard: aboard.crew,
        total_fatalities: fatalities.total(),
        passengers_fatalities: fatalities.passengers,
        crew_fatalities: fatalities.crew,
        ground_fatalities: fields::parse_ground(&raw.ground),
        summary: raw.summary,
    }
}

/// Turn raw rows into canonical records. Nothing is dropped for bad content:
/// unparseable dates become `None` and unmatched counts become zero.
pub fn scrub_rows(rows: Vec<Vec<String>>, layout: RawLayout) -> (Vec<CrashRecord>, ScrubSummary) {
    let mut summary = ScrubSummary::default();
    let records: Vec<CrashRecord> = select_rows(rows, layout)
        .into_iter()
        .map(|row| scrub_row(RawFields::from_row(row), &mut summary))
        .collect();

    let mut seen = HashSet::new();
    for record in &records {
        if record.datetime.is_none() {
            summary.null_datetimes += 1;
        }
        if !seen.insert(record.datetime) {
            summary.duplicate_datetimes += 1;
        }
    }
    summary.records = records.len();
    (records, summary)
}

/// Rows of a raw table, without its header line.
pub fn read_raw_rows(input: &Path) -> Result<Vec<Vec<String>>, StageError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(open_input(input)?);
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// Full rebuild of the scrubbed table from the raw accumulation. A missing
/// input leaves any previous output untouched.
pub fn scrub_file(input: &Path, output: &Path, layout: RawLayout) -> Result<ScrubSummary, StageError> {
    let rows = read_raw_rows(input)?;
    debug!(rows = rows.len(), ?layout, "read raw table");

    let (records, summary) = scrub_rows(rows, layout);
    dataset::write_records(output, &records)?;

    info!(
        records = summary.records,
        null_datetimes = summary.null_datetimes,
        duplicate_datetimes = summary.duplicate_datetimes,
        aboard_with_unknowns = summary.aboard_with_unknowns,
        unmatched_aboard = summary.unmatched_aboard,
        unmatched_fatalities = summary.unmatched_fatalities,
        out = %output.display(),
        "scrubbed crash records"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{append_raw_rows, parse_table};

    fn labels() -> Vec<String> {
        RAW_COLUMNS.iter().map(|c| format!("{}:", c)).collect()
    }

    fn page(date: &str, time: &str, location: &str, aboard: &str) -> Vec<String> {
        vec![
            date.into(),
            time.into(),
            location.into(),
            "?".into(),
            "?".into(),
            "Beirut - Dubai".into(),
            "?".into(),
            "OD-AFT".into(),
            "18017/207".into(),
            aboard.into(),
            "5 (passengers:3 crew:2)".into(),
            "0".into(),
            "Crashed on landing.".into(),
        ]
    }

    fn interleave(pages: &[Vec<String>]) -> Vec<Vec<String>> {
        pages.iter().flat_map(|p| [labels(), p.clone()]).collect()
    }

    #[test]
    fn odd_row_selection_boundaries() {
        let rows = |n: usize| -> Vec<Vec<String>> {
            (0..n)
                .flat_map(|i| [vec![format!("label{}", i)], vec![format!("data{}", i)]])
                .collect()
        };
        assert!(select_rows(rows(0), RawLayout::Interleaved).is_empty());
        assert!(select_rows(rows(1), RawLayout::Interleaved).is_empty());
        assert_eq!(
            select_rows(rows(2), RawLayout::Interleaved),
            vec![vec!["data1".to_string()]]
        );
        assert_eq!(
            select_rows(rows(4), RawLayout::Interleaved),
            vec![vec!["data1".to_string()], vec!["data2".to_string()], vec!["data3".to_string()]]
        );
        // trailing label row from a half-written page contributes nothing
        let mut odd = rows(3);
        odd.push(vec!["label3".into()]);
        assert_eq!(select_rows(odd, RawLayout::Interleaved).len(), 2);
    }

    #[test]
    fn records_layout_keeps_every_row() {
        let rows = vec![page("1985-01-01", "0600", "A", "1 (passengers:1 crew:0)"); 3];
        assert_eq!(select_rows(rows, RawLayout::Records).len(), 3);
    }

    #[test]
    fn two_pages_yield_one_record() {
        let rows = interleave(&[
            page("1985-01-01", "0600", "Near Nowhere", "?"),
            page("1985-01-01", "0600", "Near Moscow, Russia", "110 (passengers:100 crew:10)"),
        ]);
        let (records, summary) = scrub_rows(rows, RawLayout::Interleaved);
        assert_eq!(records.len(), 1);
        assert_eq!(summary.records, 1);

        let r = &records[0];
        assert_eq!(r.total_aboard, 110);
        assert_eq!(r.passengers_aboard, 100);
        assert_eq!(r.crew_aboard, 10);
        assert_eq!(r.total_fatalities, 5);
        assert_eq!(r.location, "Moscow, Russia");
        assert_eq!(r.operator, "Unknown Operator");
        assert_eq!(r.flight_number, "Unknown");
        assert_eq!(r.aircraft_type, "Unknown");
        assert_eq!(r.registration, "OD-AFT");
        assert_eq!(r.ground_fatalities, Some(0));
        assert_eq!(
            r.id,
            fields::content_hash(r.datetime.as_ref(), "Near Moscow, Russia")
        );
        assert_eq!(
            r.datetime.map(|d| d.format(dataset::DATETIME_FORMAT).to_string()).as_deref(),
            Some("1985-01-01 06:00:00")
        );
    }

    #[test]
    fn bad_values_are_defaulted_not_dropped() {
        let rows = vec![
            page("someday", "?", "X", "?"),
            page("1985-01-01", "630", "Y", "garbled"),
        ];
        let (records, summary) = scrub_rows(rows, RawLayout::Records);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].datetime, None);
        assert_eq!(records[0].total_aboard, 0);
        assert_eq!(records[0].passengers_aboard, 0);
        assert_eq!(
            records[1].datetime.map(|d| d.format("%H:%M").to_string()).as_deref(),
            Some("06:30")
        );
        assert_eq!(summary.null_datetimes, 1);
        assert_eq!(summary.unmatched_aboard, 2);
        assert_eq!(summary.aboard_with_unknowns, 1);
        assert_eq!(summary.unmatched_fatalities, 0);
    }

    #[test]
    fn short_rows_are_padded() {
        let rows = vec![vec!["1985-01-01".to_string(), "0600".to_string()]];
        let (records, _) = scrub_rows(rows, RawLayout::Records);
        assert_eq!(records.len(), 1);
        assert!(records[0].datetime.is_some());
        assert_eq!(records[0].summary, "");
        assert_eq!(records[0].ground_fatalities, None);
    }

    #[test]
    fn duplicate_datetimes_are_counted() {
        let rows = vec![
            page("1985-01-01", "0600", "A", "?"),
            page("1985-01-01", "0600", "B", "?"),
            page("1985-01-02", "0600", "C", "?"),
        ];
        let (records, summary) = scrub_rows(rows, RawLayout::Records);
        assert_eq!(summary.duplicate_datetimes, 1);
        assert_ne!(records[0].id, records[1].id);
    }

    #[test]
    fn scrub_file_from_extracted_fixture_pages() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.csv");
        let out = dir.path().join("scrubbed.csv");

        let html = std::fs::read_to_string("tests/fixtures/crash_1976_1.htm").unwrap();
        let rows = parse_table(&html).unwrap();
        append_raw_rows(&raw, &rows, RawLayout::Interleaved).unwrap();
        append_raw_rows(&raw, &rows, RawLayout::Interleaved).unwrap();

        let summary = scrub_file(&raw, &out, RawLayout::Interleaved).unwrap();
        assert_eq!(summary.records, 1);

        let records = dataset::read_records(&out).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.location, "Al Qaysumah, Saudi Arabia");
        assert_eq!(r.operator, "Middle East Airlines");
        assert_eq!(r.flight_number, "438");
        assert_eq!(r.total_aboard, 81);
        assert_eq!(r.passengers_fatalities, 66);
        assert_eq!(r.crew_fatalities, 15);
        assert_eq!(
            r.datetime.map(|d| d.format(dataset::DATETIME_FORMAT).to_string()).as_deref(),
            Some("1976-01-01 05:30:00")
        );
    }

    #[test]
    fn single_interleaved_page_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.csv");
        let out = dir.path().join("scrubbed.csv");

        let html = std::fs::read_to_string("tests/fixtures/crash_1976_1.htm").unwrap();
        let rows = parse_table(&html).unwrap();
        append_raw_rows(&raw, &rows, RawLayout::Interleaved).unwrap();

        let summary = scrub_file(&raw, &out, RawLayout::Interleaved).unwrap();
        assert_eq!(summary.records, 0);
        let text = std::fs::read_to_string(&out).unwrap();
        assert_eq!(text, format!("{}\n", dataset::COLUMNS.join(",")));
    }

    #[test]
    fn missing_raw_table_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("scrubbed.csv");
        let err = scrub_file(&dir.path().join("raw.csv"), &out, RawLayout::Interleaved).unwrap_err();
        assert!(matches!(err, StageError::MissingFile(_)));
        assert!(!out.exists());
    }

    #[test]
    fn rerun_replaces_output() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.csv");
        let out = dir.path().join("scrubbed.csv");
        std::fs::write(&out, "stale\n").unwrap();

        let rows = vec![page("1985-01-01", "0600", "A", "?")];
        let mut writer = csv::Writer::from_path(&raw).unwrap();
        writer.write_record(RAW_COLUMNS).unwrap();
        for row in &rows {
            writer.write_record(row).unwrap();
        }
        writer.flush().unwrap();

        scrub_file(&raw, &out, RawLayout::Records).unwrap();
        let text = std::fs::read_to_string(&out).unwrap();
        assert!(text.starts_with("UniqueID,"));
        assert!(!text.contains("stale"));
    }
}
