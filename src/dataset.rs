use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{open_input, StageError};

/// One scrubbed crash, serialized as a row of the scrubbed CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashRecord {
    #[serde(rename = "UniqueID")]
    pub id: String,
    #[serde(rename = "DateTime", with = "datetime_column")]
    pub datetime: Option<NaiveDateTime>,
    #[serde(rename = "Location_Cleaned")]
    pub location: String,
    #[serde(rename = "Operator_Cleaned")]
    pub operator: String,
    #[serde(rename = "Flight #")]
    pub flight_number: String,
    #[serde(rename = "Route")]
    pub route: String,
    #[serde(rename = "Aircraft Type")]
    pub aircraft_type: String,
    #[serde(rename = "Registration")]
    pub registration: String,
    #[serde(rename = "Total_Aboard")]
    pub total_aboard: u32,
    #[serde(rename = "Passengers_Aboard")]
    pub passengers_aboard: u32,
    #[serde(rename = "Crew_Aboard")]
    pub crew_aboard: u32,
    #[serde(rename = "Total_Fatalities")]
    pub total_fatalities: u32,
    #[serde(rename = "Passengers_Fatalities")]
    pub passengers_fatalities: u32,
    #[serde(rename = "Crew_Fatalities")]
    pub crew_fatalities: u32,
    #[serde(rename = "Ground_Fatalities")]
    pub ground_fatalities: Option<u32>,
    #[serde(rename = "Summary")]
    pub summary: String,
}

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Scrubbed CSV header, in field order of `CrashRecord`.
pub const COLUMNS: [&str; 16] = [
    "UniqueID",
    "DateTime",
    "Location_Cleaned",
    "Operator_Cleaned",
    "Flight #",
    "Route",
    "Aircraft Type",
    "Registration",
    "Total_Aboard",
    "Passengers_Aboard",
    "Crew_Aboard",
    "Total_Fatalities",
    "Passengers_Fatalities",
    "Crew_Fatalities",
    "Ground_Fatalities",
    "Summary",
];

/// `DateTime` column: `YYYY-MM-DD HH:MM:SS`, empty when unknown.
mod datetime_column {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::DATETIME_FORMAT;

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => serializer.serialize_str(&dt.format(DATETIME_FORMAT).to_string()),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).ok()))
    }
}

/// Replace `path` with `records`, header included even when there are none.
pub fn write_records(path: &Path, records: &[CrashRecord]) -> Result<(), StageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_path(path)?;
    if records.is_empty() {
        writer.write_record(COLUMNS)?;
    }
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_records(path: &Path) -> Result<Vec<CrashRecord>, StageError> {
    let mut reader = csv::Reader::from_reader(open_input(path)?);
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample(datetime: Option<NaiveDateTime>) -> CrashRecord {
        CrashRecord {
            id: "abc".into(),
            datetime,
            location: "Moscow, Russia".into(),
            operator: "Aeroflot".into(),
            flight_number: "Unknown".into(),
            route: "Moscow - Kiev".into(),
            aircraft_type: "Tupolev TU-124V".into(),
            registration: "CCCP-45083".into(),
            total_aboard: 61,
            passengers_aboard: 57,
            crew_aboard: 4,
            total_fatalities: 61,
            passengers_fatalities: 57,
            crew_fatalities: 4,
            ground_fatalities: None,
            summary: "Crashed shortly after takeoff, \"in fog\".".into(),
        }
    }

    #[test]
    fn header_and_datetime_column_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scrubbed.csv");
        let dt = NaiveDate::from_ymd_opt(1976, 1, 3)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap();
        write_records(&path, &[sample(Some(dt)), sample(None)]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "UniqueID,DateTime,Location_Cleaned,Operator_Cleaned,Flight #,Route,Aircraft Type,\
             Registration,Total_Aboard,Passengers_Aboard,Crew_Aboard,Total_Fatalities,\
             Passengers_Fatalities,Crew_Fatalities,Ground_Fatalities,Summary"
        );
        assert!(lines.next().unwrap().starts_with("abc,1976-01-03 06:00:00,"));
        assert!(lines.next().unwrap().starts_with("abc,,"));

        let back = read_records(&path).unwrap();
        assert_eq!(back, vec![sample(Some(dt)), sample(None)]);
    }

    #[test]
    fn empty_dataset_still_gets_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scrubbed.csv");
        write_records(&path, &[]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, format!("{}\n", COLUMNS.join(",")));
        assert!(read_records(&path).unwrap().is_empty());
    }

    #[test]
    fn serialized_header_matches_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scrubbed.csv");
        write_records(&path, &[sample(None)]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().next().unwrap(), COLUMNS.join(","));
    }

    #[test]
    fn read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_records(&dir.path().join("none.csv")),
            Err(StageError::MissingFile(_))
        ));
    }
}
