//! Tabular Store: district and taluka groundwater statistics.
//!
//! Both spreadsheets carry several banner/header rows above the data, so
//! columns are named from a fixed list instead of the sheet's own headers.
//! The list is truncated to the number of columns actually present. Rows
//! without a primary key (DISTRICT, or TALUK for the taluka sheet) are
//! dropped at load time.
//!
//! A file that cannot be read leaves its table empty. Callers treat an empty
//! table as "no tabular data", never as an error.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::TablesConfig;
use crate::spreadsheet::{self, Sheet};

pub use crate::spreadsheet::CellValue;

const DISTRICT_COLUMNS: [&str; 20] = [
    "S.No",
    "STATE",
    "DISTRICT",
    "Rainfall_C",
    "Rainfall_NC",
    "Rainfall_PQ",
    "Rainfall_Total",
    "Total_Geographical_Area",
    "Recharge_Worthy_Area_C",
    "Recharge_Worthy_Area_NC",
    "Recharge_Worthy_Area_PQ",
    "Recharge_Worthy_Area_Total",
    "Col12",
    "Col13",
    "Col14",
    "Col15",
    "Col16",
    "Col17",
    "Col18",
    "Col19",
];

const TALUKA_COLUMNS: [&str; 21] = [
    "S.No",
    "STATE",
    "DISTRICT",
    "TALUK",
    "Rainfall_C",
    "Rainfall_NC",
    "Rainfall_PQ",
    "Rainfall_Total",
    "Total_Geographical_Area",
    "Recharge_Worthy_Area_C",
    "Recharge_Worthy_Area_NC",
    "Recharge_Worthy_Area_PQ",
    "Recharge_Worthy_Area_Total",
    "Col13",
    "Col14",
    "Col15",
    "Col16",
    "Col17",
    "Col18",
    "Col19",
    "Col20",
];

/// Which of the two sheet layouts a file follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableSchema {
    District,
    Taluka,
}

impl TableSchema {
    /// Zero-based index of the first data row.
    pub fn data_start_row(self) -> usize {
        match self {
            TableSchema::District => 9,
            TableSchema::Taluka => 8,
        }
    }

    pub fn columns(self) -> &'static [&'static str] {
        match self {
            TableSchema::District => &DISTRICT_COLUMNS,
            TableSchema::Taluka => &TALUKA_COLUMNS,
        }
    }

    /// Number of leading columns with a fixed meaning; the rest are `extra`.
    fn named_columns(self) -> usize {
        match self {
            TableSchema::District => 12,
            TableSchema::Taluka => 13,
        }
    }

    fn primary_key(self) -> &'static str {
        match self {
            TableSchema::District => "DISTRICT",
            TableSchema::Taluka => "TALUK",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TableSchema::District => "District",
            TableSchema::Taluka => "Taluka",
        }
    }

    fn columns_for_width(self, width: usize) -> Vec<&'static str> {
        let all = self.columns();
        all[..width.min(all.len())].to_vec()
    }
}

/// Rainfall (mm) and area (ha) figures shared by both schemas.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Measurements {
    #[serde(rename = "Rainfall_C")]
    pub rainfall_c: CellValue,
    #[serde(rename = "Rainfall_NC")]
    pub rainfall_nc: CellValue,
    #[serde(rename = "Rainfall_PQ")]
    pub rainfall_pq: CellValue,
    #[serde(rename = "Rainfall_Total")]
    pub rainfall_total: CellValue,
    #[serde(rename = "Total_Geographical_Area")]
    pub total_geographical_area: CellValue,
    #[serde(rename = "Recharge_Worthy_Area_C")]
    pub recharge_worthy_area_c: CellValue,
    #[serde(rename = "Recharge_Worthy_Area_NC")]
    pub recharge_worthy_area_nc: CellValue,
    #[serde(rename = "Recharge_Worthy_Area_PQ")]
    pub recharge_worthy_area_pq: CellValue,
    #[serde(rename = "Recharge_Worthy_Area_Total")]
    pub recharge_worthy_area_total: CellValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistrictRecord {
    #[serde(rename = "S.No")]
    pub s_no: CellValue,
    #[serde(rename = "STATE")]
    pub state: CellValue,
    #[serde(rename = "DISTRICT")]
    pub district: String,
    #[serde(flatten)]
    pub measurements: Measurements,
    /// Trailing unnamed columns (`Col12`..`Col19`).
    #[serde(flatten)]
    pub extra: BTreeMap<String, CellValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TalukaRecord {
    #[serde(rename = "S.No")]
    pub s_no: CellValue,
    #[serde(rename = "STATE")]
    pub state: CellValue,
    #[serde(rename = "DISTRICT")]
    pub district: CellValue,
    #[serde(rename = "TALUK")]
    pub taluk: String,
    #[serde(flatten)]
    pub measurements: Measurements,
    /// Trailing unnamed columns (`Col13`..`Col20`).
    #[serde(flatten)]
    pub extra: BTreeMap<String, CellValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    District(DistrictRecord),
    Taluka(TalukaRecord),
}

/// One sheet row with the schema's column names attached.
struct NamedRow<'a> {
    cells: &'a [CellValue],
    columns: &'a [&'static str],
}

impl NamedRow<'_> {
    fn get(&self, name: &str) -> CellValue {
        self.columns
            .iter()
            .position(|c| *c == name)
            .and_then(|i| self.cells.get(i))
            .cloned()
            .unwrap_or_default()
    }

    fn key(&self, name: &str) -> Option<String> {
        self.get(name)
            .display()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn measurements(&self) -> Measurements {
        Measurements {
            rainfall_c: self.get("Rainfall_C"),
            rainfall_nc: self.get("Rainfall_NC"),
            rainfall_pq: self.get("Rainfall_PQ"),
            rainfall_total: self.get("Rainfall_Total"),
            total_geographical_area: self.get("Total_Geographical_Area"),
            recharge_worthy_area_c: self.get("Recharge_Worthy_Area_C"),
            recharge_worthy_area_nc: self.get("Recharge_Worthy_Area_NC"),
            recharge_worthy_area_pq: self.get("Recharge_Worthy_Area_PQ"),
            recharge_worthy_area_total: self.get("Recharge_Worthy_Area_Total"),
        }
    }

    fn extra(&self, schema: TableSchema) -> BTreeMap<String, CellValue> {
        self.columns
            .iter()
            .enumerate()
            .skip(schema.named_columns())
            .map(|(i, name)| {
                let value = self.cells.get(i).cloned().unwrap_or_default();
                (name.to_string(), value)
            })
            .collect()
    }

    fn into_record(self, schema: TableSchema) -> Option<Record> {
        let key = self.key(schema.primary_key())?;
        let record = match schema {
            TableSchema::District => Record::District(DistrictRecord {
                s_no: self.get("S.No"),
                state: self.get("STATE"),
                district: key,
                measurements: self.measurements(),
                extra: self.extra(schema),
            }),
            TableSchema::Taluka => Record::Taluka(TalukaRecord {
                s_no: self.get("S.No"),
                state: self.get("STATE"),
                district: self.get("DISTRICT"),
                taluk: key,
                measurements: self.measurements(),
                extra: self.extra(schema),
            }),
        };
        Some(record)
    }
}

/// Turn a parsed sheet into records, skipping banner rows and rows without a key.
pub fn parse_records(sheet: &Sheet, schema: TableSchema) -> Vec<Record> {
    let columns = schema.columns_for_width(sheet.width());
    sheet
        .rows()
        .skip(schema.data_start_row())
        .filter_map(|cells| {
            NamedRow {
                cells,
                columns: &columns,
            }
            .into_record(schema)
        })
        .collect()
}

/// Load one table with the column names it actually has.
/// Unreadable or malformed files yield an empty table.
fn load_table(path: &Path, schema: TableSchema) -> (Vec<&'static str>, Vec<Record>) {
    match spreadsheet::read_workbook(path) {
        Ok(sheet) => {
            let records = parse_records(&sheet, schema);
            info!(
                table = schema.label(),
                path = %path.display(),
                rows = records.len(),
                "loaded table"
            );
            (schema.columns_for_width(sheet.width()), records)
        }
        Err(e) => {
            warn!(
                table = schema.label(),
                path = %path.display(),
                error = %e,
                "could not load table; continuing without it"
            );
            (Vec::new(), Vec::new())
        }
    }
}

/// Rows matched for a question, with display labels for each location.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableMatches {
    pub district_data: Vec<DistrictRecord>,
    pub taluka_data: Vec<TalukaRecord>,
    pub found_locations: Vec<String>,
    pub has_location_data: bool,
}

impl TableMatches {
    pub fn is_empty(&self) -> bool {
        self.district_data.is_empty() && self.taluka_data.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSummary {
    pub columns: Vec<String>,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TablesSummary {
    pub district_data: TableSummary,
    pub taluka_data: TableSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SampleLocations {
    pub talukas: Vec<String>,
    pub districts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationSearch {
    pub location: String,
    pub found: bool,
    pub data: TableMatches,
}

/// Both tables, loaded once and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct TabularStore {
    districts: Vec<DistrictRecord>,
    talukas: Vec<TalukaRecord>,
    district_columns: Vec<&'static str>,
    taluka_columns: Vec<&'static str>,
}

impl TabularStore {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a store from already-typed records, assuming full-width sheets.
    pub fn from_records(districts: Vec<DistrictRecord>, talukas: Vec<TalukaRecord>) -> Self {
        Self {
            district_columns: TableSchema::District.columns().to_vec(),
            taluka_columns: TableSchema::Taluka.columns().to_vec(),
            districts,
            talukas,
        }
    }

    pub fn load(config: &TablesConfig) -> Self {
        let mut store = Self::empty();

        if let Some(path) = &config.district_path {
            let (columns, records) = load_table(path, TableSchema::District);
            store.district_columns = columns;
            store.districts = records
                .into_iter()
                .filter_map(|r| match r {
                    Record::District(d) => Some(d),
                    Record::Taluka(_) => None,
                })
                .collect();
        }
        if let Some(path) = &config.taluka_path {
            let (columns, records) = load_table(path, TableSchema::Taluka);
            store.taluka_columns = columns;
            store.talukas = records
                .into_iter()
                .filter_map(|r| match r {
                    Record::Taluka(t) => Some(t),
                    Record::District(_) => None,
                })
                .collect();
        }

        store
    }

    pub fn districts(&self) -> &[DistrictRecord] {
        &self.districts
    }

    pub fn talukas(&self) -> &[TalukaRecord] {
        &self.talukas
    }

    pub fn is_empty(&self) -> bool {
        self.districts.is_empty() && self.talukas.is_empty()
    }

    /// District rows whose DISTRICT contains any query token, in table order.
    pub fn find_districts(&self, query: &str, limit: usize) -> Vec<&DistrictRecord> {
        let tokens = query_tokens(query);
        if tokens.is_empty() {
            return Vec::new();
        }
        self.districts
            .iter()
            .filter(|d| contains_any(&d.district, &tokens))
            .take(limit)
            .collect()
    }

    /// Taluka rows whose TALUK or DISTRICT contains any query token, in table order.
    pub fn find_talukas(&self, query: &str, limit: usize) -> Vec<&TalukaRecord> {
        let tokens = query_tokens(query);
        if tokens.is_empty() {
            return Vec::new();
        }
        self.talukas
            .iter()
            .filter(|t| {
                contains_any(&t.taluk, &tokens)
                    || t.district
                        .display()
                        .is_some_and(|d| contains_any(&d, &tokens))
            })
            .take(limit)
            .collect()
    }

    /// Search both tables and merge the hits.
    pub fn search(&self, question: &str, limit: usize) -> TableMatches {
        let taluka_data: Vec<TalukaRecord> = self
            .find_talukas(question, limit)
            .into_iter()
            .cloned()
            .collect();
        let district_data: Vec<DistrictRecord> = self
            .find_districts(question, limit)
            .into_iter()
            .cloned()
            .collect();

        let mut found_locations: Vec<String> = Vec::new();
        let mut note = |label: String| {
            if !found_locations.contains(&label) {
                found_locations.push(label);
            }
        };
        for t in &taluka_data {
            note(format!("{} (Taluka)", t.taluk));
            if let Some(d) = t.district.display() {
                note(format!("{} (District)", d));
            }
        }
        for d in &district_data {
            note(format!("{} (District)", d.district));
        }

        TableMatches {
            has_location_data: !(taluka_data.is_empty() && district_data.is_empty()),
            district_data,
            taluka_data,
            found_locations,
        }
    }

    pub fn search_location(&self, location: &str, limit: usize) -> LocationSearch {
        let data = self.search(location, limit);
        LocationSearch {
            location: location.to_string(),
            found: !data.is_empty(),
            data,
        }
    }

    pub fn summary(&self) -> TablesSummary {
        let table = |columns: &[&'static str], rows: usize| TableSummary {
            columns: if rows == 0 {
                Vec::new()
            } else {
                columns.iter().map(|c| c.to_string()).collect()
            },
            rows,
        };
        TablesSummary {
            district_data: table(&self.district_columns, self.districts.len()),
            taluka_data: table(&self.taluka_columns, self.talukas.len()),
        }
    }

    /// First `n` taluk and district names, for example questions.
    pub fn sample_locations(&self, n: usize) -> SampleLocations {
        SampleLocations {
            talukas: self.talukas.iter().take(n).map(|t| t.taluk.clone()).collect(),
            districts: self
                .districts
                .iter()
                .take(n)
                .map(|d| d.district.clone())
                .collect(),
        }
    }
}

/// Lower-cased whitespace tokens with surrounding punctuation removed.
fn query_tokens(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|t| {
            t.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|t| !t.is_empty())
        .collect()
}

fn contains_any(field: &str, tokens: &[String]) -> bool {
    let field = field.to_lowercase();
    tokens.iter().any(|t| field.contains(t.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn num(n: f64) -> CellValue {
        CellValue::Number(n)
    }

    fn banner(rows: usize) -> Vec<Vec<CellValue>> {
        let mut out = vec![vec![text("Dynamic Ground Water Resources of Gujarat")]];
        out.resize(rows, Vec::new());
        out
    }

    fn taluka_sheet(rows: &[(&str, &str, f64, f64)]) -> Sheet {
        let mut all = banner(8);
        for (i, (district, taluk, rain, area)) in rows.iter().enumerate() {
            let mut row = vec![
                num(i as f64 + 1.0),
                text("GUJARAT"),
                text(district),
                if taluk.is_empty() {
                    CellValue::Missing
                } else {
                    text(taluk)
                },
                num(rain - 100.0),
                num(100.0),
                CellValue::Missing,
                num(*rain),
                num(*area),
            ];
            row.extend((0..4).map(|k| num(area / 2.0 + k as f64)));
            row.push(num(7.5));
            all.push(row);
        }
        Sheet::from_rows(all)
    }

    fn district_sheet(names: &[&str]) -> Sheet {
        let mut all = banner(9);
        for (i, name) in names.iter().enumerate() {
            all.push(vec![
                num(i as f64 + 1.0),
                text("GUJARAT"),
                text(name),
                num(1000.0),
            ]);
        }
        Sheet::from_rows(all)
    }

    fn store() -> TabularStore {
        let talukas = parse_records(
            &taluka_sheet(&[
                ("DANG", "AHWA", 2354.0, 53133.0),
                ("DANG", "SUBIR", 2100.0, 40000.0),
                ("DANG", "WAGHAI", 2200.0, 45000.0),
                ("VALSAD", "KAPRADA", 2500.0, 60000.0),
            ]),
            TableSchema::Taluka,
        );
        let districts = parse_records(&district_sheet(&["DANG", "VALSAD"]), TableSchema::District);
        TabularStore::from_records(
            districts
                .into_iter()
                .filter_map(|r| match r {
                    Record::District(d) => Some(d),
                    _ => None,
                })
                .collect(),
            talukas
                .into_iter()
                .filter_map(|r| match r {
                    Record::Taluka(t) => Some(t),
                    _ => None,
                })
                .collect(),
        )
    }

    #[test]
    fn banner_rows_skipped_and_columns_named() {
        let records = parse_records(
            &taluka_sheet(&[("DANG", "AHWA", 2354.0, 53133.0)]),
            TableSchema::Taluka,
        );
        assert_eq!(records.len(), 1);
        let Record::Taluka(t) = &records[0] else {
            panic!("expected taluka record");
        };
        assert_eq!(t.taluk, "AHWA");
        assert_eq!(t.district, text("DANG"));
        assert_eq!(t.measurements.rainfall_total, num(2354.0));
        assert_eq!(t.measurements.total_geographical_area, num(53133.0));
        assert_eq!(t.measurements.rainfall_pq, CellValue::Missing);
        assert_eq!(t.extra.get("Col13"), Some(&num(7.5)));
        assert_eq!(t.extra.len(), 1);
    }

    #[test]
    fn rows_without_primary_key_dropped() {
        let records = parse_records(
            &taluka_sheet(&[
                ("DANG", "AHWA", 2354.0, 53133.0),
                ("DANG", "", 0.0, 0.0),
                ("DANG", "SUBIR", 2100.0, 40000.0),
            ]),
            TableSchema::Taluka,
        );
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn columns_truncated_to_sheet_width() {
        let sheet = district_sheet(&["DANG"]);
        assert_eq!(
            TableSchema::District.columns_for_width(sheet.width()),
            vec!["S.No", "STATE", "DISTRICT", "Rainfall_C"]
        );
        let records = parse_records(&sheet, TableSchema::District);
        let Record::District(d) = &records[0] else {
            panic!("expected district record");
        };
        assert_eq!(d.measurements.rainfall_c, num(1000.0));
        assert_eq!(d.measurements.rainfall_total, CellValue::Missing);
        assert!(d.extra.is_empty());
    }

    #[test]
    fn question_matches_taluk_substring() {
        let store = store();
        let hits = store.find_talukas("What is the rainfall in AHWA?", 3);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].taluk, "AHWA");
    }

    #[test]
    fn district_column_matches_on_taluka_table() {
        let store = store();
        let hits = store.find_talukas("valsad", 3);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].taluk, "KAPRADA");
    }

    #[test]
    fn find_caps_results_in_table_order() {
        let store = store();
        let hits = store.find_talukas("dang", 3);
        let names: Vec<&str> = hits.iter().map(|t| t.taluk.as_str()).collect();
        assert_eq!(names, vec!["AHWA", "SUBIR", "WAGHAI"]);
        assert_eq!(store.find_talukas("dang", 2).len(), 2);
    }

    #[test]
    fn default_limit_caps_more_than_three_matches() {
        let talukas = parse_records(
            &taluka_sheet(&[
                ("SURAT", "BARDOLI", 1400.0, 22000.0),
                ("SURAT", "CHORASI", 1300.0, 18000.0),
                ("SURAT", "KAMREJ", 1350.0, 21000.0),
                ("SURAT", "MANDVI", 1500.0, 30000.0),
                ("SURAT", "OLPAD", 1100.0, 35000.0),
            ]),
            TableSchema::Taluka,
        )
        .into_iter()
        .filter_map(|r| match r {
            Record::Taluka(t) => Some(t),
            _ => None,
        })
        .collect();
        let store = TabularStore::from_records(Vec::new(), talukas);

        let hits = store.find_talukas("surat", 3);
        let names: Vec<&str> = hits.iter().map(|t| t.taluk.as_str()).collect();
        assert_eq!(names, vec!["BARDOLI", "CHORASI", "KAMREJ"]);
        assert_eq!(store.search("surat", 3).taluka_data.len(), 3);
    }

    #[test]
    fn blank_query_matches_nothing() {
        let store = store();
        assert!(store.find_talukas("   ", 3).is_empty());
        assert!(store.find_districts("?!", 3).is_empty());
    }

    #[test]
    fn search_merges_tables_and_labels_locations() {
        let store = store();
        let matches = store.search("groundwater in ahwa and dang", 3);
        assert!(matches.has_location_data);
        assert_eq!(matches.taluka_data.len(), 3);
        assert_eq!(matches.district_data.len(), 1);
        assert_eq!(
            matches.found_locations,
            vec![
                "AHWA (Taluka)",
                "DANG (District)",
                "SUBIR (Taluka)",
                "WAGHAI (Taluka)"
            ]
        );
    }

    #[test]
    fn search_without_hits() {
        let matches = store().search("how to save water", 3);
        assert!(!matches.has_location_data);
        assert!(matches.found_locations.is_empty());
    }

    #[test]
    fn records_serialize_with_column_names() {
        let store = store();
        let json = serde_json::to_value(&store.talukas()[0]).unwrap();
        assert_eq!(json["TALUK"], "AHWA");
        assert_eq!(json["Rainfall_Total"], 2354.0);
        assert!(json["Rainfall_PQ"].is_null());
        assert_eq!(json["Col13"], 7.5);
    }

    #[test]
    fn summary_and_samples() {
        let store = store();
        let summary = store.summary();
        assert_eq!(summary.taluka_data.rows, 4);
        assert_eq!(summary.taluka_data.columns.len(), 21);
        assert_eq!(summary.district_data.rows, 2);
        let samples = store.sample_locations(2);
        assert_eq!(samples.talukas, vec!["AHWA", "SUBIR"]);
        assert_eq!(samples.districts, vec!["DANG", "VALSAD"]);

        let empty = TabularStore::empty().summary();
        assert!(empty.district_data.columns.is_empty());
        assert_eq!(empty.district_data.rows, 0);
    }

    #[test]
    fn unreadable_file_degrades_to_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("missing.xlsx");
        assert!(load_table(&missing, TableSchema::District).1.is_empty());

        let garbage = dir.path().join("garbage.xlsx");
        std::fs::write(&garbage, b"not a workbook").unwrap();
        let store = TabularStore::load(&TablesConfig {
            district_path: Some(garbage),
            taluka_path: Some(missing),
        });
        assert!(store.is_empty());
    }

    #[test]
    fn location_search_reports_found() {
        let store = store();
        let hit = store.search_location("Subir", 3);
        assert!(hit.found);
        assert_eq!(hit.location, "Subir");
        assert!(!store.search_location("Kutch", 3).found);
    }
}
