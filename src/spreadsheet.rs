//! Minimal `.xlsx` reader.
//!
//! Reads the first worksheet of a workbook into a dense grid of
//! [`CellValue`]s, addressed by zero-based row and column. "First" follows
//! the sheet order in `xl/workbook.xml`, resolved through the workbook
//! relationships; when either part is missing the lowest-numbered
//! `xl/worksheets/sheetN.xml` is used instead. Only what the
//! groundwater tables need is understood: shared strings, inline strings,
//! formula string results, numbers and booleans. Styles, dates and merged
//! ranges are ignored; a merged banner cell shows up in its top-left
//! position only.

use std::io::Read;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use serde::Serialize;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;
/// Rows beyond this are ignored.
const MAX_ROWS: usize = 100_000;
/// Columns beyond this are ignored.
const MAX_COLUMNS: usize = 256;
/// `XFD`, the widest column Excel can address, has three letters.
const MAX_COLUMN_LETTERS: usize = 3;

/// A single spreadsheet value.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Number(f64),
    #[default]
    Missing,
}

impl CellValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }

    /// Display form; integral numbers print without a fractional part.
    pub fn display(&self) -> Option<String> {
        match self {
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Number(n) => Some(format_number(*n)),
            CellValue::Missing => None,
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[derive(Debug)]
pub enum SpreadsheetError {
    Io(String),
    Zip(String),
    Xml(String),
    NoWorksheet,
}

impl std::fmt::Display for SpreadsheetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpreadsheetError::Io(e) => write!(f, "could not read workbook: {}", e),
            SpreadsheetError::Zip(e) => write!(f, "invalid xlsx container: {}", e),
            SpreadsheetError::Xml(e) => write!(f, "invalid worksheet XML: {}", e),
            SpreadsheetError::NoWorksheet => write!(f, "workbook has no worksheets"),
        }
    }
}

impl std::error::Error for SpreadsheetError {}

/// The first worksheet as a rectangular grid.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    rows: Vec<Vec<CellValue>>,
    width: usize,
}

impl Sheet {
    /// Number of rows, including banner rows.
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Widest row in the sheet.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn row(&self, index: usize) -> Option<&[CellValue]> {
        self.rows.get(index).map(|r| r.as_slice())
    }

    pub fn rows(&self) -> impl Iterator<Item = &[CellValue]> {
        self.rows.iter().map(|r| r.as_slice())
    }

    #[cfg(test)]
    pub(crate) fn from_rows(rows: Vec<Vec<CellValue>>) -> Self {
        let mut sheet = Sheet::default();
        for (r, row) in rows.into_iter().enumerate() {
            for (c, value) in row.into_iter().enumerate() {
                sheet.set(r, c, value);
            }
            if sheet.rows.len() <= r {
                sheet.rows.resize_with(r + 1, Vec::new);
            }
        }
        sheet.pad();
        sheet
    }

    fn set(&mut self, row: usize, col: usize, value: CellValue) {
        if row >= MAX_ROWS || col >= MAX_COLUMNS {
            return;
        }
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() <= col {
            cells.resize(col + 1, CellValue::Missing);
        }
        cells[col] = value;
        self.width = self.width.max(col + 1);
    }

    fn pad(&mut self) {
        let width = self.width;
        for row in &mut self.rows {
            row.resize(width, CellValue::Missing);
        }
    }
}

pub fn read_workbook(path: &Path) -> Result<Sheet, SpreadsheetError> {
    let bytes = std::fs::read(path)
        .map_err(|e| SpreadsheetError::Io(format!("{}: {}", path.display(), e)))?;
    read_first_sheet(&bytes)
}

pub fn read_first_sheet(bytes: &[u8]) -> Result<Sheet, SpreadsheetError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| SpreadsheetError::Zip(e.to_string()))?;
    let shared_strings = read_shared_strings(&mut archive)?;
    let sheet_name = match first_sheet_in_workbook(&mut archive) {
        Some(name) => name,
        None => list_worksheet_names(&archive)
            .into_iter()
            .next()
            .ok_or(SpreadsheetError::NoWorksheet)?,
    };
    let xml = read_zip_entry_bounded(&mut archive, &sheet_name)?;
    parse_sheet(&xml, &shared_strings)
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
) -> Result<Vec<u8>, SpreadsheetError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| SpreadsheetError::Zip(e.to_string()))?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| SpreadsheetError::Zip(e.to_string()))?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(SpreadsheetError::Zip(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, MAX_XML_ENTRY_BYTES
        )));
    }
    Ok(out)
}

fn list_worksheet_names(archive: &zip::ZipArchive<std::io::Cursor<&[u8]>>) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches("xl/worksheets/sheet")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

/// Worksheet part of the first `<sheet>` listed in `xl/workbook.xml`.
fn first_sheet_in_workbook(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
) -> Option<String> {
    let has = |archive: &zip::ZipArchive<std::io::Cursor<&[u8]>>, name: &str| {
        archive.file_names().any(|n| n == name)
    };
    if !has(archive, "xl/workbook.xml") || !has(archive, "xl/_rels/workbook.xml.rels") {
        return None;
    }
    let workbook = read_zip_entry_bounded(archive, "xl/workbook.xml").ok()?;
    let rel_id = first_element_attr(&workbook, b"sheet", b"id")?;
    let rels = read_zip_entry_bounded(archive, "xl/_rels/workbook.xml.rels").ok()?;
    let target = relationship_target(&rels, &rel_id)?;
    let name = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    };
    has(archive, &name).then_some(name)
}

/// Attribute `key` (matched on its local name) of the first `element`.
fn first_element_attr(xml: &[u8], element: &[u8], key: &[u8]) -> Option<String> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == element => {
                return local_attr(&e, key);
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}

fn relationship_target(rels: &[u8], id: &str) -> Option<String> {
    let mut reader = quick_xml::Reader::from_reader(rels);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"Relationship"
                    && attr(&e, b"Id").as_deref() == Some(id) =>
            {
                return attr(&e, b"Target");
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}

/// Workbooks without any text cells have no `sharedStrings.xml`.
fn read_shared_strings(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
) -> Result<Vec<String>, SpreadsheetError> {
    if !archive.file_names().any(|n| n == "xl/sharedStrings.xml") {
        return Ok(Vec::new());
    }
    let xml = read_zip_entry_bounded(archive, "xl/sharedStrings.xml")?;
    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_t = current.is_some(),
                _ => {}
            },
            Ok(Event::Text(te)) if in_t => {
                if let Some(s) = current.as_mut() {
                    s.push_str(te.unescape().unwrap_or_default().as_ref());
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"si" => strings.push(current.take().unwrap_or_default()),
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Ok(Event::Eof) => break,
            Err(e) => return Err(SpreadsheetError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

#[derive(Clone, Copy, PartialEq)]
enum CellKind {
    Number,
    SharedString,
    InlineString,
    FormulaString,
    Boolean,
    Error,
}

fn parse_sheet(xml: &[u8], shared_strings: &[String]) -> Result<Sheet, SpreadsheetError> {
    let mut sheet = Sheet::default();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut row_idx: usize = 0;
    let mut next_row: usize = 0;
    let mut col_idx: usize = 0;
    let mut next_col: usize = 0;
    let mut kind = CellKind::Number;
    let mut raw = String::new();
    let mut in_value = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => {
                    row_idx = attr(&e, b"r")
                        .and_then(|r| r.parse::<usize>().ok())
                        .map(|r| r.saturating_sub(1))
                        .unwrap_or(next_row);
                    next_row = row_idx.saturating_add(1);
                    next_col = 0;
                }
                b"c" => {
                    col_idx = attr(&e, b"r")
                        .and_then(|r| column_index(&r))
                        .unwrap_or(next_col);
                    next_col = col_idx.saturating_add(1);
                    kind = match attr(&e, b"t").as_deref() {
                        Some("s") => CellKind::SharedString,
                        Some("inlineStr") => CellKind::InlineString,
                        Some("str") => CellKind::FormulaString,
                        Some("b") => CellKind::Boolean,
                        Some("e") => CellKind::Error,
                        _ => CellKind::Number,
                    };
                    raw.clear();
                }
                b"v" => in_value = true,
                b"t" if kind == CellKind::InlineString => in_value = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"row" => {
                    row_idx = attr(&e, b"r")
                        .and_then(|r| r.parse::<usize>().ok())
                        .map(|r| r.saturating_sub(1))
                        .unwrap_or(next_row);
                    next_row = row_idx.saturating_add(1);
                }
                b"c" => {
                    next_col = attr(&e, b"r")
                        .and_then(|r| column_index(&r))
                        .unwrap_or(next_col)
                        .saturating_add(1);
                }
                _ => {}
            },
            Ok(Event::Text(te)) if in_value => {
                raw.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    let value = cell_value(kind, &raw, shared_strings);
                    if !value.is_missing() {
                        sheet.set(row_idx, col_idx, value);
                    }
                    raw.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(SpreadsheetError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    sheet.pad();
    Ok(sheet)
}

fn cell_value(kind: CellKind, raw: &str, shared_strings: &[String]) -> CellValue {
    let raw = raw.trim();
    let text = |s: &str| {
        if s.trim().is_empty() {
            CellValue::Missing
        } else {
            CellValue::Text(s.trim().to_string())
        }
    };
    match kind {
        CellKind::SharedString => raw
            .parse::<usize>()
            .ok()
            .and_then(|i| shared_strings.get(i))
            .map(|s| text(s))
            .unwrap_or(CellValue::Missing),
        CellKind::InlineString | CellKind::FormulaString => text(raw),
        CellKind::Boolean => match raw {
            "1" => CellValue::Text("TRUE".to_string()),
            "0" => CellValue::Text("FALSE".to_string()),
            _ => CellValue::Missing,
        },
        CellKind::Error => CellValue::Missing,
        CellKind::Number => match raw.parse::<f64>() {
            Ok(n) if n.is_finite() => CellValue::Number(n),
            _ => text(raw),
        },
    }
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

fn local_attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.local_name().as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// `"AB12"` → 27. References wider than `XFD` are rejected.
fn column_index(reference: &str) -> Option<usize> {
    let letters: Vec<u8> = reference
        .bytes()
        .take_while(|b| b.is_ascii_alphabetic())
        .map(|b| b.to_ascii_uppercase())
        .collect();
    if letters.is_empty() || letters.len() > MAX_COLUMN_LETTERS {
        return None;
    }
    let n = letters.iter().try_fold(0usize, |acc, b| {
        acc.checked_mul(26)?.checked_add((b - b'A' + 1) as usize)
    })?;
    Some(n - 1)
}
