//! Fixtures shared by the integration tests: `.xlsx` builders, fake
//! providers and stub HTTP servers.

#![allow(dead_code)]

use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use neerniti::config::{Config, TablesConfig};
use neerniti::context::AppContext;
use neerniti::embedding::{EmbeddingProvider, InputType};
use neerniti::generate::{Generation, TextGenerator};
use neerniti::index::{InMemoryIndex, VectorIndex};
use neerniti::tables::TabularStore;

// ─── Spreadsheets ───────────────────────────────────────────────────

#[derive(Clone, Copy)]
pub enum Cell<'a> {
    T(&'a str),
    N(f64),
    Blank,
}

fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap()
}

/// A single-sheet workbook using inline strings, so no `sharedStrings.xml`.
pub fn xlsx(rows: &[Vec<Cell>]) -> Vec<u8> {
    let mut sheet = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\"><sheetData>",
    );
    for (r, row) in rows.iter().enumerate() {
        sheet.push_str(&format!("<row r=\"{}\">", r + 1));
        for (c, cell) in row.iter().enumerate() {
            let reference = format!("{}{}", column_letter(c), r + 1);
            match cell {
                Cell::T(s) => sheet.push_str(&format!(
                    "<c r=\"{}\" t=\"inlineStr\"><is><t>{}</t></is></c>",
                    reference, s
                )),
                Cell::N(n) => {
                    sheet.push_str(&format!("<c r=\"{}\"><v>{}</v></c>", reference, n))
                }
                Cell::Blank => {}
            }
        }
        sheet.push_str("</row>");
    }
    sheet.push_str("</sheetData></worksheet>");

    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file(
            "xl/worksheets/sheet1.xml",
            zip::write::SimpleFileOptions::default(),
        )
        .unwrap();
        zip.write_all(sheet.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

fn banner(rows: usize) -> Vec<Vec<Cell<'static>>> {
    let mut out = vec![vec![Cell::T("Dynamic Ground Water Resources of Gujarat")]];
    out.resize(rows - 1, Vec::new());
    out.push(vec![Cell::T("S.No"), Cell::T("STATE"), Cell::T("DISTRICT")]);
    out
}

/// Taluka sheet: 8 banner rows, then AHWA, VALOD, BARDOLI.
pub fn taluka_workbook() -> Vec<u8> {
    use Cell::*;
    let mut rows = banner(8);
    rows.push(vec![
        N(1.0), T("GUJARAT"), T("DANG"), T("AHWA"),
        N(2354.0), Blank, Blank, N(2354.0),
        N(53133.0),
        N(50112.0), Blank, Blank, N(50112.0),
    ]);
    rows.push(vec![
        N(2.0), T("GUJARAT"), T("TAPI"), T("VALOD"),
        N(1480.0), N(20.0), Blank, N(1500.0),
        N(31017.0),
        N(29870.0), N(300.0), Blank, N(30170.0),
    ]);
    rows.push(vec![
        N(3.0), T("GUJARAT"), T("SURAT"), T("BARDOLI"),
        N(1301.5), Blank, Blank, N(1301.5),
        N(45210.0),
        N(41000.0), Blank, Blank, N(41000.0),
    ]);
    // Subtotal line without a taluk name; dropped on load.
    rows.push(vec![Blank, Blank, T("Total"), Blank, N(5155.5)]);
    xlsx(&rows)
}

/// District sheet: 9 banner rows, then DANG, TAPI, SURAT.
pub fn district_workbook() -> Vec<u8> {
    use Cell::*;
    let mut rows = banner(9);
    rows.push(vec![
        N(1.0), T("GUJARAT"), T("DANG"),
        N(2354.0), Blank, Blank, N(2354.0),
        N(176400.0),
        N(160000.0), Blank, Blank, N(160000.0),
    ]);
    rows.push(vec![
        N(2.0), T("GUJARAT"), T("TAPI"),
        N(1500.0), Blank, Blank, N(1500.0),
        N(314000.0),
        N(290000.0), Blank, Blank, N(290000.0),
    ]);
    rows.push(vec![
        N(3.0), T("GUJARAT"), T("SURAT"),
        N(1300.0), Blank, Blank, N(1300.0),
        N(430000.0),
        N(400000.0), Blank, Blank, N(400000.0),
    ]);
    xlsx(&rows)
}

/// Write both workbooks into `dir` and return a config pointing at them.
pub fn write_tables(dir: &Path) -> TablesConfig {
    let district_path = dir.join("district_data.xlsx");
    let taluka_path = dir.join("taluka_data.xlsx");
    std::fs::write(&district_path, district_workbook()).unwrap();
    std::fs::write(&taluka_path, taluka_workbook()).unwrap();
    TablesConfig {
        district_path: Some(district_path),
        taluka_path: Some(taluka_path),
    }
}

/// A paragraph-structured report long enough to produce several chunks.
pub fn groundwater_report() -> String {
    [
        "The Dang district lies in the hilly south-eastern corner of Gujarat and receives the heaviest monsoon rainfall in the state, most of it between June and September.",
        "Hard rock aquifers dominate the area. Basaltic formations store limited groundwater in weathered and fractured zones, so dug wells often dry up by late summer.",
        "Recharge worthy area covers most of the district. Check dams and percolation tanks built under watershed schemes have improved post-monsoon water levels in several villages.",
        "Farmers are advised to prefer short-duration crops in the rabi season and to use drip irrigation where groundwater is the only source of water.",
    ]
    .join("\n\n")
}

// ─── Fake providers ─────────────────────────────────────────────────

/// Letter-frequency vectors: deterministic, and similar texts land close.
pub struct LetterEmbedder {
    pub calls: AtomicUsize,
}

impl LetterEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn letter_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; 27];
    v[26] = 1.0;
    for c in text.chars().filter(|c| c.is_ascii_alphabetic()) {
        v[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
    }
    v
}

#[async_trait]
impl EmbeddingProvider for LetterEmbedder {
    fn model_name(&self) -> &str {
        "letters"
    }

    async fn embed(&self, texts: &[String], _input_type: InputType) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| letter_vector(t)).collect())
    }
}

/// Records every prompt and answers with a fixed reply.
pub struct CapturingGenerator {
    pub prompts: Mutex<Vec<String>>,
    reply: Generation,
}

impl CapturingGenerator {
    pub fn answering(text: &str) -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            reply: Generation::Answer(text.to_string()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for CapturingGenerator {
    fn model_name(&self) -> &str {
        "capturing"
    }

    async fn generate(&self, prompt: &str) -> Generation {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone()
    }
}

/// Context over the fixture tables and an in-memory index.
pub fn context_with(
    dir: &Path,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn TextGenerator>,
) -> AppContext {
    let mut config = Config::minimal();
    config.tables = write_tables(dir);
    let tables = TabularStore::load(&config.tables);
    let index: Arc<dyn VectorIndex> = Arc::new(InMemoryIndex::new());
    AppContext::from_parts(config, tables, index, embedder, generator)
}

// ─── Stub servers ───────────────────────────────────────────────────

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn_stub(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A local URL nothing is listening on.
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/generate", addr)
}
