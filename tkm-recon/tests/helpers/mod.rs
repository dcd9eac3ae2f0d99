//! Shared fixtures for tkm-recon integration tests
//!
//! Spreadsheets are authored with rust_xlsxwriter and document bundles with
//! the zip writer, so tests exercise the same readers production uses.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use rust_xlsxwriter::Workbook;
use tkm_common::time::ManualClock;
use tkm_recon::config::ServiceConfig;
use tkm_recon::models::UploadedFile;
use tkm_recon::services::{BundleExtractor, BundlePackager, WorkflowOrchestrator, ZipPackager};
use zip::write::SimpleFileOptions;

/// One spreadsheet cell
#[derive(Debug, Clone, Copy)]
pub enum Cell<'a> {
    Text(&'a str),
    Number(f64),
    Blank,
}

pub use Cell::{Blank, Number, Text};

/// Write an xlsx workbook with the given (sheet name, rows)
pub fn write_workbook(path: &Path, sheets: &[(&str, Vec<Vec<Cell<'_>>>)]) {
    let mut workbook = Workbook::new();
    for (name, rows) in sheets {
        let worksheet = workbook.add_worksheet().set_name(*name).unwrap();
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                match cell {
                    Text(text) => {
                        worksheet.write_string(r as u32, c as u16, *text).unwrap();
                    }
                    Number(n) => {
                        worksheet.write_number(r as u32, c as u16, *n).unwrap();
                    }
                    Blank => {}
                }
            }
        }
    }
    workbook.save(path).unwrap();
}

/// Write a zip bundle holding one small PDF-ish file per filename
pub fn write_bundle(path: &Path, filenames: &[&str]) {
    let mut writer = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
    for name in filenames {
        writer
            .start_file(format!("tickets/{}", name), SimpleFileOptions::default())
            .unwrap();
        writer.write_all(format!("%PDF-1.4 {}", name).as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

/// Entry names of a zip file
pub fn zip_entry_names(path: &Path) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

/// Committed binary fixture under tests/fixtures
pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join(name)
}

/// Orchestrator over a temporary root with a manually driven clock
pub struct TestService {
    pub root: tempfile::TempDir,
    pub clock: Arc<ManualClock>,
    pub workflow: Arc<WorkflowOrchestrator>,
}

impl TestService {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(adjust: impl FnOnce(&mut ServiceConfig)) -> Self {
        Self::build(adjust, Arc::new(ZipPackager::new()))
    }

    /// Service whose bundles are written by `packager`
    pub fn with_packager(packager: Arc<dyn BundlePackager>) -> Self {
        Self::build(|_| {}, packager)
    }

    fn build(adjust: impl FnOnce(&mut ServiceConfig), packager: Arc<dyn BundlePackager>) -> Self {
        let root = tempfile::tempdir().unwrap();
        let mut config = ServiceConfig::with_root(root.path());
        adjust(&mut config);
        config.areas.ensure().unwrap();

        let clock = Arc::new(ManualClock::new(Utc::now()));
        let workflow = Arc::new(
            WorkflowOrchestrator::with_collaborators(config, clock.clone(), Arc::new(BundleExtractor::new()), packager)
                .unwrap(),
        );
        Self { root, clock, workflow }
    }

    pub fn uploads(&self) -> PathBuf {
        self.workflow.config().areas.uploads.clone()
    }

    /// Place a file in the uploads area as the HTTP layer would
    pub fn upload(&self, original_name: &str, write: impl FnOnce(&Path)) -> UploadedFile {
        let path = self.workflow.new_upload_path();
        write(&path);
        UploadedFile::new(path, original_name)
    }

    pub fn bundle_upload(&self, filenames: &[&str]) -> UploadedFile {
        self.upload("tickets.zip", |path| write_bundle(path, filenames))
    }

    pub fn roster_upload(&self, original_name: &str, sheets: &[(&str, Vec<Vec<Cell<'_>>>)]) -> UploadedFile {
        self.upload(original_name, |path| write_workbook(path, sheets))
    }

    /// Files currently in the uploads area
    pub fn pending_uploads(&self) -> usize {
        std::fs::read_dir(self.uploads()).unwrap().count()
    }
}

/// Documents for two rooms of a room-name roster
pub const ROOM_DOCUMENTS: &[&str] = &[
    "0001-203-李雷--船票.pdf",
    "0002-204-韩梅梅--船票.pdf",
    "0003-205-李雷--船票.pdf",
];

/// Three WANG LEI documents and one HAN MEIMEI
pub const NAME_ONLY_DOCUMENTS: &[&str] = &[
    "T1-101-WANG LEI--ticket.pdf",
    "T2-102-WANG LEI--ticket.pdf",
    "T3-103-WANG LEI--ticket.pdf",
    "T4-104-HAN MEIMEI--ticket.pdf",
];

/// Title row, then 房号/姓名 header, room carried down over a merged cell
pub fn room_roster() -> Vec<Vec<Cell<'static>>> {
    vec![
        vec![Text("2024年游客名单")],
        vec![Text("房号"), Text("姓名")],
        vec![Number(203.0), Text("李雷")],
        vec![Number(204.0), Text("韩梅梅")],
        vec![Blank, Text("王五")],
    ]
}

/// Two WANG LEI passengers with different passports and one HAN MEIMEI
pub fn name_only_roster() -> Vec<Vec<Cell<'static>>> {
    vec![
        vec![Text("序号"), Text("姓名"), Text("护照号码")],
        vec![Number(1.0), Text("WANG LEI"), Text("E10000001")],
        vec![Number(2.0), Text("WANG LEI"), Text("E10000002")],
        vec![Number(3.0), Text("HAN MEIMEI"), Text("E10000003")],
    ]
}
