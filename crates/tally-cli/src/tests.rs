//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use tally_core::config::ExtractionBackendKind;
use tally_core::models::{EditableField, TimeRange};
use tally_core::test_utils::MockMessagesServer;
use tally_core::{Config, Database, DocumentStore, ExtractionClient, MockExtractor};
use tempfile::TempDir;

use crate::commands::{self, truncate, UploadOptions, UploadSummary};

const USER: &str = "local-dev";

fn setup_test_db() -> Database {
    Database::in_memory().unwrap()
}

fn setup_store(dir: &TempDir) -> DocumentStore {
    DocumentStore::new(dir.path().join("docs"), Some("test-secret"), Duration::from_secs(600))
        .unwrap()
}

/// Write a file into the temp dir and return its path
fn write_file(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// Save the canned receipt on `date`
fn seed_receipt(db: &Database, date: &str) -> i64 {
    let mut parsed = MockExtractor::canned_receipt();
    parsed.purchase_date = date.to_string();
    tally_core::save_receipt(db, USER, parsed, None).unwrap().id
}

fn receipt_count(db: &Database) -> i64 {
    let conn = db.conn().unwrap();
    conn.query_row("SELECT COUNT(*) FROM receipts", [], |row| row.get(0))
        .unwrap()
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

// ========== Utility Tests ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a long string that exceeds", 10), "a long ..."); // 7 chars + "..."
    assert_eq!(truncate("exact", 5), "exact");
    assert_eq!(truncate("toolong", 6), "too...");
    assert_eq!(truncate("Café au lait", 7), "Café...");
}

#[test]
fn test_open_db_unencrypted_creates_schema() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tally.db");

    let db = commands::open_db(&path, true).unwrap();
    assert!(path.exists());
    assert_eq!(receipt_count(&db), 0);
}

#[test]
fn test_cmd_init_unencrypted() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tally.db");

    commands::cmd_init(&path, true).unwrap();
    assert!(path.exists());
}

// ========== Upload Tests ==========

#[tokio::test]
async fn test_upload_saves_extracted_and_reports_failures() {
    let db = setup_test_db();
    let dir = TempDir::new().unwrap();
    let store = setup_store(&dir);
    let extractor = ExtractionClient::mock();

    let files = vec![
        write_file(&dir, "costco.pdf", b"%PDF-1.4 costco"),
        write_file(&dir, "notes.txt", b"just some notes"),
        dir.path().join("missing.pdf"),
    ];

    let summary = commands::cmd_upload(
        &db,
        &extractor,
        &store,
        USER,
        &files,
        UploadOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(
        summary,
        UploadSummary {
            extracted: 1,
            failed: 2,
            saved: 1,
            skipped_duplicates: 0,
        }
    );

    let receipts = db.list_receipts(USER, 10).unwrap();
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].store_name, "Costco");

    let file_path = receipts[0].file_path.clone().unwrap();
    assert!(store.owns(USER, &file_path));
    assert_eq!(store.read(&file_path).unwrap(), b"%PDF-1.4 costco");

    let audit = db.list_audit_log(10).unwrap();
    assert!(audit.iter().any(|e| e.action == "upload"));
}

#[tokio::test]
async fn test_upload_dry_run_stores_nothing() {
    let db = setup_test_db();
    let dir = TempDir::new().unwrap();
    let store = setup_store(&dir);
    let extractor = ExtractionClient::mock();
    let files = vec![write_file(&dir, "costco.pdf", b"%PDF-1.4 costco")];

    let options = UploadOptions {
        dry_run: true,
        ..Default::default()
    };
    let summary = commands::cmd_upload(&db, &extractor, &store, USER, &files, options)
        .await
        .unwrap();

    assert_eq!(summary.extracted, 1);
    assert_eq!(summary.saved, 0);
    assert_eq!(receipt_count(&db), 0);
    assert!(!dir.path().join("docs").join(USER).exists());
}

#[tokio::test]
async fn test_upload_skip_duplicates() {
    let db = setup_test_db();
    let dir = TempDir::new().unwrap();
    let store = setup_store(&dir);
    let extractor = ExtractionClient::mock();
    let files = vec![write_file(&dir, "costco.pdf", b"%PDF-1.4 costco")];

    let first = commands::cmd_upload(&db, &extractor, &store, USER, &files, Default::default())
        .await
        .unwrap();
    assert_eq!(first.saved, 1);

    let options = UploadOptions {
        skip_duplicates: true,
        ..Default::default()
    };
    let second = commands::cmd_upload(&db, &extractor, &store, USER, &files, options)
        .await
        .unwrap();

    assert_eq!(second.extracted, 1);
    assert_eq!(second.saved, 0);
    assert_eq!(second.skipped_duplicates, 1);
    assert_eq!(receipt_count(&db), 1);
}

#[tokio::test]
async fn test_upload_duplicates_saved_without_skip_flag() {
    let db = setup_test_db();
    let dir = TempDir::new().unwrap();
    let store = setup_store(&dir);
    let extractor = ExtractionClient::mock();
    let files = vec![write_file(&dir, "costco.pdf", b"%PDF-1.4 costco")];

    for _ in 0..2 {
        commands::cmd_upload(&db, &extractor, &store, USER, &files, Default::default())
            .await
            .unwrap();
    }

    assert_eq!(receipt_count(&db), 2);
}

#[tokio::test]
async fn test_upload_with_anthropic_backend() {
    let server = MockMessagesServer::with_receipt().await;
    let db = setup_test_db();
    let dir = TempDir::new().unwrap();
    let store = setup_store(&dir);

    let mut config = Config::default();
    config.extraction.backend = ExtractionBackendKind::Anthropic;
    config.extraction.api_base = server.url();
    config.extraction.api_key = Some("sk-test".to_string());
    let extractor = commands::open_extractor(&config).unwrap();
    assert_eq!(extractor.backend_name(), "anthropic");

    let files = vec![write_file(&dir, "costco.pdf", b"%PDF-1.4 costco")];
    let summary = commands::cmd_upload(&db, &extractor, &store, USER, &files, Default::default())
        .await
        .unwrap();
    assert_eq!(summary.saved, 1);

    let receipt = db.list_receipts(USER, 1).unwrap().remove(0);
    assert_eq!(receipt.store_name, "Costco");
    assert_eq!(receipt.total, 26.00);
    assert_eq!(receipt.line_items.len(), 2);

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].api_key.as_deref(), Some("sk-test"));
}

#[test]
fn test_open_extractor_without_api_key_names_the_variable() {
    let mut config = Config::default();
    config.extraction.backend = ExtractionBackendKind::Anthropic;
    config.extraction.api_key = None;

    let Err(err) = commands::open_extractor(&config) else {
        panic!("expected open_extractor to fail");
    };
    assert!(format!("{:#}", err).contains(tally_core::config::API_KEY_ENV));
}

#[test]
fn test_failed_cleanup_of_skipped_duplicate_is_only_logged() {
    let db = setup_test_db();
    let dir = TempDir::new().unwrap();
    let store = setup_store(&dir);

    // A directory where a file is expected cannot be removed with remove_file
    let stuck = dir.path().join("docs").join(USER).join("stuck.pdf");
    std::fs::create_dir_all(&stuck).unwrap();
    let path = format!("{}/stuck.pdf", USER);

    assert!(!commands::upload::discard_document(&db, &store, USER, &path));
    assert!(stuck.exists());
    assert!(!commands::upload::discard_document(&db, &store, USER, "../escape.pdf"));

    let loose = write_file(&dir, "loose.pdf", b"%PDF");
    std::fs::create_dir_all(dir.path().join("docs").join(USER)).unwrap();
    std::fs::copy(&loose, dir.path().join("docs").join(USER).join("loose.pdf")).unwrap();
    assert!(commands::upload::discard_document(
        &db,
        &store,
        USER,
        &format!("{}/loose.pdf", USER)
    ));
}

#[tokio::test]
async fn test_skipped_duplicate_keeps_rest_of_batch() {
    let db = setup_test_db();
    let dir = TempDir::new().unwrap();
    let store = setup_store(&dir);
    seed_receipt(&db, "2024-03-01");

    let echo = ExtractionClient::mock_echo();
    let mut other = MockExtractor::canned_receipt();
    other.store_name = "Trader Joe's".to_string();
    let files = vec![
        write_file(
            &dir,
            "dup.pdf",
            serde_json::to_string(&MockExtractor::canned_receipt())
                .unwrap()
                .as_bytes(),
        ),
        write_file(&dir, "new.pdf", serde_json::to_string(&other).unwrap().as_bytes()),
    ];

    let options = UploadOptions {
        skip_duplicates: true,
        ..Default::default()
    };
    let summary = commands::cmd_upload(&db, &echo, &store, USER, &files, options)
        .await
        .unwrap();

    assert_eq!(summary.skipped_duplicates, 1);
    assert_eq!(summary.saved, 1);
    assert_eq!(receipt_count(&db), 2);
}

// ========== Receipt Command Tests ==========

#[test]
fn test_cmd_receipts_list_and_show() {
    let db = setup_test_db();
    assert!(commands::cmd_receipts_list(&db, USER, 20).is_ok());

    let id = seed_receipt(&db, "2024-03-01");
    assert!(commands::cmd_receipts_list(&db, USER, 20).is_ok());
    assert!(commands::cmd_receipts_show(&db, USER, id, false).is_ok());
    assert!(commands::cmd_receipts_show(&db, USER, id, true).is_ok());
}

#[test]
fn test_cmd_receipts_show_other_user_not_found() {
    let db = setup_test_db();
    let id = seed_receipt(&db, "2024-03-01");

    let result = commands::cmd_receipts_show(&db, "someone-else", id, false);
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("not found"));
}

#[tokio::test]
async fn test_cmd_receipts_delete_removes_rows_and_file() {
    let db = setup_test_db();
    let dir = TempDir::new().unwrap();
    let store = setup_store(&dir);
    let files = vec![write_file(&dir, "costco.pdf", b"%PDF-1.4 costco")];
    commands::cmd_upload(
        &db,
        &ExtractionClient::mock(),
        &store,
        USER,
        &files,
        Default::default(),
    )
    .await
    .unwrap();

    let receipt = db.list_receipts(USER, 1).unwrap().remove(0);
    let file_path = receipt.file_path.clone().unwrap();

    commands::cmd_receipts_delete(&db, &store, USER, receipt.id, true).unwrap();

    assert!(db.get_receipt(USER, receipt.id).unwrap().is_none());
    assert!(store.read(&file_path).is_err());
    let audit = db.list_audit_log(10).unwrap();
    assert!(audit
        .iter()
        .any(|e| e.action == "delete" && e.entity_id == Some(receipt.id)));
}

#[test]
fn test_cmd_receipts_delete_missing() {
    let db = setup_test_db();
    let dir = TempDir::new().unwrap();
    let store = setup_store(&dir);

    assert!(commands::cmd_receipts_delete(&db, &store, USER, 999, true).is_err());
}

#[test]
fn test_cmd_receipts_edit_records_history() {
    let db = setup_test_db();
    let id = seed_receipt(&db, "2024-03-01");
    let item_id = db.get_receipt(USER, id).unwrap().unwrap().line_items[0].id;

    commands::cmd_receipts_edit(&db, USER, item_id, "category", Some("Cleaning")).unwrap();

    let item = db.get_line_item(USER, item_id).unwrap().unwrap();
    assert_eq!(item.category.as_deref(), Some("Cleaning"));

    let edits = db.list_line_item_edits(USER, item_id).unwrap();
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].field, EditableField::Category);
    assert_eq!(edits[0].old_value.as_deref(), Some("Household"));
    assert_eq!(edits[0].new_value.as_deref(), Some("Cleaning"));
    assert_eq!(edits[0].edited_by, USER);

    assert!(commands::cmd_receipts_history(&db, USER, id).is_ok());
}

#[test]
fn test_cmd_receipts_edit_same_value_is_noop() {
    let db = setup_test_db();
    let id = seed_receipt(&db, "2024-03-01");
    let item_id = db.get_receipt(USER, id).unwrap().unwrap().line_items[0].id;

    commands::cmd_receipts_edit(&db, USER, item_id, "category", Some("Household")).unwrap();

    assert!(db.list_line_item_edits(USER, item_id).unwrap().is_empty());
}

#[test]
fn test_cmd_receipts_edit_rejects_unknown_field() {
    let db = setup_test_db();
    let id = seed_receipt(&db, "2024-03-01");
    let item_id = db.get_receipt(USER, id).unwrap().unwrap().line_items[0].id;

    assert!(commands::cmd_receipts_edit(&db, USER, item_id, "total_price", Some("1")).is_err());
    assert!(commands::cmd_receipts_edit(&db, USER, 999, "category", Some("X")).is_err());
}

#[test]
fn test_cmd_receipts_history_without_edits() {
    let db = setup_test_db();
    let id = seed_receipt(&db, "2024-03-01");

    assert!(commands::cmd_receipts_history(&db, USER, id).is_ok());
    assert!(commands::cmd_receipts_history(&db, USER, 999).is_err());
}

// ========== Dashboard Tests ==========

#[test]
fn test_cmd_dashboard_empty() {
    let db = setup_test_db();
    let today = date("2024-03-15");

    for range in [
        TimeRange::ThisMonth,
        TimeRange::LastMonth,
        TimeRange::AllTime,
    ] {
        assert!(commands::cmd_dashboard(&db, USER, range, today).is_ok());
    }
}

#[test]
fn test_cmd_dashboard_with_receipts() {
    let db = setup_test_db();
    seed_receipt(&db, "2024-01-05");
    seed_receipt(&db, "2024-02-04");
    seed_receipt(&db, "2024-03-05");

    let today = date("2024-03-15");
    assert!(commands::cmd_dashboard(&db, USER, TimeRange::ThisMonth, today).is_ok());
    assert!(commands::cmd_dashboard(&db, USER, TimeRange::AllTime, today).is_ok());

    let audit = db.list_audit_log(10).unwrap();
    assert!(audit
        .iter()
        .any(|e| e.action == "view" && e.entity_type.as_deref() == Some("dashboard")));
}

#[test]
fn test_cmd_top_items() {
    let db = setup_test_db();
    assert!(commands::cmd_top_items(&db, USER, 10).is_ok());

    seed_receipt(&db, "2024-03-01");
    assert!(commands::cmd_top_items(&db, USER, 10).is_ok());
    assert!(commands::cmd_top_items(&db, USER, 0).is_ok());
}

// ========== Audit Tests ==========

#[test]
fn test_cmd_audit() {
    let db = setup_test_db();
    assert!(commands::cmd_audit(&db, 20).is_ok());

    db.log_audit(USER, "view", Some("receipt"), Some(1), None)
        .unwrap();
    db.log_audit(USER, "view", Some("dashboard"), None, Some("range=all-time"))
        .unwrap();
    assert!(commands::cmd_audit(&db, 20).is_ok());
}
