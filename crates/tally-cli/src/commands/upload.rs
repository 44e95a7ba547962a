//! Upload command: extract, store and save receipts from local files

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tally_core::analytics::format::format_money;
use tally_core::{
    Database, DocumentStore, ExtractionClient, FileOutcome, FileResult, ParsedReceipt,
    ReceiptExtractor, SaveOutcome, SaveRequest, UploadPipeline, UploadedFile,
};
use tracing::warn;

use super::truncate;

#[derive(Debug, Clone, Copy, Default)]
pub struct UploadOptions {
    /// Leave out receipts flagged as duplicates
    pub skip_duplicates: bool,
    /// Extract only; store and save nothing
    pub dry_run: bool,
}

/// Counts reported at the end of an upload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub extracted: usize,
    pub failed: usize,
    pub saved: usize,
    pub skipped_duplicates: usize,
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn describe(receipt: &ParsedReceipt) -> String {
    format!(
        "{} {} ({}, {} items)",
        receipt.store_name,
        format_money(receipt.total),
        receipt.purchase_date,
        receipt.effective_item_count()
    )
}

/// Extract every file, then save the results
///
/// Unreadable files and failed extractions are reported and skipped; the
/// rest of the batch carries on.
pub async fn cmd_upload(
    db: &Database,
    extractor: &ExtractionClient,
    store: &DocumentStore,
    user: &str,
    files: &[PathBuf],
    options: UploadOptions,
) -> Result<UploadSummary> {
    println!(
        "📤 Uploading {} file(s) with {} ({})...",
        files.len(),
        extractor.backend_name(),
        extractor.model()
    );

    let mut summary = UploadSummary::default();
    let mut uploads = Vec::with_capacity(files.len());

    for path in files {
        match std::fs::read(path) {
            Ok(bytes) => uploads.push(UploadedFile {
                file_name: display_name(path),
                content_type: None,
                bytes,
            }),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read upload");
                println!("   ❌ {}: {}", path.display(), e);
                summary.failed += 1;
            }
        }
    }

    let pipeline = if options.dry_run {
        UploadPipeline::dry_run(db, extractor)
    } else {
        UploadPipeline::new(db, extractor, store)
    };
    let results = pipeline
        .extract_batch(user, uploads, |done, total, result| {
            print_progress(done, total, result, options.dry_run)
        })
        .await
        .context("Upload failed")?;

    if options.dry_run {
        summary.extracted = results.iter().filter(|r| !r.is_failed()).count();
        summary.failed += results.len() - summary.extracted;
        println!();
        println!("🔎 Dry run: nothing was stored");
        print_summary(&summary);
        return Ok(summary);
    }

    let mut requests = Vec::new();
    for result in results {
        match result.outcome {
            FileOutcome::Extracted {
                receipt,
                duplicate,
                file_path,
            } => {
                summary.extracted += 1;
                if duplicate.is_duplicate && options.skip_duplicates {
                    println!(
                        "   ⏭️  Skipping {}: duplicate of receipt #{}",
                        result.file_name,
                        duplicate.existing_id.unwrap_or_default()
                    );
                    if let Some(path) = &file_path {
                        discard_document(db, store, user, path);
                    }
                    summary.skipped_duplicates += 1;
                    continue;
                }
                if duplicate.is_duplicate {
                    println!(
                        "   ⚠️  {} looks like receipt #{}; saving anyway (use --skip-duplicates to skip)",
                        result.file_name,
                        duplicate.existing_id.unwrap_or_default()
                    );
                }
                requests.push(SaveRequest { receipt, file_path });
            }
            FileOutcome::Failed { .. } => summary.failed += 1,
        }
    }

    if !requests.is_empty() {
        println!();
        println!("💾 Saving {} receipt(s)...", requests.len());
        for saved in tally_core::save_batch(db, user, requests)? {
            match saved.outcome {
                SaveOutcome::Saved { receipt_id } => {
                    println!("   ✓ #{} {}", receipt_id, saved.store_name);
                    summary.saved += 1;
                }
                SaveOutcome::Failed { error } => {
                    println!("   ❌ {}: {}", saved.store_name, error);
                    summary.failed += 1;
                }
            }
        }
    }

    db.log_audit(
        user,
        "upload",
        Some("receipt"),
        None,
        Some(&format!(
            "files={}, saved={}, failed={}, skipped={}",
            files.len(),
            summary.saved,
            summary.failed,
            summary.skipped_duplicates
        )),
    )?;

    print_summary(&summary);
    Ok(summary)
}

/// Remove the stored copy of a skipped duplicate, returning whether it was removed
///
/// Identical bytes stored in the same second share a path with the receipt
/// they duplicate, so a referenced file is kept. Failures are only logged.
pub(crate) fn discard_document(
    db: &Database,
    store: &DocumentStore,
    user: &str,
    path: &str,
) -> bool {
    let result = db
        .file_path_in_use(user, path)
        .and_then(|in_use| if in_use { Ok(false) } else { store.delete(path) });
    match result {
        Ok(removed) => removed,
        Err(e) => {
            warn!(path = %path, error = %e, "Failed to remove skipped document");
            println!("   ⚠️  Could not remove stored file {}: {}", path, e);
            false
        }
    }
}

fn print_progress(done: usize, total: usize, result: &FileResult, show_items: bool) {
    match &result.outcome {
        FileOutcome::Extracted {
            receipt, duplicate, ..
        } => {
            let flag = if duplicate.is_duplicate {
                " ⚠️  duplicate"
            } else {
                ""
            };
            println!(
                "   [{}/{}] ✓ {}: {}{}",
                done,
                total,
                result.file_name,
                describe(receipt),
                flag
            );
            if show_items {
                for item in &receipt.line_items {
                    println!(
                        "         {:<40} {:>10}",
                        truncate(
                            item.normalized_name
                                .as_deref()
                                .unwrap_or(&item.raw_description),
                            40
                        ),
                        format_money(item.total_price)
                    );
                }
            }
        }
        FileOutcome::Failed { error } => {
            println!("   [{}/{}] ❌ {}: {}", done, total, result.file_name, error);
        }
    }
}

fn print_summary(summary: &UploadSummary) {
    println!();
    println!("📊 Upload Results");
    println!("   ─────────────────────────────");
    println!("   Extracted: {}", summary.extracted);
    println!("   Saved:     {}", summary.saved);
    if summary.skipped_duplicates > 0 {
        println!("   Skipped duplicates: {}", summary.skipped_duplicates);
    }
    if summary.failed > 0 {
        println!("   ❌ Failed: {}", summary.failed);
    }
}
