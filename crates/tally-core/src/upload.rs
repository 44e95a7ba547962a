//! Upload pipeline
//!
//! Batches are processed one file at a time: detect kind, extract, check
//! for a duplicate, then store. A failing file is reported and the batch
//! moves on. Saving is a separate step so the user can drop duplicates
//! or fix fields first. A pipeline built without a store is a dry run.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::db::{require_user, Database};
use crate::duplicates::DuplicateCandidate;
use crate::error::{Error, Result};
use crate::extract::{Document, ParsedReceipt, ReceiptExtractor};
use crate::models::{DuplicateCheck, Receipt};
use crate::storage::DocumentStore;

/// One file of an upload batch
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Result of extracting one file
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Extracted {
        receipt: ParsedReceipt,
        duplicate: DuplicateCheck,
        /// Store path of the uploaded document; None on a dry run
        file_path: Option<String>,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub file_name: String,
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

impl FileResult {
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, FileOutcome::Failed { .. })
    }
}

/// A reviewed receipt to persist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveRequest {
    pub receipt: ParsedReceipt,
    #[serde(default)]
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SaveOutcome {
    Saved { receipt_id: i64 },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveResult {
    pub store_name: String,
    #[serde(flatten)]
    pub outcome: SaveOutcome,
}

/// Extraction side of an upload
pub struct UploadPipeline<'a, E: ReceiptExtractor + ?Sized> {
    db: &'a Database,
    extractor: &'a E,
    store: Option<&'a DocumentStore>,
}

impl<'a, E: ReceiptExtractor + ?Sized> UploadPipeline<'a, E> {
    pub fn new(db: &'a Database, extractor: &'a E, store: &'a DocumentStore) -> Self {
        Self {
            db,
            extractor,
            store: Some(store),
        }
    }

    /// Extract and check for duplicates without storing documents
    pub fn dry_run(db: &'a Database, extractor: &'a E) -> Self {
        Self {
            db,
            extractor,
            store: None,
        }
    }

    /// Extract every file in order, calling `on_progress(done, total, result)`
    /// after each one
    pub async fn extract_batch<F>(
        &self,
        user_id: &str,
        files: Vec<UploadedFile>,
        mut on_progress: F,
    ) -> Result<Vec<FileResult>>
    where
        F: FnMut(usize, usize, &FileResult),
    {
        require_user(user_id)?;

        let total = files.len();
        let mut results = Vec::with_capacity(total);

        for (index, file) in files.into_iter().enumerate() {
            let file_name = file.file_name.clone();
            let outcome = match self.extract_one(user_id, file).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(file = %file_name, error = %e, "Receipt extraction failed");
                    FileOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };

            let result = FileResult { file_name, outcome };
            on_progress(index + 1, total, &result);
            results.push(result);
        }

        let failed = results.iter().filter(|r| r.is_failed()).count();
        info!(
            total,
            failed,
            model = self.extractor.model(),
            "Extraction batch finished"
        );
        Ok(results)
    }

    async fn extract_one(&self, user_id: &str, file: UploadedFile) -> Result<FileOutcome> {
        let document = Document::detect(
            file.bytes,
            Some(&file.file_name),
            file.content_type.as_deref(),
        )?;

        let receipt = self.extractor.extract(&document).await?;

        let duplicate = match receipt.purchase_date() {
            Ok(purchase_date) => self.db.find_duplicate(
                user_id,
                &DuplicateCandidate {
                    store_name: receipt.store_name.clone(),
                    purchase_date,
                    total: receipt.total,
                    item_count: receipt.effective_item_count(),
                },
            )?,
            // Saving will reject the date; nothing to compare against yet
            Err(_) => DuplicateCheck::default(),
        };

        let file_path = match self.store {
            Some(store) => Some(store.save(
                user_id,
                &document.bytes,
                document.kind.extension(),
                Utc::now(),
            )?),
            None => None,
        };

        Ok(FileOutcome::Extracted {
            receipt,
            duplicate,
            file_path,
        })
    }
}

/// Persist one reviewed receipt and return it as stored
pub fn save_receipt(
    db: &Database,
    user_id: &str,
    parsed: ParsedReceipt,
    file_path: Option<String>,
) -> Result<Receipt> {
    require_user(user_id)?;

    let new_receipt = parsed.into_new_receipt(file_path)?;
    let id = db.create_receipt(user_id, &new_receipt)?;
    db.get_receipt(user_id, id)?
        .ok_or_else(|| Error::NotFound(format!("receipt {}", id)))
}

/// Persist several receipts; a failure is recorded and the rest still save
pub fn save_batch(db: &Database, user_id: &str, requests: Vec<SaveRequest>) -> Result<Vec<SaveResult>> {
    require_user(user_id)?;

    let results = requests
        .into_iter()
        .map(|request| {
            let store_name = request.receipt.store_name.clone();
            let outcome = match save_receipt(db, user_id, request.receipt, request.file_path) {
                Ok(receipt) => SaveOutcome::Saved {
                    receipt_id: receipt.id,
                },
                Err(e) => {
                    warn!(store = %store_name, error = %e, "Failed to save receipt");
                    SaveOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            SaveResult {
                store_name,
                outcome,
            }
        })
        .collect();

    Ok(results)
}
