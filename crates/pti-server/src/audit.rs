//! Consistency check between the record store and the upload directory.
//!
//! Uploads write the file first and the record second, and files can be
//! removed behind the server's back, so the two stores can drift apart. The
//! audit reports drift; it never repairs anything.

use std::collections::BTreeSet;

use thiserror::Error;
use tracing::{info, warn};

use crate::db::{DbError, ImageDb, ImageRecord};
use crate::storage::{Storage, StorageError};

#[derive(Debug, Error)]
pub enum AuditError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Outcome of an audit.
#[derive(Debug, Default)]
pub struct AuditReport {
    pub records: usize,
    pub files: usize,
    /// Records whose file is no longer on disk
    pub orphan_records: Vec<ImageRecord>,
    /// Files no record points to
    pub orphan_files: Vec<String>,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.orphan_records.is_empty() && self.orphan_files.is_empty()
    }
}

/// Compare every record with the files in storage.
pub async fn audit(db: &ImageDb, storage: &dyn Storage) -> Result<AuditReport, AuditError> {
    let records = db.list_images()?;
    let files: BTreeSet<String> = storage.list().await?.into_iter().collect();

    let referenced: BTreeSet<&str> = records.iter().map(|r| r.stored_name.as_str()).collect();

    let orphan_files: Vec<String> = files
        .iter()
        .filter(|name| !referenced.contains(name.as_str()))
        .cloned()
        .collect();

    let mut report = AuditReport {
        records: records.len(),
        files: files.len(),
        orphan_files,
        ..Default::default()
    };

    for record in records {
        if !files.contains(&record.stored_name) {
            warn!(
                hexcode = %record.hexcode,
                stored_name = %record.stored_name,
                "Record without file"
            );
            report.orphan_records.push(record);
        }
    }

    for name in &report.orphan_files {
        warn!(stored_name = %name, "File without record");
    }

    info!(
        records = report.records,
        files = report.files,
        orphan_records = report.orphan_records.len(),
        orphan_files = report.orphan_files.len(),
        "Audit complete"
    );

    Ok(report)
}
