//! Writes relabeled PDFs and extraction JSON into job directories.
//!
//! Pure functions of (bytes, name, path). Filenames keep special
//! characters (`^`, spaces) verbatim so operators can trace outputs back
//! to the source uploads; the only transformation is the appended
//! document-type label.

use std::io;
use std::path::{Path, PathBuf};

use super::schema::ExtractedRecord;
use super::DocumentType;

/// `{stem}_{document_type}.pdf`, splitting the stem at the final `.`.
pub fn labeled_filename(original_filename: &str, document_type: DocumentType) -> String {
    let stem = match original_filename.rsplit_once('.') {
        Some((stem, _extension)) => stem,
        None => original_filename,
    };
    format!("{stem}_{document_type}.pdf")
}

/// Save a classified PDF under `job_path`, creating the directory if
/// needed. Overwrite-on-collision is permitted.
pub async fn save_classified_pdf(
    content: &[u8],
    original_filename: &str,
    document_type: DocumentType,
    job_path: &Path,
) -> io::Result<PathBuf> {
    tokio::fs::create_dir_all(job_path).await?;
    let path = job_path.join(labeled_filename(original_filename, document_type));
    tokio::fs::write(&path, content).await?;
    Ok(path)
}

/// Save an extraction record as pretty-printed JSON alongside its PDF:
/// same basename, `.json` extension.
pub async fn save_extraction_json(
    record: &ExtractedRecord,
    pdf_path: &Path,
) -> io::Result<PathBuf> {
    let json_path = pdf_path.with_extension("json");
    let body = serde_json::to_vec_pretty(record)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    tokio::fs::write(&json_path, body).await?;
    Ok(json_path)
}
