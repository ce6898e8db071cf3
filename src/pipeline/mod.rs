//! The batch processing pipeline: partition → allocate → classify →
//! persist → extract → validate → manifest.

pub mod classify;
pub mod extract;
pub mod orchestrator;
pub mod partition;
pub mod persist;
pub mod runs;
pub mod schema;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The closed set of document types a file can classify to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    EntryPrint,
    AirWaybill,
    CommercialInvoice,
    PackingList,
    Other,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::EntryPrint => "entry_print",
            DocumentType::AirWaybill => "air_waybill",
            DocumentType::CommercialInvoice => "commercial_invoice",
            DocumentType::PackingList => "packing_list",
            DocumentType::Other => "other",
        }
    }

    /// Label used when attaching this document to a provider request.
    pub fn prompt_label(&self) -> &'static str {
        match self {
            DocumentType::EntryPrint => "ENTRY PRINT DOCUMENT",
            DocumentType::AirWaybill => "AIR WAYBILL DOCUMENT",
            DocumentType::CommercialInvoice => "COMMERCIAL INVOICE DOCUMENT",
            DocumentType::PackingList => "PACKING LIST DOCUMENT",
            DocumentType::Other => "DOCUMENT",
        }
    }

    /// Structured extraction only runs for entry prints and invoices.
    pub fn is_extractable(&self) -> bool {
        matches!(self, DocumentType::EntryPrint | DocumentType::CommercialInvoice)
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "entry_print" => Some(DocumentType::EntryPrint),
            "air_waybill" => Some(DocumentType::AirWaybill),
            "commercial_invoice" => Some(DocumentType::CommercialInvoice),
            "packing_list" => Some(DocumentType::PackingList),
            "other" => Some(DocumentType::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An uploaded file held in memory before processing. The payload is
/// expected to be a PDF; the HTTP layer rejects anything else.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub filename: String,
    pub content: Bytes,
}

impl FileUpload {
    pub fn new(filename: impl Into<String>, content: Bytes) -> Self {
        Self {
            filename: filename.into(),
            content,
        }
    }
}

/// Run-level failures. Anything below job granularity is handled inside
/// the job and reported through its manifest entry instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("could not allocate a unique run directory after {attempts} attempts")]
    AllocationExhausted { attempts: u32 },

    #[error("batch processing cancelled")]
    Cancelled,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
