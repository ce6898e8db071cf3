//! HTTP surface over the batch engine.

pub mod endpoints;
pub mod error;
pub mod router;

use std::sync::Arc;

use crate::checklist::ChecklistStore;
use crate::pipeline::orchestrator::BatchEngine;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ApiContext {
    pub engine: Arc<BatchEngine>,
    pub checklists: Arc<ChecklistStore>,
}

impl ApiContext {
    pub fn new(engine: Arc<BatchEngine>, checklists: Arc<ChecklistStore>) -> Self {
        Self { engine, checklists }
    }
}
