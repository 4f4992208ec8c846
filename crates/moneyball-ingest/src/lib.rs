// Ingestion of per-game stat exports into the document store.

pub mod cli;
pub mod error;
pub mod identity;
pub mod orchestrator;
pub mod report;
pub mod table;
pub mod trailer;
pub mod upsert;
