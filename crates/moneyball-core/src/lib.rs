// Shared configuration and document storage for the stat ingestion pipeline.

pub mod config;
pub mod store;
