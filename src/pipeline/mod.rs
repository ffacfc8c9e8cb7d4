pub mod extraction;
pub mod fields;
pub mod import;
pub mod media;
pub mod processor; // Ingestion orchestrator
