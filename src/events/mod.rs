//! Event ingestion and the processing pipeline
//!
//! One inbound customer event is deduplicated per tenant by its idempotency
//! key, persisted in its own transaction, and - only when new - run through
//! the rules pipeline: select active rules, evaluate each JsonLogic
//! condition, pre-check caps, then attempt the issuance transaction.

pub mod idempotency;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod repository;

pub use idempotency::IdempotencyCache;
pub use ingest::{ingest_event, IngestError, NewEvent};
pub use models::Event;
pub use pipeline::{process_event, AttemptOutcome, IssuanceAttempt};
pub use repository::EventRepository;
