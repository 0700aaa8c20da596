//! Extractor Worker (C5) and Aggregator Worker (C6): stateless,
//! per-job processing functions. Concurrency bounding and job dispatch
//! live one layer up in the Coordinator; a worker here only knows how
//! to turn one job into one artifact.

mod aggregator;
mod common;
mod error;
mod extractor;
mod validate;

pub use aggregator::AggregatorWorker;
pub use common::{body_hash, CACHE_TTL_SECONDS};
pub use error::{Result, WorkerError};
pub use extractor::{ExtractionJob, ExtractorWorker};
pub use validate::Validated;
