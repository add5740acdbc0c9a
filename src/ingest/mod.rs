//! Upload ingestion.

mod pool;

pub use pool::{
    IngestFailure, IngestPool, IngestReport, StagedUpload, StoredAsset, DEFAULT_INGEST_WORKERS,
};
