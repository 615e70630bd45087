// ── Resource store ──
//
// The registry arena plus the ingestion pass that populates it.

pub(crate) mod ingest;
mod registry;

pub use ingest::IngestSummary;
pub use registry::Registry;
